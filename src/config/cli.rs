use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "sicil-bot")]
#[command(about = "Authenticated gazette search and text extraction for the trade registry portal")]
pub struct CliArgs {
    #[arg(long, short, default_value = "sicil-bot.toml")]
    pub config: String,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit JSON log lines instead of compact text")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// 搜尋公司公告
    Search {
        #[arg(long, default_value = "")]
        company: String,
        #[arg(long, default_value = "")]
        register_number: String,
        #[arg(long, default_value = "")]
        office: String,
        #[arg(long, help = "CAPTCHA text read by a human")]
        captcha: Option<String>,
    },
    /// 下載公告 PDF 並輸出文字
    Text { url: String },
    /// 下載公告 PDF 原始檔
    Pdf {
        url: String,
        #[arg(long, short)]
        output: String,
    },
    /// Load a fresh CAPTCHA and print it as JSON
    Captcha,
    /// Check whether the portal is reachable
    Health,
}
