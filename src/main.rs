use anyhow::{bail, Context};
use clap::Parser;
use sicil_bot::config::cli::{CliArgs, Command};
use sicil_bot::utils::{logger, validation::Validate};
use sicil_bot::{ApiResponse, GazetteService, PortalConfig, SearchCriteria};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    // 初始化日誌
    if args.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("Starting sicil-bot CLI");

    let config = PortalConfig::from_file(&args.config)
        .with_context(|| format!("failed to load configuration from {}", args.config))?;

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let service = GazetteService::connect(&config)
        .await
        .context("failed to initialise the portal client")?;

    match args.command {
        Command::Search {
            company,
            register_number,
            office,
            captcha,
        } => {
            let mut criteria = SearchCriteria::new(company, register_number, office);
            criteria.manual_captcha = captcha;
            let response = service.search(&criteria).await;
            print_json(&response)?;
            exit_on_failure(&response);
        }
        Command::Text { url } => {
            let response = service.document_text(&url).await;
            match &response.data {
                Some(text) => println!("{}", text),
                None => print_json(&response)?,
            }
            exit_on_failure(&response);
        }
        Command::Pdf { url, output } => {
            let response = service.document_bytes(&url).await;
            match response.data {
                Some(pdf) => {
                    tokio::fs::write(&output, &pdf)
                        .await
                        .with_context(|| format!("failed to write {}", output))?;
                    println!("✅ {} bytes saved to {}", pdf.len(), output);
                }
                None => bail!("{}", response.message),
            }
        }
        Command::Captcha => {
            let response = service.captcha().await;
            print_json(&response)?;
            exit_on_failure(&response);
        }
        Command::Health => {
            if service.health_check().await {
                println!("✅ Portal reachable");
            } else {
                println!("❌ Portal unreachable");
                std::process::exit(2);
            }
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(response: &ApiResponse<T>) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(response)?);
    Ok(())
}

fn exit_on_failure<T>(response: &ApiResponse<T>) {
    if !response.success {
        // 驗證碼需人工處理時用不同的結束碼，方便外部腳本判斷
        let code = if response.is_captcha_required() { 3 } else { 1 };
        std::process::exit(code);
    }
}
