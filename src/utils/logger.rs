use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// hyper/reqwest 的連線細節只在出錯時有用
const QUIET_DEPENDENCIES: &str = "hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn";

fn default_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let crate_level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!("sicil_bot={},{},info", crate_level, QUIET_DEPENDENCIES))
    })
}

/// Human-readable logs on stderr; stdout is left to command output.
pub fn init_cli_logger(verbose: bool) {
    tracing_subscriber::registry()
        .with(default_filter(verbose))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .compact(),
        )
        .init();
}

/// 託管部署時使用 JSON 格式，方便集中收集
pub fn init_json_logger() {
    tracing_subscriber::registry()
        .with(default_filter(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .json()
                .flatten_event(true)
                .with_current_span(false),
        )
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_levels() {
        // RUST_LOG 有設定時以環境變數為準
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let quiet = default_filter(false).to_string();
        assert!(quiet.contains("sicil_bot=info"));
        assert!(quiet.contains("reqwest=warn"));
        assert!(default_filter(true).to_string().contains("sicil_bot=debug"));
    }
}
