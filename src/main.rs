use clap::Parser;
use gsml_proxy::app::{serve, AppState};
use gsml_proxy::core::{ConfigProvider, ResourceLoader};
use gsml_proxy::utils::error::{ErrorSeverity, ProxyError};
use gsml_proxy::utils::logger;
use gsml_proxy::{CliConfig, Command, GmlToKml, GsmlController, HttpServiceCaller, LocalResources};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliConfig::parse();
    let config = cli.load_config();

    // 初始化日誌
    let log_format = config
        .as_ref()
        .map(|c| c.logging.format.clone())
        .unwrap_or_else(|_| "compact".to_string());
    logger::init_logger(cli.verbose, &log_format);

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("❌ Configuration validation failed: {}", e);
            tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
            eprintln!("❌ {}", e.user_friendly_message());
            std::process::exit(1);
        }
    };
    if cli.verbose {
        tracing::debug!("Config: {:?}", config);
    }

    let resources = LocalResources::new(config.resource_dir());
    let caller = HttpServiceCaller::new(config.request_timeout(), config.user_agent())?;
    let controller = GsmlController::new(caller, GmlToKml::new())
        .with_max_features(config.max_features());

    let result = match cli.command {
        Command::Serve { .. } => {
            let state = Arc::new(AppState::new(
                controller,
                resources,
                config.default_style_sheet().to_string(),
            ));
            serve(state, config.bind_addr()).await
        }
        Command::Convert {
            service_url,
            style_sheet,
        } => {
            let path = style_sheet.unwrap_or_else(|| config.default_style_sheet().to_string());
            match resources.load_style_sheet(&path).await {
                Ok(style) => {
                    let mut stdout = std::io::stdout();
                    controller
                        .xslt_rest_proxy(&service_url, style.as_ref(), &mut stdout)
                        .await
                }
                Err(e) => Err(e),
            }
        }
        Command::Features {
            service_url,
            type_name,
            feature_id,
            style_sheet,
        } => {
            let path = style_sheet.unwrap_or_else(|| config.default_style_sheet().to_string());
            match resources.load_style_sheet(&path).await {
                Ok(style) => {
                    let model = match feature_id {
                        Some(id) => {
                            controller
                                .request_feature(&service_url, &type_name, &id, style.as_ref())
                                .await
                        }
                        None => {
                            controller
                                .request_all_features(&service_url, &type_name, style.as_ref())
                                .await
                        }
                    };
                    match serde_json::to_string_pretty(&model) {
                        Ok(json) if model.success => {
                            println!("{}", json);
                            Ok(())
                        }
                        Ok(json) => {
                            println!("{}", json);
                            std::process::exit(2);
                        }
                        Err(e) => Err(ProxyError::from(e)),
                    }
                }
                Err(e) => Err(e),
            }
        }
    };

    if let Err(e) = result {
        report_and_exit(e);
    }

    Ok(())
}

fn report_and_exit(e: ProxyError) -> ! {
    tracing::error!(
        "❌ gsml-proxy failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());
    eprintln!("❌ {}", e.user_friendly_message());

    // 根據錯誤嚴重程度決定退出碼
    let exit_code = match e.severity() {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,
        ErrorSeverity::High => 1,
        ErrorSeverity::Critical => 3,
    };
    std::process::exit(exit_code);
}
