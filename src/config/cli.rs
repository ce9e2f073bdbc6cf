use crate::config::ProxyConfig;
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use clap::{Parser, Subcommand};

#[derive(Debug, Clone, Parser)]
#[command(name = "gsml-proxy")]
#[command(about = "Serve GML feature services as KML")]
pub struct CliConfig {
    /// Path to TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    /// Override the log format from the config file (compact or json)
    #[arg(long)]
    pub log_format: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the HTTP proxy
    Serve {
        /// Override the bind address from the config file
        #[arg(long)]
        bind: Option<String>,
    },
    /// Fetch a URL as-is and print the converted KML to stdout
    Convert {
        #[arg(long)]
        service_url: String,
        #[arg(long)]
        style_sheet: Option<String>,
    },
    /// Issue a WFS GetFeature and print the JSON view model
    Features {
        #[arg(long)]
        service_url: String,
        #[arg(long)]
        type_name: String,
        #[arg(long)]
        feature_id: Option<String>,
        #[arg(long)]
        style_sheet: Option<String>,
    },
}

impl CliConfig {
    /// 載入設定檔並套用命令列覆蓋
    pub fn load_config(&self) -> Result<ProxyConfig> {
        let mut config = match &self.config {
            Some(path) => ProxyConfig::from_file(path)?,
            None => ProxyConfig::default(),
        };

        if let Some(format) = &self.log_format {
            config.logging.format = format.clone();
        }
        if let Command::Serve { bind: Some(bind) } = &self.command {
            config.server.bind_addr = bind.clone();
        }

        config.validate()?;
        Ok(config)
    }
}
