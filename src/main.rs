//! CORS relay.
//!
//! ```text
//!   Browser ──GET /?url=<target>──▶ ┌───────────────┐ ──GET <target>──▶ Origin
//!                                   │  cors-relay   │
//!   Browser ◀──status, body, CORS── └───────────────┘ ◀──status, body── Origin
//! ```

use std::path::PathBuf;

use clap::Parser;

use cors_relay::config::{self, RelayConfig};
use cors_relay::lifecycle;
use cors_relay::observability::logging;

#[derive(Parser)]
#[command(name = "cors-relay")]
#[command(about = "Relay remote resources with permissive CORS headers", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address
    #[arg(short, long)]
    bind: Option<String>,

    /// Only relay targets whose extension is allow-listed
    #[arg(long)]
    enforce_allow_list: bool,
}

impl Cli {
    /// File values, then command-line overrides, then validation.
    fn load(&self) -> Result<RelayConfig, config::ConfigError> {
        let mut config = match &self.config {
            Some(path) => config::read_config(path)?,
            None => RelayConfig::default(),
        };

        if let Some(bind) = &self.bind {
            config.listener.bind_address = bind.clone();
        }
        if self.enforce_allow_list {
            config.relay.enforce_allow_list = true;
        }

        config::validate_config(&config).map_err(config::ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.load()?;

    logging::init(&config.observability)?;
    tracing::info!("cors-relay v{} starting", env!("CARGO_PKG_VERSION"));

    lifecycle::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
