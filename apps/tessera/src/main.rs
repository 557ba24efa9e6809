//! # Tessera
//!
//! The command-line binary for the Tessera quad store.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                apps/tessera (THE BINARY)              │
//! │                                                       │
//! │   ┌─────────────┐   ┌─────────────┐   ┌───────────┐   │
//! │   │    CLI      │   │   config    │   │  dataset  │   │
//! │   │   (clap)    │   │   (toml)    │   │  (json)   │   │
//! │   └──────┬──────┘   └──────┬──────┘   └─────┬─────┘   │
//! │          └─────────────────┼────────────────┘         │
//! │                            ▼                          │
//! │                   ┌────────────────┐                  │
//! │                   │  tessera-core  │                  │
//! │                   │  (THE LOGIC)   │                  │
//! │                   └────────────────┘                  │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! tessera stats -d family.json
//! tessera infer -d family.json -g urn:tessera:graph:inference
//! tessera query -d family.json -Q ancestors.json --json
//! ```

mod cli;

use clap::Parser;
use tessera::config::{AppConfig, LogFormat, LoggingSection};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = cli::Cli::parse();

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    init_tracing(&config.logging);

    if let Err(e) = cli::execute(cli, &config) {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing on stderr.
///
/// TESSERA_LOG_FORMAT overrides the configured format, RUST_LOG the filter.
fn init_tracing(logging: &LoggingSection) {
    let format = std::env::var("TESSERA_LOG_FORMAT")
        .ok()
        .and_then(|value| LogFormat::from_env_value(&value))
        .unwrap_or(logging.format);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.filter.as_str().into());

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
