//! SkySniffer — application entry point.
//!
//! This is the app shell that wires together all domains.
//! No business logic lives here — only module declarations, startup
//! (env files, logging) and handing off to the CLI.
//!
//! Domains:
//!   - llm/         — request builder, inference client, result parser
//!   - scan/        — scan orchestrator state machine
//!   - store/       — saved scan history
//!   - config.rs    — endpoint / key / profile / wait bound
//!   - preferences  — onboarding flag

pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod preferences;
pub mod scan;
pub mod store;

pub use error::{FailureKind, ScanError};
pub use scan::{ScanOrchestrator, ScanSettings, ScanStatus};

use clap::Parser;

/// Entry point — called by the binary.
pub fn run() -> anyhow::Result<()> {
    // Load .env.local → .env from the working directory; first one found wins.
    'env_load: for env_file in [".env.local", ".env"] {
        let path = std::path::Path::new(env_file);
        if path.exists() {
            match dotenvy::from_path(path) {
                Ok(_) => eprintln!("[STARTUP] Loaded {}", path.display()),
                Err(e) => eprintln!("[STARTUP] Failed to load {}: {}", path.display(), e),
            }
            break 'env_load;
        }
    }

    env_logger::init();

    let cli = cli::Cli::parse();
    log::info!("SkySniffer starting up");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(cli::dispatch(cli))
}
