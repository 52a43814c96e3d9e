//! Command-line front end.
//!
//! Stands in for the phone UI: each subcommand drives one user action
//! through the orchestrator and prints what the screen would show.

use crate::config::AppConfig;
use crate::llm::{DetectionResult, HttpInferenceClient};
use crate::preferences;
use crate::scan::{ScanOrchestrator, ScanSettings};
use crate::store::{JsonFileStore, RecordId, RecordStore, ScanRecord};
use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "skysniffer", version, about = "Analyze sky photos for persistent contrails")]
pub struct Cli {
    /// Analysis profile: chemtrail, contrail or hybrid
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// Inference wait bound in seconds (clamped to 20-60)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Directory holding saved scans
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Analyze one image
    Scan {
        image: PathBuf,
        /// Save the result to history when the scan succeeds
        #[arg(long)]
        save: bool,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// List saved scans, most recent first
    History {
        #[arg(long)]
        json: bool,
    },
    /// Delete saved scans by id
    Delete {
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Show or reset the onboarding flag
    Onboarding {
        /// Mark onboarding as complete
        #[arg(long, conflicts_with = "reset")]
        complete: bool,
        /// Clear the flag so onboarding shows again
        #[arg(long)]
        reset: bool,
    },
    /// Store an API key in the OS keychain for the active profile
    SetKey { key: String },
}

impl Cli {
    /// Environment config with flag overrides on top.
    pub fn config(&self) -> anyhow::Result<AppConfig> {
        let mut config = AppConfig::from_env();
        if let Some(profile) = &self.profile {
            config.profile = profile.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(secs) = self.timeout {
            config.wait_secs = Some(secs);
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir = Some(dir.clone());
        }
        Ok(config)
    }
}

pub async fn dispatch(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config()?;
    log::info!(
        "[CONFIG] profile={}, model={}, wait={}s",
        config.profile,
        config.model,
        config.wait().as_secs()
    );

    let client = HttpInferenceClient::new(&config.endpoint, config.resolve_api_key(), config.wait())
        .context("building inference client")?;
    let store = JsonFileStore::open(config.store_root());
    let mut orchestrator = ScanOrchestrator::new(client, store, ScanSettings::from_config(&config));
    if let Some(path) = preferences::default_path() {
        orchestrator = orchestrator.with_preferences(path);
    }

    match cli.command {
        Command::Scan { image, save, json } => {
            if orchestrator.needs_onboarding() {
                println!("Welcome to SkySniffer! Point it at the sky and it will describe any contrails it finds.");
                println!("(Run `skysniffer onboarding --complete` to hide this message.)\n");
            }
            let source = image::open(&image)
                .with_context(|| format!("could not read image {}", image.display()))?;

            match orchestrator.scan(source).await {
                Ok(result) => {
                    if json {
                        println!("{}", serde_json::to_string_pretty(&result)?);
                    } else {
                        print_result(&result);
                    }
                    if save {
                        let id = orchestrator.confirm_save()?;
                        println!("\nSaved as {}", id);
                    } else {
                        orchestrator.discard()?;
                    }
                }
                Err(e) => {
                    eprintln!("{}", e.user_message());
                    let suggestion = e.recovery_suggestion();
                    if !suggestion.is_empty() {
                        eprintln!("{}", suggestion);
                    }
                    orchestrator.dismiss().ok();
                    bail!("scan failed: {}", e);
                }
            }
        }
        Command::History { json } => {
            let records = orchestrator.history()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else if records.is_empty() {
                println!("No scans yet.");
            } else {
                for record in &records {
                    print_row(record, orchestrator.store());
                }
            }
        }
        Command::Delete { ids } => {
            let parsed = ids
                .iter()
                .map(|s| s.parse::<RecordId>().with_context(|| format!("invalid id '{}'", s)))
                .collect::<anyhow::Result<HashSet<_>>>()?;
            orchestrator.delete(&parsed)?;
            println!("Deleted {} scan(s).", parsed.len());
        }
        Command::Onboarding { complete, reset } => {
            if reset {
                if let Some(path) = preferences::default_path() {
                    preferences::Preferences::default()
                        .save(&path)
                        .map_err(anyhow::Error::msg)?;
                }
                println!("Onboarding will show again.");
            } else if complete {
                orchestrator
                    .complete_onboarding()
                    .map_err(anyhow::Error::msg)?;
                println!("Onboarding complete.");
            } else {
                println!(
                    "Onboarding {}",
                    if orchestrator.needs_onboarding() { "pending" } else { "complete" }
                );
            }
        }
        Command::SetKey { key } => {
            config.store_api_key(&key).map_err(anyhow::Error::msg)?;
            println!("Stored API key for the {} profile.", config.profile);
        }
    }
    Ok(())
}

fn print_result(result: &DetectionResult) {
    if !result.is_valid_image {
        println!("Not a Sky Image");
        println!("{}", result.explanation);
        println!("Please upload an image of the sky with visible contrails or cloud formations.");
        return;
    }
    let level = result.severity_level;
    println!("{} — {} ({})", level, level.headline(), level.color());
    println!("Confidence: {:.0}%", result.confidence_score * 100.0);
    println!("Conditions: {}", result.atmospheric_conditions);
    if !result.detected_patterns.is_empty() {
        println!("Patterns:");
        for pattern in &result.detected_patterns {
            println!("  - {}", pattern);
        }
    }
    println!("\n{}", result.explanation);
}

fn print_row<S: RecordStore>(record: &ScanRecord, store: &S) {
    let when = record.timestamp.format("%Y-%m-%d %H:%M");
    let has_image = store.has_image(record);
    let summary = if record.is_valid_image {
        format!(
            "{} · {:.0}%",
            record.severity_level.short_label(),
            record.confidence_score * 100.0
        )
    } else {
        "Invalid Image".to_string()
    };
    println!(
        "{}  {}  {}{}",
        record.id,
        when,
        summary,
        if has_image { "" } else { "  (no image)" }
    );
}
