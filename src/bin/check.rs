//! labgate_check - offline access checks against experiment JSON files

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde_json::json;

use labgate::logging;
use labgate::permissions::{
    can_access_restricted_feature, summarize_access, Experiment, Feature, Principal,
};
use labgate::sharing::validate_permissions;
use labgate::LogFormat;

/// Evaluate experiment permissions from files on disk
#[derive(Parser, Debug)]
#[command(
    name = "labgate_check",
    version,
    about = "Check experiment permissions from JSON files"
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print access decisions for a user
    Check {
        /// Experiment record (JSON)
        #[arg(short, long)]
        experiment: PathBuf,

        /// Current user (JSON); omitted means anonymous
        #[arg(short, long)]
        user: Option<PathBuf>,

        /// Single feature to check instead of the full summary
        #[arg(short, long)]
        feature: Option<String>,
    },
    /// Validate the experiment's permissions document; exits 1 when invalid
    Validate {
        /// Experiment record (JSON)
        #[arg(short, long)]
        experiment: PathBuf,
    },
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn main() -> Result<()> {
    logging::init_tracing(LogFormat::Text, "labgate=warn");

    let args = Args::parse();

    match args.command {
        Command::Check {
            experiment,
            user,
            feature,
        } => {
            let experiment: Experiment = read_json(&experiment)?;
            let user: Option<Principal> = user.as_deref().map(read_json::<Principal>).transpose()?;

            let output = match feature {
                Some(name) => {
                    let feature = Feature::from(name);
                    let allowed =
                        can_access_restricted_feature(&experiment, &feature, user.as_ref());
                    json!({ "feature": feature, "allowed": allowed })
                }
                None => serde_json::to_value(summarize_access(&experiment, user.as_ref()))?,
            };
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        Command::Validate { experiment } => {
            let experiment: Experiment = read_json(&experiment)?;
            let valid = experiment.permissions().is_some_and(validate_permissions);
            println!("{}", json!({ "valid": valid }));
            if !valid {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
