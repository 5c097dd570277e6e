//! Irrigation Water Requirement Predictor - Training Job
//!
//! Usage: `irrigation-train [grid|compare|verify] [--artifact PATH] [--dataset PATH]`
//!
//! - `grid` (default): engineer the dataset, grid search a random forest,
//!   evaluate on the held-out split and persist the artifact
//! - `compare`: fit each model family on the same split and write a report
//! - `verify`: score the persisted artifact against the noiseless formula

use clap::{Parser, ValueEnum};
use irrigation_backend::{services::TrainingService, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "irrigation-train")]
#[command(about = "Train, compare and verify irrigation water requirement models")]
#[command(version)]
struct Cli {
    /// Job to run
    #[arg(value_enum, default_value_t = Mode::Grid)]
    mode: Mode,

    /// Artifact path (overrides model.artifact_path)
    #[arg(short, long)]
    artifact: Option<String>,

    /// Raw dataset CSV (overrides training.dataset_path)
    #[arg(short, long)]
    dataset: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Grid search a random forest and persist the best model
    Grid,
    /// Fit every model family on the same split and write a report
    Compare,
    /// Score the persisted artifact against the noiseless formula
    Verify,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "irrigation_train=info,irrigation_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let mut config = Config::load()?;
    if let Some(dataset) = cli.dataset {
        config.training.dataset_path = dataset;
    }
    if let Some(artifact) = cli.artifact {
        config.model.artifact_path = artifact;
    }
    let mode = cli.mode;

    tracing::info!("Starting training job ({:?})", mode);
    tracing::info!("Environment: {}", config.environment);

    let service = TrainingService::new(config.training.clone(), &config.model.artifact_path);

    match mode {
        Mode::Grid => {
            let outcome = service.run_grid_search()?;
            let meta = &outcome.artifact.metadata;
            tracing::info!(
                "Model saved to {} ({} train / {} test rows)",
                service.artifact_path().display(),
                meta.n_train,
                meta.n_test
            );
        }
        Mode::Compare => {
            let report = service.compare_models()?;
            tracing::info!("Compared {} model families", report.results.len());
        }
        Mode::Verify => {
            let report = service.verify()?;
            tracing::info!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_mode_defaults_to_grid() {
        let cli = Cli::try_parse_from(["irrigation-train"]).unwrap();
        assert_eq!(cli.mode, Mode::Grid);
        assert!(cli.artifact.is_none());
    }

    #[test]
    fn test_mode_and_overrides() {
        let cli = Cli::try_parse_from([
            "irrigation-train",
            "verify",
            "--artifact",
            "models/a.bin",
            "-d",
            "data.csv",
        ])
        .unwrap();
        assert_eq!(cli.mode, Mode::Verify);
        assert_eq!(cli.artifact.as_deref(), Some("models/a.bin"));
        assert_eq!(cli.dataset.as_deref(), Some("data.csv"));
    }

    #[test]
    fn test_unknown_mode_rejected() {
        assert!(Cli::try_parse_from(["irrigation-train", "deploy"]).is_err());
    }
}
