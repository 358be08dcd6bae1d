//! Vision agent CLI
//!
//! Lists the known image models, downloads their artifacts and classifies
//! images locally.

#![allow(clippy::print_stdout)]

mod output;

use std::path::PathBuf;
use std::sync::Arc;

use ai_vision::{PredictionService, PredictorRegistry, open_image, plugin};
use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use domain::ModelManifest;
use infrastructure::{AppConfig, ManifestCatalog, init_telemetry};
use tracing::debug;

/// Vision agent CLI
#[derive(Debug, Parser)]
#[command(name = "vision-agent")]
#[command(author, version, about = "Image classification agent", long_about = None)]
struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Configuration file (defaults to ./config.toml when present)
    #[arg(short, long, env = "VISION_AGENT_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Directory of model manifests, replacing the built-in ones
    #[arg(short, long, global = true)]
    manifest_dir: Option<PathBuf>,

    /// Directory for downloaded model artifacts
    #[arg(short, long, global = true)]
    work_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List available models
    Models,

    /// Show a model manifest
    Info {
        /// Model name or name:version
        model: String,

        /// Print the manifest as JSON
        #[arg(long)]
        json: bool,
    },

    /// Download a model's graph, weights and labels
    Download {
        /// Model name or name:version
        model: String,
    },

    /// Classify one or more images
    Predict {
        /// Model name or name:version
        model: String,

        /// Image files
        #[arg(required = true)]
        images: Vec<PathBuf>,

        /// Number of classes to print (defaults to the configured top_k)
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config,
}

/// Determine log filter override from verbosity count
const fn log_filter_from_verbosity(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load_from(cli.config.as_deref())?;
    if let Some(dir) = &cli.manifest_dir {
        config.catalog.manifest_dir = Some(dir.clone());
    }
    if let Some(dir) = &cli.work_dir {
        config.vision.work_dir.clone_from(dir);
    }
    config.validate()?;
    Ok(config)
}

fn load_catalog(config: &AppConfig) -> anyhow::Result<ManifestCatalog> {
    let catalog = match &config.catalog.manifest_dir {
        Some(dir) => ManifestCatalog::load_dir(dir)?,
        None => ManifestCatalog::builtin()?,
    };
    Ok(catalog)
}

fn find_model<'a>(catalog: &'a ManifestCatalog, name: &str) -> anyhow::Result<&'a ModelManifest> {
    match catalog.get(name) {
        Some(manifest) => Ok(manifest),
        None => bail!("Unknown model '{name}'. Run `vision-agent models` to list models."),
    }
}

fn registry(config: &AppConfig) -> anyhow::Result<Arc<PredictorRegistry>> {
    let registry = Arc::new(PredictorRegistry::new());
    plugin::register(&registry, &config.vision)?;
    Ok(registry)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    init_telemetry(&config.telemetry, log_filter_from_verbosity(cli.verbose))?;
    debug!(work_dir = %config.vision.work_dir.display(), "Configuration loaded");

    match cli.command {
        Commands::Models => {
            let catalog = load_catalog(&config)?;
            print!("{}", output::model_table(&catalog.list()));
        },

        Commands::Info { model, json } => {
            let catalog = load_catalog(&config)?;
            let manifest = find_model(&catalog, &model)?;
            if json {
                println!("{}", serde_json::to_string_pretty(manifest)?);
            } else {
                print!("{}", output::model_details(manifest, &config.vision.work_dir));
            }
        },

        Commands::Download { model } => {
            let catalog = load_catalog(&config)?;
            let manifest = find_model(&catalog, &model)?;
            let predictor = registry(&config)?.load(manifest.clone()).await?;

            println!("📥 Downloading {} {}", manifest.name, manifest.version);
            predictor
                .download()
                .await
                .with_context(|| format!("Failed to download {}", manifest.name))?;
            predictor.close().await?;
            println!("✅ Artifacts ready");
        },

        Commands::Predict {
            model,
            images,
            top_k,
            json,
        } => {
            let catalog = load_catalog(&config)?;
            let manifest = find_model(&catalog, &model)?;
            let k = top_k.unwrap_or(config.vision.top_k);
            let service = PredictionService::new(registry(&config)?, config.vision.top_k);

            let mut results = Vec::with_capacity(images.len());
            for path in &images {
                let image = open_image(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let features = service.classify_top_k(manifest, image, k).await?;
                results.push((path.clone(), features));
            }
            service.shutdown().await;

            if json {
                println!("{}", serde_json::to_string_pretty(&output::results_json(&results))?);
            } else {
                for (path, features) in &results {
                    print!("{}", output::prediction(path, manifest, features));
                }
            }
        },

        Commands::Config => {
            print!("{}", config.to_toml()?);
        },
    }

    Ok(())
}
