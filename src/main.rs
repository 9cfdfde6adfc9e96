//! Iris classifier service entry point.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use iris_serve::api::{create_router, AppState};
use iris_serve::config::Config;
use iris_serve::features::{FeatureField, Measurements, FEATURE_COUNT};
use iris_serve::metrics;
use iris_serve::model::{Classifier, ModelArtifact};
use iris_serve::store::PredictionStore;
use iris_serve::training::{train_model, TrainingOptions};
use iris_serve::utils::shutdown_signal;

/// Train an iris classifier and serve recorded predictions.
#[derive(Parser, Debug)]
#[command(name = "iris-serve")]
#[command(about = "Train an iris classifier and serve recorded predictions over HTTP")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,

    /// HTTP server port (overrides PORT).
    #[arg(short, long)]
    port: Option<u16>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the prediction API (default).
    Serve {
        /// HTTP server port (overrides PORT).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Train the model and write model and metrics files.
    Train {
        /// Labeled CSV dataset (overrides DATASET_PATH).
        #[arg(long)]
        data: Option<PathBuf>,

        /// Where to write the model (overrides MODEL_PATH).
        #[arg(long)]
        model_out: Option<PathBuf>,

        /// Where to write the metrics (overrides METRICS_PATH).
        #[arg(long)]
        metrics_out: Option<PathBuf>,
    },

    /// Classify a single measurement with the saved model.
    Predict {
        #[arg(long)]
        sepal_length: f64,
        #[arg(long)]
        sepal_width: f64,
        #[arg(long)]
        petal_length: f64,
        #[arg(long)]
        petal_width: f64,
    },

    /// Check configuration validity.
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Configuration drives log format, so load it before logging
    let loaded = Config::load();
    let log_json = loaded.as_ref().map(|c| c.log_json).unwrap_or(false);
    let default_level = loaded
        .as_ref()
        .map(|c| c.rust_log.clone())
        .unwrap_or_else(|_| "info".to_string());

    let filter = if args.verbose || loaded.as_ref().map(|c| c.verbose).unwrap_or(false) {
        EnvFilter::new("iris_serve=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(log_json.then(|| fmt::layer().json()))
        .with((!log_json).then(fmt::layer))
        .init();

    let config = loaded.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    // Handle subcommands
    match args.command {
        Some(Command::Serve { port }) => cmd_serve(config, port.or(args.port)).await,
        Some(Command::Train {
            data,
            model_out,
            metrics_out,
        }) => cmd_train(config, data, model_out, metrics_out),
        Some(Command::Predict {
            sepal_length,
            sepal_width,
            petal_length,
            petal_width,
        }) => cmd_predict(
            &config,
            Measurements {
                sepal_length,
                sepal_width,
                petal_length,
                petal_width,
            },
        ),
        Some(Command::CheckConfig) => cmd_check_config(&config),
        None => cmd_serve(config, args.port).await,
    }
}

/// Check configuration validity.
fn cmd_check_config(config: &Config) -> anyhow::Result<()> {
    println!("======================================================================");
    println!("IRIS SERVE - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow!("Configuration validation failed"));
        }
    }

    print!("Checking model artefact... ");
    match ModelArtifact::load(&config.model_path) {
        Ok(artifact) => {
            println!("OK");
            println!("  Trained at: {}", artifact.trained_at);
            println!("  Classes: {}", artifact.model.classes().join(", "));
        }
        Err(e) => {
            println!("MISSING");
            println!("  {} (run `iris-serve train` first)", e);
        }
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Listen Address: {}", config.bind_address());
    println!("  Database: {}", config.database_path.display());
    println!("  Model: {}", config.model_path.display());
    println!("  Metrics: {}", config.metrics_path.display());
    println!("  Dataset: {}", config.dataset_path.display());
    println!("  Test Size: {}", config.test_size);
    println!("  Random State: {}", config.random_state);
    println!("  Max Iterations: {}", config.max_iter);
    println!("  Learning Rate: {}", config.learning_rate);
    println!("  C: {}", config.regularization);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Train the model and write the artefact and metrics.
fn cmd_train(
    mut config: Config,
    data: Option<PathBuf>,
    model_out: Option<PathBuf>,
    metrics_out: Option<PathBuf>,
) -> anyhow::Result<()> {
    if let Some(path) = data {
        config.dataset_path = path;
    }
    if let Some(path) = model_out {
        config.model_path = path;
    }
    if let Some(path) = metrics_out {
        config.metrics_path = path;
    }
    config
        .validate()
        .map_err(|e| anyhow!("Configuration validation failed: {}", e))?;

    let outcome = train_model(&TrainingOptions::from_config(&config))
        .with_context(|| format!("training on {} failed", config.dataset_path.display()))?;

    let m = &outcome.metrics;
    println!("======================================================================");
    println!("TRAINING COMPLETE");
    println!("======================================================================");
    println!("  Train rows: {}", outcome.train_size);
    println!("  Test rows: {}", outcome.test_size);
    println!("  Accuracy: {:.3}", m.accuracy);
    println!("  Precision: {:.3}", m.precision);
    println!("  Recall: {:.3}", m.recall);
    println!("  F1 Score: {:.3}", m.f1_score);
    println!("----------------------------------------------------------------------");
    println!("  Model saved to {}", config.model_path.display());
    println!("  Metrics saved to {}", config.metrics_path.display());
    println!("======================================================================");

    Ok(())
}

/// Classify one measurement from the command line.
fn cmd_predict(config: &Config, m: Measurements) -> anyhow::Result<()> {
    let artifact = ModelArtifact::load(&config.model_path)?;
    let label = artifact.model.predict(&m.as_array())?;
    println!("{}", label);
    Ok(())
}

/// Load the model, open the store and serve the API.
async fn cmd_serve(mut config: Config, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.port = port;
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow!("Configuration validation failed: {}", e));
    }

    let artifact = ModelArtifact::load(&config.model_path).map_err(|e| {
        error!("Failed to load model: {}", e);
        e
    })?;
    if artifact.model.n_features() != FEATURE_COUNT {
        bail!(
            "model expects {} features but the API provides {}",
            artifact.model.n_features(),
            FEATURE_COUNT
        );
    }
    if artifact.feature_names != FeatureField::names() {
        warn!(
            "Model was trained on columns {:?}; requests are mapped positionally",
            artifact.feature_names
        );
    }
    info!("Classes: {}", artifact.model.classes().join(", "));

    let store = PredictionStore::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))?;
    info!("Prediction store: {}", config.database_path.display());

    let prometheus = metrics::install_recorder()?;

    let app_state = AppState::new(
        Arc::new(artifact.model),
        Arc::new(store),
        config.metrics_path.clone(),
    )
    .with_prometheus(prometheus);

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!("HTTP server listening on {}", listener.local_addr()?);

    let router = create_router(app_state.clone());
    app_state.set_ready(true);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    app_state.set_ready(false);
    info!("Server stopped");
    Ok(())
}
