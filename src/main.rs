//! PaddyScanner Server
//!
//! Loads the three classifiers, opens the image and record stores, and serves
//! the prediction API until interrupted. `predict` runs the same models on a
//! local file instead.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use paddy_scanner::config::{Cli, Command, ServerConfig};
use paddy_scanner::preprocess::decode_image;
use paddy_scanner::storage::{InMemoryPredictionRepository, PgPredictionRepository, PredictionRepository};
use paddy_scanner::utils::logging::init_logging;
use paddy_scanner::{build_router, AppState, InferenceService, Task};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_logging(&cli.log_config()).map_err(anyhow::Error::msg)?;

    match &cli.command {
        Some(Command::Predict { image, task }) => cmd_predict(&cli, image, *task),
        Some(Command::Serve) | None => cmd_serve(ServerConfig::from_cli(&cli)?).await,
    }
}

/// Classify one local image and print the predictions
fn cmd_predict(cli: &Cli, image_path: &Path, task: Option<Task>) -> anyhow::Result<()> {
    let bytes = std::fs::read(image_path)
        .with_context(|| format!("failed to read {}", image_path.display()))?;
    let image = decode_image(&bytes)?;

    let inference = InferenceService::load(&cli.model_paths()).context("failed to load models")?;

    let tasks = match task {
        Some(task) => vec![task],
        None => Task::ALL.to_vec(),
    };

    println!("Image: {}", image_path.display());
    for task in tasks {
        println!("{}", "-".repeat(50));
        println!("Model: {}", task);
        let (result, confidence) = match task {
            Task::Disease => {
                let p = inference.classify_disease(&image)?;
                (format!("Predicted Label: {}", p.label), p.confidence)
            }
            Task::Variety => {
                let p = inference.identify_variety(&image)?;
                (format!("Predicted Label: {}", p.label), p.confidence)
            }
            Task::Age => {
                let p = inference.estimate_age(&image)?;
                (format!("Predicted Age: {} days", p.days), p.confidence)
            }
        };
        println!("{}", result);
        println!("Confidence: {}", confidence);
    }

    Ok(())
}

async fn cmd_serve(config: ServerConfig) -> anyhow::Result<()> {
    info!("PaddyScanner Server v{}", paddy_scanner::VERSION);
    info!("Configuration:");
    info!("  Bind address:  {}", config.bind_addr);
    info!("  Disease model: {:?}", config.models.disease);
    info!("  Variety model: {:?}", config.models.variety);
    info!("  Age model:     {:?}", config.models.age);
    info!("  Image store:   {}", config.blobs);
    info!("  Upload limit:  {} bytes", config.max_upload_bytes);

    // Models load before the socket opens; a broken artifact aborts startup
    let models = config.models.clone();
    let inference = tokio::task::spawn_blocking(move || InferenceService::load(&models))
        .await?
        .context("failed to load models")?;
    for task in Task::ALL {
        let pre = inference.adapter(task).preprocess_config();
        info!(
            "  {} input: {}x{} (normalize: {})",
            task, pre.width, pre.height, pre.normalize
        );
    }

    let blobs = config.blobs.open().context("failed to open image store")?;

    let mut pg_repository = None;
    let records: Arc<dyn PredictionRepository> = match &config.database_url {
        Some(url) => {
            let repository = PgPredictionRepository::connect(url)
                .await
                .context("failed to connect to the prediction database")?;
            info!("Prediction records stored in PostgreSQL");
            pg_repository = Some(repository.clone());
            Arc::new(repository)
        }
        None => {
            warn!("DATABASE_URL not set. Prediction history is kept in memory and lost on restart");
            Arc::new(InMemoryPredictionRepository::new())
        }
    };

    let state = Arc::new(AppState::new(Arc::new(inference), blobs, records));
    let app = build_router(state, config.max_upload_bytes);

    info!("Starting server on http://{}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(repository) = pg_repository {
        repository.pool().close().await;
    }
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
