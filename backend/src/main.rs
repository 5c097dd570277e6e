//! Irrigation Water Requirement Predictor - Prediction Server
//!
//! Loads the trained model artifact once and serves predictions over HTTP.

use std::{net::SocketAddr, sync::Arc};

use irrigation_backend::{create_app, services::PredictionService, AppState, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "irrigation_server=debug,irrigation_backend=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting Irrigation Prediction Server");
    tracing::info!("Environment: {}", config.environment);

    // Load the model once; the server still starts without one
    tracing::info!("Loading model from {}...", config.model.artifact_path);
    let predictor = PredictionService::load(&config.model.artifact_path);
    if predictor.is_ready() {
        tracing::info!("Model loaded successfully");
    } else {
        tracing::warn!("Serving without a model; /predict will return 503");
    }

    // Create application state
    let state = AppState {
        config: Arc::new(config.clone()),
        predictor: Arc::new(predictor),
    };

    // Build application
    let app = create_app(state);

    // Start server
    let host: std::net::IpAddr = config.server.host.parse()?;
    let addr = SocketAddr::from((host, config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
