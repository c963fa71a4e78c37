// cloudkeep - personal cloud storage backend
// Entry point and server setup

use std::path::Path;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cloudkeep=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting cloudkeep server");

    let data_dir = std::env::var("CLOUDKEEP_DATA_DIR").unwrap_or_else(|_| "./data".into());
    let addr = std::env::var("CLOUDKEEP_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let state = cloudkeep::app::init(Path::new(&data_dir)).await?;
    let app = cloudkeep::http::router(state);

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
