//! s3static - serve an S3-compatible bucket as a static file tree
//!
//! Files stream with caching headers, directories render as listings and
//! directory paths without a trailing slash redirect to the slashed form.

mod config;

use clap::Parser;
use s3static_serve::{storage::RemoteStorage, S3Static};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Args, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "s3static={level},s3static_serve={level},tower_http=debug",
                    level = args.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Configuration errors are fatal before anything is bound
    let config = Config::from_args(&args)?;

    info!("Starting s3static...");
    info!("  Endpoint: {} (region {})", config.store.endpoint, config.store.region);
    info!("  Bucket: {}", config.store.bucket);
    info!("  Bucket path: '{}'", config.serve.bucket_path);

    let store = RemoteStorage::connect(&config.store).await;
    let service = S3Static::new(config.serve.clone(), Arc::new(store));
    let app = service.router();

    let listener = tokio::net::TcpListener::bind(&config.address).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("s3static stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
