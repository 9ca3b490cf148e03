//! Segmint entrypoint: `train` runs the offline pipeline, `serve` starts the
//! prediction service.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use segmint::server::{build_router, AppState, Artifacts};
use segmint::train::run_training;
use segmint::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    match cli.command {
        Command::Train { .. } => {
            let report = run_training(&config).context("training pipeline failed")?;
            info!(
                "Training complete: {} raw rows -> {} clean rows -> {} customers",
                report.n_raw_rows, report.n_clean_rows, report.n_customers
            );
            info!(
                "Inertia: {:.2}, silhouette: {:.4}, cluster sizes: {:?}",
                report.inertia, report.silhouette, report.cluster_sizes
            );
        }
        Command::Serve { .. } => {
            // A failed artifact load refuses to start the service
            let artifacts = Artifacts::load(&config.artifacts)
                .context("failed to load scaler/model artifacts")?;
            let app = build_router(AppState::new(artifacts));

            let listener = tokio::net::TcpListener::bind(&config.server.bind)
                .await
                .with_context(|| format!("failed to bind {}", config.server.bind))?;
            info!("segmint listening on http://{}", config.server.bind);
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
