use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use car_price_api::{api, config::Config, model};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Config::from_env()?;
    let cwd = std::env::current_dir().context("failed to read working directory")?;
    tracing::info!(cwd = %cwd.display(), "starting car price service");
    tracing::info!(
        path = %cfg.index_path.display(),
        exists = cfg.index_path.exists(),
        "index page"
    );
    tracing::info!(
        model = %cfg.model_path.display(),
        meta = %cfg.meta_path.display(),
        "loading model"
    );

    let predictor = model::load(&cfg.model_path, &cfg.meta_path)?;
    tracing::info!("model loaded");

    let app = api::router(api::AppState::new(predictor, cfg.index_path.clone()));

    tracing::info!(addr = %cfg.addr, "listening");
    let listener = tokio::net::TcpListener::bind(cfg.addr)
        .await
        .with_context(|| format!("failed to bind {}", cfg.addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        return;
    }
    tracing::info!("shutting down");
}
