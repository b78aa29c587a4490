use paperrooms::{AppState, app, config::Config, db};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let config = Config::from_env().map_err(|e| {
        error!(error = %e, "failed to load config");
        e
    })?;

    let db_pool = db::connect(&config.database_url, 16).await?;
    tokio::fs::create_dir_all(&config.upload_dir).await?;

    let bind_addr = config.bind_addr;
    info!(
        addr = %bind_addr,
        domain = %config.institution_domain,
        summarizer = config.summarizer_url.as_deref().unwrap_or("transcript"),
        "starting paperrooms"
    );

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app(AppState::new(config, db_pool))).await?;
    Ok(())
}
