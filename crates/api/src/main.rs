use anyhow::Context;

use realty_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    realty_observability::init();

    let config = ApiConfig::from_env().context("invalid configuration")?;
    let app = realty_api::app::build_app(&config);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        rounding = ?config.rounding,
        "listening"
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
