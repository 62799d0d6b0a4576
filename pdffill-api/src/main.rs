use pdffill_api::{app_with_config, Config};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdffill_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let address = config.bind_address();
    let app = app_with_config(config);

    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!("pdffill API listening on http://{}", address);

    axum::serve(listener, app).await?;
    Ok(())
}
