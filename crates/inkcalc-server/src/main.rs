//! InkCalc stub recognition server

use inkcalc_server::{AppState, ServerConfig, router};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkcalc_server=info,tower_http=info".into()),
        )
        .init();

    if let Err(e) = run().await {
        error!("{}", e);
        return std::process::ExitCode::FAILURE;
    }
    std::process::ExitCode::SUCCESS
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::from_env()?;
    let state = Arc::new(AppState::from_config(&config)?);
    let app = router(state);

    info!("InkCalc stub server listening on {}", config.addr);
    info!("Calculate endpoint: http://{}/calculate", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
