use std::net::SocketAddr;
use std::sync::Arc;

use llm_core::{LeptonClient, LlmError};
use server::config::ServerConfig;
use server::state::{AppState, LlmStatus};
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let _ = dotenv::dotenv();

    async_main().await
}

async fn async_main() -> anyhow::Result<()> {
    info!("Starting voice & text assistant server...");

    // A missing token leaves the server up but refusing chat requests.
    let llm = match LeptonClient::from_env() {
        Ok(client) => {
            info!(
                "Connected chat client: model={}, endpoint={}",
                client.config().model,
                client.config().completions_url()
            );
            LlmStatus::Ready(Arc::new(client))
        }
        Err(LlmError::Configuration(msg)) => {
            error!("Chat client not configured: {msg}");
            LlmStatus::Unconfigured(msg)
        }
        Err(e) => return Err(e.into()),
    };

    let config = ServerConfig::from_env();
    info!(
        "Server configuration loaded: port={}, rate_limit={}/min, llm_timeout={}s",
        config.port, config.rate_limit_per_minute, config.llm_timeout_secs
    );

    let state = AppState::new(llm, config.clone());
    let app = server::build_router(state)?;

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!("Failed to bind {addr}: {e}. Try a different PORT.")
    })?;

    info!("Server listening on http://{addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
