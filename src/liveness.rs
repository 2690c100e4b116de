//! Liveness endpoint for external uptime checks.
//!
//! Runs on its own OS thread with its own runtime so it keeps answering
//! while the bot is reconnecting to Telegram.

use std::net::SocketAddr;
use std::thread::JoinHandle;

use axum::{routing::get, Router};
use tracing::{error, info};

pub const ALIVE_BODY: &str = "Bot is alive!";

pub fn router() -> Router {
    Router::new().route("/", get(alive))
}

async fn alive() -> &'static str {
    ALIVE_BODY
}

/// Bind and serve until the process exits.
pub async fn serve(addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("💓 Liveness endpoint on http://{}", listener.local_addr()?);
    axum::serve(listener, router()).await
}

/// Start the endpoint on a detached background thread.
pub fn spawn(addr: SocketAddr) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name("liveness".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    error!("Failed to build liveness runtime: {e}");
                    return;
                }
            };
            if let Err(e) = runtime.block_on(serve(addr)) {
                error!("Liveness endpoint stopped: {e}");
            }
        })
}
