//! Edge proxy
//!
//! Public-facing HTTP server that forwards approved metadata routes to the
//! internal backend. The backend address never leaves this process.

pub mod error;
pub mod forward;
pub mod routes;

pub use error::ProxyError;
pub use forward::{filter_hop_by_hop, forward_headers, BackendForwarder, Forwarded};
pub use routes::{router, ProxyState};

use anyhow::{Context, Result};
use tracing::info;

use crate::config::ProxyConfig;

/// Bind and serve the proxy until the process exits
pub async fn serve(config: ProxyConfig) -> Result<()> {
    let forwarder = BackendForwarder::new(&config)?;
    let app = router(ProxyState::new(forwarder));

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Edge proxy listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
