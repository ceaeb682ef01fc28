//! Administrative HTTP surface.
//!
//! - `GET /admin/status`: breaker state, limiter windows, local cache sizes
//! - `POST /admin/flush`: clear every local cache and the distributed store
//!
//! No authentication; bind it to a private address.

pub mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::cache::CacheTiers;
use crate::upstream::UpstreamGatewayClient;

use self::handlers::{flush_caches, get_status};

pub use handlers::AdminError;

#[derive(Clone)]
pub struct AdminState {
    pub tiers: CacheTiers,
    pub gateway: Arc<UpstreamGatewayClient>,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/flush", post(flush_caches))
        .with_state(state)
}

/// Serve the admin router on `listener` until `shutdown` fires.
pub async fn serve(listener: TcpListener, state: AdminState, mut shutdown: broadcast::Receiver<()>) -> std::io::Result<()> {
    let addr: SocketAddr = listener.local_addr()?;
    tracing::info!(address = %addr, "Admin server listening");

    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    tracing::info!("Admin server stopped");
    Ok(())
}
