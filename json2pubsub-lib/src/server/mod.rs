//! HTTP front end.

mod router;
mod state;

pub use router::{HEALTH_PATH, router};
pub use state::ServerState;

use crate::Result;
use axum::Router;
use core::future::Future;
use core::net::SocketAddr;
use ohno::IntoAppError;
use tokio::net::TcpListener;

const LOG_TARGET: &str = "    server";

/// Serves `app` on `listener` until `shutdown` resolves.
pub async fn serve(listener: TcpListener, app: Router, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        log::info!(target: LOG_TARGET, "Listening on {addr}");
    }

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown)
        .await
        .into_app_err("server exited unexpectedly")
}
