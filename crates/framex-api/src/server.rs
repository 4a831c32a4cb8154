//! HTTP server start-up.

use std::future::Future;

use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::ApiConfig;

/// Bind the configured address and serve until `shutdown` resolves.
pub async fn serve<F>(router: Router, config: &ApiConfig, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(config.bind_address()).await?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
