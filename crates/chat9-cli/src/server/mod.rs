//! HTTP server startup with graceful shutdown.

mod error;
mod lifecycle;
mod shutdown;

use axum::Router;
pub use error::{Result, ServerError};
use tokio::net::TcpListener;

use crate::TRACING_TARGET_SERVER_STARTUP;
use crate::config::ServerConfig;

/// Binds to the configured address and serves `app` until a shutdown signal.
///
/// Returns once in-flight requests have completed.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the address cannot be
/// bound, or the server fails while running.
pub async fn serve(app: Router, config: &ServerConfig) -> Result<()> {
    config.validate().map_err(|e| ServerError::invalid_config(&e))?;

    let addr = config.server_addr();
    let listener = TcpListener::bind(addr).await.map_err(|source| {
        let error = ServerError::bind_error(&addr.to_string(), source);
        tracing::error!(
            target: TRACING_TARGET_SERVER_STARTUP,
            addr = %addr,
            error = %error,
            suggestion = error.suggestion(),
            "Failed to bind to address"
        );
        error
    })?;

    tracing::info!(
        target: TRACING_TARGET_SERVER_STARTUP,
        addr = %addr,
        "Server is ready and listening for connections"
    );

    let signal = shutdown::shutdown_signal(config.shutdown_timeout());
    lifecycle::serve_with_shutdown(config, || async move {
        axum::serve(listener, app).with_graceful_shutdown(signal).await
    })
    .await
    .map_err(ServerError::Runtime)
}
