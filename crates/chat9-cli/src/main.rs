#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod server;

use std::process;

use anyhow::Context;
use axum::Router;
use chat9_server::handler::{RouterFilesExt, fallback, routes};
use chat9_server::middleware::{
    RouterObservabilityExt, RouterOpenApiExt, RouterRecoveryExt, RouterSecurityExt,
    SecurityHeadersConfig,
};
use chat9_server::service::ServiceState;

use crate::config::{Cli, MiddlewareConfig};
use crate::server::ServerError;

// Tracing target constants
pub const TRACING_TARGET_SERVER_STARTUP: &str = "chat9_cli::server::startup";
pub const TRACING_TARGET_SERVER_SHUTDOWN: &str = "chat9_cli::server::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "chat9_cli::config";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::info!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            "Application terminated successfully"
        );
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        let server_error = error.downcast_ref::<ServerError>();
        tracing::error!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            error = %format!("{error:#}"),
            code = server_error.map(ServerError::error_code),
            suggestion = server_error.and_then(ServerError::suggestion),
            "Application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();
    cli.telemetry.init_tracing()?;

    tracing::info!(
        target: TRACING_TARGET_SERVER_STARTUP,
        version = env!("CARGO_PKG_VERSION"),
        "Starting chat9 server"
    );

    cli.log();
    cli.validate()?;

    let engines = cli
        .engine
        .build_service()
        .context("failed to create the chat engine service")?;
    let state = ServiceState::new(cli.service.clone(), engines)
        .await
        .context("failed to create service state")?;

    let post_processor = state.post_processor.clone();
    let router = create_router(state, &cli.middleware);

    server::serve(router, &cli.server).await?;

    if !post_processor.shutdown(cli.server.shutdown_timeout()).await {
        tracing::warn!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            pending = post_processor.pending(),
            "Background downloads did not finish before the shutdown timeout"
        );
    }

    Ok(())
}

/// Creates the router with all middleware layers applied.
///
/// Middleware is applied in reverse order (last added = outermost):
/// 1. Recovery (outermost) - catches panics and enforces timeouts
/// 2. Observability - request IDs and tracing spans
/// 3. Security - CORS, security headers, compression
/// 4. Routes (innermost) - chat API, static files and documentation
fn create_router(state: ServiceState, middleware: &MiddlewareConfig) -> Router {
    let files = state.file_server.clone();

    routes()
        .with_open_api(middleware.openapi.clone())
        .with_static_files(&files)
        .fallback(fallback)
        .with_state(state)
        .with_security(&middleware.cors, &SecurityHeadersConfig::default())
        .with_observability()
        .with_recovery(&middleware.recovery)
}
