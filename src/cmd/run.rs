//! `mcpo-guard run` — start the HTTP server.
//!
//! Initializes logging, builds the router with the context-stamping
//! middleware stack, and serves until SIGTERM / Ctrl+C.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::RunArgs;
use crate::error::McpoError;
use crate::logging;
use crate::server::{self, AppState, ServerSettings};

pub async fn execute(args: RunArgs) -> Result<(), McpoError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    let settings = ServerSettings {
        max_body: args.max_body,
        timeout: Duration::from_millis(args.timeout),
    };
    let router = server::build_router(Arc::new(AppState::new()), settings);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        timeout_ms = args.timeout,
        max_body = args.max_body,
        "mcpo-guard started"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(server::shutdown_signal())
        .await?;

    tracing::info!("mcpo-guard stopped");
    Ok(())
}
