//! Main application run loop

use std::future::Future;

use tracing::info;

use crate::app::options::AppOptions;
use crate::dispatch::Dispatcher;
use crate::errors::AgentError;
use crate::server::serve;

/// Run the vigil agent until the shutdown signal resolves.
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), AgentError> {
    info!("Initializing vigil agent...");

    let dispatcher = Dispatcher::new(options.scanner.clone());
    let (_, server_handle) = serve(&options.server, dispatcher, shutdown_signal).await?;

    server_handle
        .await
        .map_err(|e| AgentError::ServerError(e.to_string()))??;

    info!("Shutdown complete");
    Ok(())
}
