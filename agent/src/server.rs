//! UDP request/response server.
//!
//! One datagram is handled to completion before the next is read:
//! `receive → decode → dispatch → encode → reply`. Malformed, oversized,
//! or unencodable exchanges are logged and dropped; the loop itself only
//! ends on shutdown.

use std::future::Future;
use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::dispatch::Dispatcher;
use crate::errors::AgentError;
use crate::protocol::{self, MAX_DATAGRAM};
use crate::scanner::probe::Prober;

/// Server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9991,
        }
    }
}

/// Bind the query socket and start serving.
///
/// Returns the bound address (useful with port 0) and the serve task's
/// handle. The task exits cleanly when `shutdown_signal` resolves.
pub async fn serve<P: Prober + 'static>(
    options: &ServerOptions,
    mut dispatcher: Dispatcher<P>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(SocketAddr, JoinHandle<Result<(), AgentError>>), AgentError> {
    let addr = format!("{}:{}", options.host, options.port);
    let socket = UdpSocket::bind(&addr)
        .await
        .map_err(|e| AgentError::ServerError(format!("cannot bind {}: {}", addr, e)))?;
    let local_addr = socket.local_addr()?;

    info!("Listening for queries on {}", local_addr);

    let handle = tokio::spawn(async move {
        tokio::pin!(shutdown_signal);

        // One extra byte so an over-cap datagram is detectable rather than
        // silently truncated at the cap.
        let mut buf = vec![0u8; MAX_DATAGRAM + 1];

        loop {
            let (len, peer) = tokio::select! {
                _ = &mut shutdown_signal => {
                    info!("Query server shutting down...");
                    return Ok(());
                }
                received = socket.recv_from(&mut buf) => match received {
                    Ok(received) => received,
                    Err(e) => {
                        warn!("Receive failed: {}", e);
                        continue;
                    }
                },
            };

            if len > MAX_DATAGRAM {
                warn!(
                    "Dropping oversized datagram from {} (over {} bytes)",
                    peer, MAX_DATAGRAM
                );
                continue;
            }

            let request = match protocol::decode_request(&buf[..len]) {
                Ok(request) => request,
                Err(e) => {
                    warn!("Dropping malformed datagram from {}: {}", peer, e);
                    continue;
                }
            };

            debug!(
                "Handling {} commands from {} (seq {})",
                request.commands.len(),
                peer,
                request.seq
            );

            let results = dispatcher.dispatch(&request.commands).await;

            let reply = match protocol::encode_response(request.seq, &results) {
                Ok(reply) => reply,
                Err(e) => {
                    error!("Cannot encode reply for {}: {}", peer, e);
                    continue;
                }
            };

            if let Err(e) = socket.send_to(&reply, peer).await {
                warn!("Failed to reply to {}: {}", peer, e);
            }
        }
    });

    Ok((local_addr, handle))
}
