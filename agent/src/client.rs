//! Thin query client.
//!
//! Sends one command batch per datagram and pairs the reply back to it.
//! The receive wait is bounded; attempts are retried with exponential
//! backoff, and exhausting them is a distinct "no response" error so a
//! silent server is never confused with an empty result.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tracing::debug;

use crate::errors::AgentError;
use crate::protocol::{self, Command, CommandResult, MAX_DATAGRAM};
use crate::utils::{calc_exp_backoff, CooldownOptions};

/// Client options
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// How long to wait for a reply per attempt
    pub recv_timeout: Duration,

    /// Send attempts before giving up
    pub max_attempts: u32,

    /// Backoff between attempts
    pub cooldown: CooldownOptions,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            recv_timeout: Duration::from_secs(2),
            max_attempts: 3,
            cooldown: CooldownOptions::default(),
        }
    }
}

/// UDP query client. The socket is created at construction and owned for
/// the client's lifetime; the sequence counter scopes replies to the
/// request that produced them.
pub struct Client {
    socket: UdpSocket,
    server: SocketAddr,
    seq: u64,
    options: ClientOptions,
}

impl Client {
    pub async fn connect(server: SocketAddr, options: ClientOptions) -> Result<Self, AgentError> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        Ok(Self {
            socket,
            server,
            seq: 0,
            options,
        })
    }

    /// Send one command batch and wait for the paired reply.
    pub async fn query(&mut self, commands: &[Command]) -> Result<Vec<CommandResult>, AgentError> {
        self.seq += 1;
        let seq = self.seq;
        let request = protocol::encode_request(seq, commands)?;
        let mut buf = vec![0u8; MAX_DATAGRAM + 1];

        for attempt in 0..self.options.max_attempts {
            if attempt > 0 {
                let wait = calc_exp_backoff(&self.options.cooldown, attempt - 1);
                debug!("No reply yet, retrying in {:?} (attempt {})", wait, attempt + 1);
                tokio::time::sleep(wait).await;
            }

            self.socket.send_to(&request, self.server).await?;

            let deadline = Instant::now() + self.options.recv_timeout;
            loop {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    break;
                }

                let (len, peer) =
                    match tokio::time::timeout(remaining, self.socket.recv_from(&mut buf)).await {
                        Ok(Ok(received)) => received,
                        Ok(Err(e)) => return Err(e.into()),
                        Err(_) => break,
                    };

                if peer != self.server {
                    debug!("Ignoring datagram from unexpected peer {}", peer);
                    continue;
                }

                match protocol::decode_response(&buf[..len], seq, commands) {
                    Ok(results) => return Ok(results),
                    // A stale reply to an earlier request; keep waiting.
                    Err(AgentError::SeqMismatch { received, .. }) => {
                        debug!("Ignoring stale reply with seq {}", received);
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Err(AgentError::NoResponse(self.server))
    }
}
