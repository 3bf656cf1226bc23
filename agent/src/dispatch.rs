//! Command dispatcher: maps each decoded command to its provider.
//!
//! One result per command, in request order. A provider that cannot run at
//! all yields an `UNAVAILABLE` payload and a log line; it is never silently
//! included as a wrong-shaped result and never aborts the rest of the
//! batch.

use std::net::Ipv4Addr;

use tracing::{debug, warn};

use crate::errors::AgentError;
use crate::metrics;
use crate::protocol::{Command, CommandKind, ResultPayload, UnavailableReport};
use crate::scanner::probe::{Prober, SystemProber};
use crate::scanner::{Scanner, ScannerOptions};

/// Server-side command dispatcher. Owns the scanner, and with it the
/// sweep-throttling state, for the life of the process.
pub struct Dispatcher<P: Prober> {
    scanner: Scanner<P>,
}

impl Dispatcher<SystemProber> {
    pub fn new(scanner_options: ScannerOptions) -> Self {
        Self {
            scanner: Scanner::new(scanner_options),
        }
    }
}

impl<P: Prober + 'static> Dispatcher<P> {
    pub fn with_scanner(scanner: Scanner<P>) -> Self {
        Self { scanner }
    }

    /// Execute a command batch, producing exactly one payload per command
    /// in batch order.
    pub async fn dispatch(&mut self, commands: &[Command]) -> Vec<ResultPayload> {
        let mut results = Vec::with_capacity(commands.len());
        for command in commands {
            debug!("Executing {} command", command.kind.as_str());
            let payload = match self.execute(command).await {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("{} provider unavailable: {}", command.kind.as_str(), e);
                    ResultPayload::Unavailable(UnavailableReport {
                        requested: command.kind,
                        reason: e.to_string(),
                    })
                }
            };
            results.push(payload);
        }
        results
    }

    async fn execute(&mut self, command: &Command) -> Result<ResultPayload, AgentError> {
        match command.kind {
            CommandKind::Cpu => Ok(ResultPayload::Cpu(metrics::cpu::collect())),
            CommandKind::Memory => Ok(ResultPayload::Memory(metrics::memory::collect())),
            CommandKind::Disk => metrics::disk::collect().map(ResultPayload::Disk),
            CommandKind::Network => metrics::network::collect().map(ResultPayload::Network),
            CommandKind::Scanner => {
                let reference_ip = scanner_reference_ip(command)?;
                Ok(ResultPayload::Scanner(
                    self.scanner.map_network(reference_ip).await,
                ))
            }
            CommandKind::Process => Ok(ResultPayload::Process(metrics::process::collect())),
            CommandKind::DataUsage => {
                Ok(ResultPayload::DataUsage(metrics::data_usage::collect()))
            }
            CommandKind::System => {
                metrics::system::collect(command.arg.as_deref()).map(ResultPayload::System)
            }
        }
    }
}

fn scanner_reference_ip(command: &Command) -> Result<Ipv4Addr, AgentError> {
    let arg = command.arg.as_deref().ok_or_else(|| {
        AgentError::ScanError("SCANNER requires a reference IPv4 argument".to_string())
    })?;
    arg.parse()
        .map_err(|_| AgentError::ScanError(format!("invalid reference IP: {}", arg)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::scanner::probe::testing::FakeProber;

    fn test_dispatcher() -> Dispatcher<FakeProber> {
        let prober = Arc::new(FakeProber::default());
        let scanner = Scanner::with_prober(prober, ScannerOptions::default());
        Dispatcher::with_scanner(scanner)
    }

    #[tokio::test]
    async fn test_one_result_per_command_in_order() {
        let mut dispatcher = test_dispatcher();
        let commands = vec![
            Command::new(CommandKind::Memory),
            Command::new(CommandKind::Cpu),
            Command::with_arg(CommandKind::Scanner, "10.0.0.5"),
            Command::with_arg(CommandKind::System, "."),
            Command::new(CommandKind::DataUsage),
        ];

        let results = dispatcher.dispatch(&commands).await;

        assert_eq!(results.len(), commands.len());
        for (command, payload) in commands.iter().zip(&results) {
            assert!(
                payload.answers(command.kind),
                "result for {:?} has wrong shape",
                command.kind
            );
        }
        // Warm-up scanner call serves the empty cache, as a real result.
        assert_eq!(results[2], ResultPayload::Scanner(Vec::new()));
    }

    #[tokio::test]
    async fn test_bad_scanner_argument_is_unavailable() {
        let mut dispatcher = test_dispatcher();
        let commands = vec![
            Command::with_arg(CommandKind::Scanner, "not-an-ip"),
            Command::new(CommandKind::Scanner),
            Command::new(CommandKind::Memory),
        ];

        let results = dispatcher.dispatch(&commands).await;

        assert_eq!(results.len(), 3);
        assert!(matches!(
            &results[0],
            ResultPayload::Unavailable(report) if report.requested == CommandKind::Scanner
        ));
        assert!(matches!(&results[1], ResultPayload::Unavailable(_)));
        // The failing commands do not abort the rest of the batch.
        assert!(matches!(&results[2], ResultPayload::Memory(_)));
    }

    #[tokio::test]
    async fn test_unlistable_path_is_unavailable() {
        let mut dispatcher = test_dispatcher();
        let commands = vec![Command::with_arg(CommandKind::System, "/no/such/directory")];

        let results = dispatcher.dispatch(&commands).await;
        assert!(matches!(
            &results[0],
            ResultPayload::Unavailable(report) if report.requested == CommandKind::System
        ));
    }
}
