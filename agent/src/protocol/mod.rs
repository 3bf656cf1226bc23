//! Wire protocol for the query exchange.
//!
//! A request is one datagram carrying an ordered batch of commands; the
//! reply carries one result payload per command, in the same order. The
//! envelopes are versioned and tagged with a request-scoped sequence id so
//! a client never pairs a stale reply with the wrong outstanding batch.
//! Everything is schema-validated JSON: a malformed datagram is a decode
//! error, nothing more.

use serde::{Deserialize, Serialize};

use crate::errors::AgentError;

/// Current wire format version. Bumped on any incompatible change.
pub const PROTOCOL_VERSION: u8 = 1;

/// Hard cap on a single datagram, request or reply. Anything larger is
/// rejected with an explicit error instead of being silently truncated
/// by the transport.
pub const MAX_DATAGRAM: usize = 60 * 1024;

/// The closed set of query categories a client can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandKind {
    Cpu,
    Memory,
    Disk,
    Network,
    Scanner,
    Process,
    DataUsage,
    System,
}

impl CommandKind {
    pub const ALL: [CommandKind; 8] = [
        CommandKind::Cpu,
        CommandKind::Memory,
        CommandKind::Disk,
        CommandKind::Network,
        CommandKind::Scanner,
        CommandKind::Process,
        CommandKind::DataUsage,
        CommandKind::System,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Cpu => "CPU",
            CommandKind::Memory => "MEMORY",
            CommandKind::Disk => "DISK",
            CommandKind::Network => "NETWORK",
            CommandKind::Scanner => "SCANNER",
            CommandKind::Process => "PROCESS",
            CommandKind::DataUsage => "DATA_USAGE",
            CommandKind::System => "SYSTEM",
        }
    }
}

impl std::str::FromStr for CommandKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "CPU" => Ok(CommandKind::Cpu),
            "MEMORY" => Ok(CommandKind::Memory),
            "DISK" => Ok(CommandKind::Disk),
            "NETWORK" => Ok(CommandKind::Network),
            "SCANNER" => Ok(CommandKind::Scanner),
            "PROCESS" => Ok(CommandKind::Process),
            "DATA_USAGE" => Ok(CommandKind::DataUsage),
            "SYSTEM" => Ok(CommandKind::System),
            _ => Err(format!("Unknown command kind: {}", s)),
        }
    }
}

/// One typed request for a category of system or network information.
///
/// A command has no identity of its own; its position within the batch is
/// the only correlation key between request and response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub kind: CommandKind,

    /// Kind-specific argument (SCANNER: reference IPv4, SYSTEM: path).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arg: Option<String>,
}

impl Command {
    pub fn new(kind: CommandKind) -> Self {
        Self { kind, arg: None }
    }

    pub fn with_arg(kind: CommandKind, arg: impl Into<String>) -> Self {
        Self {
            kind,
            arg: Some(arg.into()),
        }
    }
}

/// Outbound request envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub version: u8,
    pub seq: u64,
    pub commands: Vec<Command>,
}

/// Inbound response envelope. `seq` echoes the request it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub version: u8,
    pub seq: u64,
    pub results: Vec<ResultPayload>,
}

// ================================ PAYLOADS ================================ //

/// CPU identity and load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuReport {
    pub brand: String,
    pub arch: String,
    pub bits: u32,
    pub physical_cores: usize,
    pub logical_cores: usize,
    pub frequency_mhz: u64,
    pub max_frequency_mhz: u64,
    pub usage_per_core: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryReport {
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub used_bytes: u64,
    pub used_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskReport {
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub used_bytes: u64,
    pub used_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkReport {
    pub ip: String,
    pub interface: String,
    pub gateway: Option<String>,
    pub netmask: Option<String>,
}

/// State of one probed port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortState {
    Open,
    Closed,
    Filtered,
}

/// One row of a scan result: a bare host row (reachability only) or a
/// `(host, port, state)` row for a probed port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRow {
    pub host: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<PortState>,
}

impl ScanRow {
    pub fn host_only(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: None,
            state: None,
        }
    }

    pub fn port_row(host: impl Into<String>, port: u16, state: PortState) -> Self {
        Self {
            host: host.into(),
            port: Some(port),
            state: Some(state),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessRow {
    pub pid: u32,
    pub name: String,

    /// Thread count where the OS exposes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threads: Option<usize>,

    pub mem_percent: f32,
    pub cpu_percent: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceCounters {
    pub name: String,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub packets_sent: u64,
    pub packets_received: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRow {
    pub protocol: String,
    pub local_addr: String,
    pub remote_addr: String,
    pub state: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataUsageReport {
    pub interfaces: Vec<InterfaceCounters>,
    pub connections: Vec<ConnectionRow>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirEntryRow {
    pub name: String,
    pub kind: EntryKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

/// Stand-in payload for a command whose provider could not run at all.
/// Keeps the response batch the same length as the request batch while
/// staying distinguishable from "succeeded with empty data".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnavailableReport {
    pub requested: CommandKind,
    pub reason: String,
}

/// One result, tagged with the kind it answers so the client can validate
/// positional pairing on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultPayload {
    Cpu(CpuReport),
    Memory(MemoryReport),
    Disk(DiskReport),
    Network(NetworkReport),
    Scanner(Vec<ScanRow>),
    Process(Vec<ProcessRow>),
    DataUsage(DataUsageReport),
    System(Vec<DirEntryRow>),
    Unavailable(UnavailableReport),
}

impl ResultPayload {
    /// Whether this payload is a valid answer to a command of `kind`.
    pub fn answers(&self, kind: CommandKind) -> bool {
        match self {
            ResultPayload::Cpu(_) => kind == CommandKind::Cpu,
            ResultPayload::Memory(_) => kind == CommandKind::Memory,
            ResultPayload::Disk(_) => kind == CommandKind::Disk,
            ResultPayload::Network(_) => kind == CommandKind::Network,
            ResultPayload::Scanner(_) => kind == CommandKind::Scanner,
            ResultPayload::Process(_) => kind == CommandKind::Process,
            ResultPayload::DataUsage(_) => kind == CommandKind::DataUsage,
            ResultPayload::System(_) => kind == CommandKind::System,
            ResultPayload::Unavailable(report) => report.requested == kind,
        }
    }
}

/// A decoded result paired back to the command that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResult {
    pub command: Command,
    pub payload: ResultPayload,
}

// ================================= CODEC ================================= //

fn check_size(bytes: &[u8]) -> Result<(), AgentError> {
    if bytes.len() > MAX_DATAGRAM {
        return Err(AgentError::OversizedDatagram {
            size: bytes.len(),
            cap: MAX_DATAGRAM,
        });
    }
    Ok(())
}

fn check_version(version: u8) -> Result<(), AgentError> {
    if version != PROTOCOL_VERSION {
        return Err(AgentError::UnsupportedVersion(version));
    }
    Ok(())
}

/// Encode a command batch into one request datagram.
pub fn encode_request(seq: u64, commands: &[Command]) -> Result<Vec<u8>, AgentError> {
    let envelope = RequestEnvelope {
        version: PROTOCOL_VERSION,
        seq,
        commands: commands.to_vec(),
    };
    let bytes = serde_json::to_vec(&envelope)?;
    check_size(&bytes)?;
    Ok(bytes)
}

/// Decode a request datagram.
pub fn decode_request(bytes: &[u8]) -> Result<RequestEnvelope, AgentError> {
    check_size(bytes)?;
    let envelope: RequestEnvelope = serde_json::from_slice(bytes)?;
    check_version(envelope.version)?;
    Ok(envelope)
}

/// Encode a result batch into one reply datagram.
pub fn encode_response(seq: u64, results: &[ResultPayload]) -> Result<Vec<u8>, AgentError> {
    let envelope = ResponseEnvelope {
        version: PROTOCOL_VERSION,
        seq,
        results: results.to_vec(),
    };
    let bytes = serde_json::to_vec(&envelope)?;
    check_size(&bytes)?;
    Ok(bytes)
}

/// Decode a reply datagram against the batch that was sent.
///
/// The wire format carries no command identifiers; `results[i]` answers
/// `commands[i]`. The sequence id, batch length, and per-index payload
/// tags are all validated before anything is handed back.
pub fn decode_response(
    bytes: &[u8],
    sent_seq: u64,
    commands: &[Command],
) -> Result<Vec<CommandResult>, AgentError> {
    check_size(bytes)?;
    let envelope: ResponseEnvelope = serde_json::from_slice(bytes)?;
    check_version(envelope.version)?;

    if envelope.seq != sent_seq {
        return Err(AgentError::SeqMismatch {
            sent: sent_seq,
            received: envelope.seq,
        });
    }

    if envelope.results.len() != commands.len() {
        return Err(AgentError::ResultCountMismatch {
            commands: commands.len(),
            results: envelope.results.len(),
        });
    }

    let mut paired = Vec::with_capacity(commands.len());
    for (index, (command, payload)) in commands.iter().zip(envelope.results).enumerate() {
        if !payload.answers(command.kind) {
            return Err(AgentError::KindMismatch {
                index,
                expected: command.kind,
            });
        }
        paired.push(CommandResult {
            command: command.clone(),
            payload,
        });
    }

    Ok(paired)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_batch() -> Vec<Command> {
        vec![
            Command::new(CommandKind::Cpu),
            Command::new(CommandKind::Memory),
            Command::with_arg(CommandKind::Scanner, "10.0.0.5"),
            Command::with_arg(CommandKind::System, "/tmp"),
        ]
    }

    #[test]
    fn test_request_round_trip() {
        let commands = sample_batch();
        let bytes = encode_request(7, &commands).unwrap();
        let decoded = decode_request(&bytes).unwrap();

        assert_eq!(decoded.version, PROTOCOL_VERSION);
        assert_eq!(decoded.seq, 7);
        assert_eq!(decoded.commands, commands);
    }

    #[test]
    fn test_request_round_trip_all_kinds() {
        let commands: Vec<Command> = CommandKind::ALL.iter().map(|k| Command::new(*k)).collect();
        let bytes = encode_request(1, &commands).unwrap();
        assert_eq!(decode_request(&bytes).unwrap().commands, commands);
    }

    #[test]
    fn test_response_round_trip_and_pairing() {
        let commands = vec![
            Command::new(CommandKind::Memory),
            Command::with_arg(CommandKind::Scanner, "10.0.0.5"),
        ];
        let results = vec![
            ResultPayload::Memory(MemoryReport {
                total_bytes: 16,
                available_bytes: 8,
                used_bytes: 8,
                used_ratio: 0.5,
            }),
            ResultPayload::Scanner(vec![
                ScanRow::host_only("10.0.0.1"),
                ScanRow::port_row("10.0.0.1", 22, PortState::Open),
            ]),
        ];

        let bytes = encode_response(3, &results).unwrap();
        let paired = decode_response(&bytes, 3, &commands).unwrap();

        assert_eq!(paired.len(), 2);
        assert_eq!(paired[0].command.kind, CommandKind::Memory);
        assert_eq!(paired[0].payload, results[0]);
        assert_eq!(paired[1].command, commands[1]);
        assert_eq!(paired[1].payload, results[1]);
    }

    #[test]
    fn test_response_seq_mismatch_rejected() {
        let commands = vec![Command::new(CommandKind::Cpu)];
        let results = vec![ResultPayload::Unavailable(UnavailableReport {
            requested: CommandKind::Cpu,
            reason: "test".to_string(),
        })];
        let bytes = encode_response(9, &results).unwrap();

        let err = decode_response(&bytes, 4, &commands).unwrap_err();
        assert!(matches!(
            err,
            AgentError::SeqMismatch { sent: 4, received: 9 }
        ));
    }

    #[test]
    fn test_response_kind_mismatch_rejected() {
        let commands = vec![Command::new(CommandKind::Disk)];
        let results = vec![ResultPayload::Memory(MemoryReport {
            total_bytes: 1,
            available_bytes: 1,
            used_bytes: 0,
            used_ratio: 0.0,
        })];
        let bytes = encode_response(1, &results).unwrap();

        let err = decode_response(&bytes, 1, &commands).unwrap_err();
        assert!(matches!(
            err,
            AgentError::KindMismatch {
                index: 0,
                expected: CommandKind::Disk
            }
        ));
    }

    #[test]
    fn test_response_count_mismatch_rejected() {
        let commands = vec![Command::new(CommandKind::Cpu), Command::new(CommandKind::Memory)];
        let results = vec![ResultPayload::Unavailable(UnavailableReport {
            requested: CommandKind::Cpu,
            reason: "test".to_string(),
        })];
        let bytes = encode_response(1, &results).unwrap();

        let err = decode_response(&bytes, 1, &commands).unwrap_err();
        assert!(matches!(err, AgentError::ResultCountMismatch { .. }));
    }

    #[test]
    fn test_unavailable_answers_its_requested_kind() {
        let payload = ResultPayload::Unavailable(UnavailableReport {
            requested: CommandKind::Network,
            reason: "no default interface".to_string(),
        });
        assert!(payload.answers(CommandKind::Network));
        assert!(!payload.answers(CommandKind::Cpu));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut envelope = RequestEnvelope {
            version: PROTOCOL_VERSION,
            seq: 0,
            commands: vec![Command::new(CommandKind::Cpu)],
        };
        envelope.version = 99;
        let bytes = serde_json::to_vec(&envelope).unwrap();

        let err = decode_request(&bytes).unwrap_err();
        assert!(matches!(err, AgentError::UnsupportedVersion(99)));
    }

    #[test]
    fn test_garbage_is_a_decode_error() {
        assert!(matches!(
            decode_request(b"\x00\xffnot json"),
            Err(AgentError::JsonError(_))
        ));
    }

    #[test]
    fn test_oversized_encode_rejected() {
        let rows: Vec<DirEntryRow> = (0..4096)
            .map(|i| DirEntryRow {
                name: format!("entry-{i}-padding-padding-padding"),
                kind: EntryKind::File,
                size_bytes: Some(i as u64),
            })
            .collect();
        let results = vec![ResultPayload::System(rows)];

        let err = encode_response(1, &results).unwrap_err();
        assert!(matches!(err, AgentError::OversizedDatagram { .. }));
    }

    #[test]
    fn test_kind_wire_names_match_legacy() {
        for kind in CommandKind::ALL {
            let wire = serde_json::to_string(&kind).unwrap();
            assert_eq!(wire, format!("\"{}\"", kind.as_str()));
            let parsed: CommandKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }
}
