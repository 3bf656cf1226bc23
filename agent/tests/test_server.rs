//! End-to-end tests over a loopback UDP exchange

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tokio::sync::oneshot;

use vigil_agent::client::{Client, ClientOptions};
use vigil_agent::dispatch::Dispatcher;
use vigil_agent::protocol::{Command, CommandKind, ResultPayload};
use vigil_agent::scanner::ScannerOptions;
use vigil_agent::server::{serve, ServerOptions};

/// Start a server on an ephemeral loopback port.
async fn start_server() -> (SocketAddr, oneshot::Sender<()>) {
    let options = ServerOptions {
        host: "127.0.0.1".to_string(),
        port: 0,
    };
    let dispatcher = Dispatcher::new(ScannerOptions::default());
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    let (addr, _handle) = serve(&options, dispatcher, async move {
        let _ = shutdown_rx.await;
    })
    .await
    .expect("server failed to start");

    (addr, shutdown_tx)
}

#[tokio::test]
async fn test_query_round_trip() {
    let (addr, _shutdown) = start_server().await;
    let mut client = Client::connect(addr, ClientOptions::default())
        .await
        .unwrap();

    let commands = vec![
        Command::new(CommandKind::Memory),
        Command::new(CommandKind::Cpu),
        Command::with_arg(CommandKind::System, "."),
    ];
    let results = client.query(&commands).await.unwrap();

    assert_eq!(results.len(), 3);
    match &results[0].payload {
        ResultPayload::Memory(report) => assert!(report.total_bytes > 0),
        other => panic!("expected memory report, got {:?}", other),
    }
    match &results[1].payload {
        ResultPayload::Cpu(report) => assert!(report.logical_cores > 0),
        other => panic!("expected cpu report, got {:?}", other),
    }
    assert!(matches!(&results[2].payload, ResultPayload::System(_)));
}

#[tokio::test]
async fn test_malformed_datagram_does_not_kill_server() {
    let (addr, _shutdown) = start_server().await;

    // Garbage first; the server must drop it and keep listening.
    let raw = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    raw.send_to(b"\x00\xffdefinitely not a request", addr)
        .await
        .unwrap();

    let mut client = Client::connect(addr, ClientOptions::default())
        .await
        .unwrap();
    let commands = vec![Command::new(CommandKind::Memory)];
    let results = client.query(&commands).await.unwrap();

    assert_eq!(results.len(), 1);
    assert!(matches!(&results[0].payload, ResultPayload::Memory(_)));
}

#[tokio::test]
async fn test_scanner_warmup_serves_empty_result() {
    let (addr, _shutdown) = start_server().await;
    let mut client = Client::connect(addr, ClientOptions::default())
        .await
        .unwrap();

    // During warm-up the scanner serves its cache without probing, so this
    // round trip is fast and deterministic.
    let commands = vec![Command::with_arg(CommandKind::Scanner, "127.0.0.1")];
    let results = client.query(&commands).await.unwrap();

    assert_eq!(results.len(), 1);
    match &results[0].payload {
        ResultPayload::Scanner(rows) => assert!(rows.is_empty()),
        other => panic!("expected scanner rows, got {:?}", other),
    }
}

#[tokio::test]
async fn test_consecutive_queries_use_fresh_sequence_ids() {
    let (addr, _shutdown) = start_server().await;
    let mut client = Client::connect(addr, ClientOptions::default())
        .await
        .unwrap();

    let commands = vec![Command::new(CommandKind::Disk)];
    for _ in 0..3 {
        let results = client.query(&commands).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].payload.answers(CommandKind::Disk));
    }
}
