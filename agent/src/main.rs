//! Vigil Agent - Entry Point
//!
//! A small remote system monitor: run with `--serve` (the default) on the
//! host to watch, query it from anywhere with `--query=CPU,MEMORY,...`.

use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;

use colored::Colorize;
use tracing::{error, info};

use vigil_agent::app::options::AppOptions;
use vigil_agent::app::run::run;
use vigil_agent::client::{Client, ClientOptions};
use vigil_agent::logs::{init_logging, LogOptions};
use vigil_agent::protocol::{Command, CommandKind, CommandResult, ResultPayload};
use vigil_agent::scanner::ScannerOptions;
use vigil_agent::server::ServerOptions;
use vigil_agent::utils::version_info;

/// Rows shown per tabular result before eliding the rest.
const DISPLAY_ROWS: usize = 10;

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        println!(
            "{}",
            serde_json::to_string_pretty(&version_info()).unwrap()
        );
        return;
    }

    // Initialize logging
    let log_options = LogOptions {
        log_level: cli_args
            .get("log-level")
            .and_then(|level| level.parse().ok())
            .unwrap_or_default(),
        ..Default::default()
    };
    if let Err(e) = init_logging(log_options) {
        println!("Failed to initialize logging: {e}");
    }

    if let Some(query) = cli_args.get("query") {
        run_query(query, &cli_args).await;
    } else {
        run_server(&cli_args).await;
    }
}

async fn run_server(cli_args: &HashMap<String, String>) {
    let mut options = AppOptions {
        server: ServerOptions::default(),
        scanner: ScannerOptions::default(),
    };
    if let Some(host) = cli_args.get("host") {
        options.server.host = host.clone();
    }
    if let Some(port) = cli_args.get("port").and_then(|port| port.parse().ok()) {
        options.server.port = port;
    }
    if let Some(workers) = cli_args
        .get("scan-workers")
        .and_then(|workers| workers.parse().ok())
    {
        options.scanner.worker_count = workers;
    }

    info!("Running vigil agent with options: {:?}", options);
    if let Err(e) = run(options, await_shutdown_signal()).await {
        error!("Failed to run the agent: {e}");
    }
}

async fn run_query(query: &str, cli_args: &HashMap<String, String>) {
    let server: SocketAddr = match cli_args
        .get("server")
        .map(String::as_str)
        .unwrap_or("127.0.0.1:9991")
        .parse()
    {
        Ok(addr) => addr,
        Err(e) => {
            error!("Invalid --server address: {e}");
            return;
        }
    };

    let mut commands = Vec::new();
    for name in query.split(',').filter(|name| !name.is_empty()) {
        let kind: CommandKind = match name.parse() {
            Ok(kind) => kind,
            Err(e) => {
                error!("{e}");
                return;
            }
        };
        commands.push(match kind {
            // The scan is anchored on the server's own address unless a
            // reference IP is given explicitly.
            CommandKind::Scanner => {
                let reference = cli_args
                    .get("scan-ip")
                    .cloned()
                    .unwrap_or_else(|| server.ip().to_string());
                Command::with_arg(kind, reference)
            }
            CommandKind::System => match cli_args.get("path") {
                Some(path) => Command::with_arg(kind, path.clone()),
                None => Command::new(kind),
            },
            _ => Command::new(kind),
        });
    }
    if commands.is_empty() {
        error!("--query needs at least one command kind");
        return;
    }

    let mut client = match Client::connect(server, ClientOptions::default()).await {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to create client: {e}");
            return;
        }
    };

    match client.query(&commands).await {
        Ok(results) => {
            for result in &results {
                render_result(result);
            }
        }
        Err(e) => error!("Query failed: {e}"),
    }
}

fn render_result(result: &CommandResult) {
    println!("{}", result.command.kind.as_str().bold().cyan());

    match &result.payload {
        ResultPayload::Scanner(rows) => render_rows(rows),
        ResultPayload::Process(rows) => render_rows(rows),
        ResultPayload::System(rows) => render_rows(rows),
        ResultPayload::Unavailable(report) => {
            println!("  {} {}", "unavailable:".red(), report.reason);
        }
        payload => match serde_json::to_string_pretty(payload) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => println!("  {} {}", "render error:".red(), e),
        },
    }
    println!();
}

fn render_rows<T: serde::Serialize>(rows: &[T]) {
    for row in rows.iter().take(DISPLAY_ROWS) {
        match serde_json::to_string(row) {
            Ok(rendered) => println!("  {rendered}"),
            Err(e) => println!("  {} {}", "render error:".red(), e),
        }
    }
    if rows.len() > DISPLAY_ROWS {
        println!("  ... {} more rows", rows.len() - DISPLAY_ROWS);
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).unwrap();
        let mut sigint = signal(SignalKind::interrupt()).unwrap();

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        info!("Ctrl+C received, shutting down...");
    }
}
