//! Throttled /24 subnet scanner.
//!
//! Discovers live hosts on the /24 containing a reference address and, for
//! each live host, probes a small fixed port set. A full sweep is expensive
//! (hundreds of probes), so an invocation counter gates how often one
//! actually runs; every other call serves the cached result of the last
//! sweep. The cache is replaced wholesale on each sweep.

pub mod probe;

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use ipnet::Ipv4Net;
use tracing::{debug, info, warn};

use crate::errors::AgentError;
use crate::pool;
use crate::protocol::{PortState, ScanRow};
use crate::scanner::probe::{Prober, SystemProber};

/// Calls between sweeps once the scanner is warmed up.
pub const INTERVAL_UPDATE: u64 = 2000;

/// The call on which the first real sweep runs; earlier calls serve the
/// (initially empty) cache so a freshly started server is not immediately
/// pinned down by a full sweep.
pub const FIRST_SWEEP_CALL: u64 = 10;

/// Ports probed on each live host.
pub const PROBE_PORTS: &[u16] = &[22, 80, 443];

/// One worker per candidate host by default.
pub const DEFAULT_WORKER_COUNT: usize = 255;

/// Scanner configuration
#[derive(Debug, Clone)]
pub struct ScannerOptions {
    /// Concurrent probe workers per sweep
    pub worker_count: usize,

    /// Ports probed on each live host
    pub probe_ports: Vec<u16>,

    /// Reachability probe timeout
    pub ping_timeout: std::time::Duration,

    /// Per-port connect timeout
    pub port_timeout: std::time::Duration,
}

impl Default for ScannerOptions {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKER_COUNT,
            probe_ports: PROBE_PORTS.to_vec(),
            ping_timeout: std::time::Duration::from_secs(1),
            port_timeout: std::time::Duration::from_millis(500),
        }
    }
}

/// Subnet scanner state: the invocation counter and the cached rows of the
/// last sweep. Owned by a single dispatcher; not shared.
pub struct Scanner<P: Prober> {
    prober: Arc<P>,
    options: ScannerOptions,
    calls: u64,
    cached: Vec<ScanRow>,
    last_sweep_at: Option<DateTime<Utc>>,
}

impl Scanner<SystemProber> {
    pub fn new(options: ScannerOptions) -> Self {
        let prober = SystemProber {
            ping_timeout: options.ping_timeout,
            port_timeout: options.port_timeout,
        };
        Self::with_prober(Arc::new(prober), options)
    }
}

impl<P: Prober + 'static> Scanner<P> {
    pub fn with_prober(prober: Arc<P>, options: ScannerOptions) -> Self {
        Self {
            prober,
            options,
            calls: 0,
            cached: Vec::new(),
            last_sweep_at: None,
        }
    }

    /// How many times `map_network` has been invoked.
    pub fn calls(&self) -> u64 {
        self.calls
    }

    /// When the last sweep completed, if one has run.
    pub fn last_sweep_at(&self) -> Option<DateTime<Utc>> {
        self.last_sweep_at
    }

    /// Map the /24 around `reference_ip`.
    ///
    /// Most calls return the cached result of the last sweep; see
    /// [`FIRST_SWEEP_CALL`] and [`INTERVAL_UPDATE`] for when a real sweep
    /// runs. Stale results between sweeps are intentional: the cost of a
    /// sweep is amortized against a polling client.
    pub async fn map_network(&mut self, reference_ip: Ipv4Addr) -> Vec<ScanRow> {
        self.calls += 1;

        if self.should_sweep() {
            match self.sweep(reference_ip).await {
                Ok(rows) => {
                    self.cached = rows;
                    self.last_sweep_at = Some(Utc::now());
                }
                Err(e) => {
                    warn!("Sweep failed, serving previous result: {}", e);
                }
            }
        } else {
            debug!(
                "Serving cached scan result (call {}, {} rows)",
                self.calls,
                self.cached.len()
            );
        }

        self.cached.clone()
    }

    fn should_sweep(&self) -> bool {
        self.calls == FIRST_SWEEP_CALL
            || (self.calls > FIRST_SWEEP_CALL
                && (self.calls - FIRST_SWEEP_CALL) % INTERVAL_UPDATE == 0)
    }

    async fn sweep(&self, reference_ip: Ipv4Addr) -> Result<Vec<ScanRow>, AgentError> {
        let net = Ipv4Net::new(reference_ip, 24)
            .map_err(|e| AgentError::ScanError(e.to_string()))?;
        let [a, b, c, _] = net.network().octets();
        let targets: Vec<Ipv4Addr> = (0..=254).map(|host| Ipv4Addr::new(a, b, c, host)).collect();

        info!(
            "Sweeping {} ({} targets, {} workers)",
            net.trunc(),
            targets.len(),
            self.options.worker_count
        );
        let started = Instant::now();

        let prober = Arc::clone(&self.prober);
        let mut live = pool::run(targets, self.options.worker_count, move |ip| {
            let prober = Arc::clone(&prober);
            async move { prober.ping(ip).await.then_some(ip) }
        })
        .await?;
        // Pool results arrive in completion order; sort for stable output.
        live.sort_unstable();

        let port_jobs: Vec<(Ipv4Addr, u16)> = live
            .iter()
            .flat_map(|host| self.options.probe_ports.iter().map(|port| (*host, *port)))
            .collect();

        let prober = Arc::clone(&self.prober);
        let port_results = pool::run(port_jobs, self.options.worker_count, move |(host, port)| {
            let prober = Arc::clone(&prober);
            async move {
                let state = prober.probe_port(host, port).await;
                Some((host, port, state))
            }
        })
        .await?;

        let mut ports_by_host: HashMap<Ipv4Addr, Vec<(u16, PortState)>> = HashMap::new();
        for (host, port, state) in port_results {
            ports_by_host.entry(host).or_default().push((port, state));
        }

        let mut rows = Vec::new();
        for host in &live {
            rows.push(ScanRow::host_only(host.to_string()));
            if let Some(ports) = ports_by_host.get_mut(host) {
                ports.sort_unstable_by_key(|(port, _)| *port);
                for (port, state) in ports.iter() {
                    rows.push(ScanRow::port_row(host.to_string(), *port, *state));
                }
            }
        }

        info!(
            "Sweep finished in {:?}: {} live hosts",
            started.elapsed(),
            live.len()
        );
        Ok(rows)
    }
}
