//! Per-interface traffic counters and the open-connection table

use sysinfo::Networks;

use crate::protocol::{ConnectionRow, DataUsageReport, InterfaceCounters};

/// Collect traffic counters for every interface plus the current TCP
/// connection table (Linux only; empty elsewhere).
pub fn collect() -> DataUsageReport {
    let networks = Networks::new_with_refreshed_list();

    let mut interfaces: Vec<InterfaceCounters> = networks
        .iter()
        .map(|(name, data)| InterfaceCounters {
            name: name.clone(),
            bytes_sent: data.total_transmitted(),
            bytes_received: data.total_received(),
            packets_sent: data.total_packets_transmitted(),
            packets_received: data.total_packets_received(),
        })
        .collect();
    interfaces.sort_by(|a, b| a.name.cmp(&b.name));

    DataUsageReport {
        interfaces,
        connections: connections(),
    }
}

#[cfg(target_os = "linux")]
fn connections() -> Vec<ConnectionRow> {
    let mut rows = Vec::new();
    for (path, protocol) in [("/proc/net/tcp", "tcp"), ("/proc/net/tcp6", "tcp6")] {
        // A missing or unreadable table is a transient absence, not an error.
        let Ok(table) = std::fs::read_to_string(path) else {
            continue;
        };
        for line in table.lines().skip(1) {
            if let Some(row) = parse_proc_tcp_line(line, protocol) {
                rows.push(row);
            }
        }
    }
    rows
}

#[cfg(not(target_os = "linux"))]
fn connections() -> Vec<ConnectionRow> {
    Vec::new()
}

/// Parse one `/proc/net/tcp[6]` row into a connection entry.
///
/// Addresses are hex-encoded native-endian words, `<addr>:<port>`; the
/// state column is a hex code from `include/net/tcp_states.h`.
fn parse_proc_tcp_line(line: &str, protocol: &str) -> Option<ConnectionRow> {
    let mut fields = line.split_whitespace();
    let _slot = fields.next()?;
    let local = fields.next()?;
    let remote = fields.next()?;
    let state = fields.next()?;

    Some(ConnectionRow {
        protocol: protocol.to_string(),
        local_addr: parse_hex_addr(local)?,
        remote_addr: parse_hex_addr(remote)?,
        state: tcp_state_name(state).to_string(),
    })
}

fn parse_hex_addr(field: &str) -> Option<String> {
    let (addr, port) = field.split_once(':')?;
    let port = u16::from_str_radix(port, 16).ok()?;

    match addr.len() {
        8 => {
            let raw = u32::from_str_radix(addr, 16).ok()?;
            let ip = std::net::Ipv4Addr::from(raw.swap_bytes());
            Some(format!("{}:{}", ip, port))
        }
        32 => {
            // Four native-endian 32-bit groups.
            let mut value: u128 = 0;
            for i in 0..4 {
                let group = u32::from_str_radix(&addr[i * 8..(i + 1) * 8], 16).ok()?;
                value = (value << 32) | group.swap_bytes() as u128;
            }
            let ip = std::net::Ipv6Addr::from(value);
            Some(format!("[{}]:{}", ip, port))
        }
        _ => None,
    }
}

fn tcp_state_name(code: &str) -> &'static str {
    match code {
        "01" => "ESTABLISHED",
        "02" => "SYN_SENT",
        "03" => "SYN_RECV",
        "04" => "FIN_WAIT1",
        "05" => "FIN_WAIT2",
        "06" => "TIME_WAIT",
        "07" => "CLOSE",
        "08" => "CLOSE_WAIT",
        "09" => "LAST_ACK",
        "0A" => "LISTEN",
        "0B" => "CLOSING",
        _ => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_proc_tcp_line() {
        let line = "   0: 0100007F:1F90 00000000:0000 0A 00000000:00000000 \
                    00:00000000 00000000  1000        0 12345 1 0000000000000000 \
                    100 0 0 10 0";
        let row = parse_proc_tcp_line(line, "tcp").unwrap();

        assert_eq!(row.protocol, "tcp");
        assert_eq!(row.local_addr, "127.0.0.1:8080");
        assert_eq!(row.remote_addr, "0.0.0.0:0");
        assert_eq!(row.state, "LISTEN");
    }

    #[test]
    fn test_parse_proc_tcp6_loopback() {
        let field = "00000000000000000000000001000000:0050";
        assert_eq!(parse_hex_addr(field).unwrap(), "[::1]:80");
    }

    #[test]
    fn test_unparsable_line_is_skipped() {
        assert!(parse_proc_tcp_line("sl local rem st", "tcp").is_none());
        assert!(parse_proc_tcp_line("", "tcp").is_none());
    }

    #[test]
    fn test_collect_lists_interfaces() {
        // Counter values are environment-dependent; only the shape is stable.
        let report = collect();
        for window in report.interfaces.windows(2) {
            assert!(window[0].name <= window[1].name);
        }
    }
}
