//! Local network identity: default interface, address, gateway, netmask

use crate::errors::AgentError;
use crate::protocol::NetworkReport;

/// Collect the default interface's identity.
pub fn collect() -> Result<NetworkReport, AgentError> {
    let interface = default_net::get_default_interface()
        .map_err(|e| AgentError::Unavailable(format!("no default interface: {}", e)))?;

    let ipv4 = interface
        .ipv4
        .first()
        .ok_or_else(|| AgentError::Unavailable("default interface has no IPv4 address".to_string()))?;

    Ok(NetworkReport {
        ip: ipv4.addr.to_string(),
        interface: interface.name,
        gateway: interface.gateway.map(|gateway| gateway.ip_addr.to_string()),
        netmask: Some(ipv4.netmask.to_string()),
    })
}
