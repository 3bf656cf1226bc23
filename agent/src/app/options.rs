//! Application configuration options

use crate::scanner::ScannerOptions;
use crate::server::ServerOptions;

/// Main application options
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    /// Query server configuration
    pub server: ServerOptions,

    /// Subnet scanner configuration
    pub scanner: ScannerOptions,
}
