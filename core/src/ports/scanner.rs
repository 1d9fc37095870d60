//! Port scanner port (interface).

use crate::domain::PortBinding;
use crate::error::Result;

/// Port for discovering which processes listen on a TCP port.
///
/// Implementations handle platform-specific details (lsof, ss, netstat).
pub trait PortScannerPort: Send + Sync {
    /// List every process currently listening on `port`.
    ///
    /// An empty list means the port is free.
    fn listeners(
        &self,
        port: u16,
    ) -> impl std::future::Future<Output = Result<Vec<PortBinding>>> + Send;
}
