//! Port scanner adapters.
//!
//! Listeners are discovered with the first inspection utility that is
//! installed: `lsof` (socket inspection), then `ss` on Linux, then `netstat`.
//! A utility that runs is authoritative; later ones are only consulted when
//! the earlier ones are missing.

mod lsof;
mod netstat;
#[cfg(target_os = "linux")]
mod ss;
mod utils;

use crate::domain::PortBinding;
use crate::error::{Error, Result};
use crate::ports::PortScannerPort;

pub use lsof::LsofScanner;
pub use netstat::NetstatScanner;
#[cfg(target_os = "linux")]
pub use ss::SsScanner;

/// One inspection utility in the fallback chain.
enum Backend {
    Lsof(LsofScanner),
    #[cfg(target_os = "linux")]
    Ss(SsScanner),
    Netstat(NetstatScanner),
}

impl Backend {
    fn name(&self) -> &'static str {
        match self {
            Backend::Lsof(s) => s.name(),
            #[cfg(target_os = "linux")]
            Backend::Ss(s) => s.name(),
            Backend::Netstat(s) => s.name(),
        }
    }

    async fn listeners(&self, port: u16) -> Result<Option<Vec<PortBinding>>> {
        match self {
            Backend::Lsof(s) => s.listeners(port).await,
            #[cfg(target_os = "linux")]
            Backend::Ss(s) => s.listeners(port).await,
            Backend::Netstat(s) => s.listeners(port).await,
        }
    }
}

/// The main port scanner that walks the platform's fallback chain.
pub struct PortScanner {
    backends: Vec<Backend>,
}

impl PortScanner {
    /// Create a new port scanner for the current platform.
    pub fn new() -> Self {
        let mut backends = Vec::new();

        #[cfg(not(target_os = "windows"))]
        backends.push(Backend::Lsof(LsofScanner::new()));

        #[cfg(target_os = "linux")]
        match SsScanner::new() {
            Ok(ss) => backends.push(Backend::Ss(ss)),
            Err(e) => tracing::warn!(error = %e, "ss scanner disabled"),
        }

        backends.push(Backend::Netstat(NetstatScanner::new()));

        Self { backends }
    }

    /// Names of the utilities tried, in order.
    pub fn chain(&self) -> Vec<&'static str> {
        self.backends.iter().map(Backend::name).collect()
    }

    /// List every process listening on `port`.
    pub async fn listeners(&self, port: u16) -> Result<Vec<PortBinding>> {
        for backend in &self.backends {
            if let Some(bindings) = backend.listeners(port).await? {
                tracing::debug!(
                    port,
                    scanner = backend.name(),
                    count = bindings.len(),
                    "Port scan complete"
                );
                return Ok(bindings);
            }
        }

        Err(Error::NoScanner(self.chain().join(", ")))
    }
}

impl Default for PortScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl PortScannerPort for PortScanner {
    async fn listeners(&self, port: u16) -> Result<Vec<PortBinding>> {
        PortScanner::listeners(self, port).await
    }
}

/// Internal trait for utility-specific implementations.
///
/// `Ok(None)` means the utility is not installed.
trait Scanner: Send + Sync {
    fn name(&self) -> &'static str;

    fn listeners(
        &self,
        port: u16,
    ) -> impl std::future::Future<Output = Result<Option<Vec<PortBinding>>>> + Send;
}
