//! Health probe port (interface).

use crate::error::Result;

/// Port for checking whether a dependency is ready to serve traffic.
pub trait HealthProbePort: Send + Sync {
    /// Probe `url` once.
    ///
    /// `expect_status`, when set, must match the `status` field of a JSON
    /// response body. Any failure is reported as `Error::HealthCheckFailed`.
    fn probe(
        &self,
        url: &str,
        expect_status: Option<&str>,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}
