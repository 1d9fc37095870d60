//! Shutdown signal listener.

use portlaunch_core::ShutdownSignal;

/// Resolve on the first SIGINT or SIGTERM.
///
/// If the SIGTERM handler cannot be installed only Ctrl-C is honoured.
pub async fn shutdown_signal() -> ShutdownSignal {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(signal) => signal,
            Err(e) => {
                tracing::warn!(error = %e, "Cannot listen for SIGTERM");
                return interrupt().await;
            }
        };

        tokio::select! {
            signal = interrupt() => signal,
            _ = sigterm.recv() => ShutdownSignal::Terminate,
        }
    }

    #[cfg(not(unix))]
    {
        interrupt().await
    }
}

async fn interrupt() -> ShutdownSignal {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    ShutdownSignal::Interrupt
}
