//! Stale listener cleanup.

use tokio::time::sleep;
use tracing::{info, warn};

use crate::domain::{owner_pids, CleanupOutcome, CleanupPolicy, CleanupReport};
use crate::error::Result;
use crate::ports::{PortScannerPort, ProcessKillerPort};

/// Frees ports from stale listeners before a service is started.
///
/// Processes are matched by port occupancy only. Whatever listens on the
/// port is killed, whether or not an earlier launch started it.
pub struct PortCleaner<S: PortScannerPort, K: ProcessKillerPort> {
    scanner: S,
    killer: K,
}

impl<S: PortScannerPort, K: ProcessKillerPort> PortCleaner<S, K> {
    /// Create a cleaner from a scanner and a killer.
    pub fn new(scanner: S, killer: K) -> Self {
        Self { scanner, killer }
    }

    /// Force-kill every listener on `port`, pause, and re-check.
    ///
    /// Runs at most `policy.max_attempts` kill rounds. A port that is still
    /// occupied afterwards is reported as `StillOccupied` with a warning; it
    /// is never an error. Scanner failures are errors.
    pub async fn ensure_port_free(
        &self,
        port: u16,
        service_name: &str,
        policy: &CleanupPolicy,
    ) -> Result<CleanupReport> {
        let mut report = CleanupReport {
            port,
            service_name: service_name.to_string(),
            killed: Vec::new(),
            attempts: 0,
            outcome: CleanupOutcome::AlreadyFree,
        };

        let mut pids = self.stale_pids(port).await?;
        if pids.is_empty() {
            info!(port, service = service_name, "Port is free");
            return Ok(report);
        }

        let max_attempts = policy.max_attempts.max(1);
        while report.attempts < max_attempts {
            report.attempts += 1;
            info!(
                port,
                service = service_name,
                ?pids,
                attempt = report.attempts,
                "Killing stale processes"
            );

            for &pid in &pids {
                report.killed.push(pid);
                if let Err(e) = self.killer.kill(pid).await {
                    warn!(pid, error = %e, "Failed to kill stale process");
                }
            }

            sleep(policy.settle).await;

            pids = self.stale_pids(port).await?;
            if pids.is_empty() {
                info!(port, service = service_name, "Port freed");
                report.outcome = CleanupOutcome::Freed;
                return Ok(report);
            }
        }

        warn!(
            port,
            service = service_name,
            ?pids,
            attempts = report.attempts,
            "Port still occupied after forced termination"
        );
        report.outcome = CleanupOutcome::StillOccupied(pids);
        Ok(report)
    }

    /// Listener PIDs on `port`, excluding the launcher itself.
    async fn stale_pids(&self, port: u16) -> Result<Vec<u32>> {
        let own_pid = std::process::id();
        let bindings = self.scanner.listeners(port).await?;
        Ok(owner_pids(&bindings)
            .into_iter()
            .filter(|&pid| pid != own_pid)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::testing::FakeOs;

    fn cleaner(os: &FakeOs) -> PortCleaner<FakeOs, FakeOs> {
        PortCleaner::new(os.clone(), os.clone())
    }

    #[tokio::test]
    async fn test_free_port_is_noop() {
        let os = FakeOs::new();
        let report = cleaner(&os)
            .ensure_port_free(8503, "Chat UI", &CleanupPolicy::immediate())
            .await
            .unwrap();

        assert!(report.was_noop());
        assert_eq!(report.attempts, 0);
        assert!(os.kills().is_empty());
    }

    #[tokio::test]
    async fn test_stale_process_is_killed() {
        let os = FakeOs::new();
        os.listen(8503, 4242);

        let report = cleaner(&os)
            .ensure_port_free(8503, "Chat UI", &CleanupPolicy::immediate())
            .await
            .unwrap();

        assert_eq!(report.outcome, CleanupOutcome::Freed);
        assert_eq!(report.killed, vec![4242]);
        assert_eq!(report.attempts, 1);
        assert!(os.owners(8503).is_empty());
    }

    #[tokio::test]
    async fn test_second_cleanup_is_idempotent() {
        let os = FakeOs::new();
        os.listen(8503, 4242).listen(8503, 4243);
        let cleaner = cleaner(&os);
        let policy = CleanupPolicy::immediate();

        let first = cleaner.ensure_port_free(8503, "Chat UI", &policy).await.unwrap();
        assert_eq!(first.killed, vec![4242, 4243]);

        let second = cleaner.ensure_port_free(8503, "Chat UI", &policy).await.unwrap();
        assert!(second.was_noop());
        assert!(second.killed.is_empty());
        assert_eq!(os.kills(), vec![4242, 4243]);
    }

    #[tokio::test]
    async fn test_survivor_is_killed_twice_then_warned() {
        let os = FakeOs::new();
        os.listen(8503, 7).immortal(7);

        let report = cleaner(&os)
            .ensure_port_free(8503, "Chat UI", &CleanupPolicy::immediate())
            .await
            .unwrap();

        assert_eq!(report.outcome, CleanupOutcome::StillOccupied(vec![7]));
        assert_eq!(report.attempts, 2);
        assert_eq!(os.kills(), vec![7, 7]);
        assert!(!report.is_free());
    }

    #[tokio::test]
    async fn test_kill_error_is_not_fatal() {
        let os = FakeOs::new();
        os.listen(5001, 1).protected(1).listen(5001, 2);

        let report = cleaner(&os)
            .ensure_port_free(5001, "API", &CleanupPolicy::immediate())
            .await
            .unwrap();

        assert_eq!(report.outcome, CleanupOutcome::StillOccupied(vec![1]));
        assert_eq!(os.owners(5001), vec![1]);
    }

    #[tokio::test]
    async fn test_own_pid_is_never_killed() {
        let os = FakeOs::new();
        os.listen(8503, std::process::id());

        let report = cleaner(&os)
            .ensure_port_free(8503, "Chat UI", &CleanupPolicy::immediate())
            .await
            .unwrap();

        assert!(report.was_noop());
        assert!(os.kills().is_empty());
    }

    #[tokio::test]
    async fn test_settle_pause_is_respected() {
        tokio::time::pause();

        let os = FakeOs::new();
        os.listen(8503, 4242);
        let policy = CleanupPolicy::default();

        let start = tokio::time::Instant::now();
        cleaner(&os).ensure_port_free(8503, "Chat UI", &policy).await.unwrap();
        assert!(start.elapsed() >= policy.settle);
    }
}

#[cfg(all(test, unix))]
mod os_tests {
    use std::process::Stdio;
    use std::time::Duration;

    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::process::{Child, Command};

    use super::*;
    use crate::adapters::{PortScanner, ProcessKiller};
    use crate::error::Error;

    const LISTENER: &str = "import socket, time
s = socket.socket()
s.bind(('127.0.0.1', 0))
s.listen()
print(s.getsockname()[1], flush=True)
time.sleep(60)";

    /// A child listening on an ephemeral port, or `None` without python3.
    async fn spawn_listener() -> Option<(Child, u16)> {
        let mut child = match Command::new("python3")
            .args(["-c", LISTENER])
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => panic!("cannot spawn python3: {}", e),
        };

        let stdout = child.stdout.take().unwrap();
        let mut line = String::new();
        BufReader::new(stdout).read_line(&mut line).await.unwrap();
        let port = line.trim().parse().unwrap();
        Some((child, port))
    }

    #[tokio::test]
    async fn test_real_listener_is_killed_and_port_freed() {
        let Some((mut child, port)) = spawn_listener().await else {
            eprintln!("python3 not installed, skipping");
            return;
        };
        let pid = child.id().unwrap();

        let scanner = PortScanner::new();
        let before = match scanner.listeners(port).await {
            Ok(bindings) => bindings,
            Err(Error::NoScanner(_)) => {
                eprintln!("no port inspection utility, skipping");
                return;
            }
            Err(e) => panic!("scan failed: {}", e),
        };
        assert_eq!(owner_pids(&before), vec![pid]);

        let policy = CleanupPolicy {
            settle: Duration::from_millis(300),
            max_attempts: 2,
        };
        let report = PortCleaner::new(PortScanner::new(), ProcessKiller::new())
            .ensure_port_free(port, "stale", &policy)
            .await
            .unwrap();

        assert_eq!(report.outcome, CleanupOutcome::Freed);
        assert_eq!(report.killed, vec![pid]);

        let status = tokio::time::timeout(Duration::from_secs(5), child.wait())
            .await
            .unwrap()
            .unwrap();
        assert!(!status.success());

        assert!(scanner.listeners(port).await.unwrap().is_empty());
    }
}
