//! Launch orchestration.
//!
//! Walks a [`LaunchPlan`] through the launch state machine:
//! prerequisites, stale listener cleanup, the optional background
//! dependency and its health check, then the foreground service until it
//! exits or a shutdown signal arrives.

use std::future::Future;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::adapters::process::{exit_code, OutputMode, ServiceProcess, DEFAULT_STOP_GRACE};
use crate::domain::{
    BackgroundService, CleanupReport, HealthCheck, LaunchPhase, LaunchPlan, PhaseTrace,
    ShutdownSignal,
};
use crate::error::{Error, Result};
use crate::ports::{HealthProbePort, PortScannerPort, ProcessKillerPort};

use super::cleaner::PortCleaner;
use super::prereq::check_prerequisites;

/// How long a foreground exit waits for a shutdown signal delivered at the
/// same time before it counts as the service exiting on its own.
const SIGNAL_RACE_WINDOW: Duration = Duration::from_millis(200);

/// How a launch that got past its checks ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchOutcome {
    /// Exit code for the launcher process.
    pub exit_code: i32,
    /// The signal that stopped the launch, if any.
    pub signal: Option<ShutdownSignal>,
    /// One report per cleaned port, background first.
    pub cleanup: Vec<CleanupReport>,
    /// Every phase visited.
    pub phases: Vec<LaunchPhase>,
}

/// Why the running phase ended.
enum Stop {
    Exited(ExitStatus),
    Signalled(ShutdownSignal),
}

/// Runs launch plans.
pub struct Launcher<S: PortScannerPort, K: ProcessKillerPort, P: HealthProbePort> {
    cleaner: PortCleaner<S, K>,
    probe: P,
    base_dir: PathBuf,
    stop_grace: Duration,
    trace: RwLock<PhaseTrace>,
}

impl<S, K, P> Launcher<S, K, P>
where
    S: PortScannerPort,
    K: ProcessKillerPort,
    P: HealthProbePort,
{
    /// Create a launcher. Relative prerequisite paths resolve against `base_dir`.
    pub fn new(scanner: S, killer: K, probe: P, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            cleaner: PortCleaner::new(scanner, killer),
            probe,
            base_dir: base_dir.into(),
            stop_grace: DEFAULT_STOP_GRACE,
            trace: RwLock::new(PhaseTrace::new()),
        }
    }

    /// How long a stopping service gets between SIGTERM and SIGKILL.
    pub fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    /// The phase of the current (or last) launch.
    pub fn phase(&self) -> LaunchPhase {
        self.trace.read().current()
    }

    /// Every phase of the current (or last) launch.
    pub fn phases(&self) -> Vec<LaunchPhase> {
        self.trace.read().phases().to_vec()
    }

    /// Run `plan` until the foreground exits or `shutdown` resolves.
    ///
    /// Missing prerequisites, an unhealthy dependency and spawn failures end
    /// in `Aborted` and are returned as errors; the caller exits with 1.
    pub async fn run<F>(&self, plan: &LaunchPlan, shutdown: F) -> Result<LaunchOutcome>
    where
        F: Future<Output = ShutdownSignal>,
    {
        *self.trace.write() = PhaseTrace::new();

        let span = tracing::info_span!(
            "launch",
            run_id = %Uuid::new_v4(),
            service = %plan.foreground.name
        );
        self.run_plan(plan, shutdown).instrument(span).await
    }

    async fn run_plan<F>(&self, plan: &LaunchPlan, shutdown: F) -> Result<LaunchOutcome>
    where
        F: Future<Output = ShutdownSignal>,
    {
        tokio::pin!(shutdown);

        self.advance(LaunchPhase::CheckingPrereqs);
        if let Err(e) = check_prerequisites(&plan.prerequisites, &self.base_dir) {
            self.advance(LaunchPhase::Aborted);
            return Err(e);
        }

        self.advance(LaunchPhase::KillingStaleProcesses);
        let cleanup = self.cleanup(plan).await;

        let mut background = match &plan.background {
            Some(dependency) => {
                self.advance(LaunchPhase::StartingBackground);
                let mut process = match ServiceProcess::spawn(
                    &dependency.service,
                    OutputMode::LogFileOrInherit,
                ) {
                    Ok(process) => process,
                    Err(e) => {
                        self.advance(LaunchPhase::Aborted);
                        return Err(e);
                    }
                };

                self.advance(LaunchPhase::HealthCheck);
                let health = tokio::select! {
                    result = self.await_healthy(dependency, &mut process) => result,
                    signal = &mut shutdown => {
                        info!(%signal, "Shutdown requested during health check");
                        self.advance(LaunchPhase::ShuttingDown);
                        self.stop(&mut process).await;
                        self.advance(LaunchPhase::Terminated);
                        return Ok(self.outcome(0, Some(signal), cleanup));
                    }
                };

                if let Err(e) = health {
                    warn!(service = %dependency.service.name, error = %e, "Dependency is unhealthy");
                    self.stop(&mut process).await;
                    self.advance(LaunchPhase::Aborted);
                    return Err(e);
                }

                info!(service = %dependency.service.name, "Dependency is healthy");
                Some(process)
            }
            None => None,
        };

        self.advance(LaunchPhase::StartingForeground);
        let mut foreground = match ServiceProcess::spawn(&plan.foreground, OutputMode::Inherit) {
            Ok(process) => process,
            Err(e) => {
                if let Some(process) = background.as_mut() {
                    self.stop(process).await;
                }
                self.advance(LaunchPhase::Aborted);
                return Err(e);
            }
        };

        self.advance(LaunchPhase::Running);
        info!(
            service = %plan.foreground.name,
            endpoint = %plan.foreground.endpoint(),
            "Service running"
        );

        let mut watch_background = background.is_some();
        let stop = loop {
            tokio::select! {
                status = foreground.wait() => {
                    let status = status?;
                    // Ctrl-C reaches the whole process group, so the child
                    // can die before our own handler is polled.
                    match tokio::time::timeout(SIGNAL_RACE_WINDOW, &mut shutdown).await {
                        Ok(signal) => break Stop::Signalled(signal),
                        Err(_) => break Stop::Exited(status),
                    }
                }
                signal = &mut shutdown => break Stop::Signalled(signal),
                status = wait_optional(background.as_mut()), if watch_background => {
                    watch_background = false;
                    warn!(status = ?status, "Background service exited while foreground is running");
                }
            }
        };

        self.advance(LaunchPhase::ShuttingDown);
        let (code, signal) = match stop {
            Stop::Exited(status) => {
                info!(%status, "Foreground service exited");
                (exit_code(status), None)
            }
            Stop::Signalled(signal) => {
                info!(%signal, "Shutdown requested");
                self.stop(&mut foreground).await;
                (0, Some(signal))
            }
        };

        if let Some(process) = background.as_mut() {
            self.stop(process).await;
        }

        self.advance(LaunchPhase::Terminated);
        Ok(self.outcome(code, signal, cleanup))
    }

    /// Free every port in the plan. Scanner failures are logged, not fatal.
    async fn cleanup(&self, plan: &LaunchPlan) -> Vec<CleanupReport> {
        let mut reports = Vec::new();
        for service in plan.services() {
            match self
                .cleaner
                .ensure_port_free(service.port, &service.name, &plan.cleanup)
                .await
            {
                Ok(report) => reports.push(report),
                Err(e) => warn!(
                    port = service.port,
                    service = %service.name,
                    error = %e,
                    "Could not inspect port, starting anyway"
                ),
            }
        }
        reports
    }

    /// Fixed wait, then up to `attempts` probes at a fixed interval.
    ///
    /// Fails early if the dependency exits while we wait.
    async fn await_healthy(
        &self,
        dependency: &BackgroundService,
        process: &mut ServiceProcess,
    ) -> Result<()> {
        let check = &dependency.health;
        let url = check.url_for(dependency.service.port);

        tokio::select! {
            status = process.wait() => {
                let status = status?;
                Err(Error::HealthCheckFailed {
                    url,
                    reason: format!("{} exited during startup ({})", dependency.service.name, status),
                })
            }
            result = self.probe_until_healthy(&url, check) => result,
        }
    }

    async fn probe_until_healthy(&self, url: &str, check: &HealthCheck) -> Result<()> {
        info!(url, wait = ?check.startup_wait, "Waiting for dependency to start");
        sleep(check.startup_wait).await;

        let attempts = check.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.probe.probe(url, check.expect_status.as_deref()).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= attempts => return Err(e),
                Err(e) => {
                    warn!(url, attempt, error = %e, "Health probe failed");
                    attempt += 1;
                    sleep(check.interval).await;
                }
            }
        }
    }

    async fn stop(&self, process: &mut ServiceProcess) {
        if let Err(e) = process.stop(self.stop_grace).await {
            warn!(service = process.name(), pid = process.pid(), error = %e, "Failed to stop service");
        }
    }

    fn advance(&self, next: LaunchPhase) {
        self.trace.write().advance(next);
        info!(phase = %next, "Launch phase");
    }

    fn outcome(
        &self,
        exit_code: i32,
        signal: Option<ShutdownSignal>,
        cleanup: Vec<CleanupReport>,
    ) -> LaunchOutcome {
        debug_assert!(self.phase().is_terminal());
        LaunchOutcome {
            exit_code,
            signal,
            cleanup,
            phases: self.phases(),
        }
    }
}

async fn wait_optional(process: Option<&mut ServiceProcess>) -> Result<ExitStatus> {
    match process {
        Some(process) => process.wait().await,
        None => std::future::pending().await,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::application::testing::{alive, FakeOs, ScriptedProbe};
    use crate::domain::{CleanupOutcome, CleanupPolicy, Prerequisite, ServiceSpec};
    use std::path::Path;
    use tempfile::tempdir;
    use LaunchPhase as Phase;

    fn shell(name: &str, port: u16, script: &str) -> ServiceSpec {
        ServiceSpec::new(name, "sh", port).with_args(["-c", script])
    }

    fn quick_health() -> HealthCheck {
        HealthCheck {
            startup_wait: Duration::ZERO,
            interval: Duration::ZERO,
            ..HealthCheck::default()
        }
    }

    fn launcher(
        os: &FakeOs,
        probe: ScriptedProbe,
        base_dir: &Path,
    ) -> Launcher<FakeOs, FakeOs, ScriptedProbe> {
        Launcher::new(os.clone(), os.clone(), probe, base_dir)
            .with_stop_grace(Duration::from_secs(2))
    }

    fn never() -> impl Future<Output = ShutdownSignal> {
        std::future::pending()
    }

    #[tokio::test]
    async fn test_missing_prerequisites_abort_without_side_effects() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("started");
        let os = FakeOs::new();
        os.listen(8503, 4242);

        let plan = LaunchPlan::new(shell("UI", 8503, &format!("touch {}", marker.display())))
            .require(Prerequisite::directory("venv"))
            .require(Prerequisite::file(".env"))
            .with_cleanup(CleanupPolicy::immediate());

        let launcher = launcher(&os, ScriptedProbe::healthy(), dir.path());
        let err = launcher.run(&plan, never()).await.unwrap_err();

        assert!(matches!(err, Error::MissingPrerequisites(ref m) if m.len() == 2));
        assert_eq!(launcher.phases(), vec![Phase::Idle, Phase::CheckingPrereqs, Phase::Aborted]);
        assert_eq!(os.scans(), 0);
        assert!(os.kills().is_empty());
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn test_stale_listener_killed_then_service_runs() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("venv")).unwrap();
        let os = FakeOs::new();
        os.listen(8503, 4242);

        let plan = LaunchPlan::new(shell("UI", 8503, "exit 0"))
            .require(Prerequisite::directory("venv"))
            .with_cleanup(CleanupPolicy::immediate());

        let launcher = launcher(&os, ScriptedProbe::healthy(), dir.path());
        let outcome = launcher.run(&plan, never()).await.unwrap();

        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.signal, None);
        assert_eq!(outcome.cleanup.len(), 1);
        assert_eq!(outcome.cleanup[0].outcome, CleanupOutcome::Freed);
        assert_eq!(os.kills(), vec![4242]);
        assert_eq!(
            outcome.phases,
            vec![
                Phase::Idle,
                Phase::CheckingPrereqs,
                Phase::KillingStaleProcesses,
                Phase::StartingForeground,
                Phase::Running,
                Phase::ShuttingDown,
                Phase::Terminated
            ]
        );
    }

    #[tokio::test]
    async fn test_child_exit_code_propagates() {
        let dir = tempdir().unwrap();
        let os = FakeOs::new();
        let plan =
            LaunchPlan::new(shell("UI", 8503, "exit 7")).with_cleanup(CleanupPolicy::immediate());

        let outcome = launcher(&os, ScriptedProbe::healthy(), dir.path())
            .run(&plan, never())
            .await
            .unwrap();
        assert_eq!(outcome.exit_code, 7);
    }

    #[tokio::test]
    async fn test_signal_while_running_terminates_children() {
        let dir = tempdir().unwrap();
        let pid_file = dir.path().join("fg.pid");
        let os = FakeOs::new();

        let plan = LaunchPlan::new(shell(
            "UI",
            8503,
            &format!("echo $$ > {}; exec sleep 30", pid_file.display()),
        ))
        .with_cleanup(CleanupPolicy::immediate());

        let shutdown = async {
            sleep(Duration::from_millis(300)).await;
            ShutdownSignal::Interrupt
        };

        let outcome = launcher(&os, ScriptedProbe::healthy(), dir.path())
            .run(&plan, shutdown)
            .await
            .unwrap();

        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.signal, Some(ShutdownSignal::Interrupt));
        assert_eq!(outcome.phases.last(), Some(&Phase::Terminated));

        let pid: u32 = std::fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
        assert!(!alive(pid));
    }

    #[tokio::test]
    async fn test_group_interrupt_killing_child_first_is_clean_shutdown() {
        let dir = tempdir().unwrap();
        let pid_file = dir.path().join("fg.pid");
        let os = FakeOs::new();

        let plan = LaunchPlan::new(shell(
            "UI",
            8503,
            &format!("echo $$ > {}; exec sleep 30", pid_file.display()),
        ))
        .with_cleanup(CleanupPolicy::immediate());

        // Terminal Ctrl-C: the child gets SIGINT before our handler fires.
        let pid_path = pid_file.clone();
        let shutdown = async move {
            let pid = loop {
                match std::fs::read_to_string(&pid_path) {
                    Ok(raw) if raw.ends_with('\n') => break raw.trim().parse::<i32>().unwrap(),
                    _ => sleep(Duration::from_millis(10)).await,
                }
            };
            // Let `exec` replace the shell before signalling.
            sleep(Duration::from_millis(50)).await;
            nix::sys::signal::kill(
                nix::unistd::Pid::from_raw(pid),
                nix::sys::signal::Signal::SIGINT,
            )
            .unwrap();
            sleep(Duration::from_millis(20)).await;
            ShutdownSignal::Interrupt
        };

        let outcome = launcher(&os, ScriptedProbe::healthy(), dir.path())
            .run(&plan, shutdown)
            .await
            .unwrap();

        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.signal, Some(ShutdownSignal::Interrupt));
        assert_eq!(outcome.phases.last(), Some(&Phase::Terminated));
    }

    #[tokio::test]
    async fn test_unhealthy_dependency_never_starts_foreground() {
        let dir = tempdir().unwrap();
        let marker = dir.path().join("ui-started");
        let bg_pid_file = dir.path().join("api.pid");
        let os = FakeOs::new();
        os.listen(5001, 11);

        let plan = LaunchPlan::new(shell("UI", 8503, &format!("touch {}", marker.display())))
            .with_background(
                shell(
                    "API",
                    5001,
                    &format!("echo $$ > {}; exec sleep 30", bg_pid_file.display()),
                ),
                quick_health(),
            )
            .with_cleanup(CleanupPolicy::immediate());

        let probe = ScriptedProbe::unhealthy();
        let launcher = launcher(&os, probe.clone(), dir.path());
        let err = launcher.run(&plan, never()).await.unwrap_err();

        assert!(matches!(err, Error::HealthCheckFailed { .. }));
        assert_eq!(probe.calls(), vec!["http://localhost:5001/health".to_string()]);
        assert_eq!(
            launcher.phases(),
            vec![
                Phase::Idle,
                Phase::CheckingPrereqs,
                Phase::KillingStaleProcesses,
                Phase::StartingBackground,
                Phase::HealthCheck,
                Phase::Aborted
            ]
        );
        assert_eq!(os.kills(), vec![11]);
        assert!(!marker.exists());

        // The background service was stopped before returning.
        sleep(Duration::from_millis(50)).await;
        let pid: u32 = std::fs::read_to_string(&bg_pid_file).unwrap().trim().parse().unwrap();
        assert!(!alive(pid));
    }

    #[tokio::test]
    async fn test_dependency_exiting_during_startup_is_unhealthy() {
        let dir = tempdir().unwrap();
        let os = FakeOs::new();

        let health = HealthCheck {
            startup_wait: Duration::from_secs(30),
            ..HealthCheck::default()
        };
        let plan = LaunchPlan::new(shell("UI", 8503, "exit 0"))
            .with_background(shell("API", 5001, "exit 1"), health)
            .with_cleanup(CleanupPolicy::immediate());

        let probe = ScriptedProbe::healthy();
        let err = launcher(&os, probe.clone(), dir.path())
            .run(&plan, never())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("exited during startup"));
        assert!(probe.calls().is_empty());
    }

    #[tokio::test]
    async fn test_two_process_happy_path() {
        let dir = tempdir().unwrap();
        let os = FakeOs::new();
        os.listen(5001, 11).listen(8503, 22);

        let plan = LaunchPlan::new(shell("UI", 8503, "exit 0"))
            .with_background(shell("API", 5001, "exec sleep 30"), quick_health())
            .with_cleanup(CleanupPolicy::immediate());

        let probe = ScriptedProbe::healthy();
        let outcome = launcher(&os, probe.clone(), dir.path())
            .run(&plan, never())
            .await
            .unwrap();

        assert_eq!(outcome.exit_code, 0);
        assert_eq!(os.kills(), vec![11, 22]);
        assert_eq!(
            outcome.cleanup.iter().map(|r| r.port).collect::<Vec<_>>(),
            vec![5001, 8503]
        );
        assert_eq!(probe.calls().len(), 1);
        assert_eq!(
            outcome.phases,
            vec![
                Phase::Idle,
                Phase::CheckingPrereqs,
                Phase::KillingStaleProcesses,
                Phase::StartingBackground,
                Phase::HealthCheck,
                Phase::StartingForeground,
                Phase::Running,
                Phase::ShuttingDown,
                Phase::Terminated
            ]
        );
    }

    #[tokio::test]
    async fn test_signal_during_health_check() {
        let dir = tempdir().unwrap();
        let os = FakeOs::new();

        let health = HealthCheck {
            startup_wait: Duration::from_secs(30),
            ..HealthCheck::default()
        };
        let plan = LaunchPlan::new(shell("UI", 8503, "exit 0"))
            .with_background(shell("API", 5001, "exec sleep 30"), health)
            .with_cleanup(CleanupPolicy::immediate());

        let shutdown = async {
            sleep(Duration::from_millis(100)).await;
            ShutdownSignal::Terminate
        };

        let outcome = launcher(&os, ScriptedProbe::healthy(), dir.path())
            .run(&plan, shutdown)
            .await
            .unwrap();

        assert_eq!(outcome.signal, Some(ShutdownSignal::Terminate));
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(
            &outcome.phases[outcome.phases.len() - 3..],
            &[Phase::HealthCheck, Phase::ShuttingDown, Phase::Terminated]
        );
    }

    #[tokio::test]
    async fn test_spawn_failure_aborts() {
        let dir = tempdir().unwrap();
        let os = FakeOs::new();
        let plan = LaunchPlan::new(ServiceSpec::new("UI", "definitely-not-a-real-program-xyz", 8503))
            .with_cleanup(CleanupPolicy::immediate());

        let launcher = launcher(&os, ScriptedProbe::healthy(), dir.path());
        let err = launcher.run(&plan, never()).await.unwrap_err();

        assert!(matches!(err, Error::SpawnFailed { .. }));
        assert_eq!(launcher.phase(), Phase::Aborted);
    }
}
