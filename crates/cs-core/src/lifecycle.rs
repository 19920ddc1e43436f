//! Service lifecycle control.
//!
//! There is no persisted state machine: each invocation infers the state
//! of a service (`Down -> Starting -> Running -> Stopping -> Down`) from
//! its membership in the live process snapshot, then drives transitions
//! against the installed-vs-running set difference.
//!
//! Spawns are fire-and-forget: the controller does not wait for a child to
//! reach Running and does not verify success. Two concurrent invocations
//! can race past the already-running check; at-most-one-instance is
//! best-effort only.

use crate::catalog::{pid_files, InstalledCatalog};
use crate::collect::{ProcessSource, ServiceStatus};
use cs_common::{Config, Error, ProcessId, Result, ServiceName};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, warn};

/// Which installed/running services an operation targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Every installed service.
    All,
    /// Services whose name starts with the given string.
    Prefix(String),
    /// Neither a name nor `--all` was given. Operations with this selector
    /// are no-ops by construction of the selection logic.
    None,
}

impl Selector {
    pub fn from_flags(name: Option<&str>, all: bool) -> Self {
        if all {
            Selector::All
        } else {
            match name {
                Some(n) if !n.is_empty() => Selector::Prefix(n.to_string()),
                _ => Selector::None,
            }
        }
    }

    pub fn matches(&self, name: &ServiceName) -> bool {
        match self {
            Selector::All => true,
            Selector::Prefix(prefix) => name.as_str().starts_with(prefix.as_str()),
            Selector::None => false,
        }
    }
}

/// Capability interface for process actuation, separated from the
/// controller so tests can record transitions instead of touching the OS.
pub trait ServiceSpawner {
    /// Spawn `<script> start` detached, stdout to the null device.
    fn spawn_start(&self, script: &Path) -> Result<()>;

    /// Deliver SIGTERM. A vanished PID maps to `Error::NotFound`.
    fn signal_term(&self, pid: ProcessId) -> Result<()>;

    /// Whether a PID is alive (or alive-but-unsignalable).
    fn pid_exists(&self, pid: ProcessId) -> bool;
}

/// Real OS spawner.
#[derive(Debug, Default)]
pub struct OsSpawner;

impl ServiceSpawner for OsSpawner {
    fn spawn_start(&self, script: &Path) -> Result<()> {
        Command::new(script)
            .arg("start")
            .stdout(Stdio::null())
            .spawn()
            .map_err(|e| Error::ProcessOp {
                service: script.display().to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    fn signal_term(&self, pid: ProcessId) -> Result<()> {
        let rc = unsafe { libc::kill(pid.0 as i32, libc::SIGTERM) };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::ESRCH) => Err(Error::NotFound(format!("pid {pid}"))),
            _ => Err(Error::ProcessOp {
                service: pid.to_string(),
                reason: err.to_string(),
            }),
        }
    }

    fn pid_exists(&self, pid: ProcessId) -> bool {
        let rc = unsafe { libc::kill(pid.0 as i32, 0) };
        if rc == 0 {
            return true;
        }
        // EPERM means the process exists but belongs to someone else.
        std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }
}

/// Outcome of one per-service lifecycle action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionReport {
    Started(ServiceName),
    AlreadyRunning(ServiceName),
    Stopped { name: ServiceName, pid: ProcessId },
    Failed { name: ServiceName, reason: String },
}

/// One row of the status view.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StatusRow {
    pub name: ServiceName,
    #[serde(flatten)]
    pub status: ServiceStatus,
}

/// Drives start/stop/restart transitions against the discrepancy between
/// the installed catalog and the live snapshot.
pub struct LifecycleController<'a> {
    catalog: &'a InstalledCatalog,
    source: &'a dyn ProcessSource,
    spawner: &'a dyn ServiceSpawner,
    pid_dir: PathBuf,
    settle: Duration,
}

impl<'a> LifecycleController<'a> {
    pub fn new(
        config: &Config,
        catalog: &'a InstalledCatalog,
        source: &'a dyn ProcessSource,
        spawner: &'a dyn ServiceSpawner,
    ) -> Self {
        LifecycleController {
            catalog,
            source,
            spawner,
            pid_dir: config.pid_dir.clone(),
            settle: Duration::from_millis(100),
        }
    }

    /// Override the signal-to-cleanup settle delay (tests).
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Per-invocation status: every installed service matching the
    /// selector gets exactly one Running/Down row, determined solely by
    /// presence in the current snapshot. Running managed processes whose
    /// script is gone still show up as Running rows.
    pub fn status(&self, selector: &Selector) -> Result<Vec<StatusRow>> {
        let snapshot = self.source.snapshot()?;
        let installed = self.catalog.list_installed()?;

        let mut rows = Vec::new();
        for record in &snapshot {
            if !selector.matches(&record.name) {
                continue;
            }
            rows.push(StatusRow {
                name: record.name.clone(),
                status: ServiceStatus::Running {
                    pid: record.pid,
                    started_at: record.started_at,
                    memory_percent: record.memory_percent,
                    cpu_percent: record.cpu_percent,
                },
            });
        }

        for name in installed {
            if !selector.matches(&name) {
                continue;
            }
            if snapshot.iter().any(|record| record.name == name) {
                continue;
            }
            rows.push(StatusRow {
                name,
                status: ServiceStatus::Down,
            });
        }
        Ok(rows)
    }

    /// Start every installed target that is not already running.
    ///
    /// Idempotent per service: a Running target is reported as a no-op.
    /// Spawn failures are reported per item and never abort the batch.
    pub fn start(&self, selector: &Selector) -> Result<Vec<ActionReport>> {
        if *selector == Selector::None {
            warn!("start invoked without a service name or --all; nothing selected");
            return Ok(Vec::new());
        }

        let running: Vec<ServiceName> = self
            .source
            .snapshot()?
            .into_iter()
            .map(|record| record.name)
            .collect();

        let mut reports = Vec::new();
        for name in self.catalog.list_installed()? {
            if !selector.matches(&name) {
                continue;
            }
            if running.contains(&name) {
                reports.push(ActionReport::AlreadyRunning(name));
                continue;
            }
            let script = self.catalog.script_path(&name);
            match self.spawner.spawn_start(&script) {
                Ok(()) => reports.push(ActionReport::Started(name)),
                Err(e) => {
                    debug!(service = %name, error = %e, "spawn failed");
                    reports.push(ActionReport::Failed {
                        name,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(reports)
    }

    /// Stop every running target: SIGTERM, then PID-file cleanup, then a
    /// short settle delay. Order matters: the signal goes first so cleanup
    /// cannot race a process that has not begun exiting.
    pub fn stop(&self, selector: &Selector) -> Result<Vec<ActionReport>> {
        if *selector == Selector::None {
            warn!("stop invoked without a service name or --all; nothing selected");
            return Ok(Vec::new());
        }

        let mut reports = Vec::new();
        for record in self.source.snapshot()? {
            if !selector.matches(&record.name) {
                continue;
            }
            if let Some(report) = self.stop_one(&record.name, record.pid, selector) {
                reports.push(report);
            }
        }
        Ok(reports)
    }

    /// Stop semantics followed immediately by start semantics per running
    /// target, preserving the settle delay between the phases.
    pub fn restart(&self, selector: &Selector) -> Result<Vec<ActionReport>> {
        if *selector == Selector::None {
            warn!("restart invoked without a service name or --all; nothing selected");
            return Ok(Vec::new());
        }

        let mut reports = Vec::new();
        for record in self.source.snapshot()? {
            if !selector.matches(&record.name) {
                continue;
            }
            let Some(stopped) = self.stop_one(&record.name, record.pid, selector) else {
                continue;
            };
            reports.push(stopped);

            let script = self.catalog.script_path(&record.name);
            match self.spawner.spawn_start(&script) {
                Ok(()) => reports.push(ActionReport::Started(record.name)),
                Err(e) => reports.push(ActionReport::Failed {
                    name: record.name,
                    reason: e.to_string(),
                }),
            }
        }
        Ok(reports)
    }

    /// Signal one process and prune its PID files. Returns None when the
    /// PID vanished before the signal (benign), Some otherwise.
    fn stop_one(
        &self,
        name: &ServiceName,
        pid: ProcessId,
        selector: &Selector,
    ) -> Option<ActionReport> {
        if !self.spawner.pid_exists(pid) {
            debug!(service = %name, %pid, "pid gone before signal; skipping");
            return None;
        }

        if let Err(e) = self.spawner.signal_term(pid) {
            if matches!(e, Error::NotFound(_)) {
                return None;
            }
            return Some(ActionReport::Failed {
                name: name.clone(),
                reason: e.to_string(),
            });
        }

        // A scoped stop prunes every PID file under the scope; an
        // unscoped one prunes only this service's files.
        let scope = match selector {
            Selector::Prefix(prefix) => prefix.as_str(),
            _ => name.as_str(),
        };
        self.remove_pid_files(scope);

        std::thread::sleep(self.settle);
        Some(ActionReport::Stopped {
            name: name.clone(),
            pid,
        })
    }

    /// Delete PID files matching the scope. Absence is benign; a stale
    /// file with no live process gets pruned here too.
    fn remove_pid_files(&self, scope: &str) {
        for path in pid_files(&self.pid_dir, scope) {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!(path = %path.display(), error = %e, "could not remove pid file");
            }
        }
    }
}
