//! Init-system detection and control.
//!
//! [`detect`] looks for a supported service manager on `PATH` and
//! returns the matching [`HostInitSystem`] variant. All control goes
//! through the manager's own CLI.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{InitSystemError, InitSystemResult};

/// Coarse run state of a unit as reported by the init system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    Active,
    Activating,
    Inactive,
    Failed,
    Unknown,
}

/// A host service manager.
#[async_trait]
pub trait InitSystem: Send + Sync {
    /// Short name, for logs.
    fn name(&self) -> &'static str;

    /// Enable and start `unit`. A single attempt; already-running units
    /// are left running.
    async fn start(&self, unit: &str) -> InitSystemResult<()>;

    /// Query the current state of `unit`.
    async fn status(&self, unit: &str) -> InitSystemResult<ServiceState>;
}

/// systemd, driven through `systemctl`.
#[derive(Debug, Clone)]
pub struct Systemd {
    systemctl: PathBuf,
}

impl Systemd {
    pub fn new(systemctl: impl Into<PathBuf>) -> Self {
        Self {
            systemctl: systemctl.into(),
        }
    }
}

#[async_trait]
impl InitSystem for Systemd {
    fn name(&self) -> &'static str {
        "systemd"
    }

    async fn start(&self, unit: &str) -> InitSystemResult<()> {
        let start_err = |reason| InitSystemError::ServiceStart {
            unit: unit.to_string(),
            reason,
        };

        // Pick up unit files written since the last reload.
        run(&self.systemctl, &["daemon-reload"]).await.map_err(start_err)?;
        run(&self.systemctl, &["enable", unit]).await.map_err(start_err)?;
        run(&self.systemctl, &["start", unit]).await.map_err(start_err)?;

        info!(%unit, init = self.name(), "service started");
        Ok(())
    }

    async fn status(&self, unit: &str) -> InitSystemResult<ServiceState> {
        // is-active exits non-zero for anything but "active"; the state
        // word on stdout is what matters.
        let output = Command::new(&self.systemctl)
            .args(["is-active", unit])
            .output()
            .await
            .map_err(|e| InitSystemError::Status {
                unit: unit.to_string(),
                reason: e.to_string(),
            })?;

        Ok(parse_systemd_state(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// OpenRC, driven through `rc-update` and `rc-service`.
#[derive(Debug, Clone)]
pub struct OpenRc {
    rc_service: PathBuf,
    rc_update: PathBuf,
}

impl OpenRc {
    pub fn new(rc_service: impl Into<PathBuf>, rc_update: impl Into<PathBuf>) -> Self {
        Self {
            rc_service: rc_service.into(),
            rc_update: rc_update.into(),
        }
    }
}

#[async_trait]
impl InitSystem for OpenRc {
    fn name(&self) -> &'static str {
        "openrc"
    }

    async fn start(&self, unit: &str) -> InitSystemResult<()> {
        let start_err = |reason| InitSystemError::ServiceStart {
            unit: unit.to_string(),
            reason,
        };

        run(&self.rc_update, &["add", unit, "default"]).await.map_err(start_err)?;
        run(&self.rc_service, &[unit, "start"]).await.map_err(start_err)?;

        info!(%unit, init = self.name(), "service started");
        Ok(())
    }

    async fn status(&self, unit: &str) -> InitSystemResult<ServiceState> {
        let output = Command::new(&self.rc_service)
            .args([unit, "status"])
            .output()
            .await
            .map_err(|e| InitSystemError::Status {
                unit: unit.to_string(),
                reason: e.to_string(),
            })?;

        Ok(parse_openrc_state(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// The init system found on this host.
#[derive(Debug, Clone)]
pub enum HostInitSystem {
    Systemd(Systemd),
    OpenRc(OpenRc),
}

#[async_trait]
impl InitSystem for HostInitSystem {
    fn name(&self) -> &'static str {
        match self {
            HostInitSystem::Systemd(s) => s.name(),
            HostInitSystem::OpenRc(o) => o.name(),
        }
    }

    async fn start(&self, unit: &str) -> InitSystemResult<()> {
        match self {
            HostInitSystem::Systemd(s) => s.start(unit).await,
            HostInitSystem::OpenRc(o) => o.start(unit).await,
        }
    }

    async fn status(&self, unit: &str) -> InitSystemResult<ServiceState> {
        match self {
            HostInitSystem::Systemd(s) => s.status(unit).await,
            HostInitSystem::OpenRc(o) => o.status(unit).await,
        }
    }
}

/// Detect the init system from the process `PATH`.
pub fn detect() -> InitSystemResult<HostInitSystem> {
    let path = std::env::var_os("PATH");
    detect_in_path(path.as_deref())
}

/// Detect the init system from an explicit search path.
///
/// systemd wins when both managers are installed.
pub fn detect_in_path(search_path: Option<&OsStr>) -> InitSystemResult<HostInitSystem> {
    let search_path: OsString = search_path.map(OsStr::to_os_string).unwrap_or_default();

    if let Some(systemctl) = find_executable("systemctl", &search_path) {
        debug!(path = ?systemctl, "detected systemd");
        return Ok(HostInitSystem::Systemd(Systemd::new(systemctl)));
    }

    if let (Some(_), Some(rc_service), Some(rc_update)) = (
        find_executable("openrc", &search_path),
        find_executable("rc-service", &search_path),
        find_executable("rc-update", &search_path),
    ) {
        debug!(path = ?rc_service, "detected openrc");
        return Ok(HostInitSystem::OpenRc(OpenRc::new(rc_service, rc_update)));
    }

    Err(InitSystemError::UnsupportedPlatform(
        "systemctl, openrc".to_string(),
    ))
}

fn find_executable(name: &str, search_path: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_path)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

fn is_executable(path: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

/// Run a manager command; `Err` carries stderr (or the spawn error).
async fn run(program: &Path, args: &[&str]) -> Result<(), String> {
    debug!(program = ?program, ?args, "running init system command");
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| format!("{}: {e}", program.display()))?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(format!(
        "`{} {}` exited with {}: {}",
        program.display(),
        args.join(" "),
        output.status,
        stderr.trim()
    ))
}

fn parse_systemd_state(stdout: &str) -> ServiceState {
    match stdout.trim() {
        "active" | "reloading" => ServiceState::Active,
        "activating" => ServiceState::Activating,
        "inactive" | "deactivating" => ServiceState::Inactive,
        "failed" => ServiceState::Failed,
        _ => ServiceState::Unknown,
    }
}

fn parse_openrc_state(stdout: &str) -> ServiceState {
    let out = stdout.to_ascii_lowercase();
    if out.contains("crashed") {
        ServiceState::Failed
    } else if out.contains("starting") {
        ServiceState::Activating
    } else if out.contains("started") {
        ServiceState::Active
    } else if out.contains("stopped") {
        ServiceState::Inactive
    } else {
        ServiceState::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn fake_tool(dir: &Path, name: &str, script: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{script}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn detects_systemd_first() {
        let tmp = tempfile::tempdir().unwrap();
        for tool in ["systemctl", "openrc", "rc-service", "rc-update"] {
            fake_tool(tmp.path(), tool, "exit 0");
        }

        let sys = detect_in_path(Some(tmp.path().as_os_str())).unwrap();
        assert_eq!(sys.name(), "systemd");
    }

    #[cfg(unix)]
    #[test]
    fn detects_openrc() {
        let tmp = tempfile::tempdir().unwrap();
        for tool in ["openrc", "rc-service", "rc-update"] {
            fake_tool(tmp.path(), tool, "exit 0");
        }

        let sys = detect_in_path(Some(tmp.path().as_os_str())).unwrap();
        assert_eq!(sys.name(), "openrc");
    }

    #[cfg(unix)]
    #[test]
    fn non_executable_is_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("systemctl"), "").unwrap();

        let err = detect_in_path(Some(tmp.path().as_os_str())).unwrap_err();
        assert!(matches!(err, InitSystemError::UnsupportedPlatform(_)));
    }

    #[test]
    fn empty_path_is_unsupported() {
        let err = detect_in_path(None).unwrap_err();
        assert!(matches!(err, InitSystemError::UnsupportedPlatform(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn systemd_start_reloads_enables_and_starts() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join("calls.log");
        let systemctl = fake_tool(
            tmp.path(),
            "systemctl",
            &format!("echo \"$@\" >> {}", log.display()),
        );

        Systemd::new(systemctl).start("storage-node").await.unwrap();

        let calls = std::fs::read_to_string(&log).unwrap();
        assert_eq!(calls, "daemon-reload\nenable storage-node\nstart storage-node\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn systemd_start_failure_carries_unit_and_stderr() {
        let tmp = tempfile::tempdir().unwrap();
        let systemctl = fake_tool(
            tmp.path(),
            "systemctl",
            "if [ \"$1\" = start ]; then echo 'unit not found' >&2; exit 5; fi",
        );

        let err = Systemd::new(systemctl).start("scheduler").await.unwrap_err();
        match err {
            InitSystemError::ServiceStart { unit, reason } => {
                assert_eq!(unit, "scheduler");
                assert!(reason.contains("unit not found"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn systemd_status_reads_state_word() {
        let tmp = tempfile::tempdir().unwrap();
        let systemctl = fake_tool(tmp.path(), "systemctl", "echo failed; exit 3");

        let state = Systemd::new(systemctl).status("apiserver").await.unwrap();
        assert_eq!(state, ServiceState::Failed);
    }

    #[test]
    fn systemd_states() {
        assert_eq!(parse_systemd_state("active\n"), ServiceState::Active);
        assert_eq!(parse_systemd_state("activating"), ServiceState::Activating);
        assert_eq!(parse_systemd_state("inactive"), ServiceState::Inactive);
        assert_eq!(parse_systemd_state("failed"), ServiceState::Failed);
        assert_eq!(parse_systemd_state(""), ServiceState::Unknown);
    }

    #[test]
    fn openrc_states() {
        assert_eq!(parse_openrc_state(" * status: started"), ServiceState::Active);
        assert_eq!(parse_openrc_state(" * status: stopped"), ServiceState::Inactive);
        assert_eq!(parse_openrc_state(" * status: crashed"), ServiceState::Failed);
        assert_eq!(parse_openrc_state(" * status: starting"), ServiceState::Activating);
        assert_eq!(parse_openrc_state("???"), ServiceState::Unknown);
    }
}
