//! Service unit descriptors.
//!
//! A [`UnitSpec`] renders to the `[Unit]` / `[Service]` / `[Install]`
//! stanza format understood by systemd. Rendering is plain string
//! assembly so the output is byte-for-byte predictable.

use std::fmt;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use keel_core::constants::unit_filepath;
use keel_core::fsutil;
use tracing::debug;

use crate::error::{InitSystemError, InitSystemResult};

/// When the init system restarts the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    No,
    OnFailure,
    OnSuccess,
    OnAbort,
    Always,
}

impl RestartPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            RestartPolicy::No => "no",
            RestartPolicy::OnFailure => "on-failure",
            RestartPolicy::OnSuccess => "on-success",
            RestartPolicy::OnAbort => "on-abort",
            RestartPolicy::Always => "always",
        }
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `[Service]` stanza.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitService {
    /// Command and arguments. Must not be empty.
    pub exec_start: Vec<String>,
    pub restart: RestartPolicy,
    pub restart_sec: u32,
}

/// The `[Install]` stanza. Unset or empty entries are not rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitInstall {
    pub alias: Option<String>,
    pub wanted_by: Option<String>,
    pub required_by: Option<String>,
}

impl UnitInstall {
    pub fn wanted_by(target: impl Into<String>) -> Self {
        Self {
            wanted_by: Some(target.into()),
            ..Self::default()
        }
    }
}

/// A complete service unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSpec {
    pub description: String,
    pub documentation: String,
    pub service: UnitService,
    pub install: UnitInstall,
}

impl UnitSpec {
    /// Check the invariants `render` relies on.
    ///
    /// Every value lands on a single line, so control characters are
    /// rejected everywhere. `ExecStart` tokens are space-separated and
    /// may not contain whitespace at all.
    pub fn validate(&self, component: &str) -> InitSystemResult<()> {
        let invalid = |reason: String| InitSystemError::InvalidUnit {
            component: component.to_string(),
            reason,
        };

        if self.service.exec_start.is_empty() {
            return Err(invalid("empty start command".to_string()));
        }

        for token in &self.service.exec_start {
            if token.chars().any(|c| c.is_whitespace() || c.is_control()) {
                return Err(invalid(format!("start command argument {token:?} contains whitespace or control characters")));
            }
        }

        let lines = [
            ("Description", Some(&self.description)),
            ("Documentation", Some(&self.documentation)),
            ("Alias", self.install.alias.as_ref()),
            ("WantedBy", self.install.wanted_by.as_ref()),
            ("RequiredBy", self.install.required_by.as_ref()),
        ];
        for (key, value) in lines {
            if let Some(v) = value.filter(|v| v.chars().any(char::is_control)) {
                return Err(invalid(format!("{key} value {v:?} contains control characters")));
            }
        }
        Ok(())
    }

    /// Render the unit file text.
    ///
    /// Every `ExecStart` token is followed by one space, including the
    /// last; existing unit files carry that trailing space and diffs
    /// against them stay clean.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(256);

        out.push('\n');
        out.push_str("[Unit]\n");
        let _ = writeln!(out, "Description={}", self.description);
        let _ = writeln!(out, "Documentation={}", self.documentation);

        out.push_str("\n[Service]\n");
        out.push_str("ExecStart=");
        for token in &self.service.exec_start {
            out.push_str(token);
            out.push(' ');
        }
        out.push('\n');
        let _ = writeln!(out, "Restart={}", self.service.restart);
        let _ = writeln!(out, "RestartSec={}", self.service.restart_sec);

        out.push_str("\n[Install]\n");
        let install = [
            ("Alias", &self.install.alias),
            ("WantedBy", &self.install.wanted_by),
            ("RequiredBy", &self.install.required_by),
        ];
        for (key, value) in install {
            if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
                let _ = writeln!(out, "{key}={v}");
            }
        }

        out
    }
}

/// Render `unit` and write it to `<units_dir>/<component>.service`.
///
/// Creates `units_dir` owner-only if needed and replaces any previous
/// file in one rename. Returns the path written.
pub fn write_unit_to_disk(component: &str, units_dir: &Path, unit: &UnitSpec) -> InitSystemResult<PathBuf> {
    unit.validate(component)?;

    fsutil::create_private_dir(units_dir).map_err(|source| InitSystemError::UnitWrite {
        component: component.to_string(),
        path: units_dir.to_path_buf(),
        source,
    })?;

    let path = unit_filepath(component, units_dir);
    fsutil::write_private_file(&path, unit.render().as_bytes()).map_err(|source| {
        InitSystemError::UnitWrite {
            component: component.to_string(),
            path: path.clone(),
            source,
        }
    })?;

    debug!(%component, ?path, "unit file written");
    Ok(path)
}
