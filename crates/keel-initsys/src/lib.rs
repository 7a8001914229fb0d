//! keel-initsys — declarative service units and the host init system.
//!
//! Callers describe a long-running process as a [`UnitSpec`], persist it
//! with [`write_unit_to_disk`], and start it through whichever
//! [`InitSystem`] [`detect`] finds on the host.
//!
//! # Architecture
//!
//! ```text
//! UnitSpec ── render() ──► unit text ── write_unit_to_disk() ──► <units_dir>/<component>.service
//!
//! detect() ──► HostInitSystem
//!                ├── Systemd  (systemctl daemon-reload / enable / start / is-active)
//!                └── OpenRc   (rc-update add / rc-service start|status)
//! ```
//!
//! Starting is a single attempt. Waiting for a started process to
//! become useful is the caller's job.

pub mod error;
pub mod system;
pub mod unit;

pub use error::{InitSystemError, InitSystemResult};
pub use system::{HostInitSystem, InitSystem, OpenRc, ServiceState, Systemd, detect, detect_in_path};
pub use unit::{RestartPolicy, UnitInstall, UnitService, UnitSpec, write_unit_to_disk};
