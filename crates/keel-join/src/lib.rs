//! keel-join — the node join workflow.
//!
//! Adds a node to a running stacked storage cluster, writes and starts
//! the host-level units of the control plane, and verifies storage
//! health before and after a join.
//!
//! # Architecture
//!
//! ```text
//! JoinOrchestrator
//!   ├── MemberApi::add_member()               register before start
//!   ├── storage::storage_unit_spec()          unit from post-add member list
//!   ├── keel_initsys::write_unit_to_disk()
//!   ├── InitSystem::start()
//!   └── MemberApi::wait_for_cluster_available()
//!
//! control_plane::create_service_unit_files() / run_services()
//!
//! phases::run_check_storage_phase()
//!   └── verify::HealthCheckStrategy
//!         ├── ViaEndpoint(url)                service-hosted control plane
//!         └── ViaDiscovery(WorkloadDiscovery) replicas listed by the API server
//! ```

mod command;
pub mod control_plane;
pub mod discovery;
pub mod error;
pub mod orchestrator;
pub mod phases;
pub mod storage;
pub mod verify;

pub use command::build_command;
pub use control_plane::{control_plane_unit_specs, create_service_unit_files, run_services};
pub use discovery::{ApiServerDiscovery, StaticReplicas, WorkloadDiscovery};
pub use error::{JoinError, JoinResult};
pub use orchestrator::{JoinOrchestrator, JoinReport, JoinState, RetryPolicy};
pub use phases::{CheckStorageOutcome, run_check_storage_phase, run_check_storage_phase_with};
pub use storage::{STORAGE_COMPONENT, create_storage_unit_file, storage_command, storage_unit_spec};
pub use verify::{HealthCheckStrategy, check_via_discovery, check_via_endpoint};
