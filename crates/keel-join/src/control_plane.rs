//! Host-level service units for the control-plane components.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use keel_core::constants::*;
use keel_core::{ApiEndpoint, ClusterConfig, ComponentId};
use keel_initsys::{InitSystem, RestartPolicy, UnitInstall, UnitService, UnitSpec, write_unit_to_disk};
use tracing::{debug, info};

use crate::command::{build_command, flags};
use crate::error::{JoinError, JoinResult};

const DOCUMENTATION: &str = "https://kubernetes.io/docs/reference/command-line-tools-reference/";

/// One descriptor per control-plane component.
pub fn control_plane_unit_specs(cfg: &ClusterConfig, endpoint: &ApiEndpoint) -> BTreeMap<ComponentId, UnitSpec> {
    ComponentId::ALL
        .into_iter()
        .filter_map(|component| {
            let (description, exec_start) = match component {
                ComponentId::ApiServer => ("keel API server", api_server_command(cfg, endpoint)),
                ComponentId::ControllerManager => {
                    ("keel controller manager", controller_manager_command(cfg))
                }
                ComponentId::Scheduler => ("keel scheduler", scheduler_command(cfg)),
                ComponentId::StorageNode => return None,
            };
            let spec = UnitSpec {
                description: format!("{description} {}", cfg.control_plane.version),
                documentation: DOCUMENTATION.to_string(),
                service: UnitService {
                    exec_start,
                    restart: RestartPolicy::Always,
                    restart_sec: DEFAULT_UNIT_RESTART_SEC,
                },
                install: UnitInstall::wanted_by(MULTI_USER_TARGET),
            };
            Some((component, spec))
        })
        .collect()
}

/// Write the units of `components`, in the order given.
///
/// Fails on the first component without a control-plane descriptor;
/// units written before it stay on disk.
pub fn create_service_unit_files(
    units_dir: &Path,
    cfg: &ClusterConfig,
    endpoint: &ApiEndpoint,
    components: &[ComponentId],
) -> JoinResult<Vec<PathBuf>> {
    let specs = control_plane_unit_specs(cfg, endpoint);
    let mut written = Vec::with_capacity(components.len());

    for component in components {
        let spec = specs.get(component).ok_or_else(|| {
            JoinError::Config(format!("no control-plane service unit for {:?}", component.name()))
        })?;

        let path = write_unit_to_disk(component.name(), units_dir, spec)?;
        info!(%component, ?path, "[control-plane] wrote service unit for component {:?}", component.name());
        written.push(path);
    }

    Ok(written)
}

/// Start `components` through `init`, in order, stopping at the first
/// failure.
pub async fn run_services<I>(init: &I, components: &[ComponentId]) -> JoinResult<()>
where
    I: InitSystem + ?Sized,
{
    for component in components {
        debug!(%component, init = init.name(), "[control-plane] starting service");
        init.start(component.name()).await?;
    }
    Ok(())
}

fn api_server_command(cfg: &ClusterConfig, endpoint: &ApiEndpoint) -> Vec<String> {
    let cert = |name: &str| cfg.paths.cert_dir.join(name).display().to_string();
    let cp = &cfg.control_plane;

    let mut defaults = flags([
        ("advertise-address", endpoint.advertise_address.clone()),
        ("secure-port", endpoint.bind_port.to_string()),
        ("allow-privileged", "true".to_string()),
        ("authorization-mode", "Node,RBAC".to_string()),
        ("enable-admission-plugins", "NodeRestriction".to_string()),
        ("client-ca-file", cert(CA_CERT)),
        ("tls-cert-file", cert(APISERVER_CERT)),
        ("tls-private-key-file", cert(APISERVER_KEY)),
        ("service-account-key-file", cert(SERVICE_ACCOUNT_PUB)),
        ("service-account-signing-key-file", cert(SERVICE_ACCOUNT_KEY)),
        (
            "service-account-issuer",
            "https://kubernetes.default.svc.cluster.local".to_string(),
        ),
        ("service-cluster-ip-range", cp.service_subnet.clone()),
    ]);

    match &cfg.storage.external {
        Some(ext) => {
            defaults.insert("etcd-servers".to_string(), ext.endpoints.join(","));
            let files = [
                ("etcd-cafile", &ext.ca_file),
                ("etcd-certfile", &ext.cert_file),
                ("etcd-keyfile", &ext.key_file),
            ];
            for (flag, file) in files {
                if let Some(f) = file {
                    defaults.insert(flag.to_string(), f.display().to_string());
                }
            }
        }
        None => {
            defaults.insert(
                "etcd-servers".to_string(),
                format!("https://127.0.0.1:{STORAGE_CLIENT_PORT}"),
            );
            defaults.insert("etcd-cafile".to_string(), cert(STORAGE_CA_CERT));
            defaults.insert("etcd-certfile".to_string(), cert(APISERVER_STORAGE_CLIENT_CERT));
            defaults.insert("etcd-keyfile".to_string(), cert(APISERVER_STORAGE_CLIENT_KEY));
        }
    }

    build_command(&cp.apiserver_binary, defaults, &cp.apiserver_extra_args)
}

fn controller_manager_command(cfg: &ClusterConfig) -> Vec<String> {
    let cert = |name: &str| cfg.paths.cert_dir.join(name).display().to_string();
    let kubeconfig = cfg.paths.config_dir.join(CONTROLLER_MANAGER_KUBECONFIG).display().to_string();
    let cp = &cfg.control_plane;

    let mut defaults = flags([
        ("kubeconfig", kubeconfig.clone()),
        ("authentication-kubeconfig", kubeconfig.clone()),
        ("authorization-kubeconfig", kubeconfig),
        ("bind-address", "127.0.0.1".to_string()),
        ("leader-elect", "true".to_string()),
        ("root-ca-file", cert(CA_CERT)),
        ("client-ca-file", cert(CA_CERT)),
        ("cluster-signing-cert-file", cert(CA_CERT)),
        ("cluster-signing-key-file", cert(CA_KEY)),
        ("service-account-private-key-file", cert(SERVICE_ACCOUNT_KEY)),
        ("use-service-account-credentials", "true".to_string()),
        ("controllers", "*,bootstrapsigner,tokencleaner".to_string()),
        ("service-cluster-ip-range", cp.service_subnet.clone()),
    ]);

    if let Some(pod_subnet) = &cp.pod_subnet {
        defaults.insert("allocate-node-cidrs".to_string(), "true".to_string());
        defaults.insert("cluster-cidr".to_string(), pod_subnet.clone());
    }

    build_command(&cp.controller_manager_binary, defaults, &cp.controller_manager_extra_args)
}

fn scheduler_command(cfg: &ClusterConfig) -> Vec<String> {
    let kubeconfig = cfg.paths.config_dir.join(SCHEDULER_KUBECONFIG).display().to_string();
    let cp = &cfg.control_plane;

    let defaults = flags([
        ("kubeconfig", kubeconfig.clone()),
        ("authentication-kubeconfig", kubeconfig.clone()),
        ("authorization-kubeconfig", kubeconfig),
        ("bind-address", "127.0.0.1".to_string()),
        ("leader-elect", "true".to_string()),
    ]);

    build_command(&cp.scheduler_binary, defaults, &cp.scheduler_extra_args)
}

#[cfg(test)]
mod tests {
    use keel_core::config::ExternalStorage;

    use super::*;

    fn config() -> ClusterConfig {
        let mut cfg = ClusterConfig::scaffold("cp-1", "10.0.0.1");
        cfg.paths.cert_dir = PathBuf::from("/pki");
        cfg.paths.config_dir = PathBuf::from("/etc/keel");
        cfg
    }

    fn has(cmd: &[String], token: &str) -> bool {
        cmd.iter().any(|t| t == token)
    }

    #[test]
    fn one_spec_per_control_plane_component() {
        let cfg = config();
        let specs = control_plane_unit_specs(&cfg, &cfg.endpoint());

        assert_eq!(specs.len(), 3);
        assert!(!specs.contains_key(&ComponentId::StorageNode));
        for spec in specs.values() {
            assert_eq!(spec.service.restart, RestartPolicy::Always);
            assert_eq!(spec.service.restart_sec, 5);
            assert_eq!(spec.install, UnitInstall::wanted_by("multi-user.target"));
        }
    }

    #[test]
    fn descriptions_carry_the_control_plane_version() {
        let mut cfg = config();
        cfg.control_plane.version = "v1.22.3".to_string();
        let specs = control_plane_unit_specs(&cfg, &cfg.endpoint());

        assert_eq!(specs[&ComponentId::ApiServer].description, "keel API server v1.22.3");
        assert!(specs[&ComponentId::Scheduler].render().contains("Description=keel scheduler v1.22.3\n"));
    }

    #[test]
    fn api_server_talks_to_local_storage() {
        let cfg = config();
        let specs = control_plane_unit_specs(&cfg, &cfg.endpoint());
        let cmd = &specs[&ComponentId::ApiServer].service.exec_start;

        assert_eq!(cmd[0], "kube-apiserver");
        assert!(has(cmd, "--etcd-servers=https://127.0.0.1:2379"));
        assert!(has(cmd, "--etcd-cafile=/pki/storage/ca.crt"));
        assert!(has(cmd, "--secure-port=6443"));
        assert!(has(cmd, "--advertise-address=10.0.0.1"));
    }

    #[test]
    fn api_server_uses_external_storage() {
        let mut cfg = config();
        cfg.storage.external = Some(ExternalStorage {
            endpoints: vec!["https://db-1:2379".to_string(), "https://db-2:2379".to_string()],
            ca_file: Some(PathBuf::from("/ext/ca.crt")),
            cert_file: None,
            key_file: None,
        });
        let specs = control_plane_unit_specs(&cfg, &cfg.endpoint());
        let cmd = &specs[&ComponentId::ApiServer].service.exec_start;

        assert!(has(cmd, "--etcd-servers=https://db-1:2379,https://db-2:2379"));
        assert!(has(cmd, "--etcd-cafile=/ext/ca.crt"));
        assert!(!cmd.iter().any(|t| t.starts_with("--etcd-certfile=")));
    }

    #[test]
    fn controller_manager_allocates_pod_cidrs_only_with_subnet() {
        let mut cfg = config();
        let cmd = controller_manager_command(&cfg);
        assert!(!cmd.iter().any(|t| t.starts_with("--cluster-cidr=")));

        cfg.control_plane.pod_subnet = Some("10.244.0.0/16".to_string());
        let cmd = controller_manager_command(&cfg);
        assert!(has(&cmd, "--cluster-cidr=10.244.0.0/16"));
        assert!(has(&cmd, "--allocate-node-cidrs=true"));
        assert!(has(&cmd, "--kubeconfig=/etc/keel/controller-manager.conf"));
    }

    #[test]
    fn scheduler_extra_args_override() {
        let mut cfg = config();
        cfg.control_plane
            .scheduler_extra_args
            .insert("leader-elect".to_string(), "false".to_string());
        let cmd = scheduler_command(&cfg);
        assert!(has(&cmd, "--leader-elect=false"));
        assert!(!has(&cmd, "--leader-elect=true"));
    }

    #[test]
    fn writes_requested_components_only() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config();

        let paths = create_service_unit_files(
            tmp.path(),
            &cfg,
            &cfg.endpoint(),
            &[ComponentId::Scheduler, ComponentId::ApiServer],
        )
        .unwrap();

        assert_eq!(
            paths,
            [tmp.path().join("scheduler.service"), tmp.path().join("apiserver.service")]
        );
        assert!(!tmp.path().join("controller-manager.service").exists());
    }

    #[test]
    fn storage_component_is_not_a_control_plane_unit() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config();

        let err = create_service_unit_files(
            tmp.path(),
            &cfg,
            &cfg.endpoint(),
            &[ComponentId::ApiServer, ComponentId::StorageNode],
        )
        .unwrap_err();

        assert!(matches!(err, JoinError::Config(_)));
        // The component before the bad one was already written.
        assert!(tmp.path().join("apiserver.service").exists());
    }
}
