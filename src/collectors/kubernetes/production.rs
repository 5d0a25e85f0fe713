//! `kube`-backed implementation of `KubeClient`, translating `k8s-openapi`
//! types into this crate's inventory shapes.

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Node, Pod, Service, ServiceAccount};
use kube::api::ListParams;
use kube::{Api, Client, Config};
use tracing::warn;

use crate::collectors::kubernetes::KubeClient;
use crate::errors::CollectionError;
use crate::inventory::kubernetes::{ContainerSecurity, KubernetesClusterData, KubernetesNamespace, KubernetesNode, KubernetesPod, KubernetesService, KubernetesServiceAccount, SeccompProfileType};

pub struct KubeApiClient {
    client: Client,
}

impl KubeApiClient {
    pub async fn for_context(context: Option<&str>) -> Result<Self, CollectionError> {
        let mut options = kube::config::KubeConfigOptions::default();
        options.context = context.map(str::to_string);
        let config = Config::from_kubeconfig(&options)
            .await
            .map_err(|e| CollectionError::Kube(format!("loading kubeconfig context {context:?}: {e}")))?;
        let client = Client::try_from(config).map_err(|e| CollectionError::Kube(format!("building client: {e}")))?;
        Ok(KubeApiClient { client })
    }
}

fn quantity_millis(q: Option<&k8s_openapi::apimachinery::pkg::api::resource::Quantity>) -> u64 {
    let Some(q) = q else { return 0 };
    let s = &q.0;
    if let Some(stripped) = s.strip_suffix('m') {
        stripped.parse().unwrap_or(0)
    } else {
        s.parse::<f64>().map(|cores| (cores * 1000.0) as u64).unwrap_or(0)
    }
}

fn node_from_api(node: Node) -> KubernetesNode {
    let status = node.status.unwrap_or_default();
    let capacity = status.capacity.as_ref();
    let allocatable = status.allocatable.as_ref();
    KubernetesNode {
        name: node.metadata.name.unwrap_or_default(),
        cpu_capacity_millis: quantity_millis(capacity.and_then(|m| m.get("cpu"))),
        cpu_allocatable_millis: quantity_millis(allocatable.and_then(|m| m.get("cpu"))),
        provider_id: node.spec.and_then(|s| s.provider_id).unwrap_or_default(),
        labels: node.metadata.labels.unwrap_or_default().into_iter().collect::<BTreeMap<_, _>>(),
    }
}

fn namespace_from_api(ns: Namespace) -> KubernetesNamespace {
    KubernetesNamespace {
        name: ns.metadata.name.unwrap_or_default(),
        // LimitRange presence is checked by a follow-up list per namespace in
        // `collect`, filled in there.
        has_limit_range: false,
        labels: ns.metadata.labels.unwrap_or_default().into_iter().collect::<BTreeMap<_, _>>(),
    }
}

fn container_security(pod: &Pod, container_name: &str, pod_level: &k8s_openapi::api::core::v1::PodSecurityContext) -> ContainerSecurity {
    let container = pod
        .spec
        .as_ref()
        .and_then(|s| s.containers.iter().find(|c| c.name == container_name));
    let ctx = container.and_then(|c| c.security_context.as_ref());

    let privileged = ctx.and_then(|c| c.privileged).unwrap_or(false);
    let run_as_root = ctx
        .and_then(|c| c.run_as_non_root)
        .or(pod_level.run_as_non_root)
        .map(|non_root| !non_root)
        .unwrap_or(true);
    let has_cap_sys_admin = ctx
        .and_then(|c| c.capabilities.as_ref())
        .map(|caps| caps.add.as_ref().map(|add| add.iter().any(|c| c == "SYS_ADMIN")).unwrap_or(false))
        .unwrap_or(false);
    let seccomp = ctx
        .and_then(|c| c.seccomp_profile.as_ref())
        .or(pod_level.seccomp_profile.as_ref());
    let seccomp_profile = match seccomp.map(|p| p.type_.as_str()) {
        Some("RuntimeDefault") => SeccompProfileType::RuntimeDefault,
        Some("Localhost") => SeccompProfileType::Localhost,
        Some("Unconfined") => SeccompProfileType::Unconfined,
        _ => SeccompProfileType::Unset,
    };
    let resources = container.and_then(|c| c.resources.as_ref());
    let has_cpu_request = resources.and_then(|r| r.requests.as_ref()).map(|r| r.contains_key("cpu")).unwrap_or(false);
    let has_memory_request = resources
        .and_then(|r| r.requests.as_ref())
        .map(|r| r.contains_key("memory"))
        .unwrap_or(false);

    ContainerSecurity {
        container_name: container_name.to_string(),
        privileged,
        run_as_root,
        has_cap_sys_admin,
        seccomp_profile,
        has_cpu_request,
        has_memory_request,
    }
}

fn pod_from_api(pod: Pod) -> KubernetesPod {
    let spec = pod.spec.clone().unwrap_or_default();
    let pod_level_security = spec.security_context.clone().unwrap_or_default();
    let containers = spec
        .containers
        .iter()
        .map(|c| container_security(&pod, &c.name, &pod_level_security))
        .collect();
    KubernetesPod {
        name: pod.metadata.name.clone().unwrap_or_default(),
        namespace: pod.metadata.namespace.clone().unwrap_or_default(),
        host_network: spec.host_network.unwrap_or(false),
        host_pid: spec.host_pid.unwrap_or(false),
        host_ipc: spec.host_ipc.unwrap_or(false),
        service_account_name: spec.service_account_name.unwrap_or_default(),
        containers,
    }
}

fn service_from_api(svc: Service) -> KubernetesService {
    KubernetesService {
        name: svc.metadata.name.unwrap_or_default(),
        namespace: svc.metadata.namespace.unwrap_or_default(),
        service_type: svc.spec.and_then(|s| s.type_).unwrap_or_default(),
        annotations: svc.metadata.annotations.unwrap_or_default().into_iter().collect::<BTreeMap<_, _>>(),
    }
}

fn service_account_from_api(sa: ServiceAccount) -> KubernetesServiceAccount {
    KubernetesServiceAccount {
        name: sa.metadata.name.unwrap_or_default(),
        namespace: sa.metadata.namespace.unwrap_or_default(),
        annotations: sa.metadata.annotations.unwrap_or_default().into_iter().collect::<BTreeMap<_, _>>(),
        automount_service_account_token: sa.automount_service_account_token,
    }
}

#[async_trait]
impl KubeClient for KubeApiClient {
    async fn collect(&self, _context: Option<&str>) -> Result<KubernetesClusterData, CollectionError> {
        let nodes_api: Api<Node> = Api::all(self.client.clone());
        let namespaces_api: Api<Namespace> = Api::all(self.client.clone());
        let pods_api: Api<Pod> = Api::all(self.client.clone());
        let services_api: Api<Service> = Api::all(self.client.clone());
        let service_accounts_api: Api<ServiceAccount> = Api::all(self.client.clone());

        let nodes = nodes_api
            .list(&ListParams::default())
            .await
            .map_err(|e| CollectionError::Kube(format!("listing nodes: {e}")))?
            .items
            .into_iter()
            .map(node_from_api)
            .collect::<Vec<_>>();

        let mut namespaces = namespaces_api
            .list(&ListParams::default())
            .await
            .map_err(|e| CollectionError::Kube(format!("listing namespaces: {e}")))?
            .items
            .into_iter()
            .map(namespace_from_api)
            .collect::<Vec<_>>();

        for ns in &mut namespaces {
            let limit_ranges: Api<k8s_openapi::api::core::v1::LimitRange> = Api::namespaced(self.client.clone(), &ns.name);
            ns.has_limit_range = limit_ranges
                .list(&ListParams::default())
                .await
                .map(|list| !list.items.is_empty())
                .unwrap_or_else(|e| {
                    warn!(namespace = %ns.name, error = %e, "LimitRange listing failed, assuming none present");
                    false
                });
        }

        let pods = pods_api
            .list(&ListParams::default())
            .await
            .map_err(|e| CollectionError::Kube(format!("listing pods: {e}")))?
            .items
            .into_iter()
            .map(pod_from_api)
            .collect::<Vec<_>>();

        let services = services_api
            .list(&ListParams::default())
            .await
            .map_err(|e| CollectionError::Kube(format!("listing services: {e}")))?
            .items
            .into_iter()
            .map(service_from_api)
            .collect::<Vec<_>>();

        let service_accounts = service_accounts_api
            .list(&ListParams::default())
            .await
            .map_err(|e| CollectionError::Kube(format!("listing service accounts: {e}")))?
            .items
            .into_iter()
            .map(service_account_from_api)
            .collect::<Vec<_>>();

        Ok(KubernetesClusterData {
            context_name: String::new(),
            nodes,
            namespaces,
            pods,
            services,
            service_accounts,
            eks: None,
        })
    }
}
