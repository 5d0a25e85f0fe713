use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const PSA_ENFORCE_LABEL: &str = "pod-security.kubernetes.io/enforce";
pub const IRSA_ROLE_ANNOTATION: &str = "eks.amazonaws.com/role-arn";
pub const AWS_INTERNAL_LB_ANNOTATION: &str = "service.beta.kubernetes.io/aws-load-balancer-internal";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubernetesNode {
    pub name: String,
    pub cpu_capacity_millis: u64,
    pub cpu_allocatable_millis: u64,
    pub provider_id: String,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubernetesNamespace {
    pub name: String,
    pub has_limit_range: bool,
    pub labels: BTreeMap<String, String>,
}

impl KubernetesNamespace {
    pub fn pss_enforce_label_set(&self) -> bool {
        self.labels.contains_key(PSA_ENFORCE_LABEL)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeccompProfileType {
    RuntimeDefault,
    Localhost,
    Unconfined,
    Unset,
}

/// Effective per-container security posture, already resolved from the
/// container's own `securityContext` falling back to the pod-level one —
/// collectors do that resolution once so rules stay simple predicates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSecurity {
    pub container_name: String,
    pub privileged: bool,
    pub run_as_root: bool,
    pub has_cap_sys_admin: bool,
    pub seccomp_profile: SeccompProfileType,
    pub has_cpu_request: bool,
    pub has_memory_request: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubernetesPod {
    pub name: String,
    pub namespace: String,
    pub host_network: bool,
    pub host_pid: bool,
    pub host_ipc: bool,
    pub service_account_name: String,
    pub containers: Vec<ContainerSecurity>,
}

impl KubernetesPod {
    pub fn any_container_privileged(&self) -> bool {
        self.containers.iter().any(|c| c.privileged)
    }

    pub fn any_container_runs_as_root(&self) -> bool {
        self.containers.iter().any(|c| c.run_as_root)
    }

    pub fn any_container_has_cap_sys_admin(&self) -> bool {
        self.containers.iter().any(|c| c.has_cap_sys_admin)
    }

    pub fn any_container_no_seccomp(&self) -> bool {
        self.containers
            .iter()
            .any(|c| c.seccomp_profile == SeccompProfileType::Unset || c.seccomp_profile == SeccompProfileType::Unconfined)
    }

    pub fn any_container_missing_requests(&self) -> bool {
        self.containers.iter().any(|c| !c.has_cpu_request || !c.has_memory_request)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubernetesService {
    pub name: String,
    pub namespace: String,
    /// e.g. "ClusterIP", "NodePort", "LoadBalancer"
    pub service_type: String,
    pub annotations: BTreeMap<String, String>,
}

impl KubernetesService {
    pub fn is_internal_loadbalancer(&self) -> bool {
        self.annotations
            .get(AWS_INTERNAL_LB_ANNOTATION)
            .map(|v| v == "true")
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubernetesServiceAccount {
    pub name: String,
    pub namespace: String,
    pub annotations: BTreeMap<String, String>,
    /// `None` mirrors the Kubernetes API default (unset == automount true).
    pub automount_service_account_token: Option<bool>,
}

impl KubernetesServiceAccount {
    pub fn automounts_token(&self) -> bool {
        self.automount_service_account_token.unwrap_or(true)
    }

    pub fn has_irsa_binding(&self) -> bool {
        self.annotations.contains_key(IRSA_ROLE_ANNOTATION)
    }
}

/// One EKS-managed nodegroup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EksNodegroup {
    pub name: String,
    pub kubernetes_version: String,
    /// IMDSv2 enforcement: `"required"` means hop limit enforced.
    pub http_tokens: String,
    /// Names of overpermissive policies (e.g. containing a `"*"` action or
    /// `AdministratorAccess`) attached to or inlined on the nodegroup's IAM
    /// role. Empty when the role audit found nothing overpermissive.
    pub node_role_policies: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EksData {
    pub cluster_name: String,
    pub endpoint_public_access: bool,
    pub public_access_cidrs: Vec<String>,
    pub control_plane_version: String,
    /// Log types the control plane has enabled, e.g. `["api", "audit"]`.
    pub enabled_log_types: Vec<String>,
    pub secrets_encryption_kms_key_arn: Option<String>,
    pub oidc_issuer: String,
    pub oidc_provider_arn: String,
    pub nodegroups: Vec<EksNodegroup>,
}

/// The four log types tracked by `EKS_CLUSTER_LOGGING_{DISABLED,PARTIAL}`
/// (note: "api" is intentionally not in this set — it is only required by
/// the separate, stricter `EKS_CONTROL_PLANE_LOGGING_DISABLED` check below).
pub const EKS_CLUSTER_LOGGING_TYPES: [&str; 4] = ["audit", "authenticator", "controllerManager", "scheduler"];
pub const EKS_CONTROL_PLANE_REQUIRED_LOG_TYPES: [&str; 3] = ["api", "audit", "authenticator"];

/// Full inventory for one Kubernetes cluster (kubeconfig context), including
/// EKS-specific fields when the cluster was detected as EKS.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KubernetesClusterData {
    pub context_name: String,
    pub nodes: Vec<KubernetesNode>,
    pub namespaces: Vec<KubernetesNamespace>,
    pub pods: Vec<KubernetesPod>,
    pub services: Vec<KubernetesService>,
    pub service_accounts: Vec<KubernetesServiceAccount>,
    pub eks: Option<EksData>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn automount_defaults_to_true_when_unset() {
        let sa = KubernetesServiceAccount {
            name: "default".into(),
            namespace: "default".into(),
            annotations: BTreeMap::new(),
            automount_service_account_token: None,
        };
        assert!(sa.automounts_token());
    }

    #[test]
    fn internal_lb_annotation_must_be_exact_string_true() {
        let mut annotations = BTreeMap::new();
        annotations.insert(AWS_INTERNAL_LB_ANNOTATION.to_string(), "false".to_string());
        let svc = KubernetesService {
            name: "svc".into(),
            namespace: "default".into(),
            service_type: "LoadBalancer".into(),
            annotations,
        };
        assert!(!svc.is_internal_loadbalancer());
    }
}
