use chrono::Utc;
use std::collections::BTreeMap;

use crate::inventory::finding::{Domain, Finding, ResourceType};
use crate::inventory::kubernetes::KubernetesClusterData;
use crate::inventory::severity::Severity;
use crate::inventory::RuleContext;
use crate::rules::Rule;

fn cluster_finding(
    ctx: &RuleContext,
    cluster: &KubernetesClusterData,
    rule_id: &str,
    resource_id: &str,
    resource_type: ResourceType,
    severity: Severity,
    explanation: String,
    recommendation: String,
) -> Finding {
    Finding {
        id: Finding::make_id(rule_id, resource_id),
        rule_id: rule_id.to_string(),
        resource_id: resource_id.to_string(),
        resource_type,
        region: cluster.context_name.clone(),
        account_id: ctx.account_id.clone(),
        profile: ctx.profile.clone(),
        domain: Some(Domain::Kubernetes),
        severity,
        estimated_monthly_savings: 0.0,
        explanation,
        recommendation,
        detected_at: Utc::now(),
        metadata: BTreeMap::new(),
    }
}

macro_rules! cluster_rule {
    ($ctx:expr) => {{
        match &$ctx.cluster_data {
            Some(c) => c.as_ref(),
            None => return Vec::new(),
        }
    }};
}

/// K8S_CLUSTER_SINGLE_NODE: the cluster has exactly one node.
pub struct ClusterSingleNode;

impl Rule for ClusterSingleNode {
    fn id(&self) -> &'static str {
        "K8S_CLUSTER_SINGLE_NODE"
    }
    fn name(&self) -> &'static str {
        "Single-node cluster"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let cluster = cluster_rule!(ctx);
        if cluster.nodes.len() == 1 {
            vec![cluster_finding(
                ctx,
                cluster,
                self.id(),
                &cluster.context_name,
                ResourceType::KubernetesCluster,
                Severity::High,
                "Cluster has only a single node".to_string(),
                "Add additional nodes to tolerate node failure".to_string(),
            )]
        } else {
            Vec::new()
        }
    }
}

/// K8S_NODE_OVERALLOCATED: allocatable/capacity ratio under 20%. Skipped
/// entirely when capacity is 0 (no data, not "100% reserved").
pub struct NodeOverallocated;

impl Rule for NodeOverallocated {
    fn id(&self) -> &'static str {
        "K8S_NODE_OVERALLOCATED"
    }
    fn name(&self) -> &'static str {
        "Node with most capacity reserved by system overhead"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let cluster = cluster_rule!(ctx);
        cluster
            .nodes
            .iter()
            .filter_map(|node| {
                if node.cpu_capacity_millis == 0 {
                    return None;
                }
                let ratio = node.cpu_allocatable_millis as f64 / node.cpu_capacity_millis as f64 * 100.0;
                if ratio < 20.0 {
                    Some(cluster_finding(
                        ctx,
                        cluster,
                        self.id(),
                        &node.name,
                        ResourceType::KubernetesNode,
                        Severity::High,
                        format!("Node {} has only {:.1}% of CPU capacity allocatable", node.name, ratio),
                        "Investigate system daemon overhead or kubelet reservations on this node".to_string(),
                    ))
                } else {
                    None
                }
            })
            .collect()
    }
}

/// K8S_NAMESPACE_WITHOUT_LIMITS: namespace has no `LimitRange` object.
pub struct NamespaceWithoutLimits;

impl Rule for NamespaceWithoutLimits {
    fn id(&self) -> &'static str {
        "K8S_NAMESPACE_WITHOUT_LIMITS"
    }
    fn name(&self) -> &'static str {
        "Namespace without a LimitRange"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let cluster = cluster_rule!(ctx);
        cluster
            .namespaces
            .iter()
            .filter(|ns| !ns.has_limit_range)
            .map(|ns| {
                cluster_finding(
                    ctx,
                    cluster,
                    self.id(),
                    &ns.name,
                    ResourceType::KubernetesNamespace,
                    Severity::Medium,
                    format!("Namespace {} has no LimitRange", ns.name),
                    "Add a LimitRange to bound default container resource requests".to_string(),
                )
            })
            .collect()
    }
}

/// K8S_POD_PRIVILEGED_CONTAINER: at least one container in the pod runs
/// privileged.
pub struct PodPrivilegedContainer;

impl Rule for PodPrivilegedContainer {
    fn id(&self) -> &'static str {
        "K8S_POD_PRIVILEGED_CONTAINER"
    }
    fn name(&self) -> &'static str {
        "Pod running a privileged container"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let cluster = cluster_rule!(ctx);
        cluster
            .pods
            .iter()
            .filter(|p| p.any_container_privileged())
            .map(|pod| {
                cluster_finding(
                    ctx,
                    cluster,
                    self.id(),
                    &format!("{}/{}", pod.namespace, pod.name),
                    ResourceType::KubernetesPod,
                    Severity::Critical,
                    format!("Pod {}/{} runs at least one privileged container", pod.namespace, pod.name),
                    "Remove `privileged: true` and grant only the specific capabilities required".to_string(),
                )
            })
            .collect()
    }
}

/// K8S_POD_HOST_NETWORK: pod shares the host network namespace.
pub struct PodHostNetwork;

impl Rule for PodHostNetwork {
    fn id(&self) -> &'static str {
        "K8S_POD_HOST_NETWORK"
    }
    fn name(&self) -> &'static str {
        "Pod using host network namespace"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let cluster = cluster_rule!(ctx);
        cluster
            .pods
            .iter()
            .filter(|p| p.host_network)
            .map(|pod| {
                cluster_finding(
                    ctx,
                    cluster,
                    self.id(),
                    &format!("{}/{}", pod.namespace, pod.name),
                    ResourceType::KubernetesPod,
                    Severity::High,
                    format!("Pod {}/{} uses the host network namespace", pod.namespace, pod.name),
                    "Remove `hostNetwork: true` unless explicitly required".to_string(),
                )
            })
            .collect()
    }
}

/// K8S_POD_HOST_PID_OR_IPC: pod shares the host PID or IPC namespace.
pub struct PodHostPidOrIpc;

impl Rule for PodHostPidOrIpc {
    fn id(&self) -> &'static str {
        "K8S_POD_HOST_PID_OR_IPC"
    }
    fn name(&self) -> &'static str {
        "Pod sharing host PID or IPC namespace"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let cluster = cluster_rule!(ctx);
        cluster
            .pods
            .iter()
            .filter(|p| p.host_pid || p.host_ipc)
            .map(|pod| {
                cluster_finding(
                    ctx,
                    cluster,
                    self.id(),
                    &format!("{}/{}", pod.namespace, pod.name),
                    ResourceType::KubernetesPod,
                    Severity::High,
                    format!("Pod {}/{} shares the host PID or IPC namespace", pod.namespace, pod.name),
                    "Remove `hostPID`/`hostIPC` unless explicitly required".to_string(),
                )
            })
            .collect()
    }
}

/// K8S_POD_RUN_AS_ROOT: at least one container runs as root.
pub struct PodRunAsRoot;

impl Rule for PodRunAsRoot {
    fn id(&self) -> &'static str {
        "K8S_POD_RUN_AS_ROOT"
    }
    fn name(&self) -> &'static str {
        "Pod running a container as root"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let cluster = cluster_rule!(ctx);
        cluster
            .pods
            .iter()
            .filter(|p| p.any_container_runs_as_root())
            .map(|pod| {
                cluster_finding(
                    ctx,
                    cluster,
                    self.id(),
                    &format!("{}/{}", pod.namespace, pod.name),
                    ResourceType::KubernetesPod,
                    Severity::High,
                    format!("Pod {}/{} runs at least one container as root", pod.namespace, pod.name),
                    "Set `runAsNonRoot: true` and a non-zero `runAsUser`".to_string(),
                )
            })
            .collect()
    }
}

/// K8S_POD_CAP_SYS_ADMIN: at least one container adds `CAP_SYS_ADMIN`.
pub struct PodCapSysAdmin;

impl Rule for PodCapSysAdmin {
    fn id(&self) -> &'static str {
        "K8S_POD_CAP_SYS_ADMIN"
    }
    fn name(&self) -> &'static str {
        "Pod container with CAP_SYS_ADMIN"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let cluster = cluster_rule!(ctx);
        cluster
            .pods
            .iter()
            .filter(|p| p.any_container_has_cap_sys_admin())
            .map(|pod| {
                cluster_finding(
                    ctx,
                    cluster,
                    self.id(),
                    &format!("{}/{}", pod.namespace, pod.name),
                    ResourceType::KubernetesPod,
                    Severity::High,
                    format!("Pod {}/{} adds the CAP_SYS_ADMIN capability", pod.namespace, pod.name),
                    "Drop CAP_SYS_ADMIN unless the workload genuinely requires it".to_string(),
                )
            })
            .collect()
    }
}

/// K8S_POD_NO_SECCOMP: at least one container has no seccomp profile set
/// (or explicitly `Unconfined`).
pub struct PodNoSeccomp;

impl Rule for PodNoSeccomp {
    fn id(&self) -> &'static str {
        "K8S_POD_NO_SECCOMP"
    }
    fn name(&self) -> &'static str {
        "Pod container without a seccomp profile"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let cluster = cluster_rule!(ctx);
        cluster
            .pods
            .iter()
            .filter(|p| p.any_container_no_seccomp())
            .map(|pod| {
                cluster_finding(
                    ctx,
                    cluster,
                    self.id(),
                    &format!("{}/{}", pod.namespace, pod.name),
                    ResourceType::KubernetesPod,
                    Severity::Medium,
                    format!("Pod {}/{} has no seccomp profile set", pod.namespace, pod.name),
                    "Set `seccompProfile.type: RuntimeDefault`".to_string(),
                )
            })
            .collect()
    }
}

/// K8S_SERVICE_PUBLIC_LOADBALANCER: a `LoadBalancer` service without the AWS
/// internal-LB annotation.
pub struct ServicePublicLoadbalancer;

impl Rule for ServicePublicLoadbalancer {
    fn id(&self) -> &'static str {
        "K8S_SERVICE_PUBLIC_LOADBALANCER"
    }
    fn name(&self) -> &'static str {
        "Internet-facing LoadBalancer service"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let cluster = cluster_rule!(ctx);
        cluster
            .services
            .iter()
            .filter(|s| s.service_type == "LoadBalancer" && !s.is_internal_loadbalancer())
            .map(|svc| {
                cluster_finding(
                    ctx,
                    cluster,
                    self.id(),
                    &format!("{}/{}", svc.namespace, svc.name),
                    ResourceType::KubernetesService,
                    Severity::High,
                    format!("Service {}/{} provisions an internet-facing load balancer", svc.namespace, svc.name),
                    "Add the internal load balancer annotation unless public exposure is intended".to_string(),
                )
            })
            .collect()
    }
}

/// K8S_POD_NO_RESOURCE_REQUESTS: at least one container is missing a CPU or
/// memory request.
pub struct PodNoResourceRequests;

impl Rule for PodNoResourceRequests {
    fn id(&self) -> &'static str {
        "K8S_POD_NO_RESOURCE_REQUESTS"
    }
    fn name(&self) -> &'static str {
        "Pod container without resource requests"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let cluster = cluster_rule!(ctx);
        cluster
            .pods
            .iter()
            .filter(|p| p.any_container_missing_requests())
            .map(|pod| {
                cluster_finding(
                    ctx,
                    cluster,
                    self.id(),
                    &format!("{}/{}", pod.namespace, pod.name),
                    ResourceType::KubernetesPod,
                    Severity::Medium,
                    format!("Pod {}/{} has a container without CPU or memory requests", pod.namespace, pod.name),
                    "Set resource requests so the scheduler can bin-pack correctly".to_string(),
                )
            })
            .collect()
    }
}

/// K8S_POD_SECURITY_ADMISSION_NOT_ENFORCED: no namespace in the cluster
/// carries the PSA enforce label.
pub struct PodSecurityAdmissionNotEnforced;

impl Rule for PodSecurityAdmissionNotEnforced {
    fn id(&self) -> &'static str {
        "K8S_POD_SECURITY_ADMISSION_NOT_ENFORCED"
    }
    fn name(&self) -> &'static str {
        "No namespace enforces Pod Security Admission"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let cluster = cluster_rule!(ctx);
        if cluster.namespaces.iter().any(|ns| ns.pss_enforce_label_set()) {
            return Vec::new();
        }
        vec![cluster_finding(
            ctx,
            cluster,
            self.id(),
            &cluster.context_name,
            ResourceType::KubernetesCluster,
            Severity::High,
            "No namespace in the cluster enforces Pod Security Admission".to_string(),
            "Label at least your sensitive namespaces with pod-security.kubernetes.io/enforce".to_string(),
        )]
    }
}

/// K8S_NAMESPACE_PSS_NOT_SET: per-namespace absence of the PSA enforce
/// label.
pub struct NamespacePssNotSet;

impl Rule for NamespacePssNotSet {
    fn id(&self) -> &'static str {
        "K8S_NAMESPACE_PSS_NOT_SET"
    }
    fn name(&self) -> &'static str {
        "Namespace without a Pod Security Standard label"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let cluster = cluster_rule!(ctx);
        cluster
            .namespaces
            .iter()
            .filter(|ns| !ns.pss_enforce_label_set())
            .map(|ns| {
                cluster_finding(
                    ctx,
                    cluster,
                    self.id(),
                    &ns.name,
                    ResourceType::KubernetesNamespace,
                    Severity::Medium,
                    format!("Namespace {} has no Pod Security Standard label", ns.name),
                    "Set pod-security.kubernetes.io/enforce on this namespace".to_string(),
                )
            })
            .collect()
    }
}

/// K8S_SERVICEACCOUNT_TOKEN_AUTOMOUNT: a service account that automounts its
/// token (either explicitly `true` or left unset).
pub struct ServiceaccountTokenAutomount;

impl Rule for ServiceaccountTokenAutomount {
    fn id(&self) -> &'static str {
        "K8S_SERVICEACCOUNT_TOKEN_AUTOMOUNT"
    }
    fn name(&self) -> &'static str {
        "Service account automounts its token"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let cluster = cluster_rule!(ctx);
        cluster
            .service_accounts
            .iter()
            .filter(|sa| sa.automounts_token())
            .map(|sa| {
                cluster_finding(
                    ctx,
                    cluster,
                    self.id(),
                    &format!("{}/{}", sa.namespace, sa.name),
                    ResourceType::KubernetesServiceAccount,
                    Severity::Medium,
                    format!("Service account {}/{} automounts its token", sa.namespace, sa.name),
                    "Set automountServiceAccountToken: false unless the workload calls the Kubernetes API".to_string(),
                )
            })
            .collect()
    }
}

/// K8S_DEFAULT_SERVICEACCOUNT_USED: a pod explicitly or implicitly uses the
/// `default` service account.
pub struct DefaultServiceaccountUsed;

impl Rule for DefaultServiceaccountUsed {
    fn id(&self) -> &'static str {
        "K8S_DEFAULT_SERVICEACCOUNT_USED"
    }
    fn name(&self) -> &'static str {
        "Pod uses the default service account"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let cluster = cluster_rule!(ctx);
        cluster
            .pods
            .iter()
            .filter(|p| p.service_account_name == "default")
            .map(|pod| {
                cluster_finding(
                    ctx,
                    cluster,
                    self.id(),
                    &format!("{}/{}", pod.namespace, pod.name),
                    ResourceType::KubernetesPod,
                    Severity::Medium,
                    format!("Pod {}/{} runs under the default service account", pod.namespace, pod.name),
                    "Create and bind a dedicated, least-privilege service account".to_string(),
                )
            })
            .collect()
    }
}

pub fn register_all(registry: &mut crate::rules::Registry) -> Result<(), crate::errors::EngineError> {
    registry.register(Box::new(ClusterSingleNode))?;
    registry.register(Box::new(NodeOverallocated))?;
    registry.register(Box::new(NamespaceWithoutLimits))?;
    registry.register(Box::new(PodPrivilegedContainer))?;
    registry.register(Box::new(PodHostNetwork))?;
    registry.register(Box::new(PodHostPidOrIpc))?;
    registry.register(Box::new(PodRunAsRoot))?;
    registry.register(Box::new(PodCapSysAdmin))?;
    registry.register(Box::new(PodNoSeccomp))?;
    registry.register(Box::new(ServicePublicLoadbalancer))?;
    registry.register(Box::new(PodNoResourceRequests))?;
    registry.register(Box::new(PodSecurityAdmissionNotEnforced))?;
    registry.register(Box::new(NamespacePssNotSet))?;
    registry.register(Box::new(ServiceaccountTokenAutomount))?;
    registry.register(Box::new(DefaultServiceaccountUsed))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::kubernetes::{KubernetesNamespace, KubernetesNode};
    use crate::rules::tests_support::empty_ctx;
    use std::collections::BTreeMap as Map;
    use std::sync::Arc;

    fn ctx_with_cluster(cluster: KubernetesClusterData) -> RuleContext {
        let mut ctx = empty_ctx();
        ctx.cluster_data = Some(Arc::new(cluster));
        ctx
    }

    #[test]
    fn node_overallocated_skips_zero_capacity() {
        let mut cluster = KubernetesClusterData::default();
        cluster.nodes.push(KubernetesNode {
            name: "node-1".into(),
            cpu_capacity_millis: 0,
            cpu_allocatable_millis: 0,
            provider_id: String::new(),
            labels: Map::new(),
        });
        let findings = NodeOverallocated.evaluate(&ctx_with_cluster(cluster));
        assert!(findings.is_empty());
    }

    #[test]
    fn node_overallocated_boundary_does_not_fire() {
        let mut cluster = KubernetesClusterData::default();
        cluster.nodes.push(KubernetesNode {
            name: "node-1".into(),
            cpu_capacity_millis: 1000,
            cpu_allocatable_millis: 200,
            provider_id: String::new(),
            labels: Map::new(),
        });
        let findings = NodeOverallocated.evaluate(&ctx_with_cluster(cluster));
        assert!(findings.is_empty(), "exactly 20% must not fire");
    }

    #[test]
    fn node_overallocated_fires_below_boundary() {
        let mut cluster = KubernetesClusterData::default();
        cluster.nodes.push(KubernetesNode {
            name: "node-1".into(),
            cpu_capacity_millis: 1000,
            cpu_allocatable_millis: 199,
            provider_id: String::new(),
            labels: Map::new(),
        });
        let findings = NodeOverallocated.evaluate(&ctx_with_cluster(cluster));
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn psa_not_enforced_checks_every_namespace() {
        let mut cluster = KubernetesClusterData::default();
        cluster.namespaces.push(KubernetesNamespace {
            name: "default".into(),
            has_limit_range: true,
            labels: Map::new(),
        });
        let findings = PodSecurityAdmissionNotEnforced.evaluate(&ctx_with_cluster(cluster.clone()));
        assert_eq!(findings.len(), 1);

        let mut labeled = Map::new();
        labeled.insert(
            crate::inventory::kubernetes::PSA_ENFORCE_LABEL.to_string(),
            "restricted".to_string(),
        );
        cluster.namespaces[0].labels = labeled;
        let findings = PodSecurityAdmissionNotEnforced.evaluate(&ctx_with_cluster(cluster));
        assert!(findings.is_empty());
    }
}
