//! Kubernetes domain engine (C5, spec §4.4): drives the Kubernetes/EKS
//! collectors, evaluates `rules::kubernetes` and `rules::eks` against a
//! single cluster context, merges/sorts, optionally correlates risk chains
//! and attack paths (C7), and assembles a Kubernetes `AuditReport`.

use std::sync::Arc;

use crate::collectors::clients::AwsClientProvider;
use crate::collectors::kubernetes::{self, KubeClient};
use crate::correlation::correlate;
use crate::engine::{merge_findings, sort_findings};
use crate::errors::EngineError;
use crate::inventory::finding::Domain;
use crate::inventory::RuleContext;
use crate::policy::{should_fail, PolicyConfig};
use crate::report::assemble;
use crate::report::AuditReport;
use crate::rules::Registry;

const KUBE_SYSTEM_PREFIX: &str = "kube-system/";

fn build_registry() -> Result<Registry, EngineError> {
    let mut registry = Registry::new();
    crate::rules::kubernetes::register_all(&mut registry)?;
    crate::rules::eks::register_all(&mut registry)?;
    Ok(registry)
}

/// `--exclude-system` (spec §6): suppress findings scoped to a namespaced
/// resource (`"<namespace>/<name>"`) in `kube-system`. Account- and
/// cluster-scoped findings (nodes, the cluster itself, EKS control-plane
/// findings) are unaffected since they carry no namespace prefix.
fn exclude_system_namespace(findings: Vec<crate::inventory::finding::Finding>) -> Vec<crate::inventory::finding::Finding> {
    findings.into_iter().filter(|f| !f.resource_id.starts_with(KUBE_SYSTEM_PREFIX)).collect()
}

#[allow(clippy::too_many_arguments)]
pub async fn run_kubernetes_audit(
    kube: &dyn KubeClient,
    aws_provider: Option<Arc<dyn AwsClientProvider>>,
    aws_profile: &str,
    account_id: &str,
    profile: &str,
    context: Option<&str>,
    cluster_name: Option<&str>,
    exclude_system: bool,
    include_risk_chains: bool,
    policy: Option<Arc<PolicyConfig>>,
) -> Result<(AuditReport, bool), EngineError> {
    let cluster_data = match aws_provider {
        Some(provider) => kubernetes::collect_with_provider(kube, provider, aws_profile, context, cluster_name).await,
        None => kubernetes::collect(kube, None, context, cluster_name).await,
    }
    .map_err(|source| EngineError::CredentialFailure {
        profile: profile.to_string(),
        source,
    })?;

    if cluster_data.nodes.is_empty() {
        return Err(EngineError::NoInventoryCollected { domain: Domain::Kubernetes });
    }

    let registry = build_registry()?;
    let cluster_context_name = cluster_data.context_name.clone();
    let cluster_provider = if cluster_data.eks.is_some() { "eks" } else { "kubernetes" };
    let ctx = RuleContext {
        account_id: account_id.to_string(),
        profile: profile.to_string(),
        region_data: None,
        cost_summary: None,
        cluster_data: Some(Arc::new(cluster_data)),
        policy: policy.clone(),
    };

    let mut findings = registry.evaluate_all(&ctx);
    if exclude_system {
        findings = exclude_system_namespace(findings);
    }

    let mut findings = merge_findings(findings);
    sort_findings(&mut findings);

    let (attack_paths, risk_chains) = if include_risk_chains {
        let correlation = correlate(&findings);
        (correlation.attack_paths, correlation.risk_chains)
    } else {
        (Vec::new(), Vec::new())
    };

    let fail = should_fail(Domain::Kubernetes, &findings, policy.as_deref());
    let region = if cluster_context_name.is_empty() {
        "default".to_string()
    } else {
        cluster_context_name
    };
    let metadata = std::collections::BTreeMap::from([("cluster_provider".to_string(), serde_json::json!(cluster_provider))]);
    let report = assemble(
        "kubernetes",
        profile,
        account_id,
        vec![region],
        findings,
        None,
        attack_paths,
        risk_chains,
        Some(metadata),
    );

    Ok((report, fail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::finding::{Domain as FindingDomain, Finding, ResourceType};
    use crate::inventory::severity::Severity;
    use chrono::Utc;
    use std::collections::BTreeMap as Map;

    fn finding(resource_id: &str) -> Finding {
        Finding {
            id: "x".into(),
            rule_id: "K8S_POD_HOST_NETWORK".into(),
            resource_id: resource_id.to_string(),
            resource_type: ResourceType::KubernetesPod,
            region: "default".into(),
            account_id: "123456789012".into(),
            profile: "default".into(),
            domain: Some(FindingDomain::Kubernetes),
            severity: Severity::High,
            estimated_monthly_savings: 0.0,
            explanation: String::new(),
            recommendation: String::new(),
            detected_at: Utc::now(),
            metadata: Map::new(),
        }
    }

    #[test]
    fn exclude_system_drops_kube_system_scoped_findings_only() {
        let findings = vec![finding("kube-system/coredns"), finding("default/my-app")];
        let filtered = exclude_system_namespace(findings);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].resource_id, "default/my-app");
    }
}
