use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;

use crate::inventory::finding::{Domain, Finding, ResourceType};
use crate::inventory::kubernetes::{EksData, KubernetesClusterData, EKS_CLUSTER_LOGGING_TYPES, EKS_CONTROL_PLANE_REQUIRED_LOG_TYPES};
use crate::inventory::severity::Severity;
use crate::inventory::RuleContext;
use crate::rules::Rule;

fn finding(
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

macro_rules! eks_rule {
    ($ctx:expr) => {{
        let cluster = match &$ctx.cluster_data {
            Some(c) => c.as_ref(),
            None => return Vec::new(),
        };
        match &cluster.eks {
            Some(eks) => (cluster, eks),
            None => return Vec::new(),
        }
    }};
}

/// EKS_PUBLIC_ENDPOINT_ENABLED / EKS_PUBLIC_ENDPOINT_WIDE_OPEN: the cluster's
/// API server has public endpoint access enabled; WIDE_OPEN when
/// `0.0.0.0/0` is among the allowed CIDRs.
pub struct PublicEndpoint;

impl Rule for PublicEndpoint {
    fn id(&self) -> &'static str {
        "EKS_PUBLIC_ENDPOINT_ENABLED"
    }
    fn name(&self) -> &'static str {
        "EKS cluster API server reachable from the public internet"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let (cluster, eks) = eks_rule!(ctx);
        if !eks.endpoint_public_access {
            return Vec::new();
        }
        let wide_open = eks.public_access_cidrs.iter().any(|c| c == "0.0.0.0/0");
        if wide_open {
            vec![finding(
                ctx,
                cluster,
                "EKS_PUBLIC_ENDPOINT_WIDE_OPEN",
                &eks.cluster_name,
                ResourceType::EksCluster,
                Severity::Critical,
                format!("Cluster {} API server is public and open to 0.0.0.0/0", eks.cluster_name),
                "Restrict publicAccessCidrs to known IP ranges or disable public access".to_string(),
            )]
        } else {
            vec![finding(
                ctx,
                cluster,
                self.id(),
                &eks.cluster_name,
                ResourceType::EksCluster,
                Severity::High,
                format!("Cluster {} API server has public endpoint access enabled", eks.cluster_name),
                "Disable public endpoint access or restrict publicAccessCidrs".to_string(),
            )]
        }
    }
}

/// EKS_CLUSTER_LOGGING_DISABLED / PARTIAL: no control-plane log types
/// enabled (DISABLED), or 1-3 of the 4 tracked types enabled (PARTIAL).
pub struct ClusterLogging;

impl Rule for ClusterLogging {
    fn id(&self) -> &'static str {
        "EKS_CLUSTER_LOGGING_DISABLED"
    }
    fn name(&self) -> &'static str {
        "EKS control-plane logging disabled or partially enabled"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let (cluster, eks) = eks_rule!(ctx);
        let enabled_count = EKS_CLUSTER_LOGGING_TYPES
            .iter()
            .filter(|t| eks.enabled_log_types.iter().any(|e| e == *t))
            .count();
        match enabled_count {
            0 => vec![finding(
                ctx,
                cluster,
                self.id(),
                &eks.cluster_name,
                ResourceType::EksCluster,
                Severity::Medium,
                format!("Cluster {} has no control-plane log types enabled", eks.cluster_name),
                "Enable audit, authenticator, controllerManager and scheduler logging".to_string(),
            )],
            1..=3 => vec![finding(
                ctx,
                cluster,
                "EKS_CLUSTER_LOGGING_PARTIAL",
                &eks.cluster_name,
                ResourceType::EksCluster,
                Severity::Medium,
                format!("Cluster {} has only {} of 4 tracked log types enabled", eks.cluster_name, enabled_count),
                "Enable the remaining control-plane log types".to_string(),
            )],
            _ => Vec::new(),
        }
    }
}

/// EKS_CONTROL_PLANE_LOGGING_DISABLED: missing any of {api, audit,
/// authenticator} — a stricter check than `ClusterLogging` above.
pub struct ControlPlaneLoggingDisabled;

impl Rule for ControlPlaneLoggingDisabled {
    fn id(&self) -> &'static str {
        "EKS_CONTROL_PLANE_LOGGING_DISABLED"
    }
    fn name(&self) -> &'static str {
        "EKS control-plane core log types missing"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let (cluster, eks) = eks_rule!(ctx);
        let missing_any = EKS_CONTROL_PLANE_REQUIRED_LOG_TYPES
            .iter()
            .any(|t| !eks.enabled_log_types.iter().any(|e| e == t));
        if missing_any {
            vec![finding(
                ctx,
                cluster,
                self.id(),
                &eks.cluster_name,
                ResourceType::EksCluster,
                Severity::High,
                format!("Cluster {} is missing one of api/audit/authenticator logging", eks.cluster_name),
                "Enable api, audit and authenticator control-plane logging".to_string(),
            )]
        } else {
            Vec::new()
        }
    }
}

/// EKS_SECRETS_ENCRYPTION_DISABLED / EKS_ENCRYPTION_DISABLED: no KMS key
/// configured for envelope encryption of Kubernetes secrets.
pub struct SecretsEncryptionDisabled;

impl Rule for SecretsEncryptionDisabled {
    fn id(&self) -> &'static str {
        "EKS_SECRETS_ENCRYPTION_DISABLED"
    }
    fn name(&self) -> &'static str {
        "EKS secrets envelope encryption disabled"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let (cluster, eks) = eks_rule!(ctx);
        if eks.secrets_encryption_kms_key_arn.is_none() {
            vec![finding(
                ctx,
                cluster,
                self.id(),
                &eks.cluster_name,
                ResourceType::EksCluster,
                Severity::High,
                format!("Cluster {} has no KMS key configured for secrets envelope encryption", eks.cluster_name),
                "Enable secrets encryption with a customer-managed KMS key".to_string(),
            )]
        } else {
            Vec::new()
        }
    }
}

/// EKS_OIDC_PROVIDER_MISSING / NOT_ASSOCIATED: the cluster has no OIDC
/// issuer URL, or an issuer but no associated IAM OIDC provider.
pub struct OidcProviderMissing;

impl Rule for OidcProviderMissing {
    fn id(&self) -> &'static str {
        "EKS_OIDC_PROVIDER_MISSING"
    }
    fn name(&self) -> &'static str {
        "EKS cluster has no OIDC issuer"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let (cluster, eks) = eks_rule!(ctx);
        if eks.oidc_issuer.is_empty() {
            return vec![finding(
                ctx,
                cluster,
                self.id(),
                &eks.cluster_name,
                ResourceType::EksCluster,
                Severity::High,
                format!("Cluster {} has no OIDC issuer configured", eks.cluster_name),
                "Enable the OIDC issuer on this cluster to support IRSA".to_string(),
            )];
        }
        if eks.oidc_provider_arn.is_empty() {
            return vec![finding(
                ctx,
                cluster,
                "EKS_OIDC_PROVIDER_NOT_ASSOCIATED",
                &eks.cluster_name,
                ResourceType::EksCluster,
                Severity::High,
                format!("Cluster {} has an OIDC issuer but no associated IAM OIDC provider", eks.cluster_name),
                "Create an IAM OIDC provider for this cluster's issuer".to_string(),
            )];
        }
        Vec::new()
    }
}

/// EKS_SERVICEACCOUNT_NO_IRSA: a service account missing the IRSA role-arn
/// annotation.
pub struct ServiceaccountNoIrsa;

impl Rule for ServiceaccountNoIrsa {
    fn id(&self) -> &'static str {
        "EKS_SERVICEACCOUNT_NO_IRSA"
    }
    fn name(&self) -> &'static str {
        "Service account without an IRSA role binding"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let (cluster, _eks) = eks_rule!(ctx);
        cluster
            .service_accounts
            .iter()
            .filter(|sa| !sa.has_irsa_binding())
            .map(|sa| {
                finding(
                    ctx,
                    cluster,
                    self.id(),
                    &format!("{}/{}", sa.namespace, sa.name),
                    ResourceType::KubernetesServiceAccount,
                    Severity::High,
                    format!("Service account {}/{} has no eks.amazonaws.com/role-arn annotation", sa.namespace, sa.name),
                    "Bind this service account to an IAM role via IRSA if it needs AWS API access".to_string(),
                )
            })
            .collect()
    }
}

/// EKS_NODE_ROLE_OVERPERMISSIVE: a managed nodegroup's IAM role carries at
/// least one overpermissive policy (AdministratorAccess or a wildcard
/// `Action`), as resolved by the node-role audit during collection.
pub struct NodeRoleOverpermissive;

impl Rule for NodeRoleOverpermissive {
    fn id(&self) -> &'static str {
        "EKS_NODE_ROLE_OVERPERMISSIVE"
    }
    fn name(&self) -> &'static str {
        "EKS nodegroup IAM role is overpermissive"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let (cluster, eks) = eks_rule!(ctx);
        eks.nodegroups
            .iter()
            .filter(|ng| !ng.node_role_policies.is_empty())
            .map(|ng| {
                finding(
                    ctx,
                    cluster,
                    self.id(),
                    &ng.name,
                    ResourceType::EksNodegroup,
                    Severity::Critical,
                    format!(
                        "Nodegroup {} IAM role carries overpermissive policies: {}",
                        ng.name,
                        ng.node_role_policies.join(", ")
                    ),
                    "Replace the wildcard/AdministratorAccess policy with a least-privilege one".to_string(),
                )
            })
            .collect()
    }
}

/// EKS_NODEGROUP_IMDSV2_NOT_ENFORCED: a nodegroup's launch template does not
/// require IMDSv2 tokens.
pub struct NodegroupImdsv2NotEnforced;

impl Rule for NodegroupImdsv2NotEnforced {
    fn id(&self) -> &'static str {
        "EKS_NODEGROUP_IMDSV2_NOT_ENFORCED"
    }
    fn name(&self) -> &'static str {
        "EKS nodegroup does not enforce IMDSv2"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let (cluster, eks) = eks_rule!(ctx);
        eks.nodegroups
            .iter()
            .filter(|ng| ng.http_tokens != "required")
            .map(|ng| {
                finding(
                    ctx,
                    cluster,
                    self.id(),
                    &ng.name,
                    ResourceType::EksNodegroup,
                    Severity::High,
                    format!("Nodegroup {} does not require IMDSv2 tokens", ng.name),
                    "Set the launch template's HttpTokens to 'required'".to_string(),
                )
            })
            .collect()
    }
}

static VERSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^v?(\d+)\.(\d+)(?:\.(\d+))?(?:-.*)?$").unwrap());

/// Parses a loose `[v]MAJOR.MINOR[.PATCH][-suffix]` version string (the
/// format both EKS control-plane and nodegroup Kubernetes versions are
/// reported in) into `(major, minor)`. Returns `None` for anything that
/// doesn't match, so callers can skip unparsable versions rather than guess.
pub fn parse_major_minor(version: &str) -> Option<(u32, u32)> {
    let caps = VERSION_RE.captures(version.trim())?;
    let major = caps.get(1)?.as_str().parse().ok()?;
    let minor = caps.get(2)?.as_str().parse().ok()?;
    Some((major, minor))
}

/// EKS_NODE_VERSION_SKEW: nodegroup Kubernetes version more than one minor
/// version behind (or ahead of) the control plane.
pub struct NodeVersionSkew;

impl Rule for NodeVersionSkew {
    fn id(&self) -> &'static str {
        "EKS_NODE_VERSION_SKEW"
    }
    fn name(&self) -> &'static str {
        "EKS nodegroup Kubernetes version skewed from control plane"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let (cluster, eks) = eks_rule!(ctx);
        let Some((_, cp_minor)) = parse_major_minor(&eks.control_plane_version) else {
            return Vec::new();
        };
        eks.nodegroups
            .iter()
            .filter_map(|ng| {
                let (_, ng_minor) = parse_major_minor(&ng.kubernetes_version)?;
                let skew = (cp_minor as i64 - ng_minor as i64).abs();
                if skew > 1 {
                    Some(finding(
                        ctx,
                        cluster,
                        self.id(),
                        &ng.name,
                        ResourceType::EksNodegroup,
                        Severity::Medium,
                        format!(
                            "Nodegroup {} is on Kubernetes {} while the control plane is on {} ({} minor versions apart)",
                            ng.name, ng.kubernetes_version, eks.control_plane_version, skew
                        ),
                        "Upgrade this nodegroup to within one minor version of the control plane".to_string(),
                    ))
                } else {
                    None
                }
            })
            .collect()
    }
}

pub fn register_all(registry: &mut crate::rules::Registry) -> Result<(), crate::errors::EngineError> {
    registry.register(Box::new(PublicEndpoint))?;
    registry.register(Box::new(ClusterLogging))?;
    registry.register(Box::new(ControlPlaneLoggingDisabled))?;
    registry.register(Box::new(SecretsEncryptionDisabled))?;
    registry.register(Box::new(OidcProviderMissing))?;
    registry.register(Box::new(ServiceaccountNoIrsa))?;
    registry.register(Box::new(NodeRoleOverpermissive))?;
    registry.register(Box::new(NodegroupImdsv2NotEnforced))?;
    registry.register(Box::new(NodeVersionSkew))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::kubernetes::EksNodegroup;
    use crate::rules::tests_support::empty_ctx;
    use std::sync::Arc;

    fn cluster_with_eks(eks: EksData) -> KubernetesClusterData {
        let mut cluster = KubernetesClusterData::default();
        cluster.eks = Some(eks);
        cluster
    }

    #[test]
    fn version_skew_parses_loose_formats() {
        assert_eq!(parse_major_minor("v1.28.4-eks-abc123"), Some((1, 28)));
        assert_eq!(parse_major_minor("1.28"), Some((1, 28)));
        assert_eq!(parse_major_minor("not-a-version"), None);
    }

    #[test]
    fn version_skew_within_one_minor_never_fires() {
        let eks = EksData {
            cluster_name: "c1".into(),
            control_plane_version: "1.28".into(),
            nodegroups: vec![EksNodegroup {
                name: "ng-1".into(),
                kubernetes_version: "1.27".into(),
                http_tokens: "required".into(),
                node_role_policies: Vec::new(),
            }],
            ..Default::default()
        };
        let mut ctx = empty_ctx();
        ctx.cluster_data = Some(Arc::new(cluster_with_eks(eks)));
        assert!(NodeVersionSkew.evaluate(&ctx).is_empty());
    }

    #[test]
    fn version_skew_of_two_fires() {
        let eks = EksData {
            cluster_name: "c1".into(),
            control_plane_version: "1.28".into(),
            nodegroups: vec![EksNodegroup {
                name: "ng-1".into(),
                kubernetes_version: "1.26".into(),
                http_tokens: "required".into(),
                node_role_policies: Vec::new(),
            }],
            ..Default::default()
        };
        let mut ctx = empty_ctx();
        ctx.cluster_data = Some(Arc::new(cluster_with_eks(eks)));
        let findings = NodeVersionSkew.evaluate(&ctx);
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn version_skew_skips_unparsable_versions() {
        let eks = EksData {
            cluster_name: "c1".into(),
            control_plane_version: "garbage".into(),
            nodegroups: vec![EksNodegroup {
                name: "ng-1".into(),
                kubernetes_version: "1.26".into(),
                http_tokens: "required".into(),
                node_role_policies: Vec::new(),
            }],
            ..Default::default()
        };
        let mut ctx = empty_ctx();
        ctx.cluster_data = Some(Arc::new(cluster_with_eks(eks)));
        assert!(NodeVersionSkew.evaluate(&ctx).is_empty());
    }

    #[test]
    fn cluster_logging_partial_boundaries() {
        let mut eks = EksData {
            cluster_name: "c1".into(),
            ..Default::default()
        };
        let ctx_for = |eks: EksData| {
            let mut ctx = empty_ctx();
            ctx.cluster_data = Some(Arc::new(cluster_with_eks(eks)));
            ctx
        };

        // 0 enabled -> DISABLED
        let findings = ClusterLogging.evaluate(&ctx_for(eks.clone()));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_id, "EKS_CLUSTER_LOGGING_DISABLED");

        // 2 of 4 -> PARTIAL
        eks.enabled_log_types = vec!["audit".into(), "authenticator".into()];
        let findings = ClusterLogging.evaluate(&ctx_for(eks.clone()));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_id, "EKS_CLUSTER_LOGGING_PARTIAL");

        // all 4 -> none
        eks.enabled_log_types = vec!["audit".into(), "authenticator".into(), "controllerManager".into(), "scheduler".into()];
        let findings = ClusterLogging.evaluate(&ctx_for(eks));
        assert!(findings.is_empty());
    }

    #[test]
    fn public_endpoint_wide_open_is_critical() {
        let eks = EksData {
            cluster_name: "c1".into(),
            endpoint_public_access: true,
            public_access_cidrs: vec!["0.0.0.0/0".into()],
            ..Default::default()
        };
        let mut ctx = empty_ctx();
        ctx.cluster_data = Some(Arc::new(cluster_with_eks(eks)));
        let findings = PublicEndpoint.evaluate(&ctx);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].rule_id, "EKS_PUBLIC_ENDPOINT_WIDE_OPEN");
        assert_eq!(findings[0].severity, Severity::Critical);
    }
}
