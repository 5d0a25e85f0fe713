use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::{Display, EnumString};

use crate::inventory::severity::Severity;

/// Closed enum of every resource kind a rule can attach a finding to. Kept
/// closed (rather than a free-form string) so a typo in a new rule's resource
/// type is a compile error, not a silent wire-format drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResourceType {
    Ec2Instance,
    EbsVolume,
    NatGateway,
    RdsInstance,
    LoadBalancer,
    SavingsPlan,
    S3Bucket,
    SecurityGroup,
    IamUser,
    RootAccount,
    CloudTrail,
    GuardDuty,
    AwsConfigRecorder,
    KubernetesNode,
    KubernetesCluster,
    KubernetesNamespace,
    KubernetesPod,
    KubernetesService,
    KubernetesServiceAccount,
    EksCluster,
    EksNodegroup,
}

/// The four audit domains. Used for `Finding.domain`, policy enforcement
/// keys, and the unified AWS engine's per-domain report slices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Domain {
    Cost,
    Security,
    DataProtection,
    Kubernetes,
}

/// The atomic audit output. See spec §3 for field semantics and invariants:
/// `id` is deterministic for a given (rule, resource, region) triple within
/// one run; a single rule evaluation must never emit two findings sharing
/// `(rule_id, resource_id, region)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: String,
    pub rule_id: String,
    pub resource_id: String,
    pub resource_type: ResourceType,
    /// `"global"` for account-scoped findings, the kubeconfig context name
    /// for cluster-scoped findings, an AWS region code otherwise.
    pub region: String,
    pub account_id: String,
    pub profile: String,
    pub domain: Option<Domain>,
    pub severity: Severity,
    /// USD/month, always >= 0; 0 for security findings that carry no cost
    /// signal.
    pub estimated_monthly_savings: f64,
    pub explanation: String,
    pub recommendation: String,
    pub detected_at: DateTime<Utc>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Finding {
    /// Deterministic finding id for a (rule, resource) pair within one
    /// region. Rules that need to further disambiguate a resource (e.g.
    /// `SG_OPEN_SSH`, keyed by security-group id already unique per region)
    /// can pass that id straight through as `resource_id`.
    pub fn make_id(rule_id: &str, resource_id: &str) -> String {
        format!("{rule_id}-{resource_id}")
    }

    /// The `(resource_id, region)` merge key used by intra-domain merge
    /// (spec §4.4 step 5) — distinct from `(rule_id, resource_id, region)`,
    /// the intra-rule uniqueness key from spec §3 invariant 2.
    pub fn merge_key(&self) -> (String, String) {
        (self.resource_id.clone(), self.region.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_id_is_deterministic() {
        assert_eq!(Finding::make_id("EBS_UNATTACHED", "vol-abc"), "EBS_UNATTACHED-vol-abc");
        assert_eq!(
            Finding::make_id("EBS_UNATTACHED", "vol-abc"),
            Finding::make_id("EBS_UNATTACHED", "vol-abc")
        );
    }
}
