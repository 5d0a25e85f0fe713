pub mod aws;
pub mod finding;
pub mod kubernetes;
pub mod severity;

use std::sync::Arc;

use crate::policy::PolicyConfig;

/// Everything a rule's `evaluate` call can see. Rules receive this by shared
/// reference and must never mutate it (spec §3 invariant 3, §9) — there is
/// no `&mut` path into any of these fields from rule code.
#[derive(Clone)]
pub struct RuleContext {
    pub account_id: String,
    pub profile: String,
    pub region_data: Option<Arc<aws::RegionData>>,
    pub cost_summary: Option<Arc<aws::CostSummary>>,
    pub cluster_data: Option<Arc<kubernetes::KubernetesClusterData>>,
    pub policy: Option<Arc<PolicyConfig>>,
}

impl RuleContext {
    pub fn param(&self, rule_id: &str, name: &str, default: f64) -> f64 {
        match &self.policy {
            Some(policy) => policy.param(rule_id, name, default),
            None => default,
        }
    }
}
