//! Domain engines (C5) and the unified AWS engine (C6): shared merge/sort
//! helpers live here so every domain engine and the unified engine apply
//! identical ordering (spec §4.4 steps 5-6).

pub mod cost;
pub mod data_protection;
pub mod kubernetes;
pub mod security;
pub mod unified;

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::collectors::aws::{collect_all_regions, collect_security_data, resolve_regions};
use crate::collectors::clients::AwsClientProvider;
use crate::errors::EngineError;
use crate::inventory::aws::{CostSummary, SecurityData};
use crate::inventory::finding::{Domain, Finding};
use crate::inventory::RuleContext;
use crate::policy::{should_fail, PolicyConfig};
use crate::report::{assemble, AuditReport};
use crate::rules::Registry;

/// Intra-domain merge (spec §4.4 step 5): partitions by `(resource_id,
/// region)` and within each group keeps only the highest-severity finding.
/// Insertion order among ties is whichever the scan encounters first — the
/// spec leaves tie-break order implementation-defined but stable, and a
/// `BTreeMap` walk plus "first wins on equal severity" gives exactly that.
pub fn merge_findings(findings: Vec<Finding>) -> Vec<Finding> {
    let mut winners: BTreeMap<(String, String), Finding> = BTreeMap::new();
    for finding in findings {
        let key = finding.merge_key();
        match winners.get(&key) {
            Some(existing) if existing.severity >= finding.severity => {}
            _ => {
                winners.insert(key, finding);
            }
        }
    }
    winners.into_values().collect()
}

/// Global sort (spec §4.4 step 6): severity descending, then
/// `estimated_monthly_savings` descending, then `resource_id` ascending.
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| b.estimated_monthly_savings.partial_cmp(&a.estimated_monthly_savings).unwrap_or(std::cmp::Ordering::Equal))
            .then_with(|| a.resource_id.cmp(&b.resource_id))
    });
}

/// Shared driver for the three AWS domain engines (cost/security/data-
/// protection, spec §4.4): resolve regions, collect only the inventory the
/// domain's rules actually read, evaluate the domain's registry per
/// `(profile, region)`, merge, sort, and assemble a report. `needs_security`
/// skips the account-global security collection entirely for domains whose
/// rules never touch `RegionData.security`, avoiding IAM/CloudTrail/GuardDuty/
/// Config calls a cost audit has no use for.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn run_aws_domain_audit(
    provider: Arc<dyn AwsClientProvider>,
    profile: &str,
    account_id: &str,
    regions: &[String],
    days_back: i64,
    policy: Option<Arc<PolicyConfig>>,
    cancellation: CancellationToken,
    domain: Domain,
    audit_type: &'static str,
    needs_security: bool,
    register: fn(&mut Registry) -> Result<(), EngineError>,
) -> Result<(AuditReport, bool), EngineError> {
    let resolved_regions = resolve_regions(provider.as_ref(), profile, regions).await.map_err(|source| {
        if source.is_credential_failure() {
            EngineError::CredentialFailure {
                profile: profile.to_string(),
                source,
            }
        } else {
            EngineError::NoInventoryCollected { domain }
        }
    })?;
    if resolved_regions.is_empty() {
        return Err(EngineError::NoInventoryCollected { domain });
    }

    let security = if needs_security {
        Arc::new(collect_security_data(provider.as_ref(), profile, &resolved_regions).await)
    } else {
        Arc::new(SecurityData::default())
    };

    if cancellation.is_cancelled() {
        return Err(EngineError::Cancelled);
    }

    let region_datas = collect_all_regions(
        provider.clone(),
        profile.to_string(),
        resolved_regions.clone(),
        days_back,
        security,
        cancellation.clone(),
    )
    .await;

    if cancellation.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    if region_datas.is_empty() {
        return Err(EngineError::NoInventoryCollected { domain });
    }

    let mut registry = Registry::new();
    register(&mut registry)?;

    let mut findings = Vec::new();
    for region_data in region_datas {
        let ctx = RuleContext {
            account_id: account_id.to_string(),
            profile: profile.to_string(),
            region_data: Some(Arc::new(region_data)),
            cost_summary: None,
            cluster_data: None,
            policy: policy.clone(),
        };
        findings.extend(registry.evaluate_all(&ctx));
    }

    let mut findings = merge_findings(findings);
    sort_findings(&mut findings);

    let cost_summary = (domain == Domain::Cost).then(|| CostSummary {
        total_estimated_monthly_savings_usd: findings.iter().map(|f| f.estimated_monthly_savings).sum(),
    });

    let fail = should_fail(domain, &findings, policy.as_deref());
    let report = assemble(audit_type, profile, account_id, resolved_regions, findings, cost_summary, Vec::new(), Vec::new(), None);

    Ok((report, fail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::finding::{Domain, ResourceType};
    use crate::inventory::severity::Severity;
    use chrono::Utc;
    use std::collections::BTreeMap as Map;

    fn finding(rule_id: &str, resource_id: &str, region: &str, severity: Severity, savings: f64) -> Finding {
        Finding {
            id: format!("{rule_id}-{resource_id}"),
            rule_id: rule_id.to_string(),
            resource_id: resource_id.to_string(),
            resource_type: ResourceType::Ec2Instance,
            region: region.to_string(),
            account_id: "123456789012".into(),
            profile: "default".into(),
            domain: Some(Domain::Cost),
            severity,
            estimated_monthly_savings: savings,
            explanation: String::new(),
            recommendation: String::new(),
            detected_at: Utc::now(),
            metadata: Map::new(),
        }
    }

    #[test]
    fn merge_keeps_highest_severity_per_resource_region() {
        let findings = vec![
            finding("EC2_LOW_CPU", "i-1", "us-east-1", Severity::Medium, 0.0),
            finding("EBS_UNENCRYPTED", "i-1", "us-east-1", Severity::High, 0.0),
        ];
        let merged = merge_findings(findings);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].severity, Severity::High);
    }

    #[test]
    fn merge_preserves_distinct_resources() {
        let findings = vec![
            finding("EBS_UNATTACHED", "vol-a", "us-east-1", Severity::Medium, 8.0),
            finding("EBS_UNATTACHED", "vol-b", "us-east-1", Severity::Medium, 8.0),
        ];
        assert_eq!(merge_findings(findings).len(), 2);
    }

    #[test]
    fn sort_orders_by_severity_then_savings_then_resource_id() {
        let mut findings = vec![
            finding("A", "z", "us-east-1", Severity::High, 10.0),
            finding("B", "a", "us-east-1", Severity::Critical, 0.0),
            finding("C", "m", "us-east-1", Severity::High, 50.0),
        ];
        sort_findings(&mut findings);
        assert_eq!(findings[0].resource_id, "a");
        assert_eq!(findings[1].resource_id, "m");
        assert_eq!(findings[2].resource_id, "z");
    }
}
