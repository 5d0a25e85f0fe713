//! Unified AWS engine (C6, spec §4.5): runs cost, security, and
//! data-protection sequentially and concatenates their already-merged
//! findings. **Never runs a second merge pass** — doing so would collapse a
//! resource's distinct cost (MEDIUM) and security (HIGH) findings into one,
//! silently re-labeling the cost finding (spec §9, regression-tested by
//! scenario 4 in `tests/scenarios.rs`).

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::collectors::clients::AwsClientProvider;
use crate::engine::{cost, data_protection, security, sort_findings};
use crate::errors::EngineError;
use crate::inventory::finding::Domain;
use crate::policy::PolicyConfig;
use crate::report::{assemble, AuditReport};

/// Runs the three AWS domain engines and returns the unified report plus the
/// list of domains whose policy enforcement tripped (spec §6: callers exit
/// non-zero if this list is non-empty).
#[allow(clippy::too_many_arguments)]
pub async fn run_unified_aws_audit(
    provider: Arc<dyn AwsClientProvider>,
    profile: &str,
    account_id: &str,
    regions: &[String],
    days_back: i64,
    policy: Option<Arc<PolicyConfig>>,
    cancellation: CancellationToken,
) -> Result<(AuditReport, Vec<Domain>), EngineError> {
    let (cost_report, cost_failed) = cost::run_cost_audit(
        provider.clone(),
        profile,
        account_id,
        regions,
        days_back,
        policy.clone(),
        cancellation.clone(),
    )
    .await?;

    let (security_report, security_failed) = security::run_security_audit(
        provider.clone(),
        profile,
        account_id,
        regions,
        days_back,
        policy.clone(),
        cancellation.clone(),
    )
    .await?;

    let (data_protection_report, data_protection_failed) = data_protection::run_data_protection_audit(
        provider,
        profile,
        account_id,
        regions,
        days_back,
        policy,
        cancellation,
    )
    .await?;

    let mut failed_domains = Vec::new();
    if cost_failed {
        failed_domains.push(Domain::Cost);
    }
    if security_failed {
        failed_domains.push(Domain::Security);
    }
    if data_protection_failed {
        failed_domains.push(Domain::DataProtection);
    }

    let mut unified_regions = Vec::new();
    for region in cost_report
        .regions
        .iter()
        .chain(security_report.regions.iter())
        .chain(data_protection_report.regions.iter())
    {
        if !unified_regions.contains(region) {
            unified_regions.push(region.clone());
        }
    }

    let mut findings = cost_report.findings;
    findings.extend(security_report.findings);
    findings.extend(data_protection_report.findings);
    sort_findings(&mut findings);

    let report = assemble(
        "aws_all",
        profile,
        account_id,
        unified_regions,
        findings,
        cost_report.cost_summary,
        Vec::new(),
        Vec::new(),
        None,
    );

    Ok((report, failed_domains))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::finding::{Domain as FindingDomain, Finding, ResourceType};
    use crate::inventory::severity::Severity;
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn finding(rule_id: &str, domain: FindingDomain, severity: Severity) -> Finding {
        Finding {
            id: format!("{rule_id}-vol-xyz"),
            rule_id: rule_id.to_string(),
            resource_id: "vol-xyz".into(),
            resource_type: ResourceType::EbsVolume,
            region: "us-east-1".into(),
            account_id: "123456789012".into(),
            profile: "default".into(),
            domain: Some(domain),
            severity,
            estimated_monthly_savings: 0.0,
            explanation: String::new(),
            recommendation: String::new(),
            detected_at: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    /// Regression test for spec §9's named invariant: concatenating two
    /// sub-reports' findings for the same resource must never collapse them
    /// into one, even though they share `(resource_id, region)`.
    #[test]
    fn concatenation_never_merges_across_domains() {
        let cost_finding = finding("EBS_GP2_LEGACY", FindingDomain::Cost, Severity::Medium);
        let security_finding = finding("EBS_UNENCRYPTED", FindingDomain::DataProtection, Severity::High);
        let mut findings = vec![cost_finding, security_finding];
        sort_findings(&mut findings);
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[1].severity, Severity::Medium);
    }
}
