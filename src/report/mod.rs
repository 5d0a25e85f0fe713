//! Report assembly (C8, spec §4.8/§6): a pure function of the already-merged
//! and sorted finding set plus optional correlation results. No I/O; the
//! only non-determinism is the report id and timestamp, both stamped here.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::correlation::{AttackPath, RiskChain};
use crate::inventory::aws::CostSummary;
use crate::inventory::finding::Finding;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditSummary {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub total_estimated_monthly_savings_usd: f64,
    /// Max attack-path score, falling back to max risk-chain score, falling
    /// back to 0 (spec §4.6).
    pub risk_score: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attack_paths: Option<Vec<AttackPath>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_chains: Option<Vec<RiskChain>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub report_id: String,
    pub generated_at: DateTime<Utc>,
    pub audit_type: String,
    pub profile: String,
    pub account_id: String,
    pub regions: Vec<String>,
    pub summary: AuditSummary,
    pub findings: Vec<Finding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_summary: Option<CostSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
}

fn risk_score(attack_paths: &[AttackPath], risk_chains: &[RiskChain]) -> u32 {
    attack_paths
        .iter()
        .map(|p| p.score)
        .max()
        .or_else(|| risk_chains.iter().map(|c| c.score).max())
        .unwrap_or(0)
}

pub fn summarize(findings: &[Finding], attack_paths: &[AttackPath], risk_chains: &[RiskChain]) -> AuditSummary {
    use crate::inventory::severity::Severity;

    let mut summary = AuditSummary {
        total: findings.len(),
        risk_score: risk_score(attack_paths, risk_chains),
        ..Default::default()
    };
    for f in findings {
        match f.severity {
            Severity::Critical => summary.critical += 1,
            Severity::High => summary.high += 1,
            Severity::Medium => summary.medium += 1,
            Severity::Low => summary.low += 1,
            Severity::Info => {}
        }
        summary.total_estimated_monthly_savings_usd += f.estimated_monthly_savings;
    }
    if !attack_paths.is_empty() {
        summary.attack_paths = Some(attack_paths.to_vec());
    }
    if !risk_chains.is_empty() {
        summary.risk_chains = Some(risk_chains.to_vec());
    }
    summary
}

/// Assembles the final `AuditReport`. `findings` must already be merged and
/// sorted (spec §4.4 steps 5-6); this function performs no further
/// de-duplication or ordering.
#[allow(clippy::too_many_arguments)]
pub fn assemble(
    audit_type: impl Into<String>,
    profile: impl Into<String>,
    account_id: impl Into<String>,
    regions: Vec<String>,
    findings: Vec<Finding>,
    cost_summary: Option<CostSummary>,
    attack_paths: Vec<AttackPath>,
    risk_chains: Vec<RiskChain>,
    metadata: Option<BTreeMap<String, serde_json::Value>>,
) -> AuditReport {
    let summary = summarize(&findings, &attack_paths, &risk_chains);
    AuditReport {
        report_id: Uuid::new_v4().to_string(),
        generated_at: Utc::now(),
        audit_type: audit_type.into(),
        profile: profile.into(),
        account_id: account_id.into(),
        regions,
        summary,
        findings,
        cost_summary,
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::finding::{Domain, ResourceType};
    use crate::inventory::severity::Severity;
    use std::collections::BTreeMap as Map;

    fn finding(severity: Severity, savings: f64) -> Finding {
        Finding {
            id: "x".into(),
            rule_id: "X".into(),
            resource_id: "r".into(),
            resource_type: ResourceType::Ec2Instance,
            region: "us-east-1".into(),
            account_id: "1".into(),
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
    fn summary_counts_and_savings() {
        let findings = vec![finding(Severity::Critical, 10.0), finding(Severity::High, 5.0), finding(Severity::High, 2.0)];
        let summary = summarize(&findings, &[], &[]);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.critical, 1);
        assert_eq!(summary.high, 2);
        assert_eq!(summary.total_estimated_monthly_savings_usd, 17.0);
        assert_eq!(summary.risk_score, 0);
    }

    #[test]
    fn risk_score_prefers_attack_path_over_risk_chain() {
        let attack_path = AttackPath {
            name: "p".into(),
            score: 98,
            description: "d".into(),
            layers: vec!["a".into()],
            finding_ids: vec!["f1".into()],
        };
        let chain = RiskChain {
            name: "c".into(),
            score: 65,
            reason: "r".into(),
            finding_ids: vec!["f1".into()],
        };
        let summary = summarize(&[], std::slice::from_ref(&attack_path), std::slice::from_ref(&chain));
        assert_eq!(summary.risk_score, 98);

        let summary_chain_only = summarize(&[], &[], std::slice::from_ref(&chain));
        assert_eq!(summary_chain_only.risk_score, 65);
    }

    #[test]
    fn assemble_stamps_id_and_time() {
        let report = assemble("cost", "default", "123456789012", vec!["us-east-1".into()], vec![], None, vec![], vec![], None);
        assert!(!report.report_id.is_empty());
        assert_eq!(report.audit_type, "cost");
        assert_eq!(report.summary.total, 0);
    }
}
