use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::PolicyConfigError;
use crate::inventory::finding::{Domain, Finding};
use crate::inventory::severity::Severity;

/// Per-rule parameter overrides, e.g. `{ cpu_threshold: 10.0 }` for
/// `EC2_LOW_CPU`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleOverride {
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnforcementConfig {
    /// Minimum severity that fail-gates this domain. `None` (or an
    /// unrecognized/empty string at load time) means this domain never
    /// fail-gates.
    pub fail_on_severity: Option<Severity>,
}

/// The on-disk policy schema (spec §4.3 / §6): per-rule parameter overrides
/// and per-domain fail-on-severity enforcement thresholds.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub rules: BTreeMap<String, RuleOverride>,
    #[serde(default)]
    pub enforcement: BTreeMap<Domain, EnforcementConfig>,
}

impl PolicyConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<PolicyConfig, PolicyConfigError> {
        let cfg: PolicyConfig = serde_yaml::from_str(yaml)?;
        Ok(cfg)
    }

    pub fn from_path(path: &Path) -> Result<PolicyConfig, PolicyConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| PolicyConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Effective value of a rule parameter: the configured override if
    /// present, else the rule's compiled-in default.
    pub fn param(&self, rule_id: &str, name: &str, default: f64) -> f64 {
        self.rules
            .get(rule_id)
            .and_then(|r| r.params.get(name))
            .copied()
            .unwrap_or(default)
    }
}

/// `ShouldFail(domain, findings, cfg)` from spec §4.3: false if `cfg` is
/// `None`, the domain isn't configured, or no `fail_on_severity` is set;
/// otherwise true iff at least one finding's severity ranks at or above the
/// threshold.
pub fn should_fail(domain: Domain, findings: &[Finding], cfg: Option<&PolicyConfig>) -> bool {
    let Some(cfg) = cfg else { return false };
    let Some(enforcement) = cfg.enforcement.get(&domain) else {
        return false;
    };
    let Some(threshold) = enforcement.fail_on_severity else {
        return false;
    };
    findings.iter().any(|f| f.severity.rank() >= threshold.rank())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::finding::ResourceType;
    use chrono::Utc;
    use std::collections::BTreeMap as Map;

    fn finding(severity: Severity) -> Finding {
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
            estimated_monthly_savings: 0.0,
            explanation: String::new(),
            recommendation: String::new(),
            detected_at: Utc::now(),
            metadata: Map::new(),
        }
    }

    #[test]
    fn no_config_never_fails() {
        assert!(!should_fail(Domain::Cost, &[finding(Severity::Critical)], None));
    }

    #[test]
    fn empty_findings_never_fail() {
        let mut cfg = PolicyConfig::default();
        cfg.enforcement.insert(
            Domain::Cost,
            EnforcementConfig {
                fail_on_severity: Some(Severity::High),
            },
        );
        assert!(!should_fail(Domain::Cost, &[], Some(&cfg)));
    }

    #[test]
    fn high_threshold_trips_on_critical_or_high_only() {
        let mut cfg = PolicyConfig::default();
        cfg.enforcement.insert(
            Domain::Security,
            EnforcementConfig {
                fail_on_severity: Some(Severity::High),
            },
        );
        assert!(should_fail(Domain::Security, &[finding(Severity::Critical)], Some(&cfg)));
        assert!(should_fail(Domain::Security, &[finding(Severity::High)], Some(&cfg)));
        assert!(!should_fail(Domain::Security, &[finding(Severity::Medium)], Some(&cfg)));
        assert!(!should_fail(Domain::Security, &[finding(Severity::Low)], Some(&cfg)));
    }

    #[test]
    fn unconfigured_domain_never_fails() {
        let mut cfg = PolicyConfig::default();
        cfg.enforcement.insert(
            Domain::Security,
            EnforcementConfig {
                fail_on_severity: Some(Severity::High),
            },
        );
        assert!(!should_fail(Domain::Cost, &[finding(Severity::Critical)], Some(&cfg)));
    }

    #[test]
    fn param_lookup_falls_back_to_default() {
        let mut cfg = PolicyConfig::default();
        cfg.rules.insert(
            "EC2_LOW_CPU".into(),
            RuleOverride {
                params: BTreeMap::from([("cpu_threshold".to_string(), 15.0)]),
            },
        );
        assert_eq!(cfg.param("EC2_LOW_CPU", "cpu_threshold", 10.0), 15.0);
        assert_eq!(cfg.param("EC2_LOW_CPU", "other", 10.0), 10.0);
        assert_eq!(cfg.param("UNKNOWN_RULE", "cpu_threshold", 10.0), 10.0);
    }

    #[test]
    fn yaml_roundtrip() {
        let yaml = r#"
rules:
  EC2_LOW_CPU:
    params:
      cpu_threshold: 12.5
enforcement:
  cost:
    fail_on_severity: high
"#;
        let cfg = PolicyConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(cfg.param("EC2_LOW_CPU", "cpu_threshold", 0.0), 12.5);
        assert_eq!(
            cfg.enforcement.get(&Domain::Cost).unwrap().fail_on_severity,
            Some(Severity::High)
        );
    }
}
