use chrono::Utc;
use std::collections::{BTreeMap, HashSet};

use crate::inventory::finding::{Domain, Finding, ResourceType};
use crate::inventory::severity::Severity;
use crate::inventory::RuleContext;
use crate::rules::Rule;

const ADMIN_PORTS: [u16; 2] = [22, 3389];
const WIDE_OPEN_CIDRS: [&str; 2] = ["0.0.0.0/0", "::/0"];

fn global_finding(
    ctx: &RuleContext,
    rule_id: &str,
    resource_id: &str,
    resource_type: ResourceType,
    region: &str,
    severity: Severity,
    explanation: String,
    recommendation: String,
    metadata: BTreeMap<String, serde_json::Value>,
) -> Finding {
    Finding {
        id: Finding::make_id(rule_id, resource_id),
        rule_id: rule_id.to_string(),
        resource_id: resource_id.to_string(),
        resource_type,
        region: region.to_string(),
        account_id: ctx.account_id.clone(),
        profile: ctx.profile.clone(),
        domain: Some(Domain::Security),
        severity,
        estimated_monthly_savings: 0.0,
        explanation,
        recommendation,
        detected_at: Utc::now(),
        metadata,
    }
}

/// S3_PUBLIC_BUCKET: bucket policy/ACL evaluation reports the bucket as
/// public. Account-scoped, region is always `"global"`.
pub struct S3PublicBucket;

impl Rule for S3PublicBucket {
    fn id(&self) -> &'static str {
        "S3_PUBLIC_BUCKET"
    }
    fn name(&self) -> &'static str {
        "Publicly accessible S3 bucket"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let Some(region_data) = &ctx.region_data else {
            return Vec::new();
        };
        region_data
            .security
            .s3_buckets
            .iter()
            .filter(|b| b.public)
            .map(|bucket| {
                global_finding(
                    ctx,
                    self.id(),
                    &bucket.bucket_name,
                    ResourceType::S3Bucket,
                    "global",
                    Severity::High,
                    format!("Bucket {} is publicly accessible", bucket.bucket_name),
                    "Remove public access from this bucket's policy/ACL unless intentional".to_string(),
                    BTreeMap::new(),
                )
            })
            .collect()
    }
}

/// SG_OPEN_SSH: a security group with an inbound rule on an administrative
/// port (22 or 3389) open to the world. Exactly one finding per
/// security-group id, even when both ports are open on the same group.
pub struct SgOpenSsh;

impl Rule for SgOpenSsh {
    fn id(&self) -> &'static str {
        "SG_OPEN_SSH"
    }
    fn name(&self) -> &'static str {
        "Security group open to the world on an administrative port"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let Some(region_data) = &ctx.region_data else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        let mut findings = Vec::new();
        for rule in &region_data.security.security_group_rules {
            let is_admin_port = rule.port.map(|p| ADMIN_PORTS.contains(&p)).unwrap_or(false);
            let is_wide_open = WIDE_OPEN_CIDRS.contains(&rule.cidr.as_str());
            if !is_admin_port || !is_wide_open {
                continue;
            }
            if !seen.insert(rule.security_group_id.clone()) {
                continue;
            }
            findings.push(global_finding(
                ctx,
                self.id(),
                &rule.security_group_id,
                ResourceType::SecurityGroup,
                &rule.region,
                Severity::High,
                format!(
                    "Security group {} allows inbound traffic on an administrative port from {}",
                    rule.security_group_id, rule.cidr
                ),
                "Restrict this rule to a known CIDR range or bastion host".to_string(),
                BTreeMap::new(),
            ));
        }
        findings
    }
}

/// IAM_USER_NO_MFA: a user with console access (a login profile) but no MFA
/// device. API-only users never fire.
pub struct IamUserNoMfa;

impl Rule for IamUserNoMfa {
    fn id(&self) -> &'static str {
        "IAM_USER_NO_MFA"
    }
    fn name(&self) -> &'static str {
        "IAM user with console access and no MFA"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let Some(region_data) = &ctx.region_data else {
            return Vec::new();
        };
        region_data
            .security
            .iam_users
            .iter()
            .filter(|u| u.has_login_profile && !u.mfa_enabled)
            .map(|user| {
                global_finding(
                    ctx,
                    self.id(),
                    &user.user_name,
                    ResourceType::IamUser,
                    "global",
                    Severity::Medium,
                    format!("User {} has console access without MFA enabled", user.user_name),
                    "Enable MFA for this user".to_string(),
                    BTreeMap::new(),
                )
            })
            .collect()
    }
}

/// ROOT_ACCESS_KEY: the root account has access keys present. Silent when
/// the root-account summary couldn't be retrieved at all (the collector
/// leaves `has_access_keys` at its conservative `false` default in that case).
pub struct RootAccessKey;

impl Rule for RootAccessKey {
    fn id(&self) -> &'static str {
        "ROOT_ACCESS_KEY"
    }
    fn name(&self) -> &'static str {
        "Root account has access keys"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let Some(region_data) = &ctx.region_data else {
            return Vec::new();
        };
        if region_data.security.root_account.has_access_keys {
            vec![global_finding(
                ctx,
                self.id(),
                &ctx.account_id,
                ResourceType::RootAccount,
                "global",
                Severity::Critical,
                "Root account has at least one active access key".to_string(),
                "Delete root account access keys; use IAM roles instead".to_string(),
                BTreeMap::new(),
            )]
        } else {
            Vec::new()
        }
    }
}

/// ROOT_ACCOUNT_MFA_DISABLED: root account summary succeeded and shows no
/// MFA. Suppressed entirely when the summary call failed (`data_available ==
/// false`) — no-data, not "MFA is off".
pub struct RootAccountMfaDisabled;

impl Rule for RootAccountMfaDisabled {
    fn id(&self) -> &'static str {
        "ROOT_ACCOUNT_MFA_DISABLED"
    }
    fn name(&self) -> &'static str {
        "Root account has no MFA device"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let Some(region_data) = &ctx.region_data else {
            return Vec::new();
        };
        let root = &region_data.security.root_account;
        if root.data_available && !root.mfa_enabled {
            vec![global_finding(
                ctx,
                self.id(),
                &ctx.account_id,
                ResourceType::RootAccount,
                "global",
                Severity::Critical,
                "Root account does not have an MFA device configured".to_string(),
                "Enable MFA on the root account immediately".to_string(),
                BTreeMap::new(),
            )]
        } else {
            Vec::new()
        }
    }
}

/// CLOUDTRAIL_NOT_MULTI_REGION: no multi-region trail exists. Shadow trails
/// (implicitly created, non-configurable copies) are deliberately excluded
/// from this check.
pub struct CloudtrailNotMultiRegion;

impl Rule for CloudtrailNotMultiRegion {
    fn id(&self) -> &'static str {
        "CLOUDTRAIL_NOT_MULTI_REGION"
    }
    fn name(&self) -> &'static str {
        "No multi-region CloudTrail trail"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let Some(region_data) = &ctx.region_data else {
            return Vec::new();
        };
        if !region_data.security.cloudtrail.has_multi_region_trail {
            vec![global_finding(
                ctx,
                self.id(),
                &ctx.account_id,
                ResourceType::CloudTrail,
                "global",
                Severity::High,
                "No multi-region CloudTrail trail is configured for this account".to_string(),
                "Create a multi-region trail covering all regions".to_string(),
                BTreeMap::new(),
            )]
        } else {
            Vec::new()
        }
    }
}

/// GUARDDUTY_DISABLED: per-region GuardDuty detector is not enabled.
pub struct GuarddutyDisabled;

impl Rule for GuarddutyDisabled {
    fn id(&self) -> &'static str {
        "GUARDDUTY_DISABLED"
    }
    fn name(&self) -> &'static str {
        "GuardDuty disabled in region"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let Some(region_data) = &ctx.region_data else {
            return Vec::new();
        };
        let enabled = region_data
            .security
            .guardduty_by_region
            .get(&region_data.region)
            .map(|s| s.enabled)
            .unwrap_or(false);
        if !enabled {
            vec![global_finding(
                ctx,
                self.id(),
                &format!("guardduty-{}", region_data.region),
                ResourceType::GuardDuty,
                &region_data.region,
                Severity::High,
                format!("GuardDuty is not enabled in {}", region_data.region),
                "Enable GuardDuty in this region".to_string(),
                BTreeMap::new(),
            )]
        } else {
            Vec::new()
        }
    }
}

/// AWS_CONFIG_DISABLED: per-region AWS Config recorder is not enabled.
pub struct AwsConfigDisabled;

impl Rule for AwsConfigDisabled {
    fn id(&self) -> &'static str {
        "AWS_CONFIG_DISABLED"
    }
    fn name(&self) -> &'static str {
        "AWS Config disabled in region"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let Some(region_data) = &ctx.region_data else {
            return Vec::new();
        };
        let enabled = region_data
            .security
            .config_by_region
            .get(&region_data.region)
            .map(|s| s.enabled)
            .unwrap_or(false);
        if !enabled {
            vec![global_finding(
                ctx,
                self.id(),
                &format!("config-{}", region_data.region),
                ResourceType::AwsConfigRecorder,
                &region_data.region,
                Severity::High,
                format!("AWS Config is not enabled in {}", region_data.region),
                "Enable an AWS Config recorder in this region".to_string(),
                BTreeMap::new(),
            )]
        } else {
            Vec::new()
        }
    }
}

pub fn register_all(registry: &mut crate::rules::Registry) -> Result<(), crate::errors::EngineError> {
    registry.register(Box::new(S3PublicBucket))?;
    registry.register(Box::new(SgOpenSsh))?;
    registry.register(Box::new(IamUserNoMfa))?;
    registry.register(Box::new(RootAccessKey))?;
    registry.register(Box::new(RootAccountMfaDisabled))?;
    registry.register(Box::new(CloudtrailNotMultiRegion))?;
    registry.register(Box::new(GuarddutyDisabled))?;
    registry.register(Box::new(AwsConfigDisabled))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::aws::{RegionData, RootAccountInfo, SecurityData, SecurityGroupRule};
    use crate::rules::tests_support::empty_ctx;
    use std::sync::Arc;

    fn ctx_with_security(security: SecurityData) -> RuleContext {
        let mut ctx = empty_ctx();
        ctx.region_data = Some(Arc::new(RegionData::empty("us-east-1", Arc::new(security))));
        ctx
    }

    #[test]
    fn sg_open_ssh_fires_once_per_group_even_with_both_ports_open() {
        let mut security = SecurityData::default();
        security.security_group_rules.push(SecurityGroupRule {
            security_group_id: "sg-1".into(),
            region: "us-east-1".into(),
            port: Some(22),
            cidr: "0.0.0.0/0".into(),
        });
        security.security_group_rules.push(SecurityGroupRule {
            security_group_id: "sg-1".into(),
            region: "us-east-1".into(),
            port: Some(3389),
            cidr: "0.0.0.0/0".into(),
        });
        let findings = SgOpenSsh.evaluate(&ctx_with_security(security));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].resource_id, "sg-1");
    }

    #[test]
    fn sg_open_ssh_ignores_non_admin_ports() {
        let mut security = SecurityData::default();
        security.security_group_rules.push(SecurityGroupRule {
            security_group_id: "sg-1".into(),
            region: "us-east-1".into(),
            port: Some(443),
            cidr: "0.0.0.0/0".into(),
        });
        let findings = SgOpenSsh.evaluate(&ctx_with_security(security));
        assert!(findings.is_empty());
    }

    #[test]
    fn iam_user_no_mfa_ignores_api_only_users() {
        use crate::inventory::aws::IamUserInfo;
        let mut security = SecurityData::default();
        security.iam_users.push(IamUserInfo {
            user_name: "svc-account".into(),
            has_login_profile: false,
            mfa_enabled: false,
        });
        let findings = IamUserNoMfa.evaluate(&ctx_with_security(security));
        assert!(findings.is_empty());
    }

    #[test]
    fn root_account_checks_suppressed_when_data_unavailable() {
        let mut security = SecurityData::default();
        security.root_account = RootAccountInfo {
            has_access_keys: false,
            mfa_enabled: false,
            data_available: false,
        };
        let ctx = ctx_with_security(security);
        assert!(RootAccountMfaDisabled.evaluate(&ctx).is_empty());
        assert!(RootAccessKey.evaluate(&ctx).is_empty());
    }

    #[test]
    fn root_account_mfa_disabled_fires_when_data_available() {
        let mut security = SecurityData::default();
        security.root_account = RootAccountInfo {
            has_access_keys: false,
            mfa_enabled: false,
            data_available: true,
        };
        let findings = RootAccountMfaDisabled.evaluate(&ctx_with_security(security));
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Critical);
    }
}
