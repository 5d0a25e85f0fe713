use chrono::Utc;
use std::collections::BTreeMap;

use crate::inventory::finding::{Domain, Finding, ResourceType};
use crate::inventory::severity::Severity;
use crate::inventory::RuleContext;
use crate::rules::Rule;

fn finding(
    ctx: &RuleContext,
    rule_id: &str,
    resource_id: &str,
    resource_type: ResourceType,
    region: &str,
    severity: Severity,
    explanation: String,
    recommendation: String,
) -> Finding {
    Finding {
        id: Finding::make_id(rule_id, resource_id),
        rule_id: rule_id.to_string(),
        resource_id: resource_id.to_string(),
        resource_type,
        region: region.to_string(),
        account_id: ctx.account_id.clone(),
        profile: ctx.profile.clone(),
        domain: Some(Domain::DataProtection),
        severity,
        estimated_monthly_savings: 0.0,
        explanation,
        recommendation,
        detected_at: Utc::now(),
        metadata: BTreeMap::new(),
    }
}

/// EBS_UNENCRYPTED: volume has encryption-at-rest disabled.
pub struct EbsUnencrypted;

impl Rule for EbsUnencrypted {
    fn id(&self) -> &'static str {
        "EBS_UNENCRYPTED"
    }
    fn name(&self) -> &'static str {
        "EBS volume without encryption at rest"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let Some(region_data) = &ctx.region_data else {
            return Vec::new();
        };
        region_data
            .ebs_volumes
            .iter()
            .filter(|v| !v.encrypted)
            .map(|v| {
                finding(
                    ctx,
                    self.id(),
                    &v.volume_id,
                    ResourceType::EbsVolume,
                    &region_data.region,
                    Severity::High,
                    format!("Volume {} is not encrypted at rest", v.volume_id),
                    "Enable encryption by re-creating this volume from an encrypted snapshot".to_string(),
                )
            })
            .collect()
    }
}

/// RDS_UNENCRYPTED: instance storage has encryption-at-rest disabled.
pub struct RdsUnencrypted;

impl Rule for RdsUnencrypted {
    fn id(&self) -> &'static str {
        "RDS_UNENCRYPTED"
    }
    fn name(&self) -> &'static str {
        "RDS instance without storage encryption"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let Some(region_data) = &ctx.region_data else {
            return Vec::new();
        };
        region_data
            .rds_instances
            .iter()
            .filter(|i| !i.storage_encrypted)
            .map(|i| {
                finding(
                    ctx,
                    self.id(),
                    &i.db_instance_id,
                    ResourceType::RdsInstance,
                    &region_data.region,
                    Severity::Critical,
                    format!("RDS instance {} does not have storage encryption enabled", i.db_instance_id),
                    "Enable storage encryption by restoring from a snapshot into an encrypted instance".to_string(),
                )
            })
            .collect()
    }
}

/// S3_DEFAULT_ENCRYPTION_MISSING: bucket has no default encryption
/// configuration. Account-scoped, region is always `"global"`.
pub struct S3DefaultEncryptionMissing;

impl Rule for S3DefaultEncryptionMissing {
    fn id(&self) -> &'static str {
        "S3_DEFAULT_ENCRYPTION_MISSING"
    }
    fn name(&self) -> &'static str {
        "S3 bucket without default encryption"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let Some(region_data) = &ctx.region_data else {
            return Vec::new();
        };
        region_data
            .security
            .s3_buckets
            .iter()
            .filter(|b| !b.default_encryption_enabled)
            .map(|b| {
                finding(
                    ctx,
                    self.id(),
                    &b.bucket_name,
                    ResourceType::S3Bucket,
                    "global",
                    Severity::High,
                    format!("Bucket {} has no default encryption configuration", b.bucket_name),
                    "Enable default server-side encryption (SSE-S3 or SSE-KMS) on this bucket".to_string(),
                )
            })
            .collect()
    }
}

pub fn register_all(registry: &mut crate::rules::Registry) -> Result<(), crate::errors::EngineError> {
    registry.register(Box::new(EbsUnencrypted))?;
    registry.register(Box::new(RdsUnencrypted))?;
    registry.register(Box::new(S3DefaultEncryptionMissing))?;
    Ok(())
}
