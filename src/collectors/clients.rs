//! Narrow, per-service capability traits (spec §4.1/§9: "define a per-service
//! interface with only the operations used, let production wire the real
//! SDK, let tests inject deterministic fakes"). Each trait exposes only the
//! handful of calls this crate's rule catalog actually consumes — not a
//! general-purpose SDK wrapper.

use async_trait::async_trait;
use std::sync::Arc;

use crate::errors::CollectionError;
use crate::inventory::aws::{
    EbsVolume, Ec2Instance, IamUserInfo, LoadBalancer, NatGateway, RdsInstance, RootAccountInfo, S3BucketInfo,
    SavingsPlanCoverage, SecurityGroupRule,
};
use crate::inventory::kubernetes::EksData;

#[async_trait]
pub trait Ec2Client: Send + Sync {
    async fn list_instances(&self, region: &str, days_back: i64) -> Result<Vec<Ec2Instance>, CollectionError>;
    async fn list_volumes(&self, region: &str) -> Result<Vec<EbsVolume>, CollectionError>;
    async fn list_nat_gateways(&self, region: &str, days_back: i64) -> Result<Vec<NatGateway>, CollectionError>;
    async fn list_security_group_rules(&self, region: &str) -> Result<Vec<SecurityGroupRule>, CollectionError>;
    /// Active regions for this account/profile, used when the caller supplies
    /// none explicitly.
    async fn active_regions(&self) -> Result<Vec<String>, CollectionError>;
}

#[async_trait]
pub trait ElbClient: Send + Sync {
    async fn list_load_balancers(&self, region: &str, days_back: i64) -> Result<Vec<LoadBalancer>, CollectionError>;
}

#[async_trait]
pub trait RdsClient: Send + Sync {
    async fn list_instances(&self, region: &str, days_back: i64) -> Result<Vec<RdsInstance>, CollectionError>;
}

#[async_trait]
pub trait CostExplorerClient: Send + Sync {
    async fn savings_plan_coverage(&self, region: &str, days_back: i64) -> Result<Option<SavingsPlanCoverage>, CollectionError>;
}

#[async_trait]
pub trait S3Client: Send + Sync {
    /// S3 is account-global; collected once through the canonical region
    /// (spec §4.1).
    async fn list_buckets(&self) -> Result<Vec<S3BucketInfo>, CollectionError>;
}

#[async_trait]
pub trait IamClient: Send + Sync {
    async fn list_users(&self) -> Result<Vec<IamUserInfo>, CollectionError>;
    async fn root_account_info(&self) -> Result<RootAccountInfo, CollectionError>;
    /// Names of overpermissive policies (attached or inline) on the given
    /// IAM role ARN, per the node-role audit procedure in spec §4.1.
    async fn overpermissive_role_policies(&self, role_arn: &str) -> Result<Vec<String>, CollectionError>;
    /// ARN of the IAM OIDC identity provider registered for `issuer_url`, if
    /// one is associated. `None` means no provider was found for that
    /// issuer, distinct from a failed lookup (which a caller should treat as
    /// unknown, not "absent").
    async fn find_oidc_provider_arn(&self, issuer_url: &str) -> Result<Option<String>, CollectionError>;
}

#[async_trait]
pub trait CloudTrailClient: Send + Sync {
    async fn has_multi_region_trail(&self) -> Result<bool, CollectionError>;
}

#[async_trait]
pub trait GuardDutyClient: Send + Sync {
    async fn is_enabled(&self, region: &str) -> Result<bool, CollectionError>;
}

#[async_trait]
pub trait ConfigClient: Send + Sync {
    async fn is_recorder_enabled(&self, region: &str) -> Result<bool, CollectionError>;
}

#[async_trait]
pub trait EksClient: Send + Sync {
    /// `None` when the cluster named by `cluster_name` is not an EKS cluster
    /// (or lookup failed) — callers treat this as "skip EKS rules", never a
    /// hard error (spec §4.1: "failures are non-fatal").
    async fn describe_cluster(&self, region: &str, cluster_name: &str) -> Result<Option<EksData>, CollectionError>;
}

/// Resolves narrow per-service clients for a given `(profile, region)` pair.
/// Mirrors spec §4.1's `clientProvider` argument to `Collect`; production
/// wires this to `aws-config`-built SDK clients, tests wire deterministic
/// fakes holding canned responses.
#[async_trait]
pub trait AwsClientProvider: Send + Sync {
    async fn ec2(&self, profile: &str, region: &str) -> Result<Arc<dyn Ec2Client>, CollectionError>;
    async fn elb(&self, profile: &str, region: &str) -> Result<Arc<dyn ElbClient>, CollectionError>;
    async fn rds(&self, profile: &str, region: &str) -> Result<Arc<dyn RdsClient>, CollectionError>;
    async fn cost_explorer(&self, profile: &str, region: &str) -> Result<Arc<dyn CostExplorerClient>, CollectionError>;
    async fn s3(&self, profile: &str) -> Result<Arc<dyn S3Client>, CollectionError>;
    async fn iam(&self, profile: &str) -> Result<Arc<dyn IamClient>, CollectionError>;
    async fn cloudtrail(&self, profile: &str) -> Result<Arc<dyn CloudTrailClient>, CollectionError>;
    async fn guardduty(&self, profile: &str, region: &str) -> Result<Arc<dyn GuardDutyClient>, CollectionError>;
    async fn config(&self, profile: &str, region: &str) -> Result<Arc<dyn ConfigClient>, CollectionError>;
    async fn eks(&self, profile: &str, region: &str) -> Result<Arc<dyn EksClient>, CollectionError>;
    async fn active_regions(&self, profile: &str) -> Result<Vec<String>, CollectionError>;
}
