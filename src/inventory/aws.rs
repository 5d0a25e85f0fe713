use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One EC2 instance, as seen by the cost/security rule catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ec2Instance {
    pub instance_id: String,
    pub state: String,
    /// Average CPU utilization over the lookback window, in percent.
    /// `None` when the CloudWatch metric call failed (conservative: treated
    /// as "no data", never as 0% busy) so `EC2_LOW_CPU` can distinguish
    /// genuinely idle from unmeasured.
    pub avg_cpu_percent: Option<f64>,
    pub monthly_cost: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EbsVolume {
    pub volume_id: String,
    pub attached: bool,
    pub state: String,
    pub volume_type: String,
    pub size_gb: f64,
    pub encrypted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NatGateway {
    pub nat_gateway_id: String,
    pub state: String,
    pub bytes_processed_gb: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RdsInstance {
    pub db_instance_id: String,
    pub status: String,
    pub avg_cpu_percent: Option<f64>,
    pub monthly_cost: f64,
    pub storage_encrypted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub load_balancer_id: String,
    /// e.g. "application", "network"
    pub lb_type: String,
    pub state: String,
    /// Sum of CloudWatch `RequestCount` over the lookback window. `None`
    /// when the metric call failed.
    pub request_count: Option<u64>,
}

/// Savings Plan coverage for one region, as returned by Cost Explorer's
/// coverage report for the lookback window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavingsPlanCoverage {
    pub coverage_percent: f64,
    pub on_demand_cost: f64,
    pub covered_cost: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostSummary {
    pub total_estimated_monthly_savings_usd: f64,
}

/// One ingress/egress rule on a security group, tagged with the region it
/// was collected from (security-group rules are collected per region and
/// concatenated, per spec §4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityGroupRule {
    pub security_group_id: String,
    pub region: String,
    pub port: Option<u16>,
    pub cidr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3BucketInfo {
    pub bucket_name: String,
    /// Conservative default on lookup failure: `false` (never flag a bucket
    /// public on missing data).
    pub public: bool,
    pub default_encryption_enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IamUserInfo {
    pub user_name: String,
    pub has_login_profile: bool,
    pub mfa_enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RootAccountInfo {
    pub has_access_keys: bool,
    pub mfa_enabled: bool,
    /// Whether the root-account summary API call succeeded at all. When
    /// `false`, `ROOT_ACCOUNT_MFA_DISABLED` is suppressed (no-data, not
    /// "MFA is off") and `ROOT_ACCESS_KEY` stays silent too.
    pub data_available: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloudTrailInfo {
    pub has_multi_region_trail: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardDutyStatus {
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigRecorderStatus {
    pub enabled: bool,
}

/// Account-level security posture, collected once per audit through the
/// canonical `us-east-1` region (S3/IAM/root/CloudTrail) plus one entry per
/// region for GuardDuty/Config, and replicated by shared reference into
/// every region's `RegionData` (spec §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityData {
    pub s3_buckets: Vec<S3BucketInfo>,
    pub security_group_rules: Vec<SecurityGroupRule>,
    pub iam_users: Vec<IamUserInfo>,
    pub root_account: RootAccountInfo,
    pub cloudtrail: CloudTrailInfo,
    pub guardduty_by_region: HashMap<String, GuardDutyStatus>,
    pub config_by_region: HashMap<String, ConfigRecorderStatus>,
}

/// The per-region resource slices plus the embedded, shared `SecurityData`
/// bundle. One `RegionData` is built per `(profile, region)` pair; the
/// `security` field is the same `Arc`-shared value across every region in
/// one audit run, populated once (spec §3).
#[derive(Debug, Clone)]
pub struct RegionData {
    pub region: String,
    pub ec2_instances: Vec<Ec2Instance>,
    pub ebs_volumes: Vec<EbsVolume>,
    pub nat_gateways: Vec<NatGateway>,
    pub rds_instances: Vec<RdsInstance>,
    pub load_balancers: Vec<LoadBalancer>,
    pub savings_plan_coverage: Option<SavingsPlanCoverage>,
    pub security: std::sync::Arc<SecurityData>,
}

impl RegionData {
    pub fn empty(region: impl Into<String>, security: std::sync::Arc<SecurityData>) -> Self {
        RegionData {
            region: region.into(),
            ec2_instances: Vec::new(),
            ebs_volumes: Vec::new(),
            nat_gateways: Vec::new(),
            rds_instances: Vec::new(),
            load_balancers: Vec::new(),
            savings_plan_coverage: None,
            security,
        }
    }
}
