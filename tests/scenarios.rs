//! End-to-end scenario tests driving the public `run_*_audit` entry points
//! against hand-built fixtures and fake narrow-client implementations
//! (spec §8's six concrete scenarios).

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use cloud_audit_engine::collectors::clients::{
    AwsClientProvider, CloudTrailClient, ConfigClient, CostExplorerClient, Ec2Client, EksClient, ElbClient, GuardDutyClient,
    IamClient, RdsClient, S3Client,
};
use cloud_audit_engine::collectors::kubernetes::KubeClient;
use cloud_audit_engine::errors::CollectionError;
use cloud_audit_engine::inventory::aws::{
    EbsVolume, Ec2Instance, IamUserInfo, LoadBalancer, NatGateway, RdsInstance, RootAccountInfo, S3BucketInfo,
    SavingsPlanCoverage, SecurityGroupRule,
};
use cloud_audit_engine::inventory::kubernetes::{
    ContainerSecurity, EksData, EksNodegroup, KubernetesClusterData, KubernetesNamespace, KubernetesNode, KubernetesPod,
    KubernetesServiceAccount, SeccompProfileType,
};
use cloud_audit_engine::inventory::severity::Severity;
use cloud_audit_engine::{correlation, run_cost_audit, run_kubernetes_audit, run_security_audit, run_unified_aws_audit};

/// Per-region resource fixture plumbed into the fake `Ec2Client`/`RdsClient`/
/// `ElbClient`/`CostExplorerClient`.
#[derive(Default, Clone)]
struct RegionFixture {
    instances: Vec<Ec2Instance>,
    volumes: Vec<EbsVolume>,
    nat_gateways: Vec<NatGateway>,
    sg_rules: Vec<SecurityGroupRule>,
    rds_instances: Vec<RdsInstance>,
    load_balancers: Vec<LoadBalancer>,
    savings_plan_coverage: Option<SavingsPlanCoverage>,
}

#[derive(Default, Clone)]
struct GlobalFixture {
    s3_buckets: Vec<S3BucketInfo>,
    iam_users: Vec<IamUserInfo>,
    root_account: RootAccountInfo,
    has_multi_region_trail: bool,
    guardduty_enabled: bool,
    config_enabled: bool,
}

struct FakeAwsProvider {
    regions: Vec<String>,
    per_region: BTreeMap<String, RegionFixture>,
    global: GlobalFixture,
}

impl FakeAwsProvider {
    fn new(regions: &[&str]) -> Self {
        FakeAwsProvider {
            regions: regions.iter().map(|r| r.to_string()).collect(),
            per_region: BTreeMap::new(),
            global: GlobalFixture::default(),
        }
    }

    fn region(mut self, region: &str, fixture: RegionFixture) -> Self {
        self.per_region.insert(region.to_string(), fixture);
        self
    }

    fn global(mut self, global: GlobalFixture) -> Self {
        self.global = global;
        self
    }

    fn fixture(&self, region: &str) -> RegionFixture {
        self.per_region.get(region).cloned().unwrap_or_default()
    }
}

struct FakeRegionClient(RegionFixture);

#[async_trait]
impl Ec2Client for FakeRegionClient {
    async fn list_instances(&self, _region: &str, _days_back: i64) -> Result<Vec<Ec2Instance>, CollectionError> {
        Ok(self.0.instances.clone())
    }
    async fn list_volumes(&self, _region: &str) -> Result<Vec<EbsVolume>, CollectionError> {
        Ok(self.0.volumes.clone())
    }
    async fn list_nat_gateways(&self, _region: &str, _days_back: i64) -> Result<Vec<NatGateway>, CollectionError> {
        Ok(self.0.nat_gateways.clone())
    }
    async fn list_security_group_rules(&self, _region: &str) -> Result<Vec<SecurityGroupRule>, CollectionError> {
        Ok(self.0.sg_rules.clone())
    }
    async fn active_regions(&self) -> Result<Vec<String>, CollectionError> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl ElbClient for FakeRegionClient {
    async fn list_load_balancers(&self, _region: &str, _days_back: i64) -> Result<Vec<LoadBalancer>, CollectionError> {
        Ok(self.0.load_balancers.clone())
    }
}

#[async_trait]
impl RdsClient for FakeRegionClient {
    async fn list_instances(&self, _region: &str, _days_back: i64) -> Result<Vec<RdsInstance>, CollectionError> {
        Ok(self.0.rds_instances.clone())
    }
}

#[async_trait]
impl CostExplorerClient for FakeRegionClient {
    async fn savings_plan_coverage(&self, _region: &str, _days_back: i64) -> Result<Option<SavingsPlanCoverage>, CollectionError> {
        Ok(self.0.savings_plan_coverage.clone())
    }
}

struct FakeS3Client(Vec<S3BucketInfo>);
#[async_trait]
impl S3Client for FakeS3Client {
    async fn list_buckets(&self) -> Result<Vec<S3BucketInfo>, CollectionError> {
        Ok(self.0.clone())
    }
}

struct FakeIamClient {
    users: Vec<IamUserInfo>,
    root: RootAccountInfo,
}
#[async_trait]
impl IamClient for FakeIamClient {
    async fn list_users(&self) -> Result<Vec<IamUserInfo>, CollectionError> {
        Ok(self.users.clone())
    }
    async fn root_account_info(&self) -> Result<RootAccountInfo, CollectionError> {
        Ok(self.root.clone())
    }
    async fn overpermissive_role_policies(&self, _role_arn: &str) -> Result<Vec<String>, CollectionError> {
        Ok(Vec::new())
    }
    async fn find_oidc_provider_arn(&self, _issuer_url: &str) -> Result<Option<String>, CollectionError> {
        Ok(None)
    }
}

struct FakeCloudTrailClient(bool);
#[async_trait]
impl CloudTrailClient for FakeCloudTrailClient {
    async fn has_multi_region_trail(&self) -> Result<bool, CollectionError> {
        Ok(self.0)
    }
}

struct FakeGuardDutyClient(bool);
#[async_trait]
impl GuardDutyClient for FakeGuardDutyClient {
    async fn is_enabled(&self, _region: &str) -> Result<bool, CollectionError> {
        Ok(self.0)
    }
}

struct FakeConfigClient(bool);
#[async_trait]
impl ConfigClient for FakeConfigClient {
    async fn is_recorder_enabled(&self, _region: &str) -> Result<bool, CollectionError> {
        Ok(self.0)
    }
}

struct FakeEksClient;
#[async_trait]
impl EksClient for FakeEksClient {
    async fn describe_cluster(&self, _region: &str, _cluster_name: &str) -> Result<Option<EksData>, CollectionError> {
        Ok(None)
    }
}

#[async_trait]
impl AwsClientProvider for FakeAwsProvider {
    async fn ec2(&self, _profile: &str, region: &str) -> Result<Arc<dyn Ec2Client>, CollectionError> {
        Ok(Arc::new(FakeRegionClient(self.fixture(region))))
    }
    async fn elb(&self, _profile: &str, region: &str) -> Result<Arc<dyn ElbClient>, CollectionError> {
        Ok(Arc::new(FakeRegionClient(self.fixture(region))))
    }
    async fn rds(&self, _profile: &str, region: &str) -> Result<Arc<dyn RdsClient>, CollectionError> {
        Ok(Arc::new(FakeRegionClient(self.fixture(region))))
    }
    async fn cost_explorer(&self, _profile: &str, region: &str) -> Result<Arc<dyn CostExplorerClient>, CollectionError> {
        Ok(Arc::new(FakeRegionClient(self.fixture(region))))
    }
    async fn s3(&self, _profile: &str) -> Result<Arc<dyn S3Client>, CollectionError> {
        Ok(Arc::new(FakeS3Client(self.global.s3_buckets.clone())))
    }
    async fn iam(&self, _profile: &str) -> Result<Arc<dyn IamClient>, CollectionError> {
        Ok(Arc::new(FakeIamClient {
            users: self.global.iam_users.clone(),
            root: self.global.root_account.clone(),
        }))
    }
    async fn cloudtrail(&self, _profile: &str) -> Result<Arc<dyn CloudTrailClient>, CollectionError> {
        Ok(Arc::new(FakeCloudTrailClient(self.global.has_multi_region_trail)))
    }
    async fn guardduty(&self, _profile: &str, _region: &str) -> Result<Arc<dyn GuardDutyClient>, CollectionError> {
        Ok(Arc::new(FakeGuardDutyClient(self.global.guardduty_enabled)))
    }
    async fn config(&self, _profile: &str, _region: &str) -> Result<Arc<dyn ConfigClient>, CollectionError> {
        Ok(Arc::new(FakeConfigClient(self.global.config_enabled)))
    }
    async fn eks(&self, _profile: &str, _region: &str) -> Result<Arc<dyn EksClient>, CollectionError> {
        Ok(Arc::new(FakeEksClient))
    }
    async fn active_regions(&self, _profile: &str) -> Result<Vec<String>, CollectionError> {
        Ok(self.regions.clone())
    }
}

/// Scenario 1 (spec §8): a single unattached gp2 volume in us-east-1.
#[tokio::test]
async fn scenario_unattached_ebs_volume() {
    let fixture = RegionFixture {
        volumes: vec![EbsVolume {
            volume_id: "vol-abc".into(),
            attached: false,
            state: "available".into(),
            volume_type: "gp2".into(),
            size_gb: 100.0,
            encrypted: true,
        }],
        ..Default::default()
    };
    let provider: Arc<dyn AwsClientProvider> = Arc::new(FakeAwsProvider::new(&["us-east-1"]).region("us-east-1", fixture));

    let (report, failed) = run_cost_audit(
        provider,
        "default",
        "123456789012",
        &["us-east-1".to_string()],
        30,
        None,
        CancellationToken::new(),
    )
    .await
    .expect("cost audit should succeed");

    assert!(!failed);
    assert_eq!(report.findings.len(), 1);
    let finding = &report.findings[0];
    assert_eq!(finding.id, "EBS_UNATTACHED-vol-abc");
    assert_eq!(finding.severity, Severity::Medium);
    assert_eq!(finding.region, "us-east-1");
    assert!((finding.estimated_monthly_savings - 8.00).abs() < 1e-9);
    assert_eq!(finding.metadata.get("volume_type").unwrap(), "gp2");
    assert_eq!(finding.metadata.get("size_gb").unwrap(), &serde_json::json!(100.0));
}

/// Scenario 2 (spec §8): one idle ALB alongside one busy ALB in us-east-1.
#[tokio::test]
async fn scenario_idle_alb_among_busy_albs() {
    let fixture = RegionFixture {
        load_balancers: vec![
            LoadBalancer {
                load_balancer_id: "busy".into(),
                lb_type: "application".into(),
                state: "active".into(),
                request_count: Some(10_000),
            },
            LoadBalancer {
                load_balancer_id: "idle".into(),
                lb_type: "application".into(),
                state: "active".into(),
                request_count: Some(0),
            },
        ],
        ..Default::default()
    };
    let provider: Arc<dyn AwsClientProvider> = Arc::new(FakeAwsProvider::new(&["us-east-1"]).region("us-east-1", fixture));

    let (report, _failed) = run_cost_audit(
        provider,
        "default",
        "123456789012",
        &["us-east-1".to_string()],
        30,
        None,
        CancellationToken::new(),
    )
    .await
    .expect("cost audit should succeed");

    assert_eq!(report.findings.len(), 1);
    let finding = &report.findings[0];
    assert_eq!(finding.resource_id, "idle");
    assert_eq!(finding.severity, Severity::High);
    assert_eq!(finding.estimated_monthly_savings, 18.00);
}

/// Scenario 3 (spec §8): the root-account summary call failed, so
/// `DataAvailable=false` must suppress both root-account rules.
#[tokio::test]
async fn scenario_root_account_summary_unavailable_suppresses_rules() {
    let global = GlobalFixture {
        root_account: RootAccountInfo {
            has_access_keys: false,
            mfa_enabled: false,
            data_available: false,
        },
        ..Default::default()
    };
    let provider: Arc<dyn AwsClientProvider> = Arc::new(
        FakeAwsProvider::new(&["us-east-1"])
            .region("us-east-1", RegionFixture::default())
            .global(global),
    );

    let (report, failed) = run_security_audit(
        provider,
        "default",
        "123456789012",
        &["us-east-1".to_string()],
        30,
        None,
        CancellationToken::new(),
    )
    .await
    .expect("security audit should succeed");

    assert!(!failed);
    assert!(report.findings.iter().all(|f| f.rule_id != "ROOT_ACCOUNT_MFA_DISABLED"));
    assert!(report.findings.iter().all(|f| f.rule_id != "ROOT_ACCESS_KEY"));
}

/// Scenario 4 (spec §8): the same resource flagged at two different
/// severities by two different domains must survive the unified engine as
/// two distinct findings — never collapsed by a second merge pass.
#[tokio::test]
async fn scenario_unified_audit_preserves_cross_domain_severities() {
    let fixture = RegionFixture {
        volumes: vec![EbsVolume {
            volume_id: "vol-xyz".into(),
            attached: false,
            state: "available".into(),
            volume_type: "gp3".into(),
            size_gb: 50.0,
            encrypted: false,
        }],
        ..Default::default()
    };
    let provider: Arc<dyn AwsClientProvider> = Arc::new(FakeAwsProvider::new(&["us-east-1"]).region("us-east-1", fixture));

    let (report, _failed_domains) = run_unified_aws_audit(
        provider,
        "default",
        "123456789012",
        &["us-east-1".to_string()],
        30,
        None,
        CancellationToken::new(),
    )
    .await
    .expect("unified audit should succeed");

    let vol_xyz_findings: Vec<_> = report.findings.iter().filter(|f| f.resource_id == "vol-xyz").collect();
    assert_eq!(vol_xyz_findings.len(), 2, "cost and data-protection findings for vol-xyz must not be merged");

    let severities: Vec<Severity> = vol_xyz_findings.iter().map(|f| f.severity).collect();
    assert!(severities.contains(&Severity::Medium), "EBS_UNATTACHED (cost) must survive");
    assert!(severities.contains(&Severity::High), "EBS_UNENCRYPTED (data-protection) must survive");

    let high_index = report.findings.iter().position(|f| f.resource_id == "vol-xyz" && f.severity == Severity::High);
    let medium_index = report.findings.iter().position(|f| f.resource_id == "vol-xyz" && f.severity == Severity::Medium);
    assert!(high_index < medium_index, "HIGH must sort before MEDIUM");
}

struct FakeKubeClient(KubernetesClusterData);

#[async_trait]
impl KubeClient for FakeKubeClient {
    async fn collect(&self, _context: Option<&str>) -> Result<KubernetesClusterData, CollectionError> {
        Ok(self.0.clone())
    }
}

fn container(name: &str, privileged: bool) -> ContainerSecurity {
    ContainerSecurity {
        container_name: name.to_string(),
        privileged,
        run_as_root: false,
        has_cap_sys_admin: false,
        seccomp_profile: SeccompProfileType::RuntimeDefault,
        has_cpu_request: true,
        has_memory_request: true,
    }
}

/// Scenario 5 (spec §8): one namespace missing the PSA label, one pod with a
/// privileged container, one service account without IRSA, and an EKS
/// cluster with a wide-open public endpoint.
#[tokio::test]
async fn scenario_kubernetes_cluster_with_mixed_findings() {
    let cluster = KubernetesClusterData {
        context_name: "prod-cluster".into(),
        nodes: vec![KubernetesNode {
            name: "node-1".into(),
            cpu_capacity_millis: 4000,
            cpu_allocatable_millis: 3800,
            provider_id: "aws:///us-east-1a/i-0123456789abcdef0".into(),
            labels: BTreeMap::new(),
        }],
        namespaces: vec![KubernetesNamespace {
            name: "default".into(),
            has_limit_range: true,
            labels: BTreeMap::new(),
        }],
        pods: vec![KubernetesPod {
            name: "web-1".into(),
            namespace: "default".into(),
            host_network: false,
            host_pid: false,
            host_ipc: false,
            service_account_name: "app".into(),
            containers: vec![container("app", true)],
        }],
        services: Vec::new(),
        service_accounts: vec![KubernetesServiceAccount {
            name: "app".into(),
            namespace: "default".into(),
            annotations: BTreeMap::new(),
            automount_service_account_token: Some(false),
        }],
        eks: Some(EksData {
            cluster_name: "prod-cluster".into(),
            endpoint_public_access: true,
            public_access_cidrs: vec!["0.0.0.0/0".to_string()],
            control_plane_version: "1.29".into(),
            enabled_log_types: Vec::new(),
            secrets_encryption_kms_key_arn: None,
            oidc_issuer: String::new(),
            oidc_provider_arn: String::new(),
            nodegroups: Vec::<EksNodegroup>::new(),
        }),
    };
    let kube = FakeKubeClient(cluster);

    let (report, fail) = run_kubernetes_audit(
        &kube,
        None,
        "default",
        "123456789012",
        "default",
        Some("prod-cluster"),
        Some("prod-cluster"),
        false,
        true,
        None,
    )
    .await
    .expect("kubernetes audit should succeed");

    assert!(!fail);
    let rule_ids: Vec<&str> = report.findings.iter().map(|f| f.rule_id.as_str()).collect();
    assert!(rule_ids.contains(&"K8S_POD_SECURITY_ADMISSION_NOT_ENFORCED"));
    assert!(rule_ids.contains(&"K8S_NAMESPACE_PSS_NOT_SET"));
    assert!(rule_ids.contains(&"K8S_POD_PRIVILEGED_CONTAINER"));
    assert!(rule_ids.contains(&"EKS_SERVICEACCOUNT_NO_IRSA"));
    assert!(rule_ids.contains(&"EKS_PUBLIC_ENDPOINT_WIDE_OPEN"));

    let privileged = report.findings.iter().find(|f| f.rule_id == "K8S_POD_PRIVILEGED_CONTAINER").unwrap();
    assert_eq!(privileged.severity, Severity::Critical);
    assert_eq!(report.findings[0].severity, Severity::Critical, "CRITICAL findings must sort first");

    let wide_open = report.findings.iter().find(|f| f.rule_id == "EKS_PUBLIC_ENDPOINT_WIDE_OPEN").unwrap();
    assert_eq!(wide_open.severity, Severity::Critical);

    assert_eq!(report.metadata.as_ref().unwrap().get("cluster_provider").unwrap(), "eks");
}

/// Scenario 6 (spec §8): `explain --score N` lookups, found and missing.
#[test]
fn scenario_explain_score_lookup_found_and_missing() {
    assert!(correlation::find_attack_path_by_score(98).is_some());
    assert!(correlation::find_attack_path_by_score(999).is_none());
}
