//! Production adapters wiring the narrow client traits in
//! `collectors::clients` to the real `aws-sdk-*` crates. Every SDK call is
//! wrapped so a failure becomes a `CollectionError` rather than propagating
//! the SDK's own error type past the collector boundary (spec §4.1).

use std::sync::Arc;

use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_types::region::Region;
use tracing::warn;

use crate::collectors::aws::eks::{decode_and_check, is_admin_policy_arn};
use crate::collectors::clients::{
    AwsClientProvider, CloudTrailClient, ConfigClient, CostExplorerClient, Ec2Client, ElbClient, EksClient, GuardDutyClient, IamClient,
    RdsClient, S3Client,
};
use crate::errors::CollectionError;
use crate::inventory::aws::{
    EbsVolume, Ec2Instance, IamUserInfo, LoadBalancer, NatGateway, RdsInstance, RootAccountInfo, S3BucketInfo, SavingsPlanCoverage,
    SecurityGroupRule,
};
use crate::inventory::kubernetes::EksData;

const CANONICAL_REGION: &str = "us-east-1";

/// Substrings distinguishing a credential-chain failure (spec §4.1:
/// "catastrophic credential chain failure", §7 type 3) from an ordinary
/// per-call service error. The AWS SDK surfaces these both as dispatch-time
/// provider errors (missing/expired credentials never reached the service)
/// and as service-rejected auth errors, so the raw error's `Display` output
/// is what both shapes have in common.
const CREDENTIAL_FAILURE_MARKERS: &[&str] = &[
    "no credentials",
    "failed to load credentials",
    "could not load credentials",
    "unable to load credentials",
    "credentialsnotloaded",
    "invalidclienttokenid",
    "unrecognizedclientexception",
    "expiredtoken",
    "could not resolve credentials",
    "missing credentials",
];

fn is_credential_failure_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    CREDENTIAL_FAILURE_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Wraps a raw SDK error in the right `CollectionError` variant: a
/// credential-chain failure aborts the whole profile (`is_credential_failure`
/// in `errors.rs`), anything else is a plain per-call skip.
fn classify_sdk_error(context: &str, e: impl std::fmt::Display) -> CollectionError {
    let message = format!("{context}: {e}");
    if is_credential_failure_message(&message) {
        CollectionError::Credentials(message)
    } else {
        CollectionError::Sdk(message)
    }
}

async fn sdk_config(profile: &str, region: &str) -> aws_types::SdkConfig {
    let region_provider = RegionProviderChain::first_try(Region::new(region.to_string()));
    aws_config::defaults(BehaviorVersion::latest())
        .profile_name(profile)
        .region(region_provider)
        .load()
        .await
}

fn monthly_cost_estimate(instance_type: &str) -> f64 {
    // Flat per-family estimate; a precise figure requires the Pricing API,
    // which this crate does not call (see DESIGN.md).
    match instance_type.split('.').next().unwrap_or("") {
        "t2" | "t3" | "t3a" | "t4g" => 15.0,
        "m5" | "m6i" | "m6g" => 70.0,
        "c5" | "c6i" => 65.0,
        "r5" | "r6i" => 110.0,
        _ => 40.0,
    }
}

pub struct SdkEc2Client {
    client: aws_sdk_ec2::Client,
    cloudwatch: aws_sdk_cloudwatch::Client,
}

#[async_trait]
impl Ec2Client for SdkEc2Client {
    async fn list_instances(&self, region: &str, days_back: i64) -> Result<Vec<Ec2Instance>, CollectionError> {
        let mut out = Vec::new();
        let mut paginator = self.client.describe_instances().into_paginator().send();
        while let Some(page) = paginator.next().await {
            let page = page.map_err(|e| CollectionError::Pagination(format!("describe_instances in {region}: {e}")))?;
            for reservation in page.reservations() {
                for instance in reservation.instances() {
                    let Some(instance_id) = instance.instance_id() else { continue };
                    let state = instance
                        .state()
                        .and_then(|s| s.name())
                        .map(|n| n.as_str().to_string())
                        .unwrap_or_default();
                    let instance_type = instance.instance_type().map(|t| t.as_str().to_string()).unwrap_or_default();
                    let monthly_cost = if state == "running" { monthly_cost_estimate(&instance_type) } else { 0.0 };
                    let avg_cpu_percent = avg_cpu_percent(&self.cloudwatch, "AWS/EC2", "InstanceId", instance_id, days_back)
                        .await
                        .unwrap_or_else(|e| {
                            warn!(instance_id, error = %e, "CloudWatch CPU lookup failed");
                            crate::collectors::conservative::conservative_metric()
                        });
                    out.push(Ec2Instance {
                        instance_id: instance_id.to_string(),
                        state,
                        avg_cpu_percent,
                        monthly_cost,
                    });
                }
            }
        }
        Ok(out)
    }

    async fn list_volumes(&self, region: &str) -> Result<Vec<EbsVolume>, CollectionError> {
        let mut out = Vec::new();
        let mut paginator = self.client.describe_volumes().into_paginator().send();
        while let Some(page) = paginator.next().await {
            let page = page.map_err(|e| CollectionError::Pagination(format!("describe_volumes in {region}: {e}")))?;
            for volume in page.volumes() {
                let Some(volume_id) = volume.volume_id() else { continue };
                out.push(EbsVolume {
                    volume_id: volume_id.to_string(),
                    attached: !volume.attachments().is_empty(),
                    state: volume.state().map(|s| s.as_str().to_string()).unwrap_or_default(),
                    volume_type: volume.volume_type().map(|t| t.as_str().to_string()).unwrap_or_default(),
                    size_gb: volume.size().unwrap_or(0) as f64,
                    encrypted: volume.encrypted().unwrap_or(false),
                });
            }
        }
        Ok(out)
    }

    async fn list_nat_gateways(&self, region: &str, days_back: i64) -> Result<Vec<NatGateway>, CollectionError> {
        let mut out = Vec::new();
        let mut paginator = self.client.describe_nat_gateways().into_paginator().send();
        while let Some(page) = paginator.next().await {
            let page = page.map_err(|e| CollectionError::Pagination(format!("describe_nat_gateways in {region}: {e}")))?;
            for nat in page.nat_gateways() {
                let Some(nat_gateway_id) = nat.nat_gateway_id() else { continue };
                let bytes_processed_gb = sum_metric(&self.cloudwatch, "AWS/NATGateway", "BytesOutToDestination", "NatGatewayId", nat_gateway_id, days_back)
                    .await
                    .map(|bytes| bytes as f64 / 1024.0 / 1024.0 / 1024.0)
                    .unwrap_or_else(|e| {
                        warn!(nat_gateway_id, error = %e, "CloudWatch NAT traffic lookup failed");
                        0.0
                    });
                out.push(NatGateway {
                    nat_gateway_id: nat_gateway_id.to_string(),
                    state: nat.state().map(|s| s.as_str().to_string()).unwrap_or_default(),
                    bytes_processed_gb,
                });
            }
        }
        Ok(out)
    }

    async fn list_security_group_rules(&self, region: &str) -> Result<Vec<SecurityGroupRule>, CollectionError> {
        let mut out = Vec::new();
        let mut paginator = self.client.describe_security_groups().into_paginator().send();
        while let Some(page) = paginator.next().await {
            let page = page.map_err(|e| CollectionError::Pagination(format!("describe_security_groups in {region}: {e}")))?;
            for group in page.security_groups() {
                let Some(group_id) = group.group_id() else { continue };
                for perm in group.ip_permissions() {
                    let port = perm.from_port().map(|p| p as u16);
                    for range in perm.ip_ranges() {
                        if let Some(cidr) = range.cidr_ip() {
                            out.push(SecurityGroupRule {
                                security_group_id: group_id.to_string(),
                                region: region.to_string(),
                                port,
                                cidr: cidr.to_string(),
                            });
                        }
                    }
                    for range in perm.ipv6_ranges() {
                        if let Some(cidr) = range.cidr_ipv6() {
                            out.push(SecurityGroupRule {
                                security_group_id: group_id.to_string(),
                                region: region.to_string(),
                                port,
                                cidr: cidr.to_string(),
                            });
                        }
                    }
                }
            }
        }
        Ok(out)
    }

    async fn active_regions(&self) -> Result<Vec<String>, CollectionError> {
        let resp = self
            .client
            .describe_regions()
            .send()
            .await
            .map_err(|e| classify_sdk_error("describe_regions", e))?;
        Ok(resp.regions().iter().filter_map(|r| r.region_name().map(str::to_string)).collect())
    }
}

async fn avg_cpu_percent(
    cloudwatch: &aws_sdk_cloudwatch::Client,
    namespace: &str,
    dimension_name: &str,
    dimension_value: &str,
    days_back: i64,
) -> Result<Option<f64>, CollectionError> {
    let days_back = if days_back <= 0 { 30 } else { days_back };
    let now = chrono::Utc::now().timestamp();
    let end = aws_smithy_types::DateTime::from_secs(now);
    let start = aws_smithy_types::DateTime::from_secs(now - days_back * 86400);
    let resp = cloudwatch
        .get_metric_statistics()
        .namespace(namespace)
        .metric_name("CPUUtilization")
        .dimensions(aws_sdk_cloudwatch::types::Dimension::builder().name(dimension_name).value(dimension_value).build())
        .start_time(start)
        .end_time(end)
        .period(86400)
        .statistics(aws_sdk_cloudwatch::types::Statistic::Average)
        .send()
        .await
        .map_err(|e| classify_sdk_error(&format!("get_metric_statistics {namespace}/CPUUtilization"), e))?;
    let datapoints = resp.datapoints();
    if datapoints.is_empty() {
        return Ok(None);
    }
    let sum: f64 = datapoints.iter().filter_map(|d| d.average()).sum();
    Ok(Some(sum / datapoints.len() as f64))
}

async fn sum_metric(
    cloudwatch: &aws_sdk_cloudwatch::Client,
    namespace: &str,
    metric_name: &str,
    dimension_name: &str,
    dimension_value: &str,
    days_back: i64,
) -> Result<u64, CollectionError> {
    let days_back = if days_back <= 0 { 30 } else { days_back };
    let now = chrono::Utc::now().timestamp();
    let end = aws_smithy_types::DateTime::from_secs(now);
    let start = aws_smithy_types::DateTime::from_secs(now - days_back * 86400);
    let resp = cloudwatch
        .get_metric_statistics()
        .namespace(namespace)
        .metric_name(metric_name)
        .dimensions(aws_sdk_cloudwatch::types::Dimension::builder().name(dimension_name).value(dimension_value).build())
        .start_time(start)
        .end_time(end)
        .period(86400 * days_back.max(1) as i32)
        .statistics(aws_sdk_cloudwatch::types::Statistic::Sum)
        .send()
        .await
        .map_err(|e| classify_sdk_error(&format!("get_metric_statistics {namespace}/{metric_name}"), e))?;
    let total: f64 = resp.datapoints().iter().filter_map(|d| d.sum()).sum();
    Ok(total as u64)
}

pub struct SdkElbClient {
    elb: aws_sdk_elasticloadbalancingv2::Client,
    cloudwatch: aws_sdk_cloudwatch::Client,
}

#[async_trait]
impl ElbClient for SdkElbClient {
    async fn list_load_balancers(&self, region: &str, days_back: i64) -> Result<Vec<LoadBalancer>, CollectionError> {
        let mut out = Vec::new();
        let mut paginator = self.elb.describe_load_balancers().into_paginator().send();
        while let Some(page) = paginator.next().await {
            let page = page.map_err(|e| CollectionError::Pagination(format!("describe_load_balancers in {region}: {e}")))?;
            for lb in page.load_balancers() {
                let Some(arn) = lb.load_balancer_arn() else { continue };
                let name = lb.load_balancer_name().unwrap_or(arn).to_string();
                let request_count = sum_metric(
                    &self.cloudwatch,
                    "AWS/ApplicationELB",
                    "RequestCount",
                    "LoadBalancer",
                    arn.rsplit("loadbalancer/").next().unwrap_or(arn),
                    days_back,
                )
                .await
                .ok();
                out.push(LoadBalancer {
                    load_balancer_id: name,
                    lb_type: lb.r#type().map(|t| t.as_str().to_string()).unwrap_or_default(),
                    state: lb.state().and_then(|s| s.code()).map(|c| c.as_str().to_string()).unwrap_or_default(),
                    request_count,
                });
            }
        }
        Ok(out)
    }
}

pub struct SdkRdsClient {
    client: aws_sdk_rds::Client,
    cloudwatch: aws_sdk_cloudwatch::Client,
}

#[async_trait]
impl RdsClient for SdkRdsClient {
    async fn list_instances(&self, region: &str, days_back: i64) -> Result<Vec<RdsInstance>, CollectionError> {
        let mut out = Vec::new();
        let mut paginator = self.client.describe_db_instances().into_paginator().send();
        while let Some(page) = paginator.next().await {
            let page = page.map_err(|e| CollectionError::Pagination(format!("describe_db_instances in {region}: {e}")))?;
            for db in page.db_instances() {
                let Some(db_instance_id) = db.db_instance_identifier() else { continue };
                let avg_cpu_percent = avg_cpu_percent(&self.cloudwatch, "AWS/RDS", "DBInstanceIdentifier", db_instance_id, days_back)
                    .await
                    .unwrap_or_else(|e| {
                        warn!(db_instance_id, error = %e, "CloudWatch RDS CPU lookup failed");
                        crate::collectors::conservative::conservative_metric()
                    });
                out.push(RdsInstance {
                    db_instance_id: db_instance_id.to_string(),
                    status: db.db_instance_status().unwrap_or_default().to_string(),
                    avg_cpu_percent,
                    monthly_cost: db
                        .db_instance_class()
                        .map(|c| monthly_cost_estimate(c.trim_start_matches("db.")))
                        .unwrap_or(0.0),
                    storage_encrypted: db.storage_encrypted().unwrap_or(false),
                });
            }
        }
        Ok(out)
    }
}

pub struct SdkCostExplorerClient {
    client: aws_sdk_costexplorer::Client,
}

#[async_trait]
impl CostExplorerClient for SdkCostExplorerClient {
    async fn savings_plan_coverage(&self, region: &str, days_back: i64) -> Result<Option<SavingsPlanCoverage>, CollectionError> {
        let days_back = if days_back <= 0 { 30 } else { days_back };
        let end = chrono::Utc::now().date_naive();
        let start = end - chrono::Duration::days(days_back);
        let resp = self
            .client
            .get_savings_plans_coverage()
            .time_period(
                aws_sdk_costexplorer::types::DateInterval::builder()
                    .start(start.to_string())
                    .end(end.to_string())
                    .build()
                    .map_err(|e| classify_sdk_error(&format!("savings plan coverage time period in {region}"), e))?,
            )
            .send()
            .await
            .map_err(|e| classify_sdk_error(&format!("get_savings_plans_coverage in {region}"), e))?;
        let Some(entry) = resp.savings_plans_coverages().first() else {
            return Ok(None);
        };
        let Some(coverage) = entry.coverage() else { return Ok(None) };
        let on_demand_cost: f64 = coverage
            .coverage_normalized_units_percentage()
            .and_then(|_| coverage.on_demand_cost())
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.0);
        let covered_cost: f64 = coverage.spend_covered_by_savings_plans().and_then(|s| s.parse().ok()).unwrap_or(0.0);
        let coverage_percent: f64 = coverage.coverage_percentage().and_then(|s| s.parse().ok()).unwrap_or(0.0);
        Ok(Some(SavingsPlanCoverage {
            coverage_percent,
            on_demand_cost,
            covered_cost,
        }))
    }
}

pub struct SdkS3Client {
    client: aws_sdk_s3::Client,
}

#[async_trait]
impl S3Client for SdkS3Client {
    async fn list_buckets(&self) -> Result<Vec<S3BucketInfo>, CollectionError> {
        let resp = self
            .client
            .list_buckets()
            .send()
            .await
            .map_err(|e| classify_sdk_error("list_buckets", e))?;
        let mut out = Vec::new();
        for bucket in resp.buckets() {
            let Some(bucket_name) = bucket.name() else { continue };
            let public = self
                .client
                .get_bucket_policy_status()
                .bucket(bucket_name)
                .send()
                .await
                .ok()
                .and_then(|r| r.policy_status().and_then(|s| s.is_public()))
                .unwrap_or_else(crate::collectors::conservative::conservative_public);
            let default_encryption_enabled = self
                .client
                .get_bucket_encryption()
                .bucket(bucket_name)
                .send()
                .await
                .map(|r| !r.server_side_encryption_configuration().map(|c| c.rules()).unwrap_or_default().is_empty())
                .unwrap_or(false);
            out.push(S3BucketInfo {
                bucket_name: bucket_name.to_string(),
                public,
                default_encryption_enabled,
            });
        }
        Ok(out)
    }
}

pub struct SdkIamClient {
    client: aws_sdk_iam::Client,
}

#[async_trait]
impl IamClient for SdkIamClient {
    async fn list_users(&self) -> Result<Vec<IamUserInfo>, CollectionError> {
        let mut out = Vec::new();
        let mut paginator = self.client.list_users().into_paginator().send();
        while let Some(page) = paginator.next().await {
            let page = page.map_err(|e| CollectionError::Pagination(format!("list_users: {e}")))?;
            for user in page.users() {
                let user_name = user.user_name().to_string();
                let has_login_profile = self.client.get_login_profile().user_name(&user_name).send().await.is_ok();
                let mfa_enabled = self
                    .client
                    .list_mfa_devices()
                    .user_name(&user_name)
                    .send()
                    .await
                    .map(|r| !r.mfa_devices().is_empty())
                    .unwrap_or(false);
                out.push(IamUserInfo {
                    user_name,
                    has_login_profile,
                    mfa_enabled,
                });
            }
        }
        Ok(out)
    }

    async fn root_account_info(&self) -> Result<RootAccountInfo, CollectionError> {
        let summary = self
            .client
            .get_account_summary()
            .send()
            .await
            .map_err(|e| classify_sdk_error("get_account_summary", e))?;
        let map = summary.summary_map();
        let has_access_keys = map.get(&aws_sdk_iam::types::SummaryKeyType::AccountAccessKeysPresent).copied().unwrap_or(0) > 0;
        let mfa_enabled = map.get(&aws_sdk_iam::types::SummaryKeyType::AccountMfaEnabled).copied().unwrap_or(0) > 0;
        Ok(RootAccountInfo {
            has_access_keys,
            mfa_enabled,
            data_available: true,
        })
    }

    async fn overpermissive_role_policies(&self, role_arn: &str) -> Result<Vec<String>, CollectionError> {
        let role_name = role_arn.rsplit('/').next().unwrap_or(role_arn);
        let mut flagged = Vec::new();

        let attached = self
            .client
            .list_attached_role_policies()
            .role_name(role_name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&format!("list_attached_role_policies for {role_name}"), e))?;
        for policy in attached.attached_policies() {
            if let Some(arn) = policy.policy_arn() {
                if is_admin_policy_arn(arn) {
                    flagged.push(policy.policy_name().unwrap_or(arn).to_string());
                }
            }
        }

        let inline = self
            .client
            .list_role_policies()
            .role_name(role_name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&format!("list_role_policies for {role_name}"), e))?;
        for policy_name in inline.policy_names() {
            let doc = self
                .client
                .get_role_policy()
                .role_name(role_name)
                .policy_name(policy_name)
                .send()
                .await
                .map_err(|e| classify_sdk_error(&format!("get_role_policy {policy_name} for {role_name}"), e))?;
            if let Some(document) = doc.policy_document() {
                if decode_and_check(document).unwrap_or(false) {
                    flagged.push(policy_name.to_string());
                }
            }
        }

        Ok(flagged)
    }

    async fn find_oidc_provider_arn(&self, issuer_url: &str) -> Result<Option<String>, CollectionError> {
        let issuer_host = issuer_url.trim_start_matches("https://").trim_start_matches("http://");
        let resp = self
            .client
            .list_open_id_connect_providers()
            .send()
            .await
            .map_err(|e| classify_sdk_error("list_open_id_connect_providers", e))?;
        Ok(resp
            .open_id_connect_provider_list()
            .iter()
            .filter_map(|p| p.arn())
            .find(|arn| arn.split("oidc-provider/").nth(1) == Some(issuer_host))
            .map(str::to_string))
    }
}

pub struct SdkCloudTrailClient {
    client: aws_sdk_cloudtrail::Client,
}

#[async_trait]
impl CloudTrailClient for SdkCloudTrailClient {
    async fn has_multi_region_trail(&self) -> Result<bool, CollectionError> {
        let resp = self
            .client
            .describe_trails()
            .send()
            .await
            .map_err(|e| classify_sdk_error("describe_trails", e))?;
        Ok(resp.trail_list().iter().any(|t| t.is_multi_region_trail().unwrap_or(false)))
    }
}

pub struct SdkGuardDutyClient {
    client: aws_sdk_guardduty::Client,
}

#[async_trait]
impl GuardDutyClient for SdkGuardDutyClient {
    async fn is_enabled(&self, region: &str) -> Result<bool, CollectionError> {
        let detectors = self
            .client
            .list_detectors()
            .send()
            .await
            .map_err(|e| classify_sdk_error(&format!("list_detectors in {region}"), e))?;
        let Some(detector_id) = detectors.detector_ids().first() else {
            return Ok(false);
        };
        let detail = self
            .client
            .get_detector()
            .detector_id(detector_id)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&format!("get_detector in {region}"), e))?;
        Ok(detail.status().map(|s| s.as_str() == "ENABLED").unwrap_or(false))
    }
}

pub struct SdkConfigClient {
    client: aws_sdk_config::Client,
}

#[async_trait]
impl ConfigClient for SdkConfigClient {
    async fn is_recorder_enabled(&self, region: &str) -> Result<bool, CollectionError> {
        let status = self
            .client
            .describe_configuration_recorder_status()
            .send()
            .await
            .map_err(|e| classify_sdk_error(&format!("describe_configuration_recorder_status in {region}"), e))?;
        Ok(status.configuration_recorders_status().iter().any(|s| s.recording().unwrap_or(false)))
    }
}

pub struct SdkEksClient {
    client: aws_sdk_eks::Client,
    iam: aws_sdk_iam::Client,
    ec2: aws_sdk_ec2::Client,
}

/// Resolves the real IMDSv2 `HttpTokens` setting for a managed nodegroup's
/// launch template (spec §4.2 `EKS_NODEGROUP_IMDSV2_NOT_ENFORCED`).
/// `describe_nodegroup` only returns a launch-template reference, not its
/// metadata options, so this is a second EC2 call per nodegroup that carries
/// one.
async fn resolve_nodegroup_http_tokens(
    ec2: &aws_sdk_ec2::Client,
    launch_template: &aws_sdk_eks::types::LaunchTemplateSpecification,
) -> Result<String, CollectionError> {
    let mut req = ec2.describe_launch_template_versions();
    req = match launch_template.id() {
        Some(id) => req.launch_template_id(id),
        None => match launch_template.name() {
            Some(name) => req.launch_template_name(name),
            None => return Ok("required".to_string()),
        },
    };
    let version = launch_template.version().filter(|v| !v.is_empty()).unwrap_or("$Default");
    let resp = req
        .versions(version)
        .send()
        .await
        .map_err(|e| classify_sdk_error("describe_launch_template_versions", e))?;
    Ok(resp
        .launch_template_versions()
        .first()
        .and_then(|v| v.launch_template_data())
        .and_then(|d| d.metadata_options())
        .and_then(|m| m.http_tokens())
        .map(|t| t.as_str().to_string())
        .unwrap_or_else(|| "required".to_string()))
}

#[async_trait]
impl EksClient for SdkEksClient {
    async fn describe_cluster(&self, region: &str, cluster_name: &str) -> Result<Option<EksData>, CollectionError> {
        let resp = match self.client.describe_cluster().name(cluster_name).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(cluster_name, region, error = %e, "describe_cluster failed, skipping EKS enrichment");
                return Ok(None);
            }
        };
        let Some(cluster) = resp.cluster() else { return Ok(None) };

        let vpc_config = cluster.resources_vpc_config();
        let endpoint_public_access = vpc_config.and_then(|c| c.endpoint_public_access()).unwrap_or(false);
        let public_access_cidrs = vpc_config.map(|c| c.public_access_cidrs().to_vec()).unwrap_or_default();
        let enabled_log_types = cluster
            .logging()
            .and_then(|l| l.cluster_logging())
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.enabled().unwrap_or(false))
                    .flat_map(|e| e.types().iter().map(|t| t.as_str().to_string()))
                    .collect()
            })
            .unwrap_or_default();
        let secrets_encryption_kms_key_arn = cluster
            .encryption_config()
            .iter()
            .find(|c| c.resources().iter().any(|r| r == "secrets"))
            .and_then(|c| c.provider())
            .and_then(|p| p.key_arn())
            .map(str::to_string);
        let oidc_issuer = cluster.identity().and_then(|i| i.oidc()).and_then(|o| o.issuer()).unwrap_or_default().to_string();
        let oidc_provider_arn = if oidc_issuer.is_empty() {
            String::new()
        } else {
            let iam_client = SdkIamClient { client: self.iam.clone() };
            match iam_client.find_oidc_provider_arn(&oidc_issuer).await {
                Ok(found) => found.unwrap_or_default(),
                Err(e) => {
                    warn!(cluster_name, error = %e, "IAM OIDC provider lookup failed, treating as unknown");
                    crate::collectors::conservative::conservative_oidc_provider_arn()
                }
            }
        };

        let mut nodegroups = Vec::new();
        let ng_names = self
            .client
            .list_nodegroups()
            .cluster_name(cluster_name)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&format!("list_nodegroups for {cluster_name}"), e))?;
        for name in ng_names.nodegroups() {
            let detail = self
                .client
                .describe_nodegroup()
                .cluster_name(cluster_name)
                .nodegroup_name(name)
                .send()
                .await
                .map_err(|e| classify_sdk_error(&format!("describe_nodegroup {name}"), e))?;
            let Some(ng) = detail.nodegroup() else { continue };
            let http_tokens = match ng.launch_template() {
                Some(lt) => resolve_nodegroup_http_tokens(&self.ec2, lt).await.unwrap_or_else(|e| {
                    warn!(nodegroup = name, error = %e, "launch template metadata lookup failed, assuming IMDSv2 enforced");
                    "required".to_string()
                }),
                // No custom launch template: the nodegroup runs on the
                // EKS-managed default, which enforces IMDSv2.
                None => "required".to_string(),
            };
            let role_policies = match ng.node_role() {
                Some(role_arn) => {
                    let iam_client = SdkIamClient { client: self.iam.clone() };
                    iam_client.overpermissive_role_policies(role_arn).await.unwrap_or_else(|e| {
                        warn!(role_arn, error = %e, "node role audit failed");
                        Vec::new()
                    })
                }
                None => Vec::new(),
            };
            nodegroups.push(crate::inventory::kubernetes::EksNodegroup {
                name: name.to_string(),
                kubernetes_version: ng.version().unwrap_or_default().to_string(),
                http_tokens,
                node_role_policies: role_policies,
            });
        }

        Ok(Some(EksData {
            cluster_name: cluster_name.to_string(),
            endpoint_public_access,
            public_access_cidrs,
            control_plane_version: cluster.version().unwrap_or_default().to_string(),
            enabled_log_types,
            secrets_encryption_kms_key_arn,
            oidc_issuer: oidc_issuer.clone(),
            oidc_provider_arn: String::new(),
            nodegroups,
        }))
    }
}

/// Builds narrow SDK-backed clients on demand for a `(profile, region)` pair.
pub struct AwsSdkClientProvider;

impl AwsSdkClientProvider {
    pub fn new() -> Self {
        AwsSdkClientProvider
    }
}

impl Default for AwsSdkClientProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AwsClientProvider for AwsSdkClientProvider {
    async fn ec2(&self, profile: &str, region: &str) -> Result<Arc<dyn Ec2Client>, CollectionError> {
        let cfg = sdk_config(profile, region).await;
        Ok(Arc::new(SdkEc2Client {
            client: aws_sdk_ec2::Client::new(&cfg),
            cloudwatch: aws_sdk_cloudwatch::Client::new(&cfg),
        }))
    }

    async fn elb(&self, profile: &str, region: &str) -> Result<Arc<dyn ElbClient>, CollectionError> {
        let cfg = sdk_config(profile, region).await;
        Ok(Arc::new(SdkElbClient {
            elb: aws_sdk_elasticloadbalancingv2::Client::new(&cfg),
            cloudwatch: aws_sdk_cloudwatch::Client::new(&cfg),
        }))
    }

    async fn rds(&self, profile: &str, region: &str) -> Result<Arc<dyn RdsClient>, CollectionError> {
        let cfg = sdk_config(profile, region).await;
        Ok(Arc::new(SdkRdsClient {
            client: aws_sdk_rds::Client::new(&cfg),
            cloudwatch: aws_sdk_cloudwatch::Client::new(&cfg),
        }))
    }

    async fn cost_explorer(&self, profile: &str, region: &str) -> Result<Arc<dyn CostExplorerClient>, CollectionError> {
        let cfg = sdk_config(profile, region).await;
        Ok(Arc::new(SdkCostExplorerClient {
            client: aws_sdk_costexplorer::Client::new(&cfg),
        }))
    }

    async fn s3(&self, profile: &str) -> Result<Arc<dyn S3Client>, CollectionError> {
        let cfg = sdk_config(profile, CANONICAL_REGION).await;
        Ok(Arc::new(SdkS3Client {
            client: aws_sdk_s3::Client::new(&cfg),
        }))
    }

    async fn iam(&self, profile: &str) -> Result<Arc<dyn IamClient>, CollectionError> {
        let cfg = sdk_config(profile, CANONICAL_REGION).await;
        Ok(Arc::new(SdkIamClient {
            client: aws_sdk_iam::Client::new(&cfg),
        }))
    }

    async fn cloudtrail(&self, profile: &str) -> Result<Arc<dyn CloudTrailClient>, CollectionError> {
        let cfg = sdk_config(profile, CANONICAL_REGION).await;
        Ok(Arc::new(SdkCloudTrailClient {
            client: aws_sdk_cloudtrail::Client::new(&cfg),
        }))
    }

    async fn guardduty(&self, profile: &str, region: &str) -> Result<Arc<dyn GuardDutyClient>, CollectionError> {
        let cfg = sdk_config(profile, region).await;
        Ok(Arc::new(SdkGuardDutyClient {
            client: aws_sdk_guardduty::Client::new(&cfg),
        }))
    }

    async fn config(&self, profile: &str, region: &str) -> Result<Arc<dyn ConfigClient>, CollectionError> {
        let cfg = sdk_config(profile, region).await;
        Ok(Arc::new(SdkConfigClient {
            client: aws_sdk_config::Client::new(&cfg),
        }))
    }

    async fn eks(&self, profile: &str, region: &str) -> Result<Arc<dyn EksClient>, CollectionError> {
        let cfg = sdk_config(profile, region).await;
        Ok(Arc::new(SdkEksClient {
            client: aws_sdk_eks::Client::new(&cfg),
            iam: aws_sdk_iam::Client::new(&cfg),
            ec2: aws_sdk_ec2::Client::new(&cfg),
        }))
    }

    async fn active_regions(&self, profile: &str) -> Result<Vec<String>, CollectionError> {
        self.ec2(profile, CANONICAL_REGION).await?.active_regions().await
    }
}
