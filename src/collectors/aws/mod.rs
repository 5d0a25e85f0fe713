pub mod eks;
pub mod production;

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::collectors::clients::AwsClientProvider;
use crate::errors::CollectionError;
use crate::inventory::aws::{RegionData, SecurityData};

/// Upper bound on concurrent per-region SDK calls within one profile (spec
/// §5: "a bounded worker pool, small constant, e.g. 8").
const REGION_CONCURRENCY: usize = 8;

/// Resolves the effective region list: the caller-supplied list if
/// non-empty, otherwise active-region discovery (spec §4.4 step 2).
pub async fn resolve_regions(
    provider: &dyn AwsClientProvider,
    profile: &str,
    requested: &[String],
) -> Result<Vec<String>, CollectionError> {
    if !requested.is_empty() {
        return Ok(requested.to_vec());
    }
    provider.active_regions(profile).await
}

/// Collects the account-level security bundle once per audit (spec §3:
/// "populated once per audit by the security collector"). Every per-call
/// failure degrades to a conservative default or an omitted record; this
/// function itself never fails.
pub async fn collect_security_data(provider: &dyn AwsClientProvider, profile: &str, regions: &[String]) -> SecurityData {
    let mut security = SecurityData::default();

    if let Ok(s3) = provider.s3(profile).await {
        match s3.list_buckets().await {
            Ok(buckets) => security.s3_buckets = buckets,
            Err(e) => warn!(error = %e, "S3 bucket listing failed, no buckets recorded"),
        }
    } else {
        warn!(profile, "could not build S3 client");
    }

    if let Ok(iam) = provider.iam(profile).await {
        match iam.list_users().await {
            Ok(users) => security.iam_users = users,
            Err(e) => warn!(error = %e, "IAM user listing failed"),
        }
        match iam.root_account_info().await {
            Ok(root) => security.root_account = root,
            Err(e) => {
                warn!(error = %e, "root account summary failed, treating as unavailable");
                security.root_account.data_available = crate::collectors::conservative::conservative_data_available();
            }
        }
    } else {
        warn!(profile, "could not build IAM client");
    }

    if let Ok(cloudtrail) = provider.cloudtrail(profile).await {
        match cloudtrail.has_multi_region_trail().await {
            Ok(has_trail) => security.cloudtrail.has_multi_region_trail = has_trail,
            Err(e) => warn!(error = %e, "CloudTrail status lookup failed"),
        }
    }

    for region in regions {
        if let Ok(ec2) = provider.ec2(profile, region).await {
            match ec2.list_security_group_rules(region).await {
                Ok(mut rules) => security.security_group_rules.append(&mut rules),
                Err(e) => warn!(region, error = %e, "security group rule listing failed"),
            }
        }

        if let Ok(guardduty) = provider.guardduty(profile, region).await {
            let enabled = guardduty.is_enabled(region).await.unwrap_or_else(|e| {
                warn!(region, error = %e, "GuardDuty status lookup failed");
                crate::collectors::conservative::conservative_flag(false)
            });
            security
                .guardduty_by_region
                .insert(region.clone(), crate::inventory::aws::GuardDutyStatus { enabled });
        }

        if let Ok(config) = provider.config(profile, region).await {
            let enabled = config.is_recorder_enabled(region).await.unwrap_or_else(|e| {
                warn!(region, error = %e, "Config recorder status lookup failed");
                crate::collectors::conservative::conservative_flag(false)
            });
            security
                .config_by_region
                .insert(region.clone(), crate::inventory::aws::ConfigRecorderStatus { enabled });
        }
    }

    security
}

/// Collects one region's resource slices, embedding the shared `security`
/// bundle by reference (spec §3).
pub async fn collect_region_data(
    provider: &dyn AwsClientProvider,
    profile: &str,
    region: &str,
    days_back: i64,
    security: Arc<SecurityData>,
) -> RegionData {
    let mut data = RegionData::empty(region, security);

    match provider.ec2(profile, region).await {
        Ok(ec2) => {
            match ec2.list_instances(region, days_back).await {
                Ok(instances) => data.ec2_instances = instances,
                Err(e) => warn!(region, error = %e, "EC2 instance listing failed"),
            }
            match ec2.list_volumes(region).await {
                Ok(volumes) => data.ebs_volumes = volumes,
                Err(e) => warn!(region, error = %e, "EBS volume listing failed"),
            }
            match ec2.list_nat_gateways(region, days_back).await {
                Ok(nats) => data.nat_gateways = nats,
                Err(e) => warn!(region, error = %e, "NAT gateway listing failed"),
            }
        }
        Err(e) => warn!(region, error = %e, "could not build EC2 client"),
    }

    match provider.rds(profile, region).await {
        Ok(rds) => match rds.list_instances(region, days_back).await {
            Ok(instances) => data.rds_instances = instances,
            Err(e) => warn!(region, error = %e, "RDS instance listing failed"),
        },
        Err(e) => warn!(region, error = %e, "could not build RDS client"),
    }

    match provider.elb(profile, region).await {
        Ok(elb) => match elb.list_load_balancers(region, days_back).await {
            Ok(lbs) => data.load_balancers = lbs,
            Err(e) => warn!(region, error = %e, "load balancer listing failed"),
        },
        Err(e) => warn!(region, error = %e, "could not build ELB client"),
    }

    match provider.cost_explorer(profile, region).await {
        Ok(ce) => match ce.savings_plan_coverage(region, days_back).await {
            Ok(coverage) => data.savings_plan_coverage = coverage,
            Err(e) => warn!(region, error = %e, "Savings Plan coverage lookup failed"),
        },
        Err(e) => warn!(region, error = %e, "could not build Cost Explorer client"),
    }

    data
}

/// Fans out `collect_region_data` across every region in `regions`, bounded
/// by `REGION_CONCURRENCY` concurrent in-flight regions (spec §5). A region
/// whose in-flight calls are cancelled via `cancellation` is simply dropped
/// from the result — region-skip, never surfaced (spec §7 type 2).
pub async fn collect_all_regions(
    provider: Arc<dyn AwsClientProvider>,
    profile: String,
    regions: Vec<String>,
    days_back: i64,
    security: Arc<SecurityData>,
    cancellation: CancellationToken,
) -> Vec<RegionData> {
    let semaphore = Arc::new(Semaphore::new(REGION_CONCURRENCY));
    let mut tasks = JoinSet::new();

    for region in regions {
        let provider = provider.clone();
        let profile = profile.clone();
        let security = security.clone();
        let semaphore = semaphore.clone();
        let cancellation = cancellation.clone();
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok()?;
            tokio::select! {
                _ = cancellation.cancelled() => None,
                data = collect_region_data(provider.as_ref(), &profile, &region, days_back, security) => Some(data),
            }
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        if let Ok(Some(data)) = joined {
            results.push(data);
        }
    }
    results
}
