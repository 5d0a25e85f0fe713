use chrono::Utc;
use std::collections::BTreeMap;

use crate::inventory::finding::{Domain, Finding, ResourceType};
use crate::inventory::severity::Severity;
use crate::inventory::RuleContext;
use crate::rules::Rule;

fn metadata(pairs: &[(&str, serde_json::Value)]) -> BTreeMap<String, serde_json::Value> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn base_finding(
    ctx: &RuleContext,
    rule_id: &str,
    resource_id: &str,
    resource_type: ResourceType,
    region: &str,
    severity: Severity,
    savings: f64,
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
        domain: Some(Domain::Cost),
        severity,
        estimated_monthly_savings: savings,
        explanation,
        recommendation,
        detected_at: Utc::now(),
        metadata,
    }
}

/// EC2_LOW_CPU: running instance whose average CPU sits strictly between 0
/// and `cpu_threshold` percent, with a non-zero monthly cost. CPU == 0 is
/// "no data" (collector sets `None`, not `Some(0.0)`), not "idle" — a `0.0`
/// reading never fires this rule.
pub struct Ec2LowCpu;

impl Rule for Ec2LowCpu {
    fn id(&self) -> &'static str {
        "EC2_LOW_CPU"
    }
    fn name(&self) -> &'static str {
        "EC2 instance running with persistently low CPU utilization"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let Some(region_data) = &ctx.region_data else {
            return Vec::new();
        };
        let threshold = ctx.param(self.id(), "cpu_threshold", 10.0);
        region_data
            .ec2_instances
            .iter()
            .filter_map(|instance| {
                if instance.state != "running" || instance.monthly_cost <= 0.0 {
                    return None;
                }
                let cpu = instance.avg_cpu_percent?;
                if cpu > 0.0 && cpu < threshold {
                    Some(base_finding(
                        ctx,
                        self.id(),
                        &instance.instance_id,
                        ResourceType::Ec2Instance,
                        &region_data.region,
                        Severity::Medium,
                        0.0,
                        format!(
                            "Instance {} is running at {:.1}% average CPU, below the {:.1}% threshold",
                            instance.instance_id, cpu, threshold
                        ),
                        "Right-size or stop this instance if it is no longer needed".to_string(),
                        metadata(&[
                            ("avg_cpu_percent".into(), cpu.into()),
                            ("cpu_threshold".into(), threshold.into()),
                        ]),
                    ))
                } else {
                    None
                }
            })
            .collect()
    }
}

/// EC2_NO_SAVINGS_PLAN: a running, non-free instance in a region where no
/// Savings Plan coverage entry shows any covered cost at all.
pub struct Ec2NoSavingsPlan;

impl Rule for Ec2NoSavingsPlan {
    fn id(&self) -> &'static str {
        "EC2_NO_SAVINGS_PLAN"
    }
    fn name(&self) -> &'static str {
        "Running EC2 instance with no Savings Plan coverage in its region"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let Some(region_data) = &ctx.region_data else {
            return Vec::new();
        };
        let has_coverage = region_data
            .savings_plan_coverage
            .as_ref()
            .map(|c| c.covered_cost > 0.0)
            .unwrap_or(false);
        if has_coverage {
            return Vec::new();
        }
        region_data
            .ec2_instances
            .iter()
            .filter(|i| i.state == "running" && i.monthly_cost > 0.0)
            .map(|instance| {
                base_finding(
                    ctx,
                    self.id(),
                    &instance.instance_id,
                    ResourceType::Ec2Instance,
                    &region_data.region,
                    Severity::High,
                    0.0,
                    format!("Instance {} runs with no Savings Plan coverage in this region", instance.instance_id),
                    "Consider purchasing a Compute Savings Plan to cover steady-state usage".to_string(),
                    BTreeMap::new(),
                )
            })
            .collect()
    }
}

/// EBS_UNATTACHED: volume not attached to any instance and sitting in
/// `available` state. Savings = size_gb * $0.08/GB-month.
pub struct EbsUnattached;

impl Rule for EbsUnattached {
    fn id(&self) -> &'static str {
        "EBS_UNATTACHED"
    }
    fn name(&self) -> &'static str {
        "Unattached EBS volume"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let Some(region_data) = &ctx.region_data else {
            return Vec::new();
        };
        region_data
            .ebs_volumes
            .iter()
            .filter(|v| !v.attached && v.state == "available")
            .map(|volume| {
                let savings = volume.size_gb * 0.08;
                base_finding(
                    ctx,
                    self.id(),
                    &volume.volume_id,
                    ResourceType::EbsVolume,
                    &region_data.region,
                    Severity::Medium,
                    savings,
                    format!("Volume {} ({} GB) is unattached", volume.volume_id, volume.size_gb),
                    "Delete this volume or attach it if it is still needed".to_string(),
                    metadata(&[
                        ("volume_type".into(), volume.volume_type.clone().into()),
                        ("size_gb".into(), volume.size_gb.into()),
                    ]),
                )
            })
            .collect()
    }
}

/// EBS_GP2_LEGACY: volume still on the legacy gp2 type. Savings = size_gb *
/// $0.02/GB-month (the gp2 -> gp3 delta).
pub struct EbsGp2Legacy;

impl Rule for EbsGp2Legacy {
    fn id(&self) -> &'static str {
        "EBS_GP2_LEGACY"
    }
    fn name(&self) -> &'static str {
        "EBS volume still on legacy gp2 type"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let Some(region_data) = &ctx.region_data else {
            return Vec::new();
        };
        region_data
            .ebs_volumes
            .iter()
            .filter(|v| v.volume_type == "gp2")
            .map(|volume| {
                let savings = volume.size_gb * 0.02;
                base_finding(
                    ctx,
                    self.id(),
                    &volume.volume_id,
                    ResourceType::EbsVolume,
                    &region_data.region,
                    Severity::Low,
                    savings,
                    format!("Volume {} is using gp2, which costs more than gp3 for equivalent performance", volume.volume_id),
                    "Migrate this volume to gp3".to_string(),
                    metadata(&[("size_gb".into(), volume.size_gb.into())]),
                )
            })
            .collect()
    }
}

/// SAVINGS_PLAN_UNDERUTILIZED: coverage below 60% with on-demand spend over
/// $100/month. HIGH below 40% coverage, MEDIUM otherwise. Savings = on-demand
/// cost * 10%.
pub struct SavingsPlanUnderutilized;

impl Rule for SavingsPlanUnderutilized {
    fn id(&self) -> &'static str {
        "SAVINGS_PLAN_UNDERUTILIZED"
    }
    fn name(&self) -> &'static str {
        "Savings Plan coverage below target"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let Some(region_data) = &ctx.region_data else {
            return Vec::new();
        };
        let Some(coverage) = &region_data.savings_plan_coverage else {
            return Vec::new();
        };
        if coverage.coverage_percent < 60.0 && coverage.on_demand_cost > 100.0 {
            let severity = if coverage.coverage_percent < 40.0 {
                Severity::High
            } else {
                Severity::Medium
            };
            vec![base_finding(
                ctx,
                self.id(),
                &format!("savings-plan-{}", region_data.region),
                ResourceType::SavingsPlan,
                &region_data.region,
                severity,
                coverage.on_demand_cost * 0.10,
                format!(
                    "Savings Plan coverage is {:.1}% with ${:.2} of on-demand spend",
                    coverage.coverage_percent, coverage.on_demand_cost
                ),
                "Increase Savings Plan commitment to cover more steady-state usage".to_string(),
                metadata(&[("coverage_percent".into(), coverage.coverage_percent.into())]),
            )]
        } else {
            Vec::new()
        }
    }
}

/// NAT_LOW_TRAFFIC: available NAT gateway processing under the traffic
/// threshold (GB) over the lookback window. Flat $32/month savings.
pub struct NatLowTraffic;

impl Rule for NatLowTraffic {
    fn id(&self) -> &'static str {
        "NAT_LOW_TRAFFIC"
    }
    fn name(&self) -> &'static str {
        "NAT gateway with negligible traffic"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let Some(region_data) = &ctx.region_data else {
            return Vec::new();
        };
        let threshold = ctx.param(self.id(), "traffic_gb_threshold", 1.0);
        region_data
            .nat_gateways
            .iter()
            .filter(|n| n.state == "available" && n.bytes_processed_gb < threshold)
            .map(|nat| {
                base_finding(
                    ctx,
                    self.id(),
                    &nat.nat_gateway_id,
                    ResourceType::NatGateway,
                    &region_data.region,
                    Severity::High,
                    32.0,
                    format!("NAT gateway {} processed only {:.2} GB", nat.nat_gateway_id, nat.bytes_processed_gb),
                    "Delete this NAT gateway if the subnet no longer needs outbound internet access".to_string(),
                    BTreeMap::new(),
                )
            })
            .collect()
    }
}

/// RDS_LOW_CPU: available instance with CPU strictly between 0 and
/// `cpu_threshold`, non-zero cost. HIGH below 5% CPU, MEDIUM otherwise.
/// Savings = monthly cost * 30%.
pub struct RdsLowCpu;

impl Rule for RdsLowCpu {
    fn id(&self) -> &'static str {
        "RDS_LOW_CPU"
    }
    fn name(&self) -> &'static str {
        "RDS instance running with persistently low CPU utilization"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let Some(region_data) = &ctx.region_data else {
            return Vec::new();
        };
        let threshold = ctx.param(self.id(), "cpu_threshold", 10.0);
        region_data
            .rds_instances
            .iter()
            .filter_map(|instance| {
                if instance.status != "available" || instance.monthly_cost <= 0.0 {
                    return None;
                }
                let cpu = instance.avg_cpu_percent?;
                if cpu > 0.0 && cpu < threshold {
                    let severity = if cpu < 5.0 { Severity::High } else { Severity::Medium };
                    Some(base_finding(
                        ctx,
                        self.id(),
                        &instance.db_instance_id,
                        ResourceType::RdsInstance,
                        &region_data.region,
                        severity,
                        instance.monthly_cost * 0.30,
                        format!("RDS instance {} is running at {:.1}% average CPU", instance.db_instance_id, cpu),
                        "Right-size this RDS instance".to_string(),
                        metadata(&[("avg_cpu_percent".into(), cpu.into())]),
                    ))
                } else {
                    None
                }
            })
            .collect()
    }
}

/// ALB_IDLE: active application load balancer with zero total requests over
/// the lookback window. Flat $18/month savings.
pub struct AlbIdle;

impl Rule for AlbIdle {
    fn id(&self) -> &'static str {
        "ALB_IDLE"
    }
    fn name(&self) -> &'static str {
        "Idle application load balancer"
    }
    fn evaluate(&self, ctx: &RuleContext) -> Vec<Finding> {
        let Some(region_data) = &ctx.region_data else {
            return Vec::new();
        };
        region_data
            .load_balancers
            .iter()
            .filter(|lb| lb.lb_type == "application" && lb.state == "active" && lb.request_count == Some(0))
            .map(|lb| {
                base_finding(
                    ctx,
                    self.id(),
                    &lb.load_balancer_id,
                    ResourceType::LoadBalancer,
                    &region_data.region,
                    Severity::High,
                    18.0,
                    format!("Load balancer {} received zero requests in the lookback window", lb.load_balancer_id),
                    "Delete this load balancer if it is no longer routing traffic".to_string(),
                    BTreeMap::new(),
                )
            })
            .collect()
    }
}

pub fn register_all(registry: &mut crate::rules::Registry) -> Result<(), crate::errors::EngineError> {
    registry.register(Box::new(Ec2LowCpu))?;
    registry.register(Box::new(Ec2NoSavingsPlan))?;
    registry.register(Box::new(EbsUnattached))?;
    registry.register(Box::new(EbsGp2Legacy))?;
    registry.register(Box::new(SavingsPlanUnderutilized))?;
    registry.register(Box::new(NatLowTraffic))?;
    registry.register(Box::new(RdsLowCpu))?;
    registry.register(Box::new(AlbIdle))?;
    Ok(())
}
