//! Kubernetes cluster collection (spec §4.1/§4.4): gather node/namespace/pod/
//! service/service-account inventory for one kubeconfig context, detect
//! whether the cluster is EKS-backed, and when it is, enrich with the
//! control-plane data an `EksClient` can provide.

pub mod production;

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::collectors::clients::EksClient;
use crate::errors::CollectionError;
use crate::inventory::kubernetes::KubernetesClusterData;

#[async_trait::async_trait]
pub trait KubeClient: Send + Sync {
    /// Collects cluster inventory for the given kubeconfig context (`None`
    /// uses the current context), without EKS enrichment.
    async fn collect(&self, context: Option<&str>) -> Result<KubernetesClusterData, CollectionError>;
}

/// `aws:///us-west-2b/i-0123456789abcdef0` style EC2 provider IDs, as set by
/// the in-tree AWS cloud provider and the out-of-tree `aws-cloud-controller-manager`.
static PROVIDER_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^aws:///([a-z]{2}-[a-z]+-\d)[a-z]/").unwrap());

fn is_eks_node(provider_id: &str) -> bool {
    provider_id.starts_with("aws://")
}

fn region_from_provider_id(provider_id: &str) -> Option<String> {
    PROVIDER_ID_RE.captures(provider_id).map(|c| c[1].to_string())
}

/// Collects cluster inventory and, when the cluster looks EKS-backed (node
/// `ProviderID` has the `aws://` prefix), enriches it with `EksClient::describe_cluster`.
/// The EKS lookup is best-effort: a failure or a non-EKS cluster leaves
/// `eks` as `None` rather than failing the whole collection (spec §4.1).
pub async fn collect(
    kube: &dyn KubeClient,
    eks_provider: Option<&dyn EksClient>,
    context: Option<&str>,
    cluster_name: Option<&str>,
) -> Result<KubernetesClusterData, CollectionError> {
    let mut data = kube.collect(context).await?;

    let Some(eks_provider) = eks_provider else {
        return Ok(data);
    };
    let Some(cluster_name) = cluster_name else {
        return Ok(data);
    };

    let Some(first_node) = data.nodes.first() else {
        return Ok(data);
    };
    if !is_eks_node(&first_node.provider_id) {
        return Ok(data);
    }
    let Some(region) = region_from_provider_id(&first_node.provider_id) else {
        warn!(provider_id = %first_node.provider_id, "could not parse region from node ProviderID, skipping EKS enrichment");
        return Ok(data);
    };

    match eks_provider.describe_cluster(&region, cluster_name).await {
        Ok(eks) => data.eks = eks,
        Err(e) => warn!(cluster_name, region, error = %e, "EKS enrichment failed, continuing without it"),
    }

    Ok(data)
}

/// Convenience wrapper building the `EksClient` through an `AwsClientProvider`
/// for the profile the cluster's AWS account is known under.
pub async fn collect_with_provider(
    kube: &dyn KubeClient,
    aws_provider: Arc<dyn crate::collectors::clients::AwsClientProvider>,
    profile: &str,
    context: Option<&str>,
    cluster_name: Option<&str>,
) -> Result<KubernetesClusterData, CollectionError> {
    let mut data = kube.collect(context).await?;

    let Some(cluster_name) = cluster_name else {
        return Ok(data);
    };
    let Some(first_node) = data.nodes.first() else {
        return Ok(data);
    };
    if !is_eks_node(&first_node.provider_id) {
        return Ok(data);
    }
    let Some(region) = region_from_provider_id(&first_node.provider_id) else {
        warn!(provider_id = %first_node.provider_id, "could not parse region from node ProviderID, skipping EKS enrichment");
        return Ok(data);
    };

    match aws_provider.eks(profile, &region).await {
        Ok(eks_client) => match eks_client.describe_cluster(&region, cluster_name).await {
            Ok(eks) => data.eks = eks,
            Err(e) => warn!(cluster_name, region, error = %e, "EKS enrichment failed, continuing without it"),
        },
        Err(e) => warn!(region, error = %e, "could not build EKS client"),
    }

    Ok(data)
}
