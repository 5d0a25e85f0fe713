//! Cost domain engine (C5, spec §4.4): drives the AWS collectors, evaluates
//! `rules::cost`, merges/sorts, and assembles a cost `AuditReport`.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::collectors::clients::AwsClientProvider;
use crate::engine::run_aws_domain_audit;
use crate::errors::EngineError;
use crate::inventory::finding::Domain;
use crate::policy::PolicyConfig;
use crate::report::AuditReport;

/// Cost rules never read `RegionData.security`, so the account-global
/// security bundle is not collected for this audit.
const NEEDS_SECURITY: bool = false;

#[allow(clippy::too_many_arguments)]
pub async fn run_cost_audit(
    provider: Arc<dyn AwsClientProvider>,
    profile: &str,
    account_id: &str,
    regions: &[String],
    days_back: i64,
    policy: Option<Arc<PolicyConfig>>,
    cancellation: CancellationToken,
) -> Result<(AuditReport, bool), EngineError> {
    run_aws_domain_audit(
        provider,
        profile,
        account_id,
        regions,
        days_back,
        policy,
        cancellation,
        Domain::Cost,
        "cost",
        NEEDS_SECURITY,
        crate::rules::cost::register_all,
    )
    .await
}
