//! Security domain engine (C5, spec §4.4): drives the AWS collectors,
//! evaluates `rules::security`, merges/sorts, and assembles a security
//! `AuditReport`.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::collectors::clients::AwsClientProvider;
use crate::engine::run_aws_domain_audit;
use crate::errors::EngineError;
use crate::inventory::finding::Domain;
use crate::policy::PolicyConfig;
use crate::report::AuditReport;

const NEEDS_SECURITY: bool = true;

#[allow(clippy::too_many_arguments)]
pub async fn run_security_audit(
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
        Domain::Security,
        "security",
        NEEDS_SECURITY,
        crate::rules::security::register_all,
    )
    .await
}
