//! Data-protection domain engine (C5, spec §4.4): drives the AWS collectors,
//! evaluates `rules::data_protection`, merges/sorts, and assembles a
//! data-protection `AuditReport`.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::collectors::clients::AwsClientProvider;
use crate::engine::run_aws_domain_audit;
use crate::errors::EngineError;
use crate::inventory::finding::Domain;
use crate::policy::PolicyConfig;
use crate::report::AuditReport;

/// `S3_DEFAULT_ENCRYPTION_MISSING` reads the account-global security bundle
/// (S3 bucket encryption status), so it is collected for this domain too.
const NEEDS_SECURITY: bool = true;

#[allow(clippy::too_many_arguments)]
pub async fn run_data_protection_audit(
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
        Domain::DataProtection,
        "data_protection",
        NEEDS_SECURITY,
        crate::rules::data_protection::register_all,
    )
    .await
}
