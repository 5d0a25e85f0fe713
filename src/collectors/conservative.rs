//! Centralized "default to safe" values for collection failures (spec §4.1,
//! §4.7, §9: "a consistent policy object ... is preferred to scattered
//! conditionals at each call site"). Every collector call site that can fail
//! non-fatally reaches for one of these rather than an ad hoc `.unwrap_or`.

/// A boolean safety flag (e.g. `Public`, `Encrypted`) defaults to the value
/// that never causes a rule to fire a false positive.
pub fn conservative_flag(safe_when: bool) -> bool {
    safe_when
}

/// Bucket/ACL lookup failure: never report a bucket as public on missing
/// data.
pub fn conservative_public() -> bool {
    false
}

/// Root-account summary failure: `DataAvailable=false` suppresses the
/// dependent rules entirely rather than asserting MFA/key state.
pub fn conservative_data_available() -> bool {
    false
}

/// A metric/enrichment call (CPU, RequestCount, bytes processed) failed:
/// treated as "no data", which callers must represent as `None`, never
/// `Some(0.0)` — `0.0` is a legitimate "genuinely idle" reading.
pub fn conservative_metric() -> Option<f64> {
    None
}

/// IAM OIDC provider lookup failure: a failed `list_open_id_connect_providers`
/// call says nothing about whether a provider exists, so it must not be
/// treated the same as a confirmed-absent provider (that would manufacture a
/// HIGH `EKS_OIDC_PROVIDER_NOT_ASSOCIATED` finding from an API error rather
/// than a verified gap). Returns a non-empty placeholder so the rule is
/// suppressed instead of firing on unknown state.
pub fn conservative_oidc_provider_arn() -> String {
    "unknown".to_string()
}
