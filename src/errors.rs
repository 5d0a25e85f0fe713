use thiserror::Error;

use crate::inventory::finding::Domain;

/// Errors returned from the public `run_*_audit` entry points.
///
/// Collection-level and region-level failures never reach this type (they are
/// swallowed by collectors per the conservative-default policy); only the
/// failure classes spec'd as surfacing make it here.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no inventory could be collected for domain {domain:?}")]
    NoInventoryCollected { domain: Domain },

    #[error("credential failure for profile '{profile}': {source}")]
    CredentialFailure {
        profile: String,
        #[source]
        source: CollectionError,
    },

    #[error("audit was cancelled")]
    Cancelled,

    #[error("invalid policy configuration: {0}")]
    PolicyConfig(#[from] PolicyConfigError),

    #[error("duplicate rule id registered: {0}")]
    DuplicateRule(&'static str),
}

/// Internal collection failure taxonomy. Never surfaced to a caller of a
/// `run_*_audit` entry point — collectors catch these and fall back to a
/// conservative default, or omit the affected record. Kept as a concrete type
/// (rather than a string) so collectors can match on it to decide whether a
/// whole profile should abort (credential failures) versus a single call
/// being skipped (everything else).
#[derive(Debug, Error, Clone)]
pub enum CollectionError {
    #[error("aws sdk call failed: {0}")]
    Sdk(String),

    #[error("paginated list call failed mid-page: {0}")]
    Pagination(String),

    #[error("credential chain failure: {0}")]
    Credentials(String),

    #[error("kubernetes api call failed: {0}")]
    Kube(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl CollectionError {
    /// Whether this failure should abort the whole profile rather than be
    /// swallowed as a per-call/per-region skip.
    pub fn is_credential_failure(&self) -> bool {
        matches!(self, CollectionError::Credentials(_))
    }
}

#[derive(Debug, Error)]
pub enum PolicyConfigError {
    #[error("failed to read policy file at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse policy yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unrecognized severity '{0}' in enforcement config")]
    UnknownSeverity(String),

    #[error("unrecognized domain '{0}' in enforcement config")]
    UnknownDomain(String),
}
