#[macro_use]
extern crate tracing;

pub mod collectors;
pub mod correlation;
pub mod engine;
pub mod errors;
pub mod inventory;
pub mod policy;
pub mod report;
pub mod rules;

pub use engine::cost::run_cost_audit;
pub use engine::data_protection::run_data_protection_audit;
pub use engine::kubernetes::run_kubernetes_audit;
pub use engine::security::run_security_audit;
pub use engine::unified::run_unified_aws_audit;
pub use errors::{CollectionError, EngineError, PolicyConfigError};
pub use inventory::finding::{Domain, Finding, ResourceType};
pub use inventory::severity::Severity;
pub use policy::PolicyConfig;
pub use report::{AuditReport, AuditSummary};
