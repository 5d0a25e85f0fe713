//! Read-only inventory collection for both cloud domains (spec §4.1). Every
//! collector degrades on failure — a missing permission or a down API never
//! aborts the audit, it falls back to a conservative default or simply
//! omits the affected record (see [`conservative`]).

pub mod aws;
pub mod clients;
pub mod conservative;
pub mod kubernetes;
