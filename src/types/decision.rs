//! Authorization decision types.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display as StrumDisplay, IntoStaticStr};
use utoipa::ToSchema;

/// Why a request was allowed.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash, StrumDisplay, AsRefStr, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AllowReason {
    /// The path carries no fine-grained action semantics.
    Unprotected,
    /// The tenant is exempt from authorization.
    SystemTenant,
    /// Shared folders everybody in the tenant may use.
    PublicFolder,
    /// A license-gated domain the tenant's subscription includes.
    Entitled,
    /// The permission lookup granted the action on the object.
    FineGrained,
    /// Granted by a grouping fact alone (only when configured).
    GroupingOnly,
}

/// Why a request was denied. Callers map every variant to the same
/// client-facing response; the reason exists for logs and metrics.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash, StrumDisplay, AsRefStr, IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DenyReason {
    Unauthorized,
    NoMatchingPolicy,
    NotEntitled,
    NoAction,
    LookupDenied,
    LookupFailed,
    Cancelled,
}

/// Allow or deny, with the reason attached.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(tag = "decision", content = "reason", rename_all = "snake_case")]
pub enum Decision {
    Allow(AllowReason),
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow(_))
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Decision::Allow(r) => r.into(),
            Decision::Deny(r) => r.into(),
        }
    }
}

impl Display for Decision {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Decision::Allow(r) => write!(f, "Allow({r})"),
            Decision::Deny(r) => write!(f, "Deny({r})"),
        }
    }
}

/// Whether a snapshot holds every fact or only one principal's slice.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotScope {
    Full,
    Filtered,
}

/// Version metadata of a policy snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct SnapshotVersion {
    /// Monotonic per-engine counter, bumped on every swap of the full snapshot.
    pub generation: u64,
    pub scope: SnapshotScope,
    pub groupings: usize,
    pub permissions: usize,
    #[schema(value_type = String)]
    pub loaded_at: SystemTime,
}

impl Display for SnapshotVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "gen={} ({:?}; g={}, p={})",
            self.generation, self.scope, self.groupings, self.permissions
        )
    }
}
