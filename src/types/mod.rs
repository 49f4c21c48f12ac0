//! Data model types shared by the catalog, the engine and the authorizer.
//!
//! Fact shapes mirror the three-column policy lines of the authoritative
//! store: `g, user, role, app` and `p, role, path_template, METHOD`.

mod decision;
mod facts;
mod method;
mod object_type;
mod permission;
mod principal;
mod request;

pub use decision::{AllowReason, Decision, DenyReason, SnapshotScope, SnapshotVersion};
pub use facts::{FactFilter, FactSet, GroupingFact, PermissionFact};
pub use method::HttpMethod;
pub use object_type::ObjectType;
pub use permission::{ActionEntry, PermissionDocument};
pub use principal::Principal;
pub use request::AuthzRequest;
