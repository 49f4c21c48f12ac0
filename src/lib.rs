pub use adapter::{FactAdapter, MemoryAdapter};
pub use admin::{PolicyAdmin, expand_documents};
pub use authorizer::Authorizer;
pub use catalog::{ActionCatalog, ActionMapping};
pub use config::{AclConfig, GroupingOnly, LicenseGate};
pub use engine::{PolicyEngine, PolicySnapshot};
pub use entitlement::EntitlementChecker;
pub use error::AclError;
pub use lookup::{ActionCheck, PermissionLookup};
pub use path_match::{PathTemplate, matches as path_matches};
pub use propagate::{BroadcastBroker, Broker, InvalidationEvent, PolicyChangePropagator};
pub use refresh::spawn_refresh;
pub use runtime::AclRuntime;
pub use types::*;

mod adapter;
mod admin;
mod authorizer;
pub mod catalog;
mod config;
mod engine;
mod entitlement;
mod error;
mod lookup;
pub mod metrics;
pub mod path_match;
mod propagate;
mod refresh;
pub mod remote;
mod runtime;
mod timers;
mod types;
