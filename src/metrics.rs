//! Vendor-agnostic metrics collection via a pluggable sink.
//!
//! The library never talks to a metrics backend itself. Implement
//! [`MetricsSink`] and install it once with [`set_sink`]; until then every
//! event goes to a no-op sink.
//!
//! ```ignore
//! use acl_core::metrics::{AuthorizationStats, MetricsSink, ReloadStats};
//! use std::sync::atomic::{AtomicU64, Ordering};
//! use std::sync::Arc;
//!
//! struct DenyCounter(AtomicU64);
//!
//! impl MetricsSink for DenyCounter {
//!     fn on_authorization(&self, stats: &AuthorizationStats) {
//!         if !stats.allowed {
//!             self.0.fetch_add(1, Ordering::Relaxed);
//!         }
//!     }
//!
//!     fn on_reload(&self, _stats: &ReloadStats) {}
//! }
//!
//! acl_core::metrics::set_sink(Arc::new(DenyCounter(AtomicU64::new(0))));
//! ```

use serde::Serialize;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, SystemTime};
use tracing::warn;

use crate::types::{Decision, SnapshotScope, SnapshotVersion};

/// One finished authorization, passed to [`MetricsSink::on_authorization`].
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationStats {
    /// Wall-clock time from entry to decision, remote calls included.
    pub duration: Duration,
    pub allowed: bool,
    pub user_id: String,
    pub tenant_id: String,
    pub path: String,
    pub method: String,
    /// The allow or deny reason, e.g. `fine_grained` or `lookup_failed`.
    pub reason: &'static str,
}

/// Where the time of one authorization went, in milliseconds.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AuthorizationPhases {
    /// Fetching the principal's filtered snapshot.
    pub filtered_load_ms: f64,
    /// Running the compound predicate, permission lookups included.
    pub evaluate_ms: f64,
    pub total_ms: f64,
}

impl AuthorizationPhases {
    /// Time not accounted for in measured phases.
    pub fn overhead_ms(&self) -> f64 {
        self.total_ms - (self.filtered_load_ms + self.evaluate_ms)
    }
}

/// A new full snapshot went live.
#[derive(Debug, Clone, Serialize)]
pub struct ReloadStats {
    pub generation: u64,
    pub scope: SnapshotScope,
    pub groupings: usize,
    pub permissions: usize,
    pub reload_time: SystemTime,
}

/// Consumer of authorization and reload events.
///
/// Called synchronously on the request path, so implementations must be
/// cheap and must not block.
pub trait MetricsSink: Send + Sync {
    fn on_authorization(&self, stats: &AuthorizationStats);

    fn on_reload(&self, stats: &ReloadStats);

    /// Per-phase timings for requests that went through a filtered load.
    fn on_authorization_phases(&self, _stats: &AuthorizationStats, _phases: &AuthorizationPhases) {}
}

struct NoOpSink;

impl MetricsSink for NoOpSink {
    fn on_authorization(&self, _stats: &AuthorizationStats) {}
    fn on_reload(&self, _stats: &ReloadStats) {}
}

static SINK: OnceLock<Arc<dyn MetricsSink>> = OnceLock::new();

fn sink() -> Arc<dyn MetricsSink> {
    SINK.get_or_init(|| Arc::new(NoOpSink)).clone()
}

/// Set the global metrics sink.
///
/// The sink can be set once. Install it at startup, before the first
/// authorization; later calls are ignored with a warning.
pub fn set_sink(sink: Arc<dyn MetricsSink>) {
    if SINK.set(sink).is_err() {
        warn!(
            event = "Metrics",
            phase = "SetSink",
            "Metrics sink was already initialized. Ignoring subsequent set_sink call."
        );
    }
}

pub(crate) struct AuthorizationEvent<'a> {
    pub decision: Decision,
    pub duration: Duration,
    pub user_id: &'a str,
    pub tenant_id: &'a str,
    pub path: &'a str,
    pub method: &'a str,
}

impl AuthorizationEvent<'_> {
    fn stats(&self) -> AuthorizationStats {
        AuthorizationStats {
            duration: self.duration,
            allowed: self.decision.is_allowed(),
            user_id: self.user_id.to_string(),
            tenant_id: self.tenant_id.to_string(),
            path: self.path.to_string(),
            method: self.method.to_string(),
            reason: self.decision.reason(),
        }
    }
}

pub(crate) fn record_authorization(event: &AuthorizationEvent<'_>, phases: Option<&AuthorizationPhases>) {
    let sink = sink();
    let stats = event.stats();
    sink.on_authorization(&stats);
    if let Some(phases) = phases {
        sink.on_authorization_phases(&stats, phases);
    }
}

pub(crate) fn record_reload(version: &SnapshotVersion) {
    sink().on_reload(&ReloadStats {
        generation: version.generation,
        scope: version.scope,
        groupings: version.groupings,
        permissions: version.permissions,
        reload_time: version.loaded_at,
    });
}
