//! The single entry point for the routing layer: one request in, one
//! decision out.
//!
//! Errors never escape. Every failure becomes a [`Decision::Deny`] whose
//! reason only shows up in logs and metrics; callers are expected to map all
//! denials to the same response.

use std::borrow::Cow;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::catalog::ActionMapping;
use crate::engine::PolicyEngine;
use crate::metrics::{self, AuthorizationEvent};
use crate::timers::{PhaseDurations, PhaseTimer};
use crate::types::{AllowReason, AuthzRequest, Decision, DenyReason, FactFilter, ObjectType};

#[derive(Clone)]
pub struct Authorizer {
    engine: PolicyEngine,
}

impl Authorizer {
    pub fn new(engine: PolicyEngine) -> Self {
        Authorizer { engine }
    }

    pub fn engine(&self) -> &PolicyEngine {
        &self.engine
    }

    pub async fn authorize(&self, request: &AuthzRequest) -> Decision {
        self.authorize_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Authorize, giving up with `Deny(Cancelled)` as soon as `cancel` fires.
    /// Remote calls in flight are dropped with the abandoned future.
    pub async fn authorize_with_cancel(
        &self,
        request: &AuthzRequest,
        cancel: &CancellationToken,
    ) -> Decision {
        let start = Instant::now();
        let mut durations = PhaseDurations::default();

        let (decision, loaded) = tokio::select! {
            biased;
            _ = cancel.cancelled() => (Decision::Deny(DenyReason::Cancelled), false),
            outcome = self.decide(request, &mut durations) => outcome,
        };

        let principal = &request.principal;
        debug!(
            event = "Authorize",
            phase = "Decision",
            user = %principal.user_id,
            tenant = %principal.tenant_id,
            app = %principal.current_app_id,
            path = %request.path,
            method = %request.method,
            object = %request.object_id,
            decision = %decision
        );

        let total = start.elapsed();
        let phases = loaded.then(|| durations.into_phases(total));
        metrics::record_authorization(
            &AuthorizationEvent {
                decision,
                duration: total,
                user_id: &principal.user_id,
                tenant_id: &principal.tenant_id,
                path: &request.path,
                method: request.method.as_ref(),
            },
            phases.as_ref(),
        );
        decision
    }

    /// Returns the decision and whether a filtered snapshot was loaded.
    async fn decide(&self, request: &AuthzRequest, durations: &mut PhaseDurations) -> (Decision, bool) {
        let config = self.engine.config();
        let principal = &request.principal;

        if config.is_system_tenant(&principal.tenant_id) {
            return (Decision::Allow(AllowReason::SystemTenant), false);
        }

        if let Err(e) = principal.validate() {
            warn!(event = "Authorize", phase = "InvalidPrincipal", principal = %principal, error = %e);
            return (Decision::Deny(DenyReason::Unauthorized), false);
        }

        let Some(entry) = self.engine.catalog().resolve_request(&request.path, request.method) else {
            return (Decision::Allow(AllowReason::Unprotected), false);
        };

        // Only catalogued routes need a role to evaluate against.
        let role_id = match principal.primary_role() {
            Ok(role) => role,
            Err(e) => {
                warn!(event = "Authorize", phase = "InvalidPrincipal", principal = %principal, error = %e);
                return (Decision::Deny(DenyReason::Unauthorized), false);
            }
        };

        let request = with_object_id(request, entry);

        if entry.object_type == ObjectType::Folder && config.is_public_folder(&request.object_id) {
            return (Decision::Allow(AllowReason::PublicFolder), false);
        }

        let filter = FactFilter {
            user_id: principal.user_id.clone(),
            app_id: principal.current_app_id.clone(),
            role_id: role_id.to_string(),
            path: entry.path().to_string(),
            method: entry.method,
        };

        let loaded = {
            let _timer = PhaseTimer::new(&mut durations.filtered_load);
            self.engine.load_filtered(&filter).await
        };
        let snapshot = match loaded {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(
                    event = "Authorize",
                    phase = "FilteredLoad",
                    user = %principal.user_id,
                    path = %request.path,
                    error = %e
                );
                return (Decision::Deny(DenyReason::LookupFailed), true);
            }
        };

        let _timer = PhaseTimer::new(&mut durations.evaluate);
        let decision = self.engine.enforce_with(&snapshot, &request).await;

        // The filtered snapshot only carries the first role's permissions.
        // Other roles are checked against the full snapshot.
        if decision == Decision::Deny(DenyReason::NoMatchingPolicy) && principal.role_ids.len() > 1 {
            debug!(event = "Authorize", phase = "FullFallback", user = %principal.user_id);
            return (self.engine.enforce(&request).await, true);
        }
        (decision, true)
    }
}

/// Fill in the object id from the path when the caller left it empty.
fn with_object_id<'a>(request: &'a AuthzRequest, entry: &ActionMapping) -> Cow<'a, AuthzRequest> {
    if !request.object_id.is_empty() {
        return Cow::Borrowed(request);
    }
    let object_id = entry
        .object_type
        .id_param()
        .and_then(|param| entry.template.captures(&request.path)?.remove(param));
    match object_id {
        Some(object_id) => {
            let mut owned = request.clone();
            owned.object_id = object_id;
            Cow::Owned(owned)
        }
        None => Cow::Borrowed(request),
    }
}
