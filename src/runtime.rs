//! Process-wide authorization state with an explicit lifecycle.
//!
//! Build one [`AclRuntime`] at startup, hand its [`Authorizer`] and
//! [`PolicyAdmin`] to whatever serves requests, and call
//! [`AclRuntime::shutdown`] on the way out.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapter::FactAdapter;
use crate::admin::PolicyAdmin;
use crate::authorizer::Authorizer;
use crate::config::AclConfig;
use crate::engine::PolicyEngine;
use crate::error::AclError;
use crate::propagate::{Broker, PolicyChangePropagator};
use crate::refresh::spawn_refresh;
use crate::remote::ManageService;

pub struct AclRuntime {
    engine: PolicyEngine,
    authorizer: Authorizer,
    admin: PolicyAdmin,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl AclRuntime {
    /// Load every fact, then start the invalidation listener and the refresh
    /// task.
    ///
    /// Fails when the configuration is invalid, the initial load fails or the
    /// invalidation topic cannot be subscribed. A process must not serve
    /// traffic without a loaded engine.
    pub async fn start(
        adapter: Arc<dyn FactAdapter>,
        service: Arc<dyn ManageService>,
        broker: Arc<dyn Broker>,
        config: AclConfig,
    ) -> Result<Self, AclError> {
        config.validate()?;
        let engine = PolicyEngine::new(adapter, service, config.clone());
        let version = engine.load_full().await?;

        let propagator = PolicyChangePropagator::new(broker, config.invalidation_topic.clone());
        let cancel = CancellationToken::new();
        let listener = propagator.spawn_listener(engine.clone(), cancel.child_token())?;
        let refresh = spawn_refresh(engine.clone(), config.refresh_interval(), cancel.child_token());

        info!(
            event = "Runtime",
            phase = "Started",
            generation = version.generation,
            groupings = version.groupings,
            permissions = version.permissions,
            topic = %config.invalidation_topic,
            refresh_ms = config.refresh_interval_ms
        );

        Ok(AclRuntime {
            authorizer: Authorizer::new(engine.clone()),
            admin: PolicyAdmin::new(engine.clone(), propagator),
            engine,
            cancel,
            tasks: vec![listener, refresh],
        })
    }

    pub fn authorizer(&self) -> &Authorizer {
        &self.authorizer
    }

    pub fn admin(&self) -> &PolicyAdmin {
        &self.admin
    }

    pub fn engine(&self) -> &PolicyEngine {
        &self.engine
    }

    /// Stop the background tasks and wait for them to finish.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                warn!(event = "Runtime", phase = "Shutdown", error = %e);
            }
        }
        info!(event = "Runtime", phase = "Stopped");
    }
}

impl Drop for AclRuntime {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
