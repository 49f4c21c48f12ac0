use std::sync::Arc;

use super::*;
use crate::adapter::MemoryAdapter;
use crate::remote::{GrantTarget, InMemoryManageService};
use crate::types::{Decision::Allow, Decision::Deny, Principal};
use yare::parameterized;


const TENANT: &str = "t1";

fn web(path: &str) -> String {
    format!("/internal/api/v1/web{path}")
}

#[derive(Clone)]
struct SharedLogBuffer(Arc<std::sync::Mutex<Vec<u8>>>);

struct SharedLogWriter(Arc<std::sync::Mutex<Vec<u8>>>);

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SharedLogBuffer {
    type Writer = SharedLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        SharedLogWriter(Arc::clone(&self.0))
    }
}

impl std::io::Write for SharedLogWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// One engine over fresh in-memory collaborators.
struct Fixture {
    adapter: Arc<MemoryAdapter>,
    service: Arc<InMemoryManageService>,
    engine: PolicyEngine,
}

fn fixture() -> Fixture {
    fixture_with(AclConfig::default())
}

fn fixture_with(config: AclConfig) -> Fixture {
    let adapter = Arc::new(MemoryAdapter::new());
    let service = Arc::new(InMemoryManageService::new());
    let engine = PolicyEngine::new(adapter.clone(), service.clone(), config);
    Fixture {
        adapter,
        service,
        engine,
    }
}

impl Fixture {
    async fn group(&self, user: &str, role: &str, app: &str) {
        self.engine.add_grouping(user, role, app).await.unwrap();
    }

    async fn permit(&self, role: &str, template: &str, method: HttpMethod) {
        self.engine
            .add_permission(role, &web(template), method)
            .await
            .unwrap();
    }

    /// Enable actions on an object; `app: None` grants in the tenant-common
    /// namespace.
    fn grant(
        &self,
        app: Option<&str>,
        role: &str,
        object_type: ObjectType,
        object_id: &str,
        actions: &[(&str, bool)],
    ) {
        self.service
            .grant(
                GrantTarget {
                    database: TENANT,
                    app_id: app,
                    role_id: role,
                    action_type: object_type,
                    object_id,
                },
                actions,
            )
            .unwrap();
    }
}

fn request(
    user: &str,
    roles: &[&str],
    app: &str,
    path: &str,
    method: HttpMethod,
    object_id: &str,
) -> AuthzRequest {
    AuthzRequest::new(
        Principal::new(user, TENANT, roles.iter().map(|r| r.to_string()).collect(), app),
        web(path),
        method,
        object_id,
    )
}

include!("core.rs");
include!("evaluate.rs");
