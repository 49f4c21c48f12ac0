//! Example: count decisions per reason with a metrics sink.
//!
//! Starts a runtime on in-memory collaborators, grants one role read access
//! to one datastore, runs a handful of requests and prints what the sink saw.
//!
//! Run with: cargo run --example counter_sink

use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};

use acl_core::metrics::{AuthorizationStats, MetricsSink, ReloadStats};
use acl_core::remote::{GrantTarget, InMemoryManageService};
use acl_core::{
    AclConfig, AclRuntime, ActionEntry, AuthzRequest, BroadcastBroker, HttpMethod, MemoryAdapter,
    ObjectType, PermissionDocument, Principal,
};

/// Counts decisions by reason and remembers the latest reload generation.
#[derive(Default)]
struct ReasonCounterSink {
    reasons: Mutex<BTreeMap<&'static str, u64>>,
    last_generation: Mutex<u64>,
}

impl MetricsSink for ReasonCounterSink {
    fn on_authorization(&self, stats: &AuthorizationStats) {
        if let Ok(mut reasons) = self.reasons.lock() {
            *reasons.entry(stats.reason).or_insert(0) += 1;
        }
    }

    fn on_reload(&self, stats: &ReloadStats) {
        if let Ok(mut generation) = self.last_generation.lock() {
            *generation = stats.generation;
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("acl_core=info")
        .init();

    let sink = Arc::new(ReasonCounterSink::default());
    acl_core::metrics::set_sink(sink.clone());

    let service = Arc::new(InMemoryManageService::new());
    service.grant(
        GrantTarget {
            database: "acme",
            app_id: Some("crm"),
            role_id: "analyst",
            action_type: ObjectType::Datastore,
            object_id: "customers",
        },
        &[("read", true)],
    )?;

    let runtime = AclRuntime::start(
        Arc::new(MemoryAdapter::new()),
        service,
        Arc::new(BroadcastBroker::default()),
        AclConfig::default(),
    )
    .await?;

    runtime
        .admin()
        .set_role_permissions(
            "analyst",
            &[PermissionDocument::new(
                "analyst",
                ObjectType::Datastore,
                "customers",
                vec![ActionEntry::enabled(["read"])],
            )],
        )
        .await?;
    runtime
        .admin()
        .set_user_roles("alice", &["analyst".to_string()], &["crm".to_string()])
        .await?;

    let alice = Principal::new("alice", "acme", vec!["analyst".to_string()], "crm");
    let requests = [
        ("/internal/api/v1/web/item/datastores/customers/items/search", HttpMethod::Post),
        ("/internal/api/v1/web/item/datastores/customers/items/c1", HttpMethod::Get),
        ("/internal/api/v1/web/item/datastores/customers/items/c1", HttpMethod::Delete),
        ("/internal/api/v1/web/item/datastores/invoices/items/search", HttpMethod::Post),
        ("/internal/api/v1/web/file/folders/public/files", HttpMethod::Get),
        ("/internal/api/v1/web/dashboard/dashboards", HttpMethod::Get),
    ];

    for (path, method) in requests {
        let req = AuthzRequest::from_path(alice.clone(), path, method);
        let decision = runtime.authorizer().authorize(&req).await;
        println!("{method:<6} {path:<62} {decision}");
    }

    println!("\nDecisions by reason:");
    if let Ok(reasons) = sink.reasons.lock() {
        for (reason, count) in reasons.iter() {
            println!("  {reason:<20} {count}");
        }
    }
    if let Ok(generation) = sink.last_generation.lock() {
        println!("Snapshot generation: {generation}");
    }

    runtime.shutdown().await;
    Ok(())
}
