//! Reconciler tests against the in-memory registry store.

use cs_common::ServiceName;
use cs_core::host::HostIdentity;
use cs_core::registry::{
    InMemoryStore, Instance, Reconciler, RegisterOutcome, RegistryDocument, ServerEntry,
};

fn local_host() -> HostIdentity {
    HostIdentity {
        ipaddr: "10.0.0.5".into(),
        hostname: "node-a".into(),
    }
}

fn seeded_store() -> InMemoryStore {
    InMemoryStore::new(RegistryDocument {
        servers: vec![ServerEntry {
            hostname: "node-a".into(),
            ipaddr: "10.0.0.5".into(),
            instances: vec![Instance {
                component: "task".into(),
                instance: "cstask-1".into(),
                kind: "MS".into(),
            }],
        }],
    })
}

#[test]
fn add_host_creates_entry_once() {
    let store = InMemoryStore::default();
    let reconciler = Reconciler::new(&store, local_host());

    let outcome = reconciler.register("task", "cstask-1", "MS", true).unwrap();
    assert_eq!(outcome, RegisterOutcome::HostAdded);

    let doc = store.document();
    assert_eq!(doc.servers.len(), 1);
    assert_eq!(doc.servers[0].ipaddr, "10.0.0.5");
    assert_eq!(doc.servers[0].instances[0].instance, "cstask-1");

    // Repeat is a no-op, not a second entry.
    let outcome = reconciler.register("task", "cstask-1", "MS", true).unwrap();
    assert_eq!(outcome, RegisterOutcome::HostAlreadyRegistered);
    assert_eq!(store.document().servers.len(), 1);
}

#[test]
fn missing_host_without_add_host_writes_nothing() {
    let store = InMemoryStore::default();
    let reconciler = Reconciler::new(&store, local_host());

    let outcome = reconciler
        .register("task", "cstask-1", "MS", false)
        .unwrap();
    assert_eq!(outcome, RegisterOutcome::HostNotRegistered);
    assert!(store.document().servers.is_empty());
}

#[test]
fn instance_registration_is_add_if_absent() {
    let store = seeded_store();
    let reconciler = Reconciler::new(&store, local_host());

    let outcome = reconciler
        .register("task", "cstask-2", "MS", false)
        .unwrap();
    assert_eq!(outcome, RegisterOutcome::InstanceAdded);
    assert_eq!(store.document().servers[0].instances.len(), 2);

    let outcome = reconciler
        .register("task", "cstask-2", "MS", false)
        .unwrap();
    assert_eq!(outcome, RegisterOutcome::DuplicateInstance);
    assert_eq!(store.document().servers[0].instances.len(), 2);
}

#[test]
fn reconcile_view_splits_registered_from_unregistered() {
    let store = seeded_store();
    let reconciler = Reconciler::new(&store, local_host());

    let installed = vec![ServiceName::new("cstask-1"), ServiceName::new("cstask-2")];
    let rows = reconciler.reconcile_view(&installed).unwrap();

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].instance, "cstask-1");
    assert!(rows[0].registered);
    assert_eq!(rows[1].instance, "cstask-2");
    assert!(!rows[1].registered);
    assert_eq!(rows[1].ipaddr, "10.0.0.5");

    // The view never mutates the store.
    assert_eq!(store.document().servers[0].instances.len(), 1);
}

#[test]
fn reconcile_view_ignores_entries_of_other_hosts() {
    let store = InMemoryStore::new(RegistryDocument {
        servers: vec![ServerEntry {
            hostname: "node-b".into(),
            ipaddr: "10.0.0.9".into(),
            instances: vec![Instance {
                component: "task".into(),
                instance: "cstask-1".into(),
                kind: "MS".into(),
            }],
        }],
    });
    let reconciler = Reconciler::new(&store, local_host());

    let rows = reconciler.reconcile_view(&[]).unwrap();
    assert!(rows.is_empty());
}
