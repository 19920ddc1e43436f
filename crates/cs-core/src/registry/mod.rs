//! Cross-host registry reconciliation.
//!
//! The reconciler compares host-local reality (installed services, local
//! identity) against the persisted registry document and applies add-host
//! and add-instance operations. Nothing is ever deleted; removal is out of
//! scope for this engine.

pub mod store;
pub mod types;

pub use store::{InMemoryStore, JsonFileStore, RegistryStore};
pub use types::{Instance, RegistryDocument, ServerEntry};

use crate::host::HostIdentity;
use cs_common::{Result, ServiceName};
use serde::Serialize;
use tracing::info;

/// Outcome of a registration attempt. Every variant is reported as a
/// status line; the idempotent ones perform no store write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// New server entry created carrying the instance.
    HostAdded,
    /// No entry for this host and `add_host` was false: no write.
    HostNotRegistered,
    /// `add_host` requested but the host entry already exists: no-op.
    HostAlreadyRegistered,
    /// The instance is already listed under this host: no-op.
    DuplicateInstance,
    /// Instance appended to the existing host entry.
    InstanceAdded,
}

/// One row of the reconciliation view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryRow {
    pub instance: String,
    pub hostname: String,
    pub ipaddr: String,
    pub registered: bool,
}

/// Applies registry writes and computes the read-only reconciliation view.
pub struct Reconciler<'a> {
    store: &'a dyn RegistryStore,
    host: HostIdentity,
}

impl<'a> Reconciler<'a> {
    pub fn new(store: &'a dyn RegistryStore, host: HostIdentity) -> Self {
        Reconciler { store, host }
    }

    /// Register an instance for this host.
    ///
    /// Matching is by ipaddr. With `add_host` the host entry is created on
    /// first registration; without it, a missing host entry is reported
    /// and nothing is written. Both paths are idempotent on repeat calls.
    pub fn register(
        &self,
        component: &str,
        instance_name: &str,
        kind: &str,
        add_host: bool,
    ) -> Result<RegisterOutcome> {
        let doc = self.store.fetch()?;
        let instance = Instance {
            component: component.to_string(),
            instance: instance_name.to_string(),
            kind: kind.to_string(),
        };

        match doc.find_server(&self.host.ipaddr) {
            None => {
                if !add_host {
                    return Ok(RegisterOutcome::HostNotRegistered);
                }
                self.store.push_server(ServerEntry {
                    hostname: self.host.hostname.clone(),
                    ipaddr: self.host.ipaddr.clone(),
                    instances: vec![instance],
                })?;
                info!(host = %self.host.ipaddr, instance = instance_name, "host registered");
                Ok(RegisterOutcome::HostAdded)
            }
            Some(entry) => {
                if add_host {
                    return Ok(RegisterOutcome::HostAlreadyRegistered);
                }
                if entry.has_instance(instance_name) {
                    return Ok(RegisterOutcome::DuplicateInstance);
                }
                if self.store.add_instance(&self.host.ipaddr, instance)? {
                    info!(host = %self.host.ipaddr, instance = instance_name, "instance registered");
                    Ok(RegisterOutcome::InstanceAdded)
                } else {
                    // Another writer beat us between fetch and update; the
                    // store-level add-if-absent kept the entry unique.
                    Ok(RegisterOutcome::DuplicateInstance)
                }
            }
        }
    }

    /// Read-only cross-reference of installed services against this
    /// host's server entry. Triggers no writes.
    pub fn reconcile_view(&self, installed: &[ServiceName]) -> Result<Vec<RegistryRow>> {
        let doc = self.store.fetch()?;

        let mut rows = Vec::new();
        let mut registered = Vec::new();

        for server in &doc.servers {
            let is_local = server.ipaddr == self.host.ipaddr
                || server.hostname == self.host.hostname;
            if !is_local {
                continue;
            }
            for instance in &server.instances {
                registered.push(instance.instance.clone());
                rows.push(RegistryRow {
                    instance: instance.instance.clone(),
                    hostname: server.hostname.clone(),
                    ipaddr: server.ipaddr.clone(),
                    registered: true,
                });
            }
        }

        for name in installed {
            if !registered.iter().any(|r| r == name.as_str()) {
                rows.push(RegistryRow {
                    instance: name.to_string(),
                    hostname: self.host.hostname.clone(),
                    ipaddr: self.host.ipaddr.clone(),
                    registered: false,
                });
            }
        }
        Ok(rows)
    }
}
