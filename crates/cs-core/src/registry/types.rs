//! Registry document schema.
//!
//! The persisted aggregate is a single document:
//! `{ servers: [ { hostname, ipaddr, instances: [ { component, instance, type } ] } ] }`.
//! Within one server entry, instance names are unique; across entries the
//! ipaddr is the natural key. Neither servers nor instances are ever
//! deleted by this engine.

use serde::{Deserialize, Serialize};

/// One named, typed unit of a component registered for a host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub component: String,
    pub instance: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// The registry's per-host record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntry {
    pub hostname: String,
    pub ipaddr: String,
    pub instances: Vec<Instance>,
}

impl ServerEntry {
    pub fn has_instance(&self, instance_name: &str) -> bool {
        self.instances.iter().any(|i| i.instance == instance_name)
    }

    /// Set-style append: no-op when an instance of the same name exists.
    /// Returns whether the instance was added.
    pub fn add_instance_if_absent(&mut self, instance: Instance) -> bool {
        if self.has_instance(&instance.instance) {
            return false;
        }
        self.instances.push(instance);
        true
    }
}

/// The single persisted registry aggregate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryDocument {
    pub servers: Vec<ServerEntry>,
}

impl RegistryDocument {
    /// Host matching is by ipaddr, not hostname. Two hosts sharing an
    /// address collide; accepted simplification, not silently fixed.
    pub fn find_server(&self, ipaddr: &str) -> Option<&ServerEntry> {
        self.servers.iter().find(|s| s.ipaddr == ipaddr)
    }

    pub fn find_server_mut(&mut self, ipaddr: &str) -> Option<&mut ServerEntry> {
        self.servers.iter_mut().find(|s| s.ipaddr == ipaddr)
    }
}
