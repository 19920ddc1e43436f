//! Service provisioning: create or remove init scripts from a template.
//!
//! Creation is family-gated: the base name must belong to a family listed
//! in the family catalog. Range operations iterate an inclusive numeric
//! range and isolate per-item failures; a skip never stops the loop.

pub mod template;

use crate::catalog::{FamilyCatalog, InstalledCatalog};
use cs_common::{Config, Error, Result, ServiceName};
use std::net::TcpListener;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Inter-item settle delay for range operations.
const RANGE_STEP_DELAY: Duration = Duration::from_millis(200);

/// Outcome of one per-service provisioning step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionReport {
    Created {
        name: ServiceName,
        port: Option<u16>,
    },
    SkippedExisting(ServiceName),
    Removed(ServiceName),
    NotFound(ServiceName),
}

/// Parse an inclusive `<start>-<end>` range spec.
pub fn parse_range(spec: &str) -> Result<std::ops::RangeInclusive<u32>> {
    let (start, end) = spec
        .split_once('-')
        .ok_or_else(|| Error::Validation(format!("invalid range '{spec}', expected start-end")))?;
    let start: u32 = start
        .trim()
        .parse()
        .map_err(|_| Error::Validation(format!("invalid range start '{start}'")))?;
    let end: u32 = end
        .trim()
        .parse()
        .map_err(|_| Error::Validation(format!("invalid range end '{end}'")))?;
    if start > end {
        return Err(Error::Validation(format!(
            "range start {start} is after end {end}"
        )));
    }
    Ok(start..=end)
}

/// Creates and removes service scripts and their sbin symlinks.
pub struct Provisioner<'a> {
    config: &'a Config,
    catalog: &'a InstalledCatalog,
    families: &'a FamilyCatalog,
    /// Delay between range items; zeroed in tests.
    step_delay: Duration,
}

impl<'a> Provisioner<'a> {
    pub fn new(
        config: &'a Config,
        catalog: &'a InstalledCatalog,
        families: &'a FamilyCatalog,
    ) -> Self {
        Provisioner {
            config,
            catalog,
            families,
            step_delay: RANGE_STEP_DELAY,
        }
    }

    pub fn without_step_delay(mut self) -> Self {
        self.step_delay = Duration::ZERO;
        self
    }

    /// Create a single named service.
    ///
    /// Refuses duplicates outright: no partial write happens. The base
    /// name must belong to a known family.
    pub fn add_single(&self, name: &ServiceName) -> Result<ProvisionReport> {
        let normalized = name.normalized(&self.config.prefix);
        let family = self
            .families
            .family_of(normalized)?
            .ok_or_else(|| Error::Validation(format!("unknown service family for '{name}'")))?;

        if self.catalog.contains(name)? {
            return Err(Error::Duplicate(name.to_string()));
        }
        self.create_service(&family, name)
    }

    /// Create an inclusive numeric range of services.
    ///
    /// Existing names are skipped and reported; skips do not stop the loop.
    pub fn add_range(&self, name: &ServiceName, spec: &str) -> Result<Vec<ProvisionReport>> {
        let range = parse_range(spec)?;
        let normalized = name.normalized(&self.config.prefix);

        // Every base name must belong to a listed family, brain included.
        let family = self
            .families
            .family_of(normalized)?
            .ok_or_else(|| Error::Validation(format!("unknown service family for '{name}'")))?;

        // The brain family keeps the user-supplied stem verbatim; all
        // other families derive <prefix><family>-<n>.
        let is_brain = family == self.config.brain_family;

        let mut reports = Vec::new();
        for n in range {
            let service_name = if is_brain {
                ServiceName::from_stem(name.as_str(), n)
            } else {
                ServiceName::from_family(&self.config.prefix, &family, n)
            };

            if self.catalog.contains(&service_name)? {
                reports.push(ProvisionReport::SkippedExisting(service_name));
                continue;
            }

            match self.create_service(&family, &service_name) {
                Ok(report) => reports.push(report),
                Err(e) if !e.aborts_invocation() => {
                    debug!(service = %service_name, error = %e, "provisioning item failed");
                    reports.push(ProvisionReport::NotFound(service_name));
                }
                Err(e) => return Err(e),
            }
            std::thread::sleep(self.step_delay);
        }
        Ok(reports)
    }

    /// Remove a single service script and its symlink.
    pub fn remove_single(&self, name: &ServiceName) -> Result<ProvisionReport> {
        if !self.catalog.contains(name)? {
            return Ok(ProvisionReport::NotFound(name.clone()));
        }
        self.delete_service(name)?;
        Ok(ProvisionReport::Removed(name.clone()))
    }

    /// Remove an inclusive numeric range; names not found are reported and
    /// skipped rather than failing the batch.
    pub fn remove_range(&self, name: &ServiceName, spec: &str) -> Result<Vec<ProvisionReport>> {
        let range = parse_range(spec)?;
        let mut reports = Vec::new();
        for n in range {
            let service_name = ServiceName::from_stem(name.as_str(), n);
            if !self.catalog.contains(&service_name)? {
                reports.push(ProvisionReport::NotFound(service_name));
                continue;
            }
            self.delete_service(&service_name)?;
            reports.push(ProvisionReport::Removed(service_name));
            std::thread::sleep(self.step_delay);
        }
        Ok(reports)
    }

    /// Render, write, chmod, and link one service script. Port-requiring
    /// families get an ephemeral port allocated before the render, so the
    /// script is written exactly once with its final content.
    fn create_service(&self, family: &str, name: &ServiceName) -> Result<ProvisionReport> {
        let port = if self.config.needs_port(family) {
            Some(allocate_ephemeral_port()?)
        } else {
            None
        };

        let body = template::render_file(&self.config.template_path, family, port)?;
        let script = self.catalog.script_path(name);
        std::fs::write(&script, body)?;

        // Init-script permissions: owner rwx, group rw, other r.
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o764))?;

        let link = self.link_path(name);
        symlink(&script, &link).map_err(|e| Error::ProcessOp {
            service: name.to_string(),
            reason: format!("symlink {}: {e}", link.display()),
        })?;

        info!(service = %name, port = ?port, "service provisioned");
        Ok(ProvisionReport::Created {
            name: name.clone(),
            port,
        })
    }

    fn delete_service(&self, name: &ServiceName) -> Result<()> {
        let script = self.catalog.script_path(name);
        if script.is_file() {
            std::fs::remove_file(&script)?;
        }
        let link = self.link_path(name);
        if link.is_symlink() {
            std::fs::remove_file(&link)?;
        }
        info!(service = %name, "service removed");
        Ok(())
    }

    fn link_path(&self, name: &ServiceName) -> PathBuf {
        self.config.sbin_dir.join(name.as_str())
    }
}

/// Allocate an ephemeral OS port by binding a throwaway socket to port 0.
///
/// The listener is dropped immediately; the port stays allocated only in
/// the rendered script, which is the accepted race of this design.
fn allocate_ephemeral_port() -> Result<u16> {
    let listener = TcpListener::bind(("0.0.0.0", 0))
        .map_err(|e| Error::ProcessOp {
            service: "port-allocation".into(),
            reason: e.to_string(),
        })?;
    let port = listener
        .local_addr()
        .map_err(|e| Error::ProcessOp {
            service: "port-allocation".into(),
            reason: e.to_string(),
        })?
        .port();
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_is_inclusive() {
        let range: Vec<u32> = parse_range("3-5").unwrap().collect();
        assert_eq!(range, vec![3, 4, 5]);
        let single: Vec<u32> = parse_range("7-7").unwrap().collect();
        assert_eq!(single, vec![7]);
    }

    #[test]
    fn malformed_ranges_are_validation_errors() {
        assert!(matches!(parse_range("35"), Err(Error::Validation(_))));
        assert!(matches!(parse_range("a-b"), Err(Error::Validation(_))));
        assert!(matches!(parse_range("5-3"), Err(Error::Validation(_))));
    }

    #[test]
    fn ephemeral_port_is_nonzero() {
        let port = allocate_ephemeral_port().unwrap();
        assert!(port > 0);
    }
}
