//! Installed-service and family catalogs.
//!
//! Both catalogs are read-through views over the filesystem: every call
//! re-reads the directory, because installation state can change between
//! calls within one invocation (provisioning then listing).

use cs_common::{Config, Error, Result, ServiceName};
use std::path::{Path, PathBuf};

/// An installed service: a script on disk under the install root.
#[derive(Debug, Clone)]
pub struct InstalledService {
    pub name: ServiceName,
    pub script_path: PathBuf,
}

/// Enumerates service scripts under the install directory, filtered by the
/// managed prefix.
#[derive(Debug, Clone)]
pub struct InstalledCatalog {
    init_dir: PathBuf,
    prefix: String,
}

impl InstalledCatalog {
    pub fn new(config: &Config) -> Self {
        InstalledCatalog {
            init_dir: config.init_dir.clone(),
            prefix: config.prefix.clone(),
        }
    }

    pub fn with_dir(init_dir: impl Into<PathBuf>, prefix: &str) -> Self {
        InstalledCatalog {
            init_dir: init_dir.into(),
            prefix: prefix.to_string(),
        }
    }

    /// Sorted names of all installed managed services.
    pub fn list_installed(&self) -> Result<Vec<ServiceName>> {
        let mut names: Vec<ServiceName> = self
            .scan()?
            .into_iter()
            .map(|service| service.name)
            .collect();
        names.sort();
        Ok(names)
    }

    /// Installed services with their script paths.
    pub fn scan(&self) -> Result<Vec<InstalledService>> {
        let entries = std::fs::read_dir(&self.init_dir).map_err(|e| {
            Error::NotFound(format!("install dir {}: {e}", self.init_dir.display()))
        })?;

        let mut services = Vec::new();
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if !name.starts_with(&self.prefix) {
                continue;
            }
            services.push(InstalledService {
                name: ServiceName::new(name),
                script_path: entry.path(),
            });
        }
        Ok(services)
    }

    /// Whether a service of this exact name is installed.
    pub fn contains(&self, name: &ServiceName) -> Result<bool> {
        Ok(self.list_installed()?.iter().any(|n| n == name))
    }

    /// Path of the init script for a service name.
    pub fn script_path(&self, name: &ServiceName) -> PathBuf {
        self.init_dir.join(name.as_str())
    }
}

/// Catalog of allowed base service families (the cortex directory).
///
/// Provisioning only accepts base names whose family stem appears here.
#[derive(Debug, Clone)]
pub struct FamilyCatalog {
    family_dir: PathBuf,
}

impl FamilyCatalog {
    pub fn new(config: &Config) -> Self {
        FamilyCatalog {
            family_dir: config.family_dir.clone(),
        }
    }

    pub fn with_dir(family_dir: impl Into<PathBuf>) -> Self {
        FamilyCatalog {
            family_dir: family_dir.into(),
        }
    }

    /// Known family stems, one per directory entry.
    pub fn families(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.family_dir).map_err(|e| {
            Error::NotFound(format!("family dir {}: {e}", self.family_dir.display()))
        })?;
        Ok(entries
            .flatten()
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .collect())
    }

    /// The family stem a normalized service name belongs to, if any.
    pub fn family_of(&self, normalized: &str) -> Result<Option<String>> {
        Ok(self
            .families()?
            .into_iter()
            .find(|family| normalized.starts_with(family.as_str())))
    }
}

/// Matching PID files under the run directory: `<name>*.pid`.
pub fn pid_files(pid_dir: &Path, name_prefix: &str) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(pid_dir) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|n| n.starts_with(name_prefix) && n.ends_with(".pid"))
        })
        .map(|entry| entry.path())
        .collect()
}
