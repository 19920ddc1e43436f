//! Configuration loading and validation for csctl.
//!
//! Resolution is deterministic: an explicit CLI path wins over the
//! `CSCTL_CONFIG` environment variable, which wins over the XDG config
//! directory, which falls back to built-in defaults. The file format is
//! TOML; every field is optional and defaults to the values the managed
//! hosts were provisioned with.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_init_dir() -> PathBuf {
    PathBuf::from("/etc/init.d")
}

fn default_sbin_dir() -> PathBuf {
    PathBuf::from("/usr/sbin")
}

fn default_pid_dir() -> PathBuf {
    PathBuf::from("/var/run/cs")
}

fn default_family_dir() -> PathBuf {
    PathBuf::from("/usr/local/bin/cs_legacy/cortex")
}

fn default_template_path() -> PathBuf {
    PathBuf::from("scripts/csinit")
}

fn default_prefix() -> String {
    "cs".to_string()
}

fn default_runtime_marker() -> String {
    "python3".to_string()
}

fn default_port_families() -> Vec<String> {
    vec!["brain".to_string(), "render".to_string()]
}

fn default_brain_family() -> String {
    "brain".to_string()
}

fn default_http_port() -> u16 {
    6480
}

/// Registry store location and connect behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Path of the single registry document.
    pub path: PathBuf,

    /// Bounded wait for the store lock, in milliseconds. The only explicit
    /// timeout in the engine; process operations are fire-and-forget.
    pub lock_timeout_ms: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            path: PathBuf::from("/var/lib/cs/registry.json"),
            lock_timeout_ms: 3_000,
        }
    }
}

/// The complete loaded configuration for csctl.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding installed init scripts.
    pub init_dir: PathBuf,

    /// Directory receiving the service-manager symlinks.
    pub sbin_dir: PathBuf,

    /// Directory where spawned services write `<name>.pid`.
    pub pid_dir: PathBuf,

    /// Catalog of allowed base service families (one directory per family).
    pub family_dir: PathBuf,

    /// Init-script template rendered at provisioning time.
    pub template_path: PathBuf,

    /// Managed-service name prefix.
    pub prefix: String,

    /// First cmdline token of managed processes must start with this.
    pub runtime_marker: String,

    /// Families whose instances need a dynamically assigned port.
    pub port_families: Vec<String>,

    /// Family whose ranged names keep the user-supplied stem verbatim.
    pub brain_family: String,

    /// Default HTTP port advertised when no dynamic port is assigned.
    pub http_default_port: u16,

    /// Registry store settings.
    pub registry: RegistryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            init_dir: default_init_dir(),
            sbin_dir: default_sbin_dir(),
            pid_dir: default_pid_dir(),
            family_dir: default_family_dir(),
            template_path: default_template_path(),
            prefix: default_prefix(),
            runtime_marker: default_runtime_marker(),
            port_families: default_port_families(),
            brain_family: default_brain_family(),
            http_default_port: default_http_port(),
            registry: RegistryConfig::default(),
        }
    }
}

impl Config {
    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&text)
            .map_err(|e| Error::Validation(format!("invalid config {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Semantic validation beyond what serde enforces.
    pub fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() {
            return Err(Error::Validation("service prefix must not be empty".into()));
        }
        if self.runtime_marker.is_empty() {
            return Err(Error::Validation(
                "runtime marker must not be empty".into(),
            ));
        }
        if self.registry.lock_timeout_ms == 0 {
            return Err(Error::Validation(
                "registry lock timeout must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Whether a family stem requires a dynamically assigned port.
    pub fn needs_port(&self, family: &str) -> bool {
        self.port_families.iter().any(|f| family.starts_with(f.as_str()))
    }
}

/// How the active config was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigResolution {
    /// From explicit CLI flag
    CliFlag,
    /// From the CSCTL_CONFIG environment variable
    EnvVar,
    /// From the XDG config directory
    XdgConfig,
    /// Using built-in defaults
    Default,
}

impl std::fmt::Display for ConfigResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigResolution::CliFlag => write!(f, "cli"),
            ConfigResolution::EnvVar => write!(f, "env"),
            ConfigResolution::XdgConfig => write!(f, "xdg"),
            ConfigResolution::Default => write!(f, "default"),
        }
    }
}

/// Resolves the config path with CLI > env > XDG > defaults precedence.
#[derive(Debug, Default)]
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        ConfigResolver { cli_path }
    }

    /// Load the configuration, reporting where it came from.
    pub fn load(&self) -> Result<(Config, ConfigResolution)> {
        if let Some(path) = &self.cli_path {
            return Ok((Config::from_file(path)?, ConfigResolution::CliFlag));
        }

        if let Ok(path) = std::env::var("CSCTL_CONFIG") {
            return Ok((
                Config::from_file(Path::new(&path))?,
                ConfigResolution::EnvVar,
            ));
        }

        if let Some(dir) = dirs::config_dir() {
            let path = dir.join("csctl").join("config.toml");
            if path.is_file() {
                return Ok((Config::from_file(&path)?, ConfigResolution::XdgConfig));
            }
        }

        Ok((Config::default(), ConfigResolution::Default))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.prefix, "cs");
        assert_eq!(config.registry.lock_timeout_ms, 3_000);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "prefix = \"xy\"\npid_dir = \"/tmp/xy\"").unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.prefix, "xy");
        assert_eq!(config.pid_dir, PathBuf::from("/tmp/xy"));
        assert_eq!(config.init_dir, PathBuf::from("/etc/init.d"));
    }

    #[test]
    fn empty_prefix_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "prefix = \"\"").unwrap();
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(err.aborts_invocation());
    }

    #[test]
    fn port_family_match_is_prefix_based() {
        let config = Config::default();
        assert!(config.needs_port("brain"));
        assert!(config.needs_port("render"));
        assert!(!config.needs_port("task"));
    }
}
