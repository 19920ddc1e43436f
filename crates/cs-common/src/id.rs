//! Service and process identity types.
//!
//! A managed service is identified by a `ServiceName` carrying the
//! configured prefix (e.g. `cs`), which distinguishes managed units from
//! unrelated OS processes. Numeric-range provisioning derives names of the
//! form `<prefix><family>-<n>`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Process ID wrapper with display formatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub u32);

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ProcessId {
    fn from(pid: u32) -> Self {
        ProcessId(pid)
    }
}

/// Name of an installed or running managed service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceName(pub String);

impl ServiceName {
    /// Wrap a name without prefix validation. Used when the name was
    /// produced by a source that already applied the naming convention
    /// (catalog scan, snapshot match).
    pub fn new(name: impl Into<String>) -> Self {
        ServiceName(name.into())
    }

    /// Derive the nth member of a provisioned family: `<prefix><family>-<n>`.
    pub fn from_family(prefix: &str, family: &str, n: u32) -> Self {
        ServiceName(format!("{prefix}{family}-{n}"))
    }

    /// Derive the nth member keeping the caller's full name as the stem:
    /// `<name>-<n>`. Used for the brain family, where the user-supplied
    /// name is preserved verbatim.
    pub fn from_stem(stem: &str, n: u32) -> Self {
        ServiceName(format!("{stem}-{n}"))
    }

    /// Whether this name carries the managed-service prefix.
    pub fn is_managed(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }

    /// Strip the managed prefix if present, yielding the family stem.
    /// `cstask-1` with prefix `cs` becomes `task-1`; names without the
    /// prefix pass through unchanged.
    pub fn normalized(&self, prefix: &str) -> &str {
        self.0.strip_prefix(prefix).unwrap_or(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ServiceName {
    fn from(s: &str) -> Self {
        ServiceName(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_derivation() {
        assert_eq!(
            ServiceName::from_family("cs", "task", 3).as_str(),
            "cstask-3"
        );
        assert_eq!(ServiceName::from_stem("csbrain", 1).as_str(), "csbrain-1");
    }

    #[test]
    fn prefix_normalization() {
        let name = ServiceName::new("cstask-1");
        assert!(name.is_managed("cs"));
        assert_eq!(name.normalized("cs"), "task-1");
        assert_eq!(ServiceName::new("task").normalized("cs"), "task");
    }

    #[test]
    fn ordering_is_lexicographic() {
        let mut names = vec![
            ServiceName::new("cstask-2"),
            ServiceName::new("csbrain-1"),
            ServiceName::new("cstask-1"),
        ];
        names.sort();
        assert_eq!(names[0].as_str(), "csbrain-1");
        assert_eq!(names[2].as_str(), "cstask-2");
    }
}
