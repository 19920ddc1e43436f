//! Record types for process snapshots.

use crate::collect::network::TcpConnection;
use chrono::{DateTime, Local};
use cs_common::{ProcessId, ServiceName};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;

/// Matching rules deciding which processes belong to the managed fleet.
///
/// A process is included when its first cmdline token starts with the
/// runtime marker AND some cmdline token matches the service name pattern
/// (a lowercase-letter run behind the configured prefix).
#[derive(Debug, Clone)]
pub struct MatchRules {
    marker: String,
    name_pattern: Regex,
}

impl MatchRules {
    pub fn new(runtime_marker: &str, prefix: &str) -> Self {
        // Infallible for any prefix made of literal word characters; the
        // prefix is validated non-empty at config load.
        let name_pattern = Regex::new(&format!("^({}[a-z].*)", regex::escape(prefix)))
            .expect("service prefix forms a valid pattern");
        MatchRules {
            marker: runtime_marker.to_string(),
            name_pattern,
        }
    }

    /// Extract the managed service name from a cmdline, or None if the
    /// process is not part of the fleet.
    pub fn match_cmdline(&self, cmdline: &[String]) -> Option<ServiceName> {
        let first = cmdline.first()?;
        if !first.starts_with(&self.marker) {
            return None;
        }
        cmdline
            .iter()
            .find(|token| self.name_pattern.is_match(token))
            .map(|token| ServiceName::new(token.clone()))
    }
}

/// Split cmdline tokens into positional arguments and `--flag` parameters.
///
/// The first token (the interpreter) is excluded from both groups.
pub fn partition_tokens(cmdline: &[String]) -> (Vec<String>, Vec<String>) {
    let mut arguments = Vec::new();
    let mut parameters = Vec::new();
    for token in cmdline.iter().skip(1) {
        if token.starts_with("--") {
            parameters.push(token.clone());
        } else {
            arguments.push(token.clone());
        }
    }
    (arguments, parameters)
}

/// One managed process as observed by a single snapshot.
///
/// Ephemeral: lives only for the duration of one scan, never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessRecord {
    /// Managed service name recovered from the cmdline.
    pub name: ServiceName,
    pub pid: ProcessId,
    pub started_at: DateTime<Local>,
    pub memory_percent: f64,
    pub cpu_percent: f64,
    /// Positional cmdline tokens (serial numbers, identifiers).
    pub arguments: Vec<String>,
    /// Flag-style cmdline tokens (`--key` form).
    pub parameters: Vec<String>,
    pub environment: HashMap<String, String>,
    pub connections: Vec<TcpConnection>,
}

/// Derived per-invocation state of one installed service.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ServiceStatus {
    Running {
        pid: ProcessId,
        started_at: DateTime<Local>,
        memory_percent: f64,
        cpu_percent: f64,
    },
    Down,
}

impl ServiceStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, ServiceStatus::Running { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn matches_marker_and_prefix() {
        let rules = MatchRules::new("python3", "cs");
        let cmd = tokens(&["python3.9", "/usr/sbin/cstask-1", "--serial", "42"]);
        assert_eq!(
            rules.match_cmdline(&cmd).map(|n| n.0),
            // The path token does not match; only a bare name token does.
            None
        );

        let cmd = tokens(&["python3.9", "cstask-1", "--serial", "42"]);
        assert_eq!(rules.match_cmdline(&cmd).unwrap().as_str(), "cstask-1");
    }

    #[test]
    fn rejects_wrong_marker_or_prefix() {
        let rules = MatchRules::new("python3", "cs");
        assert!(rules
            .match_cmdline(&tokens(&["ruby", "cstask-1"]))
            .is_none());
        assert!(rules
            .match_cmdline(&tokens(&["python3", "nginx"]))
            .is_none());
        // Prefix must be followed by a lowercase letter.
        assert!(rules.match_cmdline(&tokens(&["python3", "cs1"])).is_none());
        assert!(rules.match_cmdline(&[]).is_none());
    }

    #[test]
    fn partitions_flags_from_positionals() {
        let cmd = tokens(&["python3", "cstask-1", "abc123", "--serial", "--verbose"]);
        let (arguments, parameters) = partition_tokens(&cmd);
        assert_eq!(arguments, vec!["cstask-1", "abc123"]);
        assert_eq!(parameters, vec!["--serial", "--verbose"]);
    }
}
