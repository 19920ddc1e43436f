//! Human and JSON rendering of engine results.
//!
//! Rendering is deliberately thin: aligned status lines with inline ANSI
//! color for humans, `serde_json` for machines. Every failure or skip the
//! engine reports becomes a visible line; nothing is silent.

use crate::collect::{ProcessRecord, ServiceStatus};
use crate::lifecycle::{ActionReport, StatusRow};
use crate::provision::ProvisionReport;
use crate::registry::{RegisterOutcome, RegistryRow};
use cs_common::{OutputFormat, Result};
use std::io::IsTerminal;

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

/// Renders engine results to stdout.
pub struct Printer {
    format: OutputFormat,
    color: bool,
}

impl Printer {
    pub fn new(format: OutputFormat, no_color: bool) -> Self {
        Printer {
            format,
            color: !no_color && std::io::stdout().is_terminal(),
        }
    }

    fn paint(&self, text: &str, color: &str) -> String {
        if self.color {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    /// Status table: one Running/Down line per service.
    pub fn status(&self, rows: &[StatusRow]) -> Result<()> {
        if self.format == OutputFormat::Json {
            println!("{}", serde_json::to_string_pretty(rows)?);
            return Ok(());
        }

        println!(
            "{:<24} {:>8} {:<20} {:>7} {:>7} {}",
            "NAME", "PID", "STARTED", "MEM%", "CPU%", "STATUS"
        );
        for row in rows {
            match &row.status {
                ServiceStatus::Running {
                    pid,
                    started_at,
                    memory_percent,
                    cpu_percent,
                } => {
                    println!(
                        "{:<24} {:>8} {:<20} {:>6.1}% {:>6.1}% {}",
                        self.paint(row.name.as_str(), GREEN),
                        pid.to_string(),
                        started_at.format("%Y-%m-%d %H:%M:%S"),
                        memory_percent,
                        cpu_percent,
                        self.paint("running", YELLOW)
                    );
                }
                ServiceStatus::Down => {
                    println!(
                        "{:<24} {:>8} {:<20} {:>7} {:>7} {}",
                        self.paint(row.name.as_str(), RED),
                        "-",
                        "-",
                        "-",
                        "-",
                        self.paint("down", RED)
                    );
                }
            }
        }
        Ok(())
    }

    /// Lifecycle action outcome lines.
    pub fn actions(&self, reports: &[ActionReport]) {
        for report in reports {
            match report {
                ActionReport::Started(name) => {
                    println!(
                        "Starting process {:<40} {}",
                        self.paint(name.as_str(), CYAN),
                        self.paint("done", YELLOW)
                    );
                }
                ActionReport::AlreadyRunning(name) => {
                    println!(
                        "Process {:<48} is already {}",
                        self.paint(name.as_str(), GREEN),
                        self.paint("running", GREEN)
                    );
                }
                ActionReport::Stopped { name, pid } => {
                    println!(
                        "Stopping process {:<40} pid {}",
                        self.paint(name.as_str(), CYAN),
                        self.paint(&pid.to_string(), GREEN)
                    );
                }
                ActionReport::Failed { name, reason } => {
                    println!(
                        "{} {}: {reason}",
                        self.paint("failed", RED),
                        name.as_str()
                    );
                }
            }
        }
    }

    /// Provisioning outcome lines.
    pub fn provision(&self, reports: &[ProvisionReport]) {
        for report in reports {
            match report {
                ProvisionReport::Created { name, port } => match port {
                    Some(port) => println!(
                        "Adding service {} (port {port})",
                        self.paint(name.as_str(), GREEN)
                    ),
                    None => println!("Adding service {}", self.paint(name.as_str(), GREEN)),
                },
                ProvisionReport::SkippedExisting(name) => {
                    println!(
                        "Service {} already exists, skipping",
                        self.paint(name.as_str(), GREEN)
                    );
                }
                ProvisionReport::Removed(name) => {
                    println!("Removing service {}", self.paint(name.as_str(), GREEN));
                }
                ProvisionReport::NotFound(name) => {
                    println!("Service {} not found", self.paint(name.as_str(), RED));
                }
            }
        }
    }

    /// Registry reconciliation view.
    pub fn registry(&self, rows: &[RegistryRow]) -> Result<()> {
        if self.format == OutputFormat::Json {
            println!("{}", serde_json::to_string_pretty(rows)?);
            return Ok(());
        }

        println!(
            "{:<24} {:<20} {:<16} {}",
            "INSTANCE", "HOSTNAME", "IPADDR", "REGISTERED"
        );
        for row in rows {
            let (name_color, flag, flag_color) = if row.registered {
                (GREEN, "TRUE", GREEN)
            } else {
                (RED, "FALSE", RED)
            };
            println!(
                "{:<24} {:<20} {:<16} {}",
                self.paint(&row.instance, name_color),
                row.hostname,
                row.ipaddr,
                self.paint(flag, flag_color)
            );
        }
        Ok(())
    }

    /// Registration outcome status line.
    pub fn register_outcome(&self, outcome: &RegisterOutcome, instance: &str, ipaddr: &str) {
        let instance = self.paint(instance, GREEN);
        let ipaddr = self.paint(ipaddr, CYAN);
        match outcome {
            RegisterOutcome::HostAdded => {
                println!("Instance {instance} and host {ipaddr} registered");
            }
            RegisterOutcome::HostNotRegistered => {
                println!("Cannot register instance {instance}: host {ipaddr} is not registered");
            }
            RegisterOutcome::HostAlreadyRegistered => {
                println!("Instance {instance} and host {ipaddr} already registered");
            }
            RegisterOutcome::DuplicateInstance => {
                println!("Instance {instance} is already registered");
            }
            RegisterOutcome::InstanceAdded => {
                println!("Instance {instance} registered");
            }
        }
    }

    /// Environment variables of one running service, filtered to the
    /// managed namespace (uppercased service prefix).
    pub fn show_env(&self, record: &ProcessRecord, prefix: &str) -> Result<()> {
        let namespace = prefix.to_uppercase();
        if self.format == OutputFormat::Json {
            let filtered: std::collections::BTreeMap<_, _> = record
                .environment
                .iter()
                .filter(|(key, _)| key.starts_with(&namespace))
                .collect();
            println!("{}", serde_json::to_string_pretty(&filtered)?);
            return Ok(());
        }

        println!("{:<32} {}", "ENVIRON", "VALUE");
        let mut keys: Vec<_> = record
            .environment
            .keys()
            .filter(|key| key.starts_with(&namespace))
            .collect();
        keys.sort();
        for key in keys {
            println!(
                "{:<32} {}",
                self.paint(key, CYAN),
                self.paint(&record.environment[key], GREEN)
            );
        }
        Ok(())
    }

    /// Launch parameters: `--flag` tokens paired with the positional
    /// values that follow the script name.
    pub fn show_params(&self, record: &ProcessRecord) -> Result<()> {
        // First positional is the service name token itself.
        let values: Vec<&String> = record.arguments.iter().skip(1).collect();
        let pairs: Vec<(&str, &str)> = record
            .parameters
            .iter()
            .enumerate()
            .filter_map(|(i, param)| values.get(i).map(|v| (param.as_str(), v.as_str())))
            .collect();

        if self.format == OutputFormat::Json {
            let map: std::collections::BTreeMap<_, _> = pairs.into_iter().collect();
            println!("{}", serde_json::to_string_pretty(&map)?);
            return Ok(());
        }

        println!("{:<24} {}", "PARAMETER", "VALUE");
        for (param, value) in pairs {
            println!(
                "{:<24} {}",
                self.paint(param, CYAN),
                self.paint(value, GREEN)
            );
        }
        Ok(())
    }

    /// Active connections of one running service. Wildcard-only IPv6
    /// listeners (`::`) are skipped like the rest of the fleet tooling
    /// expects.
    pub fn show_connections(&self, record: &ProcessRecord) -> Result<()> {
        if self.format == OutputFormat::Json {
            println!("{}", serde_json::to_string_pretty(&record.connections)?);
            return Ok(());
        }

        println!(
            "{:<24} {:>6} {:<24} {:>6} {}",
            "LADDR", "LPORT", "RADDR", "RPORT", "STATUS"
        );
        for conn in &record.connections {
            if conn.local_addr == "::" {
                continue;
            }
            println!(
                "{:<24} {:>6} {:<24} {:>6} {}",
                self.paint(&conn.local_addr, GREEN),
                conn.local_port,
                self.paint(&conn.remote_addr, GREEN),
                conn.remote_port,
                self.paint(&conn.state.to_string(), CYAN)
            );
        }
        Ok(())
    }
}
