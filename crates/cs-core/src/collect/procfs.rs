//! Real process-table provider backed by /proc.
//!
//! One snapshot walks the numeric entries of the proc root once, reading
//! `cmdline`, `stat`, `statm`, `environ`, and the fd table of each matching
//! process. Any per-process read failure means the process exited between
//! the directory walk and the read; such processes are skipped without
//! surfacing an error.

use crate::collect::network::{socket_inodes, TcpTable};
use crate::collect::types::{partition_tokens, MatchRules, ProcessRecord};
use crate::collect::ProcessSource;
use chrono::{Local, TimeZone};
use cs_common::{Config, Error, ProcessId, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Process snapshot provider over the /proc filesystem.
#[derive(Debug)]
pub struct ProcfsSource {
    proc_root: PathBuf,
    rules: MatchRules,
}

impl ProcfsSource {
    pub fn new(config: &Config) -> Self {
        Self::with_root(config, PathBuf::from("/proc"))
    }

    /// Construct against an alternate proc root. Used by tests that lay
    /// out a synthetic proc tree.
    pub fn with_root(config: &Config, proc_root: PathBuf) -> Self {
        ProcfsSource {
            proc_root,
            rules: MatchRules::new(&config.runtime_marker, &config.prefix),
        }
    }

    fn pid_dir(&self, pid: u32) -> PathBuf {
        self.proc_root.join(pid.to_string())
    }

    fn read_cmdline(&self, pid: u32) -> Option<Vec<String>> {
        let raw = fs::read(self.pid_dir(pid).join("cmdline")).ok()?;
        let tokens: Vec<String> = raw
            .split(|b| *b == 0)
            .filter(|part| !part.is_empty())
            .map(|part| String::from_utf8_lossy(part).into_owned())
            .collect();
        if tokens.is_empty() {
            None
        } else {
            Some(tokens)
        }
    }

    fn read_environ(&self, pid: u32) -> HashMap<String, String> {
        let Ok(raw) = fs::read(self.pid_dir(pid).join("environ")) else {
            return HashMap::new();
        };
        raw.split(|b| *b == 0)
            .filter(|part| !part.is_empty())
            .filter_map(|part| {
                let text = String::from_utf8_lossy(part);
                let (key, value) = text.split_once('=')?;
                Some((key.to_string(), value.to_string()))
            })
            .collect()
    }
}

impl ProcessSource for ProcfsSource {
    fn snapshot(&self) -> Result<Vec<ProcessRecord>> {
        let clock = Clock::read(&self.proc_root)?;
        let tcp = TcpTable::load_from(
            &self.proc_root.join("net/tcp"),
            &self.proc_root.join("net/tcp6"),
        );

        let entries = fs::read_dir(&self.proc_root)
            .map_err(|e| Error::Io(std::io::Error::new(e.kind(), format!("{}: {e}", self.proc_root.display()))))?;

        let mut records = Vec::new();
        for entry in entries.flatten() {
            let Some(pid) = entry
                .file_name()
                .to_str()
                .and_then(|name| name.parse::<u32>().ok())
            else {
                continue;
            };

            let Some(cmdline) = self.read_cmdline(pid) else {
                continue;
            };
            let Some(name) = self.rules.match_cmdline(&cmdline) else {
                continue;
            };

            // Anything unreadable past this point is a process that went
            // away mid-scan: drop the record, keep scanning.
            let stat_raw = match fs::read_to_string(self.pid_dir(pid).join("stat")) {
                Ok(text) => text,
                Err(e) => {
                    debug!(pid, error = %e, "process vanished mid-scan");
                    continue;
                }
            };
            let Some(stat) = parse_stat(&stat_raw) else {
                debug!(pid, "unparseable stat line");
                continue;
            };

            let resident_pages = fs::read_to_string(self.pid_dir(pid).join("statm"))
                .ok()
                .and_then(|text| parse_statm_resident(&text))
                .unwrap_or(0);

            let start_unix = start_time_unix(clock.btime, stat.starttime_ticks, clock.ticks_per_sec);
            let started_at = Local
                .timestamp_opt(start_unix, 0)
                .single()
                .unwrap_or_else(Local::now);

            let (arguments, parameters) = partition_tokens(&cmdline);
            let inodes = socket_inodes(&self.proc_root, pid);

            records.push(ProcessRecord {
                name,
                pid: ProcessId(pid),
                started_at,
                memory_percent: clock.memory_percent(resident_pages),
                cpu_percent: clock.cpu_percent(stat.utime_ticks + stat.stime_ticks, start_unix),
                arguments,
                parameters,
                environment: self.read_environ(pid),
                connections: tcp.for_inodes(&inodes),
            });
        }

        Ok(records)
    }
}

/// Host-wide figures needed to turn raw tick/page counters into
/// percentages and timestamps.
#[derive(Debug)]
struct Clock {
    btime: i64,
    ticks_per_sec: u64,
    page_size: u64,
    mem_total_bytes: u64,
}

impl Clock {
    fn read(proc_root: &Path) -> Result<Self> {
        let stat = fs::read_to_string(proc_root.join("stat"))?;
        let btime = stat
            .lines()
            .find_map(|line| line.strip_prefix("btime "))
            .and_then(|rest| rest.trim().parse().ok())
            .unwrap_or(0);

        let meminfo = fs::read_to_string(proc_root.join("meminfo")).unwrap_or_default();
        let mem_total_kb: u64 = meminfo
            .lines()
            .find_map(|line| line.strip_prefix("MemTotal:"))
            .and_then(|rest| rest.trim().trim_end_matches(" kB").trim().parse().ok())
            .unwrap_or(0);

        let ticks_per_sec = unsafe { libc::sysconf(libc::_SC_CLK_TCK) }.max(1) as u64;
        let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) }.max(1) as u64;

        Ok(Clock {
            btime,
            ticks_per_sec,
            page_size,
            mem_total_bytes: mem_total_kb * 1024,
        })
    }

    fn memory_percent(&self, resident_pages: u64) -> f64 {
        if self.mem_total_bytes == 0 {
            return 0.0;
        }
        let rss = resident_pages * self.page_size;
        round1(rss as f64 / self.mem_total_bytes as f64 * 100.0)
    }

    /// Lifetime-average CPU usage: total consumed ticks over wall-clock
    /// elapsed time. A one-shot scan has no prior sample to diff against.
    fn cpu_percent(&self, cpu_ticks: u64, start_unix: i64) -> f64 {
        let elapsed = (Local::now().timestamp() - start_unix).max(1) as f64;
        let cpu_secs = cpu_ticks as f64 / self.ticks_per_sec as f64;
        round1((cpu_secs / elapsed * 100.0).min(100.0 * num_cpus()))
    }
}

fn num_cpus() -> f64 {
    (unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) }).max(1) as f64
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[derive(Debug, PartialEq)]
struct StatFields {
    utime_ticks: u64,
    stime_ticks: u64,
    starttime_ticks: u64,
}

/// Parse /proc/[pid]/stat. The comm field may contain spaces and
/// parentheses, so fields are counted from the last `)`.
fn parse_stat(raw: &str) -> Option<StatFields> {
    let after_comm = raw.get(raw.rfind(')')? + 2..)?;
    let fields: Vec<&str> = after_comm.split_whitespace().collect();
    // after_comm starts at field 3 (state); utime/stime/starttime are
    // fields 14, 15, and 22 of the full line.
    Some(StatFields {
        utime_ticks: fields.get(11)?.parse().ok()?,
        stime_ticks: fields.get(12)?.parse().ok()?,
        starttime_ticks: fields.get(19)?.parse().ok()?,
    })
}

/// Resident set size in pages, the second field of /proc/[pid]/statm.
fn parse_statm_resident(raw: &str) -> Option<u64> {
    raw.split_whitespace().nth(1)?.parse().ok()
}

/// Seconds-since-epoch start time: boot timestamp plus ticks since boot.
fn start_time_unix(btime: i64, starttime_ticks: u64, ticks_per_sec: u64) -> i64 {
    btime + (starttime_ticks / ticks_per_sec) as i64
}
