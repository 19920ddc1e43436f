//! Process snapshot collection.
//!
//! A snapshot is a single best-effort pass over the live OS process table,
//! producing one [`ProcessRecord`] per process that follows the managed
//! naming convention. Processes that disappear mid-scan are skipped
//! silently; the snapshot is not transactional.

pub mod network;
pub mod procfs;
pub mod types;

pub use network::{TcpConnection, TcpState};
pub use procfs::ProcfsSource;
pub use types::{MatchRules, ProcessRecord, ServiceStatus};

use cs_common::Result;

/// Capability interface over the OS process table.
///
/// The lifecycle controller and the status views depend on this trait, not
/// on any concrete process-inspection mechanism, so tests can inject a
/// synthetic table.
pub trait ProcessSource {
    /// One-shot scan producing records for managed processes only.
    fn snapshot(&self) -> Result<Vec<ProcessRecord>>;
}
