//! csctl core — service lifecycle and registry reconciliation engine.
//!
//! The engine manages a fleet of sysv-style daemon scripts on one host:
//! - `collect` discovers which managed services are actually running by a
//!   one-shot scan of the OS process table;
//! - `catalog` discovers which services are installed on disk;
//! - `lifecycle` drives start/stop/restart transitions against the
//!   installed-vs-running discrepancy;
//! - `provision` creates and removes service scripts from a template,
//!   singly or as a numeric range;
//! - `registry` reconciles the persisted cross-host registry document
//!   against host-local reality.
//!
//! Installed, running, and registered are three independent sets; every
//! view the engine produces is a set-difference computed per invocation,
//! never cached.

pub mod catalog;
pub mod collect;
pub mod exit_codes;
pub mod host;
pub mod lifecycle;
pub mod logging;
pub mod output;
pub mod provision;
pub mod registry;
