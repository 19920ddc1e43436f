//! Exit codes for the csctl CLI.
//!
//! Per-item failures inside batch operations (range create/remove,
//! multi-service start/stop) never change the exit code; only whole-
//! invocation aborts do.

/// Exit codes for csctl operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Clean run, including batches with per-item failures.
    Clean = 0,

    /// Usage or validation error: missing required argument, duplicate
    /// service on add, malformed range.
    UsageError = 1,

    /// Registry store failure aborted the invocation.
    StoreError = 2,
}

impl ExitCode {
    /// Convert to i32 for process exit.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        matches!(self, ExitCode::Clean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(ExitCode::Clean.as_i32(), 0);
        assert_eq!(ExitCode::UsageError.as_i32(), 1);
        assert_eq!(ExitCode::StoreError.as_i32(), 2);
        assert!(ExitCode::Clean.is_success());
        assert!(!ExitCode::UsageError.is_success());
    }
}
