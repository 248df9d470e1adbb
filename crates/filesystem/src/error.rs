//! Error taxonomy for filesystem tool operations.
//!
//! Every tool failure is reported as exactly one of these kinds; tools never
//! return partially-successful results. Unknown tool names and parameter
//! schema mismatches are rejected by the protocol router before a tool body
//! runs.

use crate::guard::GuardError;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Structured failures returned by filesystem tools.
#[derive(Error, Debug)]
pub enum ToolError {
    /// Path containment failure.
    #[error("access denied: {} is outside the allowed directories", .0.display())]
    OutsideRoot(PathBuf),
    /// Missing file, directory, or parent directory.
    #[error("not found: {}", .0.display())]
    NotFound(PathBuf),
    /// Destination collision on move.
    #[error("already exists: {}", .0.display())]
    AlreadyExists(PathBuf),
    /// An edit target was missing from the file or matched more than once.
    #[error("edit conflict: {0}")]
    EditConflict(String),
    /// Any other I/O failure.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl ToolError {
    /// Lift a raw I/O failure into the taxonomy, attaching path context.
    pub fn io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ToolError::NotFound(path.to_path_buf()),
            io::ErrorKind::AlreadyExists => ToolError::AlreadyExists(path.to_path_buf()),
            _ => ToolError::Io(err),
        }
    }
}

impl From<GuardError> for ToolError {
    fn from(err: GuardError) -> Self {
        match err {
            GuardError::OutsideRoot(path) => ToolError::OutsideRoot(path),
            // A path with no resolvable ancestry is missing as far as the
            // caller is concerned.
            GuardError::Unresolvable(path) => ToolError::NotFound(path),
            GuardError::Io(err) => ToolError::Io(err),
        }
    }
}
