//! Backup and restore use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls and the snapshot codec into the
//!   administrative backup/restore operations.
//! - Keep CLI and other callers decoupled from storage details.
//!
//! # Invariants
//! - Services receive their repository explicitly; none holds global state.
//! - Callers must serialize administrative operations against one store.

use std::fmt::{Display, Formatter};

pub mod backup_service;
pub mod restore_service;

/// User-facing error category a calling layer reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Database,
    Backup,
    Restore,
}

impl Display for ErrorCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Database => write!(f, "database error"),
            Self::Backup => write!(f, "backup error"),
            Self::Restore => write!(f, "restore error"),
        }
    }
}
