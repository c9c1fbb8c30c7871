//! Knowledge-base domain model.
//!
//! # Responsibility
//! - Define the value records shared by repository, codec and engines.
//! - Own input validation rules for groups and articles.
//!
//! # Invariants
//! - Identifiers are store-local; they carry no meaning outside the store
//!   that assigned them.
//! - Group names are compared byte-for-byte, never case-folded.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod article;
pub mod group;
pub mod snapshot;

/// Validation failures for model records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Group name is empty or whitespace-only.
    EmptyGroupName,
    /// Article title is empty or whitespace-only.
    EmptyArticleTitle,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyGroupName => write!(f, "group name must not be empty"),
            Self::EmptyArticleTitle => write!(f, "article title must not be empty"),
        }
    }
}

impl Error for ValidationError {}

/// Validates one group name without normalizing it.
pub fn validate_group_name(name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::EmptyGroupName);
    }
    Ok(())
}
