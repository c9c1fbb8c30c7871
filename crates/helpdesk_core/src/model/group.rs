//! Group domain model.
//!
//! # Invariants
//! - `name` is the only portable key for a group; `id` is meaningful only in
//!   the store that assigned it.

use super::{validate_group_name, ValidationError};
use serde::{Deserialize, Serialize};

/// Store-assigned group identifier.
pub type GroupId = i64;

/// Named collection of help articles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    /// Unique, exact-match name.
    pub name: String,
}

impl Group {
    pub fn new(id: GroupId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_group_name(&self.name)
    }
}
