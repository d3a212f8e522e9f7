//! Identifier validation shared by the webhook and the update path

use crate::pool::AllocationPool;
use thiserror::Error;

/// Why a proposed identifier cannot be accepted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdViolation {
    /// Above the inclusive ceiling
    #[error("ID {id} exceeds max-id {max_id}.")]
    ExceedsCeiling {
        /// Requested identifier
        id: u32,
        /// Ceiling in effect
        max_id: u32,
    },

    /// Held by another resource
    #[error("ID {id} is already taken by {holder}.")]
    AlreadyAssigned {
        /// Requested identifier
        id: u32,
        /// `namespace/name` of the current holder
        holder: String,
    },

    /// Cleared on a resource that was already initialized
    #[error("ID cannot be removed from an initialized SparkNotebook.")]
    Removed,
}

/// Checks `id` against the inclusive ceiling.
pub fn validate_ceiling(id: u32, max_id: u32) -> Result<(), IdViolation> {
    if id > max_id {
        return Err(IdViolation::ExceedsCeiling { id, max_id });
    }
    Ok(())
}

/// Checks a changed identifier on an initialized resource.
///
/// `holder` is the resource's own name as recorded in `pool`. Any other
/// resource carrying the same identifier is a conflict, including one only
/// recorded as a duplicate. Returns the accepted identifier.
pub fn validate_reassignment(
    new_id: Option<u32>,
    holder: &str,
    pool: &AllocationPool,
    max_id: u32,
) -> Result<u32, IdViolation> {
    let id = new_id.ok_or(IdViolation::Removed)?;
    let other = pool.holder(id).filter(|h| *h != holder).or_else(|| {
        pool.duplicates()
            .iter()
            .find(|(dup, h)| *dup == id && h != holder)
            .map(|(_, h)| h.as_str())
    });
    if let Some(other) = other {
        return Err(IdViolation::AlreadyAssigned {
            id,
            holder: other.to_string(),
        });
    }
    validate_ceiling(id, max_id)?;
    Ok(id)
}
