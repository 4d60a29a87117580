//! Error types for the entity store.
//!
//! All store failures are reported through [`StoreError`]. Callers decide
//! whether a given variant is a lookup miss or a persistence failure; the
//! store itself never retries.

/// Errors that can occur in the entity store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// No entity with the given identifier exists.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity kind (`community`, `agent`).
        entity: &'static str,
        /// The missing identifier.
        id: String,
    },

    /// An insert collided with an existing identifier.
    #[error("{entity} already exists: {id}")]
    AlreadyExists {
        /// Entity kind (`community`, `agent`).
        entity: &'static str,
        /// The colliding identifier.
        id: String,
    },

    /// A lock was poisoned by a panicking writer.
    #[error("store lock poisoned: {0}")]
    Poisoned(&'static str),

    /// A backing store rejected the operation.
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether this error is a lookup miss rather than a storage failure.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
