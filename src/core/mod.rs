//! In-memory store and index helpers.

/// Helper index aliases.
pub mod indices;
/// In-memory [`crate::persist::RevisionStore`].
pub mod store;
