//! Diff engine turning before/after snapshots into revision records.

/// Snapshot diffing.
pub mod diff;
/// Tracked-entity trait and its ingredient/step implementations.
pub mod traits;
