//! Runtime event stream payloads.

use crate::types::RecipeId;

/// Events emitted by the revision tracker after a write commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionEvent {
    /// A recipe was created.
    RecipeCreated {
        /// New recipe id.
        recipe_id: RecipeId,
    },
    /// A recipe and its history were deleted.
    RecipeDeleted {
        /// Deleted recipe id.
        recipe_id: RecipeId,
    },
    /// A change set committed.
    Recorded {
        /// Recipe the change set belongs to.
        recipe_id: RecipeId,
        /// Number of revision rows written.
        revisions: usize,
    },
}
