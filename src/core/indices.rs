use hashbrown::HashMap;

use crate::types::{RecipeId, RevisionId};

/// Revision ids owned by each recipe, in insertion order.
pub type RecipeIndex = HashMap<RecipeId, Vec<RevisionId>>;
