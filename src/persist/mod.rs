//! Repository abstraction over recipes, their sub-entities, and revision rows.

/// SQLite implementation.
pub mod sqlite;

use crate::{
    revision::{NewRecipeRevision, RecipeRevision},
    snapshot::{IngredientSnapshot, StepSnapshot},
    types::{RecipeId, RevisionCategory, RevisionId, RevisionType, UserId},
};

/// Failure inside a [`RevisionStore`].
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("recipe {0} does not exist")]
    MissingRecipe(RecipeId),

    #[error("corrupt column {column}: {value:?}")]
    Corrupt { column: &'static str, value: String },
}

pub type PersistResult<T> = Result<T, PersistError>;

/// Entity change committed in the same transaction as its revision rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecipeMutation {
    /// Replace the recipe's ingredient list.
    ReplaceIngredients(Vec<IngredientSnapshot>),
    /// Replace the recipe's step list.
    ReplaceSteps(Vec<StepSnapshot>),
}

/// Filter for revision reads. Results are always newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionQuery {
    pub recipe_id: RecipeId,
    pub category: Option<RevisionCategory>,
    pub entity_id: Option<i64>,
    pub revision_type: Option<RevisionType>,
    pub user_id: Option<UserId>,
    pub limit: Option<usize>,
}

impl RevisionQuery {
    /// Every revision of `recipe_id`.
    pub fn for_recipe(recipe_id: RecipeId) -> Self {
        Self {
            recipe_id,
            category: None,
            entity_id: None,
            revision_type: None,
            user_id: None,
            limit: None,
        }
    }

    pub fn category(mut self, category: RevisionCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn entity(mut self, entity_id: i64) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    pub fn revision_type(mut self, revision_type: RevisionType) -> Self {
        self.revision_type = Some(revision_type);
        self
    }

    pub fn author(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// True when `row` passes every filter.
    pub fn matches(&self, row: &RecipeRevision) -> bool {
        row.recipe_id == self.recipe_id
            && self.category.is_none_or(|c| row.category == c.as_str())
            && self.entity_id.is_none_or(|id| row.entity_id == id)
            && self
                .revision_type
                .is_none_or(|t| RevisionType::parse(&row.revision_type) == Some(t))
            && self.user_id.is_none_or(|u| row.user_id == u)
    }
}

/// Recipe and revision storage.
///
/// `commit` is the only write path for revisions and must be all-or-nothing:
/// either the mutation and every row become visible, or none of them do.
pub trait RevisionStore: Send {
    fn create_recipe(&mut self, user_id: UserId, title: &str) -> PersistResult<RecipeId>;

    /// Deletes a recipe with its ingredients, steps and revisions. Returns
    /// false when it did not exist.
    fn delete_recipe(&mut self, recipe_id: RecipeId) -> PersistResult<bool>;

    fn recipe_exists(&self, recipe_id: RecipeId) -> PersistResult<bool>;

    fn load_ingredients(&self, recipe_id: RecipeId) -> PersistResult<Vec<IngredientSnapshot>>;

    fn load_steps(&self, recipe_id: RecipeId) -> PersistResult<Vec<StepSnapshot>>;

    /// Atomically applies `mutation` (if any) and inserts `rows` in order,
    /// returning the generated ids.
    fn commit(
        &mut self,
        recipe_id: RecipeId,
        mutation: Option<&RecipeMutation>,
        rows: &[NewRecipeRevision],
    ) -> PersistResult<Vec<RevisionId>>;

    fn load_revisions(&self, query: &RevisionQuery) -> PersistResult<Vec<RecipeRevision>>;

    fn count_revisions(&self, recipe_id: RecipeId) -> PersistResult<u64>;
}
