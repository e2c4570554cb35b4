//! Revision history service.
//!
//! [`RevisionHistory`] is the only place revision rows are produced. Every
//! record passes the validity gate before anything is written, a change set
//! commits as one unit together with the entity change that caused it, and
//! reads check the recipe before any revision query runs.

use serde::Serialize;
use tracing::{error, info, warn};

use crate::{
    codec::{self, RevisionDecodeError},
    engine::diff::{dedupe_by_identity, diff_ingredients, diff_steps},
    persist::{PersistError, RecipeMutation, RevisionQuery, RevisionStore},
    revision::{NewRecipeRevision, RecipeRevision, RevisionRecord},
    snapshot::{IngredientSnapshot, StepSnapshot},
    types::{
        IngredientId, RecipeId, RevisionCategory, RevisionId, RevisionType, StepId, UserId,
    },
};

/// A requested recipe or sub-entity does not exist.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{resource} {id} not found")]
pub struct ResourceNotFound {
    /// `"recipe"`, `"ingredient"` or `"step"`.
    pub resource: &'static str,
    pub id: i64,
}

impl ResourceNotFound {
    pub fn recipe(id: RecipeId) -> Self {
        Self { resource: "recipe", id }
    }

    pub fn ingredient(id: IngredientId) -> Self {
        Self { resource: "ingredient", id }
    }

    pub fn step(id: StepId) -> Self {
        Self { resource: "step", id }
    }
}

/// Failure of a [`RevisionHistory`] operation.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// A record in a change set failed its validity check. Nothing was written.
    #[error("revision #{index} ({category}/{revision_type}) is not valid")]
    InvalidRevision {
        index: usize,
        category: RevisionCategory,
        revision_type: RevisionType,
    },

    #[error("stored revision {revision_id} is unreadable: {source}")]
    Decode {
        revision_id: RevisionId,
        #[source]
        source: RevisionDecodeError,
    },

    #[error(transparent)]
    NotFound(#[from] ResourceNotFound),

    #[error("store: {0}")]
    Persist(#[from] PersistError),
}

impl HistoryError {
    /// HTTP-style status a request boundary would map this error to.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRevision { .. } | Self::Decode { .. } => 400,
            Self::NotFound(_) | Self::Persist(PersistError::MissingRecipe(_)) => 404,
            Self::Persist(_) => 500,
        }
    }
}

pub type HistoryResult<T> = Result<T, HistoryError>;

/// A stored revision decoded back into its typed record.
///
/// Serializes as the row metadata with the record's own fields (including
/// `category` and `type`) inlined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedRevision {
    pub revision_id: RevisionId,
    pub recipe_id: RecipeId,
    pub user_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change_comment: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at_ms: u64,
    #[serde(flatten)]
    pub revision: RevisionRecord,
}

/// Read-side envelope for one recipe, or one of its ingredients or steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevisionsResponse {
    pub recipe_id: RecipeId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingredient_id: Option<IngredientId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<StepId>,
    /// Newest first.
    pub revisions: Vec<RecordedRevision>,
    pub total_count: usize,
}

/// Records and reads recipe revisions over a [`RevisionStore`].
pub struct RevisionHistory<S: RevisionStore> {
    store: S,
}

impl<S: RevisionStore> RevisionHistory<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    pub fn create_recipe(&mut self, user_id: UserId, title: &str) -> HistoryResult<RecipeId> {
        let recipe_id = self.store.create_recipe(user_id, title)?;
        info!(recipe_id, %user_id, "recipe created");
        Ok(recipe_id)
    }

    /// Deletes a recipe together with its ingredients, steps and history.
    pub fn delete_recipe(&mut self, recipe_id: RecipeId) -> HistoryResult<()> {
        if !self.store.delete_recipe(recipe_id)? {
            return Err(ResourceNotFound::recipe(recipe_id).into());
        }
        info!(recipe_id, "recipe deleted with its revisions");
        Ok(())
    }

    pub fn recipe_exists(&self, recipe_id: RecipeId) -> HistoryResult<bool> {
        Ok(self.store.recipe_exists(recipe_id)?)
    }

    /// Persists a change set as one unit.
    ///
    /// Every record is validated first; a single invalid record rejects the
    /// whole set and nothing is written. An empty set writes nothing.
    pub fn record_change(
        &mut self,
        recipe_id: RecipeId,
        user_id: UserId,
        records: &[RevisionRecord],
        comment: Option<&str>,
    ) -> HistoryResult<Vec<RevisionId>> {
        self.ensure_recipe(recipe_id)?;
        self.commit_records(recipe_id, user_id, records, comment, None)
    }

    /// Replaces a recipe's ingredient list and records what changed.
    ///
    /// The new list and its revisions commit together. Returns the records
    /// that were written; an unchanged list writes nothing.
    pub fn update_ingredients(
        &mut self,
        recipe_id: RecipeId,
        user_id: UserId,
        ingredients: Vec<IngredientSnapshot>,
        comment: Option<&str>,
    ) -> HistoryResult<Vec<RevisionRecord>> {
        self.ensure_recipe(recipe_id)?;
        let before = self.store.load_ingredients(recipe_id)?;
        let after = dedupe_by_identity(ingredients);
        let records = diff_ingredients(&before, &after);
        if records.is_empty() {
            return Ok(records);
        }
        let mutation = RecipeMutation::ReplaceIngredients(after);
        self.commit_records(recipe_id, user_id, &records, comment, Some(&mutation))?;
        Ok(records)
    }

    /// Replaces a recipe's step list and records what changed.
    pub fn update_steps(
        &mut self,
        recipe_id: RecipeId,
        user_id: UserId,
        steps: Vec<StepSnapshot>,
        comment: Option<&str>,
    ) -> HistoryResult<Vec<RevisionRecord>> {
        self.ensure_recipe(recipe_id)?;
        let before = self.store.load_steps(recipe_id)?;
        let after = dedupe_by_identity(steps);
        let records = diff_steps(&before, &after);
        if records.is_empty() {
            return Ok(records);
        }
        let mutation = RecipeMutation::ReplaceSteps(after);
        self.commit_records(recipe_id, user_id, &records, comment, Some(&mutation))?;
        Ok(records)
    }

    /// Revisions of a recipe, newest first, optionally narrowed to one
    /// category and one entity id.
    ///
    /// Fails with [`HistoryError::NotFound`] before any revision is read when
    /// the recipe does not exist. A row that cannot be decoded fails the
    /// whole read.
    pub fn get_history(
        &self,
        recipe_id: RecipeId,
        entity_id: Option<i64>,
        category: Option<RevisionCategory>,
    ) -> HistoryResult<Vec<RecordedRevision>> {
        let mut query = RevisionQuery::for_recipe(recipe_id);
        if let Some(category) = category {
            query = query.category(category);
        }
        if let Some(entity_id) = entity_id {
            query = query.entity(entity_id);
        }
        self.query(&query)
    }

    /// Like [`Self::get_history`] with the full filter set.
    pub fn query(&self, query: &RevisionQuery) -> HistoryResult<Vec<RecordedRevision>> {
        self.ensure_recipe(query.recipe_id)?;
        let rows = self.store.load_revisions(query)?;
        rows.into_iter().map(decode_recorded).collect()
    }

    /// Full history of a recipe.
    pub fn recipe_revisions(&self, recipe_id: RecipeId) -> HistoryResult<RevisionsResponse> {
        let revisions = self.get_history(recipe_id, None, None)?;
        Ok(RevisionsResponse {
            recipe_id,
            ingredient_id: None,
            step_id: None,
            total_count: revisions.len(),
            revisions,
        })
    }

    /// History of one ingredient, which must currently belong to the recipe.
    pub fn ingredient_revisions(
        &self,
        recipe_id: RecipeId,
        ingredient_id: IngredientId,
    ) -> HistoryResult<RevisionsResponse> {
        self.ensure_recipe(recipe_id)?;
        let present = self
            .store
            .load_ingredients(recipe_id)?
            .iter()
            .any(|i| i.ingredient_id == ingredient_id);
        if !present {
            return Err(ResourceNotFound::ingredient(ingredient_id).into());
        }
        let revisions =
            self.get_history(recipe_id, Some(ingredient_id), Some(RevisionCategory::Ingredient))?;
        Ok(RevisionsResponse {
            recipe_id,
            ingredient_id: Some(ingredient_id),
            step_id: None,
            total_count: revisions.len(),
            revisions,
        })
    }

    /// History of one step, which must currently belong to the recipe.
    pub fn step_revisions(
        &self,
        recipe_id: RecipeId,
        step_id: StepId,
    ) -> HistoryResult<RevisionsResponse> {
        self.ensure_recipe(recipe_id)?;
        let present = self
            .store
            .load_steps(recipe_id)?
            .iter()
            .any(|s| s.step_id == step_id);
        if !present {
            return Err(ResourceNotFound::step(step_id).into());
        }
        let revisions = self.get_history(recipe_id, Some(step_id), Some(RevisionCategory::Step))?;
        Ok(RevisionsResponse {
            recipe_id,
            ingredient_id: None,
            step_id: Some(step_id),
            total_count: revisions.len(),
            revisions,
        })
    }

    pub fn count_revisions(&self, recipe_id: RecipeId) -> HistoryResult<u64> {
        self.ensure_recipe(recipe_id)?;
        Ok(self.store.count_revisions(recipe_id)?)
    }

    /// Most recent revision of a recipe, if any.
    pub fn latest_revision(&self, recipe_id: RecipeId) -> HistoryResult<Option<RecordedRevision>> {
        let query = RevisionQuery::for_recipe(recipe_id).limit(1);
        Ok(self.query(&query)?.into_iter().next())
    }

    fn ensure_recipe(&self, recipe_id: RecipeId) -> HistoryResult<()> {
        if self.store.recipe_exists(recipe_id)? {
            Ok(())
        } else {
            Err(ResourceNotFound::recipe(recipe_id).into())
        }
    }

    fn commit_records(
        &mut self,
        recipe_id: RecipeId,
        user_id: UserId,
        records: &[RevisionRecord],
        comment: Option<&str>,
        mutation: Option<&RecipeMutation>,
    ) -> HistoryResult<Vec<RevisionId>> {
        let change_comment = comment
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        let mut rows = Vec::with_capacity(records.len());
        for (index, record) in records.iter().enumerate() {
            let invalid = || HistoryError::InvalidRevision {
                index,
                category: record.category(),
                revision_type: record.revision_type(),
            };
            if !record.is_valid() {
                warn!(
                    recipe_id,
                    index,
                    category = %record.category(),
                    revision_type = %record.revision_type(),
                    "rejecting change set with invalid revision"
                );
                return Err(invalid());
            }
            let entity_id = record.entity_id().ok_or_else(invalid)?;
            let pair = codec::encode_pair(record).map_err(PersistError::from)?;
            rows.push(NewRecipeRevision {
                recipe_id,
                user_id,
                category: record.category(),
                revision_type: record.revision_type(),
                entity_id,
                previous_data: pair.previous_data,
                new_data: pair.new_data,
                change_comment: change_comment.clone(),
            });
        }

        if rows.is_empty() && mutation.is_none() {
            return Ok(Vec::new());
        }

        let ids = self.store.commit(recipe_id, mutation, &rows).map_err(|err| match err {
            PersistError::MissingRecipe(id) => HistoryError::from(ResourceNotFound::recipe(id)),
            other => other.into(),
        })?;
        info!(recipe_id, %user_id, revisions = ids.len(), "recorded change set");
        Ok(ids)
    }
}

fn decode_recorded(row: RecipeRevision) -> HistoryResult<RecordedRevision> {
    let revision = codec::decode_row(
        &row.category,
        &row.revision_type,
        &row.previous_data,
        &row.new_data,
    )
    .map_err(|source| {
        error!(
            revision_id = row.revision_id,
            recipe_id = row.recipe_id,
            error = %source,
            "stored revision failed to decode"
        );
        HistoryError::Decode {
            revision_id: row.revision_id,
            source,
        }
    })?;
    Ok(RecordedRevision {
        revision_id: row.revision_id,
        recipe_id: row.recipe_id,
        user_id: row.user_id,
        change_comment: row.change_comment,
        created_at_ms: row.created_at_ms,
        revision,
    })
}
