use std::time::{SystemTime, UNIX_EPOCH};

use hashbrown::HashMap;

use crate::{
    persist::{PersistError, PersistResult, RecipeMutation, RevisionQuery, RevisionStore},
    revision::{NewRecipeRevision, RecipeRevision},
    snapshot::{IngredientSnapshot, StepSnapshot},
    types::{RecipeId, RevisionId, UserId},
};

use super::indices::RecipeIndex;

#[derive(Debug, Clone)]
struct RecipeEntry {
    owner: UserId,
    title: String,
    ingredients: Vec<IngredientSnapshot>,
    steps: Vec<StepSnapshot>,
}

/// Process-local [`RevisionStore`].
///
/// Every commit is validated before anything is applied, so a rejected
/// batch leaves no trace.
#[derive(Debug)]
pub struct MemoryRevisionStore {
    recipes: HashMap<RecipeId, RecipeEntry>,
    revisions: HashMap<RevisionId, RecipeRevision>,
    by_recipe: RecipeIndex,
    next_recipe_id: RecipeId,
    next_revision_id: RevisionId,
    last_created_at_ms: u64,
}

impl MemoryRevisionStore {
    pub fn new() -> Self {
        Self {
            recipes: HashMap::new(),
            revisions: HashMap::new(),
            by_recipe: RecipeIndex::new(),
            next_recipe_id: 1,
            next_revision_id: 1,
            last_created_at_ms: 0,
        }
    }

    pub fn recipe_count(&self) -> usize {
        self.recipes.len()
    }

    pub fn revision_count(&self) -> usize {
        self.revisions.len()
    }

    /// Owner and title of a recipe.
    pub fn recipe(&self, recipe_id: RecipeId) -> Option<(UserId, &str)> {
        self.recipes
            .get(&recipe_id)
            .map(|r| (r.owner, r.title.as_str()))
    }

    // Never goes backwards, so insertion order and time order agree.
    fn tick(&mut self) -> u64 {
        self.last_created_at_ms = self.last_created_at_ms.max(now_ms());
        self.last_created_at_ms
    }
}

impl Default for MemoryRevisionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RevisionStore for MemoryRevisionStore {
    fn create_recipe(&mut self, user_id: UserId, title: &str) -> PersistResult<RecipeId> {
        let id = self.next_recipe_id;
        self.next_recipe_id += 1;
        self.recipes.insert(
            id,
            RecipeEntry {
                owner: user_id,
                title: title.to_string(),
                ingredients: Vec::new(),
                steps: Vec::new(),
            },
        );
        Ok(id)
    }

    fn delete_recipe(&mut self, recipe_id: RecipeId) -> PersistResult<bool> {
        if self.recipes.remove(&recipe_id).is_none() {
            return Ok(false);
        }
        for id in self.by_recipe.remove(&recipe_id).unwrap_or_default() {
            self.revisions.remove(&id);
        }
        Ok(true)
    }

    fn recipe_exists(&self, recipe_id: RecipeId) -> PersistResult<bool> {
        Ok(self.recipes.contains_key(&recipe_id))
    }

    fn load_ingredients(&self, recipe_id: RecipeId) -> PersistResult<Vec<IngredientSnapshot>> {
        Ok(self
            .recipes
            .get(&recipe_id)
            .map(|r| r.ingredients.clone())
            .unwrap_or_default())
    }

    fn load_steps(&self, recipe_id: RecipeId) -> PersistResult<Vec<StepSnapshot>> {
        Ok(self
            .recipes
            .get(&recipe_id)
            .map(|r| r.steps.clone())
            .unwrap_or_default())
    }

    fn commit(
        &mut self,
        recipe_id: RecipeId,
        mutation: Option<&RecipeMutation>,
        rows: &[NewRecipeRevision],
    ) -> PersistResult<Vec<RevisionId>> {
        if !self.recipes.contains_key(&recipe_id) {
            return Err(PersistError::MissingRecipe(recipe_id));
        }
        if let Some(row) = rows.iter().find(|r| !self.recipes.contains_key(&r.recipe_id)) {
            return Err(PersistError::MissingRecipe(row.recipe_id));
        }

        if let Some(entry) = self.recipes.get_mut(&recipe_id) {
            match mutation {
                Some(RecipeMutation::ReplaceIngredients(list)) => entry.ingredients = list.clone(),
                Some(RecipeMutation::ReplaceSteps(list)) => entry.steps = list.clone(),
                None => {}
            }
        }

        let created_at_ms = self.tick();
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let revision_id = self.next_revision_id;
            self.next_revision_id += 1;
            self.revisions.insert(
                revision_id,
                RecipeRevision {
                    revision_id,
                    recipe_id: row.recipe_id,
                    user_id: row.user_id,
                    category: row.category.as_str().to_string(),
                    revision_type: row.revision_type.as_str().to_string(),
                    entity_id: row.entity_id,
                    previous_data: row.previous_data.clone(),
                    new_data: row.new_data.clone(),
                    change_comment: row.change_comment.clone(),
                    created_at_ms,
                },
            );
            self.by_recipe.entry(row.recipe_id).or_default().push(revision_id);
            ids.push(revision_id);
        }
        Ok(ids)
    }

    fn load_revisions(&self, query: &RevisionQuery) -> PersistResult<Vec<RecipeRevision>> {
        let mut out: Vec<RecipeRevision> = self
            .by_recipe
            .get(&query.recipe_id)
            .into_iter()
            .flat_map(|ids| ids.iter())
            .filter_map(|id| self.revisions.get(id))
            .filter(|row| query.matches(row))
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            (b.created_at_ms, b.revision_id).cmp(&(a.created_at_ms, a.revision_id))
        });
        if let Some(limit) = query.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    fn count_revisions(&self, recipe_id: RecipeId) -> PersistResult<u64> {
        Ok(self.by_recipe.get(&recipe_id).map_or(0, |ids| ids.len() as u64))
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RevisionCategory, RevisionType};

    fn row(recipe_id: RecipeId, user_id: UserId, entity_id: i64) -> NewRecipeRevision {
        NewRecipeRevision {
            recipe_id,
            user_id,
            category: RevisionCategory::Ingredient,
            revision_type: RevisionType::Remove,
            entity_id,
            previous_data: format!(r#"{{"ingredientId":{entity_id}}}"#),
            new_data: "null".to_string(),
            change_comment: None,
        }
    }

    #[test]
    fn commit_to_unknown_recipe_writes_nothing() {
        let mut store = MemoryRevisionStore::new();
        let user = UserId::now_v7();
        let recipe = store.create_recipe(user, "Bread").unwrap();

        let err = store
            .commit(recipe, None, &[row(recipe, user, 1), row(99, user, 2)])
            .unwrap_err();
        assert!(matches!(err, PersistError::MissingRecipe(99)));
        assert_eq!(store.revision_count(), 0);
    }

    #[test]
    fn delete_cascades_revisions() {
        let mut store = MemoryRevisionStore::new();
        let user = UserId::now_v7();
        let recipe = store.create_recipe(user, "Soup").unwrap();
        assert_eq!(store.recipe(recipe), Some((user, "Soup")));
        store.commit(recipe, None, &[row(recipe, user, 1), row(recipe, user, 2)]).unwrap();
        assert_eq!(store.count_revisions(recipe).unwrap(), 2);

        assert!(store.delete_recipe(recipe).unwrap());
        assert_eq!(store.revision_count(), 0);
        assert!(!store.recipe_exists(recipe).unwrap());
        assert!(!store.delete_recipe(recipe).unwrap());
    }

    #[test]
    fn reads_are_newest_first_and_filtered() {
        let mut store = MemoryRevisionStore::new();
        let user = UserId::now_v7();
        let other = UserId::now_v7();
        let recipe = store.create_recipe(user, "Cake").unwrap();
        store.commit(recipe, None, &[row(recipe, user, 1)]).unwrap();
        store.commit(recipe, None, &[row(recipe, other, 2)]).unwrap();

        let all = store.load_revisions(&RevisionQuery::for_recipe(recipe)).unwrap();
        assert_eq!(all.iter().map(|r| r.entity_id).collect::<Vec<_>>(), vec![2, 1]);

        let mine = store
            .load_revisions(&RevisionQuery::for_recipe(recipe).author(user))
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].entity_id, 1);

        let latest = store
            .load_revisions(&RevisionQuery::for_recipe(recipe).limit(1))
            .unwrap();
        assert_eq!(latest[0].entity_id, 2);
    }
}
