use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use uuid::Uuid;

use recipe_revisions::{
    core::store::MemoryRevisionStore,
    history::{HistoryError, ResourceNotFound, RevisionHistory},
    persist::{PersistResult, RecipeMutation, RevisionQuery, RevisionStore},
    revision::{
        FieldValue, IngredientRemoveRevision, NewRecipeRevision, RecipeRevision, RevisionRecord,
        StepAddRevision, StepUpdateRevision,
    },
    snapshot::{IngredientSnapshot, StepSnapshot},
    types::{RecipeId, RevisionId, StepField, UserId},
};

/// Counts revision reads made against the wrapped store.
struct CountingStore {
    inner: MemoryRevisionStore,
    revision_reads: Arc<AtomicUsize>,
}

impl RevisionStore for CountingStore {
    fn create_recipe(&mut self, user_id: UserId, title: &str) -> PersistResult<RecipeId> {
        self.inner.create_recipe(user_id, title)
    }

    fn delete_recipe(&mut self, recipe_id: RecipeId) -> PersistResult<bool> {
        self.inner.delete_recipe(recipe_id)
    }

    fn recipe_exists(&self, recipe_id: RecipeId) -> PersistResult<bool> {
        self.inner.recipe_exists(recipe_id)
    }

    fn load_ingredients(&self, recipe_id: RecipeId) -> PersistResult<Vec<IngredientSnapshot>> {
        self.inner.load_ingredients(recipe_id)
    }

    fn load_steps(&self, recipe_id: RecipeId) -> PersistResult<Vec<StepSnapshot>> {
        self.inner.load_steps(recipe_id)
    }

    fn commit(
        &mut self,
        recipe_id: RecipeId,
        mutation: Option<&RecipeMutation>,
        rows: &[NewRecipeRevision],
    ) -> PersistResult<Vec<RevisionId>> {
        self.inner.commit(recipe_id, mutation, rows)
    }

    fn load_revisions(&self, query: &RevisionQuery) -> PersistResult<Vec<RecipeRevision>> {
        self.revision_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.load_revisions(query)
    }

    fn count_revisions(&self, recipe_id: RecipeId) -> PersistResult<u64> {
        self.revision_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.count_revisions(recipe_id)
    }
}

fn counting_history() -> (RevisionHistory<CountingStore>, Arc<AtomicUsize>) {
    let reads = Arc::new(AtomicUsize::new(0));
    let store = CountingStore {
        inner: MemoryRevisionStore::new(),
        revision_reads: Arc::clone(&reads),
    };
    (RevisionHistory::new(store), reads)
}

fn blank_step() -> RevisionRecord {
    StepAddRevision {
        step_id: Some(1),
        step_number: Some(1),
        instruction: "   ".to_string(),
        optional: Some(false),
        timer_seconds: None,
    }
    .into()
}

#[test]
fn missing_recipe_fails_before_any_revision_read() {
    let (history, reads) = counting_history();

    let err = history.get_history(42, None, None).expect_err("not found");
    assert!(matches!(
        err,
        HistoryError::NotFound(ResourceNotFound { resource: "recipe", id: 42 })
    ));
    assert!(history.recipe_revisions(42).is_err());
    assert!(history.ingredient_revisions(42, 1).is_err());
    assert!(history.step_revisions(42, 1).is_err());
    assert!(history.count_revisions(42).is_err());
    assert!(history.latest_revision(42).is_err());

    assert_eq!(reads.load(Ordering::SeqCst), 0);
}

#[test]
fn missing_sub_entity_is_not_found() {
    let (mut history, reads) = counting_history();
    let user = Uuid::now_v7();
    let recipe = history.create_recipe(user, "Omelette").expect("create");

    let err = history.ingredient_revisions(recipe, 9).expect_err("no ingredient");
    assert!(matches!(
        err,
        HistoryError::NotFound(ResourceNotFound { resource: "ingredient", id: 9 })
    ));
    let err = history.step_revisions(recipe, 3).expect_err("no step");
    assert!(matches!(
        err,
        HistoryError::NotFound(ResourceNotFound { resource: "step", id: 3 })
    ));
    assert_eq!(reads.load(Ordering::SeqCst), 0);
}

#[test]
fn blank_instruction_rejects_batch() {
    let (mut history, _) = counting_history();
    let user = Uuid::now_v7();
    let recipe = history.create_recipe(user, "Risotto").expect("create");

    let remove: RevisionRecord = IngredientRemoveRevision {
        ingredient_id: Some(3),
        ingredient_name: None,
    }
    .into();
    assert!(!blank_step().is_valid());

    let err = history
        .record_change(recipe, user, &[remove, blank_step()], None)
        .expect_err("invalid");
    assert!(matches!(err, HistoryError::InvalidRevision { index: 1, .. }));
    assert_eq!(history.store().inner.revision_count(), 0);
}

#[test]
fn value_of_the_wrong_kind_is_never_stored() {
    let (mut history, _) = counting_history();
    let user = Uuid::now_v7();
    let recipe = history.create_recipe(user, "Flatbread").expect("create");

    let mismatched: RevisionRecord = StepUpdateRevision::new(
        1,
        1,
        StepField::OptionalStatus,
        FieldValue::Text("no".to_string()),
        FieldValue::Text("yes".to_string()),
    )
    .into();
    let err = history
        .record_change(recipe, user, &[mismatched], None)
        .expect_err("invalid");
    assert!(matches!(err, HistoryError::InvalidRevision { index: 0, .. }));

    assert!(history.get_history(recipe, None, None).expect("readable").is_empty());
}

#[test]
fn blank_step_snapshot_is_rejected_with_its_list() {
    let (mut history, _) = counting_history();
    let user = Uuid::now_v7();
    let recipe = history.create_recipe(user, "Risotto").expect("create");

    let err = history
        .update_steps(
            recipe,
            user,
            vec![StepSnapshot::new(1, 1, "Toast rice"), StepSnapshot::new(2, 2, "")],
            None,
        )
        .expect_err("invalid");
    assert!(matches!(err, HistoryError::InvalidRevision { .. }));
    assert!(history.store().load_steps(recipe).expect("steps").is_empty());
}

#[test]
fn writes_to_unknown_recipe_are_not_found() {
    let (mut history, _) = counting_history();
    let user = Uuid::now_v7();
    let err = history
        .update_ingredients(7, user, vec![IngredientSnapshot::new(1, "Egg")], None)
        .expect_err("not found");
    assert_eq!(err.status_code(), 404);
    let remove: RevisionRecord = IngredientRemoveRevision {
        ingredient_id: Some(1),
        ingredient_name: None,
    }
    .into();
    assert!(matches!(
        history.record_change(7, user, &[remove], None),
        Err(HistoryError::NotFound(_))
    ));
}

#[test]
fn duplicate_snapshot_ids_keep_last_entry() {
    let (mut history, _) = counting_history();
    let user = Uuid::now_v7();
    let recipe = history.create_recipe(user, "Chili").expect("create");

    let records = history
        .update_ingredients(
            recipe,
            user,
            vec![
                IngredientSnapshot::new(1, "Beans"),
                IngredientSnapshot::new(1, "Kidney beans"),
            ],
            None,
        )
        .expect("update");
    assert_eq!(records.len(), 1);
    let stored = history.store().load_ingredients(recipe).expect("load");
    assert_eq!(stored, vec![IngredientSnapshot::new(1, "Kidney beans")]);
}
