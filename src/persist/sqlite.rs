//! SQLite-backed recipe and revision store.

use std::path::Path;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension, Transaction, params, params_from_iter};
use rust_decimal::Decimal;
use tracing::debug;

use crate::{
    revision::{NewRecipeRevision, RecipeRevision},
    snapshot::{IngredientSnapshot, StepSnapshot},
    types::{IngredientUnit, RecipeId, RevisionId, UserId},
};

use super::{PersistError, PersistResult, RecipeMutation, RevisionQuery, RevisionStore};

const REVISION_COLUMNS: &str = "\
    revision_id, recipe_id, user_id, revision_category, revision_type, \
    entity_id, previous_data, new_data, change_comment, created_at";

/// SQLite implementation of [`crate::persist::RevisionStore`].
pub struct SqliteRevisionStore {
    conn: Connection,
}

impl SqliteRevisionStore {
    /// Opens or creates a store at `path`.
    ///
    /// Enables foreign keys (revisions cascade with their recipe), WAL mode
    /// and `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        let conn = Connection::open(path)?;
        Self::init_connection(conn)
    }

    /// Opens an in-memory store.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn)
    }

    fn init_connection(conn: Connection) -> PersistResult<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.execute_batch(include_str!("schema.sql"))?;
        Ok(Self { conn })
    }

    fn replace_ingredients(
        tx: &Transaction<'_>,
        recipe_id: RecipeId,
        ingredients: &[IngredientSnapshot],
    ) -> PersistResult<()> {
        tx.execute(
            "DELETE FROM recipe_ingredients WHERE recipe_id = ?1",
            params![recipe_id],
        )?;
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO recipe_ingredients \
             (recipe_id, ingredient_id, position, name, quantity, unit, is_optional, notes) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for (position, ing) in ingredients.iter().enumerate() {
            stmt.execute(params![
                recipe_id,
                ing.ingredient_id,
                position as i64,
                ing.name,
                ing.quantity.map(|q| q.to_string()),
                ing.unit.map(|u| u.as_str()),
                ing.is_optional,
                ing.notes,
            ])?;
        }
        Ok(())
    }

    fn replace_steps(
        tx: &Transaction<'_>,
        recipe_id: RecipeId,
        steps: &[StepSnapshot],
    ) -> PersistResult<()> {
        tx.execute("DELETE FROM recipe_steps WHERE recipe_id = ?1", params![recipe_id])?;
        let mut stmt = tx.prepare(
            "INSERT OR REPLACE INTO recipe_steps \
             (recipe_id, step_id, position, step_number, instruction, optional, timer_seconds) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for (position, step) in steps.iter().enumerate() {
            stmt.execute(params![
                recipe_id,
                step.step_id,
                position as i64,
                step.step_number,
                step.instruction,
                step.optional,
                step.timer_seconds,
            ])?;
        }
        Ok(())
    }
}

struct RawRevision {
    revision_id: i64,
    recipe_id: i64,
    user_id: String,
    category: String,
    revision_type: String,
    entity_id: i64,
    previous_data: String,
    new_data: String,
    change_comment: Option<String>,
    created_at: i64,
}

impl RawRevision {
    fn into_row(self) -> PersistResult<RecipeRevision> {
        Ok(RecipeRevision {
            revision_id: self.revision_id,
            recipe_id: self.recipe_id,
            user_id: parse_user_id(&self.user_id)?,
            category: self.category,
            revision_type: self.revision_type,
            entity_id: self.entity_id,
            previous_data: self.previous_data,
            new_data: self.new_data,
            change_comment: self.change_comment,
            created_at_ms: self.created_at as u64,
        })
    }
}

impl RevisionStore for SqliteRevisionStore {
    fn create_recipe(&mut self, user_id: UserId, title: &str) -> PersistResult<RecipeId> {
        self.conn.execute(
            "INSERT INTO recipes(user_id, title, created_at) VALUES (?1, ?2, ?3)",
            params![user_id.to_string(), title, now_ms() as i64],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn delete_recipe(&mut self, recipe_id: RecipeId) -> PersistResult<bool> {
        let count = self
            .conn
            .execute("DELETE FROM recipes WHERE recipe_id = ?1", params![recipe_id])?;
        Ok(count > 0)
    }

    fn recipe_exists(&self, recipe_id: RecipeId) -> PersistResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM recipes WHERE recipe_id = ?1",
                params![recipe_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn load_ingredients(&self, recipe_id: RecipeId) -> PersistResult<Vec<IngredientSnapshot>> {
        let mut stmt = self.conn.prepare(
            "SELECT ingredient_id, name, quantity, unit, is_optional, notes \
             FROM recipe_ingredients WHERE recipe_id = ?1 ORDER BY position ASC",
        )?;
        let rows = stmt.query_map(params![recipe_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, bool>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (ingredient_id, name, quantity, unit, is_optional, notes) = row?;
            let quantity = quantity
                .map(|q| {
                    Decimal::from_str(&q).map_err(|_| PersistError::Corrupt {
                        column: "quantity",
                        value: q,
                    })
                })
                .transpose()?;
            let unit = unit
                .map(|u| {
                    IngredientUnit::parse(&u).ok_or(PersistError::Corrupt {
                        column: "unit",
                        value: u,
                    })
                })
                .transpose()?;
            out.push(IngredientSnapshot {
                ingredient_id,
                name,
                quantity,
                unit,
                is_optional,
                notes,
            });
        }
        Ok(out)
    }

    fn load_steps(&self, recipe_id: RecipeId) -> PersistResult<Vec<StepSnapshot>> {
        let mut stmt = self.conn.prepare(
            "SELECT step_id, step_number, instruction, optional, timer_seconds \
             FROM recipe_steps WHERE recipe_id = ?1 ORDER BY position ASC",
        )?;
        let rows = stmt.query_map(params![recipe_id], |row| {
            Ok(StepSnapshot {
                step_id: row.get(0)?,
                step_number: row.get(1)?,
                instruction: row.get(2)?,
                optional: row.get(3)?,
                timer_seconds: row.get(4)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn commit(
        &mut self,
        recipe_id: RecipeId,
        mutation: Option<&RecipeMutation>,
        rows: &[NewRecipeRevision],
    ) -> PersistResult<Vec<RevisionId>> {
        // Dropping `tx` on any early return rolls everything back.
        let tx = self.conn.transaction()?;

        let exists: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM recipes WHERE recipe_id = ?1",
                params![recipe_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(PersistError::MissingRecipe(recipe_id));
        }

        match mutation {
            Some(RecipeMutation::ReplaceIngredients(list)) => {
                Self::replace_ingredients(&tx, recipe_id, list)?
            }
            Some(RecipeMutation::ReplaceSteps(list)) => Self::replace_steps(&tx, recipe_id, list)?,
            None => {}
        }

        // Never older than the recipe's newest row, so a clock stepping back
        // cannot reorder history.
        let newest: i64 = tx.query_row(
            "SELECT COALESCE(MAX(created_at), 0) FROM recipe_revisions WHERE recipe_id = ?1",
            params![recipe_id],
            |row| row.get(0),
        )?;
        let created_at = (now_ms() as i64).max(newest);
        let mut ids = Vec::with_capacity(rows.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO recipe_revisions \
                 (recipe_id, user_id, revision_category, revision_type, entity_id, \
                  previous_data, new_data, change_comment, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for row in rows {
                let id = stmt.insert(params![
                    row.recipe_id,
                    row.user_id.to_string(),
                    row.category.as_str(),
                    row.revision_type.as_str(),
                    row.entity_id,
                    row.previous_data,
                    row.new_data,
                    row.change_comment,
                    created_at,
                ])?;
                ids.push(id);
            }
        }
        tx.commit()?;

        debug!(recipe_id, rows = ids.len(), "committed revision batch");
        Ok(ids)
    }

    fn load_revisions(&self, query: &RevisionQuery) -> PersistResult<Vec<RecipeRevision>> {
        let mut sql = format!("SELECT {REVISION_COLUMNS} FROM recipe_revisions WHERE recipe_id = ?1");
        let mut args: Vec<rusqlite::types::Value> = vec![query.recipe_id.into()];

        if let Some(category) = query.category {
            args.push(category.as_str().to_string().into());
            sql.push_str(&format!(" AND revision_category = ?{}", args.len()));
        }
        if let Some(entity_id) = query.entity_id {
            args.push(entity_id.into());
            sql.push_str(&format!(" AND entity_id = ?{}", args.len()));
        }
        if let Some(revision_type) = query.revision_type {
            args.push(revision_type.as_str().to_string().into());
            sql.push_str(&format!(" AND revision_type = ?{}", args.len()));
        }
        if let Some(user_id) = query.user_id {
            args.push(user_id.to_string().into());
            sql.push_str(&format!(" AND user_id = ?{}", args.len()));
        }
        sql.push_str(" ORDER BY created_at DESC, revision_id DESC");
        if let Some(limit) = query.limit {
            args.push((limit as i64).into());
            sql.push_str(&format!(" LIMIT ?{}", args.len()));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
            Ok(RawRevision {
                revision_id: row.get(0)?,
                recipe_id: row.get(1)?,
                user_id: row.get(2)?,
                category: row.get(3)?,
                revision_type: row.get(4)?,
                entity_id: row.get(5)?,
                previous_data: row.get(6)?,
                new_data: row.get(7)?,
                change_comment: row.get(8)?,
                created_at: row.get(9)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            out.push(row?.into_row()?);
        }
        Ok(out)
    }

    fn count_revisions(&self, recipe_id: RecipeId) -> PersistResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM recipe_revisions WHERE recipe_id = ?1",
            params![recipe_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

fn parse_user_id(value: &str) -> PersistResult<UserId> {
    UserId::parse_str(value).map_err(|_| PersistError::Corrupt {
        column: "user_id",
        value: value.to_string(),
    })
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
