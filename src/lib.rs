//! Typed revision history for recipe ingredients and steps, stored in SQLite.
//!
//! # Examples
//!
//! Recording and reading back a change set with
//! [`core::store::MemoryRevisionStore`]:
//! ```
//! use recipe_revisions::{
//!     core::store::MemoryRevisionStore,
//!     history::RevisionHistory,
//!     snapshot::IngredientSnapshot,
//!     types::RevisionType,
//! };
//!
//! let mut history = RevisionHistory::new(MemoryRevisionStore::new());
//! let user = uuid::Uuid::now_v7();
//! let recipe = history.create_recipe(user, "Bread").expect("create");
//!
//! let records = history
//!     .update_ingredients(recipe, user, vec![IngredientSnapshot::new(1, "Flour")], None)
//!     .expect("update");
//! assert_eq!(records[0].revision_type(), RevisionType::Add);
//!
//! let response = history.recipe_revisions(recipe).expect("history");
//! assert_eq!(response.total_count, 1);
//! ```
//!
//! Runtime usage with the SQLite store:
//! ```no_run
//! use recipe_revisions::{
//!     history::RevisionHistory,
//!     persist::sqlite::SqliteRevisionStore,
//!     runtime::handle::{spawn_revision_tracker, RuntimeConfig},
//!     snapshot::StepSnapshot,
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = SqliteRevisionStore::open("recipes.db").expect("open sqlite");
//! let handle = spawn_revision_tracker(RevisionHistory::new(store), RuntimeConfig::default());
//! let user = uuid::Uuid::now_v7();
//! let recipe = handle.create_recipe(user, "Bread").await.expect("create");
//! handle
//!     .update_steps(recipe, user, vec![StepSnapshot::new(1, 1, "Knead")], None)
//!     .await
//!     .expect("update");
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```

/// Text encoding of revision records and stored pairs.
pub mod codec;
/// In-memory store and index helpers.
pub mod core;
/// Snapshot diffing.
pub mod engine;
/// Revision history service.
pub mod history;
/// Persistence abstraction and SQLite implementation.
pub mod persist;
/// Typed revision records and stored row types.
pub mod revision;
/// Single-writer runtime handle and events.
pub mod runtime;
/// Ingredient and step snapshots.
pub mod snapshot;
/// Shared primitive types and enums.
pub mod types;
