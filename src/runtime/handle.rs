use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tracing::debug;

use crate::{
    history::{HistoryError, RecordedRevision, RevisionHistory, RevisionsResponse},
    persist::{RevisionQuery, RevisionStore},
    revision::RevisionRecord,
    snapshot::{IngredientSnapshot, StepSnapshot},
    types::{IngredientId, RecipeId, RevisionId, StepId, UserId},
};

use super::events::RevisionEvent;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    History(#[from] HistoryError),

    #[error("blocking task failed: {0}")]
    Join(String),

    #[error("revision tracker is not running")]
    ChannelClosed,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub command_queue_bound: usize,
    pub event_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command_queue_bound: 256,
            event_capacity: 1024,
        }
    }
}

/// Cloneable async front for a [`RevisionHistory`] owned by one task.
///
/// Commands run one at a time in arrival order, so change sets from
/// concurrent callers never interleave.
pub struct RevisionTrackerHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<RevisionEvent>,
}

impl Clone for RevisionTrackerHandle {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T, RuntimeError>>;

enum Command {
    CreateRecipe {
        user_id: UserId,
        title: String,
        resp: Reply<RecipeId>,
    },
    DeleteRecipe {
        recipe_id: RecipeId,
        resp: Reply<()>,
    },
    RecordChange {
        recipe_id: RecipeId,
        user_id: UserId,
        records: Vec<RevisionRecord>,
        comment: Option<String>,
        resp: Reply<Vec<RevisionId>>,
    },
    UpdateIngredients {
        recipe_id: RecipeId,
        user_id: UserId,
        ingredients: Vec<IngredientSnapshot>,
        comment: Option<String>,
        resp: Reply<Vec<RevisionRecord>>,
    },
    UpdateSteps {
        recipe_id: RecipeId,
        user_id: UserId,
        steps: Vec<StepSnapshot>,
        comment: Option<String>,
        resp: Reply<Vec<RevisionRecord>>,
    },
    Query {
        query: RevisionQuery,
        resp: Reply<Vec<RecordedRevision>>,
    },
    RecipeRevisions {
        recipe_id: RecipeId,
        resp: Reply<RevisionsResponse>,
    },
    IngredientRevisions {
        recipe_id: RecipeId,
        ingredient_id: IngredientId,
        resp: Reply<RevisionsResponse>,
    },
    StepRevisions {
        recipe_id: RecipeId,
        step_id: StepId,
        resp: Reply<RevisionsResponse>,
    },
    CountRevisions {
        recipe_id: RecipeId,
        resp: Reply<u64>,
    },
    Shutdown {
        resp: oneshot::Sender<()>,
    },
}

/// Moves `history` onto a runtime task and returns its handle.
///
/// Store calls are blocking, so each command runs on the blocking pool while
/// the task waits for it.
pub fn spawn_revision_tracker<S>(
    history: RevisionHistory<S>,
    config: RuntimeConfig,
) -> RevisionTrackerHandle
where
    S: RevisionStore + 'static,
{
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound.max(1));
    let (events_tx, _) = broadcast::channel::<RevisionEvent>(config.event_capacity.max(1));

    let events_tx_loop = events_tx.clone();
    let history = Arc::new(Mutex::new(history));

    tokio::spawn(async move {
        while let Some(cmd) = cmd_rx.recv().await {
            if handle_command(cmd, &history, &events_tx_loop).await {
                break;
            }
        }
        debug!("revision tracker stopped");
    });

    RevisionTrackerHandle { cmd_tx, events_tx }
}

impl RevisionTrackerHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<RevisionEvent> {
        self.events_tx.subscribe()
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    pub async fn create_recipe(
        &self,
        user_id: UserId,
        title: impl Into<String>,
    ) -> Result<RecipeId, RuntimeError> {
        let title = title.into();
        self.request(|resp| Command::CreateRecipe { user_id, title, resp })
            .await
    }

    pub async fn delete_recipe(&self, recipe_id: RecipeId) -> Result<(), RuntimeError> {
        self.request(|resp| Command::DeleteRecipe { recipe_id, resp })
            .await
    }

    pub async fn record_change(
        &self,
        recipe_id: RecipeId,
        user_id: UserId,
        records: Vec<RevisionRecord>,
        comment: Option<String>,
    ) -> Result<Vec<RevisionId>, RuntimeError> {
        self.request(|resp| Command::RecordChange {
            recipe_id,
            user_id,
            records,
            comment,
            resp,
        })
        .await
    }

    pub async fn update_ingredients(
        &self,
        recipe_id: RecipeId,
        user_id: UserId,
        ingredients: Vec<IngredientSnapshot>,
        comment: Option<String>,
    ) -> Result<Vec<RevisionRecord>, RuntimeError> {
        self.request(|resp| Command::UpdateIngredients {
            recipe_id,
            user_id,
            ingredients,
            comment,
            resp,
        })
        .await
    }

    pub async fn update_steps(
        &self,
        recipe_id: RecipeId,
        user_id: UserId,
        steps: Vec<StepSnapshot>,
        comment: Option<String>,
    ) -> Result<Vec<RevisionRecord>, RuntimeError> {
        self.request(|resp| Command::UpdateSteps {
            recipe_id,
            user_id,
            steps,
            comment,
            resp,
        })
        .await
    }

    pub async fn query(&self, query: RevisionQuery) -> Result<Vec<RecordedRevision>, RuntimeError> {
        self.request(|resp| Command::Query { query, resp }).await
    }

    pub async fn recipe_revisions(
        &self,
        recipe_id: RecipeId,
    ) -> Result<RevisionsResponse, RuntimeError> {
        self.request(|resp| Command::RecipeRevisions { recipe_id, resp })
            .await
    }

    pub async fn ingredient_revisions(
        &self,
        recipe_id: RecipeId,
        ingredient_id: IngredientId,
    ) -> Result<RevisionsResponse, RuntimeError> {
        self.request(|resp| Command::IngredientRevisions {
            recipe_id,
            ingredient_id,
            resp,
        })
        .await
    }

    pub async fn step_revisions(
        &self,
        recipe_id: RecipeId,
        step_id: StepId,
    ) -> Result<RevisionsResponse, RuntimeError> {
        self.request(|resp| Command::StepRevisions {
            recipe_id,
            step_id,
            resp,
        })
        .await
    }

    pub async fn count_revisions(&self, recipe_id: RecipeId) -> Result<u64, RuntimeError> {
        self.request(|resp| Command::CountRevisions { recipe_id, resp })
            .await
    }

    /// Stops the tracker after commands already queued have run.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::Shutdown { resp: tx })
            .await
            .map_err(|_| RuntimeError::ChannelClosed)?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }
}

async fn handle_command<S>(
    cmd: Command,
    history: &Arc<Mutex<RevisionHistory<S>>>,
    events_tx: &broadcast::Sender<RevisionEvent>,
) -> bool
where
    S: RevisionStore + 'static,
{
    match cmd {
        Command::CreateRecipe { user_id, title, resp } => {
            let res = run_blocking(history, move |h| h.create_recipe(user_id, &title)).await;
            if let Ok(recipe_id) = res {
                let _ = events_tx.send(RevisionEvent::RecipeCreated { recipe_id });
            }
            let _ = resp.send(res);
        }
        Command::DeleteRecipe { recipe_id, resp } => {
            let res = run_blocking(history, move |h| h.delete_recipe(recipe_id)).await;
            if res.is_ok() {
                let _ = events_tx.send(RevisionEvent::RecipeDeleted { recipe_id });
            }
            let _ = resp.send(res);
        }
        Command::RecordChange {
            recipe_id,
            user_id,
            records,
            comment,
            resp,
        } => {
            let res = run_blocking(history, move |h| {
                h.record_change(recipe_id, user_id, &records, comment.as_deref())
            })
            .await;
            if let Ok(ids) = &res {
                notify_recorded(events_tx, recipe_id, ids.len());
            }
            let _ = resp.send(res);
        }
        Command::UpdateIngredients {
            recipe_id,
            user_id,
            ingredients,
            comment,
            resp,
        } => {
            let res = run_blocking(history, move |h| {
                h.update_ingredients(recipe_id, user_id, ingredients, comment.as_deref())
            })
            .await;
            if let Ok(records) = &res {
                notify_recorded(events_tx, recipe_id, records.len());
            }
            let _ = resp.send(res);
        }
        Command::UpdateSteps {
            recipe_id,
            user_id,
            steps,
            comment,
            resp,
        } => {
            let res = run_blocking(history, move |h| {
                h.update_steps(recipe_id, user_id, steps, comment.as_deref())
            })
            .await;
            if let Ok(records) = &res {
                notify_recorded(events_tx, recipe_id, records.len());
            }
            let _ = resp.send(res);
        }
        Command::Query { query, resp } => {
            let _ = resp.send(run_blocking(history, move |h| h.query(&query)).await);
        }
        Command::RecipeRevisions { recipe_id, resp } => {
            let _ = resp.send(run_blocking(history, move |h| h.recipe_revisions(recipe_id)).await);
        }
        Command::IngredientRevisions {
            recipe_id,
            ingredient_id,
            resp,
        } => {
            let res = run_blocking(history, move |h| {
                h.ingredient_revisions(recipe_id, ingredient_id)
            })
            .await;
            let _ = resp.send(res);
        }
        Command::StepRevisions {
            recipe_id,
            step_id,
            resp,
        } => {
            let res = run_blocking(history, move |h| h.step_revisions(recipe_id, step_id)).await;
            let _ = resp.send(res);
        }
        Command::CountRevisions { recipe_id, resp } => {
            let _ = resp.send(run_blocking(history, move |h| h.count_revisions(recipe_id)).await);
        }
        Command::Shutdown { resp } => {
            let _ = resp.send(());
            return true;
        }
    }

    false
}

fn notify_recorded(
    events_tx: &broadcast::Sender<RevisionEvent>,
    recipe_id: RecipeId,
    revisions: usize,
) {
    if revisions > 0 {
        let _ = events_tx.send(RevisionEvent::Recorded {
            recipe_id,
            revisions,
        });
    }
}

async fn run_blocking<S, T, F>(
    history: &Arc<Mutex<RevisionHistory<S>>>,
    f: F,
) -> Result<T, RuntimeError>
where
    S: RevisionStore + 'static,
    T: Send + 'static,
    F: FnOnce(&mut RevisionHistory<S>) -> Result<T, HistoryError> + Send + 'static,
{
    let history = Arc::clone(history);
    let res = tokio::task::spawn_blocking(move || {
        let mut history = history.blocking_lock();
        f(&mut history)
    })
    .await
    .map_err(|e| RuntimeError::Join(e.to_string()))?;
    res.map_err(RuntimeError::from)
}
