//! High-level store API: the task ordering engine and the hierarchy around it.

use crate::config::Config;
use crate::id::{BOARD_PREFIX, COLUMN_PREFIX, PROJECT_PREFIX, TASK_PREFIX, generate_id};
use crate::ordering::{self, Slot};
use crate::storage::{self, Storage};
use crate::types::{
    Action, Activity, Board, Column, MAX_NAME_LEN, Member, Priority, Project, Role, Task, ValidationError,
    validate_text,
};
use chrono::Utc;
use eyre::{Context, Result};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("board not found: {0}")]
    BoardNotFound(String),

    #[error("column not found: {0}")]
    ColumnNotFound(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// The destination column lives in another project.
    #[error("cannot move task {task_id} from project {source_project} into project {destination_project}")]
    CrossProjectMove {
        task_id: String,
        source_project: String,
        destination_project: String,
    },

    #[error("invalid order {0}: must be non-negative")]
    InvalidOrder(i64),

    #[error("column '{name}' already exists on board {board_id}")]
    DuplicateColumn { board_id: String, name: String },

    /// The database stayed locked through every retry.
    #[error("concurrency conflict: gave up after {attempts} attempt(s)")]
    ConcurrencyConflict { attempts: u32 },

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl StoreError {
    /// Find a `StoreError` anywhere in a report's chain.
    pub fn find(err: &eyre::Report) -> Option<&StoreError> {
        err.chain().find_map(|cause| cause.downcast_ref::<StoreError>())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::ProjectNotFound(_)
                | StoreError::BoardNotFound(_)
                | StoreError::ColumnNotFound(_)
                | StoreError::TaskNotFound(_)
        )
    }
}

/// Result of a successful move.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoveOutcome {
    /// The task after the move
    pub task: Task,

    pub source_column_id: String,

    pub source_order: u32,

    pub source_board_id: String,

    pub destination_board_id: String,

    /// False when the move left every order untouched
    pub changed: bool,
}

/// A column whose task orders are not dense.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnReport {
    pub column_id: String,
    pub orders: Vec<u32>,
}

/// The main store.
pub struct Store {
    storage: Storage,
    config: Config,
}

impl Store {
    /// Initialize a new store in the given directory.
    pub fn init(root: &Path) -> Result<Self> {
        let config = Config::load(root)?;
        Self::init_with_config(root, config)
    }

    /// Initialize a new store with explicit configuration.
    pub fn init_with_config(root: &Path, config: Config) -> Result<Self> {
        let storage = Storage::init(root, &config)?;
        Ok(Self { storage, config })
    }

    /// Open an existing store.
    pub fn open(root: &Path) -> Result<Self> {
        let config = Config::load(root)?;
        Self::open_with_config(root, config)
    }

    /// Open an existing store with explicit configuration.
    pub fn open_with_config(root: &Path, config: Config) -> Result<Self> {
        let storage = Storage::open(root, &config)?;
        Ok(Self { storage, config })
    }

    pub fn root(&self) -> &Path {
        self.storage.root()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run a write operation, retrying from scratch while the database is busy.
    fn with_retry<T>(&mut self, op: &str, mut f: impl FnMut(&mut Storage) -> Result<T>) -> Result<T> {
        let attempts = self.config.max_retries + 1;
        for attempt in 1..=attempts {
            match f(&mut self.storage) {
                Err(e) if storage::is_busy(&e) => {
                    log::warn!("{} hit a concurrency conflict (attempt {}/{})", op, attempt, attempts);
                }
                other => return other,
            }
        }
        Err(eyre::eyre!(StoreError::ConcurrencyConflict { attempts }))
    }

    // =========================================================================
    // Projects, members, boards, columns
    // =========================================================================

    /// Create a project; `owner` becomes its first member.
    pub fn create_project(&mut self, name: &str, description: Option<&str>, owner: &str) -> Result<Project> {
        validate_text("project name", name, MAX_NAME_LEN).map_err(|e| eyre::eyre!(StoreError::Validation(e)))?;
        validate_text("user", owner, MAX_NAME_LEN).map_err(|e| eyre::eyre!(StoreError::Validation(e)))?;

        let now = Utc::now();
        let project = Project {
            id: generate_id(PROJECT_PREFIX, name, now),
            name: name.to_string(),
            description: description.map(String::from),
            created_at: now,
        };
        let member = Member {
            project_id: project.id.clone(),
            user: owner.to_string(),
            role: Role::Owner,
            joined_at: now,
        };

        self.with_retry("create_project", |storage| {
            storage.immediate(|tx| {
                storage::insert_project(tx, &project)?;
                storage::upsert_member(tx, &member)
            })
        })
        .context("Failed to persist project")?;

        log::info!("Created project {} ({})", project.id, project.name);
        Ok(project)
    }

    pub fn get_project(&self, id: &str) -> Result<Option<Project>> {
        storage::get_project(self.storage.conn(), id)
    }

    /// Add a member or change an existing member's role.
    pub fn add_member(&mut self, project_id: &str, user: &str, role: Role) -> Result<Member> {
        validate_text("user", user, MAX_NAME_LEN).map_err(|e| eyre::eyre!(StoreError::Validation(e)))?;

        let member = Member {
            project_id: project_id.to_string(),
            user: user.to_string(),
            role,
            joined_at: Utc::now(),
        };

        self.with_retry("add_member", |storage| {
            storage.immediate(|tx| {
                if storage::get_project(tx, project_id)?.is_none() {
                    return Err(eyre::eyre!(StoreError::ProjectNotFound(project_id.to_string())));
                }
                storage::upsert_member(tx, &member)
            })
        })?;

        Ok(member)
    }

    pub fn member(&self, project_id: &str, user: &str) -> Result<Option<Member>> {
        storage::get_member(self.storage.conn(), project_id, user)
    }

    pub fn members(&self, project_id: &str) -> Result<Vec<Member>> {
        storage::list_members(self.storage.conn(), project_id)
    }

    pub fn create_board(&mut self, project_id: &str, name: &str) -> Result<Board> {
        validate_text("board name", name, MAX_NAME_LEN).map_err(|e| eyre::eyre!(StoreError::Validation(e)))?;

        let now = Utc::now();
        let board = Board {
            id: generate_id(BOARD_PREFIX, name, now),
            project_id: project_id.to_string(),
            name: name.to_string(),
            created_at: now,
        };

        self.with_retry("create_board", |storage| {
            storage.immediate(|tx| {
                if storage::get_project(tx, project_id)?.is_none() {
                    return Err(eyre::eyre!(StoreError::ProjectNotFound(project_id.to_string())));
                }
                storage::insert_board(tx, &board)
            })
        })?;

        Ok(board)
    }

    pub fn get_board(&self, id: &str) -> Result<Option<Board>> {
        storage::get_board(self.storage.conn(), id)
    }

    /// Create a column, appended after the board's existing columns.
    pub fn create_column(&mut self, board_id: &str, name: &str, wip_limit: Option<u32>) -> Result<Column> {
        let now = Utc::now();
        let draft = Column {
            id: generate_id(COLUMN_PREFIX, name, now),
            board_id: board_id.to_string(),
            name: name.to_string(),
            order: 0,
            wip_limit,
            created_at: now,
        };
        draft.validate().map_err(|e| eyre::eyre!(StoreError::Validation(e)))?;

        self.with_retry("create_column", |storage| {
            storage.immediate(|tx| {
                if storage::get_board(tx, board_id)?.is_none() {
                    return Err(eyre::eyre!(StoreError::BoardNotFound(board_id.to_string())));
                }
                if storage::column_name_exists(tx, board_id, name)? {
                    return Err(eyre::eyre!(StoreError::DuplicateColumn {
                        board_id: board_id.to_string(),
                        name: name.to_string(),
                    }));
                }
                let column = Column {
                    order: ordering::next_order(&storage::column_slots(tx, board_id)?),
                    ..draft.clone()
                };
                storage::insert_column(tx, &column)?;
                Ok(column)
            })
        })
    }

    pub fn get_column(&self, id: &str) -> Result<Option<Column>> {
        storage::get_column(self.storage.conn(), id)
    }

    /// Columns of a board in display order.
    pub fn columns(&self, board_id: &str) -> Result<Vec<Column>> {
        storage::list_columns(self.storage.conn(), board_id)
    }

    /// Project owning a column.
    pub fn project_of_column(&self, column_id: &str) -> Result<Option<String>> {
        storage::column_project_id(self.storage.conn(), column_id)
    }

    /// Project owning a task.
    pub fn project_of_task(&self, task_id: &str) -> Result<Option<String>> {
        match storage::get_task(self.storage.conn(), task_id)? {
            Some(task) => self.project_of_column(&task.column_id),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Task ordering engine
    // =========================================================================

    /// Create a task placed last in its column.
    pub fn create_task(
        &mut self,
        column_id: &str,
        title: &str,
        description: Option<&str>,
        priority: Priority,
    ) -> Result<Task> {
        let now = Utc::now();
        let draft = Task {
            id: generate_id(TASK_PREFIX, title, now),
            column_id: column_id.to_string(),
            order: 0,
            title: title.to_string(),
            description: description.map(String::from),
            priority,
            created_at: now,
            updated_at: now,
        };
        draft.validate().map_err(|e| eyre::eyre!(StoreError::Validation(e)))?;

        let task = self.with_retry("create_task", |storage| {
            storage.immediate(|tx| {
                if storage::get_column(tx, column_id)?.is_none() {
                    return Err(eyre::eyre!(StoreError::ColumnNotFound(column_id.to_string())));
                }
                let task = Task {
                    order: ordering::next_order(&storage::task_slots(tx, column_id)?),
                    ..draft.clone()
                };
                storage::insert_task(tx, &task)?;
                Ok(task)
            })
        })?;

        log::debug!("Created task {} at {}[{}]", task.id, task.column_id, task.order);
        Ok(task)
    }

    pub fn get_task(&self, id: &str) -> Result<Option<Task>> {
        storage::get_task(self.storage.conn(), id)
    }

    /// Tasks of a column in order.
    pub fn list_tasks(&self, column_id: &str) -> Result<Vec<Task>> {
        storage::list_tasks(self.storage.conn(), column_id)
    }

    /// Move a task to `destination_order` in `destination_column_id`.
    ///
    /// Orders past the end of the destination column are clamped to the end.
    /// Both the destination and the source column are dense afterwards.
    pub fn move_task(
        &mut self,
        task_id: &str,
        destination_column_id: &str,
        destination_order: i64,
    ) -> Result<MoveOutcome> {
        if destination_order < 0 {
            return Err(eyre::eyre!(StoreError::InvalidOrder(destination_order)));
        }
        let requested = u32::try_from(destination_order).unwrap_or(u32::MAX);

        let outcome = self.with_retry("move_task", |storage| {
            storage.immediate(|tx| move_in_tx(tx, task_id, destination_column_id, requested))
        })?;

        if outcome.changed {
            log::info!(
                "Moved task {} from {}[{}] to {}[{}]",
                outcome.task.id,
                outcome.source_column_id,
                outcome.source_order,
                outcome.task.column_id,
                outcome.task.order
            );
        }
        Ok(outcome)
    }

    /// Delete a task and close the gap it leaves.
    pub fn delete_task(&mut self, task_id: &str) -> Result<Task> {
        let task = self.with_retry("delete_task", |storage| {
            storage.immediate(|tx| {
                let task = storage::get_task(tx, task_id)?
                    .ok_or_else(|| eyre::eyre!(StoreError::TaskNotFound(task_id.to_string())))?;
                storage::delete_task_row(tx, task_id)?;
                compact_in_tx(tx, &task.column_id)?;
                Ok(task)
            })
        })?;

        log::info!("Deleted task {} from {}", task.id, task.column_id);
        Ok(task)
    }

    /// Columns whose task orders are not dense.
    pub fn verify(&self) -> Result<Vec<ColumnReport>> {
        let conn = self.storage.conn();
        let mut reports = Vec::new();
        for column_id in storage::all_column_ids(conn)? {
            let mut slots = storage::task_slots(conn, &column_id)?;
            if !ordering::is_dense(slots.iter().map(|s| s.order)) {
                ordering::sort_slots(&mut slots);
                reports.push(ColumnReport {
                    column_id,
                    orders: slots.iter().map(|s| s.order).collect(),
                });
            }
        }
        Ok(reports)
    }

    /// Renumber a column densely, breaking ties by creation time.
    /// Returns the number of rewritten rows.
    pub fn repair_column(&mut self, column_id: &str) -> Result<usize> {
        let rewritten = self.with_retry("repair_column", |storage| {
            storage.immediate(|tx| {
                if storage::get_column(tx, column_id)?.is_none() {
                    return Err(eyre::eyre!(StoreError::ColumnNotFound(column_id.to_string())));
                }
                compact_in_tx(tx, column_id)
            })
        })?;

        if rewritten > 0 {
            log::warn!("Repaired {} task order(s) in column {}", rewritten, column_id);
        }
        Ok(rewritten)
    }

    // =========================================================================
    // Activity log and maintenance
    // =========================================================================

    pub fn record_activity(&mut self, user: &str, task_id: &str, action: Action, description: &str) -> Result<i64> {
        storage::insert_activity(self.storage.conn(), user, task_id, action, description, Utc::now())
            .context("Failed to record activity")
    }

    /// Most recent activity first.
    pub fn activity(&self, task_id: Option<&str>, limit: usize) -> Result<Vec<Activity>> {
        storage::list_activity(self.storage.conn(), task_id, limit)
    }

    pub fn vacuum(&self) -> Result<()> {
        self.storage.vacuum()
    }
}

/// Steps of a move, run inside one immediate transaction.
fn move_in_tx(tx: &Connection, task_id: &str, destination_column_id: &str, requested: u32) -> Result<MoveOutcome> {
    let task =
        storage::get_task(tx, task_id)?.ok_or_else(|| eyre::eyre!(StoreError::TaskNotFound(task_id.to_string())))?;
    let destination = storage::get_column(tx, destination_column_id)?
        .ok_or_else(|| eyre::eyre!(StoreError::ColumnNotFound(destination_column_id.to_string())))?;
    let source = storage::get_column(tx, &task.column_id)?
        .ok_or_else(|| eyre::eyre!(StoreError::ColumnNotFound(task.column_id.clone())))?;

    let source_board = storage::get_board(tx, &source.board_id)?
        .ok_or_else(|| eyre::eyre!(StoreError::BoardNotFound(source.board_id.clone())))?;
    let destination_board = if destination.board_id == source.board_id {
        source_board.clone()
    } else {
        storage::get_board(tx, &destination.board_id)?
            .ok_or_else(|| eyre::eyre!(StoreError::BoardNotFound(destination.board_id.clone())))?
    };

    if source_board.project_id != destination_board.project_id {
        return Err(eyre::eyre!(StoreError::CrossProjectMove {
            task_id: task.id.clone(),
            source_project: source_board.project_id,
            destination_project: destination_board.project_id,
        }));
    }

    let same_column = source.id == destination.id;
    let others: Vec<Slot> = storage::task_slots(tx, &destination.id)?
        .into_iter()
        .filter(|slot| slot.id != task.id)
        .collect();
    let plan = ordering::plan_insert(others, requested);

    let changed = !same_column || task.order != plan.position || !plan.shifted.is_empty();
    let mut moved = task.clone();

    if changed {
        let now = Utc::now();
        storage::place_task(tx, &task.id, &destination.id, plan.position, now)?;
        storage::set_task_orders(tx, &plan.shifted)?;
        if !same_column {
            compact_in_tx(tx, &source.id)?;
        }

        moved.column_id = destination.id.clone();
        moved.order = plan.position;
        moved.updated_at = now;
    }

    Ok(MoveOutcome {
        task: moved,
        source_column_id: source.id,
        source_order: task.order,
        source_board_id: source_board.id,
        destination_board_id: destination_board.id,
        changed,
    })
}

/// Renumber a column densely; returns the number of rewritten rows.
fn compact_in_tx(tx: &Connection, column_id: &str) -> Result<usize> {
    let plan = ordering::plan_compact(storage::task_slots(tx, column_id)?);
    storage::set_task_orders(tx, &plan)?;
    Ok(plan.len())
}
