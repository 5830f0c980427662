//! IPC protocol types for daemon communication.
//!
//! Every message is one line of JSON tagged by `"type"`. Mutating requests
//! carry the acting `user`, which the daemon checks against project
//! membership before touching the store.

use crate::events::BoardEvent;
use crate::store::{MoveOutcome, StoreError};
use crate::types::{Board, Column, Member, Priority, Project, Role, Task};
use serde::{Deserialize, Serialize};

/// Request sent from client to daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    /// Create a project owned by `user`.
    CreateProject {
        user: String,
        name: String,
        description: Option<String>,
    },

    /// Add a member to a project (owners and admins only).
    AddMember {
        user: String,
        project_id: String,
        member: String,
        role: Role,
    },

    CreateBoard {
        user: String,
        project_id: String,
        name: String,
    },

    CreateColumn {
        user: String,
        board_id: String,
        name: String,
        wip_limit: Option<u32>,
    },

    /// Create a task at the end of a column.
    CreateTask {
        user: String,
        column_id: String,
        title: String,
        description: Option<String>,
        #[serde(default)]
        priority: Priority,
    },

    /// Move a task to a position in a column.
    MoveTask {
        user: String,
        task_id: String,
        column_id: String,
        order: i64,
    },

    DeleteTask { user: String, task_id: String },

    GetTask { user: String, id: String },

    /// List a column's tasks in order.
    ListColumn { user: String, column_id: String },

    /// Rewrite a column's orders to `0..n-1`.
    RepairColumn { user: String, column_id: String },

    /// Stream events for a board on this connection.
    Subscribe { user: String, board_id: String },

    /// Shutdown the daemon.
    Shutdown,

    /// Ping to check if daemon is alive.
    Ping,
}

/// Response sent from daemon to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Project { project: Project },

    Member { member: Member },

    Board { board: Board },

    Column { column: Column },

    Task { task: Task },

    Tasks { tasks: Vec<Task> },

    Moved { outcome: MoveOutcome },

    Repaired { column_id: String, rewritten: usize },

    /// Subscription accepted; `Event` messages follow.
    Subscribed { board_id: String },

    Event { event: BoardEvent },

    NotFound { id: String },

    /// The user may not perform this operation.
    Forbidden { message: String },

    /// The request was well-formed but rejected by the store.
    Invalid { message: String },

    /// The store stayed busy through every retry; safe to retry later.
    Conflict { message: String },

    /// Operation succeeded.
    Ok,

    /// Pong response to ping.
    Pong,

    /// Error response.
    Error { message: String },
}

impl Response {
    /// Create an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Map a store failure to the matching response.
    pub fn from_report(err: &eyre::Report) -> Self {
        match StoreError::find(err) {
            Some(
                StoreError::ProjectNotFound(id)
                | StoreError::BoardNotFound(id)
                | StoreError::ColumnNotFound(id)
                | StoreError::TaskNotFound(id),
            ) => Self::NotFound { id: id.clone() },
            Some(e @ StoreError::CrossProjectMove { .. }) => Self::forbidden(e.to_string()),
            Some(e @ StoreError::ConcurrencyConflict { .. }) => Self::Conflict { message: e.to_string() },
            Some(
                e @ (StoreError::InvalidOrder(_) | StoreError::DuplicateColumn { .. } | StoreError::Validation(_)),
            ) => Self::Invalid { message: e.to_string() },
            None => Self::error(format!("{:#}", err)),
        }
    }
}
