//! Core data types for the kanban hierarchy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum task title length.
pub const MAX_TITLE_LEN: usize = 200;

/// Maximum project, board and column name length.
pub const MAX_NAME_LEN: usize = 100;

/// A project is the tenant boundary: tasks never leave it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    /// Unique identifier: "pr-" + 10 hex chars
    pub id: String,

    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub created_at: DateTime<Utc>,
}

/// A kanban board inside a project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Board {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// An ordered bucket of tasks within a board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Column {
    pub id: String,
    pub board_id: String,
    pub name: String,

    /// Position among the board's columns (dense, zero-based)
    pub order: u32,

    /// Work in progress limit, informational only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wip_limit: Option<u32>,

    pub created_at: DateTime<Utc>,
}

/// A card on the board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    /// Unique identifier: "tk-" + 10 hex chars
    pub id: String,

    /// Owning column; changes on cross-column moves
    pub column_id: String,

    /// Position within the column (dense, zero-based)
    pub order: u32,

    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub priority: Priority,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Task priority levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Priority::Low),
            "medium" => Some(Priority::Medium),
            "high" => Some(Priority::High),
            "urgent" => Some(Priority::Urgent),
            _ => None,
        }
    }
}

/// Project membership roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Admin,
    Manager,
    Member,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Member => "member",
            Role::Viewer => "viewer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(Role::Owner),
            "admin" => Some(Role::Admin),
            "manager" => Some(Role::Manager),
            "member" => Some(Role::Member),
            "viewer" => Some(Role::Viewer),
            _ => None,
        }
    }

    /// Whether this role may create, move or delete tasks.
    pub fn can_edit_tasks(&self) -> bool {
        !matches!(self, Role::Viewer)
    }

    /// Whether this role may create boards and columns.
    pub fn can_edit_boards(&self) -> bool {
        matches!(self, Role::Owner | Role::Admin | Role::Manager)
    }

    /// Whether this role may add members.
    pub fn can_manage(&self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }
}

/// A user's membership in a project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Member {
    pub project_id: String,
    pub user: String,
    pub role: Role,
    pub joined_at: DateTime<Utc>,
}

/// What happened to a task, as recorded in the activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Created,
    Moved,
    Deleted,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Created => "created",
            Action::Moved => "moved",
            Action::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created" => Some(Action::Created),
            "moved" => Some(Action::Moved),
            "deleted" => Some(Action::Deleted),
            _ => None,
        }
    }
}

/// One entry of the activity log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Activity {
    pub id: i64,
    pub user: String,
    pub task_id: String,
    pub action: Action,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Validation errors for user-supplied fields.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{0} cannot be empty")]
    Empty(&'static str),
    #[error("{field} exceeds {max} characters")]
    TooLong { field: &'static str, max: usize },
    #[error("{0} contains control characters")]
    InvalidCharacters(&'static str),
    #[error("wip limit must be greater than zero")]
    InvalidWipLimit,
    #[error("updated_at cannot be before created_at")]
    InvalidTimestamp,
}

/// Check a required single-line text field.
pub fn validate_text(field: &'static str, value: &str, max: usize) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty(field));
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    if value.chars().any(|c| c.is_control()) {
        return Err(ValidationError::InvalidCharacters(field));
    }
    Ok(())
}

impl Task {
    /// Validate the task's descriptive fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_text("title", &self.title, MAX_TITLE_LEN)?;
        if self.updated_at < self.created_at {
            return Err(ValidationError::InvalidTimestamp);
        }
        Ok(())
    }
}

impl Column {
    /// Validate the column's fields.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_text("column name", &self.name, MAX_NAME_LEN)?;
        if self.wip_limit == Some(0) {
            return Err(ValidationError::InvalidWipLimit);
        }
        Ok(())
    }
}
