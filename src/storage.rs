//! Storage layer: SQLite schema, transactions and row-level queries.
//!
//! Row functions take a plain `&Connection` so they work both on the
//! read-only handle and inside a `Transaction` (which derefs to one).

use crate::config::Config;
use crate::ordering::{Assignment, Slot};
use crate::types::{Action, Activity, Board, Column, Member, Priority, Project, Role, Task};
use chrono::{DateTime, Utc};
use eyre::{Context, Result};
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Transaction, TransactionBehavior, params};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage directory name.
pub const KANBAN_DIR: &str = ".kanban";

/// SQLite database file.
pub const DB_FILE: &str = "kanban.db";

/// Storage handle for reading/writing board data.
pub struct Storage {
    root: PathBuf,
    db: Connection,
}

impl Storage {
    /// Initialize storage in the given directory.
    pub fn init(root: &Path, config: &Config) -> Result<Self> {
        let kanban_dir = root.join(KANBAN_DIR);
        fs::create_dir_all(&kanban_dir).context("Failed to create .kanban directory")?;

        let db = Self::connect(&kanban_dir.join(DB_FILE), config)?;
        let storage = Self {
            root: root.to_path_buf(),
            db,
        };
        storage.init_schema()?;

        log::info!("Initialized store at {}", kanban_dir.display());
        Ok(storage)
    }

    /// Open existing storage.
    pub fn open(root: &Path, config: &Config) -> Result<Self> {
        let kanban_dir = root.join(KANBAN_DIR);
        if !kanban_dir.exists() {
            eyre::bail!("No .kanban directory found. Run 'ko init' first.");
        }

        let db = Self::connect(&kanban_dir.join(DB_FILE), config)?;
        let storage = Self {
            root: root.to_path_buf(),
            db,
        };
        storage.init_schema()?;

        Ok(storage)
    }

    /// Open a connection configured for concurrent writers.
    fn connect(path: &Path, config: &Config) -> Result<Connection> {
        let db = Connection::open(path).context("Failed to open SQLite database")?;
        db.busy_timeout(config.busy_timeout)
            .context("Failed to set busy timeout")?;
        let mode: String = db
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .context("Failed to enable WAL journal")?;
        log::debug!("SQLite journal mode: {}", mode);
        db.execute_batch("PRAGMA foreign_keys = ON")
            .context("Failed to enable foreign keys")?;
        Ok(db)
    }

    /// Initialize SQLite schema.
    fn init_schema(&self) -> Result<()> {
        self.db
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS projects (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    description TEXT,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS members (
                    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    user_id TEXT NOT NULL,
                    role TEXT NOT NULL CHECK (role IN ('owner', 'admin', 'manager', 'member', 'viewer')),
                    joined_at TEXT NOT NULL,
                    PRIMARY KEY (project_id, user_id)
                );

                CREATE TABLE IF NOT EXISTS boards (
                    id TEXT PRIMARY KEY,
                    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_boards_project ON boards(project_id);

                CREATE TABLE IF NOT EXISTS board_columns (
                    id TEXT PRIMARY KEY,
                    board_id TEXT NOT NULL REFERENCES boards(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    position INTEGER NOT NULL CHECK (position >= 0),
                    wip_limit INTEGER CHECK (wip_limit IS NULL OR wip_limit > 0),
                    created_at TEXT NOT NULL,
                    UNIQUE (board_id, name)
                );

                CREATE TABLE IF NOT EXISTS tasks (
                    id TEXT PRIMARY KEY,
                    column_id TEXT NOT NULL REFERENCES board_columns(id) ON DELETE CASCADE,
                    position INTEGER NOT NULL CHECK (position >= 0),
                    title TEXT NOT NULL,
                    description TEXT,
                    priority TEXT NOT NULL CHECK (priority IN ('low', 'medium', 'high', 'urgent')),
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_tasks_column ON tasks(column_id, position);

                CREATE TABLE IF NOT EXISTS activity (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id TEXT NOT NULL,
                    task_id TEXT NOT NULL,
                    action TEXT NOT NULL CHECK (action IN ('created', 'moved', 'deleted')),
                    description TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_activity_task ON activity(task_id);
            "#,
            )
            .context("Failed to initialize schema")?;

        Ok(())
    }

    /// Store root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Connection for reads outside a transaction.
    pub fn conn(&self) -> &Connection {
        &self.db
    }

    /// Run `f` inside a `BEGIN IMMEDIATE` transaction.
    ///
    /// The write lock is taken before `f` reads anything, so two writers can
    /// never compute renumbering plans from the same snapshot. Any error rolls
    /// the whole transaction back.
    pub fn immediate<T>(&mut self, f: impl FnOnce(&Transaction) -> Result<T>) -> Result<T> {
        let tx = self
            .db
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("Failed to begin transaction")?;
        let value = f(&tx)?;
        tx.commit().context("Failed to commit transaction")?;
        Ok(value)
    }

    /// Run SQLite's VACUUM.
    pub fn vacuum(&self) -> Result<()> {
        self.db.execute_batch("VACUUM").context("Failed to vacuum database")?;
        Ok(())
    }
}

/// True if the error chain contains SQLite reporting a held lock.
pub fn is_busy(err: &eyre::Report) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(e, _))
                if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
        )
    })
}

/// A stored text value that does not name a known variant.
#[derive(Debug, Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownValue {
    pub kind: &'static str,
    pub value: String,
}

/// Read an RFC 3339 timestamp column; malformed values are errors.
fn ts_column(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read a text column naming an enum variant.
fn enum_column<T>(
    row: &rusqlite::Row,
    idx: usize,
    kind: &'static str,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let value: String = row.get(idx)?;
    parse(&value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(UnknownValue { kind, value }))
    })
}

// =============================================================================
// Projects and members
// =============================================================================

pub fn insert_project(conn: &Connection, project: &Project) -> Result<()> {
    conn.execute(
        "INSERT INTO projects (id, name, description, created_at) VALUES (?, ?, ?, ?)",
        params![
            project.id,
            project.name,
            project.description,
            project.created_at.to_rfc3339()
        ],
    )?;
    Ok(())
}

pub fn get_project(conn: &Connection, id: &str) -> Result<Option<Project>> {
    let project = conn
        .query_row(
            "SELECT id, name, description, created_at FROM projects WHERE id = ?",
            params![id],
            |row| {
                let created_at = ts_column(row, 3)?;
                Ok(Project {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                    created_at,
                })
            },
        )
        .optional()?;
    Ok(project)
}

pub fn upsert_member(conn: &Connection, member: &Member) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO members (project_id, user_id, role, joined_at) VALUES (?, ?, ?, ?)
        ON CONFLICT (project_id, user_id) DO UPDATE SET role = excluded.role
        "#,
        params![
            member.project_id,
            member.user,
            member.role.as_str(),
            member.joined_at.to_rfc3339()
        ],
    )?;
    Ok(())
}

fn row_to_member(row: &rusqlite::Row) -> rusqlite::Result<Member> {
    let role = enum_column(row, 2, "role", Role::parse)?;
    let joined_at = ts_column(row, 3)?;
    Ok(Member {
        project_id: row.get(0)?,
        user: row.get(1)?,
        role,
        joined_at,
    })
}

pub fn get_member(conn: &Connection, project_id: &str, user: &str) -> Result<Option<Member>> {
    let member = conn
        .query_row(
            "SELECT project_id, user_id, role, joined_at FROM members WHERE project_id = ? AND user_id = ?",
            params![project_id, user],
            row_to_member,
        )
        .optional()?;
    Ok(member)
}

pub fn list_members(conn: &Connection, project_id: &str) -> Result<Vec<Member>> {
    let mut stmt = conn.prepare(
        "SELECT project_id, user_id, role, joined_at FROM members WHERE project_id = ? ORDER BY joined_at, user_id",
    )?;
    let members = stmt
        .query_map(params![project_id], row_to_member)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(members)
}

// =============================================================================
// Boards and columns
// =============================================================================

pub fn insert_board(conn: &Connection, board: &Board) -> Result<()> {
    conn.execute(
        "INSERT INTO boards (id, project_id, name, created_at) VALUES (?, ?, ?, ?)",
        params![board.id, board.project_id, board.name, board.created_at.to_rfc3339()],
    )?;
    Ok(())
}

pub fn get_board(conn: &Connection, id: &str) -> Result<Option<Board>> {
    let board = conn
        .query_row(
            "SELECT id, project_id, name, created_at FROM boards WHERE id = ?",
            params![id],
            |row| {
                let created_at = ts_column(row, 3)?;
                Ok(Board {
                    id: row.get(0)?,
                    project_id: row.get(1)?,
                    name: row.get(2)?,
                    created_at,
                })
            },
        )
        .optional()?;
    Ok(board)
}

pub fn insert_column(conn: &Connection, column: &Column) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO board_columns (id, board_id, name, position, wip_limit, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
        params![
            column.id,
            column.board_id,
            column.name,
            column.order,
            column.wip_limit,
            column.created_at.to_rfc3339()
        ],
    )?;
    Ok(())
}

fn row_to_column(row: &rusqlite::Row) -> rusqlite::Result<Column> {
    let created_at = ts_column(row, 5)?;
    Ok(Column {
        id: row.get(0)?,
        board_id: row.get(1)?,
        name: row.get(2)?,
        order: row.get(3)?,
        wip_limit: row.get(4)?,
        created_at,
    })
}

pub fn get_column(conn: &Connection, id: &str) -> Result<Option<Column>> {
    let column = conn
        .query_row(
            "SELECT id, board_id, name, position, wip_limit, created_at FROM board_columns WHERE id = ?",
            params![id],
            row_to_column,
        )
        .optional()?;
    Ok(column)
}

pub fn list_columns(conn: &Connection, board_id: &str) -> Result<Vec<Column>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, board_id, name, position, wip_limit, created_at
        FROM board_columns WHERE board_id = ?
        ORDER BY position, created_at, id
        "#,
    )?;
    let columns = stmt
        .query_map(params![board_id], row_to_column)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(columns)
}

pub fn column_name_exists(conn: &Connection, board_id: &str, name: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM board_columns WHERE board_id = ? AND name = ?",
        params![board_id, name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Ordering slots for the columns of a board.
pub fn column_slots(conn: &Connection, board_id: &str) -> Result<Vec<Slot>> {
    let mut stmt = conn.prepare("SELECT id, position, created_at FROM board_columns WHERE board_id = ?")?;
    let slots = stmt
        .query_map(params![board_id], row_to_slot)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(slots)
}

/// Project that owns a column, via its board.
pub fn column_project_id(conn: &Connection, column_id: &str) -> Result<Option<String>> {
    let project_id = conn
        .query_row(
            r#"
            SELECT b.project_id FROM board_columns c
            JOIN boards b ON c.board_id = b.id
            WHERE c.id = ?
            "#,
            params![column_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(project_id)
}

pub fn all_column_ids(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT id FROM board_columns ORDER BY board_id, position, id")?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(ids)
}

// =============================================================================
// Tasks
// =============================================================================

pub fn insert_task(conn: &Connection, task: &Task) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO tasks (id, column_id, position, title, description, priority, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            task.id,
            task.column_id,
            task.order,
            task.title,
            task.description,
            task.priority.as_str(),
            task.created_at.to_rfc3339(),
            task.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    let priority = enum_column(row, 5, "priority", Priority::parse)?;
    let created_at = ts_column(row, 6)?;
    let updated_at = ts_column(row, 7)?;
    Ok(Task {
        id: row.get(0)?,
        column_id: row.get(1)?,
        order: row.get(2)?,
        title: row.get(3)?,
        description: row.get(4)?,
        priority,
        created_at,
        updated_at,
    })
}

fn row_to_slot(row: &rusqlite::Row) -> rusqlite::Result<Slot> {
    let created_at = ts_column(row, 2)?;
    Ok(Slot {
        id: row.get(0)?,
        order: row.get(1)?,
        created_at,
    })
}

pub fn get_task(conn: &Connection, id: &str) -> Result<Option<Task>> {
    let task = conn
        .query_row(
            r#"
            SELECT id, column_id, position, title, description, priority, created_at, updated_at
            FROM tasks WHERE id = ?
            "#,
            params![id],
            row_to_task,
        )
        .optional()?;
    Ok(task)
}

/// Tasks of a column in display order.
pub fn list_tasks(conn: &Connection, column_id: &str) -> Result<Vec<Task>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, column_id, position, title, description, priority, created_at, updated_at
        FROM tasks WHERE column_id = ?
        ORDER BY position, created_at, id
        "#,
    )?;
    let tasks = stmt
        .query_map(params![column_id], row_to_task)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tasks)
}

/// Ordering slots for the tasks of a column.
pub fn task_slots(conn: &Connection, column_id: &str) -> Result<Vec<Slot>> {
    let mut stmt = conn.prepare("SELECT id, position, created_at FROM tasks WHERE column_id = ?")?;
    let slots = stmt
        .query_map(params![column_id], row_to_slot)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(slots)
}

/// Write new order values. Leaves `updated_at` alone.
pub fn set_task_orders(conn: &Connection, assignments: &[Assignment]) -> Result<()> {
    let mut stmt = conn.prepare("UPDATE tasks SET position = ? WHERE id = ?")?;
    for a in assignments {
        stmt.execute(params![a.order, a.id])?;
    }
    Ok(())
}

/// Place a task at a column and order.
pub fn place_task(conn: &Connection, id: &str, column_id: &str, order: u32, now: DateTime<Utc>) -> Result<()> {
    conn.execute(
        "UPDATE tasks SET column_id = ?, position = ?, updated_at = ? WHERE id = ?",
        params![column_id, order, now.to_rfc3339(), id],
    )?;
    Ok(())
}

pub fn delete_task_row(conn: &Connection, id: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM tasks WHERE id = ?", params![id])?;
    Ok(deleted > 0)
}

// =============================================================================
// Activity
// =============================================================================

pub fn insert_activity(
    conn: &Connection,
    user: &str,
    task_id: &str,
    action: Action,
    description: &str,
    now: DateTime<Utc>,
) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO activity (user_id, task_id, action, description, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
        params![user, task_id, action.as_str(), description, now.to_rfc3339()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Most recent activity first, optionally for a single task.
pub fn list_activity(conn: &Connection, task_id: Option<&str>, limit: usize) -> Result<Vec<Activity>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, user_id, task_id, action, description, created_at
        FROM activity
        WHERE (?1 IS NULL OR task_id = ?1)
        ORDER BY id DESC
        LIMIT ?2
        "#,
    )?;
    let activity = stmt
        .query_map(params![task_id, limit as i64], |row| {
            let action = enum_column(row, 3, "action", Action::parse)?;
            let created_at = ts_column(row, 5)?;
            Ok(Activity {
                id: row.get(0)?,
                user: row.get(1)?,
                task_id: row.get(2)?,
                action,
                description: row.get(4)?,
                created_at,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(activity)
}
