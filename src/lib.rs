//! kanban-order: kanban boards with dense, conflict-free task ordering.
//!
//! Every column keeps its tasks numbered `0..n-1` with no gaps or duplicates.
//! Creating, moving and deleting tasks renumber the affected columns inside a
//! single SQLite write transaction, so concurrent writers can never leave a
//! column half-renumbered. A daemon in front of the store checks project
//! membership and relays `task_move` events to everyone watching a board.
//!
//! # Example
//!
//! ```no_run
//! use kanban_order::{Priority, Store};
//! use std::path::Path;
//!
//! let mut store = Store::init(Path::new(".")).unwrap();
//!
//! let project = store.create_project("Website", None, "alice").unwrap();
//! let board = store.create_board(&project.id, "Sprint 12").unwrap();
//! let todo = store.create_column(&board.id, "To Do", None).unwrap();
//! let done = store.create_column(&board.id, "Done", None).unwrap();
//!
//! // New tasks go to the end of their column
//! let a = store.create_task(&todo.id, "Fix login", None, Priority::High).unwrap();
//! let b = store.create_task(&todo.id, "Write docs", None, Priority::Low).unwrap();
//! assert_eq!((a.order, b.order), (0, 1));
//!
//! // Moving closes the gap in the source column
//! let outcome = store.move_task(&a.id, &done.id, 0).unwrap();
//! assert_eq!(outcome.task.order, 0);
//! assert_eq!(store.get_task(&b.id).unwrap().unwrap().order, 0);
//! ```

mod id;
mod storage;
mod store;
mod types;

pub mod builder;
pub mod client;
pub mod config;
pub mod daemon;
pub mod events;
pub mod ordering;
pub mod protocol;

// Re-export public API
pub use builder::{StoreBuilderExt, TaskBuilder};
pub use client::Client;
pub use config::Config;
pub use daemon::{Daemon, DaemonConfig, is_daemon_running, start_daemon};
pub use events::{BoardEvent, Broadcaster, Hub, UserRef, publish_move};
pub use protocol::{Request, Response};
pub use store::{ColumnReport, MoveOutcome, Store, StoreError};
pub use types::{
    Action, Activity, Board, Column, MAX_NAME_LEN, MAX_TITLE_LEN, Member, Priority, Project, Role, Task,
    ValidationError,
};
