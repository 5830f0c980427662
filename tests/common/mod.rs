//! Shared test infrastructure for kanban-order integration tests.
//!
//! Provides TestEnv helper for consistent test setup/teardown.

#![allow(dead_code)]

use kanban_order::{Board, Column, Priority, Project, Store, Task};
use tempfile::TempDir;

/// Test environment with automatic cleanup.
///
/// Starts with one project owned by "alice" and one board.
pub struct TestEnv {
    pub temp_dir: TempDir,
    pub store: Store,
    pub project: Project,
    pub board: Board,
}

impl TestEnv {
    /// Create a new test environment with an initialized store.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let mut store = Store::init(temp_dir.path()).expect("Failed to init store");
        let project = store
            .create_project("Test Project", None, "alice")
            .expect("Failed to create project");
        let board = store
            .create_board(&project.id, "Test Board")
            .expect("Failed to create board");
        Self {
            temp_dir,
            store,
            project,
            board,
        }
    }

    /// Append a column to the default board.
    pub fn column(&mut self, name: &str) -> Column {
        self.store
            .create_column(&self.board.id, name, None)
            .expect("Failed to create column")
    }

    /// Create a task with default priority.
    pub fn create_task(&mut self, column: &Column, title: &str) -> Task {
        self.store
            .create_task(&column.id, title, None, Priority::Medium)
            .expect("Failed to create task")
    }

    /// Create one task per title, in order.
    pub fn create_tasks(&mut self, column: &Column, titles: &[&str]) -> Vec<Task> {
        titles.iter().map(|title| self.create_task(column, title)).collect()
    }

    /// Move a task, panicking on failure.
    pub fn move_task(&mut self, task: &Task, column: &Column, order: i64) -> Task {
        self.store
            .move_task(&task.id, &column.id, order)
            .expect("Failed to move task")
            .task
    }

    /// Titles of a column's tasks in order.
    pub fn titles(&self, column: &Column) -> Vec<String> {
        self.store
            .list_tasks(&column.id)
            .expect("Failed to list tasks")
            .into_iter()
            .map(|t| t.title)
            .collect()
    }

    /// Order values of a column's tasks in list order.
    pub fn orders(&self, column: &Column) -> Vec<u32> {
        self.store
            .list_tasks(&column.id)
            .expect("Failed to list tasks")
            .into_iter()
            .map(|t| t.order)
            .collect()
    }

    /// Assert that a column is numbered 0..n-1.
    pub fn assert_dense(&self, column: &Column) {
        let orders = self.orders(column);
        let expected: Vec<u32> = (0..orders.len() as u32).collect();
        assert_eq!(orders, expected, "Column {} is not dense", column.name);
    }

    /// Assert that every column in the store is dense.
    pub fn assert_all_dense(&self) {
        let reports = self.store.verify().expect("Failed to verify");
        assert!(reports.is_empty(), "Non-dense columns: {:?}", reports);
    }

    /// Open a second handle on the same database.
    pub fn reopen(&self) -> Store {
        Store::open(self.temp_dir.path()).expect("Failed to reopen store")
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
