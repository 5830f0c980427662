//! Integration tests for error handling.
//!
//! Tests that errors are properly returned for invalid operations and that a
//! failed operation leaves every column as it was.

mod common;

use common::TestEnv;
use kanban_order::{Config, Priority, Store, StoreError, ValidationError};
use tempfile::TempDir;

fn store_error(err: &eyre::Report) -> &StoreError {
    StoreError::find(err).unwrap_or_else(|| panic!("expected a StoreError, got: {:#}", err))
}

// =============================================================================
// Not Found Tests
// =============================================================================

#[test]
fn test_get_nonexistent_task_returns_none() {
    let env = TestEnv::new();

    assert!(env.store.get_task("tk-nonexistent").unwrap().is_none());
}

#[test]
fn test_move_nonexistent_task_fails() {
    let mut env = TestEnv::new();
    let todo = env.column("To Do");

    let err = env.store.move_task("tk-nonexistent", &todo.id, 0).unwrap_err();

    assert!(matches!(store_error(&err), StoreError::TaskNotFound(id) if id == "tk-nonexistent"));
}

#[test]
fn test_move_to_nonexistent_column_fails() {
    let mut env = TestEnv::new();
    let todo = env.column("To Do");
    let tasks = env.create_tasks(&todo, &["A", "B"]);

    let err = env.store.move_task(&tasks[0].id, "co-nonexistent", 0).unwrap_err();

    assert!(matches!(store_error(&err), StoreError::ColumnNotFound(_)));
    assert_eq!(env.titles(&todo), vec!["A", "B"]);
}

#[test]
fn test_delete_nonexistent_task_fails() {
    let mut env = TestEnv::new();

    let err = env.store.delete_task("tk-nonexistent").unwrap_err();

    assert!(store_error(&err).is_not_found());
}

#[test]
fn test_create_task_in_nonexistent_column_fails() {
    let mut env = TestEnv::new();

    let err = env
        .store
        .create_task("co-nonexistent", "Orphan", None, Priority::Low)
        .unwrap_err();

    assert!(matches!(store_error(&err), StoreError::ColumnNotFound(_)));
}

#[test]
fn test_create_board_in_nonexistent_project_fails() {
    let mut env = TestEnv::new();

    let err = env.store.create_board("pr-nonexistent", "Board").unwrap_err();

    assert!(matches!(store_error(&err), StoreError::ProjectNotFound(_)));
}

#[test]
fn test_create_column_on_nonexistent_board_fails() {
    let mut env = TestEnv::new();

    let err = env.store.create_column("bd-nonexistent", "Col", None).unwrap_err();

    assert!(matches!(store_error(&err), StoreError::BoardNotFound(_)));
}

#[test]
fn test_repair_nonexistent_column_fails() {
    let mut env = TestEnv::new();

    let err = env.store.repair_column("co-nonexistent").unwrap_err();

    assert!(matches!(store_error(&err), StoreError::ColumnNotFound(_)));
}

// =============================================================================
// Invalid Order Tests
// =============================================================================

#[test]
fn test_negative_order_rejected() {
    let mut env = TestEnv::new();
    let todo = env.column("To Do");
    let tasks = env.create_tasks(&todo, &["A", "B", "C"]);

    let err = env.store.move_task(&tasks[2].id, &todo.id, -1).unwrap_err();

    assert!(matches!(store_error(&err), StoreError::InvalidOrder(-1)));
    assert_eq!(env.titles(&todo), vec!["A", "B", "C"]);
}

#[test]
fn test_negative_order_checked_before_lookup() {
    let mut env = TestEnv::new();

    let err = env.store.move_task("tk-nonexistent", "co-nonexistent", -5).unwrap_err();

    assert!(matches!(store_error(&err), StoreError::InvalidOrder(-5)));
}

// =============================================================================
// Validation Tests
// =============================================================================

#[test]
fn test_create_empty_title_fails() {
    let mut env = TestEnv::new();
    let todo = env.column("To Do");

    let err = env.store.create_task(&todo.id, "", None, Priority::Medium).unwrap_err();

    assert!(matches!(
        store_error(&err),
        StoreError::Validation(ValidationError::Empty("title"))
    ));
    assert!(env.orders(&todo).is_empty());
}

#[test]
fn test_create_title_too_long_fails() {
    let mut env = TestEnv::new();
    let todo = env.column("To Do");

    let result = env
        .store
        .create_task(&todo.id, &"x".repeat(201), None, Priority::Medium);

    assert!(result.is_err());
}

#[test]
fn test_create_title_at_max_succeeds() {
    let mut env = TestEnv::new();
    let todo = env.column("To Do");

    let task = env
        .store
        .create_task(&todo.id, &"x".repeat(200), None, Priority::Medium)
        .unwrap();

    assert_eq!(task.title.len(), 200);
}

#[test]
fn test_create_control_chars_in_title_fails() {
    let mut env = TestEnv::new();
    let todo = env.column("To Do");

    let result = env.store.create_task(&todo.id, "Bad\x07title", None, Priority::Medium);

    assert!(result.is_err());
}

#[test]
fn test_unicode_title_allowed() {
    let mut env = TestEnv::new();
    let todo = env.column("To Do");

    let task = env.create_task(&todo, "修复登录 🚀");

    assert_eq!(task.title, "修复登录 🚀");
}

#[test]
fn test_duplicate_column_name_rejected() {
    let mut env = TestEnv::new();
    env.column("Doing");

    let err = env.store.create_column(&env.board.id, "Doing", None).unwrap_err();

    assert!(matches!(store_error(&err), StoreError::DuplicateColumn { name, .. } if name == "Doing"));
}

#[test]
fn test_zero_wip_limit_rejected() {
    let mut env = TestEnv::new();

    let err = env.store.create_column(&env.board.id, "Doing", Some(0)).unwrap_err();

    assert!(matches!(
        store_error(&err),
        StoreError::Validation(ValidationError::InvalidWipLimit)
    ));
}

#[test]
fn test_empty_project_name_rejected() {
    let mut env = TestEnv::new();

    assert!(env.store.create_project("  ", None, "alice").is_err());
}

// =============================================================================
// Store Lifecycle Tests
// =============================================================================

#[test]
fn test_init_creates_kanban_directory() {
    let temp = TempDir::new().unwrap();
    Store::init(temp.path()).unwrap();

    assert!(temp.path().join(".kanban").join("kanban.db").exists());
}

#[test]
fn test_open_nonexistent_store_fails() {
    let temp = TempDir::new().unwrap();

    assert!(Store::open(temp.path()).is_err());
}

#[test]
fn test_invalid_config_file_fails_open() {
    let temp = TempDir::new().unwrap();
    Store::init(temp.path()).unwrap();
    std::fs::write(temp.path().join(".kanban").join("config.yaml"), "bogus_key: 1\n").unwrap();

    assert!(Store::open(temp.path()).is_err());
}

#[test]
fn test_config_file_is_applied() {
    let temp = TempDir::new().unwrap();
    Store::init(temp.path()).unwrap();
    std::fs::write(
        temp.path().join(".kanban").join("config.yaml"),
        "max_retries: 9\nbusy_timeout_ms: 250\n",
    )
    .unwrap();

    let store = Store::open(temp.path()).unwrap();

    assert_eq!(store.config().max_retries, 9);
    assert_eq!(store.config().busy_timeout, std::time::Duration::from_millis(250));
    assert_eq!(store.config().event_capacity, Config::default().event_capacity);
}
