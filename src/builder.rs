//! Builder pattern API for creating tasks.

use crate::store::Store;
use crate::types::{Priority, Task};
use eyre::{Context, Result};

/// Builder for creating tasks with a fluent API.
///
/// # Example
///
/// ```ignore
/// let task = store.build_task(&column.id, "Fix login redirect")
///     .priority(Priority::Urgent)
///     .description("Users land on a blank page after SSO")
///     .create()?;
/// ```
pub struct TaskBuilder<'a> {
    store: &'a mut Store,
    column_id: String,
    title: String,
    priority: Priority,
    description: Option<String>,
}

impl<'a> TaskBuilder<'a> {
    /// Create a new builder for a task in the given column.
    pub fn new(store: &'a mut Store, column_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            store,
            column_id: column_id.into(),
            title: title.into(),
            priority: Priority::default(),
            description: None,
        }
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Create the task at the end of its column.
    pub fn create(self) -> Result<Task> {
        self.store
            .create_task(&self.column_id, &self.title, self.description.as_deref(), self.priority)
            .context("Failed to create task")
    }
}

/// Extension trait to add builder method to Store.
pub trait StoreBuilderExt {
    /// Start building a new task in a column.
    fn build_task(&mut self, column_id: impl Into<String>, title: impl Into<String>) -> TaskBuilder<'_>;
}

impl StoreBuilderExt for Store {
    fn build_task(&mut self, column_id: impl Into<String>, title: impl Into<String>) -> TaskBuilder<'_> {
        TaskBuilder::new(self, column_id, title)
    }
}
