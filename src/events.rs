//! Board events and the pub/sub hub that relays them to live viewers.
//!
//! Publishing is fire-and-forget: it happens after the store transaction has
//! committed, never blocks, and drops events for boards nobody is watching.

use crate::store::MoveOutcome;
use crate::types::Task;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// The user who caused an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserRef {
    pub id: String,
}

/// An event delivered to everyone watching a board.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BoardEvent {
    TaskCreate {
        task_id: String,
        column_id: String,
        order: u32,
        user: UserRef,
    },

    TaskMove {
        task_id: String,
        source_column_id: String,
        destination_column_id: String,
        order: u32,
        user: UserRef,
    },

    TaskDelete {
        task_id: String,
        column_id: String,
        user: UserRef,
    },

    /// A column's orders were rewritten to be dense again.
    ColumnRepair {
        column_id: String,
        rewritten: usize,
        user: UserRef,
    },
}

impl BoardEvent {
    pub fn task_create(task: &Task, user: &str) -> Self {
        Self::TaskCreate {
            task_id: task.id.clone(),
            column_id: task.column_id.clone(),
            order: task.order,
            user: UserRef { id: user.to_string() },
        }
    }

    pub fn task_move(outcome: &MoveOutcome, user: &str) -> Self {
        Self::TaskMove {
            task_id: outcome.task.id.clone(),
            source_column_id: outcome.source_column_id.clone(),
            destination_column_id: outcome.task.column_id.clone(),
            order: outcome.task.order,
            user: UserRef { id: user.to_string() },
        }
    }

    pub fn task_delete(task: &Task, user: &str) -> Self {
        Self::TaskDelete {
            task_id: task.id.clone(),
            column_id: task.column_id.clone(),
            user: UserRef { id: user.to_string() },
        }
    }

    pub fn column_repair(column_id: &str, rewritten: usize, user: &str) -> Self {
        Self::ColumnRepair {
            column_id: column_id.to_string(),
            rewritten,
            user: UserRef { id: user.to_string() },
        }
    }
}

/// Something that fans events out to a board's viewers.
pub trait Broadcaster: Send + Sync {
    fn publish(&self, board_id: &str, event: &BoardEvent);
}

/// Publish a move to the source board and, if different, the destination board.
pub fn publish_move(broadcaster: &dyn Broadcaster, outcome: &MoveOutcome, user: &str) {
    let event = BoardEvent::task_move(outcome, user);
    broadcaster.publish(&outcome.source_board_id, &event);
    if outcome.destination_board_id != outcome.source_board_id {
        broadcaster.publish(&outcome.destination_board_id, &event);
    }
}

/// In-process hub with one broadcast channel per watched board.
pub struct Hub {
    capacity: usize,
    groups: Mutex<HashMap<String, broadcast::Sender<BoardEvent>>>,
}

impl Hub {
    /// Create a hub buffering `capacity` events per board.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            groups: Mutex::new(HashMap::new()),
        }
    }

    /// Group name for a board.
    pub fn group_name(board_id: &str) -> String {
        format!("board:{}", board_id)
    }

    /// Start receiving events for a board.
    ///
    /// Groups of other boards whose viewers have all gone are dropped here.
    pub fn subscribe(&self, board_id: &str) -> broadcast::Receiver<BoardEvent> {
        let mut groups = self.groups.lock().unwrap_or_else(|e| e.into_inner());
        groups.retain(|_, tx| tx.receiver_count() > 0);
        groups
            .entry(Self::group_name(board_id))
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Number of live subscribers for a board.
    pub fn subscriber_count(&self, board_id: &str) -> usize {
        let groups = self.groups.lock().unwrap_or_else(|e| e.into_inner());
        groups
            .get(&Self::group_name(board_id))
            .map_or(0, |tx| tx.receiver_count())
    }

    /// Forget a board's group if nobody is watching it any more.
    pub fn prune(&self, board_id: &str) {
        let group = Self::group_name(board_id);
        let mut groups = self.groups.lock().unwrap_or_else(|e| e.into_inner());
        if groups.get(&group).is_some_and(|tx| tx.receiver_count() == 0) {
            groups.remove(&group);
            log::trace!("Removed idle group {}", group);
        }
    }

    /// Number of boards with a live group.
    pub fn board_count(&self) -> usize {
        self.groups.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Broadcaster for Hub {
    fn publish(&self, board_id: &str, event: &BoardEvent) {
        let group = Self::group_name(board_id);
        let mut groups = self.groups.lock().unwrap_or_else(|e| e.into_inner());

        let Some(tx) = groups.get(&group) else {
            log::trace!("No viewers on {}, dropping event", group);
            return;
        };

        match tx.send(event.clone()) {
            Ok(receivers) => log::debug!("Published event to {} viewer(s) on {}", receivers, group),
            Err(_) => {
                // every receiver is gone
                groups.remove(&group);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_task(id: &str, column_id: &str, order: u32) -> Task {
        let now = Utc::now();
        Task {
            id: id.to_string(),
            column_id: column_id.to_string(),
            order,
            title: "Task".to_string(),
            description: None,
            priority: Default::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn make_outcome(source_board: &str, destination_board: &str) -> MoveOutcome {
        MoveOutcome {
            task: make_task("tk-1", "co-dest", 1),
            source_column_id: "co-src".to_string(),
            source_order: 3,
            source_board_id: source_board.to_string(),
            destination_board_id: destination_board.to_string(),
            changed: true,
        }
    }

    #[test]
    fn test_task_move_json_shape() {
        let event = BoardEvent::task_move(&make_outcome("bd-1", "bd-1"), "alice");
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "task_move");
        assert_eq!(json["task_id"], "tk-1");
        assert_eq!(json["source_column_id"], "co-src");
        assert_eq!(json["destination_column_id"], "co-dest");
        assert_eq!(json["order"], 1);
        assert_eq!(json["user"]["id"], "alice");
    }

    #[test]
    fn test_publish_reaches_subscribers() {
        let hub = Hub::new(8);
        let mut rx = hub.subscribe("bd-1");
        let event = BoardEvent::task_create(&make_task("tk-1", "co-1", 0), "bob");

        hub.publish("bd-1", &event);

        assert_eq!(rx.try_recv().unwrap(), event);
    }

    #[test]
    fn test_publish_without_viewers_is_dropped() {
        let hub = Hub::new(8);
        hub.publish("bd-nobody", &BoardEvent::task_delete(&make_task("tk-1", "co-1", 0), "bob"));
        assert_eq!(hub.subscriber_count("bd-nobody"), 0);
    }

    #[test]
    fn test_publish_is_scoped_to_board() {
        let hub = Hub::new(8);
        let mut other = hub.subscribe("bd-2");

        hub.publish("bd-1", &BoardEvent::task_delete(&make_task("tk-1", "co-1", 0), "bob"));

        assert!(other.try_recv().is_err());
    }

    #[test]
    fn test_publish_move_across_boards_notifies_both() {
        let hub = Hub::new(8);
        let mut source = hub.subscribe("bd-1");
        let mut destination = hub.subscribe("bd-2");

        publish_move(&hub, &make_outcome("bd-1", "bd-2"), "carol");

        assert!(source.try_recv().is_ok());
        assert!(destination.try_recv().is_ok());
    }

    #[test]
    fn test_publish_move_same_board_notifies_once() {
        let hub = Hub::new(8);
        let mut rx = hub.subscribe("bd-1");

        publish_move(&hub, &make_outcome("bd-1", "bd-1"), "carol");

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let hub = Hub::new(8);
        drop(hub.subscribe("bd-1"));

        hub.publish("bd-1", &BoardEvent::task_delete(&make_task("tk-1", "co-1", 0), "bob"));

        assert_eq!(hub.subscriber_count("bd-1"), 0);
    }

    #[test]
    fn test_quiet_board_groups_are_dropped_on_subscribe() {
        let hub = Hub::new(8);
        drop(hub.subscribe("bd-1"));
        assert_eq!(hub.board_count(), 1);

        let _rx = hub.subscribe("bd-2");

        assert_eq!(hub.board_count(), 1);
        assert_eq!(hub.subscriber_count("bd-2"), 1);
    }

    #[test]
    fn test_prune_keeps_watched_boards() {
        let hub = Hub::new(8);
        let rx = hub.subscribe("bd-1");

        hub.prune("bd-1");
        assert_eq!(hub.board_count(), 1);

        drop(rx);
        hub.prune("bd-1");
        assert_eq!(hub.board_count(), 0);
        hub.prune("bd-unknown");
    }

    #[test]
    fn test_column_repair_json_shape() {
        let event = BoardEvent::column_repair("co-1", 3, "alice");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "column_repair");
        assert_eq!(json["column_id"], "co-1");
        assert_eq!(json["rewritten"], 3);
        assert_eq!(json["user"]["id"], "alice");
    }
}
