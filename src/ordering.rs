//! Order planning for tasks within a column.
//!
//! Everything in here is pure: callers read the current contents of a column
//! inside a transaction, ask for a plan, and write back only the rows the plan
//! names. A column is dense when its orders are exactly `0..n`.

use chrono::{DateTime, Utc};

/// The ordering-relevant view of a row in a column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub id: String,
    pub order: u32,
    pub created_at: DateTime<Utc>,
}

/// A new order value for an existing row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub id: String,
    pub order: u32,
}

/// Result of planning an insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertPlan {
    /// Final order of the inserted row.
    pub position: u32,
    /// Rows other than the inserted one whose order changes.
    pub shifted: Vec<Assignment>,
}

/// Sort slots by order, breaking ties by creation time and then id.
pub fn sort_slots(slots: &mut [Slot]) {
    slots.sort_by(|a, b| {
        a.order
            .cmp(&b.order)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Order for a row appended to the end: max + 1, or 0 when empty.
pub fn next_order(slots: &[Slot]) -> u32 {
    slots.iter().map(|s| s.order).max().map_or(0, |max| max + 1)
}

/// Clamp a requested position into `[0, len]`.
pub fn clamp_destination(requested: u32, len: usize) -> usize {
    (requested as usize).min(len)
}

/// Plan inserting a row at `destination` among `others`.
///
/// `others` must not contain the inserted row. Every row is renumbered by its
/// index after insertion, so a non-dense input comes out dense.
pub fn plan_insert(mut others: Vec<Slot>, destination: u32) -> InsertPlan {
    sort_slots(&mut others);
    let position = clamp_destination(destination, others.len());

    let shifted = others
        .into_iter()
        .enumerate()
        .filter_map(|(index, slot)| {
            let order = (if index < position { index } else { index + 1 }) as u32;
            (slot.order != order).then_some(Assignment { id: slot.id, order })
        })
        .collect();

    InsertPlan {
        position: position as u32,
        shifted,
    }
}

/// Plan renumbering `slots` densely in their existing relative order.
pub fn plan_compact(mut slots: Vec<Slot>) -> Vec<Assignment> {
    sort_slots(&mut slots);
    slots
        .into_iter()
        .enumerate()
        .filter_map(|(index, slot)| {
            let order = index as u32;
            (slot.order != order).then_some(Assignment { id: slot.id, order })
        })
        .collect()
}

/// Check whether a set of orders is exactly `0..n`.
pub fn is_dense(orders: impl IntoIterator<Item = u32>) -> bool {
    let mut orders: Vec<u32> = orders.into_iter().collect();
    orders.sort_unstable();
    orders.iter().enumerate().all(|(index, order)| *order as usize == index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn slots(orders: &[(&str, u32)]) -> Vec<Slot> {
        let base = Utc::now();
        orders
            .iter()
            .enumerate()
            .map(|(i, (id, order))| Slot {
                id: id.to_string(),
                order: *order,
                created_at: base + Duration::seconds(i as i64),
            })
            .collect()
    }

    fn apply(mut column: Vec<Slot>, assignments: &[Assignment]) -> Vec<Slot> {
        for a in assignments {
            if let Some(slot) = column.iter_mut().find(|s| s.id == a.id) {
                slot.order = a.order;
            }
        }
        sort_slots(&mut column);
        column
    }

    fn ids(column: &[Slot]) -> Vec<&str> {
        column.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn test_next_order_empty() {
        assert_eq!(next_order(&[]), 0);
    }

    #[test]
    fn test_next_order_uses_max() {
        assert_eq!(next_order(&slots(&[("a", 0), ("b", 1), ("c", 2)])), 3);
        assert_eq!(next_order(&slots(&[("a", 0), ("b", 5)])), 6);
    }

    #[test]
    fn test_plan_insert_front() {
        // A, B, D remain after C is taken out; C goes to 0
        let others = slots(&[("a", 0), ("b", 1), ("d", 3)]);
        let plan = plan_insert(others.clone(), 0);
        assert_eq!(plan.position, 0);

        let mut column = apply(others, &plan.shifted);
        column.push(Slot {
            id: "c".to_string(),
            order: plan.position,
            created_at: Utc::now(),
        });
        sort_slots(&mut column);
        assert_eq!(ids(&column), vec!["c", "a", "b", "d"]);
        assert!(is_dense(column.iter().map(|s| s.order)));
    }

    #[test]
    fn test_plan_insert_middle_only_shifts_tail() {
        let plan = plan_insert(slots(&[("d", 0), ("e", 1)]), 1);
        assert_eq!(plan.position, 1);
        assert_eq!(
            plan.shifted,
            vec![Assignment {
                id: "e".to_string(),
                order: 2
            }]
        );
    }

    #[test]
    fn test_plan_insert_clamps_past_end() {
        let plan = plan_insert(slots(&[("a", 0), ("b", 1)]), 40);
        assert_eq!(plan.position, 2);
        assert!(plan.shifted.is_empty());
    }

    #[test]
    fn test_plan_insert_into_empty() {
        let plan = plan_insert(vec![], 3);
        assert_eq!(plan.position, 0);
        assert!(plan.shifted.is_empty());
    }

    #[test]
    fn test_plan_insert_same_position_is_noop() {
        // B was at 1 and is reinserted at 1
        let plan = plan_insert(slots(&[("a", 0), ("c", 2), ("d", 3)]), 1);
        assert_eq!(plan.position, 1);
        assert!(plan.shifted.is_empty());
    }

    #[test]
    fn test_plan_compact_closes_gap() {
        let column = slots(&[("a", 0), ("c", 2), ("d", 3)]);
        let plan = plan_compact(column.clone());
        assert_eq!(plan.len(), 2);
        let column = apply(column, &plan);
        assert_eq!(ids(&column), vec!["a", "c", "d"]);
        assert!(is_dense(column.iter().map(|s| s.order)));
    }

    #[test]
    fn test_plan_compact_dense_is_noop() {
        assert!(plan_compact(slots(&[("a", 0), ("b", 1)])).is_empty());
    }

    #[test]
    fn test_plan_compact_breaks_ties_by_creation() {
        // "late" and "early" share order 1; the earlier one keeps the lower slot
        let base = Utc::now();
        let column = vec![
            Slot {
                id: "a".to_string(),
                order: 0,
                created_at: base,
            },
            Slot {
                id: "late".to_string(),
                order: 1,
                created_at: base + Duration::seconds(10),
            },
            Slot {
                id: "early".to_string(),
                order: 1,
                created_at: base + Duration::seconds(5),
            },
        ];
        let plan = plan_compact(column.clone());
        assert_eq!(
            plan,
            vec![Assignment {
                id: "late".to_string(),
                order: 2
            }]
        );
        let column = apply(column, &plan);
        assert_eq!(ids(&column), vec!["a", "early", "late"]);
    }

    #[test]
    fn test_is_dense() {
        assert!(is_dense([]));
        assert!(is_dense([2, 0, 1]));
        assert!(!is_dense([0, 2]));
        assert!(!is_dense([0, 1, 1]));
        assert!(!is_dense([1, 2]));
    }
}
