//! The packing queue: ordered in-flight orders with cumulative wait
//! estimates.
//!
//! Models a single packing lane serving FIFO — a new order's completion
//! estimate is bounded below by everyone ahead of it finishing first.
//! One mutex guards the whole sequence; the read-tail/compute/append
//! step is atomic as a unit. Entries write through to `queue_entries`
//! so the queue survives restarts.

use std::sync::Mutex;

use chrono::Utc;
use rand::Rng;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository;
use crate::db::DatabaseError;
use crate::models::enums::ItemKind;
use crate::models::{Order, QueueEntry, QueueItem, QueueListing};

/// Fixed head-of-queue buffer applied when the queue is empty.
pub const BASE_BUFFER_SECS: f64 = 300.0;

/// Per-item packing duration strategy. Injectable so tests can pin
/// deterministic values.
pub trait PackingEstimator: Send + Sync {
    /// Seconds to pack one item of the given kind.
    fn estimate(&self, kind: ItemKind) -> u32;
}

/// Production estimator: uniform inclusive draws per item kind.
/// Edge items (liquids, injectables, topicals) take longer to pack.
pub struct RandomizedEstimator;

impl PackingEstimator for RandomizedEstimator {
    fn estimate(&self, kind: ItemKind) -> u32 {
        let mut rng = rand::thread_rng();
        match kind {
            ItemKind::Edge => rng.gen_range(30..=60),
            ItemKind::Regular => rng.gen_range(15..=30),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Queue lock poisoned")]
    LockPoisoned,

    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
}

/// Outcome of an enqueue, echoed back to the submitting caller.
#[derive(Debug, Clone)]
pub struct EnqueueOutcome {
    pub queue_id: Uuid,
    pub cumulative_estimated_seconds: f64,
    pub position: i64,
}

pub struct FulfillmentQueue {
    entries: Mutex<Vec<QueueEntry>>,
    estimator: Box<dyn PackingEstimator>,
}

impl FulfillmentQueue {
    pub fn new(estimator: Box<dyn PackingEstimator>) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            estimator,
        }
    }

    /// Rebuild the queue from persisted entries (enqueue order).
    pub fn load(estimator: Box<dyn PackingEstimator>, conn: &Connection) -> Result<Self, DatabaseError> {
        let entries = repository::queue::load_entries(conn)?;
        if !entries.is_empty() {
            tracing::info!("Rehydrated packing queue with {} entries", entries.len());
        }
        Ok(Self {
            entries: Mutex::new(entries),
            estimator,
        })
    }

    /// Append an order to the tail.
    ///
    /// The new entry's cumulative estimate is the tail's cumulative (or
    /// the base buffer when empty) plus this order's own packing time.
    pub fn enqueue(&self, conn: &Connection, order: &Order) -> Result<EnqueueOutcome, QueueError> {
        let packing_seconds: u32 = order
            .items
            .iter()
            .map(|item| self.estimator.estimate(item.kind))
            .sum();

        let mut entries = self.entries.lock().map_err(|_| QueueError::LockPoisoned)?;
        let tail = entries
            .last()
            .map(|entry| entry.cumulative_estimated_seconds)
            .unwrap_or(BASE_BUFFER_SECS);

        let entry = QueueEntry {
            queue_id: Uuid::new_v4(),
            order_id: order.id,
            items: order
                .items
                .iter()
                .map(|item| QueueItem {
                    name: item.name.clone(),
                    kind: item.kind,
                })
                .collect(),
            enqueued_at: Utc::now(),
            cumulative_estimated_seconds: tail + f64::from(packing_seconds),
        };

        if let Err(err) = repository::queue::insert_entry(conn, &entry) {
            if !err.is_busy() {
                return Err(err.into());
            }
            tracing::warn!("Queue write hit a busy database, retrying once");
            repository::queue::insert_entry(conn, &entry)?;
        }

        let outcome = EnqueueOutcome {
            queue_id: entry.queue_id,
            cumulative_estimated_seconds: entry.cumulative_estimated_seconds,
            position: entries.len() as i64 + 1,
        };
        entries.push(entry);
        tracing::debug!(
            position = outcome.position,
            estimate = outcome.cumulative_estimated_seconds,
            "Order enqueued for packing"
        );
        Ok(outcome)
    }

    /// 1-based position of an order, or -1 when it is not queued
    /// (already removed or never enqueued).
    pub fn position(&self, order_id: &Uuid) -> i64 {
        let entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(_) => return -1,
        };
        entries
            .iter()
            .position(|entry| entry.order_id == *order_id)
            .map(|idx| idx as i64 + 1)
            .unwrap_or(-1)
    }

    /// Tail cumulative estimate — the whole queue's wait — or 0 when empty.
    pub fn total_wait_seconds(&self) -> f64 {
        self.entries
            .lock()
            .map(|entries| {
                entries
                    .last()
                    .map(|entry| entry.cumulative_estimated_seconds)
                    .unwrap_or(0.0)
            })
            .unwrap_or(0.0)
    }

    /// Ordered listing for external callers.
    pub fn listing(&self) -> Vec<QueueListing> {
        self.entries
            .lock()
            .map(|entries| {
                entries
                    .iter()
                    .map(|entry| QueueListing {
                        queue_id: entry.queue_id,
                        order_id: entry.order_id,
                        cumulative_estimated_seconds: entry.cumulative_estimated_seconds,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Remove an order's entry (pickup or cancellation). Entries behind
    /// it keep their estimates — cumulative times are advisory and are
    /// not recomputed on removal.
    pub fn remove(&self, conn: &Connection, order_id: &Uuid) -> Result<bool, QueueError> {
        let mut entries = self.entries.lock().map_err(|_| QueueError::LockPoisoned)?;
        if !entries.iter().any(|entry| entry.order_id == *order_id) {
            return Ok(false);
        }
        repository::queue::delete_entry_by_order(conn, order_id)?;
        entries.retain(|entry| entry.order_id != *order_id);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::orders::insert_order;
    use crate::models::enums::OrderStatus;
    use crate::models::OrderItem;

    /// Deterministic estimator for tests.
    struct FixedEstimator {
        regular: u32,
        edge: u32,
    }

    impl PackingEstimator for FixedEstimator {
        fn estimate(&self, kind: ItemKind) -> u32 {
            match kind {
                ItemKind::Regular => self.regular,
                ItemKind::Edge => self.edge,
            }
        }
    }

    fn seed_order(conn: &Connection, items: Vec<OrderItem>) -> Order {
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            source_document_id: Uuid::new_v4(),
            owner_id: 1,
            items,
            otp_code: "123456".into(),
            status: OrderStatus::Pending,
            assigned_worker_id: None,
            created_at: now,
            updated_at: now,
        };
        insert_order(conn, &order).unwrap();
        order
    }

    fn regular_item(name: &str) -> OrderItem {
        OrderItem {
            name: name.into(),
            kind: ItemKind::Regular,
            quantity: 1,
        }
    }

    fn edge_item(name: &str) -> OrderItem {
        OrderItem {
            name: name.into(),
            kind: ItemKind::Edge,
            quantity: 1,
        }
    }

    #[test]
    fn first_entry_gets_base_buffer_plus_packing() {
        let conn = open_memory_database().unwrap();
        let queue = FulfillmentQueue::new(Box::new(FixedEstimator { regular: 20, edge: 40 }));

        // one edge item: packing 40s on an empty queue -> 300 + 40
        let order = seed_order(&conn, vec![edge_item("cough syrup")]);
        let outcome = queue.enqueue(&conn, &order).unwrap();
        assert_eq!(outcome.cumulative_estimated_seconds, 340.0);
        assert_eq!(outcome.position, 1);

        // second order: packing 20s -> 340 + 20
        let second = seed_order(&conn, vec![regular_item("paracetamol")]);
        let outcome = queue.enqueue(&conn, &second).unwrap();
        assert_eq!(outcome.cumulative_estimated_seconds, 360.0);
        assert_eq!(outcome.position, 2);
    }

    #[test]
    fn packing_time_sums_per_item() {
        let conn = open_memory_database().unwrap();
        let queue = FulfillmentQueue::new(Box::new(FixedEstimator { regular: 20, edge: 40 }));

        let order = seed_order(
            &conn,
            vec![regular_item("paracetamol"), edge_item("eye drops")],
        );
        let outcome = queue.enqueue(&conn, &order).unwrap();
        assert_eq!(outcome.cumulative_estimated_seconds, 300.0 + 20.0 + 40.0);
    }

    #[test]
    fn position_lookup_and_missing_order() {
        let conn = open_memory_database().unwrap();
        let queue = FulfillmentQueue::new(Box::new(FixedEstimator { regular: 20, edge: 40 }));

        let first = seed_order(&conn, vec![regular_item("a")]);
        let second = seed_order(&conn, vec![regular_item("b")]);
        queue.enqueue(&conn, &first).unwrap();
        queue.enqueue(&conn, &second).unwrap();

        assert_eq!(queue.position(&first.id), 1);
        assert_eq!(queue.position(&second.id), 2);
        assert_eq!(queue.position(&Uuid::new_v4()), -1);
    }

    #[test]
    fn total_wait_is_tail_or_zero() {
        let conn = open_memory_database().unwrap();
        let queue = FulfillmentQueue::new(Box::new(FixedEstimator { regular: 20, edge: 40 }));
        assert_eq!(queue.total_wait_seconds(), 0.0);

        let order = seed_order(&conn, vec![regular_item("a")]);
        queue.enqueue(&conn, &order).unwrap();
        assert_eq!(queue.total_wait_seconds(), 320.0);
    }

    #[test]
    fn removal_does_not_recompute_later_estimates() {
        let conn = open_memory_database().unwrap();
        let queue = FulfillmentQueue::new(Box::new(FixedEstimator { regular: 20, edge: 40 }));

        let first = seed_order(&conn, vec![regular_item("a")]);
        let second = seed_order(&conn, vec![regular_item("b")]);
        let third = seed_order(&conn, vec![regular_item("c")]);
        queue.enqueue(&conn, &first).unwrap();
        queue.enqueue(&conn, &second).unwrap();
        let third_outcome = queue.enqueue(&conn, &third).unwrap();

        assert!(queue.remove(&conn, &second.id).unwrap());
        assert!(!queue.remove(&conn, &second.id).unwrap());

        let listing = queue.listing();
        assert_eq!(listing.len(), 2);
        // positions shift, estimates stay advisory
        assert_eq!(queue.position(&third.id), 2);
        assert_eq!(
            listing[1].cumulative_estimated_seconds,
            third_outcome.cumulative_estimated_seconds
        );
    }

    #[test]
    fn cumulative_estimates_are_monotonic_with_random_draws() {
        let conn = open_memory_database().unwrap();
        let queue = FulfillmentQueue::new(Box::new(RandomizedEstimator));

        for i in 0..10 {
            let order = seed_order(
                &conn,
                vec![regular_item(&format!("med{i}")), edge_item(&format!("syrup{i}"))],
            );
            queue.enqueue(&conn, &order).unwrap();
        }

        let listing = queue.listing();
        for pair in listing.windows(2) {
            assert!(pair[1].cumulative_estimated_seconds >= pair[0].cumulative_estimated_seconds);
        }
        // randomized draws stay inside the per-kind ranges: 15..=30 + 30..=60
        let own = listing[0].cumulative_estimated_seconds - BASE_BUFFER_SECS;
        assert!((45.0..=90.0).contains(&own));
    }

    #[test]
    fn rehydrates_in_enqueue_order() {
        let conn = open_memory_database().unwrap();
        let queue = FulfillmentQueue::new(Box::new(FixedEstimator { regular: 20, edge: 40 }));
        let first = seed_order(&conn, vec![regular_item("a")]);
        let second = seed_order(&conn, vec![regular_item("b")]);
        queue.enqueue(&conn, &first).unwrap();
        queue.enqueue(&conn, &second).unwrap();

        let reloaded =
            FulfillmentQueue::load(Box::new(FixedEstimator { regular: 20, edge: 40 }), &conn)
                .unwrap();
        assert_eq!(reloaded.position(&first.id), 1);
        assert_eq!(reloaded.position(&second.id), 2);
        assert_eq!(reloaded.total_wait_seconds(), 340.0);

        // a fresh enqueue continues from the rehydrated tail
        let third = seed_order(&conn, vec![regular_item("c")]);
        let outcome = reloaded.enqueue(&conn, &third).unwrap();
        assert_eq!(outcome.cumulative_estimated_seconds, 360.0);
        assert_eq!(outcome.position, 3);
    }
}
