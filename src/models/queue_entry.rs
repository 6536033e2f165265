use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::ItemKind;

/// One slot in the packing queue.
///
/// Items are snapshotted (name + kind) at enqueue time so later catalog
/// changes never alter a queued estimate. `cumulative_estimated_seconds`
/// is non-decreasing from head to tail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub queue_id: Uuid,
    pub order_id: Uuid,
    pub items: Vec<QueueItem>,
    pub enqueued_at: DateTime<Utc>,
    pub cumulative_estimated_seconds: f64,
}

/// Denormalized item reference carried by a queue entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub name: String,
    pub kind: ItemKind,
}

/// Queue listing row returned to external callers.
#[derive(Debug, Clone, Serialize)]
pub struct QueueListing {
    pub queue_id: Uuid,
    pub order_id: Uuid,
    pub cumulative_estimated_seconds: f64,
}
