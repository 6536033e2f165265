//! Queue entry repository — write-through persistence for the packing queue.
//!
//! The in-memory queue is authoritative while the process runs; these rows
//! exist so the queue can rehydrate in the same order after a restart.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::{QueueEntry, QueueItem};

pub fn insert_entry(conn: &Connection, entry: &QueueEntry) -> Result<(), DatabaseError> {
    let items_json = serde_json::to_string(&entry.items)?;
    conn.execute(
        "INSERT INTO queue_entries (queue_id, order_id, items_json, enqueued_at, cumulative_estimated_seconds)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            entry.queue_id.to_string(),
            entry.order_id.to_string(),
            items_json,
            entry.enqueued_at,
            entry.cumulative_estimated_seconds,
        ],
    )?;
    Ok(())
}

/// Delete the entry for an order. Returns whether a row was removed.
pub fn delete_entry_by_order(conn: &Connection, order_id: &Uuid) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "DELETE FROM queue_entries WHERE order_id = ?1",
        params![order_id.to_string()],
    )?;
    Ok(changed > 0)
}

/// All entries in enqueue order, for rehydration at startup.
pub fn load_entries(conn: &Connection) -> Result<Vec<QueueEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT queue_id, order_id, items_json, enqueued_at, cumulative_estimated_seconds
         FROM queue_entries ORDER BY seq",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, DateTime<Utc>>(3)?,
            row.get::<_, f64>(4)?,
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (queue_id, order_id, items_json, enqueued_at, cumulative) = row?;
        let items: Vec<QueueItem> = serde_json::from_str(&items_json)?;
        entries.push(QueueEntry {
            queue_id: Uuid::parse_str(&queue_id)
                .map_err(|_| DatabaseError::ConstraintViolation(format!("malformed uuid: {queue_id}")))?,
            order_id: Uuid::parse_str(&order_id)
                .map_err(|_| DatabaseError::ConstraintViolation(format!("malformed uuid: {order_id}")))?,
            items,
            enqueued_at,
            cumulative_estimated_seconds: cumulative,
        });
    }
    Ok(entries)
}
