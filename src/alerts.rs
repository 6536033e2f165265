//! Pharmacy alert and reporting queries.
//!
//! View types for the admin dashboard (out-of-stock events, stale
//! orders, volume spikes, queue statistics, low-stock report), plus the
//! query functions that operate against the orders and event tables.
//! Everything here is read-only except the out-of-stock event recorder.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::repository::inventory;
use crate::db::DatabaseError;
use crate::models::{InventoryItem, Shortage};

// ═══════════════════════════════════════════
// Constants
// ═══════════════════════════════════════════

/// Orders older than this and not picked up count as stale.
pub const STALE_ORDER_HOURS: i64 = 48;

/// Window for the volume alert.
pub const HIGH_VOLUME_WINDOW_MINUTES: i64 = 5;

/// Orders within the window at/above this count trip the alert.
pub const HIGH_VOLUME_THRESHOLD: i64 = 10;

/// How many out-of-stock events the alert feed returns.
const OUT_OF_STOCK_FEED_LIMIT: i64 = 20;

// ═══════════════════════════════════════════
// View types
// ═══════════════════════════════════════════

/// A logged shortage occurrence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutOfStockEvent {
    pub id: i64,
    pub medicine_name: String,
    pub document_id: Uuid,
    pub required: i64,
    pub available: i64,
    pub occurred_at: DateTime<Utc>,
}

/// An order past the stale horizon and still not picked up.
#[derive(Debug, Clone, Serialize)]
pub struct StaleOrder {
    pub order_id: Uuid,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Volume alert snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct HighVolumeAlert {
    pub orders_in_window: i64,
    pub threshold_exceeded: bool,
}

/// Per-status counts and average pickup latency over a date window.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub total_orders: i64,
    pub pending: i64,
    pub preparing: i64,
    pub picked_up: i64,
    /// Mean seconds from creation to pickup, 0 when nothing was picked up.
    pub avg_pickup_seconds: f64,
}

// ═══════════════════════════════════════════
// Recording
// ═══════════════════════════════════════════

/// Record one out-of-stock event per shortage of a failed reservation.
/// Runs outside the reservation transaction — the catalog stays
/// untouched while the events survive.
pub fn record_shortages(
    conn: &Connection,
    document_id: &Uuid,
    shortages: &[Shortage],
) -> Result<(), DatabaseError> {
    let now = Utc::now();
    for shortage in shortages {
        conn.execute(
            "INSERT INTO out_of_stock_events (medicine_name, document_id, required, available, occurred_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                shortage.name,
                document_id.to_string(),
                shortage.required,
                shortage.available,
                now,
            ],
        )?;
    }
    Ok(())
}

// ═══════════════════════════════════════════
// Queries
// ═══════════════════════════════════════════

/// Latest out-of-stock events, newest first.
pub fn recent_out_of_stock(conn: &Connection) -> Result<Vec<OutOfStockEvent>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, medicine_name, document_id, required, available, occurred_at
         FROM out_of_stock_events ORDER BY occurred_at DESC, id DESC LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![OUT_OF_STOCK_FEED_LIMIT], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, i64>(4)?,
            row.get::<_, DateTime<Utc>>(5)?,
        ))
    })?;

    let mut events = Vec::new();
    for row in rows {
        let (id, medicine_name, document_id, required, available, occurred_at) = row?;
        events.push(OutOfStockEvent {
            id,
            medicine_name,
            document_id: Uuid::parse_str(&document_id).map_err(|_| {
                DatabaseError::ConstraintViolation(format!("malformed uuid: {document_id}"))
            })?,
            required,
            available,
            occurred_at,
        });
    }
    Ok(events)
}

/// Orders created more than [`STALE_ORDER_HOURS`] before `now` and still
/// not picked up. Reporting only — no state transition happens.
pub fn stale_orders(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<StaleOrder>, DatabaseError> {
    let horizon = now - Duration::hours(STALE_ORDER_HOURS);
    let mut stmt = conn.prepare(
        "SELECT id, status, created_at FROM orders
         WHERE created_at < ?1 AND status != 'picked_up'
         ORDER BY created_at",
    )?;
    let rows = stmt.query_map(params![horizon], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, DateTime<Utc>>(2)?,
        ))
    })?;

    let mut stale = Vec::new();
    for row in rows {
        let (id, status, created_at) = row?;
        stale.push(StaleOrder {
            order_id: Uuid::parse_str(&id)
                .map_err(|_| DatabaseError::ConstraintViolation(format!("malformed uuid: {id}")))?,
            status,
            created_at,
        });
    }
    Ok(stale)
}

/// Count orders created within the volume window ending at `now`.
pub fn high_volume_alert(conn: &Connection, now: DateTime<Utc>) -> Result<HighVolumeAlert, DatabaseError> {
    let window_start = now - Duration::minutes(HIGH_VOLUME_WINDOW_MINUTES);
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM orders WHERE created_at >= ?1 AND created_at <= ?2",
        params![window_start, now],
        |row| row.get(0),
    )?;
    Ok(HighVolumeAlert {
        orders_in_window: count,
        threshold_exceeded: count >= HIGH_VOLUME_THRESHOLD,
    })
}

/// Aggregate order statistics for a date window.
pub fn queue_stats(
    conn: &Connection,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Result<QueueStats, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT status, created_at, updated_at FROM orders
         WHERE created_at >= ?1 AND created_at <= ?2",
    )?;
    let rows = stmt.query_map(params![from, to], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, DateTime<Utc>>(1)?,
            row.get::<_, DateTime<Utc>>(2)?,
        ))
    })?;

    let mut stats = QueueStats {
        from,
        to,
        total_orders: 0,
        pending: 0,
        preparing: 0,
        picked_up: 0,
        avg_pickup_seconds: 0.0,
    };
    let mut pickup_seconds = Vec::new();
    for row in rows {
        let (status, created_at, updated_at) = row?;
        stats.total_orders += 1;
        match status.as_str() {
            "pending" => stats.pending += 1,
            "preparing" => stats.preparing += 1,
            "picked_up" => {
                stats.picked_up += 1;
                pickup_seconds.push((updated_at - created_at).num_milliseconds() as f64 / 1000.0);
            }
            _ => {}
        }
    }
    if !pickup_seconds.is_empty() {
        stats.avg_pickup_seconds =
            pickup_seconds.iter().sum::<f64>() / pickup_seconds.len() as f64;
    }
    Ok(stats)
}

/// Items at or below their low-stock threshold.
pub fn low_stock_report(conn: &Connection) -> Result<Vec<InventoryItem>, DatabaseError> {
    inventory::low_stock_items(conn)
}
