//! Order repository — orders and their denormalized line items.
//!
//! Plain create/get/list/delete by id. The guarded status transitions
//! live in `crate::orders`, next to the state machine rules they enforce.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::{ItemKind, OrderStatus};
use crate::models::{Order, OrderItem};

struct OrderRow {
    id: String,
    source_document_id: String,
    owner_id: i64,
    otp_code: String,
    status: String,
    assigned_worker_id: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const COLUMNS: &str =
    "id, source_document_id, owner_id, otp_code, status, assigned_worker_id, created_at, updated_at";

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<OrderRow> {
    Ok(OrderRow {
        id: row.get(0)?,
        source_document_id: row.get(1)?,
        owner_id: row.get(2)?,
        otp_code: row.get(3)?,
        status: row.get(4)?,
        assigned_worker_id: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn parse_uuid(s: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(s).map_err(|_| DatabaseError::ConstraintViolation(format!("malformed uuid: {s}")))
}

fn into_order(conn: &Connection, row: OrderRow) -> Result<Order, DatabaseError> {
    let id = parse_uuid(&row.id)?;
    Ok(Order {
        id,
        source_document_id: parse_uuid(&row.source_document_id)?,
        owner_id: row.owner_id,
        items: load_items(conn, &id)?,
        otp_code: row.otp_code,
        status: OrderStatus::from_str(&row.status)?,
        assigned_worker_id: row.assigned_worker_id,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn load_items(conn: &Connection, order_id: &Uuid) -> Result<Vec<OrderItem>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT name, kind, quantity FROM order_items WHERE order_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![order_id.to_string()], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
        ))
    })?;
    let mut items = Vec::new();
    for row in rows {
        let (name, kind, quantity) = row?;
        items.push(OrderItem {
            name,
            kind: ItemKind::from_str(&kind)?,
            quantity,
        });
    }
    Ok(items)
}

pub fn insert_order(conn: &Connection, order: &Order) -> Result<(), DatabaseError> {
    conn.execute(
        &format!("INSERT INTO orders ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
        params![
            order.id.to_string(),
            order.source_document_id.to_string(),
            order.owner_id,
            order.otp_code,
            order.status.as_str(),
            order.assigned_worker_id,
            order.created_at,
            order.updated_at,
        ],
    )?;
    for item in &order.items {
        conn.execute(
            "INSERT INTO order_items (order_id, name, kind, quantity) VALUES (?1, ?2, ?3, ?4)",
            params![order.id.to_string(), item.name, item.kind.as_str(), item.quantity],
        )?;
    }
    Ok(())
}

pub fn get_order(conn: &Connection, id: &Uuid) -> Result<Option<Order>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM orders WHERE id = ?1"),
            params![id.to_string()],
            map_row,
        )
        .optional()?;
    match row {
        Some(row) => Ok(Some(into_order(conn, row)?)),
        None => Ok(None),
    }
}

/// Lookup by (id, OTP) pair — the pickup gate. A miss on either field
/// returns None; callers must not distinguish which field was wrong.
pub fn get_order_by_id_and_otp(
    conn: &Connection,
    id: &Uuid,
    otp_code: &str,
) -> Result<Option<Order>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM orders WHERE id = ?1 AND otp_code = ?2"),
            params![id.to_string(), otp_code],
            map_row,
        )
        .optional()?;
    match row {
        Some(row) => Ok(Some(into_order(conn, row)?)),
        None => Ok(None),
    }
}

pub fn list_orders_by_status(
    conn: &Connection,
    status: OrderStatus,
) -> Result<Vec<Order>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM orders WHERE status = ?1 ORDER BY created_at"
    ))?;
    let rows = stmt.query_map(params![status.as_str()], map_row)?;
    let mut raw = Vec::new();
    for row in rows {
        raw.push(row?);
    }
    raw.into_iter().map(|row| into_order(conn, row)).collect()
}

pub fn delete_order(conn: &Connection, id: &Uuid) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM orders WHERE id = ?1", params![id.to_string()])?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "order".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}
