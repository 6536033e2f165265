//! Catalog repository — the inventory table.
//!
//! Reads return snapshots in insertion (id) order so matching is
//! reproducible. The only quantity mutations are the guarded decrement
//! used by the reservation ledger and the admin set/upsert operations.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::{InventoryItem, NewInventoryItem};

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<InventoryItem> {
    Ok(InventoryItem {
        id: row.get(0)?,
        name: row.get(1)?,
        quantity: row.get(2)?,
        unit: row.get(3)?,
        low_stock_threshold: row.get(4)?,
        updated_at: row.get::<_, DateTime<Utc>>(5)?,
    })
}

const COLUMNS: &str = "id, name, quantity, unit, low_stock_threshold, updated_at";

pub fn insert_item(conn: &Connection, item: &NewInventoryItem) -> Result<InventoryItem, DatabaseError> {
    if item.name.trim().is_empty() {
        return Err(DatabaseError::ConstraintViolation("medicine name cannot be empty".into()));
    }
    conn.execute(
        "INSERT INTO inventory (name, quantity, unit, low_stock_threshold, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![item.name, item.quantity, item.unit, item.low_stock_threshold, Utc::now()],
    )?;
    let id = conn.last_insert_rowid();
    get_item(conn, id)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "inventory".into(),
        id: id.to_string(),
    })
}

pub fn get_item(conn: &Connection, id: i64) -> Result<Option<InventoryItem>, DatabaseError> {
    let item = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM inventory WHERE id = ?1"),
            params![id],
            map_row,
        )
        .optional()?;
    Ok(item)
}

/// Case-insensitive lookup by catalog key (the name column is NOCASE).
pub fn get_item_by_name(conn: &Connection, name: &str) -> Result<Option<InventoryItem>, DatabaseError> {
    let item = conn
        .query_row(
            &format!("SELECT {COLUMNS} FROM inventory WHERE name = ?1"),
            params![name],
            map_row,
        )
        .optional()?;
    Ok(item)
}

/// Full catalog snapshot in insertion order.
pub fn list_items(conn: &Connection) -> Result<Vec<InventoryItem>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM inventory ORDER BY id"))?;
    let rows = stmt.query_map([], map_row)?;
    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

pub fn set_quantity(conn: &Connection, id: i64, quantity: i64) -> Result<InventoryItem, DatabaseError> {
    if quantity < 0 {
        return Err(DatabaseError::ConstraintViolation("quantity cannot be negative".into()));
    }
    let changed = conn.execute(
        "UPDATE inventory SET quantity = ?1, updated_at = ?2 WHERE id = ?3",
        params![quantity, Utc::now(), id],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "inventory".into(),
            id: id.to_string(),
        });
    }
    get_item(conn, id)?.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "inventory".into(),
        id: id.to_string(),
    })
}

pub fn delete_item(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM inventory WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "inventory".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Upsert used by the CSV import: add to the quantity when the name
/// already exists (case-insensitive), insert a fresh row otherwise.
pub fn add_quantity_by_name(
    conn: &Connection,
    name: &str,
    quantity: i64,
    unit: &str,
) -> Result<InventoryItem, DatabaseError> {
    match get_item_by_name(conn, name)? {
        Some(existing) => set_quantity(conn, existing.id, existing.quantity + quantity),
        None => insert_item(
            conn,
            &NewInventoryItem {
                name: name.to_string(),
                quantity,
                unit: unit.to_string(),
                low_stock_threshold: 0,
            },
        ),
    }
}

/// Guarded decrement: succeeds only when enough stock remains.
/// Returns false (and changes nothing) when the row is missing or short.
pub fn decrement_quantity(conn: &Connection, id: i64, amount: i64) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE inventory SET quantity = quantity - ?1, updated_at = ?2
         WHERE id = ?3 AND quantity >= ?1",
        params![amount, Utc::now(), id],
    )?;
    Ok(changed == 1)
}

/// Items at or below their low-stock threshold (admin report).
pub fn low_stock_items(conn: &Connection) -> Result<Vec<InventoryItem>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM inventory WHERE quantity <= low_stock_threshold ORDER BY id"
    ))?;
    let rows = stmt.query_map([], map_row)?;
    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}
