//! Order lifecycle: `pending → preparing → picked_up`.
//!
//! Transitions are one-directional, never skip a state, and are applied
//! as guarded UPDATEs so each order's read-check-write is atomic.
//! Physical handoff is gated by a 6-digit one-time code generated at
//! order creation; pickup lookups take the (order id, OTP) pair and do
//! not reveal which half was wrong.

use chrono::{DateTime, Utc};
use rand::Rng;
use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::repository::orders as order_repo;
use crate::db::DatabaseError;
use crate::ledger::ReservedItem;
use crate::models::enums::OrderStatus;
use crate::models::{Order, OrderItem};

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Invalid transition from {}", .from.as_str())]
    InvalidTransition { from: OrderStatus },

    #[error("Order not found")]
    NotFound,

    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
}

/// Generate a 6-digit numeric one-time code.
///
/// Uniform random digits; uniqueness across pending orders is not
/// enforced — pickup is keyed by the (order id, OTP) pair, so a
/// cross-order collision cannot authorize the wrong order.
pub fn generate_otp() -> String {
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(0..1_000_000u32))
}

/// Create a pending order for a cleared reservation.
pub fn create_order(
    conn: &Connection,
    source_document_id: Uuid,
    owner_id: i64,
    reserved: &[ReservedItem],
) -> Result<Order, OrderError> {
    let now = Utc::now();
    let order = Order {
        id: Uuid::new_v4(),
        source_document_id,
        owner_id,
        items: reserved
            .iter()
            .map(|item| OrderItem {
                name: item.name.clone(),
                kind: item.kind,
                quantity: item.quantity,
            })
            .collect(),
        otp_code: generate_otp(),
        status: OrderStatus::Pending,
        assigned_worker_id: None,
        created_at: now,
        updated_at: now,
    };
    order_repo::insert_order(conn, &order)?;
    tracing::info!(order_id = %order.id, "Order created, awaiting packing");
    Ok(order)
}

/// Move a pending order to preparing, assigning the packing worker.
///
/// Fails with `InvalidTransition` from any other state. The status
/// check and the write are one guarded UPDATE.
pub fn begin_preparing(
    conn: &Connection,
    order_id: &Uuid,
    worker_id: i64,
) -> Result<Order, OrderError> {
    let changed = conn
        .execute(
            "UPDATE orders SET status = ?1, assigned_worker_id = ?2, updated_at = ?3
             WHERE id = ?4 AND status = ?5",
            params![
                OrderStatus::Preparing.as_str(),
                worker_id,
                Utc::now(),
                order_id.to_string(),
                OrderStatus::Pending.as_str(),
            ],
        )
        .map_err(DatabaseError::from)?;

    if changed == 0 {
        return match order_repo::get_order(conn, order_id)? {
            Some(order) => Err(OrderError::InvalidTransition { from: order.status }),
            None => Err(OrderError::NotFound),
        };
    }

    tracing::info!(order_id = %order_id, worker_id, "Order moved to preparing");
    fetch(conn, order_id)
}

/// Confirm physical pickup with the one-time code.
///
/// The (id, OTP) pair must match a record; a miss on either half is
/// `NotFound` — deliberately indistinct to avoid OTP enumeration.
/// Only a preparing order can be handed out; the state machine never
/// skips `preparing`.
pub fn confirm_pickup(conn: &Connection, order_id: &Uuid, otp_code: &str) -> Result<Order, OrderError> {
    let order = order_repo::get_order_by_id_and_otp(conn, order_id, otp_code)?
        .ok_or(OrderError::NotFound)?;

    let changed = conn
        .execute(
            "UPDATE orders SET status = ?1, updated_at = ?2
             WHERE id = ?3 AND otp_code = ?4 AND status = ?5",
            params![
                OrderStatus::PickedUp.as_str(),
                Utc::now(),
                order_id.to_string(),
                otp_code,
                OrderStatus::Preparing.as_str(),
            ],
        )
        .map_err(DatabaseError::from)?;

    if changed == 0 {
        return Err(OrderError::InvalidTransition { from: order.status });
    }

    tracing::info!(order_id = %order_id, "Order picked up");
    fetch(conn, order_id)
}

/// Pending orders in creation order — the packing desk view.
pub fn pending_orders(conn: &Connection) -> Result<Vec<Order>, OrderError> {
    Ok(order_repo::list_orders_by_status(conn, OrderStatus::Pending)?)
}

/// Whether an order counts as stale for reporting: older than the given
/// horizon and never picked up. Derived fact only — no transition happens.
pub fn is_stale(order: &Order, now: DateTime<Utc>, horizon: chrono::Duration) -> bool {
    order.status != OrderStatus::PickedUp && now - order.created_at > horizon
}

fn fetch(conn: &Connection, order_id: &Uuid) -> Result<Order, OrderError> {
    order_repo::get_order(conn, order_id)?.ok_or(OrderError::NotFound)
}
