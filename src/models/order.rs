use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{ItemKind, OrderStatus};

/// A fulfillment order created once a submission clears reservation.
///
/// Terminal at `PickedUp`; transitions are one-directional and gated by
/// the functions in `crate::orders`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub source_document_id: Uuid,
    pub owner_id: i64,
    pub items: Vec<OrderItem>,
    pub otp_code: String,
    pub status: OrderStatus,
    pub assigned_worker_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A reserved line item, denormalized onto the order at creation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub name: String,
    pub kind: ItemKind,
    pub quantity: i64,
}

/// What the caller gets back from a successful submission.
/// The OTP is echoed here once; pickup confirmation never returns it.
#[derive(Debug, Clone, Serialize)]
pub struct OrderReceipt {
    pub order_id: Uuid,
    pub otp_code: String,
    pub estimated_wait_seconds: f64,
    pub queue_position: i64,
}
