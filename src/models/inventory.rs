use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A catalog row: one medicine and its available stock.
///
/// `name` is the catalog key (unique, case-insensitive). `quantity` is
/// mutated only by the reservation ledger and the admin operations; it
/// never goes negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: i64,
    pub name: String,
    pub quantity: i64,
    pub unit: String,
    pub low_stock_threshold: i64,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a catalog row.
#[derive(Debug, Clone, Deserialize)]
pub struct NewInventoryItem {
    pub name: String,
    pub quantity: i64,
    pub unit: String,
    pub low_stock_threshold: i64,
}
