use serde::{Deserialize, Serialize};

use super::enums::ItemKind;
use super::inventory::InventoryItem;

/// A candidate medicine parsed from one prescription line.
///
/// `strength` carries the dose as written ("500mg"); `quantity` is the
/// number of packs to reserve — prescriptions don't state pack counts,
/// so extraction defaults it to 1 per de-duplicated line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedLineItem {
    pub raw_name: String,
    pub name: String,
    pub strength: String,
    pub quantity: i64,
    pub kind: ItemKind,
}

/// Outcome of matching one extracted item against the catalog snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct MatchResult {
    pub line_item: ExtractedLineItem,
    /// `None` when neither substring nor fuzzy matching found a catalog row.
    pub matched: Option<InventoryItem>,
    /// 1.0 for substring hits, the similarity ratio for fuzzy hits, 0.0 for misses.
    pub confidence: f64,
}

/// One uncoverable item from a failed reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortage {
    pub name: String,
    pub available: i64,
    pub required: i64,
}
