//! Atomic stock reservation.
//!
//! One submission's match results are validated and applied as a single
//! all-or-nothing transaction: either every requested quantity is
//! decremented, or the catalog is left byte-for-byte unchanged and the
//! full shortage list is returned. Two submissions racing for the last
//! unit of an item cannot both succeed — the check and the decrement
//! happen inside the same immediate transaction.

use rusqlite::{Connection, TransactionBehavior};

use crate::db::repository::inventory;
use crate::db::DatabaseError;
use crate::models::enums::ItemKind;
use crate::models::{MatchResult, Shortage};

/// A successfully reserved item, handed to the queue for estimation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReservedItem {
    pub name: String,
    pub kind: ItemKind,
    pub quantity: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Insufficient stock for {} item(s)", .0.len())]
    InsufficientStock(Vec<Shortage>),

    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
}

/// Reserve stock for a full submission.
///
/// Unmatched items and items with less stock than requested become
/// shortages; any shortage fails the whole reservation with nothing
/// mutated. A transient busy/locked storage error is retried once.
pub fn reserve(
    conn: &mut Connection,
    matches: &[MatchResult],
) -> Result<Vec<ReservedItem>, LedgerError> {
    match try_reserve(conn, matches) {
        Err(LedgerError::Storage(err)) if err.is_busy() => {
            tracing::warn!("Reservation hit a busy database, retrying once");
            try_reserve(conn, matches)
        }
        other => other,
    }
}

fn try_reserve(
    conn: &mut Connection,
    matches: &[MatchResult],
) -> Result<Vec<ReservedItem>, LedgerError> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(DatabaseError::from)?;

    // Validation pass: re-read current stock inside the transaction, not
    // from the matcher's snapshot — stock may have moved since.
    let mut shortages = Vec::new();
    let mut coverable = Vec::new();
    for result in matches {
        let required = result.line_item.quantity;
        let current = match &result.matched {
            Some(matched) => inventory::get_item(&tx, matched.id).map_err(LedgerError::Storage)?,
            None => None,
        };
        match current {
            Some(item) if item.quantity >= required => coverable.push((item, required)),
            Some(item) => shortages.push(Shortage {
                name: item.name.clone(),
                available: item.quantity,
                required,
            }),
            None => shortages.push(Shortage {
                name: result.line_item.name.clone(),
                available: 0,
                required,
            }),
        }
    }

    if !shortages.is_empty() {
        // Transaction drops here without commit; nothing was written.
        tracing::warn!(count = shortages.len(), "Reservation rejected on shortages");
        return Err(LedgerError::InsufficientStock(shortages));
    }

    for (item, required) in &coverable {
        let applied = inventory::decrement_quantity(&tx, item.id, *required)
            .map_err(LedgerError::Storage)?;
        if !applied {
            // Can only happen if stock moved under us inside the
            // transaction window; treat as a conflict, not a shortage.
            return Err(LedgerError::Storage(DatabaseError::ConstraintViolation(
                format!("concurrent stock change on {}", item.name),
            )));
        }
    }

    tx.commit().map_err(DatabaseError::from)?;

    let reserved = coverable
        .into_iter()
        .map(|(item, required)| ReservedItem {
            kind: ItemKind::classify(&item.name),
            name: item.name,
            quantity: required,
        })
        .collect();
    tracing::info!("Reserved stock for {} item(s)", matches.len());
    Ok(reserved)
}
