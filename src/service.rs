//! Fulfillment orchestrator.
//!
//! Single entry point that drives a submission through the pipeline:
//! extract text → parse line items → match against the catalog →
//! reserve stock → enqueue for packing → create the OTP-gated order.
//! Also hosts the role-gated pharmacist/admin operations around it.

use std::io::Read;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::alerts::{self, HighVolumeAlert, OutOfStockEvent, QueueStats, StaleOrder};
use crate::authorization::{require_role, AuthorizationError, Caller};
use crate::db::repository::inventory;
use crate::db::{self, DatabaseError};
use crate::extract::{extract_line_items, DocumentTextSource, ExtractionError};
use crate::ledger::{self, LedgerError};
use crate::matcher;
use crate::models::enums::Role;
use crate::models::{
    InventoryItem, NewInventoryItem, Order, OrderReceipt, QueueListing, Shortage,
};
use crate::orders::{self, OrderError};
use crate::queue::{FulfillmentQueue, PackingEstimator, QueueError, RandomizedEstimator};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors surfaced to callers of the fulfillment service.
///
/// All variants are recoverable business outcomes reported synchronously;
/// storage conflicts are retried once at the ledger boundary before they
/// show up here.
#[derive(Debug, thiserror::Error)]
pub enum FulfillmentError {
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("No medicines found in document")]
    NoMedicinesFound,

    #[error("Insufficient stock for {} item(s)", .0.len())]
    InsufficientStock(Vec<Shortage>),

    #[error("Invalid transition from {}", .from.as_str())]
    InvalidTransition { from: crate::models::enums::OrderStatus },

    #[error("Order not found")]
    NotFound,

    #[error(transparent)]
    Forbidden(#[from] AuthorizationError),

    #[error("Catalog import failed: {0}")]
    Import(#[from] csv::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] DatabaseError),
}

impl From<OrderError> for FulfillmentError {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::InvalidTransition { from } => FulfillmentError::InvalidTransition { from },
            OrderError::NotFound => FulfillmentError::NotFound,
            OrderError::Storage(err) => FulfillmentError::Storage(err),
        }
    }
}

impl From<QueueError> for FulfillmentError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::LockPoisoned => FulfillmentError::Storage(
                DatabaseError::ConstraintViolation("queue lock poisoned".into()),
            ),
            QueueError::Storage(err) => FulfillmentError::Storage(err),
        }
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Shared fulfillment state: one catalog/order store and one packing
/// queue, safe for concurrent request-handling workers.
pub struct FulfillmentService {
    conn: Mutex<Connection>,
    queue: FulfillmentQueue,
}

impl FulfillmentService {
    /// Build on an already-opened store, rehydrating the queue.
    pub fn new(
        conn: Connection,
        estimator: Box<dyn PackingEstimator>,
    ) -> Result<Self, DatabaseError> {
        let queue = FulfillmentQueue::load(estimator, &conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            queue,
        })
    }

    /// Open (or create) the pharmacy database at `path` with the
    /// production randomized estimator.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        let conn = db::open_database(path)?;
        Self::new(conn, Box::new(RandomizedEstimator))
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, FulfillmentError> {
        self.conn.lock().map_err(|_| {
            FulfillmentError::Storage(DatabaseError::ConstraintViolation(
                "connection lock poisoned".into(),
            ))
        })
    }

    // ── Submission ──────────────────────────────────────────

    /// Route a scanned prescription through fulfillment.
    ///
    /// Patients submit their own documents. On success the stock is
    /// reserved, the order sits in the packing queue, and the receipt
    /// carries the OTP for pickup.
    pub fn submit_prescription(
        &self,
        caller: &Caller,
        document_id: Uuid,
        source: &dyn DocumentTextSource,
    ) -> Result<OrderReceipt, FulfillmentError> {
        require_role(caller, Role::Patient)?;

        let raw_text = source.extract_text(&document_id)?;
        let items = extract_line_items(&raw_text);
        if items.is_empty() {
            tracing::info!(document_id = %document_id, "No medicines found in document");
            return Err(FulfillmentError::NoMedicinesFound);
        }

        let mut conn = self.conn()?;
        let catalog = inventory::list_items(&conn)?;
        let matches = matcher::match_items(&items, &catalog);

        let reserved = match ledger::reserve(&mut conn, &matches) {
            Ok(reserved) => reserved,
            Err(LedgerError::InsufficientStock(shortages)) => {
                alerts::record_shortages(&conn, &document_id, &shortages)?;
                return Err(FulfillmentError::InsufficientStock(shortages));
            }
            Err(LedgerError::Storage(err)) => return Err(FulfillmentError::Storage(err)),
        };

        let order = orders::create_order(&conn, document_id, caller.id, &reserved)?;
        let outcome = self.queue.enqueue(&conn, &order)?;

        tracing::info!(
            order_id = %order.id,
            position = outcome.position,
            "Submission fulfilled and queued"
        );
        Ok(OrderReceipt {
            order_id: order.id,
            otp_code: order.otp_code,
            estimated_wait_seconds: outcome.cumulative_estimated_seconds,
            queue_position: outcome.position,
        })
    }

    // ── Queue views ─────────────────────────────────────────

    /// Ordered queue listing.
    pub fn queue_listing(&self) -> Vec<QueueListing> {
        self.queue.listing()
    }

    /// 1-based position of an order, -1 when not queued.
    pub fn queue_position(&self, order_id: &Uuid) -> i64 {
        self.queue.position(order_id)
    }

    /// Cumulative wait of the whole queue.
    pub fn total_wait_seconds(&self) -> f64 {
        self.queue.total_wait_seconds()
    }

    // ── Order lifecycle ─────────────────────────────────────

    /// Pharmacist pulls the pending orders for the packing desk.
    pub fn pending_orders(&self, caller: &Caller) -> Result<Vec<Order>, FulfillmentError> {
        require_role(caller, Role::Pharmacist)?;
        let conn = self.conn()?;
        Ok(orders::pending_orders(&conn)?)
    }

    /// Pharmacist starts packing an order.
    pub fn begin_preparing(
        &self,
        caller: &Caller,
        order_id: &Uuid,
    ) -> Result<Order, FulfillmentError> {
        require_role(caller, Role::Pharmacist)?;
        let conn = self.conn()?;
        Ok(orders::begin_preparing(&conn, order_id, caller.id)?)
    }

    /// Confirm handoff with the one-time code. Success or failure only;
    /// the OTP is never echoed back.
    pub fn confirm_pickup(&self, order_id: &Uuid, otp_code: &str) -> Result<(), FulfillmentError> {
        let conn = self.conn()?;
        orders::confirm_pickup(&conn, order_id, otp_code)?;
        self.queue.remove(&conn, order_id)?;
        Ok(())
    }

    // ── Catalog administration ──────────────────────────────

    pub fn list_inventory(&self, caller: &Caller) -> Result<Vec<InventoryItem>, FulfillmentError> {
        require_role(caller, Role::Admin)?;
        let conn = self.conn()?;
        Ok(inventory::list_items(&conn)?)
    }

    pub fn add_medicine(
        &self,
        caller: &Caller,
        item: &NewInventoryItem,
    ) -> Result<InventoryItem, FulfillmentError> {
        require_role(caller, Role::Admin)?;
        let conn = self.conn()?;
        Ok(inventory::insert_item(&conn, item)?)
    }

    pub fn update_medicine_quantity(
        &self,
        caller: &Caller,
        item_id: i64,
        quantity: i64,
    ) -> Result<InventoryItem, FulfillmentError> {
        require_role(caller, Role::Admin)?;
        let conn = self.conn()?;
        Ok(inventory::set_quantity(&conn, item_id, quantity)?)
    }

    pub fn delete_medicine(&self, caller: &Caller, item_id: i64) -> Result<(), FulfillmentError> {
        require_role(caller, Role::Admin)?;
        let conn = self.conn()?;
        Ok(inventory::delete_item(&conn, item_id)?)
    }

    /// Fuzzy catalog search for the admin/pharmacist search box.
    pub fn find_medicine(
        &self,
        caller: &Caller,
        name: &str,
    ) -> Result<Option<InventoryItem>, FulfillmentError> {
        require_role(caller, Role::Pharmacist)?;
        let conn = self.conn()?;
        let catalog = inventory::list_items(&conn)?;
        Ok(matcher::search_catalog(name, &catalog).map(|(item, _)| item.clone()))
    }

    /// Bulk import stock from CSV with `medicine_name,quantity,unit`
    /// headers. Existing names (case-insensitive) get the quantity added;
    /// new names become fresh rows. Returns the number of rows applied.
    pub fn import_catalog_csv<R: Read>(
        &self,
        caller: &Caller,
        reader: R,
    ) -> Result<usize, FulfillmentError> {
        require_role(caller, Role::Admin)?;
        let conn = self.conn()?;

        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let name_idx = headers.iter().position(|h| h == "medicine_name");
        let qty_idx = headers.iter().position(|h| h == "quantity");
        let unit_idx = headers.iter().position(|h| h == "unit");

        let mut applied = 0;
        for record in csv_reader.records() {
            let record = record?;
            let Some(name) = name_idx.and_then(|i| record.get(i)).filter(|n| !n.is_empty())
            else {
                continue;
            };
            let quantity = qty_idx
                .and_then(|i| record.get(i))
                .and_then(|q| q.parse::<i64>().ok())
                .unwrap_or(0);
            let unit = unit_idx.and_then(|i| record.get(i)).unwrap_or("units");

            inventory::add_quantity_by_name(&conn, name, quantity, unit)?;
            applied += 1;
        }
        tracing::info!(applied, "Catalog CSV import finished");
        Ok(applied)
    }

    // ── Admin reporting ─────────────────────────────────────

    pub fn out_of_stock_alerts(
        &self,
        caller: &Caller,
    ) -> Result<Vec<OutOfStockEvent>, FulfillmentError> {
        require_role(caller, Role::Admin)?;
        let conn = self.conn()?;
        Ok(alerts::recent_out_of_stock(&conn)?)
    }

    pub fn stale_orders(&self, caller: &Caller) -> Result<Vec<StaleOrder>, FulfillmentError> {
        require_role(caller, Role::Admin)?;
        let conn = self.conn()?;
        Ok(alerts::stale_orders(&conn, Utc::now())?)
    }

    pub fn high_volume_alert(&self, caller: &Caller) -> Result<HighVolumeAlert, FulfillmentError> {
        require_role(caller, Role::Admin)?;
        let conn = self.conn()?;
        Ok(alerts::high_volume_alert(&conn, Utc::now())?)
    }

    pub fn queue_stats(
        &self,
        caller: &Caller,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<QueueStats, FulfillmentError> {
        require_role(caller, Role::Admin)?;
        let conn = self.conn()?;
        Ok(alerts::queue_stats(&conn, from, to)?)
    }

    pub fn low_stock_report(&self, caller: &Caller) -> Result<Vec<InventoryItem>, FulfillmentError> {
        require_role(caller, Role::Admin)?;
        let conn = self.conn()?;
        Ok(alerts::low_stock_report(&conn)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::models::enums::{ItemKind, OrderStatus};
    use crate::queue::BASE_BUFFER_SECS;

    /// Canned text source for tests.
    struct FixedText(&'static str);

    impl DocumentTextSource for FixedText {
        fn extract_text(&self, _document_id: &Uuid) -> Result<String, ExtractionError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingText;

    impl DocumentTextSource for FailingText {
        fn extract_text(&self, _document_id: &Uuid) -> Result<String, ExtractionError> {
            Err(ExtractionError::Failed("scanner offline".into()))
        }
    }

    struct FixedEstimator(u32);

    impl PackingEstimator for FixedEstimator {
        fn estimate(&self, _kind: ItemKind) -> u32 {
            self.0
        }
    }

    fn service() -> FulfillmentService {
        let conn = open_memory_database().unwrap();
        FulfillmentService::new(conn, Box::new(FixedEstimator(20))).unwrap()
    }

    fn patient() -> Caller {
        Caller::new(1, Role::Patient)
    }

    fn pharmacist() -> Caller {
        Caller::new(50, Role::Pharmacist)
    }

    fn admin() -> Caller {
        Caller::new(99, Role::Admin)
    }

    fn seed_catalog(service: &FulfillmentService, name: &str, quantity: i64) -> InventoryItem {
        service
            .add_medicine(
                &admin(),
                &NewInventoryItem {
                    name: name.into(),
                    quantity,
                    unit: "units".into(),
                    low_stock_threshold: 0,
                },
            )
            .unwrap()
    }

    #[test]
    fn submission_reserves_enqueues_and_returns_receipt() {
        let service = service();
        let item = seed_catalog(&service, "Paracetamol", 5);

        let receipt = service
            .submit_prescription(&patient(), Uuid::new_v4(), &FixedText("Paracetamol 500mg"))
            .unwrap();

        assert_eq!(receipt.queue_position, 1);
        assert_eq!(receipt.estimated_wait_seconds, BASE_BUFFER_SECS + 20.0);
        assert_eq!(receipt.otp_code.len(), 6);

        // one unit reserved
        let catalog = service.list_inventory(&admin()).unwrap();
        assert_eq!(catalog.iter().find(|i| i.id == item.id).unwrap().quantity, 4);
        assert_eq!(service.queue_position(&receipt.order_id), 1);
    }

    #[test]
    fn submission_requires_patient_role() {
        let service = service();
        let result =
            service.submit_prescription(&pharmacist(), Uuid::new_v4(), &FixedText("x 1mg"));
        assert!(matches!(result, Err(FulfillmentError::Forbidden(_))));
    }

    #[test]
    fn extraction_failure_surfaces_as_business_outcome() {
        let service = service();
        let result = service.submit_prescription(&patient(), Uuid::new_v4(), &FailingText);
        assert!(matches!(result, Err(FulfillmentError::Extraction(_))));
    }

    #[test]
    fn empty_extraction_is_no_medicines_found() {
        let service = service();
        let result = service.submit_prescription(
            &patient(),
            Uuid::new_v4(),
            &FixedText("Patient: John Doe\nDate: 2026-08-06"),
        );
        assert!(matches!(result, Err(FulfillmentError::NoMedicinesFound)));
    }

    #[test]
    fn shortage_aborts_whole_submission_and_logs_event() {
        let service = service();
        seed_catalog(&service, "Paracetamol", 5);
        seed_catalog(&service, "Insulin Injection", 0);

        let result = service.submit_prescription(
            &patient(),
            Uuid::new_v4(),
            &FixedText("Paracetamol 500mg\nInsulin Injection 10ml"),
        );
        let Err(FulfillmentError::InsufficientStock(shortages)) = result else {
            panic!("expected InsufficientStock");
        };
        assert_eq!(shortages.len(), 1);

        // nothing reserved, nothing queued, event logged
        let catalog = service.list_inventory(&admin()).unwrap();
        assert_eq!(catalog[0].quantity, 5);
        assert!(service.queue_listing().is_empty());
        assert_eq!(service.out_of_stock_alerts(&admin()).unwrap().len(), 1);
    }

    #[test]
    fn pickup_flow_removes_queue_entry() {
        let service = service();
        seed_catalog(&service, "Paracetamol", 5);
        let receipt = service
            .submit_prescription(&patient(), Uuid::new_v4(), &FixedText("Paracetamol 500mg"))
            .unwrap();

        service.begin_preparing(&pharmacist(), &receipt.order_id).unwrap();
        service.confirm_pickup(&receipt.order_id, &receipt.otp_code).unwrap();

        assert_eq!(service.queue_position(&receipt.order_id), -1);
        assert!(service.queue_listing().is_empty());
    }

    #[test]
    fn wrong_otp_keeps_order_queued() {
        let service = service();
        seed_catalog(&service, "Paracetamol", 5);
        let receipt = service
            .submit_prescription(&patient(), Uuid::new_v4(), &FixedText("Paracetamol 500mg"))
            .unwrap();
        service.begin_preparing(&pharmacist(), &receipt.order_id).unwrap();

        let wrong = if receipt.otp_code == "000000" { "000001" } else { "000000" };
        assert!(matches!(
            service.confirm_pickup(&receipt.order_id, wrong),
            Err(FulfillmentError::NotFound)
        ));
        assert_eq!(service.queue_position(&receipt.order_id), 1);
    }

    #[test]
    fn successive_submissions_accumulate_wait() {
        let service = service();
        seed_catalog(&service, "Paracetamol", 5);
        seed_catalog(&service, "Cetirizine", 5);

        let first = service
            .submit_prescription(&patient(), Uuid::new_v4(), &FixedText("Paracetamol 500mg"))
            .unwrap();
        let second = service
            .submit_prescription(&patient(), Uuid::new_v4(), &FixedText("Cetirizine 10mg"))
            .unwrap();

        assert_eq!(first.estimated_wait_seconds, BASE_BUFFER_SECS + 20.0);
        assert_eq!(second.estimated_wait_seconds, BASE_BUFFER_SECS + 40.0);
        assert_eq!(second.queue_position, 2);
        assert_eq!(service.total_wait_seconds(), BASE_BUFFER_SECS + 40.0);
    }

    #[test]
    fn csv_import_upserts_quantities() {
        let service = service();
        seed_catalog(&service, "Paracetamol", 5);

        let csv_data = "medicine_name,quantity,unit\nParacetamol,10,units\nCetirizine,7,units\n";
        let applied = service
            .import_catalog_csv(&admin(), csv_data.as_bytes())
            .unwrap();
        assert_eq!(applied, 2);

        let catalog = service.list_inventory(&admin()).unwrap();
        assert_eq!(catalog[0].quantity, 15);
        assert_eq!(catalog[1].name, "Cetirizine");
        assert_eq!(catalog[1].quantity, 7);
    }

    #[test]
    fn csv_import_is_admin_only() {
        let service = service();
        let result = service.import_catalog_csv(&pharmacist(), "medicine_name\n".as_bytes());
        assert!(matches!(result, Err(FulfillmentError::Forbidden(_))));
    }

    #[test]
    fn pending_orders_visible_to_pharmacist_only() {
        let service = service();
        seed_catalog(&service, "Paracetamol", 5);
        service
            .submit_prescription(&patient(), Uuid::new_v4(), &FixedText("Paracetamol 500mg"))
            .unwrap();

        let pending = service.pending_orders(&pharmacist()).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].status, OrderStatus::Pending);
        assert!(service.pending_orders(&patient()).is_err());
    }

    #[test]
    fn fuzzy_find_medicine_uses_general_threshold() {
        let service = service();
        seed_catalog(&service, "Cetirizine", 5);

        let found = service.find_medicine(&pharmacist(), "cetirazine").unwrap();
        assert_eq!(found.unwrap().name, "Cetirizine");
        assert!(service.find_medicine(&pharmacist(), "xyzzy").unwrap().is_none());
    }

    #[test]
    fn queue_survives_service_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pharmacy.db");

        let receipt = {
            let conn = db::open_database(&path).unwrap();
            let service = FulfillmentService::new(conn, Box::new(FixedEstimator(20))).unwrap();
            seed_catalog(&service, "Paracetamol", 5);
            service
                .submit_prescription(&patient(), Uuid::new_v4(), &FixedText("Paracetamol 500mg"))
                .unwrap()
        };

        let conn = db::open_database(&path).unwrap();
        let reopened = FulfillmentService::new(conn, Box::new(FixedEstimator(20))).unwrap();
        assert_eq!(reopened.queue_position(&receipt.order_id), 1);
        assert_eq!(
            reopened.total_wait_seconds(),
            receipt.estimated_wait_seconds
        );
    }

    #[test]
    fn concurrent_submissions_for_last_unit_admit_one() {
        use std::sync::Arc;
        use std::thread;

        let service = Arc::new(service());
        seed_catalog(&service, "Paracetamol", 1);

        let mut handles = Vec::new();
        for _ in 0..2 {
            let service = Arc::clone(&service);
            handles.push(thread::spawn(move || {
                service
                    .submit_prescription(
                        &patient(),
                        Uuid::new_v4(),
                        &FixedText("Paracetamol 500mg"),
                    )
                    .is_ok()
            }));
        }

        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);

        let catalog = service.list_inventory(&admin()).unwrap();
        assert_eq!(catalog[0].quantity, 0);
        assert_eq!(service.queue_listing().len(), 1);
    }

    #[test]
    fn admin_maintains_catalog_and_reads_reports() {
        let service = service();
        let item = seed_catalog(&service, "Paracetamol", 5);
        seed_catalog(&service, "Cetirizine", 5);

        let updated = service
            .update_medicine_quantity(&admin(), item.id, 1)
            .unwrap();
        assert_eq!(updated.quantity, 1);

        service
            .submit_prescription(&patient(), Uuid::new_v4(), &FixedText("Cetirizine 10mg"))
            .unwrap();

        let stats = service
            .queue_stats(
                &admin(),
                Utc::now() - chrono::Duration::hours(1),
                Utc::now() + chrono::Duration::hours(1),
            )
            .unwrap();
        assert_eq!(stats.total_orders, 1);
        assert_eq!(stats.pending, 1);

        let volume = service.high_volume_alert(&admin()).unwrap();
        assert_eq!(volume.orders_in_window, 1);
        assert!(!volume.threshold_exceeded);

        assert!(service.stale_orders(&admin()).unwrap().is_empty());
        assert!(service.low_stock_report(&admin()).unwrap().is_empty());

        let second = service.list_inventory(&admin()).unwrap()[1].clone();
        service.delete_medicine(&admin(), second.id).unwrap();
        assert_eq!(service.list_inventory(&admin()).unwrap().len(), 1);

        // every reporting surface is admin-gated
        assert!(service.queue_stats(&pharmacist(), Utc::now(), Utc::now()).is_err());
        assert!(service.stale_orders(&patient()).is_err());
    }
}
