//! Persistence seam for the lifecycle engine.
//!
//! The engine never talks to a backend directly: every read goes through
//! [`UnitRegistry`] and every mutation goes through [`UnitRegistry::commit`]
//! with a [`WriteBatch`]. A batch applies atomically or not at all, so the
//! system can never observe a unit marked in-transit with no live transfer,
//! or the reverse.

use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{InventoryUnit, ScanEvent, ScanOperation, Transfer};

pub mod memory;

pub use memory::InMemoryRegistry;

/// One unit mutation inside a batch.
///
/// `Update` carries the snapshot the caller read; the registry verifies the
/// stored version still matches `unit.version` and persists at
/// `unit.version + 1`. `Insert` requires an unused id and code.
#[derive(Debug, Clone)]
pub enum UnitWrite {
    Insert(InventoryUnit),
    Update(InventoryUnit),
}

/// One transfer mutation inside a batch, same rules as [`UnitWrite`].
#[derive(Debug, Clone)]
pub enum TransferWrite {
    Insert(Transfer),
    Update(Transfer),
}

/// An all-or-nothing multi-entity write.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    pub units: Vec<UnitWrite>,
    pub transfer: Option<TransferWrite>,
    pub events: Vec<ScanEvent>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_unit(mut self, unit: InventoryUnit) -> Self {
        self.units.push(UnitWrite::Insert(unit));
        self
    }

    pub fn update_unit(mut self, unit: InventoryUnit) -> Self {
        self.units.push(UnitWrite::Update(unit));
        self
    }

    pub fn insert_transfer(mut self, transfer: Transfer) -> Self {
        self.transfer = Some(TransferWrite::Insert(transfer));
        self
    }

    pub fn update_transfer(mut self, transfer: Transfer) -> Self {
        self.transfer = Some(TransferWrite::Update(transfer));
        self
    }

    pub fn append_event(mut self, event: ScanEvent) -> Self {
        self.events.push(event);
        self
    }
}

/// The stored state of a committed batch, with final versions.
#[derive(Debug, Clone, Default)]
pub struct CommitReceipt {
    pub units: Vec<InventoryUnit>,
    pub transfer: Option<Transfer>,
}

impl CommitReceipt {
    /// The committed unit with the given id.
    pub fn unit(&self, id: Uuid) -> Option<&InventoryUnit> {
        self.units.iter().find(|u| u.id == id)
    }
}

/// Authoritative store of inventory units, transfers, and the append-only
/// scan-event log.
///
/// Implementations must surface unavailability as
/// [`ServiceError::NetworkError`]; a timeout must never be reported as "no
/// change", because the caller cannot tell whether the write landed.
#[async_trait]
pub trait UnitRegistry: Send + Sync {
    async fn find_by_code(&self, code: &str) -> Result<Option<InventoryUnit>, ServiceError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<InventoryUnit>, ServiceError>;

    async fn get_transfer(&self, id: Uuid) -> Result<Option<Transfer>, ServiceError>;

    /// The most recently created live (draft/approved/in-transit) transfer
    /// referencing the unit, if any.
    async fn find_transfer_for_unit(
        &self,
        unit_id: Uuid,
    ) -> Result<Option<Transfer>, ServiceError>;

    /// The most recent event matching the idempotency key. A `Some`
    /// `transfer_id` must match the event's transfer exactly; `None` matches
    /// the latest event for `(code, operation)` regardless of transfer.
    async fn latest_event(
        &self,
        code: &str,
        operation: ScanOperation,
        transfer_id: Option<Uuid>,
    ) -> Result<Option<ScanEvent>, ServiceError>;

    /// Full audit trail for a code, oldest first.
    async fn events_for_code(&self, code: &str) -> Result<Vec<ScanEvent>, ServiceError>;

    /// Applies the batch atomically. Fails with `ConcurrentModification` if
    /// any expected version no longer matches, or `ValidationError` on a
    /// duplicate id/code insert; either way nothing is written.
    async fn commit(&self, batch: WriteBatch) -> Result<CommitReceipt, ServiceError>;
}
