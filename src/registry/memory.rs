//! Reference in-memory registry.
//!
//! Used by the test suite and by embedders that bring no backend of their
//! own. A single `RwLock` over the maps gives the same atomicity a database
//! transaction would: validation of every write in the batch happens before
//! the first map is touched.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{InventoryUnit, ScanEvent, ScanOperation, Transfer};

use super::{CommitReceipt, TransferWrite, UnitRegistry, UnitWrite, WriteBatch};

#[derive(Default)]
struct Store {
    units: HashMap<Uuid, InventoryUnit>,
    code_index: HashMap<String, Uuid>,
    transfers: HashMap<Uuid, Transfer>,
    events: Vec<ScanEvent>,
}

#[derive(Default)]
pub struct InMemoryRegistry {
    store: RwLock<Store>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test/diagnostic snapshot of every unit.
    pub async fn all_units(&self) -> Vec<InventoryUnit> {
        self.store.read().await.units.values().cloned().collect()
    }

    /// Test/diagnostic snapshot of every transfer.
    pub async fn all_transfers(&self) -> Vec<Transfer> {
        self.store
            .read()
            .await
            .transfers
            .values()
            .cloned()
            .collect()
    }

    /// Number of events in the append-only log.
    pub async fn event_count(&self) -> usize {
        self.store.read().await.events.len()
    }
}

#[async_trait]
impl UnitRegistry for InMemoryRegistry {
    async fn find_by_code(&self, code: &str) -> Result<Option<InventoryUnit>, ServiceError> {
        let store = self.store.read().await;
        Ok(store
            .code_index
            .get(code)
            .and_then(|id| store.units.get(id))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<InventoryUnit>, ServiceError> {
        Ok(self.store.read().await.units.get(&id).cloned())
    }

    async fn get_transfer(&self, id: Uuid) -> Result<Option<Transfer>, ServiceError> {
        Ok(self.store.read().await.transfers.get(&id).cloned())
    }

    async fn find_transfer_for_unit(
        &self,
        unit_id: Uuid,
    ) -> Result<Option<Transfer>, ServiceError> {
        let store = self.store.read().await;
        Ok(store
            .transfers
            .values()
            .filter(|t| t.unit_id == unit_id && t.status.is_live())
            .max_by_key(|t| t.created_at)
            .cloned())
    }

    async fn latest_event(
        &self,
        code: &str,
        operation: ScanOperation,
        transfer_id: Option<Uuid>,
    ) -> Result<Option<ScanEvent>, ServiceError> {
        let store = self.store.read().await;
        Ok(store
            .events
            .iter()
            .rev()
            .find(|e| {
                e.unit_code == code
                    && e.operation == operation
                    && match transfer_id {
                        Some(id) => e.transfer_id == Some(id),
                        None => true,
                    }
            })
            .cloned())
    }

    async fn events_for_code(&self, code: &str) -> Result<Vec<ScanEvent>, ServiceError> {
        let store = self.store.read().await;
        Ok(store
            .events
            .iter()
            .filter(|e| e.unit_code == code)
            .cloned()
            .collect())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<CommitReceipt, ServiceError> {
        let mut store = self.store.write().await;

        // Validate the whole batch before touching anything.
        let mut incoming_codes = std::collections::HashSet::new();
        for write in &batch.units {
            match write {
                UnitWrite::Insert(unit) => {
                    if store.units.contains_key(&unit.id) {
                        return Err(ServiceError::ValidationError(format!(
                            "Unit {} already exists",
                            unit.id
                        )));
                    }
                    if store.code_index.contains_key(&unit.code)
                        || !incoming_codes.insert(unit.code.clone())
                    {
                        return Err(ServiceError::ValidationError(format!(
                            "Code {} is already assigned",
                            unit.code
                        )));
                    }
                }
                UnitWrite::Update(unit) => match store.units.get(&unit.id) {
                    None => {
                        return Err(ServiceError::NotFound(format!(
                            "Unit {} does not exist",
                            unit.id
                        )))
                    }
                    Some(stored) if stored.version != unit.version => {
                        return Err(ServiceError::ConcurrentModification(unit.id));
                    }
                    Some(stored) if stored.code != unit.code => {
                        return Err(ServiceError::ValidationError(format!(
                            "Code of unit {} is immutable",
                            unit.id
                        )));
                    }
                    Some(_) => {}
                },
            }
        }
        if let Some(write) = &batch.transfer {
            match write {
                TransferWrite::Insert(transfer) => {
                    if store.transfers.contains_key(&transfer.id) {
                        return Err(ServiceError::ValidationError(format!(
                            "Transfer {} already exists",
                            transfer.id
                        )));
                    }
                }
                TransferWrite::Update(transfer) => match store.transfers.get(&transfer.id) {
                    None => {
                        return Err(ServiceError::NotFound(format!(
                            "Transfer {} does not exist",
                            transfer.id
                        )))
                    }
                    Some(stored) if stored.version != transfer.version => {
                        return Err(ServiceError::ConcurrentModification(transfer.id));
                    }
                    Some(_) => {}
                },
            }
        }

        // Apply. Updates persist one version past the snapshot the caller
        // read; inserts keep the version they came in with.
        let mut receipt = CommitReceipt::default();
        for write in batch.units {
            let stored = match write {
                UnitWrite::Insert(unit) => unit,
                UnitWrite::Update(mut unit) => {
                    unit.version += 1;
                    unit
                }
            };
            store.code_index.insert(stored.code.clone(), stored.id);
            store.units.insert(stored.id, stored.clone());
            receipt.units.push(stored);
        }
        if let Some(write) = batch.transfer {
            let stored = match write {
                TransferWrite::Insert(transfer) => transfer,
                TransferWrite::Update(mut transfer) => {
                    transfer.version += 1;
                    transfer
                }
            };
            store.transfers.insert(stored.id, stored.clone());
            receipt.transfer = Some(stored);
        }
        store.events.extend(batch.events);

        Ok(receipt)
    }
}
