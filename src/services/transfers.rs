//! Transfer lifecycle: draft, approve, dispatch, complete, cancel.
//!
//! Every mutating path commits the unit and the transfer in one atomic
//! batch, so no observer can catch a unit marked in-transit without a live
//! transfer or the reverse. Optimistic-lock conflicts are retried against a
//! fresh snapshot up to the configured bound, then surface as `Contention`.

use std::sync::Arc;

use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::IntCounter;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{InventoryUnit, ScanEvent, ScanOperation, Transfer, TransferStatus, UnitStatus};
use crate::registry::{UnitRegistry, WriteBatch};

use super::codes;
use super::locations::LocationService;

lazy_static! {
    static ref TRANSFERS_DISPATCHED: IntCounter = IntCounter::new(
        "unit_transfers_dispatched_total",
        "Total number of unit transfers dispatched"
    )
    .expect("metric can be created");
    static ref TRANSFERS_COMPLETED: IntCounter = IntCounter::new(
        "unit_transfers_completed_total",
        "Total number of unit transfers completed"
    )
    .expect("metric can be created");
    static ref TRANSFER_FAILURES: IntCounter = IntCounter::new(
        "unit_transfer_failures_total",
        "Total number of failed unit transfer operations"
    )
    .expect("metric can be created");
}

/// Creates, dispatches, completes, and cancels the transfer aggregates that
/// move a unit between two locations.
#[derive(Clone)]
pub struct TransferCoordinator {
    registry: Arc<dyn UnitRegistry>,
    locations: Arc<dyn LocationService>,
    event_sender: EventSender,
    max_write_retries: u32,
}

impl TransferCoordinator {
    pub fn new(
        registry: Arc<dyn UnitRegistry>,
        locations: Arc<dyn LocationService>,
        event_sender: EventSender,
        max_write_retries: u32,
    ) -> Self {
        Self {
            registry,
            locations,
            event_sender,
            max_write_retries,
        }
    }

    /// Creates and immediately dispatches a transfer: the unit leaves the
    /// source in the same atomic write that brings the transfer to life.
    #[instrument(skip(self))]
    pub async fn create_transfer(
        &self,
        code: &str,
        source_location_id: Uuid,
        destination_location_id: Uuid,
        user_id: Uuid,
    ) -> Result<Transfer, ServiceError> {
        self.check_route(source_location_id, destination_location_id)
            .await?;

        let mut attempts = 0u32;
        let (transfer, unit) = loop {
            match self
                .try_create(code, source_location_id, destination_location_id, user_id)
                .await
            {
                Ok(pair) => break pair,
                Err(err) if err.is_retryable() && attempts < self.max_write_retries => {
                    attempts += 1;
                    warn!(code, attempts, "Write conflict dispatching transfer, retrying");
                }
                Err(err) if err.is_retryable() => {
                    TRANSFER_FAILURES.inc();
                    return Err(ServiceError::Contention(format!(
                        "Unit {} lost {} optimistic-lock races while dispatching",
                        code,
                        attempts + 1
                    )));
                }
                Err(err) => {
                    TRANSFER_FAILURES.inc();
                    return Err(err);
                }
            }
        };

        TRANSFERS_DISPATCHED.inc();
        self.emit(Event::TransferDispatched {
            transfer_id: transfer.id,
            unit_id: unit.id,
            source_location_id,
            destination_location_id,
        })
        .await;
        info!(
            transfer_number = %transfer.transfer_number,
            code = %unit.code,
            "Transfer dispatched"
        );
        Ok(transfer)
    }

    /// Creates a `draft` transfer without touching the unit. The unit is
    /// validated against the route now; it is taken only at dispatch.
    #[instrument(skip(self))]
    pub async fn draft_transfer(
        &self,
        code: &str,
        source_location_id: Uuid,
        destination_location_id: Uuid,
        user_id: Uuid,
    ) -> Result<Transfer, ServiceError> {
        self.check_route(source_location_id, destination_location_id)
            .await?;
        let unit = self.load_unit(code).await?;
        self.check_departure(&unit, source_location_id)?;

        let transfer = new_transfer(
            source_location_id,
            destination_location_id,
            unit.id,
            user_id,
            TransferStatus::Draft,
        );
        let receipt = self
            .registry
            .commit(WriteBatch::new().insert_transfer(transfer))
            .await?;
        let transfer = receipt
            .transfer
            .ok_or_else(|| ServiceError::InternalError("Commit receipt lost the transfer".into()))?;

        self.emit(Event::TransferDrafted {
            transfer_id: transfer.id,
            unit_id: unit.id,
        })
        .await;
        Ok(transfer)
    }

    /// Moves a draft to `approved`.
    #[instrument(skip(self))]
    pub async fn approve_transfer(
        &self,
        transfer_id: Uuid,
        _user_id: Uuid,
    ) -> Result<Transfer, ServiceError> {
        let mut attempts = 0u32;
        let transfer = loop {
            match self.try_approve(transfer_id).await {
                Ok(t) => break t,
                Err(err) if err.is_retryable() && attempts < self.max_write_retries => {
                    attempts += 1;
                }
                Err(err) if err.is_retryable() => {
                    TRANSFER_FAILURES.inc();
                    return Err(ServiceError::Contention(format!(
                        "Transfer {} lost {} optimistic-lock races while approving",
                        transfer_id,
                        attempts + 1
                    )));
                }
                Err(err) => {
                    TRANSFER_FAILURES.inc();
                    return Err(err);
                }
            }
        };
        self.emit(Event::TransferApproved(transfer.id)).await;
        Ok(transfer)
    }

    /// Dispatches a pre-planned (draft or approved) transfer: the unit goes
    /// in transit and the unit reference freezes.
    #[instrument(skip(self))]
    pub async fn dispatch_transfer(
        &self,
        transfer_id: Uuid,
        user_id: Uuid,
    ) -> Result<Transfer, ServiceError> {
        let mut attempts = 0u32;
        let (transfer, unit) = loop {
            match self.try_dispatch(transfer_id, user_id).await {
                Ok(pair) => break pair,
                Err(err) if err.is_retryable() && attempts < self.max_write_retries => {
                    attempts += 1;
                    warn!(%transfer_id, attempts, "Write conflict dispatching transfer, retrying");
                }
                Err(err) if err.is_retryable() => {
                    TRANSFER_FAILURES.inc();
                    return Err(ServiceError::Contention(format!(
                        "Transfer {} lost {} optimistic-lock races while dispatching",
                        transfer_id,
                        attempts + 1
                    )));
                }
                Err(err) => {
                    TRANSFER_FAILURES.inc();
                    return Err(err);
                }
            }
        };

        TRANSFERS_DISPATCHED.inc();
        self.emit(Event::TransferDispatched {
            transfer_id: transfer.id,
            unit_id: unit.id,
            source_location_id: transfer.source_location_id,
            destination_location_id: transfer.destination_location_id,
        })
        .await;
        Ok(transfer)
    }

    /// Completes an in-transit transfer at its destination. Scanning the
    /// unit anywhere else fails `AtWrongLocation` and mutates nothing.
    #[instrument(skip(self))]
    pub async fn complete_transfer(
        &self,
        transfer_id: Uuid,
        arrival_location_id: Uuid,
        user_id: Uuid,
    ) -> Result<InventoryUnit, ServiceError> {
        let mut attempts = 0u32;
        let (transfer, unit) = loop {
            match self
                .try_complete(transfer_id, arrival_location_id, user_id)
                .await
            {
                Ok(pair) => break pair,
                Err(err) if err.is_retryable() && attempts < self.max_write_retries => {
                    attempts += 1;
                    warn!(%transfer_id, attempts, "Write conflict completing transfer, retrying");
                }
                Err(err) if err.is_retryable() => {
                    TRANSFER_FAILURES.inc();
                    return Err(ServiceError::Contention(format!(
                        "Transfer {} lost {} optimistic-lock races while completing",
                        transfer_id,
                        attempts + 1
                    )));
                }
                Err(err) => {
                    TRANSFER_FAILURES.inc();
                    return Err(err);
                }
            }
        };

        TRANSFERS_COMPLETED.inc();
        self.emit(Event::TransferCompleted {
            transfer_id: transfer.id,
            unit_id: unit.id,
            destination_location_id: transfer.destination_location_id,
        })
        .await;
        info!(
            transfer_number = %transfer.transfer_number,
            code = %unit.code,
            "Transfer completed"
        );
        Ok(unit)
    }

    /// Cancels a transfer that has not left `draft`/`approved`. Cancelling
    /// an in-transit transfer has no defined reversal semantics and is
    /// rejected.
    #[instrument(skip(self))]
    pub async fn cancel_transfer(
        &self,
        transfer_id: Uuid,
        _user_id: Uuid,
    ) -> Result<Transfer, ServiceError> {
        let mut attempts = 0u32;
        let transfer = loop {
            match self.try_cancel(transfer_id).await {
                Ok(t) => break t,
                Err(err) if err.is_retryable() && attempts < self.max_write_retries => {
                    attempts += 1;
                }
                Err(err) if err.is_retryable() => {
                    TRANSFER_FAILURES.inc();
                    return Err(ServiceError::Contention(format!(
                        "Transfer {} lost {} optimistic-lock races while cancelling",
                        transfer_id,
                        attempts + 1
                    )));
                }
                Err(err) => {
                    TRANSFER_FAILURES.inc();
                    return Err(err);
                }
            }
        };
        self.emit(Event::TransferCancelled(transfer.id)).await;
        Ok(transfer)
    }

    /// Resolves the live transfer for a unit: by id when given, otherwise
    /// the unit's current (or latest pending) transfer.
    #[instrument(skip(self))]
    pub async fn get_active_transfer(
        &self,
        unit_code: &str,
        transfer_id: Option<Uuid>,
    ) -> Result<Option<Transfer>, ServiceError> {
        if let Some(id) = transfer_id {
            return Ok(self
                .registry
                .get_transfer(id)
                .await?
                .filter(|t| t.status.is_live()));
        }
        let unit = self.load_unit(unit_code).await?;
        if let Some(id) = unit.current_transfer_id {
            return Ok(self.registry.get_transfer(id).await?);
        }
        self.registry.find_transfer_for_unit(unit.id).await
    }

    // Single-attempt bodies; the public methods own the retry loops.

    async fn try_create(
        &self,
        code: &str,
        source_location_id: Uuid,
        destination_location_id: Uuid,
        user_id: Uuid,
    ) -> Result<(Transfer, InventoryUnit), ServiceError> {
        let unit = self.load_unit(code).await?;
        self.check_departure(&unit, source_location_id)?;

        let transfer = new_transfer(
            source_location_id,
            destination_location_id,
            unit.id,
            user_id,
            TransferStatus::InTransit,
        );
        self.commit_departure(unit, transfer, source_location_id, user_id, true)
            .await
    }

    async fn try_approve(&self, transfer_id: Uuid) -> Result<Transfer, ServiceError> {
        let transfer = self.load_transfer(transfer_id).await?;
        if transfer.status != TransferStatus::Draft {
            return Err(ServiceError::InvalidTransition(format!(
                "Transfer {} is {}, only drafts can be approved",
                transfer.transfer_number, transfer.status
            )));
        }
        let mut approved = transfer;
        approved.status = TransferStatus::Approved;
        approved.updated_at = Utc::now();
        let receipt = self
            .registry
            .commit(WriteBatch::new().update_transfer(approved))
            .await?;
        receipt
            .transfer
            .ok_or_else(|| ServiceError::InternalError("Commit receipt lost the transfer".into()))
    }

    async fn try_dispatch(
        &self,
        transfer_id: Uuid,
        user_id: Uuid,
    ) -> Result<(Transfer, InventoryUnit), ServiceError> {
        let transfer = self.load_transfer(transfer_id).await?;
        if !matches!(
            transfer.status,
            TransferStatus::Draft | TransferStatus::Approved
        ) {
            return Err(ServiceError::InvalidTransition(format!(
                "Transfer {} is {}, only draft or approved transfers can be dispatched",
                transfer.transfer_number, transfer.status
            )));
        }
        let unit = self
            .registry
            .find_by_id(transfer.unit_id)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Transfer {} references missing unit {}",
                    transfer.id, transfer.unit_id
                ))
            })?;
        self.check_departure(&unit, transfer.source_location_id)?;

        let mut dispatched = transfer;
        dispatched.status = TransferStatus::InTransit;
        dispatched.updated_at = Utc::now();
        let source = dispatched.source_location_id;
        self.commit_departure(unit, dispatched, source, user_id, false)
            .await
    }

    async fn try_complete(
        &self,
        transfer_id: Uuid,
        arrival_location_id: Uuid,
        user_id: Uuid,
    ) -> Result<(Transfer, InventoryUnit), ServiceError> {
        let transfer = self.load_transfer(transfer_id).await?;
        if transfer.status != TransferStatus::InTransit {
            return Err(ServiceError::InvalidTransition(format!(
                "Transfer {} is {}, only in-transit transfers can be completed",
                transfer.transfer_number, transfer.status
            )));
        }
        if arrival_location_id != transfer.destination_location_id {
            return Err(ServiceError::AtWrongLocation(format!(
                "Transfer {} is bound for {}, scanned at {}",
                transfer.transfer_number, transfer.destination_location_id, arrival_location_id
            )));
        }
        let unit = self
            .registry
            .find_by_id(transfer.unit_id)
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Transfer {} references missing unit {}",
                    transfer.id, transfer.unit_id
                ))
            })?;

        let now = Utc::now();
        let mut arrived = unit;
        arrived.status = UnitStatus::Available;
        arrived.current_location_id = transfer.destination_location_id;
        arrived.current_transfer_id = None;
        arrived.updated_at = now;

        let mut closed = transfer;
        closed.status = TransferStatus::Completed;
        closed.updated_at = now;
        closed.completed_at = Some(now);

        let event = ScanEvent::record(
            &arrived.code,
            ScanOperation::Complete,
            arrival_location_id,
            user_id,
            UnitStatus::Available,
        )
        .with_transfer(closed.id);

        let receipt = self
            .registry
            .commit(
                WriteBatch::new()
                    .update_unit(arrived)
                    .update_transfer(closed)
                    .append_event(event),
            )
            .await?;
        unpack(receipt)
    }

    async fn try_cancel(&self, transfer_id: Uuid) -> Result<Transfer, ServiceError> {
        let transfer = self.load_transfer(transfer_id).await?;
        if !matches!(
            transfer.status,
            TransferStatus::Draft | TransferStatus::Approved
        ) {
            return Err(ServiceError::InvalidTransition(format!(
                "Transfer {} is {}, only draft or approved transfers can be cancelled",
                transfer.transfer_number, transfer.status
            )));
        }
        let mut cancelled = transfer;
        cancelled.status = TransferStatus::Cancelled;
        cancelled.updated_at = Utc::now();
        let receipt = self
            .registry
            .commit(WriteBatch::new().update_transfer(cancelled))
            .await?;
        receipt
            .transfer
            .ok_or_else(|| ServiceError::InternalError("Commit receipt lost the transfer".into()))
    }

    /// The shared departure write: unit goes in transit, transfer goes live,
    /// and the scan event lands, all in one batch.
    async fn commit_departure(
        &self,
        unit: InventoryUnit,
        transfer: Transfer,
        source_location_id: Uuid,
        user_id: Uuid,
        insert_transfer: bool,
    ) -> Result<(Transfer, InventoryUnit), ServiceError> {
        let now = Utc::now();
        let mut departing = unit;
        departing.status = UnitStatus::InTransit;
        departing.current_transfer_id = Some(transfer.id);
        departing.updated_at = now;

        let event = ScanEvent::record(
            &departing.code,
            ScanOperation::TransferOut,
            source_location_id,
            user_id,
            UnitStatus::InTransit,
        )
        .with_transfer(transfer.id);

        let batch = WriteBatch::new().update_unit(departing);
        let batch = if insert_transfer {
            batch.insert_transfer(transfer)
        } else {
            batch.update_transfer(transfer)
        };
        let receipt = self.registry.commit(batch.append_event(event)).await?;
        unpack(receipt)
    }

    fn check_departure(
        &self,
        unit: &InventoryUnit,
        source_location_id: Uuid,
    ) -> Result<(), ServiceError> {
        if unit.status != UnitStatus::Available {
            return Err(ServiceError::InvalidTransition(format!(
                "Unit {} is {}, only available units can be transferred",
                unit.code, unit.status
            )));
        }
        if unit.current_location_id != source_location_id {
            return Err(ServiceError::InvalidTransition(format!(
                "Unit {} is not at the declared source location",
                unit.code
            )));
        }
        Ok(())
    }

    async fn check_route(
        &self,
        source_location_id: Uuid,
        destination_location_id: Uuid,
    ) -> Result<(), ServiceError> {
        if source_location_id == destination_location_id {
            return Err(ServiceError::ValidationError(
                "Source and destination locations must differ".into(),
            ));
        }
        if !self.locations.is_active(destination_location_id).await? {
            return Err(ServiceError::ValidationError(format!(
                "Destination location {} is not active",
                destination_location_id
            )));
        }
        Ok(())
    }

    async fn load_unit(&self, code: &str) -> Result<InventoryUnit, ServiceError> {
        self.registry
            .find_by_code(code)
            .await?
            .ok_or_else(|| ServiceError::unknown_code(code))
    }

    async fn load_transfer(&self, id: Uuid) -> Result<Transfer, ServiceError> {
        self.registry
            .get_transfer(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("No transfer with id {}", id)))
    }

    // The write already landed when the event goes out; an event failure is
    // logged, not surfaced.
    async fn emit(&self, event: Event) {
        if let Err(e) = self.event_sender.send(event).await {
            error!(error = %e, "Failed to publish transfer event");
        }
    }
}

fn new_transfer(
    source_location_id: Uuid,
    destination_location_id: Uuid,
    unit_id: Uuid,
    created_by: Uuid,
    status: TransferStatus,
) -> Transfer {
    let now = Utc::now();
    Transfer {
        id: Uuid::new_v4(),
        transfer_number: codes::generate_transfer_number(),
        source_location_id,
        destination_location_id,
        status,
        unit_id,
        created_by,
        version: 1,
        created_at: now,
        updated_at: now,
        completed_at: None,
    }
}

fn unpack(receipt: crate::registry::CommitReceipt) -> Result<(Transfer, InventoryUnit), ServiceError> {
    let transfer = receipt
        .transfer
        .clone()
        .ok_or_else(|| ServiceError::InternalError("Commit receipt lost the transfer".into()))?;
    let unit = receipt
        .units
        .into_iter()
        .next()
        .ok_or_else(|| ServiceError::InternalError("Commit receipt lost the unit".into()))?;
    Ok((transfer, unit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    use crate::events;
    use crate::registry::InMemoryRegistry;
    use crate::services::locations::AllLocationsActive;

    fn coordinator(registry: Arc<InMemoryRegistry>) -> TransferCoordinator {
        let (sender, mut rx) = events::channel(64);
        // Drain silently; these tests assert on state, not on events.
        tokio::spawn(async move { while rx.recv().await.is_some() {} });
        TransferCoordinator::new(registry, Arc::new(AllLocationsActive), sender, 3)
    }

    async fn seed_unit(registry: &InMemoryRegistry, code: &str, location: Uuid) -> InventoryUnit {
        let now = Utc::now();
        let unit = InventoryUnit {
            id: Uuid::new_v4(),
            code: code.to_string(),
            product_id: Uuid::new_v4(),
            tier_id: Uuid::new_v4(),
            tier_label: "1 lb".into(),
            quantity: dec!(453.6),
            generation: 0,
            status: UnitStatus::Available,
            current_location_id: location,
            current_transfer_id: None,
            bin_location: None,
            batch_number: None,
            child_count: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        registry
            .commit(WriteBatch::new().insert_unit(unit.clone()))
            .await
            .unwrap();
        unit
    }

    #[tokio::test]
    async fn staged_flow_draft_approve_dispatch_complete() {
        let registry = Arc::new(InMemoryRegistry::new());
        let svc = coordinator(registry.clone());
        let source = Uuid::new_v4();
        let destination = Uuid::new_v4();
        let user = Uuid::new_v4();
        let unit = seed_unit(&registry, "TLU-STAGED", source).await;

        let draft = svc
            .draft_transfer("TLU-STAGED", source, destination, user)
            .await
            .unwrap();
        assert_eq!(draft.status, TransferStatus::Draft);
        // Drafting does not touch the unit.
        let untouched = registry.find_by_id(unit.id).await.unwrap().unwrap();
        assert_eq!(untouched.status, UnitStatus::Available);
        assert_eq!(untouched.version, 1);

        let approved = svc.approve_transfer(draft.id, user).await.unwrap();
        assert_eq!(approved.status, TransferStatus::Approved);

        let dispatched = svc.dispatch_transfer(draft.id, user).await.unwrap();
        assert_eq!(dispatched.status, TransferStatus::InTransit);
        let in_transit = registry.find_by_id(unit.id).await.unwrap().unwrap();
        assert_eq!(in_transit.status, UnitStatus::InTransit);
        assert_eq!(in_transit.current_transfer_id, Some(draft.id));
        assert_eq!(in_transit.current_location_id, source);

        let arrived = svc
            .complete_transfer(draft.id, destination, user)
            .await
            .unwrap();
        assert_eq!(arrived.status, UnitStatus::Available);
        assert_eq!(arrived.current_location_id, destination);
        assert_eq!(arrived.current_transfer_id, None);
    }

    #[tokio::test]
    async fn cancel_is_rejected_once_in_transit() {
        let registry = Arc::new(InMemoryRegistry::new());
        let svc = coordinator(registry.clone());
        let source = Uuid::new_v4();
        let user = Uuid::new_v4();
        seed_unit(&registry, "TLU-CXL", source).await;

        let transfer = svc
            .create_transfer("TLU-CXL", source, Uuid::new_v4(), user)
            .await
            .unwrap();
        assert_eq!(transfer.status, TransferStatus::InTransit);

        let err = svc.cancel_transfer(transfer.id, user).await.unwrap_err();
        assert_matches!(err, ServiceError::InvalidTransition(_));
    }

    #[tokio::test]
    async fn cancel_of_a_draft_leaves_the_unit_untouched() {
        let registry = Arc::new(InMemoryRegistry::new());
        let svc = coordinator(registry.clone());
        let source = Uuid::new_v4();
        let user = Uuid::new_v4();
        let unit = seed_unit(&registry, "TLU-DRAFTCXL", source).await;

        let draft = svc
            .draft_transfer("TLU-DRAFTCXL", source, Uuid::new_v4(), user)
            .await
            .unwrap();
        let cancelled = svc.cancel_transfer(draft.id, user).await.unwrap();
        assert_eq!(cancelled.status, TransferStatus::Cancelled);

        let stored = registry.find_by_id(unit.id).await.unwrap().unwrap();
        assert_eq!(stored.status, UnitStatus::Available);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn same_source_and_destination_is_rejected_up_front() {
        let registry = Arc::new(InMemoryRegistry::new());
        let svc = coordinator(registry.clone());
        let here = Uuid::new_v4();
        seed_unit(&registry, "TLU-LOOP", here).await;

        let err = svc
            .create_transfer("TLU-LOOP", here, here, Uuid::new_v4())
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }

    #[tokio::test]
    async fn get_active_transfer_resolves_by_code_and_by_id() {
        let registry = Arc::new(InMemoryRegistry::new());
        let svc = coordinator(registry.clone());
        let source = Uuid::new_v4();
        let user = Uuid::new_v4();
        seed_unit(&registry, "TLU-ACTIVE", source).await;

        assert!(svc
            .get_active_transfer("TLU-ACTIVE", None)
            .await
            .unwrap()
            .is_none());

        let transfer = svc
            .create_transfer("TLU-ACTIVE", source, Uuid::new_v4(), user)
            .await
            .unwrap();

        let by_code = svc
            .get_active_transfer("TLU-ACTIVE", None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_code.id, transfer.id);

        let by_id = svc
            .get_active_transfer("TLU-ACTIVE", Some(transfer.id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_id.id, transfer.id);

        // Completed transfers are no longer active.
        svc.complete_transfer(transfer.id, transfer.destination_location_id, user)
            .await
            .unwrap();
        assert!(svc
            .get_active_transfer("TLU-ACTIVE", Some(transfer.id))
            .await
            .unwrap()
            .is_none());
    }
}
