//! The scan state machine.
//!
//! One declarative transition table is the single source of truth for which
//! operation is legal in which status; every entry point funnels through it.
//! Illegal combinations fail `InvalidTransition` with all state untouched.
//! Replayed scans (mobile clients retry on network ambiguity) return the
//! prior recorded result instead of re-executing the transition.

use std::sync::Arc;

use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::IntCounter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{
    InventoryUnit, ScanEvent, ScanOperation, Transfer, TransferStatus, UnitStatus,
};
use crate::registry::{UnitRegistry, WriteBatch};

use super::feedback::{FeedbackSignal, FeedbackSink};
use super::labels::LabelPrinter;
use super::splits::SplitEngine;
use super::transfers::TransferCoordinator;

lazy_static! {
    static ref SCANS_TOTAL: IntCounter = IntCounter::new(
        "unit_scans_total",
        "Total number of successful scan operations"
    )
    .expect("metric can be created");
    static ref SCAN_FAILURES: IntCounter = IntCounter::new(
        "unit_scan_failures_total",
        "Total number of failed scan operations"
    )
    .expect("metric can be created");
}

/// Statuses a transition rule accepts.
#[derive(Debug, Clone, Copy)]
pub enum StatusSet {
    Of(&'static [UnitStatus]),
    AnyNonTerminal,
}

impl StatusSet {
    pub fn contains(&self, status: UnitStatus) -> bool {
        match self {
            StatusSet::Of(statuses) => statuses.contains(&status),
            StatusSet::AnyNonTerminal => !status.is_terminal(),
        }
    }
}

/// One row of the legal-transition table. `to: None` means the status is
/// left unchanged.
#[derive(Debug, Clone, Copy)]
pub struct TransitionRule {
    pub operation: ScanOperation,
    pub from: StatusSet,
    pub to: Option<UnitStatus>,
}

/// The legal-transition table: state x operation -> new state. Operation
/// guards (location match, required fields) are enforced by the processor.
pub const TRANSITIONS: &[TransitionRule] = &[
    TransitionRule {
        operation: ScanOperation::TransferOut,
        from: StatusSet::Of(&[UnitStatus::Available]),
        to: Some(UnitStatus::InTransit),
    },
    TransitionRule {
        operation: ScanOperation::Complete,
        from: StatusSet::Of(&[UnitStatus::InTransit]),
        to: Some(UnitStatus::Available),
    },
    // A receive scan of an in-transit unit completes its transfer: the dock
    // uses the same button for arriving boxes and new stock.
    TransitionRule {
        operation: ScanOperation::Receive,
        from: StatusSet::Of(&[UnitStatus::InTransit]),
        to: Some(UnitStatus::Available),
    },
    TransitionRule {
        operation: ScanOperation::Audit,
        from: StatusSet::Of(&[UnitStatus::Available]),
        to: Some(UnitStatus::Available),
    },
    TransitionRule {
        operation: ScanOperation::Damage,
        from: StatusSet::Of(&[UnitStatus::Available, UnitStatus::InTransit]),
        to: Some(UnitStatus::Damaged),
    },
    TransitionRule {
        operation: ScanOperation::Reprint,
        from: StatusSet::AnyNonTerminal,
        to: None,
    },
    TransitionRule {
        operation: ScanOperation::Split,
        from: StatusSet::Of(&[UnitStatus::Available]),
        to: Some(UnitStatus::Split),
    },
];

/// The rule admitting `operation` in `status`, if any.
pub fn transition_for(status: UnitStatus, operation: ScanOperation) -> Option<&'static TransitionRule> {
    TRANSITIONS
        .iter()
        .find(|rule| rule.operation == operation && rule.from.contains(status))
}

/// A decoded code plus the requested operation and its context. The
/// optional fields carry operation-specific payloads posted by the client.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ScanRequest {
    #[validate(length(min = 1, message = "Scan code cannot be empty"))]
    pub code: String,

    pub operation: ScanOperation,

    pub location_id: Uuid,

    pub user_id: Uuid,

    pub notes: Option<String>,

    /// Destination for an ad-hoc transfer-out.
    pub destination_location_id: Option<Uuid>,

    /// Pins the scan to a specific transfer; part of the idempotency key.
    pub transfer_id: Option<Uuid>,

    /// Child tier for a split.
    pub tier_id: Option<Uuid>,

    /// Child count for a split.
    pub count: Option<u32>,

    /// Physically counted quantity for an audit.
    pub counted_quantity: Option<Decimal>,
}

impl ScanRequest {
    pub fn new(code: &str, operation: ScanOperation, location_id: Uuid, user_id: Uuid) -> Self {
        Self {
            code: code.to_string(),
            operation,
            location_id,
            user_id,
            notes: None,
            destination_location_id: None,
            transfer_id: None,
            tier_id: None,
            count: None,
            counted_quantity: None,
        }
    }
}

/// What a scan returns to the presentation layer.
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub unit: InventoryUnit,
    pub transfer: Option<Transfer>,
    pub children: Option<Vec<InventoryUnit>>,
    pub event: ScanEvent,
    /// True when an identical scan had already been recorded and its result
    /// is returned without re-executing the transition.
    pub replayed: bool,
}

/// First-receipt payload: everything needed to register a brand-new unit.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewUnitRequest {
    /// Pre-printed code; a fresh one is generated when absent.
    pub code: Option<String>,

    pub product_id: Uuid,

    pub tier_id: Uuid,

    #[validate(length(min = 1, message = "Tier label cannot be empty"))]
    pub tier_label: String,

    pub quantity: Decimal,

    pub location_id: Uuid,

    pub user_id: Uuid,

    pub bin_location: Option<String>,

    pub batch_number: Option<String>,

    pub notes: Option<String>,
}

/// Applies scan operations atomically against the registry, delegating
/// transfer routing and splitting to their owners.
#[derive(Clone)]
pub struct ScanProcessor {
    registry: Arc<dyn UnitRegistry>,
    transfers: Arc<TransferCoordinator>,
    splits: Arc<SplitEngine>,
    printer: Arc<dyn LabelPrinter>,
    feedback: Arc<dyn FeedbackSink>,
    event_sender: EventSender,
    code_prefix: String,
    max_code_attempts: u32,
    max_write_retries: u32,
}

impl ScanProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        registry: Arc<dyn UnitRegistry>,
        transfers: Arc<TransferCoordinator>,
        splits: Arc<SplitEngine>,
        printer: Arc<dyn LabelPrinter>,
        feedback: Arc<dyn FeedbackSink>,
        event_sender: EventSender,
        code_prefix: String,
        max_code_attempts: u32,
        max_write_retries: u32,
    ) -> Self {
        Self {
            registry,
            transfers,
            splits,
            printer,
            feedback,
            event_sender,
            code_prefix,
            max_code_attempts,
            max_write_retries,
        }
    }

    /// Processes one scan end to end: validate, replay-check, transition,
    /// commit, feedback.
    #[instrument(skip(self), fields(code = %request.code, operation = %request.operation))]
    pub async fn scan(&self, request: ScanRequest) -> Result<ScanOutcome, ServiceError> {
        request.validate()?;

        match self.process(&request).await {
            Ok(outcome) => {
                SCANS_TOTAL.inc();
                self.feedback.emit(FeedbackSignal::Success).await;
                Ok(outcome)
            }
            Err(err) => {
                SCAN_FAILURES.inc();
                self.feedback.emit(FeedbackSignal::Failure).await;
                Err(err)
            }
        }
    }

    /// Registers a brand-new unit on first receipt.
    #[instrument(skip(self, request), fields(product_id = %request.product_id))]
    pub async fn receive_unit(
        &self,
        request: NewUnitRequest,
    ) -> Result<InventoryUnit, ServiceError> {
        request.validate()?;
        if request.quantity <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Received quantity must be positive".into(),
            ));
        }

        let code = match request.code.as_deref().map(str::trim) {
            Some("") => {
                return Err(ServiceError::ValidationError(
                    "A pre-printed code cannot be blank".into(),
                ))
            }
            Some(code) => code.to_string(),
            None => {
                super::codes::allocate_unique_code(
                    &self.registry,
                    &self.code_prefix,
                    &std::collections::HashSet::new(),
                    self.max_code_attempts,
                )
                .await?
            }
        };

        let now = Utc::now();
        let unit = InventoryUnit {
            id: Uuid::new_v4(),
            code: code.clone(),
            product_id: request.product_id,
            tier_id: request.tier_id,
            tier_label: request.tier_label.clone(),
            quantity: request.quantity,
            generation: 0,
            status: UnitStatus::Available,
            current_location_id: request.location_id,
            current_transfer_id: None,
            bin_location: request.bin_location.clone(),
            batch_number: request.batch_number.clone(),
            child_count: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        let event = ScanEvent::record(
            &code,
            ScanOperation::Receive,
            request.location_id,
            request.user_id,
            UnitStatus::Available,
        )
        .with_notes(request.notes.clone());

        let receipt = self
            .registry
            .commit(WriteBatch::new().insert_unit(unit).append_event(event))
            .await?;
        let unit = receipt
            .units
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::InternalError("Commit receipt lost the unit".into()))?;

        self.emit(Event::UnitReceived {
            unit_id: unit.id,
            code: unit.code.clone(),
            location_id: unit.current_location_id,
        })
        .await;
        info!(code = %unit.code, "Unit received");
        Ok(unit)
    }

    async fn process(&self, request: &ScanRequest) -> Result<ScanOutcome, ServiceError> {
        let unit = self
            .registry
            .find_by_code(&request.code)
            .await?
            .ok_or_else(|| ServiceError::unknown_code(&request.code))?;

        if let Some(outcome) = self.detect_replay(&unit, request).await? {
            info!(code = %unit.code, operation = %request.operation, "Replayed scan, returning recorded result");
            return Ok(outcome);
        }

        transition_for(unit.status, request.operation).ok_or_else(|| {
            ServiceError::InvalidTransition(format!(
                "Operation {} is not legal while unit {} is {}",
                request.operation, unit.code, unit.status
            ))
        })?;

        match request.operation {
            ScanOperation::TransferOut => self.scan_transfer_out(unit, request).await,
            ScanOperation::Complete | ScanOperation::Receive => {
                self.scan_arrival(unit, request).await
            }
            ScanOperation::Audit => self.scan_audit(unit, request).await,
            ScanOperation::Damage => self.scan_damage(unit, request).await,
            ScanOperation::Reprint => self.scan_reprint(unit, request).await,
            ScanOperation::Split => self.scan_split(unit, request).await,
        }
    }

    async fn scan_transfer_out(
        &self,
        unit: InventoryUnit,
        request: &ScanRequest,
    ) -> Result<ScanOutcome, ServiceError> {
        if request.location_id != unit.current_location_id {
            return Err(ServiceError::InvalidTransition(format!(
                "Unit {} is not at the scanned location",
                unit.code
            )));
        }

        let transfer = if let Some(transfer_id) = request.transfer_id {
            let pinned = self.registry.get_transfer(transfer_id).await?.ok_or_else(|| {
                ServiceError::NotFound(format!("No transfer with id {}", transfer_id))
            })?;
            if pinned.unit_id != unit.id {
                return Err(ServiceError::ValidationError(format!(
                    "Transfer {} does not move unit {}",
                    pinned.transfer_number, unit.code
                )));
            }
            self.transfers
                .dispatch_transfer(transfer_id, request.user_id)
                .await?
        } else if let Some(pending) = self.registry.find_transfer_for_unit(unit.id).await? {
            self.transfers
                .dispatch_transfer(pending.id, request.user_id)
                .await?
        } else {
            let destination = request.destination_location_id.ok_or_else(|| {
                ServiceError::ValidationError(
                    "Transfer destination is required for an ad-hoc transfer-out".into(),
                )
            })?;
            self.transfers
                .create_transfer(
                    &unit.code,
                    unit.current_location_id,
                    destination,
                    request.user_id,
                )
                .await?
        };

        self.outcome_for_transfer(&unit.code, ScanOperation::TransferOut, transfer)
            .await
    }

    async fn scan_arrival(
        &self,
        unit: InventoryUnit,
        request: &ScanRequest,
    ) -> Result<ScanOutcome, ServiceError> {
        let transfer_id = request
            .transfer_id
            .or(unit.current_transfer_id)
            .ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Unit {} is in transit with no transfer reference",
                    unit.code
                ))
            })?;
        self.transfers
            .complete_transfer(transfer_id, request.location_id, request.user_id)
            .await?;
        let transfer = self.registry.get_transfer(transfer_id).await?;

        let unit = self
            .registry
            .find_by_id(unit.id)
            .await?
            .ok_or_else(|| ServiceError::unknown_code(&unit.code))?;
        let event = self
            .registry
            .latest_event(&unit.code, ScanOperation::Complete, Some(transfer_id))
            .await?
            .ok_or_else(|| {
                ServiceError::InternalError("Arrival scan left no event record".into())
            })?;
        Ok(ScanOutcome {
            unit,
            transfer,
            children: None,
            event,
            replayed: false,
        })
    }

    async fn scan_audit(
        &self,
        unit: InventoryUnit,
        request: &ScanRequest,
    ) -> Result<ScanOutcome, ServiceError> {
        let counted = request.counted_quantity.ok_or_else(|| {
            ServiceError::ValidationError("Audit requires the counted quantity".into())
        })?;

        let mut attempts = 0u32;
        let (unit, event) = loop {
            match self.try_audit(&unit.code, counted, request).await {
                Ok(pair) => break pair,
                Err(err) if err.is_retryable() && attempts < self.max_write_retries => {
                    attempts += 1;
                }
                Err(err) if err.is_retryable() => {
                    return Err(ServiceError::Contention(format!(
                        "Unit {} lost {} optimistic-lock races while auditing",
                        unit.code,
                        attempts + 1
                    )));
                }
                Err(err) => return Err(err),
            }
        };

        self.emit(Event::UnitAudited {
            unit_id: unit.id,
            variance: event.quantity_variance.unwrap_or(Decimal::ZERO),
        })
        .await;
        Ok(ScanOutcome {
            unit,
            transfer: None,
            children: None,
            event,
            replayed: false,
        })
    }

    async fn try_audit(
        &self,
        code: &str,
        counted: Decimal,
        request: &ScanRequest,
    ) -> Result<(InventoryUnit, ScanEvent), ServiceError> {
        let unit = self
            .registry
            .find_by_code(code)
            .await?
            .ok_or_else(|| ServiceError::unknown_code(code))?;
        if transition_for(unit.status, ScanOperation::Audit).is_none() {
            return Err(ServiceError::InvalidTransition(format!(
                "Operation audit is not legal while unit {} is {}",
                unit.code, unit.status
            )));
        }

        let variance = counted - unit.quantity;
        // The status and quantity stay; the version-checked write serializes
        // the variance record against concurrent transitions.
        let mut touched = unit.clone();
        touched.updated_at = Utc::now();
        let event = ScanEvent::record(
            &unit.code,
            ScanOperation::Audit,
            request.location_id,
            request.user_id,
            unit.status,
        )
        .with_variance(variance)
        .with_notes(request.notes.clone());

        let receipt = self
            .registry
            .commit(
                WriteBatch::new()
                    .update_unit(touched)
                    .append_event(event.clone()),
            )
            .await?;
        let unit = receipt
            .units
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::InternalError("Commit receipt lost the unit".into()))?;
        Ok((unit, event))
    }

    async fn scan_damage(
        &self,
        unit: InventoryUnit,
        request: &ScanRequest,
    ) -> Result<ScanOutcome, ServiceError> {
        let reason = request
            .notes
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| {
                ServiceError::ValidationError("A damage report requires a reason".into())
            })?
            .to_string();

        let mut attempts = 0u32;
        let (unit, transfer, event) = loop {
            match self.try_damage(&unit.code, &reason, request).await {
                Ok(triple) => break triple,
                Err(err) if err.is_retryable() && attempts < self.max_write_retries => {
                    attempts += 1;
                }
                Err(err) if err.is_retryable() => {
                    return Err(ServiceError::Contention(format!(
                        "Unit {} lost {} optimistic-lock races while reporting damage",
                        unit.code,
                        attempts + 1
                    )));
                }
                Err(err) => return Err(err),
            }
        };

        self.emit(Event::UnitDamaged {
            unit_id: unit.id,
            reason,
        })
        .await;
        Ok(ScanOutcome {
            unit,
            transfer,
            children: None,
            event,
            replayed: false,
        })
    }

    async fn try_damage(
        &self,
        code: &str,
        reason: &str,
        request: &ScanRequest,
    ) -> Result<(InventoryUnit, Option<Transfer>, ScanEvent), ServiceError> {
        let unit = self
            .registry
            .find_by_code(code)
            .await?
            .ok_or_else(|| ServiceError::unknown_code(code))?;
        if transition_for(unit.status, ScanOperation::Damage).is_none() {
            return Err(ServiceError::InvalidTransition(format!(
                "Operation damage is not legal while unit {} is {}",
                unit.code, unit.status
            )));
        }

        let now = Utc::now();
        let mut damaged = unit.clone();
        damaged.status = UnitStatus::Damaged;
        damaged.current_transfer_id = None;
        damaged.updated_at = now;

        let mut event = ScanEvent::record(
            &unit.code,
            ScanOperation::Damage,
            request.location_id,
            request.user_id,
            UnitStatus::Damaged,
        )
        .with_notes(Some(reason.to_string()));

        // A unit damaged mid-transfer takes its transfer down with it; the
        // unit cannot arrive anymore.
        let mut closed_transfer = None;
        if let Some(transfer_id) = unit.current_transfer_id {
            let transfer = self.registry.get_transfer(transfer_id).await?.ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "Unit {} references missing transfer {}",
                    unit.code, transfer_id
                ))
            })?;
            let mut cancelled = transfer;
            cancelled.status = TransferStatus::Cancelled;
            cancelled.updated_at = now;
            closed_transfer = Some(cancelled);
            event = event.with_transfer(transfer_id);
        }

        let mut batch = WriteBatch::new()
            .update_unit(damaged)
            .append_event(event.clone());
        if let Some(transfer) = closed_transfer {
            batch = batch.update_transfer(transfer);
        }
        let receipt = self.registry.commit(batch).await?;

        let unit = receipt
            .units
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::InternalError("Commit receipt lost the unit".into()))?;
        Ok((unit, receipt.transfer, event))
    }

    async fn scan_reprint(
        &self,
        unit: InventoryUnit,
        request: &ScanRequest,
    ) -> Result<ScanOutcome, ServiceError> {
        self.printer
            .print_label(&unit)
            .await
            .map_err(|e| ServiceError::ExternalServiceError(format!("Label printer: {}", e)))?;

        let event = ScanEvent::record(
            &unit.code,
            ScanOperation::Reprint,
            request.location_id,
            request.user_id,
            unit.status,
        )
        .with_notes(request.notes.clone());
        // No unit write: a reprint changes nothing about the unit.
        self.registry
            .commit(WriteBatch::new().append_event(event.clone()))
            .await?;

        self.emit(Event::LabelReprinted(unit.id)).await;
        Ok(ScanOutcome {
            unit,
            transfer: None,
            children: None,
            event,
            replayed: false,
        })
    }

    async fn scan_split(
        &self,
        unit: InventoryUnit,
        request: &ScanRequest,
    ) -> Result<ScanOutcome, ServiceError> {
        let tier_id = request.tier_id.ok_or_else(|| {
            ServiceError::ValidationError("A split requires the child tier".into())
        })?;
        let count = request.count.ok_or_else(|| {
            ServiceError::ValidationError("A split requires the child count".into())
        })?;

        let outcome = self
            .splits
            .derive_children(&unit.code, tier_id, count, request.user_id)
            .await?;
        Ok(ScanOutcome {
            unit: outcome.parent,
            transfer: None,
            children: Some(outcome.children),
            event: outcome.event,
            replayed: false,
        })
    }

    /// Replay detection on the idempotency key (code, operation, transfer).
    async fn detect_replay(
        &self,
        unit: &InventoryUnit,
        request: &ScanRequest,
    ) -> Result<Option<ScanOutcome>, ServiceError> {
        match request.operation {
            ScanOperation::TransferOut if unit.status == UnitStatus::InTransit => {
                let Some(current) = unit.current_transfer_id else {
                    return Ok(None);
                };
                if matches!(request.transfer_id, Some(requested) if requested != current) {
                    return Ok(None);
                }
                let Some(event) = self
                    .registry
                    .latest_event(&unit.code, ScanOperation::TransferOut, Some(current))
                    .await?
                else {
                    return Ok(None);
                };
                let transfer = self.registry.get_transfer(current).await?;
                Ok(Some(self.replayed(unit.clone(), transfer, event)))
            }
            ScanOperation::Complete | ScanOperation::Receive
                if unit.status == UnitStatus::Available
                    && unit.current_transfer_id.is_none()
                    && unit.current_location_id == request.location_id =>
            {
                // Arrival scans are recorded as `complete` regardless of the
                // button pressed.
                let Some(event) = self
                    .registry
                    .latest_event(&unit.code, ScanOperation::Complete, request.transfer_id)
                    .await?
                else {
                    return Ok(None);
                };
                if event.location_id != request.location_id {
                    return Ok(None);
                }
                let transfer = match event.transfer_id {
                    Some(id) => self.registry.get_transfer(id).await?,
                    None => None,
                };
                Ok(Some(self.replayed(unit.clone(), transfer, event)))
            }
            ScanOperation::Damage if unit.status == UnitStatus::Damaged => {
                let Some(event) = self
                    .registry
                    .latest_event(&unit.code, ScanOperation::Damage, None)
                    .await?
                else {
                    return Ok(None);
                };
                Ok(Some(self.replayed(unit.clone(), None, event)))
            }
            ScanOperation::Split if unit.status == UnitStatus::Split => {
                let Some(event) = self
                    .registry
                    .latest_event(&unit.code, ScanOperation::Split, None)
                    .await?
                else {
                    return Ok(None);
                };
                Ok(Some(self.replayed(unit.clone(), None, event)))
            }
            _ => Ok(None),
        }
    }

    fn replayed(
        &self,
        unit: InventoryUnit,
        transfer: Option<Transfer>,
        event: ScanEvent,
    ) -> ScanOutcome {
        ScanOutcome {
            unit,
            transfer,
            children: None,
            event,
            replayed: true,
        }
    }

    async fn outcome_for_transfer(
        &self,
        code: &str,
        operation: ScanOperation,
        transfer: Transfer,
    ) -> Result<ScanOutcome, ServiceError> {
        let unit = self
            .registry
            .find_by_id(transfer.unit_id)
            .await?
            .ok_or_else(|| ServiceError::unknown_code(code))?;
        let event = self
            .registry
            .latest_event(code, operation, Some(transfer.id))
            .await?
            .ok_or_else(|| ServiceError::InternalError("Scan left no event record".into()))?;
        Ok(ScanOutcome {
            unit,
            transfer: Some(transfer),
            children: None,
            event,
            replayed: false,
        })
    }

    // The write already landed when the event goes out; an event failure is
    // logged, not surfaced.
    async fn emit(&self, event: Event) {
        if let Err(e) = self.event_sender.send(event).await {
            error!(error = %e, "Failed to publish scan event");
        }
    }
}
