//! Splitting a parent unit into N smaller-tier children.
//!
//! The derivation is strictly one-directional: children never merge back
//! and the parent ends terminal. Parent update, child inserts, and the scan
//! event land as one batch, so a failed split leaves nothing behind.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use lazy_static::lazy_static;
use prometheus::IntCounter;
use rust_decimal::Decimal;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{InventoryUnit, PackagingTier, ScanEvent, ScanOperation, UnitStatus};
use crate::registry::{UnitRegistry, WriteBatch};

use super::codes;
use super::lookup::LookupService;

lazy_static! {
    static ref SPLITS_TOTAL: IntCounter = IntCounter::new(
        "unit_splits_total",
        "Total number of unit splits performed"
    )
    .expect("metric can be created");
    static ref SPLIT_FAILURES: IntCounter = IntCounter::new(
        "unit_split_failures_total",
        "Total number of failed unit splits"
    )
    .expect("metric can be created");
}

/// Result of deriving children from a parent unit.
#[derive(Debug, Clone)]
pub struct SplitOutcome {
    pub parent: InventoryUnit,
    pub tier: PackagingTier,
    pub children: Vec<InventoryUnit>,
    pub event: ScanEvent,
}

/// Whether `count` children of `tier_quantity` fit inside `parent_quantity`.
pub fn children_fit(parent_quantity: Decimal, tier_quantity: Decimal, count: u32) -> bool {
    tier_quantity > Decimal::ZERO && tier_quantity * Decimal::from(count) <= parent_quantity
}

#[derive(Clone)]
pub struct SplitEngine {
    registry: Arc<dyn UnitRegistry>,
    lookup: Arc<dyn LookupService>,
    event_sender: EventSender,
    code_prefix: String,
    max_code_attempts: u32,
    max_write_retries: u32,
}

impl SplitEngine {
    pub fn new(
        registry: Arc<dyn UnitRegistry>,
        lookup: Arc<dyn LookupService>,
        event_sender: EventSender,
        code_prefix: String,
        max_code_attempts: u32,
        max_write_retries: u32,
    ) -> Self {
        Self {
            registry,
            lookup,
            event_sender,
            code_prefix,
            max_code_attempts,
            max_write_retries,
        }
    }

    /// Derives `count` children of the given tier from the parent and marks
    /// the parent `split` (terminal), all in one atomic batch.
    #[instrument(skip(self))]
    pub async fn derive_children(
        &self,
        parent_code: &str,
        tier_id: Uuid,
        count: u32,
        user_id: Uuid,
    ) -> Result<SplitOutcome, ServiceError> {
        if count < 2 {
            SPLIT_FAILURES.inc();
            return Err(ServiceError::ValidationError(
                "A split must produce at least 2 children".into(),
            ));
        }

        let mut attempts = 0u32;
        let outcome = loop {
            match self.try_split(parent_code, tier_id, count, user_id).await {
                Ok(outcome) => break outcome,
                Err(err) if err.is_retryable() && attempts < self.max_write_retries => {
                    attempts += 1;
                    warn!(parent_code, attempts, "Write conflict splitting unit, retrying");
                }
                Err(err) if err.is_retryable() => {
                    SPLIT_FAILURES.inc();
                    return Err(ServiceError::Contention(format!(
                        "Unit {} lost {} optimistic-lock races while splitting",
                        parent_code,
                        attempts + 1
                    )));
                }
                Err(err) => {
                    SPLIT_FAILURES.inc();
                    return Err(err);
                }
            }
        };

        SPLITS_TOTAL.inc();
        if let Err(e) = self
            .event_sender
            .send(Event::UnitSplit {
                parent_id: outcome.parent.id,
                tier_id,
                child_count: count,
            })
            .await
        {
            error!(error = %e, "Failed to publish split event");
        }
        info!(
            parent = %outcome.parent.code,
            tier = %outcome.tier.label,
            children = outcome.children.len(),
            "Unit split"
        );
        Ok(outcome)
    }

    async fn try_split(
        &self,
        parent_code: &str,
        tier_id: Uuid,
        count: u32,
        user_id: Uuid,
    ) -> Result<SplitOutcome, ServiceError> {
        let parent = self
            .registry
            .find_by_code(parent_code)
            .await?
            .ok_or_else(|| ServiceError::unknown_code(parent_code))?;
        if parent.status != UnitStatus::Available {
            return Err(ServiceError::InvalidTransition(format!(
                "Unit {} is {}, only available units can be split",
                parent.code, parent.status
            )));
        }

        let tier = self.resolve_child_tier(&parent, tier_id).await?;

        if !children_fit(parent.quantity, tier.quantity, count) {
            return Err(ServiceError::InsufficientQuantity(format!(
                "Unit {} holds {}, cannot yield {} x {} ({})",
                parent.code,
                parent.quantity,
                count,
                tier.quantity,
                tier.label
            )));
        }

        let now = Utc::now();
        let mut taken = HashSet::new();
        let mut children = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let code = codes::allocate_unique_code(
                &self.registry,
                &self.code_prefix,
                &taken,
                self.max_code_attempts,
            )
            .await?;
            taken.insert(code.clone());
            children.push(InventoryUnit {
                id: Uuid::new_v4(),
                code,
                product_id: parent.product_id,
                tier_id: tier.id,
                tier_label: tier.label.clone(),
                quantity: tier.quantity,
                generation: parent.generation + 1,
                status: UnitStatus::Available,
                current_location_id: parent.current_location_id,
                current_transfer_id: None,
                bin_location: parent.bin_location.clone(),
                batch_number: parent.batch_number.clone(),
                child_count: None,
                version: 1,
                created_at: now,
                updated_at: now,
            });
        }

        let mut ended = parent.clone();
        ended.status = UnitStatus::Split;
        ended.child_count = Some(count as i32);
        ended.updated_at = now;

        let event = ScanEvent::record(
            &parent.code,
            ScanOperation::Split,
            parent.current_location_id,
            user_id,
            UnitStatus::Split,
        )
        .with_notes(Some(format!("{} x {}", count, tier.label)));

        let mut batch = WriteBatch::new()
            .update_unit(ended)
            .append_event(event.clone());
        for child in &children {
            batch = batch.insert_unit(child.clone());
        }
        let receipt = self.registry.commit(batch).await?;

        let parent = receipt
            .unit(parent.id)
            .cloned()
            .ok_or_else(|| ServiceError::InternalError("Commit receipt lost the parent".into()))?;
        Ok(SplitOutcome {
            parent,
            tier,
            children,
            event,
        })
    }

    /// The child tier must belong to the parent's product and be strictly
    /// smaller than the parent's own tier.
    async fn resolve_child_tier(
        &self,
        parent: &InventoryUnit,
        tier_id: Uuid,
    ) -> Result<PackagingTier, ServiceError> {
        let tiers = self.lookup.product_tiers(parent.product_id).await?;
        let tier = tiers
            .iter()
            .find(|t| t.id == tier_id)
            .cloned()
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Product {} has no packaging tier {}",
                    parent.product_id, tier_id
                ))
            })?;

        let parent_tier_quantity = tiers
            .iter()
            .find(|t| t.id == parent.tier_id)
            .map(|t| t.quantity)
            .unwrap_or(parent.quantity);
        if tier.quantity >= parent_tier_quantity {
            return Err(ServiceError::ValidationError(format!(
                "Tier {} is not smaller than the parent's tier",
                tier.label
            )));
        }
        Ok(tier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn fit_check_matches_the_label_math() {
        // A 1 lb unit yields exactly four 4 oz units.
        assert!(children_fit(dec!(453.6), dec!(113.4), 4));
        assert!(!children_fit(dec!(453.6), dec!(113.4), 5));
        assert!(!children_fit(dec!(453.6), dec!(0), 2));
    }

    proptest! {
        /// Children can never hold more product than the parent did.
        #[test]
        fn children_never_exceed_parent(
            parent_milligrams in 1u64..50_000_000,
            tier_milligrams in 1u64..5_000_000,
            count in 2u32..64,
        ) {
            let parent = Decimal::from(parent_milligrams) / dec!(1000);
            let tier = Decimal::from(tier_milligrams) / dec!(1000);
            if children_fit(parent, tier, count) {
                prop_assert!(tier * Decimal::from(count) <= parent);
            }
        }
    }
}
