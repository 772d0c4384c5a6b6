#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use tracelot::config::AppConfig;
use tracelot::errors::ServiceError;
use tracelot::events;
use tracelot::models::{
    InventoryUnit, PackagingTier, ScanEvent, ScanOperation, Transfer, TransferStatus, UnitStatus,
};
use tracelot::registry::{CommitReceipt, InMemoryRegistry, UnitRegistry, WriteBatch};
use tracelot::services::feedback::NullFeedback;
use tracelot::services::labels::NullPrinter;
use tracelot::services::locations::AllLocationsActive;
use tracelot::services::lookup::{InMemoryLookup, ProductSummary};
use tracelot::services::{AppServices, Collaborators};

/// Fully wired in-memory stack for integration tests.
pub struct Harness {
    pub registry: Arc<InMemoryRegistry>,
    pub lookup: Arc<InMemoryLookup>,
    pub services: AppServices,
}

pub fn harness() -> Harness {
    let config = AppConfig::default();
    let registry = Arc::new(InMemoryRegistry::new());
    let lookup = Arc::new(InMemoryLookup::new(registry.clone()));
    let (event_sender, rx) = events::channel(config.event_channel_capacity);
    tokio::spawn(events::process_events(rx));

    let services = AppServices::build(
        &config,
        registry.clone(),
        Collaborators {
            lookup: lookup.clone(),
            locations: Arc::new(AllLocationsActive),
            printer: Arc::new(NullPrinter),
            feedback: Arc::new(NullFeedback),
        },
        event_sender,
    );
    Harness {
        registry,
        lookup,
        services,
    }
}

/// A product with a pound tier and an eighth-pound tier, mirroring the
/// 453.6 g / 113.4 g labels on the shelf.
pub struct PoundProduct {
    pub product_id: Uuid,
    pub pound_tier: PackagingTier,
    pub quarter_tier: PackagingTier,
}

pub async fn seed_pound_product(harness: &Harness) -> PoundProduct {
    let product_id = Uuid::new_v4();
    let pound_tier = PackagingTier {
        id: Uuid::new_v4(),
        product_id,
        label: "1 lb".into(),
        quantity: dec!(453.6),
        sort_order: 2,
    };
    let quarter_tier = PackagingTier {
        id: Uuid::new_v4(),
        product_id,
        label: "4 oz".into(),
        quantity: dec!(113.4),
        sort_order: 1,
    };
    harness
        .lookup
        .register_product(ProductSummary {
            id: product_id,
            name: "House Blend".into(),
            sku: "HB-001".into(),
        })
        .await;
    harness.lookup.register_tier(pound_tier.clone()).await;
    harness.lookup.register_tier(quarter_tier.clone()).await;
    PoundProduct {
        product_id,
        pound_tier,
        quarter_tier,
    }
}

pub async fn seed_unit(
    registry: &InMemoryRegistry,
    code: &str,
    product_id: Uuid,
    tier: &PackagingTier,
    quantity: Decimal,
    location_id: Uuid,
) -> InventoryUnit {
    let now = Utc::now();
    let unit = InventoryUnit {
        id: Uuid::new_v4(),
        code: code.to_string(),
        product_id,
        tier_id: tier.id,
        tier_label: tier.label.clone(),
        quantity,
        generation: 0,
        status: UnitStatus::Available,
        current_location_id: location_id,
        current_transfer_id: None,
        bin_location: Some("A-03".into()),
        batch_number: Some("B-2026-031".into()),
        child_count: None,
        version: 1,
        created_at: now,
        updated_at: now,
    };
    registry
        .commit(WriteBatch::new().insert_unit(unit.clone()))
        .await
        .expect("seed unit");
    unit
}

/// Checks invariant A (in-transit iff a live transfer references the unit)
/// and invariant B (an in-transit unit still sits at the transfer source)
/// over the whole registry.
pub async fn assert_lifecycle_invariants(registry: &InMemoryRegistry) {
    let units = registry.all_units().await;
    let transfers = registry.all_transfers().await;

    for unit in &units {
        match (unit.status, unit.current_transfer_id) {
            (UnitStatus::InTransit, Some(transfer_id)) => {
                let transfer = transfers
                    .iter()
                    .find(|t| t.id == transfer_id)
                    .unwrap_or_else(|| {
                        panic!("unit {} references missing transfer", unit.code)
                    });
                assert_eq!(
                    transfer.status,
                    TransferStatus::InTransit,
                    "unit {} is in transit but its transfer is {}",
                    unit.code,
                    transfer.status
                );
                assert_eq!(
                    unit.current_location_id, transfer.source_location_id,
                    "unit {} moved off the source before completion",
                    unit.code
                );
            }
            (UnitStatus::InTransit, None) => {
                panic!("unit {} is in transit with no transfer", unit.code)
            }
            (_, Some(transfer_id)) => {
                if let Some(transfer) = transfers.iter().find(|t| t.id == transfer_id) {
                    assert_ne!(
                        transfer.status,
                        TransferStatus::InTransit,
                        "unit {} is {} but still holds a live transfer",
                        unit.code,
                        unit.status
                    );
                }
            }
            (_, None) => {}
        }
    }

    for transfer in transfers.iter().filter(|t| t.status == TransferStatus::InTransit) {
        let unit = units
            .iter()
            .find(|u| u.id == transfer.unit_id)
            .unwrap_or_else(|| panic!("transfer {} references missing unit", transfer.id));
        assert_eq!(
            unit.status,
            UnitStatus::InTransit,
            "transfer {} is in transit but its unit is {}",
            transfer.transfer_number,
            unit.status
        );
        assert_eq!(unit.current_transfer_id, Some(transfer.id));
    }
}

/// Registry that is unreachable: every call surfaces `NetworkError`, the
/// way a timed-out backend must.
pub struct UnreachableRegistry;

fn unreachable() -> ServiceError {
    ServiceError::NetworkError("registry unreachable: connection timed out".into())
}

#[async_trait]
impl UnitRegistry for UnreachableRegistry {
    async fn find_by_code(&self, _code: &str) -> Result<Option<InventoryUnit>, ServiceError> {
        Err(unreachable())
    }

    async fn find_by_id(&self, _id: Uuid) -> Result<Option<InventoryUnit>, ServiceError> {
        Err(unreachable())
    }

    async fn get_transfer(&self, _id: Uuid) -> Result<Option<Transfer>, ServiceError> {
        Err(unreachable())
    }

    async fn find_transfer_for_unit(
        &self,
        _unit_id: Uuid,
    ) -> Result<Option<Transfer>, ServiceError> {
        Err(unreachable())
    }

    async fn latest_event(
        &self,
        _code: &str,
        _operation: ScanOperation,
        _transfer_id: Option<Uuid>,
    ) -> Result<Option<ScanEvent>, ServiceError> {
        Err(unreachable())
    }

    async fn events_for_code(&self, _code: &str) -> Result<Vec<ScanEvent>, ServiceError> {
        Err(unreachable())
    }

    async fn commit(&self, _batch: WriteBatch) -> Result<CommitReceipt, ServiceError> {
        Err(unreachable())
    }
}
