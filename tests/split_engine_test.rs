mod common;

use assert_matches::assert_matches;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use uuid::Uuid;

use tracelot::errors::ServiceError;
use tracelot::models::UnitStatus;
use tracelot::registry::UnitRegistry;
use tracelot::services::scanning::ScanRequest;
use tracelot::ScanOperation;

use common::{assert_lifecycle_invariants, harness, seed_pound_product, seed_unit};

#[tokio::test]
async fn a_pound_splits_into_four_quarters() {
    let h = harness();
    let product = seed_pound_product(&h).await;
    let location = Uuid::new_v4();
    let user = Uuid::new_v4();
    let parent = seed_unit(
        &h.registry,
        "TLU-POUND",
        product.product_id,
        &product.pound_tier,
        dec!(453.6),
        location,
    )
    .await;

    let outcome = h
        .services
        .splits
        .derive_children("TLU-POUND", product.quarter_tier.id, 4, user)
        .await
        .unwrap();

    assert_eq!(outcome.children.len(), 4);
    let children_total: Decimal = outcome.children.iter().map(|c| c.quantity).sum();
    assert!(children_total <= parent.quantity);

    for child in &outcome.children {
        assert_eq!(child.generation, parent.generation + 1);
        assert_eq!(child.status, UnitStatus::Available);
        assert_eq!(child.quantity, dec!(113.4));
        assert_eq!(child.current_location_id, location);
        assert_eq!(child.batch_number, parent.batch_number);
        assert_ne!(child.code, parent.code);
    }
    // Every child code is unique.
    let mut codes: Vec<_> = outcome.children.iter().map(|c| c.code.clone()).collect();
    codes.sort();
    codes.dedup();
    assert_eq!(codes.len(), 4);

    assert_eq!(outcome.parent.status, UnitStatus::Split);
    assert_eq!(outcome.parent.child_count, Some(4));
    assert_lifecycle_invariants(&h.registry).await;
}

#[tokio::test]
async fn oversubscribed_split_fails_with_insufficient_quantity() {
    let h = harness();
    let product = seed_pound_product(&h).await;
    let location = Uuid::new_v4();
    let parent = seed_unit(
        &h.registry,
        "TLU-THIN",
        product.product_id,
        &product.pound_tier,
        dec!(453.6),
        location,
    )
    .await;

    let err = h
        .services
        .splits
        .derive_children("TLU-THIN", product.quarter_tier.id, 5, Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientQuantity(_));

    // Nothing was created, the parent is untouched.
    let stored = h.registry.find_by_id(parent.id).await.unwrap().unwrap();
    assert_eq!(stored.status, UnitStatus::Available);
    assert_eq!(stored.version, 1);
    assert_eq!(h.registry.all_units().await.len(), 1);
    assert_eq!(h.registry.event_count().await, 0);
}

#[tokio::test]
async fn fewer_than_two_children_is_not_a_split() {
    let h = harness();
    let product = seed_pound_product(&h).await;
    seed_unit(
        &h.registry,
        "TLU-ONESIE",
        product.product_id,
        &product.pound_tier,
        dec!(453.6),
        Uuid::new_v4(),
    )
    .await;

    for count in [0, 1] {
        let err = h
            .services
            .splits
            .derive_children("TLU-ONESIE", product.quarter_tier.id, count, Uuid::new_v4())
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }
}

#[tokio::test]
async fn splitting_into_the_same_or_larger_tier_is_rejected() {
    let h = harness();
    let product = seed_pound_product(&h).await;
    seed_unit(
        &h.registry,
        "TLU-SIDEWAYS",
        product.product_id,
        &product.pound_tier,
        dec!(453.6),
        Uuid::new_v4(),
    )
    .await;

    let err = h
        .services
        .splits
        .derive_children("TLU-SIDEWAYS", product.pound_tier.id, 2, Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn unknown_tier_is_not_found() {
    let h = harness();
    let product = seed_pound_product(&h).await;
    seed_unit(
        &h.registry,
        "TLU-NOTIER",
        product.product_id,
        &product.pound_tier,
        dec!(453.6),
        Uuid::new_v4(),
    )
    .await;

    let err = h
        .services
        .splits
        .derive_children("TLU-NOTIER", Uuid::new_v4(), 2, Uuid::new_v4())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn split_through_the_scan_surface_carries_the_children() {
    let h = harness();
    let product = seed_pound_product(&h).await;
    let location = Uuid::new_v4();
    let user = Uuid::new_v4();
    seed_unit(
        &h.registry,
        "TLU-SCANSPLIT",
        product.product_id,
        &product.pound_tier,
        dec!(453.6),
        location,
    )
    .await;

    let mut request = ScanRequest::new("TLU-SCANSPLIT", ScanOperation::Split, location, user);
    request.tier_id = Some(product.quarter_tier.id);
    request.count = Some(4);
    let outcome = h.services.scans.scan(request.clone()).await.unwrap();

    assert_eq!(outcome.unit.status, UnitStatus::Split);
    assert_eq!(outcome.children.as_ref().unwrap().len(), 4);
    assert_eq!(outcome.event.operation, ScanOperation::Split);

    // A split is irreversible; the retried scan replays instead of
    // deriving a second batch.
    let replay = h.services.scans.scan(request).await.unwrap();
    assert!(replay.replayed);
    let generation_one = h
        .registry
        .all_units()
        .await
        .into_iter()
        .filter(|u| u.generation == 1)
        .count();
    assert_eq!(generation_one, 4);

    // Missing tier or count never reach the engine.
    let mut incomplete = ScanRequest::new("TLU-SCANSPLIT", ScanOperation::Split, location, user);
    incomplete.count = Some(4);
    let err = h.services.scans.scan(incomplete).await.unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn a_child_can_be_split_again_one_generation_deeper() {
    let h = harness();
    let product = seed_pound_product(&h).await;
    let location = Uuid::new_v4();
    let user = Uuid::new_v4();

    // Register a smaller tier under the quarter: 1 oz.
    let ounce_tier = tracelot::PackagingTier {
        id: Uuid::new_v4(),
        product_id: product.product_id,
        label: "1 oz".into(),
        quantity: dec!(28.35),
        sort_order: 0,
    };
    h.lookup.register_tier(ounce_tier.clone()).await;

    seed_unit(
        &h.registry,
        "TLU-DEEP",
        product.product_id,
        &product.pound_tier,
        dec!(453.6),
        location,
    )
    .await;

    let first = h
        .services
        .splits
        .derive_children("TLU-DEEP", product.quarter_tier.id, 4, user)
        .await
        .unwrap();
    let child = &first.children[0];

    let second = h
        .services
        .splits
        .derive_children(&child.code, ounce_tier.id, 4, user)
        .await
        .unwrap();
    assert_eq!(second.parent.status, UnitStatus::Split);
    for grandchild in &second.children {
        assert_eq!(grandchild.generation, 2);
        assert_eq!(grandchild.quantity, dec!(28.35));
    }
    assert_lifecycle_invariants(&h.registry).await;
}
