use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an inventory unit.
///
/// Terminal statuses are soft-end states: the record is kept for the audit
/// trail and never physically deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Available,
    Reserved,
    InTransit,
    Consumed,
    Sold,
    Damaged,
    Expired,
    Sample,
    Adjustment,
    Split,
}

impl UnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Available => "available",
            UnitStatus::Reserved => "reserved",
            UnitStatus::InTransit => "in_transit",
            UnitStatus::Consumed => "consumed",
            UnitStatus::Sold => "sold",
            UnitStatus::Damaged => "damaged",
            UnitStatus::Expired => "expired",
            UnitStatus::Sample => "sample",
            UnitStatus::Adjustment => "adjustment",
            UnitStatus::Split => "split",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "available" => Some(UnitStatus::Available),
            "reserved" => Some(UnitStatus::Reserved),
            "in_transit" => Some(UnitStatus::InTransit),
            "consumed" => Some(UnitStatus::Consumed),
            "sold" => Some(UnitStatus::Sold),
            "damaged" => Some(UnitStatus::Damaged),
            "expired" => Some(UnitStatus::Expired),
            "sample" => Some(UnitStatus::Sample),
            "adjustment" => Some(UnitStatus::Adjustment),
            "split" => Some(UnitStatus::Split),
            _ => None,
        }
    }

    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UnitStatus::Consumed
                | UnitStatus::Sold
                | UnitStatus::Damaged
                | UnitStatus::Expired
                | UnitStatus::Split
        )
    }
}

impl std::fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A physical, independently trackable quantity of product identified by a
/// unique scannable code.
///
/// Invariants maintained by the services:
/// - `status == InTransit` iff `current_transfer_id` references a transfer
///   with status `InTransit`.
/// - While in transit, `current_location_id` stays at the transfer source;
///   it moves to the destination only at completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryUnit {
    pub id: Uuid,
    /// Unique, immutable business key printed on the physical label.
    pub code: String,
    pub product_id: Uuid,
    pub tier_id: Uuid,
    pub tier_label: String,
    /// Quantity in base units (grams, millilitres, eaches).
    pub quantity: Decimal,
    /// Increments each time a parent is split into children.
    pub generation: i32,
    pub status: UnitStatus,
    pub current_location_id: Uuid,
    pub current_transfer_id: Option<Uuid>,
    pub bin_location: Option<String>,
    pub batch_number: Option<String>,
    /// Recorded when the unit is split; the number of children derived.
    pub child_count: Option<i32>,
    /// Optimistic lock; bumped by the registry on every committed update.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryUnit {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            UnitStatus::Available,
            UnitStatus::Reserved,
            UnitStatus::InTransit,
            UnitStatus::Consumed,
            UnitStatus::Sold,
            UnitStatus::Damaged,
            UnitStatus::Expired,
            UnitStatus::Sample,
            UnitStatus::Adjustment,
            UnitStatus::Split,
        ] {
            assert_eq!(UnitStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(UnitStatus::from_str("teleported"), None);
    }

    #[test]
    fn terminal_statuses_are_the_soft_end_states() {
        assert!(UnitStatus::Split.is_terminal());
        assert!(UnitStatus::Damaged.is_terminal());
        assert!(UnitStatus::Sold.is_terminal());
        assert!(!UnitStatus::Available.is_terminal());
        assert!(!UnitStatus::InTransit.is_terminal());
        assert!(!UnitStatus::Reserved.is_terminal());
    }
}
