use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::unit::UnitStatus;

/// Operation requested by a scan (or the UI action standing in for one).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOperation {
    Receive,
    TransferOut,
    Complete,
    Audit,
    Damage,
    Reprint,
    Split,
}

impl ScanOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanOperation::Receive => "receive",
            ScanOperation::TransferOut => "transfer_out",
            ScanOperation::Complete => "complete",
            ScanOperation::Audit => "audit",
            ScanOperation::Damage => "damage",
            ScanOperation::Reprint => "reprint",
            ScanOperation::Split => "split",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "receive" => Some(ScanOperation::Receive),
            "transfer_out" => Some(ScanOperation::TransferOut),
            "complete" => Some(ScanOperation::Complete),
            "audit" => Some(ScanOperation::Audit),
            "damage" => Some(ScanOperation::Damage),
            "reprint" => Some(ScanOperation::Reprint),
            "split" => Some(ScanOperation::Split),
            _ => None,
        }
    }
}

impl std::fmt::Display for ScanOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of an attempted state transition triggered by reading a
/// code. Appended on every successful operation, never mutated; the tuple
/// `(unit_code, operation, transfer_id)` doubles as the idempotency key for
/// mobile clients that retry on network ambiguity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanEvent {
    pub id: Uuid,
    pub unit_code: String,
    pub operation: ScanOperation,
    pub location_id: Uuid,
    pub user_id: Uuid,
    pub transfer_id: Option<Uuid>,
    /// Counted-minus-recorded difference captured by an audit scan.
    pub quantity_variance: Option<Decimal>,
    pub notes: Option<String>,
    pub resulting_status: UnitStatus,
    pub recorded_at: DateTime<Utc>,
}

impl ScanEvent {
    /// Builds the common shell of an event; callers fill in the optionals.
    pub fn record(
        unit_code: &str,
        operation: ScanOperation,
        location_id: Uuid,
        user_id: Uuid,
        resulting_status: UnitStatus,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            unit_code: unit_code.to_string(),
            operation,
            location_id,
            user_id,
            transfer_id: None,
            quantity_variance: None,
            notes: None,
            resulting_status,
            recorded_at: Utc::now(),
        }
    }

    pub fn with_transfer(mut self, transfer_id: Uuid) -> Self {
        self.transfer_id = Some(transfer_id);
        self
    }

    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = notes;
        self
    }

    pub fn with_variance(mut self, variance: Decimal) -> Self {
        self.quantity_variance = Some(variance);
        self
    }
}
