use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Draft,
    Approved,
    InTransit,
    Completed,
    Cancelled,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Draft => "draft",
            TransferStatus::Approved => "approved",
            TransferStatus::InTransit => "in_transit",
            TransferStatus::Completed => "completed",
            TransferStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(TransferStatus::Draft),
            "approved" => Some(TransferStatus::Approved),
            "in_transit" => Some(TransferStatus::InTransit),
            "completed" => Some(TransferStatus::Completed),
            "cancelled" => Some(TransferStatus::Cancelled),
            _ => None,
        }
    }

    /// A live transfer still holds its unit; completed/cancelled do not.
    pub fn is_live(&self) -> bool {
        !matches!(self, TransferStatus::Completed | TransferStatus::Cancelled)
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed movement record of one unit from a source to a destination
/// location. The unit reference is frozen once status leaves `Draft`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub id: Uuid,
    /// Human-facing number quoted on manifests, e.g. "TRF-8GK2M4Q7".
    pub transfer_number: String,
    pub source_location_id: Uuid,
    pub destination_location_id: Uuid,
    pub status: TransferStatus,
    pub unit_id: Uuid,
    pub created_by: Uuid,
    /// Optimistic lock; bumped by the registry on every committed update.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}
