use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A predefined packaging/quantity size for a product (e.g. "1/8 oz",
/// "1 lb"). Tier catalogs are owned by the product service and reach this
/// crate read-only through the lookup collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagingTier {
    pub id: Uuid,
    pub product_id: Uuid,
    pub label: String,
    /// Base units contained in one unit of this tier.
    pub quantity: Decimal,
    pub sort_order: i32,
}
