//! Read-only resolution of a scanned code to its surrounding context.
//!
//! The product catalog and tier definitions live in the wider application;
//! this crate consumes them through the [`LookupService`] trait. The
//! in-memory implementation backs the test suite and lightweight embedders.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::models::{InventoryUnit, PackagingTier, Transfer};
use crate::registry::UnitRegistry;

/// Slim product context attached to a resolved code.
#[derive(Debug, Clone)]
pub struct ProductSummary {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
}

/// Everything a scanning screen needs to render after one code read.
#[derive(Debug, Clone)]
pub struct CodeResolution {
    pub unit: InventoryUnit,
    pub product: Option<ProductSummary>,
    pub transfer: Option<Transfer>,
}

#[async_trait]
pub trait LookupService: Send + Sync {
    /// Resolves a code to its unit plus product and live transfer context.
    async fn resolve_code(&self, code: &str) -> Result<Option<CodeResolution>, ServiceError>;

    /// The packaging tier catalog for a product, smallest first.
    async fn product_tiers(&self, product_id: Uuid) -> Result<Vec<PackagingTier>, ServiceError>;
}

/// Registry-backed lookup with a locally registered product/tier catalog.
pub struct InMemoryLookup {
    registry: Arc<dyn UnitRegistry>,
    products: RwLock<HashMap<Uuid, ProductSummary>>,
    tiers: RwLock<HashMap<Uuid, Vec<PackagingTier>>>,
}

impl InMemoryLookup {
    pub fn new(registry: Arc<dyn UnitRegistry>) -> Self {
        Self {
            registry,
            products: RwLock::new(HashMap::new()),
            tiers: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register_product(&self, product: ProductSummary) {
        self.products.write().await.insert(product.id, product);
    }

    pub async fn register_tier(&self, tier: PackagingTier) {
        let mut tiers = self.tiers.write().await;
        let catalog = tiers.entry(tier.product_id).or_default();
        catalog.push(tier);
        catalog.sort_by(|a, b| a.quantity.cmp(&b.quantity));
    }
}

#[async_trait]
impl LookupService for InMemoryLookup {
    async fn resolve_code(&self, code: &str) -> Result<Option<CodeResolution>, ServiceError> {
        let Some(unit) = self.registry.find_by_code(code).await? else {
            return Ok(None);
        };
        let transfer = match unit.current_transfer_id {
            Some(id) => self.registry.get_transfer(id).await?,
            None => None,
        };
        let product = self.products.read().await.get(&unit.product_id).cloned();
        Ok(Some(CodeResolution {
            unit,
            product,
            transfer,
        }))
    }

    async fn product_tiers(&self, product_id: Uuid) -> Result<Vec<PackagingTier>, ServiceError> {
        Ok(self
            .tiers
            .read()
            .await
            .get(&product_id)
            .cloned()
            .unwrap_or_default())
    }
}
