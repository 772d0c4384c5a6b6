//! Label printing collaborator: renders and sends a physical label for a
//! unit, reporting success or failure only.

use async_trait::async_trait;
use tracing::debug;

use crate::models::InventoryUnit;

#[async_trait]
pub trait LabelPrinter: Send + Sync {
    async fn print_label(&self, unit: &InventoryUnit) -> Result<(), String>;
}

/// Printer that accepts every job; for tests and headless deployments.
pub struct NullPrinter;

#[async_trait]
impl LabelPrinter for NullPrinter {
    async fn print_label(&self, unit: &InventoryUnit) -> Result<(), String> {
        debug!(code = %unit.code, "Label print skipped (null printer)");
        Ok(())
    }
}
