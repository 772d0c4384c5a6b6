pub mod scan_event;
pub mod tier;
pub mod transfer;
pub mod unit;

pub use scan_event::{ScanEvent, ScanOperation};
pub use tier::PackagingTier;
pub use transfer::{Transfer, TransferStatus};
pub use unit::{InventoryUnit, UnitStatus};
