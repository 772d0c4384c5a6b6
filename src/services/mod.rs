pub mod codes;
pub mod feedback;
pub mod labels;
pub mod locations;
pub mod lookup;
pub mod scanning;
pub mod splits;
pub mod transfers;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::events::EventSender;
use crate::registry::UnitRegistry;

use feedback::FeedbackSink;
use labels::LabelPrinter;
use locations::LocationService;
use lookup::LookupService;
use scanning::ScanProcessor;
use splits::SplitEngine;
use transfers::TransferCoordinator;

/// The wired service graph consumed by the presentation layer.
#[derive(Clone)]
pub struct AppServices {
    pub scans: Arc<ScanProcessor>,
    pub transfers: Arc<TransferCoordinator>,
    pub splits: Arc<SplitEngine>,
}

/// External collaborators the embedder brings; everything the engine does
/// not own itself.
pub struct Collaborators {
    pub lookup: Arc<dyn LookupService>,
    pub locations: Arc<dyn LocationService>,
    pub printer: Arc<dyn LabelPrinter>,
    pub feedback: Arc<dyn FeedbackSink>,
}

impl AppServices {
    pub fn build(
        config: &AppConfig,
        registry: Arc<dyn UnitRegistry>,
        collaborators: Collaborators,
        event_sender: EventSender,
    ) -> Self {
        let transfers = Arc::new(TransferCoordinator::new(
            registry.clone(),
            collaborators.locations,
            event_sender.clone(),
            config.max_write_retries,
        ));
        let splits = Arc::new(SplitEngine::new(
            registry.clone(),
            collaborators.lookup,
            event_sender.clone(),
            config.code_prefix.clone(),
            config.max_code_attempts,
            config.max_write_retries,
        ));
        let scans = Arc::new(ScanProcessor::new(
            registry,
            transfers.clone(),
            splits.clone(),
            collaborators.printer,
            collaborators.feedback,
            event_sender,
            config.code_prefix.clone(),
            config.max_code_attempts,
            config.max_write_retries,
        ));
        Self {
            scans,
            transfers,
            splits,
        }
    }
}
