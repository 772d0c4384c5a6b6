//! Tracelot
//!
//! Lifecycle engine for physically tracked inventory units: a scannable
//! code moves a unit between statuses and locations, transfers carry it
//! between sites, and splits derive smaller-tier children from a parent.
//! The surrounding application (screens, printing UI, checkout) consumes
//! the services exposed here and supplies the collaborators.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod errors;
pub mod events;
pub mod models;
pub mod registry;
pub mod services;

use std::sync::Arc;

use tokio::sync::mpsc;

pub use errors::ServiceError;
pub use models::{InventoryUnit, PackagingTier, ScanEvent, ScanOperation, Transfer, UnitStatus};
pub use services::scanning::{NewUnitRequest, ScanOutcome, ScanRequest};

/// App state definition
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: services::AppServices,
}

impl AppState {
    /// Wires the full service graph. The returned receiver carries domain
    /// events; hand it to [`events::process_events`] or a custom consumer.
    pub fn new(
        config: config::AppConfig,
        registry: Arc<dyn registry::UnitRegistry>,
        collaborators: services::Collaborators,
    ) -> (Self, mpsc::Receiver<events::Event>) {
        let (event_sender, rx) = events::channel(config.event_channel_capacity);
        let services =
            services::AppServices::build(&config, registry, collaborators, event_sender.clone());
        (
            Self {
                config,
                event_sender,
                services,
            },
            rx,
        )
    }

    pub fn scan_processor(&self) -> Arc<services::scanning::ScanProcessor> {
        self.services.scans.clone()
    }

    pub fn transfer_coordinator(&self) -> Arc<services::transfers::TransferCoordinator> {
        self.services.transfers.clone()
    }

    pub fn split_engine(&self) -> Arc<services::splits::SplitEngine> {
        self.services.splits.clone()
    }
}
