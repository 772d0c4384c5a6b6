//! Location directory collaborator.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::ServiceError;

#[derive(Debug, Clone)]
pub struct LocationSummary {
    pub id: Uuid,
    pub name: String,
    pub active: bool,
}

#[async_trait]
pub trait LocationService: Send + Sync {
    /// Active locations for a store, for destination pickers.
    async fn active_locations(&self, store_id: Uuid)
        -> Result<Vec<LocationSummary>, ServiceError>;

    /// Whether units may be routed to the location.
    async fn is_active(&self, location_id: Uuid) -> Result<bool, ServiceError>;
}

/// Directory seeded by the embedder; unknown locations count as inactive.
#[derive(Default)]
pub struct StaticLocations {
    by_store: RwLock<HashMap<Uuid, Vec<LocationSummary>>>,
}

impl StaticLocations {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, store_id: Uuid, location: LocationSummary) {
        self.by_store
            .write()
            .await
            .entry(store_id)
            .or_default()
            .push(location);
    }
}

#[async_trait]
impl LocationService for StaticLocations {
    async fn active_locations(
        &self,
        store_id: Uuid,
    ) -> Result<Vec<LocationSummary>, ServiceError> {
        Ok(self
            .by_store
            .read()
            .await
            .get(&store_id)
            .map(|locations| locations.iter().filter(|l| l.active).cloned().collect())
            .unwrap_or_default())
    }

    async fn is_active(&self, location_id: Uuid) -> Result<bool, ServiceError> {
        Ok(self
            .by_store
            .read()
            .await
            .values()
            .flatten()
            .any(|l| l.id == location_id && l.active))
    }
}

/// Permissive directory for tests and single-site deployments.
pub struct AllLocationsActive;

#[async_trait]
impl LocationService for AllLocationsActive {
    async fn active_locations(
        &self,
        _store_id: Uuid,
    ) -> Result<Vec<LocationSummary>, ServiceError> {
        Ok(Vec::new())
    }

    async fn is_active(&self, _location_id: Uuid) -> Result<bool, ServiceError> {
        Ok(true)
    }
}
