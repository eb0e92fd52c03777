//! Registry and supervisor of announce units.

use crate::unit::{AnnounceUnit, UnitHandle};
use herald_agent::{AgentClient, AnnounceKey, Service};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Structural failures surfaced by the announcer. Per-tick failures never
/// appear here; units absorb them and retry on their own.
#[derive(Debug, thiserror::Error)]
pub enum AnnounceError {
    #[error("service is not registered")]
    NotFound,
}

/// Supervisor of one announce unit per service, keyed by `(id, name)`.
///
/// Operations are serialized: the registry lock is held for the whole of
/// each operation, including the child spawn or terminate, so operations on
/// the same announce key are linearized.
pub struct Announcer {
    client: Arc<AgentClient>,
    units: Mutex<BTreeMap<AnnounceKey, AnnounceUnit>>,
}

impl Announcer {
    pub fn new(client: Arc<AgentClient>) -> Self {
        Self {
            client,
            units: Mutex::new(BTreeMap::new()),
        }
    }

    /// Announce a service. Idempotent: registering an already announced key
    /// leaves the existing unit untouched. Two services differing only in
    /// tags share a key and collide onto one unit.
    pub async fn register(&self, service: Service) -> Result<(), AnnounceError> {
        let mut units = self.units.lock().await;
        let key = service.announce_key();
        if units.contains_key(&key) {
            debug!(service = %service, "Service already announced");
            return Ok(());
        }

        info!(service = %service, "Announcing service");
        let unit = AnnounceUnit::spawn(service, self.client.clone()).await;
        units.insert(key, unit);
        Ok(())
    }

    /// Stop announcing a service. The unit deregisters at the agent on the
    /// way down. Fails with `NotFound` when the key was never announced.
    pub async fn unregister(&self, service: &Service) -> Result<(), AnnounceError> {
        let mut units = self.units.lock().await;
        match units.remove(&service.announce_key()) {
            Some(unit) => {
                info!(service = %service, "Unregistering service");
                unit.shutdown().await;
                Ok(())
            }
            None => Err(AnnounceError::NotFound),
        }
    }

    /// Live handle for an announced service, if any.
    pub async fn whereis(&self, service: &Service) -> Option<UnitHandle> {
        self.units
            .lock()
            .await
            .get(&service.announce_key())
            .map(AnnounceUnit::handle)
    }

    /// Number of announced services.
    pub async fn count(&self) -> usize {
        self.units.lock().await.len()
    }

    /// Terminate every unit and clear the registry.
    pub async fn killall(&self) {
        let mut units = self.units.lock().await;
        for (_, unit) in std::mem::take(&mut *units) {
            unit.shutdown().await;
        }
    }

    /// Cascade termination to all units.
    pub async fn shutdown(&self) {
        info!("Shutting down announcer");
        self.killall().await;
    }
}
