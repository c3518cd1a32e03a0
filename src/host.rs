use std::{
    collections::{BTreeMap, HashSet},
    sync::Arc,
    time::Duration,
};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::{
    sync::{Mutex, RwLock},
    time::{self, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

use crate::{
    climate::{self, ClimateEntity},
    control::CommandDispatcher,
    sensors::{self, SensorEntity},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Sensor,
    Climate,
}

/// Platforms published once the hub is reachable.
pub const PLATFORMS: [Platform; 2] = [Platform::Sensor, Platform::Climate];

/// The home-automation host the integration publishes its entities into.
#[async_trait]
pub trait Host: Send + Sync {
    /// Create the entities of `platform`. The dispatcher carries the shared
    /// coordinator the entities read from.
    async fn load_platform(&self, platform: Platform, dispatcher: CommandDispatcher) -> Result<()>;
}

/// What an entity shows to the user at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct EntityState {
    pub unique_id: String,
    pub platform: Platform,
    pub name: String,
    pub icon: Option<String>,
    /// `None` when the hub has not reported the value.
    pub state: Option<String>,
    #[schema(value_type = Object)]
    pub attributes: BTreeMap<String, Value>,
}

impl EntityState {
    pub fn new(unique_id: impl Into<String>, platform: Platform, name: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            platform,
            name: name.into(),
            icon: None,
            state: None,
            attributes: BTreeMap::new(),
        }
    }
}

#[derive(Clone)]
pub enum Entity {
    Sensor(SensorEntity),
    Climate(ClimateEntity),
}

impl Entity {
    pub async fn update(&self) -> bool {
        match self {
            Entity::Sensor(e) => e.update().await,
            Entity::Climate(e) => e.update().await,
        }
    }

    pub async fn state(&self) -> EntityState {
        match self {
            Entity::Sensor(e) => e.state().await,
            Entity::Climate(e) => e.state().await,
        }
    }
}

// ---------------------------------------------------------------------------
// EntityRegistry
// ---------------------------------------------------------------------------

/// Every entity published so far, shared between the host, the poll loop
/// and the API.
#[derive(Clone, Default)]
pub struct EntityRegistry {
    inner: Arc<RwLock<Vec<Entity>>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn extend(&self, entities: impl IntoIterator<Item = Entity>) {
        self.inner.write().await.extend(entities);
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    pub async fn climate(&self, room_id: u32) -> Option<ClimateEntity> {
        self.inner.read().await.iter().find_map(|e| match e {
            Entity::Climate(c) if c.room_id() == room_id => Some(c.clone()),
            _ => None,
        })
    }

    /// Run every entity's update hook. Returns how many reported success.
    pub async fn update_all(&self) -> usize {
        let entities = self.inner.read().await.clone();
        let mut ok = 0;
        for entity in &entities {
            if entity.update().await {
                ok += 1;
            }
        }
        ok
    }

    pub async fn states(&self) -> Vec<EntityState> {
        let entities = self.inner.read().await.clone();
        let mut states = Vec::with_capacity(entities.len());
        for entity in &entities {
            states.push(entity.state().await);
        }
        states
    }
}

// ---------------------------------------------------------------------------
// StandaloneHost
// ---------------------------------------------------------------------------

/// Host used when the service runs on its own: entities land in an
/// [`EntityRegistry`] served by the REST API.
pub struct StandaloneHost {
    registry: EntityRegistry,
    loaded: Mutex<HashSet<Platform>>,
}

impl StandaloneHost {
    pub fn new(registry: EntityRegistry) -> Self {
        Self {
            registry,
            loaded: Mutex::new(HashSet::new()),
        }
    }
}

#[async_trait]
impl Host for StandaloneHost {
    async fn load_platform(&self, platform: Platform, dispatcher: CommandDispatcher) -> Result<()> {
        // Held for the whole load; the platform only counts as loaded once
        // its entities are registered, so a failed load can be retried.
        let mut loaded = self.loaded.lock().await;
        if loaded.contains(&platform) {
            warn!(?platform, "Platform already loaded, ignoring");
            return Ok(());
        }

        let coordinator = dispatcher.coordinator();
        let snapshot = coordinator
            .snapshot()
            .await
            .context("cannot load platform before the first hub refresh")?;

        let entities: Vec<Entity> = match platform {
            Platform::Sensor => sensors::setup_entities(coordinator, &snapshot)
                .into_iter()
                .map(Entity::Sensor)
                .collect(),
            Platform::Climate => climate::setup_entities(&dispatcher, &snapshot)
                .into_iter()
                .map(Entity::Climate)
                .collect(),
        };

        info!(?platform, count = entities.len(), "Platform loaded");
        self.registry.extend(entities).await;
        loaded.insert(platform);
        Ok(())
    }
}

/// Poll every registered entity each `period` until `cancel` fires.
pub async fn poll_loop(registry: EntityRegistry, period: Duration, cancel: CancellationToken) {
    info!(interval_secs = period.as_secs(), "Entity poll loop started");
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("Entity poll loop stopped");
                return;
            }
            _ = ticker.tick() => {
                let ok = registry.update_all().await;
                debug!(updated = ok, "Entity poll complete");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        control::CommandSettings,
        testing::{coordinator_with, StubHub},
    };

    const INTERVAL: Duration = Duration::from_secs(30);

    fn dispatcher(hub: Arc<StubHub>) -> CommandDispatcher {
        let (coordinator, _) = coordinator_with(hub, INTERVAL);
        CommandDispatcher::new(coordinator, CommandSettings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn loading_before_first_refresh_fails() {
        let host = StandaloneHost::new(EntityRegistry::new());
        let d = dispatcher(Arc::new(StubHub::new()));

        assert!(host.load_platform(Platform::Sensor, d).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_load_can_be_retried_after_refresh() {
        let registry = EntityRegistry::new();
        let host = StandaloneHost::new(registry.clone());
        let d = dispatcher(Arc::new(StubHub::new()));

        assert!(host.load_platform(Platform::Sensor, d.clone()).await.is_err());
        assert_eq!(registry.len().await, 0);

        d.coordinator().refresh(true).await;
        host.load_platform(Platform::Sensor, d).await.unwrap();

        assert_eq!(registry.len().await, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn platforms_populate_registry_once() {
        let registry = EntityRegistry::new();
        let host = StandaloneHost::new(registry.clone());
        let d = dispatcher(Arc::new(StubHub::new()));
        d.coordinator().refresh(true).await;

        host.load_platform(Platform::Sensor, d.clone()).await.unwrap();
        host.load_platform(Platform::Climate, d.clone()).await.unwrap();
        host.load_platform(Platform::Sensor, d).await.unwrap();

        // 9 sensors + 2 rooms
        assert_eq!(registry.len().await, 11);
        assert!(registry.climate(1).await.is_some());
        assert!(registry.climate(3).await.is_none());

        let states = registry.states().await;
        assert!(states.iter().any(|s| s.name == "Wiser Heathub"));
        assert!(states.iter().any(|s| s.name == "Wiser Lounge"));
    }

    #[tokio::test(start_paused = true)]
    async fn poll_loop_refreshes_each_interval_until_cancelled() {
        let hub = Arc::new(StubHub::new());
        let registry = EntityRegistry::new();
        let host = StandaloneHost::new(registry.clone());
        let d = dispatcher(hub.clone());
        d.coordinator().refresh(true).await;
        host.load_platform(Platform::Sensor, d).await.unwrap();

        let cancel = CancellationToken::new();
        let task = tokio::spawn(poll_loop(registry, INTERVAL, cancel.clone()));

        // First tick fires immediately but the cache is still fresh.
        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(hub.fetch_count(), 1);

        time::sleep(INTERVAL).await;
        assert_eq!(hub.fetch_count(), 2);

        cancel.cancel();
        task.await.unwrap();
    }
}
