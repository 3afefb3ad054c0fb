//! Per-instance cache of derived, non-serializable route data.
//!
//! Vehicles persist only their trip-plan reference; the projected segment
//! list and the directions object are rebuilt per instance and held here.
//! Entries are either `Loaded` or `Loading` (a shared future any number of
//! waiters can join); at most one load runs per vehicle, and all loads go
//! through a bounded semaphore so a burst of newly claimed vehicles cannot
//! stampede the directions upstream.
//!
//! The scheduler asks in no-wait mode: a missing entry kicks off the async
//! load and the vehicle is skipped until a later tick finds it `Loaded`.
//! Failed loads drop their entry so the next attempt retries.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::warn;
use uuid::Uuid;

use fleet_core::directions::Directions;
use fleet_core::route::{build_segments, LineSegmentData, RouteError};

use crate::adapters::{AdapterError, DirectionsProvider};
use crate::store::{FleetStore, StoreError};

/// Everything the kinematic step needs beyond the serialized vehicle.
#[derive(Debug)]
pub struct VehicleRoute {
    pub directions: Directions,
    pub segments: Vec<LineSegmentData>,
}

#[derive(Debug, Error)]
pub enum CacheError {
    /// The registry has no plan for this id: a logical error, not transient.
    #[error("no trip plan stored for vehicle {0}")]
    MissingTripPlan(Uuid),
    #[error("trip plan for vehicle {0} has unresolved stops")]
    UnresolvedStop(Uuid),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error(transparent)]
    Route(#[from] RouteError),
}

type LoadOutcome = Result<Arc<VehicleRoute>, Arc<CacheError>>;
type SharedLoad = Shared<BoxFuture<'static, LoadOutcome>>;

#[derive(Clone)]
enum CacheEntry {
    Loaded(Arc<VehicleRoute>),
    Loading(SharedLoad),
}

pub struct DerivedDataCache {
    entries: Arc<DashMap<Uuid, CacheEntry>>,
    store: Arc<dyn FleetStore>,
    provider: Arc<dyn DirectionsProvider>,
    load_slots: Arc<Semaphore>,
}

impl DerivedDataCache {
    pub fn new(
        store: Arc<dyn FleetStore>,
        provider: Arc<dyn DirectionsProvider>,
        max_loads_in_flight: usize,
    ) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            store,
            provider,
            load_slots: Arc::new(Semaphore::new(max_loads_in_flight.max(1))),
        }
    }

    /// Eagerly cache a route this instance just built (vehicle creation).
    pub fn insert(&self, id: Uuid, route: VehicleRoute) {
        self.entries.insert(id, CacheEntry::Loaded(Arc::new(route)));
    }

    /// No-wait lookup. A miss schedules the async load and returns `None`;
    /// an in-flight load also returns `None` unless it has already resolved.
    pub fn get_if_ready(&self, id: Uuid) -> Option<Arc<VehicleRoute>> {
        match self.entries.get(&id).map(|entry| entry.clone()) {
            Some(CacheEntry::Loaded(route)) => Some(route),
            Some(CacheEntry::Loading(shared)) => match shared.peek() {
                Some(Ok(route)) => Some(route.clone()),
                _ => None,
            },
            None => {
                self.ensure_load(id);
                None
            }
        }
    }

    /// Waiting lookup: joins any in-flight load (or starts one) and
    /// surfaces its failure.
    pub async fn get(&self, id: Uuid) -> LoadOutcome {
        self.ensure_load(id).await
    }

    /// Drop one vehicle's entry (retirement).
    pub fn purge(&self, id: Uuid) {
        self.entries.remove(&id);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Drop entries whose vehicle is no longer in the active set.
    pub fn reconcile(&self, active: &HashSet<Uuid>) {
        self.entries.retain(|id, _| active.contains(id));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compute-or-join: returns a future every caller can await, starting
    /// the load (and its driving task) if this id has no entry yet.
    fn ensure_load(&self, id: Uuid) -> SharedLoad {
        let mut fresh_load = None;
        let shared = match self.entries.entry(id) {
            Entry::Occupied(occupied) => match occupied.get().clone() {
                CacheEntry::Loaded(route) => futures::future::ready(Ok(route)).boxed().shared(),
                CacheEntry::Loading(shared) => shared,
            },
            Entry::Vacant(vacant) => {
                let load = load_route(
                    Arc::clone(&self.store),
                    Arc::clone(&self.provider),
                    Arc::clone(&self.load_slots),
                    id,
                )
                .boxed()
                .shared();
                vacant.insert(CacheEntry::Loading(load.clone()));
                fresh_load = Some(load.clone());
                load
            }
        };

        // Drive fresh loads to completion even with no waiter, then settle
        // the entry: Loaded on success, removed on failure so a later tick
        // retries.
        if let Some(load) = fresh_load {
            let entries = Arc::clone(&self.entries);
            tokio::spawn(async move {
                match load.await {
                    Ok(route) => {
                        entries.insert(id, CacheEntry::Loaded(route));
                    }
                    Err(err) => {
                        warn!(vehicle = %id, error = %err, "derived-route load failed");
                        entries.remove(&id);
                    }
                }
            });
        }
        shared
    }
}

async fn load_route(
    store: Arc<dyn FleetStore>,
    provider: Arc<dyn DirectionsProvider>,
    load_slots: Arc<Semaphore>,
    id: Uuid,
) -> LoadOutcome {
    let result: Result<Arc<VehicleRoute>, CacheError> = async {
        let _permit = load_slots
            .acquire_owned()
            .await
            .expect("load semaphore is never closed");
        let plan = store
            .trip_plan(id)
            .await?
            .ok_or(CacheError::MissingTripPlan(id))?;
        let waypoints = plan
            .waypoints_lon_lat()
            .ok_or(CacheError::UnresolvedStop(id))?;
        let directions = provider.directions(&waypoints).await?;
        let segments = build_segments(&directions)?;
        Ok(Arc::new(VehicleRoute {
            directions,
            segments,
        }))
    }
    .await;
    result.map_err(Arc::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use fleet_core::fixtures::straight_route;
    use fleet_core::geodesy::LatLon;
    use fleet_core::trip::TripPlan;

    use crate::store::MemoryFleetStore;

    struct CountingProvider {
        calls: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl DirectionsProvider for CountingProvider {
        async fn directions(
            &self,
            waypoints: &[[f64; 2]],
        ) -> Result<Directions, AdapterError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let origin = LatLon {
                lat: waypoints[0][1],
                lon: waypoints[0][0],
            };
            Ok(straight_route(origin, 0.0, 1000.0, 10.0, 20))
        }
    }

    fn cache_with(
        delay: Duration,
    ) -> (Arc<MemoryFleetStore>, Arc<CountingProvider>, DerivedDataCache) {
        let store = Arc::new(MemoryFleetStore::new());
        let provider = Arc::new(CountingProvider {
            calls: AtomicUsize::new(0),
            delay,
        });
        let cache = DerivedDataCache::new(store.clone(), provider.clone(), 10);
        (store, provider, cache)
    }

    async fn seed_plan(store: &MemoryFleetStore) -> Uuid {
        let id = Uuid::new_v4();
        let plan = TripPlan::between(
            LatLon { lat: 32.7507, lon: -97.3286 },
            LatLon { lat: 32.7600, lon: -97.3286 },
        )
        .unwrap();
        store.put_trip_plan(id, &plan).await.unwrap();
        id
    }

    #[tokio::test]
    async fn waiting_lookup_loads_once_and_then_serves_from_memory() {
        let (store, provider, cache) = cache_with(Duration::ZERO);
        let id = seed_plan(&store).await;

        let route = cache.get(id).await.expect("loaded");
        assert!(!route.segments.is_empty());
        let again = cache.get(id).await.expect("cached");
        assert!(Arc::ptr_eq(&route, &again));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn concurrent_waiters_share_one_load() {
        let (store, provider, cache) = cache_with(Duration::from_millis(50));
        let id = seed_plan(&store).await;

        let (a, b) = tokio::join!(cache.get(id), cache.get(id));
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_wait_lookup_skips_then_finds_the_loaded_entry() {
        let (store, _, cache) = cache_with(Duration::from_millis(20));
        let id = seed_plan(&store).await;

        assert!(cache.get_if_ready(id).is_none());
        // The load was kicked off in the background; poll until it lands.
        for _ in 0..100 {
            if cache.get_if_ready(id).is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("background load never completed");
    }

    #[tokio::test]
    async fn missing_trip_plan_fails_and_leaves_no_entry() {
        let (_, _, cache) = cache_with(Duration::ZERO);
        let id = Uuid::new_v4();

        let err = cache.get(id).await.expect_err("no plan stored");
        assert!(matches!(*err, CacheError::MissingTripPlan(v) if v == id));

        // Settlement runs on a spawned task; wait for the entry to clear so
        // a later attempt would retry.
        for _ in 0..100 {
            if cache.is_empty() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("failed load left a stuck entry");
    }

    #[tokio::test]
    async fn reconcile_drops_entries_outside_the_active_set() {
        let (store, _, cache) = cache_with(Duration::ZERO);
        let keep = seed_plan(&store).await;
        let drop_me = seed_plan(&store).await;
        cache.get(keep).await.unwrap();
        cache.get(drop_me).await.unwrap();

        let active: HashSet<Uuid> = [keep].into_iter().collect();
        cache.reconcile(&active);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(keep).await.is_ok());
    }
}
