#![allow(dead_code)]

use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use fleet_core::directions::Directions;
use fleet_core::fixtures::straight_route;
use fleet_core::geodesy::{
    coordinate_at_bearing_and_range, haversine_km, initial_bearing_deg, LatLon,
};
use fleet_core::trip::TripPlan;

use fleet_server::adapters::{AdapterError, DirectionsProvider, Geocoder};
use fleet_server::cache::DerivedDataCache;
use fleet_server::clock::Clock;
use fleet_server::config::SimulationConfig;
use fleet_server::scheduler::{ActiveSnapshot, Scheduler};
use fleet_server::service::FleetService;
use fleet_server::store::{FleetStore, MemoryFleetStore};

pub const FORT_WORTH: LatLon = LatLon {
    lat: 32.7507,
    lon: -97.3286,
};

/// Manually advanced wall clock, shareable across "instances" in one test.
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Arc<Self> {
        Arc::new(Self {
            now_ms: AtomicI64::new(start_ms),
        })
    }

    pub fn set(&self, ms: i64) {
        self.now_ms.store(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Directions stub: a straight synthetic route between the first and last
/// requested waypoint at a constant posted speed.
pub struct StraightLineProvider {
    pub posted_speed_ms: f64,
    pub samples: usize,
}

#[async_trait]
impl DirectionsProvider for StraightLineProvider {
    async fn directions(&self, waypoints: &[[f64; 2]]) -> Result<Directions, AdapterError> {
        let origin = LatLon {
            lat: waypoints[0][1],
            lon: waypoints[0][0],
        };
        let end = LatLon {
            lat: waypoints[waypoints.len() - 1][1],
            lon: waypoints[waypoints.len() - 1][0],
        };
        let length_m = haversine_km(origin, end) * 1000.0;
        let bearing = initial_bearing_deg(origin, end);
        Ok(straight_route(
            origin,
            bearing,
            length_m,
            self.posted_speed_ms,
            self.samples,
        ))
    }
}

/// Geocoder stub that resolves every address to one fixed point.
pub struct FixedGeocoder {
    pub point: LatLon,
    pub calls: AtomicUsize,
}

impl FixedGeocoder {
    pub fn at(point: LatLon) -> Self {
        Self {
            point,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Geocoder for FixedGeocoder {
    async fn geocode(
        &self,
        _address: &fleet_core::trip::Address,
    ) -> Result<LatLon, AdapterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.point)
    }
}

/// One simulated server instance wired over shared (or private) test doubles.
pub struct TestInstance {
    pub store: Arc<MemoryFleetStore>,
    pub cache: Arc<DerivedDataCache>,
    pub scheduler: Arc<Scheduler>,
    pub service: Arc<FleetService>,
    pub snapshot: Arc<ActiveSnapshot>,
    pub clock: Arc<ManualClock>,
    pub geocoder: Arc<FixedGeocoder>,
}

pub struct TestInstanceBuilder {
    host_id: String,
    config: SimulationConfig,
    store: Option<Arc<MemoryFleetStore>>,
    clock: Option<Arc<ManualClock>>,
    posted_speed_ms: f64,
}

impl TestInstanceBuilder {
    pub fn new(host_id: &str) -> Self {
        Self {
            host_id: host_id.to_string(),
            config: SimulationConfig::default(),
            store: None,
            clock: None,
            posted_speed_ms: 10.0,
        }
    }

    /// Share another instance's store (multi-instance tests).
    pub fn with_store(mut self, store: Arc<MemoryFleetStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Share another instance's clock.
    pub fn with_clock(mut self, clock: Arc<ManualClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_config(mut self, config: SimulationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_posted_speed(mut self, meters_per_second: f64) -> Self {
        self.posted_speed_ms = meters_per_second;
        self
    }

    pub fn build(self) -> TestInstance {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryFleetStore::new()));
        let clock = self.clock.unwrap_or_else(|| ManualClock::new(0));
        let geocoder = Arc::new(FixedGeocoder::at(FORT_WORTH));

        let store_dyn: Arc<dyn FleetStore> = store.clone();
        let clock_dyn: Arc<dyn Clock> = clock.clone();
        let provider: Arc<dyn DirectionsProvider> = Arc::new(StraightLineProvider {
            posted_speed_ms: self.posted_speed_ms,
            samples: 50,
        });

        let snapshot = Arc::new(ActiveSnapshot::new());
        let cache = Arc::new(DerivedDataCache::new(
            store_dyn.clone(),
            provider.clone(),
            self.config.directions_load_concurrency,
        ));
        let scheduler = Arc::new(Scheduler::new(
            store_dyn.clone(),
            cache.clone(),
            clock_dyn.clone(),
            snapshot.clone(),
            self.config.clone(),
            self.host_id.clone(),
        ));
        let service = Arc::new(FleetService::new(
            store_dyn,
            cache.clone(),
            geocoder.clone(),
            provider,
            snapshot.clone(),
            clock_dyn,
            self.host_id,
        ));

        TestInstance {
            store,
            cache,
            scheduler,
            service,
            snapshot,
            clock,
            geocoder,
        }
    }
}

/// Two-stop plan running `km` due north from `origin`.
pub fn northbound_plan(origin: LatLon, km: f64) -> TripPlan {
    let end = coordinate_at_bearing_and_range(origin, km, 0.0).expect("valid origin");
    TripPlan::between(origin, end).expect("valid endpoints")
}

/// Degenerate plan whose start and end coincide (zero-length route).
pub fn stationary_plan(origin: LatLon) -> TripPlan {
    TripPlan::between(origin, origin).expect("valid origin")
}
