//! Façade the REST surface (and the tests) drive: vehicle creation, state
//! reads over the active snapshot, one-shot directions/position queries,
//! and the full reset.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use fleet_core::directions::Directions;
use fleet_core::geodesy::{self, LatLon};
use fleet_core::route::build_segments;
use fleet_core::trip::{CrissCrossPlan, TripPlan, SOURCE_GEOCODED};
use fleet_core::vehicle::Vehicle;

use crate::adapters::{AdapterError, DirectionsProvider, Geocoder};
use crate::cache::{DerivedDataCache, VehicleRoute};
use crate::clock::Clock;
use crate::error::ServiceError;
use crate::scheduler::ActiveSnapshot;
use crate::store::FleetStore;

/// One page of vehicle states over the active snapshot.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VehiclePage {
    pub vehicles: Vec<Vehicle>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
}

pub struct FleetService {
    store: Arc<dyn FleetStore>,
    cache: Arc<DerivedDataCache>,
    geocoder: Arc<dyn Geocoder>,
    directions_provider: Arc<dyn DirectionsProvider>,
    snapshot: Arc<ActiveSnapshot>,
    clock: Arc<dyn Clock>,
    host_id: String,
}

impl FleetService {
    pub fn new(
        store: Arc<dyn FleetStore>,
        cache: Arc<DerivedDataCache>,
        geocoder: Arc<dyn Geocoder>,
        directions_provider: Arc<dyn DirectionsProvider>,
        snapshot: Arc<ActiveSnapshot>,
        clock: Arc<dyn Clock>,
        host_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            cache,
            geocoder,
            directions_provider,
            snapshot,
            clock,
            host_id: host_id.into(),
        }
    }

    /// Validate, geocode, preprocess, persist, and queue one new vehicle.
    pub async fn create_vehicle(&self, mut plan: TripPlan) -> Result<Vehicle, ServiceError> {
        plan.validate()?;
        self.resolve_stops(&mut plan).await?;
        let waypoints = plan
            .waypoints_lon_lat()
            .ok_or_else(|| ServiceError::Validation("trip plan has unresolved stops".into()))?;

        let directions = self.directions_provider.directions(&waypoints).await?;
        let segments = build_segments(&directions)?;

        let now = self.clock.now_ms();
        let vehicle = Vehicle::create(now, &self.host_id, &directions, &segments)?;
        self.store.put_trip_plan(vehicle.trip_plan_ref, &plan).await?;
        self.store.put_vehicle(&vehicle).await?;
        self.store.add_active(vehicle.id).await?;
        self.store.enqueue(vehicle.id, now).await?;
        self.cache.insert(
            vehicle.id,
            VehicleRoute {
                directions,
                segments,
            },
        );

        info!(vehicle = %vehicle.id, stops = plan.addresses.len(), "created vehicle");
        Ok(vehicle)
    }

    /// Expand a criss-cross pattern and create each vehicle.
    pub async fn create_crisscross(
        &self,
        plan: CrissCrossPlan,
    ) -> Result<Vec<Vehicle>, ServiceError> {
        let trips = plan.expand()?;
        let mut vehicles = Vec::with_capacity(trips.len());
        for trip in trips {
            vehicles.push(self.create_vehicle(trip).await?);
        }
        info!(
            count = vehicles.len(),
            radius_km = plan.radius_km,
            "created criss-cross fleet"
        );
        Ok(vehicles)
    }

    pub async fn vehicle(&self, id: Uuid) -> Result<Vehicle, ServiceError> {
        self.store
            .vehicle(id)
            .await?
            .ok_or(ServiceError::NotFound(id))
    }

    /// Directions for a vehicle from the derived cache. In wait mode this
    /// joins (or starts) the async load; otherwise a cold cache reads as
    /// not-found.
    pub async fn vehicle_directions(
        &self,
        id: Uuid,
        wait_for_result: bool,
    ) -> Result<Directions, ServiceError> {
        if wait_for_result {
            let route = self
                .cache
                .get(id)
                .await
                .map_err(|err| ServiceError::from_cache_load(id, err))?;
            Ok(route.directions.clone())
        } else {
            let route = self
                .cache
                .get_if_ready(id)
                .ok_or(ServiceError::NotFound(id))?;
            Ok(route.directions.clone())
        }
    }

    /// Number of vehicles in the local active snapshot.
    pub fn vehicle_count(&self) -> usize {
        self.snapshot.ids().len()
    }

    /// Page through the active snapshot (0-based page index).
    pub async fn vehicle_page(
        &self,
        page: usize,
        page_size: usize,
    ) -> Result<VehiclePage, ServiceError> {
        if page_size == 0 {
            return Err(ServiceError::Validation("pageSize must be positive".into()));
        }
        let ids = self.snapshot.ids();
        let mut vehicles = Vec::new();
        for &id in ids.iter().skip(page * page_size).take(page_size) {
            // Vehicles can retire between snapshot refreshes; skip holes.
            if let Some(vehicle) = self.store.vehicle(id).await? {
                vehicles.push(vehicle);
            }
        }
        Ok(VehiclePage {
            vehicles,
            page,
            page_size,
            total: ids.len(),
        })
    }

    /// Delete every store collection and all per-instance derived data.
    pub async fn reset(&self) -> Result<(), ServiceError> {
        self.store.reset().await?;
        self.cache.clear();
        self.snapshot.replace(Vec::new());
        info!("reset server state");
        Ok(())
    }

    /// One-shot directions lookup for a trip plan, without creating anything.
    pub async fn directions_for(&self, mut plan: TripPlan) -> Result<Directions, ServiceError> {
        plan.validate()?;
        self.resolve_stops(&mut plan).await?;
        let waypoints = plan
            .waypoints_lon_lat()
            .ok_or_else(|| ServiceError::Validation("trip plan has unresolved stops".into()))?;
        Ok(self.directions_provider.directions(&waypoints).await?)
    }

    /// One-shot position query: where a vehicle would sit `meters_travel`
    /// along the plan's route.
    pub async fn position_at(
        &self,
        plan: TripPlan,
        meters_travel: f64,
    ) -> Result<LatLon, ServiceError> {
        let directions = self.directions_for(plan).await?;
        let segments = build_segments(&directions)?;

        let route_distance = directions.route_distance();
        if !meters_travel.is_finite() || meters_travel < 0.0 || meters_travel > route_distance {
            return Err(ServiceError::Validation(format!(
                "metersTravel {meters_travel} outside [0, {route_distance}]"
            )));
        }

        let mut probe = Vehicle::create(0, &self.host_id, &directions, &segments)?;
        probe.set_meters_offset(meters_travel, &directions, &segments)?;
        Ok(LatLon {
            lat: probe.deg_latitude,
            lon: probe.deg_longitude,
        })
    }

    /// Geocode any stops still missing coordinates, tagging them with the
    /// geocoding source.
    async fn resolve_stops(&self, plan: &mut TripPlan) -> Result<(), ServiceError> {
        for address in &mut plan.addresses {
            if address.has_coordinates() {
                continue;
            }
            if !address.is_geocodable() {
                return Err(ServiceError::Validation(
                    "stop has neither coordinates nor street fields".into(),
                ));
            }
            let point = self.geocoder.geocode(address).await?;
            geodesy::validate_lat_lon(point.lat, point.lon).map_err(|err| {
                ServiceError::Upstream(AdapterError::Api(format!(
                    "geocoder returned invalid coordinate: {err}"
                )))
            })?;
            address.latitude = Some(point.lat);
            address.longitude = Some(point.lon);
            address.source = SOURCE_GEOCODED.to_string();
        }
        Ok(())
    }
}
