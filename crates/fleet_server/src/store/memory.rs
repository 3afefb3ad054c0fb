//! In-memory store backend.
//!
//! Mirrors the Redis backend's atomicity semantics behind one mutex, so
//! tests can run several scheduler instances against a single shared store
//! (`Arc<MemoryFleetStore>`) without a live server.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use fleet_core::trip::TripPlan;
use fleet_core::vehicle::Vehicle;

use super::{FleetStore, StoreResult};

#[derive(Default)]
struct Collections {
    trip_plans: HashMap<Uuid, TripPlan>,
    vehicles: HashMap<Uuid, Vehicle>,
    active: HashSet<Uuid>,
    /// id → score (last-calculation epoch ms), the sorted-set stand-in.
    queue: HashMap<Uuid, i64>,
    locks: HashSet<Uuid>,
}

#[derive(Default)]
pub struct MemoryFleetStore {
    inner: Mutex<Collections>,
}

impl MemoryFleetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue score for a vehicle, for assertions on re-queue behavior.
    pub fn queue_score(&self, id: Uuid) -> Option<i64> {
        self.inner.lock().unwrap().queue.get(&id).copied()
    }

    /// Whether the vehicle currently holds an update lock.
    pub fn is_locked(&self, id: Uuid) -> bool {
        self.inner.lock().unwrap().locks.contains(&id)
    }

    /// Force a lock entry, simulating another instance mid-update.
    pub fn force_lock(&self, id: Uuid) {
        self.inner.lock().unwrap().locks.insert(id);
    }
}

#[async_trait]
impl FleetStore for MemoryFleetStore {
    async fn put_trip_plan(&self, id: Uuid, plan: &TripPlan) -> StoreResult<()> {
        self.inner.lock().unwrap().trip_plans.insert(id, plan.clone());
        Ok(())
    }

    async fn trip_plan(&self, id: Uuid) -> StoreResult<Option<TripPlan>> {
        Ok(self.inner.lock().unwrap().trip_plans.get(&id).cloned())
    }

    async fn put_vehicle(&self, vehicle: &Vehicle) -> StoreResult<()> {
        self.inner
            .lock()
            .unwrap()
            .vehicles
            .insert(vehicle.id, vehicle.clone());
        Ok(())
    }

    async fn vehicle(&self, id: Uuid) -> StoreResult<Option<Vehicle>> {
        Ok(self.inner.lock().unwrap().vehicles.get(&id).cloned())
    }

    async fn add_active(&self, id: Uuid) -> StoreResult<()> {
        self.inner.lock().unwrap().active.insert(id);
        Ok(())
    }

    async fn active_ids(&self) -> StoreResult<Vec<Uuid>> {
        Ok(self.inner.lock().unwrap().active.iter().copied().collect())
    }

    async fn active_count(&self) -> StoreResult<usize> {
        Ok(self.inner.lock().unwrap().active.len())
    }

    async fn enqueue(&self, id: Uuid, score_ms: i64) -> StoreResult<()> {
        self.inner.lock().unwrap().queue.insert(id, score_ms);
        Ok(())
    }

    async fn ready_ids(&self, max_score_ms: i64) -> StoreResult<Vec<Uuid>> {
        let inner = self.inner.lock().unwrap();
        let mut ready: Vec<(i64, Uuid)> = inner
            .queue
            .iter()
            .filter(|(_, &score)| score <= max_score_ms)
            .map(|(&id, &score)| (score, id))
            .collect();
        ready.sort();
        Ok(ready.into_iter().map(|(_, id)| id).collect())
    }

    async fn try_lock(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.inner.lock().unwrap().locks.insert(id))
    }

    async fn unlock(&self, id: Uuid) -> StoreResult<()> {
        self.inner.lock().unwrap().locks.remove(&id);
        Ok(())
    }

    async fn retire(&self, id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.active.remove(&id);
        inner.queue.remove(&id);
        inner.locks.remove(&id);
        inner.vehicles.remove(&id);
        inner.trip_plans.remove(&id);
        Ok(())
    }

    async fn reset(&self) -> StoreResult<()> {
        *self.inner.lock().unwrap() = Collections::default();
        Ok(())
    }
}
