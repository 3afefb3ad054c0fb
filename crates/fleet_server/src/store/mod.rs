//! Shared vehicle store: the single source of truth the cooperating server
//! instances coordinate through.
//!
//! Five logical collections, all keyed on vehicle id:
//!
//! | Key | Shape | Purpose |
//! |---|---|---|
//! | `TripPlan` | hash id → TripPlan | any instance can rebuild route geometry |
//! | `Vehicle:{id}` | JSON value | authoritative simulation state |
//! | `ActiveVehicleRegistry` | set | membership, cardinality, pagination |
//! | `VehicleUpdateQueue` | sorted set scored by last-calculation ms | time-ordered backlog |
//! | `VehicleUpdateLockSet` | set | at-most-one-writer mutual exclusion |
//!
//! Values are self-describing JSON so non-Rust instances can decode them.
//! Mutual exclusion needs no multi-key transaction: the lock set's atomic
//! insert is the only arbitration point.

mod memory;
mod redis;

pub use self::memory::MemoryFleetStore;
pub use self::redis::RedisFleetStore;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use fleet_core::trip::TripPlan;
use fleet_core::vehicle::Vehicle;

pub const TRIP_PLAN_KEY: &str = "TripPlan";
pub const VEHICLE_KEY_PREFIX: &str = "Vehicle:";
pub const ACTIVE_VEHICLE_REGISTRY_KEY: &str = "ActiveVehicleRegistry";
pub const VEHICLE_UPDATE_QUEUE_KEY: &str = "VehicleUpdateQueue";
pub const VEHICLE_UPDATE_LOCK_SET_KEY: &str = "VehicleUpdateLockSet";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store connection failed: {0}")]
    Connection(String),
    #[error("store command failed: {0}")]
    Command(String),
    #[error("stored value could not be decoded: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Contract every store backend provides. All operations are atomic at the
/// granularity the scheduler relies on; in particular [`try_lock`] reports
/// whether this caller inserted the id.
///
/// [`try_lock`]: FleetStore::try_lock
#[async_trait]
pub trait FleetStore: Send + Sync {
    async fn put_trip_plan(&self, id: Uuid, plan: &TripPlan) -> StoreResult<()>;

    async fn trip_plan(&self, id: Uuid) -> StoreResult<Option<TripPlan>>;

    async fn put_vehicle(&self, vehicle: &Vehicle) -> StoreResult<()>;

    async fn vehicle(&self, id: Uuid) -> StoreResult<Option<Vehicle>>;

    /// Add to the active registry.
    async fn add_active(&self, id: Uuid) -> StoreResult<()>;

    /// Snapshot of the active registry (unordered).
    async fn active_ids(&self) -> StoreResult<Vec<Uuid>>;

    async fn active_count(&self) -> StoreResult<usize>;

    /// Insert or move the vehicle in the update queue at `score_ms`.
    async fn enqueue(&self, id: Uuid, score_ms: i64) -> StoreResult<()>;

    /// Queue members with score ≤ `max_score_ms`, ascending by score.
    async fn ready_ids(&self, max_score_ms: i64) -> StoreResult<Vec<Uuid>>;

    /// Atomically claim the per-vehicle update lock. Returns `true` iff this
    /// caller inserted the id (i.e. it now owns the tick for this vehicle).
    async fn try_lock(&self, id: Uuid) -> StoreResult<bool>;

    async fn unlock(&self, id: Uuid) -> StoreResult<()>;

    /// Remove the id from every collection: registry, queue, lock set,
    /// vehicle entry, and trip plan.
    async fn retire(&self, id: Uuid) -> StoreResult<()>;

    /// Delete every collection and all vehicle entries. Idempotent.
    async fn reset(&self) -> StoreResult<()>;
}

pub(crate) fn vehicle_key(id: Uuid) -> String {
    format!("{VEHICLE_KEY_PREFIX}{id}")
}
