//! Redis store backend.
//!
//! Uses the store's native atomic set/sorted-set commands; the lock set's
//! `SADD` reply (1 = inserted) is the whole mutual-exclusion protocol. A
//! [`ConnectionManager`] reconnects underneath transient failures.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::warn;
use uuid::Uuid;

use fleet_core::trip::TripPlan;
use fleet_core::vehicle::Vehicle;

use super::{
    vehicle_key, FleetStore, StoreError, StoreResult, ACTIVE_VEHICLE_REGISTRY_KEY, TRIP_PLAN_KEY,
    VEHICLE_KEY_PREFIX, VEHICLE_UPDATE_LOCK_SET_KEY, VEHICLE_UPDATE_QUEUE_KEY,
};

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Command(err.to_string())
    }
}

#[derive(Clone)]
pub struct RedisFleetStore {
    conn: ConnectionManager,
}

impl RedisFleetStore {
    /// Connect to `url` (e.g. `redis://sim-store:6379`).
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client =
            redis::Client::open(url).map_err(|e| StoreError::Connection(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self { conn })
    }

    fn parse_ids(raw: Vec<String>) -> Vec<Uuid> {
        raw.into_iter()
            .filter_map(|s| match Uuid::parse_str(&s) {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!(value = %s, "ignoring non-uuid member in store collection");
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl FleetStore for RedisFleetStore {
    async fn put_trip_plan(&self, id: Uuid, plan: &TripPlan) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(plan)?;
        let _: () = conn.hset(TRIP_PLAN_KEY, id.to_string(), json).await?;
        Ok(())
    }

    async fn trip_plan(&self, id: Uuid) -> StoreResult<Option<TripPlan>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.hget(TRIP_PLAN_KEY, id.to_string()).await?;
        Ok(raw.map(|s| serde_json::from_str(&s)).transpose()?)
    }

    async fn put_vehicle(&self, vehicle: &Vehicle) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(vehicle)?;
        let _: () = conn.set(vehicle_key(vehicle.id), json).await?;
        Ok(())
    }

    async fn vehicle(&self, id: Uuid) -> StoreResult<Option<Vehicle>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(vehicle_key(id)).await?;
        Ok(raw.map(|s| serde_json::from_str(&s)).transpose()?)
    }

    async fn add_active(&self, id: Uuid) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .sadd(ACTIVE_VEHICLE_REGISTRY_KEY, id.to_string())
            .await?;
        Ok(())
    }

    async fn active_ids(&self) -> StoreResult<Vec<Uuid>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn.smembers(ACTIVE_VEHICLE_REGISTRY_KEY).await?;
        Ok(Self::parse_ids(members))
    }

    async fn active_count(&self) -> StoreResult<usize> {
        let mut conn = self.conn.clone();
        let count: usize = conn.scard(ACTIVE_VEHICLE_REGISTRY_KEY).await?;
        Ok(count)
    }

    async fn enqueue(&self, id: Uuid, score_ms: i64) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .zadd(VEHICLE_UPDATE_QUEUE_KEY, id.to_string(), score_ms)
            .await?;
        Ok(())
    }

    async fn ready_ids(&self, max_score_ms: i64) -> StoreResult<Vec<Uuid>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn
            .zrangebyscore(VEHICLE_UPDATE_QUEUE_KEY, "-inf", max_score_ms)
            .await?;
        Ok(Self::parse_ids(members))
    }

    async fn try_lock(&self, id: Uuid) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let inserted: i64 = conn
            .sadd(VEHICLE_UPDATE_LOCK_SET_KEY, id.to_string())
            .await?;
        Ok(inserted == 1)
    }

    async fn unlock(&self, id: Uuid) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .srem(VEHICLE_UPDATE_LOCK_SET_KEY, id.to_string())
            .await?;
        Ok(())
    }

    async fn retire(&self, id: Uuid) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let member = id.to_string();
        let _: () = conn.srem(ACTIVE_VEHICLE_REGISTRY_KEY, &member).await?;
        let _: () = conn.zrem(VEHICLE_UPDATE_QUEUE_KEY, &member).await?;
        let _: () = conn.srem(VEHICLE_UPDATE_LOCK_SET_KEY, &member).await?;
        let _: () = conn.del(vehicle_key(id)).await?;
        let _: () = conn.hdel(TRIP_PLAN_KEY, &member).await?;
        Ok(())
    }

    async fn reset(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let vehicle_keys: Vec<String> = redis::cmd("KEYS")
            .arg(format!("{VEHICLE_KEY_PREFIX}*"))
            .query_async(&mut conn)
            .await?;
        if !vehicle_keys.is_empty() {
            let _: () = conn.del(vehicle_keys).await?;
        }
        let _: () = conn
            .del(&[
                TRIP_PLAN_KEY,
                ACTIVE_VEHICLE_REGISTRY_KEY,
                VEHICLE_UPDATE_QUEUE_KEY,
                VEHICLE_UPDATE_LOCK_SET_KEY,
            ])
            .await?;
        Ok(())
    }
}
