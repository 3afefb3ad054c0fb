//! Scheduler loop: claims due vehicles from the shared queue, advances them,
//! and ages out the ones that arrived.
//!
//! Every instance ticks at the polling period. A vehicle becomes eligible
//! once its queue score (last-calculation timestamp) is roughly one update
//! period old; whichever instance first inserts the id into the lock set
//! owns that tick for it. Per-vehicle failures are logged and swallowed so
//! one bad vehicle never stalls the fleet; the lock is released on every
//! exit path.
//!
//! Tests drive [`Scheduler::tick_at`] directly with an explicit timestamp,
//! bypassing the interval trigger.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use fleet_core::jitter::{JitterStats, JitterSummary};
use fleet_core::vehicle::KinematicsError;

use crate::cache::{DerivedDataCache, VehicleRoute};
use crate::clock::Clock;
use crate::config::SimulationConfig;
use crate::store::{FleetStore, StoreError};

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Kinematics(#[from] KinematicsError),
}

/// Copy-on-write view of the active registry, refreshed out of band so
/// pagination and cache reconciliation never iterate the store.
#[derive(Default)]
pub struct ActiveSnapshot {
    ids: RwLock<Arc<Vec<Uuid>>>,
}

impl ActiveSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stable snapshot; callers iterate without holding any lock.
    pub fn ids(&self) -> Arc<Vec<Uuid>> {
        self.ids.read().unwrap().clone()
    }

    pub fn replace(&self, ids: Vec<Uuid>) {
        *self.ids.write().unwrap() = Arc::new(ids);
    }
}

enum Outcome {
    Advanced,
    Skipped,
    Retire,
}

pub struct Scheduler {
    store: Arc<dyn FleetStore>,
    cache: Arc<DerivedDataCache>,
    clock: Arc<dyn Clock>,
    snapshot: Arc<ActiveSnapshot>,
    config: SimulationConfig,
    host_id: String,
    jitter: Mutex<JitterStats>,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn FleetStore>,
        cache: Arc<DerivedDataCache>,
        clock: Arc<dyn Clock>,
        snapshot: Arc<ActiveSnapshot>,
        config: SimulationConfig,
        host_id: impl Into<String>,
    ) -> Self {
        let jitter = Mutex::new(JitterStats::new(config.jitter_stat_capacity));
        Self {
            store,
            cache,
            clock,
            snapshot,
            config,
            host_id: host_id.into(),
            jitter,
        }
    }

    /// One tick at the current wall-clock time.
    pub async fn tick(&self) {
        let now_ms = self.clock.now_ms();
        if let Err(err) = self.tick_at(now_ms).await {
            warn!(error = %err, "scheduler tick aborted");
        }
    }

    /// One tick at an explicit timestamp.
    pub async fn tick_at(&self, now_ms: i64) -> Result<(), SchedulerError> {
        let timeout_cutoff = now_ms - self.config.vehicle_timeout_seconds as i64 * 1000;
        let eligibility_bound = now_ms - self.config.update_period_ms as i64
            + self.config.eligibility_slack_ms as i64;

        let ready = self.store.ready_ids(eligibility_bound).await?;
        let mut retiring = Vec::new();
        for id in ready {
            let Some(route) = self.cache.get_if_ready(id) else {
                trace!(vehicle = %id, "derived route not ready, skipping");
                continue;
            };
            if !self.store.try_lock(id).await? {
                trace!(vehicle = %id, "update lock held elsewhere, skipping");
                continue;
            }

            let outcome = self.process(id, &route, now_ms, timeout_cutoff).await;
            if let Err(err) = self.store.unlock(id).await {
                warn!(vehicle = %id, error = %err, "failed to release update lock");
            }
            match outcome {
                Ok(Outcome::Retire) => retiring.push(id),
                Ok(_) => {}
                Err(err) => warn!(vehicle = %id, error = %err, "vehicle update failed"),
            }
        }

        for id in retiring {
            match self.store.retire(id).await {
                Ok(()) => {
                    self.cache.purge(id);
                    info!(vehicle = %id, "retired vehicle");
                }
                Err(err) => warn!(vehicle = %id, error = %err, "retirement failed"),
            }
        }

        // With nothing simulated, feed the window zeros so the published
        // aggregates trend toward quiescence instead of freezing.
        if self.store.active_count().await? == 0 {
            self.record_jitter(0.0);
        }

        let summary = self.jitter_summary();
        debug!(
            mean_ms = summary.mean,
            std_dev_ms = summary.std_dev,
            min_ms = summary.min,
            max_ms = summary.max,
            "jitter window"
        );
        Ok(())
    }

    /// Advance one claimed vehicle: read, step, write back, re-queue, and
    /// decide whether it has timed out.
    async fn process(
        &self,
        id: Uuid,
        route: &VehicleRoute,
        now_ms: i64,
        timeout_cutoff: i64,
    ) -> Result<Outcome, SchedulerError> {
        let Some(mut vehicle) = self.store.vehicle(id).await? else {
            tracing::error!(vehicle = %id, "queued vehicle has no stored state");
            return Ok(Outcome::Retire);
        };

        let ms_since_last_run = now_ms - vehicle.last_calculation_epoch_millis;
        let mut advanced = false;
        if ms_since_last_run > self.config.polling_period_ms as i64 {
            let started = Instant::now();
            advanced = vehicle.update(now_ms, &route.directions, &route.segments)?;
            if advanced {
                self.record_jitter(
                    (ms_since_last_run - self.config.update_period_ms as i64) as f64,
                );
                vehicle.last_ns_execution_time = started.elapsed().as_nanos() as u64;
                vehicle.manager_host = self.host_id.clone();
                self.store.put_vehicle(&vehicle).await?;
                self.store
                    .enqueue(id, vehicle.last_calculation_epoch_millis)
                    .await?;
            }
        }

        if !advanced && vehicle.last_calculation_epoch_millis < timeout_cutoff {
            return Ok(Outcome::Retire);
        }
        Ok(if advanced {
            Outcome::Advanced
        } else {
            Outcome::Skipped
        })
    }

    fn record_jitter(&self, sample_ms: f64) {
        self.jitter.lock().unwrap().record(sample_ms);
    }

    /// Aggregates over the rolling jitter window, in milliseconds.
    pub fn jitter_summary(&self) -> JitterSummary {
        self.jitter.lock().unwrap().summary()
    }

    /// Refresh the shared active snapshot and size the jitter window to
    /// hold about ten recent samples per active vehicle.
    pub async fn refresh_snapshot(&self) {
        match self.store.active_ids().await {
            Ok(mut ids) => {
                ids.sort();
                let active = ids.len();
                self.snapshot.replace(ids);
                self.jitter.lock().unwrap().resize((active * 10).max(10));
            }
            Err(err) => warn!(error = %err, "active snapshot refresh failed"),
        }
    }

    /// Drop cached derived routes for vehicles that left the active set.
    pub fn reconcile_cache(&self) {
        let active: HashSet<Uuid> = self.snapshot.ids().iter().copied().collect();
        self.cache.reconcile(&active);
    }

    /// Start the periodic tasks: the tick loop at the polling period, the
    /// 1 Hz snapshot refresh, and the cache reconciliation pass.
    pub fn run(self: Arc<Self>) -> SchedulerHandle {
        let mut tasks = Vec::new();

        let scheduler = Arc::clone(&self);
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(
                scheduler.config.polling_period_ms.max(1),
            ));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                scheduler.tick().await;
            }
        }));

        let scheduler = Arc::clone(&self);
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(
                scheduler.config.snapshot_refresh_ms.max(1),
            ));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                scheduler.refresh_snapshot().await;
            }
        }));

        let scheduler = Arc::clone(&self);
        tasks.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(
                scheduler.config.cache_reconcile_secs.max(1),
            ));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                scheduler.reconcile_cache();
            }
        }));

        SchedulerHandle { tasks }
    }
}

/// Aborts the scheduler's periodic tasks on shutdown.
pub struct SchedulerHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn shutdown(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
