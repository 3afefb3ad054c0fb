//! Fleet simulation server binary: wires the shared store, upstream
//! adapters, per-instance cache, scheduler, and REST surface together.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fleet_server::adapters::{DirectionsProvider, Geocoder, NominatimGeocoder, OsrmDirections};
use fleet_server::cache::DerivedDataCache;
use fleet_server::clock::{Clock, SystemClock};
use fleet_server::config::{self, SimulationConfig};
use fleet_server::rest;
use fleet_server::scheduler::{ActiveSnapshot, Scheduler};
use fleet_server::service::FleetService;
use fleet_server::store::{FleetStore, RedisFleetStore};

#[derive(Parser)]
#[command(name = "fleet-server", about = "Distributed vehicle fleet simulator")]
struct Args {
    /// Redis connection URL for the shared store
    #[arg(long, env = "REDIS_URL", default_value = "redis://127.0.0.1:6379")]
    store_url: String,

    /// OSRM-compatible directions endpoint
    #[arg(
        long,
        env = "DIRECTIONS_URL",
        default_value = "https://router.project-osrm.org"
    )]
    directions_url: String,

    /// Optional API key appended to directions requests
    #[arg(long, env = "DIRECTIONS_API_KEY")]
    directions_api_key: Option<String>,

    /// Nominatim-compatible geocoder endpoint
    #[arg(
        long,
        env = "GEOCODER_URL",
        default_value = "https://nominatim.openstreetmap.org"
    )]
    geocoder_url: String,

    /// Listen address for the REST surface
    #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    listen: String,

    /// Identifier stamped into managerHost; defaults to the hostname
    #[arg(long, env = "HOST_ID")]
    host_id: Option<String>,

    /// Target interval between successful advances of one vehicle
    #[arg(long, default_value_t = config::DEFAULT_UPDATE_PERIOD_MS)]
    vehicle_update_period_ms: u64,

    /// Scheduler tick interval; must not exceed the update period
    #[arg(long, default_value_t = config::DEFAULT_POLLING_PERIOD_MS)]
    vehicle_polling_period_ms: u64,

    /// Initial size of the rolling jitter window
    #[arg(long, default_value_t = config::DEFAULT_JITTER_STAT_CAPACITY)]
    jitter_stat_capacity: usize,

    /// Inactivity cutoff before an arrived vehicle is retired
    #[arg(long, default_value_t = config::DEFAULT_VEHICLE_TIMEOUT_SECONDS)]
    vehicle_timeout_seconds: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = SimulationConfig::default()
        .with_update_period_ms(args.vehicle_update_period_ms)
        .with_polling_period_ms(args.vehicle_polling_period_ms)
        .with_jitter_stat_capacity(args.jitter_stat_capacity)
        .with_vehicle_timeout_seconds(args.vehicle_timeout_seconds);
    config.validate()?;

    let host_id = config::resolve_host_id(args.host_id.clone());
    info!(host_id = %host_id, store = %args.store_url, "starting fleet server");

    let store: Arc<dyn FleetStore> = Arc::new(
        RedisFleetStore::connect(&args.store_url)
            .await
            .context("connecting to the shared store")?,
    );
    let directions: Arc<dyn DirectionsProvider> = Arc::new(OsrmDirections::new(
        &args.directions_url,
        args.directions_api_key.clone(),
    ));
    let geocoder: Arc<dyn Geocoder> = Arc::new(NominatimGeocoder::new(&args.geocoder_url));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let snapshot = Arc::new(ActiveSnapshot::new());
    let cache = Arc::new(DerivedDataCache::new(
        store.clone(),
        directions.clone(),
        config.directions_load_concurrency,
    ));

    let scheduler = Arc::new(Scheduler::new(
        store.clone(),
        cache.clone(),
        clock.clone(),
        snapshot.clone(),
        config.clone(),
        host_id.clone(),
    ));
    let scheduler_handle = scheduler.run();

    let service = Arc::new(FleetService::new(
        store, cache, geocoder, directions, snapshot, clock, host_id,
    ));
    let app = rest::router(service);

    let listener = tokio::net::TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("binding {}", args.listen))?;
    info!(addr = %args.listen, "REST surface listening");
    axum::serve(listener, app).await?;

    scheduler_handle.shutdown();
    Ok(())
}
