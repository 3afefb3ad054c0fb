//! Nominatim-style geocoding client with a canonical-query LRU cache.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use reqwest::{Client, Url};
use serde::Deserialize;

use fleet_core::geodesy::LatLon;
use fleet_core::trip::Address;

use super::{AdapterError, Geocoder};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const CACHE_CAPACITY: usize = 5_000;
const USER_AGENT: &str = concat!("fleet-sim/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Deserialize)]
struct GeocodeHit {
    lat: String,
    lon: String,
}

/// Free-form geocoder over a Nominatim-compatible search endpoint.
///
/// Results are cached by the canonicalized query string, so repeated
/// geocoding of the same address never re-contacts the upstream.
pub struct NominatimGeocoder {
    client: Client,
    endpoint: String,
    cache: Mutex<LruCache<String, LatLon>>,
}

impl NominatimGeocoder {
    pub fn new(endpoint: &str) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .expect("failed to build geocoder client");
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(CACHE_CAPACITY).expect("cache capacity is non-zero"),
            )),
        }
    }
}

/// Lowercased, comma-joined street fields in a fixed order.
fn canonical_query(address: &Address) -> String {
    [&address.street, &address.city, &address.state, &address.zip_code]
        .iter()
        .filter_map(|field| field.as_deref())
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, address: &Address) -> Result<LatLon, AdapterError> {
        let query = canonical_query(address);
        if query.is_empty() {
            return Err(AdapterError::NoResult("address has no street fields".into()));
        }

        if let Some(hit) = self.cache.lock().unwrap().get(&query) {
            return Ok(*hit);
        }

        let mut url = Url::parse(&format!("{}/search", self.endpoint))
            .map_err(|err| AdapterError::Api(format!("failed to build geocoder URL: {err}")))?;
        url.query_pairs_mut()
            .append_pair("q", &query)
            .append_pair("format", "jsonv2")
            .append_pair("limit", "1");

        let response = self.client.get(url).send().await?;
        let hits: Vec<GeocodeHit> = response.json().await?;
        let hit = hits
            .first()
            .ok_or_else(|| AdapterError::NoResult(query.clone()))?;

        let lat: f64 = hit
            .lat
            .parse()
            .map_err(|_| AdapterError::Api(format!("non-numeric latitude {:?}", hit.lat)))?;
        let lon: f64 = hit
            .lon
            .parse()
            .map_err(|_| AdapterError::Api(format!("non-numeric longitude {:?}", hit.lon)))?;

        let point = LatLon { lat, lon };
        self.cache.lock().unwrap().put(query, point);
        Ok(point)
    }
}
