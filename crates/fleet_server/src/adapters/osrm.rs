//! OSRM-compatible directions client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};

use fleet_core::directions::Directions;

use super::{AdapterError, DirectionsProvider};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Thin HTTP client for an OSRM `route` endpoint.
///
/// Requests full-overview GeoJSON geometry with per-slice speed/distance
/// annotations, which is exactly what the route preprocessor and the
/// kinematic model consume.
#[derive(Debug, Clone)]
pub struct OsrmDirections {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl OsrmDirections {
    /// Create a client for the given endpoint (e.g. `http://localhost:5000`).
    pub fn new(endpoint: &str, api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build directions client");
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl DirectionsProvider for OsrmDirections {
    async fn directions(&self, waypoints_lon_lat: &[[f64; 2]]) -> Result<Directions, AdapterError> {
        if waypoints_lon_lat.len() < 2 {
            return Err(AdapterError::NoResult(format!(
                "{} waypoint(s)",
                waypoints_lon_lat.len()
            )));
        }

        let coord_segment = waypoints_lon_lat
            .iter()
            .map(|c| format!("{:.6},{:.6}", c[0], c[1]))
            .collect::<Vec<_>>()
            .join(";");

        let base = format!("{}/route/v1/driving/{}", self.endpoint, coord_segment);
        let mut url = Url::parse(&base)
            .map_err(|err| AdapterError::Api(format!("failed to build directions URL: {err}")))?;
        url.query_pairs_mut()
            .append_pair("annotations", "true")
            .append_pair("steps", "true")
            .append_pair("geometries", "geojson")
            .append_pair("overview", "full");
        if let Some(key) = &self.api_key {
            url.query_pairs_mut().append_pair("api_key", key);
        }

        let response = self.client.get(url).send().await?;
        let directions: Directions = response.json().await?;

        if directions.code.as_deref() != Some("Ok") {
            return Err(AdapterError::Api(
                directions.code.unwrap_or_else(|| "no response code".into()),
            ));
        }
        if directions.primary_route().is_none() {
            return Err(AdapterError::NoResult("empty route list".into()));
        }
        Ok(directions)
    }
}
