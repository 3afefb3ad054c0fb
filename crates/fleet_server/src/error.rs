//! Service-level error taxonomy.
//!
//! Validation failures never advance state; upstream and store failures are
//! surfaced with enough context for the REST layer to pick a status class.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use fleet_core::route::RouteError;
use fleet_core::trip::TripPlanError;
use fleet_core::vehicle::KinematicsError;

use crate::adapters::AdapterError;
use crate::cache::CacheError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("vehicle {0} not found")]
    NotFound(Uuid),
    #[error("upstream service failed: {0}")]
    Upstream(#[from] AdapterError),
    #[error("route preprocessing failed: {0}")]
    Route(#[from] RouteError),
    #[error("derived route load failed: {0}")]
    CacheLoad(Arc<CacheError>),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Kinematics(#[from] KinematicsError),
}

impl From<TripPlanError> for ServiceError {
    fn from(err: TripPlanError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

impl ServiceError {
    /// Classify a cache load failure for `id`: a missing or unresolvable
    /// trip plan means the vehicle is unknown; anything else is a load
    /// failure in its own right.
    pub(crate) fn from_cache_load(id: Uuid, err: Arc<CacheError>) -> Self {
        match err.as_ref() {
            CacheError::MissingTripPlan(_) | CacheError::UnresolvedStop(_) => {
                ServiceError::NotFound(id)
            }
            _ => ServiceError::CacheLoad(err),
        }
    }
}
