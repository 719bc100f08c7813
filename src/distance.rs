//! Distance provider selection, matrix caching and great-circle fallback.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::DistanceError;
use crate::haversine::HaversineMatrix;
use crate::ors::{OrsClient, OrsConfig};
use crate::traits::{DistanceMatrix, DistanceMatrixProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMode {
    #[default]
    Haversine,
    Network,
}

pub type CacheKey = [u8; 32];

/// Matrix cache keyed by a hash of the ordered coordinate list.
///
/// Concurrent readers never block each other. Two workers racing on the same
/// key both compute the matrix; the first insert wins and the second is
/// discarded.
#[derive(Debug, Default)]
pub struct MatrixCache {
    entries: RwLock<HashMap<CacheKey, Arc<DistanceMatrix>>>,
}

impl MatrixCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(locations: &[(f64, f64)]) -> CacheKey {
        let mut hasher = Sha256::new();
        for location in locations {
            hasher.update(location_key(*location).as_bytes());
            hasher.update(b";");
        }
        hasher.finalize().into()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<DistanceMatrix>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned()
    }

    pub fn insert(&self, key: CacheKey, matrix: DistanceMatrix) -> Arc<DistanceMatrix> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.entry(key).or_insert_with(|| Arc::new(matrix)).clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn location_key(location: (f64, f64)) -> String {
    format!("{:.6},{:.6}", location.0, location.1)
}

/// Wraps a network provider so every call succeeds.
///
/// Any primary failure falls back to great-circle distance for that call
/// only. Failures are never retried and never cached.
#[derive(Debug)]
pub struct FallbackMatrix<P> {
    primary: P,
    fallback: HaversineMatrix,
    cache: Option<MatrixCache>,
}

impl<P: DistanceMatrixProvider> FallbackMatrix<P> {
    pub fn new(primary: P, use_cache: bool) -> Self {
        Self {
            primary,
            fallback: HaversineMatrix,
            cache: use_cache.then(MatrixCache::new),
        }
    }

    pub fn cache(&self) -> Option<&MatrixCache> {
        self.cache.as_ref()
    }

    /// Infallible form of [`DistanceMatrixProvider::matrix_for`].
    pub fn matrix(&self, locations: &[(f64, f64)]) -> DistanceMatrix {
        if locations.len() < 2 {
            return self.fallback.matrix(locations);
        }

        let key = self.cache.as_ref().map(|_| MatrixCache::key(locations));
        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(hit) = cache.get(key) {
                debug!(locations = locations.len(), "distance matrix cache hit");
                return hit.as_ref().clone();
            }
        }

        match self.primary.matrix_for(locations) {
            Ok(matrix) => match (&self.cache, key) {
                (Some(cache), Some(key)) => cache.insert(key, matrix).as_ref().clone(),
                _ => matrix,
            },
            Err(err) => {
                warn!(error = %err, locations = locations.len(), "road-network distance unavailable; using great-circle");
                self.fallback.matrix(locations)
            }
        }
    }
}

impl<P: DistanceMatrixProvider> DistanceMatrixProvider for FallbackMatrix<P> {
    fn matrix_for(&self, locations: &[(f64, f64)]) -> Result<DistanceMatrix, DistanceError> {
        Ok(self.matrix(locations))
    }
}

/// The distance provider selected by configuration.
#[derive(Debug)]
pub enum DistanceProvider {
    Haversine(HaversineMatrix),
    Network(FallbackMatrix<OrsClient>),
}

impl DistanceProvider {
    pub fn new(mode: DistanceMode, ors: &OrsConfig, timeout: Duration) -> Self {
        match mode {
            DistanceMode::Haversine => DistanceProvider::Haversine(HaversineMatrix),
            DistanceMode::Network => match OrsClient::new(ors.clone(), timeout) {
                Ok(client) => DistanceProvider::Network(FallbackMatrix::new(client, ors.use_cache)),
                Err(err) => {
                    warn!(error = %err, "cannot build road-network client; using great-circle");
                    DistanceProvider::Haversine(HaversineMatrix)
                }
            },
        }
    }

    pub fn mode(&self) -> DistanceMode {
        match self {
            DistanceProvider::Haversine(_) => DistanceMode::Haversine,
            DistanceProvider::Network(_) => DistanceMode::Network,
        }
    }
}

impl DistanceMatrixProvider for DistanceProvider {
    fn matrix_for(&self, locations: &[(f64, f64)]) -> Result<DistanceMatrix, DistanceError> {
        match self {
            DistanceProvider::Haversine(provider) => provider.matrix_for(locations),
            DistanceProvider::Network(provider) => provider.matrix_for(locations),
        }
    }
}
