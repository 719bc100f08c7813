//! OpenRouteService HTTP adapter for road-network distance matrices.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DistanceError;
use crate::traits::{DistanceMatrix, DistanceMatrixProvider};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrsConfig {
    pub matrix_endpoint: String,
    pub api_key: Option<String>,
    pub use_cache: bool,
    /// Explicit kill switch; a disabled client fails every call.
    pub enabled: bool,
}

impl Default for OrsConfig {
    fn default() -> Self {
        Self {
            matrix_endpoint: "http://localhost:8080/ors/v2/matrix/driving-car".to_string(),
            api_key: None,
            use_cache: true,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrsClient {
    config: OrsConfig,
    client: reqwest::blocking::Client,
}

impl OrsClient {
    pub fn new(config: OrsConfig, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &OrsConfig {
        &self.config
    }
}

impl DistanceMatrixProvider for OrsClient {
    fn matrix_for(&self, locations: &[(f64, f64)]) -> Result<DistanceMatrix, DistanceError> {
        if !self.config.enabled {
            return Err(DistanceError::Disabled);
        }
        if locations.is_empty() {
            return Ok(Vec::new());
        }

        let body = OrsMatrixRequest {
            // ORS wants [lon, lat].
            locations: locations.iter().map(|(lat, lng)| [*lng, *lat]).collect(),
            metrics: ["distance"],
            units: "km",
        };

        let mut request = self.client.post(&self.config.matrix_endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.header(reqwest::header::AUTHORIZATION, key);
        }

        let response = request
            .send()
            .and_then(|resp| resp.error_for_status())
            .and_then(|resp| resp.json::<OrsMatrixResponse>())?;

        validate_matrix(response.distances, locations.len())
    }
}

/// Check the response is an n×n matrix of finite, non-negative values.
fn validate_matrix(
    distances: Option<Vec<Vec<Option<f64>>>>,
    n: usize,
) -> Result<DistanceMatrix, DistanceError> {
    let rows = distances.ok_or_else(|| DistanceError::Malformed("missing distances".to_string()))?;
    if rows.len() != n {
        return Err(DistanceError::Malformed(format!("expected {n} rows, got {}", rows.len())));
    }

    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            if row.len() != n {
                return Err(DistanceError::Malformed(format!(
                    "row {i} has {} columns, expected {n}",
                    row.len()
                )));
            }
            row.into_iter()
                .enumerate()
                .map(|(j, cell)| match cell {
                    Some(km) if km.is_finite() && km >= 0.0 => Ok(km),
                    _ => Err(DistanceError::Malformed(format!("unroutable cell ({i}, {j})"))),
                })
                .collect()
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct OrsMatrixRequest {
    locations: Vec<[f64; 2]>,
    metrics: [&'static str; 1],
    units: &'static str,
}

#[derive(Debug, Deserialize)]
struct OrsMatrixResponse {
    distances: Option<Vec<Vec<Option<f64>>>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_square_matrix() {
        let matrix = validate_matrix(Some(vec![vec![Some(0.0), Some(1.5)], vec![Some(1.4), Some(0.0)]]), 2).unwrap();
        assert_eq!(matrix, vec![vec![0.0, 1.5], vec![1.4, 0.0]]);
    }

    #[test]
    fn rejects_wrong_shape() {
        let err = validate_matrix(Some(vec![vec![Some(0.0)]]), 2).unwrap_err();
        assert!(matches!(err, DistanceError::Malformed(_)));

        let err = validate_matrix(Some(vec![vec![Some(0.0)], vec![Some(0.0)]]), 2).unwrap_err();
        assert!(matches!(err, DistanceError::Malformed(_)));
    }

    #[test]
    fn rejects_null_cells_and_missing_field() {
        let err = validate_matrix(Some(vec![vec![Some(0.0), None], vec![Some(1.0), Some(0.0)]]), 2).unwrap_err();
        assert!(matches!(err, DistanceError::Malformed(_)));
        assert!(matches!(validate_matrix(None, 1), Err(DistanceError::Malformed(_))));
    }

    #[test]
    fn disabled_client_fails_fast() {
        let config = OrsConfig {
            enabled: false,
            ..OrsConfig::default()
        };
        let client = OrsClient::new(config, Duration::from_secs(1)).unwrap();
        let result = client.matrix_for(&[(14.6, 121.0), (14.7, 121.1)]);
        assert!(matches!(result, Err(DistanceError::Disabled)));
    }
}
