//! Haversine distance matrix provider (fallback when the road network is unavailable).
//!
//! Uses great-circle distance. Less accurate than a road network (ignores
//! roads) but always available.

use crate::error::DistanceError;
use crate::traits::{DistanceMatrix, DistanceMatrixProvider};

/// Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two (lat, lng) points in kilometers.
pub fn haversine_km(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lng1) = from;
    let (lat2, lng2) = to;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_KM * c
}

/// Haversine-based distance matrix provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct HaversineMatrix;

impl HaversineMatrix {
    /// Infallible form of [`DistanceMatrixProvider::matrix_for`].
    pub fn matrix(&self, locations: &[(f64, f64)]) -> DistanceMatrix {
        let n = locations.len();
        let mut matrix = vec![vec![0.0; n]; n];

        for (i, from) in locations.iter().enumerate() {
            for (j, to) in locations.iter().enumerate().skip(i + 1) {
                let km = haversine_km(*from, *to);
                matrix[i][j] = km;
                matrix[j][i] = km;
            }
        }

        matrix
    }
}

impl DistanceMatrixProvider for HaversineMatrix {
    fn matrix_for(&self, locations: &[(f64, f64)]) -> Result<DistanceMatrix, DistanceError> {
        Ok(self.matrix(locations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_same_point() {
        let dist = haversine_km((14.6, 121.0), (14.6, 121.0));
        assert!(dist < 0.001, "Same point should have ~0 distance");
    }

    #[test]
    fn test_haversine_known_distance() {
        // Manila (14.5995, 120.9842) to Cebu City (10.3157, 123.8854)
        // Actual distance ~570 km
        let dist = haversine_km((14.5995, 120.9842), (10.3157, 123.8854));
        assert!(dist > 550.0 && dist < 590.0, "Manila to Cebu should be ~570km, got {}", dist);
    }

    #[test]
    fn test_one_degree_latitude() {
        let dist = haversine_km((0.0, 10.0), (1.0, 10.0));
        assert!((dist - 111.19).abs() < 0.01, "got {}", dist);
    }

    #[test]
    fn test_matrix_diagonal_is_zero() {
        let locations = vec![(14.1, 121.1), (14.2, 121.2), (14.3, 121.3)];
        let matrix = HaversineMatrix.matrix(&locations);

        for i in 0..locations.len() {
            assert_eq!(matrix[i][i], 0.0, "Diagonal should be zero");
        }
    }

    #[test]
    fn test_matrix_symmetric() {
        let locations = vec![(14.1, 121.1), (14.2, 121.2)];
        let matrix = HaversineMatrix.matrix_for(&locations).unwrap();

        assert_eq!(matrix[0][1], matrix[1][0], "Matrix should be symmetric");
        assert!(matrix[0][1] > 0.0);
    }

    #[test]
    fn test_empty_locations() {
        assert!(HaversineMatrix.matrix(&[]).is_empty());
    }
}
