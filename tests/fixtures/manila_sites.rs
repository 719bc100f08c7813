//! Metro Manila reference points for realistic test fixtures.
//!
//! Barangay centers and distributor depots, coordinates from OpenStreetMap.

/// A named location with coordinates.
#[derive(Debug, Clone)]
pub struct Site {
    pub name: &'static str,
    pub lat: f64,
    pub lng: f64,
}

impl Site {
    pub const fn new(name: &'static str, lat: f64, lng: f64) -> Self {
        Self { name, lat, lng }
    }

    pub fn coords(&self) -> (f64, f64) {
        (self.lat, self.lng)
    }
}

// ============================================================================
// Barangay centers (used as area codes)
// ============================================================================

pub const BARANGAYS: &[Site] = &[
    Site::new("Poblacion Makati", 14.5657, 121.0296),
    Site::new("San Antonio Pasig", 14.5832, 121.0614),
    Site::new("Socorro Cubao", 14.6197, 121.0532),
    Site::new("Malate", 14.5726, 120.9896),
    Site::new("Fort Bonifacio", 14.5509, 121.0498),
    Site::new("Kapitolyo", 14.5700, 121.0590),
];

// ============================================================================
// Distributor depots (sequencing start points)
// ============================================================================

pub const DEPOTS: &[Site] = &[
    Site::new("Ortigas Warehouse", 14.5869, 121.0614),
    Site::new("Pasay Warehouse", 14.5378, 121.0014),
];
