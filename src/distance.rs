//! Great-circle distance model.
//!
//! Distances are computed once per instance with the haversine formula and stored
//! in a dense matrix indexed by node position.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A geographic position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Coordinate { latitude, longitude }
    }

    /// Check the position lies on the globe
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Great-circle distance in kilometers between two coordinates (haversine).
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let dphi = (b.latitude - a.latitude).to_radians();
    let dlambda = (b.longitude - a.longitude).to_radians();

    let h = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}

/// Square matrix of pairwise distances in kilometers
#[derive(Debug, Clone, Default)]
pub struct DistanceMatrix {
    rows: Vec<Vec<f64>>,
}

impl DistanceMatrix {
    /// Build the full matrix over `coords`. The diagonal is set to exactly 0.0
    /// without going through the formula.
    pub fn from_coordinates(coords: &[Coordinate]) -> Self {
        let n = coords.len();
        let mut rows = vec![vec![0.0; n]; n];

        for i in 0..n {
            for j in 0..n {
                if i != j {
                    rows[i][j] = haversine_km(coords[i], coords[j]);
                }
            }
        }

        DistanceMatrix { rows }
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.rows[i][j]
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// True when `m[i][j] == m[j][i]` within `tolerance` and the diagonal is zero
    pub fn is_symmetric(&self, tolerance: f64) -> bool {
        let n = self.rows.len();
        (0..n).all(|i| {
            self.rows[i][i] == 0.0
                && (i + 1..n).all(|j| (self.rows[i][j] - self.rows[j][i]).abs() <= tolerance)
        })
    }
}
