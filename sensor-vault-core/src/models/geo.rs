use serde::{Deserialize, Serialize};

/// Optional spatial tag attached to a record.
///
/// `(0.0, 0.0)` is the "not applicable" sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoContext {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoContext {
    pub const NONE: GeoContext = GeoContext {
        latitude: 0.0,
        longitude: 0.0,
    };

    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// NaN or infinite coordinates cannot be stored as JSON numbers.
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}
