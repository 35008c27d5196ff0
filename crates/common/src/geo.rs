//! Flat-earth degree/kilometre approximations used for bounding boxes and
//! grid lattices.

/// Approximate kilometres per degree of latitude.
pub const KM_PER_DEGREE: f64 = 111.0;

/// Degrees of latitude spanned by `km`.
pub fn lat_degrees(km: f64) -> f64 {
    km / KM_PER_DEGREE
}

/// Degrees of longitude spanned by `km` at latitude `lat`.
pub fn lng_degrees(km: f64, lat: f64) -> f64 {
    km / (KM_PER_DEGREE * lat.to_radians().cos())
}

/// Axis-aligned box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lng: f64,
    pub min_lat: f64,
    pub max_lng: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Box extending `radius_km` in every direction from (lat, lng).
    pub fn around(lat: f64, lng: f64, radius_km: f64) -> Self {
        let d_lat = lat_degrees(radius_km);
        let d_lng = lng_degrees(radius_km, lat);
        Self {
            min_lng: lng - d_lng,
            min_lat: lat - d_lat,
            max_lng: lng + d_lng,
            max_lat: lat + d_lat,
        }
    }

    /// `minLng,minLat,maxLng,maxLat` with six decimals.
    pub fn to_query(&self) -> String {
        format!(
            "{:.6},{:.6},{:.6},{:.6}",
            self.min_lng, self.min_lat, self.max_lng, self.max_lat
        )
    }
}
