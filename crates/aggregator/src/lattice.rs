//! Point lattice for grid traffic requests.

use common::geo::{lat_degrees, lng_degrees};

/// One lattice position: row `grid_x`, column `grid_y`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatticePoint {
    pub grid_x: usize,
    pub grid_y: usize,
    pub lat: f64,
    pub lng: f64,
}

/// `grid_size × grid_size` points spanning `radius_km` either side of the
/// centre, in row-major order, north-west corner first. A size of 1 yields
/// the centre alone; a size of 0 yields nothing.
pub fn lattice(center_lat: f64, center_lng: f64, radius_km: f64, grid_size: usize) -> Vec<LatticePoint> {
    match grid_size {
        0 => Vec::new(),
        1 => vec![LatticePoint {
            grid_x: 0,
            grid_y: 0,
            lat: center_lat,
            lng: center_lng,
        }],
        n => {
            let half_lat = lat_degrees(radius_km);
            let half_lng = lng_degrees(radius_km, center_lat);
            let lat_step = 2.0 * half_lat / (n - 1) as f64;
            let lng_step = 2.0 * half_lng / (n - 1) as f64;
            let top_lat = center_lat + half_lat;
            let left_lng = center_lng - half_lng;

            let mut points = Vec::with_capacity(n * n);
            for i in 0..n {
                for j in 0..n {
                    points.push(LatticePoint {
                        grid_x: i,
                        grid_y: j,
                        lat: top_lat - i as f64 * lat_step,
                        lng: left_lng + j as f64 * lng_step,
                    });
                }
            }
            points
        }
    }
}
