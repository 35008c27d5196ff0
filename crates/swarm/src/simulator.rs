//! Pure grid construction and congestion perturbation.
//!
//! Nothing here touches a store or a clock; callers pass the RNG in.

use common::config::SwarmConfig;
use common::{Intersection, Road};
use rand::Rng;

const STREET_NAMES: [&str; 8] = ["Main", "Oak", "Pine", "Maple", "Cedar", "Elm", "Wall", "Park"];
const AVENUE_NAMES: [&str; 8] = [
    "1st", "2nd", "3rd", "4th", "5th", "Broadway", "Central", "Lexington",
];

const MIN_CYCLE_SECS: u32 = 30;
const MAX_CYCLE_SECS: u32 = 60;
pub const MAX_INTERSECTION_CONGESTION: f64 = 0.8;
pub const MAX_ROAD_CONGESTION: f64 = 0.7;

/// Display name for the intersection at (row, col).
pub fn intersection_name(row: usize, col: usize) -> String {
    format!(
        "{} St & {} Ave",
        STREET_NAMES[(row + col) % STREET_NAMES.len()],
        AVENUE_NAMES[col % AVENUE_NAMES.len()]
    )
}

/// Geometry of the square lattice: north-west corner plus spacing.
#[derive(Debug, Clone, Copy)]
struct Layout {
    top_lat: f64,
    left_lng: f64,
    step: f64,
}

impl Layout {
    fn new(cfg: &SwarmConfig) -> Self {
        if cfg.grid_size < 2 {
            return Self {
                top_lat: cfg.center_lat,
                left_lng: cfg.center_lng,
                step: 0.0,
            };
        }
        Self {
            top_lat: cfg.center_lat + cfg.half_extent_deg,
            left_lng: cfg.center_lng - cfg.half_extent_deg,
            step: 2.0 * cfg.half_extent_deg / (cfg.grid_size - 1) as f64,
        }
    }

    fn position(&self, row: usize, col: usize) -> (f64, f64) {
        (
            self.top_lat - row as f64 * self.step,
            self.left_lng + col as f64 * self.step,
        )
    }
}

/// A fresh `grid_size × grid_size` grid, intersections row-major, with a
/// road to each right and bottom neighbour.
pub fn build_grid<R: Rng + ?Sized>(cfg: &SwarmConfig, rng: &mut R) -> (Vec<Intersection>, Vec<Road>) {
    let n = cfg.grid_size;
    let layout = Layout::new(cfg);

    let mut intersections = Vec::with_capacity(n * n);
    for row in 0..n {
        for col in 0..n {
            let (lat, lng) = layout.position(row, col);
            let cycle = rng.gen_range(MIN_CYCLE_SECS..=MAX_CYCLE_SECS);
            intersections.push(Intersection {
                id: None,
                lat,
                lng,
                grid_x: row,
                grid_y: col,
                name: intersection_name(row, col),
                congestion: rng.gen_range(0.0..MAX_INTERSECTION_CONGESTION),
                cycle_duration: cycle,
                time_remaining: cycle,
            });
        }
    }

    let mut roads = Vec::with_capacity(2 * n * n.saturating_sub(1));
    for row in 0..n {
        for col in 0..n {
            let (lat, lng) = layout.position(row, col);
            if col + 1 < n {
                let (end_lat, end_lng) = layout.position(row, col + 1);
                roads.push(road(lat, lng, end_lat, end_lng, rng));
            }
            if row + 1 < n {
                let (end_lat, end_lng) = layout.position(row + 1, col);
                roads.push(road(lat, lng, end_lat, end_lng, rng));
            }
        }
    }

    (intersections, roads)
}

fn road<R: Rng + ?Sized>(start_lat: f64, start_lng: f64, end_lat: f64, end_lng: f64, rng: &mut R) -> Road {
    Road {
        id: None,
        start_lat,
        start_lng,
        end_lat,
        end_lng,
        congestion: rng.gen_range(0.0..MAX_ROAD_CONGESTION),
    }
}

/// Redraw congestion and the signal countdown of every intersection.
pub fn perturb_intersections<R: Rng + ?Sized>(rows: &mut [Intersection], rng: &mut R) {
    for row in rows {
        row.congestion = rng.gen_range(0.0..MAX_INTERSECTION_CONGESTION);
        row.time_remaining = if row.cycle_duration > 0 {
            rng.gen_range(0..row.cycle_duration)
        } else {
            0
        };
    }
}

pub fn perturb_roads<R: Rng + ?Sized>(rows: &mut [Road], rng: &mut R) {
    for row in rows {
        row.congestion = rng.gen_range(0.0..MAX_ROAD_CONGESTION);
    }
}
