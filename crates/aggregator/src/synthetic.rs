//! Synthetic traffic readings used whenever no provider answers.

use common::{DataSource, Location, SharedRng, TrafficReading};
use rand::Rng;

const FREE_FLOW_SPEED_KMH: f64 = 50.0;
const FREE_FLOW_TRAVEL_TIME_SECS: u32 = 300;
const MAX_CONGESTION: f64 = 0.7;

/// Random-within-bounds fallback reading source.
#[derive(Debug, Clone, Default)]
pub struct SyntheticGenerator {
    rng: SharedRng,
}

impl SyntheticGenerator {
    pub fn new(rng: SharedRng) -> Self {
        Self { rng }
    }

    pub fn generate(&self, location: Location) -> TrafficReading {
        let mut rng = self.rng.lock();
        synthetic_reading(location, &mut *rng)
    }
}

/// congestion U[0,0.7), flow U[20,50) km/h, travel time U[300,900) s.
pub fn synthetic_reading<R: Rng + ?Sized>(location: Location, rng: &mut R) -> TrafficReading {
    let congestion = rng.gen_range(0.0..MAX_CONGESTION);
    let flow_speed = rng.gen_range(20.0..50.0);

    let mut reading = TrafficReading::new(
        location,
        DataSource::Static,
        congestion,
        flow_speed,
        FREE_FLOW_SPEED_KMH,
    );
    reading.current_travel_time = Some(rng.gen_range(300..900));
    reading.free_flow_travel_time = Some(FREE_FLOW_TRAVEL_TIME_SECS);
    reading.road_closure = false;
    reading
}
