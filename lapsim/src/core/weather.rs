use crate::core::rng::RaceRng;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum WeatherState {
    Clear,
    PartlyCloudy,
    Cloudy,
    LightRain,
    Rain,
    HeavyRain,
}

impl Default for WeatherState {
    fn default() -> Self {
        WeatherState::Clear
    }
}

/// Transition probabilities of the forecast Markov chain (row: from, column: to). Every state only
/// changes to itself or to an adjacent severity level.
const TRANSITIONS: [[f64; 6]; 6] = [
    [0.80, 0.20, 0.00, 0.00, 0.00, 0.00],
    [0.15, 0.70, 0.15, 0.00, 0.00, 0.00],
    [0.00, 0.15, 0.70, 0.15, 0.00, 0.00],
    [0.00, 0.00, 0.20, 0.60, 0.20, 0.00],
    [0.00, 0.00, 0.00, 0.25, 0.60, 0.15],
    [0.00, 0.00, 0.00, 0.00, 0.35, 0.65],
];

const ALL_STATES: [WeatherState; 6] = [
    WeatherState::Clear,
    WeatherState::PartlyCloudy,
    WeatherState::Cloudy,
    WeatherState::LightRain,
    WeatherState::Rain,
    WeatherState::HeavyRain,
];

impl WeatherState {
    /// Severity level from 0 (clear) to 5 (heavy rain).
    pub fn severity(&self) -> usize {
        match self {
            WeatherState::Clear => 0,
            WeatherState::PartlyCloudy => 1,
            WeatherState::Cloudy => 2,
            WeatherState::LightRain => 3,
            WeatherState::Rain => 4,
            WeatherState::HeavyRain => 5,
        }
    }

    pub fn from_severity(severity: usize) -> WeatherState {
        ALL_STATES[severity.min(ALL_STATES.len() - 1)]
    }

    pub fn is_wet(&self) -> bool {
        self.severity() >= 3
    }

    /// (°C) Track temperature range [min, max)
    pub fn track_temp_range(&self) -> (f64, f64) {
        match self {
            WeatherState::Clear => (35.0, 50.0),
            WeatherState::PartlyCloudy => (28.0, 40.0),
            WeatherState::Cloudy => (22.0, 32.0),
            WeatherState::LightRain => (18.0, 26.0),
            WeatherState::Rain => (15.0, 22.0),
            WeatherState::HeavyRain => (12.0, 18.0),
        }
    }

    /// (%) Grip level of a track that just reached this state
    pub fn base_grip(&self) -> f64 {
        match self {
            WeatherState::Clear => 100.0,
            WeatherState::PartlyCloudy => 98.0,
            WeatherState::Cloudy => 94.0,
            WeatherState::LightRain => 75.0,
            WeatherState::Rain => 55.0,
            WeatherState::HeavyRain => 35.0,
        }
    }

    /// Factor applied to the crash chance.
    pub fn crash_multiplier(&self) -> f64 {
        match self {
            WeatherState::LightRain => 2.0,
            WeatherState::Rain => 3.0,
            WeatherState::HeavyRain => 4.5,
            _ => 1.0,
        }
    }

    /// Draws the next state of the Markov chain.
    pub fn next(&self, rng: &mut RaceRng) -> WeatherState {
        let idx = rng.weighted_index(&TRANSITIONS[self.severity()]);
        WeatherState::from_severity(idx)
    }

    pub fn sample_track_temp(&self, rng: &mut RaceRng) -> f64 {
        let (lo, hi) = self.track_temp_range();
        rng.uniform(lo, hi)
    }
}

impl fmt::Display for WeatherState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            WeatherState::Clear => "clear",
            WeatherState::PartlyCloudy => "partly cloudy",
            WeatherState::Cloudy => "cloudy",
            WeatherState::LightRain => "light rain",
            WeatherState::Rain => "rain",
            WeatherState::HeavyRain => "heavy rain",
        };
        write!(f, "{}", name)
    }
}

/// generate_forecast draws a per-lap forecast of length `tot_no_laps + 1` starting from the given
/// state. Index 0 is the weather on the grid, index `lap` the weather during that lap.
pub fn generate_forecast(tot_no_laps: u32, initial: WeatherState, rng: &mut RaceRng) -> Vec<WeatherState> {
    let mut forecast = Vec::with_capacity(tot_no_laps as usize + 1);
    forecast.push(initial);

    for _ in 0..tot_no_laps {
        let prev = *forecast.last().unwrap_or(&initial);
        forecast.push(prev.next(rng));
    }

    forecast
}

/// TrackCondition tracks the grip of the track surface over the race.
#[derive(Debug, Clone, Serialize)]
pub struct TrackCondition {
    pub grip: f64,
    /// Rubber laid down on a dry track, added to the grip
    pub evolution: f64,
    pub track_temp: f64,
    wet_laps: u32,
}

impl TrackCondition {
    pub fn new(weather: WeatherState, track_temp: f64) -> TrackCondition {
        TrackCondition {
            grip: weather.base_grip(),
            evolution: 0.0,
            track_temp,
            wet_laps: 0,
        }
    }

    /// The method updates the grip for a lap run in the given weather. Grip keeps falling while the
    /// rain persists and recovers step by step once the track dries.
    pub fn update(&mut self, weather: WeatherState, track_temp: f64) {
        self.track_temp = track_temp;
        let base = weather.base_grip();

        if weather.is_wet() {
            self.wet_laps += 1;
            self.evolution *= 0.5;
            let rain_loss = 2.0 * (self.wet_laps - 1) as f64;
            self.grip = (base - rain_loss).max(30.0);
        } else {
            self.wet_laps = 0;
            self.evolution = (self.evolution + 0.1).min(3.0);
            self.grip = if self.grip < base { (self.grip + 5.0).min(base) } else { base };
        }
    }

    /// (%) Effective grip including rubbered-in track evolution
    pub fn effective_grip(&self) -> f64 {
        (self.grip + self.evolution).min(100.0)
    }
}
