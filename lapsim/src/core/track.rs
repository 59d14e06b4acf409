use crate::error::{RaceError, SimResult};
use serde::{Deserialize, Serialize};

/// * `name` - Track name
/// * `length` - (km) Length of the track
/// * `corners` - Number of corners
/// * `base_laptime` - (s) Reference race lap time
/// * `overtake_difficulty` - (0-100) Difficulty to pass, higher is harder
/// * `tire_wear` - Tire wear multiplier of the track surface
/// * `fuel_usage` - Fuel usage multiplier
/// * `drs_zones` - Number of DRS zones
/// * `sector_fracs` - Lap fractions of the three sectors (sum to 1.0)
/// * `street_circuit` - True for temporary street circuits (walls close to the racing line)
/// * `standing_start_loss` - (s) Lap time loss of the first lap due to the start from standstill
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TrackPars {
    pub name: String,
    pub length: f64,
    pub corners: u32,
    pub base_laptime: f64,
    pub overtake_difficulty: f64,
    pub tire_wear: f64,
    pub fuel_usage: f64,
    pub drs_zones: u32,
    pub sector_fracs: [f64; 3],
    #[serde(default)]
    pub street_circuit: bool,
    #[serde(default = "default_standing_start_loss")]
    pub standing_start_loss: f64,
}

fn default_standing_start_loss() -> f64 {
    4.0
}

/// Immutable track record. One instance per race, never mutated during the race.
#[derive(Debug, Clone, Serialize)]
pub struct Track {
    pub name: String,
    pub length: f64,
    pub corners: u32,
    pub base_laptime: f64,
    pub overtake_difficulty: f64,
    pub tire_wear: f64,
    pub fuel_usage: f64,
    pub drs_zones: u32,
    pub sector_fracs: [f64; 3],
    pub street_circuit: bool,
    pub standing_start_loss: f64,
}

/// name, length, corners, base lap time, overtake difficulty, tire wear, fuel usage, DRS zones,
/// sector fractions, street circuit
type TrackRow = (&'static str, f64, u32, f64, f64, f64, f64, u32, [f64; 3], bool);

const TRACK_TABLE: [TrackRow; 8] = [
    ("monza", 5.793, 11, 82.0, 25.0, 0.8, 1.2, 2, [0.36, 0.31, 0.33], false),
    ("monaco", 3.337, 19, 75.0, 95.0, 0.7, 0.8, 1, [0.30, 0.40, 0.30], true),
    ("silverstone", 5.891, 18, 89.0, 45.0, 1.3, 1.0, 2, [0.33, 0.38, 0.29], false),
    ("spa", 7.004, 19, 108.0, 35.0, 1.1, 1.1, 2, [0.30, 0.45, 0.25], false),
    ("bahrain", 5.412, 15, 95.0, 30.0, 1.4, 1.0, 3, [0.33, 0.36, 0.31], false),
    ("suzuka", 5.807, 18, 93.0, 65.0, 1.2, 1.0, 1, [0.35, 0.37, 0.28], false),
    ("singapore", 4.940, 19, 97.0, 80.0, 1.0, 1.1, 3, [0.32, 0.36, 0.32], true),
    ("interlagos", 4.309, 15, 73.0, 40.0, 1.1, 1.0, 2, [0.29, 0.44, 0.27], false),
];

impl Track {
    pub fn new(track_pars: &TrackPars) -> Track {
        // normalize sector fractions such that they always sum up to one
        let frac_sum: f64 = track_pars.sector_fracs.iter().sum();
        let sector_fracs = if frac_sum > 0.0 && frac_sum.is_finite() {
            track_pars.sector_fracs.map(|x| x / frac_sum)
        } else {
            [1.0 / 3.0; 3]
        };

        Track {
            name: track_pars.name.to_owned(),
            length: track_pars.length,
            corners: track_pars.corners,
            base_laptime: track_pars.base_laptime,
            overtake_difficulty: track_pars.overtake_difficulty.clamp(0.0, 100.0),
            tire_wear: track_pars.tire_wear,
            fuel_usage: track_pars.fuel_usage,
            drs_zones: track_pars.drs_zones,
            sector_fracs,
            street_circuit: track_pars.street_circuit,
            standing_start_loss: track_pars.standing_start_loss,
        }
    }

    /// Looks up a track in the built-in table (case-insensitive).
    pub fn lookup(name: &str) -> SimResult<Track> {
        let name_lc = name.trim().to_lowercase();

        TRACK_TABLE
            .iter()
            .find(|row| row.0 == name_lc)
            .map(|row| {
                Track::new(&TrackPars {
                    name: row.0.to_owned(),
                    length: row.1,
                    corners: row.2,
                    base_laptime: row.3,
                    overtake_difficulty: row.4,
                    tire_wear: row.5,
                    fuel_usage: row.6,
                    drs_zones: row.7,
                    sector_fracs: row.8,
                    street_circuit: row.9,
                    standing_start_loss: default_standing_start_loss(),
                })
            })
            .ok_or_else(|| RaceError::UnknownTrack(name.to_owned()))
    }

    /// Names of all built-in tracks.
    pub fn available_tracks() -> Vec<&'static str> {
        TRACK_TABLE.iter().map(|row| row.0).collect()
    }

    /// The method returns true for tracks where mistakes are punished by walls, i.e. street
    /// circuits that are also hard to overtake on.
    pub fn is_high_risk(&self) -> bool {
        self.street_circuit && self.overtake_difficulty >= 70.0
    }

    /// The method splits a lap time into the three sector times.
    pub fn split_sectors(&self, laptime: f64) -> [f64; 3] {
        self.sector_fracs.map(|frac| laptime * frac)
    }
}
