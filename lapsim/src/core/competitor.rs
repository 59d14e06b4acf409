use crate::core::car::{
    BrakeState, CarPars, Damage, EngineMode, EngineState, ErsMode, ErsState, FuelState,
};
use crate::core::driver::{DriverPars, Psyche};
use crate::core::incidents::FailureKind;
use crate::core::tireset::{TireCompound, Tireset};
use crate::error::{RaceError, SimResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a competitor in the race roster. Cross-competitor references (duel partner) are
/// always stored as such keys, never as references.
pub type CompetitorIdx = usize;

/// Setup record of one race participant.
///
/// * `id` - Unique competitor id (e.g. car number)
/// * `name` - Display name
/// * `autonomous` - True if the rule-based strategy controls the competitor, false if it is driven
/// by external control commands
/// * `grid_position` - Start position, required unless qualifying or input order decides the grid
/// * `start_compound` - Compound fitted at the start (chosen from the weather if not set)
/// * `start_fuel` - (%) Fuel load at the start
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CompetitorPars {
    pub id: u32,
    pub name: String,
    #[serde(default = "default_autonomous")]
    pub autonomous: bool,
    pub driver: DriverPars,
    pub car: CarPars,
    #[serde(default)]
    pub grid_position: Option<u32>,
    #[serde(default)]
    pub start_compound: Option<TireCompound>,
    #[serde(default = "default_start_fuel")]
    pub start_fuel: f64,
}

fn default_autonomous() -> bool {
    true
}

fn default_start_fuel() -> f64 {
    100.0
}

impl CompetitorPars {
    /// Checks that all skill and car attributes are within [0, 100].
    pub fn validate(&self) -> SimResult<()> {
        for (name, value) in self
            .driver
            .attributes()
            .iter()
            .chain(self.car.attributes().iter())
            .copied()
        {
            if !(0.0..=100.0).contains(&value) {
                return Err(RaceError::InvalidAttribute { id: self.id, name, value });
            }
        }
        if !(0.0..=100.0).contains(&self.start_fuel) {
            return Err(RaceError::InvalidAttribute {
                id: self.id,
                name: "start_fuel",
                value: self.start_fuel,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DnfReason {
    OutOfFuel,
    EngineFailure,
    Mechanical(FailureKind),
    Crash,
    Damage,
    SimulationFault,
}

impl fmt::Display for DnfReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DnfReason::OutOfFuel => write!(f, "out of fuel"),
            DnfReason::EngineFailure => write!(f, "engine failure"),
            DnfReason::Mechanical(kind) => write!(f, "{} failure", kind),
            DnfReason::Crash => write!(f, "crash"),
            DnfReason::Damage => write!(f, "terminal damage"),
            DnfReason::SimulationFault => write!(f, "simulation fault"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompetitorStatus {
    Running,
    Dnf(DnfReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DuelPhase {
    Battle,
    OvertakeAttempt,
}

/// Link to the duel partner of a competitor.
///
/// * `opponent` - Roster index of the partner
/// * `attacking` - True for the car behind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DuelLink {
    pub opponent: CompetitorIdx,
    pub attacking: bool,
    pub phase: DuelPhase,
}

/// Timing of a competitor. Gaps are in seconds.
#[derive(Debug, Clone, Serialize)]
pub struct Timing {
    pub grid_position: u32,
    pub position: u32,
    pub elapsed: f64,
    pub gap_to_leader: f64,
    pub gap_to_front: f64,
    pub last_laptime: f64,
    pub best_laptime: Option<f64>,
    pub best_lap: u32,
    pub sector_times: [f64; 3],
    pub best_sectors: [f64; 3],
    pub laps_completed: u32,
    /// Lap of the most recent pit stop
    pub last_pit_lap: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RaceStats {
    pub overtakes_made: u32,
    pub overtakes_lost: u32,
    pub positions_gained: i32,
    pub laps_led: u32,
    pub mistakes: u32,
    pub lockups: u32,
    pub spins: u32,
    pub pit_stops: u32,
}

/// Pending pit request of a competitor, executed during the strategy phase of the lap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PitRequest {
    pub compound: Option<TireCompound>,
}

/// The per-race mutable record of a participant.
#[derive(Debug, Clone, Serialize)]
pub struct Competitor {
    pub id: u32,
    pub name: String,
    pub autonomous: bool,
    pub driver: DriverPars,
    pub car: CarPars,

    pub timing: Timing,
    pub tires: Tireset,
    pub fuel: FuelState,
    pub ers: ErsState,
    pub engine: EngineState,
    pub brakes: BrakeState,
    pub damage: Damage,
    pub psyche: Psyche,
    pub stats: RaceStats,

    /// (0-100) Push level, 50 is the nominal race pace
    pub push: f64,
    /// Drive performance score of the last lap
    pub dps: f64,
    pub drs_available: bool,
    pub slipstream: bool,
    pub duel: Option<DuelLink>,
    /// (s) Penalty time added to the next lap
    pub penalty_pending: f64,
    pub pit_request: Option<PitRequest>,
    pub pitted_this_lap: bool,
    pub status: CompetitorStatus,
}

impl Competitor {
    pub fn new(pars: &CompetitorPars, grid_position: u32, start_compound: TireCompound) -> Competitor {
        Competitor {
            id: pars.id,
            name: pars.name.to_owned(),
            autonomous: pars.autonomous,
            driver: pars.driver.to_owned(),
            car: pars.car.to_owned(),
            timing: Timing {
                grid_position,
                position: grid_position,
                elapsed: 0.0,
                gap_to_leader: 0.0,
                gap_to_front: 0.0,
                last_laptime: 0.0,
                best_laptime: None,
                best_lap: 0,
                sector_times: [0.0; 3],
                best_sectors: [f64::INFINITY; 3],
                laps_completed: 0,
                last_pit_lap: None,
            },
            tires: Tireset::new(start_compound),
            fuel: FuelState {
                load: pars.start_fuel,
                mix: 50.0,
                consumption: 0.0,
            },
            ers: ErsState {
                charge: 50.0,
                mode: ErsMode::Balanced,
                battery_temp: 40.0,
                deployed: false,
            },
            engine: EngineState {
                mode: EngineMode::Balanced,
                temperature: 90.0,
                wear: 0.0,
            },
            brakes: BrakeState {
                temps: [400.0; 4],
                condition: 100.0,
            },
            damage: Damage::default(),
            psyche: Psyche::default(),
            stats: RaceStats::default(),
            push: 50.0,
            dps: 0.0,
            drs_available: false,
            slipstream: false,
            duel: None,
            penalty_pending: 0.0,
            pit_request: None,
            pitted_this_lap: false,
            status: CompetitorStatus::Running,
        }
    }

    pub fn is_dnf(&self) -> bool {
        matches!(self.status, CompetitorStatus::Dnf(_))
    }

    pub fn dnf_reason(&self) -> Option<DnfReason> {
        match self.status {
            CompetitorStatus::Dnf(reason) => Some(reason),
            CompetitorStatus::Running => None,
        }
    }

    /// retire marks the competitor as DNF. Returns false if the competitor already retired, the
    /// first reason is kept in that case.
    pub fn retire(&mut self, reason: DnfReason) -> bool {
        if self.is_dnf() {
            return false;
        }
        log::info!("{} (#{}) retires: {}", self.name, self.id, reason);
        self.status = CompetitorStatus::Dnf(reason);
        self.duel = None;
        self.drs_available = false;
        self.slipstream = false;
        self.pit_request = None;
        true
    }

    /// add_time adds a time loss to the elapsed time (and the current lap time). Negative values are
    /// ignored such that the elapsed time never decreases.
    pub fn add_time(&mut self, seconds: f64) {
        if self.is_dnf() || !seconds.is_finite() || seconds <= 0.0 {
            return;
        }
        self.timing.elapsed += seconds;
        self.timing.last_laptime += seconds;
    }

    /// record_lap stores the lap and sector times of a completed lap.
    pub fn record_lap(&mut self, laptime: f64, sectors: [f64; 3]) {
        let timing = &mut self.timing;
        timing.last_laptime = laptime;
        timing.elapsed += laptime;
        timing.sector_times = sectors;

        for (best, cur) in timing.best_sectors.iter_mut().zip(sectors.iter()) {
            if *cur < *best {
                *best = *cur;
            }
        }
    }

    /// finish_lap updates the lap counter and the best lap once all time losses of the lap (pit
    /// stop, duels, incidents) are known.
    pub fn finish_lap(&mut self, lap: u32) {
        if self.is_dnf() {
            return;
        }
        let timing = &mut self.timing;
        timing.laps_completed = lap;
        if timing.best_laptime.map_or(true, |best| timing.last_laptime < best) {
            timing.best_laptime = Some(timing.last_laptime);
            timing.best_lap = lap;
        }
    }

    /// Percentage fields that must stay within [0, 100].
    pub fn pct_fields(&self) -> [f64; 11] {
        [
            self.tires.condition,
            self.fuel.load,
            self.fuel.mix,
            self.ers.charge,
            self.engine.wear,
            self.brakes.condition,
            self.damage.total,
            self.psyche.focus,
            self.psyche.fatigue,
            self.psyche.confidence,
            self.push,
        ]
    }
}
