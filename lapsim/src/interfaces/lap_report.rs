use crate::core::car::{DamageLocation, ErsMode};
use crate::core::competitor::DnfReason;
use crate::core::race::FlagState;
use crate::core::tireset::TireCompound;
use crate::core::weather::WeatherState;
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OvertakeKind {
    Clean,
    SideBySide,
    Aggressive,
}

impl fmt::Display for OvertakeKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OvertakeKind::Clean => write!(f, "passes"),
            OvertakeKind::SideBySide => write!(f, "wins the side-by-side fight against"),
            OvertakeKind::Aggressive => write!(f, "forces a way past"),
        }
    }
}

/// Everything that can happen during a lap. The variants carry the competitor names such that an
/// event can be rendered without access to the roster.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RaceEventKind {
    WeatherChange { from: WeatherState, to: WeatherState },
    DrsEnabled,
    SafetyCarDeployed { laps: u32 },
    VirtualSafetyCarDeployed { laps: u32 },
    SafetyCarIn,
    VirtualSafetyCarEnded,
    Overtake { attacker: String, defender: String, kind: OvertakeKind },
    HeldPosition { attacker: String, defender: String },
    FailedAttempt { attacker: String, defender: String },
    Contact { attacker: String, defender: String, penalty: bool },
    LockUp { name: String },
    Spin { name: String, positions_lost: u32 },
    BigMoment { name: String, location: DamageLocation },
    Crash { name: String },
    SuspensionDamage { name: String },
    Retirement { name: String, reason: DnfReason },
    PitStop { name: String, compound: TireCompound, duration: f64 },
    FastestLap { name: String, laptime: f64 },
    Finish { name: String, position: u32 },
}

impl fmt::Display for RaceEventKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RaceEventKind::WeatherChange { from, to } => {
                write!(f, "Weather changes from {} to {}", from, to)
            }
            RaceEventKind::DrsEnabled => write!(f, "DRS enabled"),
            RaceEventKind::SafetyCarDeployed { laps } => {
                write!(f, "Safety car deployed ({} laps)", laps)
            }
            RaceEventKind::VirtualSafetyCarDeployed { laps } => {
                write!(f, "Virtual safety car deployed ({} laps)", laps)
            }
            RaceEventKind::SafetyCarIn => write!(f, "Safety car in this lap"),
            RaceEventKind::VirtualSafetyCarEnded => write!(f, "Virtual safety car ending"),
            RaceEventKind::Overtake { attacker, defender, kind } => {
                write!(f, "{} {} {}", attacker, kind, defender)
            }
            RaceEventKind::HeldPosition { attacker, defender } => {
                write!(f, "{} holds off {} side by side", defender, attacker)
            }
            RaceEventKind::FailedAttempt { attacker, defender } => {
                write!(f, "{} fails to get past {}", attacker, defender)
            }
            RaceEventKind::Contact { attacker, defender, penalty } => {
                write!(f, "Contact between {} and {}", attacker, defender)?;
                if *penalty {
                    write!(f, ", {} receives a time penalty", attacker)?;
                }
                Ok(())
            }
            RaceEventKind::LockUp { name } => write!(f, "{} locks up", name),
            RaceEventKind::Spin { name, positions_lost } => {
                write!(f, "{} spins and loses {} position(s)", name, positions_lost)
            }
            RaceEventKind::BigMoment { name, location } => {
                write!(f, "{} has a big moment and damages the {}", name, location)
            }
            RaceEventKind::Crash { name } => write!(f, "{} crashes", name),
            RaceEventKind::SuspensionDamage { name } => {
                write!(f, "{} damages the suspension on worn brakes", name)
            }
            RaceEventKind::Retirement { name, reason } => write!(f, "{} retires ({})", name, reason),
            RaceEventKind::PitStop { name, compound, duration } => {
                write!(f, "{} pits for {} tires ({:.1}s)", name, compound, duration)
            }
            RaceEventKind::FastestLap { name, laptime } => {
                write!(f, "Fastest lap by {} ({:.3}s)", name, laptime)
            }
            RaceEventKind::Finish { name, position } => write!(f, "{} finishes P{}", name, position),
        }
    }
}

/// * `lap` - Lap the event happened in
/// * `cars` - Ids of the affected competitors
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RaceEvent {
    pub lap: u32,
    pub cars: Vec<u32>,
    pub kind: RaceEventKind,
}

impl RaceEvent {
    pub fn new(lap: u32, cars: Vec<u32>, kind: RaceEventKind) -> RaceEvent {
        RaceEvent { lap, cars, kind }
    }
}

impl fmt::Display for RaceEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Lap {}: {}", self.lap, self.kind)
    }
}

/// One row of the per-lap classification snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationEntry {
    pub id: u32,
    pub name: String,
    pub position: u32,
    pub gap_to_leader: f64,
    pub gap_to_front: f64,
    pub laptime: f64,
    pub compound: TireCompound,
    pub tire_condition: f64,
    pub tire_age: u32,
    pub fuel: f64,
    pub ers_charge: f64,
    pub ers_mode: ErsMode,
    pub drs: bool,
    pub dnf: Option<DnfReason>,
}

/// LapReport is the externally observed output of one simulated lap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LapReport {
    pub lap: u32,
    pub weather: WeatherState,
    pub track_temp: f64,
    pub grip: f64,
    pub flag_state: FlagState,
    pub classification: Vec<ClassificationEntry>,
    pub events: Vec<RaceEvent>,
}

impl LapReport {
    /// Running competitors in classification order.
    pub fn running(&self) -> impl Iterator<Item = &ClassificationEntry> {
        self.classification.iter().filter(|e| e.dnf.is_none())
    }

    pub fn leader(&self) -> Option<&ClassificationEntry> {
        self.running().next()
    }

    /// Rendered event lines in chronological order.
    pub fn event_lines(&self) -> Vec<String> {
        self.events.iter().map(|e| e.to_string()).collect()
    }
}
