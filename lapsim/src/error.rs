use thiserror::Error;

/// Configuration errors. They are detected while setting up a race and are always surfaced before
/// the first lap is simulated. In-race outcomes (DNFs, pit stops, contact) are never errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RaceError {
    #[error("Unknown track '{0}'")]
    UnknownTrack(String),

    #[error("Invalid number of laps: {0} (must be positive)")]
    InvalidLapCount(u32),

    #[error("At least two competitors are required, got {0}")]
    NotEnoughCompetitors(usize),

    #[error("Competitor id {0} is used more than once")]
    DuplicateCompetitor(u32),

    #[error("Invalid grid position {position} for competitor {id}")]
    InvalidGridPosition { id: u32, position: u32 },

    #[error("Weather forecast must contain {expected} entries (laps + 1), got {actual}")]
    ForecastLength { expected: usize, actual: usize },

    #[error("Attribute '{name}' of competitor {id} is {value}, expected a value in [0, 100]")]
    InvalidAttribute { id: u32, name: &'static str, value: f64 },
}

pub type SimResult<T> = Result<T, RaceError>;
