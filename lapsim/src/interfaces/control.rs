use crate::core::car::{EngineMode, ErsMode};
use crate::core::tireset::TireCompound;
use serde::{Deserialize, Serialize};

/// Commands an interactive competitor accepts.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ControlCommand {
    /// Pit at the end of the lap, `None` lets the pit crew choose the compound
    RequestPit { compound: Option<TireCompound> },
    SetPush { level: f64 },
    SetFuelMix { level: f64 },
    SetErsMode { mode: ErsMode },
    SetEngineMode { mode: EngineMode },
}

impl ControlCommand {
    /// Returns false for commands with values outside their range.
    pub fn is_well_formed(&self) -> bool {
        match self {
            ControlCommand::SetPush { level } | ControlCommand::SetFuelMix { level } => {
                level.is_finite() && (0.0..=100.0).contains(level)
            }
            _ => true,
        }
    }
}

/// Envelope of a command.
///
/// * `lap` - Lap the command is meant for, `None` applies it at the next opportunity. Commands for
/// an already started lap are stale and dropped, commands for a later lap are held back.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ControlMessage {
    #[serde(default)]
    pub lap: Option<u32>,
    #[serde(flatten)]
    pub command: ControlCommand,
}

impl ControlMessage {
    pub fn now(command: ControlCommand) -> ControlMessage {
        ControlMessage { lap: None, command }
    }

    pub fn for_lap(lap: u32, command: ControlCommand) -> ControlMessage {
        ControlMessage { lap: Some(lap), command }
    }
}

/// Sending half of an interactive competitor's inbox.
pub type ControlSender = flume::Sender<ControlMessage>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_levels_are_detected() {
        assert!(ControlCommand::SetPush { level: 75.0 }.is_well_formed());
        assert!(!ControlCommand::SetPush { level: 120.0 }.is_well_formed());
        assert!(!ControlCommand::SetFuelMix { level: f64::NAN }.is_well_formed());
        assert!(ControlCommand::RequestPit { compound: None }.is_well_formed());
    }

    #[test]
    fn messages_parse_from_json() {
        let msg: ControlMessage =
            serde_json::from_str(r#"{"lap": 7, "command": "request_pit", "compound": "hard"}"#)
                .unwrap();
        assert_eq!(
            msg,
            ControlMessage::for_lap(7, ControlCommand::RequestPit { compound: Some(TireCompound::Hard) })
        );

        let msg: ControlMessage =
            serde_json::from_str(r#"{"command": "set_ers_mode", "mode": "deploy"}"#).unwrap();
        assert_eq!(msg, ControlMessage::now(ControlCommand::SetErsMode { mode: ErsMode::Deploy }));
    }
}
