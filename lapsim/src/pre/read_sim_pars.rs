use crate::core::competitor::CompetitorPars;
use crate::core::race::RacePars;
use crate::core::sim_constants::SimConstants;
use crate::core::track::{Track, TrackPars};
use crate::error::SimResult;
use anyhow::Context;
use serde::Deserialize;
use std::fs::OpenOptions;
use std::path::Path;

/// SimPars is used to store all other parameter structs.
///
/// * `track_pars` - Optional track definition, used instead of the built-in table if its name
///   matches `race_pars.track_name`
#[derive(Debug, Deserialize, Clone)]
pub struct SimPars {
    pub race_pars: RacePars,
    #[serde(default)]
    pub track_pars: Option<TrackPars>,
    pub competitors: Vec<CompetitorPars>,
}

impl SimPars {
    /// resolve_track returns the scenario's own track if it carries one with the requested name
    /// and looks up the built-in table otherwise.
    pub fn resolve_track(&self) -> SimResult<Track> {
        match &self.track_pars {
            Some(track_pars)
                if track_pars.name.trim().eq_ignore_ascii_case(self.race_pars.track_name.trim()) =>
            {
                Ok(Track::new(track_pars))
            }
            _ => Track::lookup(&self.race_pars.track_name),
        }
    }
}

/// read_sim_pars reads the JSON file and decodes the JSON string into the simulation parameters
/// struct.
pub fn read_sim_pars(filepath: &Path) -> anyhow::Result<SimPars> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!("Failed to open parameter file {}!", filepath.display()))?;
    let pars = serde_json::from_reader(&fh)
        .context(format!("Failed to parse parameter file {}!", filepath.display()))?;
    Ok(pars)
}

/// Read simulation constants from a JSON file. Constants missing in the file keep their defaults.
pub fn read_sim_constants(filepath: &Path) -> anyhow::Result<SimConstants> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!(
            "Failed to open simulation constants file {}!",
            filepath.display()
        ))?;
    let consts = serde_json::from_reader(&fh).context(format!(
        "Failed to parse simulation constants file {}!",
        filepath.display()
    ))?;
    Ok(consts)
}
