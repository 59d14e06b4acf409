use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser, Clone)]
#[clap(
    version = "0.1.0",
    name = "lapsim",
    about = "A lap-discrete motorsport race simulator written in Rust"
)]
pub struct SimOpts {
    // FLAGS ---------------------------------------------------------------------------------------
    /// Activate debug logging (RUST_LOG takes precedence)
    #[clap(short, long)]
    pub debug: bool,

    /// Determine the grid by a qualifying session (overrides the parameter file)
    #[clap(short, long)]
    pub qualifying: bool,

    // OPTIONS -------------------------------------------------------------------------------------
    /// Set path to the race scenario parameter file
    #[clap(short, long)]
    pub parfile_path: PathBuf,

    /// Set path to a simulation constants file (OPTIONAL: defaults are used if not set)
    #[clap(short, long)]
    pub constants_path: Option<PathBuf>,

    /// Set the master seed (overrides the parameter file)
    #[clap(short, long)]
    pub seed: Option<u64>,

    /// Set number of simulation runs, more than one run prints statistics over seeds seed..seed+N
    #[clap(short, long, default_value = "1")]
    pub no_sim_runs: u32,

    /// Set real-time factor in laps per second for the lap report stream (0 disables pacing)
    #[clap(short, long, default_value = "0.0")]
    pub realtime_factor: f64,

    /// Write the final classification of a single run to a CSV file
    #[clap(long)]
    pub csv_path: Option<PathBuf>,

    /// Write the complete result of a single run to a JSON file
    #[clap(long)]
    pub json_path: Option<PathBuf>,
}
