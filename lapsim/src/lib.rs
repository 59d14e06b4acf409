//! Lap-discrete race simulation core.
//!
//! A race is advanced one lap at a time by [`core::race::Race::simulate_lap`]. Every lap runs the
//! subsystems in a fixed order (weather, control inbox, resources, performance, classification,
//! duels, incidents, strategy, classification) and produces a [`interfaces::lap_report::LapReport`].
//! [`core::handle_race::handle_race`] wraps the complete race including an optional qualifying
//! session and returns a [`post::race_result::RaceResult`].

pub mod error;

pub mod core {
    pub mod car;
    pub mod competitor;
    pub mod driver;
    pub mod duel;
    pub mod handle_race;
    pub mod incidents;
    pub mod performance;
    pub mod race;
    pub mod rng;
    pub mod sim_constants;
    pub mod strategy;
    pub mod tireset;
    pub mod track;
    pub mod weather;
}

pub mod interfaces {
    pub mod control;
    pub mod lap_report;
}

pub mod post {
    pub mod race_result;
}

pub mod pre {
    pub mod read_sim_pars;
    pub mod sim_opts;
}
