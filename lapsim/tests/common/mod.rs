#![allow(dead_code)]

use lapsim::core::car::CarPars;
use lapsim::core::competitor::CompetitorPars;
use lapsim::core::driver::DriverPars;
use lapsim::core::race::{default_points_table, Race, RacePars};
use lapsim::core::sim_constants::SimConstants;
use lapsim::core::tireset::TireCompound;
use lapsim::core::track::Track;
use lapsim::core::weather::WeatherState;

pub fn competitor(id: u32, skill: f64, car: f64) -> CompetitorPars {
    CompetitorPars {
        id,
        name: format!("Driver {}", id),
        autonomous: true,
        driver: DriverPars::uniform(skill),
        car: CarPars::uniform(car),
        grid_position: None,
        start_compound: Some(TireCompound::Medium),
        start_fuel: 100.0,
    }
}

pub fn field(n: u32) -> Vec<CompetitorPars> {
    (1..=n)
        .map(|id| competitor(id, 40.0 + 5.0 * (id % 10) as f64, 60.0 - 3.0 * (id % 7) as f64))
        .collect()
}

pub fn race_pars(track_name: &str, laps: u32, seed: u64) -> RacePars {
    RacePars {
        track_name: track_name.to_owned(),
        tot_no_laps: laps,
        seed,
        initial_weather: WeatherState::Clear,
        forecast: None,
        qualifying: false,
        points_table: default_points_table(),
        fastest_lap_bonus: 1,
    }
}

pub fn dry_forecast(laps: u32) -> Option<Vec<WeatherState>> {
    Some(vec![WeatherState::Clear; laps as usize + 1])
}

pub fn new_race(pars: &RacePars, comps: &[CompetitorPars]) -> Race {
    let track = Track::lookup(&pars.track_name).expect("known track");
    Race::new(pars, track, comps, SimConstants::default()).expect("valid race configuration")
}
