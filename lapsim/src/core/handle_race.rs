use crate::core::race::Race;
use crate::core::sim_constants::SimConstants;
use crate::interfaces::lap_report::LapReport;
use crate::post::race_result::RaceResult;
use crate::pre::read_sim_pars::SimPars;
use anyhow::Context;
use flume::Sender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::sleep;
use std::time::{Duration, Instant};

/// Wall-clock duration (ms) of one lap at a real-time factor of 1.0.
pub const LAP_DURATION_MS: f64 = 1000.0;

/// handle_race creates and simulates a race on the basis of the inserted parameters, and returns
/// the results for post-processing.
///
/// * `tx` - If set, every lap report is sent through the channel and the race is paced by
///   `realtime_factor` (laps per second)
/// * `cancel` - Checked after every lap, the race stops early once it is set
pub fn handle_race(
    sim_pars: &SimPars,
    sim_consts: &SimConstants,
    tx: Option<&Sender<LapReport>>,
    cancel: Option<Arc<AtomicBool>>,
    realtime_factor: f64,
) -> anyhow::Result<RaceResult> {
    let mut race = create_race(sim_pars, sim_consts)?;
    run_race(&mut race, tx, cancel, realtime_factor)?;
    Ok(race.get_race_result())
}

/// create_race resolves the track and sets up the race. Configuration errors are returned before
/// the first lap.
pub fn create_race(sim_pars: &SimPars, sim_consts: &SimConstants) -> anyhow::Result<Race> {
    let track = sim_pars.resolve_track()?;
    let race = Race::new(
        &sim_pars.race_pars,
        track,
        &sim_pars.competitors,
        sim_consts.to_owned(),
    )
    .context("Failed to set up race!")?;
    Ok(race)
}

/// run_race simulates the remaining laps of an existing race, e.g. one whose control senders were
/// handed out to interactive players beforehand.
pub fn run_race(
    race: &mut Race,
    tx: Option<&Sender<LapReport>>,
    cancel: Option<Arc<AtomicBool>>,
    realtime_factor: f64,
) -> anyhow::Result<()> {
    while !race.is_finished() {
        let t_start = Instant::now();

        let report = match race.simulate_lap() {
            Some(report) => report,
            None => break,
        };

        if let Some(tx) = tx {
            tx.send(report).context("Failed to send lap report!")?;

            // sleep until the lap is finished in real-time as well (calculation in ms)
            if realtime_factor > 0.0 {
                let t_sleep = (LAP_DURATION_MS / realtime_factor) as i64
                    - t_start.elapsed().as_millis() as i64;
                if t_sleep > 0 {
                    sleep(Duration::from_millis(t_sleep as u64));
                }
            }
        }

        if cancel.as_ref().map_or(false, |c| c.load(Ordering::Relaxed)) {
            log::info!("Race cancelled after lap {}", race.state.cur_lap);
            break;
        }
    }

    Ok(())
}
