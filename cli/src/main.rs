use anyhow::Context;
use clap::Parser;
use lapsim::core::handle_race::handle_race;
use lapsim::core::sim_constants::SimConstants;
use lapsim::interfaces::lap_report::LapReport;
use lapsim::post::race_result::RaceResult;
use lapsim::pre::read_sim_pars::{read_sim_constants, read_sim_pars, SimPars};
use lapsim::pre::sim_opts::SimOpts;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::thread;
use std::time::Instant;

/// Per-competitor statistics over many simulation runs.
#[derive(Debug, Default)]
struct Tally {
    name: String,
    wins: u32,
    podiums: u32,
    dnfs: u32,
    points: u32,
}

fn print_lap_report(report: &LapReport) {
    let leader = report.leader().map_or("-", |e| e.name.as_str());
    println!(
        "Lap {:3} | {:?} | {} | track {:.1}°C, grip {:.0}% | leader {}",
        report.lap, report.flag_state, report.weather, report.track_temp, report.grip, leader
    );
    for line in report.event_lines() {
        println!("        {}", line);
    }
}

/// run_single simulates one race in a separate thread and prints the lap reports while they
/// arrive.
fn run_single(sim_pars: SimPars, sim_consts: SimConstants, realtime_factor: f64) -> anyhow::Result<RaceResult> {
    let (tx, rx) = flume::unbounded();

    let handle = thread::spawn(move || handle_race(&sim_pars, &sim_consts, Some(&tx), None, realtime_factor));

    for report in rx.iter() {
        print_lap_report(&report);
    }

    handle
        .join()
        .map_err(|_| anyhow::anyhow!("Simulation thread panicked!"))?
}

/// run_many simulates `no_sim_runs` races with consecutive seeds in parallel and tallies the
/// results per competitor.
fn run_many(sim_pars: &SimPars, sim_consts: &SimConstants, no_sim_runs: u32) -> anyhow::Result<()> {
    let base_seed = sim_pars.race_pars.seed;

    let results = (0..no_sim_runs as u64)
        .into_par_iter()
        .map(|i| {
            let mut pars = sim_pars.clone();
            pars.race_pars.seed = base_seed.wrapping_add(i);
            handle_race(&pars, sim_consts, None, None, 0.0)
        })
        .collect::<anyhow::Result<Vec<RaceResult>>>()?;

    let mut tallies: BTreeMap<u32, Tally> = BTreeMap::new();
    for result in results.iter() {
        for entry in result.classification.iter() {
            let tally = tallies.entry(entry.id).or_default();
            tally.name = entry.name.to_owned();
            tally.points += entry.points;
            if entry.dnf.is_some() {
                tally.dnfs += 1;
            } else {
                if entry.position == 1 {
                    tally.wins += 1;
                }
                if entry.position <= 3 {
                    tally.podiums += 1;
                }
            }
        }
    }

    let mut rows: Vec<(&u32, &Tally)> = tallies.iter().collect();
    rows.sort_by(|a, b| b.1.points.cmp(&a.1.points).then(a.0.cmp(b.0)));

    println!("RESULT: Statistics over {} runs (seeds {}..{})", no_sim_runs, base_seed, base_seed.wrapping_add(no_sim_runs as u64));
    println!("{:>4}  {:<20} {:>7} {:>7} {:>7} {:>8}", "id", "name", "wins", "podiums", "dnfs", "avg pts");
    for (id, tally) in rows {
        println!(
            "{:>4}  {:<20} {:>7} {:>7} {:>7} {:>8.2}",
            id,
            tally.name,
            tally.wins,
            tally.podiums,
            tally.dnfs,
            tally.points as f64 / no_sim_runs as f64
        );
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    // PRE-PROCESSING ------------------------------------------------------------------------------
    // get simulation options from the command line arguments
    let sim_opts: SimOpts = SimOpts::parse();

    let default_filter = if sim_opts.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    // get simulation parameters
    log::info!("Reading simulation parameters from {:?}", sim_opts.parfile_path);
    let mut sim_pars = read_sim_pars(&sim_opts.parfile_path)?;
    if let Some(seed) = sim_opts.seed {
        sim_pars.race_pars.seed = seed;
    }
    if sim_opts.qualifying {
        sim_pars.race_pars.qualifying = true;
    }

    let sim_consts = match &sim_opts.constants_path {
        Some(path) => {
            log::info!("Reading simulation constants from {:?}", path);
            read_sim_constants(path)?
        }
        None => SimConstants::default(),
    };

    log::info!(
        "Simulating {} laps at {} with {} competitors",
        sim_pars.race_pars.tot_no_laps,
        sim_pars.race_pars.track_name,
        sim_pars.competitors.len()
    );

    // EXECUTION -----------------------------------------------------------------------------------
    let t_start = Instant::now();

    if sim_opts.no_sim_runs > 1 {
        run_many(&sim_pars, &sim_consts, sim_opts.no_sim_runs)?;
        log::info!("Execution time: {}ms", t_start.elapsed().as_millis());
        return Ok(());
    }

    let race_result = run_single(sim_pars, sim_consts, sim_opts.realtime_factor)?;
    log::info!("Execution time: {}ms", t_start.elapsed().as_millis());

    // POST-PROCESSING -----------------------------------------------------------------------------
    race_result.print_classification()?;
    if sim_opts.debug {
        race_result.print_lap_and_race_times()?;
    }

    if let Some(path) = &sim_opts.csv_path {
        race_result
            .write_classification_csv(path)
            .context("Failed to export classification!")?;
        log::info!("Classification written to {:?}", path);
    }
    if let Some(path) = &sim_opts.json_path {
        race_result.write_json(path).context("Failed to export race result!")?;
        log::info!("Race result written to {:?}", path);
    }

    Ok(())
}
