mod common;

use common::{field, new_race, race_pars};
use lapsim::core::competitor::DnfReason;
use lapsim::core::weather::WeatherState;
use lapsim::interfaces::lap_report::{LapReport, RaceEventKind};
use std::collections::HashMap;

fn run_to_end(track: &str, laps: u32, seed: u64, no_comps: u32) -> Vec<LapReport> {
    let mut race = new_race(&race_pars(track, laps, seed), &field(no_comps));
    let mut reports = Vec::new();
    while let Some(report) = race.simulate_lap() {
        reports.push(report);
    }
    reports
}

#[test]
fn running_positions_are_a_permutation() {
    for seed in 0..10 {
        for report in run_to_end("bahrain", 30, seed, 10) {
            let positions: Vec<u32> = report.running().map(|e| e.position).collect();
            let expected: Vec<u32> = (1..=positions.len() as u32).collect();
            assert_eq!(positions, expected, "seed {} lap {}", seed, report.lap);
        }
    }
}

#[test]
fn percentages_stay_in_range() {
    for seed in 0..10 {
        let mut pars = race_pars("spa", 25, seed);
        pars.initial_weather = WeatherState::Rain;
        let mut race = new_race(&pars, &field(8));

        while let Some(report) = race.simulate_lap() {
            for entry in report.classification.iter() {
                assert!((0.0..=100.0).contains(&entry.tire_condition));
                assert!((0.0..=100.0).contains(&entry.fuel));
                assert!((0.0..=100.0).contains(&entry.ers_charge));
            }
            for comp in race.competitors.iter() {
                assert!(
                    comp.pct_fields().iter().all(|v| (0.0..=100.0).contains(v)),
                    "seed {} lap {}: {} out of range",
                    seed,
                    report.lap,
                    comp.name
                );
            }
        }
    }
}

#[test]
fn pit_stops_reset_tires_and_cost_time() {
    let mut no_stops = 0;
    for seed in 0..6 {
        let mut race = new_race(&race_pars("bahrain", 40, seed), &field(8));
        while let Some(report) = race.simulate_lap() {
            for event in report.events.iter() {
                if let RaceEventKind::PitStop { duration, .. } = event.kind {
                    no_stops += 1;
                    assert!(duration > 0.0);

                    let id = event.cars[0];
                    let entry = report.classification.iter().find(|e| e.id == id).unwrap();
                    if entry.dnf.is_none() {
                        assert_eq!(entry.tire_age, 0);
                        assert_eq!(entry.tire_condition, 100.0);
                        assert!(entry.laptime > duration);
                    }
                }
            }
        }
    }
    assert!(no_stops > 0);
}

#[test]
fn retired_competitors_are_frozen() {
    for seed in 0..10 {
        let mut pars = race_pars("monaco", 40, seed);
        pars.initial_weather = WeatherState::HeavyRain;
        let mut race = new_race(&pars, &field(10));
        let mut frozen: HashMap<u32, (u32, u32, f64, [f64; 11])> = HashMap::new();

        while race.simulate_lap().is_some() {
            for comp in race.competitors.iter().filter(|c| c.is_dnf()) {
                let snapshot = (
                    comp.timing.position,
                    comp.timing.laps_completed,
                    comp.timing.last_laptime,
                    comp.pct_fields(),
                );
                let first = frozen.entry(comp.id).or_insert(snapshot);
                assert_eq!(*first, snapshot, "seed {}: {} changed after retiring", seed, comp.name);
            }
        }
    }
}

#[test]
fn same_seed_same_race() {
    let first = run_to_end("silverstone", 30, 99, 10);
    let second = run_to_end("silverstone", 30, 99, 10);
    assert_eq!(first, second);

    let other = run_to_end("silverstone", 30, 100, 10);
    assert_ne!(first, other);
}

#[test]
fn final_classification_puts_dnfs_last() {
    for seed in 0..10 {
        let mut pars = race_pars("singapore", 30, seed);
        pars.initial_weather = WeatherState::HeavyRain;
        let mut race = new_race(&pars, &field(10));
        while race.simulate_lap().is_some() {}
        let result = race.get_race_result();

        let positions: Vec<u32> = result.classification.iter().map(|c| c.position).collect();
        assert_eq!(positions, (1..=10).collect::<Vec<u32>>());

        let first_dnf = result.classification.iter().position(|c| c.dnf.is_some());
        if let Some(first_dnf) = first_dnf {
            assert!(result.classification[first_dnf..].iter().all(|c| c.dnf.is_some()));
            assert!(result.classification[first_dnf..].iter().all(|c| c.points == 0));
        }
        assert!(result
            .competitors
            .iter()
            .all(|c| c.dnf_reason() != Some(DnfReason::SimulationFault)));
    }
}
