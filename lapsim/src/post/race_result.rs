use crate::core::competitor::Competitor;
use crate::core::weather::WeatherState;
use crate::interfaces::lap_report::RaceEvent;
use anyhow::Context;
use serde::Serialize;
use std::fmt::Write;
use std::io::Write as IoWrite;
use std::path::Path;

/// Fastest lap of the race.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct FastestLap {
    pub id: u32,
    pub lap: u32,
    pub laptime: f64,
}

/// ClassifiedCompetitor is one row of the final classification.
///
/// * `position` - Final position, retired competitors are classified behind all finishers
/// * `race_time` - (s) Elapsed time at the end of the last completed lap
/// * `gap_to_winner` - (s) Only set for finishers on the lead lap count
/// * `dnf` - Reason of the retirement (if retired)
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ClassifiedCompetitor {
    pub position: u32,
    pub id: u32,
    pub name: String,
    pub grid_position: u32,
    pub laps_completed: u32,
    pub race_time: f64,
    pub gap_to_winner: Option<f64>,
    pub best_laptime: Option<f64>,
    pub pit_stops: u32,
    pub overtakes: u32,
    pub dnf: Option<String>,
    pub points: u32,
}

/// RaceResult contains all race information that is required for post-processing the results.
///
/// `laptimes` and `racetimes` are indexed by roster index and lap (index 0 is the grid). Laps a
/// competitor did not complete are 0.0.
#[derive(Debug, Serialize, Clone)]
pub struct RaceResult {
    pub track_name: String,
    pub tot_no_laps: u32,
    pub seed: u64,
    pub classification: Vec<ClassifiedCompetitor>,
    pub fastest_lap: Option<FastestLap>,
    pub competitors: Vec<Competitor>,
    pub laptimes: Vec<Vec<f64>>,
    pub racetimes: Vec<Vec<f64>>,
    pub weather_history: Vec<WeatherState>,
    pub events: Vec<RaceEvent>,
}

impl RaceResult {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        track_name: &str,
        tot_no_laps: u32,
        seed: u64,
        competitors: &[Competitor],
        points_table: &[u32],
        fastest_lap_bonus: u32,
        fastest_lap: Option<FastestLap>,
        laptimes: Vec<Vec<f64>>,
        racetimes: Vec<Vec<f64>>,
        weather_history: Vec<WeatherState>,
        events: Vec<RaceEvent>,
    ) -> RaceResult {
        let classification =
            classify_final(competitors, points_table, fastest_lap.as_ref(), fastest_lap_bonus);

        RaceResult {
            track_name: track_name.to_owned(),
            tot_no_laps,
            seed,
            classification,
            fastest_lap,
            competitors: competitors.to_vec(),
            laptimes,
            racetimes,
            weather_history,
            events,
        }
    }

    pub fn winner(&self) -> Option<&ClassifiedCompetitor> {
        self.classification.first().filter(|c| c.dnf.is_none())
    }

    pub fn points_of(&self, id: u32) -> u32 {
        self.classification
            .iter()
            .find(|c| c.id == id)
            .map_or(0, |c| c.points)
    }

    // ---------------------------------------------------------------------------------------------
    // TEXT OUTPUT ---------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    fn format_lap_and_race_times(&self) -> Result<String, std::fmt::Error> {
        let no_comps = self.competitors.len();
        let mut tmp_string_laptime = String::new();
        let mut tmp_string_racetime = String::new();

        for lap in 1..self.tot_no_laps as usize + 1 {
            write!(&mut tmp_string_laptime, "{:3}, ", lap)?;
            write!(&mut tmp_string_racetime, "{:3}, ", lap)?;

            for i in 0..no_comps {
                let sep = if i < no_comps - 1 { ", " } else { "\n" };
                write!(&mut tmp_string_laptime, "{:8.3}s{}", self.laptimes[i][lap], sep)?;
                write!(&mut tmp_string_racetime, "{:8.3}s{}", self.racetimes[i][lap], sep)?;
            }
        }

        let header = self
            .competitors
            .iter()
            .map(|c| format!("{:3} ({})", c.id, c.name))
            .collect::<Vec<String>>()
            .join(", ");

        let mut content = String::new();
        writeln!(&mut content, "RESULT: Lap times")?;
        writeln!(&mut content, "lap, {}", header)?;
        writeln!(&mut content, "{}", tmp_string_laptime)?;
        writeln!(&mut content, "RESULT: Race times")?;
        writeln!(&mut content, "lap, {}", header)?;
        writeln!(&mut content, "{}", tmp_string_racetime)?;
        Ok(content)
    }

    fn format_classification(&self) -> Result<String, std::fmt::Error> {
        let mut content = String::new();
        writeln!(&mut content, "RESULT: Classification ({}, {} laps)", self.track_name, self.tot_no_laps)?;
        for entry in self.classification.iter() {
            let status = match (&entry.dnf, entry.gap_to_winner) {
                (Some(reason), _) => format!("DNF ({})", reason),
                (None, Some(gap)) if gap > 0.0 => format!("+{:.3}s", gap),
                (None, Some(_)) => format!("{:.3}s", entry.race_time),
                (None, None) => format!("{} laps", entry.laps_completed),
            };
            writeln!(
                &mut content,
                "P{:<2} #{:<3} {:<20} {:>14}  {:2} pts",
                entry.position, entry.id, entry.name, status, entry.points
            )?;
        }
        if let Some(fl) = self.fastest_lap.as_ref() {
            writeln!(&mut content, "Fastest lap: #{} with {:.3}s on lap {}", fl.id, fl.laptime, fl.lap)?;
        }
        Ok(content)
    }

    /// print_lap_and_race_times prints the resulting lap and race times to the console output.
    pub fn print_lap_and_race_times(&self) -> anyhow::Result<()> {
        print!("{}", self.format_lap_and_race_times()?);
        Ok(())
    }

    /// print_classification prints the final classification including points.
    pub fn print_classification(&self) -> anyhow::Result<()> {
        print!("{}", self.format_classification()?);
        Ok(())
    }

    /// write_lap_and_race_times_to_file writes lap and race times to a text file (default
    /// output/last_run.txt). Returns the path to the written file.
    pub fn write_lap_and_race_times_to_file(&self, path: Option<&Path>) -> anyhow::Result<String> {
        let content = self.format_lap_and_race_times()?;

        let out_path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let out_dir = Path::new("output");
                std::fs::create_dir_all(out_dir).context("Failed to create output directory!")?;
                out_dir.join("last_run.txt")
            }
        };
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&out_path)
            .context(format!("Failed to open output file {}!", out_path.display()))?;
        file.write_all(content.as_bytes())?;
        file.flush()?;

        Ok(out_path.to_string_lossy().into_owned())
    }

    // ---------------------------------------------------------------------------------------------
    // EXPORTS -------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// write_classification_csv writes one row per classified competitor.
    pub fn write_classification_csv(&self, path: &Path) -> anyhow::Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .context(format!("Failed to create CSV file {}!", path.display()))?;
        for entry in self.classification.iter() {
            writer
                .serialize(entry)
                .context(format!("Failed to write CSV file {}!", path.display()))?;
        }
        writer.flush()?;
        Ok(())
    }

    /// write_json writes the complete result including competitor records and events.
    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let fh = std::fs::OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(path)
            .context(format!("Failed to open JSON file {}!", path.display()))?;
        serde_json::to_writer_pretty(&fh, self)
            .context(format!("Failed to write JSON file {}!", path.display()))?;
        Ok(())
    }
}

/// classify_final orders finishers by position and appends the retired competitors (more laps
/// completed first, later retirement order by last position). Points follow the points table, the
/// fastest-lap bonus is only awarded to a finisher classified within the length of the table.
fn classify_final(
    competitors: &[Competitor],
    points_table: &[u32],
    fastest_lap: Option<&FastestLap>,
    fastest_lap_bonus: u32,
) -> Vec<ClassifiedCompetitor> {
    let mut finishers: Vec<&Competitor> = competitors.iter().filter(|c| !c.is_dnf()).collect();
    finishers.sort_by_key(|c| c.timing.position);

    let mut dnfs: Vec<&Competitor> = competitors.iter().filter(|c| c.is_dnf()).collect();
    dnfs.sort_by(|a, b| {
        b.timing
            .laps_completed
            .cmp(&a.timing.laps_completed)
            .then(a.timing.position.cmp(&b.timing.position))
    });

    let winner_time = finishers.first().map(|c| c.timing.elapsed);

    finishers
        .iter()
        .chain(dnfs.iter())
        .enumerate()
        .map(|(i, comp)| {
            let position = i as u32 + 1;
            let finished = !comp.is_dnf();

            let mut points = 0;
            if finished {
                if let Some(&table_points) = points_table.get(i) {
                    points = table_points;
                    if fastest_lap.map_or(false, |fl| fl.id == comp.id) {
                        points += fastest_lap_bonus;
                    }
                }
            }

            ClassifiedCompetitor {
                position,
                id: comp.id,
                name: comp.name.to_owned(),
                grid_position: comp.timing.grid_position,
                laps_completed: comp.timing.laps_completed,
                race_time: comp.timing.elapsed,
                gap_to_winner: match (finished, winner_time) {
                    (true, Some(t)) => Some(comp.timing.elapsed - t),
                    _ => None,
                },
                best_laptime: comp.timing.best_laptime,
                pit_stops: comp.stats.pit_stops,
                overtakes: comp.stats.overtakes_made,
                dnf: comp.dnf_reason().map(|r| r.to_string()),
                points,
            }
        })
        .collect()
}
