use crate::core::car::{update_brakes, update_engine, update_ers, update_fuel};
use crate::core::competitor::{Competitor, CompetitorIdx, CompetitorPars, DnfReason};
use crate::core::duel::{resolve_duels, update_duel_states, update_following_flags};
use crate::core::incidents::{roll_incidents, Caution};
use crate::core::performance::{
    calc_laptime, drive_performance_score, qualifying_laptime, score_jitter,
};
use crate::core::rng::{RngBank, RngStream};
use crate::core::sim_constants::SimConstants;
use crate::core::strategy::{perform_pitstop, CommandQueueStrategy, RuleBasedStrategy, Strategy};
use crate::core::tireset::{update_tire_temperature, update_tire_wear, TireCompound};
use crate::core::track::Track;
use crate::core::weather::{generate_forecast, TrackCondition, WeatherState};
use crate::error::{RaceError, SimResult};
use crate::interfaces::control::ControlSender;
use crate::interfaces::lap_report::{ClassificationEntry, LapReport, RaceEvent, RaceEventKind};
use crate::post::race_result::{FastestLap, RaceResult};
use helpers::general::{argsort, clamp_pct, SortOrder};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// * `track_name` - Name of the track (built-in table or `track_pars` of the scenario)
/// * `tot_no_laps` - Total number of laps
/// * `seed` - Master seed of all random draws of the race
/// * `initial_weather` - Weather on the grid, the forecast is drawn from it
/// * `forecast` - Optional fixed forecast of length `tot_no_laps + 1` (replaces the drawn one)
/// * `qualifying` - Determine the grid by a qualifying session instead of the input
/// * `points_table` - Points for P1, P2, ...
/// * `fastest_lap_bonus` - Bonus point(s) for the fastest lap if scored within the points
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RacePars {
    pub track_name: String,
    pub tot_no_laps: u32,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub initial_weather: WeatherState,
    #[serde(default)]
    pub forecast: Option<Vec<WeatherState>>,
    #[serde(default)]
    pub qualifying: bool,
    #[serde(default = "default_points_table")]
    pub points_table: Vec<u32>,
    #[serde(default = "default_fastest_lap_bonus")]
    pub fastest_lap_bonus: u32,
}

pub fn default_points_table() -> Vec<u32> {
    vec![25, 18, 15, 12, 10, 8, 6, 4, 2, 1]
}

fn default_fastest_lap_bonus() -> u32 {
    1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FlagState {
    G,   // green
    Vsc, // virtual safety car
    Sc,  // safety car
    C,   // chequered
}

impl Default for FlagState {
    fn default() -> Self {
        FlagState::G
    }
}

/// Read-only view of the conditions of the lap that is being simulated. It is handed to every
/// subsystem.
#[derive(Debug, Clone)]
pub struct LapContext<'a> {
    pub track: &'a Track,
    pub lap: u32,
    pub tot_no_laps: u32,
    pub weather: WeatherState,
    pub track_temp: f64,
    pub grip: f64,
    pub flag: FlagState,
    pub drs_enabled: bool,
}

impl<'a> LapContext<'a> {
    pub fn caution(&self) -> bool {
        matches!(self.flag, FlagState::Sc | FlagState::Vsc)
    }

    /// Laps left after the current one.
    pub fn laps_remaining(&self) -> u32 {
        self.tot_no_laps.saturating_sub(self.lap)
    }
}

/// Active caution period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CautionPeriod {
    pub kind: Caution,
    pub laps_left: u32,
}

/// RaceState contains the race-wide state that changes from lap to lap.
///
/// * `cur_lap` - Last simulated lap (0 before the start)
/// * `forecast` - Weather per lap, index 0 is the grid
/// * `caution` - Active caution period
/// * `pending_caution` - Caution called for by incidents of the last lap, deployed with the next one
/// * `events` - Events of the last simulated lap
#[derive(Debug, Clone, Serialize)]
pub struct RaceState {
    pub cur_lap: u32,
    pub tot_no_laps: u32,
    pub forecast: Vec<WeatherState>,
    pub weather: WeatherState,
    pub track_cond: TrackCondition,
    pub flag_state: FlagState,
    pub caution: Option<CautionPeriod>,
    pub pending_caution: Option<Caution>,
    pub drs_enabled: bool,
    pub events: Vec<RaceEvent>,
}

pub struct Race {
    pub state: RaceState,
    pub track: Track,
    pub consts: SimConstants,
    pub competitors: Vec<Competitor>,
    points_table: Vec<u32>,
    fastest_lap_bonus: u32,
    strategies: Vec<Box<dyn Strategy>>,
    control_senders: HashMap<u32, ControlSender>,
    rng_bank: RngBank,
    /// Running competitors in classification order
    order: Vec<CompetitorIdx>,
    pub laptimes: Vec<Vec<f64>>,
    pub racetimes: Vec<Vec<f64>>,
    pub qualifying_times: Option<Vec<(u32, f64)>>,
    fastest_lap: Option<FastestLap>,
    all_events: Vec<RaceEvent>,
}

impl Race {
    /// new sets up a race. All configuration errors are detected here, i.e. before the first lap.
    pub fn new(
        race_pars: &RacePars,
        track: Track,
        competitor_pars: &[CompetitorPars],
        consts: SimConstants,
    ) -> SimResult<Race> {
        // CHECK CONFIGURATION ---------------------------------------------------------------------
        if race_pars.tot_no_laps == 0 {
            return Err(RaceError::InvalidLapCount(race_pars.tot_no_laps));
        }
        if competitor_pars.len() < 2 {
            return Err(RaceError::NotEnoughCompetitors(competitor_pars.len()));
        }
        let mut ids = HashSet::with_capacity(competitor_pars.len());
        for pars in competitor_pars.iter() {
            if !ids.insert(pars.id) {
                return Err(RaceError::DuplicateCompetitor(pars.id));
            }
            pars.validate()?;
        }
        let grid = determine_input_grid(competitor_pars)?;

        let rng_bank = RngBank::new(race_pars.seed);
        let mut weather_rng = rng_bank.for_lap(RngStream::Weather, 0);
        let forecast = match &race_pars.forecast {
            Some(forecast) => {
                let expected = race_pars.tot_no_laps as usize + 1;
                if forecast.len() != expected {
                    return Err(RaceError::ForecastLength {
                        expected,
                        actual: forecast.len(),
                    });
                }
                forecast.to_owned()
            }
            None => generate_forecast(race_pars.tot_no_laps, race_pars.initial_weather, &mut weather_rng),
        };
        let weather = forecast[0];
        let track_temp = weather.sample_track_temp(&mut weather_rng);

        // CREATE COMPETITORS AND STRATEGIES -------------------------------------------------------
        let no_comps = competitor_pars.len();
        let mut competitors = Vec::with_capacity(no_comps);
        let mut strategies: Vec<Box<dyn Strategy>> = Vec::with_capacity(no_comps);
        let mut control_senders = HashMap::new();

        for (pars, &grid_position) in competitor_pars.iter().zip(grid.iter()) {
            let start_compound = pars.start_compound.unwrap_or_else(|| {
                TireCompound::required_for(weather).unwrap_or(TireCompound::Medium)
            });
            competitors.push(Competitor::new(pars, grid_position, start_compound));

            if pars.autonomous {
                let points_positions = race_pars.points_table.len() as u32;
                strategies.push(Box::new(RuleBasedStrategy::new(points_positions)));
            } else {
                let (tx, rx) = flume::unbounded();
                control_senders.insert(pars.id, tx);
                strategies.push(Box::new(CommandQueueStrategy::new(rx)));
            }
        }

        let mut race = Race {
            state: RaceState {
                cur_lap: 0,
                tot_no_laps: race_pars.tot_no_laps,
                forecast,
                weather,
                track_cond: TrackCondition::new(weather, track_temp),
                flag_state: FlagState::G,
                caution: None,
                pending_caution: None,
                drs_enabled: false,
                events: Vec::new(),
            },
            track,
            consts,
            competitors,
            points_table: race_pars.points_table.to_owned(),
            fastest_lap_bonus: race_pars.fastest_lap_bonus,
            strategies,
            control_senders,
            rng_bank,
            order: Vec::new(),
            laptimes: vec![vec![0.0; race_pars.tot_no_laps as usize + 1]; no_comps],
            racetimes: vec![vec![0.0; race_pars.tot_no_laps as usize + 1]; no_comps],
            qualifying_times: None,
            fastest_lap: None,
            all_events: Vec::new(),
        };

        if race_pars.qualifying {
            race.run_qualifying();
        }
        race.order = argsort(
            &race.competitors.iter().map(|c| c.timing.grid_position).collect::<Vec<u32>>(),
            SortOrder::Ascending,
        );

        log::info!(
            "Race set up: {} laps at {}, {} competitors, seed {}",
            race.state.tot_no_laps,
            race.track.name,
            race.competitors.len(),
            race.rng_bank.master_seed()
        );

        Ok(race)
    }

    /// Returns the sender of the control inbox of an interactive competitor.
    pub fn control_sender(&self, id: u32) -> Option<ControlSender> {
        self.control_senders.get(&id).cloned()
    }

    pub fn master_seed(&self) -> u64 {
        self.rng_bank.master_seed()
    }

    /// run_qualifying sets one timed lap per competitor and orders the grid by it. Ties keep the
    /// submission order. Only called by `new`, i.e. before the first lap.
    fn run_qualifying(&mut self) {
        let mut rng = self.rng_bank.for_lap(RngStream::Qualifying, 0);
        let ctx = LapContext {
            track: &self.track,
            lap: 0,
            tot_no_laps: self.state.tot_no_laps,
            weather: self.state.weather,
            track_temp: self.state.track_cond.track_temp,
            grip: self.state.track_cond.effective_grip(),
            flag: FlagState::G,
            drs_enabled: false,
        };

        let laptimes: Vec<f64> = self
            .competitors
            .iter()
            .map(|comp| qualifying_laptime(comp, &ctx, &self.consts, &mut rng))
            .collect();

        let idxs_sorted = argsort(&laptimes, SortOrder::Ascending);
        let mut times = Vec::with_capacity(idxs_sorted.len());
        for (pos, &idx) in idxs_sorted.iter().enumerate() {
            let timing = &mut self.competitors[idx].timing;
            timing.grid_position = pos as u32 + 1;
            timing.position = pos as u32 + 1;
            times.push((self.competitors[idx].id, laptimes[idx]));
        }

        self.qualifying_times = Some(times);
    }

    pub fn is_finished(&self) -> bool {
        self.state.cur_lap >= self.state.tot_no_laps || self.order.is_empty()
    }

    // ---------------------------------------------------------------------------------------------
    // MAIN METHOD ---------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// simulate_lap advances the race by one lap. Returns `None` once the race is finished.
    pub fn simulate_lap(&mut self) -> Option<LapReport> {
        if self.is_finished() {
            return None;
        }
        let lap = self.state.cur_lap + 1;
        let mut events = Vec::new();

        // FLAGS AND WEATHER -----------------------------------------------------------------------
        self.begin_lap(lap, &mut events);

        let Race {
            state,
            track,
            consts,
            competitors,
            strategies,
            rng_bank,
            order,
            ..
        } = self;

        let ctx = LapContext {
            track,
            lap,
            tot_no_laps: state.tot_no_laps,
            weather: state.weather,
            track_temp: state.track_cond.track_temp,
            grip: state.track_cond.effective_grip(),
            flag: state.flag_state,
            drs_enabled: state.drs_enabled,
        };

        update_following_flags(competitors, order, &ctx, consts);

        // CONTROL INBOX ---------------------------------------------------------------------------
        for (comp, strategy) in competitors.iter_mut().zip(strategies.iter_mut()) {
            comp.pitted_this_lap = false;
            if !comp.is_dnf() {
                strategy.on_lap_start(comp, &ctx);
            }
        }

        // RESOURCES -------------------------------------------------------------------------------
        let mut rng = rng_bank.for_lap(RngStream::Resources, lap);
        competitors.iter_mut().for_each(|c| update_tire_temperature(c, &ctx, consts));
        competitors.iter_mut().for_each(|c| update_tire_wear(c, &ctx, consts));
        competitors.iter_mut().for_each(|c| update_fuel(c, &ctx, consts, &mut events));
        competitors.iter_mut().for_each(|c| update_ers(c, consts, &mut rng));
        competitors.iter_mut().for_each(|c| update_engine(c, &ctx, consts, &mut rng, &mut events));
        competitors.iter_mut().for_each(|c| update_brakes(c, &ctx, consts, &mut rng, &mut events));
        for comp in competitors.iter_mut().filter(|c| !c.is_dnf()) {
            comp.psyche.drive_lap(comp.push, &ctx.flag);
        }

        // PERFORMANCE AND LAP TIMES ---------------------------------------------------------------
        let mut rng = rng_bank.for_lap(RngStream::Performance, lap);
        for comp in competitors.iter_mut().filter(|c| !c.is_dnf()) {
            comp.dps = drive_performance_score(comp, &ctx, consts) + score_jitter(comp, consts, &mut rng);
            let laptime = calc_laptime(comp, &ctx, consts, comp.dps);
            comp.penalty_pending = 0.0;
            comp.record_lap(laptime, track.split_sectors(laptime));
        }

        *order = classify(competitors);

        // DUELS -----------------------------------------------------------------------------------
        let mut rng = rng_bank.for_lap(RngStream::Duel, lap);
        update_duel_states(competitors, order, consts);
        let duels = resolve_duels(competitors, order, &ctx, consts, &mut rng, &mut events);

        // INCIDENTS -------------------------------------------------------------------------------
        let mut rng = rng_bank.for_lap(RngStream::Incident, lap);
        let incident_caution = roll_incidents(competitors, &ctx, consts, &mut rng, &mut events);
        state.pending_caution = Caution::merge(
            state.pending_caution,
            Caution::merge(duels.caution, incident_caution),
        );

        // STRATEGY AND PIT STOPS ------------------------------------------------------------------
        let mut rng = rng_bank.for_lap(RngStream::Strategy, lap);
        for (comp, strategy) in competitors.iter_mut().zip(strategies.iter_mut()) {
            if comp.is_dnf() {
                continue;
            }
            if let Some(request) = strategy.on_lap_end(comp, &ctx, consts) {
                perform_pitstop(comp, request, &ctx, consts, &mut rng, &mut events);
            }
        }

        // FINISH LAP ------------------------------------------------------------------------------
        for comp in competitors.iter_mut() {
            if repair_invariants(comp) {
                events.push(RaceEvent::new(
                    lap,
                    vec![comp.id],
                    RaceEventKind::Retirement {
                        name: comp.name.to_owned(),
                        reason: DnfReason::SimulationFault,
                    },
                ));
            }
            comp.finish_lap(lap);
        }

        *order = classify(competitors);

        if let Some(&leader) = order.first() {
            competitors[leader].stats.laps_led += 1;
            competitors[leader].psyche.adjust_confidence(1.0);
        }

        self.end_lap(lap, &mut events);

        let report = self.lap_report(lap, events);
        log::debug!(
            "Lap {}/{} done: leader {}, {} events",
            lap,
            self.state.tot_no_laps,
            report.leader().map_or("-", |e| e.name.as_str()),
            report.events.len()
        );
        Some(report)
    }

    // ---------------------------------------------------------------------------------------------
    // LAP PHASES ----------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// begin_lap deploys pending caution periods and realizes the weather of the lap.
    fn begin_lap(&mut self, lap: u32, events: &mut Vec<RaceEvent>) {
        let state = &mut self.state;
        let consts = &self.consts;
        let mut rng = self.rng_bank.for_lap(RngStream::Weather, lap);

        match (state.pending_caution.take(), state.caution) {
            (Some(Caution::Sc), cur) if cur.map_or(true, |c| c.kind == Caution::Vsc) => {
                let laps = rng.int_inclusive(consts.sc_min_laps, consts.sc_max_laps);
                state.caution = Some(CautionPeriod { kind: Caution::Sc, laps_left: laps });
                log::info!("Lap {}: safety car deployed for {} laps", lap, laps);
                events.push(RaceEvent::new(lap, vec![], RaceEventKind::SafetyCarDeployed { laps }));
            }
            (Some(Caution::Vsc), None) => {
                let laps = rng.int_inclusive(consts.vsc_min_laps, consts.vsc_max_laps);
                state.caution = Some(CautionPeriod { kind: Caution::Vsc, laps_left: laps });
                log::info!("Lap {}: virtual safety car deployed for {} laps", lap, laps);
                events.push(RaceEvent::new(
                    lap,
                    vec![],
                    RaceEventKind::VirtualSafetyCarDeployed { laps },
                ));
            }
            _ => {}
        }

        state.flag_state = match state.caution {
            Some(CautionPeriod { kind: Caution::Sc, .. }) => FlagState::Sc,
            Some(CautionPeriod { kind: Caution::Vsc, .. }) => FlagState::Vsc,
            None => FlagState::G,
        };

        let weather = state.forecast.get(lap as usize).copied().unwrap_or(state.weather);
        if weather != state.weather {
            log::info!("Lap {}: weather changes from {} to {}", lap, state.weather, weather);
            events.push(RaceEvent::new(
                lap,
                vec![],
                RaceEventKind::WeatherChange { from: state.weather, to: weather },
            ));
        }
        state.weather = weather;
        let track_temp = weather.sample_track_temp(&mut rng);
        state.track_cond.update(weather, track_temp);

        let drs_enabled = lap >= consts.drs_enabled_from_lap && state.flag_state == FlagState::G;
        if drs_enabled && !state.drs_enabled {
            events.push(RaceEvent::new(lap, vec![], RaceEventKind::DrsEnabled));
        }
        state.drs_enabled = drs_enabled;
    }

    /// end_lap counts down the caution period, updates the lap tables and announces fastest laps
    /// and the finish.
    fn end_lap(&mut self, lap: u32, events: &mut Vec<RaceEvent>) {
        let state = &mut self.state;
        state.cur_lap = lap;

        if let Some(period) = state.caution.as_mut() {
            period.laps_left = period.laps_left.saturating_sub(1);
            if period.laps_left == 0 {
                let kind = match period.kind {
                    Caution::Sc => RaceEventKind::SafetyCarIn,
                    Caution::Vsc => RaceEventKind::VirtualSafetyCarEnded,
                };
                events.push(RaceEvent::new(lap, vec![], kind));
                state.caution = None;
            }
        }

        for (idx, comp) in self.competitors.iter().enumerate() {
            if comp.is_dnf() || comp.timing.laps_completed != lap {
                continue;
            }
            self.laptimes[idx][lap as usize] = comp.timing.last_laptime;
            self.racetimes[idx][lap as usize] = comp.timing.elapsed;

            let laptime = comp.timing.last_laptime;
            if self.fastest_lap.as_ref().map_or(true, |fl| laptime < fl.laptime) {
                self.fastest_lap = Some(FastestLap {
                    id: comp.id,
                    lap,
                    laptime,
                });
            }
        }

        if let Some(fl) = self.fastest_lap.as_ref().filter(|fl| fl.lap == lap) {
            if let Some(comp) = self.competitors.iter().find(|c| c.id == fl.id) {
                events.push(RaceEvent::new(
                    lap,
                    vec![comp.id],
                    RaceEventKind::FastestLap {
                        name: comp.name.to_owned(),
                        laptime: fl.laptime,
                    },
                ));
            }
        }

        if lap == state.tot_no_laps || self.order.is_empty() {
            state.flag_state = FlagState::C;
            for &idx in self.order.iter() {
                let comp = &self.competitors[idx];
                events.push(RaceEvent::new(
                    lap,
                    vec![comp.id],
                    RaceEventKind::Finish {
                        name: comp.name.to_owned(),
                        position: comp.timing.position,
                    },
                ));
            }
            log::info!("Race finished after {} laps", lap);
        }

        self.all_events.extend(events.iter().cloned());
    }

    fn lap_report(&mut self, lap: u32, events: Vec<RaceEvent>) -> LapReport {
        let mut idxs = self.order.clone();
        let mut dnfs: Vec<CompetitorIdx> =
            (0..self.competitors.len()).filter(|&i| self.competitors[i].is_dnf()).collect();
        dnfs.sort_by_key(|&i| self.competitors[i].timing.position);
        idxs.extend(dnfs);

        let classification = idxs
            .iter()
            .map(|&idx| {
                let comp = &self.competitors[idx];
                ClassificationEntry {
                    id: comp.id,
                    name: comp.name.to_owned(),
                    position: comp.timing.position,
                    gap_to_leader: comp.timing.gap_to_leader,
                    gap_to_front: comp.timing.gap_to_front,
                    laptime: comp.timing.last_laptime,
                    compound: comp.tires.compound,
                    tire_condition: comp.tires.condition,
                    tire_age: comp.tires.age,
                    fuel: comp.fuel.load,
                    ers_charge: comp.ers.charge,
                    ers_mode: comp.ers.mode,
                    drs: comp.drs_available,
                    dnf: comp.dnf_reason(),
                }
            })
            .collect();

        self.state.events = events.clone();

        LapReport {
            lap,
            weather: self.state.weather,
            track_temp: self.state.track_cond.track_temp,
            grip: self.state.track_cond.effective_grip(),
            flag_state: self.state.flag_state,
            classification,
            events,
        }
    }

    /// Running competitors in classification order.
    pub fn running_order(&self) -> &[CompetitorIdx] {
        &self.order
    }

    pub fn get_race_result(&self) -> RaceResult {
        RaceResult::new(
            &self.track.name,
            self.state.tot_no_laps,
            self.rng_bank.master_seed(),
            &self.competitors,
            &self.points_table,
            self.fastest_lap_bonus,
            self.fastest_lap.clone(),
            self.laptimes.clone(),
            self.racetimes.clone(),
            self.state.forecast.clone(),
            self.all_events.clone(),
        )
    }
}

// -------------------------------------------------------------------------------------------------
// HELPERS -----------------------------------------------------------------------------------------
// -------------------------------------------------------------------------------------------------

/// Grid positions given in the input, or the input order if none are given. Positions must either
/// be given for every competitor and form the set {1..N}, or for none.
fn determine_input_grid(competitor_pars: &[CompetitorPars]) -> SimResult<Vec<u32>> {
    let no_comps = competitor_pars.len() as u32;
    if competitor_pars.iter().all(|p| p.grid_position.is_none()) {
        return Ok((1..=no_comps).collect());
    }

    let mut taken = HashSet::with_capacity(competitor_pars.len());
    let mut grid = Vec::with_capacity(competitor_pars.len());
    for pars in competitor_pars.iter() {
        let position = pars.grid_position.unwrap_or(0);
        if position == 0 || position > no_comps || !taken.insert(position) {
            return Err(RaceError::InvalidGridPosition { id: pars.id, position });
        }
        grid.push(position);
    }
    Ok(grid)
}

/// classify orders the running competitors by elapsed time (grid position on ties), assigns the
/// positions 1..k and the gaps, and returns the roster indices in classification order. Retired
/// competitors keep their last position.
pub fn classify(comps: &mut [Competitor]) -> Vec<CompetitorIdx> {
    let running: Vec<CompetitorIdx> = (0..comps.len()).filter(|&i| !comps[i].is_dnf()).collect();
    let keys: Vec<(f64, u32)> = running
        .iter()
        .map(|&i| (comps[i].timing.elapsed, comps[i].timing.grid_position))
        .collect();
    let order: Vec<CompetitorIdx> = argsort(&keys, SortOrder::Ascending)
        .into_iter()
        .map(|k| running[k])
        .collect();

    let leader_elapsed = order.first().map_or(0.0, |&i| comps[i].timing.elapsed);
    let mut front_elapsed = leader_elapsed;
    for (pos, &idx) in order.iter().enumerate() {
        let timing = &mut comps[idx].timing;
        timing.position = pos as u32 + 1;
        timing.gap_to_leader = timing.elapsed - leader_elapsed;
        timing.gap_to_front = timing.elapsed - front_elapsed;
        front_elapsed = timing.elapsed;
        comps[idx].stats.positions_gained =
            comps[idx].timing.grid_position as i32 - comps[idx].timing.position as i32;
    }

    order
}

/// repair_invariants clamps the percentage fields of a running competitor. A competitor whose
/// timing or resource state is not finite cannot be repaired and is retired. Returns true in that
/// case.
pub fn repair_invariants(comp: &mut Competitor) -> bool {
    if comp.is_dnf() {
        return false;
    }

    let timing_ok = comp.timing.elapsed.is_finite() && comp.timing.last_laptime.is_finite();
    if !timing_ok || comp.pct_fields().iter().any(|v| !v.is_finite()) {
        log::warn!("{} (#{}) has a non-finite state and is retired", comp.name, comp.id);
        return comp.retire(DnfReason::SimulationFault);
    }

    if comp.pct_fields().iter().any(|v| !(0.0..=100.0).contains(v)) {
        log::warn!("{} (#{}) has percentage values out of range, clamping", comp.name, comp.id);
        comp.tires.condition = clamp_pct(comp.tires.condition);
        comp.fuel.load = clamp_pct(comp.fuel.load);
        comp.fuel.mix = clamp_pct(comp.fuel.mix);
        comp.ers.charge = clamp_pct(comp.ers.charge);
        comp.engine.wear = clamp_pct(comp.engine.wear);
        comp.brakes.condition = clamp_pct(comp.brakes.condition);
        comp.damage.total = clamp_pct(comp.damage.total);
        comp.psyche.focus = clamp_pct(comp.psyche.focus);
        comp.psyche.fatigue = clamp_pct(comp.psyche.fatigue);
        comp.psyche.confidence = clamp_pct(comp.psyche.confidence);
        comp.push = clamp_pct(comp.push);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::competitor::tests::test_pars;

    fn race_pars(laps: u32) -> RacePars {
        RacePars {
            track_name: "monza".to_owned(),
            tot_no_laps: laps,
            seed: 17,
            initial_weather: WeatherState::Clear,
            forecast: None,
            qualifying: false,
            points_table: default_points_table(),
            fastest_lap_bonus: 1,
        }
    }

    fn field(n: u32) -> Vec<CompetitorPars> {
        (1..=n).map(|id| test_pars(id, 50.0, 50.0)).collect()
    }

    fn new_race(pars: &RacePars, comps: &[CompetitorPars]) -> SimResult<Race> {
        Race::new(pars, Track::lookup(&pars.track_name)?, comps, SimConstants::default())
    }

    #[test]
    fn configuration_errors_are_detected() {
        assert_eq!(new_race(&race_pars(0), &field(3)).err(), Some(RaceError::InvalidLapCount(0)));
        assert_eq!(new_race(&race_pars(5), &field(1)).err(), Some(RaceError::NotEnoughCompetitors(1)));

        let mut comps = field(3);
        comps[2].id = 1;
        assert_eq!(new_race(&race_pars(5), &comps).err(), Some(RaceError::DuplicateCompetitor(1)));

        let mut comps = field(2);
        comps[0].grid_position = Some(1);
        assert_eq!(
            new_race(&race_pars(5), &comps).err(),
            Some(RaceError::InvalidGridPosition { id: 2, position: 0 })
        );

        let mut pars = race_pars(5);
        pars.forecast = Some(vec![WeatherState::Clear; 5]);
        assert_eq!(
            new_race(&pars, &field(2)).err(),
            Some(RaceError::ForecastLength { expected: 6, actual: 5 })
        );
    }

    #[test]
    fn grid_follows_input_positions() {
        let mut comps = field(3);
        comps[0].grid_position = Some(3);
        comps[1].grid_position = Some(1);
        comps[2].grid_position = Some(2);
        let race = new_race(&race_pars(5), &comps).unwrap();
        assert_eq!(race.running_order(), &[1, 2, 0]);
    }

    #[test]
    fn qualifying_orders_the_grid() {
        let mut comps = field(4);
        comps[3] = test_pars(4, 95.0, 95.0);
        let mut pars = race_pars(5);
        pars.qualifying = true;
        let race = new_race(&pars, &comps).unwrap();

        let times = race.qualifying_times.as_ref().unwrap();
        assert_eq!(times.len(), 4);
        assert_eq!(times[0].0, 4);
        assert!(times.windows(2).all(|w| w[0].1 <= w[1].1));
        assert_eq!(race.competitors[3].timing.grid_position, 1);
    }

    #[test]
    fn qualifying_grid_is_fixed_once_racing() {
        let mut pars = race_pars(6);
        pars.qualifying = true;
        let mut race = new_race(&pars, &field(5)).unwrap();
        let grid: Vec<u32> = race.competitors.iter().map(|c| c.timing.grid_position).collect();

        while race.simulate_lap().is_some() {}

        let after: Vec<u32> = race.competitors.iter().map(|c| c.timing.grid_position).collect();
        assert_eq!(grid, after);
        let times = race.qualifying_times.as_ref().unwrap();
        for (pos, (id, _)) in times.iter().enumerate() {
            let comp = race.competitors.iter().find(|c| c.id == *id).unwrap();
            assert_eq!(comp.timing.grid_position, pos as u32 + 1);
        }
    }

    #[test]
    fn race_runs_to_the_flag() {
        let mut race = new_race(&race_pars(8), &field(6)).unwrap();
        let mut no_reports = 0;
        let mut last_flag = FlagState::G;
        while let Some(report) = race.simulate_lap() {
            no_reports += 1;
            last_flag = report.flag_state;
            assert_eq!(report.lap, no_reports);
            assert_eq!(report.classification.len(), 6);
        }
        assert_eq!(no_reports, 8);
        assert_eq!(last_flag, FlagState::C);
        assert!(race.simulate_lap().is_none());
    }

    #[test]
    fn interactive_competitors_get_an_inbox() {
        let mut comps = field(3);
        comps[1].autonomous = false;
        let race = new_race(&race_pars(5), &comps).unwrap();
        assert!(race.control_sender(2).is_some());
        assert!(race.control_sender(1).is_none());
    }

    #[test]
    fn pending_safety_car_is_deployed_next_lap() {
        let mut race = new_race(&race_pars(20), &field(4)).unwrap();
        race.simulate_lap();
        race.state.pending_caution = Some(Caution::Sc);
        let report = race.simulate_lap().unwrap();
        assert_eq!(report.flag_state, FlagState::Sc);
        assert!(report
            .events
            .iter()
            .any(|e| matches!(e.kind, RaceEventKind::SafetyCarDeployed { .. })));
        assert!(!race.state.drs_enabled);
    }

    #[test]
    fn classify_assigns_contiguous_positions() {
        let mut comps: Vec<Competitor> = (1..=4)
            .map(|id| crate::core::competitor::tests::test_competitor(id, 50.0, 50.0))
            .collect();
        comps[0].timing.elapsed = 100.0;
        comps[1].timing.elapsed = 99.0;
        comps[2].timing.elapsed = 101.0;
        comps[3].retire(DnfReason::Crash);
        comps[3].timing.position = 4;

        let order = classify(&mut comps);
        assert_eq!(order, vec![1, 0, 2]);
        assert_eq!(comps[1].timing.position, 1);
        assert_eq!(comps[0].timing.position, 2);
        assert_eq!(comps[2].timing.position, 3);
        assert_eq!(comps[3].timing.position, 4);
        assert_eq!(comps[2].timing.gap_to_front, 1.0);
        assert_eq!(comps[2].timing.gap_to_leader, 2.0);
    }

    #[test]
    fn non_finite_state_forces_simulation_fault() {
        let mut comp = crate::core::competitor::tests::test_competitor(1, 50.0, 50.0);
        comp.ers.charge = 130.0;
        assert!(!repair_invariants(&mut comp));
        assert_eq!(comp.ers.charge, 100.0);

        comp.fuel.load = f64::NAN;
        assert!(repair_invariants(&mut comp));
        assert_eq!(comp.dnf_reason(), Some(DnfReason::SimulationFault));
    }
}
