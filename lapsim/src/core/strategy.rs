use crate::core::car::{EngineMode, ErsMode};
use crate::core::competitor::{Competitor, PitRequest};
use crate::core::race::{FlagState, LapContext};
use crate::core::rng::RaceRng;
use crate::core::sim_constants::SimConstants;
use crate::core::tireset::{TireCompound, Tireset};
use crate::interfaces::control::{ControlCommand, ControlMessage};
use crate::interfaces::lap_report::{RaceEvent, RaceEventKind};
use flume::Receiver;
use helpers::general::clamp_pct;

/// Strategy decides the pit stops and driving modes of one competitor. It is selected per
/// competitor when the race is set up.
pub trait Strategy: Send {
    /// Called before the resource updates of a lap.
    fn on_lap_start(&mut self, comp: &mut Competitor, ctx: &LapContext);

    /// Called in the strategy phase after duels and incidents. Returns the pit stop to perform at
    /// the end of the lap, if any. Mode changes take effect from the next lap.
    fn on_lap_end(
        &mut self,
        comp: &mut Competitor,
        ctx: &LapContext,
        consts: &SimConstants,
    ) -> Option<PitRequest>;
}

// -------------------------------------------------------------------------------------------------
// RULE-BASED STRATEGY -----------------------------------------------------------------------------
// -------------------------------------------------------------------------------------------------

/// RuleBasedStrategy drives autonomous competitors by a fixed rule table.
///
/// * `points_positions` - Number of positions that score points, used to judge whether the
/// competitor should attack or manage the gap
#[derive(Debug, Clone)]
pub struct RuleBasedStrategy {
    pub points_positions: u32,
}

impl RuleBasedStrategy {
    pub fn new(points_positions: u32) -> RuleBasedStrategy {
        RuleBasedStrategy { points_positions }
    }

    /// Pit decision of the rule table in priority order.
    pub fn pit_decision(
        &self,
        comp: &Competitor,
        ctx: &LapContext,
        consts: &SimConstants,
    ) -> Option<PitRequest> {
        let laps_remaining = ctx.laps_remaining();
        if laps_remaining == 0 || comp.is_dnf() {
            return None;
        }
        let tires = &comp.tires;

        // weather boundaries
        if !tires.compound.suits(ctx.weather) {
            return Some(PitRequest { compound: None });
        }

        if tires.condition < consts.pit_condition_threshold {
            return Some(PitRequest { compound: None });
        }

        if ctx.flag == FlagState::Sc
            && tires.condition < consts.pit_condition_under_caution
        {
            return Some(PitRequest { compound: None });
        }

        if tires.age > tires.compound.age_ceiling() && laps_remaining > 5 {
            return Some(PitRequest { compound: None });
        }

        // refuel if even eco mode cannot reach the finish
        let needed = laps_remaining as f64 * comp.fuel.consumption;
        if laps_remaining > 3 && comp.fuel.load - consts.min_fuel_load < 0.6 * needed {
            return Some(PitRequest { compound: None });
        }

        None
    }

    /// Adjusts push, fuel mix, engine and ERS mode for the next lap.
    pub fn adjust_modes(&self, comp: &mut Competitor, ctx: &LapContext, consts: &SimConstants) {
        let position = comp.timing.position;
        let (mut push, mut mix) = if position <= 3 {
            (45.0, 45.0)
        } else if position > self.points_positions {
            (75.0, 60.0)
        } else {
            (55.0, 50.0)
        };

        let attacking = comp.duel.map_or(false, |d| d.attacking);
        let mut engine_mode = EngineMode::Balanced;
        if attacking {
            push = f64::max(push, 85.0);
            engine_mode = EngineMode::Overtake;
        }

        // low fuel and overheating take precedence over attacking
        let needed = ctx.laps_remaining() as f64 * comp.fuel.consumption;
        if comp.fuel.load - consts.min_fuel_load < 1.05 * needed {
            engine_mode = EngineMode::Eco;
            mix = 30.0;
            push = f64::min(push, 50.0);
        } else if comp.engine.temperature > consts.engine_critical_temp - 5.0 {
            engine_mode = EngineMode::Eco;
        }

        let ers_mode = if (attacking || comp.drs_available)
            && comp.ers.charge >= consts.ers_min_deploy_charge
        {
            ErsMode::Deploy
        } else if comp.ers.charge < 30.0 {
            ErsMode::Charge
        } else {
            ErsMode::Balanced
        };

        comp.push = push;
        comp.fuel.mix = mix;
        comp.engine.mode = engine_mode;
        comp.ers.mode = ers_mode;
    }
}

impl Strategy for RuleBasedStrategy {
    fn on_lap_start(&mut self, _comp: &mut Competitor, _ctx: &LapContext) {}

    fn on_lap_end(
        &mut self,
        comp: &mut Competitor,
        ctx: &LapContext,
        consts: &SimConstants,
    ) -> Option<PitRequest> {
        if comp.is_dnf() {
            return None;
        }
        self.adjust_modes(comp, ctx, consts);
        let decision = self.pit_decision(comp, ctx, consts);
        if decision.is_some() {
            log::debug!("Lap {}: {} decides to pit", ctx.lap, comp.name);
        }
        decision
    }
}

// -------------------------------------------------------------------------------------------------
// COMMAND QUEUE STRATEGY --------------------------------------------------------------------------
// -------------------------------------------------------------------------------------------------

/// CommandQueueStrategy applies the control commands of an interactive competitor. The inbox is
/// drained once per lap before the resource updates. Unset values keep their previous setting.
#[derive(Debug)]
pub struct CommandQueueStrategy {
    inbox: Receiver<ControlMessage>,
    deferred: Vec<ControlMessage>,
}

impl CommandQueueStrategy {
    pub fn new(inbox: Receiver<ControlMessage>) -> CommandQueueStrategy {
        CommandQueueStrategy {
            inbox,
            deferred: Vec::new(),
        }
    }

    /// Number of commands held back for later laps.
    pub fn no_deferred(&self) -> usize {
        self.deferred.len()
    }

    fn drain(&mut self, comp: &mut Competitor, lap: u32) {
        let mut msgs = std::mem::take(&mut self.deferred);
        msgs.extend(self.inbox.try_iter());

        for msg in msgs {
            match msg.lap {
                Some(target) if target < lap => {
                    log::debug!("Lap {}: {} ignores stale command for lap {}", lap, comp.name, target);
                }
                Some(target) if target > lap => self.deferred.push(msg),
                _ => apply_command(comp, &msg.command, lap),
            }
        }
    }
}

/// apply_command mutates the competitor according to a single command. Malformed and inapplicable
/// commands are dropped.
pub fn apply_command(comp: &mut Competitor, command: &ControlCommand, lap: u32) {
    if comp.is_dnf() {
        return;
    }
    if !command.is_well_formed() {
        log::debug!("Lap {}: {} ignores malformed command {:?}", lap, comp.name, command);
        return;
    }

    match *command {
        ControlCommand::RequestPit { compound } => {
            if comp.timing.last_pit_lap.map_or(false, |pit_lap| pit_lap + 1 >= lap) {
                log::debug!("Lap {}: {} ignores pit request right after a stop", lap, comp.name);
            } else {
                comp.pit_request = Some(PitRequest { compound });
            }
        }
        ControlCommand::SetPush { level } => comp.push = level,
        ControlCommand::SetFuelMix { level } => comp.fuel.mix = level,
        ControlCommand::SetErsMode { mode } => comp.ers.mode = mode,
        ControlCommand::SetEngineMode { mode } => comp.engine.mode = mode,
    }
}

impl Strategy for CommandQueueStrategy {
    fn on_lap_start(&mut self, comp: &mut Competitor, ctx: &LapContext) {
        self.drain(comp, ctx.lap);
    }

    fn on_lap_end(
        &mut self,
        comp: &mut Competitor,
        ctx: &LapContext,
        _consts: &SimConstants,
    ) -> Option<PitRequest> {
        if ctx.laps_remaining() == 0 {
            comp.pit_request = None;
        }
        comp.pit_request.take()
    }
}

// -------------------------------------------------------------------------------------------------
// PIT STOP ----------------------------------------------------------------------------------------
// -------------------------------------------------------------------------------------------------

/// perform_pitstop changes tires, refuels and repairs the car in one step and adds the pit lane
/// time loss to the elapsed time. Without a requested compound the weather decides, otherwise the
/// remaining race distance. Returns the time loss (s).
pub fn perform_pitstop(
    comp: &mut Competitor,
    request: PitRequest,
    ctx: &LapContext,
    consts: &SimConstants,
    rng: &mut RaceRng,
    events: &mut Vec<RaceEvent>,
) -> f64 {
    if comp.is_dnf() {
        return 0.0;
    }

    let compound = request.compound.unwrap_or_else(|| {
        TireCompound::required_for(ctx.weather)
            .unwrap_or_else(|| TireCompound::for_laps_remaining(ctx.laps_remaining()))
    });

    comp.stats.pit_stops += 1;
    comp.timing.last_pit_lap = Some(ctx.lap);
    comp.tires = Tireset::new(compound);
    comp.fuel.load = clamp_pct(comp.fuel.load + consts.pit_refuel);
    let repaired = comp
        .damage
        .repair((comp.damage.total * consts.pit_repair_fraction).min(consts.pit_max_repair));

    let mut duration = consts.pit_base_time
        + rng.uniform(-consts.pit_crew_variance, consts.pit_crew_variance)
        + repaired * 0.1;
    if ctx.caution() {
        duration += rng.uniform(0.0, consts.pit_caution_traffic);
    }
    let duration = duration.max(1.0);

    comp.add_time(duration);
    comp.pitted_this_lap = true;
    comp.pit_request = None;
    comp.duel = None;

    log::debug!(
        "Lap {}: {} pits for {} tires ({:.1}s)",
        ctx.lap,
        comp.name,
        compound,
        duration
    );
    events.push(RaceEvent::new(
        ctx.lap,
        vec![comp.id],
        RaceEventKind::PitStop {
            name: comp.name.to_owned(),
            compound,
            duration,
        },
    ));

    duration
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::competitor::tests::test_competitor;
    use crate::core::track::Track;
    use crate::core::weather::WeatherState;
    use approx::assert_relative_eq;

    fn ctx(track: &Track, weather: WeatherState, flag: FlagState, lap: u32) -> LapContext<'_> {
        LapContext {
            track,
            lap,
            tot_no_laps: 50,
            weather,
            track_temp: 30.0,
            grip: weather.base_grip(),
            flag,
            drs_enabled: true,
        }
    }

    fn raced(comp: &mut Competitor, laps: u32) {
        comp.tires.age = laps;
        comp.fuel.consumption = 1.5;
    }

    #[test]
    fn worn_tires_trigger_a_stop() {
        let track = Track::lookup("monza").unwrap();
        let consts = SimConstants::default();
        let rules = RuleBasedStrategy::new(10);
        let mut comp = test_competitor(1, 50.0, 50.0);
        raced(&mut comp, 10);

        let green = ctx(&track, WeatherState::Clear, FlagState::G, 20);
        assert_eq!(rules.pit_decision(&comp, &green, &consts), None);

        comp.tires.condition = 15.0;
        assert_eq!(rules.pit_decision(&comp, &green, &consts), None);
        let sc = ctx(&track, WeatherState::Clear, FlagState::Sc, 20);
        assert!(rules.pit_decision(&comp, &sc, &consts).is_some());

        comp.tires.condition = 10.0;
        assert!(rules.pit_decision(&comp, &green, &consts).is_some());

        let last_lap = ctx(&track, WeatherState::Clear, FlagState::G, 50);
        assert_eq!(rules.pit_decision(&comp, &last_lap, &consts), None);
    }

    #[test]
    fn rain_forces_wet_tires() {
        let track = Track::lookup("spa").unwrap();
        let consts = SimConstants::default();
        let rules = RuleBasedStrategy::new(10);
        let mut comp = test_competitor(1, 50.0, 50.0);
        raced(&mut comp, 3);

        let rain = ctx(&track, WeatherState::HeavyRain, FlagState::G, 10);
        let request = rules.pit_decision(&comp, &rain, &consts).unwrap();

        let mut rng = RaceRng::from_seed(1);
        let mut events = Vec::new();
        perform_pitstop(&mut comp, request, &rain, &consts, &mut rng, &mut events);
        assert_eq!(comp.tires.compound, TireCompound::Wet);
    }

    #[test]
    fn attacking_raises_push_and_engine_mode() {
        let track = Track::lookup("monza").unwrap();
        let consts = SimConstants::default();
        let rules = RuleBasedStrategy::new(10);
        let mut comp = test_competitor(1, 50.0, 50.0);
        raced(&mut comp, 3);
        comp.timing.position = 5;
        comp.duel = Some(crate::core::competitor::DuelLink {
            opponent: 0,
            attacking: true,
            phase: crate::core::competitor::DuelPhase::Battle,
        });

        rules.adjust_modes(&mut comp, &ctx(&track, WeatherState::Clear, FlagState::G, 10), &consts);
        assert_eq!(comp.push, 85.0);
        assert_eq!(comp.engine.mode, EngineMode::Overtake);
        assert_eq!(comp.ers.mode, ErsMode::Deploy);
    }

    #[test]
    fn low_fuel_switches_to_eco() {
        let track = Track::lookup("monza").unwrap();
        let consts = SimConstants::default();
        let rules = RuleBasedStrategy::new(10);
        let mut comp = test_competitor(1, 50.0, 50.0);
        raced(&mut comp, 3);
        comp.fuel.load = 20.0;

        rules.adjust_modes(&mut comp, &ctx(&track, WeatherState::Clear, FlagState::G, 30), &consts);
        assert_eq!(comp.engine.mode, EngineMode::Eco);
        assert_eq!(comp.fuel.mix, 30.0);
    }

    #[test]
    fn pitstop_resets_tires_and_costs_time() {
        let track = Track::lookup("bahrain").unwrap();
        let consts = SimConstants::default();
        let mut comp = test_competitor(1, 50.0, 50.0);
        raced(&mut comp, 22);
        comp.tires.condition = 30.0;
        comp.fuel.load = 40.0;
        comp.damage.apply(crate::core::car::DamageLocation::FrontWing, 60.0);
        comp.timing.elapsed = 1000.0;

        let mut rng = RaceRng::from_seed(2);
        let mut events = Vec::new();
        let duration = perform_pitstop(
            &mut comp,
            PitRequest { compound: Some(TireCompound::Hard) },
            &ctx(&track, WeatherState::Clear, FlagState::G, 25),
            &consts,
            &mut rng,
            &mut events,
        );

        assert!(duration > 0.0);
        assert_relative_eq!(comp.timing.elapsed, 1000.0 + duration);
        assert_eq!(comp.tires.age, 0);
        assert_eq!(comp.tires.condition, 100.0);
        assert_eq!(comp.tires.compound, TireCompound::Hard);
        assert_relative_eq!(comp.fuel.load, 65.0);
        assert_relative_eq!(comp.damage.total, 35.0);
        assert_eq!(comp.stats.pit_stops, 1);
        assert_eq!(comp.timing.last_pit_lap, Some(25));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn command_queue_applies_defers_and_drops() {
        let track = Track::lookup("monza").unwrap();
        let consts = SimConstants::default();
        let (tx, rx) = flume::unbounded();
        let mut strategy = CommandQueueStrategy::new(rx);
        let mut comp = test_competitor(1, 50.0, 50.0);
        raced(&mut comp, 4);

        tx.send(ControlMessage::now(ControlCommand::SetPush { level: 80.0 })).unwrap();
        tx.send(ControlMessage::now(ControlCommand::SetPush { level: 90.0 })).unwrap();
        tx.send(ControlMessage::now(ControlCommand::SetFuelMix { level: 140.0 })).unwrap();
        tx.send(ControlMessage::for_lap(4, ControlCommand::SetEngineMode { mode: EngineMode::Eco }))
            .unwrap();
        tx.send(ControlMessage::for_lap(7, ControlCommand::RequestPit { compound: None }))
            .unwrap();

        let lap5 = ctx(&track, WeatherState::Clear, FlagState::G, 5);
        strategy.on_lap_start(&mut comp, &lap5);
        assert_eq!(comp.push, 90.0);
        assert_eq!(comp.fuel.mix, 50.0);
        assert_eq!(comp.engine.mode, EngineMode::Balanced);
        assert_eq!(strategy.no_deferred(), 1);
        assert_eq!(strategy.on_lap_end(&mut comp, &lap5, &consts), None);

        let lap7 = ctx(&track, WeatherState::Clear, FlagState::G, 7);
        strategy.on_lap_start(&mut comp, &lap7);
        assert_eq!(strategy.no_deferred(), 0);
        assert_eq!(
            strategy.on_lap_end(&mut comp, &lap7, &consts),
            Some(PitRequest { compound: None })
        );
    }

    #[test]
    fn pit_request_right_after_a_stop_is_ignored() {
        let mut comp = test_competitor(1, 50.0, 50.0);
        comp.timing.last_pit_lap = Some(2);
        apply_command(&mut comp, &ControlCommand::RequestPit { compound: None }, 3);
        assert!(comp.pit_request.is_none());

        apply_command(&mut comp, &ControlCommand::RequestPit { compound: None }, 4);
        assert_eq!(comp.pit_request, Some(PitRequest { compound: None }));
    }

    #[test]
    fn pit_request_before_the_first_lap_is_accepted() {
        let mut comp = test_competitor(1, 50.0, 50.0);
        assert_eq!(comp.tires.age, 0);
        let request = ControlCommand::RequestPit { compound: Some(TireCompound::Hard) };
        apply_command(&mut comp, &request, 1);
        assert_eq!(comp.pit_request, Some(PitRequest { compound: Some(TireCompound::Hard) }));
    }
}
