use crate::core::car::DamageLocation;
use crate::core::competitor::{Competitor, DnfReason};
use crate::core::race::LapContext;
use crate::core::rng::RaceRng;
use crate::core::sim_constants::SimConstants;
use crate::interfaces::lap_report::{RaceEvent, RaceEventKind};
use serde::Serialize;
use std::fmt;

/// Caution period requested by an incident. Ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Caution {
    Vsc,
    Sc,
}

impl Caution {
    /// Keeps the more severe of two requests.
    pub fn merge(cur: Option<Caution>, new: Option<Caution>) -> Option<Caution> {
        match (cur, new) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, None) => a,
            (None, b) => b,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Gearbox,
    Hydraulics,
    Electrical,
    PowerUnit,
    Suspension,
}

impl FailureKind {
    const ALL: [FailureKind; 5] = [
        FailureKind::Gearbox,
        FailureKind::Hydraulics,
        FailureKind::Electrical,
        FailureKind::PowerUnit,
        FailureKind::Suspension,
    ];

    pub fn random(rng: &mut RaceRng) -> FailureKind {
        FailureKind::ALL[rng.weighted_index(&[0.25, 0.2, 0.2, 0.25, 0.1])]
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FailureKind::Gearbox => write!(f, "gearbox"),
            FailureKind::Hydraulics => write!(f, "hydraulics"),
            FailureKind::Electrical => write!(f, "electrical"),
            FailureKind::PowerUnit => write!(f, "power unit"),
            FailureKind::Suspension => write!(f, "suspension"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    LockUp,
    Spin,
    BigMoment,
    Crash,
}

impl Severity {
    /// Buckets a uniform draw in [0, 1) into a severity.
    pub fn from_roll(roll: f64) -> Severity {
        if roll < 0.45 {
            Severity::LockUp
        } else if roll < 0.75 {
            Severity::Spin
        } else if roll < 0.92 {
            Severity::BigMoment
        } else {
            Severity::Crash
        }
    }
}

/// crash_chance returns the probability of a driving incident of a competitor in the current lap.
pub fn crash_chance(comp: &Competitor, ctx: &LapContext, consts: &SimConstants) -> f64 {
    let mut p = consts.base_crash_chance
        * (1.0 + (100.0 - comp.tires.condition) / 100.0)
        * (1.0 + (comp.push - 50.0).max(0.0) / 50.0)
        * (1.0 + comp.damage.total / 100.0)
        * (1.0 + comp.psyche.fatigue / 100.0)
        * (1.0 + (100.0 - comp.psyche.focus) / 100.0);

    p *= ctx.weather.crash_multiplier();
    if comp.tires.compound.is_wrong_for(ctx.weather) {
        p *= consts.wrong_compound_crash_mult;
    }
    if ctx.track.is_high_risk() {
        p *= consts.street_circuit_crash_mult;
    }
    if ctx.caution() {
        p *= consts.caution_crash_mult;
    }

    if p.is_finite() {
        p.clamp(0.0, consts.max_crash_chance)
    } else {
        consts.max_crash_chance
    }
}

/// failure_chance returns the probability of a terminal mechanical failure in the current lap.
pub fn failure_chance(comp: &Competitor, consts: &SimConstants) -> f64 {
    let mut p = consts.base_failure_chance * (100.0 - comp.car.reliability).max(0.0) / 50.0
        + comp.engine.wear / 100.0 * consts.engine_wear_failure_chance;
    if comp.engine.temperature > consts.engine_critical_temp {
        p *= 2.0;
    }
    p.clamp(0.0, 1.0)
}

/// Incident drawn for one competitor before any of them is applied.
#[derive(Debug, Clone, Copy)]
enum Incident {
    Driving { severity: Severity, location: DamageLocation, amount: f64, time_loss: f64 },
    Failure { kind: FailureKind, vsc: bool },
}

/// roll_incidents draws the driving incidents and mechanical failures of all running competitors
/// and applies them. All draws happen before the first incident is applied, so the lost positions
/// of a spin are judged against the field as it was before the incidents of the lap. Returns the
/// caution period the incidents call for.
pub fn roll_incidents(
    comps: &mut [Competitor],
    ctx: &LapContext,
    consts: &SimConstants,
    rng: &mut RaceRng,
    events: &mut Vec<RaceEvent>,
) -> Option<Caution> {
    let mut incidents: Vec<(usize, Incident)> = Vec::new();

    for (idx, comp) in comps.iter().enumerate() {
        if comp.is_dnf() {
            continue;
        }

        if rng.chance(crash_chance(comp, ctx, consts)) {
            let severity = Severity::from_roll(rng.next_f64());
            let location = DamageLocation::random(rng);
            let (amount, time_loss) = match severity {
                Severity::LockUp => (rng.uniform(0.0, 2.0), rng.uniform(0.5, 1.0)),
                Severity::Spin => (rng.uniform(5.0, 10.0), rng.uniform(3.0, 6.0)),
                Severity::BigMoment => (rng.uniform(15.0, 30.0), rng.uniform(2.0, 4.0)),
                Severity::Crash => (100.0, 0.0),
            };
            incidents.push((idx, Incident::Driving { severity, location, amount, time_loss }));
            if severity == Severity::Crash {
                continue;
            }
        }

        if rng.chance(failure_chance(comp, consts)) {
            let kind = FailureKind::random(rng);
            let vsc = rng.chance(consts.failure_vsc_chance);
            incidents.push((idx, Incident::Failure { kind, vsc }));
        }
    }

    let elapsed_before: Vec<Option<f64>> = comps
        .iter()
        .map(|c| if c.is_dnf() { None } else { Some(c.timing.elapsed) })
        .collect();

    let mut caution = None;

    for (idx, incident) in incidents {
        let comp = &mut comps[idx];
        if comp.is_dnf() {
            continue;
        }

        match incident {
            Incident::Driving { severity, location, amount, time_loss } => {
                let new_caution = apply_driving_incident(
                    comp,
                    severity,
                    location,
                    amount,
                    time_loss,
                    &elapsed_before,
                    ctx,
                    consts,
                    events,
                );
                caution = Caution::merge(caution, new_caution);
            }
            Incident::Failure { kind, vsc } => {
                if comp.retire(DnfReason::Mechanical(kind)) {
                    events.push(RaceEvent::new(
                        ctx.lap,
                        vec![comp.id],
                        RaceEventKind::Retirement {
                            name: comp.name.to_owned(),
                            reason: DnfReason::Mechanical(kind),
                        },
                    ));
                    if vsc {
                        caution = Caution::merge(caution, Some(Caution::Vsc));
                    }
                }
            }
        }
    }

    caution
}

#[allow(clippy::too_many_arguments)]
fn apply_driving_incident(
    comp: &mut Competitor,
    severity: Severity,
    location: DamageLocation,
    amount: f64,
    time_loss: f64,
    elapsed_before: &[Option<f64>],
    ctx: &LapContext,
    consts: &SimConstants,
    events: &mut Vec<RaceEvent>,
) -> Option<Caution> {
    let lap = ctx.lap;

    if severity == Severity::Crash {
        if comp.retire(DnfReason::Crash) {
            comp.damage.apply(location, amount);
            events.push(RaceEvent::new(lap, vec![comp.id], RaceEventKind::Crash { name: comp.name.to_owned() }));
            return Some(Caution::Sc);
        }
        return None;
    }

    comp.stats.mistakes += 1;
    comp.psyche.adjust_confidence(-5.0);
    comp.damage.apply(location, amount);

    let mut caution = None;
    match severity {
        Severity::LockUp => {
            comp.stats.lockups += 1;
            comp.tires.flat_spot = true;
            comp.add_time(time_loss);
            events.push(RaceEvent::new(lap, vec![comp.id], RaceEventKind::LockUp { name: comp.name.to_owned() }));
        }
        Severity::Spin => {
            comp.stats.spins += 1;
            let before = comp.timing.elapsed;
            comp.add_time(time_loss);
            let after = comp.timing.elapsed;
            let positions_lost = elapsed_before
                .iter()
                .flatten()
                .filter(|&&t| t > before && t < after)
                .count() as u32;
            events.push(RaceEvent::new(
                lap,
                vec![comp.id],
                RaceEventKind::Spin { name: comp.name.to_owned(), positions_lost },
            ));
        }
        Severity::BigMoment => {
            comp.add_time(time_loss);
            events.push(RaceEvent::new(
                lap,
                vec![comp.id],
                RaceEventKind::BigMoment { name: comp.name.to_owned(), location },
            ));
            caution = Some(Caution::Vsc);
        }
        Severity::Crash => {}
    }

    if comp.damage.total >= consts.dnf_damage && comp.retire(DnfReason::Damage) {
        events.push(RaceEvent::new(
            lap,
            vec![comp.id],
            RaceEventKind::Retirement { name: comp.name.to_owned(), reason: DnfReason::Damage },
        ));
        caution = Some(Caution::Sc);
    }

    caution
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::competitor::tests::test_competitor;
    use crate::core::race::FlagState;
    use crate::core::tireset::TireCompound;
    use crate::core::track::Track;
    use crate::core::weather::WeatherState;
    use approx::assert_relative_eq;

    fn ctx(track: &Track, weather: WeatherState, flag: FlagState) -> LapContext<'_> {
        LapContext {
            track,
            lap: 5,
            tot_no_laps: 50,
            weather,
            track_temp: 30.0,
            grip: weather.base_grip(),
            flag,
            drs_enabled: false,
        }
    }

    #[test]
    fn severity_buckets() {
        assert_eq!(Severity::from_roll(0.1), Severity::LockUp);
        assert_eq!(Severity::from_roll(0.5), Severity::Spin);
        assert_eq!(Severity::from_roll(0.8), Severity::BigMoment);
        assert_eq!(Severity::from_roll(0.95), Severity::Crash);
    }

    #[test]
    fn heavy_rain_on_slicks_multiplies_crash_chance() {
        let track = Track::lookup("silverstone").unwrap();
        let consts = SimConstants::default();
        let mut comp = test_competitor(1, 50.0, 50.0);
        comp.tires.compound = TireCompound::Soft;

        let p_clear = crash_chance(&comp, &ctx(&track, WeatherState::Clear, FlagState::G), &consts);
        let p_rain = crash_chance(&comp, &ctx(&track, WeatherState::HeavyRain, FlagState::G), &consts);
        assert!(p_rain >= p_clear * 4.5 * 2.5 * (1.0 - 1e-9));
    }

    #[test]
    fn caution_and_street_circuits_scale_crash_chance() {
        let consts = SimConstants::default();
        let comp = test_competitor(1, 50.0, 50.0);
        let silverstone = Track::lookup("silverstone").unwrap();
        let monaco = Track::lookup("monaco").unwrap();

        let p_green = crash_chance(&comp, &ctx(&silverstone, WeatherState::Clear, FlagState::G), &consts);
        let p_sc = crash_chance(&comp, &ctx(&silverstone, WeatherState::Clear, FlagState::Sc), &consts);
        let p_monaco = crash_chance(&comp, &ctx(&monaco, WeatherState::Clear, FlagState::G), &consts);
        assert_relative_eq!(p_sc, p_green * 0.3, epsilon = 1e-12);
        assert_relative_eq!(p_monaco, p_green * 1.5, epsilon = 1e-12);
    }

    #[test]
    fn crash_chance_is_capped() {
        let track = Track::lookup("monaco").unwrap();
        let mut consts = SimConstants::default();
        consts.base_crash_chance = 1.0;
        let comp = test_competitor(1, 50.0, 50.0);
        assert_relative_eq!(
            crash_chance(&comp, &ctx(&track, WeatherState::HeavyRain, FlagState::G), &consts),
            consts.max_crash_chance
        );
    }

    #[test]
    fn hot_engine_doubles_failure_chance() {
        let consts = SimConstants::default();
        let mut comp = test_competitor(1, 50.0, 50.0);
        comp.engine.wear = 40.0;
        let p_cool = failure_chance(&comp, &consts);
        comp.engine.temperature = 120.0;
        assert_relative_eq!(failure_chance(&comp, &consts), 2.0 * p_cool);
    }

    #[test]
    fn certain_incidents_retire_or_damage() {
        let track = Track::lookup("silverstone").unwrap();
        let mut consts = SimConstants::default();
        consts.base_crash_chance = 1.0;
        consts.max_crash_chance = 1.0;
        let ctx = ctx(&track, WeatherState::Clear, FlagState::G);

        let mut comps: Vec<Competitor> = (1..=10).map(|id| test_competitor(id, 50.0, 50.0)).collect();
        let mut rng = RaceRng::from_seed(11);
        let mut events = Vec::new();
        let caution = roll_incidents(&mut comps, &ctx, &consts, &mut rng, &mut events);

        // every competitor had an incident
        assert!(events.len() >= comps.len());
        for comp in comps.iter() {
            assert!(comp.is_dnf() || comp.stats.mistakes == 1);
        }
        if comps.iter().any(|c| c.dnf_reason() == Some(DnfReason::Crash)) {
            assert_eq!(caution, Some(Caution::Sc));
        }
    }

    #[test]
    fn caution_merge_keeps_most_severe() {
        assert_eq!(Caution::merge(Some(Caution::Vsc), Some(Caution::Sc)), Some(Caution::Sc));
        assert_eq!(Caution::merge(Some(Caution::Sc), Some(Caution::Vsc)), Some(Caution::Sc));
        assert_eq!(Caution::merge(None, Some(Caution::Vsc)), Some(Caution::Vsc));
        assert_eq!(Caution::merge(None, None), None);
    }
}
