use crate::core::car::EngineMode;
use crate::core::competitor::Competitor;
use crate::core::race::{FlagState, LapContext};
use crate::core::rng::RaceRng;
use crate::core::sim_constants::SimConstants;
use rand_distr::Normal;

/// drive_performance_score returns the deterministic part of the drive performance score (DPS) of a
/// competitor for the current lap. The score is a weighted sum of driver, car, tire, track and
/// strategy contributions and is never negative. A nominal competitor (all ratings 50, fresh
/// medium tires, dry track) scores about 55.
pub fn drive_performance_score(comp: &Competitor, ctx: &LapContext, consts: &SimConstants) -> f64 {
    let wet = ctx.weather.is_wet();
    let driver = &comp.driver;
    let car = &comp.car;
    let tires = &comp.tires;

    // driver
    let mut score = 0.25 * driver.effective_skill(wet)
        + 0.05 * driver.racecraft
        + 0.025 * driver.tire_management
        + 0.025 * driver.fuel_management;

    // car
    score += 0.12 * car.engine_power
        + 0.12 * car.aerodynamics
        + 0.08 * car.handling
        + 0.03 * car.ers_power
        + 0.03 * car.brake_power;

    // tires and track
    let tire_state = tires.condition / 100.0 * tires.temp_optimality(consts.tire_optimal_temp);
    score += 10.0 * tire_state + tires.compound.pace_bonus() * tires.condition / 100.0;
    score += 5.0 * ctx.grip / 100.0;
    score += tires.compound.weather_match_bonus(ctx.weather);

    // strategy
    score += (comp.push - 50.0) * 0.08 + (comp.fuel.mix - 50.0) * 0.03;
    score += match comp.engine.mode {
        EngineMode::Eco => -2.0,
        EngineMode::Balanced => 0.0,
        EngineMode::Overtake => 2.0,
    };

    // condition of car and driver
    score -= comp.damage.total * 0.2;
    score -= comp.psyche.fatigue * 0.05;
    score += (comp.psyche.focus - 50.0) * 0.04 + (comp.psyche.confidence - 50.0) * 0.03;

    // situational
    if comp.ers.deployed {
        score += consts.ers_deploy_score_bonus;
    }
    if comp.drs_available && ctx.drs_enabled && !wet {
        score += consts.drs_score_bonus * car.drs_efficiency / 50.0;
    }
    if comp.slipstream {
        score += consts.slipstream_score_bonus;
    }

    if score.is_finite() {
        score.max(0.0)
    } else {
        0.0
    }
}

/// Random lap-to-lap variation added to the score. The standard deviation grows linearly with the
/// missing consistency of the driver.
pub fn score_jitter(comp: &Competitor, consts: &SimConstants, rng: &mut RaceRng) -> f64 {
    let std_dev = (100.0 - comp.driver.consistency).max(0.0) * consts.jitter_per_inconsistency;
    if std_dev <= 0.0 {
        return 0.0;
    }
    match Normal::new(0.0, std_dev) {
        Ok(normal) => rng.sample(&normal),
        Err(_) => 0.0,
    }
}

/// calc_laptime converts a score into a lap time (s). It includes the fuel mass, the standing
/// start on lap 1 and the caution floors. A pending penalty is added on top, the caller is
/// responsible for consuming it.
pub fn calc_laptime(comp: &Competitor, ctx: &LapContext, consts: &SimConstants, score: f64) -> f64 {
    let base = ctx.track.base_laptime;
    let mut laptime = base - score.max(0.0) * consts.score_to_seconds / 10.0
        + comp.fuel.load * consts.fuel_mass_penalty;

    if ctx.lap == 1 {
        laptime += ctx.track.standing_start_loss
            + 0.25 * comp.timing.grid_position.saturating_sub(1) as f64;
    }

    laptime = laptime.max(base * consts.min_laptime_frac);

    laptime = match ctx.flag {
        FlagState::Vsc => laptime.max(base * consts.vsc_laptime_frac),
        FlagState::Sc => laptime.max(base * consts.sc_laptime_frac),
        _ => laptime,
    };

    laptime + comp.penalty_pending.max(0.0)
}

/// qualifying_laptime is a flying lap on fresh soft tires (or the weather's tire) with a low fuel
/// load. Duels, incidents and penalties play no role.
pub fn qualifying_laptime(
    comp: &Competitor,
    ctx: &LapContext,
    consts: &SimConstants,
    rng: &mut RaceRng,
) -> f64 {
    let mut quali = comp.clone();
    quali.tires.temperature = consts.tire_optimal_temp;
    quali.fuel.load = 10.0;
    quali.push = 100.0;
    quali.penalty_pending = 0.0;

    let score = drive_performance_score(&quali, ctx, consts)
        + (comp.driver.qualifying - 50.0) * 0.1
        + score_jitter(&quali, consts, rng);

    let base = ctx.track.base_laptime;
    (base - score.max(0.0) * consts.score_to_seconds / 10.0 + quali.fuel.load * consts.fuel_mass_penalty)
        .max(base * consts.min_laptime_frac)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::competitor::tests::test_competitor;
    use crate::core::tireset::TireCompound;
    use crate::core::track::Track;
    use crate::core::weather::WeatherState;
    use approx::assert_relative_eq;

    fn ctx(track: &Track, weather: WeatherState, flag: FlagState, lap: u32) -> LapContext<'_> {
        LapContext {
            track,
            lap,
            tot_no_laps: 50,
            weather,
            track_temp: 35.0,
            grip: weather.base_grip(),
            flag,
            drs_enabled: true,
        }
    }

    #[test]
    fn stronger_competitor_scores_higher() {
        let track = Track::lookup("silverstone").unwrap();
        let consts = SimConstants::default();
        let ctx = ctx(&track, WeatherState::Clear, FlagState::G, 5);
        let strong = test_competitor(1, 99.0, 99.0);
        let weak = test_competitor(2, 10.0, 10.0);

        let s_strong = drive_performance_score(&strong, &ctx, &consts);
        let s_weak = drive_performance_score(&weak, &ctx, &consts);
        assert!(s_strong > s_weak + 50.0);
        assert!(s_weak >= 0.0);
    }

    #[test]
    fn score_is_pure() {
        let track = Track::lookup("spa").unwrap();
        let consts = SimConstants::default();
        let ctx = ctx(&track, WeatherState::Rain, FlagState::G, 5);
        let comp = test_competitor(1, 60.0, 70.0);
        assert_eq!(
            drive_performance_score(&comp, &ctx, &consts),
            drive_performance_score(&comp, &ctx, &consts)
        );
    }

    #[test]
    fn slicks_lose_score_in_rain() {
        let track = Track::lookup("spa").unwrap();
        let consts = SimConstants::default();
        let ctx = ctx(&track, WeatherState::Rain, FlagState::G, 5);
        let slick = test_competitor(1, 50.0, 50.0);
        let mut wet = test_competitor(2, 50.0, 50.0);
        wet.tires.compound = TireCompound::Wet;
        assert!(drive_performance_score(&wet, &ctx, &consts) > drive_performance_score(&slick, &ctx, &consts));
    }

    #[test]
    fn perfect_consistency_has_no_jitter() {
        let consts = SimConstants::default();
        let mut rng = RaceRng::from_seed(5);
        let mut comp = test_competitor(1, 50.0, 50.0);
        comp.driver.consistency = 100.0;
        assert_eq!(score_jitter(&comp, &consts, &mut rng), 0.0);
    }

    #[test]
    fn laptime_floors_and_penalty() {
        let track = Track::lookup("monza").unwrap();
        let consts = SimConstants::default();
        let mut comp = test_competitor(1, 50.0, 50.0);

        let green = ctx(&track, WeatherState::Clear, FlagState::G, 5);
        assert_relative_eq!(
            calc_laptime(&comp, &green, &consts, 1e6),
            track.base_laptime * consts.min_laptime_frac
        );

        let sc = ctx(&track, WeatherState::Clear, FlagState::Sc, 5);
        assert_relative_eq!(
            calc_laptime(&comp, &sc, &consts, 50.0),
            track.base_laptime * consts.sc_laptime_frac
        );

        let no_penalty = calc_laptime(&comp, &green, &consts, 50.0);
        comp.penalty_pending = 5.0;
        assert_relative_eq!(calc_laptime(&comp, &green, &consts, 50.0), no_penalty + 5.0);
    }

    #[test]
    fn standing_start_costs_time_on_lap_one() {
        let track = Track::lookup("monza").unwrap();
        let consts = SimConstants::default();
        let comp = test_competitor(3, 50.0, 50.0);
        let lap1 = calc_laptime(&comp, &ctx(&track, WeatherState::Clear, FlagState::G, 1), &consts, 50.0);
        let lap2 = calc_laptime(&comp, &ctx(&track, WeatherState::Clear, FlagState::G, 2), &consts, 50.0);
        assert_relative_eq!(lap1 - lap2, track.standing_start_loss + 0.5);
    }
}
