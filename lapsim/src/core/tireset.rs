use crate::core::car::rating_factor;
use crate::core::competitor::Competitor;
use crate::core::race::LapContext;
use crate::core::sim_constants::SimConstants;
use crate::core::weather::WeatherState;
use helpers::general::{clamp_pct, lin_interp};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TireCompound {
    Soft,
    Medium,
    Hard,
    Intermediate,
    Wet,
}

impl TireCompound {
    pub fn is_slick(&self) -> bool {
        matches!(self, TireCompound::Soft | TireCompound::Medium | TireCompound::Hard)
    }

    /// Relative wear rate of the compound.
    pub fn wear_factor(&self) -> f64 {
        match self {
            TireCompound::Soft => 1.5,
            TireCompound::Medium => 1.0,
            TireCompound::Hard => 0.65,
            TireCompound::Intermediate => 1.1,
            TireCompound::Wet => 0.9,
        }
    }

    /// Performance score bonus of a fresh compound in its operating window.
    pub fn pace_bonus(&self) -> f64 {
        match self {
            TireCompound::Soft => 6.0,
            TireCompound::Medium => 3.0,
            _ => 0.0,
        }
    }

    /// (laps) Stint length after which an autonomous competitor plans a stop.
    pub fn age_ceiling(&self) -> u32 {
        match self {
            TireCompound::Soft => 18,
            TireCompound::Medium => 28,
            TireCompound::Hard => 40,
            TireCompound::Intermediate | TireCompound::Wet => 30,
        }
    }

    /// Returns true if the compound can be raced in the given weather.
    pub fn suits(&self, weather: WeatherState) -> bool {
        match weather {
            WeatherState::LightRain | WeatherState::Rain => !self.is_slick(),
            WeatherState::HeavyRain => *self == TireCompound::Wet,
            _ => self.is_slick(),
        }
    }

    /// Returns true for slicks on a wet track.
    pub fn is_wrong_for(&self, weather: WeatherState) -> bool {
        self.is_slick() && weather.is_wet()
    }

    /// The compound forced by the weather, `None` if any slick is fine.
    pub fn required_for(weather: WeatherState) -> Option<TireCompound> {
        match weather {
            WeatherState::LightRain => Some(TireCompound::Intermediate),
            WeatherState::Rain | WeatherState::HeavyRain => Some(TireCompound::Wet),
            _ => None,
        }
    }

    /// Slick choice for the remaining race distance.
    pub fn for_laps_remaining(laps_remaining: u32) -> TireCompound {
        if laps_remaining > 25 {
            TireCompound::Hard
        } else if laps_remaining > 12 {
            TireCompound::Medium
        } else {
            TireCompound::Soft
        }
    }

    /// Performance score bonus/penalty for running this compound in the given weather.
    pub fn weather_match_bonus(&self, weather: WeatherState) -> f64 {
        match (self, weather) {
            (c, WeatherState::LightRain) if c.is_slick() => -10.0,
            (c, WeatherState::Rain) if c.is_slick() => -25.0,
            (c, WeatherState::HeavyRain) if c.is_slick() => -35.0,
            (TireCompound::Intermediate, WeatherState::LightRain) => 5.0,
            (TireCompound::Intermediate, WeatherState::Rain) => 2.0,
            (TireCompound::Intermediate, WeatherState::HeavyRain) => -8.0,
            (TireCompound::Wet, WeatherState::LightRain) => 2.0,
            (TireCompound::Wet, _) if weather.is_wet() => 5.0,
            (TireCompound::Intermediate, _) => -6.0,
            (TireCompound::Wet, _) => -10.0,
            _ => 0.0,
        }
    }
}

impl fmt::Display for TireCompound {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            TireCompound::Soft => "soft",
            TireCompound::Medium => "medium",
            TireCompound::Hard => "hard",
            TireCompound::Intermediate => "intermediate",
            TireCompound::Wet => "wet",
        };
        write!(f, "{}", name)
    }
}

/// * `compound` - Mounted compound
/// * `condition` - (%) Remaining tire condition, 100 for a fresh set
/// * `age` - (laps) Laps driven on this set
/// * `temperature` - (°C) Tire temperature
/// * `flat_spot` - True after a lock-up, increases the wear of the next lap
#[derive(Debug, Clone, Serialize)]
pub struct Tireset {
    pub compound: TireCompound,
    pub condition: f64,
    pub age: u32,
    pub temperature: f64,
    pub flat_spot: bool,
}

/// (°C) Temperature of a set fitted from the blankets
const FITTED_TEMP: f64 = 70.0;

impl Tireset {
    pub fn new(compound: TireCompound) -> Tireset {
        Tireset {
            compound,
            condition: 100.0,
            age: 0,
            temperature: FITTED_TEMP,
            flat_spot: false,
        }
    }

    /// Optimality of the current temperature in [0.4, 1.0], 1.0 at the optimum.
    pub fn temp_optimality(&self, optimal_temp: f64) -> f64 {
        (1.0 - (self.temperature - optimal_temp).abs() / 100.0).clamp(0.4, 1.0)
    }

    /// Wear factor due to the deviation from the optimal temperature.
    pub fn temp_wear_factor(&self, optimal_temp: f64) -> f64 {
        let deviation = (self.temperature - optimal_temp).abs();
        lin_interp(deviation, &[0.0, 10.0, 20.0, 40.0], &[1.0, 1.1, 1.4, 2.0])
    }
}

/// update_tire_temperature moves the tire temperature halfway toward the target of the current
/// lap. It has to run before update_tire_wear.
pub fn update_tire_temperature(comp: &mut Competitor, ctx: &LapContext, consts: &SimConstants) {
    if comp.is_dnf() {
        return;
    }

    let tires = &mut comp.tires;
    let mut target = consts.tire_optimal_temp
        + (comp.push - 50.0) * 0.3
        + (ctx.track_temp - 30.0) * 0.5;

    if tires.compound.is_wrong_for(ctx.weather) {
        target -= 25.0;
    } else if !tires.compound.is_slick() && !ctx.weather.is_wet() {
        target += 25.0;
    }
    if ctx.caution() {
        target -= 15.0;
    }

    tires.temperature = (tires.temperature + (target - tires.temperature) * 0.5).clamp(10.0, 150.0);
}

/// update_tire_wear reduces the tire condition by the wear of one lap and ages the set.
pub fn update_tire_wear(comp: &mut Competitor, ctx: &LapContext, consts: &SimConstants) {
    if comp.is_dnf() {
        return;
    }

    let mgmt_deficit = (100.0 - comp.driver.tire_management) / 200.0;
    let tires = &mut comp.tires;

    let mut wear = consts.base_tire_wear
        * ctx.track.tire_wear
        * tires.compound.wear_factor()
        * rating_factor(comp.car.tire_wear_rate)
        * (comp.push / 50.0).max(0.2)
        * tires.temp_wear_factor(consts.tire_optimal_temp)
        * (ctx.track_temp / 30.0).clamp(0.3, 2.0)
        * (1.0 + mgmt_deficit);

    let mut situational = 1.0;
    if comp.duel.is_some() {
        situational *= consts.tire_battle_wear_mult;
    }
    if tires.flat_spot {
        situational *= consts.tire_lockup_wear_mult;
    }
    if tires.compound.is_wrong_for(ctx.weather) {
        situational *= consts.tire_wrong_compound_wear_mult;
    }
    wear *= situational.min(consts.tire_max_situational_mult);

    if ctx.caution() {
        wear *= consts.tire_caution_wear_mult;
    }

    tires.condition = clamp_pct(tires.condition - wear);
    tires.age += 1;
    tires.flat_spot = false;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::competitor::tests::test_competitor;
    use crate::core::race::FlagState;
    use crate::core::track::Track;

    fn ctx<'a>(track: &'a Track, weather: WeatherState, flag: FlagState) -> LapContext<'a> {
        LapContext {
            track,
            lap: 5,
            tot_no_laps: 50,
            weather,
            track_temp: 30.0,
            grip: weather.base_grip(),
            flag,
            drs_enabled: true,
        }
    }

    #[test]
    fn compound_suitability() {
        assert!(TireCompound::Soft.suits(WeatherState::Cloudy));
        assert!(!TireCompound::Soft.suits(WeatherState::LightRain));
        assert!(TireCompound::Intermediate.suits(WeatherState::Rain));
        assert!(!TireCompound::Intermediate.suits(WeatherState::HeavyRain));
        assert!(!TireCompound::Wet.suits(WeatherState::Clear));
        assert!(TireCompound::Soft.is_wrong_for(WeatherState::HeavyRain));
        assert!(!TireCompound::Wet.is_wrong_for(WeatherState::HeavyRain));
    }

    #[test]
    fn wear_reduces_condition_and_ages_set() {
        let track = Track::lookup("bahrain").unwrap();
        let consts = SimConstants::default();
        let mut comp = test_competitor(1, 50.0, 50.0);
        let ctx = ctx(&track, WeatherState::Clear, FlagState::G);

        update_tire_temperature(&mut comp, &ctx, &consts);
        update_tire_wear(&mut comp, &ctx, &consts);
        assert!(comp.tires.condition < 100.0);
        assert!(comp.tires.condition > 90.0);
        assert_eq!(comp.tires.age, 1);
    }

    #[test]
    fn slicks_in_rain_wear_faster_and_cool_down() {
        let track = Track::lookup("bahrain").unwrap();
        let consts = SimConstants::default();

        let mut dry = test_competitor(1, 50.0, 50.0);
        let mut wet = test_competitor(2, 50.0, 50.0);
        let ctx_dry = ctx(&track, WeatherState::Cloudy, FlagState::G);
        let ctx_wet = ctx(&track, WeatherState::Rain, FlagState::G);

        update_tire_temperature(&mut dry, &ctx_dry, &consts);
        update_tire_temperature(&mut wet, &ctx_wet, &consts);
        assert!(wet.tires.temperature < dry.tires.temperature);

        update_tire_wear(&mut dry, &ctx_dry, &consts);
        update_tire_wear(&mut wet, &ctx_wet, &consts);
        assert!(100.0 - wet.tires.condition > 4.0 * (100.0 - dry.tires.condition));
    }

    #[test]
    fn caution_suppresses_wear() {
        let track = Track::lookup("bahrain").unwrap();
        let consts = SimConstants::default();
        let mut green = test_competitor(1, 50.0, 50.0);
        let mut sc = test_competitor(2, 50.0, 50.0);

        update_tire_wear(&mut green, &ctx(&track, WeatherState::Clear, FlagState::G), &consts);
        update_tire_wear(&mut sc, &ctx(&track, WeatherState::Clear, FlagState::Sc), &consts);
        assert!(100.0 - sc.tires.condition < 100.0 - green.tires.condition);
    }

    #[test]
    fn condition_floors_at_zero() {
        let track = Track::lookup("bahrain").unwrap();
        let consts = SimConstants::default();
        let mut comp = test_competitor(1, 50.0, 50.0);
        comp.tires.condition = 0.5;
        comp.push = 100.0;
        update_tire_wear(&mut comp, &ctx(&track, WeatherState::HeavyRain, FlagState::G), &consts);
        assert_eq!(comp.tires.condition, 0.0);
        assert!(!comp.is_dnf());
    }
}
