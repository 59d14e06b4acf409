use crate::core::competitor::{Competitor, DnfReason};
use crate::core::race::{FlagState, LapContext};
use crate::core::rng::RaceRng;
use crate::core::sim_constants::SimConstants;
use crate::interfaces::lap_report::{RaceEvent, RaceEventKind};
use helpers::general::clamp_pct;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Car attributes, all on a 0-100 scale (higher is better).
///
/// * `engine_power` - Straight-line performance
/// * `aerodynamics` - Downforce
/// * `handling` - Mechanical grip and balance
/// * `reliability` - Resistance against mechanical failures
/// * `tire_wear_rate` - Tire friendliness of the car, 50 is nominal wear
/// * `fuel_efficiency` - Fuel efficiency of the power unit, 50 is nominal consumption
/// * `ers_power` - Energy recovery capacity
/// * `drs_efficiency` - Effect of an open rear wing
/// * `brake_power` - Braking performance
/// * `cooling` - Cooling efficiency of engine, battery and brakes
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CarPars {
    pub engine_power: f64,
    pub aerodynamics: f64,
    pub handling: f64,
    #[serde(default = "default_rating")]
    pub reliability: f64,
    #[serde(default = "default_rating")]
    pub tire_wear_rate: f64,
    #[serde(default = "default_rating")]
    pub fuel_efficiency: f64,
    #[serde(default = "default_rating")]
    pub ers_power: f64,
    #[serde(default = "default_rating")]
    pub drs_efficiency: f64,
    #[serde(default = "default_rating")]
    pub brake_power: f64,
    #[serde(default = "default_rating")]
    pub cooling: f64,
}

fn default_rating() -> f64 {
    50.0
}

impl CarPars {
    /// Car with every attribute set to the same value.
    pub fn uniform(rating: f64) -> CarPars {
        CarPars {
            engine_power: rating,
            aerodynamics: rating,
            handling: rating,
            reliability: rating,
            tire_wear_rate: rating,
            fuel_efficiency: rating,
            ers_power: rating,
            drs_efficiency: rating,
            brake_power: rating,
            cooling: rating,
        }
    }

    pub fn attributes(&self) -> [(&'static str, f64); 10] {
        [
            ("engine_power", self.engine_power),
            ("aerodynamics", self.aerodynamics),
            ("handling", self.handling),
            ("reliability", self.reliability),
            ("tire_wear_rate", self.tire_wear_rate),
            ("fuel_efficiency", self.fuel_efficiency),
            ("ers_power", self.ers_power),
            ("drs_efficiency", self.drs_efficiency),
            ("brake_power", self.brake_power),
            ("cooling", self.cooling),
        ]
    }
}

/// Converts a 0-100 rating into a consumption/heating multiplier: 1.0 at 50, 0.5 at 100 and 1.5
/// at 0.
pub fn rating_factor(rating: f64) -> f64 {
    1.5 - rating.clamp(0.0, 100.0) / 100.0
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    Eco,
    Balanced,
    Overtake,
}

impl EngineMode {
    pub fn fuel_factor(&self) -> f64 {
        match self {
            EngineMode::Eco => 0.7,
            EngineMode::Balanced => 1.0,
            EngineMode::Overtake => 1.3,
        }
    }
}

impl fmt::Display for EngineMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EngineMode::Eco => write!(f, "eco"),
            EngineMode::Balanced => write!(f, "balanced"),
            EngineMode::Overtake => write!(f, "overtake"),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErsMode {
    Charge,
    Balanced,
    Deploy,
}

impl fmt::Display for ErsMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ErsMode::Charge => write!(f, "charge"),
            ErsMode::Balanced => write!(f, "balanced"),
            ErsMode::Deploy => write!(f, "deploy"),
        }
    }
}

/// * `load` - (%) Fuel load
/// * `mix` - (0-100) Fuel mixture, 50 is nominal
/// * `consumption` - (%) Consumption of the last lap
#[derive(Debug, Clone, Serialize)]
pub struct FuelState {
    pub load: f64,
    pub mix: f64,
    pub consumption: f64,
}

/// * `charge` - (%) Battery charge
/// * `deployed` - True if energy was deployed during the current lap
#[derive(Debug, Clone, Serialize)]
pub struct ErsState {
    pub charge: f64,
    pub mode: ErsMode,
    pub battery_temp: f64,
    pub deployed: bool,
}

/// * `wear` - (%) Accumulated engine wear
#[derive(Debug, Clone, Serialize)]
pub struct EngineState {
    pub mode: EngineMode,
    pub temperature: f64,
    pub wear: f64,
}

/// * `temps` - (°C) Brake temperatures FL, FR, RL, RR
/// * `condition` - (%) Remaining brake material
#[derive(Debug, Clone, Serialize)]
pub struct BrakeState {
    pub temps: [f64; 4],
    pub condition: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DamageLocation {
    FrontWing,
    RearWing,
    Floor,
    Suspension,
}

impl DamageLocation {
    const ALL: [DamageLocation; 4] = [
        DamageLocation::FrontWing,
        DamageLocation::RearWing,
        DamageLocation::Floor,
        DamageLocation::Suspension,
    ];

    /// Draws a location, front wing damage being the most frequent.
    pub fn random(rng: &mut RaceRng) -> DamageLocation {
        DamageLocation::ALL[rng.weighted_index(&[0.4, 0.2, 0.2, 0.2])]
    }
}

impl fmt::Display for DamageLocation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DamageLocation::FrontWing => write!(f, "front wing"),
            DamageLocation::RearWing => write!(f, "rear wing"),
            DamageLocation::Floor => write!(f, "floor"),
            DamageLocation::Suspension => write!(f, "suspension"),
        }
    }
}

/// Damage in percent, in total and itemized by location.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Damage {
    pub total: f64,
    pub front_wing: f64,
    pub rear_wing: f64,
    pub floor: f64,
    pub suspension: f64,
}

impl Damage {
    pub fn apply(&mut self, location: DamageLocation, amount: f64) {
        let amount = amount.max(0.0);
        let slot = match location {
            DamageLocation::FrontWing => &mut self.front_wing,
            DamageLocation::RearWing => &mut self.rear_wing,
            DamageLocation::Floor => &mut self.floor,
            DamageLocation::Suspension => &mut self.suspension,
        };
        *slot = clamp_pct(*slot + amount);
        self.total = clamp_pct(self.total + amount);
    }

    /// Repairs up to `amount` percent, spread proportionally over the damaged parts. Returns the
    /// repaired amount.
    pub fn repair(&mut self, amount: f64) -> f64 {
        let repaired = amount.clamp(0.0, self.total);
        if self.total <= 0.0 || repaired <= 0.0 {
            return 0.0;
        }
        let keep = 1.0 - repaired / self.total;
        self.front_wing = clamp_pct(self.front_wing * keep);
        self.rear_wing = clamp_pct(self.rear_wing * keep);
        self.floor = clamp_pct(self.floor * keep);
        self.suspension = clamp_pct(self.suspension * keep);
        self.total = clamp_pct(self.total - repaired);
        repaired
    }
}

// -------------------------------------------------------------------------------------------------
// RESOURCE UPDATES --------------------------------------------------------------------------------
// -------------------------------------------------------------------------------------------------

/// update_fuel burns the fuel of one lap. A competitor whose load drops below the minimum stops
/// on track. Must run before update_engine.
pub fn update_fuel(
    comp: &mut Competitor,
    ctx: &LapContext,
    consts: &SimConstants,
    events: &mut Vec<RaceEvent>,
) {
    if comp.is_dnf() {
        return;
    }

    let mut consumption = consts.base_fuel_per_lap
        * ctx.track.fuel_usage
        * (comp.fuel.mix / 50.0).max(0.2)
        * (comp.push / 50.0).max(0.2)
        * rating_factor(comp.car.fuel_efficiency)
        * comp.engine.mode.fuel_factor()
        * (1.0 - comp.driver.fuel_management / 400.0);

    consumption *= match ctx.flag {
        FlagState::Vsc => consts.fuel_vsc_mult,
        FlagState::Sc => consts.fuel_sc_mult,
        _ => 1.0,
    };

    comp.fuel.consumption = consumption;
    comp.fuel.load = clamp_pct(comp.fuel.load - consumption);

    if comp.fuel.load < consts.min_fuel_load && comp.retire(DnfReason::OutOfFuel) {
        events.push(RaceEvent::new(
            ctx.lap,
            vec![comp.id],
            RaceEventKind::Retirement {
                name: comp.name.to_owned(),
                reason: DnfReason::OutOfFuel,
            },
        ));
    }
}

/// update_ers charges or deploys the battery according to the selected mode. Deploying without
/// sufficient charge reverts the mode to balanced.
pub fn update_ers(comp: &mut Competitor, consts: &SimConstants, rng: &mut RaceRng) {
    if comp.is_dnf() {
        return;
    }

    let ers_power = comp.car.ers_power;
    let cooling = comp.car.cooling;
    let ers = &mut comp.ers;
    ers.deployed = false;

    let heat = match ers.mode {
        ErsMode::Charge => {
            ers.charge += consts.ers_charge_flat + ers_power * 0.06;
            3.0
        }
        ErsMode::Balanced => {
            ers.charge += 3.0;
            0.0
        }
        ErsMode::Deploy => {
            if ers.charge >= consts.ers_min_deploy_charge {
                ers.charge -= rng.uniform(consts.ers_deploy_min_spend, consts.ers_deploy_max_spend);
                ers.deployed = true;
                8.0
            } else {
                ers.mode = ErsMode::Balanced;
                0.0
            }
        }
    };

    ers.battery_temp = (ers.battery_temp + heat - (ers.battery_temp - 40.0) * (0.1 + cooling / 500.0))
        .clamp(20.0, 120.0);

    if ers.battery_temp > consts.ers_battery_overheat_temp {
        ers.charge -= consts.ers_overheat_charge_loss;
    }

    ers.charge = clamp_pct(ers.charge);
}

/// update_engine heats up and wears the engine according to the engine mode. Above the critical
/// temperature each lap carries a small chance of a terminal failure.
pub fn update_engine(
    comp: &mut Competitor,
    ctx: &LapContext,
    consts: &SimConstants,
    rng: &mut RaceRng,
    events: &mut Vec<RaceEvent>,
) {
    if comp.is_dnf() {
        return;
    }

    let engine = &mut comp.engine;
    let mut heat = match engine.mode {
        EngineMode::Eco => -4.0,
        EngineMode::Balanced => {
            if engine.temperature > 100.0 {
                -1.0
            } else {
                1.0
            }
        }
        EngineMode::Overtake => 6.0,
    } + (ctx.track_temp - 30.0) * 0.1;

    if ctx.caution() {
        heat -= 3.0;
    }

    // cooling attenuates heating and accelerates cooling down
    heat *= if heat > 0.0 {
        rating_factor(comp.car.cooling)
    } else {
        0.5 + comp.car.cooling / 100.0
    };

    engine.temperature = (engine.temperature + heat).clamp(60.0, 140.0);

    let base_wear = match engine.mode {
        EngineMode::Eco => 0.05,
        EngineMode::Balanced => 0.1,
        EngineMode::Overtake => 0.3,
    };
    engine.wear = clamp_pct(engine.wear + base_wear * (1.0 + (engine.temperature - 105.0).max(0.0) / 20.0));

    if engine.temperature > consts.engine_critical_temp
        && rng.chance(consts.engine_critical_failure_chance)
        && comp.retire(DnfReason::EngineFailure)
    {
        events.push(RaceEvent::new(
            ctx.lap,
            vec![comp.id],
            RaceEventKind::Retirement {
                name: comp.name.to_owned(),
                reason: DnfReason::EngineFailure,
            },
        ));
    }
}

/// update_brakes heats the brakes under push and cools them otherwise. Overheated brakes lose
/// material, and worn brakes can damage the suspension.
pub fn update_brakes(
    comp: &mut Competitor,
    ctx: &LapContext,
    consts: &SimConstants,
    rng: &mut RaceRng,
    events: &mut Vec<RaceEvent>,
) {
    if comp.is_dnf() {
        return;
    }

    let push = comp.push;
    let mut target = (300.0 + push * 6.0 + comp.car.brake_power) * (1.1 - comp.car.cooling / 500.0);
    if ctx.caution() {
        target *= 0.7;
    }
    let rate = if push > consts.brake_high_push { 0.6 } else { 0.4 };

    let brakes = &mut comp.brakes;
    for (i, temp) in brakes.temps.iter_mut().enumerate() {
        let corner_target = if i < 2 { target * 1.1 } else { target * 0.9 };
        *temp += (corner_target - *temp) * rate;
    }

    let overheat: f64 = brakes
        .temps
        .iter()
        .map(|t| (t - consts.brake_overheat_temp).max(0.0) / 200.0)
        .sum();
    brakes.condition = clamp_pct(brakes.condition - 0.2 * push / 50.0 - overheat);

    if brakes.condition < consts.brake_wear_threshold {
        let p = consts.brake_suspension_damage_chance
            * (consts.brake_wear_threshold - brakes.condition)
            / consts.brake_wear_threshold;
        if rng.chance(p) {
            comp.damage.apply(DamageLocation::Suspension, 5.0);
            events.push(RaceEvent::new(
                ctx.lap,
                vec![comp.id],
                RaceEventKind::SuspensionDamage {
                    name: comp.name.to_owned(),
                },
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::competitor::tests::test_competitor;
    use crate::core::track::Track;
    use crate::core::weather::WeatherState;
    use approx::assert_relative_eq;

    fn ctx(track: &Track, flag: FlagState) -> LapContext<'_> {
        LapContext {
            track,
            lap: 10,
            tot_no_laps: 50,
            weather: WeatherState::Clear,
            track_temp: 30.0,
            grip: 100.0,
            flag,
            drs_enabled: true,
        }
    }

    #[test]
    fn rating_factor_is_one_at_nominal() {
        assert_relative_eq!(rating_factor(50.0), 1.0);
        assert_relative_eq!(rating_factor(100.0), 0.5);
        assert_relative_eq!(rating_factor(150.0), 0.5);
    }

    #[test]
    fn low_fuel_retires_competitor() {
        let track = Track::lookup("monza").unwrap();
        let consts = SimConstants::default();
        let mut comp = test_competitor(7, 50.0, 50.0);
        comp.fuel.load = 4.0;
        let mut events = Vec::new();

        update_fuel(&mut comp, &ctx(&track, FlagState::G), &consts, &mut events);
        assert_eq!(comp.dnf_reason(), Some(DnfReason::OutOfFuel));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].to_string(), "Lap 10: Driver 7 retires (out of fuel)");
    }

    #[test]
    fn safety_car_quarters_consumption() {
        let track = Track::lookup("monza").unwrap();
        let consts = SimConstants::default();
        let mut green = test_competitor(1, 50.0, 50.0);
        let mut sc = test_competitor(2, 50.0, 50.0);
        let mut events = Vec::new();

        update_fuel(&mut green, &ctx(&track, FlagState::G), &consts, &mut events);
        update_fuel(&mut sc, &ctx(&track, FlagState::Sc), &consts, &mut events);
        assert_relative_eq!(sc.fuel.consumption, green.fuel.consumption * 0.25, epsilon = 1e-12);
    }

    #[test]
    fn deploy_without_charge_reverts_to_balanced() {
        let consts = SimConstants::default();
        let mut rng = RaceRng::from_seed(1);
        let mut comp = test_competitor(1, 50.0, 50.0);
        comp.ers.mode = ErsMode::Deploy;
        comp.ers.charge = 5.0;

        update_ers(&mut comp, &consts, &mut rng);
        assert_eq!(comp.ers.mode, ErsMode::Balanced);
        assert!(!comp.ers.deployed);

        comp.ers.mode = ErsMode::Deploy;
        comp.ers.charge = 60.0;
        update_ers(&mut comp, &consts, &mut rng);
        assert!(comp.ers.deployed);
        assert!(comp.ers.charge <= 50.0 && comp.ers.charge >= 46.0);
    }

    #[test]
    fn overtake_mode_heats_and_wears_engine_fastest() {
        let track = Track::lookup("monza").unwrap();
        let consts = SimConstants::default();
        let ctx = ctx(&track, FlagState::G);
        let mut rng = RaceRng::from_seed(1);
        let mut events = Vec::new();

        let mut eco = test_competitor(1, 50.0, 50.0);
        eco.engine.mode = EngineMode::Eco;
        let mut ot = test_competitor(2, 50.0, 50.0);
        ot.engine.mode = EngineMode::Overtake;

        update_engine(&mut eco, &ctx, &consts, &mut rng, &mut events);
        update_engine(&mut ot, &ctx, &consts, &mut rng, &mut events);
        assert!(ot.engine.temperature > eco.engine.temperature);
        assert!(ot.engine.wear > eco.engine.wear);
    }

    #[test]
    fn damage_repair_is_proportional() {
        let mut damage = Damage::default();
        damage.apply(DamageLocation::FrontWing, 30.0);
        damage.apply(DamageLocation::Floor, 10.0);
        let repaired = damage.repair(20.0);
        assert_relative_eq!(repaired, 20.0);
        assert_relative_eq!(damage.total, 20.0);
        assert_relative_eq!(damage.front_wing, 15.0);
        assert_relative_eq!(damage.floor, 5.0);
    }
}
