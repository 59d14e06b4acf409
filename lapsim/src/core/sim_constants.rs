use serde::{Deserialize, Serialize};

/// Tunable constants of the resource, performance, duel, incident and strategy models. The values
/// are a calibrated starting point rather than invariants, therefore all of them can be overridden
/// from a JSON file (missing keys keep their default).
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SimConstants {
    // TIRES ---------------------------------------------------------------------------------------
    /// (%/lap) Base tire wear before track, compound, car and driver factors
    pub base_tire_wear: f64,
    /// (°C) Optimal tire temperature
    pub tire_optimal_temp: f64,
    pub tire_battle_wear_mult: f64,
    pub tire_lockup_wear_mult: f64,
    pub tire_wrong_compound_wear_mult: f64,
    /// Upper bound of the combined situational wear multiplier
    pub tire_max_situational_mult: f64,
    pub tire_caution_wear_mult: f64,

    // FUEL ----------------------------------------------------------------------------------------
    /// (%/lap) Base fuel consumption
    pub base_fuel_per_lap: f64,
    /// (%) Fuel load below which the car stops on track
    pub min_fuel_load: f64,
    pub fuel_vsc_mult: f64,
    pub fuel_sc_mult: f64,
    /// (s per % fuel) Lap time penalty of the fuel mass
    pub fuel_mass_penalty: f64,

    // ERS -----------------------------------------------------------------------------------------
    pub ers_min_deploy_charge: f64,
    pub ers_deploy_min_spend: f64,
    pub ers_deploy_max_spend: f64,
    pub ers_charge_flat: f64,
    pub ers_battery_overheat_temp: f64,
    pub ers_overheat_charge_loss: f64,

    // ENGINE --------------------------------------------------------------------------------------
    pub engine_critical_temp: f64,
    pub engine_critical_failure_chance: f64,

    // BRAKES --------------------------------------------------------------------------------------
    pub brake_high_push: f64,
    pub brake_overheat_temp: f64,
    pub brake_wear_threshold: f64,
    pub brake_suspension_damage_chance: f64,

    // PERFORMANCE ---------------------------------------------------------------------------------
    /// Conversion of the drive performance score into seconds (lap time = base - score * x / 10)
    pub score_to_seconds: f64,
    /// Standard deviation of the lap jitter per point of missing consistency
    pub jitter_per_inconsistency: f64,
    pub min_laptime_frac: f64,
    pub vsc_laptime_frac: f64,
    pub sc_laptime_frac: f64,
    pub drs_score_bonus: f64,
    pub slipstream_score_bonus: f64,
    pub ers_deploy_score_bonus: f64,

    // DUELS ---------------------------------------------------------------------------------------
    /// (s) Gap below which two cars are battling
    pub battle_gap: f64,
    /// (s) Gap below which the attacker tries to overtake
    pub attempt_gap: f64,
    /// (s) Gap below which DRS becomes available
    pub drs_gap: f64,
    /// (s) Gap below which the follower profits from the slipstream
    pub slipstream_gap: f64,
    pub drs_enabled_from_lap: u32,
    pub overtake_score_weight: f64,
    pub overtake_drs_bonus: f64,
    pub overtake_slipstream_bonus: f64,
    pub overtake_tire_weight: f64,
    pub overtake_skill_weight: f64,
    pub overtake_min_prob: f64,
    pub overtake_max_prob: f64,
    pub contact_base_weight: f64,
    /// Share of the contact damage that the defender receives
    pub contact_defender_share: f64,
    pub contact_penalty_chance: f64,
    /// (s) Time penalty handed out after causing contact
    pub contact_penalty: f64,
    /// (%) Accumulated damage that ends the race
    pub dnf_damage: f64,

    // INCIDENTS -----------------------------------------------------------------------------------
    pub base_crash_chance: f64,
    pub max_crash_chance: f64,
    pub wrong_compound_crash_mult: f64,
    pub street_circuit_crash_mult: f64,
    pub caution_crash_mult: f64,
    pub base_failure_chance: f64,
    pub engine_wear_failure_chance: f64,
    pub failure_vsc_chance: f64,
    pub sc_min_laps: u32,
    pub sc_max_laps: u32,
    pub vsc_min_laps: u32,
    pub vsc_max_laps: u32,

    // STRATEGY / PIT STOP -------------------------------------------------------------------------
    pub pit_condition_threshold: f64,
    pub pit_condition_under_caution: f64,
    /// (s) Pit lane time loss incl. standstill
    pub pit_base_time: f64,
    pub pit_crew_variance: f64,
    pub pit_caution_traffic: f64,
    /// (%) Fuel added at every stop
    pub pit_refuel: f64,
    pub pit_repair_fraction: f64,
    /// (%) Maximum damage repaired during one stop
    pub pit_max_repair: f64,
}

impl Default for SimConstants {
    fn default() -> Self {
        SimConstants {
            base_tire_wear: 1.6,
            tire_optimal_temp: 90.0,
            tire_battle_wear_mult: 2.0,
            tire_lockup_wear_mult: 3.0,
            tire_wrong_compound_wear_mult: 5.0,
            tire_max_situational_mult: 5.0,
            tire_caution_wear_mult: 0.3,

            base_fuel_per_lap: 1.5,
            min_fuel_load: 5.0,
            fuel_vsc_mult: 0.5,
            fuel_sc_mult: 0.25,
            fuel_mass_penalty: 0.03,

            ers_min_deploy_charge: 12.0,
            ers_deploy_min_spend: 10.0,
            ers_deploy_max_spend: 14.0,
            ers_charge_flat: 6.0,
            ers_battery_overheat_temp: 80.0,
            ers_overheat_charge_loss: 5.0,

            engine_critical_temp: 115.0,
            engine_critical_failure_chance: 0.02,

            brake_high_push: 70.0,
            brake_overheat_temp: 800.0,
            brake_wear_threshold: 30.0,
            brake_suspension_damage_chance: 0.1,

            score_to_seconds: 1.0,
            jitter_per_inconsistency: 0.04,
            min_laptime_frac: 0.75,
            vsc_laptime_frac: 1.3,
            sc_laptime_frac: 1.4,
            drs_score_bonus: 2.0,
            slipstream_score_bonus: 1.5,
            ers_deploy_score_bonus: 1.5,

            battle_gap: 0.8,
            attempt_gap: 0.3,
            drs_gap: 1.0,
            slipstream_gap: 0.5,
            drs_enabled_from_lap: 3,
            overtake_score_weight: 2.5,
            overtake_drs_bonus: 15.0,
            overtake_slipstream_bonus: 8.0,
            overtake_tire_weight: 0.35,
            overtake_skill_weight: 15.0,
            overtake_min_prob: 3.0,
            overtake_max_prob: 97.0,
            contact_base_weight: 4.0,
            contact_defender_share: 0.6,
            contact_penalty_chance: 0.5,
            contact_penalty: 5.0,
            dnf_damage: 80.0,

            base_crash_chance: 0.002,
            max_crash_chance: 0.5,
            wrong_compound_crash_mult: 2.5,
            street_circuit_crash_mult: 1.5,
            caution_crash_mult: 0.3,
            base_failure_chance: 0.0008,
            engine_wear_failure_chance: 0.01,
            failure_vsc_chance: 0.4,
            sc_min_laps: 3,
            sc_max_laps: 5,
            vsc_min_laps: 2,
            vsc_max_laps: 3,

            pit_condition_threshold: 12.0,
            pit_condition_under_caution: 20.0,
            pit_base_time: 22.0,
            pit_crew_variance: 1.5,
            pit_caution_traffic: 3.0,
            pit_refuel: 25.0,
            pit_repair_fraction: 0.5,
            pit_max_repair: 25.0,
        }
    }
}
