use crate::core::race::FlagState;
use helpers::general::clamp_pct;
use serde::{Deserialize, Serialize};

/// Innate driver skills, all on a 0-100 scale.
///
/// * `skill` - Overall driving skill
/// * `aggression` - Willingness to force overtakes (raises contact risk)
/// * `consistency` - Lap-to-lap consistency, the lap jitter scales with `100 - consistency`
/// * `rain_skill` - Skill on a wet track
/// * `overtaking` - Attacking skill in a duel
/// * `defending` - Defending skill in a duel
/// * `qualifying` - One-lap pace
/// * `tire_management` - Reduces tire wear
/// * `fuel_management` - Reduces fuel consumption
/// * `racecraft` - General wheel-to-wheel and strategic awareness
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DriverPars {
    pub skill: f64,
    #[serde(default = "default_rating")]
    pub aggression: f64,
    #[serde(default = "default_rating")]
    pub consistency: f64,
    #[serde(default = "default_rating")]
    pub rain_skill: f64,
    #[serde(default = "default_rating")]
    pub overtaking: f64,
    #[serde(default = "default_rating")]
    pub defending: f64,
    #[serde(default = "default_rating")]
    pub qualifying: f64,
    #[serde(default = "default_rating")]
    pub tire_management: f64,
    #[serde(default = "default_rating")]
    pub fuel_management: f64,
    #[serde(default = "default_rating")]
    pub racecraft: f64,
}

fn default_rating() -> f64 {
    50.0
}

impl DriverPars {
    /// Driver with every skill set to the same value.
    pub fn uniform(rating: f64) -> DriverPars {
        DriverPars {
            skill: rating,
            aggression: rating,
            consistency: rating,
            rain_skill: rating,
            overtaking: rating,
            defending: rating,
            qualifying: rating,
            tire_management: rating,
            fuel_management: rating,
            racecraft: rating,
        }
    }

    /// Skill that applies in the given conditions (averaged with the rain skill on a wet track).
    pub fn effective_skill(&self, wet: bool) -> f64 {
        if wet {
            0.5 * self.skill + 0.5 * self.rain_skill
        } else {
            self.skill
        }
    }

    /// Named attribute list used for input validation.
    pub fn attributes(&self) -> [(&'static str, f64); 10] {
        [
            ("skill", self.skill),
            ("aggression", self.aggression),
            ("consistency", self.consistency),
            ("rain_skill", self.rain_skill),
            ("overtaking", self.overtaking),
            ("defending", self.defending),
            ("qualifying", self.qualifying),
            ("tire_management", self.tire_management),
            ("fuel_management", self.fuel_management),
            ("racecraft", self.racecraft),
        ]
    }
}

/// Psychological state of a driver, all values 0-100.
#[derive(Debug, Clone, Serialize)]
pub struct Psyche {
    pub focus: f64,
    pub fatigue: f64,
    pub confidence: f64,
}

impl Default for Psyche {
    fn default() -> Self {
        Psyche {
            focus: 90.0,
            fatigue: 0.0,
            confidence: 60.0,
        }
    }
}

impl Psyche {
    /// drive_lap accumulates fatigue and lets the focus drift toward what the fatigue allows.
    pub fn drive_lap(&mut self, push: f64, flag_state: &FlagState) {
        let mut fatigue_gain = 0.4;
        if push > 70.0 {
            fatigue_gain += 0.3;
        }
        if matches!(flag_state, FlagState::Sc | FlagState::Vsc) {
            fatigue_gain = -1.0;
        }
        self.fatigue = clamp_pct(self.fatigue + fatigue_gain);

        let focus_target = 100.0 - self.fatigue / 2.0;
        self.focus = clamp_pct(self.focus + (focus_target - self.focus) * 0.2);
    }

    pub fn adjust_confidence(&mut self, delta: f64) {
        self.confidence = clamp_pct(self.confidence + delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rain_skill_only_counts_when_wet() {
        let mut pars = DriverPars::uniform(60.0);
        pars.rain_skill = 100.0;
        assert_relative_eq!(pars.effective_skill(false), 60.0);
        assert_relative_eq!(pars.effective_skill(true), 80.0);
    }

    #[test]
    fn fatigue_grows_and_recovers_under_caution() {
        let mut psyche = Psyche::default();
        for _ in 0..10 {
            psyche.drive_lap(80.0, &FlagState::G);
        }
        assert_relative_eq!(psyche.fatigue, 7.0, epsilon = 1e-9);
        psyche.drive_lap(50.0, &FlagState::Sc);
        assert_relative_eq!(psyche.fatigue, 6.0, epsilon = 1e-9);
        assert!(psyche.focus <= 100.0 && psyche.focus >= 0.0);
    }

    #[test]
    fn confidence_is_clamped() {
        let mut psyche = Psyche::default();
        psyche.adjust_confidence(500.0);
        assert_relative_eq!(psyche.confidence, 100.0);
    }
}
