//! Duels between directly following competitors.
//!
//! The duel state of a pair is derived from the freshly computed classification: a gap below
//! `battle_gap` puts the pair into battle, a gap below `attempt_gap` turns the battle into an
//! overtake attempt that is resolved in the same lap.

use crate::core::car::DamageLocation;
use crate::core::competitor::{Competitor, CompetitorIdx, DnfReason, DuelLink, DuelPhase};
use crate::core::incidents::Caution;
use crate::core::race::LapContext;
use crate::core::rng::RaceRng;
use crate::core::sim_constants::SimConstants;
use crate::interfaces::lap_report::{OvertakeKind, RaceEvent, RaceEventKind};
use serde::Serialize;

/// (s) Margin by which a passed competitor ends up behind the attacker
const PASS_MARGIN: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DuelOutcome {
    CleanPass,
    SideBySidePass,
    SideBySideHeld,
    AggressivePass,
    Contact { penalty: bool },
    FailedAttempt,
}

impl DuelOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(
            self,
            DuelOutcome::CleanPass | DuelOutcome::SideBySidePass | DuelOutcome::AggressivePass
        )
    }

    /// Failed and held attempts keep the pair in battle, all other outcomes end the duel.
    pub fn keeps_battle(&self) -> bool {
        matches!(self, DuelOutcome::FailedAttempt | DuelOutcome::SideBySideHeld)
    }
}

/// Result of the duel phase of one lap.
///
/// * `outcomes` - Resolved attempts as (front, rear, outcome) roster indices
/// * `caution` - Caution period requested by a retirement after contact
#[derive(Debug, Clone, Default)]
pub struct DuelResolution {
    pub outcomes: Vec<(CompetitorIdx, CompetitorIdx, DuelOutcome)>,
    pub caution: Option<Caution>,
}

/// Returns mutable references to two distinct competitors of the roster.
pub fn pair_mut(
    comps: &mut [Competitor],
    a: CompetitorIdx,
    b: CompetitorIdx,
) -> Option<(&mut Competitor, &mut Competitor)> {
    if a == b || a >= comps.len() || b >= comps.len() {
        return None;
    }
    if a < b {
        let (left, right) = comps.split_at_mut(b);
        Some((&mut left[a], &mut right[0]))
    } else {
        let (left, right) = comps.split_at_mut(a);
        Some((&mut right[0], &mut left[b]))
    }
}

/// update_duel_states links every running competitor that is closer than `battle_gap` to the car
/// ahead. `order` contains the roster indices of the running competitors in classification order.
pub fn update_duel_states(comps: &mut [Competitor], order: &[CompetitorIdx], consts: &SimConstants) {
    for &idx in order.iter() {
        comps[idx].duel = None;
    }

    for pair in order.windows(2) {
        let (front, rear) = (pair[0], pair[1]);
        let gap = comps[rear].timing.elapsed - comps[front].timing.elapsed;
        if !(gap < consts.battle_gap) {
            continue;
        }

        let phase = if gap < consts.attempt_gap {
            DuelPhase::OvertakeAttempt
        } else {
            DuelPhase::Battle
        };

        comps[rear].duel = Some(DuelLink { opponent: front, attacking: true, phase });
        if comps[front].duel.is_none() {
            comps[front].duel = Some(DuelLink { opponent: rear, attacking: false, phase });
        }
    }
}

/// overtake_probability returns the chance (%) that an attempt of `att` on `def` succeeds, clamped
/// to [overtake_min_prob, overtake_max_prob].
pub fn overtake_probability(
    att: &Competitor,
    def: &Competitor,
    ctx: &LapContext,
    consts: &SimConstants,
) -> f64 {
    let wet = ctx.weather.is_wet();
    let mut p = 100.0 - ctx.track.overtake_difficulty;

    p += (att.dps - def.dps) * consts.overtake_score_weight;

    if att.drs_available && ctx.drs_enabled && !wet {
        p += consts.overtake_drs_bonus;
    }

    p += if att.ers.charge > 60.0 {
        6.0
    } else if att.ers.charge > 30.0 {
        3.0
    } else {
        0.0
    };

    p += (att.tires.condition - def.tires.condition) * consts.overtake_tire_weight;

    if att.slipstream {
        p += consts.overtake_slipstream_bonus;
    }

    p += (att.driver.overtaking - def.driver.defending) / 100.0 * consts.overtake_skill_weight;
    p += (att.driver.aggression - 50.0) * 0.1;

    if wet {
        p += (att.driver.rain_skill - def.driver.rain_skill) * 0.1;
    }

    if p.is_finite() {
        p.clamp(consts.overtake_min_prob, consts.overtake_max_prob)
    } else {
        consts.overtake_min_prob
    }
}

/// Weights of the clean / side-by-side / aggressive / contact / failed outcomes.
pub fn outcome_weights(p: f64, att: &Competitor, ctx: &LapContext, consts: &SimConstants) -> [f64; 5] {
    let aggression = 0.5 + att.driver.aggression / 100.0;
    let rain = ctx.weather.crash_multiplier();
    [
        p * 0.6 / aggression,
        p * 0.25,
        p * 0.15 * aggression * rain,
        consts.contact_base_weight * aggression * rain,
        100.0 - p,
    ]
}

/// draw_outcome draws the outcome of an overtake attempt.
pub fn draw_outcome(
    att: &Competitor,
    def: &Competitor,
    ctx: &LapContext,
    consts: &SimConstants,
    rng: &mut RaceRng,
) -> DuelOutcome {
    let p = overtake_probability(att, def, ctx, consts);
    match rng.weighted_index(&outcome_weights(p, att, ctx, consts)) {
        0 => DuelOutcome::CleanPass,
        1 => {
            if rng.chance(p / 100.0) {
                DuelOutcome::SideBySidePass
            } else {
                DuelOutcome::SideBySideHeld
            }
        }
        2 => DuelOutcome::AggressivePass,
        3 => DuelOutcome::Contact {
            penalty: rng.chance(consts.contact_penalty_chance),
        },
        _ => DuelOutcome::FailedAttempt,
    }
}

/// resolve_duels resolves the overtake attempts of the lap from the front to the back. A competitor
/// takes part in at most one attempt per lap.
pub fn resolve_duels(
    comps: &mut [Competitor],
    order: &[CompetitorIdx],
    ctx: &LapContext,
    consts: &SimConstants,
    rng: &mut RaceRng,
    events: &mut Vec<RaceEvent>,
) -> DuelResolution {
    let mut resolution = DuelResolution::default();
    let mut involved = vec![false; comps.len()];

    for (i, pair) in order.windows(2).enumerate() {
        let (front, rear) = (pair[0], pair[1]);
        if involved[front] || involved[rear] {
            continue;
        }
        let attempt = matches!(
            comps[rear].duel,
            Some(DuelLink { opponent, attacking: true, phase: DuelPhase::OvertakeAttempt }) if opponent == front
        );
        if !attempt {
            continue;
        }

        let next_elapsed = order
            .get(i + 2)
            .map(|&next| &comps[next])
            .filter(|next| !next.is_dnf())
            .map(|next| next.timing.elapsed);

        let (def, att) = match pair_mut(comps, front, rear) {
            Some(pair) => pair,
            None => continue,
        };
        if att.is_dnf() || def.is_dnf() {
            continue;
        }

        let outcome = draw_outcome(att, def, ctx, consts, rng);
        let caution = apply_outcome(att, def, outcome, next_elapsed, ctx, consts, rng, events);
        resolution.caution = Caution::merge(resolution.caution, caution);

        if !outcome.keeps_battle() {
            att.duel = None;
            def.duel = None;
        }

        involved[front] = true;
        involved[rear] = true;
        resolution.outcomes.push((front, rear, outcome));
    }

    resolution
}

/// Applies the outcome of an attempt. `next_elapsed` is the elapsed time of the running competitor
/// behind the attacker, a pass never moves either party of the duel behind it.
#[allow(clippy::too_many_arguments)]
fn apply_outcome(
    att: &mut Competitor,
    def: &mut Competitor,
    outcome: DuelOutcome,
    next_elapsed: Option<f64>,
    ctx: &LapContext,
    consts: &SimConstants,
    rng: &mut RaceRng,
    events: &mut Vec<RaceEvent>,
) -> Option<Caution> {
    let lap = ctx.lap;
    let cars = vec![att.id, def.id];

    match outcome {
        DuelOutcome::CleanPass | DuelOutcome::SideBySidePass | DuelOutcome::AggressivePass => {
            let (kind, defender_margin, attacker_loss): (_, f64, f64) = match outcome {
                DuelOutcome::CleanPass => (OvertakeKind::Clean, PASS_MARGIN, 0.0),
                DuelOutcome::SideBySidePass => (OvertakeKind::SideBySide, PASS_MARGIN, 0.3),
                _ => (OvertakeKind::Aggressive, 2.0 * PASS_MARGIN, 0.1),
            };
            let (attacker_loss, defender_margin) = match next_elapsed {
                Some(next) => {
                    let room = (next - att.timing.elapsed).max(0.0);
                    let attacker_loss = attacker_loss.min(room / 3.0);
                    (attacker_loss, defender_margin.min((room - attacker_loss) / 2.0))
                }
                None => (attacker_loss, defender_margin),
            };
            att.add_time(attacker_loss);
            let deficit = att.timing.elapsed - def.timing.elapsed + defender_margin;
            def.add_time(deficit);

            att.stats.overtakes_made += 1;
            def.stats.overtakes_lost += 1;
            att.psyche.adjust_confidence(4.0);
            def.psyche.adjust_confidence(-3.0);

            events.push(RaceEvent::new(
                lap,
                cars,
                RaceEventKind::Overtake {
                    attacker: att.name.to_owned(),
                    defender: def.name.to_owned(),
                    kind,
                },
            ));
            None
        }
        DuelOutcome::SideBySideHeld => {
            att.add_time(0.3);
            def.add_time(0.2);
            events.push(RaceEvent::new(
                lap,
                cars,
                RaceEventKind::HeldPosition {
                    attacker: att.name.to_owned(),
                    defender: def.name.to_owned(),
                },
            ));
            None
        }
        DuelOutcome::FailedAttempt => {
            att.add_time(0.2);
            events.push(RaceEvent::new(
                lap,
                cars,
                RaceEventKind::FailedAttempt {
                    attacker: att.name.to_owned(),
                    defender: def.name.to_owned(),
                },
            ));
            None
        }
        DuelOutcome::Contact { penalty } => {
            let amount = rng.uniform(5.0, 20.0);
            att.damage.apply(DamageLocation::random(rng), amount);
            def.damage.apply(DamageLocation::random(rng), amount * consts.contact_defender_share);
            att.add_time(rng.uniform(1.0, 3.0));
            def.add_time(rng.uniform(1.0, 3.0));
            if penalty {
                att.penalty_pending += consts.contact_penalty;
            }
            att.psyche.adjust_confidence(-3.0);
            def.psyche.adjust_confidence(-3.0);

            events.push(RaceEvent::new(
                lap,
                cars,
                RaceEventKind::Contact {
                    attacker: att.name.to_owned(),
                    defender: def.name.to_owned(),
                    penalty,
                },
            ));

            let mut caution = None;
            for comp in [att, def] {
                if comp.damage.total >= consts.dnf_damage && comp.retire(DnfReason::Damage) {
                    events.push(RaceEvent::new(
                        lap,
                        vec![comp.id],
                        RaceEventKind::Retirement {
                            name: comp.name.to_owned(),
                            reason: DnfReason::Damage,
                        },
                    ));
                    caution = Some(Caution::Sc);
                }
            }
            caution
        }
    }
}

/// update_following_flags sets the DRS and slipstream flags of every running competitor from the
/// gap to the car ahead. DRS needs the race to allow it and a dry track.
pub fn update_following_flags(
    comps: &mut [Competitor],
    order: &[CompetitorIdx],
    ctx: &LapContext,
    consts: &SimConstants,
) {
    let drs_possible = ctx.drs_enabled && ctx.track.drs_zones > 0 && !ctx.weather.is_wet();

    for (pos, &idx) in order.iter().enumerate() {
        let gap = if pos == 0 {
            f64::INFINITY
        } else {
            comps[idx].timing.elapsed - comps[order[pos - 1]].timing.elapsed
        };
        let comp = &mut comps[idx];
        comp.drs_available = drs_possible && gap < consts.drs_gap;
        comp.slipstream = !ctx.caution() && gap < consts.slipstream_gap;
    }
}
