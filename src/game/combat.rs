//! Combat & Progression
//!
//! Damage resolution, death, class promotion and respawn. Pure functions
//! over [`Player`]; notification and persistence happen in the caller.

use crate::core::rng::SpawnRng;
use crate::game::content::{ClassTier, ProgressionTable};
use crate::game::state::{Player, MAX_HUNGER};

/// Side of the square, centered on the origin, that players spawn in.
pub const SPAWN_AREA_SIDE: f64 = 2000.0;

/// XP awarded per kill.
pub const KILL_XP: u32 = 50;

/// HP granted to a killer whose class changes, capped at the new max.
pub const CLASS_CHANGE_HP_BONUS: i32 = 40;

/// `max(1, attacker.damage - defender.defense)`.
#[inline]
pub fn damage(attacker: &ClassTier, defender: &ClassTier) -> i32 {
    (attacker.damage - defender.defense).max(1)
}

/// Random spawn position.
pub fn spawn_point(rng: &mut SpawnRng) -> (f64, f64) {
    rng.point_in_square(SPAWN_AREA_SIDE)
}

/// A killer's class transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassChange {
    pub from: usize,
    pub to: usize,
}

/// What a death did beyond the victim's respawn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeathOutcome {
    /// Set when a killer exists and their class changed.
    pub class_change: Option<ClassChange>,
}

/// Resolve a death and respawn the victim.
///
/// With a killer: the killer is credited (kills, xp) and their class is
/// re-evaluated. A victim in a strictly higher class hands that class to
/// the killer; otherwise the killer's class follows their kill count.
/// Without a killer (starvation) only the victim side runs.
///
/// Either way the victim's deaths go up by one, they get a new spawn
/// point, full hp for their own tier and full hunger. Their kills and
/// class are untouched.
pub fn resolve_death(
    victim: &mut Player,
    killer: Option<&mut Player>,
    classes: &ProgressionTable,
    rng: &mut SpawnRng,
) -> DeathOutcome {
    victim.hp = 0;
    victim.deaths = victim.deaths.saturating_add(1);

    let mut outcome = DeathOutcome::default();

    if let Some(killer) = killer {
        killer.kills = killer.kills.saturating_add(1);
        killer.xp = killer.xp.saturating_add(KILL_XP);

        let before = killer.class_id;
        let next = if victim.class_id > killer.class_id {
            classes.tier(victim.class_id)
        } else {
            classes.for_kills(killer.kills)
        };

        if next.id != before {
            killer.class_id = next.id;
            killer.max_hp = next.max_hp;
            killer.hp = killer
                .hp
                .saturating_add(CLASS_CHANGE_HP_BONUS)
                .min(killer.max_hp);
            outcome.class_change = Some(ClassChange {
                from: before,
                to: next.id,
            });
        }
    }

    respawn(victim, classes.tier(victim.class_id), rng);
    outcome
}

/// Reset position, hp and hunger.
fn respawn(player: &mut Player, tier: &ClassTier, rng: &mut SpawnRng) {
    let (x, y) = spawn_point(rng);
    player.x = x;
    player.y = y;
    player.max_hp = tier.max_hp;
    player.hp = tier.max_hp;
    player.hunger = MAX_HUNGER;
}
