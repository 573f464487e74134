//! Tick Schedule
//!
//! One monotonic tick counter drives every periodic job. Each job fires
//! on ticks that are a multiple of its period, so the phase relationship
//! between jobs (e.g. autosave landing on every other hunger tick) is
//! fixed by the periods alone.

use crate::game::state::Player;

/// Default simulation rate.
pub const DEFAULT_TICK_RATE: u32 = 20;

pub const HUNGER_PERIOD_SECS: u32 = 15;
pub const REGEN_PERIOD_SECS: u32 = 8;
pub const AUTOSAVE_PERIOD_SECS: u32 = 30;
pub const LEADERBOARD_PERIOD_SECS: u32 = 10;
pub const ONLINE_COUNT_PERIOD_SECS: u32 = 5;

/// Hunger lost per hunger tick.
pub const HUNGER_DECAY: i32 = 1;

/// HP lost per hunger tick while hunger is zero.
pub const STARVATION_DAMAGE: i32 = 2;

/// Regeneration only happens above this hunger.
pub const REGEN_HUNGER_THRESHOLD: i32 = 60;

pub const REGEN_AMOUNT: i32 = 1;

/// Leaderboard size.
pub const LEADERBOARD_LIMIT: usize = 20;

/// Only players seen within this window are ranked.
pub const LEADERBOARD_WINDOW_SECS: i64 = 3600;

/// Periods in ticks for each job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TickSchedule {
    pub hunger: u64,
    pub regen: u64,
    pub autosave: u64,
    pub leaderboard: u64,
    pub online_count: u64,
}

impl Default for TickSchedule {
    fn default() -> Self {
        Self::for_rate(DEFAULT_TICK_RATE)
    }
}

impl TickSchedule {
    /// Convert second-based periods to ticks at `tick_rate` Hz.
    pub fn for_rate(tick_rate: u32) -> Self {
        let ticks = |secs: u32| (u64::from(tick_rate) * u64::from(secs)).max(1);
        Self {
            hunger: ticks(HUNGER_PERIOD_SECS),
            regen: ticks(REGEN_PERIOD_SECS),
            autosave: ticks(AUTOSAVE_PERIOD_SECS),
            leaderboard: ticks(LEADERBOARD_PERIOD_SECS),
            online_count: ticks(ONLINE_COUNT_PERIOD_SECS),
        }
    }

    /// Jobs due on `tick`. Tick 0 runs nothing.
    pub fn due(&self, tick: u64) -> DueJobs {
        let fires = |period: u64| tick != 0 && tick % period == 0;
        DueJobs {
            hunger: fires(self.hunger),
            regen: fires(self.regen),
            autosave: fires(self.autosave),
            leaderboard: fires(self.leaderboard),
            online_count: fires(self.online_count),
        }
    }
}

/// Which jobs run on a given tick.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DueJobs {
    pub hunger: bool,
    pub regen: bool,
    pub autosave: bool,
    pub leaderboard: bool,
    pub online_count: bool,
}

impl DueJobs {
    /// Any per-session job due.
    pub fn any_per_session(&self) -> bool {
        self.hunger || self.regen || self.autosave
    }
}

/// Apply one hunger tick. Returns true when the player starved to death
/// (hp reached zero); the caller resolves the death.
pub fn apply_hunger(player: &mut Player) -> bool {
    player.hunger = (player.hunger - HUNGER_DECAY).max(0);
    if player.hunger == 0 {
        player.hp = (player.hp - STARVATION_DAMAGE).max(0);
    }
    player.is_dead()
}

/// Apply one regen tick. Returns true when hp changed.
pub fn apply_regen(player: &mut Player) -> bool {
    if player.hunger > REGEN_HUNGER_THRESHOLD && player.hp < player.max_hp {
        player.heal(REGEN_AMOUNT);
        return true;
    }
    false
}
