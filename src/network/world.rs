//! Game World
//!
//! The single owner of all mutable game state: the session registry, the
//! spawn RNG and the tick counter. Exactly one task holds the `World`, so
//! joins, leaves, player actions and ticks are applied one at a time.
//!
//! Persistence is called inline and never awaited for correctness: state
//! is mutated first, then written, and a failed write is logged and
//! otherwise ignored.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::core::ids::{SessionId, SessionIdGenerator};
use crate::core::rng::SpawnRng;
use crate::game::combat::{resolve_death, spawn_point};
use crate::game::content::ContentTables;
use crate::game::inventory::Inventory;
use crate::game::state::{Hotbar, Player};
use crate::game::tick::{
    apply_hunger, apply_regen, TickSchedule, LEADERBOARD_LIMIT, LEADERBOARD_WINDOW_SECS,
};
use crate::network::broadcast::{self, Outbound};
use crate::network::protocol::ServerMessage;
use crate::network::session::{Session, SessionRegistry};
use crate::persistence::PersistenceGateway;

/// Killer name reported for deaths by starvation.
pub const STARVATION_CAUSE: &str = "Starvation";

/// Current wall-clock time in epoch seconds.
pub fn now_secs() -> i64 {
    Utc::now().timestamp()
}

/// The authoritative game world.
pub struct World {
    pub(crate) sessions: SessionRegistry,
    pub(crate) content: Arc<ContentTables>,
    pub(crate) store: Arc<dyn PersistenceGateway>,
    pub(crate) rng: SpawnRng,
    ids: SessionIdGenerator,
    schedule: TickSchedule,
    tick: u64,
}

impl World {
    /// New empty world ticking at `tick_rate` Hz.
    pub fn new(
        content: Arc<ContentTables>,
        store: Arc<dyn PersistenceGateway>,
        tick_rate: u32,
    ) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            content,
            store,
            rng: SpawnRng::from_clock(),
            ids: SessionIdGenerator::from_clock(),
            schedule: TickSchedule::for_rate(tick_rate),
            tick: 0,
        }
    }

    /// Replace the spawn RNG (reproducible spawns in tests).
    pub fn with_rng(mut self, rng: SpawnRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn session(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn online_count(&self) -> usize {
        self.sessions.count()
    }

    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    pub fn content(&self) -> &ContentTables {
        &self.content
    }

    pub fn schedule(&self) -> &TickSchedule {
        &self.schedule
    }

    // =========================================================================
    // SESSION LIFECYCLE
    // =========================================================================

    /// Create a session for a new player and announce it.
    pub fn join(&mut self, name: &str, outbound: Outbound) -> SessionId {
        let now = now_secs();
        let id = self.ids.next_id();
        let tier = self.content.classes.tier(0);
        let player = Player::spawn(id.clone(), name, tier, spawn_point(&mut self.rng), now);
        let inventory = Inventory::starter_kit();
        let hotbar = Hotbar::starter();

        persist_player(&*self.store, &player, now);
        persist_inventory(&*self.store, &id, &inventory);
        persist_hotbar(&*self.store, &id, &hotbar, &Hotbar::empty());

        outbound.send(ServerMessage::Init {
            id: id.clone(),
            player: player.clone(),
            inv: inventory.to_wire(),
            hotbar: hotbar.clone(),
            classes: self.content.classes.tiers().to_vec(),
            online_count: self.sessions.count() + 1,
        });
        let others = self.sessions.iter().map(|(_, s)| s.player.public()).collect();
        outbound.send(ServerMessage::PlayersInit { players: others });

        let public = player.public();
        let name = player.name.clone();
        self.sessions
            .insert(Session::new(player, inventory, hotbar, outbound, now));

        self.broadcast_except(&id, &ServerMessage::PlayerJoin { player: public });
        self.broadcast(&ServerMessage::system(format!("{name} joined the server")));

        info!(id = %id, name = %name, online = self.sessions.count(), "Player joined");
        id
    }

    /// Tear down a session: flush it, drop it, announce the departure.
    pub fn leave(&mut self, id: &SessionId) {
        let Some(session) = self.sessions.remove(id) else {
            return;
        };

        let now = now_secs();
        persist_player(&*self.store, &session.player, now);
        persist_inventory(&*self.store, id, &session.inventory);

        self.broadcast(&ServerMessage::PlayerLeave { id: id.clone() });
        self.broadcast(&ServerMessage::system(format!(
            "{} left the server",
            session.player.name
        )));

        info!(id = %id, name = %session.player.name, online = self.sessions.count(), "Player left");
    }

    /// Flush every session and tell clients the server is going away.
    pub fn shutdown(&mut self, reason: &str) {
        let now = now_secs();
        for (id, session) in self.sessions.iter_mut() {
            persist_player(&*self.store, &session.player, now);
            persist_inventory(&*self.store, id, &session.inventory);
            session.last_save = now;
            session.send(ServerMessage::Shutdown {
                reason: reason.to_string(),
            });
        }
        info!(sessions = self.sessions.count(), "Flushed sessions for shutdown");
    }

    // =========================================================================
    // TICK
    // =========================================================================

    /// Advance one tick and run whatever jobs are due.
    pub fn tick(&mut self) {
        self.tick += 1;
        let due = self.schedule.due(self.tick);

        if due.any_per_session() {
            let now = now_secs();
            let classes = &self.content.classes;
            let store = &*self.store;
            let mut respawned = Vec::new();

            for (id, session) in self.sessions.iter_mut() {
                if due.hunger {
                    if apply_hunger(&mut session.player) {
                        resolve_death(&mut session.player, None, classes, &mut self.rng);
                        session.send(ServerMessage::YouDied {
                            killer_name: STARVATION_CAUSE.to_string(),
                            x: session.player.x,
                            y: session.player.y,
                            hp: session.player.hp,
                        });
                        respawned.push(session.player.public());
                        info!(id = %id, deaths = session.player.deaths, "Player starved");
                    }
                    session.send(stats(&session.player));
                }

                if due.regen && apply_regen(&mut session.player) {
                    session.send(stats(&session.player));
                }

                if due.autosave {
                    persist_player(store, &session.player, now);
                    persist_inventory(store, id, &session.inventory);
                    session.last_save = now;
                }
            }

            for player in respawned {
                self.broadcast(&ServerMessage::PlayerUpdate { player });
            }
            if due.autosave {
                debug!(tick = self.tick, sessions = self.sessions.count(), "Autosave");
            }
        }

        if due.leaderboard {
            self.broadcast_leaderboard();
        }

        if due.online_count {
            let count = self.sessions.count();
            self.broadcast(&ServerMessage::OnlineCount { count });
        }
    }

    fn broadcast_leaderboard(&self) {
        let since = now_secs() - LEADERBOARD_WINDOW_SECS;
        match self.store.top_players_since(since, LEADERBOARD_LIMIT) {
            Ok(data) => {
                self.broadcast(&ServerMessage::Leaderboard { data });
            }
            Err(e) => warn!(error = %e, "Leaderboard query failed"),
        }
    }

    // =========================================================================
    // MESSAGING
    // =========================================================================

    /// Queue a message for one session, if it exists.
    pub fn send_to(&self, id: &SessionId, msg: ServerMessage) {
        if let Some(session) = self.sessions.get(id) {
            session.send(msg);
        }
    }

    /// Fan a message out to every session.
    pub fn broadcast(&self, msg: &ServerMessage) {
        broadcast::to_all(&self.sessions, msg);
    }

    pub fn broadcast_except(&self, except: &SessionId, msg: &ServerMessage) {
        broadcast::to_all_except(&self.sessions, except, msg);
    }
}

/// `stats_update` without the inventory.
fn stats(player: &Player) -> ServerMessage {
    ServerMessage::StatsUpdate {
        hp: player.hp,
        hunger: player.hunger,
        inv: None,
    }
}

// =============================================================================
// PERSISTENCE HELPERS
// =============================================================================

pub(crate) fn persist_player(store: &dyn PersistenceGateway, player: &Player, now: i64) {
    if let Err(e) = store.upsert_player(&player.record(now)) {
        warn!(id = %player.id, error = %e, "Failed to save player");
    }
}

pub(crate) fn persist_inventory(store: &dyn PersistenceGateway, id: &SessionId, inventory: &Inventory) {
    if let Err(e) = store.replace_inventory(id.as_str(), &inventory.to_slot_map()) {
        warn!(id = %id, error = %e, "Failed to save inventory");
    }
}

/// Write every hotbar slot that differs from `previous`.
pub(crate) fn persist_hotbar(
    store: &dyn PersistenceGateway,
    id: &SessionId,
    hotbar: &Hotbar,
    previous: &Hotbar,
) {
    for (slot, item) in hotbar.changed_since(previous) {
        if let Err(e) = store.replace_hotbar_slot(id.as_str(), slot, item.map(String::as_str)) {
            warn!(id = %id, slot, error = %e, "Failed to save hotbar slot");
        }
    }
}
