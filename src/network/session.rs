//! Session Registry
//!
//! One session per joined player. A session owns the player's entity,
//! inventory and hotbar for as long as the connection lives.

use std::collections::BTreeMap;

use crate::core::ids::SessionId;
use crate::game::inventory::Inventory;
use crate::game::state::{Hotbar, Player};
use crate::network::broadcast::Outbound;
use crate::network::protocol::ServerMessage;

/// Live state bound to one connected player.
#[derive(Debug)]
pub struct Session {
    pub player: Player,
    pub inventory: Inventory,
    pub hotbar: Hotbar,
    pub outbound: Outbound,
    /// Epoch seconds of the last flush to persistence.
    pub last_save: i64,
}

impl Session {
    pub fn new(
        player: Player,
        inventory: Inventory,
        hotbar: Hotbar,
        outbound: Outbound,
        now: i64,
    ) -> Self {
        Self {
            player,
            inventory,
            hotbar,
            outbound,
            last_save: now,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.player.id
    }

    /// Queue a message to this session only.
    pub fn send(&self, msg: ServerMessage) {
        self.outbound.send(msg);
    }
}

/// All live sessions, keyed by id. Iteration is in id order.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: BTreeMap<SessionId, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session, replacing any previous one under the same id.
    pub fn insert(&mut self, session: Session) {
        self.sessions.insert(session.id().clone(), session);
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    pub fn remove(&mut self, id: &SessionId) -> Option<Session> {
        self.sessions.remove(id)
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SessionId, &Session)> {
        self.sessions.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&SessionId, &mut Session)> {
        self.sessions.iter_mut()
    }

    /// Run `f` on every session.
    pub fn for_each<F: FnMut(&Session)>(&self, mut f: F) {
        for session in self.sessions.values() {
            f(session);
        }
    }

    /// Mutable access to two distinct sessions at once.
    ///
    /// Returns `None` if the ids are equal or either is missing.
    pub fn pair_mut(&mut self, a: &SessionId, b: &SessionId) -> Option<(&mut Session, &mut Session)> {
        if a == b {
            return None;
        }
        let mut first = None;
        let mut second = None;
        for (id, session) in self.sessions.iter_mut() {
            if id == a {
                first = Some(session);
            } else if id == b {
                second = Some(session);
            }
        }
        Some((first?, second?))
    }
}
