//! Message Dispatch
//!
//! Maps connections to sessions and routes decoded client messages to the
//! action handlers. A connection starts out pending and becomes bound to a
//! session on its first `join`; nothing but `join` is accepted before that.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::core::ids::SessionId;
use crate::network::broadcast::Outbound;
use crate::network::handlers::{self, ActionResult};
use crate::network::protocol::{ClientMessage, ServerMessage};
use crate::network::world::World;

/// Transport-level connection handle, assigned by the server.
pub type ConnectionId = u64;

/// Per-connection protocol state.
#[derive(Debug)]
enum ConnectionState {
    /// Connected, waiting for `join`.
    Pending(Outbound),
    /// Bound to a live session.
    Joined(SessionId),
}

/// Routes connection events into the [`World`].
pub struct Dispatcher {
    world: World,
    connections: HashMap<ConnectionId, ConnectionState>,
}

impl Dispatcher {
    pub fn new(world: World) -> Self {
        Self {
            world,
            connections: HashMap::new(),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Open connections, joined or not.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Session bound to `conn`, if it has joined.
    pub fn session_of(&self, conn: ConnectionId) -> Option<&SessionId> {
        match self.connections.get(&conn)? {
            ConnectionState::Joined(id) => Some(id),
            ConnectionState::Pending(_) => None,
        }
    }

    pub fn on_connect(&mut self, conn: ConnectionId, outbound: Outbound) {
        self.connections.insert(conn, ConnectionState::Pending(outbound));
        debug!(conn, "Connection registered");
    }

    /// Handle one text frame from `conn`.
    ///
    /// Undecodable frames are dropped. Rejected actions are answered with
    /// an `error` frame to the sender only.
    pub fn on_frame(&mut self, conn: ConnectionId, text: &str) {
        let msg = match ClientMessage::from_json(text) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(conn, error = %e, "Dropped malformed frame");
                return;
            }
        };
        trace!(conn, kind = msg.kind(), "Frame");

        let Some(state) = self.connections.get_mut(&conn) else {
            return;
        };

        match (state, msg) {
            (ConnectionState::Pending(outbound), ClientMessage::Join { name }) => {
                let id = self.world.join(&name, outbound.clone());
                self.connections.insert(conn, ConnectionState::Joined(id));
            }
            (ConnectionState::Pending(_), msg) => {
                debug!(conn, kind = msg.kind(), "Ignored message before join");
            }
            (ConnectionState::Joined(id), ClientMessage::Join { .. }) => {
                debug!(conn, id = %id, "Ignored repeated join");
            }
            (ConnectionState::Joined(id), msg) => {
                let id = id.clone();
                let kind = msg.kind();
                if let Err(e) = route(&mut self.world, &id, msg) {
                    debug!(id = %id, kind, error = %e, "Action rejected");
                    self.world.send_to(&id, ServerMessage::error(&e));
                }
            }
        }
    }

    /// Drop `conn`, tearing down its session if it had one.
    pub fn on_disconnect(&mut self, conn: ConnectionId) {
        match self.connections.remove(&conn) {
            Some(ConnectionState::Joined(id)) => self.world.leave(&id),
            Some(ConnectionState::Pending(_)) => debug!(conn, "Connection closed before join"),
            None => {}
        }
    }

    pub fn tick(&mut self) {
        self.world.tick();
    }

    pub fn shutdown(&mut self, reason: &str) {
        self.world.shutdown(reason);
    }
}

fn route(world: &mut World, id: &SessionId, msg: ClientMessage) -> ActionResult {
    match msg {
        ClientMessage::Move { x, y } => handlers::handle_move(world, id, x, y),
        ClientMessage::Harvest { loot, loot_count, .. } => {
            handlers::handle_harvest(world, id, &loot, loot_count)
        }
        ClientMessage::Craft { recipe_id } => handlers::handle_craft(world, id, &recipe_id),
        ClientMessage::Attack { target_id } => handlers::handle_attack(world, id, &target_id),
        ClientMessage::Chat { msg } => handlers::handle_chat(world, id, &msg),
        ClientMessage::Hotbar { hotbar } => handlers::handle_hotbar(world, id, &hotbar),
        ClientMessage::Build { item_id, wx, wy } => {
            handlers::handle_build(world, id, &item_id, wx, wy)
        }
        ClientMessage::Eat { item_id, hunger, hp_gain } => {
            handlers::handle_eat(world, id, &item_id, hunger, hp_gain)
        }
        ClientMessage::Ping { t } => handlers::handle_ping(world, id, t),
        ClientMessage::Join { .. } => Ok(()),
    }
}
