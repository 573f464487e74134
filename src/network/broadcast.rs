//! Broadcast Fabric
//!
//! Each connection owns the receiving end of an unbounded channel; the
//! game world holds the sending end. Sends never block the world, and a
//! connection that has already gone away is skipped.

use tokio::sync::mpsc;

use crate::core::ids::SessionId;
use crate::network::protocol::ServerMessage;
use crate::network::session::SessionRegistry;

/// Sending half of one connection's outbound queue.
#[derive(Clone, Debug)]
pub struct Outbound {
    tx: mpsc::UnboundedSender<ServerMessage>,
}

impl Outbound {
    /// New queue; the receiver goes to the connection's writer task.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Queue a message. Returns false if the connection is gone.
    pub fn send(&self, msg: ServerMessage) -> bool {
        self.tx.send(msg).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Send to every live session. Returns how many queues accepted it.
pub fn to_all(sessions: &SessionRegistry, msg: &ServerMessage) -> usize {
    fan_out(sessions, None, msg)
}

/// Send to every live session except `except`.
pub fn to_all_except(sessions: &SessionRegistry, except: &SessionId, msg: &ServerMessage) -> usize {
    fan_out(sessions, Some(except), msg)
}

fn fan_out(sessions: &SessionRegistry, except: Option<&SessionId>, msg: &ServerMessage) -> usize {
    let mut delivered = 0;
    for (id, session) in sessions.iter() {
        if Some(id) == except {
            continue;
        }
        if session.outbound.send(msg.clone()) {
            delivered += 1;
        }
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::content::ContentTables;
    use crate::game::inventory::Inventory;
    use crate::game::state::{Hotbar, Player};
    use crate::network::session::Session;

    fn session(id: &str) -> (Session, mpsc::UnboundedReceiver<ServerMessage>) {
        let content = ContentTables::builtin().unwrap();
        let (outbound, rx) = Outbound::channel();
        let player = Player::spawn(SessionId::new(id), id, content.classes.tier(0), (0.0, 0.0), 0);
        (
            Session::new(player, Inventory::new(), Hotbar::empty(), outbound, 0),
            rx,
        )
    }

    #[test]
    fn test_to_all_except_skips_sender() {
        let mut registry = SessionRegistry::new();
        let (a, mut rx_a) = session("pa");
        let (b, mut rx_b) = session("pb");
        registry.insert(a);
        registry.insert(b);

        let sent = to_all_except(&registry, &SessionId::new("pa"), &ServerMessage::OnlineCount { count: 2 });

        assert_eq!(sent, 1);
        assert!(rx_a.try_recv().is_err());
        assert!(matches!(rx_b.try_recv(), Ok(ServerMessage::OnlineCount { count: 2 })));
    }

    #[test]
    fn test_closed_connection_is_skipped() {
        let mut registry = SessionRegistry::new();
        let (a, rx_a) = session("pa");
        let (b, mut rx_b) = session("pb");
        registry.insert(a);
        registry.insert(b);
        drop(rx_a);

        let sent = to_all(&registry, &ServerMessage::OnlineCount { count: 2 });

        assert_eq!(sent, 1);
        assert!(rx_b.try_recv().is_ok());
    }
}
