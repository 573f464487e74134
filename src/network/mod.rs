//! Network Layer
//!
//! WebSocket server, wire protocol, and the game world the server drives.
//! All game rules live in `game/`; this layer owns sessions, routing and
//! fan-out.

pub mod broadcast;
pub mod dispatch;
pub mod handlers;
pub mod protocol;
pub mod server;
pub mod session;
pub mod world;

pub use broadcast::Outbound;
pub use dispatch::{ConnectionId, Dispatcher};
pub use protocol::{ChatLine, ClientMessage, ServerMessage};
pub use server::{GameServer, GameServerError, Inbound};
pub use session::{Session, SessionRegistry};
pub use world::World;
