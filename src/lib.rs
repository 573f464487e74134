//! # Craftio Game Server
//!
//! Authoritative server for a real-time multiplayer survival game:
//! harvesting, crafting, building, hunger and PvP with class progression.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CRAFTIO SERVER                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Process primitives                        │
//! │  ├── ids.rs      - Session id generation                     │
//! │  └── rng.rs      - Xorshift128+ spawn RNG                    │
//! │                                                              │
//! │  game/           - Game rules (pure)                         │
//! │  ├── content.rs  - Class tiers and recipe tables             │
//! │  ├── inventory.rs- 36-slot stacked inventory                 │
//! │  ├── crafting.rs - All-or-nothing crafting                   │
//! │  ├── combat.rs   - Damage, death, promotion, respawn         │
//! │  ├── state.rs    - Player entity and hotbar                  │
//! │  └── tick.rs     - Periodic job schedule                     │
//! │                                                              │
//! │  persistence/    - Storage gateway (SQLite, in-memory)       │
//! │                                                              │
//! │  network/        - Networking                                │
//! │  ├── server.rs   - WebSocket server and game task            │
//! │  ├── dispatch.rs - Connection -> session routing             │
//! │  ├── handlers.rs - Player actions                            │
//! │  ├── world.rs    - Session lifecycle and ticks               │
//! │  └── protocol.rs - Message types                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//!
//! One task owns the [`network::World`]. Connection tasks only forward
//! frames to it and drain their outbound queues, so every action and
//! tick is applied in a single total order.

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod network;
pub mod persistence;

// Re-export commonly used types
pub use config::{ServerConfig, StorageConfig};
pub use crate::core::ids::SessionId;
pub use game::content::ContentTables;
pub use network::server::{GameServer, GameServerError};
pub use persistence::{MemoryStore, PersistenceGateway, SqliteStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
