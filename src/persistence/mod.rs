//! Persistence Gateway
//!
//! Load/save service for players, inventories, hotbars and placed
//! structures. The game world calls it synchronously from its owner task
//! and treats every write as fire-and-forget: in-memory state is updated
//! first and a failed write is only logged.
//!
//! Two backends:
//! - [`sqlite::SqliteStore`] for real deployments
//! - [`memory::MemoryStore`] for tests and throwaway servers

pub mod memory;
pub mod sqlite;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::game::item::ItemStack;
use crate::game::state::{Hotbar, PlayerRecord};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("stored {field} out of range: {value}")]
    OutOfRange { field: &'static str, value: i64 },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Occupied inventory slots, keyed by slot index.
pub type SlotMap = BTreeMap<usize, ItemStack>;

/// A placed building.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructureRecord {
    pub id: i64,
    pub player_id: String,
    pub item_id: String,
    pub wx: i64,
    pub wy: i64,
    /// Epoch seconds.
    pub placed_at: i64,
}

/// Inclusive world-coordinate rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    pub min_x: i64,
    pub max_x: i64,
    pub min_y: i64,
    pub max_y: i64,
}

impl BoundingBox {
    /// Square of half-width `radius` around `(x, y)`.
    pub fn around(x: i64, y: i64, radius: i64) -> Self {
        Self {
            min_x: x.saturating_sub(radius),
            max_x: x.saturating_add(radius),
            min_y: y.saturating_sub(radius),
            max_y: y.saturating_add(radius),
        }
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }
}

/// One leaderboard row, as broadcast to clients.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub id: String,
    pub name: String,
    pub kills: u32,
    pub level: u32,
    pub class_id: usize,
}

impl From<&PlayerRecord> for LeaderboardEntry {
    fn from(record: &PlayerRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            kills: record.kills,
            level: record.level,
            class_id: record.class_id,
        }
    }
}

/// Storage backend contract.
///
/// Implementations must be shareable across tasks; each call is a short,
/// self-contained unit of work.
pub trait PersistenceGateway: Send + Sync {
    /// Human-readable backend name for logs.
    fn name(&self) -> &'static str;

    fn load_player(&self, id: &str) -> StoreResult<Option<PlayerRecord>>;

    /// Insert or overwrite the row for `record.id`.
    fn upsert_player(&self, record: &PlayerRecord) -> StoreResult<()>;

    fn load_inventory(&self, player_id: &str) -> StoreResult<SlotMap>;

    /// Atomically delete every slot of `player_id` and insert `slots`.
    fn replace_inventory(&self, player_id: &str, slots: &SlotMap) -> StoreResult<()>;

    fn load_hotbar(&self, player_id: &str) -> StoreResult<Hotbar>;

    fn replace_hotbar_slot(
        &self,
        player_id: &str,
        slot: usize,
        item_id: Option<&str>,
    ) -> StoreResult<()>;

    /// Record a placed building; returns its id.
    fn add_structure(
        &self,
        player_id: &str,
        item_id: &str,
        wx: i64,
        wy: i64,
        placed_at: i64,
    ) -> StoreResult<i64>;

    /// Remove every building at `(wx, wy)`; returns how many were removed.
    fn remove_structure(&self, wx: i64, wy: i64) -> StoreResult<usize>;

    fn query_structures(&self, bounds: &BoundingBox) -> StoreResult<Vec<StructureRecord>>;

    /// Up to `limit` players with `last_seen > since`, most kills first.
    fn top_players_since(&self, since: i64, limit: usize) -> StoreResult<Vec<LeaderboardEntry>>;
}
