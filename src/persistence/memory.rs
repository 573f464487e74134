//! In-process persistence backend.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use super::{
    BoundingBox, LeaderboardEntry, PersistenceGateway, SlotMap, StoreResult, StructureRecord,
};
use crate::game::state::{Hotbar, PlayerRecord};

#[derive(Default)]
struct Tables {
    players: BTreeMap<String, PlayerRecord>,
    inventories: BTreeMap<String, SlotMap>,
    hotbars: BTreeMap<String, Hotbar>,
    structures: Vec<StructureRecord>,
    next_structure_id: i64,
}

/// Map-backed store. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored player rows.
    pub fn player_count(&self) -> usize {
        self.tables.lock().players.len()
    }
}

impl PersistenceGateway for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn load_player(&self, id: &str) -> StoreResult<Option<PlayerRecord>> {
        Ok(self.tables.lock().players.get(id).cloned())
    }

    fn upsert_player(&self, record: &PlayerRecord) -> StoreResult<()> {
        self.tables
            .lock()
            .players
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn load_inventory(&self, player_id: &str) -> StoreResult<SlotMap> {
        Ok(self
            .tables
            .lock()
            .inventories
            .get(player_id)
            .cloned()
            .unwrap_or_default())
    }

    fn replace_inventory(&self, player_id: &str, slots: &SlotMap) -> StoreResult<()> {
        self.tables
            .lock()
            .inventories
            .insert(player_id.to_string(), slots.clone());
        Ok(())
    }

    fn load_hotbar(&self, player_id: &str) -> StoreResult<Hotbar> {
        Ok(self
            .tables
            .lock()
            .hotbars
            .get(player_id)
            .cloned()
            .unwrap_or_default())
    }

    fn replace_hotbar_slot(
        &self,
        player_id: &str,
        slot: usize,
        item_id: Option<&str>,
    ) -> StoreResult<()> {
        self.tables
            .lock()
            .hotbars
            .entry(player_id.to_string())
            .or_default()
            .set(slot, item_id.map(str::to_string));
        Ok(())
    }

    fn add_structure(
        &self,
        player_id: &str,
        item_id: &str,
        wx: i64,
        wy: i64,
        placed_at: i64,
    ) -> StoreResult<i64> {
        let mut tables = self.tables.lock();
        tables.next_structure_id += 1;
        let id = tables.next_structure_id;
        tables.structures.push(StructureRecord {
            id,
            player_id: player_id.to_string(),
            item_id: item_id.to_string(),
            wx,
            wy,
            placed_at,
        });
        Ok(id)
    }

    fn remove_structure(&self, wx: i64, wy: i64) -> StoreResult<usize> {
        let mut tables = self.tables.lock();
        let before = tables.structures.len();
        tables.structures.retain(|s| s.wx != wx || s.wy != wy);
        Ok(before - tables.structures.len())
    }

    fn query_structures(&self, bounds: &BoundingBox) -> StoreResult<Vec<StructureRecord>> {
        Ok(self
            .tables
            .lock()
            .structures
            .iter()
            .filter(|s| bounds.contains(s.wx, s.wy))
            .cloned()
            .collect())
    }

    fn top_players_since(&self, since: i64, limit: usize) -> StoreResult<Vec<LeaderboardEntry>> {
        let tables = self.tables.lock();
        let mut rows: Vec<&PlayerRecord> = tables
            .players
            .values()
            .filter(|p| p.last_seen > since)
            .collect();
        rows.sort_by(|a, b| b.kills.cmp(&a.kills).then_with(|| a.id.cmp(&b.id)));
        Ok(rows.into_iter().take(limit).map(LeaderboardEntry::from).collect())
    }
}
