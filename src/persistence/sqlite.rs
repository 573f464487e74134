//! SQLite persistence backend.
//!
//! One connection behind a mutex. Statements go through `prepare_cached`,
//! and the inventory replace runs inside a transaction so a reader never
//! sees a half-written inventory.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

use super::{
    BoundingBox, LeaderboardEntry, PersistenceGateway, SlotMap, StoreError, StoreResult,
    StructureRecord,
};
use crate::game::item::ItemStack;
use crate::game::state::{Hotbar, PlayerRecord};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS players (
        id         TEXT PRIMARY KEY,
        name       TEXT NOT NULL,
        x          REAL NOT NULL DEFAULT 0,
        y          REAL NOT NULL DEFAULT 0,
        hp         INTEGER NOT NULL DEFAULT 80,
        hunger     INTEGER NOT NULL DEFAULT 100,
        xp         INTEGER NOT NULL DEFAULT 0,
        level      INTEGER NOT NULL DEFAULT 1,
        kills      INTEGER NOT NULL DEFAULT 0,
        deaths     INTEGER NOT NULL DEFAULT 0,
        class_id   INTEGER NOT NULL DEFAULT 0,
        last_seen  INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER DEFAULT (strftime('%s','now'))
    );

    CREATE TABLE IF NOT EXISTS inventory (
        player_id TEXT NOT NULL,
        slot      INTEGER NOT NULL,
        item_id   TEXT NOT NULL,
        count     INTEGER NOT NULL DEFAULT 1,
        PRIMARY KEY (player_id, slot)
    );

    CREATE TABLE IF NOT EXISTS hotbar (
        player_id TEXT NOT NULL,
        slot      INTEGER NOT NULL,
        item_id   TEXT,
        PRIMARY KEY (player_id, slot)
    );

    CREATE TABLE IF NOT EXISTS buildings (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        player_id TEXT NOT NULL,
        item_id   TEXT NOT NULL,
        wx        INTEGER NOT NULL,
        wy        INTEGER NOT NULL,
        placed_at INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_inv_player ON inventory(player_id);
    CREATE INDEX IF NOT EXISTS idx_build_pos ON buildings(wx, wy);
    CREATE INDEX IF NOT EXISTS idx_players_seen ON players(last_seen);
";

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file at `path` and bootstrap the schema.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        info!(path = %path.display(), "Opened SQLite store");
        Self::with_connection(conn)
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

/// Narrow a stored integer, reporting which column was bad.
fn narrow<T: TryFrom<i64>>(field: &'static str, value: i64) -> StoreResult<T> {
    T::try_from(value).map_err(|_| StoreError::OutOfRange { field, value })
}

impl PersistenceGateway for SqliteStore {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn load_player(&self, id: &str) -> StoreResult<Option<PlayerRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT id, name, x, y, hp, hunger, xp, level, kills, deaths, class_id, last_seen
             FROM players WHERE id = ?1",
        )?;
        let row = stmt
            .query_row(params![id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, i64>(6)?,
                    row.get::<_, i64>(7)?,
                    row.get::<_, i64>(8)?,
                    row.get::<_, i64>(9)?,
                    row.get::<_, i64>(10)?,
                    row.get::<_, i64>(11)?,
                ))
            })
            .optional()?;

        let Some((id, name, x, y, hp, hunger, xp, level, kills, deaths, class_id, last_seen)) = row
        else {
            return Ok(None);
        };

        Ok(Some(PlayerRecord {
            id,
            name,
            x,
            y,
            hp: narrow("hp", hp)?,
            hunger: narrow("hunger", hunger)?,
            xp: narrow("xp", xp)?,
            level: narrow("level", level)?,
            kills: narrow("kills", kills)?,
            deaths: narrow("deaths", deaths)?,
            class_id: narrow("class_id", class_id)?,
            last_seen,
        }))
    }

    fn upsert_player(&self, record: &PlayerRecord) -> StoreResult<()> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "INSERT INTO players (id, name, x, y, hp, hunger, xp, level, kills, deaths, class_id, last_seen)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name, x = excluded.x, y = excluded.y,
                hp = excluded.hp, hunger = excluded.hunger, xp = excluded.xp,
                level = excluded.level, kills = excluded.kills, deaths = excluded.deaths,
                class_id = excluded.class_id, last_seen = excluded.last_seen",
        )?;
        stmt.execute(params![
            record.id,
            record.name,
            record.x,
            record.y,
            record.hp,
            record.hunger,
            record.xp,
            record.level,
            record.kills,
            record.deaths,
            record.class_id as i64,
            record.last_seen,
        ])?;
        Ok(())
    }

    fn load_inventory(&self, player_id: &str) -> StoreResult<SlotMap> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT slot, item_id, count FROM inventory WHERE player_id = ?1 ORDER BY slot",
        )?;
        let rows = stmt.query_map(params![player_id], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut slots = SlotMap::new();
        for row in rows {
            let (slot, item_id, count) = row?;
            let slot: usize = narrow("slot", slot)?;
            let count: u32 = narrow("count", count)?;
            if let Some(stack) = ItemStack::new(item_id, count) {
                slots.insert(slot, stack);
            }
        }
        Ok(slots)
    }

    fn replace_inventory(&self, player_id: &str, slots: &SlotMap) -> StoreResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            tx.execute("DELETE FROM inventory WHERE player_id = ?1", params![player_id])?;
            let mut insert = tx.prepare_cached(
                "INSERT INTO inventory (player_id, slot, item_id, count) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (slot, stack) in slots {
                insert.execute(params![player_id, *slot as i64, stack.item_id, stack.count])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn load_hotbar(&self, player_id: &str) -> StoreResult<Hotbar> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT slot, item_id FROM hotbar WHERE player_id = ?1 ORDER BY slot")?;
        let rows = stmt.query_map(params![player_id], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?))
        })?;

        let mut bar = Hotbar::empty();
        for row in rows {
            let (slot, item_id) = row?;
            bar.set(narrow("slot", slot)?, item_id);
        }
        Ok(bar)
    }

    fn replace_hotbar_slot(
        &self,
        player_id: &str,
        slot: usize,
        item_id: Option<&str>,
    ) -> StoreResult<()> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "INSERT OR REPLACE INTO hotbar (player_id, slot, item_id) VALUES (?1, ?2, ?3)",
        )?;
        stmt.execute(params![player_id, slot as i64, item_id])?;
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
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "INSERT INTO buildings (player_id, item_id, wx, wy, placed_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        stmt.execute(params![player_id, item_id, wx, wy, placed_at])?;
        Ok(conn.last_insert_rowid())
    }

    fn remove_structure(&self, wx: i64, wy: i64) -> StoreResult<usize> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached("DELETE FROM buildings WHERE wx = ?1 AND wy = ?2")?;
        Ok(stmt.execute(params![wx, wy])?)
    }

    fn query_structures(&self, bounds: &BoundingBox) -> StoreResult<Vec<StructureRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT id, player_id, item_id, wx, wy, placed_at FROM buildings
             WHERE wx BETWEEN ?1 AND ?2 AND wy BETWEEN ?3 AND ?4
             ORDER BY id",
        )?;
        let rows = stmt.query_map(
            params![bounds.min_x, bounds.max_x, bounds.min_y, bounds.max_y],
            |row| {
                Ok(StructureRecord {
                    id: row.get(0)?,
                    player_id: row.get(1)?,
                    item_id: row.get(2)?,
                    wx: row.get(3)?,
                    wy: row.get(4)?,
                    placed_at: row.get(5)?,
                })
            },
        )?;

        let mut result = Vec::new();
        for r in rows {
            result.push(r?);
        }
        Ok(result)
    }

    fn top_players_since(&self, since: i64, limit: usize) -> StoreResult<Vec<LeaderboardEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT id, name, kills, level, class_id FROM players
             WHERE last_seen > ?1
             ORDER BY kills DESC, id ASC
             LIMIT ?2",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![since, limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;

        let mut result = Vec::with_capacity(20);
        for row in rows {
            let (id, name, kills, level, class_id) = row?;
            result.push(LeaderboardEntry {
                id,
                name,
                kills: narrow("kills", kills)?,
                level: narrow("level", level)?,
                class_id: narrow("class_id", class_id)?,
            });
        }
        Ok(result)
    }
}
