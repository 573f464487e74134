//! Player State
//!
//! The live player entity, the hotbar, and the two snapshots derived from
//! a player: the public view other clients see and the record handed to
//! persistence.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::ids::SessionId;
use crate::game::content::ClassTier;
use crate::game::item::ItemId;

/// Longest accepted display name, in characters.
pub const MAX_NAME_CHARS: usize = 18;

/// Name used when the client sends nothing usable.
pub const DEFAULT_NAME: &str = "Warrior";

/// Hunger ceiling; also the value a respawned player starts with.
pub const MAX_HUNGER: i32 = 100;

/// Starting level. Level is currently cosmetic.
pub const START_LEVEL: u32 = 1;

/// Number of hotbar entries.
pub const HOTBAR_SLOTS: usize = 10;

/// Longest accepted hotbar label, in characters.
pub const MAX_HOTBAR_LABEL_CHARS: usize = 40;

// =============================================================================
// PLAYER
// =============================================================================

/// Authoritative player entity.
///
/// Serialized as-is into the `init` payload, so field names follow the
/// client's wire format.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Player {
    pub id: SessionId,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub hp: i32,
    #[serde(rename = "maxHp")]
    pub max_hp: i32,
    pub hunger: i32,
    pub xp: u32,
    pub level: u32,
    pub kills: u32,
    pub deaths: u32,
    pub class_id: usize,
    /// Epoch seconds.
    pub last_seen: i64,
}

impl Player {
    /// Fresh player at full health in `tier`.
    pub fn spawn(id: SessionId, name: &str, tier: &ClassTier, at: (f64, f64), now: i64) -> Self {
        Self {
            id,
            name: sanitize_name(name),
            x: at.0,
            y: at.1,
            hp: tier.max_hp,
            max_hp: tier.max_hp,
            hunger: MAX_HUNGER,
            xp: 0,
            level: START_LEVEL,
            kills: 0,
            deaths: 0,
            class_id: tier.id,
            last_seen: now,
        }
    }

    /// Switch to `tier`, keeping `hp <= max_hp`.
    pub fn set_class(&mut self, tier: &ClassTier) {
        self.class_id = tier.id;
        self.max_hp = tier.max_hp;
        self.hp = self.hp.min(self.max_hp);
    }

    /// Add hp, capped at max.
    pub fn heal(&mut self, amount: i32) {
        self.hp = self.hp.saturating_add(amount.max(0)).min(self.max_hp);
    }

    /// Add hunger, capped at [`MAX_HUNGER`].
    pub fn feed(&mut self, amount: i32) {
        self.hunger = self.hunger.saturating_add(amount.max(0)).min(MAX_HUNGER);
    }

    pub fn distance_to(&self, x: f64, y: f64) -> f64 {
        (x - self.x).hypot(y - self.y)
    }

    pub fn is_dead(&self) -> bool {
        self.hp <= 0
    }

    pub fn public(&self) -> PublicPlayer {
        PublicPlayer {
            id: self.id.clone(),
            name: self.name.clone(),
            x: self.x,
            y: self.y,
            hp: self.hp,
            max_hp: self.max_hp,
            kills: self.kills,
            level: self.level,
            class_id: self.class_id,
        }
    }

    /// Immutable snapshot for the persistence gateway, stamped `now`.
    pub fn record(&self, now: i64) -> PlayerRecord {
        PlayerRecord {
            id: self.id.as_str().to_string(),
            name: self.name.clone(),
            x: self.x,
            y: self.y,
            hp: self.hp,
            hunger: self.hunger,
            xp: self.xp,
            level: self.level,
            kills: self.kills,
            deaths: self.deaths,
            class_id: self.class_id,
            last_seen: now,
        }
    }
}

/// Player state visible to every other client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublicPlayer {
    pub id: SessionId,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub hp: i32,
    #[serde(rename = "maxHp")]
    pub max_hp: i32,
    pub kills: u32,
    pub level: u32,
    pub class_id: usize,
}

/// Persisted player row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: String,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub hp: i32,
    pub hunger: i32,
    pub xp: u32,
    pub level: u32,
    pub kills: u32,
    pub deaths: u32,
    pub class_id: usize,
    pub last_seen: i64,
}

/// First [`MAX_NAME_CHARS`] characters, trimmed, or [`DEFAULT_NAME`].
pub fn sanitize_name(raw: &str) -> String {
    let cut: String = raw.chars().take(MAX_NAME_CHARS).collect();
    let trimmed = cut.trim();
    if trimmed.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

// =============================================================================
// HOTBAR
// =============================================================================

/// Ten UI labels pointing at item kinds. Holds no quantities.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hotbar([Option<ItemId>; HOTBAR_SLOTS]);

impl Hotbar {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Layout given to new players.
    pub fn starter() -> Self {
        let mut bar = Self::empty();
        bar.0[1] = Some("oak_log".to_string());
        bar.0[2] = Some("stone".to_string());
        bar
    }

    /// Build from a client array. Anything but exactly ten entries is
    /// rejected; non-string entries become empty, strings are cut to
    /// [`MAX_HOTBAR_LABEL_CHARS`].
    pub fn from_client(values: &[Value]) -> Option<Self> {
        if values.len() != HOTBAR_SLOTS {
            return None;
        }
        let mut bar = Self::empty();
        for (slot, value) in values.iter().enumerate() {
            bar.0[slot] = value
                .as_str()
                .map(|s| s.chars().take(MAX_HOTBAR_LABEL_CHARS).collect());
        }
        Some(bar)
    }

    pub fn get(&self, slot: usize) -> Option<&ItemId> {
        self.0.get(slot).and_then(Option::as_ref)
    }

    pub fn set(&mut self, slot: usize, item: Option<ItemId>) {
        if let Some(entry) = self.0.get_mut(slot) {
            *entry = item;
        }
    }

    pub fn slots(&self) -> &[Option<ItemId>; HOTBAR_SLOTS] {
        &self.0
    }

    /// Slots whose label differs from `previous`.
    pub fn changed_since<'a>(
        &'a self,
        previous: &'a Hotbar,
    ) -> impl Iterator<Item = (usize, Option<&'a ItemId>)> + 'a {
        self.0
            .iter()
            .zip(previous.0.iter())
            .enumerate()
            .filter(|(_, (now, before))| now != before)
            .map(|(slot, (now, _))| (slot, now.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::content::ContentTables;
    use serde_json::json;

    fn villager() -> ClassTier {
        ContentTables::builtin().unwrap().classes.tier(0).clone()
    }

    #[test]
    fn test_spawn_uses_tier_stats() {
        let p = Player::spawn(SessionId::new("p1"), "  Alice  ", &villager(), (1.0, -2.0), 100);
        assert_eq!(p.name, "Alice");
        assert_eq!(p.hp, 80);
        assert_eq!(p.max_hp, 80);
        assert_eq!(p.hunger, MAX_HUNGER);
        assert_eq!(p.class_id, 0);
        assert_eq!(p.level, START_LEVEL);
        assert_eq!((p.x, p.y), (1.0, -2.0));
    }

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("abcdefghijklmnopqrstuvwxyz"), "abcdefghijklmnopqr");
        assert_eq!(sanitize_name("   "), DEFAULT_NAME);
        assert_eq!(sanitize_name(""), DEFAULT_NAME);
        assert_eq!(sanitize_name("                 x"), "x");
        assert_eq!(sanitize_name("ação"), "ação");
    }

    #[test]
    fn test_heal_and_feed_are_capped() {
        let mut p = Player::spawn(SessionId::new("p1"), "a", &villager(), (0.0, 0.0), 0);
        p.hp = 70;
        p.heal(50);
        assert_eq!(p.hp, 80);
        p.heal(-10);
        assert_eq!(p.hp, 80);

        p.hunger = 90;
        p.feed(40);
        assert_eq!(p.hunger, MAX_HUNGER);
    }

    #[test]
    fn test_set_class_clamps_hp() {
        let content = ContentTables::builtin().unwrap();
        let mut p = Player::spawn(SessionId::new("p1"), "a", content.classes.tier(3), (0.0, 0.0), 0);
        assert_eq!(p.hp, 140);
        p.set_class(content.classes.tier(0));
        assert_eq!(p.max_hp, 80);
        assert_eq!(p.hp, 80);
    }

    #[test]
    fn test_public_wire_shape() {
        let p = Player::spawn(SessionId::new("p1"), "a", &villager(), (0.0, 0.0), 0);
        let json = serde_json::to_value(p.public()).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        for key in ["id", "name", "x", "y", "hp", "maxHp", "kills", "level", "class_id"] {
            assert!(keys.contains(&key.to_string()), "missing {key}");
        }
        assert_eq!(keys.len(), 9);
    }

    #[test]
    fn test_record_is_stamped() {
        let p = Player::spawn(SessionId::new("p1"), "a", &villager(), (0.0, 0.0), 5);
        let record = p.record(999);
        assert_eq!(record.last_seen, 999);
        assert_eq!(record.id, "p1");
    }

    #[test]
    fn test_hotbar_from_client() {
        let long = "x".repeat(60);
        let values = vec![
            json!(null), json!("oak_log"), json!(5), json!(long),
            json!(null), json!(null), json!(null), json!(null), json!(null), json!(null),
        ];
        let bar = Hotbar::from_client(&values).unwrap();
        assert_eq!(bar.get(1).map(String::as_str), Some("oak_log"));
        assert_eq!(bar.get(2), None);
        assert_eq!(bar.get(3).map(|s| s.len()), Some(MAX_HOTBAR_LABEL_CHARS));

        assert!(Hotbar::from_client(&values[..9]).is_none());
    }

    #[test]
    fn test_hotbar_changed_since() {
        let before = Hotbar::starter();
        let mut after = before.clone();
        after.set(2, None);
        after.set(5, Some("torch".to_string()));

        let changed: Vec<_> = after.changed_since(&before).map(|(slot, _)| slot).collect();
        assert_eq!(changed, vec![2, 5]);
    }

    #[test]
    fn test_hotbar_serializes_as_array() {
        let json = serde_json::to_value(Hotbar::starter()).unwrap();
        let arr = json.as_array().unwrap();
        assert_eq!(arr.len(), HOTBAR_SLOTS);
        assert_eq!(arr[1], "oak_log");
        assert!(arr[0].is_null());
    }
}
