//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every frame is a JSON object tagged by `type`. Field names follow the
//! browser client, which is why several fields are renamed to camelCase.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::core::ids::SessionId;
use crate::game::content::ClassTier;
use crate::game::error::{ActionError, ErrorCode};
use crate::game::item::ItemStack;
use crate::game::state::{Hotbar, Player, PublicPlayer};
use crate::persistence::LeaderboardEntry;

/// Dense inventory as sent to clients: one entry per slot.
pub type WireInventory = Vec<Option<ItemStack>>;

/// Sender name for server-generated chat lines.
pub const SYSTEM_NAME: &str = "SYSTEM";

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Create a session. Only message accepted before joining.
    Join {
        #[serde(default, deserialize_with = "lenient_string")]
        name: String,
    },

    /// Proposed new position.
    Move { x: f64, y: f64 },

    /// Client-reported harvest result.
    Harvest {
        #[serde(rename = "objKey", default)]
        obj_key: Value,
        #[serde(default, deserialize_with = "lenient_string")]
        loot: String,
        #[serde(rename = "lootCount", default, deserialize_with = "lenient_int")]
        loot_count: Option<i64>,
    },

    Craft {
        #[serde(rename = "recipeId", default, deserialize_with = "lenient_string")]
        recipe_id: String,
    },

    Attack {
        #[serde(rename = "targetId", default, deserialize_with = "lenient_string")]
        target_id: String,
    },

    Chat {
        #[serde(default, deserialize_with = "lenient_string")]
        msg: String,
    },

    /// Replace the hotbar. Validated by the handler.
    Hotbar {
        #[serde(default)]
        hotbar: Value,
    },

    /// Place a structure from the inventory.
    Build {
        #[serde(rename = "itemId", default, deserialize_with = "lenient_string")]
        item_id: String,
        #[serde(deserialize_with = "coordinate")]
        wx: i64,
        #[serde(deserialize_with = "coordinate")]
        wy: i64,
    },

    /// Consume one item for hunger and hp.
    Eat {
        #[serde(rename = "itemId", default, deserialize_with = "lenient_string")]
        item_id: String,
        #[serde(default, deserialize_with = "lenient_int")]
        hunger: Option<i64>,
        #[serde(rename = "hpGain", default, deserialize_with = "lenient_int")]
        hp_gain: Option<i64>,
    },

    /// Latency probe; `t` is echoed back untouched.
    Ping {
        #[serde(default)]
        t: Value,
    },
}

impl ClientMessage {
    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Tag name, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Move { .. } => "move",
            Self::Harvest { .. } => "harvest",
            Self::Craft { .. } => "craft",
            Self::Attack { .. } => "attack",
            Self::Chat { .. } => "chat",
            Self::Hotbar { .. } => "hotbar",
            Self::Build { .. } => "build",
            Self::Eat { .. } => "eat",
            Self::Ping { .. } => "ping",
        }
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Full state for a freshly joined player.
    Init {
        id: SessionId,
        player: Player,
        inv: WireInventory,
        hotbar: Hotbar,
        classes: Vec<ClassTier>,
        #[serde(rename = "onlineCount")]
        online_count: usize,
    },

    /// Everyone already online, sent right after `init`.
    PlayersInit { players: Vec<PublicPlayer> },

    PlayerJoin { player: PublicPlayer },

    PlayerLeave { id: SessionId },

    PlayerMove { id: SessionId, x: f64, y: f64 },

    PlayerUpdate { player: PublicPlayer },

    InvUpdate {
        inv: WireInventory,
        #[serde(skip_serializing_if = "Option::is_none")]
        notification: Option<String>,
    },

    CraftOk {
        #[serde(rename = "recipeId")]
        recipe_id: String,
        inv: WireInventory,
        xp: u32,
        notification: String,
    },

    /// Rejected action, sent to the acting player only.
    Error { code: ErrorCode, msg: String },

    AttackOk {
        #[serde(rename = "targetId")]
        target_id: SessionId,
        dmg: i32,
    },

    TakeDamage {
        from: SessionId,
        #[serde(rename = "fromName")]
        from_name: String,
        dmg: i32,
    },

    KillConfirm {
        #[serde(rename = "victimName")]
        victim_name: String,
        kills: u32,
        xp: u32,
        class_id: usize,
        #[serde(rename = "maxHp")]
        max_hp: i32,
        hp: i32,
        notification: String,
    },

    YouDied {
        #[serde(rename = "killerName")]
        killer_name: String,
        x: f64,
        y: f64,
        hp: i32,
    },

    StatsUpdate {
        hp: i32,
        hunger: i32,
        #[serde(skip_serializing_if = "Option::is_none")]
        inv: Option<WireInventory>,
    },

    Chat(ChatLine),

    BuildingPlaced {
        #[serde(rename = "itemId")]
        item_id: String,
        wx: i64,
        wy: i64,
        #[serde(rename = "playerId")]
        player_id: SessionId,
    },

    Leaderboard { data: Vec<LeaderboardEntry> },

    OnlineCount { count: usize },

    Pong { t: Value },

    /// Server is shutting down.
    Shutdown { reason: String },
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Error frame for a rejected action.
    pub fn error(err: &ActionError) -> Self {
        Self::Error {
            code: err.code(),
            msg: err.to_string(),
        }
    }

    /// System chat line.
    pub fn system(msg: impl Into<String>) -> Self {
        Self::Chat(ChatLine {
            name: SYSTEM_NAME.to_string(),
            msg: msg.into(),
            id: None,
            sys: true,
            pvp: false,
        })
    }

    /// Kill announcement chat line.
    pub fn pvp(msg: impl Into<String>) -> Self {
        Self::Chat(ChatLine {
            name: SYSTEM_NAME.to_string(),
            msg: msg.into(),
            id: None,
            sys: false,
            pvp: true,
        })
    }
}

/// One chat line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatLine {
    pub name: String,
    pub msg: String,
    /// Sender id for player-authored lines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<SessionId>,
    #[serde(skip_serializing_if = "is_false")]
    pub sys: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub pvp: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

// =============================================================================
// LENIENT FIELD DECODING
// =============================================================================

/// Strings pass through; numbers and booleans are stringified; anything
/// else becomes empty.
fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

/// Integers from numbers (truncated) or numeric-prefix strings.
fn lenient_int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => parse_int_prefix(&s),
        _ => None,
    })
}

/// World coordinate: any JSON number, rounded to the nearest integer.
fn coordinate<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    let n = f64::deserialize(d)?;
    if !n.is_finite() {
        return Err(serde::de::Error::custom("coordinate must be finite"));
    }
    Ok(n.round() as i64)
}

/// Leading optional sign and decimal digits, after leading whitespace.
pub fn parse_int_prefix(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, digits) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let end = digits
        .bytes()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    digits[..end].parse::<i64>().ok().map(|v| v * sign)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_join() {
        let msg = ClientMessage::from_json(r#"{"type":"join","name":"Alice"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Join { ref name } if name == "Alice"));

        let msg = ClientMessage::from_json(r#"{"type":"join"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Join { ref name } if name.is_empty()));
    }

    #[test]
    fn test_parse_harvest_lenient_count() {
        let msg = ClientMessage::from_json(
            r#"{"type":"harvest","objKey":"t_1_2","loot":"oak_log","lootCount":"3abc"}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::Harvest { loot, loot_count, .. } => {
                assert_eq!(loot, "oak_log");
                assert_eq!(loot_count, Some(3));
            }
            other => panic!("unexpected {:?}", other),
        }

        let msg = ClientMessage::from_json(r#"{"type":"harvest","loot":"stone","lootCount":[1]}"#)
            .unwrap();
        assert!(matches!(msg, ClientMessage::Harvest { loot_count: None, .. }));
    }

    #[test]
    fn test_parse_eat_and_build() {
        let msg = ClientMessage::from_json(
            r#"{"type":"eat","itemId":"apple","hunger":20.7,"hpGain":"5"}"#,
        )
        .unwrap();
        assert!(matches!(
            msg,
            ClientMessage::Eat { ref item_id, hunger: Some(20), hp_gain: Some(5) } if item_id == "apple"
        ));

        let msg =
            ClientMessage::from_json(r#"{"type":"build","itemId":"torch","wx":10.4,"wy":-3.6}"#)
                .unwrap();
        assert!(matches!(msg, ClientMessage::Build { wx: 10, wy: -4, .. }));
    }

    #[test]
    fn test_malformed_frames_fail() {
        assert!(ClientMessage::from_json("not json").is_err());
        assert!(ClientMessage::from_json(r#"{"type":"teleport"}"#).is_err());
        assert!(ClientMessage::from_json(r#"{"type":"move","x":"far"}"#).is_err());
        assert!(ClientMessage::from_json(r#"{"name":"no tag"}"#).is_err());
    }

    #[test]
    fn test_ping_echoes_anything() {
        let msg = ClientMessage::from_json(r#"{"type":"ping","t":{"nested":1}}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Ping { ref t } if t["nested"] == 1));
    }

    #[test]
    fn test_parse_int_prefix() {
        assert_eq!(parse_int_prefix("12"), Some(12));
        assert_eq!(parse_int_prefix("  -7xyz"), Some(-7));
        assert_eq!(parse_int_prefix("+4"), Some(4));
        assert_eq!(parse_int_prefix("abc"), None);
        assert_eq!(parse_int_prefix(""), None);
        assert_eq!(parse_int_prefix("-"), None);
    }

    #[test]
    fn test_server_message_tags() {
        let json: Value =
            serde_json::from_str(&ServerMessage::OnlineCount { count: 3 }.to_json().unwrap())
                .unwrap();
        assert_eq!(json, json!({"type": "online_count", "count": 3}));

        let err = ActionError::UnknownRecipe("x".into());
        let json: Value = serde_json::from_str(&ServerMessage::error(&err).to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["code"], "unknown_recipe");
    }

    #[test]
    fn test_chat_line_shape() {
        let json = serde_json::to_value(ServerMessage::system("hello")).unwrap();
        assert_eq!(json, json!({"type": "chat", "name": SYSTEM_NAME, "msg": "hello", "sys": true}));

        let json = serde_json::to_value(ServerMessage::Chat(ChatLine {
            name: "Bob".into(),
            msg: "hi".into(),
            id: Some(SessionId::new("p1")),
            sys: false,
            pvp: false,
        }))
        .unwrap();
        assert_eq!(json, json!({"type": "chat", "name": "Bob", "msg": "hi", "id": "p1"}));
    }

    #[test]
    fn test_camel_case_fields() {
        let json = serde_json::to_value(ServerMessage::KillConfirm {
            victim_name: "v".into(),
            kills: 1,
            xp: 50,
            class_id: 0,
            max_hp: 80,
            hp: 80,
            notification: String::new(),
        })
        .unwrap();
        assert_eq!(json["victimName"], "v");
        assert_eq!(json["maxHp"], 80);
        assert_eq!(json["class_id"], 0);
    }
}
