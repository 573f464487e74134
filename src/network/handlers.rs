//! Action Handlers
//!
//! One function per client action. Each runs against the [`World`] on the
//! owner task, validates first, mutates second and then emits the
//! resulting messages. A returned [`ActionError`] is reported to the
//! acting player by the dispatcher; malformed or pointless requests are
//! dropped silently and return `Ok`.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::core::ids::SessionId;
use crate::game::combat::{self, resolve_death};
use crate::game::crafting;
use crate::game::error::ActionError;
use crate::game::item::sanitize_item_id;
use crate::game::state::Hotbar;
use crate::network::protocol::{ChatLine, ServerMessage};
use crate::network::world::{now_secs, persist_hotbar, persist_player, World};

/// Furthest a single move update may travel.
pub const MAX_MOVE_PER_UPDATE: f64 = 12.0;

/// Most items a single harvest may report.
pub const MAX_HARVEST_COUNT: i64 = 12;

/// Longest chat line kept, in characters.
pub const MAX_CHAT_CHARS: usize = 100;

pub type ActionResult = Result<(), ActionError>;

/// Accept a move if it stays within [`MAX_MOVE_PER_UPDATE`].
pub fn handle_move(world: &mut World, id: &SessionId, x: f64, y: f64) -> ActionResult {
    let Some(session) = world.sessions.get_mut(id) else {
        return Ok(());
    };

    let distance = session.player.distance_to(x, y);
    if !distance.is_finite() || distance > MAX_MOVE_PER_UPDATE {
        debug!(id = %id, distance, "Dropped oversized move");
        return Ok(());
    }

    session.player.x = x;
    session.player.y = y;

    world.broadcast_except(id, &ServerMessage::PlayerMove { id: id.clone(), x, y });
    Ok(())
}

/// Credit a client-reported harvest.
pub fn handle_harvest(
    world: &mut World,
    id: &SessionId,
    loot: &str,
    loot_count: Option<i64>,
) -> ActionResult {
    let item_id = sanitize_item_id(loot);
    if item_id.is_empty() {
        return Ok(());
    }
    let Some(session) = world.sessions.get_mut(id) else {
        return Ok(());
    };

    let count = loot_count.unwrap_or(1).clamp(1, MAX_HARVEST_COUNT) as u32;
    let outcome = session.inventory.add(&item_id, count);

    let notification = if outcome.placed > 0 {
        format!("+{} {}", outcome.placed, item_id)
    } else {
        "Inventory full".to_string()
    };
    session.send(ServerMessage::InvUpdate {
        inv: session.inventory.to_wire(),
        notification: Some(notification),
    });
    Ok(())
}

pub fn handle_craft(world: &mut World, id: &SessionId, recipe_id: &str) -> ActionResult {
    let content = Arc::clone(&world.content);
    let Some(session) = world.sessions.get_mut(id) else {
        return Ok(());
    };

    let recipe = crafting::craft(
        &content.recipes,
        recipe_id,
        &mut session.inventory,
        &mut session.player,
    )?;

    session.send(ServerMessage::CraftOk {
        recipe_id: recipe_id.to_string(),
        inv: session.inventory.to_wire(),
        xp: session.player.xp,
        notification: format!("Crafted {}", recipe.name),
    });
    Ok(())
}

/// Resolve one hit, and the kill if the target drops to zero.
///
/// Missing targets and self-attacks do nothing.
pub fn handle_attack(world: &mut World, id: &SessionId, target_id: &str) -> ActionResult {
    let target = SessionId::new(target_id);
    let content = Arc::clone(&world.content);
    let classes = &content.classes;

    let Some((attacker, victim)) = world.sessions.pair_mut(id, &target) else {
        return Ok(());
    };

    let dmg = combat::damage(
        classes.tier(attacker.player.class_id),
        classes.tier(victim.player.class_id),
    );
    victim.player.hp = (victim.player.hp - dmg).max(0);

    attacker.send(ServerMessage::AttackOk {
        target_id: target.clone(),
        dmg,
    });
    victim.send(ServerMessage::TakeDamage {
        from: id.clone(),
        from_name: attacker.player.name.clone(),
        dmg,
    });

    if !victim.player.is_dead() {
        return Ok(());
    }

    let outcome = resolve_death(
        &mut victim.player,
        Some(&mut attacker.player),
        classes,
        &mut world.rng,
    );

    let now = now_secs();
    persist_player(&*world.store, &attacker.player, now);
    persist_player(&*world.store, &victim.player, now);

    let killer = &attacker.player;
    attacker.send(ServerMessage::KillConfirm {
        victim_name: victim.player.name.clone(),
        kills: killer.kills,
        xp: killer.xp,
        class_id: killer.class_id,
        max_hp: killer.max_hp,
        hp: killer.hp,
        notification: format!("Eliminated {}! Kills: {}", victim.player.name, killer.kills),
    });
    victim.send(ServerMessage::YouDied {
        killer_name: killer.name.clone(),
        x: victim.player.x,
        y: victim.player.y,
        hp: victim.player.hp,
    });

    let mut announcements = Vec::with_capacity(4);
    if let Some(change) = outcome.class_change {
        let tier = classes.tier(change.to);
        announcements.push(ServerMessage::system(format!(
            "{} is now {} {}",
            killer.name, tier.icon, tier.name
        )));
        info!(id = %id, from = change.from, to = change.to, "Class changed");
    }
    announcements.push(ServerMessage::pvp(format!(
        "{} eliminated {}",
        killer.name, victim.player.name
    )));
    announcements.push(ServerMessage::PlayerUpdate { player: killer.public() });
    announcements.push(ServerMessage::PlayerUpdate { player: victim.player.public() });

    info!(killer = %id, victim = %target, kills = killer.kills, "Player killed");

    for msg in &announcements {
        world.broadcast(msg);
    }
    Ok(())
}

pub fn handle_chat(world: &mut World, id: &SessionId, msg: &str) -> ActionResult {
    let Some(session) = world.sessions.get(id) else {
        return Ok(());
    };

    let cut: String = msg.chars().take(MAX_CHAT_CHARS).collect();
    let text = cut.trim();
    if text.is_empty() {
        return Ok(());
    }

    let line = ServerMessage::Chat(ChatLine {
        name: session.player.name.clone(),
        msg: text.to_string(),
        id: Some(id.clone()),
        sys: false,
        pvp: false,
    });
    world.broadcast(&line);
    Ok(())
}

/// Replace the hotbar if the payload is a ten-entry array.
pub fn handle_hotbar(world: &mut World, id: &SessionId, hotbar: &Value) -> ActionResult {
    let Some(values) = hotbar.as_array() else {
        return Ok(());
    };
    let Some(next) = Hotbar::from_client(values) else {
        debug!(id = %id, len = values.len(), "Dropped hotbar of wrong length");
        return Ok(());
    };
    let Some(session) = world.sessions.get_mut(id) else {
        return Ok(());
    };

    persist_hotbar(&*world.store, id, &next, &session.hotbar);
    session.hotbar = next;
    Ok(())
}

/// Spend one item and place it as a building at `(wx, wy)`.
pub fn handle_build(
    world: &mut World,
    id: &SessionId,
    item_id: &str,
    wx: i64,
    wy: i64,
) -> ActionResult {
    let Some(session) = world.sessions.get_mut(id) else {
        return Ok(());
    };

    if session.inventory.remove(item_id, 1) == 0 {
        return Err(ActionError::MissingItem {
            item_id: item_id.to_string(),
        });
    }

    if let Err(e) = world.store.add_structure(id.as_str(), item_id, wx, wy, now_secs()) {
        warn!(id = %id, error = %e, "Failed to save building");
    }

    session.send(ServerMessage::InvUpdate {
        inv: session.inventory.to_wire(),
        notification: None,
    });
    world.broadcast(&ServerMessage::BuildingPlaced {
        item_id: item_id.to_string(),
        wx,
        wy,
        player_id: id.clone(),
    });
    Ok(())
}

/// Consume one item. Negative or missing gains count as zero.
pub fn handle_eat(
    world: &mut World,
    id: &SessionId,
    item_id: &str,
    hunger: Option<i64>,
    hp_gain: Option<i64>,
) -> ActionResult {
    let Some(session) = world.sessions.get_mut(id) else {
        return Ok(());
    };

    if session.inventory.remove(item_id, 1) == 0 {
        return Err(ActionError::MissingItem {
            item_id: item_id.to_string(),
        });
    }

    session.player.feed(gain(hunger));
    session.player.heal(gain(hp_gain));

    session.send(ServerMessage::StatsUpdate {
        hp: session.player.hp,
        hunger: session.player.hunger,
        inv: Some(session.inventory.to_wire()),
    });
    Ok(())
}

pub fn handle_ping(world: &mut World, id: &SessionId, t: Value) -> ActionResult {
    world.send_to(id, ServerMessage::Pong { t });
    Ok(())
}

fn gain(value: Option<i64>) -> i32 {
    value.unwrap_or(0).clamp(0, i32::MAX as i64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rng::SpawnRng;
    use crate::game::content::ContentTables;
    use crate::game::error::ErrorCode;
    use crate::network::broadcast::Outbound;
    use crate::persistence::{BoundingBox, MemoryStore, PersistenceGateway};
    use serde_json::json;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Fixture {
        world: World,
        store: Arc<MemoryStore>,
    }

    impl Fixture {
        fn new() -> Self {
            let store = Arc::new(MemoryStore::new());
            let content = Arc::new(ContentTables::builtin().unwrap());
            let world = World::new(content, store.clone(), 20).with_rng(SpawnRng::new(11));
            Self { world, store }
        }

        fn join(&mut self, name: &str) -> (SessionId, UnboundedReceiver<ServerMessage>) {
            let (outbound, rx) = Outbound::channel();
            let id = self.world.join(name, outbound);
            (id, rx)
        }

        fn place(&mut self, id: &SessionId, x: f64, y: f64) {
            let p = &mut self.world.sessions.get_mut(id).unwrap().player;
            p.x = x;
            p.y = y;
        }
    }

    fn drain(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn test_move_within_limit_is_broadcast() {
        let mut f = Fixture::new();
        let (a, mut rx_a) = f.join("a");
        let (_b, mut rx_b) = f.join("b");
        f.place(&a, 0.0, 0.0);
        drain(&mut rx_a);
        drain(&mut rx_b);

        handle_move(&mut f.world, &a, 6.0, 8.0).unwrap();

        let p = &f.world.session(&a).unwrap().player;
        assert_eq!((p.x, p.y), (6.0, 8.0));
        assert!(matches!(
            drain(&mut rx_b).as_slice(),
            [ServerMessage::PlayerMove { x, y, .. }] if *x == 6.0 && *y == 8.0
        ));
        assert!(drain(&mut rx_a).is_empty());
    }

    #[test]
    fn test_move_too_far_is_dropped() {
        let mut f = Fixture::new();
        let (a, _rx_a) = f.join("a");
        let (_b, mut rx_b) = f.join("b");
        f.place(&a, 0.0, 0.0);
        drain(&mut rx_b);

        handle_move(&mut f.world, &a, 12.5, 0.0).unwrap();

        let p = &f.world.session(&a).unwrap().player;
        assert_eq!((p.x, p.y), (0.0, 0.0));
        assert!(drain(&mut rx_b).is_empty());
    }

    #[test]
    fn test_move_limit_boundary() {
        let mut f = Fixture::new();
        let (a, _rx_a) = f.join("a");
        let (_b, mut rx_b) = f.join("b");
        f.place(&a, 0.0, 0.0);
        drain(&mut rx_b);

        // Exactly the limit is allowed.
        handle_move(&mut f.world, &a, MAX_MOVE_PER_UPDATE, 0.0).unwrap();
        assert_eq!(f.world.session(&a).unwrap().player.x, 12.0);
        assert_eq!(drain(&mut rx_b).len(), 1);

        handle_move(&mut f.world, &a, 12.0, -12.0).unwrap();
        assert_eq!(f.world.session(&a).unwrap().player.y, -12.0);
        assert_eq!(drain(&mut rx_b).len(), 1);

        // Anything past it is not.
        handle_move(&mut f.world, &a, 24.0001, -12.0).unwrap();
        let p = &f.world.session(&a).unwrap().player;
        assert_eq!((p.x, p.y), (12.0, -12.0));
        assert!(drain(&mut rx_b).is_empty());
    }

    #[test]
    fn test_harvest_clamps_and_sanitizes() {
        let mut f = Fixture::new();
        let (a, mut rx) = f.join("a");
        drain(&mut rx);

        handle_harvest(&mut f.world, &a, "Oak-Log!", Some(500)).unwrap();
        handle_harvest(&mut f.world, &a, "stone", Some(0)).unwrap();
        handle_harvest(&mut f.world, &a, "123", Some(5)).unwrap();

        let inv = &f.world.session(&a).unwrap().inventory;
        // Uppercase and punctuation are stripped; starter kit has 3 stone.
        assert_eq!(inv.count("akog"), 12);
        assert_eq!(inv.count("stone"), 4);

        let msgs = drain(&mut rx);
        assert_eq!(msgs.len(), 2);
        assert!(matches!(
            &msgs[0],
            ServerMessage::InvUpdate { notification: Some(n), .. } if n == "+12 akog"
        ));
    }

    #[test]
    fn test_craft_success_and_failure() {
        let mut f = Fixture::new();
        let (a, mut rx) = f.join("a");
        drain(&mut rx);

        handle_craft(&mut f.world, &a, "planks").unwrap();
        let session = f.world.session(&a).unwrap();
        assert_eq!(session.inventory.count("oak_log"), 4);
        assert_eq!(session.inventory.count("planks"), 4);
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [ServerMessage::CraftOk { recipe_id, xp: 10, .. }] if recipe_id == "planks"
        ));

        let err = handle_craft(&mut f.world, &a, "no_such_thing").unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnknownRecipe);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_attack_applies_damage() {
        let mut f = Fixture::new();
        let (a, mut rx_a) = f.join("a");
        let (b, mut rx_b) = f.join("b");
        drain(&mut rx_a);
        drain(&mut rx_b);

        handle_attack(&mut f.world, &a, b.as_str()).unwrap();

        // Villager vs villager: 3 damage, 0 defense.
        assert_eq!(f.world.session(&b).unwrap().player.hp, 77);
        assert!(matches!(drain(&mut rx_a).as_slice(), [ServerMessage::AttackOk { dmg: 3, .. }]));
        assert!(matches!(
            drain(&mut rx_b).as_slice(),
            [ServerMessage::TakeDamage { from, dmg: 3, .. }] if from == &a
        ));
    }

    #[test]
    fn test_attack_self_or_missing_is_noop() {
        let mut f = Fixture::new();
        let (a, mut rx) = f.join("a");
        drain(&mut rx);

        handle_attack(&mut f.world, &a, a.as_str()).unwrap();
        handle_attack(&mut f.world, &a, "p_missing").unwrap();

        assert_eq!(f.world.session(&a).unwrap().player.hp, 80);
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_kill_credits_and_respawns() {
        let mut f = Fixture::new();
        let (a, mut rx_a) = f.join("a");
        let (b, mut rx_b) = f.join("b");
        f.world.sessions.get_mut(&b).unwrap().player.hp = 2;
        drain(&mut rx_a);
        drain(&mut rx_b);

        handle_attack(&mut f.world, &a, b.as_str()).unwrap();

        let killer = &f.world.session(&a).unwrap().player;
        assert_eq!(killer.kills, 1);
        assert_eq!(killer.xp, 50);
        let victim = &f.world.session(&b).unwrap().player;
        assert_eq!(victim.deaths, 1);
        assert_eq!(victim.hp, victim.max_hp);

        let to_a = drain(&mut rx_a);
        assert!(to_a.iter().any(|m| matches!(m, ServerMessage::KillConfirm { kills: 1, xp: 50, .. })));
        assert!(to_a.iter().any(|m| matches!(m, ServerMessage::Chat(line) if line.pvp)));
        let to_b = drain(&mut rx_b);
        assert!(to_b.iter().any(|m| matches!(m, ServerMessage::YouDied { killer_name, .. } if killer_name == "a")));
        assert_eq!(
            to_b.iter().filter(|m| matches!(m, ServerMessage::PlayerUpdate { .. })).count(),
            2
        );

        assert_eq!(f.store.load_player(a.as_str()).unwrap().map(|r| r.kills), Some(1));
        assert_eq!(f.store.load_player(b.as_str()).unwrap().map(|r| r.deaths), Some(1));
    }

    #[test]
    fn test_chat_trims_and_ignores_empty() {
        let mut f = Fixture::new();
        let (a, mut rx) = f.join("Alice");
        drain(&mut rx);

        handle_chat(&mut f.world, &a, "   ").unwrap();
        assert!(drain(&mut rx).is_empty());

        let long = format!("  hi{}", "x".repeat(200));
        handle_chat(&mut f.world, &a, &long).unwrap();
        match drain(&mut rx).as_slice() {
            [ServerMessage::Chat(line)] => {
                assert_eq!(line.name, "Alice");
                assert_eq!(line.id.as_ref(), Some(&a));
                assert_eq!(line.msg.chars().count(), 98);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_hotbar_replace_persists_changes() {
        let mut f = Fixture::new();
        let (a, _rx) = f.join("a");

        let mut slots = vec![Value::Null; 10];
        slots[0] = json!("torch");
        handle_hotbar(&mut f.world, &a, &Value::Array(slots)).unwrap();

        let bar = &f.world.session(&a).unwrap().hotbar;
        assert_eq!(bar.get(0).map(String::as_str), Some("torch"));
        assert_eq!(bar.get(1), None);
        assert_eq!(f.store.load_hotbar(a.as_str()).unwrap(), bar.clone());

        // Wrong shapes leave the hotbar alone.
        handle_hotbar(&mut f.world, &a, &json!(["x"])).unwrap();
        handle_hotbar(&mut f.world, &a, &json!("nope")).unwrap();
        assert_eq!(f.world.session(&a).unwrap().hotbar.get(0).map(String::as_str), Some("torch"));
    }

    #[test]
    fn test_build_consumes_and_records() {
        let mut f = Fixture::new();
        let (a, mut rx_a) = f.join("a");
        let (_b, mut rx_b) = f.join("b");
        drain(&mut rx_a);
        drain(&mut rx_b);

        handle_build(&mut f.world, &a, "stone", 10, -4).unwrap();

        assert_eq!(f.world.session(&a).unwrap().inventory.count("stone"), 2);
        assert!(matches!(drain(&mut rx_a).as_slice(), [ServerMessage::InvUpdate { .. }, ServerMessage::BuildingPlaced { .. }]));
        assert!(matches!(
            drain(&mut rx_b).as_slice(),
            [ServerMessage::BuildingPlaced { wx: 10, wy: -4, .. }]
        ));
        let placed = f.store.query_structures(&BoundingBox::around(10, -4, 1)).unwrap();
        assert_eq!(placed.len(), 1);
        assert_eq!(placed[0].item_id, "stone");

        let err = handle_build(&mut f.world, &a, "diamond", 0, 0).unwrap_err();
        assert_eq!(err.code(), ErrorCode::MissingItem);
    }

    #[test]
    fn test_eat_restores_capped() {
        let mut f = Fixture::new();
        let (a, mut rx) = f.join("a");
        {
            let p = &mut f.world.sessions.get_mut(&a).unwrap().player;
            p.hunger = 50;
            p.hp = 70;
        }
        drain(&mut rx);

        handle_eat(&mut f.world, &a, "apple", Some(20), Some(50)).unwrap();

        let session = f.world.session(&a).unwrap();
        assert_eq!(session.player.hunger, 70);
        assert_eq!(session.player.hp, 80);
        assert_eq!(session.inventory.count("apple"), 2);
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [ServerMessage::StatsUpdate { hp: 80, hunger: 70, inv: Some(_) }]
        ));

        handle_eat(&mut f.world, &a, "apple", Some(-30), None).unwrap();
        assert_eq!(f.world.session(&a).unwrap().player.hunger, 70);

        let err = handle_eat(&mut f.world, &a, "cake", Some(10), Some(10)).unwrap_err();
        assert_eq!(err.code(), ErrorCode::MissingItem);
    }

    #[test]
    fn test_ping_echoes() {
        let mut f = Fixture::new();
        let (a, mut rx) = f.join("a");
        drain(&mut rx);

        handle_ping(&mut f.world, &a, json!(1234)).unwrap();
        assert!(matches!(drain(&mut rx).as_slice(), [ServerMessage::Pong { t }] if t == &json!(1234)));
    }
}
