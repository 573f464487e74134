//! Inventory Engine
//!
//! Fixed-capacity slotted container. Occupied slots are kept in a
//! `BTreeMap` so every scan runs in ascending slot order, which makes
//! stacking and draining deterministic.

use std::collections::BTreeMap;

use crate::game::item::{ItemStack, MAX_STACK};

/// Number of slots in every inventory.
pub const INVENTORY_SLOTS: usize = 36;

/// Result of [`Inventory::add`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AddOutcome {
    /// Items actually placed.
    pub placed: u32,
    /// Items that did not fit.
    pub remaining: u32,
}

impl AddOutcome {
    /// True when nothing was left over.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.remaining == 0
    }
}

/// Slot index to stack mapping. Absent keys are empty slots.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Inventory {
    slots: BTreeMap<usize, ItemStack>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted rows. Rows with an out-of-range slot or an
    /// invalid count are dropped.
    pub fn from_slots<I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (usize, ItemStack)>,
    {
        let slots = rows
            .into_iter()
            .filter(|(slot, stack)| {
                *slot < INVENTORY_SLOTS
                    && (1..=MAX_STACK).contains(&stack.count)
                    && !stack.item_id.is_empty()
            })
            .collect();
        Self { slots }
    }

    /// Fixed starting kit for a brand new player.
    pub fn starter_kit() -> Self {
        let mut inv = Self::new();
        for (item, count) in STARTER_KIT {
            inv.add(item, *count);
        }
        inv
    }

    /// Place `count` of `item_id`.
    ///
    /// Phase 1 tops up existing stacks of the same kind in ascending slot
    /// order. Phase 2 opens new stacks in the lowest empty slots. Whatever
    /// still does not fit is reported in [`AddOutcome::remaining`].
    pub fn add(&mut self, item_id: &str, count: u32) -> AddOutcome {
        if item_id.is_empty() || count == 0 {
            return AddOutcome { placed: 0, remaining: 0 };
        }

        let mut remaining = count;

        for stack in self.slots.values_mut() {
            if remaining == 0 {
                break;
            }
            if stack.holds(item_id) {
                remaining -= stack.fill(remaining);
            }
        }

        for slot in 0..INVENTORY_SLOTS {
            if remaining == 0 {
                break;
            }
            if self.slots.contains_key(&slot) {
                continue;
            }
            let size = remaining.min(MAX_STACK);
            if let Some(stack) = ItemStack::new(item_id, size) {
                self.slots.insert(slot, stack);
                remaining -= size;
            }
        }

        AddOutcome {
            placed: count - remaining,
            remaining,
        }
    }

    /// Drain up to `count` of `item_id` in ascending slot order, deleting
    /// emptied slots. Returns the amount actually removed.
    pub fn remove(&mut self, item_id: &str, count: u32) -> u32 {
        let mut removed = 0;
        let mut emptied = Vec::new();

        for (slot, stack) in self.slots.iter_mut() {
            if removed == count {
                break;
            }
            if !stack.holds(item_id) {
                continue;
            }
            removed += stack.drain(count - removed);
            if stack.count == 0 {
                emptied.push(*slot);
            }
        }

        for slot in emptied {
            self.slots.remove(&slot);
        }

        removed
    }

    /// Total quantity of `item_id` across all slots.
    pub fn count(&self, item_id: &str) -> u32 {
        self.slots
            .values()
            .filter(|s| s.holds(item_id))
            .map(|s| s.count)
            .sum()
    }

    pub fn get(&self, slot: usize) -> Option<&ItemStack> {
        self.slots.get(&slot)
    }

    /// Occupied slots in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &ItemStack)> {
        self.slots.iter().map(|(slot, stack)| (*slot, stack))
    }

    pub fn occupied(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Owned copy of the occupied slots, as handed to persistence.
    pub fn to_slot_map(&self) -> BTreeMap<usize, ItemStack> {
        self.slots.clone()
    }

    /// Dense client representation: one entry per slot, `None` when empty.
    pub fn to_wire(&self) -> Vec<Option<ItemStack>> {
        (0..INVENTORY_SLOTS)
            .map(|slot| self.slots.get(&slot).cloned())
            .collect()
    }
}

/// Items every new player starts with.
pub const STARTER_KIT: &[(&str, u32)] = &[
    ("oak_log", 5),
    ("stone", 3),
    ("coal_ore", 2),
    ("apple", 3),
];
