//! Item Stacks
//!
//! A stack is a positive quantity of a single item kind. Zero-count stacks
//! are never constructed; callers remove the slot instead.

use serde::{Deserialize, Serialize};

/// Item kind identifier (e.g. `"oak_log"`).
pub type ItemId = String;

/// Largest quantity a single stack may hold.
pub const MAX_STACK: u32 = 64;

/// A quantity of one item kind, always in `1..=MAX_STACK`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item_id: ItemId,
    pub count: u32,
}

impl ItemStack {
    /// Build a stack, rejecting empty ids and counts outside `1..=MAX_STACK`.
    pub fn new(item_id: impl Into<ItemId>, count: u32) -> Option<Self> {
        let item_id = item_id.into();
        if item_id.is_empty() || count == 0 || count > MAX_STACK {
            return None;
        }
        Some(Self { item_id, count })
    }

    /// Room left before the stack reaches the cap.
    #[inline]
    pub fn space(&self) -> u32 {
        MAX_STACK.saturating_sub(self.count)
    }

    #[inline]
    pub fn holds(&self, item_id: &str) -> bool {
        self.item_id == item_id
    }

    /// Move up to `amount` into this stack. Returns how many were taken.
    pub fn fill(&mut self, amount: u32) -> u32 {
        let taken = amount.min(self.space());
        self.count += taken;
        taken
    }

    /// Remove up to `amount` from this stack. Returns how many were removed.
    /// The caller owns deleting the slot once `count` reaches zero.
    pub fn drain(&mut self, amount: u32) -> u32 {
        let removed = amount.min(self.count);
        self.count -= removed;
        removed
    }
}

/// Restrict a client-supplied item id to `[a-z_]`.
pub fn sanitize_item_id(raw: &str) -> ItemId {
    raw.chars()
        .filter(|c| c.is_ascii_lowercase() || *c == '_')
        .collect()
}
