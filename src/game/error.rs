//! # Action Error Types
//!
//! Validation failures of player actions. Each one is reported to the
//! acting player only, and none of them leaves partial state behind.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::game::item::ItemId;

/// Machine-readable error code sent alongside the message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    UnknownRecipe,
    MissingIngredient,
    MissingItem,
    InventoryFull,
}

/// A rejected player action.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// Recipe id not present in the recipe table.
    #[error("unknown recipe: {0}")]
    UnknownRecipe(String),

    /// Crafting ingredient short.
    #[error("missing {item_id}: need {required}, have {available}")]
    MissingIngredient {
        item_id: ItemId,
        required: u32,
        available: u32,
    },

    /// Item to build with or eat is not in the inventory.
    #[error("missing {item_id}")]
    MissingItem { item_id: ItemId },

    /// Crafting output does not fit.
    #[error("inventory full: no room for {item_id}")]
    InventoryFull { item_id: ItemId },
}

impl ActionError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::UnknownRecipe(_) => ErrorCode::UnknownRecipe,
            Self::MissingIngredient { .. } => ErrorCode::MissingIngredient,
            Self::MissingItem { .. } => ErrorCode::MissingItem,
            Self::InventoryFull { .. } => ErrorCode::InventoryFull,
        }
    }
}
