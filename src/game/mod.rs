//! Game rules.
//!
//! Everything in here is plain data and pure functions. No I/O, no
//! channels, no clocks: callers pass `now` and the RNG in.

pub mod combat;
pub mod content;
pub mod crafting;
pub mod error;
pub mod inventory;
pub mod item;
pub mod state;
pub mod tick;

pub use content::{ClassTier, ContentError, ContentTables, ProgressionTable, Recipe, RecipeTable};
pub use error::{ActionError, ErrorCode};
pub use inventory::{AddOutcome, Inventory, INVENTORY_SLOTS};
pub use item::{ItemId, ItemStack, MAX_STACK};
pub use state::{Hotbar, Player, PlayerRecord, PublicPlayer};
pub use tick::TickSchedule;
