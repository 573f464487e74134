//! Crafting Validator
//!
//! A craft either applies completely or not at all. Every ingredient is
//! checked before anything is touched, and the transform itself runs on a
//! copy of the inventory that only replaces the live one once the outputs
//! are known to fit.

use crate::game::content::{Recipe, RecipeTable};
use crate::game::error::ActionError;
use crate::game::inventory::Inventory;
use crate::game::state::Player;

/// XP awarded per successful craft.
pub const CRAFT_XP: u32 = 10;

/// Craft `recipe_id` out of `inventory`, crediting `player` on success.
pub fn craft<'r>(
    recipes: &'r RecipeTable,
    recipe_id: &str,
    inventory: &mut Inventory,
    player: &mut Player,
) -> Result<&'r Recipe, ActionError> {
    let recipe = recipes
        .get(recipe_id)
        .ok_or_else(|| ActionError::UnknownRecipe(recipe_id.to_string()))?;

    check_ingredients(recipe, inventory)?;

    let mut next = inventory.clone();
    for (item_id, count) in &recipe.req {
        let removed = next.remove(item_id, *count);
        if removed < *count {
            return Err(ActionError::MissingIngredient {
                item_id: item_id.clone(),
                required: *count,
                available: removed,
            });
        }
    }
    for (item_id, count) in &recipe.gives {
        if !next.add(item_id, *count).is_complete() {
            return Err(ActionError::InventoryFull {
                item_id: item_id.clone(),
            });
        }
    }

    *inventory = next;
    player.xp = player.xp.saturating_add(CRAFT_XP);
    Ok(recipe)
}

/// First short ingredient, in declared order.
fn check_ingredients(recipe: &Recipe, inventory: &Inventory) -> Result<(), ActionError> {
    for (item_id, required) in &recipe.req {
        let available = inventory.count(item_id);
        if available < *required {
            return Err(ActionError::MissingIngredient {
                item_id: item_id.clone(),
                required: *required,
                available,
            });
        }
    }
    Ok(())
}
