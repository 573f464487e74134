//! Static Content Tables
//!
//! The progression table (class tiers keyed by kill count) and the recipe
//! table. Both are immutable once loaded. A built-in document ships with
//! the crate; a replacement can be supplied as a JSON file.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::game::item::ItemId;

/// Built-in content document.
const DEFAULT_CONTENT: &str = include_str!("../../content/default.json");

// =============================================================================
// ERRORS
// =============================================================================

/// Content loading/validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("failed to read content file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed content document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("progression table is empty")]
    NoTiers,

    #[error("tier at index {index} declares id {id}")]
    TierIdMismatch { index: usize, id: usize },

    #[error("first tier threshold must be 0, got {0}")]
    FirstThresholdNonZero(u32),

    #[error("tier {id} threshold {kills} does not exceed the previous tier")]
    ThresholdNotIncreasing { id: usize, kills: u32 },

    #[error("tier {id} has non-positive max hp")]
    InvalidMaxHp { id: usize },

    #[error("recipe {id}: {reason}")]
    InvalidRecipe { id: String, reason: &'static str },
}

// =============================================================================
// PROGRESSION
// =============================================================================

/// One class tier. Serialized verbatim into the client init payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassTier {
    pub id: usize,
    pub name: String,
    #[serde(default)]
    pub icon: String,
    /// Kill threshold that unlocks this tier.
    pub kills: u32,
    pub max_hp: i32,
    pub damage: i32,
    pub speed: f64,
    pub defense: i32,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub desc: String,
}

/// Ordered tiers with strictly increasing thresholds, tier 0 at 0 kills.
#[derive(Clone, Debug)]
pub struct ProgressionTable {
    tiers: Vec<ClassTier>,
}

impl ProgressionTable {
    /// Validate and wrap a tier list.
    pub fn new(tiers: Vec<ClassTier>) -> Result<Self, ContentError> {
        let first = tiers.first().ok_or(ContentError::NoTiers)?;
        if first.kills != 0 {
            return Err(ContentError::FirstThresholdNonZero(first.kills));
        }

        for (index, tier) in tiers.iter().enumerate() {
            if tier.id != index {
                return Err(ContentError::TierIdMismatch { index, id: tier.id });
            }
            if tier.max_hp <= 0 {
                return Err(ContentError::InvalidMaxHp { id: tier.id });
            }
        }

        for pair in tiers.windows(2) {
            if pair[1].kills <= pair[0].kills {
                return Err(ContentError::ThresholdNotIncreasing {
                    id: pair[1].id,
                    kills: pair[1].kills,
                });
            }
        }

        Ok(Self { tiers })
    }

    /// Tier by id. Unknown ids resolve to tier 0.
    pub fn tier(&self, id: usize) -> &ClassTier {
        self.tiers.get(id).unwrap_or(&self.tiers[0])
    }

    /// Tier with the greatest threshold not above `kills`.
    pub fn for_kills(&self, kills: u32) -> &ClassTier {
        self.tiers
            .iter()
            .take_while(|t| t.kills <= kills)
            .last()
            .unwrap_or(&self.tiers[0])
    }

    pub fn tiers(&self) -> &[ClassTier] {
        &self.tiers
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

// =============================================================================
// RECIPES
// =============================================================================

/// Ingredient or product line: item id and quantity.
pub type RecipeLine = (ItemId, u32);

/// A crafting recipe. Lines keep their declared order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    pub req: Vec<RecipeLine>,
    pub gives: Vec<RecipeLine>,
}

/// Recipes keyed by id.
#[derive(Clone, Debug, Default)]
pub struct RecipeTable {
    recipes: BTreeMap<String, Recipe>,
}

impl RecipeTable {
    pub fn new(recipes: BTreeMap<String, Recipe>) -> Result<Self, ContentError> {
        for (id, recipe) in &recipes {
            let invalid = |reason| ContentError::InvalidRecipe {
                id: id.clone(),
                reason,
            };
            if recipe.gives.is_empty() {
                return Err(invalid("no outputs"));
            }
            let lines = recipe.req.iter().chain(recipe.gives.iter());
            for (item, count) in lines {
                if item.is_empty() {
                    return Err(invalid("empty item id"));
                }
                if *count == 0 {
                    return Err(invalid("zero quantity"));
                }
            }
            // One line per item, so per-line checks cover the whole requirement.
            if has_duplicate_item(&recipe.req) {
                return Err(invalid("duplicate ingredient"));
            }
            if has_duplicate_item(&recipe.gives) {
                return Err(invalid("duplicate output"));
            }
        }
        Ok(Self { recipes })
    }

    pub fn get(&self, id: &str) -> Option<&Recipe> {
        self.recipes.get(id)
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}

fn has_duplicate_item(lines: &[RecipeLine]) -> bool {
    let mut seen = BTreeSet::new();
    lines.iter().any(|(item, _)| !seen.insert(item.as_str()))
}

// =============================================================================
// CONTENT DOCUMENT
// =============================================================================

#[derive(Deserialize)]
struct ContentDocument {
    classes: Vec<ClassTier>,
    recipes: BTreeMap<String, Recipe>,
}

/// Both static tables.
#[derive(Clone, Debug)]
pub struct ContentTables {
    pub classes: ProgressionTable,
    pub recipes: RecipeTable,
}

impl ContentTables {
    /// Parse and validate a JSON content document.
    pub fn from_json(json: &str) -> Result<Self, ContentError> {
        let doc: ContentDocument = serde_json::from_str(json)?;
        Ok(Self {
            classes: ProgressionTable::new(doc.classes)?,
            recipes: RecipeTable::new(doc.recipes)?,
        })
    }

    /// Load a content document from disk.
    pub fn from_path(path: &Path) -> Result<Self, ContentError> {
        let json = std::fs::read_to_string(path).map_err(|source| ContentError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// The tables compiled into the binary.
    pub fn builtin() -> Result<Self, ContentError> {
        Self::from_json(DEFAULT_CONTENT)
    }
}
