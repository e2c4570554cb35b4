//! Shared primitive IDs and revision-related enums.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Recipe identifier.
pub type RecipeId = i64;
/// Ingredient identifier, unique within a recipe.
pub type IngredientId = i64;
/// Step identifier, unique within a recipe.
pub type StepId = i64;
/// Generated, monotonic revision row identifier.
pub type RevisionId = i64;
/// Author of a change.
pub type UserId = uuid::Uuid;

/// Which sub-entity of a recipe a revision concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevisionCategory {
    /// Recipe ingredient.
    Ingredient,
    /// Recipe step.
    Step,
}

impl RevisionCategory {
    /// Column / wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ingredient => "INGREDIENT",
            Self::Step => "STEP",
        }
    }

    /// Parses the column / wire spelling.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INGREDIENT" => Some(Self::Ingredient),
            "STEP" => Some(Self::Step),
            _ => None,
        }
    }
}

impl fmt::Display for RevisionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of change a revision records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevisionType {
    /// Entity added.
    Add,
    /// Single field changed.
    Update,
    /// Entity removed.
    #[serde(alias = "DELETE")]
    Remove,
}

impl RevisionType {
    /// Column / wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "ADD",
            Self::Update => "UPDATE",
            Self::Remove => "REMOVE",
        }
    }

    /// Parses the column / wire spelling. Accepts the legacy `DELETE`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ADD" => Some(Self::Add),
            "UPDATE" => Some(Self::Update),
            "REMOVE" | "DELETE" => Some(Self::Remove),
            _ => None,
        }
    }
}

impl fmt::Display for RevisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Measurement unit of an ingredient quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngredientUnit {
    /// Grams.
    G,
    /// Kilograms.
    Kg,
    /// Ounces.
    Oz,
    /// Pounds.
    Lb,
    /// Millilitres.
    Ml,
    /// Litres.
    L,
    /// Cups.
    Cup,
    /// Tablespoons.
    Tbsp,
    /// Teaspoons.
    Tsp,
    /// Whole pieces.
    Piece,
    /// Pinches.
    Pinch,
    /// Cloves.
    Clove,
    /// Slices.
    Slice,
    /// Cans.
    Can,
    /// Bottles.
    Bottle,
    /// Packets.
    Packet,
    /// Generic unit.
    Unit,
}

impl IngredientUnit {
    /// Every unit, in declaration order.
    pub const ALL: [IngredientUnit; 17] = [
        Self::G,
        Self::Kg,
        Self::Oz,
        Self::Lb,
        Self::Ml,
        Self::L,
        Self::Cup,
        Self::Tbsp,
        Self::Tsp,
        Self::Piece,
        Self::Pinch,
        Self::Clove,
        Self::Slice,
        Self::Can,
        Self::Bottle,
        Self::Packet,
        Self::Unit,
    ];

    /// Column / wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::G => "G",
            Self::Kg => "KG",
            Self::Oz => "OZ",
            Self::Lb => "LB",
            Self::Ml => "ML",
            Self::L => "L",
            Self::Cup => "CUP",
            Self::Tbsp => "TBSP",
            Self::Tsp => "TSP",
            Self::Piece => "PIECE",
            Self::Pinch => "PINCH",
            Self::Clove => "CLOVE",
            Self::Slice => "SLICE",
            Self::Can => "CAN",
            Self::Bottle => "BOTTLE",
            Self::Packet => "PACKET",
            Self::Unit => "UNIT",
        }
    }

    /// Parses the column / wire spelling.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|u| u.as_str() == s)
    }
}

/// Shape of the value carried by an update revision for a given field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    /// Free text.
    Text,
    /// Exact decimal quantity.
    Quantity,
    /// [`IngredientUnit`].
    Unit,
    /// Boolean flag.
    Flag,
    /// Whole number.
    Integer,
}

/// Tracked ingredient field, in diff declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngredientField {
    /// Display name.
    Name,
    /// Quantity.
    Quantity,
    /// Unit.
    Unit,
    /// Optional flag.
    OptionalStatus,
    /// Free-text notes.
    #[serde(alias = "DESCRIPTION")]
    Notes,
}

impl IngredientField {
    /// All tracked fields in declaration order.
    pub const ALL: [IngredientField; 5] = [
        Self::Name,
        Self::Quantity,
        Self::Unit,
        Self::OptionalStatus,
        Self::Notes,
    ];

    /// Value shape carried for this field.
    pub fn value_kind(&self) -> ValueKind {
        match self {
            Self::Name | Self::Notes => ValueKind::Text,
            Self::Quantity => ValueKind::Quantity,
            Self::Unit => ValueKind::Unit,
            Self::OptionalStatus => ValueKind::Flag,
        }
    }
}

/// Tracked step field, in diff declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepField {
    /// Instruction text.
    Instruction,
    /// Position number.
    StepNumber,
    /// Optional flag.
    OptionalStatus,
    /// Timer in seconds.
    Timer,
}

impl StepField {
    /// All tracked fields in declaration order.
    pub const ALL: [StepField; 4] = [
        Self::Instruction,
        Self::StepNumber,
        Self::OptionalStatus,
        Self::Timer,
    ];

    /// Value shape carried for this field.
    pub fn value_kind(&self) -> ValueKind {
        match self {
            Self::Instruction => ValueKind::Text,
            Self::StepNumber | Self::Timer => ValueKind::Integer,
            Self::OptionalStatus => ValueKind::Flag,
        }
    }
}
