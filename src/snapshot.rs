//! Ingredient and step snapshots: the diff-engine inputs and stored entity rows.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{IngredientId, IngredientUnit, StepId};

/// State of one recipe ingredient at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientSnapshot {
    /// Identity key used by the diff engine.
    pub ingredient_id: IngredientId,
    /// Display name.
    pub name: String,
    /// Exact quantity, if measured.
    pub quantity: Option<Decimal>,
    /// Unit of `quantity`.
    pub unit: Option<IngredientUnit>,
    /// True when the ingredient may be left out.
    pub is_optional: bool,
    /// Free-text notes.
    pub notes: Option<String>,
}

impl IngredientSnapshot {
    /// Named ingredient with no measurement or notes.
    pub fn new(ingredient_id: IngredientId, name: impl Into<String>) -> Self {
        Self {
            ingredient_id,
            name: name.into(),
            quantity: None,
            unit: None,
            is_optional: false,
            notes: None,
        }
    }

    /// Sets the quantity.
    pub fn with_quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = Some(quantity);
        self
    }

    /// Sets the unit.
    pub fn with_unit(mut self, unit: IngredientUnit) -> Self {
        self.unit = Some(unit);
        self
    }

    /// Sets the notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Marks the ingredient optional.
    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }
}

/// State of one recipe step at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSnapshot {
    /// Identity key used by the diff engine.
    pub step_id: StepId,
    /// 1-based position shown to readers.
    pub step_number: u32,
    /// Instruction text.
    pub instruction: String,
    /// True when the step may be skipped.
    pub optional: bool,
    /// Timer length. `None` and `Some(0)` both mean no timer.
    pub timer_seconds: Option<u32>,
}

impl StepSnapshot {
    /// Required step with no timer.
    pub fn new(step_id: StepId, step_number: u32, instruction: impl Into<String>) -> Self {
        Self {
            step_id,
            step_number,
            instruction: instruction.into(),
            optional: false,
            timer_seconds: None,
        }
    }

    /// Sets the timer.
    pub fn with_timer(mut self, seconds: u32) -> Self {
        self.timer_seconds = Some(seconds);
        self
    }

    /// Marks the step optional.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}
