//! Revision record model and persisted revision rows.
//!
//! A [`RevisionRecord`] is a closed sum over six variants. Its category and
//! type are derived from the variant, so a record can never carry a
//! mismatched pair. Its JSON form is a flat object holding `category` and
//! `type` next to the variant fields.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use serde_json::Value;

use crate::types::{
    IngredientField, IngredientId, IngredientUnit, RecipeId, RevisionCategory, RevisionId,
    RevisionType, StepField, StepId, UserId, ValueKind,
};

/// Before/after value carried by an update revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Free text.
    Text(String),
    /// Exact decimal.
    Quantity(Decimal),
    /// Ingredient unit.
    Unit(IngredientUnit),
    /// Boolean flag.
    Flag(bool),
    /// Whole number.
    Integer(i64),
}

impl FieldValue {
    /// Shape of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Text(_) => ValueKind::Text,
            Self::Quantity(_) => ValueKind::Quantity,
            Self::Unit(_) => ValueKind::Unit,
            Self::Flag(_) => ValueKind::Flag,
            Self::Integer(_) => ValueKind::Integer,
        }
    }

    /// Reads a JSON value as `kind`. With no kind, the JSON type decides.
    pub fn from_json(kind: Option<ValueKind>, value: &Value) -> Result<Self, String> {
        match (kind, value) {
            (Some(ValueKind::Text) | None, Value::String(s)) => Ok(Self::Text(s.clone())),
            (Some(ValueKind::Quantity), Value::String(s)) => Decimal::from_str(s)
                .map(Self::Quantity)
                .map_err(|e| format!("invalid decimal {s:?}: {e}")),
            (Some(ValueKind::Quantity), Value::Number(n)) => {
                let text = n.to_string();
                Decimal::from_str(&text)
                    .or_else(|_| Decimal::from_scientific(&text))
                    .map(Self::Quantity)
                    .map_err(|e| format!("invalid decimal {text}: {e}"))
            }
            (Some(ValueKind::Unit), Value::String(s)) => IngredientUnit::parse(s)
                .map(Self::Unit)
                .ok_or_else(|| format!("unknown unit {s:?}")),
            (Some(ValueKind::Flag) | None, Value::Bool(b)) => Ok(Self::Flag(*b)),
            (Some(ValueKind::Integer) | None, Value::Number(n)) => n
                .as_i64()
                .map(Self::Integer)
                .ok_or_else(|| format!("expected whole number, got {n}")),
            (kind, other) => Err(format!("value {other} does not fit {kind:?}")),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Text(s) => serializer.serialize_str(s),
            // Decimal text keeps scale and precision; floats would not.
            Self::Quantity(d) => serializer.serialize_str(&d.to_string()),
            Self::Unit(u) => serializer.serialize_str(u.as_str()),
            Self::Flag(b) => serializer.serialize_bool(*b),
            Self::Integer(i) => serializer.serialize_i64(*i),
        }
    }
}

fn read_value(kind: Option<ValueKind>, value: Option<Value>) -> Result<Option<FieldValue>, String> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => FieldValue::from_json(kind, &v).map(Some),
    }
}

// A value must read back as the kind its field decodes with.
fn fits(kind: Option<ValueKind>, value: &Option<FieldValue>) -> bool {
    value.as_ref().is_none_or(|v| Some(v.kind()) == kind)
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

/// Ingredient added to a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientAddRevision {
    /// Added ingredient.
    pub ingredient_id: Option<IngredientId>,
    /// Name at the time it was added.
    #[serde(default)]
    pub ingredient_name: String,
    /// Quantity.
    #[serde(default)]
    pub quantity: Option<Decimal>,
    /// Unit.
    #[serde(default)]
    pub unit: Option<IngredientUnit>,
    /// Optional flag.
    #[serde(default)]
    pub is_optional: bool,
    /// Notes.
    #[serde(default)]
    pub description: Option<String>,
}

impl IngredientAddRevision {
    /// Valid iff the id is present and the name is not blank.
    pub fn is_valid(&self) -> bool {
        self.ingredient_id.is_some() && !is_blank(&self.ingredient_name)
    }
}

/// One field of an ingredient changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawIngredientUpdate")]
pub struct IngredientUpdateRevision {
    /// Changed ingredient.
    pub ingredient_id: Option<IngredientId>,
    /// Ingredient name after the change, for display.
    pub ingredient_name: Option<String>,
    /// Which field changed.
    pub changed_field: Option<IngredientField>,
    /// Value before the change.
    pub previous_value: Option<FieldValue>,
    /// Value after the change.
    pub new_value: Option<FieldValue>,
}

impl IngredientUpdateRevision {
    /// Update of `field` on `ingredient_id`.
    pub fn new(
        ingredient_id: IngredientId,
        field: IngredientField,
        previous_value: Option<FieldValue>,
        new_value: Option<FieldValue>,
    ) -> Self {
        Self {
            ingredient_id: Some(ingredient_id),
            ingredient_name: None,
            changed_field: Some(field),
            previous_value,
            new_value,
        }
    }

    /// Valid iff id and field are present, both values have the field's
    /// shape, and the value actually changed.
    pub fn is_valid(&self) -> bool {
        let kind = self.changed_field.map(|f| f.value_kind());
        self.ingredient_id.is_some()
            && kind.is_some()
            && fits(kind, &self.previous_value)
            && fits(kind, &self.new_value)
            && self.previous_value != self.new_value
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIngredientUpdate {
    ingredient_id: Option<IngredientId>,
    #[serde(default)]
    ingredient_name: Option<String>,
    #[serde(default)]
    changed_field: Option<IngredientField>,
    #[serde(default)]
    previous_value: Option<Value>,
    #[serde(default)]
    new_value: Option<Value>,
}

impl TryFrom<RawIngredientUpdate> for IngredientUpdateRevision {
    type Error = String;

    fn try_from(raw: RawIngredientUpdate) -> Result<Self, Self::Error> {
        let kind = raw.changed_field.map(|f| f.value_kind());
        Ok(Self {
            ingredient_id: raw.ingredient_id,
            ingredient_name: raw.ingredient_name,
            changed_field: raw.changed_field,
            previous_value: read_value(kind, raw.previous_value)?,
            new_value: read_value(kind, raw.new_value)?,
        })
    }
}

/// Ingredient removed from a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngredientRemoveRevision {
    /// Removed ingredient.
    pub ingredient_id: Option<IngredientId>,
    /// Name at removal time.
    #[serde(default)]
    pub ingredient_name: Option<String>,
}

impl IngredientRemoveRevision {
    /// Valid iff the id is present.
    pub fn is_valid(&self) -> bool {
        self.ingredient_id.is_some()
    }
}

/// Step added to a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepAddRevision {
    /// Added step.
    pub step_id: Option<StepId>,
    /// Position number.
    pub step_number: Option<u32>,
    /// Instruction text.
    #[serde(default)]
    pub instruction: String,
    /// Optional flag; required for validity.
    pub optional: Option<bool>,
    /// Timer, if any.
    #[serde(default)]
    pub timer_seconds: Option<u32>,
}

impl StepAddRevision {
    /// Valid iff id, number and optional flag are present and the
    /// instruction is not blank.
    pub fn is_valid(&self) -> bool {
        self.step_id.is_some()
            && self.step_number.is_some()
            && !is_blank(&self.instruction)
            && self.optional.is_some()
    }
}

/// One field of a step changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawStepUpdate")]
pub struct StepUpdateRevision {
    /// Changed step.
    pub step_id: Option<StepId>,
    /// Position number after the change.
    pub step_number: Option<u32>,
    /// Which field changed.
    pub changed_field: Option<StepField>,
    /// Value before the change.
    pub previous_value: Option<FieldValue>,
    /// Value after the change.
    pub new_value: Option<FieldValue>,
}

impl StepUpdateRevision {
    /// Update of `field` on `step_id`.
    pub fn new(
        step_id: StepId,
        step_number: u32,
        field: StepField,
        previous_value: FieldValue,
        new_value: FieldValue,
    ) -> Self {
        Self {
            step_id: Some(step_id),
            step_number: Some(step_number),
            changed_field: Some(field),
            previous_value: Some(previous_value),
            new_value: Some(new_value),
        }
    }

    /// Valid iff id, number, field and both values are present, the values
    /// have the field's shape, and they differ.
    pub fn is_valid(&self) -> bool {
        let kind = self.changed_field.map(|f| f.value_kind());
        self.step_id.is_some()
            && self.step_number.is_some()
            && kind.is_some()
            && self.previous_value.is_some()
            && self.new_value.is_some()
            && fits(kind, &self.previous_value)
            && fits(kind, &self.new_value)
            && self.previous_value != self.new_value
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStepUpdate {
    step_id: Option<StepId>,
    #[serde(default)]
    step_number: Option<u32>,
    #[serde(default)]
    changed_field: Option<StepField>,
    #[serde(default)]
    previous_value: Option<Value>,
    #[serde(default)]
    new_value: Option<Value>,
}

impl TryFrom<RawStepUpdate> for StepUpdateRevision {
    type Error = String;

    fn try_from(raw: RawStepUpdate) -> Result<Self, Self::Error> {
        let kind = raw.changed_field.map(|f| f.value_kind());
        Ok(Self {
            step_id: raw.step_id,
            step_number: raw.step_number,
            changed_field: raw.changed_field,
            previous_value: read_value(kind, raw.previous_value)?,
            new_value: read_value(kind, raw.new_value)?,
        })
    }
}

/// Step removed from a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRemoveRevision {
    /// Removed step.
    pub step_id: Option<StepId>,
    /// Position number at removal time.
    #[serde(default)]
    pub step_number: Option<u32>,
}

impl StepRemoveRevision {
    /// Valid iff the id is present.
    pub fn is_valid(&self) -> bool {
        self.step_id.is_some()
    }
}

/// A single typed change to a recipe's ingredients or steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionRecord {
    /// `INGREDIENT` / `ADD`.
    IngredientAdd(IngredientAddRevision),
    /// `INGREDIENT` / `UPDATE`.
    IngredientUpdate(IngredientUpdateRevision),
    /// `INGREDIENT` / `REMOVE`.
    IngredientRemove(IngredientRemoveRevision),
    /// `STEP` / `ADD`.
    StepAdd(StepAddRevision),
    /// `STEP` / `UPDATE`.
    StepUpdate(StepUpdateRevision),
    /// `STEP` / `REMOVE`.
    StepRemove(StepRemoveRevision),
}

impl RevisionRecord {
    /// Sub-entity this record concerns.
    pub fn category(&self) -> RevisionCategory {
        match self {
            Self::IngredientAdd(_) | Self::IngredientUpdate(_) | Self::IngredientRemove(_) => {
                RevisionCategory::Ingredient
            }
            Self::StepAdd(_) | Self::StepUpdate(_) | Self::StepRemove(_) => RevisionCategory::Step,
        }
    }

    /// Kind of change.
    pub fn revision_type(&self) -> RevisionType {
        match self {
            Self::IngredientAdd(_) | Self::StepAdd(_) => RevisionType::Add,
            Self::IngredientUpdate(_) | Self::StepUpdate(_) => RevisionType::Update,
            Self::IngredientRemove(_) | Self::StepRemove(_) => RevisionType::Remove,
        }
    }

    /// The single gate checked before a record may be persisted.
    pub fn is_valid(&self) -> bool {
        match self {
            Self::IngredientAdd(r) => r.is_valid(),
            Self::IngredientUpdate(r) => r.is_valid(),
            Self::IngredientRemove(r) => r.is_valid(),
            Self::StepAdd(r) => r.is_valid(),
            Self::StepUpdate(r) => r.is_valid(),
            Self::StepRemove(r) => r.is_valid(),
        }
    }

    /// Ingredient or step id the record concerns.
    pub fn entity_id(&self) -> Option<i64> {
        match self {
            Self::IngredientAdd(r) => r.ingredient_id,
            Self::IngredientUpdate(r) => r.ingredient_id,
            Self::IngredientRemove(r) => r.ingredient_id,
            Self::StepAdd(r) => r.step_id,
            Self::StepUpdate(r) => r.step_id,
            Self::StepRemove(r) => r.step_id,
        }
    }

    /// Decodes the variant selected by `(category, revision_type)` from a JSON
    /// object. Embedded tags, if any, are ignored here.
    pub fn from_parts(
        category: RevisionCategory,
        revision_type: RevisionType,
        value: Value,
    ) -> Result<Self, serde_json::Error> {
        use RevisionCategory::{Ingredient, Step};
        use RevisionType::{Add, Remove, Update};

        Ok(match (category, revision_type) {
            (Ingredient, Add) => Self::IngredientAdd(serde_json::from_value(value)?),
            (Ingredient, Update) => Self::IngredientUpdate(serde_json::from_value(value)?),
            (Ingredient, Remove) => Self::IngredientRemove(serde_json::from_value(value)?),
            (Step, Add) => Self::StepAdd(serde_json::from_value(value)?),
            (Step, Update) => Self::StepUpdate(serde_json::from_value(value)?),
            (Step, Remove) => Self::StepRemove(serde_json::from_value(value)?),
        })
    }
}

#[derive(Serialize)]
struct Tagged<'a, T> {
    category: RevisionCategory,
    #[serde(rename = "type")]
    revision_type: RevisionType,
    #[serde(flatten)]
    body: &'a T,
}

#[derive(Deserialize)]
struct Tags {
    category: RevisionCategory,
    #[serde(rename = "type")]
    revision_type: RevisionType,
}

impl Serialize for RevisionRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let category = self.category();
        let revision_type = self.revision_type();
        match self {
            Self::IngredientAdd(body) => Tagged { category, revision_type, body }.serialize(serializer),
            Self::IngredientUpdate(body) => {
                Tagged { category, revision_type, body }.serialize(serializer)
            }
            Self::IngredientRemove(body) => {
                Tagged { category, revision_type, body }.serialize(serializer)
            }
            Self::StepAdd(body) => Tagged { category, revision_type, body }.serialize(serializer),
            Self::StepUpdate(body) => Tagged { category, revision_type, body }.serialize(serializer),
            Self::StepRemove(body) => Tagged { category, revision_type, body }.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for RevisionRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let tags = Tags::deserialize(&value).map_err(de::Error::custom)?;
        Self::from_parts(tags.category, tags.revision_type, value).map_err(de::Error::custom)
    }
}

impl From<IngredientAddRevision> for RevisionRecord {
    fn from(value: IngredientAddRevision) -> Self {
        Self::IngredientAdd(value)
    }
}

impl From<IngredientUpdateRevision> for RevisionRecord {
    fn from(value: IngredientUpdateRevision) -> Self {
        Self::IngredientUpdate(value)
    }
}

impl From<IngredientRemoveRevision> for RevisionRecord {
    fn from(value: IngredientRemoveRevision) -> Self {
        Self::IngredientRemove(value)
    }
}

impl From<StepAddRevision> for RevisionRecord {
    fn from(value: StepAddRevision) -> Self {
        Self::StepAdd(value)
    }
}

impl From<StepUpdateRevision> for RevisionRecord {
    fn from(value: StepUpdateRevision) -> Self {
        Self::StepUpdate(value)
    }
}

impl From<StepRemoveRevision> for RevisionRecord {
    fn from(value: StepRemoveRevision) -> Self {
        Self::StepRemove(value)
    }
}

/// Revision row ready to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecipeRevision {
    /// Owning recipe.
    pub recipe_id: RecipeId,
    /// Author.
    pub user_id: UserId,
    /// Category column.
    pub category: RevisionCategory,
    /// Type column.
    pub revision_type: RevisionType,
    /// Ingredient or step id, kept as its own column for filtering.
    pub entity_id: i64,
    /// Encoded state before the change.
    pub previous_data: String,
    /// Encoded state after the change.
    pub new_data: String,
    /// Optional free-text comment.
    pub change_comment: Option<String>,
}

/// Persisted revision row. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeRevision {
    /// Generated id; increases with insertion order.
    pub revision_id: RevisionId,
    /// Owning recipe.
    pub recipe_id: RecipeId,
    /// Author.
    pub user_id: UserId,
    /// Category column, as stored.
    pub category: String,
    /// Type column, as stored.
    pub revision_type: String,
    /// Ingredient or step id.
    pub entity_id: i64,
    /// Encoded state before the change.
    pub previous_data: String,
    /// Encoded state after the change.
    pub new_data: String,
    /// Optional free-text comment.
    pub change_comment: Option<String>,
    /// Insert time in milliseconds since epoch.
    pub created_at_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qty(s: &str) -> FieldValue {
        FieldValue::Quantity(Decimal::from_str(s).unwrap())
    }

    #[test]
    fn variant_fixes_category_and_type() {
        let record = RevisionRecord::from(IngredientRemoveRevision {
            ingredient_id: Some(4),
            ingredient_name: None,
        });
        assert_eq!(record.category(), RevisionCategory::Ingredient);
        assert_eq!(record.revision_type(), RevisionType::Remove);

        let record = RevisionRecord::from(StepUpdateRevision::new(
            1,
            1,
            StepField::Timer,
            FieldValue::Integer(0),
            FieldValue::Integer(60),
        ));
        assert_eq!(record.category(), RevisionCategory::Step);
        assert_eq!(record.revision_type(), RevisionType::Update);
    }

    #[test]
    fn ingredient_update_requires_a_change() {
        let text = |s: &str| Some(FieldValue::Text(s.to_string()));
        let same = IngredientUpdateRevision::new(1, IngredientField::Notes, text("2 cups"), text("2 cups"));
        assert!(!same.is_valid());

        let changed = IngredientUpdateRevision::new(1, IngredientField::Notes, text("2 cups"), text("3 cups"));
        assert!(changed.is_valid());

        let equal_decimals = IngredientUpdateRevision::new(
            1,
            IngredientField::Quantity,
            Some(qty("2")),
            Some(qty("2.00")),
        );
        assert!(!equal_decimals.is_valid());

        let cleared = IngredientUpdateRevision::new(1, IngredientField::Notes, text("sifted"), None);
        assert!(cleared.is_valid());

        let mut no_field = changed.clone();
        no_field.changed_field = None;
        assert!(!no_field.is_valid());
    }

    #[test]
    fn ingredient_add_rejects_blank_name() {
        let mut add = IngredientAddRevision {
            ingredient_id: Some(1),
            ingredient_name: "Flour".to_string(),
            quantity: None,
            unit: None,
            is_optional: false,
            description: None,
        };
        assert!(add.is_valid());
        add.ingredient_name = "  \t".to_string();
        assert!(!add.is_valid());
        add.ingredient_name = "Flour".to_string();
        add.ingredient_id = None;
        assert!(!add.is_valid());
    }

    #[test]
    fn step_add_rejects_blank_instruction_and_missing_flag() {
        let mut add = StepAddRevision {
            step_id: Some(1),
            step_number: Some(1),
            instruction: "   ".to_string(),
            optional: Some(false),
            timer_seconds: None,
        };
        assert!(!add.is_valid());
        add.instruction = "Preheat oven".to_string();
        assert!(add.is_valid());
        add.optional = None;
        assert!(!add.is_valid());
    }

    #[test]
    fn step_update_requires_both_values() {
        let mut update = StepUpdateRevision::new(
            2,
            2,
            StepField::Instruction,
            FieldValue::Text("Old instruction".to_string()),
            FieldValue::Text("New instruction".to_string()),
        );
        assert!(update.is_valid());
        update.previous_value = None;
        assert!(!update.is_valid());
        update.previous_value = update.new_value.clone();
        assert!(!update.is_valid());
    }

    #[test]
    fn ingredient_update_values_must_match_field_kind() {
        let wrong = IngredientUpdateRevision::new(
            1,
            IngredientField::Quantity,
            Some(FieldValue::Integer(2)),
            Some(FieldValue::Integer(3)),
        );
        assert!(!wrong.is_valid());

        let half_wrong = IngredientUpdateRevision::new(
            1,
            IngredientField::Unit,
            Some(FieldValue::Unit(IngredientUnit::Cup)),
            Some(FieldValue::Text("cups".to_string())),
        );
        assert!(!half_wrong.is_valid());

        let right = IngredientUpdateRevision::new(1, IngredientField::Quantity, Some(qty("2")), Some(qty("3")));
        assert!(right.is_valid());
    }

    #[test]
    fn step_update_values_must_match_field_kind() {
        let wrong = StepUpdateRevision::new(
            3,
            1,
            StepField::OptionalStatus,
            FieldValue::Text("no".to_string()),
            FieldValue::Text("yes".to_string()),
        );
        assert!(!wrong.is_valid());

        let right = StepUpdateRevision::new(
            3,
            1,
            StepField::OptionalStatus,
            FieldValue::Flag(false),
            FieldValue::Flag(true),
        );
        assert!(right.is_valid());
    }

    #[test]
    fn json_is_flat_with_tags() {
        let record = RevisionRecord::from(IngredientUpdateRevision::new(
            1,
            IngredientField::Unit,
            Some(FieldValue::Unit(IngredientUnit::Cup)),
            Some(FieldValue::Unit(IngredientUnit::Tbsp)),
        ));
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"category\":\"INGREDIENT\""));
        assert!(json.contains("\"type\":\"UPDATE\""));
        assert!(json.contains("\"changedField\":\"UNIT\""));
        assert!(json.contains("\"previousValue\":\"CUP\""));
        assert!(json.contains("\"newValue\":\"TBSP\""));

        let back: RevisionRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn update_values_decode_by_changed_field() {
        let json = r#"{"category":"INGREDIENT","type":"UPDATE","ingredientId":2,
            "changedField":"QUANTITY","previousValue":1.0,"newValue":"2.50"}"#;
        let record: RevisionRecord = serde_json::from_str(json).unwrap();
        let RevisionRecord::IngredientUpdate(update) = record else {
            panic!("wrong variant");
        };
        assert_eq!(update.previous_value, Some(qty("1.0")));
        assert_eq!(update.new_value, Some(qty("2.50")));

        let bad = r#"{"category":"STEP","type":"UPDATE","stepId":1,"stepNumber":1,
            "changedField":"TIMER","previousValue":"soon","newValue":30}"#;
        assert!(serde_json::from_str::<RevisionRecord>(bad).is_err());
    }
}
