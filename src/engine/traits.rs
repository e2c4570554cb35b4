use std::fmt::Debug;

use crate::{
    revision::{
        FieldValue, IngredientAddRevision, IngredientRemoveRevision, IngredientUpdateRevision,
        RevisionRecord, StepAddRevision, StepRemoveRevision, StepUpdateRevision,
    },
    snapshot::{IngredientSnapshot, StepSnapshot},
    types::{IngredientField, StepField},
};

/// An entity whose changes are recorded field by field.
pub trait Tracked {
    /// Tracked field enum.
    type Field: Copy + Eq + Debug + 'static;

    /// Tracked fields in the order their updates are emitted.
    const FIELDS: &'static [Self::Field];

    /// Identity key matched between snapshots.
    fn identity(&self) -> i64;

    /// Comparable value of `field`; `None` when unset.
    fn field_value(&self, field: Self::Field) -> Option<FieldValue>;

    /// Record describing this entity being added.
    fn added(&self) -> RevisionRecord;

    /// Record describing this entity being removed.
    fn removed(&self) -> RevisionRecord;

    /// Record describing one field of this (after-state) entity changing.
    fn updated(
        &self,
        field: Self::Field,
        previous: Option<FieldValue>,
        new: Option<FieldValue>,
    ) -> RevisionRecord;
}

impl Tracked for IngredientSnapshot {
    type Field = IngredientField;

    const FIELDS: &'static [IngredientField] = &IngredientField::ALL;

    fn identity(&self) -> i64 {
        self.ingredient_id
    }

    fn field_value(&self, field: IngredientField) -> Option<FieldValue> {
        match field {
            IngredientField::Name => Some(FieldValue::Text(self.name.clone())),
            IngredientField::Quantity => self.quantity.map(FieldValue::Quantity),
            IngredientField::Unit => self.unit.map(FieldValue::Unit),
            IngredientField::OptionalStatus => Some(FieldValue::Flag(self.is_optional)),
            IngredientField::Notes => self.notes.clone().map(FieldValue::Text),
        }
    }

    fn added(&self) -> RevisionRecord {
        IngredientAddRevision {
            ingredient_id: Some(self.ingredient_id),
            ingredient_name: self.name.clone(),
            quantity: self.quantity,
            unit: self.unit,
            is_optional: self.is_optional,
            description: self.notes.clone(),
        }
        .into()
    }

    fn removed(&self) -> RevisionRecord {
        IngredientRemoveRevision {
            ingredient_id: Some(self.ingredient_id),
            ingredient_name: Some(self.name.clone()),
        }
        .into()
    }

    fn updated(
        &self,
        field: IngredientField,
        previous: Option<FieldValue>,
        new: Option<FieldValue>,
    ) -> RevisionRecord {
        let mut update = IngredientUpdateRevision::new(self.ingredient_id, field, previous, new);
        update.ingredient_name = Some(self.name.clone());
        update.into()
    }
}

impl Tracked for StepSnapshot {
    type Field = StepField;

    const FIELDS: &'static [StepField] = &StepField::ALL;

    fn identity(&self) -> i64 {
        self.step_id
    }

    // Every step field has a value; a missing timer reads as 0 seconds.
    fn field_value(&self, field: StepField) -> Option<FieldValue> {
        Some(match field {
            StepField::Instruction => FieldValue::Text(self.instruction.clone()),
            StepField::StepNumber => FieldValue::Integer(i64::from(self.step_number)),
            StepField::OptionalStatus => FieldValue::Flag(self.optional),
            StepField::Timer => FieldValue::Integer(i64::from(self.timer_seconds.unwrap_or(0))),
        })
    }

    fn added(&self) -> RevisionRecord {
        StepAddRevision {
            step_id: Some(self.step_id),
            step_number: Some(self.step_number),
            instruction: self.instruction.clone(),
            optional: Some(self.optional),
            timer_seconds: self.timer_seconds,
        }
        .into()
    }

    fn removed(&self) -> RevisionRecord {
        StepRemoveRevision {
            step_id: Some(self.step_id),
            step_number: Some(self.step_number),
        }
        .into()
    }

    fn updated(
        &self,
        field: StepField,
        previous: Option<FieldValue>,
        new: Option<FieldValue>,
    ) -> RevisionRecord {
        StepUpdateRevision {
            step_id: Some(self.step_id),
            step_number: Some(self.step_number),
            changed_field: Some(field),
            previous_value: previous,
            new_value: new,
        }
        .into()
    }
}
