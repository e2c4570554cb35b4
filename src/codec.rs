//! Text encoding of revision records and of the previous/new pair stored on a
//! revision row.

use serde_json::Value;
use tracing::debug;

use crate::{
    revision::RevisionRecord,
    types::{RevisionCategory, RevisionType},
};

/// Marker stored in the half of a pair that has no state (before an add,
/// after a remove).
pub const ABSENT: &str = "null";

/// Stored text could not be turned back into a [`RevisionRecord`].
#[derive(Debug, thiserror::Error)]
pub enum RevisionDecodeError {
    #[error("malformed revision payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown revision category {0:?}")]
    UnknownCategory(String),

    #[error("unknown revision type {0:?}")]
    UnknownType(String),

    #[error("payload tagged {found_category}/{found_type}, row says {expected_category}/{expected_type}")]
    TagMismatch {
        expected_category: RevisionCategory,
        expected_type: RevisionType,
        found_category: RevisionCategory,
        found_type: RevisionType,
    },

    #[error("{category}/{revision_type} row has no {half} payload")]
    MissingPayload {
        category: RevisionCategory,
        revision_type: RevisionType,
        half: &'static str,
    },

    #[error("{category}/{revision_type} row has an unexpected {half} payload")]
    UnexpectedPayload {
        category: RevisionCategory,
        revision_type: RevisionType,
        half: &'static str,
    },

    #[error("previous and new payloads of an update row disagree")]
    PayloadMismatch,
}

/// Encoded previous/new halves of one revision row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPair {
    /// State before the change, or [`ABSENT`].
    pub previous_data: String,
    /// State after the change, or [`ABSENT`].
    pub new_data: String,
}

/// Encodes a record as JSON text carrying its own `category`/`type` tags.
pub fn encode(record: &RevisionRecord) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(record)?;
    debug!(category = %record.category(), revision_type = %record.revision_type(), "encoded revision");
    Ok(json)
}

/// Decodes JSON text into a record.
///
/// With a `hint` the variant is chosen from the hint (the row's columns) and
/// any embedded tags must agree with it. Without one the embedded tags decide.
pub fn decode(
    text: &str,
    hint: Option<(RevisionCategory, RevisionType)>,
) -> Result<RevisionRecord, RevisionDecodeError> {
    let value: Value = serde_json::from_str(text)?;

    let Some((category, revision_type)) = hint else {
        return Ok(serde_json::from_value(value)?);
    };

    if let Some((found_category, found_type)) = embedded_tags(&value)? {
        if (found_category, found_type) != (category, revision_type) {
            return Err(RevisionDecodeError::TagMismatch {
                expected_category: category,
                expected_type: revision_type,
                found_category,
                found_type,
            });
        }
    }

    let record = RevisionRecord::from_parts(category, revision_type, value)?;
    debug!(%category, %revision_type, "decoded revision");
    Ok(record)
}

/// Splits a record into the previous/new pair stored on its row.
///
/// Adds have no previous state, removes have no new state, and updates
/// carry the full record (both values) in each half.
pub fn encode_pair(record: &RevisionRecord) -> Result<StoredPair, serde_json::Error> {
    let encoded = encode(record)?;
    let pair = match record.revision_type() {
        RevisionType::Add => StoredPair {
            previous_data: ABSENT.to_string(),
            new_data: encoded,
        },
        RevisionType::Remove => StoredPair {
            previous_data: encoded,
            new_data: ABSENT.to_string(),
        },
        RevisionType::Update => StoredPair {
            previous_data: encoded.clone(),
            new_data: encoded,
        },
    };
    Ok(pair)
}

/// Decodes a stored row from its category/type columns and payload pair.
pub fn decode_row(
    category: &str,
    revision_type: &str,
    previous_data: &str,
    new_data: &str,
) -> Result<RevisionRecord, RevisionDecodeError> {
    let category = RevisionCategory::parse(category)
        .ok_or_else(|| RevisionDecodeError::UnknownCategory(category.to_string()))?;
    let revision_type = RevisionType::parse(revision_type)
        .ok_or_else(|| RevisionDecodeError::UnknownType(revision_type.to_string()))?;
    let hint = Some((category, revision_type));

    let missing = |half| RevisionDecodeError::MissingPayload {
        category,
        revision_type,
        half,
    };
    let unexpected = |half| RevisionDecodeError::UnexpectedPayload {
        category,
        revision_type,
        half,
    };

    match revision_type {
        RevisionType::Add => {
            if !is_absent(previous_data) {
                return Err(unexpected("previous"));
            }
            if is_absent(new_data) {
                return Err(missing("new"));
            }
            decode(new_data, hint)
        }
        RevisionType::Remove => {
            if !is_absent(new_data) {
                return Err(unexpected("new"));
            }
            if is_absent(previous_data) {
                return Err(missing("previous"));
            }
            decode(previous_data, hint)
        }
        RevisionType::Update => {
            if is_absent(previous_data) {
                return Err(missing("previous"));
            }
            if is_absent(new_data) {
                return Err(missing("new"));
            }
            let before = decode(previous_data, hint)?;
            let after = decode(new_data, hint)?;
            if before != after {
                return Err(RevisionDecodeError::PayloadMismatch);
            }
            Ok(after)
        }
    }
}

fn is_absent(text: &str) -> bool {
    let text = text.trim();
    text.is_empty() || text == ABSENT
}

fn embedded_tags(
    value: &Value,
) -> Result<Option<(RevisionCategory, RevisionType)>, RevisionDecodeError> {
    let category = value.get("category").and_then(Value::as_str);
    let revision_type = value.get("type").and_then(Value::as_str);
    let (Some(category), Some(revision_type)) = (category, revision_type) else {
        return Ok(None);
    };
    let category = RevisionCategory::parse(category)
        .ok_or_else(|| RevisionDecodeError::UnknownCategory(category.to_string()))?;
    let revision_type = RevisionType::parse(revision_type)
        .ok_or_else(|| RevisionDecodeError::UnknownType(revision_type.to_string()))?;
    Ok(Some((category, revision_type)))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use super::*;
    use crate::{
        revision::{FieldValue, IngredientAddRevision, StepRemoveRevision, StepUpdateRevision},
        types::{IngredientUnit, StepField},
    };

    fn flour() -> RevisionRecord {
        IngredientAddRevision {
            ingredient_id: Some(1),
            ingredient_name: "Flour".to_string(),
            quantity: Some(Decimal::from_str("2.5").unwrap()),
            unit: Some(IngredientUnit::Cup),
            is_optional: false,
            description: Some("All-purpose flour".to_string()),
        }
        .into()
    }

    #[test]
    fn decimal_quantity_survives_exactly() {
        let text = encode(&flour()).unwrap();
        assert!(text.contains("\"quantity\":\"2.5\""));
        let back = decode(&text, None).unwrap();
        let RevisionRecord::IngredientAdd(add) = &back else {
            panic!("wrong variant");
        };
        assert_eq!(add.quantity.unwrap().to_string(), "2.5");
        assert_eq!(back, flour());
    }

    #[test]
    fn hint_must_match_embedded_tags() {
        let text = encode(&flour()).unwrap();
        let err = decode(&text, Some((RevisionCategory::Step, RevisionType::Add))).unwrap_err();
        assert!(matches!(err, RevisionDecodeError::TagMismatch { .. }));
    }

    #[test]
    fn hint_decodes_untagged_payloads() {
        let text = r#"{"stepId":3,"stepNumber":3}"#;
        let record = decode(text, Some((RevisionCategory::Step, RevisionType::Remove))).unwrap();
        assert_eq!(
            record,
            RevisionRecord::StepRemove(StepRemoveRevision {
                step_id: Some(3),
                step_number: Some(3),
            })
        );
        assert!(decode(text, None).is_err());
    }

    #[test]
    fn malformed_text_is_a_decode_error() {
        assert!(matches!(
            decode("{not json", None),
            Err(RevisionDecodeError::Malformed(_))
        ));
        assert!(matches!(
            decode("[1,2]", Some((RevisionCategory::Ingredient, RevisionType::Add))),
            Err(RevisionDecodeError::Malformed(_))
        ));
    }

    #[test]
    fn pair_layout_follows_revision_type() {
        let add = encode_pair(&flour()).unwrap();
        assert_eq!(add.previous_data, ABSENT);

        let remove: RevisionRecord = StepRemoveRevision {
            step_id: Some(9),
            step_number: Some(2),
        }
        .into();
        let pair = encode_pair(&remove).unwrap();
        assert_eq!(pair.new_data, ABSENT);
        let back = decode_row("STEP", "REMOVE", &pair.previous_data, &pair.new_data).unwrap();
        assert_eq!(back, remove);

        let update: RevisionRecord = StepUpdateRevision::new(
            4,
            1,
            StepField::Timer,
            FieldValue::Integer(0),
            FieldValue::Integer(300),
        )
        .into();
        let pair = encode_pair(&update).unwrap();
        assert_eq!(pair.previous_data, pair.new_data);
        let back = decode_row("STEP", "UPDATE", &pair.previous_data, &pair.new_data).unwrap();
        assert_eq!(back, update);
    }

    #[test]
    fn row_errors_are_typed() {
        let add = encode_pair(&flour()).unwrap();
        assert!(matches!(
            decode_row("RECIPE", "ADD", &add.previous_data, &add.new_data),
            Err(RevisionDecodeError::UnknownCategory(_))
        ));
        assert!(matches!(
            decode_row("INGREDIENT", "RENAME", &add.previous_data, &add.new_data),
            Err(RevisionDecodeError::UnknownType(_))
        ));
        assert!(matches!(
            decode_row("INGREDIENT", "ADD", &add.new_data, &add.new_data),
            Err(RevisionDecodeError::UnexpectedPayload { half: "previous", .. })
        ));
        assert!(matches!(
            decode_row("INGREDIENT", "ADD", ABSENT, ABSENT),
            Err(RevisionDecodeError::MissingPayload { half: "new", .. })
        ));
        assert!(matches!(
            decode_row("INGREDIENT", "DELETE", ABSENT, ABSENT),
            Err(RevisionDecodeError::MissingPayload { half: "previous", .. })
        ));
    }
}
