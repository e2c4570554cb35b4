use hashbrown::HashMap;
use tracing::{debug, warn};

use crate::{
    revision::RevisionRecord,
    snapshot::{IngredientSnapshot, StepSnapshot},
};

use super::traits::Tracked;

/// Minimal record set turning `before` into `after`.
///
/// Output order is removes (in `before` order), then one update per changed
/// field (field declaration order, then ascending identity), then adds (in
/// `after` order). Identical entities produce nothing. When an identity
/// appears more than once in a snapshot, its last occurrence wins.
pub fn diff_snapshots<T: Tracked>(before: &[T], after: &[T]) -> Vec<RevisionRecord> {
    let (before_order, before_by_id) = index_by_identity(before);
    let (after_order, after_by_id) = index_by_identity(after);

    let mut out = Vec::new();

    for id in &before_order {
        if !after_by_id.contains_key(id) {
            out.push(before_by_id[id].removed());
        }
    }

    let mut common: Vec<(i64, &T, &T)> = after_order
        .iter()
        .filter_map(|id| {
            before_by_id
                .get(id)
                .map(|old| (*id, *old, after_by_id[id]))
        })
        .collect();
    common.sort_by_key(|(id, _, _)| *id);

    for field in T::FIELDS {
        for (_, old, new) in &common {
            let previous = old.field_value(*field);
            let next = new.field_value(*field);
            if previous != next {
                out.push(new.updated(*field, previous, next));
            }
        }
    }

    for id in &after_order {
        if !before_by_id.contains_key(id) {
            out.push(after_by_id[id].added());
        }
    }

    debug!(
        before = before.len(),
        after = after.len(),
        records = out.len(),
        "computed snapshot diff"
    );
    out
}

/// Diffs two ingredient lists keyed by ingredient id.
pub fn diff_ingredients(
    before: &[IngredientSnapshot],
    after: &[IngredientSnapshot],
) -> Vec<RevisionRecord> {
    diff_snapshots(before, after)
}

/// Diffs two step lists keyed by step id.
pub fn diff_steps(before: &[StepSnapshot], after: &[StepSnapshot]) -> Vec<RevisionRecord> {
    diff_snapshots(before, after)
}

/// Drops repeated identities. The last occurrence wins but keeps the
/// position of the first, matching how [`diff_snapshots`] reads snapshots.
pub fn dedupe_by_identity<T: Tracked>(items: Vec<T>) -> Vec<T> {
    let mut slot: HashMap<i64, usize> = HashMap::with_capacity(items.len());
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        match slot.get(&item.identity()) {
            Some(&idx) => out[idx] = item,
            None => {
                slot.insert(item.identity(), out.len());
                out.push(item);
            }
        }
    }
    out
}

fn index_by_identity<T: Tracked>(items: &[T]) -> (Vec<i64>, HashMap<i64, &T>) {
    let mut order = Vec::with_capacity(items.len());
    let mut by_id = HashMap::with_capacity(items.len());
    for item in items {
        let id = item.identity();
        if by_id.insert(id, item).is_some() {
            warn!(id, "duplicate identity in snapshot, keeping last occurrence");
        } else {
            order.push(id);
        }
    }
    (order, by_id)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rust_decimal::Decimal;

    use super::*;
    use crate::{
        revision::FieldValue,
        types::{IngredientField, RevisionType, StepField},
    };

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn empty_before_is_all_adds() {
        let after = vec![
            IngredientSnapshot::new(1, "Flour"),
            IngredientSnapshot::new(2, "Sugar"),
        ];
        let out = diff_ingredients(&[], &after);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.revision_type() == RevisionType::Add));
        assert_eq!(out[0].entity_id(), Some(1));
        assert_eq!(out[1].entity_id(), Some(2));
    }

    #[test]
    fn empty_after_is_all_removes() {
        let before = vec![StepSnapshot::new(5, 1, "Mix"), StepSnapshot::new(6, 2, "Bake")];
        let out = diff_steps(&before, &[]);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.revision_type() == RevisionType::Remove));
    }

    #[test]
    fn one_update_per_changed_field() {
        let before = vec![IngredientSnapshot::new(1, "Flour").with_quantity(dec("2"))];
        let after = vec![
            IngredientSnapshot::new(1, "Bread flour")
                .with_quantity(dec("3"))
                .with_notes("sifted"),
        ];
        let out = diff_ingredients(&before, &after);
        let fields: Vec<_> = out
            .iter()
            .map(|r| match r {
                RevisionRecord::IngredientUpdate(u) => u.changed_field,
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            fields,
            vec![
                Some(IngredientField::Name),
                Some(IngredientField::Quantity),
                Some(IngredientField::Notes),
            ]
        );
        assert!(out.iter().all(RevisionRecord::is_valid));
    }

    #[test]
    fn equal_decimals_with_different_scale_are_unchanged() {
        let before = vec![IngredientSnapshot::new(1, "Milk").with_quantity(dec("1.5"))];
        let after = vec![IngredientSnapshot::new(1, "Milk").with_quantity(dec("1.50"))];
        assert!(diff_ingredients(&before, &after).is_empty());
    }

    #[test]
    fn missing_timer_and_zero_timer_are_the_same() {
        let before = vec![StepSnapshot::new(1, 1, "Rest dough")];
        let same = vec![StepSnapshot::new(1, 1, "Rest dough").with_timer(0)];
        assert!(diff_steps(&before, &same).is_empty());

        let timed = vec![StepSnapshot::new(1, 1, "Rest dough").with_timer(600)];
        let out = diff_steps(&before, &timed);
        assert_eq!(out.len(), 1);
        let RevisionRecord::StepUpdate(update) = &out[0] else {
            panic!("expected step update");
        };
        assert_eq!(update.changed_field, Some(StepField::Timer));
        assert_eq!(update.previous_value, Some(FieldValue::Integer(0)));
        assert_eq!(update.new_value, Some(FieldValue::Integer(600)));
        assert!(update.is_valid());
    }

    #[test]
    fn updates_are_field_major_then_by_identity() {
        let before = vec![
            StepSnapshot::new(9, 1, "Chop onions"),
            StepSnapshot::new(3, 2, "Fry onions"),
        ];
        let after = vec![
            StepSnapshot::new(3, 1, "Fry onions gently"),
            StepSnapshot::new(9, 2, "Chop onions finely"),
        ];
        let out = diff_steps(&before, &after);
        let keys: Vec<_> = out
            .iter()
            .map(|r| match r {
                RevisionRecord::StepUpdate(u) => (u.changed_field, u.step_id),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            keys,
            vec![
                (Some(StepField::Instruction), Some(3)),
                (Some(StepField::Instruction), Some(9)),
                (Some(StepField::StepNumber), Some(3)),
                (Some(StepField::StepNumber), Some(9)),
            ]
        );
    }

    #[test]
    fn duplicate_identity_keeps_last() {
        let before = vec![IngredientSnapshot::new(1, "Salt")];
        let after = vec![
            IngredientSnapshot::new(1, "Pepper"),
            IngredientSnapshot::new(1, "Salt"),
        ];
        assert!(diff_ingredients(&before, &after).is_empty());
    }

    #[test]
    fn dedupe_keeps_first_position_and_last_value() {
        let items = vec![
            IngredientSnapshot::new(1, "Pepper"),
            IngredientSnapshot::new(2, "Oil"),
            IngredientSnapshot::new(1, "Salt"),
        ];
        let out = dedupe_by_identity(items);
        let names: Vec<_> = out.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Salt", "Oil"]);
    }
}
