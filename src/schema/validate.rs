//! Offline schema validation.
//!
//! Runs once in [`SchemaBuilder::build`], before any parsing:
//! - a record declares at most one iterator or multi-iterator field;
//! - an eager record must not reach a lazy record through nested
//!   record fields;
//! - every XML name override targets a real field or variant case;
//! - the root handle is a registered record.
//!
//! [`SchemaBuilder::build`]: super::SchemaBuilder::build

use crate::error::SchemaError;

use super::{FieldDefKind, RecordDef, RecordId, VariantDef};

pub(crate) fn validate(
    records: &[RecordDef],
    variants: &[VariantDef],
    root: RecordId,
) -> Result<(), SchemaError> {
    if root.0 >= records.len() {
        return Err(SchemaError::RootNotRecord);
    }

    for record in records {
        let iterators = record
            .fields
            .iter()
            .filter(|f| matches!(f.kind, FieldDefKind::Iter { .. } | FieldDefKind::Multi(_)))
            .count();
        if iterators > 1 {
            return Err(SchemaError::MultipleIterators {
                record: record.name.clone(),
            });
        }

        for (field, _) in &record.renames {
            if !record.fields.iter().any(|f| f.name == *field) {
                return Err(SchemaError::UnknownFieldOverride {
                    record: record.name.clone(),
                    field: field.clone(),
                });
            }
        }
    }

    for variant in variants {
        for (case, _) in &variant.renames {
            if !variant.cases.iter().any(|(name, _)| name == case) {
                return Err(SchemaError::UnknownVariantOverride {
                    variant: variant.name.clone(),
                    case: case.clone(),
                });
            }
        }
    }

    // An eager record owns its whole subtree at bind time, so nothing
    // reachable through nested record fields may need an iterator.
    for (idx, record) in records.iter().enumerate() {
        if is_lazy(records, idx) {
            continue;
        }
        if let Some(lazy) = find_lazy_descendant(records, idx, &mut vec![false; records.len()]) {
            return Err(SchemaError::LazyInsideEager {
                record: record.name.clone(),
                lazy: records[lazy].name.clone(),
            });
        }
    }

    Ok(())
}

fn is_lazy(records: &[RecordDef], idx: usize) -> bool {
    records[idx]
        .fields
        .iter()
        .any(|f| matches!(f.kind, FieldDefKind::Iter { .. } | FieldDefKind::Multi(_)))
}

/// Depth-first search through nested record fields for a lazy record.
fn find_lazy_descendant(
    records: &[RecordDef],
    idx: usize,
    visited: &mut Vec<bool>,
) -> Option<usize> {
    if visited[idx] {
        return None;
    }
    visited[idx] = true;
    for field in &records[idx].fields {
        if let FieldDefKind::Record(child) = field.kind {
            if is_lazy(records, child.0) {
                return Some(child.0);
            }
            if let Some(found) = find_lazy_descendant(records, child.0, visited) {
                return Some(found);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::super::{Prim, RecordDef, SchemaBuilder, VariantDef};
    use crate::error::SchemaError;

    #[test]
    fn test_two_iterators_rejected() {
        let mut b = SchemaBuilder::new();
        let item = b.add_record(RecordDef::new("Item").prim("v", Prim::I32));
        let bad = b.add_record(
            RecordDef::new("Bad")
                .iterator("xs", "x", item)
                .iterator("ys", "y", item),
        );
        let err = b.build(bad).unwrap_err();
        assert!(matches!(err, SchemaError::MultipleIterators { record } if record == "Bad"));
    }

    #[test]
    fn test_iterator_plus_multi_rejected() {
        let mut b = SchemaBuilder::new();
        let item = b.add_record(RecordDef::new("Item").prim("v", Prim::I32));
        let variant = b.add_variant(VariantDef::new("V").case("item", item));
        let bad = b.add_record(
            RecordDef::new("Bad")
                .iterator("xs", "x", item)
                .multi("all", variant),
        );
        let err = b.build(bad).unwrap_err();
        assert!(matches!(err, SchemaError::MultipleIterators { .. }));
    }

    #[test]
    fn test_lazy_under_eager_rejected() {
        let mut b = SchemaBuilder::new();
        let item = b.add_record(RecordDef::new("Item").prim("v", Prim::I32));
        let lazy = b.add_record(RecordDef::new("Lazy").iterator("items", "item", item));
        let mid = b.add_record(RecordDef::new("Mid").record("inner", lazy));
        let root = b.add_record(RecordDef::new("Root").record("mid", mid));
        let err = b.build(root).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::LazyInsideEager { record, lazy } if record == "Mid" && lazy == "Lazy"
        ));
    }

    #[test]
    fn test_unknown_field_override_rejected() {
        let mut b = SchemaBuilder::new();
        let r = b.add_record(RecordDef::new("R").prim("a", Prim::I32).rename("b", "c"));
        let err = b.build(r).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::UnknownFieldOverride { field, .. } if field == "b"
        ));
    }

    #[test]
    fn test_unknown_variant_override_rejected() {
        let mut b = SchemaBuilder::new();
        let item = b.add_record(RecordDef::new("Item").prim("v", Prim::I32));
        let v = b.add_variant(VariantDef::new("V").case("item", item).rename("other", "x"));
        let root = b.add_record(RecordDef::new("Root").multi("all", v));
        let err = b.build(root).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::UnknownVariantOverride { case, .. } if case == "other"
        ));
    }

    #[test]
    fn test_valid_nested_lazy_accepted() {
        let mut b = SchemaBuilder::new();
        let coll = b.add_record(RecordDef::new("Collection").prim("name", Prim::Bytes));
        let lib = b.add_record(
            RecordDef::new("Library")
                .prim("name", Prim::Bytes)
                .iterator("collections", "collection", coll),
        );
        let platform = b.add_record(RecordDef::new("Platform").iterator("libraries", "library", lib));
        assert!(b.build(platform).is_ok());
    }
}
