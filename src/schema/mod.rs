//! Declarative schemas for record-directed parsing.
//!
//! A schema is a runtime table of record and variant descriptors. The
//! builder hands out [`RecordId`]/[`VariantId`] handles, and
//! [`SchemaBuilder::build`] validates the whole table before any
//! parsing is possible.
//!
//! ```
//! use veloxml::schema::{Prim, RecordDef, SchemaBuilder};
//!
//! let mut b = SchemaBuilder::new();
//! let path = b.add_record(RecordDef::new("Path").prim("d", Prim::Bytes));
//! let root = b.add_record(
//!     RecordDef::new("Root")
//!         .prim("name", Prim::Bytes)
//!         .iterator("paths", "path", path),
//! );
//! let schema = b.build(root).unwrap();
//! assert!(schema.is_lazy(schema.root()));
//! ```

pub mod dispatch;
pub mod validate;
pub mod value;

pub use dispatch::{Child, Children, LazyRecord, Node, Record, SchemaParser};
pub use value::{ConvertFn, Prim, Value};

use std::rc::Rc;

use crate::error::SchemaError;

/// Handle to a record registered with a builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordId(pub(crate) usize);

/// Handle to a tagged variant registered with a builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantId(pub(crate) usize);

/// Field kinds as declared.
#[derive(Debug, Clone)]
pub(crate) enum FieldDefKind {
    Prim(Prim),
    Record(RecordId),
    Iter { tag: String, item: RecordId },
    Multi(VariantId),
}

#[derive(Debug, Clone)]
pub(crate) struct FieldDef {
    pub(crate) name: String,
    pub(crate) kind: FieldDefKind,
    pub(crate) optional: bool,
    pub(crate) default: Option<Value<'static>>,
}

/// A record under construction: an ordered set of typed fields plus
/// per-field XML name overrides.
#[derive(Debug, Clone)]
pub struct RecordDef {
    pub(crate) name: String,
    pub(crate) fields: Vec<FieldDef>,
    pub(crate) renames: Vec<(String, String)>,
}

impl RecordDef {
    pub fn new(name: &str) -> Self {
        RecordDef {
            name: name.to_string(),
            fields: Vec::new(),
            renames: Vec::new(),
        }
    }

    fn push(mut self, name: &str, kind: FieldDefKind, optional: bool, default: Option<Value<'static>>) -> Self {
        self.fields.push(FieldDef {
            name: name.to_string(),
            kind,
            optional,
            default,
        });
        self
    }

    /// Required primitive field, bound from an attribute or a child
    /// element of the same name.
    pub fn prim(self, name: &str, prim: Prim) -> Self {
        self.push(name, FieldDefKind::Prim(prim), false, None)
    }

    /// Optional primitive field; absent becomes [`Value::Absent`].
    pub fn opt(self, name: &str, prim: Prim) -> Self {
        self.push(name, FieldDefKind::Prim(prim), true, None)
    }

    /// Primitive field with a declared default, applied when the
    /// attribute/child is absent.
    pub fn with_default(self, name: &str, prim: Prim, default: Value<'static>) -> Self {
        self.push(name, FieldDefKind::Prim(prim), false, Some(default))
    }

    /// Nested eager record field.
    pub fn record(self, name: &str, item: RecordId) -> Self {
        self.push(name, FieldDefKind::Record(item), false, None)
    }

    /// Iterator field over children tagged `tag`.
    pub fn iterator(self, name: &str, tag: &str, item: RecordId) -> Self {
        self.push(
            name,
            FieldDefKind::Iter {
                tag: tag.to_string(),
                item,
            },
            false,
            None,
        )
    }

    /// Multi-iterator field over the cases of a tagged variant.
    pub fn multi(self, name: &str, variant: VariantId) -> Self {
        self.push(name, FieldDefKind::Multi(variant), false, None)
    }

    /// Override the XML name a field matches against.
    pub fn rename(mut self, field: &str, xml_name: &str) -> Self {
        self.renames.push((field.to_string(), xml_name.to_string()));
        self
    }
}

/// A tagged variant under construction.
#[derive(Debug, Clone)]
pub struct VariantDef {
    pub(crate) name: String,
    pub(crate) cases: Vec<(String, RecordId)>,
    pub(crate) renames: Vec<(String, String)>,
}

impl VariantDef {
    pub fn new(name: &str) -> Self {
        VariantDef {
            name: name.to_string(),
            cases: Vec::new(),
            renames: Vec::new(),
        }
    }

    /// Add a case: children tagged `tag` bind as `record`.
    pub fn case(mut self, tag: &str, record: RecordId) -> Self {
        self.cases.push((tag.to_string(), record));
        self
    }

    /// Override the XML name a case matches against.
    pub fn rename(mut self, case: &str, xml_name: &str) -> Self {
        self.renames.push((case.to_string(), xml_name.to_string()));
        self
    }
}

/// Compiled field: declaration plus the resolved XML name.
#[derive(Debug, Clone)]
pub(crate) struct FieldShape {
    pub(crate) name: String,
    pub(crate) xml_name: String,
    pub(crate) kind: FieldDefKind,
    pub(crate) optional: bool,
    pub(crate) default: Option<Value<'static>>,
}

/// Compiled record.
#[derive(Debug)]
pub(crate) struct RecordShape {
    pub(crate) name: String,
    pub(crate) fields: Vec<FieldShape>,
    /// Index of the iterator or multi-iterator field, if any.
    pub(crate) iter_field: Option<usize>,
}

#[derive(Debug, Clone)]
pub(crate) struct CaseShape {
    pub(crate) name: String,
    pub(crate) xml_name: String,
    pub(crate) record: RecordId,
}

/// Compiled variant.
#[derive(Debug)]
pub(crate) struct VariantShape {
    #[allow(dead_code)]
    pub(crate) name: String,
    pub(crate) cases: Vec<CaseShape>,
}

/// Registers records and variants, then compiles a validated schema.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    records: Vec<RecordDef>,
    variants: Vec<VariantDef>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_record(&mut self, def: RecordDef) -> RecordId {
        self.records.push(def);
        RecordId(self.records.len() - 1)
    }

    pub fn add_variant(&mut self, def: VariantDef) -> VariantId {
        self.variants.push(def);
        VariantId(self.variants.len() - 1)
    }

    /// Validate the table and compile it with `root` as the schema root.
    pub fn build(self, root: RecordId) -> Result<Schema, SchemaError> {
        validate::validate(&self.records, &self.variants, root)?;

        let records = self
            .records
            .into_iter()
            .map(|def| {
                let fields: Vec<FieldShape> = def
                    .fields
                    .into_iter()
                    .map(|f| {
                        let xml_name = def
                            .renames
                            .iter()
                            .find(|(field, _)| *field == f.name)
                            .map(|(_, xml)| xml.clone())
                            .unwrap_or_else(|| f.name.clone());
                        FieldShape {
                            name: f.name,
                            xml_name,
                            kind: f.kind,
                            optional: f.optional,
                            default: f.default,
                        }
                    })
                    .collect();
                let iter_field = fields
                    .iter()
                    .position(|f| matches!(f.kind, FieldDefKind::Iter { .. } | FieldDefKind::Multi(_)));
                Rc::new(RecordShape {
                    name: def.name,
                    fields,
                    iter_field,
                })
            })
            .collect();

        let variants = self
            .variants
            .into_iter()
            .map(|def| {
                let cases = def
                    .cases
                    .into_iter()
                    .map(|(name, record)| {
                        let xml_name = def
                            .renames
                            .iter()
                            .find(|(case, _)| *case == name)
                            .map(|(_, xml)| xml.clone())
                            .unwrap_or_else(|| name.clone());
                        CaseShape {
                            name,
                            xml_name,
                            record,
                        }
                    })
                    .collect();
                VariantShape {
                    name: def.name,
                    cases,
                }
            })
            .collect();

        Ok(Schema {
            records,
            variants,
            root,
        })
    }
}

/// A validated, immutable schema.
#[derive(Debug)]
pub struct Schema {
    records: Vec<Rc<RecordShape>>,
    variants: Vec<VariantShape>,
    root: RecordId,
}

impl Schema {
    pub fn root(&self) -> RecordId {
        self.root
    }

    /// A record is lazy iff it declares an iterator field.
    pub fn is_lazy(&self, id: RecordId) -> bool {
        self.records[id.0].iter_field.is_some()
    }

    pub(crate) fn record(&self, id: RecordId) -> &Rc<RecordShape> {
        &self.records[id.0]
    }

    pub(crate) fn variant(&self, id: VariantId) -> &VariantShape {
        &self.variants[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rename_resolves_xml_name() {
        let mut b = SchemaBuilder::new();
        let r = b.add_record(
            RecordDef::new("R")
                .prim("stroke_width", Prim::F64)
                .rename("stroke_width", "stroke-width"),
        );
        let schema = b.build(r).unwrap();
        let shape = schema.record(r);
        assert_eq!(shape.fields[0].xml_name, "stroke-width");
        assert_eq!(shape.fields[0].name, "stroke_width");
    }

    #[test]
    fn test_lazy_classification() {
        let mut b = SchemaBuilder::new();
        let item = b.add_record(RecordDef::new("Item").prim("v", Prim::I32));
        let eager = b.add_record(RecordDef::new("Eager").record("item", item));
        let lazy = b.add_record(RecordDef::new("Lazy").iterator("items", "item", item));
        let root = b.add_record(
            RecordDef::new("Root")
                .iterator("children", "lazy", lazy)
                .rename("children", "kids"),
        );
        let schema = b.build(root).unwrap();
        assert!(!schema.is_lazy(item));
        assert!(!schema.is_lazy(eager));
        assert!(schema.is_lazy(lazy));
        assert!(schema.is_lazy(root));
    }
}
