//! Typed values produced by the schema dispatcher.

use std::borrow::Cow;
use std::rc::Rc;

use crate::error::{Error, ErrorKind};

use super::RecordShape;

/// A user-supplied text-to-value conversion for [`Prim::Custom`].
///
/// Receives the raw (entity-resolved) bytes; an `Err` propagates as a
/// conversion failure naming the field.
pub type ConvertFn = fn(&[u8]) -> Result<Value<'static>, String>;

/// Primitive field types, with integer widths range-checked at
/// conversion time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Prim {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Bool,
    /// Borrowed byte sequence: zero-copy on slice-backed sources.
    Bytes,
    Custom(ConvertFn),
}

/// A converted field value.
///
/// `Bytes` borrows the document on slice-backed sources; everything
/// else is owned.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'doc> {
    /// An optional field that was not present.
    Absent,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Bytes(Cow<'doc, [u8]>),
    Record(Box<Record<'doc>>),
}

impl<'doc> Value<'doc> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b.as_ref()),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn as_record(&self) -> Option<&Record<'doc>> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }
}

/// A fully materialized record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<'doc> {
    pub(crate) shape: Rc<RecordShape>,
    pub(crate) values: Vec<Value<'doc>>,
}

impl<'doc> Record<'doc> {
    /// The record's declared name.
    pub fn name(&self) -> &str {
        &self.shape.name
    }

    /// Look up a field value by field (not XML) name.
    pub fn get(&self, field: &str) -> Option<&Value<'doc>> {
        self.shape
            .fields
            .iter()
            .position(|f| f.name == field)
            .map(|i| &self.values[i])
    }

    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn int_field(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_int)
    }

    pub fn uint_field(&self, field: &str) -> Option<u64> {
        self.get(field).and_then(Value::as_uint)
    }

    pub fn float_field(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(Value::as_float)
    }

    pub fn bool_field(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(Value::as_bool)
    }

    pub fn record_field(&self, field: &str) -> Option<&Record<'doc>> {
        self.get(field).and_then(Value::as_record)
    }
}

impl PartialEq for RecordShape {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

/// Convert raw character data per the declared primitive type.
pub(crate) fn convert<'doc>(
    prim: &Prim,
    raw: Cow<'doc, [u8]>,
    field: &str,
    pos: usize,
) -> Result<Value<'doc>, Error> {
    let int_err = || ErrorKind::InvalidInteger {
        field: field.to_string(),
    }
    .at(pos);
    match prim {
        Prim::I8 => parse_int(&raw)
            .filter(|v| i8::try_from(*v).is_ok())
            .map(Value::Int)
            .ok_or_else(int_err),
        Prim::I16 => parse_int(&raw)
            .filter(|v| i16::try_from(*v).is_ok())
            .map(Value::Int)
            .ok_or_else(int_err),
        Prim::I32 => parse_int(&raw)
            .filter(|v| i32::try_from(*v).is_ok())
            .map(Value::Int)
            .ok_or_else(int_err),
        Prim::I64 => parse_int(&raw).map(Value::Int).ok_or_else(int_err),
        Prim::U8 => parse_uint(&raw)
            .filter(|v| u8::try_from(*v).is_ok())
            .map(Value::UInt)
            .ok_or_else(int_err),
        Prim::U16 => parse_uint(&raw)
            .filter(|v| u16::try_from(*v).is_ok())
            .map(Value::UInt)
            .ok_or_else(int_err),
        Prim::U32 => parse_uint(&raw)
            .filter(|v| u32::try_from(*v).is_ok())
            .map(Value::UInt)
            .ok_or_else(int_err),
        Prim::U64 => parse_uint(&raw).map(Value::UInt).ok_or_else(int_err),
        Prim::F32 => std::str::from_utf8(&raw)
            .ok()
            .and_then(|s| s.parse::<f32>().ok())
            .map(|v| Value::Float(v as f64))
            .ok_or_else(|| {
                ErrorKind::InvalidFloat {
                    field: field.to_string(),
                }
                .at(pos)
            }),
        Prim::F64 => std::str::from_utf8(&raw)
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .map(Value::Float)
            .ok_or_else(|| {
                ErrorKind::InvalidFloat {
                    field: field.to_string(),
                }
                .at(pos)
            }),
        Prim::Bool => match raw.as_ref() {
            b"true" => Ok(Value::Bool(true)),
            b"false" => Ok(Value::Bool(false)),
            _ => Err(ErrorKind::InvalidBoolean {
                field: field.to_string(),
            }
            .at(pos)),
        },
        Prim::Bytes => Ok(Value::Bytes(raw)),
        Prim::Custom(f) => f(&raw).map_err(|reason| {
            ErrorKind::Convert {
                field: field.to_string(),
                reason,
            }
            .at(pos)
        }),
    }
}

fn parse_int(raw: &[u8]) -> Option<i64> {
    std::str::from_utf8(raw).ok()?.parse::<i64>().ok()
}

fn parse_uint(raw: &[u8]) -> Option<u64> {
    std::str::from_utf8(raw).ok()?.parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conv(prim: Prim, raw: &[u8]) -> Result<Value<'_>, Error> {
        convert(&prim, Cow::Borrowed(raw), "f", 0)
    }

    #[test]
    fn test_integer_widths() {
        assert_eq!(conv(Prim::I8, b"-128").unwrap(), Value::Int(-128));
        assert!(conv(Prim::I8, b"128").is_err());
        assert_eq!(conv(Prim::U16, b"65535").unwrap(), Value::UInt(65535));
        assert!(conv(Prim::U16, b"65536").is_err());
        assert!(conv(Prim::U8, b"-1").is_err());
        assert_eq!(
            conv(Prim::I64, b"9223372036854775807").unwrap(),
            Value::Int(i64::MAX)
        );
    }

    #[test]
    fn test_integer_rejects_garbage() {
        let err = conv(Prim::I32, b"12x").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidInteger { field } if field == "f"));
    }

    #[test]
    fn test_floats() {
        assert_eq!(conv(Prim::F64, b"2.5").unwrap(), Value::Float(2.5));
        assert!(conv(Prim::F64, b"nope").is_err());
        assert!(matches!(conv(Prim::F32, b"1e3").unwrap(), Value::Float(v) if v == 1000.0));
    }

    #[test]
    fn test_bool_is_exact() {
        assert_eq!(conv(Prim::Bool, b"true").unwrap(), Value::Bool(true));
        assert_eq!(conv(Prim::Bool, b"false").unwrap(), Value::Bool(false));
        assert!(conv(Prim::Bool, b"True").is_err());
        assert!(conv(Prim::Bool, b"1").is_err());
    }

    #[test]
    fn test_bytes_keeps_borrow() {
        let v = conv(Prim::Bytes, b"M0 0").unwrap();
        assert_eq!(v.as_str(), Some("M0 0"));
        assert!(matches!(v, Value::Bytes(Cow::Borrowed(_))));
    }

    #[test]
    fn test_custom_conversion() {
        fn hex(raw: &[u8]) -> Result<Value<'static>, String> {
            let s = std::str::from_utf8(raw).map_err(|e| e.to_string())?;
            u64::from_str_radix(s.trim_start_matches('#'), 16)
                .map(Value::UInt)
                .map_err(|e| e.to_string())
        }
        assert_eq!(
            conv(Prim::Custom(hex), b"#ff00ff").unwrap(),
            Value::UInt(0xff00ff)
        );
        let err = conv(Prim::Custom(hex), b"#zz").unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Convert { .. }));
    }
}
