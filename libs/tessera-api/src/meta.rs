use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::enumset::EnumMeta;
use crate::error::{Error, Result};
use crate::row::Cell;
use crate::tensor::{Tensor, TensorElem, TensorMeta};
use crate::value::{Kind, Value};

/// Type-description contract for one column: text ↔ typed value.
///
/// `convert` parses `text` into `slot`. For multi-element columns
/// (`width > 1`) it parses element `index` of `width` into the value
/// already in the slot, creating it on the first element. On failure
/// the slot is left as it was, so a present-but-unparsable field stays
/// distinguishable from an absent one.
///
/// `format` is the left inverse of `convert`: absent values format to
/// an empty string and are never parsed back.
pub trait Meta: Send + Sync + fmt::Debug {
    fn kind(&self) -> Kind;

    fn convert(&self, text: &str, slot: &mut Cell, index: usize, width: usize) -> Result<()>;

    fn format(&self, value: Option<&Value>) -> Result<String>;
}

// ════════════════════════════════════════════════════════════════
//  ScalarMeta
// ════════════════════════════════════════════════════════════════

/// Built-in meta for single-valued columns of one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalarMeta(pub Kind);

impl Meta for ScalarMeta {
    fn kind(&self) -> Kind {
        self.0
    }

    fn convert(&self, text: &str, slot: &mut Cell, _index: usize, width: usize) -> Result<()> {
        if width > 1 {
            return Err(Error::type_err(format!("{} column cannot hold {width} elements", self.0)));
        }
        *slot = Some(parse_value(self.0, text)?);
        Ok(())
    }

    fn format(&self, value: Option<&Value>) -> Result<String> {
        match value {
            None => Ok(String::new()),
            Some(v) if v.kind() == self.0 => Ok(v.to_string()),
            Some(v) => Err(Error::type_err(format!("`{v}` is {} but column is {}", v.kind(), self.0))),
        }
    }
}

/// Parse `text` as a value of `kind`.
///
/// Numbers and booleans tolerate surrounding whitespace; strings are
/// taken verbatim.
pub fn parse_value(kind: Kind, text: &str) -> Result<Value> {
    fn num<T>(text: &str) -> Result<T>
    where
        T: std::str::FromStr,
        T::Err: fmt::Display,
    {
        text.trim().parse::<T>().map_err(|e| Error::convert(text, e))
    }

    Ok(match kind {
        Kind::Bool => Value::Bool(parse_bool(text)?),
        Kind::Int8 => Value::Int8(num(text)?),
        Kind::Int16 => Value::Int16(num(text)?),
        Kind::Int32 => Value::Int32(num(text)?),
        Kind::Int64 => Value::Int64(num(text)?),
        Kind::Isize => Value::Isize(num(text)?),
        Kind::UInt8 => Value::UInt8(num(text)?),
        Kind::UInt16 => Value::UInt16(num(text)?),
        Kind::UInt32 => Value::UInt32(num(text)?),
        Kind::UInt64 => Value::UInt64(num(text)?),
        Kind::Usize => Value::Usize(num(text)?),
        Kind::Float32 => Value::Float32(num(text)?),
        Kind::Float64 => Value::Float64(num(text)?),
        Kind::String => Value::String(text.to_string()),
        Kind::Timestamp => Value::Timestamp(parse_timestamp(text)?),
        Kind::Tensor => Value::Tensor(Tensor::decode(text)?),
    })
}

fn parse_bool(text: &str) -> Result<bool> {
    match text.trim() {
        "1" => Ok(true),
        "0" => Ok(false),
        s if s.eq_ignore_ascii_case("true") => Ok(true),
        s if s.eq_ignore_ascii_case("false") => Ok(false),
        _ => Err(Error::convert(text, "not a boolean")),
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]` (UTC) and `YYYY-MM-DD`.
pub fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    let s = text.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::convert(text, e))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| Error::convert(text, "invalid midnight"))?;
    Ok(Utc.from_utc_datetime(&midnight))
}

/// Resolve a meta from its configuration name.
pub fn meta_by_name(name: &str) -> Result<Arc<dyn Meta>> {
    let kind = match name.to_ascii_lowercase().as_str() {
        "bool" | "boolean" => Kind::Bool,
        "i8" | "int8" => Kind::Int8,
        "i16" | "int16" => Kind::Int16,
        "i32" | "int32" => Kind::Int32,
        "i64" | "int64" => Kind::Int64,
        "int" | "isize" => Kind::Isize,
        "u8" | "uint8" | "byte" => Kind::UInt8,
        "u16" | "uint16" => Kind::UInt16,
        "u32" | "uint32" => Kind::UInt32,
        "u64" | "uint64" => Kind::UInt64,
        "uint" | "usize" => Kind::Usize,
        "f32" | "float32" => Kind::Float32,
        "f64" | "float64" | "double" => Kind::Float64,
        "string" | "str" | "text" => Kind::String,
        "timestamp" | "datetime" | "date" => Kind::Timestamp,
        "tensor" | "tensor_u8" => return Ok(Arc::new(TensorMeta::new(TensorElem::Byte))),
        "tensor_f32" => return Ok(Arc::new(TensorMeta::new(TensorElem::Float32))),
        "enum" | "category" => return Ok(Arc::new(EnumMeta::new())),
        other => return Err(Error::config(format!("unknown column meta `{other}`"))),
    };
    Ok(Arc::new(ScalarMeta(kind)))
}
