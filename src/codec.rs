//! Encode/decode GATT characteristic values from registered schemas.
//!
//! Main fields are written/read in declared order, followed by the extra fields the
//! discriminant selects. Multi-byte fields are little endian.

use crate::ast::{CharId, CharSchema, FieldType};
use crate::bits;
use crate::extra;
use crate::ieee11073;
use crate::overrides::{self, Override};
use crate::registry::SchemaRegistry;
use crate::rules::{self, FieldLen, Rule, RuleContext};
use crate::value::Value;
use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

/// Named field values of one characteristic.
pub type ValueObject = HashMap<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
    #[error("Missing field: {0}")]
    MissingField(String),
    #[error("Unknown type: {0}")]
    UnknownType(String),
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
    #[error("Unsupported schema for {id}: {reason}")]
    UnsupportedSchema { id: CharId, reason: &'static str },
    #[error("Unknown characteristic: {0}")]
    UnknownCharacteristic(CharId),
    #[error("Unpaired nibble: {0}")]
    UnpairedNibble(String),
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("Truncated: {0}")]
    Truncated(String),
    #[error("Invalid UTF-8 in {field}: {reason}")]
    InvalidText { field: String, reason: String },
    #[error("Parse: {0}")]
    Parse(String),
}

impl CodecError {
    /// Errors caused by the input bytes rather than the schema; decode turns these
    /// into a raw passthrough.
    fn is_malformed_input(&self) -> bool {
        match self {
            CodecError::Io(e) => e.kind() == io::ErrorKind::UnexpectedEof,
            CodecError::Truncated(_) | CodecError::InvalidText { .. } => true,
            _ => false,
        }
    }
}

/// Result of [`GattCodec::decode`].
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Fields(ValueObject),
    /// The input, unchanged: its length is not one the schema accepts, or it is
    /// too short for the declared fields.
    Raw(Vec<u8>),
}

impl Decoded {
    pub fn fields(&self) -> Option<&ValueObject> {
        match self {
            Decoded::Fields(m) => Some(m),
            Decoded::Raw(_) => None,
        }
    }

    pub fn into_fields(self) -> Option<ValueObject> {
        match self {
            Decoded::Fields(m) => Some(m),
            Decoded::Raw(_) => None,
        }
    }

    pub fn raw(&self) -> Option<&[u8]> {
        match self {
            Decoded::Raw(b) => Some(b),
            Decoded::Fields(_) => None,
        }
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Decoded::Raw(_))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields().and_then(|m| m.get(name))
    }
}

/// Schema-driven encoder/decoder. Lookups take `&self`; registration takes `&mut self`.
#[derive(Debug, Clone, Default)]
pub struct GattCodec {
    registry: SchemaRegistry,
}

impl GattCodec {
    /// Codec with an empty registry.
    pub fn new() -> Self {
        GattCodec::default()
    }

    /// Codec preloaded with the built-in characteristic table.
    pub fn with_builtin() -> Result<Self, CodecError> {
        Ok(GattCodec {
            registry: SchemaRegistry::builtin()?,
        })
    }

    pub fn from_registry(registry: SchemaRegistry) -> Self {
        GattCodec { registry }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Validate and register, replacing any existing schema for `id`.
    pub fn register_schema(
        &mut self,
        id: impl Into<CharId>,
        schema: CharSchema,
    ) -> Result<(), CodecError> {
        self.registry.register(id, schema)
    }

    pub fn lookup_schema(&self, id: impl Into<CharId>) -> Option<Arc<CharSchema>> {
        self.registry.get(&id.into())
    }

    /// Load a schema file on top of the current table. Returns the number of definitions.
    pub fn load_schemas(&mut self, path: impl AsRef<Path>) -> Result<usize, CodecError> {
        self.registry.load_file(path)
    }

    /// Encode a value object. Nothing is returned unless every field encodes.
    pub fn encode(
        &self,
        id: impl Into<CharId>,
        values: &ValueObject,
    ) -> Result<Vec<u8>, CodecError> {
        let id = id.into();
        let (schema, overrides) = self.schema_for(&id)?;
        let ctx = RuleContext::new(&schema, overrides);
        let main = rules::compile(schema.fields(), &ctx)?;
        let extras = match &schema.extra {
            Some(e) => rules::compile(extra::resolve(e, overrides, values)?, &ctx)?,
            None => Vec::new(),
        };
        let mut out = Vec::new();
        for rule in main.iter().chain(extras.iter()) {
            encode_rule(&mut out, rule, values)?;
        }
        trace!(%id, fields = main.len() + extras.len(), bytes = out.len(), "encoded");
        Ok(out)
    }

    /// Decode a payload. Inputs the schema cannot describe (wrong length, truncated,
    /// invalid text) come back as [`Decoded::Raw`]; schema problems are errors.
    pub fn decode(&self, id: impl Into<CharId>, bytes: &[u8]) -> Result<Decoded, CodecError> {
        let id = id.into();
        let (schema, overrides) = self.schema_for(&id)?;
        if !schema.accepts_len(bytes.len()) {
            debug!(%id, len = bytes.len(), expected = ?schema.valid_lengths, "length mismatch, passing through");
            return Ok(Decoded::Raw(bytes.to_vec()));
        }
        match decode_fields(&schema, overrides, bytes) {
            Ok(fields) => Ok(Decoded::Fields(fields)),
            Err(e) if e.is_malformed_input() => {
                debug!(%id, len = bytes.len(), error = %e, "malformed payload, passing through");
                Ok(Decoded::Raw(bytes.to_vec()))
            }
            Err(e) => Err(e),
        }
    }

    fn schema_for(&self, id: &CharId) -> Result<(Arc<CharSchema>, &'static Override), CodecError> {
        let schema = self
            .registry
            .get(id)
            .ok_or_else(|| CodecError::UnknownCharacteristic(id.clone()))?;
        let overrides = overrides::lookup(id);
        if let (Some(reason), Some(_)) = (overrides.unsupported, &schema.extra) {
            return Err(CodecError::UnsupportedSchema {
                id: id.clone(),
                reason,
            });
        }
        Ok((schema, overrides))
    }
}

fn decode_fields(
    schema: &CharSchema,
    overrides: &Override,
    bytes: &[u8],
) -> Result<ValueObject, CodecError> {
    let ctx = RuleContext::new(schema, overrides);
    let mut r = Cursor::new(bytes);
    let mut out = ValueObject::new();
    for rule in rules::compile(schema.fields(), &ctx)? {
        decode_rule(&mut r, &rule, &mut out)?;
    }
    if let Some(e) = &schema.extra {
        for rule in rules::compile(extra::resolve(e, overrides, &out)?, &ctx)? {
            decode_rule(&mut r, &rule, &mut out)?;
        }
    }
    let left = bytes.len() - r.position() as usize;
    if left > 0 {
        trace!(left, "ignoring trailing bytes");
    }
    Ok(out)
}

fn lookup<'v>(values: &'v ValueObject, name: &str) -> Result<&'v Value, CodecError> {
    values
        .get(name)
        .ok_or_else(|| CodecError::MissingField(name.to_string()))
}

fn invalid(field: &str, reason: impl Into<String>) -> CodecError {
    CodecError::InvalidValue {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn encode_rule(w: &mut Vec<u8>, rule: &Rule<'_>, values: &ValueObject) -> Result<(), CodecError> {
    match *rule {
        Rule::Scalar { name, ty } => encode_scalar(w, name, ty, lookup(values, name)?),
        Rule::Nibbles { low, high } => {
            let lo = nibble(low, lookup(values, low)?)?;
            let hi = nibble(high, lookup(values, high)?)?;
            w.write_u8(bits::pack_nibbles(lo, hi))?;
            Ok(())
        }
        Rule::Text { name, .. } => {
            let v = lookup(values, name)?;
            let s = v.as_str().ok_or_else(|| invalid(name, format!("expected text, got {}", v)))?;
            w.write_all(s.as_bytes())?;
            Ok(())
        }
        Rule::Address { name, len } => {
            let v = lookup(values, name)?;
            let s = v
                .as_str()
                .ok_or_else(|| invalid(name, format!("expected a hex string, got {}", v)))?;
            let bytes = bits::hex_to_le_bytes(s, len.fixed()).map_err(|e| invalid(name, e))?;
            w.write_all(&bytes)?;
            Ok(())
        }
        Rule::Raw { name, .. } => {
            let v = lookup(values, name)?;
            w.write_all(&raw_bytes(name, v)?)?;
            Ok(())
        }
        Rule::Prefixed { name, text } => {
            let v = lookup(values, name)?;
            let payload = if text {
                v.as_str()
                    .map(|s| s.as_bytes().to_vec())
                    .ok_or_else(|| invalid(name, format!("expected text, got {}", v)))?
            } else {
                raw_bytes(name, v)?
            };
            let n = u8::try_from(payload.len())
                .map_err(|_| invalid(name, format!("{} bytes exceed the length prefix", payload.len())))?;
            w.write_u8(n)?;
            w.write_all(&payload)?;
            Ok(())
        }
        Rule::List { name, element } => {
            let v = lookup(values, name)?;
            let items = v
                .as_list()
                .ok_or_else(|| invalid(name, format!("expected a list, got {}", v)))?;
            for item in items {
                encode_scalar(w, name, element.ty(), item)?;
            }
            Ok(())
        }
    }
}

fn raw_bytes(name: &str, v: &Value) -> Result<Vec<u8>, CodecError> {
    match v {
        Value::Bytes(b) => Ok(b.clone()),
        Value::List(items) => items
            .iter()
            .map(|i| i.as_u64().and_then(|x| u8::try_from(x).ok()))
            .collect::<Option<Vec<u8>>>()
            .ok_or_else(|| invalid(name, "list items must be bytes")),
        other => Err(invalid(name, format!("expected bytes, got {}", other))),
    }
}

fn nibble(name: &str, v: &Value) -> Result<u8, CodecError> {
    match v.as_u64() {
        Some(x) if x <= 0x0F => Ok(x as u8),
        _ => Err(invalid(name, format!("{} does not fit in a nibble", v))),
    }
}

fn unsigned(name: &str, ty: FieldType, v: &Value, max: u64) -> Result<u64, CodecError> {
    match v.as_u64() {
        Some(x) if x <= max => Ok(x),
        _ => Err(invalid(name, format!("{} out of range for {}", v, ty))),
    }
}

fn signed(name: &str, ty: FieldType, v: &Value, min: i64, max: i64) -> Result<i64, CodecError> {
    match v.as_i64() {
        Some(x) if (min..=max).contains(&x) => Ok(x),
        _ => Err(invalid(name, format!("{} out of range for {}", v, ty))),
    }
}

fn number(name: &str, v: &Value) -> Result<f64, CodecError> {
    v.as_f64()
        .ok_or_else(|| invalid(name, format!("expected a number, got {}", v)))
}

fn encode_scalar(w: &mut Vec<u8>, name: &str, ty: FieldType, v: &Value) -> Result<(), CodecError> {
    match ty {
        FieldType::UInt8 => w.write_u8(unsigned(name, ty, v, u8::MAX as u64)? as u8)?,
        FieldType::UInt16 => {
            w.write_u16::<LittleEndian>(unsigned(name, ty, v, u16::MAX as u64)? as u16)?
        }
        FieldType::UInt24 => bits::write_u24(w, unsigned(name, ty, v, bits::UINT24_MAX)? as u32)?,
        FieldType::UInt32 => {
            w.write_u32::<LittleEndian>(unsigned(name, ty, v, u32::MAX as u64)? as u32)?
        }
        FieldType::UInt64 => w.write_u64::<LittleEndian>(unsigned(name, ty, v, u64::MAX)?)?,
        FieldType::Int8 => w.write_i8(signed(name, ty, v, i8::MIN as i64, i8::MAX as i64)? as i8)?,
        FieldType::Int16 => w.write_i16::<LittleEndian>(
            signed(name, ty, v, i16::MIN as i64, i16::MAX as i64)? as i16,
        )?,
        FieldType::Int24 => {
            bits::write_i24(w, signed(name, ty, v, bits::INT24_MIN, bits::INT24_MAX)? as i32)?
        }
        FieldType::Int32 => w.write_i32::<LittleEndian>(
            signed(name, ty, v, i32::MIN as i64, i32::MAX as i64)? as i32,
        )?,
        FieldType::Int64 => w.write_i64::<LittleEndian>(signed(name, ty, v, i64::MIN, i64::MAX)?)?,
        // Reserved markers go through as_f64 as NaN/±inf and land on their codes.
        FieldType::SFloat => w.write_u16::<LittleEndian>(ieee11073::encode_sfloat(number(name, v)?))?,
        FieldType::Float => w.write_u32::<LittleEndian>(ieee11073::encode_float(number(name, v)?))?,
        FieldType::Float32Le => w.write_f32::<LittleEndian>(number(name, v)? as f32)?,
        FieldType::Float64Le => w.write_f64::<LittleEndian>(number(name, v)?)?,
        FieldType::UInt16Be => {
            w.write_u16::<BigEndian>(unsigned(name, ty, v, u16::MAX as u64)? as u16)?
        }
        FieldType::UInt32Be => {
            w.write_u32::<BigEndian>(unsigned(name, ty, v, u32::MAX as u64)? as u32)?
        }
        FieldType::UInt64Be => w.write_u64::<BigEndian>(unsigned(name, ty, v, u64::MAX)?)?,
        FieldType::Int16Be => w.write_i16::<BigEndian>(
            signed(name, ty, v, i16::MIN as i64, i16::MAX as i64)? as i16,
        )?,
        FieldType::Int32Be => w.write_i32::<BigEndian>(
            signed(name, ty, v, i32::MIN as i64, i32::MAX as i64)? as i32,
        )?,
        FieldType::Int64Be => w.write_i64::<BigEndian>(signed(name, ty, v, i64::MIN, i64::MAX)?)?,
        FieldType::Float32Be => w.write_f32::<BigEndian>(number(name, v)? as f32)?,
        FieldType::Float64Be => w.write_f64::<BigEndian>(number(name, v)?)?,
        FieldType::Boolean => {
            let b = v
                .as_bool()
                .ok_or_else(|| invalid(name, format!("expected a boolean, got {}", v)))?;
            bits::write_bool(w, b)?
        }
        other => {
            return Err(CodecError::InvalidSchema(format!(
                "{} is not a scalar type ({})",
                other, name
            )))
        }
    }
    Ok(())
}

fn take(r: &mut Cursor<&[u8]>, name: &str, len: FieldLen) -> Result<Vec<u8>, CodecError> {
    let total = r.get_ref().len();
    let n = len
        .resolve(total, r.position() as usize)
        .ok_or_else(|| CodecError::Truncated(name.to_string()))?;
    let mut buf = vec![0u8; n];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

fn utf8(name: &str, bytes: Vec<u8>) -> Result<Value, CodecError> {
    String::from_utf8(bytes)
        .map(Value::Str)
        .map_err(|e| CodecError::InvalidText {
            field: name.to_string(),
            reason: e.to_string(),
        })
}

fn decode_rule(
    r: &mut Cursor<&[u8]>,
    rule: &Rule<'_>,
    out: &mut ValueObject,
) -> Result<(), CodecError> {
    match *rule {
        Rule::Scalar { name, ty } => {
            out.insert(name.to_string(), decode_scalar(r, ty)?);
        }
        Rule::Nibbles { low, high } => {
            let (lo, hi) = bits::unpack_nibbles(r.read_u8()?);
            out.insert(low.to_string(), Value::U8(lo));
            out.insert(high.to_string(), Value::U8(hi));
        }
        Rule::Text { name, len } => {
            let mut bytes = take(r, name, len)?;
            // C-style terminator, only inside text that runs to the end of the payload.
            if r.position() as usize == r.get_ref().len() && bytes.last() == Some(&0) {
                bytes.pop();
            }
            out.insert(name.to_string(), utf8(name, bytes)?);
        }
        Rule::Address { name, len } => {
            let bytes = take(r, name, len)?;
            out.insert(name.to_string(), Value::Str(bits::le_bytes_to_hex(&bytes)));
        }
        Rule::Raw { name, len } => {
            out.insert(name.to_string(), Value::Bytes(take(r, name, len)?));
        }
        Rule::Prefixed { name, text } => {
            let n = r.read_u8()? as usize;
            let bytes = take(r, name, FieldLen::Fixed(n))?;
            let v = if text { utf8(name, bytes)? } else { Value::Bytes(bytes) };
            out.insert(name.to_string(), v);
        }
        Rule::List { name, element } => {
            let remaining = r.get_ref().len() - r.position() as usize;
            let count = remaining / element.len();
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(decode_scalar(r, element.ty())?);
            }
            out.insert(name.to_string(), Value::List(items));
        }
    }
    Ok(())
}

fn decode_scalar(r: &mut Cursor<&[u8]>, ty: FieldType) -> Result<Value, CodecError> {
    let v = match ty {
        FieldType::UInt8 => Value::U8(r.read_u8()?),
        FieldType::UInt16 => Value::U16(r.read_u16::<LittleEndian>()?),
        FieldType::UInt24 => Value::U32(bits::read_u24(r)?),
        FieldType::UInt32 => Value::U32(r.read_u32::<LittleEndian>()?),
        FieldType::UInt64 => Value::U64(r.read_u64::<LittleEndian>()?),
        FieldType::Int8 => Value::I8(r.read_i8()?),
        FieldType::Int16 => Value::I16(r.read_i16::<LittleEndian>()?),
        FieldType::Int24 => Value::I32(bits::read_i24(r)?),
        FieldType::Int32 => Value::I32(r.read_i32::<LittleEndian>()?),
        FieldType::Int64 => Value::I64(r.read_i64::<LittleEndian>()?),
        FieldType::SFloat => ieee11073::decode_sfloat(r.read_u16::<LittleEndian>()?),
        FieldType::Float => ieee11073::decode_float(r.read_u32::<LittleEndian>()?),
        FieldType::Float32Le => Value::Float(r.read_f32::<LittleEndian>()? as f64),
        FieldType::Float64Le => Value::Float(r.read_f64::<LittleEndian>()?),
        FieldType::UInt16Be => Value::U16(r.read_u16::<BigEndian>()?),
        FieldType::UInt32Be => Value::U32(r.read_u32::<BigEndian>()?),
        FieldType::UInt64Be => Value::U64(r.read_u64::<BigEndian>()?),
        FieldType::Int16Be => Value::I16(r.read_i16::<BigEndian>()?),
        FieldType::Int32Be => Value::I32(r.read_i32::<BigEndian>()?),
        FieldType::Int64Be => Value::I64(r.read_i64::<BigEndian>()?),
        FieldType::Float32Be => Value::Float(r.read_f32::<BigEndian>()? as f64),
        FieldType::Float64Be => Value::Float(r.read_f64::<BigEndian>()?),
        FieldType::Boolean => Value::Bool(bits::read_bool(r)?),
        other => {
            return Err(CodecError::InvalidSchema(format!(
                "{} is not a scalar type",
                other
            )))
        }
    };
    Ok(v)
}
