//! Schema model for GATT characteristic payloads.
//!
//! A [`CharSchema`] lists the always-present fields of a characteristic (`params` and
//! `types`, index aligned) and optionally an [`ExtraSchema`] of fields whose presence
//! depends on a `flags`, `condition` or `opcode` discriminant.

use crate::codec::CodecError;
use crate::overrides::Override;
use crate::rules::{self, RuleContext};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Canonical characteristic identifier: `0x`-prefixed lower-case hex (`0x2a37`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CharId(String);

impl CharId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric form, when the identifier is a 16-bit UUID.
    pub fn as_u16(&self) -> Option<u16> {
        u16::from_str_radix(&self.0[2..], 16).ok()
    }
}

impl From<u16> for CharId {
    fn from(n: u16) -> Self {
        CharId(format!("0x{:x}", n))
    }
}

impl From<&str> for CharId {
    fn from(s: &str) -> Self {
        let s = s.trim();
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let is_hex = !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit());
        match u16::from_str_radix(digits, 16) {
            Ok(n) if is_hex => CharId::from(n),
            _ => CharId(format!("0x{}", digits.to_ascii_lowercase())),
        }
    }
}

impl From<String> for CharId {
    fn from(s: String) -> Self {
        CharId::from(s.as_str())
    }
}

impl From<&CharId> for CharId {
    fn from(id: &CharId) -> Self {
        id.clone()
    }
}

impl fmt::Display for CharId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wire type of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    UInt8,
    UInt16,
    UInt24,
    UInt32,
    UInt64,
    Int8,
    Int16,
    Int24,
    Int32,
    Int64,
    /// IEEE-11073 16-bit SFLOAT.
    SFloat,
    /// IEEE-11073 32-bit FLOAT.
    Float,
    /// IEEE-754 binary32, little endian.
    Float32Le,
    /// IEEE-754 binary64, little endian.
    Float64Le,
    /// Big-endian integers and IEEE-754 floats (`uint16be`, `floatbe`, `doublebe`, ...).
    UInt16Be,
    UInt32Be,
    UInt64Be,
    Int16Be,
    Int32Be,
    Int64Be,
    Float32Be,
    Float64Be,
    Boolean,
    /// UTF-8 text running to the end of the buffer (or an overridden length).
    String,
    /// One length byte followed by UTF-8 text.
    StringPreLenU8,
    /// One length byte followed by raw bytes.
    BufferPreLenU8,
    /// 4-bit value; always declared in adjacent pairs sharing one byte.
    Nibble,
    Uuid,
    /// Address of the given byte length (`addr3`, `addr5`, `addr6`).
    Addr(usize),
    Buffer,
    Variable,
    /// Repeated scalar; element type comes from the schema's [`ListElement`].
    List,
}

impl FieldType {
    /// Byte width of fixed-size types. `None` for nibbles and length-dependent types.
    pub fn fixed_len(self) -> Option<usize> {
        match self {
            FieldType::UInt8 | FieldType::Int8 | FieldType::Boolean => Some(1),
            FieldType::UInt16 | FieldType::Int16 | FieldType::UInt16Be | FieldType::Int16Be => {
                Some(2)
            }
            FieldType::SFloat => Some(2),
            FieldType::UInt24 | FieldType::Int24 => Some(3),
            FieldType::UInt32 | FieldType::Int32 | FieldType::UInt32Be | FieldType::Int32Be => {
                Some(4)
            }
            FieldType::Float | FieldType::Float32Le | FieldType::Float32Be => Some(4),
            FieldType::UInt64 | FieldType::Int64 | FieldType::UInt64Be | FieldType::Int64Be => {
                Some(8)
            }
            FieldType::Float64Le | FieldType::Float64Be => Some(8),
            FieldType::Addr(n) => Some(n),
            FieldType::Nibble
            | FieldType::String
            | FieldType::StringPreLenU8
            | FieldType::BufferPreLenU8
            | FieldType::Uuid
            | FieldType::Buffer
            | FieldType::Variable
            | FieldType::List => None,
        }
    }

    /// Numeric and boolean types that read/write a fixed number of bytes.
    pub fn is_scalar(self) -> bool {
        !matches!(self, FieldType::Addr(_)) && self.fixed_len().is_some()
    }
}

impl FromStr for FieldType {
    type Err = CodecError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let ty = match tag {
            "uint8" => FieldType::UInt8,
            "uint16" | "uint16le" => FieldType::UInt16,
            "uint24" => FieldType::UInt24,
            "uint32" | "uint32le" => FieldType::UInt32,
            "uint64" | "uint64le" => FieldType::UInt64,
            "int8" | "sint8" => FieldType::Int8,
            "int16" | "sint16" | "int16le" | "sint16le" => FieldType::Int16,
            "int24" | "sint24" => FieldType::Int24,
            "int32" | "sint32" | "int32le" | "sint32le" => FieldType::Int32,
            "int64" | "sint64" | "int64le" | "sint64le" => FieldType::Int64,
            "uint16be" => FieldType::UInt16Be,
            "uint32be" => FieldType::UInt32Be,
            "uint64be" => FieldType::UInt64Be,
            "int16be" | "sint16be" => FieldType::Int16Be,
            "int32be" | "sint32be" => FieldType::Int32Be,
            "int64be" | "sint64be" => FieldType::Int64Be,
            "sfloat" => FieldType::SFloat,
            "float" => FieldType::Float,
            "floatle" => FieldType::Float32Le,
            "floatbe" => FieldType::Float32Be,
            "doublele" => FieldType::Float64Le,
            "doublebe" => FieldType::Float64Be,
            "boolean" => FieldType::Boolean,
            "string" => FieldType::String,
            "stringPreLenUint8" => FieldType::StringPreLenU8,
            "bufferPreLenUint8" => FieldType::BufferPreLenU8,
            "nibble" => FieldType::Nibble,
            "uuid" => FieldType::Uuid,
            "buffer" => FieldType::Buffer,
            "variable" => FieldType::Variable,
            "list" => FieldType::List,
            other => match other.strip_prefix("addr").map(str::parse::<usize>) {
                Some(Ok(n)) if (1..=16).contains(&n) => FieldType::Addr(n),
                _ => return Err(CodecError::UnknownType(other.to_string())),
            },
        };
        Ok(ty)
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            FieldType::UInt8 => "uint8",
            FieldType::UInt16 => "uint16",
            FieldType::UInt24 => "uint24",
            FieldType::UInt32 => "uint32",
            FieldType::UInt64 => "uint64",
            FieldType::Int8 => "int8",
            FieldType::Int16 => "int16",
            FieldType::Int24 => "int24",
            FieldType::Int32 => "int32",
            FieldType::Int64 => "int64",
            FieldType::SFloat => "sfloat",
            FieldType::Float => "float",
            FieldType::Float32Le => "floatle",
            FieldType::Float64Le => "doublele",
            FieldType::UInt16Be => "uint16be",
            FieldType::UInt32Be => "uint32be",
            FieldType::UInt64Be => "uint64be",
            FieldType::Int16Be => "int16be",
            FieldType::Int32Be => "int32be",
            FieldType::Int64Be => "int64be",
            FieldType::Float32Be => "floatbe",
            FieldType::Float64Be => "doublebe",
            FieldType::Boolean => "boolean",
            FieldType::String => "string",
            FieldType::StringPreLenU8 => "stringPreLenUint8",
            FieldType::BufferPreLenU8 => "bufferPreLenUint8",
            FieldType::Nibble => "nibble",
            FieldType::Uuid => "uuid",
            FieldType::Addr(n) => return write!(f, "addr{}", n),
            FieldType::Buffer => "buffer",
            FieldType::Variable => "variable",
            FieldType::List => "list",
        };
        f.write_str(tag)
    }
}

/// Element descriptor for `list` fields. Only built through [`ListElement::new`], so the
/// width always matches the type and is never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListElement {
    ty: FieldType,
    len: usize,
}

impl ListElement {
    pub fn new(ty: FieldType) -> Result<Self, CodecError> {
        match ty.fixed_len() {
            Some(len) if ty.is_scalar() && len > 0 => Ok(ListElement { ty, len }),
            _ => Err(CodecError::InvalidSchema(format!(
                "list element must be a fixed-width scalar, got {}",
                ty
            ))),
        }
    }

    pub fn ty(&self) -> FieldType {
        self.ty
    }

    /// Byte width of one element.
    pub fn len(&self) -> usize {
        self.len
    }
}

/// Conditional fields. `flags` holds bitmasks (only for flag-driven extras); `result`
/// holds the expected value compared against the discriminant.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtraSchema {
    pub params: Vec<String>,
    pub types: Vec<FieldType>,
    pub flags: Vec<u64>,
    pub result: Vec<i64>,
}

impl ExtraSchema {
    pub fn fields(&self) -> impl Iterator<Item = (&str, FieldType)> + '_ {
        self.params.iter().map(String::as_str).zip(self.types.iter().copied())
    }
}

/// Wire layout of one characteristic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CharSchema {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub types: Vec<FieldType>,
    /// Accepted buffer lengths for decoding; empty accepts any length.
    pub valid_lengths: Vec<usize>,
    pub extra: Option<ExtraSchema>,
    pub element: Option<ListElement>,
    /// Declared length of the fields preceding a `buffer` field.
    pub prefix_len: Option<usize>,
}

impl CharSchema {
    pub fn new(params: Vec<String>, types: Vec<FieldType>) -> Self {
        CharSchema {
            params,
            types,
            ..CharSchema::default()
        }
    }

    /// Build from type tags, e.g. `from_tags(&["flags", "value"], &["uint8", "uint16"])`.
    pub fn from_tags(params: &[&str], tags: &[&str]) -> Result<Self, CodecError> {
        let types = tags
            .iter()
            .map(|t| t.parse::<FieldType>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(CharSchema::new(
            params.iter().map(|p| p.to_string()).collect(),
            types,
        ))
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_lengths(mut self, lengths: Vec<usize>) -> Self {
        self.valid_lengths = lengths;
        self
    }

    pub fn with_extra(mut self, extra: ExtraSchema) -> Self {
        self.extra = Some(extra);
        self
    }

    pub fn with_element(mut self, element: ListElement) -> Self {
        self.element = Some(element);
        self
    }

    pub fn with_prefix_len(mut self, len: usize) -> Self {
        self.prefix_len = Some(len);
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, FieldType)> + '_ {
        self.params.iter().map(String::as_str).zip(self.types.iter().copied())
    }

    /// Type of a main or extra field.
    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.fields()
            .chain(self.extra.iter().flat_map(ExtraSchema::fields))
            .find(|(n, _)| *n == name)
            .map(|(_, t)| t)
    }

    pub fn accepts_len(&self, len: usize) -> bool {
        self.valid_lengths.is_empty() || self.valid_lengths.contains(&len)
    }

    /// Structural checks run once at registration.
    pub fn validate(&self) -> Result<(), CodecError> {
        if self.params.len() != self.types.len() {
            return Err(CodecError::InvalidSchema(format!(
                "params and types differ in length ({} vs {})",
                self.params.len(),
                self.types.len()
            )));
        }
        let mut seen = HashSet::new();
        let names = self
            .params
            .iter()
            .chain(self.extra.iter().flat_map(|e| e.params.iter()));
        for name in names {
            if !seen.insert(name.as_str()) {
                return Err(CodecError::InvalidSchema(format!("duplicate field name: {}", name)));
            }
        }
        let ctx = RuleContext {
            overrides: Override::none(),
            element: self.element,
            prefix_len: self.prefix_len,
        };
        rules::compile(self.fields(), &ctx)?;

        let Some(extra) = &self.extra else {
            return Ok(());
        };
        let n = extra.params.len();
        if extra.types.len() != n || extra.result.len() != n {
            return Err(CodecError::InvalidSchema(format!(
                "extra params/types/result differ in length ({}/{}/{})",
                n,
                extra.types.len(),
                extra.result.len()
            )));
        }
        if !extra.flags.is_empty() && extra.flags.len() != n {
            return Err(CodecError::InvalidSchema(format!(
                "extra flags must match extra params ({} vs {})",
                extra.flags.len(),
                n
            )));
        }
        if extra.flags.is_empty() && self.params.iter().any(|p| p == "flags") {
            return Err(CodecError::InvalidSchema(
                "flag-driven extra fields need a mask per field".to_string(),
            ));
        }
        rules::compile(extra.fields(), &ctx)?;
        Ok(())
    }
}
