//! Compile an ordered field list into the rules the encoder and decoder execute.
//!
//! Rules keep the declared field order: fields are positional and lengths of
//! variable-size fields depend on what precedes them.

use crate::ast::{CharSchema, FieldType, ListElement};
use crate::bits::NibblePairs;
use crate::codec::CodecError;
use crate::overrides::Override;

/// Byte length of a variable-size field, resolved against the cursor at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldLen {
    Fixed(usize),
    /// Everything from the current position to the end of the buffer.
    Remaining,
    /// Whole buffer length minus `n`, regardless of position.
    TotalMinus(usize),
}

impl FieldLen {
    /// Length to consume at `position` in a buffer of `total` bytes, or `None` if the
    /// buffer is too short.
    pub fn resolve(self, total: usize, position: usize) -> Option<usize> {
        let remaining = total.checked_sub(position)?;
        let n = match self {
            FieldLen::Fixed(n) => n,
            FieldLen::Remaining => remaining,
            FieldLen::TotalMinus(k) => total.checked_sub(k)?,
        };
        (n <= remaining).then_some(n)
    }

    pub fn fixed(self) -> Option<usize> {
        match self {
            FieldLen::Fixed(n) => Some(n),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rule<'s> {
    /// Fixed-width numeric or boolean field.
    Scalar { name: &'s str, ty: FieldType },
    /// Two nibble fields sharing one byte.
    Nibbles { low: &'s str, high: &'s str },
    /// UTF-8 text.
    Text { name: &'s str, len: FieldLen },
    /// `uuid` / `addrN`: bytes rendered as a reversed hex string.
    Address { name: &'s str, len: FieldLen },
    /// Raw bytes (`buffer`, `variable`).
    Raw { name: &'s str, len: FieldLen },
    /// One length byte then the payload, as text or raw bytes.
    Prefixed { name: &'s str, text: bool },
    /// Repeated scalar filling the rest of the buffer.
    List { name: &'s str, element: ListElement },
}

impl<'s> Rule<'s> {
    pub fn names(&self) -> Vec<&'s str> {
        match *self {
            Rule::Nibbles { low, high } => vec![low, high],
            Rule::Scalar { name, .. }
            | Rule::Text { name, .. }
            | Rule::Address { name, .. }
            | Rule::Raw { name, .. }
            | Rule::Prefixed { name, .. }
            | Rule::List { name, .. } => vec![name],
        }
    }
}

/// Schema-level inputs the compiler needs besides the field list.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub overrides: &'a Override,
    pub element: Option<ListElement>,
    pub prefix_len: Option<usize>,
}

impl<'a> RuleContext<'a> {
    pub fn new(schema: &CharSchema, overrides: &'a Override) -> Self {
        RuleContext {
            overrides,
            element: schema.element,
            prefix_len: schema.prefix_len,
        }
    }
}

/// Compile fields in order. Nibbles must come in adjacent pairs.
pub fn compile<'s>(
    fields: impl IntoIterator<Item = (&'s str, FieldType)>,
    ctx: &RuleContext<'_>,
) -> Result<Vec<Rule<'s>>, CodecError> {
    let mut rules = Vec::new();
    let mut nibbles = NibblePairs::default();
    for (name, ty) in fields {
        if ty != FieldType::Nibble {
            nibbles.ensure_idle()?;
        }
        let rule = match ty {
            FieldType::Nibble => match nibbles.push(name) {
                Some((low, high)) => Rule::Nibbles { low, high },
                None => continue,
            },
            FieldType::String => Rule::Text {
                name,
                len: ctx
                    .overrides
                    .string_total_minus
                    .map_or(FieldLen::Remaining, FieldLen::TotalMinus),
            },
            FieldType::Uuid => Rule::Address {
                name,
                len: ctx
                    .overrides
                    .uuid_total_minus
                    .map_or(FieldLen::Fixed(2), FieldLen::TotalMinus),
            },
            FieldType::Addr(n) => Rule::Address {
                name,
                len: FieldLen::Fixed(n),
            },
            FieldType::Buffer => Rule::Raw {
                name,
                len: ctx.prefix_len.map_or(FieldLen::Remaining, FieldLen::TotalMinus),
            },
            FieldType::Variable => Rule::Raw {
                name,
                len: FieldLen::Remaining,
            },
            FieldType::StringPreLenU8 => Rule::Prefixed { name, text: true },
            FieldType::BufferPreLenU8 => Rule::Prefixed { name, text: false },
            FieldType::List => Rule::List {
                name,
                element: ctx.element.ok_or_else(|| {
                    CodecError::InvalidSchema(format!("list field {} has no element type", name))
                })?,
            },
            FieldType::UInt8
            | FieldType::UInt16
            | FieldType::UInt24
            | FieldType::UInt32
            | FieldType::UInt64
            | FieldType::Int8
            | FieldType::Int16
            | FieldType::Int24
            | FieldType::Int32
            | FieldType::Int64
            | FieldType::SFloat
            | FieldType::Float
            | FieldType::Float32Le
            | FieldType::Float64Le
            | FieldType::UInt16Be
            | FieldType::UInt32Be
            | FieldType::UInt64Be
            | FieldType::Int16Be
            | FieldType::Int32Be
            | FieldType::Int64Be
            | FieldType::Float32Be
            | FieldType::Float64Be
            | FieldType::Boolean => Rule::Scalar { name, ty },
        };
        rules.push(rule);
    }
    nibbles.ensure_idle()?;
    Ok(rules)
}
