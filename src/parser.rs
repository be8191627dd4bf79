//! Parse schema source into characteristic definitions using PEST.

use crate::ast::{CharId, CharSchema, ExtraSchema, FieldType, ListElement};
use crate::codec::CodecError;
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser as PestParser;
use std::collections::HashSet;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct SchemaParser;

/// Parse schema source. Definitions come back in source order; an identifier may be
/// defined only once per source.
pub fn parse(source: &str) -> Result<Vec<(CharId, CharSchema)>, CodecError> {
    let pairs = SchemaParser::parse(Rule::schema_file, source).map_err(|e| err(e.to_string()))?;
    let file = pairs.into_iter().next().ok_or_else(|| err("empty parse"))?;
    let mut seen = HashSet::new();
    let mut defs = Vec::new();
    for inner in file.into_inner() {
        if inner.as_rule() != Rule::characteristic {
            continue;
        }
        let (id, schema) = build_characteristic(inner)?;
        if !seen.insert(id.clone()) {
            return Err(err(format!("characteristic {} defined twice", id)));
        }
        defs.push((id, schema));
    }
    Ok(defs)
}

fn err(msg: impl Into<String>) -> CodecError {
    CodecError::Parse(msg.into())
}

fn build_characteristic(pair: Pair<Rule>) -> Result<(CharId, CharSchema), CodecError> {
    let mut it = pair.into_inner();
    let id = it
        .next()
        .map(|p| CharId::from(p.as_str()))
        .ok_or_else(|| err("characteristic: missing id"))?;
    let mut schema = CharSchema::default();
    for inner in it {
        match inner.as_rule() {
            Rule::title => {
                let s = inner.as_str();
                schema.name = Some(s[1..s.len() - 1].to_string());
            }
            Rule::length_decl => {
                for n in inner.into_inner() {
                    schema.valid_lengths.push(parse_number(n.as_str())? as usize);
                }
            }
            Rule::element_decl => {
                let tag = inner.into_inner().next().ok_or_else(|| err("element: missing type"))?;
                schema.element = Some(ListElement::new(tag.as_str().parse()?)?);
            }
            Rule::prefix_decl => {
                let n = inner.into_inner().next().ok_or_else(|| err("prefix: missing length"))?;
                schema.prefix_len = Some(parse_number(n.as_str())? as usize);
            }
            Rule::field => {
                let (name, ty) = build_field(inner)?;
                schema.params.push(name);
                schema.types.push(ty);
            }
            Rule::extra_section => {
                if schema.extra.is_some() {
                    return Err(err(format!("{}: more than one extra section", id)));
                }
                schema.extra = Some(build_extra(inner).map_err(|e| match e {
                    CodecError::Parse(msg) => err(format!("{}: {}", id, msg)),
                    other => other,
                })?);
            }
            _ => {}
        }
    }
    Ok((id, schema))
}

fn build_field(pair: Pair<Rule>) -> Result<(String, FieldType), CodecError> {
    let mut it = pair.into_inner();
    let name = it.next().ok_or_else(|| err("field: missing name"))?.as_str().to_string();
    let ty: FieldType = it
        .next()
        .ok_or_else(|| err(format!("field {}: missing type", name)))?
        .as_str()
        .parse()?;
    Ok((name, ty))
}

fn build_extra(pair: Pair<Rule>) -> Result<ExtraSchema, CodecError> {
    let mut extra = ExtraSchema::default();
    let mut masked = None;
    for field in pair.into_inner() {
        let mut it = field.into_inner();
        let name = it.next().ok_or_else(|| err("extra field: missing name"))?.as_str().to_string();
        let ty: FieldType = it
            .next()
            .ok_or_else(|| err(format!("extra field {}: missing type", name)))?
            .as_str()
            .parse()?;
        let presence = it
            .next()
            .ok_or_else(|| err(format!("extra field {}: missing condition", name)))?;
        let is_mask = presence.as_rule() == Rule::mask_test;
        if *masked.get_or_insert(is_mask) != is_mask {
            return Err(err("extra fields mix mask tests and expected values"));
        }
        let mut nums = presence.into_inner();
        if is_mask {
            let mask = nums.next().ok_or_else(|| err("mask test: missing mask"))?;
            let want = nums.next().ok_or_else(|| err("mask test: missing result"))?;
            extra.flags.push(parse_number(mask.as_str())?);
            extra.result.push(parse_signed(want.as_str())?);
        } else {
            let want = nums.next().ok_or_else(|| err("missing expected value"))?;
            extra.result.push(parse_signed(want.as_str())?);
        }
        extra.params.push(name);
        extra.types.push(ty);
    }
    Ok(extra)
}

fn parse_number(s: &str) -> Result<u64, CodecError> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.map_err(|e| err(format!("bad number {:?}: {}", s, e)))
}

fn parse_signed(s: &str) -> Result<i64, CodecError> {
    let (neg, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let magnitude = i64::try_from(parse_number(digits)?)
        .map_err(|_| err(format!("number out of range: {}", s)))?;
    Ok(if neg { -magnitude } else { magnitude })
}
