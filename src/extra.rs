//! Selection of conditional ("extra") fields.
//!
//! The discriminant is looked up by key in a value map: the caller's value object when
//! encoding, the fields decoded so far when decoding. Both directions therefore pick the
//! same extras for the same discriminant value.

use crate::ast::{ExtraSchema, FieldType};
use crate::codec::CodecError;
use crate::overrides::Override;
use crate::value::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discriminant {
    /// Bitmask: each extra field is tested against its own mask.
    Flags(u64),
    /// Enumeration selecting at most one extra field.
    Condition(i64),
    /// Operation code: every extra field whose expected value matches.
    Opcode(i64),
}

impl Discriminant {
    /// Detect by key presence, `flags` first, then `condition`, then `opcode`. A `flags`
    /// key only counts when the extra fields carry masks (`masked`).
    pub fn detect(
        values: &HashMap<String, Value>,
        masked: bool,
    ) -> Result<Option<Self>, CodecError> {
        if let Some(v) = values.get("flags").filter(|_| masked) {
            return v
                .as_u64()
                .map(|f| Some(Discriminant::Flags(f)))
                .ok_or_else(|| invalid("flags", v));
        }
        if let Some(v) = values.get("condition") {
            return v
                .as_i64()
                .map(|c| Some(Discriminant::Condition(c)))
                .ok_or_else(|| invalid("condition", v));
        }
        if let Some(v) = values.get("opcode") {
            return v
                .as_i64()
                .map(|o| Some(Discriminant::Opcode(o)))
                .ok_or_else(|| invalid("opcode", v));
        }
        Ok(None)
    }
}

fn invalid(field: &str, v: &Value) -> CodecError {
    CodecError::InvalidValue {
        field: field.to_string(),
        reason: format!("expected an integer discriminant, got {}", v),
    }
}

/// Extra fields present for the discriminant found in `values`, in declared order.
pub fn resolve<'s>(
    extra: &'s ExtraSchema,
    overrides: &Override,
    values: &HashMap<String, Value>,
) -> Result<Vec<(&'s str, FieldType)>, CodecError> {
    let Some(discriminant) = Discriminant::detect(values, !extra.flags.is_empty())? else {
        return Ok(Vec::new());
    };
    let fields: Vec<(&str, FieldType)> = extra.fields().collect();
    let selected = match discriminant {
        Discriminant::Flags(flags) => by_flags(extra, &fields, flags)?,
        Discriminant::Condition(cond) => by_condition(extra, overrides, cond),
        Discriminant::Opcode(op) => (0..fields.len())
            .filter(|&i| extra.result[i] == op)
            .collect(),
    };
    Ok(selected.into_iter().map(|i| fields[i]).collect())
}

fn by_flags(
    extra: &ExtraSchema,
    fields: &[(&str, FieldType)],
    flags: u64,
) -> Result<Vec<usize>, CodecError> {
    if extra.flags.len() != fields.len() {
        return Err(CodecError::InvalidSchema(
            "flags discriminant given but extra fields have no masks".to_string(),
        ));
    }
    let mut selected = Vec::new();
    let mut i = 0;
    while i < fields.len() {
        let present = (flags & extra.flags[i]) as i64 == extra.result[i];
        // A nibble pair shares one byte; the first nibble's test governs both.
        let span = if fields[i].1 == FieldType::Nibble && i + 1 < fields.len() {
            2
        } else {
            1
        };
        if present {
            selected.extend(i..i + span);
        }
        i += span;
    }
    Ok(selected)
}

fn by_condition(extra: &ExtraSchema, overrides: &Override, cond: i64) -> Vec<usize> {
    let n = extra.params.len();
    if !overrides.condition_tiers.is_empty() {
        return overrides
            .condition_tiers
            .iter()
            .find(|t| (t.min..=t.max).contains(&cond))
            .map(|t| t.extra)
            .filter(|&i| i < n)
            .into_iter()
            .collect();
    }
    extra.result.iter().position(|&r| cond <= r).into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::CharId;
    use crate::overrides;

    fn extra(params: &[&str], types: &[FieldType], flags: &[u64], result: &[i64]) -> ExtraSchema {
        ExtraSchema {
            params: params.iter().map(|p| p.to_string()).collect(),
            types: types.to_vec(),
            flags: flags.to_vec(),
            result: result.to_vec(),
        }
    }

    fn values(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn flags_win_over_opcode() {
        let v = values(&[("opcode", Value::U8(3)), ("flags", Value::U8(1))]);
        assert_eq!(Discriminant::detect(&v, true).unwrap(), Some(Discriminant::Flags(1)));
        assert_eq!(Discriminant::detect(&HashMap::new(), true).unwrap(), None);
    }

    #[test]
    fn flags_ignored_without_masks() {
        let v = values(&[("flags", Value::U8(0)), ("condition", Value::U8(4))]);
        assert_eq!(Discriminant::detect(&v, false).unwrap(), Some(Discriminant::Condition(4)));

        let e = extra(&["low", "high"], &[FieldType::UInt8, FieldType::UInt16], &[], &[2, 5]);
        let got = resolve(&e, Override::none(), &v).unwrap();
        assert_eq!(got, vec![("high", FieldType::UInt16)]);
    }

    #[test]
    fn non_integer_discriminant_is_invalid() {
        let v = values(&[("condition", Value::Str("x".into()))]);
        assert!(matches!(
            Discriminant::detect(&v, false),
            Err(CodecError::InvalidValue { .. })
        ));
    }

    #[test]
    fn flag_masks_select_matching_fields() {
        let e = extra(
            &["hr8", "hr16", "energy"],
            &[FieldType::UInt8, FieldType::UInt16, FieldType::UInt16],
            &[0x01, 0x01, 0x08],
            &[0x00, 0x01, 0x08],
        );
        let got = resolve(&e, Override::none(), &values(&[("flags", Value::U8(0x09))])).unwrap();
        assert_eq!(got, vec![("hr16", FieldType::UInt16), ("energy", FieldType::UInt16)]);
    }

    #[test]
    fn nibble_partner_follows_first_test() {
        let e = extra(
            &["type", "location"],
            &[FieldType::Nibble, FieldType::Nibble],
            &[0x04, 0x00],
            &[0x04, 0x01],
        );
        let got = resolve(&e, Override::none(), &values(&[("flags", Value::U8(0x04))])).unwrap();
        assert_eq!(got.len(), 2);
        let got = resolve(&e, Override::none(), &values(&[("flags", Value::U8(0x00))])).unwrap();
        assert!(got.is_empty());
    }

    #[test]
    fn condition_picks_first_upper_bound() {
        let e = extra(
            &["a", "b", "c"],
            &[FieldType::UInt8, FieldType::UInt16, FieldType::UInt32],
            &[],
            &[1, 3, 5],
        );
        let pick = |c: i64| {
            resolve(&e, Override::none(), &values(&[("condition", Value::I64(c))]))
                .unwrap()
                .into_iter()
                .map(|(n, _)| n)
                .collect::<Vec<_>>()
        };
        assert_eq!(pick(0), vec!["a"]);
        assert_eq!(pick(2), vec!["b"]);
        assert_eq!(pick(5), vec!["c"]);
        assert!(pick(6).is_empty());
    }

    #[test]
    fn condition_tiers_override_generic_rule() {
        let e = extra(
            &["state", "value", "time"],
            &[FieldType::UInt8, FieldType::UInt16, FieldType::UInt24],
            &[],
            &[3, 4, 6],
        );
        let tiers = overrides::lookup(&CharId::from(0x290a));
        let pick = |c: u8| resolve(&e, tiers, &values(&[("condition", Value::U8(c))])).unwrap();
        assert!(pick(0).is_empty());
        assert_eq!(pick(2), vec![("state", FieldType::UInt8)]);
        assert_eq!(pick(4), vec![("value", FieldType::UInt16)]);
        assert_eq!(pick(6), vec![("time", FieldType::UInt24)]);
        assert!(pick(7).is_empty());
    }

    #[test]
    fn opcode_selects_every_match() {
        let e = extra(
            &["x", "y", "z"],
            &[FieldType::UInt8, FieldType::UInt8, FieldType::UInt8],
            &[],
            &[1, 2, 1],
        );
        let got = resolve(&e, Override::none(), &values(&[("opcode", Value::U8(1))])).unwrap();
        assert_eq!(got, vec![("x", FieldType::UInt8), ("z", FieldType::UInt8)]);
    }
}
