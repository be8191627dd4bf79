//! Per-characteristic structural exceptions, consulted once per encode/decode.
//!
//! The general rule compiler and resolver never compare identifiers themselves; every
//! identifier-specific layout quirk is listed here.

use crate::ast::CharId;

/// Condition values `min..=max` select extra field `extra`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionTier {
    pub min: i64,
    pub max: i64,
    pub extra: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Override {
    /// `string` fields span the whole buffer minus this many bytes.
    pub string_total_minus: Option<usize>,
    /// `uuid` fields span the whole buffer minus this many bytes.
    pub uuid_total_minus: Option<usize>,
    /// Replaces the generic `condition <= result[i]` selection.
    pub condition_tiers: &'static [ConditionTier],
    /// Extra fields whose wire shape is not implemented.
    pub unsupported: Option<&'static str>,
}

const NONE: Override = Override {
    string_total_minus: None,
    uuid_total_minus: None,
    condition_tiers: &[],
    unsupported: None,
};

static DEFAULT: Override = NONE;

static NEW_ALERT: Override = Override {
    string_total_minus: Some(2),
    ..NONE
};

static INCLUDE: Override = Override {
    uuid_total_minus: Some(4),
    ..NONE
};

static CHAR_DECLARATION: Override = Override {
    uuid_total_minus: Some(3),
    ..NONE
};

static DESCRIPTOR_VALUE_CHANGED: Override = Override {
    uuid_total_minus: Some(2),
    ..NONE
};

// Value Trigger Setting: 0 means no extra value.
static VALUE_TRIGGER: Override = Override {
    condition_tiers: &[
        ConditionTier { min: 1, max: 3, extra: 0 },
        ConditionTier { min: 4, max: 4, extra: 1 },
        ConditionTier { min: 5, max: 6, extra: 2 },
    ],
    ..NONE
};

static TIME_TRIGGER: Override = Override {
    condition_tiers: &[
        ConditionTier { min: 0, max: 0, extra: 0 },
        ConditionTier { min: 1, max: 2, extra: 1 },
        ConditionTier { min: 3, max: 3, extra: 2 },
    ],
    ..NONE
};

static VARIABLE_OPERAND: Override = Override {
    unsupported: Some("variable-length extra fields"),
    ..NONE
};

static REG_CERT_LIST: Override = Override {
    unsupported: Some("regulatory certification data list"),
    ..NONE
};

static OPTIONAL_FIELDS: Override = Override {
    unsupported: Some("optional extra fields"),
    ..NONE
};

static E2E_CRC: Override = Override {
    unsupported: Some("E2E-CRC suffixed payload"),
    ..NONE
};

impl Override {
    pub fn none() -> &'static Override {
        &DEFAULT
    }
}

pub fn lookup(id: &CharId) -> &'static Override {
    match id.as_str() {
        "0x2a46" => &NEW_ALERT,
        "0x2802" => &INCLUDE,
        "0x2803" | "0x7890" => &CHAR_DECLARATION,
        "0x2a7d" => &DESCRIPTOR_VALUE_CHANGED,
        "0x290a" => &VALUE_TRIGGER,
        "0x290e" => &TIME_TRIGGER,
        "0x290d" | "0x2a55" | "0x2a66" | "0x2a6b" | "0x2a9f" | "0x2aa4" | "0x2aa7" => {
            &VARIABLE_OPERAND
        }
        "0x2a2a" => &REG_CERT_LIST,
        "0x2a63" | "0x2a64" => &OPTIONAL_FIELDS,
        "0x2aa9" | "0x2aaa" | "0x2aab" | "0x2aac" => &E2E_CRC,
        _ => &DEFAULT,
    }
}
