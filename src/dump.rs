//! Format decoded values for display, and parse hex input for the command line.

use crate::ast::CharSchema;
use crate::codec::{Decoded, ValueObject};
use crate::value::Value;

/// Space-separated lower-case hex bytes.
pub fn hex_string(b: &[u8]) -> String {
    b.iter().map(|x| format!("{:02x}", x)).collect::<Vec<_>>().join(" ")
}

/// Parse hex bytes. Accepts `012c01`, `01 2c 01`, `01:2c:01` and an optional `0x` prefix.
pub fn parse_hex(s: &str) -> Result<Vec<u8>, String> {
    let s = s.trim();
    let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
    let digits: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':' && *c != '-')
        .collect();
    if !digits.is_ascii() {
        return Err("non-ASCII characters in hex input".to_string());
    }
    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits: {}", digits.len()));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|e| format!("bad hex at {}: {}", i, e))
        })
        .collect()
}

/// Format a value for display; lists of more than one item span several lines.
pub fn value_to_dump(v: &Value, indent: usize) -> String {
    let pad = "  ".repeat(indent);
    match v {
        Value::Bytes(b) => format!("{}hex({})", pad, hex_string(b)),
        Value::List(items) if items.len() > 1 => {
            let mut lines = vec![format!("{}[", pad)];
            for (i, item) in items.iter().enumerate() {
                lines.push(format!("{}  [{}] {}", pad, i, value_to_dump(item, 0)));
            }
            lines.push(format!("{}]", pad));
            lines.join("\n")
        }
        other => format!("{}{}", pad, other),
    }
}

/// One `name: value` line per field: main fields first in declared order, then extra
/// fields that were decoded, then any keys the schema does not know about (sorted).
pub fn fields_to_dump(schema: &CharSchema, fields: &ValueObject) -> String {
    let mut order: Vec<&str> = schema.params.iter().map(String::as_str).collect();
    if let Some(extra) = &schema.extra {
        order.extend(extra.params.iter().map(String::as_str));
    }
    let mut unknown: Vec<&str> = fields
        .keys()
        .map(String::as_str)
        .filter(|k| !order.contains(k))
        .collect();
    unknown.sort();
    order.extend(unknown);

    let mut lines = Vec::new();
    for name in order {
        if let Some(v) = fields.get(name) {
            lines.push(format!("{}: {}", name, value_to_dump(v, 0)));
        }
    }
    lines.join("\n")
}

pub fn decoded_to_dump(schema: &CharSchema, decoded: &Decoded) -> String {
    match decoded {
        Decoded::Fields(m) => fields_to_dump(schema, m),
        Decoded::Raw(b) => format!("raw: hex({})", hex_string(b)),
    }
}
