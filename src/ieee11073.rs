//! IEEE-11073 SFLOAT (16-bit) and FLOAT (32-bit) conversions.
//!
//! Both formats store a two's-complement base-10 exponent in the high bits and a
//! two's-complement mantissa in the low bits: `value = mantissa * 10^exponent`.
//!
//! | Format | Exponent | Mantissa | +INF | NaN | -INF |
//! |--------|----------|----------|------|-----|------|
//! | SFLOAT | 4 bits   | 12 bits  | `0x07FE` | `0x07FF`, `0x0800`, `0x0801` | `0x0802` |
//! | FLOAT  | 8 bits   | 24 bits  | `0x007FFFFE` | `0x007FFFFF`, `0x00800000`, `0x00800001` | `0x00800002` |
//!
//! Reserved codes are matched on the mantissa bits alone and decode to a
//! [`SpecialFloat`] marker.

use crate::value::{SpecialFloat, Value};

struct Format {
    mantissa_bits: u32,
    exponent_bits: u32,
    nan: u32,
    positive_infinity: u32,
    negative_infinity: u32,
    reserved: [(u32, SpecialFloat); 5],
    max: f64,
    epsilon: f64,
    mantissa_max: f64,
    exponent_min: i32,
    exponent_max: i32,
    /// Scale used to detect digits lost by rounding the mantissa.
    precision: f64,
}

const SFLOAT: Format = Format {
    mantissa_bits: 12,
    exponent_bits: 4,
    nan: 0x07FF,
    positive_infinity: 0x07FE,
    negative_infinity: 0x0802,
    reserved: [
        (0x07FE, SpecialFloat::PositiveInfinity),
        (0x07FF, SpecialFloat::NaN),
        (0x0800, SpecialFloat::NaN),
        (0x0801, SpecialFloat::NaN),
        (0x0802, SpecialFloat::NegativeInfinity),
    ],
    max: 20450000000.0,
    epsilon: 1e-8,
    mantissa_max: 0x07FD as f64,
    exponent_min: -8,
    exponent_max: 7,
    precision: 1e4,
};

const FLOAT: Format = Format {
    mantissa_bits: 24,
    exponent_bits: 8,
    nan: 0x007F_FFFF,
    positive_infinity: 0x007F_FFFE,
    negative_infinity: 0x0080_0002,
    reserved: [
        (0x007F_FFFE, SpecialFloat::PositiveInfinity),
        (0x007F_FFFF, SpecialFloat::NaN),
        (0x0080_0000, SpecialFloat::NaN),
        (0x0080_0001, SpecialFloat::NaN),
        (0x0080_0002, SpecialFloat::NegativeInfinity),
    ],
    max: 8.388604999999999e133,
    epsilon: 1e-128,
    mantissa_max: 0x007F_FFFD as f64,
    exponent_min: -128,
    exponent_max: 127,
    precision: 1e7,
};

/// Encode a value as SFLOAT. NaN and out-of-range values map to reserved codes.
pub fn encode_sfloat(value: f64) -> u16 {
    SFLOAT.encode(value) as u16
}

/// Encode a value as FLOAT. NaN and out-of-range values map to reserved codes.
pub fn encode_float(value: f64) -> u32 {
    FLOAT.encode(value)
}

/// Decode an SFLOAT into `Value::Float` or `Value::Special`.
pub fn decode_sfloat(raw: u16) -> Value {
    SFLOAT.decode(raw as u32)
}

/// Decode a FLOAT into `Value::Float` or `Value::Special`.
pub fn decode_float(raw: u32) -> Value {
    FLOAT.decode(raw)
}

impl Format {
    fn mantissa_mask(&self) -> u32 {
        (1 << self.mantissa_bits) - 1
    }

    fn exponent_mask(&self) -> u32 {
        (1 << self.exponent_bits) - 1
    }

    fn encode(&self, value: f64) -> u32 {
        if value.is_nan() {
            return self.nan;
        }
        if value > self.max {
            return self.positive_infinity;
        }
        if value < -self.max {
            return self.negative_infinity;
        }
        if value.abs() <= self.epsilon {
            return 0;
        }

        let sign = if value > 0.0 { 1.0 } else { -1.0 };
        let mut mantissa = value.abs();
        let mut exponent: i32 = 0;

        while mantissa > self.mantissa_max {
            mantissa /= 10.0;
            exponent += 1;
            if exponent > self.exponent_max {
                return if sign > 0.0 {
                    self.positive_infinity
                } else {
                    self.negative_infinity
                };
            }
        }

        while mantissa < 1.0 {
            mantissa *= 10.0;
            exponent -= 1;
            if exponent < self.exponent_min {
                return 0;
            }
        }

        // Take one more decimal digit while rounding would drop it and the mantissa has room.
        let mut lost = self.rounding_loss(mantissa);
        while lost > 0.5 && exponent > self.exponent_min && mantissa * 10.0 <= self.mantissa_max {
            mantissa *= 10.0;
            exponent -= 1;
            lost = self.rounding_loss(mantissa);
        }

        let int_mantissa = round_half_up(sign * mantissa) as i64;
        ((exponent as u32 & self.exponent_mask()) << self.mantissa_bits)
            | (int_mantissa as u32 & self.mantissa_mask())
    }

    fn rounding_loss(&self, mantissa: f64) -> f64 {
        let scaled = round_half_up(mantissa * self.precision);
        let rounded = round_half_up(mantissa) * self.precision;
        (scaled - rounded).abs()
    }

    fn decode(&self, raw: u32) -> Value {
        let mantissa_raw = raw & self.mantissa_mask();
        if let Some((_, special)) = self.reserved.iter().find(|(code, _)| *code == mantissa_raw) {
            return Value::Special(*special);
        }
        let mantissa = sign_extend(mantissa_raw, self.mantissa_bits);
        let exponent = sign_extend((raw >> self.mantissa_bits) & self.exponent_mask(), self.exponent_bits);
        Value::Float(scale(mantissa as f64, exponent))
    }
}

/// `floor(x + 0.5)`: halves round towards positive infinity.
fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

fn sign_extend(v: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((v << shift) as i32) >> shift
}

/// `mantissa * 10^exponent`, dividing for negative exponents so that decimal
/// inputs land on the nearest f64.
fn scale(mantissa: f64, exponent: i32) -> f64 {
    if exponent >= 0 {
        mantissa * 10f64.powi(exponent)
    } else {
        mantissa / 10f64.powi(-exponent)
    }
}
