use serde::{Deserialize, Serialize};
use std::fmt;

/// Magnitudes at or above this use exponent notation.
const EXPONENT_UPPER: f64 = 1e21;

/// Non-zero magnitudes below this use exponent notation.
const EXPONENT_LOWER: f64 = 1e-6;

/// Numeric value in its canonical decimal text form.
///
/// Integers are written in minimal form (no leading zeros, no `+`, no `-0`).
/// Integral floats below 1e21 fold to the integer form so that `2.0` and `2`
/// (or `2^53` as a float and as an integer) are the same number. Other floats use the shortest
/// round-trip decimal with at least one digit on each side of the point, and
/// exponent notation only when the magnitude requires it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalNumber(String);

impl CanonicalNumber {
    /// Canonical form of a signed integer.
    pub fn from_i64(value: i64) -> Self {
        Self(value.to_string())
    }

    /// Canonical form of an unsigned integer.
    pub fn from_u64(value: u64) -> Self {
        Self(value.to_string())
    }

    /// Canonical form of a 128-bit signed integer.
    pub fn from_i128(value: i128) -> Self {
        Self(value.to_string())
    }

    /// Canonical form of a 128-bit unsigned integer.
    pub fn from_u128(value: u128) -> Self {
        Self(value.to_string())
    }

    /// Canonical form of a float. Returns `None` for NaN and infinities.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        // -0.0 == 0.0, so negative zero lands here as well.
        if value == 0.0 {
            return Some(Self("0".to_string()));
        }
        let magnitude = value.abs();
        // Every integral f64 below 1e21 converts to i128 exactly.
        if value.fract() == 0.0 && magnitude < EXPONENT_UPPER {
            return Some(Self((value as i128).to_string()));
        }
        if (EXPONENT_LOWER..EXPONENT_UPPER).contains(&magnitude) {
            let mut text = value.to_string();
            if !text.contains('.') {
                text.push_str(".0");
            }
            return Some(Self(text));
        }
        Some(Self(exponent_form(value)))
    }

    /// Canonical text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the canonical text is an integer (no point, no exponent).
    pub fn is_integer(&self) -> bool {
        !self.0.contains(['.', 'e'])
    }
}

/// `{:e}` gives the shortest round-trip mantissa; force a fractional digit.
fn exponent_form(value: f64) -> String {
    let raw = format!("{:e}", value);
    match raw.split_once('e') {
        Some((mantissa, exponent)) if !mantissa.contains('.') => {
            format!("{}.0e{}", mantissa, exponent)
        }
        _ => raw,
    }
}

impl fmt::Display for CanonicalNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
