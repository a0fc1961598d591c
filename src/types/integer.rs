//! XACML `integer` values with a registry-selected backing precision.
//!
//! A registry picks one [`IntegerPrecision`] at construction time and every
//! integer it produces is expressed in it. Parsing a literal that does not
//! fit fails; arithmetic that overflows fails. Nothing wraps or truncates.

use std::cmp::Ordering;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum_macros::Display as StrumDisplay;

use crate::error::{IndeterminateError, PolicyError};

static INTEGER_LEXICAL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?[0-9]+$").expect("integer lexical pattern is valid"));

/// Backing precision for XACML integers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
    StrumDisplay,
)]
pub enum IntegerPrecision {
    #[strum(serialize = "32-bit")]
    Int32,
    #[strum(serialize = "64-bit")]
    Int64,
    #[default]
    #[strum(serialize = "arbitrary")]
    Arbitrary,
}

impl IntegerPrecision {
    /// The smallest precision able to hold `max_value`; `None` means unbounded.
    pub fn for_max_value(max_value: Option<u64>) -> Self {
        match max_value {
            Some(max) if max <= i32::MAX as u64 => Self::Int32,
            Some(max) if max <= i64::MAX as u64 => Self::Int64,
            _ => Self::Arbitrary,
        }
    }

    /// Parse an `xs:integer` lexical form into this precision.
    pub fn parse(self, raw: &str) -> Result<IntegerValue, PolicyError> {
        let trimmed = raw.trim();
        if !INTEGER_LEXICAL.is_match(trimmed) {
            return Err(PolicyError::ParseError(format!(
                "'{raw}' is not a valid integer"
            )));
        }
        let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
        let overflow = || {
            PolicyError::ParseError(format!(
                "integer '{raw}' overflows the {self} integer precision"
            ))
        };
        match self {
            Self::Int32 => i32::from_str(digits)
                .map(IntegerValue::Int)
                .map_err(|_| overflow()),
            Self::Int64 => i64::from_str(digits)
                .map(IntegerValue::Long)
                .map_err(|_| overflow()),
            Self::Arbitrary => BigInt::from_str(digits)
                .map(IntegerValue::Big)
                .map_err(|e| PolicyError::ParseError(e.to_string())),
        }
    }

    /// Express `value` in this precision, failing if it does not fit.
    pub fn from_bigint(self, value: &BigInt) -> Result<IntegerValue, PolicyError> {
        let overflow = || {
            PolicyError::ParseError(format!(
                "integer {value} overflows the {self} integer precision"
            ))
        };
        match self {
            Self::Int32 => value.to_i32().map(IntegerValue::Int).ok_or_else(overflow),
            Self::Int64 => value.to_i64().map(IntegerValue::Long).ok_or_else(overflow),
            Self::Arbitrary => Ok(IntegerValue::Big(value.clone())),
        }
    }

    pub fn from_i64(self, value: i64) -> Result<IntegerValue, PolicyError> {
        match self {
            Self::Int64 => Ok(IntegerValue::Long(value)),
            _ => self.from_bigint(&BigInt::from(value)),
        }
    }
}

/// An integer in one of the three backing precisions.
///
/// Equality, ordering and hashing are numeric: `Int(5)`, `Long(5)` and
/// `Big(5)` are the same value.
#[derive(Debug, Clone)]
pub enum IntegerValue {
    Int(i32),
    Long(i64),
    Big(BigInt),
}

#[derive(Debug, Clone, Copy)]
enum ArithOp {
    Add,
    Subtract,
    Multiply,
}

impl ArithOp {
    fn name(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Subtract => "subtract",
            Self::Multiply => "multiply",
        }
    }
}

impl IntegerValue {
    pub fn precision(&self) -> IntegerPrecision {
        match self {
            Self::Int(_) => IntegerPrecision::Int32,
            Self::Long(_) => IntegerPrecision::Int64,
            Self::Big(_) => IntegerPrecision::Arbitrary,
        }
    }

    pub fn to_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(i64::from(*v)),
            Self::Long(v) => Some(*v),
            Self::Big(v) => v.to_i64(),
        }
    }

    pub fn to_bigint(&self) -> BigInt {
        match self {
            Self::Int(v) => BigInt::from(*v),
            Self::Long(v) => BigInt::from(*v),
            Self::Big(v) => v.clone(),
        }
    }

    pub fn checked_add(&self, other: &Self) -> Result<Self, IndeterminateError> {
        self.arith(other, ArithOp::Add)
    }

    pub fn checked_sub(&self, other: &Self) -> Result<Self, IndeterminateError> {
        self.arith(other, ArithOp::Subtract)
    }

    pub fn checked_mul(&self, other: &Self) -> Result<Self, IndeterminateError> {
        self.arith(other, ArithOp::Multiply)
    }

    // The result keeps the wider precision of the two operands.
    fn arith(&self, other: &Self, op: ArithOp) -> Result<Self, IndeterminateError> {
        let precision = self.precision().max(other.precision());
        let overflow = || {
            IndeterminateError::processing(format!(
                "integer overflow: {} {} {} exceeds the {precision} integer precision",
                self,
                op.name(),
                other
            ))
        };
        match precision {
            IntegerPrecision::Int32 => {
                let (Self::Int(a), Self::Int(b)) = (self, other) else {
                    return Err(overflow());
                };
                let result = match op {
                    ArithOp::Add => a.checked_add(*b),
                    ArithOp::Subtract => a.checked_sub(*b),
                    ArithOp::Multiply => a.checked_mul(*b),
                };
                result.map(Self::Int).ok_or_else(overflow)
            }
            IntegerPrecision::Int64 => {
                let (Some(a), Some(b)) = (self.to_i64(), other.to_i64()) else {
                    return Err(overflow());
                };
                let result = match op {
                    ArithOp::Add => a.checked_add(b),
                    ArithOp::Subtract => a.checked_sub(b),
                    ArithOp::Multiply => a.checked_mul(b),
                };
                result.map(Self::Long).ok_or_else(overflow)
            }
            IntegerPrecision::Arbitrary => {
                let (a, b) = (self.to_bigint(), other.to_bigint());
                Ok(Self::Big(match op {
                    ArithOp::Add => a + b,
                    ArithOp::Subtract => a - b,
                    ArithOp::Multiply => a * b,
                }))
            }
        }
    }
}

impl PartialEq for IntegerValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for IntegerValue {}

impl PartialOrd for IntegerValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IntegerValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.to_i64(), other.to_i64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => self.to_bigint().cmp(&other.to_bigint()),
        }
    }
}

impl Hash for IntegerValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self.to_i64() {
            Some(v) => v.hash(state),
            None => self.to_bigint().hash(state),
        }
    }
}

impl Display for IntegerValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Long(v) => write!(f, "{v}"),
            Self::Big(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use yare::parameterized;

    fn hash_of(v: &IntegerValue) -> u64 {
        let mut h = DefaultHasher::new();
        v.hash(&mut h);
        h.finish()
    }

    #[parameterized(
        unbounded = { None, IntegerPrecision::Arbitrary },
        small = { Some(1000), IntegerPrecision::Int32 },
        i32_max = { Some(i32::MAX as u64), IntegerPrecision::Int32 },
        just_above_i32 = { Some(i32::MAX as u64 + 1), IntegerPrecision::Int64 },
        i64_max = { Some(i64::MAX as u64), IntegerPrecision::Int64 },
        u64_max = { Some(u64::MAX), IntegerPrecision::Arbitrary },
    )]
    fn test_precision_for_max_value(max: Option<u64>, expected: IntegerPrecision) {
        assert_eq!(IntegerPrecision::for_max_value(max), expected);
    }

    #[parameterized(
        int32 = { IntegerPrecision::Int32 },
        int64 = { IntegerPrecision::Int64 },
    )]
    fn test_huge_literal_overflows_bounded_precision(precision: IntegerPrecision) {
        let err = precision.parse("9999999999999999999999").unwrap_err();
        match err {
            PolicyError::ParseError(msg) => assert!(msg.contains("overflows"), "{msg}"),
            other => panic!("expected ParseError, got {other:?}"),
        }
    }

    #[test]
    fn test_arbitrary_precision_keeps_huge_literal() {
        let value = IntegerPrecision::Arbitrary
            .parse("9999999999999999999999")
            .unwrap();
        assert_eq!(value.to_string(), "9999999999999999999999");
        assert_eq!(value.to_i64(), None);
    }

    #[parameterized(
        plus_sign = { "+42", "42" },
        minus_sign = { "-7", "-7" },
        whitespace = { "  12 ", "12" },
        leading_zeros = { "007", "7" },
    )]
    fn test_lexical_forms(raw: &str, expected: &str) {
        for precision in [
            IntegerPrecision::Int32,
            IntegerPrecision::Int64,
            IntegerPrecision::Arbitrary,
        ] {
            assert_eq!(precision.parse(raw).unwrap().to_string(), expected);
        }
    }

    #[parameterized(
        empty = { "" },
        decimal = { "1.0" },
        double_sign = { "+-1" },
        hex = { "0x10" },
        inner_space = { "1 0" },
    )]
    fn test_invalid_lexical_forms(raw: &str) {
        assert!(matches!(
            IntegerPrecision::Int64.parse(raw),
            Err(PolicyError::ParseError(_))
        ));
    }

    #[test]
    fn test_parsed_values_use_selected_precision() {
        assert!(matches!(
            IntegerPrecision::Int32.parse("5").unwrap(),
            IntegerValue::Int(5)
        ));
        assert!(matches!(
            IntegerPrecision::Int64.parse("5").unwrap(),
            IntegerValue::Long(5)
        ));
        assert!(matches!(
            IntegerPrecision::Arbitrary.parse("5").unwrap(),
            IntegerValue::Big(_)
        ));
    }

    #[test]
    fn test_numeric_equality_and_hash_across_precisions() {
        let a = IntegerValue::Int(5);
        let b = IntegerValue::Long(5);
        let c = IntegerValue::Big(BigInt::from(5));
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(hash_of(&a), hash_of(&c));
        assert!(IntegerValue::Int(4) < IntegerValue::Big(BigInt::from(5)));
    }

    #[test]
    fn test_checked_arithmetic_overflow_fails() {
        let max = IntegerValue::Int(i32::MAX);
        let err = max.checked_add(&IntegerValue::Int(1)).unwrap_err();
        assert_eq!(err.code(), crate::types::StatusCode::ProcessingError);
        assert!(err.message().contains("overflow"));

        let long_max = IntegerValue::Long(i64::MAX);
        assert!(long_max.checked_mul(&IntegerValue::Long(2)).is_err());
    }

    #[test]
    fn test_checked_arithmetic_widens_to_larger_operand() {
        let sum = IntegerValue::Int(i32::MAX)
            .checked_add(&IntegerValue::Long(1))
            .unwrap();
        assert!(matches!(sum, IntegerValue::Long(v) if v == i64::from(i32::MAX) + 1));

        let big = IntegerValue::Big(BigInt::from(i64::MAX))
            .checked_mul(&IntegerValue::Int(4))
            .unwrap();
        assert_eq!(big.precision(), IntegerPrecision::Arbitrary);
        assert_eq!(big.to_bigint(), BigInt::from(i64::MAX) * 4);

        let diff = IntegerValue::Int(3).checked_sub(&IntegerValue::Int(5)).unwrap();
        assert_eq!(diff, IntegerValue::Int(-2));
    }

    #[test]
    fn test_from_bigint_respects_precision() {
        let huge = BigInt::from(i64::MAX) + 1;
        assert!(IntegerPrecision::Int64.from_bigint(&huge).is_err());
        assert!(IntegerPrecision::Arbitrary.from_bigint(&huge).is_ok());
        assert!(IntegerPrecision::Int32.from_i64(i64::from(i32::MIN)).is_ok());
        assert!(IntegerPrecision::Int32.from_i64(i64::from(i32::MIN) - 1).is_err());
    }
}
