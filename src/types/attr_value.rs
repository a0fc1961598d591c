//! Typed attribute values.
//!
//! Values are created by the registry's factories, which is the only place
//! lexical parsing and coercion happen. Once built, a value's datatype never
//! changes.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::error::PolicyError;

use super::datatype::Datatype;
use super::integer::IntegerValue;

static DOUBLE_LEXICAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[+-]?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)(?:[eE][+-]?[0-9]+)?|-?INF|\+INF|NaN)$")
        .expect("double lexical pattern is valid")
});

/// An `xs:double`.
///
/// `0.0` and `-0.0` are the same value and `NaN` is equal to itself, so that
/// equality and hashing agree.
#[derive(Debug, Clone, Copy)]
pub struct DoubleValue(f64);

impl DoubleValue {
    pub fn new(value: f64) -> Self {
        Self(value)
    }

    pub fn value(self) -> f64 {
        self.0
    }

    /// Parse the XSD lexical form (`1.5`, `-2E3`, `INF`, `-INF`, `NaN`).
    pub fn parse(raw: &str) -> Result<Self, PolicyError> {
        let trimmed = raw.trim();
        if !DOUBLE_LEXICAL.is_match(trimmed) {
            return Err(PolicyError::ParseError(format!(
                "'{raw}' is not a valid double"
            )));
        }
        let value = match trimmed {
            "INF" | "+INF" => f64::INFINITY,
            "-INF" => f64::NEG_INFINITY,
            "NaN" => f64::NAN,
            other => other
                .parse::<f64>()
                .map_err(|e| PolicyError::ParseError(format!("'{raw}': {e}")))?,
        };
        Ok(Self(value))
    }

    fn canonical_bits(self) -> u64 {
        if self.0.is_nan() {
            f64::NAN.to_bits()
        } else if self.0 == 0.0 {
            0.0f64.to_bits()
        } else {
            self.0.to_bits()
        }
    }
}

impl PartialEq for DoubleValue {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_bits() == other.canonical_bits()
    }
}

impl Eq for DoubleValue {}

impl Hash for DoubleValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical_bits().hash(state);
    }
}

impl Display for DoubleValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        if self.0.is_nan() {
            write!(f, "NaN")
        } else if self.0 == f64::INFINITY {
            write!(f, "INF")
        } else if self.0 == f64::NEG_INFINITY {
            write!(f, "-INF")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// An `rfc822Name`: the local part is case-sensitive, the domain is not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rfc822Name {
    local_part: String,
    domain: String,
}

impl Rfc822Name {
    pub fn parse(raw: &str) -> Result<Self, PolicyError> {
        let trimmed = raw.trim();
        let Some((local_part, domain)) = trimmed.split_once('@') else {
            return Err(PolicyError::ParseError(format!(
                "'{raw}' is not a valid rfc822Name: missing '@'"
            )));
        };
        if local_part.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(PolicyError::ParseError(format!(
                "'{raw}' is not a valid rfc822Name"
            )));
        }
        Ok(Self {
            local_part: local_part.to_string(),
            domain: domain.to_ascii_lowercase(),
        })
    }

    pub fn local_part(&self) -> &str {
        &self.local_part
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }
}

impl Display for Rfc822Name {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}@{}", self.local_part, self.domain)
    }
}

/// A value of an extension datatype, held in its canonical lexical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExtensionValue {
    datatype: Datatype,
    canonical: Arc<str>,
}

impl ExtensionValue {
    /// Built by extension factories after validating and normalizing `canonical`.
    pub fn new(datatype: Datatype, canonical: impl Into<Arc<str>>) -> Self {
        Self {
            datatype,
            canonical: canonical.into(),
        }
    }

    pub fn datatype(&self) -> &Datatype {
        &self.datatype
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }
}

/// An attribute value typed by exactly one datatype.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AttributeValue {
    String(String),
    Boolean(bool),
    Integer(IntegerValue),
    Double(DoubleValue),
    AnyUri(String),
    Rfc822Name(Rfc822Name),
    Extension(ExtensionValue),
}

impl AttributeValue {
    pub fn datatype(&self) -> Datatype {
        match self {
            Self::String(_) => Datatype::STRING,
            Self::Boolean(_) => Datatype::BOOLEAN,
            Self::Integer(_) => Datatype::INTEGER,
            Self::Double(_) => Datatype::DOUBLE,
            Self::AnyUri(_) => Datatype::ANY_URI,
            Self::Rfc822Name(_) => Datatype::RFC822_NAME,
            Self::Extension(v) => v.datatype().clone(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<&IntegerValue> {
        match self {
            Self::Integer(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Self::Double(v) => Some(v.value()),
            _ => None,
        }
    }

    /// Textual content for string-like datatypes.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::AnyUri(s) => Some(s),
            Self::Extension(v) => Some(v.canonical()),
            _ => None,
        }
    }
}

impl Display for AttributeValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::String(s) | Self::AnyUri(s) => write!(f, "{s}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Rfc822Name(v) => write!(f, "{v}"),
            Self::Extension(v) => write!(f, "{}", v.canonical()),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl Serialize for AttributeValue {
    fn serialize<S>(&self, ser: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = ser.serialize_struct("AttributeValue", 2)?;
        s.serialize_field("datatype", &self.datatype())?;
        s.serialize_field("value", &self.to_string())?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use yare::parameterized;

    #[parameterized(
        integer_form = { "1", 1.0 },
        decimal = { "1.5", 1.5 },
        exponent = { "-2E3", -2000.0 },
        leading_dot = { ".5", 0.5 },
        trailing_dot = { "5.", 5.0 },
        positive_infinity = { "INF", f64::INFINITY },
        negative_infinity = { "-INF", f64::NEG_INFINITY },
    )]
    fn test_double_lexical(raw: &str, expected: f64) {
        assert_eq!(DoubleValue::parse(raw).unwrap().value(), expected);
    }

    #[parameterized(
        rust_inf = { "inf" },
        rust_infinity = { "infinity" },
        lower_nan = { "nan" },
        empty = { "" },
        garbage = { "1.2.3" },
    )]
    fn test_double_rejects_non_xsd_forms(raw: &str) {
        assert!(DoubleValue::parse(raw).is_err());
    }

    #[test]
    fn test_double_identity_rules() {
        assert_eq!(DoubleValue::new(0.0), DoubleValue::new(-0.0));
        assert_eq!(DoubleValue::new(f64::NAN), DoubleValue::parse("NaN").unwrap());
        let set: HashSet<DoubleValue> = [DoubleValue::new(0.0), DoubleValue::new(-0.0)]
            .into_iter()
            .collect();
        assert_eq!(set.len(), 1);
        assert_eq!(DoubleValue::new(f64::NEG_INFINITY).to_string(), "-INF");
    }

    #[test]
    fn test_rfc822_domain_is_case_insensitive() {
        let a = Rfc822Name::parse("Anne@EXAMPLE.com").unwrap();
        let b = Rfc822Name::parse("Anne@example.COM").unwrap();
        let c = Rfc822Name::parse("anne@example.com").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "Anne@example.com");
        assert_eq!(a.local_part(), "Anne");
        assert_eq!(a.domain(), "example.com");
    }

    #[parameterized(
        no_at = { "anne.example.com" },
        empty_local = { "@example.com" },
        empty_domain = { "anne@" },
        two_ats = { "a@b@c" },
    )]
    fn test_rfc822_invalid(raw: &str) {
        assert!(Rfc822Name::parse(raw).is_err());
    }

    #[test]
    fn test_value_datatypes() {
        assert_eq!(AttributeValue::from("x").datatype(), Datatype::STRING);
        assert_eq!(AttributeValue::from(true).datatype(), Datatype::BOOLEAN);
        assert_eq!(
            AttributeValue::AnyUri("urn:x".into()).datatype(),
            Datatype::ANY_URI
        );
        let ext = ExtensionValue::new(Datatype::extension("urn:example:color"), "red");
        assert_eq!(
            AttributeValue::Extension(ext).datatype(),
            Datatype::extension("urn:example:color")
        );
    }

    #[test]
    fn test_same_text_different_datatype_is_not_equal() {
        let s = AttributeValue::String("urn:x".into());
        let u = AttributeValue::AnyUri("urn:x".into());
        assert_ne!(s, u);
        assert_eq!(s.as_str(), u.as_str());
    }

    #[test]
    fn test_value_serialization() {
        let value = AttributeValue::Double(DoubleValue::new(2.5));
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "datatype": "http://www.w3.org/2001/XMLSchema#double",
                "value": "2.5"
            })
        );
    }
}
