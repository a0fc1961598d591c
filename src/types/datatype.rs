//! Datatype identities.
//!
//! A [`Datatype`] is an identifier plus the kind of native value backing it.
//! Two datatypes are equal iff their identifiers are equal; the kind is
//! informative only.

use std::borrow::Cow;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Serialize, Serializer};
use strum::IntoEnumIterator;
use strum_macros::EnumIter;

use crate::error::PolicyError;

pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
pub const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
pub const XSD_ANY_URI: &str = "http://www.w3.org/2001/XMLSchema#anyURI";
pub const XACML_RFC822_NAME: &str = "urn:oasis:names:tc:xacml:1.0:data-type:rfc822Name";

/// How values of a datatype are represented in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    Boolean,
    Integer,
    Double,
    AnyUri,
    Rfc822Name,
    /// A datatype registered by an extension factory.
    Extension,
}

/// The datatypes built into every standard registry, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter)]
pub enum StandardDatatype {
    String,
    Boolean,
    Integer,
    Double,
    AnyUri,
    Rfc822Name,
}

impl StandardDatatype {
    pub fn id(self) -> &'static str {
        match self {
            Self::String => XSD_STRING,
            Self::Boolean => XSD_BOOLEAN,
            Self::Integer => XSD_INTEGER,
            Self::Double => XSD_DOUBLE,
            Self::AnyUri => XSD_ANY_URI,
            Self::Rfc822Name => XACML_RFC822_NAME,
        }
    }

    /// The name used in standard function identifiers, e.g. `anyURI` in `anyURI-equal`.
    pub fn short_name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Double => "double",
            Self::AnyUri => "anyURI",
            Self::Rfc822Name => "rfc822Name",
        }
    }

    pub fn kind(self) -> ValueKind {
        match self {
            Self::String => ValueKind::String,
            Self::Boolean => ValueKind::Boolean,
            Self::Integer => ValueKind::Integer,
            Self::Double => ValueKind::Double,
            Self::AnyUri => ValueKind::AnyUri,
            Self::Rfc822Name => ValueKind::Rfc822Name,
        }
    }

    pub fn datatype(self) -> Datatype {
        Datatype::from_static(self.id(), self.kind())
    }
}

impl FromStr for StandardDatatype {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::iter()
            .find(|d| d.id() == s)
            .ok_or_else(|| PolicyError::UnsupportedType(s.to_string()))
    }
}

/// A datatype identity, e.g. `http://www.w3.org/2001/XMLSchema#string`.
#[derive(Debug, Clone)]
pub struct Datatype {
    id: Cow<'static, str>,
    kind: ValueKind,
}

impl Datatype {
    pub const STRING: Datatype = Datatype::from_static(XSD_STRING, ValueKind::String);
    pub const BOOLEAN: Datatype = Datatype::from_static(XSD_BOOLEAN, ValueKind::Boolean);
    pub const INTEGER: Datatype = Datatype::from_static(XSD_INTEGER, ValueKind::Integer);
    pub const DOUBLE: Datatype = Datatype::from_static(XSD_DOUBLE, ValueKind::Double);
    pub const ANY_URI: Datatype = Datatype::from_static(XSD_ANY_URI, ValueKind::AnyUri);
    pub const RFC822_NAME: Datatype =
        Datatype::from_static(XACML_RFC822_NAME, ValueKind::Rfc822Name);

    pub const fn from_static(id: &'static str, kind: ValueKind) -> Self {
        Datatype {
            id: Cow::Borrowed(id),
            kind,
        }
    }

    /// A datatype defined outside the standard set.
    pub fn extension(id: impl Into<String>) -> Self {
        Datatype {
            id: Cow::Owned(id.into()),
            kind: ValueKind::Extension,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ValueKind {
        self.kind
    }

    /// The standard datatype with this identifier, if any.
    pub fn standard(&self) -> Option<StandardDatatype> {
        self.id().parse().ok()
    }
}

impl PartialEq for Datatype {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Datatype {}

impl Hash for Datatype {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Display for Datatype {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.id)
    }
}

impl From<StandardDatatype> for Datatype {
    fn from(value: StandardDatatype) -> Self {
        value.datatype()
    }
}

impl Serialize for Datatype {
    fn serialize<S>(&self, ser: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        ser.serialize_str(self.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_equality_is_by_id_only() {
        let a = Datatype::from_static(XSD_STRING, ValueKind::String);
        let b = Datatype::from_static(XSD_STRING, ValueKind::Extension);
        assert_eq!(a, b);
        assert_eq!(Datatype::extension(XSD_STRING), Datatype::STRING);
        assert_ne!(Datatype::STRING, Datatype::ANY_URI);

        let set: HashSet<Datatype> = [a, b, Datatype::extension("urn:x")].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_standard_lookup() {
        assert_eq!(
            Datatype::INTEGER.standard(),
            Some(StandardDatatype::Integer)
        );
        assert_eq!(Datatype::extension("urn:example:ipv4").standard(), None);
        assert_eq!(
            StandardDatatype::from_str(XACML_RFC822_NAME).unwrap(),
            StandardDatatype::Rfc822Name
        );
        assert!(matches!(
            StandardDatatype::from_str("integer"),
            Err(PolicyError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_standard_datatype_round_trip() {
        for standard in StandardDatatype::iter() {
            let datatype = standard.datatype();
            assert_eq!(datatype.standard(), Some(standard));
            assert_eq!(datatype.kind(), standard.kind());
        }
    }

    #[test]
    fn test_serializes_as_id() {
        let json = serde_json::to_value(Datatype::DOUBLE).unwrap();
        assert_eq!(json, XSD_DOUBLE);
    }
}
