//! Data model: datatypes, attribute values, bags and decision results.
//!
//! Built-in datatype identifiers:
//! - `string`, `boolean`, `integer`, `double`, `anyURI`: `http://www.w3.org/2001/XMLSchema#<name>`
//! - `rfc822Name`: `urn:oasis:names:tc:xacml:1.0:data-type:rfc822Name`
//!
//! Extension datatypes carry any identifier and are represented by
//! [`ExtensionValue`]s in canonical lexical form.

mod attr_value;
mod bag;
mod datatype;
mod decision;
mod integer;
mod pep_action;
mod status;

pub use attr_value::{AttributeValue, DoubleValue, ExtensionValue, Rfc822Name};
pub use bag::{Bag, BagSource};
pub use datatype::{
    Datatype, StandardDatatype, ValueKind, XACML_RFC822_NAME, XSD_ANY_URI, XSD_BOOLEAN,
    XSD_DOUBLE, XSD_INTEGER, XSD_STRING,
};
pub use decision::{Decision, DecisionResult, Effect, ExtendedEffect, PolicyRef};
pub use integer::{IntegerPrecision, IntegerValue};
pub use pep_action::{AttributeAssignment, PepAction, PepActionKind};
pub use status::{Status, StatusCode};
