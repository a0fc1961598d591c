//! Bags: unordered multisets of same-typed attribute values.

use std::collections::HashMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::IndeterminateError;

use super::attr_value::AttributeValue;
use super::datatype::Datatype;

/// Where a bag came from. Only informative; matching never looks at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BagSource {
    /// Attributes supplied with the request or by an attribute provider.
    #[default]
    Request,
    /// Produced by evaluating an expression.
    Computed,
}

#[derive(Debug, Clone)]
pub struct Bag {
    datatype: Datatype,
    values: Vec<AttributeValue>,
    source: BagSource,
}

impl Bag {
    /// Build a bag, checking that every value has `datatype`.
    pub fn new(
        datatype: Datatype,
        values: Vec<AttributeValue>,
        source: BagSource,
    ) -> Result<Self, IndeterminateError> {
        if let Some(bad) = values.iter().find(|v| v.datatype() != datatype) {
            return Err(IndeterminateError::processing(format!(
                "bag of {datatype} cannot hold value '{bad}' of type {}",
                bad.datatype()
            )));
        }
        Ok(Self {
            datatype,
            values,
            source,
        })
    }

    pub fn empty(datatype: Datatype, source: BagSource) -> Self {
        Self {
            datatype,
            values: Vec::new(),
            source,
        }
    }

    pub fn singleton(value: AttributeValue, source: BagSource) -> Self {
        Self {
            datatype: value.datatype(),
            values: vec![value],
            source,
        }
    }

    pub fn datatype(&self) -> &Datatype {
        &self.datatype
    }

    pub fn source(&self) -> BagSource {
        self.source
    }

    pub fn with_source(mut self, source: BagSource) -> Self {
        self.source = source;
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AttributeValue> {
        self.values.iter()
    }

    pub fn values(&self) -> &[AttributeValue] {
        &self.values
    }

    pub fn contains(&self, value: &AttributeValue) -> bool {
        self.values.contains(value)
    }

    /// The single element of the bag; anything else is a processing error.
    pub fn one_and_only(&self) -> Result<&AttributeValue, IndeterminateError> {
        match self.values.as_slice() {
            [only] => Ok(only),
            other => Err(IndeterminateError::processing(format!(
                "expected a bag of exactly one {} value, got {}",
                self.datatype,
                other.len()
            ))),
        }
    }

    fn counts(&self) -> HashMap<&AttributeValue, usize> {
        let mut counts = HashMap::new();
        for value in &self.values {
            *counts.entry(value).or_insert(0) += 1;
        }
        counts
    }
}

/// Multiset equality; order and provenance are ignored.
impl PartialEq for Bag {
    fn eq(&self, other: &Self) -> bool {
        self.datatype == other.datatype
            && self.values.len() == other.values.len()
            && self.counts() == other.counts()
    }
}

impl Eq for Bag {}

impl<'a> IntoIterator for &'a Bag {
    type Item = &'a AttributeValue;
    type IntoIter = std::slice::Iter<'a, AttributeValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

impl Display for Bag {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "[{}]", self.values.iter().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IntegerValue;

    fn strings(values: &[&str]) -> Vec<AttributeValue> {
        values.iter().map(|v| AttributeValue::from(*v)).collect()
    }

    #[test]
    fn test_bag_rejects_mixed_types() {
        let err = Bag::new(
            Datatype::STRING,
            vec![AttributeValue::from("a"), AttributeValue::Boolean(true)],
            BagSource::Request,
        )
        .unwrap_err();
        assert!(err.message().contains("cannot hold"));
    }

    #[test]
    fn test_multiset_equality_ignores_order_and_source() {
        let a = Bag::new(Datatype::STRING, strings(&["a", "b", "a"]), BagSource::Request).unwrap();
        let b = Bag::new(Datatype::STRING, strings(&["b", "a", "a"]), BagSource::Computed).unwrap();
        let c = Bag::new(Datatype::STRING, strings(&["a", "b", "b"]), BagSource::Request).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_empty_bags_of_different_types_differ() {
        assert_ne!(
            Bag::empty(Datatype::STRING, BagSource::Request),
            Bag::empty(Datatype::INTEGER, BagSource::Request)
        );
    }

    #[test]
    fn test_one_and_only() {
        let single = Bag::singleton(
            AttributeValue::Integer(IntegerValue::Long(3)),
            BagSource::Computed,
        );
        assert_eq!(single.one_and_only().unwrap().to_string(), "3");
        assert_eq!(single.datatype(), &Datatype::INTEGER);

        let empty = Bag::empty(Datatype::INTEGER, BagSource::Request);
        assert!(empty.one_and_only().is_err());

        let two = Bag::new(Datatype::STRING, strings(&["a", "b"]), BagSource::Request).unwrap();
        assert!(two.one_and_only().is_err());
    }

    #[test]
    fn test_display_and_iteration() {
        let bag = Bag::new(Datatype::STRING, strings(&["x", "y"]), BagSource::Request).unwrap();
        assert_eq!(bag.to_string(), "[x, y]");
        assert_eq!((&bag).into_iter().count(), 2);
        assert!(bag.contains(&AttributeValue::from("y")));
        assert_eq!(bag.with_source(BagSource::Computed).source(), BagSource::Computed);
    }
}
