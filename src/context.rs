//! Per-request evaluation context.
//!
//! Holds the request's attributes, an ordered list of external attribute
//! providers and a cache of what those providers returned. A context belongs
//! to exactly one request and is never shared between concurrent calls.

use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::sync::Arc;

use tracing::debug;

use crate::error::IndeterminateError;
use crate::types::{Bag, BagSource, Datatype};

pub const CATEGORY_SUBJECT: &str = "urn:oasis:names:tc:xacml:1.0:subject-category:access-subject";
pub const CATEGORY_RESOURCE: &str = "urn:oasis:names:tc:xacml:3.0:attribute-category:resource";
pub const CATEGORY_ACTION: &str = "urn:oasis:names:tc:xacml:3.0:attribute-category:action";
pub const CATEGORY_ENVIRONMENT: &str =
    "urn:oasis:names:tc:xacml:3.0:attribute-category:environment";

/// Fully qualified attribute name: category, id and optional issuer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeFqn {
    pub category: String,
    pub id: String,
    pub issuer: Option<String>,
}

impl AttributeFqn {
    pub fn new(category: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            id: id.into(),
            issuer: None,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    /// A designator without an issuer matches attributes from any issuer.
    fn selects(&self, candidate: &AttributeFqn) -> bool {
        self.category == candidate.category
            && self.id == candidate.id
            && (self.issuer.is_none() || self.issuer == candidate.issuer)
    }
}

impl Display for AttributeFqn {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match &self.issuer {
            Some(issuer) => write!(f, "{}#{}@{}", self.category, self.id, issuer),
            None => write!(f, "{}#{}", self.category, self.id),
        }
    }
}

/// External source of attributes missing from the request.
///
/// Providers may block or fail; a failure, including a timeout or a
/// cancellation, is reported as an [`IndeterminateError`].
pub trait AttributeProvider: Send + Sync + Debug {
    /// `Ok(None)` when this provider does not supply the attribute.
    fn find(
        &self,
        attribute: &AttributeFqn,
        datatype: &Datatype,
    ) -> Result<Option<Bag>, IndeterminateError>;
}

#[derive(Debug, Default)]
pub struct EvaluationContext {
    attributes: HashMap<AttributeFqn, Bag>,
    providers: Vec<Arc<dyn AttributeProvider>>,
    cache: HashMap<(AttributeFqn, Datatype), Bag>,
}

impl EvaluationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, attribute: AttributeFqn, bag: Bag) -> Self {
        self.insert_attribute(attribute, bag);
        self
    }

    pub fn insert_attribute(&mut self, attribute: AttributeFqn, bag: Bag) -> Option<Bag> {
        self.attributes.insert(attribute, bag)
    }

    pub fn with_provider(mut self, provider: Arc<dyn AttributeProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Values of `attribute` with `datatype`.
    ///
    /// Request attributes win; otherwise providers are asked in order and the
    /// first answer is cached for the rest of this request. Nothing found is
    /// an empty bag, not an error.
    pub fn attribute(
        &mut self,
        attribute: &AttributeFqn,
        datatype: &Datatype,
    ) -> Result<Bag, IndeterminateError> {
        let from_request: Vec<&Bag> = self
            .attributes
            .iter()
            .filter(|(fqn, bag)| attribute.selects(fqn) && bag.datatype() == datatype)
            .map(|(_, bag)| bag)
            .collect();
        if !from_request.is_empty() {
            let values = from_request
                .into_iter()
                .flat_map(|bag| bag.iter().cloned())
                .collect();
            return Bag::new(datatype.clone(), values, BagSource::Request);
        }

        let key = (attribute.clone(), datatype.clone());
        if let Some(bag) = self.cache.get(&key) {
            return Ok(bag.clone());
        }

        for provider in &self.providers {
            let found = provider.find(attribute, datatype).map_err(|e| {
                e.wrap(format!("attribute provider failed to resolve {attribute}"))
            })?;
            if let Some(bag) = found {
                if bag.datatype() != datatype {
                    return Err(IndeterminateError::processing(format!(
                        "provider returned {} values for {attribute}, expected {datatype}",
                        bag.datatype()
                    )));
                }
                debug!(
                    event = "Context",
                    phase = "Provider",
                    attribute = %attribute,
                    values = bag.len()
                );
                self.cache.insert(key, bag.clone());
                return Ok(bag);
            }
        }

        Ok(Bag::empty(datatype.clone(), BagSource::Request))
    }
}
