//! Startup configuration for the attribute-value registry.

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::types::IntegerPrecision;

/// Settings read once when building a [`crate::AttributeValueRegistry`].
///
/// ```rust
/// use treetop_xacml::{IntegerPrecision, RegistryConfig};
///
/// let config = RegistryConfig::from_json_str(r#"{ "max_integer_value": 2147483647 }"#).unwrap();
/// assert_eq!(config.integer_precision(), IntegerPrecision::Int32);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Largest integer magnitude policies and requests are expected to use.
    /// Unset means unbounded, i.e. arbitrary precision.
    pub max_integer_value: Option<u64>,
}

impl RegistryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_integer_value(mut self, max: u64) -> Self {
        self.max_integer_value = Some(max);
        self
    }

    pub fn from_json_str(text: &str) -> Result<Self, PolicyError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn integer_precision(&self) -> IntegerPrecision {
        IntegerPrecision::for_max_value(self.max_integer_value)
    }
}
