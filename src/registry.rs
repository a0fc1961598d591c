//! Attribute-value factories and the registry that resolves them.
//!
//! The registry is built once from an ordered list of factories and never
//! changes afterwards. Registration order is preference order:
//!
//! 1. Lookups by datatype id are a plain map lookup.
//! 2. Lookups by native value kind try the exact kind first, then walk the
//!    open kinds declared by factories (in registration order) and take the
//!    first one the value's kind is assignable to.
//!
//! Extending the type system means building a registry from a different
//! list, typically [`RegistryBuilder::standard`] plus extra factories.

use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::sync::Arc;

use num_bigint::BigInt;
use regex::Regex;
use tracing::debug;

use crate::config::RegistryConfig;
use crate::error::PolicyError;
use crate::types::{
    AttributeValue, Datatype, DoubleValue, ExtensionValue, IntegerPrecision, Rfc822Name,
    StandardDatatype,
};
use strum::IntoEnumIterator;

/// Kinds of native (non-string) input values.
///
/// Concrete kinds can be matched exactly. Open kinds group concrete ones and
/// are only ever matched through [`NativeKind::is_assignable_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeKind {
    Bool,
    Str,
    I32,
    I64,
    U64,
    BigInt,
    F32,
    F64,
    /// Any integral kind.
    Integral,
    /// Any floating-point kind.
    Float,
    /// Integral or floating-point.
    Number,
    /// Everything.
    Any,
}

impl NativeKind {
    pub fn is_open(self) -> bool {
        matches!(self, Self::Integral | Self::Float | Self::Number | Self::Any)
    }

    fn parent(self) -> Option<NativeKind> {
        match self {
            Self::I32 | Self::I64 | Self::U64 | Self::BigInt => Some(Self::Integral),
            Self::F32 | Self::F64 => Some(Self::Float),
            Self::Integral | Self::Float => Some(Self::Number),
            Self::Bool | Self::Str | Self::Number => Some(Self::Any),
            Self::Any => None,
        }
    }

    /// True if a value of kind `self` may be handed to a factory accepting `target`.
    pub fn is_assignable_to(self, target: NativeKind) -> bool {
        let mut current = Some(self);
        while let Some(kind) = current {
            if kind == target {
                return true;
            }
            current = kind.parent();
        }
        false
    }
}

/// A native value supplied programmatically instead of as a lexical string.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Bool(bool),
    Str(String),
    I32(i32),
    I64(i64),
    U64(u64),
    BigInt(BigInt),
    F32(f32),
    F64(f64),
}

impl NativeValue {
    pub fn kind(&self) -> NativeKind {
        match self {
            Self::Bool(_) => NativeKind::Bool,
            Self::Str(_) => NativeKind::Str,
            Self::I32(_) => NativeKind::I32,
            Self::I64(_) => NativeKind::I64,
            Self::U64(_) => NativeKind::U64,
            Self::BigInt(_) => NativeKind::BigInt,
            Self::F32(_) => NativeKind::F32,
            Self::F64(_) => NativeKind::F64,
        }
    }
}

impl Display for NativeValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v}"),
            Self::I32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::U64(v) => write!(f, "{v}"),
            Self::BigInt(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
        }
    }
}

/// Creates values of one datatype.
pub trait AttributeValueFactory: Send + Sync + Debug {
    fn datatype(&self) -> &Datatype;

    /// Parse a lexical form into a value of this factory's datatype.
    fn parse(&self, raw: &str) -> Result<AttributeValue, PolicyError>;

    /// Native kinds this factory accepts in [`AttributeValueFactory::coerce`].
    fn native_kinds(&self) -> &[NativeKind] {
        &[]
    }

    fn coerce(&self, value: &NativeValue) -> Result<AttributeValue, PolicyError> {
        Err(unsupported_native(self.datatype(), value))
    }

    /// Precision of the integers this factory produces, if it produces any.
    fn integer_precision(&self) -> Option<IntegerPrecision> {
        None
    }
}

fn unsupported_native(datatype: &Datatype, value: &NativeValue) -> PolicyError {
    PolicyError::UnsupportedType(format!(
        "{datatype} cannot be created from native value {value:?}"
    ))
}

/// Factory for one of the built-in datatypes.
#[derive(Debug, Clone)]
pub struct StandardFactory {
    standard: StandardDatatype,
    datatype: Datatype,
    precision: IntegerPrecision,
}

impl StandardFactory {
    /// `precision` only matters for the integer datatype.
    pub fn new(standard: StandardDatatype, precision: IntegerPrecision) -> Self {
        Self {
            standard,
            datatype: standard.datatype(),
            precision,
        }
    }

    pub fn standard(&self) -> StandardDatatype {
        self.standard
    }
}

impl AttributeValueFactory for StandardFactory {
    fn datatype(&self) -> &Datatype {
        &self.datatype
    }

    fn parse(&self, raw: &str) -> Result<AttributeValue, PolicyError> {
        match self.standard {
            StandardDatatype::String => Ok(AttributeValue::String(raw.to_string())),
            StandardDatatype::Boolean => match raw.trim() {
                "true" | "1" => Ok(AttributeValue::Boolean(true)),
                "false" | "0" => Ok(AttributeValue::Boolean(false)),
                _ => Err(PolicyError::ParseError(format!(
                    "'{raw}' is not a valid boolean"
                ))),
            },
            StandardDatatype::Integer => self.precision.parse(raw).map(AttributeValue::Integer),
            StandardDatatype::Double => DoubleValue::parse(raw).map(AttributeValue::Double),
            StandardDatatype::AnyUri => {
                let trimmed = raw.trim();
                if trimmed.chars().any(char::is_whitespace) {
                    return Err(PolicyError::ParseError(format!(
                        "'{raw}' is not a valid anyURI"
                    )));
                }
                Ok(AttributeValue::AnyUri(trimmed.to_string()))
            }
            StandardDatatype::Rfc822Name => Rfc822Name::parse(raw).map(AttributeValue::Rfc822Name),
        }
    }

    fn native_kinds(&self) -> &[NativeKind] {
        match self.standard {
            StandardDatatype::String => &[NativeKind::Str],
            StandardDatatype::Boolean => &[NativeKind::Bool],
            StandardDatatype::Integer => &[
                NativeKind::I32,
                NativeKind::I64,
                NativeKind::BigInt,
                NativeKind::Integral,
            ],
            StandardDatatype::Double => &[NativeKind::F32, NativeKind::F64, NativeKind::Float],
            StandardDatatype::AnyUri | StandardDatatype::Rfc822Name => &[],
        }
    }

    fn coerce(&self, value: &NativeValue) -> Result<AttributeValue, PolicyError> {
        let coerced = match (self.standard, value) {
            (StandardDatatype::String, NativeValue::Str(s)) => AttributeValue::String(s.clone()),
            (StandardDatatype::Boolean, NativeValue::Bool(b)) => AttributeValue::Boolean(*b),
            (StandardDatatype::Integer, NativeValue::I32(v)) => {
                AttributeValue::Integer(self.precision.from_i64(i64::from(*v))?)
            }
            (StandardDatatype::Integer, NativeValue::I64(v)) => {
                AttributeValue::Integer(self.precision.from_i64(*v)?)
            }
            (StandardDatatype::Integer, NativeValue::U64(v)) => {
                AttributeValue::Integer(self.precision.from_bigint(&BigInt::from(*v))?)
            }
            (StandardDatatype::Integer, NativeValue::BigInt(v)) => {
                AttributeValue::Integer(self.precision.from_bigint(v)?)
            }
            (StandardDatatype::Double, NativeValue::F32(v)) => {
                AttributeValue::Double(DoubleValue::new(f64::from(*v)))
            }
            (StandardDatatype::Double, NativeValue::F64(v)) => {
                AttributeValue::Double(DoubleValue::new(*v))
            }
            _ => return Err(unsupported_native(&self.datatype, value)),
        };
        Ok(coerced)
    }

    fn integer_precision(&self) -> Option<IntegerPrecision> {
        (self.standard == StandardDatatype::Integer).then_some(self.precision)
    }
}

/// Extension datatype whose lexical space is a regular expression.
///
/// Values are kept in their trimmed lexical form; two values are equal when
/// their forms are identical.
#[derive(Debug, Clone)]
pub struct PatternFactory {
    datatype: Datatype,
    pattern: Regex,
    native_kinds: Vec<NativeKind>,
}

impl PatternFactory {
    /// `pattern` is anchored automatically.
    pub fn new(datatype_id: impl Into<String>, pattern: &str) -> Result<Self, PolicyError> {
        Ok(Self {
            datatype: Datatype::extension(datatype_id),
            pattern: Regex::new(&format!("^(?:{pattern})$"))?,
            native_kinds: Vec::new(),
        })
    }

    /// Also accept native values of `kind`, converted through their display form.
    pub fn accept_native(mut self, kind: NativeKind) -> Self {
        self.native_kinds.push(kind);
        self
    }
}

impl AttributeValueFactory for PatternFactory {
    fn datatype(&self) -> &Datatype {
        &self.datatype
    }

    fn parse(&self, raw: &str) -> Result<AttributeValue, PolicyError> {
        let trimmed = raw.trim();
        if !self.pattern.is_match(trimmed) {
            return Err(PolicyError::ParseError(format!(
                "'{raw}' is not a valid {}",
                self.datatype
            )));
        }
        Ok(AttributeValue::Extension(ExtensionValue::new(
            self.datatype.clone(),
            trimmed,
        )))
    }

    fn native_kinds(&self) -> &[NativeKind] {
        &self.native_kinds
    }

    fn coerce(&self, value: &NativeValue) -> Result<AttributeValue, PolicyError> {
        if !self
            .native_kinds
            .iter()
            .any(|kind| value.kind().is_assignable_to(*kind))
        {
            return Err(unsupported_native(&self.datatype, value));
        }
        self.parse(&value.to_string())
    }
}

pub type FactoryRef = Arc<dyn AttributeValueFactory>;

/// Immutable datatype registry.
#[derive(Debug, Clone)]
pub struct AttributeValueRegistry {
    factories: Vec<FactoryRef>,
    by_id: HashMap<String, FactoryRef>,
    exact: HashMap<NativeKind, FactoryRef>,
    fallback: Vec<(NativeKind, FactoryRef)>,
    integer_precision: IntegerPrecision,
}

impl AttributeValueRegistry {
    /// The built-in datatypes, configured by `config`.
    pub fn standard(config: &RegistryConfig) -> Result<Self, PolicyError> {
        RegistryBuilder::standard(config).build()
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn resolve(&self, datatype_id: &str) -> Result<&FactoryRef, PolicyError> {
        self.by_id
            .get(datatype_id)
            .ok_or_else(|| PolicyError::UnsupportedType(datatype_id.to_string()))
    }

    pub fn parse(&self, datatype_id: &str, raw: &str) -> Result<AttributeValue, PolicyError> {
        self.resolve(datatype_id)?.parse(raw)
    }

    /// The preferred factory for native values of `kind`.
    pub fn resolve_native(&self, kind: NativeKind) -> Option<&FactoryRef> {
        if let Some(factory) = self.exact.get(&kind) {
            return Some(factory);
        }
        self.fallback
            .iter()
            .find(|(open, _)| kind.is_assignable_to(*open))
            .map(|(_, factory)| factory)
    }

    pub fn coerce(&self, value: &NativeValue) -> Result<AttributeValue, PolicyError> {
        let factory = self.resolve_native(value.kind()).ok_or_else(|| {
            PolicyError::UnsupportedType(format!("no datatype accepts native value {value:?}"))
        })?;
        factory.coerce(value)
    }

    /// Datatype identifiers in registration order.
    pub fn datatypes(&self) -> impl Iterator<Item = &Datatype> {
        self.factories.iter().map(|f| f.datatype())
    }

    pub fn integer_precision(&self) -> IntegerPrecision {
        self.integer_precision
    }
}

/// Collects factories in preference order and builds an [`AttributeValueRegistry`].
#[derive(Debug, Clone, Default)]
pub struct RegistryBuilder {
    factories: Vec<FactoryRef>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder preloaded with every standard datatype.
    pub fn standard(config: &RegistryConfig) -> Self {
        let precision = config.integer_precision();
        let mut builder = Self::new();
        for standard in StandardDatatype::iter() {
            builder = builder.add_factory(Arc::new(StandardFactory::new(standard, precision)));
        }
        builder
    }

    pub fn add_factory(mut self, factory: FactoryRef) -> Self {
        self.factories.push(factory);
        self
    }

    /// The registry's integer precision is taken from the factory registered
    /// for `xs:integer`, or arbitrary when there is none.
    pub fn build(self) -> Result<AttributeValueRegistry, PolicyError> {
        let mut by_id: HashMap<String, FactoryRef> = HashMap::new();
        let mut exact: HashMap<NativeKind, FactoryRef> = HashMap::new();
        let mut fallback = Vec::new();

        for factory in &self.factories {
            let id = factory.datatype().id().to_string();
            if by_id.contains_key(&id) {
                return Err(PolicyError::DuplicateDatatype(id));
            }
            by_id.insert(id, Arc::clone(factory));

            for kind in factory.native_kinds() {
                if kind.is_open() {
                    fallback.push((*kind, Arc::clone(factory)));
                } else {
                    exact.entry(*kind).or_insert_with(|| Arc::clone(factory));
                }
            }
        }

        let integer_precision = by_id
            .get(Datatype::INTEGER.id())
            .and_then(|factory| factory.integer_precision())
            .unwrap_or_default();

        debug!(
            event = "Registry",
            phase = "Built",
            datatypes = self.factories.len(),
            open_kinds = fallback.len(),
            integer_precision = %integer_precision
        );

        Ok(AttributeValueRegistry {
            factories: self.factories,
            by_id,
            exact,
            fallback,
            integer_precision,
        })
    }
}
