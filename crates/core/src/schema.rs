//! Store schema: declared state keys, their defaults and derived values.
//!
//! A schema maps each state key to a [`PropertySpec`]. A spec may carry:
//!
//! - a `default` used to seed the key the first time it is set,
//! - a `calculated` function that replaces the raw value at read time,
//! - nested field specs (one level) with their own `default`/`calculated`.
//!
//! Calculated functions are attached in code; the JSON form only describes
//! defaults and nesting.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{FluxError, FluxResult};

/// Derived value, evaluated against the store's committed data on every read.
pub type CalculatedFn = Arc<dyn Fn(&Map<String, Value>) -> Value + Send + Sync>;

const DEFAULT_KEY: &str = "default";
const CALCULATED_KEY: &str = "calculated";

/// Declaration of a single state key (or nested field).
#[derive(Clone, Default)]
pub struct PropertySpec {
    default: Option<Value>,
    calculated: Option<CalculatedFn>,
    fields: BTreeMap<String, PropertySpec>,
}

impl PropertySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_calculated<F>(mut self, f: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> Value + Send + Sync + 'static,
    {
        self.calculated = Some(Arc::new(f));
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, spec: PropertySpec) -> Self {
        self.fields.insert(name.into(), spec);
        self
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    pub fn calculated(&self) -> Option<&CalculatedFn> {
        self.calculated.as_ref()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &PropertySpec)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn field(&self, name: &str) -> Option<&PropertySpec> {
        self.fields.get(name)
    }

    /// Parse `{"default": .., "<field>": {..}}`.
    pub fn from_value(path: &str, value: &Value) -> FluxResult<Self> {
        let Value::Object(entries) = value else {
            return Err(FluxError::invalid_definition(format!(
                "property spec '{path}' must be an object"
            )));
        };

        let mut spec = PropertySpec::new();
        for (key, entry) in entries {
            match key.as_str() {
                DEFAULT_KEY => spec.default = Some(entry.clone()),
                CALCULATED_KEY => {
                    return Err(FluxError::invalid_definition(format!(
                        "'{path}.calculated' cannot be declared in JSON; attach it with with_calculated"
                    )));
                }
                field => {
                    let nested = PropertySpec::from_value(&format!("{path}.{field}"), entry)?;
                    spec.fields.insert(field.to_string(), nested);
                }
            }
        }
        Ok(spec)
    }
}

impl core::fmt::Debug for PropertySpec {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PropertySpec")
            .field("default", &self.default)
            .field("calculated", &self.calculated.as_ref().map(|_| "<fn>"))
            .field("fields", &self.fields)
            .finish()
    }
}

/// Per-store declaration of state keys.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    properties: BTreeMap<String, PropertySpec>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_property(mut self, name: impl Into<String>, spec: PropertySpec) -> Self {
        self.properties.insert(name.into(), spec);
        self
    }

    /// Parse a JSON schema object (`{"list": {"default": []}, ..}`).
    pub fn from_value(value: &Value) -> FluxResult<Self> {
        let Value::Object(entries) = value else {
            return Err(FluxError::invalid_definition("schema must be an object"));
        };

        let mut schema = Schema::new();
        for (key, entry) in entries {
            schema
                .properties
                .insert(key.clone(), PropertySpec::from_value(key, entry)?);
        }
        Ok(schema)
    }

    pub fn get(&self, name: &str) -> Option<&PropertySpec> {
        self.properties.get(name)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}
