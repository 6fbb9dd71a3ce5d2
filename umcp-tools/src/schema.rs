//! JSON-schema synthesis from input type descriptors.
//!
//! Tool input schemas are always objects. Scalar inputs are wrapped under a
//! single `value` property; records map one property per field with
//! camelCase names, or the serde wire name when the field was renamed.
//! [`wire_arguments`] maps those property names back before decoding. Anything that cannot be resolved falls back to a
//! permissive object schema so registration never fails on a schema.

use serde::ser::{Serialize, SerializeMap, Serializer};
use thiserror::Error;
use serde_json::Value;
use tracing::warn;
use umcp_primitives::{FieldDescriptor, RecordDescriptor, ScalarKind, TypeDescriptor};

/// Property name scalar inputs are wrapped under.
pub const VALUE_PROPERTY: &str = "value";

/// Deepest nesting the synthesizer follows before giving up.
pub const MAX_DEPTH: usize = 32;

/// JSON-schema `type` keyword values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    /// `object`
    Object,
    /// `array`
    Array,
    /// `string`
    String,
    /// `integer`
    Integer,
    /// `number`
    Number,
    /// `boolean`
    Boolean,
    /// `null`
    Null,
}

/// A JSON-schema document describing tool input.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonSchema {
    #[serde(rename = "type")]
    schema_type: SchemaType,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    properties: Option<Properties>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    required: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    items: Option<Box<JsonSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    additional_properties: Option<bool>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    enum_values: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_length: Option<u32>,
}

/// Properties in declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
struct Properties(Vec<(String, JsonSchema)>);

impl Serialize for Properties {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, schema) in &self.0 {
            map.serialize_entry(name, schema)?;
        }
        map.end()
    }
}

impl JsonSchema {
    const fn of(schema_type: SchemaType) -> Self {
        Self {
            schema_type,
            description: None,
            properties: None,
            required: Vec::new(),
            items: None,
            additional_properties: None,
            enum_values: None,
            min_length: None,
            max_length: None,
        }
    }

    /// `{type: "object", additionalProperties: true}`, accepting any mapping.
    #[must_use]
    pub const fn permissive() -> Self {
        let mut schema = Self::of(SchemaType::Object);
        schema.additional_properties = Some(true);
        schema
    }

    /// `{type: "object", properties: {}, additionalProperties: false}`.
    #[must_use]
    pub fn empty_object() -> Self {
        let mut schema = Self::of(SchemaType::Object);
        schema.properties = Some(Properties::default());
        schema.additional_properties = Some(false);
        schema
    }

    /// Returns the `type` keyword.
    #[must_use]
    pub const fn schema_type(&self) -> SchemaType {
        self.schema_type
    }

    /// Returns the description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the property names in declaration order.
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties
            .iter()
            .flat_map(|properties| properties.0.iter().map(|(name, _)| name.as_str()))
    }

    /// Looks up a property schema by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&JsonSchema> {
        self.properties.as_ref().and_then(|properties| {
            properties
                .0
                .iter()
                .find(|(candidate, _)| candidate == name)
                .map(|(_, schema)| schema)
        })
    }

    /// Returns the required property names.
    #[must_use]
    pub fn required(&self) -> &[String] {
        &self.required
    }

    /// Returns the array item schema, if any.
    #[must_use]
    pub fn items(&self) -> Option<&JsonSchema> {
        self.items.as_deref()
    }

    /// Returns the `additionalProperties` keyword, if present.
    #[must_use]
    pub const fn additional_properties(&self) -> Option<bool> {
        self.additional_properties
    }

    /// Returns the accepted enum values, if any.
    #[must_use]
    pub fn enum_values(&self) -> Option<&[String]> {
        self.enum_values.as_deref()
    }

    /// Renders the schema as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> serde_json::Value {
        // Every field is a string, bool, number or nested schema.
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::Value::Null)
    }
}

/// Reasons a descriptor could not be turned into a precise schema.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    /// The type has no statically known shape.
    #[error("type `{type_name}` has no static shape")]
    Unresolvable {
        /// Name of the opaque type.
        type_name: String,
    },
    /// Two fields collide once converted to camelCase.
    #[error("record `{record}` has more than one field named `{property}` after camelCase conversion")]
    DuplicateProperty {
        /// Record containing the collision.
        record: String,
        /// Colliding property name.
        property: String,
    },
    /// Nesting exceeded [`MAX_DEPTH`].
    #[error("type nesting exceeds {limit} levels")]
    TooDeep {
        /// The depth limit.
        limit: usize,
    },
    /// The top-level input is neither an object nor a wrappable scalar.
    #[error("{kind} input cannot be expressed as an object schema")]
    NotAnObject {
        /// Kind of descriptor found at the top level.
        kind: &'static str,
    },
}

/// Result alias for schema synthesis.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Synthesizes the input schema for `descriptor`.
///
/// Never fails: unresolvable descriptors yield [`JsonSchema::permissive`]
/// and a logged warning.
#[must_use]
pub fn synthesize(descriptor: &TypeDescriptor) -> JsonSchema {
    try_synthesize(descriptor).unwrap_or_else(|err| {
        warn!(error = %err, "falling back to permissive input schema");
        JsonSchema::permissive()
    })
}

/// Synthesizes the input schema for `descriptor`, reporting why a precise
/// schema could not be produced.
///
/// # Errors
///
/// Returns a [`SchemaError`] for dynamic types, camelCase collisions,
/// excessive nesting, and top-level lists or enums.
pub fn try_synthesize(descriptor: &TypeDescriptor) -> SchemaResult<JsonSchema> {
    match descriptor {
        TypeDescriptor::Unit => Ok(JsonSchema::empty_object()),
        TypeDescriptor::Scalar { scalar } => Ok(wrap_scalar(*scalar, true)),
        TypeDescriptor::Optional { inner } => match inner.as_ref() {
            TypeDescriptor::Scalar { scalar } => Ok(wrap_scalar(*scalar, false)),
            other => try_synthesize(other),
        },
        TypeDescriptor::Record(record) => record_schema(record, 0),
        TypeDescriptor::Map { .. } => Ok(JsonSchema::permissive()),
        TypeDescriptor::List { .. } => Err(SchemaError::NotAnObject { kind: "list" }),
        TypeDescriptor::Enum { .. } => Err(SchemaError::NotAnObject { kind: "enum" }),
        TypeDescriptor::Dynamic { type_name } => Err(SchemaError::Unresolvable {
            type_name: type_name.clone(),
        }),
    }
}

/// Returns the wrapped scalar, and whether it may be omitted, for inputs that
/// travel under [`VALUE_PROPERTY`].
#[must_use]
pub fn wrapped_scalar(descriptor: &TypeDescriptor) -> Option<(ScalarKind, bool)> {
    match descriptor {
        TypeDescriptor::Scalar { scalar } => Some((*scalar, false)),
        TypeDescriptor::Optional { inner } => inner.scalar_kind().map(|scalar| (scalar, true)),
        _ => None,
    }
}

fn wrap_scalar(scalar: ScalarKind, required: bool) -> JsonSchema {
    let mut schema = JsonSchema::of(SchemaType::Object);
    schema.properties = Some(Properties(vec![(
        VALUE_PROPERTY.to_owned(),
        scalar_schema(scalar),
    )]));
    if required {
        schema.required.push(VALUE_PROPERTY.to_owned());
    }
    schema
}

fn scalar_schema(scalar: ScalarKind) -> JsonSchema {
    match scalar {
        ScalarKind::String => JsonSchema::of(SchemaType::String),
        ScalarKind::I8 | ScalarKind::I16 | ScalarKind::I32 | ScalarKind::I64 | ScalarKind::U8 => {
            JsonSchema::of(SchemaType::Integer)
        }
        ScalarKind::F32 | ScalarKind::F64 => JsonSchema::of(SchemaType::Number),
        ScalarKind::Bool => JsonSchema::of(SchemaType::Boolean),
        ScalarKind::Char => {
            let mut schema = JsonSchema::of(SchemaType::String);
            schema.min_length = Some(1);
            schema.max_length = Some(1);
            schema
        }
    }
}

fn record_schema(record: &RecordDescriptor, depth: usize) -> SchemaResult<JsonSchema> {
    if depth > MAX_DEPTH {
        return Err(SchemaError::TooDeep { limit: MAX_DEPTH });
    }

    let mut properties: Vec<(String, JsonSchema)> = Vec::with_capacity(record.fields().len());
    let mut required = Vec::new();
    for field in record.fields() {
        let property = property_name(field);
        if properties.iter().any(|(existing, _)| *existing == property) {
            return Err(SchemaError::DuplicateProperty {
                record: record.name().to_owned(),
                property,
            });
        }

        let mut schema = nested_schema(field.ty(), depth + 1)?;
        if let Some(description) = field.description() {
            schema.description = Some(description.to_owned());
        }
        if field.is_required() {
            required.push(property.clone());
        }
        properties.push((property, schema));
    }

    let mut schema = JsonSchema::of(SchemaType::Object);
    schema.description = record.description().map(ToOwned::to_owned);
    schema.properties = Some(Properties(properties));
    schema.required = required;
    schema.additional_properties = Some(false);
    Ok(schema)
}

fn nested_schema(descriptor: &TypeDescriptor, depth: usize) -> SchemaResult<JsonSchema> {
    if depth > MAX_DEPTH {
        return Err(SchemaError::TooDeep { limit: MAX_DEPTH });
    }

    match descriptor {
        TypeDescriptor::Unit => Ok(JsonSchema::of(SchemaType::Null)),
        TypeDescriptor::Scalar { scalar } => Ok(scalar_schema(*scalar)),
        TypeDescriptor::Optional { inner } => nested_schema(inner, depth + 1),
        TypeDescriptor::List { items } => {
            let mut schema = JsonSchema::of(SchemaType::Array);
            schema.items = Some(Box::new(nested_schema(items, depth + 1)?));
            Ok(schema)
        }
        TypeDescriptor::Map { .. } => Ok(JsonSchema::permissive()),
        TypeDescriptor::Enum { variants, .. } => {
            let mut schema = JsonSchema::of(SchemaType::String);
            schema.enum_values = Some(variants.clone());
            Ok(schema)
        }
        TypeDescriptor::Record(record) => record_schema(record, depth),
        TypeDescriptor::Dynamic { type_name } => Err(SchemaError::Unresolvable {
            type_name: type_name.clone(),
        }),
    }
}

/// Schema property a record field is advertised under.
#[must_use]
pub fn property_name(field: &FieldDescriptor) -> String {
    if field.is_renamed() {
        field.wire_name().to_owned()
    } else {
        camel_case(field.name())
    }
}

/// Rewrites advertised property names in `value` to the keys the input type
/// deserializes from, following nested records, options, lists and maps.
///
/// Keys that are already wire names, or unknown, are left alone.
pub fn wire_arguments(descriptor: &TypeDescriptor, value: &mut Value) {
    match (descriptor, value) {
        (TypeDescriptor::Optional { inner }, value) => wire_arguments(inner, value),
        (TypeDescriptor::List { items }, Value::Array(values)) => {
            for value in values {
                wire_arguments(items, value);
            }
        }
        (TypeDescriptor::Map { values: ty }, Value::Object(values)) => {
            for value in values.values_mut() {
                wire_arguments(ty, value);
            }
        }
        (TypeDescriptor::Record(record), Value::Object(object)) => {
            for field in record.fields() {
                let property = property_name(field);
                let wire = field.wire_name();
                if property != wire && !object.contains_key(wire) {
                    if let Some(value) = object.remove(&property) {
                        object.insert(wire.to_owned(), value);
                    }
                }
                if let Some(value) = object.get_mut(wire) {
                    wire_arguments(field.ty(), value);
                }
            }
        }
        _ => {}
    }
}

/// Converts a snake_case identifier to camelCase.
#[must_use]
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for c in name.chars() {
        if c == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}
