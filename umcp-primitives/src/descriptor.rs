//! Type descriptors for capability inputs.
//!
//! A capability declares the shape of its input through [`InputType`]. The
//! descriptor is captured when the capability value is constructed and later
//! drives JSON-schema synthesis and argument extraction, so no runtime
//! reflection is involved.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Scalar kinds that cannot travel as a bare argument mapping.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    /// UTF-8 string.
    String,
    /// 8-bit signed integer.
    I8,
    /// 16-bit signed integer.
    I16,
    /// 32-bit signed integer.
    I32,
    /// 64-bit signed integer.
    I64,
    /// 32-bit float.
    F32,
    /// 64-bit float.
    F64,
    /// Boolean.
    Bool,
    /// Single Unicode scalar value.
    Char,
    /// Unsigned byte.
    U8,
}

impl ScalarKind {
    /// Lowercase type name, also accepted as an argument key.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Bool => "bool",
            Self::Char => "char",
            Self::U8 => "u8",
        }
    }
}

/// Describes the shape of a capability input type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeDescriptor {
    /// No input; the capability is invoked with `()`.
    Unit,
    /// A scalar value.
    Scalar {
        /// Which scalar.
        scalar: ScalarKind,
    },
    /// A value that may be absent.
    Optional {
        /// Descriptor of the present value.
        inner: Box<TypeDescriptor>,
    },
    /// A homogeneous sequence.
    List {
        /// Descriptor of each item.
        items: Box<TypeDescriptor>,
    },
    /// A string-keyed map.
    Map {
        /// Descriptor of each value.
        values: Box<TypeDescriptor>,
    },
    /// A closed set of string values.
    Enum {
        /// Type name of the enum.
        name: String,
        /// Accepted values in declaration order.
        variants: Vec<String>,
    },
    /// A structured record with named fields.
    Record(RecordDescriptor),
    /// A type whose shape cannot be described up front.
    Dynamic {
        /// Name of the opaque type.
        type_name: String,
    },
}

impl TypeDescriptor {
    /// Shorthand for a scalar descriptor.
    #[must_use]
    pub const fn scalar(scalar: ScalarKind) -> Self {
        Self::Scalar { scalar }
    }

    /// Shorthand for an optional descriptor.
    #[must_use]
    pub fn optional(inner: TypeDescriptor) -> Self {
        Self::Optional {
            inner: Box::new(inner),
        }
    }

    /// Shorthand for a list descriptor.
    #[must_use]
    pub fn list(items: TypeDescriptor) -> Self {
        Self::List {
            items: Box::new(items),
        }
    }

    /// Shorthand for a map descriptor.
    #[must_use]
    pub fn map(values: TypeDescriptor) -> Self {
        Self::Map {
            values: Box::new(values),
        }
    }

    /// Returns the scalar kind when this describes a scalar.
    #[must_use]
    pub const fn scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            Self::Scalar { scalar } => Some(*scalar),
            _ => None,
        }
    }

    /// Returns `true` for scalar descriptors.
    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar { .. })
    }

    /// Returns `true` for the unit descriptor.
    #[must_use]
    pub const fn is_unit(&self) -> bool {
        matches!(self, Self::Unit)
    }

    /// Returns `true` for optional descriptors.
    #[must_use]
    pub const fn is_optional(&self) -> bool {
        matches!(self, Self::Optional { .. })
    }
}

/// A structured record: a name plus ordered fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordDescriptor {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    fields: Vec<FieldDescriptor>,
}

impl RecordDescriptor {
    /// Creates an empty record descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields: Vec::new(),
        }
    }

    /// Attaches a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Appends a field whose requiredness follows its descriptor.
    #[must_use]
    pub fn field(self, name: impl Into<String>, ty: TypeDescriptor) -> Self {
        self.with_field(FieldDescriptor::new(name, ty))
    }

    /// Appends a fully specified field.
    #[must_use]
    pub fn with_field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }

    /// Returns the record name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns the fields in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }
}

/// One externally visible field of a record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rename: Option<String>,
    ty: TypeDescriptor,
    required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl FieldDescriptor {
    /// Creates a field; it is required unless `ty` is optional.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        let required = !ty.is_optional();
        Self {
            name: name.into(),
            rename: None,
            ty,
            required,
            description: None,
        }
    }

    /// Sets the key the field deserializes from, overriding its source name.
    #[must_use]
    pub fn renamed(mut self, wire_name: impl Into<String>) -> Self {
        self.rename = Some(wire_name.into());
        self
    }

    /// Overrides whether the field must be supplied.
    #[must_use]
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Attaches a description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Source field name, before any wire renaming.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key the field deserializes from: the explicit rename, else the source name.
    #[must_use]
    pub fn wire_name(&self) -> &str {
        self.rename.as_deref().unwrap_or(&self.name)
    }

    /// Returns `true` when the wire name was set explicitly.
    #[must_use]
    pub const fn is_renamed(&self) -> bool {
        self.rename.is_some()
    }

    /// Returns the field's descriptor.
    #[must_use]
    pub fn ty(&self) -> &TypeDescriptor {
        &self.ty
    }

    /// Returns `true` when callers must supply the field.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// Returns the optional description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// Types that can describe their own shape as a capability input.
///
/// Implemented for scalars, `()`, `Option`, `Vec`, string-keyed maps and
/// `serde_json::Value`; records and unit-only enums usually derive it.
pub trait InputType {
    /// Returns the descriptor for `Self`.
    fn describe() -> TypeDescriptor;
}

macro_rules! scalar_input {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl InputType for $ty {
                fn describe() -> TypeDescriptor {
                    TypeDescriptor::scalar(ScalarKind::$kind)
                }
            }
        )*
    };
}

scalar_input! {
    String => String,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    f32 => F32,
    f64 => F64,
    bool => Bool,
    char => Char,
    u8 => U8,
}

impl InputType for () {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::Unit
    }
}

impl<T: InputType> InputType for Option<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::optional(T::describe())
    }
}

impl<T: InputType> InputType for Box<T> {
    fn describe() -> TypeDescriptor {
        T::describe()
    }
}

impl<T: InputType> InputType for Vec<T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::list(T::describe())
    }
}

impl<T: InputType, S> InputType for HashMap<String, T, S> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::map(T::describe())
    }
}

impl<T: InputType> InputType for BTreeMap<String, T> {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::map(T::describe())
    }
}

impl InputType for serde_json::Value {
    fn describe() -> TypeDescriptor {
        TypeDescriptor::Dynamic {
            type_name: "serde_json::Value".into(),
        }
    }
}
