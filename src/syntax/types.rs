//! Static type descriptors handed over by the host-language front end.

use compact_str::CompactString;
use serde::Serialize;

/// A host primitive type, identified by its width and family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PrimitiveType {
    Bool,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64
}

/// A static type as seen by the host language's front end.
///
/// The front end lowers whatever its type system produces into this closed
/// set; the type mapper turns it into a BSON type. Adding support for a new
/// host type means adding one descriptor row here and one mapping row in
/// the type mapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum TypeDescriptor {
    Primitive(PrimitiveType),
    /// A nullable boxed wrapper around a primitive.
    Boxed(PrimitiveType),
    /// A reference type identified by its qualified (or simple) name.
    Named(CompactString),
    Array(Box<TypeDescriptor>),
    /// A parameterized single-element container (`List<T>`, `Set<T>`).
    /// `element` is absent when the front end lost the type argument.
    Collection {
        container: CompactString,
        element:   Option<Box<TypeDescriptor>>
    },
    /// A key/value container. The engine does not model heterogeneous
    /// key/value types, so these map to `Any`.
    MapLike {
        container: CompactString
    },
    /// An enumerated type and its declared constants.
    Enum {
        name:      CompactString,
        constants: Vec<CompactString>
    },
    /// A user class with its declared fields.
    Object {
        name:   CompactString,
        fields: Vec<(CompactString, TypeDescriptor)>
    },
    Unknown
}

impl TypeDescriptor {
    pub fn named(name: impl Into<CompactString>) -> Self {
        Self::Named(name.into())
    }

    pub fn array(element: TypeDescriptor) -> Self {
        Self::Array(Box::new(element))
    }

    pub fn list_of(element: TypeDescriptor) -> Self {
        Self::Collection {
            container: CompactString::const_new("java.util.List"),
            element:   Some(Box::new(element))
        }
    }

    /// The qualified name of the type, when it has one.
    pub fn type_name(&self) -> Option<&str> {
        match self {
            Self::Named(name)
            | Self::Collection {
                container: name, ..
            }
            | Self::MapLike {
                container: name
            }
            | Self::Enum {
                name, ..
            }
            | Self::Object {
                name, ..
            } => Some(name.as_str()),
            _ => None
        }
    }

    /// Whether the name matches a qualified or simple spelling of `fqn`.
    /// Front ends are not required to qualify driver class names.
    pub fn names_class(&self, fqn: &str) -> bool {
        let Some(name) = self.type_name() else {
            return false;
        };
        name == fqn || fqn.rsplit('.').next() == Some(name) || name.rsplit('.').next() == Some(fqn)
    }

    /// Whether this descriptor is an iterable container.
    pub fn is_iterable(&self) -> bool {
        matches!(self, Self::Collection { .. })
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }
}
