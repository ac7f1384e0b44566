//! The BSON type lattice used by the query IR.
//!
//! Driver-provided type enums are not reused here because the IR needs more
//! information than a wire format tag: nullability and composability (a
//! value that can be either an int or a bool) are both first class.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt
};

use compact_str::CompactString;
use serde::Serialize;

/// All BSON types the IR can express.
///
/// `Any` and `AnyOf` are not BSON types per se: `Any` stands for a type
/// nothing is known about, and `AnyOf` models dynamic schemas where a
/// single field can hold values of several types. Optional host values are
/// encoded as `AnyOf(T, Null)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum BsonType {
    Double,
    String,
    /// A map of field name to type.
    Object(BTreeMap<CompactString, BsonType>),
    /// The possible types of the elements of an array.
    Array(Box<BsonType>),
    Boolean,
    Date,
    /// Null or a non existing field.
    Null,
    Int32,
    Int64,
    Decimal128,
    ObjectId,
    Uuid,
    Any,
    /// A closed set of constant values, as declared by a host enum type.
    Enum {
        values: BTreeSet<CompactString>,
        name:   Option<CompactString>
    },
    /// A union of possible types. Always kept in normal form: no nested
    /// `AnyOf`, never empty, never a single member. Member order is
    /// irrelevant for equality.
    AnyOf(BTreeSet<BsonType>)
}

impl BsonType {
    /// Builds a normalized `AnyOf` from the given member types.
    ///
    /// Nested `AnyOf`s are flattened, an empty member set collapses to
    /// `Any` and a single-member set collapses to that member.
    pub fn any_of(types: impl IntoIterator<Item = BsonType>) -> BsonType {
        let mut members = BTreeSet::new();
        for candidate in types {
            match candidate {
                BsonType::AnyOf(inner) => members.extend(inner),
                other => {
                    members.insert(other);
                }
            }
        }

        if members.len() == 1 {
            return members.pop_first().unwrap_or(BsonType::Any);
        }

        match members.len() {
            0 => BsonType::Any,
            _ => BsonType::AnyOf(members)
        }
    }

    /// Shorthand for `AnyOf(T, Null)`, the shape of every host reference
    /// type that may be absent.
    pub fn nullable(inner: BsonType) -> BsonType {
        BsonType::any_of([inner, BsonType::Null])
    }

    /// Shorthand for an array with elements of `element`.
    pub fn array(element: BsonType) -> BsonType {
        BsonType::Array(Box::new(element))
    }

    /// Builds an enum type from its constant names.
    pub fn enumeration(
        values: impl IntoIterator<Item = CompactString>,
        name: Option<CompactString>
    ) -> BsonType {
        BsonType::Enum {
            values: values.into_iter().collect(),
            name
        }
    }

    /// Whether this type admits a missing or null value.
    pub fn accepts_null(&self) -> bool {
        match self {
            BsonType::Null | BsonType::Any => true,
            BsonType::AnyOf(members) => members.contains(&BsonType::Null),
            _ => false
        }
    }
}

impl fmt::Display for BsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Double => write!(f, "Double"),
            Self::String => write!(f, "String"),
            Self::Object(_) => write!(f, "Object"),
            Self::Array(element) => write!(f, "Array<{}>", element),
            Self::Boolean => write!(f, "Boolean"),
            Self::Date => write!(f, "Date"),
            Self::Null => write!(f, "Null"),
            Self::Int32 => write!(f, "Int32"),
            Self::Int64 => write!(f, "Int64"),
            Self::Decimal128 => write!(f, "Decimal128"),
            Self::ObjectId => write!(f, "ObjectId"),
            Self::Uuid => write!(f, "UUID"),
            Self::Any => write!(f, "Any"),
            Self::Enum {
                name, ..
            } => write!(f, "Enum({})", name.as_deref().unwrap_or("<anonymous>")),
            Self::AnyOf(members) => {
                write!(f, "AnyOf(")?;
                for (index, member) in members.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", member)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_any_of_collapses_to_any() {
        assert_eq!(BsonType::any_of([]), BsonType::Any);
    }

    #[test]
    fn single_member_any_of_collapses_to_member() {
        assert_eq!(BsonType::any_of([BsonType::String]), BsonType::String);
    }

    #[test]
    fn any_of_is_order_independent() {
        let left = BsonType::any_of([BsonType::String, BsonType::Null]);
        let right = BsonType::any_of([BsonType::Null, BsonType::String]);
        assert_eq!(left, right);
    }

    #[test]
    fn nested_any_of_flattens() {
        let nested = BsonType::any_of([
            BsonType::any_of([BsonType::Int32, BsonType::Null]),
            BsonType::any_of([BsonType::Int64, BsonType::Null]),
        ]);
        assert_eq!(
            nested,
            BsonType::any_of([BsonType::Int32, BsonType::Int64, BsonType::Null])
        );
    }

    #[test]
    fn duplicate_members_collapse() {
        assert_eq!(
            BsonType::any_of([BsonType::String, BsonType::String]),
            BsonType::String
        );
    }

    #[test]
    fn nullable_wraps_in_any_of_with_null() {
        let nullable = BsonType::nullable(BsonType::ObjectId);
        assert!(nullable.accepts_null());
        assert_eq!(
            nullable,
            BsonType::any_of([BsonType::Null, BsonType::ObjectId])
        );
    }
}
