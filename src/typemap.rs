//! Maps host static types to BSON types.
//!
//! This table is the single source of truth for type inference: adding
//! support for a new host type means adding one row here. The mapping is a
//! pure function of the descriptor.

use crate::{
    ir::BsonType,
    syntax::{PrimitiveType, TypeDescriptor}
};

/// Infers the BSON type of a host static type, considering nullability.
///
/// Primitives map to their scalar kind. Boxed wrappers may be absent and
/// gain `Null` — except booleans, which the host coerces on unboxing and
/// stay plain `Boolean`. Reference types that may be absent map to
/// `AnyOf(T, Null)`. Container element types are mapped recursively;
/// map-like containers are not modeled and become `Any`.
pub fn bson_type_of(descriptor: &TypeDescriptor) -> BsonType {
    match descriptor {
        TypeDescriptor::Primitive(primitive) => primitive_bson_type(*primitive),
        TypeDescriptor::Boxed(primitive) => match primitive {
            PrimitiveType::Bool => BsonType::Boolean,
            other => BsonType::nullable(primitive_bson_type(*other))
        },
        TypeDescriptor::Named(name) => named_bson_type(name),
        TypeDescriptor::Array(element) => BsonType::array(bson_type_of(element)),
        TypeDescriptor::Collection {
            element, ..
        } => match element {
            Some(element) => BsonType::array(bson_type_of(element)),
            // type arguments were lost, assume an array of anything
            None => BsonType::array(BsonType::Any)
        },
        TypeDescriptor::MapLike {
            ..
        } => BsonType::Any,
        TypeDescriptor::Enum {
            name,
            constants
        } => BsonType::enumeration(constants.iter().cloned(), Some(name.clone())),
        TypeDescriptor::Object {
            fields, ..
        } => BsonType::nullable(BsonType::Object(
            fields
                .iter()
                .map(|(name, field_type)| (name.clone(), bson_type_of(field_type)))
                .collect()
        )),
        TypeDescriptor::Unknown => BsonType::Any
    }
}

fn primitive_bson_type(primitive: PrimitiveType) -> BsonType {
    match primitive {
        PrimitiveType::Bool => BsonType::Boolean,
        PrimitiveType::Int16 | PrimitiveType::Int32 => BsonType::Int32,
        PrimitiveType::Int64 => BsonType::Int64,
        PrimitiveType::Float32 | PrimitiveType::Float64 => BsonType::Double
    }
}

fn named_bson_type(name: &str) -> BsonType {
    let simple = name.rsplit('.').next().unwrap_or(name);
    match simple {
        "String" | "CharSequence" => BsonType::nullable(BsonType::String),
        "Date" | "Instant" | "LocalDate" | "LocalDateTime" => BsonType::nullable(BsonType::Date),
        "BigInteger" => BsonType::nullable(BsonType::Int64),
        "BigDecimal" | "Decimal128" => BsonType::nullable(BsonType::Decimal128),
        "ObjectId" => BsonType::nullable(BsonType::ObjectId),
        "UUID" => BsonType::nullable(BsonType::Uuid),
        _ => BsonType::Any
    }
}
