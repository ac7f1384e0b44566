use mql_analyzer::{
    ir::BsonType,
    syntax::{PrimitiveType, TypeDescriptor},
    typemap::bson_type_of
};
use pretty_assertions::assert_eq;

#[test]
fn test_integral_widths_map_to_int_kinds() {
    assert_eq!(
        bson_type_of(&TypeDescriptor::Primitive(PrimitiveType::Int16)),
        BsonType::Int32
    );
    assert_eq!(
        bson_type_of(&TypeDescriptor::Primitive(PrimitiveType::Int64)),
        BsonType::Int64
    );
}

#[test]
fn test_floating_point_maps_to_double() {
    assert_eq!(
        bson_type_of(&TypeDescriptor::Primitive(PrimitiveType::Float32)),
        BsonType::Double
    );
    assert_eq!(
        bson_type_of(&TypeDescriptor::Boxed(PrimitiveType::Float64)),
        BsonType::nullable(BsonType::Double)
    );
}

#[test]
fn test_boxed_boolean_never_gains_null() {
    assert_eq!(
        bson_type_of(&TypeDescriptor::Boxed(PrimitiveType::Bool)),
        BsonType::Boolean
    );
}

#[test]
fn test_nullable_reference_types_yield_any_of_with_null() {
    for name in [
        "java.lang.String",
        "java.lang.CharSequence",
        "java.util.Date",
        "java.time.LocalDateTime",
        "java.math.BigInteger",
        "java.math.BigDecimal",
        "org.bson.types.ObjectId",
        "java.util.UUID",
    ] {
        let mapped = bson_type_of(&TypeDescriptor::named(name));
        assert!(mapped.accepts_null(), "{} should be nullable", name);
    }
}

#[test]
fn test_object_id_row() {
    assert_eq!(
        bson_type_of(&TypeDescriptor::named("org.bson.types.ObjectId")),
        BsonType::nullable(BsonType::ObjectId)
    );
}

#[test]
fn test_parameterized_collections_map_recursively() {
    let descriptor = TypeDescriptor::list_of(TypeDescriptor::list_of(TypeDescriptor::named(
        "java.lang.String"
    )));
    assert_eq!(
        bson_type_of(&descriptor),
        BsonType::array(BsonType::array(BsonType::nullable(BsonType::String)))
    );
}

#[test]
fn test_map_like_types_are_any() {
    assert_eq!(
        bson_type_of(&TypeDescriptor::MapLike {
            container: "java.util.HashMap".into()
        }),
        BsonType::Any
    );
}

#[test]
fn test_enum_types_keep_name_and_constants() {
    let descriptor = TypeDescriptor::Enum {
        name:      "com.example.Genre".into(),
        constants: vec!["FANTASY".into(), "SCI_FI".into()]
    };
    match bson_type_of(&descriptor) {
        BsonType::Enum {
            values,
            name
        } => {
            assert_eq!(values.len(), 2);
            assert_eq!(name.as_deref(), Some("com.example.Genre"));
        }
        other => panic!("expected an enum type, got {:?}", other)
    }
}

#[test]
fn test_user_classes_map_to_nullable_object() {
    let descriptor = TypeDescriptor::Object {
        name:   "Book".into(),
        fields: vec![(
            "title".into(),
            TypeDescriptor::named("java.lang.String")
        )]
    };
    let mapped = bson_type_of(&descriptor);
    assert!(mapped.accepts_null());
}

#[test]
fn test_mapping_is_a_pure_function() {
    let descriptors = [
        TypeDescriptor::named("java.lang.String"),
        TypeDescriptor::Primitive(PrimitiveType::Int32),
        TypeDescriptor::array(TypeDescriptor::named("java.util.UUID")),
    ];
    for descriptor in &descriptors {
        assert_eq!(bson_type_of(descriptor), bson_type_of(descriptor));
    }
}
