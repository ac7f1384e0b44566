use mql_analyzer::ir::{
    BsonType, CollectionReference, Component, ComponentKind, Name, Namespace, Node, Value
};
use pretty_assertions::assert_eq;

#[test]
fn test_any_of_normalizes_empty_to_any() {
    assert_eq!(BsonType::any_of([]), BsonType::Any);
}

#[test]
fn test_any_of_collapses_single_member() {
    assert_eq!(BsonType::any_of([BsonType::Int32]), BsonType::Int32);
}

#[test]
fn test_any_of_equality_is_order_independent() {
    assert_eq!(
        BsonType::any_of([BsonType::String, BsonType::Null, BsonType::Int32]),
        BsonType::any_of([BsonType::Int32, BsonType::String, BsonType::Null])
    );
}

#[test]
fn test_nested_any_of_flattens_structurally() {
    let nested = BsonType::any_of([
        BsonType::String,
        BsonType::any_of([BsonType::Null, BsonType::any_of([BsonType::Int32])]),
    ]);
    assert_eq!(
        nested,
        BsonType::any_of([BsonType::String, BsonType::Null, BsonType::Int32])
    );
}

#[test]
fn test_node_holds_at_most_one_component_per_kind() {
    let node: Node<u32> = Node::new(7)
        .with(Component::Named(Name::Eq))
        .with(Component::Named(Name::Match));

    assert_eq!(node.components().len(), 1);
    assert_eq!(node.operation_name(), Some(Name::Match));
}

#[test]
fn test_absent_components_read_as_empty_not_error() {
    let node: Node<u32> = Node::new(0);
    assert!(node.component(ComponentKind::HasFilter).is_none());
    assert!(node.filter_children().is_empty());
    assert!(node.sort_children().is_empty());
    assert_eq!(node.command(), None);
}

#[test]
fn test_children_are_owned_by_their_component() {
    let stage: Node<u32> = Node::new(1)
        .with(Component::Named(Name::Match))
        .with(Component::HasFilter(vec![
            Node::new(2).with(Component::Named(Name::Eq)),
        ]));

    assert_eq!(stage.filter_children().len(), 1);
    assert!(stage.projection_children().is_empty());
    assert!(stage.accumulated_fields().is_empty());
}

#[test]
fn test_namespace_displays_as_dotted_pair() {
    let namespace = Namespace::new("production", "users");
    assert_eq!(namespace.to_string(), "production.users");
}

#[test]
fn test_collection_reference_accessors() {
    let known: CollectionReference<u32> =
        CollectionReference::known(Namespace::new("prod", "books"));
    assert_eq!(known.collection(), Some("books"));
    assert_eq!(known.namespace().map(|n| n.database.as_str()), Some("prod"));

    let partial: CollectionReference<u32> = CollectionReference::OnlyCollection {
        collection_source: None,
        collection:        "books".into()
    };
    assert_eq!(partial.collection(), Some("books"));
    assert_eq!(partial.namespace(), None);

    let unknown: CollectionReference<u32> = CollectionReference::Unknown;
    assert_eq!(unknown.collection(), None);
}

#[test]
fn test_schema_field_names_walk_all_owning_components() {
    use mql_analyzer::ir::FieldReference;

    let filter: Node<u32> = Node::new(1)
        .with(Component::Named(Name::Eq))
        .with(Component::HasFieldReference(FieldReference::from_schema(
            2, "year"
        )));
    let sort: Node<u32> = Node::new(3)
        .with(Component::Named(Name::Ascending))
        .with(Component::HasFieldReference(FieldReference::from_schema(
            4, "title"
        )));
    let duplicate: Node<u32> = Node::new(5)
        .with(Component::Named(Name::Gt))
        .with(Component::HasFieldReference(FieldReference::from_schema(
            6, "year"
        )));

    let query: Node<u32> = Node::new(0)
        .with(Component::HasFilter(vec![filter, duplicate]))
        .with(Component::HasSorts(vec![sort]));

    let field_names = query.schema_field_names();
    let names: Vec<&str> = field_names
        .iter()
        .map(|name| name.as_str())
        .collect();
    assert_eq!(names, vec!["year", "title"]);
}

#[test]
fn test_ir_serializes_to_json() {
    let node: Node<u32> = Node::new(3)
        .with(Component::Named(Name::Eq))
        .with(Component::HasValueReference(
            mql_analyzer::ir::ValueReference::Constant {
                source:     4,
                value:      Value::Int32(1994),
                value_type: BsonType::Int32
            }
        ));

    let json = serde_json::to_value(&node).expect("serializable");
    assert!(json.to_string().contains("1994"));
}
