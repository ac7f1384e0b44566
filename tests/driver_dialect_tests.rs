use mql_analyzer::{
    config::ResolverConfig,
    dialects::{DialectParser, driver::DriverBuilderDialect},
    ir::{
        BsonType, CommandType, FieldReference, Name, Value, ValueReference
    },
    namespace::{COLLECTION_FQN, DATABASE_FQN, MONGO_CLIENT_FQN},
    syntax::{ExprId, SourceTree, SourceTreeBuilder, TypeDescriptor}
};
use pretty_assertions::assert_eq;

fn dialect() -> DriverBuilderDialect {
    DriverBuilderDialect::new(ResolverConfig::default())
}

fn collection(b: &mut SourceTreeBuilder) -> ExprId {
    let client = b.opaque(Some(TypeDescriptor::named(MONGO_CLIENT_FQN)));
    let db = b.string("prod");
    let database = b.typed_call(
        Some(client),
        "database",
        vec![db],
        TypeDescriptor::named(DATABASE_FQN)
    );
    let coll = b.string("books");
    b.typed_call(
        Some(database),
        "collection",
        vec![coll],
        TypeDescriptor::named(COLLECTION_FQN)
    )
}

#[test]
fn test_eq_filter_with_runtime_object_id_parameter() {
    let mut b = SourceTree::builder();
    let method = b.method(None, "findById");
    b.param(
        method,
        "id",
        Some(TypeDescriptor::named("org.bson.types.ObjectId"))
    );
    b.enter_method(method);
    let coll = collection(&mut b);
    let field = b.string("_id");
    let id = b.read_param(method, 0);
    let filter = b.static_call("Filters", "eq", vec![field, id]);
    let find = b.call(Some(coll), "find", vec![filter]);
    b.exit_method();
    let tree = b.finish();

    let parsed = dialect().parse(&tree, find);
    assert_eq!(parsed.command(), Some(CommandType::FindMany));

    let eq = &parsed.filter_children()[0];
    assert_eq!(eq.operation_name(), Some(Name::Eq));
    assert_eq!(
        eq.field_reference().and_then(FieldReference::field_name),
        Some("_id")
    );
    match eq.value_reference().expect("value") {
        ValueReference::Runtime {
            runtime_type, ..
        } => assert_eq!(*runtime_type, BsonType::nullable(BsonType::ObjectId)),
        other => panic!("expected runtime value, got {:?}", other)
    }
}

#[test]
fn test_in_filter_with_literal_varargs() {
    let mut b = SourceTree::builder();
    let coll = collection(&mut b);
    let genre = b.string("genre");
    let fantasy = b.string("Fantasy");
    let sci_fi = b.string("Sci-Fi");
    let filter = b.static_call("Filters", "in", vec![genre, fantasy, sci_fi]);
    let find = b.call(Some(coll), "find", vec![filter]);
    let tree = b.finish();

    let parsed = dialect().parse(&tree, find);
    let membership = &parsed.filter_children()[0];
    assert_eq!(membership.operation_name(), Some(Name::In));
    match membership.value_reference().expect("value") {
        ValueReference::Constant {
            value,
            value_type,
            ..
        } => {
            assert_eq!(
                *value,
                Value::Array(vec![Value::string("Fantasy"), Value::string("Sci-Fi")])
            );
            assert_eq!(
                *value_type,
                BsonType::array(BsonType::nullable(BsonType::String))
            );
        }
        other => panic!("expected constant array, got {:?}", other)
    }
}

#[test]
fn test_single_argument_eq_targets_the_document_key() {
    let mut b = SourceTree::builder();
    let coll = collection(&mut b);
    let value = b.int32(42);
    let filter = b.static_call("Filters", "eq", vec![value]);
    let find = b.call(Some(coll), "find", vec![filter]);
    let tree = b.finish();

    let parsed = dialect().parse(&tree, find);
    let eq = &parsed.filter_children()[0];
    assert_eq!(
        eq.field_reference().and_then(FieldReference::field_name),
        Some("_id")
    );
    assert_eq!(
        eq.value_reference().and_then(ValueReference::constant_value),
        Some(&Value::Int32(42))
    );
}

#[test]
fn test_exists_value_is_inferred_from_operator_semantics() {
    let mut b = SourceTree::builder();
    let coll = collection(&mut b);
    let field = b.string("reviews");
    let filter = b.static_call("Filters", "exists", vec![field]);
    let find = b.call(Some(coll), "find", vec![filter]);
    let tree = b.finish();

    let parsed = dialect().parse(&tree, find);
    let exists = &parsed.filter_children()[0];
    assert_eq!(exists.operation_name(), Some(Name::Exists));
    match exists.value_reference().expect("value") {
        ValueReference::Inferred {
            value,
            value_type,
            ..
        } => {
            assert_eq!(*value, Value::Boolean(true));
            assert_eq!(*value_type, BsonType::Boolean);
        }
        other => panic!("expected inferred value, got {:?}", other)
    }
}

#[test]
fn test_nested_logical_filters_through_local_variables() {
    let mut b = SourceTree::builder();
    let coll = collection(&mut b);

    let year_field = b.string("year");
    let year_value = b.int32(1994);
    let year_eq = b.static_call("Filters", "eq", vec![year_field, year_value]);
    let eq_local = b.local("byYear", Some(year_eq));

    let name_field = b.string("name");
    let name_value = b.string("something");
    let name_eq = b.static_call("Filters", "eq", vec![name_field, name_value]);

    let eq_read = b.read_local(eq_local);
    let and = b.static_call("Filters", "and", vec![eq_read, name_eq]);
    let find = b.call(Some(coll), "find", vec![and]);
    let tree = b.finish();

    let parsed = dialect().parse(&tree, find);
    let and_node = &parsed.filter_children()[0];
    assert_eq!(and_node.operation_name(), Some(Name::And));
    assert_eq!(and_node.filter_children().len(), 2);
    assert_eq!(
        and_node.filter_children()[0].operation_name(),
        Some(Name::Eq)
    );
}

#[test]
fn test_filter_built_in_private_helper_matches() {
    let mut b = SourceTree::builder();
    let helper = b.private_method(None, "byYear");
    b.enter_method(helper);
    let field = b.string("year");
    let value = b.int32(2001);
    let filter = b.static_call("Filters", "eq", vec![field, value]);
    b.exit_method();
    b.add_return(helper, filter);

    let coll = collection(&mut b);
    let helper_call = b.call(None, "byYear", vec![]);
    b.set_target(helper_call, helper);
    let find = b.call(Some(coll), "find", vec![helper_call]);
    let tree = b.finish();

    let parsed = dialect().parse(&tree, find);
    assert_eq!(parsed.filter_children().len(), 1);
    assert_eq!(
        parsed.filter_children()[0].operation_name(),
        Some(Name::Eq)
    );
}

#[test]
fn test_unknown_filter_shape_becomes_unknown_node() {
    let mut b = SourceTree::builder();
    let coll = collection(&mut b);
    let field = b.string("flags");
    let filter = b.static_call("Filters", "bitsAllClear", vec![field]);
    let find = b.call(Some(coll), "find", vec![filter]);
    let tree = b.finish();

    let parsed = dialect().parse(&tree, find);
    let unknown = &parsed.filter_children()[0];
    assert_eq!(unknown.operation_name(), Some(Name::Unknown));
}

#[test]
fn test_update_combine_with_pull_filter() {
    let mut b = SourceTree::builder();
    let coll = collection(&mut b);

    let id_field = b.string("_id");
    let id_value = b.int32(7);
    let filter = b.static_call("Filters", "eq", vec![id_field, id_value]);

    let set_field = b.string("title");
    let set_value = b.string("Dune");
    let set = b.static_call("Updates", "set", vec![set_field, set_value]);

    let pull_field = b.string("reviews");
    let score_field = b.string("score");
    let score_value = b.int32(1);
    let pull_filter = b.static_call("Filters", "eq", vec![score_field, score_value]);
    let pull = b.static_call("Updates", "pull", vec![pull_field, pull_filter]);

    let combine = b.static_call("Updates", "combine", vec![set, pull]);
    let update_call = b.call(Some(coll), "updateOne", vec![filter, combine]);
    let tree = b.finish();

    let parsed = dialect().parse(&tree, update_call);
    assert_eq!(parsed.command(), Some(CommandType::UpdateOne));
    assert_eq!(parsed.filter_children().len(), 1);

    let combine_node = &parsed.update_children()[0];
    assert_eq!(combine_node.operation_name(), Some(Name::Combine));
    let children = combine_node.update_children();
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].operation_name(), Some(Name::Set));
    assert_eq!(children[1].operation_name(), Some(Name::Pull));
    assert_eq!(children[1].filter_children().len(), 1);
}

#[test]
fn test_unset_update_carries_only_field() {
    let mut b = SourceTree::builder();
    let coll = collection(&mut b);
    let filter_field = b.string("_id");
    let filter_value = b.int32(1);
    let filter = b.static_call("Filters", "eq", vec![filter_field, filter_value]);
    let field = b.string("draft");
    let unset = b.static_call("Updates", "unset", vec![field]);
    let update_call = b.call(Some(coll), "updateMany", vec![filter, unset]);
    let tree = b.finish();

    let parsed = dialect().parse(&tree, update_call);
    let unset_node = &parsed.update_children()[0];
    assert_eq!(unset_node.operation_name(), Some(Name::Unset));
    assert_eq!(
        unset_node
            .field_reference()
            .and_then(FieldReference::field_name),
        Some("draft")
    );
    assert!(unset_node.value_reference().is_none());
}

#[test]
fn test_aggregation_pipeline_keeps_stage_order_and_unknown_stages() {
    let mut b = SourceTree::builder();
    let coll = collection(&mut b);

    let year_field = b.string("year");
    let year_value = b.int32(1994);
    let eq = b.static_call("Filters", "eq", vec![year_field, year_value]);
    let match_stage = b.static_call("Aggregates", "match", vec![eq]);

    let facet_stage = b.static_call("Aggregates", "facet", vec![]);

    let limit_value = b.int32(10);
    let limit_stage = b.static_call("Aggregates", "limit", vec![limit_value]);

    let stages = b.list(vec![match_stage, facet_stage, limit_stage]);
    let aggregate = b.call(Some(coll), "aggregate", vec![stages]);
    let tree = b.finish();

    let parsed = dialect().parse(&tree, aggregate);
    assert_eq!(parsed.command(), Some(CommandType::Aggregate));

    let pipeline = parsed.aggregation_stages();
    assert_eq!(pipeline.len(), 3);
    assert_eq!(pipeline[0].operation_name(), Some(Name::Match));
    assert_eq!(pipeline[0].filter_children().len(), 1);
    assert_eq!(pipeline[1].operation_name(), Some(Name::Unknown));
    assert_eq!(pipeline[2].operation_name(), Some(Name::Limit));
    assert_eq!(pipeline[2].limit(), Some(10));
}

#[test]
fn test_group_stage_with_accumulators() {
    let mut b = SourceTree::builder();
    let coll = collection(&mut b);

    let key = b.string("$genre");
    let total_name = b.string("total");
    let rating_path = b.string("$rating");
    let sum = b.static_call("Accumulators", "sum", vec![total_name, rating_path]);
    let group_stage = b.static_call("Aggregates", "group", vec![key, sum]);
    let stages = b.list(vec![group_stage]);
    let aggregate = b.call(Some(coll), "aggregate", vec![stages]);
    let tree = b.finish();

    let parsed = dialect().parse(&tree, aggregate);
    let group = &parsed.aggregation_stages()[0];
    assert_eq!(group.operation_name(), Some(Name::Group));
    assert_eq!(
        group
            .field_reference()
            .and_then(FieldReference::field_name),
        Some("_id")
    );

    let accumulated = group.accumulated_fields();
    assert_eq!(accumulated.len(), 1);
    assert_eq!(accumulated[0].operation_name(), Some(Name::Sum));
    assert_eq!(
        accumulated[0]
            .field_reference()
            .and_then(FieldReference::field_name),
        Some("total")
    );
}

#[test]
fn test_projection_and_sort_stages() {
    let mut b = SourceTree::builder();
    let coll = collection(&mut b);

    let title = b.string("title");
    let year = b.string("year");
    let include = b.static_call("Projections", "include", vec![title, year]);
    let project_stage = b.static_call("Aggregates", "project", vec![include]);

    let rating = b.string("rating");
    let descending = b.static_call("Sorts", "descending", vec![rating]);
    let sort_stage = b.static_call("Aggregates", "sort", vec![descending]);

    let stages = b.list(vec![project_stage, sort_stage]);
    let aggregate = b.call(Some(coll), "aggregate", vec![stages]);
    let tree = b.finish();

    let parsed = dialect().parse(&tree, aggregate);
    let pipeline = parsed.aggregation_stages();

    let projections = pipeline[0].projection_children();
    assert_eq!(projections.len(), 2);
    assert_eq!(projections[0].operation_name(), Some(Name::Include));

    let sorts = pipeline[1].sort_children();
    assert_eq!(sorts.len(), 1);
    assert_eq!(sorts[0].operation_name(), Some(Name::Descending));
    match sorts[0].value_reference().expect("value") {
        ValueReference::Inferred {
            value, ..
        } => assert_eq!(*value, Value::Int32(-1)),
        other => panic!("expected inferred sort direction, got {:?}", other)
    }
}

#[test]
fn test_cursor_sort_and_limit_metadata() {
    let mut b = SourceTree::builder();
    let coll = collection(&mut b);
    let find = b.call(Some(coll), "find", vec![]);
    let year = b.string("year");
    let ascending = b.static_call("Sorts", "ascending", vec![year]);
    let sorted = b.call(Some(find), "sort", vec![ascending]);
    let limit_value = b.int32(25);
    let limited = b.call(Some(sorted), "limit", vec![limit_value]);
    let tree = b.finish();

    let d = dialect();
    let attachment = d.attachment(&tree, limited).expect("attachment");
    assert_eq!(attachment, find);

    // the caller hands the full chain; metadata comes from the modifiers
    let parsed = d.parse(&tree, limited);
    assert_eq!(parsed.limit(), Some(25));
    assert_eq!(parsed.sort_children().len(), 1);
    assert_eq!(
        parsed.sort_children()[0].operation_name(),
        Some(Name::Ascending)
    );
}

#[test]
fn test_find_first_parses_filter_from_inner_call() {
    let mut b = SourceTree::builder();
    let coll = collection(&mut b);
    let field = b.string("title");
    let value = b.string("Dune");
    let filter = b.static_call("Filters", "eq", vec![field, value]);
    let find = b.call(Some(coll), "find", vec![filter]);
    let first = b.call(Some(find), "first", vec![]);
    let tree = b.finish();

    let d = dialect();
    assert!(d.is_candidate_for_query(&tree, first));
    assert_eq!(d.attachment(&tree, first), Some(first));

    let parsed = d.parse(&tree, first);
    assert_eq!(parsed.command(), Some(CommandType::FindOne));
    assert_eq!(parsed.source(), first);
    assert_eq!(parsed.filter_children().len(), 1);
}

#[test]
fn test_repository_wrapper_method_is_looked_through() {
    let mut b = SourceTree::builder();
    let repo = b.class("BookRepository");
    let wrapped = b.method(Some(repo), "allByYear");
    b.enter_method(wrapped);
    let coll = collection(&mut b);
    let field = b.string("year");
    let value = b.int32(1960);
    let filter = b.static_call("Filters", "eq", vec![field, value]);
    let find = b.call(Some(coll), "find", vec![filter]);
    b.exit_method();
    b.add_return(wrapped, find);

    let receiver = b.opaque(None);
    let outer = b.call(Some(receiver), "allByYear", vec![]);
    b.set_target(outer, wrapped);
    let tree = b.finish();

    let parsed = dialect().parse(&tree, outer);
    assert_eq!(parsed.command(), Some(CommandType::FindMany));
    assert_eq!(parsed.filter_children().len(), 1);
}
