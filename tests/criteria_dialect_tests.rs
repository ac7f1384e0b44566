use mql_analyzer::{
    config::ResolverConfig,
    dialects::{DialectParser, criteria::FluentCriteriaDialect},
    ir::{
        BsonType, CollectionReference, CommandType, FieldReference, Name, Value, ValueReference
    },
    syntax::{ExprId, SourceTree, SourceTreeBuilder, TypeDescriptor}
};
use pretty_assertions::assert_eq;

const TEMPLATE_FQN: &str = "org.springframework.data.mongodb.core.MongoTemplate";

fn dialect() -> FluentCriteriaDialect {
    FluentCriteriaDialect::new(ResolverConfig::default())
}

fn template(b: &mut SourceTreeBuilder) -> ExprId {
    b.opaque(Some(TypeDescriptor::named(TEMPLATE_FQN)))
}

#[test]
fn test_where_is_chain_parses_to_eq_filter() {
    let mut b = SourceTree::builder();
    let tpl = template(&mut b);
    let field = b.string("title");
    let where_call = b.static_call("Criteria", "where", vec![field]);
    let value = b.string("Dune");
    let is_call = b.call(Some(where_call), "is", vec![value]);
    let query = b.static_call("Query", "query", vec![is_call]);
    let book = b.class("Book");
    let book_ref = b.class_ref(book);
    let find = b.call(Some(tpl), "find", vec![query, book_ref]);
    let tree = b.finish();

    let d = dialect();
    assert!(d.is_candidate_for_query(&tree, find));

    let parsed = d.parse(&tree, find);
    assert_eq!(parsed.command(), Some(CommandType::FindMany));

    let filters = parsed.filter_children();
    assert_eq!(filters.len(), 1);
    assert_eq!(filters[0].operation_name(), Some(Name::Eq));
    assert_eq!(
        filters[0]
            .field_reference()
            .and_then(FieldReference::field_name),
        Some("title")
    );
    assert_eq!(
        filters[0]
            .value_reference()
            .and_then(ValueReference::constant_value),
        Some(&Value::string("Dune"))
    );
}

#[test]
fn test_chained_and_produces_second_predicate() {
    let mut b = SourceTree::builder();
    let tpl = template(&mut b);
    let title = b.string("title");
    let where_call = b.static_call("Criteria", "where", vec![title]);
    let dune = b.string("Dune");
    let is_call = b.call(Some(where_call), "is", vec![dune]);
    let year = b.string("year");
    let and_call = b.call(Some(is_call), "and", vec![year]);
    let low = b.int32(1960);
    let gt_call = b.call(Some(and_call), "gt", vec![low]);
    let query = b.static_call("Query", "query", vec![gt_call]);
    let book = b.class("Book");
    let book_ref = b.class_ref(book);
    let find = b.call(Some(tpl), "find", vec![query, book_ref]);
    let tree = b.finish();

    let parsed = dialect().parse(&tree, find);
    let filters = parsed.filter_children();
    assert_eq!(filters.len(), 2);
    assert_eq!(filters[0].operation_name(), Some(Name::Eq));
    assert_eq!(filters[1].operation_name(), Some(Name::Gt));
    assert_eq!(
        filters[1]
            .field_reference()
            .and_then(FieldReference::field_name),
        Some("year")
    );
}

#[test]
fn test_or_operator_wraps_sub_chains() {
    let mut b = SourceTree::builder();
    let tpl = template(&mut b);

    let left_field = b.string("genre");
    let left_where = b.static_call("Criteria", "where", vec![left_field]);
    let fantasy = b.string("Fantasy");
    let left_is = b.call(Some(left_where), "is", vec![fantasy]);

    let right_field = b.string("genre");
    let right_where = b.static_call("Criteria", "where", vec![right_field]);
    let sci_fi = b.string("Sci-Fi");
    let right_is = b.call(Some(right_where), "is", vec![sci_fi]);

    let root_field = b.string("inPrint");
    let root_where = b.static_call("Criteria", "where", vec![root_field]);
    let yes = b.boolean(true);
    let root_is = b.call(Some(root_where), "is", vec![yes]);
    let or_call = b.call(Some(root_is), "orOperator", vec![left_is, right_is]);

    let query = b.static_call("Query", "query", vec![or_call]);
    let book = b.class("Book");
    let book_ref = b.class_ref(book);
    let find = b.call(Some(tpl), "find", vec![query, book_ref]);
    let tree = b.finish();

    let parsed = dialect().parse(&tree, find);
    let filters = parsed.filter_children();
    assert_eq!(filters.len(), 2);
    assert_eq!(filters[0].operation_name(), Some(Name::Eq));

    let or_node = &filters[1];
    assert_eq!(or_node.operation_name(), Some(Name::Or));
    assert_eq!(or_node.filter_children().len(), 2);
}

#[test]
fn test_template_command_table() {
    let cases = [
        ("findAllAndRemove", CommandType::DeleteMany),
        ("findAndModify", CommandType::FindOneAndUpdate),
        ("count", CommandType::CountDocuments),
        ("updateMulti", CommandType::UpdateMany),
        ("save", CommandType::Upsert),
    ];

    for (method, expected) in cases {
        let mut b = SourceTree::builder();
        let tpl = template(&mut b);
        let field = b.string("title");
        let where_call = b.static_call("Criteria", "where", vec![field]);
        let value = b.string("Dune");
        let is_call = b.call(Some(where_call), "is", vec![value]);
        let query = b.static_call("Query", "query", vec![is_call]);
        let op = b.call(Some(tpl), method, vec![query]);
        let tree = b.finish();

        let parsed = dialect().parse(&tree, op);
        assert_eq!(parsed.command(), Some(expected), "method {}", method);
    }
}

#[test]
fn test_collection_from_entity_class_mapping() {
    let mut b = SourceTree::builder();
    let tpl = template(&mut b);
    let field = b.string("title");
    let where_call = b.static_call("Criteria", "where", vec![field]);
    let value = b.string("Dune");
    let is_call = b.call(Some(where_call), "is", vec![value]);
    let query = b.static_call("Query", "query", vec![is_call]);
    let book = b.class("Book");
    b.set_mapped_collection(book, "books");
    let book_ref = b.class_ref(book);
    let find = b.call(Some(tpl), "find", vec![query, book_ref]);
    let tree = b.finish();

    let parsed = dialect().parse(&tree, find);
    match parsed.collection_reference().expect("reference") {
        CollectionReference::OnlyCollection {
            collection, ..
        } => assert_eq!(collection.as_str(), "books"),
        other => panic!("expected OnlyCollection, got {:?}", other)
    }
}

#[test]
fn test_collection_from_default_entity_name() {
    let mut b = SourceTree::builder();
    let tpl = template(&mut b);
    let field = b.string("title");
    let where_call = b.static_call("Criteria", "where", vec![field]);
    let value = b.string("Dune");
    let is_call = b.call(Some(where_call), "is", vec![value]);
    let query = b.static_call("Query", "query", vec![is_call]);
    let book = b.class("Book");
    let book_ref = b.class_ref(book);
    let find = b.call(Some(tpl), "find", vec![query, book_ref]);
    let tree = b.finish();

    let parsed = dialect().parse(&tree, find);
    assert_eq!(
        parsed
            .collection_reference()
            .and_then(CollectionReference::collection),
        Some("book")
    );
}

#[test]
fn test_explicit_collection_name_argument_wins() {
    let mut b = SourceTree::builder();
    let tpl = template(&mut b);
    let field = b.string("title");
    let where_call = b.static_call("Criteria", "where", vec![field]);
    let value = b.string("Dune");
    let is_call = b.call(Some(where_call), "is", vec![value]);
    let query = b.static_call("Query", "query", vec![is_call]);
    let name = b.string("legacy_books");
    let remove = b.call(Some(tpl), "remove", vec![query, name]);
    let tree = b.finish();

    let parsed = dialect().parse(&tree, remove);
    assert_eq!(parsed.command(), Some(CommandType::DeleteMany));
    assert_eq!(
        parsed
            .collection_reference()
            .and_then(CollectionReference::collection),
        Some("legacy_books")
    );
}

#[test]
fn test_membership_operator_in_criteria_chain() {
    let mut b = SourceTree::builder();
    let tpl = template(&mut b);
    let field = b.string("genre");
    let where_call = b.static_call("Criteria", "where", vec![field]);
    let fantasy = b.string("Fantasy");
    let sci_fi = b.string("Sci-Fi");
    let in_call = b.call(Some(where_call), "in", vec![fantasy, sci_fi]);
    let query = b.static_call("Query", "query", vec![in_call]);
    let book = b.class("Book");
    let book_ref = b.class_ref(book);
    let find = b.call(Some(tpl), "find", vec![query, book_ref]);
    let tree = b.finish();

    let parsed = dialect().parse(&tree, find);
    let membership = &parsed.filter_children()[0];
    assert_eq!(membership.operation_name(), Some(Name::In));
    match membership.value_reference().expect("value") {
        ValueReference::Constant {
            value_type, ..
        } => assert_eq!(
            *value_type,
            BsonType::array(BsonType::nullable(BsonType::String))
        ),
        other => panic!("expected constant membership array, got {:?}", other)
    }
}

#[test]
fn test_aggregation_match_group_pipeline() {
    let mut b = SourceTree::builder();
    let tpl = template(&mut b);

    let field = b.string("inPrint");
    let where_call = b.static_call("Criteria", "where", vec![field]);
    let yes = b.boolean(true);
    let is_call = b.call(Some(where_call), "is", vec![yes]);
    let match_stage = b.static_call("Aggregation", "match", vec![is_call]);

    let genre = b.string("genre");
    let group_root = b.static_call("Aggregation", "group", vec![genre]);
    let rating = b.string("$rating");
    let avg_call = b.call(Some(group_root), "avg", vec![rating]);
    let avg_name = b.string("avgRating");
    let as_call = b.call(Some(avg_call), "as", vec![avg_name]);

    let agg = b.static_call("Aggregation", "newAggregation", vec![match_stage, as_call]);
    let book = b.class("Book");
    let book_ref = b.class_ref(book);
    let aggregate = b.call(Some(tpl), "aggregate", vec![agg, book_ref]);
    let tree = b.finish();

    let parsed = dialect().parse(&tree, aggregate);
    assert_eq!(parsed.command(), Some(CommandType::Aggregate));

    let pipeline = parsed.aggregation_stages();
    assert_eq!(pipeline.len(), 2);

    assert_eq!(pipeline[0].operation_name(), Some(Name::Match));
    assert_eq!(pipeline[0].filter_children().len(), 1);

    let group = &pipeline[1];
    assert_eq!(group.operation_name(), Some(Name::Group));
    assert_eq!(
        group
            .field_reference()
            .and_then(FieldReference::field_name),
        Some("_id")
    );
    let accumulated = group.accumulated_fields();
    assert_eq!(accumulated.len(), 1);
    assert_eq!(accumulated[0].operation_name(), Some(Name::Avg));
    assert_eq!(
        accumulated[0]
            .field_reference()
            .and_then(FieldReference::field_name),
        Some("avgRating")
    );
}

#[test]
fn test_unknown_accumulator_keeps_its_slot() {
    let mut b = SourceTree::builder();
    let tpl = template(&mut b);
    let group_root = b.static_call("Aggregation", "group", vec![]);
    let accumulate = b.call(Some(group_root), "accumulate", vec![]);
    let agg = b.static_call("Aggregation", "newAggregation", vec![accumulate]);
    let book = b.class("Book");
    let book_ref = b.class_ref(book);
    let aggregate = b.call(Some(tpl), "aggregate", vec![agg, book_ref]);
    let tree = b.finish();

    let parsed = dialect().parse(&tree, aggregate);
    let pipeline = parsed.aggregation_stages();
    assert_eq!(pipeline.len(), 1, "the stage is never dropped");

    let group = &pipeline[0];
    assert_eq!(group.operation_name(), Some(Name::Group));
    let accumulated = group.accumulated_fields();
    assert_eq!(accumulated.len(), 1);
    assert_eq!(accumulated[0].operation_name(), Some(Name::Unknown));
}

#[test]
fn test_unknown_stage_is_preserved_in_pipeline_order() {
    let mut b = SourceTree::builder();
    let tpl = template(&mut b);

    let field = b.string("year");
    let unwind = b.static_call("Aggregation", "unwind", vec![field]);
    let mystery = b.static_call("Aggregation", "facet", vec![]);
    let three = b.int32(3);
    let limit = b.static_call("Aggregation", "limit", vec![three]);

    let agg = b.static_call("Aggregation", "newAggregation", vec![unwind, mystery, limit]);
    let book = b.class("Book");
    let book_ref = b.class_ref(book);
    let aggregate = b.call(Some(tpl), "aggregate", vec![agg, book_ref]);
    let tree = b.finish();

    let parsed = dialect().parse(&tree, aggregate);
    let pipeline = parsed.aggregation_stages();
    assert_eq!(pipeline.len(), 3);
    assert_eq!(pipeline[0].operation_name(), Some(Name::Unwind));
    assert_eq!(pipeline[1].operation_name(), Some(Name::Unknown));
    assert_eq!(pipeline[2].operation_name(), Some(Name::Limit));
    assert_eq!(pipeline[2].limit(), Some(3));
}

#[test]
fn test_criteria_chain_built_in_helper_matches() {
    let mut b = SourceTree::builder();
    let helper = b.private_method(None, "inPrint");
    b.enter_method(helper);
    let field = b.string("inPrint");
    let where_call = b.static_call("Criteria", "where", vec![field]);
    let yes = b.boolean(true);
    let is_call = b.call(Some(where_call), "is", vec![yes]);
    b.exit_method();
    b.add_return(helper, is_call);

    let tpl = template(&mut b);
    let helper_call = b.call(None, "inPrint", vec![]);
    b.set_target(helper_call, helper);
    let query = b.static_call("Query", "query", vec![helper_call]);
    let book = b.class("Book");
    let book_ref = b.class_ref(book);
    let find = b.call(Some(tpl), "find", vec![query, book_ref]);
    let tree = b.finish();

    let parsed = dialect().parse(&tree, find);
    let filters = parsed.filter_children();
    assert_eq!(filters.len(), 1);
    assert_eq!(filters[0].operation_name(), Some(Name::Eq));
}
