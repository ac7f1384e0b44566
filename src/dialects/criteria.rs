//! Matcher for the fluent criteria dialect.
//!
//! Recognizes chained instance calls of the mapping framework's criteria
//! API — `where("field").is(value).and("other").gt(low)` wrapped in
//! `query(..)` and executed through a template operation — plus the fluent
//! aggregation form `newAggregation(match(..), group(..).sum(..).as(..))`.
//! The collection target comes from the mapped entity class or an explicit
//! collection-name argument, so only `OnlyCollection` references are ever
//! produced: the database lives in external configuration this engine does
//! not read.

use compact_str::CompactString;

use crate::{
    config::ResolverConfig,
    dialects::DialectParser,
    ir::{
        BsonType, CollectionReference, CommandType, Component, DialectName, FieldReference, Name,
        Node, Value, ValueReference
    },
    resolve::Resolver,
    syntax::{ClassId, ExprId, ExprKind, SourceTree}
};

const CRITERIA_FQN: &str = "org.springframework.data.mongodb.core.query.Criteria";
const QUERY_FQN: &str = "org.springframework.data.mongodb.core.query.Query";
const AGGREGATION_FQN: &str = "org.springframework.data.mongodb.core.aggregation.Aggregation";

/// Criteria chain methods that name a field and hand off to a value
/// operator.
const FIELD_STEPS: &[&str] = &["where", "and"];

/// Criteria chain methods recognized as part of a chain even when the
/// front end did not resolve their declaring class.
const CRITERIA_METHODS: &[&str] = &[
    "where",
    "and",
    "is",
    "ne",
    "gt",
    "gte",
    "lt",
    "lte",
    "in",
    "nin",
    "exists",
    "regex",
    "size",
    "all",
    "elemMatch",
    "not",
    "andOperator",
    "orOperator",
    "norOperator",
];

const ACCUMULATOR_STEPS: &[(&str, Name)] = &[
    ("sum", Name::Sum),
    ("avg", Name::Avg),
    ("first", Name::First),
    ("last", Name::Last),
    ("max", Name::Max),
    ("min", Name::Min),
    ("push", Name::Push),
    ("addToSet", Name::AddToSet),
];

const STAGE_ROOTS: &[&str] = &[
    "match", "project", "sort", "group", "limit", "unwind", "addFields",
];

pub struct FluentCriteriaDialect {
    limits: ResolverConfig
}

impl FluentCriteriaDialect {
    pub fn new(limits: ResolverConfig) -> Self {
        Self {
            limits
        }
    }

    fn resolver<'a>(&self, tree: &'a SourceTree) -> Resolver<'a> {
        Resolver::new(tree, self.limits.clone())
    }
}

impl DialectParser for FluentCriteriaDialect {
    fn dialect(&self) -> DialectName {
        DialectName::FluentCriteria
    }

    fn is_candidate_for_query(&self, tree: &SourceTree, source: ExprId) -> bool {
        find_in_subtree(tree, source, &|t, id| {
            is_where_call(t, id) || is_new_aggregation_call(t, id)
        })
        .is_some()
    }

    fn attachment(&self, tree: &SourceTree, source: ExprId) -> Option<ExprId> {
        let anchor = find_in_subtree(tree, source, &|t, id| is_where_call(t, id))
            .or_else(|| find_in_subtree(tree, source, &|t, id| is_new_aggregation_call(t, id)))?;
        Some(chain_top(tree, source, anchor))
    }

    fn parse(&self, tree: &SourceTree, source: ExprId) -> Node<ExprId> {
        let source = tree.meaningful(source);
        let resolver = self.resolver(tree);

        let template_call = self.find_template_call(tree, source);
        let command = template_call
            .map(|call| template_command(tree, call))
            .unwrap_or(CommandType::Unknown);

        let mut node = Node::new(source)
            .with(Component::HasSourceDialect(DialectName::FluentCriteria))
            .with(Component::IsCommand(command))
            .with(Component::HasCollectionReference(
                template_call
                    .map(|call| self.extract_collection(&resolver, call))
                    .unwrap_or(CollectionReference::Unknown)
            ));

        if command == CommandType::Aggregate {
            let stages = template_call
                .and_then(|call| tree.arguments(call).first().copied())
                .and_then(|arg| self.parse_aggregation(&resolver, arg))
                .unwrap_or_default();
            return node.with(Component::HasAggregation(stages));
        }

        // the filter is the criteria chain inside the query(..) wrapper,
        // or a bare chain when no template call encloses it
        let criteria_top = template_call
            .and_then(|call| tree.arguments(call).first().copied())
            .and_then(|arg| self.unwrap_query(&resolver, arg))
            .or_else(|| {
                find_in_subtree(tree, source, &|t, id| is_where_call(t, id))
                    .map(|anchor| chain_top(tree, source, anchor))
            });

        if let Some(top) = criteria_top {
            node = node.with(Component::HasFilter(
                self.parse_criteria_chain(&resolver, top)
            ));
        }

        node
    }
}

impl FluentCriteriaDialect {
    fn find_template_call(&self, tree: &SourceTree, source: ExprId) -> Option<ExprId> {
        if tree
            .as_call(source)
            .is_some_and(|call| template_command_name(call.method.as_str()).is_some())
        {
            return Some(source);
        }
        find_in_subtree(tree, source, &|t, id| {
            t.as_call(id)
                .is_some_and(|call| template_command_name(call.method.as_str()).is_some())
        })
    }

    /// Unwraps `query(criteria)` / `new Query(criteria)` to the criteria
    /// chain inside.
    fn unwrap_query(&self, resolver: &Resolver<'_>, expr: ExprId) -> Option<ExprId> {
        let tree = resolver.tree();
        let wrapper = resolver.resolve_to_expr(expr, &|t, id| match t.kind(id) {
            ExprKind::Call(call) => {
                (call.method.as_str() == "query"
                    && (call.declaring_class.is_none() || t.call_declared_in(id, QUERY_FQN)))
                    || is_criteria_chain_call(t, id)
            }
            ExprKind::New(new_expr) => new_expr.class_name.as_str() == "Query",
            _ => false
        })?;

        match tree.kind(wrapper) {
            ExprKind::Call(call) if call.method.as_str() == "query" => {
                call.args.first().copied()
            }
            ExprKind::New(new_expr) => new_expr.args.first().copied(),
            // a bare criteria chain was passed without a wrapper
            _ => Some(wrapper)
        }
    }

    /// The collection target of a template operation: an explicit
    /// collection-name argument wins, then the mapped entity class.
    fn extract_collection(
        &self,
        resolver: &Resolver<'_>,
        template_call: ExprId
    ) -> CollectionReference<ExprId> {
        let tree = resolver.tree();
        let args = tree.arguments(template_call);

        if let Some(&last) = args.last()
            && args.len() >= 2
            && !matches!(tree.kind(last), ExprKind::ClassRef { .. })
            && let Some(name) = resolver.resolve_constant_string(last)
        {
            return CollectionReference::OnlyCollection {
                collection_source: Some(last),
                collection:        name
            };
        }

        for &arg in args {
            if let ExprKind::ClassRef {
                class: Some(class), ..
            } = tree.kind(arg)
            {
                return CollectionReference::OnlyCollection {
                    collection_source: Some(arg),
                    collection:        entity_collection(tree, *class)
                };
            }
        }

        CollectionReference::Unknown
    }

    // ---- criteria chains -------------------------------------------------

    /// Parses a criteria chain from its outermost call, producing one node
    /// per field/operator pair.
    fn parse_criteria_chain(&self, resolver: &Resolver<'_>, top: ExprId) -> Vec<Node<ExprId>> {
        let tree = resolver.tree();
        let calls = collect_chain(tree, top, &is_criteria_chain_call);

        let mut nodes = Vec::new();
        let mut pending_field: Option<FieldReference<ExprId>> = None;

        for call_id in calls {
            let Some(call) = tree.as_call(call_id) else {
                continue;
            };
            let args = tree.arguments(call_id).to_vec();
            let name = call.method.as_str();

            if FIELD_STEPS.contains(&name) {
                pending_field = Some(match args.first() {
                    Some(field_arg) => resolver.resolve_field_name(*field_arg),
                    None => FieldReference::Unknown
                });
                continue;
            }

            if let Some(combinator) = combinator_name(name) {
                let children = args
                    .iter()
                    .filter_map(|arg| {
                        resolver.resolve_to_expr(*arg, &|t, id| is_criteria_chain_call(t, id))
                    })
                    .flat_map(|sub_top| self.parse_criteria_chain(resolver, sub_top))
                    .collect();
                nodes.push(
                    Node::new(call_id)
                        .with(Component::Named(combinator))
                        .with(Component::HasFilter(children))
                );
                pending_field = None;
                continue;
            }

            nodes.push(self.parse_value_step(resolver, call_id, name, &args, &mut pending_field));
        }

        nodes
    }

    fn parse_value_step(
        &self,
        resolver: &Resolver<'_>,
        call_id: ExprId,
        name: &str,
        args: &[ExprId],
        pending_field: &mut Option<FieldReference<ExprId>>
    ) -> Node<ExprId> {
        // the criteria spelling for equality differs from the wire operator
        let named = match name {
            "is" => Name::Eq,
            other => Name::from_canonical(other)
        };
        let field = pending_field.take().unwrap_or(FieldReference::Unknown);

        let mut node = Node::new(call_id)
            .with(Component::Named(named))
            .with(Component::HasFieldReference(field));

        let value = match named {
            Name::In | Name::Nin => Some(resolver.membership_from_args(call_id, args)),
            _ => args.first().map(|arg| resolver.resolve_value(*arg))
        };
        if let Some(value) = value {
            node = node.with(Component::HasValueReference(value));
        }
        node
    }

    // ---- fluent aggregation ----------------------------------------------

    fn parse_aggregation(
        &self,
        resolver: &Resolver<'_>,
        pipeline_arg: ExprId
    ) -> Option<Vec<Node<ExprId>>> {
        let tree = resolver.tree();
        let new_aggregation = resolver
            .resolve_to_expr(pipeline_arg, &|t, id| is_new_aggregation_call(t, id))?;

        let stage_args = match tree.arguments(new_aggregation) {
            [single] => resolver
                .resolve_to_list_elements(*single)
                .unwrap_or_else(|| vec![*single]),
            many => many.to_vec()
        };

        Some(
            stage_args
                .into_iter()
                .filter_map(|stage| self.parse_stage(resolver, stage))
                .collect()
        )
    }

    fn parse_stage(&self, resolver: &Resolver<'_>, stage: ExprId) -> Option<Node<ExprId>> {
        let tree = resolver.tree();
        let top = resolver.resolve_to_expr(stage, &|t, id| t.as_call(id).is_some())?;

        // stage chains hang accumulators and renames off the root call
        let chain = collect_chain(tree, top, &|t, id| {
            t.as_call(id).is_some() && !is_new_aggregation_call(t, id)
        });
        let root = chain.iter().copied().find(|id| {
            tree.as_call(*id)
                .is_some_and(|call| STAGE_ROOTS.contains(&call.method.as_str()))
        });

        let Some(root) = root else {
            // a stage we do not understand still occupies its pipeline slot
            return Some(Node::new(top).with(Component::Named(Name::Unknown)));
        };
        let root_call = tree.as_call(root)?;
        let args = tree.arguments(root).to_vec();

        match root_call.method.as_str() {
            "match" => {
                let filters = args
                    .first()
                    .and_then(|arg| {
                        resolver.resolve_to_expr(*arg, &|t, id| is_criteria_chain_call(t, id))
                    })
                    .map(|criteria_top| self.parse_criteria_chain(resolver, criteria_top))
                    .unwrap_or_default();
                Some(
                    Node::new(root)
                        .with(Component::Named(Name::Match))
                        .with(Component::HasFilter(filters))
                )
            }
            "project" => Some(
                Node::new(root)
                    .with(Component::Named(Name::Project))
                    .with(Component::HasProjections(
                        self.parse_field_list(resolver, &args, Name::Include, 1)
                    ))
            ),
            "sort" => self.parse_sort_stage(resolver, root, &args),
            "group" => Some(self.parse_group_stage(resolver, root, &args, &chain)),
            "limit" => {
                let node = Node::new(root).with(Component::Named(Name::Limit));
                let limit = args
                    .first()
                    .and_then(|arg| resolver.resolve_constant(*arg))
                    .and_then(|constant| constant.value.as_i64())
                    .and_then(|value| u32::try_from(value).ok());
                Some(match limit {
                    Some(limit) => node.with(Component::HasLimit(limit)),
                    None => node
                })
            }
            "unwind" => {
                let field = args
                    .first()
                    .and_then(|arg| resolver.resolve_constant_string(*arg))
                    .map(|path| FieldReference::FromSchema {
                        source:       args[0],
                        field_name:   CompactString::from(path.trim_start_matches('$')),
                        display_name: path
                    })
                    .unwrap_or(FieldReference::Unknown);
                Some(
                    Node::new(root)
                        .with(Component::Named(Name::Unwind))
                        .with(Component::HasFieldReference(field))
                )
            }
            "addFields" => Some(self.parse_add_fields_stage(resolver, root, &chain)),
            _ => Some(Node::new(root).with(Component::Named(Name::Unknown)))
        }
    }

    /// Constant string arguments become include/sort field nodes with the
    /// structural value the operator implies.
    fn parse_field_list(
        &self,
        resolver: &Resolver<'_>,
        args: &[ExprId],
        named: Name,
        inferred: i32
    ) -> Vec<Node<ExprId>> {
        args.iter()
            .map(|&arg| match resolver.resolve_constant_string(arg) {
                Some(path) => Node::new(arg)
                    .with(Component::Named(named))
                    .with(Component::HasFieldReference(FieldReference::FromSchema {
                        source:       arg,
                        field_name:   CompactString::from(path.trim_start_matches('$')),
                        display_name: path
                    }))
                    .with(Component::HasValueReference(ValueReference::Inferred {
                        source:     arg,
                        value:      Value::Int32(inferred),
                        value_type: BsonType::Int32
                    })),
                None => Node::new(arg).with(Component::Named(Name::Unknown))
            })
            .collect()
    }

    /// `sort(direction, fields..)`: the leading argument is a direction
    /// constant, everything after names fields.
    fn parse_sort_stage(
        &self,
        resolver: &Resolver<'_>,
        root: ExprId,
        args: &[ExprId]
    ) -> Option<Node<ExprId>> {
        let direction = args
            .first()
            .and_then(|arg| resolver.resolve_constant_string(*arg));

        let (named, inferred, fields) = match direction.as_deref() {
            Some("DESC") => (Name::Descending, -1, &args[1..]),
            Some("ASC") => (Name::Ascending, 1, &args[1..]),
            _ => (Name::Ascending, 1, args)
        };

        Some(
            Node::new(root)
                .with(Component::Named(Name::Sort))
                .with(Component::HasSorts(
                    self.parse_field_list(resolver, fields, named, inferred)
                ))
        )
    }

    /// `group(fields..)` with chained accumulators, each optionally
    /// renamed by a following `as(..)` call.
    fn parse_group_stage(
        &self,
        resolver: &Resolver<'_>,
        root: ExprId,
        args: &[ExprId],
        chain: &[ExprId]
    ) -> Node<ExprId> {
        let tree = resolver.tree();

        // the _id of the produced documents is implied by the stage, not
        // written in code
        let id_value = match args {
            [] => ValueReference::Constant {
                source:     root,
                value:      Value::Null,
                value_type: BsonType::Null
            },
            [single] => resolver.field_expression_as_value(*single),
            many => ValueReference::Computed {
                source:   root,
                computed: crate::ir::ComputedType {
                    base_type:  BsonType::Any,
                    expression: Box::new(Node::new(root).with(Component::HasProjections(
                        self.parse_field_list(resolver, many, Name::Include, 1)
                    )))
                }
            }
        };

        let mut accumulated = Vec::new();
        let mut position = chain.iter().position(|id| *id == root).map(|p| p + 1).unwrap_or(0);
        while position < chain.len() {
            let call_id = chain[position];
            position += 1;
            let Some(call) = tree.as_call(call_id) else {
                continue;
            };
            if call.method.as_str() == "as" {
                continue;
            }

            let accumulator = ACCUMULATOR_STEPS
                .iter()
                .find(|(spelling, _)| *spelling == call.method.as_str())
                .map(|(_, name)| *name);

            let Some(name) = accumulator else {
                // unrecognized chained call in accumulator position
                accumulated.push(Node::new(call_id).with(Component::Named(Name::Unknown)));
                continue;
            };

            let value = tree
                .arguments(call_id)
                .first()
                .map(|arg| resolver.field_expression_as_value(*arg))
                .unwrap_or(ValueReference::Unknown);

            // the rename, when present, is the directly following `as(..)`
            let rename = chain.get(position).and_then(|next| {
                let next_call = tree.as_call(*next)?;
                if next_call.method.as_str() != "as" {
                    return None;
                }
                let key = tree.arguments(*next).first().copied()?;
                resolver
                    .resolve_constant_string(key)
                    .map(|field_name| (key, field_name))
            });

            let field = match rename {
                Some((key, field_name)) => FieldReference::Computed {
                    source: key,
                    field_name,
                    expression: Box::new(
                        Node::new(call_id).with(Component::HasValueReference(value.clone()))
                    )
                },
                None => FieldReference::Unknown
            };

            accumulated.push(
                Node::new(call_id)
                    .with(Component::Named(name))
                    .with(Component::HasFieldReference(field))
                    .with(Component::HasValueReference(value))
            );
        }

        Node::new(root)
            .with(Component::Named(Name::Group))
            .with(Component::HasFieldReference(FieldReference::inferred(
                root, "_id"
            )))
            .with(Component::HasValueReference(id_value))
            .with(Component::HasAccumulatedFields(accumulated))
    }

    /// `addFields().addFieldWithValue(name, value)..build()`.
    fn parse_add_fields_stage(
        &self,
        resolver: &Resolver<'_>,
        root: ExprId,
        chain: &[ExprId]
    ) -> Node<ExprId> {
        let tree = resolver.tree();
        let mut added = Vec::new();

        let start = chain.iter().position(|id| *id == root).map(|p| p + 1).unwrap_or(0);
        for &call_id in &chain[start..] {
            let Some(call) = tree.as_call(call_id) else {
                continue;
            };
            match call.method.as_str() {
                "build" => {}
                "addFieldWithValue" | "addFieldWithValueOf" => {
                    let args = tree.arguments(call_id);
                    let value = args
                        .get(1)
                        .map(|arg| resolver.resolve_value(*arg))
                        .unwrap_or(ValueReference::Unknown);
                    let field = args
                        .first()
                        .and_then(|arg| {
                            resolver.resolve_constant_string(*arg).map(|name| (arg, name))
                        })
                        .map(|(arg, field_name)| FieldReference::Computed {
                            source: *arg,
                            field_name,
                            expression: Box::new(
                                Node::new(call_id)
                                    .with(Component::HasValueReference(value.clone()))
                            )
                        })
                        .unwrap_or(FieldReference::Unknown);
                    added.push(
                        Node::new(call_id)
                            .with(Component::HasFieldReference(field))
                            .with(Component::HasValueReference(value))
                    );
                }
                _ => {
                    added.push(Node::new(call_id).with(Component::Named(Name::Unknown)));
                }
            }
        }

        Node::new(root)
            .with(Component::Named(Name::AddFields))
            .with(Component::HasAddedFields(added))
    }
}

// ---- chain helpers -------------------------------------------------------

fn is_where_call(tree: &SourceTree, id: ExprId) -> bool {
    tree.as_call(id).is_some_and(|call| {
        call.method.as_str() == "where"
            && (call.declaring_class.is_none() || tree.call_declared_in(id, CRITERIA_FQN))
    })
}

fn is_criteria_chain_call(tree: &SourceTree, id: ExprId) -> bool {
    tree.as_call(id).is_some_and(|call| {
        tree.call_declared_in(id, CRITERIA_FQN) || CRITERIA_METHODS.contains(&call.method.as_str())
    })
}

fn is_new_aggregation_call(tree: &SourceTree, id: ExprId) -> bool {
    tree.as_call(id).is_some_and(|call| {
        call.method.as_str() == "newAggregation"
            && (call.declaring_class.is_none() || tree.call_declared_in(id, AGGREGATION_FQN))
    })
}

fn find_in_subtree(
    tree: &SourceTree,
    root: ExprId,
    predicate: &impl Fn(&SourceTree, ExprId) -> bool
) -> Option<ExprId> {
    let mut found = None;
    tree.walk_exprs(tree.meaningful(root), &mut |id| {
        if found.is_none() && predicate(tree, id) {
            found = Some(id);
        }
    });
    found
}

/// Climbs from `anchor` to the outermost chained call within `root`'s
/// subtree whose receiver chain reaches the anchor.
fn chain_top(tree: &SourceTree, root: ExprId, anchor: ExprId) -> ExprId {
    let mut top = anchor;
    let mut changed = true;
    while changed {
        changed = false;
        tree.walk_exprs(tree.meaningful(root), &mut |id| {
            if !changed
                && tree
                    .receiver(id)
                    .map(|receiver| tree.meaningful(receiver))
                    == Some(top)
                && is_criteria_chain_call(tree, id)
            {
                top = id;
                changed = true;
            }
        });
    }
    top
}

/// Collects a receiver-linked call chain from its outermost call,
/// innermost call first.
fn collect_chain(
    tree: &SourceTree,
    top: ExprId,
    belongs: &impl Fn(&SourceTree, ExprId) -> bool
) -> Vec<ExprId> {
    let mut calls = Vec::new();
    let mut current = Some(tree.meaningful(top));
    while let Some(id) = current {
        if !belongs(tree, id) {
            break;
        }
        calls.push(id);
        current = tree.receiver(id).map(|receiver| tree.meaningful(receiver));
    }
    calls.reverse();
    calls
}

fn combinator_name(name: &str) -> Option<Name> {
    match name {
        "andOperator" => Some(Name::And),
        "orOperator" => Some(Name::Or),
        "norOperator" => Some(Name::Nor),
        _ => None
    }
}

fn template_command_name(name: &str) -> Option<CommandType> {
    let command = match name {
        "aggregate" | "aggregateStream" => CommandType::Aggregate,
        "count" | "exactCount" => CommandType::CountDocuments,
        "estimatedCount" => CommandType::EstimatedDocumentCount,
        "exists" => CommandType::FindOne,
        "find" | "findAll" => CommandType::FindMany,
        "findDistinct" => CommandType::Distinct,
        "findAllAndRemove" => CommandType::DeleteMany,
        "findAndModify" => CommandType::FindOneAndUpdate,
        "findAndRemove" => CommandType::FindOneAndDelete,
        "findAndReplace" => CommandType::FindOneAndReplace,
        "findById" => CommandType::FindOne,
        "insert" => CommandType::InsertOne,
        "insertAll" => CommandType::InsertMany,
        "remove" => CommandType::DeleteMany,
        "replace" => CommandType::ReplaceOne,
        "save" => CommandType::Upsert,
        "scroll" | "stream" => CommandType::FindMany,
        "updateFirst" => CommandType::UpdateOne,
        "updateMulti" => CommandType::UpdateMany,
        "upsert" => CommandType::Upsert,
        "one" | "oneValue" | "firstValue" => CommandType::FindOne,
        "all" => CommandType::FindMany,
        _ => return None
    };
    Some(command)
}

fn template_command(tree: &SourceTree, template_call: ExprId) -> CommandType {
    tree.as_call(template_call)
        .and_then(|call| template_command_name(call.method.as_str()))
        .unwrap_or(CommandType::Unknown)
}

/// The collection an entity class maps to: the mapping annotation's value
/// when present, the decapitalized simple class name otherwise.
fn entity_collection(tree: &SourceTree, class: ClassId) -> CompactString {
    let data = tree.class(class);
    if let Some(mapped) = &data.mapped_collection {
        return mapped.clone();
    }
    let simple = data.name.rsplit('.').next().unwrap_or(data.name.as_str());
    let mut chars = simple.chars();
    match chars.next() {
        Some(first) => {
            let mut name = CompactString::default();
            name.extend(first.to_lowercase());
            name.push_str(chars.as_str());
            name
        }
        None => data.name.clone()
    }
}
