//! Matcher for the driver-style static builder dialect.
//!
//! Recognizes chains built from the driver's static factory classes —
//! `Filters.eq(..)`, `Updates.set(..)`, `Aggregates.match(..)`,
//! `Projections.include(..)`, `Sorts.ascending(..)`,
//! `Accumulators.sum(..)` — terminated by a collection method call.
//! Builder values are dereferenced through the reference resolver before
//! shape matching, so chains split across locals and helper methods match
//! exactly like inline ones.

use compact_str::CompactString;
use tracing::trace;

use crate::{
    command,
    config::ResolverConfig,
    dialects::DialectParser,
    ir::{
        BsonType, CommandType, Component, DialectName, FieldReference, Name, Node, Value,
        ValueReference
    },
    namespace::NamespaceResolver,
    resolve::Resolver,
    syntax::{ExprId, ExprKind, SourceTree}
};

const FILTERS_FQN: &str = "com.mongodb.client.model.Filters";
const UPDATES_FQN: &str = "com.mongodb.client.model.Updates";
const AGGREGATES_FQN: &str = "com.mongodb.client.model.Aggregates";
const PROJECTIONS_FQN: &str = "com.mongodb.client.model.Projections";
const SORTS_FQN: &str = "com.mongodb.client.model.Sorts";
const ACCUMULATORS_FQN: &str = "com.mongodb.client.model.Accumulators";
const FIELD_FQN: &str = "com.mongodb.client.model.Field";
const SESSION_FQN: &str = "com.mongodb.client.ClientSession";

/// The shape of a recognized filter factory call; everything else falls
/// through to the two-argument field/value rule or to `Unknown`.
#[derive(Clone, Copy)]
enum FilterShape {
    /// Varargs of sub-filters (`and`, `or`, `nor`).
    Logical,
    /// A single wrapped sub-filter (`not`).
    Negation,
    /// Field plus varargs/iterable membership values (`in`, `nin`).
    Membership
}

const FILTER_SHAPES: &[(&str, FilterShape)] = &[
    ("and", FilterShape::Logical),
    ("or", FilterShape::Logical),
    ("nor", FilterShape::Logical),
    ("not", FilterShape::Negation),
    ("in", FilterShape::Membership),
    ("nin", FilterShape::Membership),
];

const ACCUMULATOR_NAMES: &[(&str, Name)] = &[
    ("sum", Name::Sum),
    ("avg", Name::Avg),
    ("first", Name::First),
    ("last", Name::Last),
    ("max", Name::Max),
    ("min", Name::Min),
    ("push", Name::Push),
    ("addToSet", Name::AddToSet),
];

pub struct DriverBuilderDialect {
    limits: ResolverConfig
}

impl DriverBuilderDialect {
    pub fn new(limits: ResolverConfig) -> Self {
        Self {
            limits
        }
    }

    fn resolver<'a>(&self, tree: &'a SourceTree) -> Resolver<'a> {
        Resolver::new(tree, self.limits.clone())
    }
}

impl DialectParser for DriverBuilderDialect {
    fn dialect(&self) -> DialectName {
        DialectName::DriverBuilder
    }

    fn is_candidate_for_query(&self, tree: &SourceTree, source: ExprId) -> bool {
        if command::classify(tree, source) != CommandType::Unknown {
            return receiver_is_driver_handle(tree, source);
        }
        // a chain of pure cursor modifiers over a command call is still
        // the query; a chain ending in a materializing accessor is not
        let Some(attachment) = command::attachment(tree, source) else {
            return false;
        };
        let mut current = tree.meaningful(source);
        while current != attachment {
            let Some(call) = tree.as_call(current) else {
                return false;
            };
            if !command::CURSOR_MODIFIERS.contains(&call.method.as_str()) {
                return false;
            }
            let Some(receiver) = call.receiver else {
                return false;
            };
            current = tree.meaningful(receiver);
        }
        true
    }

    fn attachment(&self, tree: &SourceTree, source: ExprId) -> Option<ExprId> {
        command::attachment(tree, source)
    }

    fn parse(&self, tree: &SourceTree, source: ExprId) -> Node<ExprId> {
        let source = tree.meaningful(source);
        let resolver = self.resolver(tree);
        let attachment = command::attachment(tree, source).unwrap_or(source);
        let collection = NamespaceResolver::new(tree, self.limits.clone()).resolve(attachment);
        let command = command::classify(tree, attachment);

        let mut node = Node::new(attachment)
            .with(Component::HasSourceDialect(DialectName::DriverBuilder))
            .with(Component::IsCommand(command))
            .with(Component::HasCollectionReference(collection));

        if tree.as_call(attachment).is_none() {
            return node;
        }

        // a repository-style wrapper: the chain ends in a local method
        // whose body holds the real query
        if command == CommandType::Unknown
            && let Some(inner) = self.inner_query(tree, attachment)
        {
            return inner;
        }

        let command_call = command::command_call(tree, attachment, command);
        let args = tree.arguments(command_call).to_vec();
        let start = usize::from(self.has_session_argument(tree, &args));

        node = node.with(Component::HasFilter(
            args.get(start)
                .and_then(|arg| self.resolve_builder_call(&resolver, *arg, FILTERS_FQN))
                .and_then(|call| self.parse_filter(&resolver, call))
                .into_iter()
                .collect()
        ));

        node = node.with(Component::HasUpdates(
            args.get(start + 1)
                .and_then(|arg| self.resolve_builder_call(&resolver, *arg, UPDATES_FQN))
                .and_then(|call| self.parse_update(&resolver, call))
                .into_iter()
                .collect()
        ));

        let stages = if command == CommandType::Aggregate {
            args.get(start)
                .map(|arg| self.parse_pipeline(&resolver, *arg))
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        node = node.with(Component::HasAggregation(stages));

        for component in self.cursor_metadata(&resolver, source, command_call) {
            node = node.with(component);
        }

        node
    }
}

/// Whether the receiver of a classified call can be a driver collection
/// handle. A receiver resolved to some other library's type (a mapping
/// template, a repository interface) belongs to another dialect even when
/// the method name collides with the driver's.
fn receiver_is_driver_handle(tree: &SourceTree, source: ExprId) -> bool {
    let Some(receiver) = tree.receiver(source) else {
        return true;
    };
    let receiver = tree.meaningful(receiver);
    match tree.static_type(receiver) {
        Some(descriptor) => {
            descriptor.names_class(crate::namespace::COLLECTION_FQN)
                || descriptor.names_class(crate::namespace::DATABASE_FQN)
        }
        // untyped receivers get the benefit of the doubt
        None => true
    }
}

impl DriverBuilderDialect {
    fn has_session_argument(&self, tree: &SourceTree, args: &[ExprId]) -> bool {
        args.first()
            .and_then(|arg| tree.static_type(*arg))
            .is_some_and(|t| t.names_class(SESSION_FQN))
    }

    /// Looks through a repository wrapper method for the query its body
    /// returns.
    fn inner_query(&self, tree: &SourceTree, source: ExprId) -> Option<Node<ExprId>> {
        let target = tree.call_target(source)?;
        let method = tree.method(target);
        if method.is_overridable {
            return None;
        }
        for returned in &method.returns {
            if let Some(attachment) = command::attachment(tree, *returned) {
                trace!(?attachment, "inlining wrapped query from method body");
                let inner = self.parse(tree, attachment);
                if !inner.filter_children().is_empty()
                    || !inner.aggregation_stages().is_empty()
                    || !inner.update_children().is_empty()
                {
                    return Some(inner);
                }
            }
        }
        None
    }

    fn resolve_builder_call(
        &self,
        resolver: &Resolver<'_>,
        expr: ExprId,
        builder_fqn: &str
    ) -> Option<ExprId> {
        resolver.resolve_to_call(expr, &|tree, id| tree.call_declared_in(id, builder_fqn))
    }

    /// The actual arguments of a call accepting either varargs or a single
    /// iterable built by a list factory.
    fn varargs_or_list(&self, resolver: &Resolver<'_>, call: ExprId) -> Vec<ExprId> {
        let args = resolver.tree().arguments(call).to_vec();
        if let [single] = args.as_slice()
            && let Some(elements) = resolver.resolve_to_list_elements(*single)
        {
            return elements;
        }
        args
    }

    // ---- filters ---------------------------------------------------------

    fn parse_filter(&self, resolver: &Resolver<'_>, filter: ExprId) -> Option<Node<ExprId>> {
        let tree = resolver.tree();
        let call = tree.as_call(filter)?;
        let args = tree.arguments(filter).to_vec();
        let method_name = call.method.clone();

        let shape = FILTER_SHAPES
            .iter()
            .find(|(name, _)| *name == method_name.as_str())
            .map(|(_, shape)| *shape);

        match shape {
            Some(FilterShape::Logical) => Some(
                Node::new(filter)
                    .with(Component::Named(Name::from_canonical(&method_name)))
                    .with(Component::HasFilter(
                        self.varargs_or_list(resolver, filter)
                            .into_iter()
                            .filter_map(|arg| self.resolve_builder_call(resolver, arg, FILTERS_FQN))
                            .filter_map(|sub| self.parse_filter(resolver, sub))
                            .collect()
                    ))
            ),
            Some(FilterShape::Negation) => Some(
                Node::new(filter)
                    .with(Component::Named(Name::Not))
                    .with(Component::HasFilter(
                        args.iter()
                            .filter_map(|arg| {
                                self.resolve_builder_call(resolver, *arg, FILTERS_FQN)
                            })
                            .filter_map(|sub| self.parse_filter(resolver, sub))
                            .collect()
                    ))
            ),
            Some(FilterShape::Membership) => {
                if args.is_empty() {
                    return None;
                }
                let field = resolver.resolve_field_name(args[0]);
                let value = resolver.membership_from_args(filter, &args[1..]);
                Some(
                    Node::new(filter)
                        .with(Component::Named(Name::from_canonical(&method_name)))
                        .with(Component::HasFieldReference(field))
                        .with(Component::HasValueReference(value))
                )
            }
            None => self.parse_plain_filter(resolver, filter, &method_name, &args)
        }
    }

    fn parse_plain_filter(
        &self,
        resolver: &Resolver<'_>,
        filter: ExprId,
        method_name: &CompactString,
        args: &[ExprId]
    ) -> Option<Node<ExprId>> {
        match (method_name.as_str(), args) {
            // a single-argument eq matches on the document key
            ("eq", [value_arg]) => Some(
                Node::new(filter)
                    .with(Component::Named(Name::Eq))
                    .with(Component::HasFieldReference(FieldReference::from_schema(
                        *value_arg, "_id"
                    )))
                    .with(Component::HasValueReference(
                        resolver.resolve_value(*value_arg)
                    ))
            ),
            // the operator's own semantics supply the value
            ("exists", [field_arg]) => Some(
                Node::new(filter)
                    .with(Component::Named(Name::Exists))
                    .with(Component::HasFieldReference(
                        resolver.resolve_field_name(*field_arg)
                    ))
                    .with(Component::HasValueReference(ValueReference::Inferred {
                        source:     *field_arg,
                        value:      Value::Boolean(true),
                        value_type: BsonType::Boolean
                    }))
            ),
            // two arguments are a field/value pair
            (_, [field_arg, value_arg]) => Some(
                Node::new(filter)
                    .with(Component::Named(Name::from_canonical(method_name)))
                    .with(Component::HasFieldReference(
                        resolver.resolve_field_name(*field_arg)
                    ))
                    .with(Component::HasValueReference(
                        resolver.resolve_value(*value_arg)
                    ))
            ),
            // query-shaped but not understood: keep the node
            _ => Some(Node::new(filter).with(Component::Named(Name::from_canonical(method_name))))
        }
    }

    // ---- updates ---------------------------------------------------------

    fn parse_update(&self, resolver: &Resolver<'_>, update: ExprId) -> Option<Node<ExprId>> {
        let tree = resolver.tree();
        let call = tree.as_call(update)?;
        let args = tree.arguments(update).to_vec();
        let method_name = call.method.clone();

        if method_name.as_str() == "combine" {
            return Some(
                Node::new(update)
                    .with(Component::Named(Name::Combine))
                    .with(Component::HasUpdates(
                        self.varargs_or_list(resolver, update)
                            .into_iter()
                            .filter_map(|arg| self.resolve_builder_call(resolver, arg, UPDATES_FQN))
                            .filter_map(|sub| self.parse_update(resolver, sub))
                            .collect()
                    ))
            );
        }

        match args.as_slice() {
            [field_arg, value_arg] => {
                let named = Name::from_canonical(&method_name);
                let field = resolver.resolve_field_name(*field_arg);

                // pull's second argument can be a nested filter
                if named == Name::Pull
                    && let Some(filter_call) =
                        self.resolve_builder_call(resolver, *value_arg, FILTERS_FQN)
                    && let Some(filter) = self.parse_filter(resolver, filter_call)
                {
                    return Some(
                        Node::new(update)
                            .with(Component::Named(named))
                            .with(Component::HasFieldReference(field))
                            .with(Component::HasFilter(vec![filter]))
                    );
                }

                Some(
                    Node::new(update)
                        .with(Component::Named(named))
                        .with(Component::HasFieldReference(field))
                        .with(Component::HasValueReference(
                            resolver.resolve_value(*value_arg)
                        ))
                )
            }
            [field_arg] => Some(
                Node::new(update)
                    .with(Component::Named(Name::from_canonical(&method_name)))
                    .with(Component::HasFieldReference(
                        resolver.resolve_field_name(*field_arg)
                    ))
            ),
            _ => Some(Node::new(update).with(Component::Named(Name::from_canonical(&method_name))))
        }
    }

    // ---- aggregation -----------------------------------------------------

    fn parse_pipeline(&self, resolver: &Resolver<'_>, stage_list: ExprId) -> Vec<Node<ExprId>> {
        let Some(stages) = resolver.resolve_to_list_elements(stage_list) else {
            return Vec::new();
        };
        stages
            .into_iter()
            .filter_map(|stage| {
                let call = self.resolve_builder_call(resolver, stage, AGGREGATES_FQN)?;
                self.parse_stage(resolver, call)
            })
            .collect()
    }

    fn parse_stage(&self, resolver: &Resolver<'_>, stage: ExprId) -> Option<Node<ExprId>> {
        let tree = resolver.tree();
        let call = tree.as_call(stage)?;
        let args = tree.arguments(stage).to_vec();

        match call.method.as_str() {
            "match" => {
                let filters = args
                    .first()
                    .and_then(|arg| self.resolve_builder_call(resolver, *arg, FILTERS_FQN))
                    .and_then(|filter| self.parse_filter(resolver, filter))
                    .into_iter()
                    .collect();
                Some(
                    Node::new(stage)
                        .with(Component::Named(Name::Match))
                        .with(Component::HasFilter(filters))
                )
            }
            "project" => {
                let projections = args
                    .first()
                    .and_then(|arg| self.resolve_builder_call(resolver, *arg, PROJECTIONS_FQN))
                    .map(|projection| {
                        self.parse_projection_like(resolver, projection, PROJECTIONS_FQN)
                    })
                    .unwrap_or_default();
                Some(
                    Node::new(stage)
                        .with(Component::Named(Name::Project))
                        .with(Component::HasProjections(projections))
                )
            }
            "sort" => {
                let sorts = args
                    .first()
                    .and_then(|arg| self.resolve_builder_call(resolver, *arg, SORTS_FQN))
                    .map(|sort| self.parse_projection_like(resolver, sort, SORTS_FQN))
                    .unwrap_or_default();
                Some(
                    Node::new(stage)
                        .with(Component::Named(Name::Sort))
                        .with(Component::HasSorts(sorts))
                )
            }
            "group" => self.parse_group_stage(resolver, stage, &args),
            "addFields" => Some(
                Node::new(stage)
                    .with(Component::Named(Name::AddFields))
                    .with(Component::HasAddedFields(
                        self.varargs_or_list(resolver, stage)
                            .into_iter()
                            .filter_map(|arg| self.parse_added_field(resolver, arg))
                            .collect()
                    ))
            ),
            "unwind" => {
                let field = match args.first() {
                    Some(arg) => match resolver.resolve_constant_string(*arg) {
                        Some(path) => FieldReference::FromSchema {
                            source:       *arg,
                            field_name:   CompactString::from(path.trim_start_matches('$')),
                            display_name: path
                        },
                        None => FieldReference::Unknown
                    },
                    None => FieldReference::Unknown
                };
                Some(
                    Node::new(stage)
                        .with(Component::Named(Name::Unwind))
                        .with(Component::HasFieldReference(field))
                )
            }
            "limit" => {
                let node = Node::new(stage).with(Component::Named(Name::Limit));
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
            // an unknown stage still occupies a pipeline slot
            _ => Some(Node::new(stage).with(Component::Named(Name::Unknown)))
        }
    }

    fn parse_group_stage(
        &self,
        resolver: &Resolver<'_>,
        stage: ExprId,
        args: &[ExprId]
    ) -> Option<Node<ExprId>> {
        let key_arg = *args.first()?;
        let key_value = resolver.field_expression_as_value(key_arg);

        let accumulators = self
            .varargs_or_list(resolver, stage)
            .into_iter()
            .skip(1)
            .filter_map(|arg| self.resolve_builder_call(resolver, arg, ACCUMULATORS_FQN))
            .filter_map(|acc| self.parse_accumulator(resolver, acc))
            .collect();

        Some(
            Node::new(stage)
                .with(Component::Named(Name::Group))
                .with(Component::HasFieldReference(FieldReference::inferred(
                    key_arg, "_id"
                )))
                .with(Component::HasValueReference(key_value))
                .with(Component::HasAccumulatedFields(accumulators))
        )
    }

    fn parse_accumulator(&self, resolver: &Resolver<'_>, acc: ExprId) -> Option<Node<ExprId>> {
        let tree = resolver.tree();
        let call = tree.as_call(acc)?;
        let args = tree.arguments(acc).to_vec();

        let Some(name) = ACCUMULATOR_NAMES
            .iter()
            .find(|(spelling, _)| *spelling == call.method.as_str())
            .map(|(_, name)| *name)
        else {
            // an unknown accumulator keeps its slot in the group stage
            return Some(Node::new(acc).with(Component::Named(Name::Unknown)));
        };

        let key_arg = *args.first()?;
        let value_arg = *args.get(1)?;

        let value = resolver.field_expression_as_value(value_arg);
        let field = match resolver.resolve_constant_string(key_arg) {
            Some(field_name) => FieldReference::Computed {
                source: key_arg,
                field_name,
                expression: Box::new(
                    Node::new(value_arg).with(Component::HasValueReference(value.clone()))
                )
            },
            None => FieldReference::Unknown
        };

        Some(
            Node::new(acc)
                .with(Component::Named(name))
                .with(Component::HasFieldReference(field))
                .with(Component::HasValueReference(value))
        )
    }

    fn parse_added_field(&self, resolver: &Resolver<'_>, arg: ExprId) -> Option<Node<ExprId>> {
        let tree = resolver.tree();
        let new_expr = resolver.resolve_to_expr(arg, &|t, id| {
            matches!(t.kind(id), ExprKind::New(new_expr) if new_expr.class_name.as_str() == "Field"
                || new_expr.class_name.as_str() == FIELD_FQN)
        })?;
        let ExprKind::New(data) = tree.kind(new_expr) else {
            return None;
        };
        let name_arg = data.args.first().copied();
        let value_arg = data.args.get(1).copied();

        // only constant values are modeled for added fields
        let value = match value_arg.and_then(|value| resolver.resolve_constant(value)) {
            Some(constant) => ValueReference::Constant {
                source:     value_arg.unwrap_or(new_expr),
                value:      constant.value,
                value_type: constant.value_type
            },
            None => ValueReference::Unknown
        };

        let field = match name_arg.and_then(|name| resolver.resolve_constant_string(name)) {
            Some(field_name) => FieldReference::Computed {
                source: name_arg.unwrap_or(new_expr),
                field_name,
                expression: Box::new(
                    Node::new(value_arg.unwrap_or(new_expr))
                        .with(Component::HasValueReference(value.clone()))
                )
            },
            None => FieldReference::Unknown
        };

        Some(
            Node::new(new_expr)
                .with(Component::HasFieldReference(field))
                .with(Component::HasValueReference(value))
        )
    }

    // ---- cursor metadata -------------------------------------------------

    /// Sorts and limits applied through cursor modifiers between the
    /// attachment point and the command call.
    fn cursor_metadata(
        &self,
        resolver: &Resolver<'_>,
        outer: ExprId,
        command_call: ExprId
    ) -> Vec<Component<ExprId>> {
        let tree = resolver.tree();
        let mut components = Vec::new();
        for modifier in command::cursor_modifier_calls(tree, outer, command_call) {
            let Some(call) = tree.as_call(modifier) else {
                continue;
            };
            let args = tree.arguments(modifier);
            match call.method.as_str() {
                "sort" => {
                    if let Some(sort_call) = args
                        .first()
                        .and_then(|arg| self.resolve_builder_call(resolver, *arg, SORTS_FQN))
                    {
                        components.push(Component::HasSorts(self.parse_projection_like(
                            resolver, sort_call, SORTS_FQN
                        )));
                    }
                }
                "limit" => {
                    if let Some(limit) = args
                        .first()
                        .and_then(|arg| resolver.resolve_constant(*arg))
                        .and_then(|constant| constant.value.as_i64())
                        .and_then(|value| u32::try_from(value).ok())
                    {
                        components.push(Component::HasLimit(limit));
                    }
                }
                _ => {}
            }
        }
        components
    }

    // ---- projections and sorts -------------------------------------------

    fn parse_projection_like(
        &self,
        resolver: &Resolver<'_>,
        call: ExprId,
        builder_fqn: &str
    ) -> Vec<Node<ExprId>> {
        let tree = resolver.tree();
        let Some(call_data) = tree.as_call(call) else {
            return Vec::new();
        };

        match call_data.method.as_str() {
            // combinators flatten into their parts
            "fields" | "orderBy" => self
                .varargs_or_list(resolver, call)
                .into_iter()
                .filter_map(|arg| self.resolve_builder_call(resolver, arg, builder_fqn))
                .flat_map(|sub| self.parse_projection_like(resolver, sub, builder_fqn))
                .collect(),
            name @ ("include" | "exclude" | "ascending" | "descending") => {
                let named = Name::from_canonical(name);
                let inferred = match named {
                    Name::Include | Name::Ascending => 1,
                    Name::Exclude => 0,
                    _ => -1
                };
                self.varargs_or_list(resolver, call)
                    .into_iter()
                    .filter_map(|field_arg| {
                        match resolver.resolve_field_name(field_arg) {
                            field @ FieldReference::FromSchema {
                                ..
                            } => Some(
                                Node::new(field_arg)
                                    .with(Component::Named(named))
                                    .with(Component::HasFieldReference(field))
                                    .with(Component::HasValueReference(ValueReference::Inferred {
                                        source:     field_arg,
                                        value:      Value::Int32(inferred),
                                        value_type: BsonType::Int32
                                    }))
                            ),
                            _ => None
                        }
                    })
                    .collect()
            }
            _ => vec![Node::new(call).with(Component::Named(Name::Unknown))]
        }
    }
}
