//! Resolution of the (database, collection) namespace a query targets.
//!
//! Resolution is longest-match-first over the receiver chain of the query
//! call: a direct `database(..).collection(..)` chain wins, then
//! field-backed handles (checked for consistency across assignment
//! sites), then inlined no-argument accessors, then constructor arguments
//! substituted through `this(..)`/`super(..)` delegation chains. Partial
//! information degrades to `OnlyCollection` — multi-tenant code often
//! leaves only the database parameterized — and absence of information
//! degrades to `Unknown`. This resolver never fails.

use std::collections::HashSet;

use tracing::debug;

use crate::{
    config::ResolverConfig,
    ir::{CollectionReference, Namespace},
    resolve::{ParamEnv, Resolver},
    syntax::{
        ClassId, DeclRef, DelegationKind, ExprId, ExprKind, FieldId, MethodId, MethodKind,
        SourceTree
    }
};

pub const MONGO_CLIENT_FQN: &str = "com.mongodb.client.MongoClient";
pub const DATABASE_FQN: &str = "com.mongodb.client.MongoDatabase";
pub const COLLECTION_FQN: &str = "com.mongodb.client.MongoCollection";

pub struct NamespaceResolver<'a> {
    tree:     &'a SourceTree,
    resolver: Resolver<'a>,
    limits:   ResolverConfig
}

impl<'a> NamespaceResolver<'a> {
    pub fn new(tree: &'a SourceTree, limits: ResolverConfig) -> Self {
        Self {
            tree,
            resolver: Resolver::new(tree, limits.clone()),
            limits
        }
    }

    /// Resolves the collection reference reachable from a query call.
    pub fn resolve(&self, query: ExprId) -> CollectionReference<ExprId> {
        let Some(collection_expr) = self.find_collection_expr(query) else {
            return CollectionReference::Unknown;
        };
        let query_class = self.tree.enclosing_class(query);
        let reference = self.resolve_reference(collection_expr, &ParamEnv::new(), query_class, 0);
        debug!(?reference, "collection reference resolved");
        reference
    }

    /// Walks the receiver chain of the query call looking for the
    /// expression that denotes the collection handle.
    fn find_collection_expr(&self, query: ExprId) -> Option<ExprId> {
        let mut current = self.tree.meaningful(query);
        loop {
            let receiver = match self.tree.receiver(current) {
                Some(receiver) => self.tree.meaningful(receiver),
                None => {
                    // a receiverless helper call can still produce the
                    // collection from its body
                    return self
                        .tree
                        .call_target(current)
                        .is_some()
                        .then_some(current)
                        .filter(|id| *id != self.tree.meaningful(query));
                }
            };

            if self.is_collection_expr(receiver) {
                return Some(receiver);
            }
            if self.tree.as_call(receiver).is_some() {
                current = receiver;
                continue;
            }
            // a variable of unknown type: let reference resolution decide
            return Some(receiver);
        }
    }

    fn is_collection_expr(&self, expr: ExprId) -> bool {
        if self
            .tree
            .static_type(expr)
            .is_some_and(|t| t.names_class(COLLECTION_FQN))
        {
            return true;
        }
        self.is_collection_call(expr)
    }

    fn is_collection_call(&self, expr: ExprId) -> bool {
        self.tree
            .as_call(expr)
            .is_some_and(|call| matches!(call.method.as_str(), "getCollection" | "collection"))
    }

    fn is_database_call(&self, expr: ExprId) -> bool {
        let named = self
            .tree
            .as_call(expr)
            .is_some_and(|call| matches!(call.method.as_str(), "getDatabase" | "database"));
        named
            || (self
                .tree
                .static_type(expr)
                .is_some_and(|t| t.names_class(DATABASE_FQN))
                && self
                    .tree
                    .as_call(expr)
                    .is_some_and(|call| !call.args.is_empty()))
    }

    fn resolve_reference(
        &self,
        expr: ExprId,
        env: &ParamEnv,
        query_class: Option<ClassId>,
        depth: u32
    ) -> CollectionReference<ExprId> {
        if depth >= self.limits.max_inline_depth {
            return CollectionReference::Unknown;
        }
        let expr = self.tree.meaningful(expr);

        match &self.tree.expr(expr).kind {
            ExprKind::Call(call) => {
                if self.is_collection_call(expr) && !self.tree.arguments(expr).is_empty() {
                    return self.resolve_chain(expr, env, query_class, depth);
                }
                // a no-argument local accessor: substitute its return
                // expression and retry
                if let Some(target) = call.target {
                    let method = self.tree.method(target);
                    if method.kind == MethodKind::Method && !method.is_overridable {
                        for returned in &method.returns {
                            let resolved =
                                self.resolve_reference(*returned, env, query_class, depth + 1);
                            if resolved != CollectionReference::Unknown {
                                return resolved;
                            }
                        }
                    }
                }
                CollectionReference::Unknown
            }
            ExprKind::VarRef {
                decl, ..
            } => match decl {
                Some(DeclRef::Local(local)) => match self.tree.local(*local).initializer {
                    Some(initializer) => {
                        self.resolve_reference(initializer, env, query_class, depth + 1)
                    }
                    None => CollectionReference::Unknown
                },
                Some(DeclRef::Field(field)) => {
                    self.resolve_field(*field, query_class, depth + 1)
                }
                Some(DeclRef::Param {
                    method,
                    index
                }) => match env.get(&(*method, *index)) {
                    Some(bound) => self.resolve_reference(*bound, env, query_class, depth + 1),
                    None => CollectionReference::Unknown
                },
                _ => CollectionReference::Unknown
            },
            _ => CollectionReference::Unknown
        }
    }

    /// Extracts the namespace from a recognized
    /// `database(<name>).collection(<name>)` chain shape.
    fn resolve_chain(
        &self,
        collection_call: ExprId,
        env: &ParamEnv,
        query_class: Option<ClassId>,
        depth: u32
    ) -> CollectionReference<ExprId> {
        let args = self.tree.arguments(collection_call);
        let Some(&collection_arg) = args.first() else {
            return CollectionReference::Unknown;
        };
        let collection_name = self
            .resolver
            .resolve_constant_string_with_env(collection_arg, env);

        let database = self
            .tree
            .receiver(collection_call)
            .map(|receiver| self.tree.meaningful(receiver))
            .and_then(|receiver| self.resolve_database_part(receiver, env, query_class, depth));

        match (database, collection_name) {
            (Some((database_source, database)), Some(collection)) => CollectionReference::Known {
                database_source,
                collection_source: Some(collection_arg),
                namespace: Namespace::new(database, collection)
            },
            (None, Some(collection)) => CollectionReference::OnlyCollection {
                collection_source: Some(collection_arg),
                collection
            },
            _ => CollectionReference::Unknown
        }
    }

    /// Resolves the database side of a chain. The receiver can be the
    /// `database(..)` call itself, a field or local holding the database
    /// handle, or an inlined accessor.
    fn resolve_database_part(
        &self,
        receiver: ExprId,
        env: &ParamEnv,
        query_class: Option<ClassId>,
        depth: u32
    ) -> Option<(Option<ExprId>, compact_str::CompactString)> {
        if depth >= self.limits.max_inline_depth {
            return None;
        }

        if self.is_database_call(receiver) {
            let database_arg = *self.tree.arguments(receiver).first()?;
            let name = self
                .resolver
                .resolve_constant_string_with_env(database_arg, env)?;
            return Some((Some(database_arg), name));
        }

        match &self.tree.expr(receiver).kind {
            ExprKind::VarRef {
                decl, ..
            } => match decl {
                Some(DeclRef::Local(local)) => {
                    let initializer = self.tree.local(*local).initializer?;
                    self.resolve_database_part(
                        self.tree.meaningful(initializer),
                        env,
                        query_class,
                        depth + 1
                    )
                }
                Some(DeclRef::Field(field)) => {
                    let sites = self.field_definition_sites(*field, query_class);
                    let mut resolved = Vec::new();
                    for (site, site_env) in sites {
                        if let Some(found) = self.resolve_database_part(
                            self.tree.meaningful(site),
                            &site_env,
                            query_class,
                            depth + 1
                        ) {
                            resolved.push(found);
                        }
                    }
                    resolved.dedup_by(|a, b| a.1 == b.1);
                    match resolved.as_slice() {
                        [only] => Some(only.clone()),
                        _ => None
                    }
                }
                Some(DeclRef::Param {
                    method,
                    index
                }) => {
                    let bound = *env.get(&(*method, *index))?;
                    self.resolve_database_part(
                        self.tree.meaningful(bound),
                        env,
                        query_class,
                        depth + 1
                    )
                }
                _ => None
            },
            ExprKind::Call(call) => {
                let target = call.target?;
                let method = self.tree.method(target);
                if method.kind != MethodKind::Method || method.is_overridable {
                    return None;
                }
                method.returns.iter().find_map(|returned| {
                    self.resolve_database_part(
                        self.tree.meaningful(*returned),
                        env,
                        query_class,
                        depth + 1
                    )
                })
            }
            _ => None
        }
    }

    /// Resolves a field-backed collection handle from its definition
    /// sites. Every resolvable site must agree; disagreeing sites fall
    /// back to `Unknown` — intentionally conservative.
    fn resolve_field(
        &self,
        field: FieldId,
        query_class: Option<ClassId>,
        depth: u32
    ) -> CollectionReference<ExprId> {
        let mut resolutions = Vec::new();
        for (site, env) in self.field_definition_sites(field, query_class) {
            let resolved = self.resolve_reference(site, &env, query_class, depth + 1);
            if resolved != CollectionReference::Unknown {
                resolutions.push(resolved);
            }
        }

        let Some(first) = resolutions.first().cloned() else {
            return CollectionReference::Unknown;
        };
        if resolutions
            .iter()
            .all(|candidate| collections_agree(candidate, &first))
        {
            first
        } else {
            debug!(?field, "assignment sites disagree, falling back");
            CollectionReference::Unknown
        }
    }

    /// All definition sites of a field, each paired with the parameter
    /// environment under which it should be resolved: the plain
    /// initializer and assignment sites get an empty environment,
    /// constructor assignments get one environment per concrete
    /// constructor of the query's class, built by following
    /// `this(..)`/`super(..)` delegation to the terminal constructor.
    fn field_definition_sites(
        &self,
        field: FieldId,
        query_class: Option<ClassId>
    ) -> Vec<(ExprId, ParamEnv)> {
        let data = self.tree.field(field);
        let mut sites = Vec::new();

        if let Some(initializer) = data.initializer {
            sites.push((initializer, ParamEnv::new()));
        }
        for assignment in data.assignments.iter().take(self.limits.max_assignment_sites) {
            sites.push((*assignment, ParamEnv::new()));
        }

        let Some(owner) = data.class else {
            return sites;
        };

        let start_class = match query_class {
            Some(class) if self.tree.is_same_or_subclass(class, owner) => class,
            _ => owner
        };
        let envs = self.delegation_envs(start_class);

        for &ctor in &self.tree.class(owner).constructors {
            for (assigned, value) in &self.tree.method(ctor).field_assignments {
                if *assigned != field {
                    continue;
                }
                if envs.is_empty() {
                    sites.push((*value, ParamEnv::new()));
                } else {
                    for env in &envs {
                        sites.push((*value, env.clone()));
                    }
                }
            }
        }

        sites
    }

    /// One environment per constructor of `start_class`, binding the
    /// parameters of every constructor reached through its delegation
    /// chain to the argument expressions passed at each delegation site.
    fn delegation_envs(&self, start_class: ClassId) -> Vec<ParamEnv> {
        let mut envs = Vec::new();
        for &ctor in &self.tree.class(start_class).constructors {
            let mut env = ParamEnv::new();
            let mut visited: HashSet<MethodId> = HashSet::new();
            let mut current = ctor;
            let mut current_class = start_class;

            while visited.insert(current) {
                let Some(delegation) = &self.tree.method(current).delegation else {
                    break;
                };
                let target_class = match delegation.kind {
                    DelegationKind::This => Some(current_class),
                    DelegationKind::Super => self.tree.class(current_class).superclass
                };
                let Some(target) = delegation.target.or_else(|| {
                    target_class.and_then(|class| {
                        self.constructor_with_arity(class, delegation.args.len())
                    })
                }) else {
                    break;
                };
                for (index, arg) in delegation.args.iter().enumerate() {
                    env.insert((target, index), *arg);
                }
                current = target;
                if let Some(class) = self.tree.method(target).class {
                    current_class = class;
                }
            }

            if !env.is_empty() {
                envs.push(env);
            }
        }
        envs
    }

    fn constructor_with_arity(&self, class: ClassId, arity: usize) -> Option<MethodId> {
        self.tree
            .class(class)
            .constructors
            .iter()
            .copied()
            .find(|ctor| self.tree.method(*ctor).params.len() == arity)
    }
}

/// Two resolutions agree when they name the same target, ignoring which
/// source expressions they were read from.
fn collections_agree(left: &CollectionReference<ExprId>, right: &CollectionReference<ExprId>) -> bool {
    match (left, right) {
        (
            CollectionReference::Known {
                namespace: a, ..
            },
            CollectionReference::Known {
                namespace: b, ..
            }
        ) => a == b,
        (
            CollectionReference::OnlyCollection {
                collection: a, ..
            },
            CollectionReference::OnlyCollection {
                collection: b, ..
            }
        ) => a == b,
        (CollectionReference::Unknown, CollectionReference::Unknown) => true,
        _ => false
    }
}
