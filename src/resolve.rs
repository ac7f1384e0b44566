//! Bounded resolution of expressions to constant values, runtime types and
//! field names.
//!
//! This is deliberately not whole-program dataflow. The resolver follows a
//! fixed set of inlinable shapes — literals, string concatenation,
//! single-assignment locals, final fields, enum constants and private
//! single-return helper methods — one definition at a time, guarded by a
//! visited set so self-referential definitions terminate as `Runtime`
//! instead of looping. Anything outside those shapes degrades to a runtime
//! value typed by its static type; resolution itself never fails.

use std::collections::{HashMap, HashSet};

use compact_str::CompactString;
use tracing::trace;

use crate::{
    config::ResolverConfig,
    ir::{
        BsonType, Component, ComputedType, FieldReference, Node, Value, ValueReference
    },
    syntax::{
        DeclRef, ExprId, ExprKind, FieldId, Literal, LocalId, MethodId, MethodKind, SourceTree
    },
    typemap::bson_type_of
};

/// Bindings from constructor parameters to the argument expressions passed
/// at a delegation site. Used when the namespace resolver substitutes
/// subclass constructor arguments into a base class.
pub type ParamEnv = HashMap<(MethodId, usize), ExprId>;

/// A constant recovered by folding, together with its inferred type.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConstant {
    pub value:      Value,
    pub value_type: BsonType
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum VisitKey {
    Expr(ExprId),
    Local(LocalId),
    Field(FieldId),
    Method(MethodId),
    Param(MethodId, usize)
}

#[derive(Default)]
struct Walk {
    visited: HashSet<VisitKey>,
    depth:   u32
}

impl Walk {
    /// Marks a definition as visited; returns false when it was already
    /// seen, which is how cycles bottom out.
    fn enter(&mut self, key: VisitKey, max_depth: u32) -> bool {
        if self.depth >= max_depth {
            trace!(depth = self.depth, "resolution depth bound reached");
            return false;
        }
        self.depth += 1;
        if !self.visited.insert(key) {
            trace!(?key, "cyclic definition, degrading to runtime");
            return false;
        }
        true
    }
}

/// Resolves expressions as far as statically possible.
pub struct Resolver<'a> {
    tree:   &'a SourceTree,
    limits: ResolverConfig
}

impl<'a> Resolver<'a> {
    pub fn new(tree: &'a SourceTree, limits: ResolverConfig) -> Self {
        Self {
            tree,
            limits
        }
    }

    pub fn tree(&self) -> &'a SourceTree {
        self.tree
    }

    // ---- constant folding ------------------------------------------------

    pub fn resolve_constant(&self, expr: ExprId) -> Option<ResolvedConstant> {
        self.resolve_constant_with_env(expr, &ParamEnv::new())
    }

    pub fn resolve_constant_with_env(
        &self,
        expr: ExprId,
        env: &ParamEnv
    ) -> Option<ResolvedConstant> {
        let mut walk = Walk::default();
        self.fold(expr, env, &mut walk)
    }

    pub fn resolve_constant_string(&self, expr: ExprId) -> Option<CompactString> {
        self.resolve_constant_string_with_env(expr, &ParamEnv::new())
    }

    pub fn resolve_constant_string_with_env(
        &self,
        expr: ExprId,
        env: &ParamEnv
    ) -> Option<CompactString> {
        match self.resolve_constant_with_env(expr, env)?.value {
            Value::String(value) => Some(value),
            _ => None
        }
    }

    fn fold(&self, expr: ExprId, env: &ParamEnv, walk: &mut Walk) -> Option<ResolvedConstant> {
        let expr = self.tree.meaningful(expr);
        match &self.tree.expr(expr).kind {
            ExprKind::Literal(literal) => Some(literal_constant(literal)),
            ExprKind::StringConcat(parts) => self.fold_concat(parts, env, walk),
            ExprKind::VarRef {
                decl, ..
            } => self.fold_declaration(*decl, env, walk),
            ExprKind::Call(call) => {
                let target = call.target?;
                if !walk.enter(VisitKey::Method(target), self.limits.max_inline_depth) {
                    return None;
                }
                self.fold_inlined_method(target, env, walk)
            }
            _ => None
        }
    }

    /// Folds string concatenation left-to-right into a single literal when
    /// every operand is itself resolvable.
    fn fold_concat(
        &self,
        parts: &[ExprId],
        env: &ParamEnv,
        walk: &mut Walk
    ) -> Option<ResolvedConstant> {
        let mut folded = String::new();
        for part in parts {
            let constant = self.fold(*part, env, walk)?;
            append_to_string(&mut folded, &constant.value)?;
        }
        Some(ResolvedConstant {
            value:      Value::String(folded.into()),
            value_type: BsonType::nullable(BsonType::String)
        })
    }

    fn fold_declaration(
        &self,
        decl: Option<DeclRef>,
        env: &ParamEnv,
        walk: &mut Walk
    ) -> Option<ResolvedConstant> {
        match decl? {
            DeclRef::Local(local) => {
                if !walk.enter(VisitKey::Local(local), self.limits.max_inline_depth) {
                    return None;
                }
                self.fold(self.tree.local(local).initializer?, env, walk)
            }
            DeclRef::Field(field) => {
                let data = self.tree.field(field);
                // only final fields with initializers are constant-like
                if !data.is_final {
                    return None;
                }
                if !walk.enter(VisitKey::Field(field), self.limits.max_inline_depth) {
                    return None;
                }
                self.fold(data.initializer?, env, walk)
            }
            DeclRef::Param {
                method,
                index
            } => {
                let bound = *env.get(&(method, index))?;
                if !walk.enter(VisitKey::Param(method, index), self.limits.max_inline_depth) {
                    return None;
                }
                self.fold(bound, env, walk)
            }
            DeclRef::EnumConstant {
                class,
                index
            } => {
                let data = self.tree.class(class);
                let constant = data.enum_constants.get(index)?;
                Some(ResolvedConstant {
                    value:      Value::String(constant.clone()),
                    value_type: BsonType::enumeration(
                        data.enum_constants.iter().cloned(),
                        Some(data.name.clone())
                    )
                })
            }
        }
    }

    /// Substitutes the body of a private single-return helper. Overridable
    /// or multi-return methods are never inlined: their value depends on
    /// dispatch or control flow the resolver does not model.
    fn fold_inlined_method(
        &self,
        target: MethodId,
        env: &ParamEnv,
        walk: &mut Walk
    ) -> Option<ResolvedConstant> {
        let method = self.tree.method(target);
        if !method_is_inlinable(method.kind, method.is_private, method.is_static)
            || method.is_overridable
        {
            return None;
        }
        match method.returns.as_slice() {
            [only_return] => self.fold(*only_return, env, walk),
            _ => None
        }
    }

    // ---- value references ------------------------------------------------

    /// Resolves an expression in value position: constant when foldable,
    /// otherwise a runtime value typed by the static type.
    pub fn resolve_value(&self, expr: ExprId) -> ValueReference<ExprId> {
        match self.resolve_constant(expr) {
            Some(constant) => ValueReference::Constant {
                source:     expr,
                value:      constant.value,
                value_type: constant.value_type
            },
            None => self.runtime_value(expr)
        }
    }

    fn runtime_value(&self, expr: ExprId) -> ValueReference<ExprId> {
        match self.static_bson_type(expr) {
            Some(runtime_type) => ValueReference::Runtime {
                source: expr,
                runtime_type
            },
            None => ValueReference::Unknown
        }
    }

    pub fn static_bson_type(&self, expr: ExprId) -> Option<BsonType> {
        self.tree.static_type(expr).map(bson_type_of)
    }

    // ---- field references ------------------------------------------------

    /// Resolves an expression in field-name position.
    pub fn resolve_field_name(&self, expr: ExprId) -> FieldReference<ExprId> {
        match self.resolve_constant_string(expr) {
            Some(name) => FieldReference::from_schema(expr, name),
            None => FieldReference::Unknown
        }
    }

    /// Resolves an expression in positions where a `"$field"` path string
    /// denotes a computed value (group keys, accumulator arguments).
    pub fn field_expression_as_value(&self, expr: ExprId) -> ValueReference<ExprId> {
        match self.resolve_constant(expr) {
            Some(ResolvedConstant {
                value: Value::String(path),
                ..
            }) => {
                let field_name = path.trim_start_matches('$');
                let field = FieldReference::FromSchema {
                    source:       expr,
                    field_name:   CompactString::from(field_name),
                    display_name: path.clone()
                };
                ValueReference::Computed {
                    source:   expr,
                    computed: ComputedType {
                        base_type:  BsonType::Any,
                        expression: Box::new(
                            Node::new(expr).with(Component::HasFieldReference(field))
                        )
                    }
                }
            }
            Some(constant) => ValueReference::Constant {
                source:     expr,
                value:      constant.value,
                value_type: constant.value_type
            },
            None => self.runtime_value(expr)
        }
    }

    // ---- membership (varargs / list literal) values ----------------------

    /// Resolves the value arguments of a set-membership operator.
    ///
    /// The element type is the `AnyOf` of each resolved element's type; if
    /// any element fails to fold, the whole set degrades to a runtime
    /// array of that `AnyOf`.
    pub fn resolve_membership_values(
        &self,
        source: ExprId,
        elements: &[ExprId]
    ) -> ValueReference<ExprId> {
        if elements.is_empty() {
            return ValueReference::Runtime {
                source,
                runtime_type: BsonType::array(BsonType::Any)
            };
        }

        let mut values = Vec::with_capacity(elements.len());
        let mut element_types = Vec::with_capacity(elements.len());
        let mut all_constant = true;

        for element in elements {
            match self.resolve_constant(*element) {
                Some(constant) => {
                    element_types.push(constant.value_type);
                    values.push(constant.value);
                }
                None => {
                    all_constant = false;
                    element_types.push(self.static_bson_type(*element).unwrap_or(BsonType::Any));
                }
            }
        }

        let element_type = BsonType::any_of(element_types);
        if all_constant {
            ValueReference::Constant {
                source,
                value: Value::Array(values),
                value_type: BsonType::array(element_type)
            }
        } else {
            ValueReference::Runtime {
                source,
                runtime_type: BsonType::array(element_type)
            }
        }
    }

    /// Resolves the value side of an `in`/`nin`-style call from its raw
    /// argument list (everything after the field argument). Accepts
    /// varargs, an inline or indirected list literal, an array value or a
    /// runtime iterable.
    pub fn membership_from_args(&self, call: ExprId, args: &[ExprId]) -> ValueReference<ExprId> {
        match args {
            [] => ValueReference::Runtime {
                source:       call,
                runtime_type: BsonType::array(BsonType::Any)
            },
            [single] => {
                if let Some(elements) = self.resolve_to_list_elements(*single) {
                    return self.resolve_membership_values(call, &elements);
                }
                let static_type = self.tree.static_type(*single);
                if static_type.is_some_and(|t| t.is_iterable() || t.is_array()) {
                    // a runtime collection: element type is all we can say
                    return ValueReference::Runtime {
                        source:       *single,
                        runtime_type: self
                            .static_bson_type(*single)
                            .unwrap_or(BsonType::array(BsonType::Any))
                    };
                }
                // a single varargs element becomes a one-element array
                self.resolve_membership_values(call, args)
            }
            many => self.resolve_membership_values(call, many)
        }
    }

    // ---- builder-call dereferencing --------------------------------------

    /// Follows locals, fields and helper-method returns until a call
    /// matching `predicate` is found. This is what lets builder chains
    /// match whether they are inlined, stored in variables or returned
    /// from helpers.
    pub fn resolve_to_call(
        &self,
        expr: ExprId,
        predicate: &impl Fn(&SourceTree, ExprId) -> bool
    ) -> Option<ExprId> {
        let mut walk = Walk::default();
        self.chase(expr, &mut walk, &|tree, id| {
            tree.as_call(id).is_some() && predicate(tree, id)
        })
    }

    /// Follows the same shapes as [`Self::resolve_to_call`] until any
    /// expression matching `predicate` is found.
    pub fn resolve_to_expr(
        &self,
        expr: ExprId,
        predicate: &impl Fn(&SourceTree, ExprId) -> bool
    ) -> Option<ExprId> {
        let mut walk = Walk::default();
        self.chase(expr, &mut walk, predicate)
    }

    /// Follows the same shapes as [`Self::resolve_to_call`] until a list
    /// literal (or a lowered list-factory call) is found, returning its
    /// elements.
    pub fn resolve_to_list_elements(&self, expr: ExprId) -> Option<Vec<ExprId>> {
        let mut walk = Walk::default();
        let found = self.chase(expr, &mut walk, &|tree, id| {
            matches!(tree.kind(id), ExprKind::ListLiteral(_)) || is_list_factory_call(tree, id)
        })?;
        match self.tree.kind(found) {
            ExprKind::ListLiteral(elements) => Some(elements.clone()),
            ExprKind::Call(call) => Some(call.args.clone()),
            _ => None
        }
    }

    fn chase(
        &self,
        expr: ExprId,
        walk: &mut Walk,
        accept: &impl Fn(&SourceTree, ExprId) -> bool
    ) -> Option<ExprId> {
        let expr = self.tree.meaningful(expr);
        if accept(self.tree, expr) {
            return Some(expr);
        }

        if !walk.enter(VisitKey::Expr(expr), self.limits.max_inline_depth) {
            return None;
        }

        match &self.tree.expr(expr).kind {
            ExprKind::VarRef {
                decl, ..
            } => match (*decl)? {
                DeclRef::Local(local) => {
                    self.chase(self.tree.local(local).initializer?, walk, accept)
                }
                DeclRef::Field(field) => {
                    let data = self.tree.field(field);
                    if let Some(initializer) = data.initializer
                        && let Some(found) = self.chase(initializer, walk, accept)
                    {
                        return Some(found);
                    }
                    // fall back to the last assignment before use; the
                    // front end records sites in program order
                    let last = data
                        .assignments
                        .iter()
                        .rev()
                        .take(self.limits.max_assignment_sites)
                        .find_map(|site| self.chase(*site, walk, accept));
                    last
                }
                _ => None
            },
            ExprKind::Call(call) => {
                let target = call.target?;
                let method = self.tree.method(target);
                if method.is_overridable || method.kind == MethodKind::Constructor {
                    return None;
                }
                method
                    .returns
                    .clone()
                    .into_iter()
                    .find_map(|returned| self.chase(returned, walk, accept))
            }
            _ => None
        }
    }
}

fn method_is_inlinable(kind: MethodKind, is_private: bool, is_static: bool) -> bool {
    kind == MethodKind::Method && (is_private || is_static)
}

fn is_list_factory_call(tree: &SourceTree, id: ExprId) -> bool {
    let Some(call) = tree.as_call(id) else {
        return false;
    };
    match call.method.as_str() {
        "of" => tree.call_declared_in(id, "java.util.List"),
        "asList" => tree.call_declared_in(id, "java.util.Arrays"),
        "singletonList" => tree.call_declared_in(id, "java.util.Collections"),
        _ => false
    }
}

fn literal_constant(literal: &Literal) -> ResolvedConstant {
    match literal {
        Literal::Null => ResolvedConstant {
            value:      Value::Null,
            value_type: BsonType::Null
        },
        Literal::Boolean(value) => ResolvedConstant {
            value:      Value::Boolean(*value),
            value_type: BsonType::Boolean
        },
        Literal::Int32(value) => ResolvedConstant {
            value:      Value::Int32(*value),
            value_type: BsonType::Int32
        },
        Literal::Int64(value) => ResolvedConstant {
            value:      Value::Int64(*value),
            value_type: BsonType::Int64
        },
        Literal::Double(value) => ResolvedConstant {
            value:      Value::Double(*value),
            value_type: BsonType::Double
        },
        // string literals are reference values and may be absent when
        // they flow through nullable host types
        Literal::String(value) => ResolvedConstant {
            value:      Value::String(value.clone()),
            value_type: BsonType::nullable(BsonType::String)
        }
    }
}

fn append_to_string(folded: &mut String, value: &Value) -> Option<()> {
    match value {
        Value::String(part) => folded.push_str(part),
        Value::Int32(part) => folded.push_str(&part.to_string()),
        Value::Int64(part) => folded.push_str(&part.to_string()),
        Value::Double(part) => folded.push_str(&part.to_string()),
        Value::Boolean(part) => folded.push_str(if *part { "true" } else { "false" }),
        Value::Null => folded.push_str("null"),
        Value::Array(_) => return None
    }
    Some(())
}
