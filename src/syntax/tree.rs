//! The arena holding the already-parsed host syntax the engine analyzes.
//!
//! The core never parses text (that is the front end's job); it reads
//! expressions, declarations and types out of this exchange model through
//! cheap copyable ids. All lookups are total: the ids are produced by the
//! builder and stay valid for the lifetime of the tree.

use compact_str::CompactString;
use serde::Serialize;

use crate::syntax::types::TypeDescriptor;

/// Handle to an expression in the source tree. This is the `Source` handle
/// embedded in IR nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ExprId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct ClassId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MethodId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FieldId(pub(crate) u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LocalId(pub(crate) u32);

/// A literal value as written in source.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    String(CompactString)
}

/// What an identifier resolves to, as reported by the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclRef {
    Local(LocalId),
    Field(FieldId),
    Param {
        method: MethodId,
        index:  usize
    },
    EnumConstant {
        class: ClassId,
        index: usize
    }
}

/// A method call expression, the workhorse of builder chains.
#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub receiver: Option<ExprId>,
    pub method:   CompactString,
    pub args:     Vec<ExprId>,
    /// Name of the class declaring the resolved method, when the front end
    /// could resolve the call to a single candidate.
    pub declaring_class: Option<CompactString>,
    /// The resolved target, only present for methods declared in the
    /// analyzed sources (used for bounded inlining).
    pub target: Option<MethodId>
}

/// A constructor invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpr {
    pub class:      Option<ClassId>,
    pub class_name: CompactString,
    pub args:       Vec<ExprId>
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    /// Concatenation of string operands, in evaluation order.
    StringConcat(Vec<ExprId>),
    /// A read of a named declaration.
    VarRef {
        name: CompactString,
        decl: Option<DeclRef>
    },
    Call(CallExpr),
    New(NewExpr),
    /// A class literal (`Book.class` style arguments).
    ClassRef {
        class: Option<ClassId>,
        name:  CompactString
    },
    /// An inline list construction (`List.of(..)` and friends, already
    /// lowered by the front end).
    ListLiteral(Vec<ExprId>),
    Parenthesized(ExprId),
    /// An expression the front end cannot express structurally.
    Opaque
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExprData {
    pub kind:        ExprKind,
    pub static_type: Option<TypeDescriptor>,
    pub enclosing:   Option<MethodId>
}

/// A single-assignment local variable.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalData {
    pub name:        CompactString,
    pub initializer: Option<ExprId>
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldData {
    pub name:          CompactString,
    pub class:         Option<ClassId>,
    pub declared_type: Option<TypeDescriptor>,
    pub is_final:      bool,
    pub initializer:   Option<ExprId>,
    /// Every assignment site outside constructors, in program order.
    pub assignments: Vec<ExprId>
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamData {
    pub name:       CompactString,
    pub param_type: Option<TypeDescriptor>
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Method,
    Constructor
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelegationKind {
    /// `this(..)` — delegates to a sibling constructor.
    This,
    /// `super(..)` — delegates to a base-class constructor.
    Super
}

/// A constructor's delegation to another constructor.
#[derive(Debug, Clone, PartialEq)]
pub struct Delegation {
    pub kind:   DelegationKind,
    pub target: Option<MethodId>,
    pub args:   Vec<ExprId>
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodData {
    pub name:       CompactString,
    pub class:      Option<ClassId>,
    pub kind:       MethodKind,
    pub params:     Vec<ParamData>,
    pub is_private: bool,
    pub is_static:  bool,
    /// Whether dynamic dispatch could select an override; such methods are
    /// never inlined.
    pub is_overridable: bool,
    /// Return expressions, in program order.
    pub returns: Vec<ExprId>,
    /// Field assignments performed in the body (constructors mostly).
    pub field_assignments: Vec<(FieldId, ExprId)>,
    pub delegation:        Option<Delegation>
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassKind {
    Class,
    Enum
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassData {
    pub name:       CompactString,
    pub kind:       ClassKind,
    pub superclass: Option<ClassId>,
    pub fields:     Vec<FieldId>,
    pub methods:    Vec<MethodId>,
    pub constructors: Vec<MethodId>,
    pub enum_constants: Vec<CompactString>,
    /// Collection name bound to this class by an entity mapping
    /// annotation, when the front end saw one.
    pub mapped_collection: Option<CompactString>
}

/// The arena of source expressions and declarations for one analyzed
/// compilation unit (or fixture).
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SourceTree {
    pub(crate) exprs:   Vec<ExprData>,
    pub(crate) classes: Vec<ClassData>,
    pub(crate) methods: Vec<MethodData>,
    pub(crate) fields:  Vec<FieldData>,
    pub(crate) locals:  Vec<LocalData>
}

impl SourceTree {
    pub fn builder() -> super::build::SourceTreeBuilder {
        super::build::SourceTreeBuilder::new()
    }

    pub fn expr(&self, id: ExprId) -> &ExprData {
        &self.exprs[id.0 as usize]
    }

    pub fn class(&self, id: ClassId) -> &ClassData {
        &self.classes[id.0 as usize]
    }

    pub fn method(&self, id: MethodId) -> &MethodData {
        &self.methods[id.0 as usize]
    }

    pub fn field(&self, id: FieldId) -> &FieldData {
        &self.fields[id.0 as usize]
    }

    pub fn local(&self, id: LocalId) -> &LocalData {
        &self.locals[id.0 as usize]
    }

    /// Resolves to the first meaningful expression, skipping wrappers with
    /// no semantic weight (parentheses).
    pub fn meaningful(&self, id: ExprId) -> ExprId {
        let mut current = id;
        while let ExprKind::Parenthesized(inner) = &self.expr(current).kind {
            current = *inner;
        }
        current
    }

    pub fn kind(&self, id: ExprId) -> &ExprKind {
        &self.expr(self.meaningful(id)).kind
    }

    /// The call view of an expression, when it is one.
    pub fn as_call(&self, id: ExprId) -> Option<&CallExpr> {
        match self.kind(id) {
            ExprKind::Call(call) => Some(call),
            _ => None
        }
    }

    pub fn receiver(&self, id: ExprId) -> Option<ExprId> {
        self.as_call(id).and_then(|call| call.receiver)
    }

    pub fn arguments(&self, id: ExprId) -> &[ExprId] {
        self.as_call(id).map(|call| call.args.as_slice()).unwrap_or(&[])
    }

    pub fn static_type(&self, id: ExprId) -> Option<&TypeDescriptor> {
        self.expr(self.meaningful(id)).static_type.as_ref()
    }

    /// The declaration an identifier read resolves to.
    pub fn declaration(&self, id: ExprId) -> Option<DeclRef> {
        match self.kind(id) {
            ExprKind::VarRef {
                decl, ..
            } => *decl,
            _ => None
        }
    }

    /// The single-candidate target of a call, when the front end resolved
    /// one inside the analyzed sources.
    pub fn call_target(&self, id: ExprId) -> Option<MethodId> {
        self.as_call(id).and_then(|call| call.target)
    }

    pub fn enclosing_method(&self, id: ExprId) -> Option<MethodId> {
        self.expr(id).enclosing
    }

    pub fn enclosing_class(&self, id: ExprId) -> Option<ClassId> {
        self.enclosing_method(id)
            .and_then(|method| self.method(method).class)
    }

    /// Whether `sub` is `base` or one of its subclasses.
    pub fn is_same_or_subclass(&self, sub: ClassId, base: ClassId) -> bool {
        let mut current = Some(sub);
        while let Some(class) = current {
            if class == base {
                return true;
            }
            current = self.class(class).superclass;
        }
        false
    }

    /// The direct sub-expressions of an expression, in source order.
    pub fn child_exprs(&self, id: ExprId) -> Vec<ExprId> {
        match &self.expr(id).kind {
            ExprKind::Call(call) => {
                let mut children = Vec::with_capacity(call.args.len() + 1);
                if let Some(receiver) = call.receiver {
                    children.push(receiver);
                }
                children.extend(call.args.iter().copied());
                children
            }
            ExprKind::New(new_expr) => new_expr.args.clone(),
            ExprKind::StringConcat(parts) => parts.clone(),
            ExprKind::ListLiteral(elements) => elements.clone(),
            ExprKind::Parenthesized(inner) => vec![*inner],
            _ => Vec::new()
        }
    }

    /// Depth-first traversal of an expression subtree, including `root`.
    pub fn walk_exprs(&self, root: ExprId, visit: &mut impl FnMut(ExprId)) {
        visit(root);
        for child in self.child_exprs(root) {
            self.walk_exprs(child, visit);
        }
    }

    /// Whether the resolved declaring class of a call matches `fqn`, by
    /// qualified or simple name.
    pub fn call_declared_in(&self, id: ExprId, fqn: &str) -> bool {
        let declaring = self.as_call(id).and_then(|call| {
            call.declaring_class.as_deref().or_else(|| {
                call.target
                    .and_then(|target| self.method(target).class)
                    .map(|class| self.class(class).name.as_str())
            })
        });
        match declaring {
            Some(name) => {
                name == fqn
                    || fqn.rsplit('.').next() == Some(name)
                    || name.rsplit('.').next() == Some(fqn)
            }
            None => false
        }
    }
}
