//! Exchange model for the externally-parsed host syntax tree.
//!
//! The front end owns text parsing and symbol resolution; it lowers its
//! result into this arena, and the engine reads it back through the
//! operations on [`SourceTree`]: receiver, arguments, static type,
//! declaration resolution and single-candidate call targets.

mod build;
mod tree;
mod types;

pub use build::SourceTreeBuilder;
pub use tree::{
    CallExpr, ClassData, ClassId, ClassKind, DeclRef, Delegation, DelegationKind, ExprData, ExprId,
    ExprKind, FieldData, FieldId, Literal, LocalData, LocalId, MethodData, MethodId, MethodKind,
    NewExpr, ParamData, SourceTree
};
pub use types::{PrimitiveType, TypeDescriptor};
