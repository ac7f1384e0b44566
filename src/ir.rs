//! The dialect-independent query intermediate representation.
//!
//! A parsed query is a tree of [`Node`]s. Each node carries a handle to the
//! source expression it was recognized from and a set of [`Component`]
//! attachments that give it meaning: the command it executes, the
//! collection it targets, the operator it applies, the field and value it
//! references. Linting rules and autocompletion consume this model without
//! knowing which builder API produced it.

mod components;
mod name;
mod node;
mod types;

pub use components::{
    CollectionReference, CommandType, ComputedType, DialectName, FieldReference, Namespace, Value,
    ValueReference
};
pub use name::Name;
pub use node::{Component, ComponentKind, ComponentVec, Node};
pub use types::BsonType;
