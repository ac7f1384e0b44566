//! Payload types for the components that can be attached to an IR node.

use std::fmt;

use compact_str::CompactString;
use serde::Serialize;

use crate::ir::{node::Node, types::BsonType};

/// A (database, collection) pair identifying a query's target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Namespace {
    pub database:   CompactString,
    pub collection: CompactString
}

impl Namespace {
    pub fn new(database: impl Into<CompactString>, collection: impl Into<CompactString>) -> Self {
        Self {
            database:   database.into(),
            collection: collection.into()
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// The command a query expression executes, as classified from the
/// terminal call of its method chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CommandType {
    Aggregate,
    CountDocuments,
    DeleteMany,
    DeleteOne,
    Distinct,
    EstimatedDocumentCount,
    FindMany,
    FindOne,
    FindOneAndDelete,
    FindOneAndReplace,
    FindOneAndUpdate,
    InsertMany,
    InsertOne,
    ReplaceOne,
    UpdateMany,
    UpdateOne,
    /// An update with upsert semantics.
    Upsert,
    Unknown
}

impl CommandType {
    /// The driver spelling of the command.
    pub fn canonical(self) -> &'static str {
        match self {
            Self::Aggregate => "aggregate",
            Self::CountDocuments => "countDocuments",
            Self::DeleteMany => "deleteMany",
            Self::DeleteOne => "deleteOne",
            Self::Distinct => "distinct",
            Self::EstimatedDocumentCount => "estimatedDocumentCount",
            Self::FindMany => "find",
            Self::FindOne => "findOne",
            Self::FindOneAndDelete => "findOneAndDelete",
            Self::FindOneAndReplace => "findOneAndReplace",
            Self::FindOneAndUpdate => "findOneAndUpdate",
            Self::InsertMany => "insertMany",
            Self::InsertOne => "insertOne",
            Self::ReplaceOne => "replaceOne",
            Self::UpdateMany => "updateMany",
            Self::UpdateOne => "updateOne",
            Self::Upsert => "updateOne",
            Self::Unknown => "<unknown>"
        }
    }

    /// Whether the server consults indexes when executing this command.
    /// Downstream index-related linting rules key off this.
    pub fn uses_indexes(self) -> bool {
        !matches!(
            self,
            Self::InsertOne | Self::InsertMany | Self::ReplaceOne | Self::Unknown
        )
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

/// The query-builder API a node was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[non_exhaustive]
pub enum DialectName {
    /// Driver-style static builder calls (`Filters.eq`, `Updates.set`).
    DriverBuilder,
    /// Chained criteria instance calls (`where(..).is(..)`).
    FluentCriteria
}

impl fmt::Display for DialectName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DriverBuilder => write!(f, "driver-builder"),
            Self::FluentCriteria => write!(f, "fluent-criteria")
        }
    }
}

/// A constant value recovered by the reference resolver.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Double(f64),
    String(CompactString),
    Array(Vec<Value>)
}

impl Value {
    pub fn string(value: impl Into<CompactString>) -> Self {
        Value::String(value.into())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) => Some(value.as_str()),
            _ => None
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int32(value) => Some(i64::from(*value)),
            Value::Int64(value) => Some(*value),
            _ => None
        }
    }
}

/// The collection (and, if resolvable, database) a query targets.
///
/// Resolution never fails: missing information degrades through
/// `OnlyCollection` down to `Unknown` instead of erroring. Downstream
/// consumers must treat `OnlyCollection` as incomplete but usable — a lot
/// of valid multi-tenant code statically fixes only the collection name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CollectionReference<S> {
    Known {
        /// Source of the database name argument, when parsed from code.
        database_source:   Option<S>,
        /// Source of the collection name argument, when parsed from code.
        collection_source: Option<S>,
        namespace:         Namespace
    },
    OnlyCollection {
        collection_source: Option<S>,
        collection:        CompactString
    },
    Unknown
}

impl<S> CollectionReference<S> {
    pub fn known(namespace: Namespace) -> Self {
        Self::Known {
            database_source: None,
            collection_source: None,
            namespace
        }
    }

    pub fn namespace(&self) -> Option<&Namespace> {
        match self {
            Self::Known {
                namespace, ..
            } => Some(namespace),
            _ => None
        }
    }

    pub fn collection(&self) -> Option<&str> {
        match self {
            Self::Known {
                namespace, ..
            } => Some(namespace.collection.as_str()),
            Self::OnlyCollection {
                collection, ..
            } => Some(collection.as_str()),
            Self::Unknown => None
        }
    }
}

/// A reference to a document field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum FieldReference<S> {
    /// Statically written in code and expected to exist in the target
    /// namespace's schema.
    FromSchema {
        source:       S,
        field_name:   CompactString,
        display_name: CompactString
    },
    /// Part of a schema but not spelled out in code, like the `_id`
    /// created by a group stage.
    Inferred {
        source:       S,
        field_name:   CompactString,
        display_name: CompactString
    },
    /// Does not exist in the original schema; its value is produced by the
    /// attached expression.
    Computed {
        source:     S,
        field_name: CompactString,
        expression: Box<Node<S>>
    },
    /// Not enough metadata to classify the reference.
    Unknown
}

impl<S> FieldReference<S> {
    pub fn from_schema(source: S, field_name: impl Into<CompactString>) -> Self {
        let field_name = field_name.into();
        Self::FromSchema {
            source,
            display_name: field_name.clone(),
            field_name
        }
    }

    pub fn inferred(source: S, field_name: impl Into<CompactString>) -> Self {
        let field_name = field_name.into();
        Self::Inferred {
            source,
            display_name: field_name.clone(),
            field_name
        }
    }

    pub fn field_name(&self) -> Option<&str> {
        match self {
            Self::FromSchema {
                field_name, ..
            }
            | Self::Inferred {
                field_name, ..
            }
            | Self::Computed {
                field_name, ..
            } => Some(field_name.as_str()),
            Self::Unknown => None
        }
    }
}

/// A type computed from an expression subtree rather than declared in the
/// host program, like `"$year"` in an accumulator position.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputedType<S> {
    pub base_type:  BsonType,
    pub expression: Box<Node<S>>
}

/// A reference to a value taking part in a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ValueReference<S> {
    /// Fully resolved at analysis time by constant folding.
    Constant {
        source:     S,
        value:      Value,
        value_type: BsonType
    },
    /// Known only at runtime; the static type is the best information
    /// available.
    Runtime {
        source:       S,
        runtime_type: BsonType
    },
    /// Not written in code but implied by the operator's own semantics,
    /// like the `true` of a single-argument `exists`.
    Inferred {
        source:     S,
        value:      Value,
        value_type: BsonType
    },
    /// Produced by an expression subtree, like a `"$field"` reference.
    Computed {
        source:   S,
        computed: ComputedType<S>
    },
    Unknown
}

impl<S> ValueReference<S> {
    pub fn value_type(&self) -> Option<&BsonType> {
        match self {
            Self::Constant {
                value_type, ..
            }
            | Self::Inferred {
                value_type, ..
            } => Some(value_type),
            Self::Runtime {
                runtime_type, ..
            } => Some(runtime_type),
            Self::Computed {
                computed, ..
            } => Some(&computed.base_type),
            Self::Unknown => None
        }
    }

    pub fn constant_value(&self) -> Option<&Value> {
        match self {
            Self::Constant {
                value, ..
            } => Some(value),
            _ => None
        }
    }
}
