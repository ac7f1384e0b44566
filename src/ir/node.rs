//! The component-tagged node that is the building block of the query IR.
//!
//! Nodes have no semantics of their own; meaning comes from the components
//! attached to them. A filter like `eq("year", 1994)` becomes one node
//! with three attachments: the operation name, a field reference and a
//! value reference. Children are reachable only through the component that
//! owns them (`HasFilter`, `HasUpdates`, ...), never through a generic
//! child list, so each command kind declares exactly the shape it needs.

use compact_str::CompactString;
use indexmap::IndexSet;
use serde::Serialize;
use smallvec::SmallVec;

use crate::ir::{
    components::{CollectionReference, CommandType, DialectName, FieldReference, ValueReference},
    name::Name
};

/// Type alias for the component list of a node (typically < 4 attachments)
pub type ComponentVec<S> = SmallVec<[Component<S>; 4]>;

/// A semantic attachment of a [`Node`]. At most one component of each kind
/// can be attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Component<S> {
    IsCommand(CommandType),
    HasSourceDialect(DialectName),
    HasCollectionReference(CollectionReference<S>),
    HasFilter(Vec<Node<S>>),
    HasUpdates(Vec<Node<S>>),
    /// Aggregation pipeline stages, in pipeline order.
    HasAggregation(Vec<Node<S>>),
    HasProjections(Vec<Node<S>>),
    HasSorts(Vec<Node<S>>),
    HasAddedFields(Vec<Node<S>>),
    HasAccumulatedFields(Vec<Node<S>>),
    HasLimit(u32),
    Named(Name),
    HasFieldReference(FieldReference<S>),
    HasValueReference(ValueReference<S>)
}

/// The kind discriminant of a [`Component`], used as the attachment key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ComponentKind {
    IsCommand,
    HasSourceDialect,
    HasCollectionReference,
    HasFilter,
    HasUpdates,
    HasAggregation,
    HasProjections,
    HasSorts,
    HasAddedFields,
    HasAccumulatedFields,
    HasLimit,
    Named,
    HasFieldReference,
    HasValueReference
}

impl<S> Component<S> {
    pub fn kind(&self) -> ComponentKind {
        match self {
            Self::IsCommand(_) => ComponentKind::IsCommand,
            Self::HasSourceDialect(_) => ComponentKind::HasSourceDialect,
            Self::HasCollectionReference(_) => ComponentKind::HasCollectionReference,
            Self::HasFilter(_) => ComponentKind::HasFilter,
            Self::HasUpdates(_) => ComponentKind::HasUpdates,
            Self::HasAggregation(_) => ComponentKind::HasAggregation,
            Self::HasProjections(_) => ComponentKind::HasProjections,
            Self::HasSorts(_) => ComponentKind::HasSorts,
            Self::HasAddedFields(_) => ComponentKind::HasAddedFields,
            Self::HasAccumulatedFields(_) => ComponentKind::HasAccumulatedFields,
            Self::HasLimit(_) => ComponentKind::HasLimit,
            Self::Named(_) => ComponentKind::Named,
            Self::HasFieldReference(_) => ComponentKind::HasFieldReference,
            Self::HasValueReference(_) => ComponentKind::HasValueReference
        }
    }

    fn children(&self) -> Option<&[Node<S>]> {
        match self {
            Self::HasFilter(children)
            | Self::HasUpdates(children)
            | Self::HasAggregation(children)
            | Self::HasProjections(children)
            | Self::HasSorts(children)
            | Self::HasAddedFields(children)
            | Self::HasAccumulatedFields(children) => Some(children),
            _ => None
        }
    }
}

/// A node of the query IR, owning a handle to the source expression it was
/// parsed from plus its component attachments.
///
/// Created once per `parse` invocation and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node<S> {
    source:     S,
    components: ComponentVec<S>
}

impl<S: Copy> Node<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            components: ComponentVec::new()
        }
    }

    /// Attaches a component, replacing any existing component of the same
    /// kind to keep the at-most-one-per-kind invariant.
    pub fn with(mut self, component: Component<S>) -> Self {
        self.attach(component);
        self
    }

    pub fn with_all(mut self, components: impl IntoIterator<Item = Component<S>>) -> Self {
        for component in components {
            self.attach(component);
        }
        self
    }

    fn attach(&mut self, component: Component<S>) {
        let kind = component.kind();
        self.components.retain(|existing| existing.kind() != kind);
        self.components.push(component);
    }

    pub fn source(&self) -> S {
        self.source
    }

    /// Looks up the attachment of the given kind. Absence is an ordinary
    /// empty result, never an error.
    pub fn component(&self, kind: ComponentKind) -> Option<&Component<S>> {
        self.components
            .iter()
            .find(|component| component.kind() == kind)
    }

    pub fn has_component(&self, kind: ComponentKind) -> bool {
        self.component(kind).is_some()
    }

    pub fn components(&self) -> &[Component<S>] {
        &self.components
    }

    pub fn command(&self) -> Option<CommandType> {
        match self.component(ComponentKind::IsCommand) {
            Some(Component::IsCommand(command)) => Some(*command),
            _ => None
        }
    }

    pub fn source_dialect(&self) -> Option<DialectName> {
        match self.component(ComponentKind::HasSourceDialect) {
            Some(Component::HasSourceDialect(dialect)) => Some(*dialect),
            _ => None
        }
    }

    pub fn operation_name(&self) -> Option<Name> {
        match self.component(ComponentKind::Named) {
            Some(Component::Named(name)) => Some(*name),
            _ => None
        }
    }

    pub fn collection_reference(&self) -> Option<&CollectionReference<S>> {
        match self.component(ComponentKind::HasCollectionReference) {
            Some(Component::HasCollectionReference(reference)) => Some(reference),
            _ => None
        }
    }

    pub fn field_reference(&self) -> Option<&FieldReference<S>> {
        match self.component(ComponentKind::HasFieldReference) {
            Some(Component::HasFieldReference(reference)) => Some(reference),
            _ => None
        }
    }

    pub fn value_reference(&self) -> Option<&ValueReference<S>> {
        match self.component(ComponentKind::HasValueReference) {
            Some(Component::HasValueReference(reference)) => Some(reference),
            _ => None
        }
    }

    pub fn limit(&self) -> Option<u32> {
        match self.component(ComponentKind::HasLimit) {
            Some(Component::HasLimit(limit)) => Some(*limit),
            _ => None
        }
    }

    /// The children owned by the attachment of the given kind, or an empty
    /// slice when the component is absent or carries no children.
    pub fn children_of(&self, kind: ComponentKind) -> &[Node<S>] {
        self.component(kind)
            .and_then(Component::children)
            .unwrap_or(&[])
    }

    pub fn filter_children(&self) -> &[Node<S>] {
        self.children_of(ComponentKind::HasFilter)
    }

    pub fn update_children(&self) -> &[Node<S>] {
        self.children_of(ComponentKind::HasUpdates)
    }

    pub fn aggregation_stages(&self) -> &[Node<S>] {
        self.children_of(ComponentKind::HasAggregation)
    }

    pub fn projection_children(&self) -> &[Node<S>] {
        self.children_of(ComponentKind::HasProjections)
    }

    pub fn sort_children(&self) -> &[Node<S>] {
        self.children_of(ComponentKind::HasSorts)
    }

    pub fn added_fields(&self) -> &[Node<S>] {
        self.children_of(ComponentKind::HasAddedFields)
    }

    pub fn accumulated_fields(&self) -> &[Node<S>] {
        self.children_of(ComponentKind::HasAccumulatedFields)
    }

    /// All schema field names referenced anywhere in this tree, deduped in
    /// first-seen order. Consumers use this to key caches and drive
    /// field-aware diagnostics.
    pub fn schema_field_names(&self) -> IndexSet<CompactString> {
        let mut names = IndexSet::new();
        self.collect_schema_field_names(&mut names);
        names
    }

    fn collect_schema_field_names(&self, names: &mut IndexSet<CompactString>) {
        if let Some(FieldReference::FromSchema {
            field_name, ..
        }) = self.field_reference()
        {
            names.insert(field_name.clone());
        }
        for component in &self.components {
            if let Some(children) = component.children() {
                for child in children {
                    child.collect_schema_field_names(names);
                }
            }
        }
    }
}
