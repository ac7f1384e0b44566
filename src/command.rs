//! Classification of the command a call chain executes.
//!
//! The terminal call of a chain names the command. Cursors need care: a
//! `find(..)` narrowed by `.first()` is a single-document read and the
//! attachment point becomes the whole chain, while any other cursor
//! accessor (materializing into a collection, iterating) keeps the
//! attachment at the `find(..)` call itself, one level inside the full
//! expression.

use crate::{
    ir::CommandType,
    syntax::{ExprId, SourceTree}
};

/// Cursor accessors that consume a find/aggregate iterable without
/// changing what the query is.
const CURSOR_ACCESSORS: &[&str] = &["into", "iterator", "cursor", "forEach", "toList", "map"];

/// Cursor modifiers that contribute metadata (sorts, limits) to the query
/// they are chained onto.
pub const CURSOR_MODIFIERS: &[&str] = &["sort", "limit", "skip", "projection", "batchSize"];

/// Classifies the command executed by the given call expression.
pub fn classify(tree: &SourceTree, expr: ExprId) -> CommandType {
    let Some(call) = tree.as_call(expr) else {
        return CommandType::Unknown;
    };

    if call.method.as_str() == "first" {
        // `first()` narrows a find cursor to one document; on any other
        // iterable it is not a recognized command
        let inner = call.receiver.map(|receiver| tree.meaningful(receiver));
        return match inner.map(|receiver| classify(tree, receiver)) {
            Some(CommandType::FindMany) => CommandType::FindOne,
            _ => CommandType::Unknown
        };
    }

    command_for_method_name(call.method.as_str())
}

fn command_for_method_name(name: &str) -> CommandType {
    match name {
        "countDocuments" => CommandType::CountDocuments,
        "estimatedDocumentCount" => CommandType::EstimatedDocumentCount,
        "distinct" => CommandType::Distinct,
        "find" => CommandType::FindMany,
        "aggregate" => CommandType::Aggregate,
        "insertOne" => CommandType::InsertOne,
        "insertMany" => CommandType::InsertMany,
        "deleteOne" => CommandType::DeleteOne,
        "deleteMany" => CommandType::DeleteMany,
        "replaceOne" => CommandType::ReplaceOne,
        "updateOne" => CommandType::UpdateOne,
        "updateMany" => CommandType::UpdateMany,
        "findOneAndDelete" => CommandType::FindOneAndDelete,
        "findOneAndReplace" => CommandType::FindOneAndReplace,
        "findOneAndUpdate" => CommandType::FindOneAndUpdate,
        _ => CommandType::Unknown
    }
}

/// The attachment point for a candidate expression: the outermost call in
/// its receiver chain that classifies as a known command. For
/// `find(..).first()` that is the whole chain; for `find(..).into(..)`
/// the accessor classifies as unknown and the attachment stays at the
/// inner `find(..)`.
pub fn attachment(tree: &SourceTree, expr: ExprId) -> Option<ExprId> {
    let mut current = Some(tree.meaningful(expr));
    while let Some(id) = current {
        if classify(tree, id) != CommandType::Unknown {
            return Some(id);
        }
        current = tree.receiver(id).map(|receiver| tree.meaningful(receiver));
    }
    None
}

/// The call whose arguments carry the filters/updates for the classified
/// command. Identical to the attachment except for cursor-narrowed reads,
/// where the arguments live on the inner `find(..)` call.
pub fn command_call(tree: &SourceTree, attachment: ExprId, command: CommandType) -> ExprId {
    if command == CommandType::FindOne
        && let Some(call) = tree.as_call(attachment)
        && call.method.as_str() == "first"
        && let Some(receiver) = call.receiver
    {
        return tree.meaningful(receiver);
    }
    attachment
}

/// Whether a call is a cursor accessor that consumes an iterable.
pub fn is_cursor_accessor(tree: &SourceTree, expr: ExprId) -> bool {
    tree.as_call(expr).is_some_and(|call| {
        call.method.as_str() == "first" || CURSOR_ACCESSORS.contains(&call.method.as_str())
    })
}

/// The chain of cursor modifier calls between the outer expression and the
/// command call, outermost first.
pub fn cursor_modifier_calls(
    tree: &SourceTree,
    outer: ExprId,
    command_call: ExprId
) -> Vec<ExprId> {
    let mut modifiers = Vec::new();
    let mut current = Some(tree.meaningful(outer));
    while let Some(id) = current {
        if id == command_call {
            break;
        }
        if let Some(call) = tree.as_call(id) {
            if CURSOR_MODIFIERS.contains(&call.method.as_str()) {
                modifiers.push(id);
            }
            current = call.receiver.map(|receiver| tree.meaningful(receiver));
        } else {
            break;
        }
    }
    modifiers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syntax::SourceTree;

    #[test]
    fn terminal_names_classify_by_table() {
        let mut b = SourceTree::builder();
        let coll = b.opaque(None);
        let call = b.call(Some(coll), "countDocuments", vec![]);
        let tree = b.finish();
        assert_eq!(classify(&tree, call), CommandType::CountDocuments);
    }

    #[test]
    fn unknown_names_classify_as_unknown_without_failing() {
        let mut b = SourceTree::builder();
        let coll = b.opaque(None);
        let call = b.call(Some(coll), "bulkWrite", vec![]);
        let tree = b.finish();
        assert_eq!(classify(&tree, call), CommandType::Unknown);
    }

    #[test]
    fn first_on_find_narrows_to_find_one() {
        let mut b = SourceTree::builder();
        let coll = b.opaque(None);
        let find = b.call(Some(coll), "find", vec![]);
        let first = b.call(Some(find), "first", vec![]);
        let tree = b.finish();

        assert_eq!(classify(&tree, first), CommandType::FindOne);
        assert_eq!(attachment(&tree, first), Some(first));
        assert_eq!(command_call(&tree, first, CommandType::FindOne), find);
    }

    #[test]
    fn first_on_non_find_iterable_is_unknown() {
        let mut b = SourceTree::builder();
        let coll = b.opaque(None);
        let aggregate = b.call(Some(coll), "aggregate", vec![]);
        let first = b.call(Some(aggregate), "first", vec![]);
        let tree = b.finish();

        assert_eq!(classify(&tree, first), CommandType::Unknown);
    }

    #[test]
    fn materializing_accessor_keeps_attachment_inside() {
        let mut b = SourceTree::builder();
        let coll = b.opaque(None);
        let find = b.call(Some(coll), "find", vec![]);
        let list = b.opaque(None);
        let into = b.call(Some(find), "into", vec![list]);
        let tree = b.finish();

        assert_eq!(classify(&tree, into), CommandType::Unknown);
        assert_eq!(attachment(&tree, into), Some(find));
    }
}
