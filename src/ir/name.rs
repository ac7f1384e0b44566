//! Canonical names for the operators, stages and accumulators the dialect
//! matchers recognize.

use std::fmt;

use serde::Serialize;

/// A canonical representation of recognized operations.
///
/// `Unknown` is the catch-all for calls that occupy the position of a
/// query-building call without being one the matchers understand; such
/// calls still produce IR nodes instead of being dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Name {
    All,
    And,
    ElemMatch,
    Eq,
    Exists,
    Gt,
    Gte,
    In,
    Inc,
    Lt,
    Lte,
    Mul,
    Ne,
    Nin,
    Nor,
    Not,
    Or,
    Pop,
    Pull,
    PullAll,
    Push,
    Regex,
    Rename,
    Set,
    SetOnInsert,
    Size,
    Unset,
    Combine,
    Match,
    Project,
    Include,
    Exclude,
    Group,
    Sort,
    Limit,
    Unwind,
    AddFields,
    Sum,
    Avg,
    First,
    Last,
    Max,
    Min,
    AddToSet,
    Ascending,
    Descending,
    Unknown
}

impl Name {
    /// The canonical spelling of the operation in builder APIs.
    pub fn canonical(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::And => "and",
            Self::ElemMatch => "elemMatch",
            Self::Eq => "eq",
            Self::Exists => "exists",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::In => "in",
            Self::Inc => "inc",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Mul => "mul",
            Self::Ne => "ne",
            Self::Nin => "nin",
            Self::Nor => "nor",
            Self::Not => "not",
            Self::Or => "or",
            Self::Pop => "pop",
            Self::Pull => "pull",
            Self::PullAll => "pullAll",
            Self::Push => "push",
            Self::Regex => "regex",
            Self::Rename => "rename",
            Self::Set => "set",
            Self::SetOnInsert => "setOnInsert",
            Self::Size => "size",
            Self::Unset => "unset",
            Self::Combine => "combine",
            Self::Match => "match",
            Self::Project => "project",
            Self::Include => "include",
            Self::Exclude => "exclude",
            Self::Group => "group",
            Self::Sort => "sort",
            Self::Limit => "limit",
            Self::Unwind => "unwind",
            Self::AddFields => "addFields",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::First => "first",
            Self::Last => "last",
            Self::Max => "max",
            Self::Min => "min",
            Self::AddToSet => "addToSet",
            Self::Ascending => "ascending",
            Self::Descending => "descending",
            Self::Unknown => "<unknown operator>"
        }
    }

    /// Looks up a canonical spelling, falling back to `Unknown` for
    /// anything unrecognized.
    pub fn from_canonical(canonical: &str) -> Name {
        match canonical {
            "all" => Self::All,
            "and" => Self::And,
            "elemMatch" => Self::ElemMatch,
            "eq" => Self::Eq,
            "exists" => Self::Exists,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "in" => Self::In,
            "inc" => Self::Inc,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "mul" => Self::Mul,
            "ne" => Self::Ne,
            "nin" => Self::Nin,
            "nor" => Self::Nor,
            "not" => Self::Not,
            "or" => Self::Or,
            "pop" => Self::Pop,
            "pull" => Self::Pull,
            "pullAll" => Self::PullAll,
            "push" => Self::Push,
            "regex" => Self::Regex,
            "rename" => Self::Rename,
            "set" => Self::Set,
            "setOnInsert" => Self::SetOnInsert,
            "size" => Self::Size,
            "unset" => Self::Unset,
            "combine" => Self::Combine,
            "match" => Self::Match,
            "project" => Self::Project,
            "include" => Self::Include,
            "exclude" => Self::Exclude,
            "group" => Self::Group,
            "sort" => Self::Sort,
            "limit" => Self::Limit,
            "unwind" => Self::Unwind,
            "addFields" => Self::AddFields,
            "sum" => Self::Sum,
            "avg" => Self::Avg,
            "first" => Self::First,
            "last" => Self::Last,
            "max" => Self::Max,
            "min" => Self::Min,
            "addToSet" => Self::AddToSet,
            "ascending" => Self::Ascending,
            "descending" => Self::Descending,
            _ => Self::Unknown
        }
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_round_trips() {
        for name in [Name::Eq, Name::AddToSet, Name::SetOnInsert, Name::Nor] {
            assert_eq!(Name::from_canonical(name.canonical()), name);
        }
    }

    #[test]
    fn unrecognized_spelling_falls_back_to_unknown() {
        assert_eq!(Name::from_canonical("bitsAllClear"), Name::Unknown);
    }
}
