//! The mutable intermediate representation of one statement.

use crate::value::SqlValue;

/// Statement kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Select,
    Insert,
    Update,
    Delete,
}

/// JOIN flavour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
    Natural,
    LeftOuter,
    RightOuter,
    FullOuter,
    NaturalOuter,
}

impl JoinType {
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Full => "FULL",
            JoinType::Cross => "CROSS",
            JoinType::Natural => "NATURAL",
            JoinType::LeftOuter => "LEFT OUTER",
            JoinType::RightOuter => "RIGHT OUTER",
            JoinType::FullOuter => "FULL OUTER",
            JoinType::NaturalOuter => "NATURAL OUTER",
        }
    }
}

/// A JOIN clause, rendered verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub kind: JoinType,
    pub table: String,
    /// `ON` predicate; empty for CROSS / NATURAL joins.
    pub on: String,
}

/// ORDER BY direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
    NullsFirst,
    NullsLast,
    AscNullsFirst,
    AscNullsLast,
    DescNullsFirst,
    DescNullsLast,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
            Direction::NullsFirst => "NULLS FIRST",
            Direction::NullsLast => "NULLS LAST",
            Direction::AscNullsFirst => "ASC NULLS FIRST",
            Direction::AscNullsLast => "ASC NULLS LAST",
            Direction::DescNullsFirst => "DESC NULLS FIRST",
            Direction::DescNullsLast => "DESC NULLS LAST",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// INSERT payload: one row, or a batch of rows.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertValues {
    Row(Vec<SqlValue>),
    Rows(Vec<Vec<SqlValue>>),
}

impl Default for InsertValues {
    fn default() -> Self {
        InsertValues::Row(Vec::new())
    }
}

/// Right-hand side of an UPDATE assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum SetValue {
    /// Bound as a positional parameter.
    Value(SqlValue),
    /// Literal SQL, e.g. `now()` or `count + 1`.
    Raw(String),
}

/// Everything needed to compile one statement.
///
/// Populated through [`Query`](super::Query)'s setters and compiled once.
#[derive(Debug, Clone, Default)]
pub struct QueryDescriptor {
    pub name: String,
    pub kind: Option<QueryKind>,
    pub table: String,
    pub select_fields: Vec<String>,
    pub insert_fields: Vec<String>,
    pub values: InsertValues,
    pub update_sets: Vec<(String, SetValue)>,
    pub joins: Vec<Join>,
    pub where_clauses: Vec<String>,
    pub group_by: Vec<String>,
    pub having: Vec<String>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub returning: bool,
    pub returning_fields: Vec<String>,
    /// Named parameters in insertion order.
    pub params: Vec<(String, SqlValue)>,
}

impl QueryDescriptor {
    pub(crate) fn set_kind(&mut self, kind: QueryKind) {
        if let Some(previous) = self.kind
            && previous != kind
        {
            tracing::warn!(
                target: "pgmapper.sql",
                name = %self.name,
                ?previous,
                ?kind,
                "query kind set more than once; last write wins"
            );
        }
        self.kind = Some(kind);
    }

    pub(crate) fn set_param(&mut self, key: String, value: SqlValue) {
        match self.params.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.params.push((key, value)),
        }
    }

    pub(crate) fn set_update(&mut self, field: String, value: SetValue) {
        match self.update_sets.iter_mut().find(|(f, _)| *f == field) {
            Some(slot) => slot.1 = value,
            None => self.update_sets.push((field, value)),
        }
    }
}
