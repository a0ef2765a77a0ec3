//! Per-builder clause state, cleared after every terminal operation.

use tracing::warn;

use crate::core::identifier::param_base;
use crate::core::traits::{LimitSpec, SelectParts};
use crate::core::value::{Params, SqlValue};

/// Sort direction for `order_by_with`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    #[default]
    Asc,
    Desc,
}

impl Order {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// How a predicate joins the ones before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Conjunction {
    And,
    Or,
}

impl Conjunction {
    fn as_sql(&self) -> &'static str {
        match self {
            Conjunction::And => "AND",
            Conjunction::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum JoinKind {
    Inner,
    Left,
    Right,
    Cross,
}

#[derive(Debug, Clone)]
struct JoinClause {
    kind: JoinKind,
    fragment: String,
}

/// Accumulated clauses of the statement being built.
#[derive(Debug, Clone, Default)]
pub struct QueryState {
    select: Vec<String>,
    from: Option<String>,
    joins: Vec<JoinClause>,
    where_clause: Option<String>,
    params: Params,
    order_by: Vec<String>,
    limit: Option<LimitSpec>,
    counter: usize,
}

impl QueryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear every clause and restart parameter numbering.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn from_table(&self) -> Option<&str> {
        self.from.as_deref()
    }

    pub fn set_from(&mut self, table: &str) {
        self.from = Some(table.to_string());
    }

    pub fn push_select(&mut self, columns: &str) {
        let columns = columns.trim();
        if !columns.is_empty() {
            self.select.push(columns.to_string());
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn limit(&self) -> Option<LimitSpec> {
        self.limit
    }

    pub fn set_limit(&mut self, limit: LimitSpec) {
        self.limit = Some(limit);
    }

    pub fn has_order(&self) -> bool {
        !self.order_by.is_empty()
    }

    pub fn push_order(&mut self, fragment: String) {
        self.order_by.push(fragment);
    }

    pub fn where_clause(&self) -> Option<&str> {
        self.where_clause.as_deref()
    }

    /// Bind `value` under a fresh name derived from `column` (`age` -> `age1`).
    pub fn next_param(&mut self, column: &str, value: SqlValue) -> String {
        self.counter += 1;
        let name = format!("{}{}", param_base(column), self.counter);
        self.params.set(name.clone(), value);
        name
    }

    /// Append a predicate fragment.
    pub(crate) fn push_predicate(&mut self, conjunction: Conjunction, fragment: String) {
        self.where_clause = Some(match self.where_clause.take() {
            Some(existing) => format!("{} {} {}", existing, conjunction.as_sql(), fragment),
            None => fragment,
        });
    }

    pub fn push_join(&mut self, keyword: &str, table: &str, left: &str, op: &str, right: &str) {
        let kind = match keyword {
            "LEFT" => JoinKind::Left,
            "RIGHT" => JoinKind::Right,
            _ => JoinKind::Inner,
        };
        self.joins.push(JoinClause {
            kind,
            fragment: format!("{} JOIN {} ON {} {} {}", keyword, table, left, op, right),
        });
    }

    pub fn push_cross_join(&mut self, table: &str) {
        self.joins.push(JoinClause {
            kind: JoinKind::Cross,
            fragment: format!("CROSS JOIN {}", table),
        });
    }

    /// Extend the most recent join's ON condition.
    pub fn and_on(&mut self, left: &str, op: &str, right: &str) {
        match self.joins.last_mut() {
            Some(join) if join.kind == JoinKind::Cross => {
                warn!("and_on after a cross join has no ON clause to extend; ignored");
            }
            Some(join) => {
                join.fragment
                    .push_str(&format!(" AND {} {} {}", left, op, right));
            }
            None => warn!("and_on called before any join; ignored"),
        }
    }

    /// Clause fragments for rendering, with `table` overriding `from`.
    pub fn select_parts(&self, table: &str) -> SelectParts {
        SelectParts {
            columns: self.select.join(", "),
            from: table.to_string(),
            joins: self.joins.iter().map(|j| j.fragment.clone()).collect(),
            where_clause: self.where_clause.clone(),
            order_by: (!self.order_by.is_empty()).then(|| self.order_by.join(", ")),
            limit: self.limit,
            fallback_order: None,
        }
    }
}
