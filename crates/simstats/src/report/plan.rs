use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::Regex;
use rusqlite::types::Value as SqlValue;
use serde_json::{Value, json};

use super::comparison::sql_literal;
use super::error::ReportError;
use super::lookup::{LookupBinding, declare_bindings_statement};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    DeclareBindings,
    BindLookup {
        field: &'static str,
        symbol: &'static str,
    },
    Aggregate {
        query: &'static str,
    },
}

impl StatementKind {
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::DeclareBindings => "declare_bindings",
            Self::BindLookup { .. } => "bind_lookup",
            Self::Aggregate { .. } => "aggregate",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    #[must_use]
    pub fn new(kind: StatementKind, sql: String, params: Vec<SqlValue>) -> Self {
        Self { kind, sql, params }
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut value = json!({
            "kind": self.kind.label(),
            "sql": self.sql,
            "params": self.params.iter().map(sql_literal).collect::<Vec<_>>(),
        });
        match &self.kind {
            StatementKind::BindLookup { field, symbol } => {
                value["field"] = json!(field);
                value["symbol"] = json!(symbol);
            }
            StatementKind::Aggregate { query } => {
                value["query"] = json!(query);
            }
            StatementKind::DeclareBindings => {}
        }
        value
    }
}

/// Ordered statements answering one request: variable bindings first, the
/// aggregate last. Built only through [`PlanBuilder`], which rejects an
/// aggregate that reads a variable no earlier statement binds.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    preparatory: Vec<Statement>,
    aggregate: Statement,
}

impl QueryPlan {
    #[must_use]
    pub fn preparatory(&self) -> &[Statement] {
        &self.preparatory
    }

    #[must_use]
    pub fn aggregate(&self) -> &Statement {
        &self.aggregate
    }

    pub fn statements(&self) -> impl Iterator<Item = &Statement> {
        self.preparatory
            .iter()
            .chain(std::iter::once(&self.aggregate))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.preparatory.len() + 1
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Index of the statement that binds `symbol`, if any.
    #[must_use]
    pub fn binding_position(&self, symbol: &str) -> Option<usize> {
        self.preparatory.iter().position(|statement| {
            matches!(statement.kind, StatementKind::BindLookup { symbol: bound, .. } if bound == symbol)
        })
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        Value::Array(self.statements().map(Statement::to_json).collect())
    }
}

#[derive(Debug, Default)]
pub struct PlanBuilder {
    preparatory: Vec<Statement>,
    bound: BTreeSet<&'static str>,
}

impl PlanBuilder {
    pub fn bind(&mut self, binding: LookupBinding) {
        if self.preparatory.is_empty() {
            self.preparatory.push(declare_bindings_statement());
        }
        self.bound.insert(binding.symbol);
        self.preparatory.push(binding.statement);
    }

    pub fn finish(
        self,
        aggregate: Statement,
        references: &[&'static str],
    ) -> Result<QueryPlan, ReportError> {
        if let Some(symbol) = references
            .iter()
            .find(|symbol| !self.bound.contains(*symbol))
        {
            return Err(ReportError::UnboundVariable {
                symbol: (*symbol).to_string(),
            });
        }

        Ok(QueryPlan {
            preparatory: self.preparatory,
            aggregate,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn parse(raw: &str) -> Result<Self, ReportError> {
        let (column, descending) = match raw.strip_prefix("desc:") {
            Some(rest) => (rest, true),
            None => (raw, false),
        };

        if !order_column_pattern().is_match(column) {
            return Err(ReportError::BadOrderField {
                order: raw.to_string(),
            });
        }

        Ok(Self {
            column: column.to_string(),
            descending,
        })
    }

    #[must_use]
    pub fn clause(&self) -> String {
        if self.descending {
            format!(" ORDER BY {} DESC", self.column)
        } else {
            format!(" ORDER BY {}", self.column)
        }
    }
}

fn order_column_pattern() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
            .expect("order column regex should compile")
    })
}
