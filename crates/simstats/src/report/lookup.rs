//! Name-to-key resolution through connection-scoped variables.
//!
//! A variable is a row of the per-connection temp table `report_bindings`.
//! Binding statements assign it from the lookup table; predicates in the
//! aggregate statement read it back through a scalar subquery. A name with
//! no match binds `NULL`, so the dereferencing predicate matches nothing.

use rusqlite::types::Value as SqlValue;

use super::catalog::{FieldDescriptor, LookupTarget};
use super::plan::{Statement, StatementKind};
use super::predicates::Predicate;

pub const BINDINGS_TABLE: &str = "report_bindings";

#[must_use]
pub fn declare_bindings_statement() -> Statement {
    Statement::new(
        StatementKind::DeclareBindings,
        format!(
            "CREATE TEMP TABLE IF NOT EXISTS {BINDINGS_TABLE} \
             (symbol TEXT PRIMARY KEY NOT NULL, value INTEGER)"
        ),
        Vec::new(),
    )
}

/// Scalar subquery yielding the value bound to `symbol` on this connection.
#[must_use]
pub fn variable_reference(symbol: &str) -> String {
    format!("(SELECT value FROM temp.{BINDINGS_TABLE} WHERE symbol = '{symbol}')")
}

#[derive(Debug, Clone, PartialEq)]
pub struct LookupBinding {
    pub field: &'static str,
    pub symbol: &'static str,
    pub statement: Statement,
    pub predicate: Predicate,
}

/// Builds the binding statement for one lookup filter and the deferred
/// predicate that consumes it.
#[must_use]
pub fn resolve_lookup(
    field: &'static FieldDescriptor,
    target: LookupTarget,
    name: &str,
) -> LookupBinding {
    let LookupTarget { table, symbol } = target;
    let statement = Statement::new(
        StatementKind::BindLookup {
            field: field.name,
            symbol,
        },
        format!(
            "INSERT OR REPLACE INTO temp.{BINDINGS_TABLE} (symbol, value) \
             VALUES ('{symbol}', (SELECT {table}.id FROM {table} WHERE {table}.name = ?)) \
             RETURNING value"
        ),
        vec![SqlValue::Text(name.to_string())],
    );
    let predicate = Predicate::referencing(
        format!("{} = {}", field.column(), variable_reference(symbol)),
        symbol,
    );

    LookupBinding {
        field: field.name,
        symbol,
        statement,
        predicate,
    }
}
