use rusqlite::params_from_iter;
use rusqlite::types::Value as SqlValue;
use serde_json::{Value, json};

use super::error::ReportError;
use super::plan::{QueryPlan, Statement, StatementKind};

/// A stateful connection able to run one plan statement at a time.
///
/// Statements of one plan must reach the same connection in order; bindings
/// written by earlier statements are read by later ones.
pub trait ReportConnection {
    fn execute_statement(&mut self, statement: &Statement) -> rusqlite::Result<ResultSet>;
}

impl ReportConnection for rusqlite::Connection {
    fn execute_statement(&mut self, statement: &Statement) -> rusqlite::Result<ResultSet> {
        let mut prepared = self.prepare(&statement.sql)?;
        let columns = prepared
            .column_names()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();

        let mut rows = prepared.query(params_from_iter(statement.params.iter()))?;
        let mut result_rows = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Vec::with_capacity(columns.len());
            for index in 0..columns.len() {
                record.push(row.get::<usize, SqlValue>(index)?);
            }
            result_rows.push(record);
        }

        Ok(ResultSet {
            columns,
            rows: result_rows,
        })
    }
}

impl<C: ReportConnection + ?Sized> ReportConnection for &mut C {
    fn execute_statement(&mut self, statement: &Statement) -> rusqlite::Result<ResultSet> {
        (**self).execute_statement(statement)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl ResultSet {
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Rows as JSON objects keyed by column name.
    #[must_use]
    pub fn to_json_rows(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let record = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(column, value)| (column.clone(), json_value_from_sql(value)))
                    .collect::<serde_json::Map<_, _>>();
                Value::Object(record)
            })
            .collect()
    }

    /// First cell of the first row; totals and other one-value reports.
    #[must_use]
    pub fn single_value(&self) -> Option<&SqlValue> {
        self.rows.first().and_then(|row| row.first())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmatchedLookup {
    pub field: &'static str,
    pub symbol: &'static str,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportOutcome {
    pub result: ResultSet,
    pub statements_executed: usize,
    pub unmatched_lookups: Vec<UnmatchedLookup>,
}

/// Owns the connection for the lifetime of one request.
#[derive(Debug)]
pub struct ExecutionContext<C> {
    connection: C,
}

impl<C: ReportConnection> ExecutionContext<C> {
    pub fn new(connection: C) -> Self {
        Self { connection }
    }

    pub fn execute(mut self, plan: &QueryPlan) -> Result<ReportOutcome, ReportError> {
        let mut unmatched_lookups = Vec::new();
        let mut result = ResultSet::default();

        for (index, statement) in plan.statements().enumerate() {
            tracing::trace!(index, kind = statement.kind.label(), sql = %statement.sql, "executing statement");
            result = self
                .connection
                .execute_statement(statement)
                .map_err(|source| {
                    tracing::debug!(index, error = %source, "statement failed");
                    ReportError::StatementExecution { index, source }
                })?;

            let StatementKind::BindLookup { field, symbol } = statement.kind else {
                continue;
            };
            if matches!(result.single_value(), None | Some(SqlValue::Null)) {
                let name = match statement.params.first() {
                    Some(SqlValue::Text(name)) => name.clone(),
                    _ => String::new(),
                };
                tracing::warn!(field, name = %name, "lookup name matched no row");
                unmatched_lookups.push(UnmatchedLookup { field, symbol, name });
            }
        }

        tracing::info!(
            statements = plan.len(),
            rows = result.row_count(),
            unmatched = unmatched_lookups.len(),
            "report executed"
        );

        Ok(ReportOutcome {
            result,
            statements_executed: plan.len(),
            unmatched_lookups,
        })
    }
}

#[must_use]
pub fn json_value_from_sql(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(value) => json!(value),
        SqlValue::Real(value) => json!(value),
        SqlValue::Text(value) => json!(value),
        SqlValue::Blob(value) => json!(encode_blob_hex(value)),
    }
}

fn encode_blob_hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut output = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        output.push(HEX[(byte >> 4) as usize] as char);
        output.push(HEX[(byte & 0x0f) as usize] as char);
    }
    output
}
