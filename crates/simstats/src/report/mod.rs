//! Report compiler: turns a [`ReportRequest`] into an ordered statement plan
//! and runs it on a single connection.

pub mod catalog;
pub mod comparison;
pub mod error;
pub mod executor;
pub mod grouping;
pub mod lookup;
pub mod plan;
pub mod predicates;

use rusqlite::types::Value as SqlValue;

use crate::models::request::{ReportQuery, ReportRequest};

pub use error::ReportError;
pub use executor::{ExecutionContext, ReportConnection, ReportOutcome, ResultSet, UnmatchedLookup};
pub use plan::{QueryPlan, Statement, StatementKind};

use catalog::{FieldDescriptor, FieldKind, PRIMARY_TABLE};
use comparison::{parse_numeric_comparison, parse_string_equality};
use grouping::{AggregateTemplate, Projection, apply_group, ensure_known_group};
use lookup::{resolve_lookup, variable_reference};
use plan::{OrderBy, PlanBuilder};
use predicates::{Predicate, PredicateAssembler};

const SIM_NAME_FIELD: &str = "sim_name";
const SIM_NAME_SYMBOL: &str = "sid";

pub fn compile_report(request: &ReportRequest) -> Result<QueryPlan, ReportError> {
    if let Some(unknown) = request
        .filters
        .keys()
        .find(|name| catalog::field(name).is_none())
    {
        return Err(ReportError::BadFilterField {
            field: unknown.clone(),
        });
    }

    if let Some(group) = request.group() {
        ensure_known_group(group)?;
    }
    let order = request.order().map(OrderBy::parse).transpose()?;

    if request.query == ReportQuery::SimType && request.filter_value(SIM_NAME_FIELD).is_none() {
        return Err(ReportError::MissingRequiredFilter {
            query: ReportQuery::SimType.key(),
            filter: SIM_NAME_FIELD,
        });
    }

    let mut assembler = PredicateAssembler::default();
    let mut builder = PlanBuilder::default();

    for field in catalog::FIELDS {
        let Some(value) = request.filter_value(field.name) else {
            continue;
        };
        assembler.touch_relation(field.relation);

        match field.kind {
            FieldKind::NumericComparison => {
                let comparison = parse_numeric_comparison(value)
                    .map_err(|error| bad_value(field, value, error.to_string()))?;
                assembler.push_direct(comparison.to_predicate(&field.column()));
            }
            FieldKind::StringEquality => {
                assembler.push_direct(parse_string_equality(value).to_predicate(&field.column()));
            }
            FieldKind::SimTypeDiscriminant => {
                assembler.push_direct(sim_type_predicate(field, value)?);
            }
            FieldKind::ForeignKeyLookup(target) => {
                let binding = resolve_lookup(field, target, value);
                assembler.push_deferred(binding.predicate.clone());
                builder.bind(binding);
            }
        }
    }

    let template = AggregateTemplate::for_query(request.query);
    let (aggregate, references) = match template {
        AggregateTemplate::DistinctSimType => {
            let sql = format!(
                "SELECT {} FROM {PRIMARY_TABLE} WHERE {PRIMARY_TABLE}.{SIM_NAME_FIELD} = {}",
                template.select_expression(),
                variable_reference(SIM_NAME_SYMBOL)
            );
            (
                aggregate_statement(request.query, sql, Vec::new()),
                vec![SIM_NAME_SYMBOL],
            )
        }
        AggregateTemplate::Count | AggregateTemplate::SumSessions => {
            let projection = match request.group() {
                Some(group) => apply_group(group, &mut assembler)?,
                None => Projection::default(),
            };
            let assembled = assembler.finish();

            let mut select = projection.select.clone();
            select.push(template.select_expression());

            let mut sql = format!(
                "SELECT {} FROM {PRIMARY_TABLE}{}{}{}",
                select.join(", "),
                assembled.tables_clause(),
                assembled.where_clause(),
                projection.group_by_clause()
            );
            let mut params = assembled.params();

            if let Some(order) = order {
                sql.push_str(&order.clause());
                if let Some(limit) = request.limit() {
                    sql.push_str(" LIMIT ?");
                    params.push(SqlValue::Integer(
                        i64::try_from(limit).unwrap_or(i64::MAX),
                    ));
                }
            }

            (
                aggregate_statement(request.query, sql, params),
                assembled.variables(),
            )
        }
    };

    let plan = builder.finish(aggregate, &references)?;
    tracing::debug!(
        query = request.query.key(),
        statements = plan.len(),
        bindings = plan.preparatory().len().saturating_sub(1),
        "compiled report plan"
    );
    Ok(plan)
}

/// Compiles `request` and executes it on `connection`.
pub fn run_report<C: ReportConnection>(
    connection: C,
    request: &ReportRequest,
) -> Result<ReportOutcome, ReportError> {
    let plan = compile_report(request)?;
    ExecutionContext::new(connection).execute(&plan)
}

fn aggregate_statement(query: ReportQuery, sql: String, params: Vec<SqlValue>) -> Statement {
    Statement::new(
        StatementKind::Aggregate { query: query.key() },
        sql,
        params,
    )
}

fn sim_type_predicate(field: &FieldDescriptor, value: &str) -> Result<Predicate, ReportError> {
    let op = match value {
        "java" => "=",
        "flash" => "!=",
        _ => {
            return Err(bad_value(
                field,
                value,
                "expected `java` or `flash`".to_string(),
            ));
        }
    };
    Ok(Predicate::new(format!("{} {op} 0", field.column())))
}

fn bad_value(field: &FieldDescriptor, value: &str, reason: String) -> ReportError {
    ReportError::BadFilterValue {
        field: field.name.to_string(),
        value: value.to_string(),
        reason,
    }
}
