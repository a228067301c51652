use std::fmt::{Display, Formatter};

use rusqlite::types::Value as SqlValue;

use super::predicates::Predicate;

const NULL_KEYWORD: &str = "null";
const NOT_NULL_KEYWORD: &str = "not_null";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Equal,
    NotEqual,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
}

impl ComparisonOp {
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Equal => "=",
            Self::NotEqual => "!=",
            Self::LessThan => "<",
            Self::LessOrEqual => "<=",
            Self::GreaterThan => ">",
            Self::GreaterOrEqual => ">=",
        }
    }
}

/// Right-hand side of a filter predicate. Operands are carried as values and
/// bound as statement parameters; they never become part of the SQL text.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparison {
    IsNull,
    IsNotNull,
    Binary { op: ComparisonOp, operand: SqlValue },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected a numeric literal, got `{operand}`")]
pub struct NonNumericOperand {
    pub operand: String,
}

/// Parses the operator-prefix grammar used by numeric filter fields, e.g.
/// `greater_than_equal:5` or `null`. A value without a known prefix is an
/// equality test against the whole value.
pub fn parse_numeric_comparison(value: &str) -> Result<Comparison, NonNumericOperand> {
    if let Some(comparison) = parse_null_keyword(value) {
        return Ok(comparison);
    }

    const PREFIXES: &[(&str, ComparisonOp)] = &[
        ("less_than:", ComparisonOp::LessThan),
        ("less_than_equal:", ComparisonOp::LessOrEqual),
        ("greater_than:", ComparisonOp::GreaterThan),
        ("greater_than_equal:", ComparisonOp::GreaterOrEqual),
    ];

    let (op, operand) = PREFIXES
        .iter()
        .find_map(|(prefix, op)| value.strip_prefix(prefix).map(|rest| (*op, rest)))
        .unwrap_or((ComparisonOp::Equal, value));

    Ok(Comparison::Binary {
        op,
        operand: numeric_literal(operand)?,
    })
}

pub fn parse_string_equality(value: &str) -> Comparison {
    parse_null_keyword(value).unwrap_or_else(|| Comparison::Binary {
        op: ComparisonOp::Equal,
        operand: SqlValue::Text(value.to_string()),
    })
}

fn parse_null_keyword(value: &str) -> Option<Comparison> {
    match value {
        NULL_KEYWORD => Some(Comparison::IsNull),
        NOT_NULL_KEYWORD => Some(Comparison::IsNotNull),
        _ => None,
    }
}

fn numeric_literal(raw: &str) -> Result<SqlValue, NonNumericOperand> {
    if let Ok(integer) = raw.parse::<i64>() {
        return Ok(SqlValue::Integer(integer));
    }
    match raw.parse::<f64>() {
        Ok(real) if real.is_finite() => Ok(SqlValue::Real(real)),
        _ => Err(NonNumericOperand {
            operand: raw.to_string(),
        }),
    }
}

impl Comparison {
    /// Applies the comparison to a qualified column, producing a predicate
    /// with `?` placeholders for its operand.
    #[must_use]
    pub fn to_predicate(&self, column: &str) -> Predicate {
        match self {
            Self::IsNull => Predicate::new(format!("{column} IS NULL")),
            Self::IsNotNull => Predicate::new(format!("{column} IS NOT NULL")),
            Self::Binary { op, operand } => {
                Predicate::with_params(format!("{column} {} ?", op.symbol()), vec![operand.clone()])
            }
        }
    }
}

impl Display for Comparison {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IsNull => f.write_str("IS NULL"),
            Self::IsNotNull => f.write_str("IS NOT NULL"),
            Self::Binary { op, operand } => write!(f, "{} {}", op.symbol(), sql_literal(operand)),
        }
    }
}

/// Human-readable SQL literal for logs and plan listings.
#[must_use]
pub fn sql_literal(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Integer(integer) => integer.to_string(),
        SqlValue::Real(real) => real.to_string(),
        SqlValue::Text(text) => format!("'{}'", text.replace('\'', "''")),
        SqlValue::Blob(bytes) => format!("<blob {} bytes>", bytes.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_table_maps_each_operator() {
        let cases = [
            ("less_than:3", ComparisonOp::LessThan, 3),
            ("less_than_equal:4", ComparisonOp::LessOrEqual, 4),
            ("greater_than:5", ComparisonOp::GreaterThan, 5),
            ("greater_than_equal:6", ComparisonOp::GreaterOrEqual, 6),
            ("7", ComparisonOp::Equal, 7),
        ];
        for (input, op, operand) in cases {
            assert_eq!(
                parse_numeric_comparison(input),
                Ok(Comparison::Binary {
                    op,
                    operand: SqlValue::Integer(operand)
                }),
                "input: {input}"
            );
        }
    }

    #[test]
    fn decimal_operands_are_accepted() {
        let comparison = parse_numeric_comparison("less_than:2.5").expect("decimal should parse");
        assert_eq!(comparison.to_string(), "< 2.5");
    }

    #[test]
    fn non_finite_spellings_are_rejected() {
        for input in ["inf", "NaN", "greater_than:infinity", "less_than:"] {
            assert!(parse_numeric_comparison(input).is_err(), "input: {input}");
        }
    }

    #[test]
    fn predicate_uses_placeholder_for_operand() {
        let predicate = parse_numeric_comparison("greater_than:10")
            .expect("should parse")
            .to_predicate("session.sim_svn_revision");
        assert_eq!(predicate.sql(), "session.sim_svn_revision > ?");
        assert_eq!(predicate.params(), &[SqlValue::Integer(10)]);
    }

    #[test]
    fn text_literal_rendering_doubles_quotes() {
        assert_eq!(
            parse_string_equality("it's").to_string(),
            "= 'it''s'".to_string()
        );
    }
}
