#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("unknown filter field `{field}`")]
    BadFilterField { field: String },

    #[error("invalid value `{value}` for filter `{field}`: {reason}")]
    BadFilterValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("order column `{order}` is not an identifier")]
    BadOrderField { order: String },

    #[error("query `{query}` requires a `{filter}` filter")]
    MissingRequiredFilter {
        query: &'static str,
        filter: &'static str,
    },

    #[error("variable `{symbol}` is dereferenced before it is bound")]
    UnboundVariable { symbol: String },

    #[error("statement {index} failed")]
    StatementExecution {
        index: usize,
        #[source]
        source: rusqlite::Error,
    },
}

impl ReportError {
    /// True for errors caused by the request itself rather than the database
    /// or the compiler.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::BadFilterField { .. }
                | Self::BadFilterValue { .. }
                | Self::BadOrderField { .. }
                | Self::MissingRequiredFilter { .. }
        )
    }

    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadFilterField { .. } => "bad_filter_field",
            Self::BadFilterValue { .. } => "bad_filter_value",
            Self::BadOrderField { .. } => "bad_order_field",
            Self::MissingRequiredFilter { .. } => "missing_required_filter",
            Self::UnboundVariable { .. } => "unbound_variable",
            Self::StatementExecution { .. } => "statement_execution",
        }
    }
}
