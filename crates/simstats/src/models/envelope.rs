use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::report::executor::json_value_from_sql;
use crate::report::{QueryPlan, ReportError, ReportOutcome};
use crate::utils::time::{format_unix_ms, unix_timestamp_seconds};

pub const ENVELOPE_SCHEMA_VERSION: &str = "simstats.envelope.v1";

pub type EnvelopeMeta = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeNotice {
    pub code: String,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// JSON document printed on stdout by every command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEnvelope {
    pub ok: bool,
    pub command: String,
    pub generated_at_utc: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    pub meta: EnvelopeMeta,
    pub warnings: Vec<EnvelopeNotice>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<EnvelopeNotice>,
}

impl ReportEnvelope {
    #[must_use]
    pub fn ok(command: impl Into<String>, data: Value) -> Self {
        let mut envelope = Self::base(command, true);
        envelope.data = Some(data);
        envelope
    }

    #[must_use]
    pub fn error(
        command: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let mut envelope = Self::base(command, false);
        envelope.error = Some(EnvelopeNotice {
            code: code.into(),
            message: message.into(),
            details: None,
        });
        envelope
    }

    /// Result rows plus one `unmatched_lookup` warning per lookup name that
    /// resolved to nothing.
    #[must_use]
    pub fn from_outcome(command: impl Into<String>, outcome: &ReportOutcome) -> Self {
        let data = json!({
            "columns": outcome.result.columns,
            "rows": outcome.result.to_json_rows(),
        });
        Self::ok(command, data).with_outcome(outcome)
    }

    /// Only the first cell of the first row, e.g. an ungrouped total;
    /// `null` when the report has no rows.
    #[must_use]
    pub fn from_single_value(command: impl Into<String>, outcome: &ReportOutcome) -> Self {
        let value = outcome
            .result
            .single_value()
            .map_or(Value::Null, json_value_from_sql);
        Self::ok(command, json!({ "value": value })).with_outcome(outcome)
    }

    fn with_outcome(self, outcome: &ReportOutcome) -> Self {
        let mut envelope = self
            .with_meta("row_count", json!(outcome.result.row_count()))
            .with_meta("statements_executed", json!(outcome.statements_executed));

        for unmatched in &outcome.unmatched_lookups {
            envelope = envelope
                .with_warning(
                    "unmatched_lookup",
                    format!(
                        "no `{}` named `{}`; the report is empty",
                        unmatched.field, unmatched.name
                    ),
                )
                .with_warning_details(json!({
                    "field": unmatched.field,
                    "symbol": unmatched.symbol,
                    "name": unmatched.name,
                }));
        }
        envelope
    }

    #[must_use]
    pub fn from_plan(command: impl Into<String>, plan: &QueryPlan) -> Self {
        Self::ok(command, json!({ "statements": plan.to_json() }))
            .with_meta("statement_count", json!(plan.len()))
    }

    #[must_use]
    pub fn from_report_error(command: impl Into<String>, error: &ReportError) -> Self {
        let details = match error {
            ReportError::StatementExecution { index, source } => {
                json!({ "statement_index": index, "cause": source.to_string() })
            }
            _ => json!({ "rejected": error.is_rejection() }),
        };
        Self::error(command, error.code(), error.to_string()).with_error_details(details)
    }

    fn base(command: impl Into<String>, ok: bool) -> Self {
        let mut meta = EnvelopeMeta::new();
        meta.insert("schema_version".to_string(), json!(ENVELOPE_SCHEMA_VERSION));

        Self {
            ok,
            command: command.into(),
            generated_at_utc: format_unix_ms(unix_timestamp_seconds().saturating_mul(1_000)),
            data: None,
            meta,
            warnings: Vec::new(),
            error: None,
        }
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_warning(mut self, code: impl Into<String>, message: impl Into<String>) -> Self {
        self.warnings.push(EnvelopeNotice {
            code: code.into(),
            message: message.into(),
            details: None,
        });
        self
    }

    #[must_use]
    pub fn with_warning_details(mut self, details: Value) -> Self {
        if let Some(last_warning) = self.warnings.last_mut() {
            last_warning.details = Some(details);
        }
        self
    }

    #[must_use]
    pub fn with_error_details(mut self, details: Value) -> Self {
        if let Some(error) = self.error.as_mut() {
            error.details = Some(details);
        }
        self
    }
}

/// Command failure carrying an error envelope; `main` prints it and picks
/// the exit code from `rejected`.
#[derive(Debug, Clone)]
pub struct ReportEnvelopeFailure {
    envelope: ReportEnvelope,
    rejected: bool,
}

impl ReportEnvelopeFailure {
    #[must_use]
    pub fn runtime(envelope: ReportEnvelope) -> Self {
        Self {
            envelope,
            rejected: false,
        }
    }

    #[must_use]
    pub fn rejected(envelope: ReportEnvelope) -> Self {
        Self {
            envelope,
            rejected: true,
        }
    }

    #[must_use]
    pub fn from_report_error(command: &str, error: &ReportError) -> Self {
        Self {
            envelope: ReportEnvelope::from_report_error(command, error),
            rejected: error.is_rejection(),
        }
    }

    #[must_use]
    pub fn envelope(&self) -> &ReportEnvelope {
        &self.envelope
    }

    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.rejected
    }
}

impl Display for ReportEnvelopeFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(&self.envelope) {
            Ok(encoded) => f.write_str(&encoded),
            Err(_) => f.write_str("report envelope serialization failure"),
        }
    }
}

impl std::error::Error for ReportEnvelopeFailure {}
