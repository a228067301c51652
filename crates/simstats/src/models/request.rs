use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum ReportQuery {
    #[default]
    MessageCount,
    SessionCount,
    SimType,
}

impl ReportQuery {
    pub const ALL: [ReportQuery; 3] = [Self::MessageCount, Self::SessionCount, Self::SimType];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::MessageCount => "message_count",
            Self::SessionCount => "session_count",
            Self::SimType => "sim_type",
        }
    }
}

impl Display for ReportQuery {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown report query `{0}` (expected message_count, session_count or sim_type)")]
pub struct UnknownReportQuery(pub String);

impl FromStr for ReportQuery {
    type Err = UnknownReportQuery;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|query| query.key() == value)
            .ok_or_else(|| UnknownReportQuery(value.to_string()))
    }
}

/// A declarative report request.
///
/// `filters` maps catalog field names to raw grammar values; a `null` value
/// means the filter was not supplied. Empty `group`/`order` strings and a
/// `limit` of zero are treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ReportRequest {
    #[serde(default)]
    pub query: ReportQuery,

    #[serde(default)]
    pub filters: BTreeMap<String, Option<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

impl ReportRequest {
    #[must_use]
    pub fn new(query: ReportQuery) -> Self {
        Self {
            query,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(field.into(), Some(value.into()));
        self
    }

    #[must_use]
    pub fn with_unset_filter(mut self, field: impl Into<String>) -> Self {
        self.filters.insert(field.into(), None);
        self
    }

    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    #[must_use]
    pub fn with_order(mut self, order: impl Into<String>) -> Self {
        self.order = Some(order.into());
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Supplied, non-empty value of `field`.
    #[must_use]
    pub fn filter_value(&self, field: &str) -> Option<&str> {
        self.filters
            .get(field)
            .and_then(Option::as_deref)
            .filter(|value| !value.is_empty())
    }

    #[must_use]
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref().filter(|group| !group.is_empty())
    }

    #[must_use]
    pub fn order(&self) -> Option<&str> {
        self.order.as_deref().filter(|order| !order.is_empty())
    }

    #[must_use]
    pub fn limit(&self) -> Option<u64> {
        self.limit.filter(|limit| *limit > 0)
    }
}

pub fn request_json_schema() -> Value {
    let schema = schemars::schema_for!(ReportRequest);
    match serde_json::to_value(schema) {
        Ok(value) => value,
        Err(error) => {
            panic!("failed to serialize generated report request schema: {error}");
        }
    }
}
