use std::path::PathBuf;

use anyhow::{Context, Error, Result};
use clap::Args;
use serde_json::json;

use crate::config::RuntimePaths;
use crate::models::{ReportEnvelope, ReportEnvelopeFailure, ReportQuery, ReportRequest};
use crate::report::{ExecutionContext, compile_report};

const COMMAND: &str = "report";

#[derive(Debug, Clone, Args)]
pub struct ReportArgs {
    /// Aggregate to compute: message_count, session_count or sim_type.
    #[arg(long, value_name = "QUERY")]
    pub query: Option<ReportQuery>,

    /// Filter as FIELD=VALUE; repeatable.
    #[arg(long = "filter", value_name = "FIELD=VALUE", value_parser = parse_filter)]
    pub filters: Vec<(String, String)>,

    #[arg(long, value_name = "DIMENSION")]
    pub group: Option<String>,

    /// Output column to sort by; prefix with `desc:` for descending.
    #[arg(long, value_name = "COLUMN")]
    pub order: Option<String>,

    /// Row cap, applied only together with --order.
    #[arg(long, value_name = "N")]
    pub limit: Option<u64>,

    /// JSON request file; flags given alongside it override its fields.
    #[arg(long, value_name = "PATH")]
    pub request: Option<PathBuf>,

    /// Print the compiled statements instead of running them.
    #[arg(long, default_value_t = false)]
    pub explain: bool,

    /// Print only the first cell of the first row (totals).
    #[arg(long, default_value_t = false, conflicts_with = "explain")]
    pub single_value: bool,
}

pub fn run(args: &ReportArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    let request = build_request(args, runtime_paths)?;

    let plan = compile_report(&request)
        .map_err(|error| Error::new(ReportEnvelopeFailure::from_report_error(COMMAND, &error)))?;

    if args.explain {
        let envelope = ReportEnvelope::from_plan(COMMAND, &plan)
            .with_meta("query", json!(request.query.key()))
            .with_meta("executed", json!(false));
        return print_envelope(&envelope);
    }

    let connection =
        crate::schema::open_existing_database(&runtime_paths.database).map_err(|error| {
            Error::new(ReportEnvelopeFailure::runtime(
                ReportEnvelope::error(COMMAND, "database_unavailable", "unable to open database")
                    .with_error_details(json!({
                        "database": runtime_paths.database.display().to_string(),
                        "cause": format!("{error:#}"),
                    })),
            ))
        })?;

    let outcome = ExecutionContext::new(connection)
        .execute(&plan)
        .map_err(|error| Error::new(ReportEnvelopeFailure::from_report_error(COMMAND, &error)))?;

    let envelope = if args.single_value {
        ReportEnvelope::from_single_value(COMMAND, &outcome)
    } else {
        ReportEnvelope::from_outcome(COMMAND, &outcome)
    };
    let envelope = envelope
        .with_meta("query", json!(request.query.key()))
        .with_meta("executed", json!(true));
    print_envelope(&envelope)
}

/// Merges the optional request file with command-line flags.
pub fn build_request(args: &ReportArgs, runtime_paths: &RuntimePaths) -> Result<ReportRequest> {
    let mut request = match &args.request {
        Some(path) => {
            let path = runtime_paths.cwd.join(path);
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read request file: {}", path.display()))?;
            serde_json::from_str::<ReportRequest>(&raw).map_err(|error| {
                Error::new(ReportEnvelopeFailure::rejected(
                    ReportEnvelope::error(COMMAND, "invalid_request", "request file is not valid")
                        .with_error_details(json!({
                            "path": path.display().to_string(),
                            "cause": error.to_string(),
                        })),
                ))
            })?
        }
        None => ReportRequest::default(),
    };

    if let Some(query) = args.query {
        request.query = query;
    }
    for (field, value) in &args.filters {
        request.filters.insert(field.clone(), Some(value.clone()));
    }
    if let Some(group) = &args.group {
        request.group = Some(group.clone());
    }
    if let Some(order) = &args.order {
        request.order = Some(order.clone());
    }
    if let Some(limit) = args.limit {
        request.limit = Some(limit);
    }

    Ok(request)
}

fn print_envelope(envelope: &ReportEnvelope) -> Result<()> {
    let encoded = serde_json::to_string(envelope).context("failed to encode report envelope")?;
    println!("{encoded}");
    Ok(())
}

fn parse_filter(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((field, value)) if !field.trim().is_empty() => {
            Ok((field.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected FIELD=VALUE, got `{raw}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::parse_filter;

    #[test]
    fn filter_splits_on_first_equals() {
        assert_eq!(
            parse_filter("sim_dev=greater_than:0"),
            Ok(("sim_dev".to_string(), "greater_than:0".to_string()))
        );
        assert_eq!(
            parse_filter("host_locale_country=a=b"),
            Ok(("host_locale_country".to_string(), "a=b".to_string()))
        );
    }

    #[test]
    fn filter_requires_field_name() {
        assert!(parse_filter("=5").is_err());
        assert!(parse_filter("sim_dev").is_err());
    }
}
