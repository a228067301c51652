use rusqlite::types::Value as SqlValue;
use serde_json::json;
use simstats::models::{
    ENVELOPE_SCHEMA_VERSION, ReportEnvelope, ReportEnvelopeFailure, ReportQuery, ReportRequest,
};
use simstats::report::{ReportError, ReportOutcome, ResultSet, UnmatchedLookup, compile_report};

fn outcome_with_unmatched() -> ReportOutcome {
    ReportOutcome {
        result: ResultSet {
            columns: vec!["week".to_string(), "message_count".to_string()],
            rows: vec![vec![
                SqlValue::Text("200932".to_string()),
                SqlValue::Integer(4),
            ]],
        },
        statements_executed: 3,
        unmatched_lookups: vec![UnmatchedLookup {
            field: "host_flash_os",
            symbol: "fl_os",
            name: "BeOS".to_string(),
        }],
    }
}

#[test]
fn outcome_envelope_carries_rows_and_warnings() {
    let envelope = ReportEnvelope::from_outcome("report", &outcome_with_unmatched());

    assert!(envelope.ok);
    assert!(envelope.generated_at_utc.ends_with('Z'));
    assert_eq!(
        envelope.meta.get("schema_version"),
        Some(&json!(ENVELOPE_SCHEMA_VERSION))
    );
    assert_eq!(envelope.meta.get("row_count"), Some(&json!(1)));
    assert_eq!(envelope.meta.get("statements_executed"), Some(&json!(3)));
    assert_eq!(
        envelope.data,
        Some(json!({
            "columns": ["week", "message_count"],
            "rows": [{ "week": "200932", "message_count": 4 }]
        }))
    );
    assert_eq!(envelope.warnings.len(), 1);
    assert_eq!(envelope.warnings[0].code, "unmatched_lookup");
    assert_eq!(
        envelope.warnings[0].details.as_ref(),
        Some(&json!({ "field": "host_flash_os", "symbol": "fl_os", "name": "BeOS" }))
    );
    assert!(envelope.error.is_none());
}

#[test]
fn single_value_envelope_keeps_first_cell_and_warnings() {
    let envelope = ReportEnvelope::from_single_value("report", &outcome_with_unmatched());

    assert_eq!(envelope.data, Some(json!({ "value": "200932" })));
    assert_eq!(envelope.meta.get("row_count"), Some(&json!(1)));
    assert_eq!(envelope.warnings[0].code, "unmatched_lookup");

    let empty = ReportOutcome {
        result: ResultSet::default(),
        statements_executed: 1,
        unmatched_lookups: Vec::new(),
    };
    let envelope = ReportEnvelope::from_single_value("report", &empty);
    assert_eq!(envelope.data, Some(json!({ "value": null })));
    assert!(envelope.warnings.is_empty());
}

#[test]
fn ok_envelope_omits_error_key() {
    let envelope = ReportEnvelope::ok("catalog", json!({ "fields": [] }));
    let encoded = serde_json::to_value(&envelope).expect("envelope should serialize");

    let object = encoded.as_object().expect("envelope JSON should be object");
    assert_eq!(object.get("ok"), Some(&json!(true)));
    assert!(object.contains_key("data"));
    assert!(object.contains_key("warnings"));
    assert!(!object.contains_key("error"));
}

#[test]
fn plan_envelope_lists_statements_in_order() {
    let request = ReportRequest::new(ReportQuery::SimType).with_filter("sim_name", "generator");
    let plan = compile_report(&request).expect("request should compile");
    let envelope = ReportEnvelope::from_plan("report", &plan);

    let encoded = serde_json::to_value(&envelope).expect("envelope should serialize");
    let kinds = encoded
        .pointer("/data/statements")
        .and_then(|value| value.as_array())
        .expect("statements should be listed")
        .iter()
        .map(|statement| statement["kind"].clone())
        .collect::<Vec<_>>();
    assert_eq!(
        kinds,
        vec![json!("declare_bindings"), json!("bind_lookup"), json!("aggregate")]
    );
}

#[test]
fn rejected_report_error_is_flagged() {
    let error = ReportError::BadOrderField {
        order: "a b".to_string(),
    };
    let failure = ReportEnvelopeFailure::from_report_error("report", &error);
    assert!(failure.is_rejected());

    let parsed: serde_json::Value =
        serde_json::from_str(&failure.to_string()).expect("display output should be JSON envelope");
    assert_eq!(parsed.pointer("/ok"), Some(&json!(false)));
    assert_eq!(
        parsed.pointer("/error/code").and_then(|value| value.as_str()),
        Some("bad_order_field")
    );
    assert_eq!(parsed.pointer("/error/details/rejected"), Some(&json!(true)));
}

#[test]
fn statement_failure_reports_index_and_is_not_rejected() {
    let error = ReportError::StatementExecution {
        index: 2,
        source: rusqlite::Error::InvalidQuery,
    };
    let failure = ReportEnvelopeFailure::from_report_error("report", &error);
    assert!(!failure.is_rejected());

    let details = failure
        .envelope()
        .error
        .as_ref()
        .and_then(|error| error.details.clone())
        .expect("details should be present");
    assert_eq!(details["statement_index"], 2);
}
