use rusqlite::types::Value as SqlValue;
use simstats::models::{ReportQuery, ReportRequest};
use simstats::report::catalog::{self, FieldKind, SideTable};
use simstats::report::{
    ReportConnection, ReportError, ResultSet, Statement, StatementKind, compile_report, run_report,
};

#[derive(Debug, Default)]
struct SpyConnection {
    calls: Vec<String>,
}

impl ReportConnection for SpyConnection {
    fn execute_statement(&mut self, statement: &Statement) -> rusqlite::Result<ResultSet> {
        self.calls.push(statement.sql.clone());
        Ok(ResultSet::default())
    }
}

fn aggregate_sql(request: &ReportRequest) -> String {
    compile_report(request)
        .expect("request should compile")
        .aggregate()
        .sql
        .clone()
}

#[test]
fn week_group_without_filters_is_a_single_statement() {
    let request = ReportRequest::new(ReportQuery::MessageCount).with_group("week");
    let plan = compile_report(&request).expect("request should compile");

    assert_eq!(plan.len(), 1);
    insta::assert_snapshot!(
        plan.aggregate().sql,
        @"SELECT strftime('%G%V', session.timestamp) AS week, COUNT(*) AS message_count FROM session GROUP BY week"
    );
}

#[test]
fn limit_without_order_is_ignored() {
    let request = ReportRequest::new(ReportQuery::MessageCount)
        .with_group("week")
        .with_limit(10);
    let plan = compile_report(&request).expect("request should compile");

    assert!(!plan.aggregate().sql.contains("LIMIT"));
    assert!(plan.aggregate().params.is_empty());
}

#[test]
fn limit_with_order_is_bound_as_parameter() {
    let request = ReportRequest::new(ReportQuery::SessionCount)
        .with_group("sim_project")
        .with_order("desc:session_count")
        .with_limit(10);
    let plan = compile_report(&request).expect("request should compile");

    insta::assert_snapshot!(
        plan.aggregate().sql,
        @"SELECT sim_project.name AS sim_project, SUM(session.sim_sessions_since) AS session_count FROM session, sim_project WHERE session.sim_project = sim_project.id GROUP BY session.sim_project ORDER BY session_count DESC LIMIT ?"
    );
    assert_eq!(plan.aggregate().params, vec![SqlValue::Integer(10)]);
}

#[test]
fn direct_predicates_follow_catalog_order() {
    let request = ReportRequest::new(ReportQuery::SessionCount)
        .with_filter("sim_locale_language", "en")
        .with_filter("sim_type", "java")
        .with_group("version");

    insta::assert_snapshot!(
        aggregate_sql(&request),
        @"SELECT session.sim_major_version || '.' || session.sim_minor_version || '.' || session.sim_dev_version || ' (' || session.sim_svn_revision || ')' AS version, SUM(session.sim_sessions_since) AS session_count FROM session WHERE (session.sim_type = 0 AND session.sim_locale_language = ?) GROUP BY version"
    );
}

#[test]
fn sim_type_query_dereferences_sim_name_binding() {
    let request =
        ReportRequest::new(ReportQuery::SimType).with_filter("sim_name", "pendulum-lab");
    let plan = compile_report(&request).expect("request should compile");

    assert_eq!(plan.len(), 3);
    assert_eq!(plan.binding_position("sid"), Some(1));
    insta::assert_snapshot!(
        plan.aggregate().sql,
        @"SELECT DISTINCT CASE WHEN session.sim_type = 0 THEN 'java' ELSE 'flash' END AS sim_type FROM session WHERE session.sim_name = (SELECT value FROM temp.report_bindings WHERE symbol = 'sid')"
    );
}

#[test]
fn flash_linkage_is_emitted_once_for_many_flash_fields() {
    let request = ReportRequest::new(ReportQuery::MessageCount)
        .with_filter("host_flash_version_major", "greater_than_equal:10")
        .with_filter("host_flash_accessibility", "not_null")
        .with_filter("host_flash_os", "Mac OS X")
        .with_filter("host_flash_domain", "phet.colorado.edu")
        .with_group("host_flash_version")
        .with_order("desc:message_count")
        .with_limit(5);
    let plan = compile_report(&request).expect("request should compile");
    let sql = &plan.aggregate().sql;

    let linkage = SideTable::FlashInfo.linkage_predicate();
    assert_eq!(sql.matches(linkage).count(), 1, "sql: {sql}");
    assert!(
        sql.contains("FROM session, session_flash_info WHERE"),
        "sql: {sql}"
    );
    assert!(!sql.contains("session_java_info"));
    assert_eq!(
        plan.aggregate().params,
        vec![SqlValue::Integer(10), SqlValue::Integer(5)]
    );
}

#[test]
fn both_side_tables_get_their_own_linkage() {
    let request = ReportRequest::new(ReportQuery::MessageCount)
        .with_filter("host_flash_time_offset", "less_than:0")
        .with_filter("host_java_vendor", "Apple Inc.")
        .with_group("host_java_os");
    let sql = aggregate_sql(&request);

    for side_table in SideTable::ALL {
        assert_eq!(
            sql.matches(side_table.linkage_predicate()).count(),
            1,
            "sql: {sql}"
        );
    }
}

#[test]
fn every_lookup_binding_precedes_the_aggregate() {
    for field in catalog::FIELDS {
        let FieldKind::ForeignKeyLookup(target) = field.kind else {
            continue;
        };
        let request =
            ReportRequest::new(ReportQuery::MessageCount).with_filter(field.name, "some name");
        let plan = compile_report(&request).expect("lookup request should compile");

        let statements = plan.statements().collect::<Vec<_>>();
        assert_eq!(statements[0].kind, StatementKind::DeclareBindings);
        let position = plan
            .binding_position(target.symbol)
            .expect("lookup should be bound");
        assert!(position < statements.len() - 1, "field: {}", field.name);
        assert!(
            plan.aggregate()
                .sql
                .contains(&format!("symbol = '{}'", target.symbol)),
            "field: {}",
            field.name
        );
    }
}

#[test]
fn lookup_predicates_come_after_direct_predicates() {
    let request = ReportRequest::new(ReportQuery::MessageCount)
        .with_filter("sim_name", "generator")
        .with_filter("sim_dev", "0");
    let sql = aggregate_sql(&request);

    let direct = sql.find("session.sim_dev = ?").expect("direct predicate present");
    let deferred = sql
        .find("session.sim_name = (SELECT value")
        .expect("lookup predicate present");
    assert!(direct < deferred, "sql: {sql}");
}

#[test]
fn unknown_filter_field_makes_no_round_trips() {
    let mut spy = SpyConnection::default();
    let request = ReportRequest::new(ReportQuery::MessageCount)
        .with_filter("sim_name", "generator")
        .with_filter("nonexistent_field", "1");

    let error = run_report(&mut spy, &request).expect_err("unknown field should fail");
    assert!(matches!(error, ReportError::BadFilterField { field } if field == "nonexistent_field"));
    assert!(spy.calls.is_empty());
}

#[test]
fn unknown_filter_field_is_rejected_even_when_unset() {
    let request =
        ReportRequest::new(ReportQuery::MessageCount).with_unset_filter("nonexistent_field");
    assert!(matches!(
        compile_report(&request),
        Err(ReportError::BadFilterField { .. })
    ));
}

#[test]
fn sim_type_query_without_sim_name_makes_no_round_trips() {
    let mut spy = SpyConnection::default();
    let request = ReportRequest::new(ReportQuery::SimType)
        .with_filter("sim_project", "faraday")
        .with_unset_filter("sim_name");

    let error = run_report(&mut spy, &request).expect_err("missing sim_name should fail");
    assert!(matches!(
        error,
        ReportError::MissingRequiredFilter {
            query: "sim_type",
            filter: "sim_name"
        }
    ));
    assert!(spy.calls.is_empty());
}

#[test]
fn sim_type_query_rejects_unknown_group_before_any_statement() {
    let mut spy = SpyConnection::default();
    let request = ReportRequest::new(ReportQuery::SimType)
        .with_filter("sim_name", "generator")
        .with_group("nonexistent_field");

    let error = run_report(&mut spy, &request).expect_err("unknown group should fail");
    assert!(matches!(
        error,
        ReportError::BadFilterField { ref field } if field == "nonexistent_field"
    ));
    assert!(spy.calls.is_empty());
}

#[test]
fn sim_type_query_rejects_malformed_order_before_any_statement() {
    let mut spy = SpyConnection::default();
    let request = ReportRequest::new(ReportQuery::SimType)
        .with_filter("sim_name", "generator")
        .with_group("week")
        .with_order("x y z; DROP");

    let error = run_report(&mut spy, &request).expect_err("malformed order should fail");
    assert!(matches!(error, ReportError::BadOrderField { .. }));
    assert!(spy.calls.is_empty());
}

#[test]
fn sim_type_query_still_ignores_valid_group_and_order() {
    let request = ReportRequest::new(ReportQuery::SimType)
        .with_filter("sim_name", "generator")
        .with_group("os")
        .with_order("desc:sim_type")
        .with_limit(5);

    insta::assert_snapshot!(
        aggregate_sql(&request),
        @"SELECT DISTINCT CASE WHEN session.sim_type = 0 THEN 'java' ELSE 'flash' END AS sim_type FROM session WHERE session.sim_name = (SELECT value FROM temp.report_bindings WHERE symbol = 'sid')"
    );
}

#[test]
fn spy_sees_statements_in_plan_order() {
    let mut spy = SpyConnection::default();
    let request = ReportRequest::new(ReportQuery::MessageCount)
        .with_filter("sim_project", "faraday")
        .with_filter("host_simplified_os", "Windows");

    let outcome = run_report(&mut spy, &request).expect("spy run should succeed");
    assert_eq!(outcome.statements_executed, 4);
    assert_eq!(spy.calls.len(), 4);
    assert!(spy.calls[0].starts_with("CREATE TEMP TABLE"));
    assert!(spy.calls[1].contains("'pid'"));
    assert!(spy.calls[2].contains("'os'"));
    assert!(spy.calls[3].starts_with("SELECT COUNT(*) AS message_count FROM session WHERE"));
    assert_eq!(outcome.unmatched_lookups.len(), 2);
}

#[test]
fn adversarial_numeric_operand_is_rejected() {
    let request = ReportRequest::new(ReportQuery::MessageCount).with_filter("sim_dev", "1 OR 1=1");
    assert!(matches!(
        compile_report(&request),
        Err(ReportError::BadFilterValue { field, .. }) if field == "sim_dev"
    ));
}

#[test]
fn adversarial_text_operands_stay_out_of_sql() {
    let payload = "x' OR '1'='1";
    let request = ReportRequest::new(ReportQuery::MessageCount)
        .with_filter("sim_locale_country", payload)
        .with_filter("sim_name", payload);
    let plan = compile_report(&request).expect("text filters should compile");

    for statement in plan.statements() {
        assert!(!statement.sql.contains("'1'='1"), "sql: {}", statement.sql);
    }
    assert_eq!(
        plan.aggregate().params,
        vec![SqlValue::Text(payload.to_string())]
    );
}

#[test]
fn order_and_group_outside_the_catalog_are_rejected() {
    let bad_order = ReportRequest::new(ReportQuery::MessageCount)
        .with_group("week")
        .with_order("week; DROP TABLE session");
    assert!(matches!(
        compile_report(&bad_order),
        Err(ReportError::BadOrderField { .. })
    ));

    let bad_group = ReportRequest::new(ReportQuery::MessageCount).with_group("session.id");
    assert!(matches!(
        compile_report(&bad_group),
        Err(ReportError::BadFilterField { .. })
    ));
}

#[test]
fn unknown_sim_type_value_is_rejected() {
    let request = ReportRequest::new(ReportQuery::MessageCount).with_filter("sim_type", "applet");
    assert!(matches!(
        compile_report(&request),
        Err(ReportError::BadFilterValue { .. })
    ));
}

#[test]
fn empty_strings_count_as_not_supplied() {
    let request = ReportRequest::new(ReportQuery::MessageCount)
        .with_filter("sim_dev", "")
        .with_group("")
        .with_order("");
    let plan = compile_report(&request).expect("empty values should compile");

    assert_eq!(plan.len(), 1);
    assert_eq!(
        plan.aggregate().sql,
        "SELECT COUNT(*) AS message_count FROM session"
    );
}
