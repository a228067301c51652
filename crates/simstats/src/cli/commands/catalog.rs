use anyhow::{Context, Result};
use clap::Args;
use serde_json::{Value, json};

use crate::models::{ReportEnvelope, ReportQuery};
use crate::report::catalog::{self, FieldKind};

#[derive(Debug, Clone, Args)]
pub struct CatalogArgs {
    /// Include relations, lookup tables and group SQL.
    #[arg(long, default_value_t = false)]
    pub verbose: bool,
}

pub fn run(args: &CatalogArgs) -> Result<()> {
    let envelope = ReportEnvelope::ok("catalog", catalog_document(args.verbose))
        .with_meta("field_count", json!(catalog::FIELDS.len()))
        .with_meta("group_count", json!(catalog::GROUPS.len()));
    let encoded = serde_json::to_string(&envelope).context("failed to encode catalog envelope")?;
    println!("{encoded}");
    Ok(())
}

#[must_use]
pub fn catalog_document(verbose: bool) -> Value {
    let queries = ReportQuery::ALL
        .iter()
        .map(|query| query.key())
        .collect::<Vec<_>>();

    if !verbose {
        return json!({
            "queries": queries,
            "fields": catalog::FIELDS.iter().map(|field| field.name).collect::<Vec<_>>(),
            "groups": catalog::GROUPS.iter().map(|group| group.name).collect::<Vec<_>>(),
        });
    }

    let fields = catalog::FIELDS
        .iter()
        .map(|field| {
            json!({
                "name": field.name,
                "table": field.relation.table_name(),
                "grammar": grammar_key(field.kind),
                "kind": field.kind,
            })
        })
        .collect::<Vec<_>>();

    json!({
        "queries": queries,
        "fields": fields,
        "groups": catalog::GROUPS,
    })
}

fn grammar_key(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::NumericComparison => "null | not_null | [less_than|less_than_equal|greater_than|greater_than_equal:]<number>",
        FieldKind::StringEquality => "null | not_null | <text>",
        FieldKind::ForeignKeyLookup(_) => "<name>",
        FieldKind::SimTypeDiscriminant => "java | flash",
    }
}
