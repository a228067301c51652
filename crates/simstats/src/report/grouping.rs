use crate::models::request::ReportQuery;

use super::catalog::{self, GroupDescriptor, SIM_TYPE_LABEL, SideTable};
use super::error::ReportError;
use super::predicates::PredicateAssembler;

/// Projection columns and GROUP BY keys contributed by the group dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    pub select: Vec<String>,
    pub group_keys: Vec<String>,
}

impl Projection {
    #[must_use]
    pub fn group_by_clause(&self) -> String {
        if self.group_keys.is_empty() {
            return String::new();
        }
        format!(" GROUP BY {}", self.group_keys.join(", "))
    }
}

/// Resolves `group` against the group catalog, falling back to a plain
/// field projection for filter fields without a dedicated dimension.
pub fn apply_group(
    group: &str,
    assembler: &mut PredicateAssembler,
) -> Result<Projection, ReportError> {
    if let Some(descriptor) = catalog::group(group) {
        return Ok(apply_descriptor(descriptor, assembler));
    }

    let Some(field) = catalog::field(group) else {
        return Err(ReportError::BadFilterField {
            field: group.to_string(),
        });
    };

    let table = match SideTable::for_field_name(field.name) {
        Some(side_table) => {
            assembler.touch(side_table);
            side_table.table_name()
        }
        None => catalog::PRIMARY_TABLE,
    };
    let column = format!("{table}.{}", field.name);

    Ok(Projection {
        select: vec![format!("{column} AS {}", field.name)],
        group_keys: vec![column],
    })
}

/// Rejects group names that are neither a dimension nor a catalog field.
pub fn ensure_known_group(group: &str) -> Result<(), ReportError> {
    if catalog::group(group).is_some() || catalog::field(group).is_some() {
        return Ok(());
    }
    Err(ReportError::BadFilterField {
        field: group.to_string(),
    })
}

fn apply_descriptor(
    descriptor: &'static GroupDescriptor,
    assembler: &mut PredicateAssembler,
) -> Projection {
    for table in descriptor.required_joins {
        assembler.require_join(table);
    }
    for linkage in descriptor.linkage_predicates {
        assembler.require_linkage(linkage);
    }
    if let Some(side_table) = descriptor.side_table {
        assembler.touch(side_table);
    }

    Projection {
        select: descriptor
            .select_expressions
            .iter()
            .map(ToString::to_string)
            .collect(),
        group_keys: descriptor
            .group_keys
            .iter()
            .map(ToString::to_string)
            .collect(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateTemplate {
    Count,
    SumSessions,
    DistinctSimType,
}

impl AggregateTemplate {
    #[must_use]
    pub const fn for_query(query: ReportQuery) -> Self {
        match query {
            ReportQuery::MessageCount => Self::Count,
            ReportQuery::SessionCount => Self::SumSessions,
            ReportQuery::SimType => Self::DistinctSimType,
        }
    }

    #[must_use]
    pub fn select_expression(self) -> String {
        match self {
            Self::Count => "COUNT(*) AS message_count".to_string(),
            Self::SumSessions => "SUM(session.sim_sessions_since) AS session_count".to_string(),
            Self::DistinctSimType => format!("DISTINCT {SIM_TYPE_LABEL} AS sim_type"),
        }
    }
}
