use std::collections::BTreeSet;

use rusqlite::types::Value as SqlValue;

use super::catalog::{Relation, SideTable};

/// One WHERE fragment with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    sql: String,
    params: Vec<SqlValue>,
    variable: Option<&'static str>,
}

impl Predicate {
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            variable: None,
        }
    }

    #[must_use]
    pub fn with_params(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
            variable: None,
        }
    }

    /// A predicate that reads the connection-scoped variable `symbol`.
    #[must_use]
    pub fn referencing(sql: impl Into<String>, symbol: &'static str) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            variable: Some(symbol),
        }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    #[must_use]
    pub fn variable(&self) -> Option<&'static str> {
        self.variable
    }
}

/// Collects WHERE fragments and extra FROM tables for the aggregate
/// statement.
///
/// Direct comparisons render first, then predicates that dereference lookup
/// variables, then join linkage. Side tables are recorded as presence flags
/// and contribute exactly one linkage predicate each in [`finish`].
///
/// [`finish`]: PredicateAssembler::finish
#[derive(Debug, Default)]
pub struct PredicateAssembler {
    direct: Vec<Predicate>,
    deferred: Vec<Predicate>,
    linkage: Vec<Predicate>,
    joins: Vec<&'static str>,
    side_tables: BTreeSet<SideTable>,
}

impl PredicateAssembler {
    pub fn push_direct(&mut self, predicate: Predicate) {
        self.direct.push(predicate);
    }

    pub fn push_deferred(&mut self, predicate: Predicate) {
        self.deferred.push(predicate);
    }

    pub fn require_join(&mut self, table: &'static str) {
        if !self.joins.contains(&table) {
            self.joins.push(table);
        }
    }

    pub fn require_linkage(&mut self, sql: &str) {
        if !self.linkage.iter().any(|existing| existing.sql() == sql) {
            self.linkage.push(Predicate::new(sql));
        }
    }

    pub fn touch(&mut self, side_table: SideTable) {
        self.side_tables.insert(side_table);
    }

    pub fn touch_relation(&mut self, relation: Relation) {
        if let Some(side_table) = relation.side_table() {
            self.touch(side_table);
        }
    }

    #[must_use]
    pub fn touches(&self, side_table: SideTable) -> bool {
        self.side_tables.contains(&side_table)
    }

    #[must_use]
    pub fn finish(mut self) -> AssembledPredicates {
        for side_table in std::mem::take(&mut self.side_tables) {
            self.require_linkage(side_table.linkage_predicate());
            self.require_join(side_table.table_name());
        }

        let mut predicates = self.direct;
        predicates.extend(self.deferred);
        predicates.extend(self.linkage);

        AssembledPredicates {
            joins: self.joins,
            predicates,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssembledPredicates {
    pub joins: Vec<&'static str>,
    pub predicates: Vec<Predicate>,
}

impl AssembledPredicates {
    /// `, t1, t2` suffix for a comma-join FROM list.
    #[must_use]
    pub fn tables_clause(&self) -> String {
        if self.joins.is_empty() {
            return String::new();
        }
        format!(", {}", self.joins.join(", "))
    }

    #[must_use]
    pub fn where_clause(&self) -> String {
        match self.predicates.as_slice() {
            [] => String::new(),
            [only] => format!(" WHERE {}", only.sql()),
            many => format!(
                " WHERE ({})",
                many.iter()
                    .map(Predicate::sql)
                    .collect::<Vec<_>>()
                    .join(" AND ")
            ),
        }
    }

    #[must_use]
    pub fn params(&self) -> Vec<SqlValue> {
        self.predicates
            .iter()
            .flat_map(|predicate| predicate.params().iter().cloned())
            .collect()
    }

    /// Variables dereferenced by the predicates, in order of appearance.
    #[must_use]
    pub fn variables(&self) -> Vec<&'static str> {
        self.predicates
            .iter()
            .filter_map(Predicate::variable)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_table_linkage_is_emitted_once() {
        let mut assembler = PredicateAssembler::default();
        assembler.touch_relation(Relation::SessionFlashInfo);
        assembler.touch(SideTable::FlashInfo);
        assembler.require_linkage(SideTable::FlashInfo.linkage_predicate());
        assembler.require_join("session_flash_info");

        let assembled = assembler.finish();
        assert_eq!(assembled.joins, vec!["session_flash_info"]);
        assert_eq!(
            assembled.where_clause(),
            " WHERE session.id = session_flash_info.session_id"
        );
    }

    #[test]
    fn deferred_predicates_follow_direct_ones() {
        let mut assembler = PredicateAssembler::default();
        assembler.push_deferred(Predicate::referencing("session.sim_name = @sid", "sid"));
        assembler.push_direct(Predicate::with_params(
            "session.sim_dev = ?",
            vec![SqlValue::Integer(1)],
        ));

        let assembled = assembler.finish();
        assert_eq!(
            assembled.where_clause(),
            " WHERE (session.sim_dev = ? AND session.sim_name = @sid)"
        );
        assert_eq!(assembled.params(), vec![SqlValue::Integer(1)]);
        assert_eq!(assembled.variables(), vec!["sid"]);
    }

    #[test]
    fn session_relation_sets_no_flag() {
        let mut assembler = PredicateAssembler::default();
        assembler.touch_relation(Relation::Session);
        assert!(!assembler.touches(SideTable::FlashInfo));
        assert!(!assembler.touches(SideTable::JavaInfo));
        assert_eq!(assembler.finish().tables_clause(), "");
    }
}
