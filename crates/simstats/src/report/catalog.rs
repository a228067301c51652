//! Closed catalog of filterable fields and group dimensions.
//!
//! Every table, column and expression that can reach generated SQL is listed
//! here. Request keys are only ever used to look entries up, never spliced
//! into statements.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::Serialize;

pub const PRIMARY_TABLE: &str = "session";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Session,
    SessionFlashInfo,
    SessionJavaInfo,
}

impl Relation {
    #[must_use]
    pub const fn table_name(self) -> &'static str {
        match self {
            Self::Session => PRIMARY_TABLE,
            Self::SessionFlashInfo => "session_flash_info",
            Self::SessionJavaInfo => "session_java_info",
        }
    }

    #[must_use]
    pub const fn side_table(self) -> Option<SideTable> {
        match self {
            Self::Session => None,
            Self::SessionFlashInfo => Some(SideTable::FlashInfo),
            Self::SessionJavaInfo => Some(SideTable::JavaInfo),
        }
    }
}

/// Optional one-to-one extensions of `session`, joined only when referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SideTable {
    FlashInfo,
    JavaInfo,
}

impl SideTable {
    pub const ALL: [SideTable; 2] = [SideTable::FlashInfo, SideTable::JavaInfo];

    #[must_use]
    pub const fn relation(self) -> Relation {
        match self {
            Self::FlashInfo => Relation::SessionFlashInfo,
            Self::JavaInfo => Relation::SessionJavaInfo,
        }
    }

    #[must_use]
    pub const fn table_name(self) -> &'static str {
        self.relation().table_name()
    }

    /// Field-name prefix shared by every column of the side table.
    #[must_use]
    pub const fn namespace(self) -> &'static str {
        match self {
            Self::FlashInfo => "host_flash",
            Self::JavaInfo => "host_java",
        }
    }

    #[must_use]
    pub const fn linkage_predicate(self) -> &'static str {
        match self {
            Self::FlashInfo => "session.id = session_flash_info.session_id",
            Self::JavaInfo => "session.id = session_java_info.session_id",
        }
    }

    #[must_use]
    pub fn for_field_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|side| name.starts_with(side.namespace()))
    }
}

/// Name table and connection-scoped variable used to resolve a lookup field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LookupTarget {
    pub table: &'static str,
    pub symbol: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    NumericComparison,
    StringEquality,
    ForeignKeyLookup(LookupTarget),
    SimTypeDiscriminant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub relation: Relation,
    pub kind: FieldKind,
}

impl FieldDescriptor {
    #[must_use]
    pub fn column(&self) -> String {
        format!("{}.{}", self.relation.table_name(), self.name)
    }

    #[must_use]
    pub const fn lookup_target(&self) -> Option<LookupTarget> {
        match self.kind {
            FieldKind::ForeignKeyLookup(target) => Some(target),
            _ => None,
        }
    }
}

const fn numeric(name: &'static str, relation: Relation) -> FieldDescriptor {
    FieldDescriptor {
        name,
        relation,
        kind: FieldKind::NumericComparison,
    }
}

const fn string(name: &'static str) -> FieldDescriptor {
    FieldDescriptor {
        name,
        relation: Relation::Session,
        kind: FieldKind::StringEquality,
    }
}

const fn lookup(
    name: &'static str,
    relation: Relation,
    table: &'static str,
    symbol: &'static str,
) -> FieldDescriptor {
    FieldDescriptor {
        name,
        relation,
        kind: FieldKind::ForeignKeyLookup(LookupTarget { table, symbol }),
    }
}

/// Filter fields in declaration order; predicates follow this order.
pub static FIELDS: &[FieldDescriptor] = &[
    FieldDescriptor {
        name: "sim_type",
        relation: Relation::Session,
        kind: FieldKind::SimTypeDiscriminant,
    },
    numeric("sim_dev", Relation::Session),
    numeric("sim_major_version", Relation::Session),
    numeric("sim_minor_version", Relation::Session),
    numeric("sim_dev_version", Relation::Session),
    numeric("sim_svn_revision", Relation::Session),
    numeric("sim_version_timestamp", Relation::Session),
    numeric("host_flash_version_major", Relation::SessionFlashInfo),
    numeric("host_flash_version_minor", Relation::SessionFlashInfo),
    numeric("host_flash_version_revision", Relation::SessionFlashInfo),
    numeric("host_flash_version_build", Relation::SessionFlashInfo),
    numeric("host_flash_time_offset", Relation::SessionFlashInfo),
    numeric("host_flash_accessibility", Relation::SessionFlashInfo),
    string("sim_locale_language"),
    string("sim_locale_country"),
    string("sim_sessions_since"),
    string("sim_total_sessions"),
    string("host_locale_language"),
    string("host_locale_country"),
    lookup("sim_project", Relation::Session, "sim_project", "pid"),
    lookup("sim_name", Relation::Session, "sim_name", "sid"),
    lookup("sim_deployment", Relation::Session, "deployment", "deploy"),
    lookup(
        "sim_distribution_tag",
        Relation::Session,
        "distribution_tag",
        "dist_tag",
    ),
    lookup("host_simplified_os", Relation::Session, "simplified_os", "os"),
    lookup(
        "host_flash_version_type",
        Relation::SessionFlashInfo,
        "flash_version_type",
        "fl_ver_type",
    ),
    lookup(
        "host_flash_domain",
        Relation::SessionFlashInfo,
        "flash_domain",
        "fl_domain",
    ),
    lookup("host_flash_os", Relation::SessionFlashInfo, "flash_os", "fl_os"),
    lookup(
        "host_java_os_name",
        Relation::SessionJavaInfo,
        "java_os_name",
        "java_os_name",
    ),
    lookup(
        "host_java_os_version",
        Relation::SessionJavaInfo,
        "java_os_version",
        "java_os_version",
    ),
    lookup(
        "host_java_os_arch",
        Relation::SessionJavaInfo,
        "java_os_arch",
        "java_os_arch",
    ),
    lookup(
        "host_java_vendor",
        Relation::SessionJavaInfo,
        "java_vendor",
        "java_vendor",
    ),
    lookup(
        "host_java_webstart_version",
        Relation::SessionJavaInfo,
        "java_webstart_version",
        "java_webstart_version",
    ),
    lookup(
        "host_java_timezone",
        Relation::SessionJavaInfo,
        "java_timezone",
        "java_timezone",
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GroupDescriptor {
    pub name: &'static str,
    pub select_expressions: &'static [&'static str],
    pub required_joins: &'static [&'static str],
    pub group_keys: &'static [&'static str],
    pub linkage_predicates: &'static [&'static str],
    pub side_table: Option<SideTable>,
}

macro_rules! sim_type_label {
    () => {
        "CASE WHEN session.sim_type = 0 THEN 'java' ELSE 'flash' END"
    };
}

/// Maps the `session.sim_type` discriminant to `java`/`flash`.
pub const SIM_TYPE_LABEL: &str = sim_type_label!();

const fn dimension(
    name: &'static str,
    select_expressions: &'static [&'static str],
    required_joins: &'static [&'static str],
    group_keys: &'static [&'static str],
    linkage_predicates: &'static [&'static str],
    side_table: Option<SideTable>,
) -> GroupDescriptor {
    GroupDescriptor {
        name,
        select_expressions,
        required_joins,
        group_keys,
        linkage_predicates,
        side_table,
    }
}

pub static GROUPS: &[GroupDescriptor] = &[
    dimension(
        "week",
        &["strftime('%G%V', session.timestamp) AS week"],
        &[],
        &["week"],
        &[],
        None,
    ),
    dimension(
        "version",
        &["session.sim_major_version || '.' || session.sim_minor_version || '.' || \
           session.sim_dev_version || ' (' || session.sim_svn_revision || ')' AS version"],
        &[],
        &["version"],
        &[],
        None,
    ),
    dimension(
        "os",
        &["simplified_os.name AS os"],
        &["simplified_os"],
        &["session.host_simplified_os"],
        &["session.host_simplified_os = simplified_os.id"],
        None,
    ),
    dimension(
        "sim_type",
        &[concat!(sim_type_label!(), " AS sim_type")],
        &[],
        &[SIM_TYPE_LABEL],
        &[],
        None,
    ),
    dimension(
        "sim_name",
        &["sim_name.name AS sim_name"],
        &["sim_name"],
        &["session.sim_name"],
        &["session.sim_name = sim_name.id"],
        None,
    ),
    dimension(
        "sim_project",
        &["sim_project.name AS sim_project"],
        &["sim_project"],
        &["session.sim_project"],
        &["session.sim_project = sim_project.id"],
        None,
    ),
    dimension(
        "project_name",
        &["sim_project.name AS sim_project", "sim_name.name AS sim_name"],
        &["sim_project", "sim_name"],
        &["session.sim_project", "session.sim_name"],
        &[
            "session.sim_project = sim_project.id",
            "session.sim_name = sim_name.id",
        ],
        None,
    ),
    dimension(
        "sim_deployment",
        &["deployment.name AS sim_deployment"],
        &["deployment"],
        &["session.sim_deployment"],
        &["session.sim_deployment = deployment.id"],
        None,
    ),
    dimension(
        "sim_distribution_tag",
        &["distribution_tag.name AS sim_distribution_tag"],
        &["distribution_tag"],
        &["session.sim_distribution_tag"],
        &["session.sim_distribution_tag = distribution_tag.id"],
        None,
    ),
    dimension(
        "host_simplified_os",
        &["simplified_os.name AS host_simplified_os"],
        &["simplified_os"],
        &["session.host_simplified_os"],
        &["session.host_simplified_os = simplified_os.id"],
        None,
    ),
    dimension(
        "host_flash_version_type",
        &["flash_version_type.name AS host_flash_version_type"],
        &["flash_version_type"],
        &["session_flash_info.host_flash_version_type"],
        &["session_flash_info.host_flash_version_type = flash_version_type.id"],
        Some(SideTable::FlashInfo),
    ),
    dimension(
        "host_flash_domain",
        &["flash_domain.name AS host_flash_domain"],
        &["flash_domain"],
        &["session_flash_info.host_flash_domain"],
        &["session_flash_info.host_flash_domain = flash_domain.id"],
        Some(SideTable::FlashInfo),
    ),
    dimension(
        "host_flash_os",
        &["flash_os.name AS host_flash_os"],
        &["flash_os"],
        &["session_flash_info.host_flash_os"],
        &["session_flash_info.host_flash_os = flash_os.id"],
        Some(SideTable::FlashInfo),
    ),
    dimension(
        "host_flash_version",
        &["session_flash_info.host_flash_version_major || ',' || \
           session_flash_info.host_flash_version_minor || ',' || \
           session_flash_info.host_flash_version_revision || ',' || \
           session_flash_info.host_flash_version_build AS host_flash_version"],
        &[],
        &["host_flash_version"],
        &[],
        Some(SideTable::FlashInfo),
    ),
    dimension(
        "host_java_os_name",
        &["java_os_name.name AS host_java_os_name"],
        &["java_os_name"],
        &["session_java_info.host_java_os_name"],
        &["session_java_info.host_java_os_name = java_os_name.id"],
        Some(SideTable::JavaInfo),
    ),
    dimension(
        "host_java_os_version",
        &["java_os_version.name AS host_java_os_version"],
        &["java_os_version"],
        &["session_java_info.host_java_os_version"],
        &["session_java_info.host_java_os_version = java_os_version.id"],
        Some(SideTable::JavaInfo),
    ),
    dimension(
        "host_java_os_arch",
        &["java_os_arch.name AS host_java_os_arch"],
        &["java_os_arch"],
        &["session_java_info.host_java_os_arch"],
        &["session_java_info.host_java_os_arch = java_os_arch.id"],
        Some(SideTable::JavaInfo),
    ),
    dimension(
        "host_java_os",
        &["java_os_name.name || ' ' || java_os_version.name || ' (' || \
           java_os_arch.name || ')' AS host_java_os"],
        &["java_os_name", "java_os_version", "java_os_arch"],
        &[
            "session_java_info.host_java_os_name",
            "session_java_info.host_java_os_version",
            "session_java_info.host_java_os_arch",
        ],
        &[
            "session_java_info.host_java_os_name = java_os_name.id",
            "session_java_info.host_java_os_version = java_os_version.id",
            "session_java_info.host_java_os_arch = java_os_arch.id",
        ],
        Some(SideTable::JavaInfo),
    ),
    dimension(
        "host_java_vendor",
        &["java_vendor.name AS host_java_vendor"],
        &["java_vendor"],
        &["session_java_info.host_java_vendor"],
        &["session_java_info.host_java_vendor = java_vendor.id"],
        Some(SideTable::JavaInfo),
    ),
    dimension(
        "host_java_webstart_version",
        &["java_webstart_version.name AS host_java_webstart_version"],
        &["java_webstart_version"],
        &["session_java_info.host_java_webstart_version"],
        &["session_java_info.host_java_webstart_version = java_webstart_version.id"],
        Some(SideTable::JavaInfo),
    ),
    dimension(
        "host_java_timezone",
        &["java_timezone.name AS host_java_timezone"],
        &["java_timezone"],
        &["session_java_info.host_java_timezone"],
        &["session_java_info.host_java_timezone = java_timezone.id"],
        Some(SideTable::JavaInfo),
    ),
];

#[must_use]
pub fn field(name: &str) -> Option<&'static FieldDescriptor> {
    static INDEX: OnceLock<BTreeMap<&'static str, &'static FieldDescriptor>> = OnceLock::new();
    INDEX
        .get_or_init(|| FIELDS.iter().map(|field| (field.name, field)).collect())
        .get(name)
        .copied()
}

#[must_use]
pub fn group(name: &str) -> Option<&'static GroupDescriptor> {
    static INDEX: OnceLock<BTreeMap<&'static str, &'static GroupDescriptor>> = OnceLock::new();
    INDEX
        .get_or_init(|| GROUPS.iter().map(|group| (group.name, group)).collect())
        .get(name)
        .copied()
}

/// Name tables behind lookup fields, in catalog order.
pub fn lookup_tables() -> impl Iterator<Item = &'static str> {
    FIELDS
        .iter()
        .filter_map(FieldDescriptor::lookup_target)
        .map(|target| target.table)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn field_names_and_symbols_are_unique() {
        let names = FIELDS.iter().map(|f| f.name).collect::<BTreeSet<_>>();
        assert_eq!(names.len(), FIELDS.len());

        let symbols = FIELDS
            .iter()
            .filter_map(FieldDescriptor::lookup_target)
            .map(|target| target.symbol)
            .collect::<Vec<_>>();
        let unique = symbols.iter().collect::<BTreeSet<_>>();
        assert_eq!(unique.len(), symbols.len());
    }

    #[test]
    fn side_table_fields_follow_namespace_prefix() {
        for field in FIELDS {
            assert_eq!(
                SideTable::for_field_name(field.name),
                field.relation.side_table(),
                "field: {}",
                field.name
            );
        }
    }

    #[test]
    fn group_joins_only_reference_lookup_tables() {
        let tables = lookup_tables().collect::<BTreeSet<_>>();
        for group in GROUPS {
            for join in group.required_joins {
                assert!(tables.contains(join), "group {} joins {join}", group.name);
            }
        }
    }

    #[test]
    fn composite_groups_emit_every_key() {
        let project_name = group("project_name").expect("project_name should exist");
        assert_eq!(project_name.select_expressions.len(), 2);
        assert_eq!(
            project_name.group_keys,
            &["session.sim_project", "session.sim_name"]
        );

        let java_os = group("host_java_os").expect("host_java_os should exist");
        assert_eq!(java_os.group_keys.len(), 3);
        assert_eq!(java_os.linkage_predicates.len(), 3);
    }

    #[test]
    fn unknown_names_are_absent() {
        assert!(field("nonexistent_field").is_none());
        assert!(group("nonexistent_field").is_none());
    }
}
