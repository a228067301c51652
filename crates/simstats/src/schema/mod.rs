//! Telemetry schema and the session-record writer used by `init`/`import`
//! and by test fixtures.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result, bail};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OpenFlags, Transaction, params, params_from_iter};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::report::catalog;
use crate::utils::time::normalize_session_timestamp;

pub const SCHEMA_VERSION: &str = "simstats.sqlite.v1";
pub const SCHEMA_META_TABLE: &str = "schema_meta";

const CREATE_SESSION_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS session (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp TEXT NOT NULL,
    sim_type INTEGER NOT NULL,
    sim_project INTEGER NOT NULL REFERENCES sim_project(id),
    sim_name INTEGER NOT NULL REFERENCES sim_name(id),
    sim_deployment INTEGER REFERENCES deployment(id),
    sim_distribution_tag INTEGER REFERENCES distribution_tag(id),
    sim_dev INTEGER,
    sim_major_version INTEGER,
    sim_minor_version INTEGER,
    sim_dev_version INTEGER,
    sim_svn_revision INTEGER,
    sim_version_timestamp INTEGER,
    sim_locale_language TEXT,
    sim_locale_country TEXT,
    sim_sessions_since INTEGER,
    sim_total_sessions INTEGER,
    host_locale_language TEXT,
    host_locale_country TEXT,
    host_simplified_os INTEGER REFERENCES simplified_os(id),
    CHECK (sim_type IN (0, 1))
);
"#;

const CREATE_SESSION_FLASH_INFO_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS session_flash_info (
    session_id INTEGER PRIMARY KEY REFERENCES session(id),
    host_flash_version_type INTEGER REFERENCES flash_version_type(id),
    host_flash_version_major INTEGER,
    host_flash_version_minor INTEGER,
    host_flash_version_revision INTEGER,
    host_flash_version_build INTEGER,
    host_flash_time_offset INTEGER,
    host_flash_accessibility INTEGER,
    host_flash_domain INTEGER REFERENCES flash_domain(id),
    host_flash_os INTEGER REFERENCES flash_os(id)
);
"#;

const CREATE_SESSION_JAVA_INFO_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS session_java_info (
    session_id INTEGER PRIMARY KEY REFERENCES session(id),
    host_java_os_name INTEGER REFERENCES java_os_name(id),
    host_java_os_version INTEGER REFERENCES java_os_version(id),
    host_java_os_arch INTEGER REFERENCES java_os_arch(id),
    host_java_vendor INTEGER REFERENCES java_vendor(id),
    host_java_webstart_version INTEGER REFERENCES java_webstart_version(id),
    host_java_timezone INTEGER REFERENCES java_timezone(id)
);
"#;

const CREATE_INDEX_SESSION_TIMESTAMP_SQL: &str =
    "CREATE INDEX IF NOT EXISTS idx_session_timestamp ON session(timestamp);";

const CREATE_INDEX_SESSION_SIM_NAME_SQL: &str =
    "CREATE INDEX IF NOT EXISTS idx_session_sim_name ON session(sim_name);";

const CREATE_META_TABLE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_meta (
    schema_version TEXT NOT NULL PRIMARY KEY,
    applied_at_utc TEXT NOT NULL
);
"#;

/// Full DDL: one `(id, name)` table per lookup dimension, then the session
/// tables that reference them.
#[must_use]
pub fn create_schema_sql() -> String {
    let mut sql = String::new();
    for table in catalog::lookup_tables() {
        sql.push_str(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (\n    id INTEGER PRIMARY KEY AUTOINCREMENT,\n    name TEXT NOT NULL UNIQUE\n);\n"
        ));
    }
    for statement in [
        CREATE_SESSION_TABLE_SQL,
        CREATE_SESSION_FLASH_INFO_TABLE_SQL,
        CREATE_SESSION_JAVA_INFO_TABLE_SQL,
        CREATE_INDEX_SESSION_TIMESTAMP_SQL,
        CREATE_INDEX_SESSION_SIM_NAME_SQL,
        CREATE_META_TABLE_SQL,
    ] {
        sql.push_str(statement.trim());
        sql.push('\n');
    }
    sql
}

/// Opens (creating if needed) the database file and its parent directory.
pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create database parent directory: {}",
                parent.display()
            )
        })?;
    }

    Connection::open(path)
        .with_context(|| format!("failed to open sqlite database: {}", path.display()))
}

/// Opens an existing database without creating it; reports never create
/// an empty file as a side effect.
pub fn open_existing_database(path: &Path) -> Result<Connection> {
    if !path.is_file() {
        bail!(
            "database does not exist: {} (run `simstats init` first)",
            path.display()
        );
    }

    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to open sqlite database: {}", path.display()))
}

pub fn ensure_schema(connection: &Connection) -> Result<()> {
    connection
        .execute_batch(&create_schema_sql())
        .context("failed to create telemetry schema")?;

    let exists = connection
        .query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM {SCHEMA_META_TABLE} WHERE schema_version = ?1)"),
            [SCHEMA_VERSION],
            |row| row.get::<usize, i64>(0),
        )
        .context("failed to query schema version metadata")?;
    if exists != 0 {
        return Ok(());
    }

    let applied_at_utc = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .context("failed to format schema applied timestamp")?;
    connection
        .execute(
            &format!(
                "INSERT INTO {SCHEMA_META_TABLE} (schema_version, applied_at_utc) VALUES (?1, ?2)"
            ),
            params![SCHEMA_VERSION, applied_at_utc],
        )
        .context("failed to write schema meta row")?;

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SimType {
    Java,
    Flash,
}

impl SimType {
    #[must_use]
    pub const fn discriminant(self) -> i64 {
        match self {
            Self::Java => 0,
            Self::Flash => 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FlashInfo {
    pub version_type: Option<String>,
    pub version_major: Option<i64>,
    pub version_minor: Option<i64>,
    pub version_revision: Option<i64>,
    pub version_build: Option<i64>,
    pub time_offset: Option<i64>,
    pub accessibility: Option<i64>,
    pub domain: Option<String>,
    pub os: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct JavaInfo {
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub os_arch: Option<String>,
    pub vendor: Option<String>,
    pub webstart_version: Option<String>,
    pub timezone: Option<String>,
}

/// One launch of a simulation, as accepted by `import`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SessionRecord {
    pub timestamp: String,
    pub sim_type: SimType,
    pub sim_project: String,
    pub sim_name: String,

    #[serde(default)]
    pub sim_deployment: Option<String>,
    #[serde(default)]
    pub sim_distribution_tag: Option<String>,
    #[serde(default)]
    pub sim_dev: Option<i64>,
    #[serde(default)]
    pub sim_major_version: Option<i64>,
    #[serde(default)]
    pub sim_minor_version: Option<i64>,
    #[serde(default)]
    pub sim_dev_version: Option<i64>,
    #[serde(default)]
    pub sim_svn_revision: Option<i64>,
    #[serde(default)]
    pub sim_version_timestamp: Option<i64>,
    #[serde(default)]
    pub sim_locale_language: Option<String>,
    #[serde(default)]
    pub sim_locale_country: Option<String>,
    #[serde(default)]
    pub sim_sessions_since: Option<i64>,
    #[serde(default)]
    pub sim_total_sessions: Option<i64>,
    #[serde(default)]
    pub host_locale_language: Option<String>,
    #[serde(default)]
    pub host_locale_country: Option<String>,
    #[serde(default)]
    pub host_simplified_os: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flash: Option<FlashInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub java: Option<JavaInfo>,
}

impl SessionRecord {
    #[must_use]
    pub fn new(
        timestamp: impl Into<String>,
        sim_type: SimType,
        sim_project: impl Into<String>,
        sim_name: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            sim_type,
            sim_project: sim_project.into(),
            sim_name: sim_name.into(),
            sim_deployment: None,
            sim_distribution_tag: None,
            sim_dev: None,
            sim_major_version: None,
            sim_minor_version: None,
            sim_dev_version: None,
            sim_svn_revision: None,
            sim_version_timestamp: None,
            sim_locale_language: None,
            sim_locale_country: None,
            sim_sessions_since: None,
            sim_total_sessions: None,
            host_locale_language: None,
            host_locale_country: None,
            host_simplified_os: None,
            flash: None,
            java: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteStats {
    pub sessions_written: usize,
    pub flash_info_written: usize,
    pub java_info_written: usize,
    pub lookup_names_created: usize,
}

const SESSION_INSERT_SQL: &str = "INSERT INTO session (\
    timestamp, sim_type, sim_project, sim_name, sim_deployment, sim_distribution_tag, \
    sim_dev, sim_major_version, sim_minor_version, sim_dev_version, sim_svn_revision, \
    sim_version_timestamp, sim_locale_language, sim_locale_country, sim_sessions_since, \
    sim_total_sessions, host_locale_language, host_locale_country, host_simplified_os\
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)";

const FLASH_INFO_INSERT_SQL: &str = "INSERT INTO session_flash_info (\
    session_id, host_flash_version_type, host_flash_version_major, host_flash_version_minor, \
    host_flash_version_revision, host_flash_version_build, host_flash_time_offset, \
    host_flash_accessibility, host_flash_domain, host_flash_os\
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)";

const JAVA_INFO_INSERT_SQL: &str = "INSERT INTO session_java_info (\
    session_id, host_java_os_name, host_java_os_version, host_java_os_arch, \
    host_java_vendor, host_java_webstart_version, host_java_timezone\
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)";

/// Writes all records in one transaction, creating lookup names on demand.
/// Any failure rolls the whole batch back.
pub fn write_sessions(connection: &mut Connection, records: &[SessionRecord]) -> Result<WriteStats> {
    let tx = connection
        .transaction()
        .context("failed to open sqlite transaction")?;
    let mut lookups = LookupIds::default();
    let mut stats = WriteStats::default();

    for (index, record) in records.iter().enumerate() {
        write_session(&tx, &mut lookups, &mut stats, record)
            .with_context(|| format!("failed to write session record {index}"))?;
    }

    tx.commit().context("failed to commit session import")?;
    stats.lookup_names_created = lookups.created;
    Ok(stats)
}

fn write_session(
    tx: &Transaction<'_>,
    lookups: &mut LookupIds,
    stats: &mut WriteStats,
    record: &SessionRecord,
) -> Result<()> {
    let timestamp = normalize_session_timestamp(&record.timestamp)?;
    let values = vec![
        SqlValue::Text(timestamp),
        SqlValue::Integer(record.sim_type.discriminant()),
        SqlValue::Integer(lookups.id_for(tx, "sim_project", &record.sim_project)?),
        SqlValue::Integer(lookups.id_for(tx, "sim_name", &record.sim_name)?),
        lookups.optional_id(tx, "deployment", record.sim_deployment.as_deref())?,
        lookups.optional_id(tx, "distribution_tag", record.sim_distribution_tag.as_deref())?,
        integer(record.sim_dev),
        integer(record.sim_major_version),
        integer(record.sim_minor_version),
        integer(record.sim_dev_version),
        integer(record.sim_svn_revision),
        integer(record.sim_version_timestamp),
        text(record.sim_locale_language.as_deref()),
        text(record.sim_locale_country.as_deref()),
        integer(record.sim_sessions_since),
        integer(record.sim_total_sessions),
        text(record.host_locale_language.as_deref()),
        text(record.host_locale_country.as_deref()),
        lookups.optional_id(tx, "simplified_os", record.host_simplified_os.as_deref())?,
    ];
    tx.prepare_cached(SESSION_INSERT_SQL)
        .context("failed to prepare session insert")?
        .execute(params_from_iter(values))
        .context("failed to insert session")?;
    let session_id = tx.last_insert_rowid();
    stats.sessions_written += 1;

    if let Some(flash) = &record.flash {
        let values = vec![
            SqlValue::Integer(session_id),
            lookups.optional_id(tx, "flash_version_type", flash.version_type.as_deref())?,
            integer(flash.version_major),
            integer(flash.version_minor),
            integer(flash.version_revision),
            integer(flash.version_build),
            integer(flash.time_offset),
            integer(flash.accessibility),
            lookups.optional_id(tx, "flash_domain", flash.domain.as_deref())?,
            lookups.optional_id(tx, "flash_os", flash.os.as_deref())?,
        ];
        tx.prepare_cached(FLASH_INFO_INSERT_SQL)
            .context("failed to prepare flash info insert")?
            .execute(params_from_iter(values))
            .context("failed to insert flash info")?;
        stats.flash_info_written += 1;
    }

    if let Some(java) = &record.java {
        let values = vec![
            SqlValue::Integer(session_id),
            lookups.optional_id(tx, "java_os_name", java.os_name.as_deref())?,
            lookups.optional_id(tx, "java_os_version", java.os_version.as_deref())?,
            lookups.optional_id(tx, "java_os_arch", java.os_arch.as_deref())?,
            lookups.optional_id(tx, "java_vendor", java.vendor.as_deref())?,
            lookups.optional_id(tx, "java_webstart_version", java.webstart_version.as_deref())?,
            lookups.optional_id(tx, "java_timezone", java.timezone.as_deref())?,
        ];
        tx.prepare_cached(JAVA_INFO_INSERT_SQL)
            .context("failed to prepare java info insert")?
            .execute(params_from_iter(values))
            .context("failed to insert java info")?;
        stats.java_info_written += 1;
    }

    Ok(())
}

/// Per-import cache of `(table, name) -> id`.
#[derive(Debug, Default)]
struct LookupIds {
    ids: BTreeMap<(&'static str, String), i64>,
    created: usize,
}

impl LookupIds {
    fn id_for(&mut self, tx: &Transaction<'_>, table: &'static str, name: &str) -> Result<i64> {
        if let Some(id) = self.ids.get(&(table, name.to_string())) {
            return Ok(*id);
        }

        let inserted = tx
            .prepare_cached(&format!("INSERT OR IGNORE INTO {table} (name) VALUES (?1)"))
            .with_context(|| format!("failed to prepare {table} insert"))?
            .execute([name])
            .with_context(|| format!("failed to insert {table} name `{name}`"))?;
        self.created += inserted;

        let id = tx
            .prepare_cached(&format!("SELECT id FROM {table} WHERE name = ?1"))
            .with_context(|| format!("failed to prepare {table} lookup"))?
            .query_row([name], |row| row.get::<usize, i64>(0))
            .with_context(|| format!("failed to read {table} id for `{name}`"))?;
        self.ids.insert((table, name.to_string()), id);
        Ok(id)
    }

    fn optional_id(
        &mut self,
        tx: &Transaction<'_>,
        table: &'static str,
        name: Option<&str>,
    ) -> Result<SqlValue> {
        match name {
            Some(name) => Ok(SqlValue::Integer(self.id_for(tx, table, name)?)),
            None => Ok(SqlValue::Null),
        }
    }
}

fn integer(value: Option<i64>) -> SqlValue {
    value.map_or(SqlValue::Null, SqlValue::Integer)
}

fn text(value: Option<&str>) -> SqlValue {
    value.map_or(SqlValue::Null, |value| SqlValue::Text(value.to_string()))
}
