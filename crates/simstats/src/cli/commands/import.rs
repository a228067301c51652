use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use crate::config::RuntimePaths;
use crate::schema::SessionRecord;

#[derive(Debug, Clone, Args)]
pub struct ImportArgs {
    /// JSONL file with one session record per line.
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid session record at line {line}: {detail}")]
pub struct ImportRecordFailure {
    pub line: usize,
    pub detail: String,
}

pub fn run(args: &ImportArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    let input = runtime_paths.cwd.join(&args.input);
    println!(
        "import: start input={} database={}",
        input.display(),
        runtime_paths.database.display()
    );

    let records = read_session_records(&input)?;
    let mut connection = crate::schema::open_database(&runtime_paths.database)?;
    crate::schema::ensure_schema(&connection)?;
    let stats = crate::schema::write_sessions(&mut connection, &records)?;

    tracing::info!(
        sessions = stats.sessions_written,
        lookup_names = stats.lookup_names_created,
        "import committed"
    );
    println!(
        "import: complete sessions={} flash_info={} java_info={} lookup_names_created={}",
        stats.sessions_written,
        stats.flash_info_written,
        stats.java_info_written,
        stats.lookup_names_created
    );
    Ok(())
}

/// Parses every non-blank line; the first malformed line aborts the import.
pub fn read_session_records(path: &Path) -> Result<Vec<SessionRecord>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read session records: {}", path.display()))?;

    let mut records = Vec::new();
    for (index, line) in raw.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str::<SessionRecord>(line).map_err(|error| {
            ImportRecordFailure {
                line: index + 1,
                detail: error.to_string(),
            }
        })?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::read_session_records;

    #[test]
    fn malformed_line_reports_its_number() {
        let path = std::env::temp_dir().join(format!(
            "simstats-import-{}.jsonl",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "{\"timestamp\":\"2009-08-03 10:00:00\",\"sim_type\":\"java\",\"sim_project\":\"faraday\",\"sim_name\":\"generator\"}\n\nnot-json\n",
        )
        .expect("input should be writable");

        let error = read_session_records(&path).expect_err("third line should fail");
        let _ = std::fs::remove_file(&path);

        let failure = error
            .downcast_ref::<super::ImportRecordFailure>()
            .expect("error should be an import record failure");
        assert_eq!(failure.line, 3);
        assert!(
            error.to_string().starts_with("invalid session record at line 3: "),
            "unexpected message: {error}"
        );
    }
}
