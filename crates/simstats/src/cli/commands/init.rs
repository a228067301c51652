use anyhow::Result;
use clap::Args;

use crate::config::RuntimePaths;

#[derive(Debug, Clone, Args)]
pub struct InitArgs {}

pub fn run(_args: &InitArgs, runtime_paths: &RuntimePaths) -> Result<()> {
    println!(
        "init: start data_dir={} database={}",
        runtime_paths.data_dir().display(),
        runtime_paths.database.display()
    );

    let connection = crate::schema::open_database(&runtime_paths.database)?;
    crate::schema::ensure_schema(&connection)?;

    println!(
        "init: complete schema_version={} next=import",
        crate::schema::SCHEMA_VERSION
    );
    Ok(())
}
