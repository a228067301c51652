use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use super::commands::{
    catalog::CatalogArgs, import::ImportArgs, init::InitArgs, report::ReportArgs,
    request_schema::RequestSchemaArgs,
};

#[derive(Debug, Parser)]
#[command(
    name = "simstats",
    version,
    about = "Usage-telemetry report compiler for simulation launch statistics"
)]
pub struct Cli {
    #[command(flatten)]
    pub runtime: RuntimeArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Args)]
pub struct RuntimeArgs {
    #[arg(long, global = true, value_name = "PATH")]
    pub home_dir: Option<PathBuf>,

    #[arg(long, global = true, value_name = "PATH")]
    pub cwd: Option<PathBuf>,

    /// SQLite database holding the telemetry tables.
    #[arg(long, global = true, value_name = "PATH", env = "SIMSTATS_DB")]
    pub db: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compile and run a report.
    Report(ReportArgs),
    /// List filter fields and group dimensions.
    Catalog(CatalogArgs),
    /// Print the JSON schema of a report request file.
    RequestSchema(RequestSchemaArgs),
    /// Create the telemetry schema.
    Init(InitArgs),
    /// Load session records from a JSONL file.
    Import(ImportArgs),
}
