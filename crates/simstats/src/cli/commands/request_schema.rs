use anyhow::{Context, Result};
use clap::Args;

use crate::models::request_json_schema;

#[derive(Debug, Clone, Args)]
pub struct RequestSchemaArgs {
    #[arg(long, default_value_t = false)]
    pub pretty: bool,
}

pub fn run(args: &RequestSchemaArgs) -> Result<()> {
    let schema = request_json_schema();
    let encoded = if args.pretty {
        serde_json::to_string_pretty(&schema)
    } else {
        serde_json::to_string(&schema)
    }
    .context("failed to encode request schema")?;
    println!("{encoded}");
    Ok(())
}
