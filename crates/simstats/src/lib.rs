#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod models;
pub mod report;
pub mod schema;
pub mod utils;

pub use cli::app::{Cli, Command};
pub use report::{ReportError, compile_report, run_report};
