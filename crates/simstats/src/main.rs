#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;
use clap::error::ErrorKind;
use simstats::cli::app::{Cli, Command, RuntimeArgs};
use simstats::cli::commands;
use simstats::config::RuntimePaths;
use simstats::models::ReportEnvelopeFailure;
use tracing_subscriber::EnvFilter;

const EXIT_SUCCESS: i32 = 0;
const EXIT_RUNTIME_FAILURE: i32 = 1;
const EXIT_VALIDATION_FAILURE: i32 = 2;
const EXIT_USAGE_ERROR: i32 = 64;

const DEFAULT_LOG_FILTER: &str = "warn,simstats=info";

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => return exit_code_for_parse_error(error),
    };
    init_tracing();

    let command_name = command_name(&cli.command);
    println!("simstats: starting `{command_name}`");

    match execute(cli) {
        Ok(()) => {
            println!("simstats: completed `{command_name}` (exit_code={EXIT_SUCCESS})");
            EXIT_SUCCESS
        }
        Err(error) => {
            let exit_code = classify_runtime_error(&error);
            eprintln!("simstats: failed `{command_name}` (exit_code={exit_code})");
            eprintln!("{error:#}");
            exit_code
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Report(args) => {
            let runtime_paths = resolve_runtime_paths(&cli.runtime)?;
            commands::report::run(&args, &runtime_paths)
        }
        Command::Catalog(args) => commands::catalog::run(&args),
        Command::RequestSchema(args) => commands::request_schema::run(&args),
        Command::Init(args) => {
            let runtime_paths = resolve_runtime_paths(&cli.runtime)?;
            commands::init::run(&args, &runtime_paths)
        }
        Command::Import(args) => {
            let runtime_paths = resolve_runtime_paths(&cli.runtime)?;
            commands::import::run(&args, &runtime_paths)
        }
    }
}

fn classify_runtime_error(error: &anyhow::Error) -> i32 {
    if let Some(failure) = error.downcast_ref::<ReportEnvelopeFailure>() {
        if failure.is_rejected() {
            return EXIT_VALIDATION_FAILURE;
        }
        return EXIT_RUNTIME_FAILURE;
    }

    if error
        .downcast_ref::<commands::import::ImportRecordFailure>()
        .is_some()
    {
        EXIT_VALIDATION_FAILURE
    } else {
        EXIT_RUNTIME_FAILURE
    }
}

fn exit_code_for_parse_error(error: clap::Error) -> i32 {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = error.print();
            EXIT_SUCCESS
        }
        _ => {
            let _ = error.print();
            EXIT_USAGE_ERROR
        }
    }
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Report(_) => "report",
        Command::Catalog(_) => "catalog",
        Command::RequestSchema(_) => "request-schema",
        Command::Init(_) => "init",
        Command::Import(_) => "import",
    }
}

fn resolve_runtime_paths(args: &RuntimeArgs) -> Result<RuntimePaths> {
    RuntimePaths::from_environment(
        args.home_dir.as_deref(),
        args.cwd.as_deref(),
        args.db.as_deref(),
    )
}
