pub mod commands;

use clap::{Parser, Subcommand};
use procura_core::dashboard::StatusFilter;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "procura",
    about = "Procura operator CLI",
    long_about = "Operate the Procura approval portal: migrations, demo data, request listing, config inspection, and readiness checks.",
    after_help = "Examples:\n  procura migrate\n  procura seed\n  procura list --status pending --search acme\n  procura doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate {
        #[arg(long, help = "Report applied and pending versions without applying anything")]
        status: bool,
    },
    #[command(about = "Load the deterministic demo purchase requests (idempotent)")]
    Seed,
    #[command(about = "List purchase requests newest first, with dashboard totals")]
    List {
        #[arg(long, default_value = "", help = "Case-insensitive uploader or vendor name filter")]
        search: String,
        #[arg(
            long,
            default_value = "all",
            value_parser = parse_status_filter,
            help = "all | pending | director_approved | finance_approved | rejected"
        )]
        status: StatusFilter,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, role credentials, DB connectivity, and migration state")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

fn parse_status_filter(value: &str) -> Result<StatusFilter, String> {
    StatusFilter::parse(value).ok_or_else(|| format!("unknown status filter `{value}`"))
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate { status } => commands::migrate::run(status),
        Command::Seed => commands::seed::run(),
        Command::List { search, status } => commands::list::run(search, status),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
