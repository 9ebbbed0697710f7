pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "soberly",
    about = "Soberly operator CLI",
    long_about = "Operate the Soberly chat backend: migrations, readiness checks, config inspection, and bearer token issuance.",
    after_help = "Examples:\n  soberly doctor --json\n  soberly config\n  soberly token issue --user user-123 --days 7"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, completion provider readiness, and DB connectivity")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Manage bearer tokens accepted by the chat endpoint")]
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
}

#[derive(Debug, Subcommand)]
enum TokenAction {
    #[command(about = "Issue a bearer token for a user and print it once")]
    Issue {
        #[arg(long, help = "User id the token authenticates as")]
        user: String,
        #[arg(long, default_value_t = commands::token::DEFAULT_TTL_DAYS, help = "Days until the token expires")]
        days: i64,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => commands::doctor::run(json),
        Command::Token { action: TokenAction::Issue { user, days } } => {
            commands::token::issue(&user, days)
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
