pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "innkeep",
    about = "Innkeep operator CLI",
    long_about = "Inspect configuration, apply migrations, and check the knowledge base of the booking assistant.",
    after_help = "Examples:\n  innkeep doctor --json\n  innkeep config\n  innkeep catalog --query \"is breakfast included\""
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
    #[command(about = "List rooms, upsells and FAQs loaded from the knowledge directory")]
    Catalog {
        #[arg(long, help = "Show the knowledge snippets retrieved for this text")]
        query: Option<String>,
    },
    #[command(about = "Validate config, database, knowledge base and provider credentials")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => commands::config::run(),
        Command::Catalog { query } => commands::catalog::run(query.as_deref()),
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
