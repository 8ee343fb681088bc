use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{self, CommandReport};

#[derive(Debug, Parser)]
#[command(
    name = "mailshelf",
    version,
    about = "Archive IMAP mail once, browse it by date and sender"
)]
struct Cli {
    /// Print the report as JSON.
    #[arg(long, global = true)]
    json: bool,
    /// Debug logging (overridden by MAILSHELF_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Pull new messages from the IMAP mailbox.
    Fetch {
        #[arg(long)]
        once: bool,
        #[arg(long)]
        daemon: bool,
    },
    /// Archive every *.eml file in a local directory.
    Ingest { dir: PathBuf },
    /// Show resolved paths, config and archive state.
    Status,
    /// Check the archive for inconsistencies.
    Verify {
        #[arg(long)]
        strict: bool,
    },
}

fn print_report(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!(
        "{}: {}",
        report.command,
        if report.ok { "ok" } else { "issues found" }
    );
    for detail in &report.details {
        println!("  {detail}");
    }
    for issue in &report.issues {
        println!("  ! {issue}");
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    crate::logging::init(cli.verbose);

    let report = match &cli.command {
        Command::Fetch { once, daemon } => commands::fetch::run(&commands::fetch::FetchOptions {
            once: *once,
            daemon: *daemon,
        })?,
        Command::Ingest { dir } => commands::ingest::run(dir)?,
        Command::Status => commands::status::run()?,
        Command::Verify { strict } => {
            commands::verify::run(&commands::verify::VerifyOptions { strict: *strict })?
        }
    };

    print_report(&report, cli.json)?;
    if !report.ok {
        anyhow::bail!("{} reported {} issue(s)", report.command, report.issues.len());
    }
    Ok(())
}
