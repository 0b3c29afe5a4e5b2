//! CLI entrypoint for the augury scenario harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Scenario tooling for the augury heap.
#[derive(Debug, Parser)]
#[command(name = "augury-harness")]
#[command(about = "Scenario harness for the augury heap")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a JSON scenario file and emit a JSON report.
    Run {
        /// Scenario JSON path.
        #[arg(long)]
        scenario: PathBuf,
        /// Output report path (if omitted, prints to stdout).
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print an example scenario to stdout.
    Example,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { scenario, output } => {
            let report = augury_harness::run_scenario_file(&scenario)?;
            let json = report.to_json()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, format!("{json}\n"))?;
                    eprintln!("Report written to {}", path.display());
                }
                None => println!("{json}"),
            }
            if !report.clean {
                eprintln!(
                    "Scenario '{}' drew {} invalid and {} bug verdicts",
                    report.scenario, report.invalid_total, report.bug_total
                );
            }
        }
        Command::Example => {
            println!("{}", augury_harness::example_scenario().to_json()?);
        }
    }
    Ok(())
}
