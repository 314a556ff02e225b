mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tax_sim_core::{FailureClass, TaxSimError};
use tracing_subscriber::EnvFilter;

use commands::simulation::{CompleteSeriesArgs, SimulateArgs};

/// Brazilian service-company tax regime simulation
#[derive(Parser)]
#[command(
    name = "taxsim",
    version,
    about = "Deterministic Brazilian tax regime simulation",
    long_about = "Completes a twelve-month revenue/payroll series, evaluates Simples Nacional, \
                  Lucro Presumido, Lucro Real and the CBS/IBS reform scenario, distributes each \
                  annual tax across months and recommends the cheapest regime."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full tax simulation for one company and year
    Simulate(SimulateArgs),
    /// Only complete the twelve-month series
    CompleteSeries(CompleteSeriesArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Client errors exit with 2, engine faults with 1.
fn report_error(e: &(dyn std::error::Error + 'static)) -> i32 {
    match e.downcast_ref::<TaxSimError>() {
        Some(err) => {
            eprintln!("{}: {}", "error".red().bold(), err.public_message());
            match err.class() {
                FailureClass::Client => 2,
                FailureClass::Internal => 1,
            }
        }
        None => {
            eprintln!("{}: {}", "error".red().bold(), e);
            2
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Simulate(args) => commands::simulation::run_simulate(args),
        Commands::CompleteSeries(args) => commands::simulation::run_complete_series(args),
        Commands::Version => {
            println!("taxsim {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            let code = report_error(e.as_ref());
            process::exit(code);
        }
    }
}
