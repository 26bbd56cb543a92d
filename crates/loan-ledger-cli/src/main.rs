mod commands;
mod config;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::restructuring::ModifyArgs;
use commands::schedule::ScheduleArgs;
use commands::servicing::{
    AllocateArgs, AssessArgs, PenaltyArgs, ReverseArgs, WaiverApplyArgs, WaiverEvaluateArgs,
};
use commands::settlement::{AffordabilityArgs, LoanPayoffArgs, PayoffArgs};
use commands::terms::QuoteArgs;

/// Loan amortization and repayment ledger calculations
#[derive(Parser)]
#[command(
    name = "ledger",
    version,
    about = "Loan amortization and repayment ledger calculations",
    long_about = "A CLI for loan pricing, schedule generation and repayment servicing \
                  with decimal precision. Supports term quotes, fixed and flexible \
                  schedules, payment allocation and reversal, late penalties, waivers, \
                  modifications, payoff quotes and affordability checks."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Ledger configuration file (JSON or YAML)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Quote interest, fees, installment and effective rate for loan terms
    Quote(QuoteArgs),
    /// Generate a repayment schedule
    Schedule(ScheduleArgs),
    /// Allocate a payment across outstanding installments
    Allocate(AllocateArgs),
    /// Reverse a recorded payment allocation
    Reverse(ReverseArgs),
    /// Mark overdue installments and assess late penalties
    Assess(AssessArgs),
    /// Calculate the late penalty on a single overdue amount
    Penalty(PenaltyArgs),
    /// Evaluate a penalty waiver request, applying it when auto-approved
    WaiverEvaluate(WaiverEvaluateArgs),
    /// Apply an already approved penalty waiver
    WaiverApply(WaiverApplyArgs),
    /// Regenerate a loan's schedule under modified terms
    Modify(ModifyArgs),
    /// Quote an early payoff from outstanding principal and interest
    Payoff(PayoffArgs),
    /// Quote an early payoff for a whole loan
    LoanPayoff(LoanPayoffArgs),
    /// Debt-to-income affordability check
    Affordability(AffordabilityArgs),
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

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match config::load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    };

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Quote(args) => commands::terms::run_quote(args, &config),
        Commands::Schedule(args) => commands::schedule::run_schedule(args, &config),
        Commands::Allocate(args) => commands::servicing::run_allocate(args, &config),
        Commands::Reverse(args) => commands::servicing::run_reverse(args),
        Commands::Assess(args) => commands::servicing::run_assess(args),
        Commands::Penalty(args) => commands::servicing::run_penalty(args),
        Commands::WaiverEvaluate(args) => commands::servicing::run_waiver_evaluate(args),
        Commands::WaiverApply(args) => commands::servicing::run_waiver_apply(args),
        Commands::Modify(args) => commands::restructuring::run_modify(args, &config),
        Commands::Payoff(args) => commands::settlement::run_payoff(args),
        Commands::LoanPayoff(args) => commands::settlement::run_loan_payoff(args),
        Commands::Affordability(args) => commands::settlement::run_affordability(args),
        Commands::Version => {
            println!("ledger {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
