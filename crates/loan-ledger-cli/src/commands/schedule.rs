use clap::Args;
use serde_json::Value;

use loan_ledger_core::schedule::generator::{self, ScheduleInput};
use loan_ledger_core::LedgerConfig;

use crate::input;

/// Arguments for schedule generation
#[derive(Args)]
pub struct ScheduleArgs {
    /// Path to JSON/YAML input: `{ terms, disbursement_date }`
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_schedule(args: ScheduleArgs, config: &LedgerConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let schedule_input: ScheduleInput = input::load(args.input.as_deref(), "schedule generation")?;
    let result = generator::build_schedule(&schedule_input, &config.period_days)?;
    Ok(serde_json::to_value(result)?)
}
