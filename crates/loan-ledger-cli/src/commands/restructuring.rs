use clap::Args;
use serde_json::Value;

use loan_ledger_core::restructuring::modification::{self, ModificationInput};
use loan_ledger_core::LedgerConfig;

use crate::input;

/// Arguments for a loan modification
#[derive(Args)]
pub struct ModifyArgs {
    /// Path to JSON/YAML input: `{ loan, modification }`
    #[arg(long)]
    pub input: Option<String>,
}

pub fn run_modify(args: ModifyArgs, config: &LedgerConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let mod_input: ModificationInput = input::load(args.input.as_deref(), "loan modification")?;
    let result = modification::recalculate(&mod_input.loan, &mod_input.modification, &config.period_days)?;
    Ok(serde_json::to_value(result)?)
}
