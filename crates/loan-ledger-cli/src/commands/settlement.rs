use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use loan_ledger_core::settlement::affordability::{self, AffordabilityInput};
use loan_ledger_core::settlement::payoff::{self, LoanPayoffInput, PayoffInput};

use crate::input;

/// Arguments for an early payoff quote
#[derive(Args)]
pub struct PayoffArgs {
    /// Path to JSON/YAML input (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Outstanding principal
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Outstanding interest
    #[arg(long)]
    pub interest: Option<Decimal>,

    /// Discount on outstanding interest, in percent
    #[arg(long, default_value = "0")]
    pub discount_percent: Decimal,
}

/// Arguments for a whole-loan payoff quote
#[derive(Args)]
pub struct LoanPayoffArgs {
    /// Path to JSON/YAML input: `{ loan, discount_percent? }`
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for an affordability check
#[derive(Args)]
pub struct AffordabilityArgs {
    /// Path to JSON/YAML input (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Gross monthly income
    #[arg(long)]
    pub income: Option<Decimal>,

    /// Proposed monthly payment
    #[arg(long)]
    pub payment: Option<Decimal>,

    /// Existing monthly debt service
    #[arg(long, default_value = "0")]
    pub existing_debt: Decimal,

    /// Maximum debt-to-income ratio, in percent
    #[arg(long, default_value = "40")]
    pub max_dti: Decimal,
}

pub fn run_payoff(args: PayoffArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let payoff_input: PayoffInput = if args.input.is_some() {
        input::load(args.input.as_deref(), "payoff quote")?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        PayoffInput {
            outstanding_principal: args.principal
                .ok_or("--principal is required (or provide --input)")?,
            outstanding_interest: args.interest
                .ok_or("--interest is required (or provide --input)")?,
            discount_percent: args.discount_percent,
        }
    };

    let result = payoff::quote_early_payoff(&payoff_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_loan_payoff(args: LoanPayoffArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let payoff_input: LoanPayoffInput = input::load(args.input.as_deref(), "loan payoff quote")?;
    let result = payoff::quote_loan_payoff(&payoff_input.loan, payoff_input.discount_percent)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_affordability(args: AffordabilityArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let afford_input: AffordabilityInput = if args.input.is_some() {
        input::load(args.input.as_deref(), "affordability check")?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        AffordabilityInput {
            monthly_income: args.income
                .ok_or("--income is required (or provide --input)")?,
            monthly_payment: args.payment
                .ok_or("--payment is required (or provide --input)")?,
            existing_monthly_debt: args.existing_debt,
            max_dti_percent: args.max_dti,
        }
    };

    let result = affordability::assess_affordability(&afford_input)?;
    Ok(serde_json::to_value(result)?)
}
