use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use loan_ledger_core::terms::calculator;
use loan_ledger_core::{FeeCollection, InterestType, LedgerConfig, LoanTerms, PaymentFrequency};

use crate::input;

/// Arguments for a terms quote
#[derive(Args)]
pub struct QuoteArgs {
    /// Path to JSON/YAML loan terms (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Principal amount
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Annual interest rate in percent (18 = 18%)
    #[arg(long, alias = "rate")]
    pub annual_rate: Option<Decimal>,

    /// Loan term in days
    #[arg(long)]
    pub term_days: Option<u32>,

    /// flat, reducing or compound
    #[arg(long, default_value = "reducing")]
    pub interest_type: InterestType,

    /// daily, weekly, biweekly, monthly or quarterly
    #[arg(long, default_value = "monthly")]
    pub frequency: PaymentFrequency,

    /// Processing fee in percent of principal
    #[arg(long, default_value = "0")]
    pub processing_fee_percent: Decimal,

    /// Platform fee charged per period
    #[arg(long, default_value = "0")]
    pub platform_fee_per_period: Decimal,

    /// Bill platform fees on each installment instead of deducting upfront
    #[arg(long)]
    pub per_installment_fees: bool,
}

pub fn run_quote(args: QuoteArgs, config: &LedgerConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let terms: LoanTerms = if args.input.is_some() {
        input::load(args.input.as_deref(), "terms quote")?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        let mut terms = LoanTerms::new(
            args.principal
                .ok_or("--principal is required (or provide --input)")?,
            args.annual_rate
                .ok_or("--annual-rate is required (or provide --input)")?,
            args.term_days
                .ok_or("--term-days is required (or provide --input)")?,
            args.interest_type,
            args.frequency,
        );
        terms.processing_fee_percent = args.processing_fee_percent;
        terms.platform_fee_per_period = args.platform_fee_per_period;
        if args.per_installment_fees {
            terms.fee_collection = FeeCollection::PerInstallment;
        }
        terms
    };

    let result = calculator::quote_terms(&terms, &config.period_days)?;
    Ok(serde_json::to_value(result)?)
}
