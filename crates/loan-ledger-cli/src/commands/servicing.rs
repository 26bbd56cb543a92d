use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use loan_ledger_core::servicing::allocation::{self, AllocationInput, ReversalInput};
use loan_ledger_core::servicing::penalty::{self, AssessmentInput, PenaltyInput};
use loan_ledger_core::servicing::waiver::{self, WaiverApplication, WaiverInput};
use loan_ledger_core::{Installment, LedgerConfig};

use crate::input;

/// Arguments for payment allocation
#[derive(Args)]
pub struct AllocateArgs {
    /// Path to JSON/YAML input: `{ loan, payment, policy? }`
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for reversing a recorded allocation
#[derive(Args)]
pub struct ReverseArgs {
    /// Path to JSON/YAML input: `{ installments, allocations }`
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for overdue assessment
#[derive(Args)]
pub struct AssessArgs {
    /// Path to JSON/YAML input: `{ loan, as_of }`
    #[arg(long)]
    pub input: Option<String>,

    /// Assessment date (YYYY-MM-DD), overriding the input's `as_of`
    #[arg(long)]
    pub as_of: Option<NaiveDate>,
}

/// Arguments for a single penalty calculation
#[derive(Args)]
pub struct PenaltyArgs {
    /// Path to JSON/YAML input (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Overdue amount
    #[arg(long)]
    pub overdue_amount: Option<Decimal>,

    /// Days past the due date
    #[arg(long)]
    pub days_overdue: Option<i64>,

    /// Monthly penalty rate in percent
    #[arg(long, alias = "rate")]
    pub penalty_rate_percent: Option<Decimal>,

    /// Grace period in days
    #[arg(long, default_value = "0")]
    pub grace_period_days: u32,
}

/// Arguments for waiver evaluation
#[derive(Args)]
pub struct WaiverEvaluateArgs {
    /// Path to JSON/YAML input: `{ loan, request }`
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for applying an approved waiver
#[derive(Args)]
pub struct WaiverApplyArgs {
    /// Path to JSON/YAML input: `{ installments, installment_number?, approved_amount }`
    #[arg(long)]
    pub input: Option<String>,
}

/// A waiver approved outside the engine, e.g. after escalation.
#[derive(Debug, Deserialize)]
struct ApprovedWaiver {
    installments: Vec<Installment>,
    #[serde(default)]
    installment_number: Option<u32>,
    approved_amount: Decimal,
}

#[derive(Debug, Serialize)]
struct AppliedWaiver {
    installments: Vec<Installment>,
    applications: Vec<WaiverApplication>,
    outstanding_balance: Decimal,
}

pub fn run_allocate(args: AllocateArgs, config: &LedgerConfig) -> Result<Value, Box<dyn std::error::Error>> {
    let mut alloc_input: Value = input::load(args.input.as_deref(), "payment allocation")?;
    // Policy from --config applies unless the input carries its own.
    if let Value::Object(map) = &mut alloc_input {
        if !map.contains_key("policy") {
            map.insert("policy".into(), serde_json::to_value(&config.allocation)?);
        }
    }
    let alloc_input: AllocationInput = serde_json::from_value(alloc_input)?;
    let result = allocation::apply_payment(&alloc_input.loan, &alloc_input.payment, &alloc_input.policy)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_reverse(args: ReverseArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let rev: ReversalInput = input::load(args.input.as_deref(), "allocation reversal")?;
    let installments = allocation::reverse_allocation(&rev.installments, &rev.allocations)?;
    Ok(serde_json::json!({ "installments": installments }))
}

pub fn run_assess(args: AssessArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut assess_input: Value = input::load(args.input.as_deref(), "overdue assessment")?;
    if let (Some(as_of), Value::Object(map)) = (args.as_of, &mut assess_input) {
        map.insert("as_of".into(), Value::String(as_of.to_string()));
    }
    let assess_input: AssessmentInput = serde_json::from_value(assess_input)?;
    let result = penalty::assess_overdue(&assess_input.loan, assess_input.as_of)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_penalty(args: PenaltyArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let penalty_input: PenaltyInput = if args.input.is_some() {
        input::load(args.input.as_deref(), "penalty calculation")?
    } else if let Some(data) = input::stdin::read_stdin()? {
        serde_json::from_value(data)?
    } else {
        PenaltyInput {
            overdue_amount: args.overdue_amount
                .ok_or("--overdue-amount is required (or provide --input)")?,
            days_overdue: args.days_overdue
                .ok_or("--days-overdue is required (or provide --input)")?,
            penalty_rate_percent: args.penalty_rate_percent
                .ok_or("--penalty-rate-percent is required (or provide --input)")?,
            grace_period_days: args.grace_period_days,
        }
    };

    let result = penalty::calculate_penalty(&penalty_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_waiver_evaluate(args: WaiverEvaluateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let waiver_input: WaiverInput = input::load(args.input.as_deref(), "waiver evaluation")?;
    let result = waiver::process_waiver(&waiver_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_waiver_apply(args: WaiverApplyArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let approved: ApprovedWaiver = input::load(args.input.as_deref(), "waiver application")?;
    let (installments, applications) = waiver::apply_waiver(
        &approved.installments,
        approved.installment_number,
        approved.approved_amount,
    )?;
    let outstanding_balance: Decimal = installments.iter().map(|i| i.outstanding_amount).sum();
    Ok(serde_json::to_value(AppliedWaiver {
        installments,
        applications,
        outstanding_balance,
    })?)
}
