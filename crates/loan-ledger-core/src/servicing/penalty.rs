//! Late-payment penalties.
//!
//! The penalty rate is a monthly percentage prorated daily over a 30-day
//! month, charged only for days beyond the grace period. Penalties are
//! assessed on each installment's unpaid principal, interest and fees, never
//! on penalty already assessed.

use chrono::NaiveDate;
use log::debug;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::LedgerError;
use crate::ledger::{Installment, InstallmentStatus, Loan};
use crate::types::{pct_to_rate, round_money, with_metadata, ComputationOutput, Money, Percent};
use crate::LedgerResult;

/// Fixed month length for prorating the monthly penalty rate.
const PENALTY_MONTH_DAYS: Decimal = dec!(30);

// ---------------------------------------------------------------------------
// Input / Output Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenaltyInput {
    pub overdue_amount: Money,
    pub days_overdue: i64,
    pub penalty_rate_percent: Percent,
    #[serde(default)]
    pub grace_period_days: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenaltyOutput {
    pub applicable_days: i64,
    pub penalty: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentInput {
    pub loan: Loan,
    pub as_of: NaiveDate,
}

/// Penalty movement on one overdue installment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallmentAssessment {
    pub installment_number: u32,
    pub days_overdue: i64,
    /// Unpaid principal, interest and fees the penalty is charged on.
    pub overdue_base: Money,
    pub penalty_before: Money,
    pub penalty_after: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessmentOutput {
    pub loan_id: String,
    pub as_of: NaiveDate,
    pub installments: Vec<Installment>,
    pub assessments: Vec<InstallmentAssessment>,
    pub overdue_count: usize,
    pub penalty_assessed: Money,
    pub outstanding_balance: Money,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Penalty for a single overdue amount.
///
/// Zero while `days_overdue <= grace_period_days`; afterwards
/// `overdue × rate/100 × (days − grace) / 30`, rounded to cents.
pub fn compute_penalty(
    overdue_amount: Money,
    days_overdue: i64,
    penalty_rate_percent: Percent,
    grace_period_days: u32,
) -> Money {
    let applicable_days = days_overdue - i64::from(grace_period_days);
    if applicable_days <= 0 || overdue_amount <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    round_money(
        overdue_amount * pct_to_rate(penalty_rate_percent) * Decimal::from(applicable_days)
            / PENALTY_MONTH_DAYS,
    )
}

/// Validated wrapper around [`compute_penalty`].
pub fn calculate_penalty(input: &PenaltyInput) -> LedgerResult<ComputationOutput<PenaltyOutput>> {
    let start = Instant::now();

    if input.overdue_amount < Decimal::ZERO {
        return Err(LedgerError::input("overdue_amount", "Overdue amount cannot be negative"));
    }
    if input.penalty_rate_percent < Decimal::ZERO || input.penalty_rate_percent > Decimal::ONE_HUNDRED {
        return Err(LedgerError::input(
            "penalty_rate_percent",
            "Penalty rate must be between 0 and 100 percent",
        ));
    }

    let applicable_days = (input.days_overdue - i64::from(input.grace_period_days)).max(0);
    let output = PenaltyOutput {
        applicable_days,
        penalty: compute_penalty(
            input.overdue_amount,
            input.days_overdue,
            input.penalty_rate_percent,
            input.grace_period_days,
        ),
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Late Penalty: monthly rate prorated over a 30-day month after grace",
        &serde_json::json!({
            "overdue_amount": input.overdue_amount.to_string(),
            "days_overdue": input.days_overdue,
            "penalty_rate_pct": input.penalty_rate_percent.to_string(),
            "grace_period_days": input.grace_period_days,
        }),
        Vec::new(),
        elapsed,
        output,
    ))
}

/// Mark installments overdue as of `as_of` and bring their penalties up to
/// date. Assessed penalty never decreases: the new figure is the larger of
/// the existing penalty and the penalty on today's unpaid base.
pub fn assess_overdue(loan: &Loan, as_of: NaiveDate) -> LedgerResult<ComputationOutput<AssessmentOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    loan.validate()?;
    let mut installments = loan.normalized_installments();
    let mut assessments: Vec<InstallmentAssessment> = Vec::new();

    if loan.status.is_terminal() {
        warnings.push(format!(
            "Loan {} is {:?}; no penalties assessed",
            loan.loan_id, loan.status
        ));
    } else {
        for inst in installments.iter_mut() {
            if inst.is_settled() || inst.due_date >= as_of {
                continue;
            }
            let days_overdue = (as_of - inst.due_date).num_days();
            let unpaid = inst.unpaid_breakdown();
            let overdue_base = unpaid.fees + unpaid.interest + unpaid.principal;

            let penalty_before = inst.penalty_amount;
            let accrued = compute_penalty(
                overdue_base,
                days_overdue,
                loan.terms.late_penalty_percent,
                loan.terms.grace_period_days,
            );
            inst.penalty_amount = penalty_before.max(accrued);
            inst.status = InstallmentStatus::Overdue;
            inst.refresh_totals();

            assessments.push(InstallmentAssessment {
                installment_number: inst.installment_number,
                days_overdue,
                overdue_base,
                penalty_before,
                penalty_after: inst.penalty_amount,
            });
        }
    }

    let penalty_assessed: Money = assessments
        .iter()
        .map(|a| a.penalty_after - a.penalty_before)
        .sum();
    let outstanding_balance: Money = installments.iter().map(|i| i.outstanding_amount).sum();

    debug!(
        "loan {}: {} overdue installments as of {}, {} new penalty",
        loan.loan_id,
        assessments.len(),
        as_of,
        penalty_assessed
    );

    let output = AssessmentOutput {
        loan_id: loan.loan_id.clone(),
        as_of,
        overdue_count: assessments.len(),
        installments,
        assessments,
        penalty_assessed,
        outstanding_balance,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Overdue Assessment: status refresh and non-compounding late penalties",
        &serde_json::json!({
            "loan_id": loan.loan_id,
            "as_of": as_of.to_string(),
            "late_penalty_pct": loan.terms.late_penalty_percent.to_string(),
            "grace_period_days": loan.terms.grace_period_days,
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
