//! Repayment schedule generation.
//!
//! Two layouts are supported:
//!
//! * **Fixed**: evenly spaced installments at the payment frequency. Each
//!   period's interest accrues on the remaining principal at a daily rate;
//!   the principal portion is the level installment less that interest. The
//!   final installment takes whatever principal remains and, when the term is
//!   not a whole number of periods, covers a shortened period ending on the
//!   maturity date.
//! * **Flexible**: milestone-driven installments, each settling a share of
//!   the principal still outstanding at that milestone.
//!
//! Every monetary field is rounded to cents as it is computed, so the
//! visible parts always sum to the published totals.

use chrono::{Days, NaiveDate};
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::PeriodTable;
use crate::error::LedgerError;
use crate::ledger::Installment;
use crate::schedule::integrity::{summarize, verify_schedule, ScheduleSummary};
use crate::terms::calculator::{compute_platform_fee_total, compute_processing_fee, schedule_apr};
use crate::terms::model::{
    FeeCollection, InterestType, LoanTerms, Milestone, MilestoneShare, ScheduleType,
};
use crate::time_value::{compound_factor, level_payment};
use crate::types::{pct_to_rate, round_money, with_metadata, ComputationOutput, Money, Percent, DAYS_IN_YEAR};
use crate::LedgerResult;

// ---------------------------------------------------------------------------
// Input / Output Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleInput {
    pub terms: LoanTerms,
    pub disbursement_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleOutput {
    pub installments: Vec<Installment>,
    pub summary: ScheduleSummary,
    /// XIRR of the schedule against net proceeds, in percent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annual_percentage_rate: Option<Percent>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Generate the full installment sequence for `terms`, disbursed on
/// `disbursement_date`. Deterministic: identical inputs yield identical
/// sequences.
pub fn generate_schedule(
    terms: &LoanTerms,
    disbursement_date: NaiveDate,
    periods: &PeriodTable,
) -> LedgerResult<Vec<Installment>> {
    terms.validate()?;
    periods.validate()?;
    if disbursement_date
        .checked_add_days(Days::new(u64::from(terms.term_days)))
        .is_none()
    {
        return Err(LedgerError::terms(
            "term_days",
            format!(
                "Maturity {} days after {disbursement_date} is not a representable date",
                terms.term_days
            ),
        ));
    }

    let installments = match terms.schedule_type {
        ScheduleType::Fixed => {
            fixed_schedule(terms, disbursement_date, periods.days(terms.payment_frequency))?
        }
        ScheduleType::Flexible => {
            let milestones = if terms.milestones.is_empty() {
                default_milestones(terms.term_days, periods.monthly)
            } else {
                terms.milestones.clone()
            };
            flexible_schedule(terms, disbursement_date, &milestones)?
        }
    };

    verify_schedule(&installments, terms.principal)?;

    debug!(
        "generated {:?} schedule: {} installments, principal {}, {} {}",
        terms.schedule_type,
        installments.len(),
        terms.principal,
        terms.interest_type,
        terms.payment_frequency
    );

    Ok(installments)
}

/// Generate a schedule wrapped with its summary and implied APR.
pub fn build_schedule(
    input: &ScheduleInput,
    periods: &PeriodTable,
) -> LedgerResult<ComputationOutput<ScheduleOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let installments = generate_schedule(&input.terms, input.disbursement_date, periods)?;
    let summary = summarize(&installments);

    let terms = &input.terms;
    let processing_fee = compute_processing_fee(terms.principal, terms.processing_fee_percent);
    let upfront_platform = match terms.fee_collection {
        FeeCollection::Upfront => {
            compute_platform_fee_total(terms.platform_fee_per_period, installments.len() as u32)
        }
        FeeCollection::PerInstallment => Decimal::ZERO,
    };
    let net_proceeds = terms.principal - processing_fee - upfront_platform;

    let annual_percentage_rate =
        match schedule_apr(net_proceeds, input.disbursement_date, &installments) {
            Ok(apr) => Some(apr),
            Err(e) => {
                warnings.push(format!("APR not derived: {e}"));
                None
            }
        };

    let output = ScheduleOutput {
        installments,
        summary,
        annual_percentage_rate,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Repayment Schedule: per-period interest on remaining principal, cents rounded per field",
        &serde_json::json!({
            "principal": terms.principal.to_string(),
            "annual_rate_pct": terms.annual_rate.to_string(),
            "term_days": terms.term_days,
            "interest_type": terms.interest_type.to_string(),
            "payment_frequency": terms.payment_frequency.to_string(),
            "schedule_type": terms.schedule_type,
            "disbursement_date": input.disbursement_date.to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// Equal monthly milestones covering the term, each retiring an equal share
/// of what remains so principal is repaid in equal slices.
pub fn default_milestones(term_days: u32, month_days: u32) -> Vec<Milestone> {
    let month_days = month_days.max(1);
    let count = term_days.div_ceil(month_days).max(1);
    (1..=count)
        .map(|k| {
            let remaining_slices = Decimal::from(count - k + 1);
            Milestone {
                days_from_disbursement: (k * month_days).min(term_days),
                share: MilestoneShare::Percentage(Decimal::ONE_HUNDRED / remaining_slices),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

fn fixed_schedule(
    terms: &LoanTerms,
    disbursement_date: NaiveDate,
    period_days: u32,
) -> LedgerResult<Vec<Installment>> {
    let n = terms.term_days.div_ceil(period_days);
    let fee = installment_fee(terms);
    let level = level_amount(terms, period_days, n)?;

    let mut installments = Vec::with_capacity(n as usize);
    let mut remaining = terms.principal;
    let mut elapsed_days = 0u32;

    for number in 1..=n {
        let is_last = number == n;
        let days = if is_last {
            terms.term_days - elapsed_days
        } else {
            period_days
        };
        elapsed_days += days;

        let due_date = add_days(disbursement_date, elapsed_days)?;
        let interest = period_interest(terms, remaining, days)?;
        let principal_portion = if is_last {
            remaining
        } else {
            match terms.interest_type {
                InterestType::Flat => level.min(remaining),
                InterestType::Reducing | InterestType::Compound => {
                    (level - interest).max(Decimal::ZERO).min(remaining)
                }
            }
        };
        remaining -= principal_portion;

        installments.push(Installment::scheduled(
            number,
            due_date,
            principal_portion,
            interest,
            fee,
        ));
    }

    Ok(installments)
}

fn flexible_schedule(
    terms: &LoanTerms,
    disbursement_date: NaiveDate,
    milestones: &[Milestone],
) -> LedgerResult<Vec<Installment>> {
    if milestones.is_empty() {
        return Err(LedgerError::terms("milestones", "At least one milestone is required"));
    }

    let fee = installment_fee(terms);
    let mut installments = Vec::with_capacity(milestones.len());
    let mut remaining = terms.principal;
    let mut previous_day = 0u32;

    for (idx, milestone) in milestones.iter().enumerate() {
        let is_last = idx == milestones.len() - 1;
        let days = milestone.days_from_disbursement - previous_day;
        previous_day = milestone.days_from_disbursement;

        let interest = period_interest(terms, remaining, days)?;
        let principal_portion = if is_last {
            remaining
        } else {
            match &milestone.share {
                MilestoneShare::Percentage(p) => round_money(remaining * pct_to_rate(*p)),
                MilestoneShare::Amount(a) => (*a).min(remaining),
            }
        };
        remaining -= principal_portion;

        installments.push(Installment::scheduled(
            idx as u32 + 1,
            add_days(disbursement_date, milestone.days_from_disbursement)?,
            principal_portion,
            interest,
            fee,
        ));
    }

    Ok(installments)
}

/// Per-installment amount used to split principal: the level installment
/// for amortizing loans, the equal principal slice for flat loans.
fn level_amount(terms: &LoanTerms, period_days: u32, n: u32) -> LedgerResult<Money> {
    let r = pct_to_rate(terms.annual_rate);
    match terms.interest_type {
        InterestType::Flat => Ok(round_money(terms.principal / Decimal::from(n))),
        InterestType::Reducing => {
            let period_rate = r / DAYS_IN_YEAR * Decimal::from(period_days);
            level_payment(terms.principal, period_rate, n)
        }
        InterestType::Compound => {
            let period_rate = compound_factor(r, period_days, "annual_rate")? - Decimal::ONE;
            level_payment(terms.principal, period_rate, n)
        }
    }
}

/// Interest accrued over `days`: on original principal for flat loans,
/// on the remaining balance otherwise.
fn period_interest(terms: &LoanTerms, remaining: Money, days: u32) -> LedgerResult<Money> {
    let r = pct_to_rate(terms.annual_rate);
    let d = Decimal::from(days);
    let interest = match terms.interest_type {
        InterestType::Flat => terms.principal * r * d / DAYS_IN_YEAR,
        InterestType::Reducing => remaining * (r / DAYS_IN_YEAR) * d,
        InterestType::Compound => {
            remaining * (compound_factor(r, days, "annual_rate")? - Decimal::ONE)
        }
    };
    Ok(round_money(interest))
}

fn installment_fee(terms: &LoanTerms) -> Money {
    match terms.fee_collection {
        FeeCollection::Upfront => Decimal::ZERO,
        FeeCollection::PerInstallment => terms.platform_fee_per_period,
    }
}

fn add_days(date: NaiveDate, days: u32) -> LedgerResult<NaiveDate> {
    date.checked_add_days(Days::new(u64::from(days)))
        .ok_or_else(|| LedgerError::DateError(format!("{date} + {days} days is out of range")))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
