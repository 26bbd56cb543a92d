//! Loan terms calculator.
//!
//! Converts contractual terms into interest, fees, installment amount, net
//! proceeds and an annualised cost of credit. Every function is a pure
//! function of its arguments.
//!
//! Two product conventions exist for fees: the platform fee is either
//! deducted from proceeds at disbursement or billed on each installment
//! (`FeeCollection`). Both `net_proceeds` and `total_repayable` are reported
//! so the caller picks whichever its product policy treats as authoritative.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::PeriodTable;
use crate::error::LedgerError;
use crate::ledger::Installment;
use crate::terms::model::{
    validate_percent, validate_principal, validate_term_days, FeeCollection, InterestType,
    LoanTerms,
};
use crate::time_value::{compound_factor, level_payment, xirr};
use crate::types::{pct_to_rate, round_money, with_metadata, ComputationOutput, Money, Percent, DAYS_IN_YEAR};
use crate::LedgerResult;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Day-count month used to express terms in months.
const DAYS_PER_MONTH: u32 = 30;
const MONTHS_PER_YEAR: Decimal = dec!(12);
const XIRR_GUESS: Decimal = dec!(0.10);

// ---------------------------------------------------------------------------
// Output Types
// ---------------------------------------------------------------------------

/// Full pricing of a set of loan terms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TermsQuote {
    pub interest_type: InterestType,
    pub number_of_periods: u32,
    pub term_months: u32,
    pub total_interest: Money,
    pub processing_fee: Money,
    pub platform_fee_total: Money,
    /// Amount due each period, including the platform fee when it is billed
    /// per installment.
    pub installment_amount: Money,
    /// Principal + interest, plus platform fees billed per installment.
    pub total_repayable: Money,
    /// Cash the borrower receives after upfront deductions.
    pub net_proceeds: Money,
    /// Simple annualised cost of credit against net proceeds, in percent.
    pub effective_annual_rate: Percent,
}

// ---------------------------------------------------------------------------
// Period arithmetic
// ---------------------------------------------------------------------------

/// Term length in 30-day months, rounded half-up, at least 1.
pub fn term_months(term_days: u32) -> u32 {
    rounded_ratio(term_days, DAYS_PER_MONTH)
}

/// Nominal number of installments a quote assumes: `term_days / period_days`
/// rounded half-up, at least 1.
pub fn quote_periods(term_days: u32, period_days: u32) -> u32 {
    if period_days == 0 {
        return 1;
    }
    rounded_ratio(term_days, period_days)
}

/// `days / unit` rounded half-up, at least 1. Widened so no `u32` term can
/// overflow; the quotient never exceeds `days`.
fn rounded_ratio(days: u32, unit: u32) -> u32 {
    let (days, unit) = (u64::from(days), u64::from(unit));
    ((days + unit / 2) / unit).max(1) as u32
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Total interest over the term.
///
/// * Flat: `principal × rate × days/365`
/// * Reducing: `EMI × n − principal` over `n` monthly periods
/// * Compound: `principal × ((1 + rate)^(days/365) − 1)`
pub fn compute_interest(
    principal: Money,
    rate: Percent,
    term_days: u32,
    interest_type: InterestType,
) -> LedgerResult<Money> {
    validate_principal(principal)?;
    validate_term_days(term_days)?;
    validate_percent("annual_rate", rate)?;

    let r = pct_to_rate(rate);
    let interest = match interest_type {
        InterestType::Flat => principal * r * Decimal::from(term_days) / DAYS_IN_YEAR,
        InterestType::Reducing => {
            if r.is_zero() {
                Decimal::ZERO
            } else {
                let n = term_months(term_days);
                let emi = compute_emi(principal, rate, term_days)?;
                emi * Decimal::from(n) - principal
            }
        }
        InterestType::Compound => {
            let factor = compound_factor(r, term_days, "annual_rate")?;
            principal * (factor - Decimal::ONE)
        }
    };

    Ok(round_money(interest))
}

/// Equated monthly installment under reducing-balance amortization.
pub fn compute_emi(principal: Money, annual_rate: Percent, term_days: u32) -> LedgerResult<Money> {
    validate_principal(principal)?;
    validate_term_days(term_days)?;
    validate_percent("annual_rate", annual_rate)?;

    let monthly_rate = pct_to_rate(annual_rate) / MONTHS_PER_YEAR;
    level_payment(principal, monthly_rate, term_months(term_days))
}

pub fn compute_processing_fee(principal: Money, processing_fee_percent: Percent) -> Money {
    round_money(principal * pct_to_rate(processing_fee_percent))
}

pub fn compute_platform_fee_total(platform_fee_per_period: Money, number_of_periods: u32) -> Money {
    round_money(platform_fee_per_period * Decimal::from(number_of_periods))
}

/// Cash disbursed after upfront deductions. Interest is repaid over time and
/// is not deducted here.
pub fn compute_net_proceeds(principal: Money, processing_fee: Money, platform_fee_total: Money) -> Money {
    principal - processing_fee - platform_fee_total
}

/// Annualised cost of credit in percent:
/// `(total_repayable − net_proceeds) / net_proceeds × 12 / term_months × 100`.
/// Zero when `net_proceeds` or `term_months` is zero.
pub fn compute_effective_rate(net_proceeds: Money, total_repayable: Money, term_months: u32) -> Percent {
    if net_proceeds.is_zero() || term_months == 0 {
        return Decimal::ZERO;
    }
    let cost_ratio = (total_repayable - net_proceeds) / net_proceeds;
    round_money(cost_ratio * MONTHS_PER_YEAR / Decimal::from(term_months) * Decimal::ONE_HUNDRED)
}

/// Price a full set of terms.
pub fn quote_terms(
    terms: &LoanTerms,
    periods: &PeriodTable,
) -> LedgerResult<ComputationOutput<TermsQuote>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    terms.validate()?;
    periods.validate()?;

    let period_days = periods.days(terms.payment_frequency);
    let n = quote_periods(terms.term_days, period_days);
    let months = term_months(terms.term_days);
    let n_dec = Decimal::from(n);

    let (total_interest, base_installment) = match terms.interest_type {
        InterestType::Reducing => {
            let period_rate =
                pct_to_rate(terms.annual_rate) / terms.payment_frequency.periods_per_year();
            let pmt = level_payment(terms.principal, period_rate, n)?;
            let interest = if period_rate.is_zero() {
                Decimal::ZERO
            } else {
                round_money(pmt * n_dec - terms.principal)
            };
            (interest, pmt)
        }
        InterestType::Flat | InterestType::Compound => {
            let interest = compute_interest(
                terms.principal,
                terms.annual_rate,
                terms.term_days,
                terms.interest_type,
            )?;
            (interest, round_money((terms.principal + interest) / n_dec))
        }
    };

    let processing_fee = compute_processing_fee(terms.principal, terms.processing_fee_percent);
    let platform_fee_total = compute_platform_fee_total(terms.platform_fee_per_period, n);

    let (net_proceeds, total_repayable, installment_amount) = match terms.fee_collection {
        FeeCollection::Upfront => (
            compute_net_proceeds(terms.principal, processing_fee, platform_fee_total),
            terms.principal + total_interest,
            base_installment,
        ),
        FeeCollection::PerInstallment => (
            compute_net_proceeds(terms.principal, processing_fee, Decimal::ZERO),
            terms.principal + total_interest + platform_fee_total,
            base_installment + terms.platform_fee_per_period,
        ),
    };

    if net_proceeds <= Decimal::ZERO {
        warnings.push(format!(
            "Upfront deductions ({}) consume the entire principal",
            processing_fee + platform_fee_total
        ));
    }

    let effective_annual_rate = if net_proceeds > Decimal::ZERO {
        compute_effective_rate(net_proceeds, total_repayable, months)
    } else {
        Decimal::ZERO
    };

    if period_days * n != terms.term_days {
        warnings.push(format!(
            "Term of {} days is not a whole number of {}-day periods; quote assumes {} installments",
            terms.term_days, period_days, n
        ));
    }

    let output = TermsQuote {
        interest_type: terms.interest_type,
        number_of_periods: n,
        term_months: months,
        total_interest,
        processing_fee,
        platform_fee_total,
        installment_amount,
        total_repayable,
        net_proceeds,
        effective_annual_rate,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Loan Terms Quote: interest, fees, installment and cost of credit",
        &serde_json::json!({
            "principal": terms.principal.to_string(),
            "annual_rate_pct": terms.annual_rate.to_string(),
            "term_days": terms.term_days,
            "interest_type": terms.interest_type.to_string(),
            "payment_frequency": terms.payment_frequency.to_string(),
            "period_days": period_days,
            "fee_collection": terms.fee_collection,
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// Annual percentage rate implied by a dated schedule: the XIRR of
/// `-net_proceeds` at disbursement against each installment's total due.
pub fn schedule_apr(
    net_proceeds: Money,
    disbursement_date: NaiveDate,
    installments: &[Installment],
) -> LedgerResult<Percent> {
    if net_proceeds <= Decimal::ZERO {
        return Err(LedgerError::input(
            "net_proceeds",
            "Net proceeds must be positive to derive an APR",
        ));
    }
    let mut flows: Vec<(NaiveDate, Money)> = Vec::with_capacity(installments.len() + 1);
    flows.push((disbursement_date, -net_proceeds));
    flows.extend(installments.iter().map(|i| (i.due_date, i.total_due)));

    let rate = xirr(&flows, XIRR_GUESS)?;
    Ok(round_money(rate * Decimal::ONE_HUNDRED))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
