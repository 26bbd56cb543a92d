use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::ledger::Loan;
use crate::types::{pct_to_rate, round_money, with_metadata, ComputationOutput, Money, Percent};
use crate::{LedgerError, LedgerResult};

// ---------------------------------------------------------------------------
// Input / Output Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoffInput {
    pub outstanding_principal: Money,
    pub outstanding_interest: Money,
    #[serde(default)]
    pub discount_percent: Percent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoffQuote {
    pub outstanding_principal: Money,
    pub outstanding_interest: Money,
    pub discount_percent: Percent,
    /// Discount granted on outstanding interest only.
    pub discount_amount: Money,
    pub payoff_amount: Money,
    pub savings: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanPayoffInput {
    pub loan: Loan,
    #[serde(default)]
    pub discount_percent: Percent,
}

/// Payoff for a whole loan. Fees and net penalty are settled in full;
/// the discount reaches interest only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanPayoffQuote {
    pub loan_id: String,
    pub outstanding_fees: Money,
    pub outstanding_penalty: Money,
    pub interest_quote: PayoffQuote,
    pub total_payoff_amount: Money,
}

// ---------------------------------------------------------------------------
// Core computation
// ---------------------------------------------------------------------------

/// `payoff = principal + interest - round(interest * discount%)`.
pub fn early_payoff(
    outstanding_principal: Money,
    outstanding_interest: Money,
    discount_percent: Percent,
) -> LedgerResult<PayoffQuote> {
    if outstanding_principal < Decimal::ZERO {
        return Err(LedgerError::input(
            "outstanding_principal",
            "Outstanding principal cannot be negative",
        ));
    }
    if outstanding_interest < Decimal::ZERO {
        return Err(LedgerError::input(
            "outstanding_interest",
            "Outstanding interest cannot be negative",
        ));
    }
    if discount_percent < Decimal::ZERO || discount_percent > Decimal::ONE_HUNDRED {
        return Err(LedgerError::input(
            "discount_percent",
            "Discount must be between 0 and 100",
        ));
    }

    let discount_amount = round_money(outstanding_interest * pct_to_rate(discount_percent));
    let payoff_amount = outstanding_principal + outstanding_interest - discount_amount;

    Ok(PayoffQuote {
        outstanding_principal,
        outstanding_interest,
        discount_percent,
        discount_amount,
        payoff_amount,
        savings: discount_amount,
    })
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

pub fn quote_early_payoff(input: &PayoffInput) -> LedgerResult<ComputationOutput<PayoffQuote>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let quote = early_payoff(
        input.outstanding_principal,
        input.outstanding_interest,
        input.discount_percent,
    )?;
    if quote.payoff_amount.is_zero() {
        warnings.push("Nothing outstanding; payoff amount is zero".into());
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Early Payoff: principal plus interest less interest discount",
        &serde_json::json!({
            "discount_percent": input.discount_percent.to_string(),
            "discount_base": "outstanding_interest",
        }),
        warnings,
        elapsed,
        quote,
    ))
}

/// Quote settlement of every unpaid component on a loan.
pub fn quote_loan_payoff(
    loan: &Loan,
    discount_percent: Percent,
) -> LedgerResult<ComputationOutput<LoanPayoffQuote>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    loan.validate()?;
    if loan.status.is_terminal() {
        warnings.push(format!("Loan {} is {:?}", loan.loan_id, loan.status));
    }

    let mut principal = Decimal::ZERO;
    let mut interest = Decimal::ZERO;
    let mut fees = Decimal::ZERO;
    let mut penalty = Decimal::ZERO;
    for inst in loan.normalized_installments() {
        let unpaid = inst.unpaid_breakdown();
        principal += unpaid.principal;
        interest += unpaid.interest;
        fees += unpaid.fees;
        penalty += unpaid.penalty;
    }

    let interest_quote = early_payoff(principal, interest, discount_percent)?;
    let total_payoff_amount = interest_quote.payoff_amount + fees + penalty;
    debug!("loan {}: payoff {total_payoff_amount}", loan.loan_id);

    let quote = LoanPayoffQuote {
        loan_id: loan.loan_id.clone(),
        outstanding_fees: fees,
        outstanding_penalty: penalty,
        interest_quote,
        total_payoff_amount,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Loan Payoff: unpaid principal, interest, fees and net penalty; discount on interest",
        &serde_json::json!({
            "loan_id": loan.loan_id,
            "discount_percent": discount_percent.to_string(),
        }),
        warnings,
        elapsed,
        quote,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PeriodTable;
    use crate::terms::model::{InterestType, LoanTerms, PaymentFrequency};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn test_discount_applies_to_interest_only() {
        let q = early_payoff(dec!(5000), dec!(400), dec!(25)).unwrap();
        assert_eq!(q.discount_amount, dec!(100));
        assert_eq!(q.payoff_amount, dec!(5300));
        assert_eq!(q.savings, dec!(100));
    }

    #[test]
    fn test_discount_rounds_half_up() {
        let q = early_payoff(dec!(0), dec!(0.05), dec!(50)).unwrap();
        assert_eq!(q.discount_amount, dec!(0.03));
        assert_eq!(q.payoff_amount, dec!(0.02));
    }

    #[test]
    fn test_zero_discount() {
        let q = early_payoff(dec!(1000), dec!(100), Decimal::ZERO).unwrap();
        assert_eq!(q.payoff_amount, dec!(1100));
        assert_eq!(q.savings, Decimal::ZERO);
    }

    #[test]
    fn test_rejects_out_of_range_discount() {
        assert!(early_payoff(dec!(1000), dec!(100), dec!(101)).is_err());
        assert!(early_payoff(dec!(1000), dec!(100), dec!(-1)).is_err());
        assert!(early_payoff(dec!(-1), dec!(100), dec!(10)).is_err());
    }

    #[test]
    fn test_loan_payoff_sums_unpaid_components() {
        let terms = LoanTerms::new(
            dec!(1200),
            Decimal::ZERO,
            90,
            InterestType::Flat,
            PaymentFrequency::Monthly,
        );
        let mut loan = Loan::disburse(
            "LN-P",
            terms,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            &PeriodTable::default(),
        )
        .unwrap();
        loan.installments[0].penalty_amount = dec!(15);
        let out = quote_loan_payoff(&loan, dec!(50)).unwrap().result;
        assert_eq!(out.interest_quote.outstanding_principal, dec!(1200));
        assert_eq!(out.outstanding_penalty, dec!(15));
        assert_eq!(out.total_payoff_amount, dec!(1215));
    }
}
