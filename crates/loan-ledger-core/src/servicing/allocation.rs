//! Payment allocation and reversal.
//!
//! Payments clear installments strictly in ascending installment number,
//! never re-sorted by due date. Within an installment the amount is
//! attributed penalty first, then fees, interest and principal. Reversal
//! replays the recorded allocations backwards and restores each
//! installment's prior status exactly.

use chrono::NaiveDate;
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::AllocationPolicy;
use crate::error::LedgerError;
use crate::ledger::{normalize, ComponentBreakdown, Installment, InstallmentStatus, Loan, LoanStatus, Payment};
use crate::types::{round_money, with_metadata, ComputationOutput, Money};
use crate::LedgerResult;

// ---------------------------------------------------------------------------
// Input / Output Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationInput {
    pub loan: Loan,
    pub payment: Payment,
    #[serde(default)]
    pub policy: AllocationPolicy,
}

/// What a payment did to one installment. Sufficient to undo it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentAllocation {
    pub installment_number: u32,
    pub applied: Money,
    pub to_penalty: Money,
    pub to_fees: Money,
    pub to_interest: Money,
    pub to_principal: Money,
    pub previous_status: InstallmentStatus,
    pub resulting_status: InstallmentStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationOutput {
    pub loan_id: String,
    pub payment_date: NaiveDate,
    pub installments: Vec<Installment>,
    pub allocations: Vec<InstallmentAllocation>,
    pub total_applied: Money,
    /// Portion of the payment no installment could absorb. The caller
    /// decides whether it becomes a credit or a refund.
    pub unallocated_remainder: Money,
    pub outstanding_before: Money,
    pub outstanding_after: Money,
    pub loan_status: LoanStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReversalInput {
    pub installments: Vec<Installment>,
    pub allocations: Vec<InstallmentAllocation>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Apply a payment to a loan's outstanding installments.
pub fn apply_payment(
    loan: &Loan,
    payment: &Payment,
    policy: &AllocationPolicy,
) -> LedgerResult<ComputationOutput<AllocationOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    policy.validate()?;
    validate_payment(loan, payment)?;

    let installments = loan.normalized_installments();
    let outstanding_before: Money = installments.iter().map(|i| i.outstanding_amount).sum();

    let excess = payment.amount - outstanding_before;
    if excess > Decimal::ZERO {
        if policy.allow_credit {
            warnings.push(format!(
                "Payment exceeds outstanding balance by {excess}; excess returned as credit"
            ));
        } else if excess > policy.overpayment_tolerance {
            return Err(LedgerError::InvalidPayment(format!(
                "Payment {} exceeds outstanding balance {} by more than the {} tolerance",
                payment.amount, outstanding_before, policy.overpayment_tolerance
            )));
        } else {
            warnings.push(format!(
                "Payment exceeds outstanding balance by {excess}; within tolerance, returned unallocated"
            ));
        }
    }

    if payment.payment_date < loan.disbursement_date {
        warnings.push(format!(
            "Payment dated {} precedes disbursement on {}",
            payment.payment_date, loan.disbursement_date
        ));
    }

    let (installments, allocations, unallocated_remainder) =
        allocate(&installments, payment.amount);

    let total_applied = payment.amount - unallocated_remainder;
    let outstanding_after: Money = installments.iter().map(|i| i.outstanding_amount).sum();
    let loan_status = if outstanding_after.is_zero() {
        LoanStatus::Closed
    } else {
        loan.status
    };

    debug!(
        "loan {}: applied {} across {} installments, remainder {}",
        loan.loan_id,
        total_applied,
        allocations.len(),
        unallocated_remainder
    );

    let output = AllocationOutput {
        loan_id: loan.loan_id.clone(),
        payment_date: payment.payment_date,
        installments,
        allocations,
        total_applied,
        unallocated_remainder,
        outstanding_before,
        outstanding_after,
        loan_status,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Payment Allocation: oldest installment first, penalty > fees > interest > principal",
        &serde_json::json!({
            "loan_id": loan.loan_id,
            "amount": payment.amount.to_string(),
            "payment_date": payment.payment_date.to_string(),
            "method": payment.method,
            "reference": payment.reference,
            "allow_credit": policy.allow_credit,
            "overpayment_tolerance": policy.overpayment_tolerance.to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

/// Allocate `amount` over `installments` (already ordered and normalized).
/// Returns the updated installments, one record per touched installment and
/// the unconsumed remainder.
pub fn allocate(
    installments: &[Installment],
    amount: Money,
) -> (Vec<Installment>, Vec<InstallmentAllocation>, Money) {
    let mut updated = installments.to_vec();
    let mut allocations: Vec<InstallmentAllocation> = Vec::new();
    let mut pool = amount;

    for inst in updated.iter_mut() {
        if pool <= Decimal::ZERO {
            break;
        }
        if inst.unpaid_breakdown().total() <= Decimal::ZERO {
            continue;
        }

        let previous_status = inst.status;
        let components = inst.record_payment(pool);
        let applied = components.total();
        inst.status = inst.status_after_payment();
        pool -= applied;

        allocations.push(InstallmentAllocation {
            installment_number: inst.installment_number,
            applied,
            to_penalty: components.penalty,
            to_fees: components.fees,
            to_interest: components.interest,
            to_principal: components.principal,
            previous_status,
            resulting_status: inst.status,
        });
    }

    (updated, allocations, pool)
}

/// Undo previously recorded allocations against the same installments.
pub fn reverse_allocation(
    installments: &[Installment],
    allocations: &[InstallmentAllocation],
) -> LedgerResult<Vec<Installment>> {
    let mut restored = normalize(installments);

    for alloc in allocations.iter().rev() {
        let inst = restored
            .iter_mut()
            .find(|i| i.installment_number == alloc.installment_number)
            .ok_or_else(|| {
                LedgerError::InvalidPayment(format!(
                    "Allocation references unknown installment {}",
                    alloc.installment_number
                ))
            })?;

        if alloc.applied <= Decimal::ZERO {
            return Err(LedgerError::InvalidPayment(format!(
                "Allocation to installment {} has non-positive amount {}",
                alloc.installment_number, alloc.applied
            )));
        }
        let split = ComponentBreakdown {
            penalty: alloc.to_penalty,
            fees: alloc.to_fees,
            interest: alloc.to_interest,
            principal: alloc.to_principal,
        };
        if split.total() != alloc.applied {
            return Err(LedgerError::InvalidPayment(format!(
                "Allocation to installment {} splits {} but records {} applied",
                alloc.installment_number,
                split.total(),
                alloc.applied
            )));
        }
        let paid = inst.paid_breakdown();
        if split.penalty > paid.penalty
            || split.fees > paid.fees
            || split.interest > paid.interest
            || split.principal > paid.principal
        {
            return Err(LedgerError::InvalidPayment(format!(
                "Cannot reverse {} from installment {}: only {} paid",
                alloc.applied, alloc.installment_number, inst.amount_paid
            )));
        }

        inst.unrecord_payment(&split);
        inst.status = alloc.previous_status;
    }

    Ok(restored)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_payment(loan: &Loan, payment: &Payment) -> LedgerResult<()> {
    loan.validate()?;
    if payment.amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidPayment(format!(
            "Payment amount must be positive, got {}",
            payment.amount
        )));
    }
    if round_money(payment.amount) != payment.amount {
        return Err(LedgerError::InvalidPayment(format!(
            "Payment amount {} has sub-cent precision",
            payment.amount
        )));
    }
    if loan.status.is_terminal() {
        return Err(LedgerError::InvalidPayment(format!(
            "Loan {} is {:?} and accepts no payments",
            loan.loan_id, loan.status
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PeriodTable;
    use crate::terms::model::{InterestType, LoanTerms, PaymentFrequency};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// Three installments of 1000 principal, no interest.
    fn loan() -> Loan {
        let terms = LoanTerms::new(
            dec!(3000),
            dec!(0),
            90,
            InterestType::Flat,
            PaymentFrequency::Monthly,
        );
        Loan::disburse("LN-7", terms, date(2024, 1, 1), &PeriodTable::default()).unwrap()
    }

    fn pay(amount: Money) -> Payment {
        Payment {
            amount,
            payment_date: date(2024, 1, 31),
            method: "bank_transfer".into(),
            reference: "TXN-1".into(),
        }
    }

    fn paid_total(s: &[Installment]) -> Money {
        s.iter().map(|i| i.amount_paid).sum()
    }

    // -----------------------------------------------------------------------
    // 1. Partial payment on a single installment
    // -----------------------------------------------------------------------
    #[test]
    fn test_partial_payment_reference_case() {
        let out = apply_payment(&loan(), &pay(dec!(600)), &AllocationPolicy::default()).unwrap();
        let first = &out.result.installments[0];
        assert_eq!(first.status, InstallmentStatus::PartiallyPaid);
        assert_eq!(first.amount_paid, dec!(600));
        assert_eq!(first.outstanding_amount, dec!(400));
        assert_eq!(out.result.installments[1].amount_paid, Decimal::ZERO);
        assert_eq!(out.result.allocations.len(), 1);
        assert_eq!(out.result.unallocated_remainder, Decimal::ZERO);
    }

    // -----------------------------------------------------------------------
    // 2. Oldest installment cleared first, spill-over to the next
    // -----------------------------------------------------------------------
    #[test]
    fn test_spill_over_in_number_order() {
        let out = apply_payment(&loan(), &pay(dec!(1500)), &AllocationPolicy::default()).unwrap();
        let r = &out.result;
        assert_eq!(r.installments[0].status, InstallmentStatus::Paid);
        assert_eq!(r.installments[1].status, InstallmentStatus::PartiallyPaid);
        assert_eq!(r.installments[1].amount_paid, dec!(500));
        assert_eq!(r.outstanding_after, dec!(1500));
        assert_eq!(r.loan_status, LoanStatus::Active);
    }

    #[test]
    fn test_order_by_number_not_due_date() {
        let mut l = loan();
        // Swap due dates so installment 2 falls due before installment 1
        let d1 = l.installments[0].due_date;
        l.installments[0].due_date = l.installments[1].due_date;
        l.installments[1].due_date = d1;
        let out = apply_payment(&l, &pay(dec!(1000)), &AllocationPolicy::default()).unwrap();
        assert_eq!(out.result.allocations[0].installment_number, 1);
        assert_eq!(out.result.installments[0].status, InstallmentStatus::Paid);
    }

    // -----------------------------------------------------------------------
    // 3. Component waterfall
    // -----------------------------------------------------------------------
    #[test]
    fn test_penalty_fees_interest_principal_order() {
        let mut l = loan();
        l.installments[0].interest_due = dec!(50);
        l.installments[0].fees_due = dec!(20);
        l.installments[0].penalty_amount = dec!(10);
        let out = apply_payment(&l, &pay(dec!(70)), &AllocationPolicy::default()).unwrap();
        let a = &out.result.allocations[0];
        assert_eq!(a.to_penalty, dec!(10));
        assert_eq!(a.to_fees, dec!(20));
        assert_eq!(a.to_interest, dec!(40));
        assert_eq!(a.to_principal, Decimal::ZERO);
    }

    // -----------------------------------------------------------------------
    // 4. Conservation law over a grid of amounts
    // -----------------------------------------------------------------------
    #[test]
    fn test_conservation_of_paid_amounts() {
        let l = loan();
        let before = paid_total(&l.installments);
        let outstanding = l.outstanding_balance();
        let policy = AllocationPolicy {
            overpayment_tolerance: Decimal::ZERO,
            allow_credit: true,
        };
        for p in [dec!(0.01), dec!(999.99), dec!(1000), dec!(2500.5), dec!(3000), dec!(4000)] {
            let out = apply_payment(&l, &pay(p), &policy).unwrap().result;
            assert_eq!(paid_total(&out.installments), before + p.min(outstanding));
            assert_eq!(out.total_applied + out.unallocated_remainder, p);
        }
    }

    // -----------------------------------------------------------------------
    // 5. Overpayment rules
    // -----------------------------------------------------------------------
    #[test]
    fn test_overpayment_rejected_by_default() {
        let err = apply_payment(&loan(), &pay(dec!(3000.01)), &AllocationPolicy::default()).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidPayment(_)));
    }

    #[test]
    fn test_overpayment_within_tolerance_reported() {
        let policy = AllocationPolicy {
            overpayment_tolerance: dec!(1),
            allow_credit: false,
        };
        let out = apply_payment(&loan(), &pay(dec!(3000.50)), &policy).unwrap();
        assert_eq!(out.result.unallocated_remainder, dec!(0.50));
        assert_eq!(out.result.loan_status, LoanStatus::Closed);
        assert_eq!(out.warnings.len(), 1);
    }

    #[test]
    fn test_credit_mode_accepts_any_excess() {
        let policy = AllocationPolicy {
            overpayment_tolerance: Decimal::ZERO,
            allow_credit: true,
        };
        let out = apply_payment(&loan(), &pay(dec!(5000)), &policy).unwrap();
        assert_eq!(out.result.unallocated_remainder, dec!(2000));
        assert!(out.result.installments.iter().all(|i| i.status == InstallmentStatus::Paid));
    }

    #[test]
    fn test_non_positive_and_sub_cent_rejected() {
        let policy = AllocationPolicy::default();
        assert!(apply_payment(&loan(), &pay(Decimal::ZERO), &policy).is_err());
        assert!(apply_payment(&loan(), &pay(dec!(-5)), &policy).is_err());
        assert!(apply_payment(&loan(), &pay(dec!(10.001)), &policy).is_err());
    }

    #[test]
    fn test_closed_loan_rejects_payment() {
        let mut l = loan();
        l.status = LoanStatus::Closed;
        assert!(apply_payment(&l, &pay(dec!(10)), &AllocationPolicy::default()).is_err());
    }

    // -----------------------------------------------------------------------
    // 6. Reversal restores exact prior state
    // -----------------------------------------------------------------------
    #[test]
    fn test_reversal_restores_state() {
        let mut l = loan();
        l.installments[0].status = InstallmentStatus::Overdue;
        let original = normalize(&l.installments);

        let out = apply_payment(&l, &pay(dec!(1750)), &AllocationPolicy::default()).unwrap();
        let restored = reverse_allocation(&out.result.installments, &out.result.allocations).unwrap();
        pretty_assertions::assert_eq!(restored, original);
    }

    #[test]
    fn test_reversal_after_two_payments_unwinds_latest_only() {
        let l = loan();
        let first = apply_payment(&l, &pay(dec!(400)), &AllocationPolicy::default())
            .unwrap()
            .result;
        let mut after_first = l.clone();
        after_first.installments = first.installments.clone();
        let second = apply_payment(&after_first, &pay(dec!(900)), &AllocationPolicy::default())
            .unwrap()
            .result;

        let restored = reverse_allocation(&second.installments, &second.allocations).unwrap();
        pretty_assertions::assert_eq!(restored, first.installments);
    }

    #[test]
    fn test_reversal_rejects_unknown_or_excessive() {
        let l = loan();
        let bogus = InstallmentAllocation {
            installment_number: 9,
            applied: dec!(1),
            to_penalty: Decimal::ZERO,
            to_fees: Decimal::ZERO,
            to_interest: Decimal::ZERO,
            to_principal: dec!(1),
            previous_status: InstallmentStatus::Pending,
            resulting_status: InstallmentStatus::PartiallyPaid,
        };
        assert!(reverse_allocation(&l.installments, &[bogus.clone()]).is_err());

        let excessive = InstallmentAllocation {
            installment_number: 1,
            ..bogus
        };
        assert!(reverse_allocation(&l.installments, &[excessive]).is_err());
    }
}
