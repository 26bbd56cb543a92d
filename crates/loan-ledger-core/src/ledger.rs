//! Loan and installment records: the value collection the engine reads and
//! returns. No back-references; a loan owns its installments outright.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::PeriodTable;
use crate::error::LedgerError;
use crate::schedule::generator::generate_schedule;
use crate::terms::model::LoanTerms;
use crate::types::Money;
use crate::LedgerResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstallmentStatus {
    #[default]
    Pending,
    PartiallyPaid,
    Paid,
    Overdue,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LoanStatus {
    #[default]
    Active,
    Suspended,
    Closed,
    WrittenOff,
}

impl LoanStatus {
    /// Closed and written-off loans accept no further servicing.
    pub fn is_terminal(self) -> bool {
        matches!(self, LoanStatus::Closed | LoanStatus::WrittenOff)
    }
}

/// Amounts attributed to each obligation bucket, in allocation order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentBreakdown {
    pub penalty: Money,
    pub fees: Money,
    pub interest: Money,
    pub principal: Money,
}

impl ComponentBreakdown {
    pub fn total(&self) -> Money {
        self.penalty + self.fees + self.interest + self.principal
    }
}

/// One scheduled repayment obligation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub installment_number: u32,
    pub due_date: NaiveDate,
    pub principal_due: Money,
    pub interest_due: Money,
    pub fees_due: Money,
    /// Gross penalty assessed to date. Waivers never reduce this figure;
    /// they accumulate in `penalty_waived_amount`.
    #[serde(default)]
    pub penalty_amount: Money,
    #[serde(default)]
    pub penalty_waived_amount: Money,
    #[serde(default)]
    pub total_due: Money,
    #[serde(default)]
    pub amount_paid: Money,
    /// Split of `amount_paid` as each payment was allocated. Never
    /// re-derived, so a penalty assessed later cannot claim earlier money.
    #[serde(default)]
    pub penalty_paid: Money,
    #[serde(default)]
    pub fees_paid: Money,
    #[serde(default)]
    pub interest_paid: Money,
    #[serde(default)]
    pub principal_paid: Money,
    #[serde(default)]
    pub outstanding_amount: Money,
    #[serde(default)]
    pub status: InstallmentStatus,
}

impl Installment {
    /// A freshly generated installment: pending, nothing paid, no penalty.
    pub fn scheduled(
        installment_number: u32,
        due_date: NaiveDate,
        principal_due: Money,
        interest_due: Money,
        fees_due: Money,
    ) -> Self {
        let mut inst = Installment {
            installment_number,
            due_date,
            principal_due,
            interest_due,
            fees_due,
            penalty_amount: Decimal::ZERO,
            penalty_waived_amount: Decimal::ZERO,
            total_due: Decimal::ZERO,
            amount_paid: Decimal::ZERO,
            penalty_paid: Decimal::ZERO,
            fees_paid: Decimal::ZERO,
            interest_paid: Decimal::ZERO,
            principal_paid: Decimal::ZERO,
            outstanding_amount: Decimal::ZERO,
            status: InstallmentStatus::Pending,
        };
        inst.refresh_totals();
        inst
    }

    /// Recompute the derived `total_due` and `outstanding_amount`.
    pub fn refresh_totals(&mut self) {
        self.total_due = self.principal_due + self.interest_due + self.fees_due + self.penalty_amount;
        self.outstanding_amount =
            (self.total_due - self.amount_paid - self.penalty_waived_amount).max(Decimal::ZERO);
    }

    /// Penalty still payable after waivers.
    pub fn net_penalty(&self) -> Money {
        (self.penalty_amount - self.penalty_waived_amount).max(Decimal::ZERO)
    }

    /// What each bucket is owed in total, in allocation order.
    pub fn obligations(&self) -> ComponentBreakdown {
        ComponentBreakdown {
            penalty: self.net_penalty(),
            fees: self.fees_due,
            interest: self.interest_due,
            principal: self.principal_due,
        }
    }

    /// What payments have settled in each bucket.
    pub fn paid_breakdown(&self) -> ComponentBreakdown {
        ComponentBreakdown {
            penalty: self.penalty_paid,
            fees: self.fees_paid,
            interest: self.interest_paid,
            principal: self.principal_paid,
        }
    }

    /// Still owed per bucket. The penalty figure is what remains waivable.
    pub fn unpaid_breakdown(&self) -> ComponentBreakdown {
        let owed = self.obligations();
        ComponentBreakdown {
            penalty: (owed.penalty - self.penalty_paid).max(Decimal::ZERO),
            fees: (owed.fees - self.fees_paid).max(Decimal::ZERO),
            interest: (owed.interest - self.interest_paid).max(Decimal::ZERO),
            principal: (owed.principal - self.principal_paid).max(Decimal::ZERO),
        }
    }

    /// Apply up to `amount` to the unpaid buckets, penalty first. Returns
    /// the split actually taken; its total is what the installment absorbed.
    pub(crate) fn record_payment(&mut self, amount: Money) -> ComponentBreakdown {
        let split = waterfall(amount, &self.unpaid_breakdown());
        self.penalty_paid += split.penalty;
        self.fees_paid += split.fees;
        self.interest_paid += split.interest;
        self.principal_paid += split.principal;
        self.amount_paid += split.total();
        self.refresh_totals();
        split
    }

    /// Exact inverse of a recorded split.
    pub(crate) fn unrecord_payment(&mut self, split: &ComponentBreakdown) {
        self.penalty_paid -= split.penalty;
        self.fees_paid -= split.fees;
        self.interest_paid -= split.interest;
        self.principal_paid -= split.principal;
        self.amount_paid -= split.total();
        self.refresh_totals();
    }

    /// Split any part of `amount_paid` the component fields do not yet
    /// account for, e.g. records imported with only a paid total. Scheduled
    /// charges are taken first; only the excess over them reaches penalty.
    pub(crate) fn reconcile_paid_components(&mut self) {
        let attributed = self.paid_breakdown().total();
        if self.amount_paid < attributed {
            self.amount_paid = attributed;
            return;
        }
        let unattributed = self.amount_paid - attributed;
        if unattributed.is_zero() {
            return;
        }

        let unpaid = self.unpaid_breakdown();
        let scheduled = waterfall(
            unattributed,
            &ComponentBreakdown {
                penalty: Decimal::ZERO,
                ..unpaid
            },
        );
        self.fees_paid += scheduled.fees;
        self.interest_paid += scheduled.interest;
        self.principal_paid += scheduled.principal;
        self.penalty_paid += (unattributed - scheduled.total()).min(unpaid.penalty);
    }

    pub fn is_settled(&self) -> bool {
        self.outstanding_amount.is_zero()
    }

    /// Status after a payment touched this installment.
    pub(crate) fn status_after_payment(&self) -> InstallmentStatus {
        if self.is_settled() {
            InstallmentStatus::Paid
        } else {
            InstallmentStatus::PartiallyPaid
        }
    }
}

/// Fill buckets in order (penalty, fees, interest, principal) from `amount`.
pub(crate) fn waterfall(amount: Money, caps: &ComponentBreakdown) -> ComponentBreakdown {
    let mut pool = amount.max(Decimal::ZERO);
    let mut take = |cap: Money| {
        let t = pool.min(cap.max(Decimal::ZERO));
        pool -= t;
        t
    };
    let penalty = take(caps.penalty);
    let fees = take(caps.fees);
    let interest = take(caps.interest);
    let principal = take(caps.principal);
    ComponentBreakdown {
        penalty,
        fees,
        interest,
        principal,
    }
}

/// An incoming payment. Ephemeral: the engine only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub amount: Money,
    pub payment_date: NaiveDate,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub reference: String,
}

/// Aggregate root handed to the engine by the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub loan_id: String,
    pub principal: Money,
    pub disbursement_date: NaiveDate,
    pub terms: LoanTerms,
    #[serde(default)]
    pub status: LoanStatus,
    #[serde(default)]
    pub installments: Vec<Installment>,
}

impl Loan {
    /// Create an active loan with its initial schedule.
    pub fn disburse(
        loan_id: impl Into<String>,
        terms: LoanTerms,
        disbursement_date: NaiveDate,
        periods: &PeriodTable,
    ) -> LedgerResult<Self> {
        let installments = generate_schedule(&terms, disbursement_date, periods)?;
        Ok(Loan {
            loan_id: loan_id.into(),
            principal: terms.principal,
            disbursement_date,
            terms,
            status: LoanStatus::Active,
            installments,
        })
    }

    /// The loan's principal must match its terms; both travel in records
    /// the persistence layer may have edited separately.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.principal != self.terms.principal {
            return Err(LedgerError::terms(
                "principal",
                format!(
                    "Loan {} records principal {} but its terms carry {}",
                    self.loan_id, self.principal, self.terms.principal
                ),
            ));
        }
        Ok(())
    }

    pub fn outstanding_balance(&self) -> Money {
        self.installments.iter().map(|i| i.outstanding_amount).sum()
    }

    /// Copy of the installments with derived totals recomputed, ordered by
    /// installment number. Callers' stored totals are never trusted.
    pub(crate) fn normalized_installments(&self) -> Vec<Installment> {
        normalize(&self.installments)
    }
}

pub(crate) fn normalize(installments: &[Installment]) -> Vec<Installment> {
    let mut out: Vec<Installment> = installments.to_vec();
    out.sort_by_key(|i| i.installment_number);
    for inst in &mut out {
        inst.reconcile_paid_components();
        inst.refresh_totals();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn inst() -> Installment {
        Installment::scheduled(
            1,
            NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            dec!(800),
            dec!(150),
            dec!(50),
        )
    }

    #[test]
    fn test_scheduled_totals() {
        let i = inst();
        assert_eq!(i.total_due, dec!(1000));
        assert_eq!(i.outstanding_amount, dec!(1000));
        assert_eq!(i.status, InstallmentStatus::Pending);
    }

    #[test]
    fn test_outstanding_subtracts_waiver() {
        let mut i = inst();
        i.penalty_amount = dec!(40);
        i.penalty_waived_amount = dec!(15);
        i.amount_paid = dec!(100);
        i.refresh_totals();
        assert_eq!(i.total_due, dec!(1040));
        assert_eq!(i.outstanding_amount, dec!(925));
        assert_eq!(i.net_penalty(), dec!(25));
    }

    #[test]
    fn test_outstanding_floors_at_zero() {
        let mut i = inst();
        i.amount_paid = dec!(1200);
        i.refresh_totals();
        assert_eq!(i.outstanding_amount, Decimal::ZERO);
    }

    #[test]
    fn test_record_payment_follows_waterfall() {
        let mut i = inst();
        i.penalty_amount = dec!(20);
        i.refresh_totals();
        let split = i.record_payment(dec!(100));
        assert_eq!(split.penalty, dec!(20));
        assert_eq!(split.fees, dec!(50));
        assert_eq!(split.interest, dec!(30));
        assert_eq!(split.principal, Decimal::ZERO);
        assert_eq!(i.amount_paid, dec!(100));

        let unpaid = i.unpaid_breakdown();
        assert_eq!(unpaid.interest, dec!(120));
        assert_eq!(unpaid.principal, dec!(800));
        assert_eq!(unpaid.total(), i.outstanding_amount);
    }

    #[test]
    fn test_later_penalty_does_not_claim_earlier_payment() {
        let mut i = inst();
        i.record_payment(dec!(600));
        assert_eq!(i.paid_breakdown().principal, dec!(400));

        i.penalty_amount = dec!(25);
        i.refresh_totals();
        let unpaid = i.unpaid_breakdown();
        assert_eq!(unpaid.penalty, dec!(25));
        assert_eq!(unpaid.principal, dec!(400));
        assert_eq!(unpaid.total(), i.outstanding_amount);
    }

    #[test]
    fn test_unrecord_restores_prior_state() {
        let mut i = inst();
        i.penalty_amount = dec!(10);
        i.refresh_totals();
        let before = i.clone();
        let split = i.record_payment(dec!(333.33));
        i.unrecord_payment(&split);
        assert_eq!(i, before);
    }

    #[test]
    fn test_imported_paid_total_skips_penalty_first() {
        let mut i = inst();
        i.penalty_amount = dec!(30);
        i.amount_paid = dec!(1000);
        let n = normalize(&[i]);
        let paid = n[0].paid_breakdown();
        assert_eq!(paid.fees, dec!(50));
        assert_eq!(paid.interest, dec!(150));
        assert_eq!(paid.principal, dec!(800));
        assert_eq!(paid.penalty, Decimal::ZERO);
        assert_eq!(n[0].unpaid_breakdown().penalty, dec!(30));
        assert_eq!(n[0].outstanding_amount, dec!(30));
    }

    #[test]
    fn test_loan_principal_must_match_terms() {
        let terms = LoanTerms::new(
            dec!(1000),
            dec!(10),
            60,
            crate::terms::model::InterestType::Flat,
            crate::terms::model::PaymentFrequency::Monthly,
        );
        let mut loan = Loan::disburse(
            "LN-P",
            terms,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            &PeriodTable::default(),
        )
        .unwrap();
        assert!(loan.validate().is_ok());
        loan.principal = dec!(999);
        assert!(matches!(loan.validate(), Err(LedgerError::InvalidTerms { .. })));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(LoanStatus::Closed.is_terminal());
        assert!(LoanStatus::WrittenOff.is_terminal());
        assert!(!LoanStatus::Suspended.is_terminal());
    }
}
