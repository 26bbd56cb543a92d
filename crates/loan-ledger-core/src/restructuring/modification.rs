//! Mid-life loan modification.
//!
//! A modification replaces principal, rate, term, frequency or layout. The
//! previous installment sequence is discarded wholesale and a new schedule
//! generated from the merged terms; retaining superseded records for audit
//! is the caller's concern.

use chrono::NaiveDate;
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::config::PeriodTable;
use crate::ledger::{Installment, Loan};
use crate::schedule::generator::generate_schedule;
use crate::schedule::integrity::{summarize, ScheduleSummary};
use crate::terms::model::{LoanTerms, Milestone, PaymentFrequency, ScheduleType};
use crate::types::{with_metadata, ComputationOutput, Money, Percent};
use crate::LedgerResult;

// ---------------------------------------------------------------------------
// Input / Output Types
// ---------------------------------------------------------------------------

/// Requested changes; unset fields keep the loan's current values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoanModification {
    pub principal: Option<Money>,
    pub annual_rate: Option<Percent>,
    pub term_days: Option<u32>,
    pub payment_frequency: Option<PaymentFrequency>,
    pub schedule_type: Option<ScheduleType>,
    pub milestones: Option<Vec<Milestone>>,
    /// Start date of the regenerated schedule. Defaults to disbursement.
    pub effective_date: Option<NaiveDate>,
}

impl LoanModification {
    /// Terms with every set field overriding `current`.
    pub fn merge_into(&self, current: &LoanTerms) -> LoanTerms {
        let mut merged = current.clone();
        if let Some(p) = self.principal {
            merged.principal = p;
        }
        if let Some(r) = self.annual_rate {
            merged.annual_rate = r;
        }
        if let Some(d) = self.term_days {
            merged.term_days = d;
        }
        if let Some(f) = self.payment_frequency {
            merged.payment_frequency = f;
        }
        if let Some(s) = self.schedule_type {
            merged.schedule_type = s;
        }
        if let Some(m) = &self.milestones {
            merged.milestones = m.clone();
        }
        merged
    }

    pub fn is_empty(&self) -> bool {
        *self == LoanModification::default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModificationInput {
    pub loan: Loan,
    pub modification: LoanModification,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModificationOutput {
    pub loan_id: String,
    pub merged_terms: LoanTerms,
    pub schedule_start: NaiveDate,
    pub installments: Vec<Installment>,
    pub superseded_installments: usize,
    pub summary: ScheduleSummary,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Regenerate a loan's schedule under modified terms.
pub fn recalculate(
    loan: &Loan,
    modification: &LoanModification,
    periods: &PeriodTable,
) -> LedgerResult<ComputationOutput<ModificationOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    loan.validate()?;
    if modification.is_empty() {
        warnings.push("Modification changes no terms; schedule regenerated as-is".into());
    }
    if loan.status.is_terminal() {
        warnings.push(format!("Loan {} is {:?}", loan.loan_id, loan.status));
    }
    let paid_to_date: Money = loan.installments.iter().map(|i| i.amount_paid).sum();
    if paid_to_date > Decimal::ZERO {
        warnings.push(format!(
            "{paid_to_date} already paid against superseded installments; retain them for audit"
        ));
    }

    let merged_terms = modification.merge_into(&loan.terms);
    let schedule_start = modification.effective_date.unwrap_or(loan.disbursement_date);
    let installments = generate_schedule(&merged_terms, schedule_start, periods)?;
    let summary = summarize(&installments);

    debug!(
        "loan {}: replaced {} installments with {}",
        loan.loan_id,
        loan.installments.len(),
        installments.len()
    );

    let output = ModificationOutput {
        loan_id: loan.loan_id.clone(),
        merged_terms,
        schedule_start,
        superseded_installments: loan.installments.len(),
        installments,
        summary,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Loan Modification: merged terms, full forward schedule regenerated",
        &serde_json::json!({
            "loan_id": loan.loan_id,
            "modification": modification,
            "schedule_start": schedule_start.to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terms::model::InterestType;
    use crate::LedgerError;
    use rust_decimal_macros::dec;

    fn loan() -> Loan {
        let terms = LoanTerms::new(
            dec!(12000),
            dec!(12),
            360,
            InterestType::Reducing,
            PaymentFrequency::Monthly,
        );
        Loan::disburse(
            "LN-M",
            terms,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            &PeriodTable::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_unset_fields_keep_current_terms() {
        let l = loan();
        let m = LoanModification {
            annual_rate: Some(dec!(9)),
            ..Default::default()
        };
        let merged = m.merge_into(&l.terms);
        assert_eq!(merged.annual_rate, dec!(9));
        assert_eq!(merged.principal, dec!(12000));
        assert_eq!(merged.term_days, 360);
        assert_eq!(merged.payment_frequency, PaymentFrequency::Monthly);
    }

    #[test]
    fn test_term_extension_regenerates_schedule() {
        let l = loan();
        let m = LoanModification {
            term_days: Some(720),
            effective_date: Some(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()),
            ..Default::default()
        };
        let out = recalculate(&l, &m, &PeriodTable::default()).unwrap().result;
        assert_eq!(out.installments.len(), 24);
        assert_eq!(out.superseded_installments, 12);
        assert_eq!(out.summary.total_principal, dec!(12000));
        assert_eq!(out.installments[0].due_date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
    }

    #[test]
    fn test_matches_fresh_generation() {
        let l = loan();
        let m = LoanModification {
            principal: Some(dec!(8000)),
            payment_frequency: Some(PaymentFrequency::Biweekly),
            ..Default::default()
        };
        let out = recalculate(&l, &m, &PeriodTable::default()).unwrap().result;
        let fresh = generate_schedule(&out.merged_terms, l.disbursement_date, &PeriodTable::default()).unwrap();
        pretty_assertions::assert_eq!(out.installments, fresh);
    }

    #[test]
    fn test_empty_modification_warns() {
        let out = recalculate(&loan(), &LoanModification::default(), &PeriodTable::default()).unwrap();
        assert!(out.warnings.iter().any(|w| w.contains("no terms")));
    }

    #[test]
    fn test_invalid_merged_terms_rejected() {
        let m = LoanModification {
            principal: Some(dec!(-1)),
            ..Default::default()
        };
        assert!(matches!(
            recalculate(&loan(), &m, &PeriodTable::default()),
            Err(LedgerError::InvalidTerms { .. })
        ));
    }
}
