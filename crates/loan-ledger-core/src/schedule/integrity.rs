//! Structural checks on generated schedules.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use chrono::NaiveDate;

use crate::error::LedgerError;
use crate::ledger::Installment;
use crate::types::Money;
use crate::LedgerResult;

/// Aggregate view of an installment sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleSummary {
    pub installment_count: usize,
    pub total_principal: Money,
    pub total_interest: Money,
    pub total_fees: Money,
    pub total_due: Money,
    pub total_outstanding: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_due_date: Option<NaiveDate>,
}

pub fn summarize(installments: &[Installment]) -> ScheduleSummary {
    ScheduleSummary {
        installment_count: installments.len(),
        total_principal: installments.iter().map(|i| i.principal_due).sum(),
        total_interest: installments.iter().map(|i| i.interest_due).sum(),
        total_fees: installments.iter().map(|i| i.fees_due).sum(),
        total_due: installments.iter().map(|i| i.total_due).sum(),
        total_outstanding: installments.iter().map(|i| i.outstanding_amount).sum(),
        first_due_date: installments.first().map(|i| i.due_date),
        last_due_date: installments.last().map(|i| i.due_date),
    }
}

/// Verify numbering, non-negativity and principal reconciliation.
///
/// A failure here means the generator produced an inconsistent schedule.
pub fn verify_schedule(installments: &[Installment], principal: Money) -> LedgerResult<()> {
    if installments.is_empty() {
        return Err(LedgerError::ScheduleIntegrity(
            "Schedule contains no installments".into(),
        ));
    }

    for (idx, inst) in installments.iter().enumerate() {
        let expected = idx as u32 + 1;
        if inst.installment_number != expected {
            return Err(LedgerError::ScheduleIntegrity(format!(
                "Installment at position {} is numbered {} (expected {})",
                idx, inst.installment_number, expected
            )));
        }
        let fields = [
            ("principal_due", inst.principal_due),
            ("interest_due", inst.interest_due),
            ("fees_due", inst.fees_due),
        ];
        for (name, value) in fields {
            if value < Decimal::ZERO {
                return Err(LedgerError::ScheduleIntegrity(format!(
                    "Installment {} has negative {name} ({value})",
                    inst.installment_number
                )));
            }
        }
        if inst.total_due != inst.principal_due + inst.interest_due + inst.fees_due + inst.penalty_amount {
            return Err(LedgerError::ScheduleIntegrity(format!(
                "Installment {} total_due does not equal the sum of its parts",
                inst.installment_number
            )));
        }
        if idx > 0 && inst.due_date < installments[idx - 1].due_date {
            return Err(LedgerError::ScheduleIntegrity(format!(
                "Installment {} falls due before its predecessor",
                inst.installment_number
            )));
        }
    }

    let principal_sum: Money = installments.iter().map(|i| i.principal_due).sum();
    if principal_sum != principal {
        return Err(LedgerError::ScheduleIntegrity(format!(
            "Principal due sums to {principal_sum}, loan principal is {principal}"
        )));
    }

    Ok(())
}
