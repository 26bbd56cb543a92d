//! Penalty waivers.
//!
//! Evaluation is a pure comparison against the requester's authority limit,
//! which the authorization layer supplies. Application moves the approved
//! amount into `penalty_waived_amount` on one installment, or across unpaid
//! penalised installments oldest first.

use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::LedgerError;
use crate::ledger::{normalize, Installment, InstallmentStatus, Loan};
use crate::types::{with_metadata, ComputationOutput, Money};
use crate::LedgerResult;

// ---------------------------------------------------------------------------
// Input / Output Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaiverRequest {
    pub loan_id: String,
    /// Target installment; absent means loan-wide.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installment_number: Option<u32>,
    pub requested_amount: Money,
    pub authority_limit: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaiverDecision {
    pub auto_approved: bool,
    pub requested_amount: Money,
    /// Zero when the request needs escalation.
    pub approved_amount: Money,
    pub current_penalty_total: Money,
    pub authority_limit: Money,
}

/// Amount waived on one installment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaiverApplication {
    pub installment_number: u32,
    pub waived: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaiverInput {
    pub loan: Loan,
    pub request: WaiverRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaiverOutput {
    pub loan_id: String,
    pub decision: WaiverDecision,
    pub installments: Vec<Installment>,
    pub applications: Vec<WaiverApplication>,
    pub outstanding_balance: Money,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Penalty still unpaid after waivers, for one installment or the whole loan.
pub fn outstanding_penalty_total(installments: &[Installment], target: Option<u32>) -> LedgerResult<Money> {
    let normalized = normalize(installments);
    match target {
        Some(number) => normalized
            .iter()
            .find(|i| i.installment_number == number)
            .map(|i| i.unpaid_breakdown().penalty)
            .ok_or_else(|| LedgerError::InvalidWaiver(format!("No installment numbered {number}"))),
        None => Ok(normalized.iter().map(|i| i.unpaid_breakdown().penalty).sum()),
    }
}

/// Decide whether a waiver can be approved without escalation.
pub fn evaluate_waiver(request: &WaiverRequest, current_penalty_total: Money) -> LedgerResult<WaiverDecision> {
    if request.requested_amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidWaiver(format!(
            "Requested waiver must be positive, got {}",
            request.requested_amount
        )));
    }
    if request.requested_amount > current_penalty_total {
        return Err(LedgerError::InvalidWaiver(format!(
            "Requested waiver {} exceeds current penalty total {}",
            request.requested_amount, current_penalty_total
        )));
    }

    let auto_approved = request.requested_amount <= request.authority_limit;
    Ok(WaiverDecision {
        auto_approved,
        requested_amount: request.requested_amount,
        approved_amount: if auto_approved {
            request.requested_amount
        } else {
            Decimal::ZERO
        },
        current_penalty_total,
        authority_limit: request.authority_limit,
    })
}

/// Record an approved waiver against the installments.
pub fn apply_waiver(
    installments: &[Installment],
    target: Option<u32>,
    approved_amount: Money,
) -> LedgerResult<(Vec<Installment>, Vec<WaiverApplication>)> {
    if approved_amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidWaiver(format!(
            "Approved waiver must be positive, got {approved_amount}"
        )));
    }

    let mut updated = normalize(installments);
    let mut applications: Vec<WaiverApplication> = Vec::new();

    match target {
        Some(number) => {
            let inst = updated
                .iter_mut()
                .find(|i| i.installment_number == number)
                .ok_or_else(|| LedgerError::InvalidWaiver(format!("No installment numbered {number}")))?;
            let available = inst.unpaid_breakdown().penalty;
            if approved_amount > available {
                return Err(LedgerError::InvalidWaiver(format!(
                    "Installment {number} carries only {available} unpaid penalty"
                )));
            }
            waive(inst, approved_amount);
            applications.push(WaiverApplication {
                installment_number: number,
                waived: approved_amount,
            });
        }
        None => {
            let mut remaining = approved_amount;
            for inst in updated.iter_mut() {
                if remaining <= Decimal::ZERO {
                    break;
                }
                if inst.is_settled() {
                    continue;
                }
                let available = inst.unpaid_breakdown().penalty;
                if available <= Decimal::ZERO {
                    continue;
                }
                let absorbed = available.min(remaining);
                waive(inst, absorbed);
                remaining -= absorbed;
                applications.push(WaiverApplication {
                    installment_number: inst.installment_number,
                    waived: absorbed,
                });
            }
            if remaining > Decimal::ZERO {
                return Err(LedgerError::InvalidWaiver(format!(
                    "{remaining} of the approved waiver could not be absorbed by unpaid penalties"
                )));
            }
        }
    }

    Ok((updated, applications))
}

/// Evaluate a request against a loan and apply it when auto-approved.
pub fn process_waiver(input: &WaiverInput) -> LedgerResult<ComputationOutput<WaiverOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();
    let loan = &input.loan;
    let request = &input.request;

    loan.validate()?;
    if request.loan_id != loan.loan_id {
        return Err(LedgerError::InvalidWaiver(format!(
            "Request is for loan {} but loan {} was supplied",
            request.loan_id, loan.loan_id
        )));
    }

    let current_penalty_total = outstanding_penalty_total(&loan.installments, request.installment_number)?;
    let decision = evaluate_waiver(request, current_penalty_total)?;

    let (installments, applications) = if decision.auto_approved {
        apply_waiver(&loan.installments, request.installment_number, decision.approved_amount)?
    } else {
        warnings.push(format!(
            "Requested {} exceeds authority limit {}; escalation required",
            request.requested_amount, request.authority_limit
        ));
        (loan.normalized_installments(), Vec::new())
    };

    debug!(
        "loan {}: waiver requested {}, approved {}",
        loan.loan_id, decision.requested_amount, decision.approved_amount
    );

    let outstanding_balance: Money = installments.iter().map(|i| i.outstanding_amount).sum();
    let output = WaiverOutput {
        loan_id: loan.loan_id.clone(),
        decision,
        installments,
        applications,
        outstanding_balance,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Penalty Waiver: authority-limit evaluation, oldest-first distribution",
        &serde_json::json!({
            "loan_id": loan.loan_id,
            "installment_number": request.installment_number,
            "requested_amount": request.requested_amount.to_string(),
            "authority_limit": request.authority_limit.to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}

fn waive(inst: &mut Installment, amount: Money) {
    inst.penalty_waived_amount += amount;
    inst.refresh_totals();
    if inst.is_settled() {
        inst.status = InstallmentStatus::Paid;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn inst(number: u32, penalty: Money) -> Installment {
        let mut i = Installment::scheduled(
            number,
            NaiveDate::from_ymd_opt(2024, number, 1).unwrap(),
            dec!(1000),
            dec!(0),
            dec!(0),
        );
        i.penalty_amount = penalty;
        i.refresh_totals();
        i
    }

    fn request(amount: Money, limit: Money) -> WaiverRequest {
        WaiverRequest {
            loan_id: "LN-9".into(),
            installment_number: None,
            requested_amount: amount,
            authority_limit: limit,
        }
    }

    #[test]
    fn test_authority_limit_boundary() {
        let at_limit = evaluate_waiver(&request(dec!(500), dec!(500)), dec!(800)).unwrap();
        assert!(at_limit.auto_approved);
        assert_eq!(at_limit.approved_amount, dec!(500));

        let over = evaluate_waiver(&request(dec!(501), dec!(500)), dec!(800)).unwrap();
        assert!(!over.auto_approved);
        assert_eq!(over.approved_amount, Decimal::ZERO);
    }

    #[test]
    fn test_request_above_penalty_total_rejected() {
        let err = evaluate_waiver(&request(dec!(100), dec!(500)), dec!(99.99)).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidWaiver(_)));
        assert!(evaluate_waiver(&request(dec!(0), dec!(500)), dec!(50)).is_err());
    }

    #[test]
    fn test_targeted_waiver() {
        let s = vec![inst(1, dec!(30)), inst(2, dec!(40))];
        let (updated, apps) = apply_waiver(&s, Some(2), dec!(25)).unwrap();
        assert_eq!(updated[1].penalty_waived_amount, dec!(25));
        assert_eq!(updated[1].penalty_amount, dec!(40));
        assert_eq!(updated[1].net_penalty(), dec!(15));
        assert_eq!(updated[1].outstanding_amount, dec!(1015));
        assert_eq!(updated[0].penalty_waived_amount, Decimal::ZERO);
        assert_eq!(apps.len(), 1);

        assert!(apply_waiver(&s, Some(2), dec!(41)).is_err());
        assert!(apply_waiver(&s, Some(5), dec!(1)).is_err());
    }

    #[test]
    fn test_loan_wide_waiver_oldest_first() {
        let s = vec![inst(1, dec!(30)), inst(2, Decimal::ZERO), inst(3, dec!(40))];
        let (updated, apps) = apply_waiver(&s, None, dec!(50)).unwrap();
        assert_eq!(updated[0].penalty_waived_amount, dec!(30));
        assert_eq!(updated[1].penalty_waived_amount, Decimal::ZERO);
        assert_eq!(updated[2].penalty_waived_amount, dec!(20));
        assert_eq!(
            apps,
            vec![
                WaiverApplication { installment_number: 1, waived: dec!(30) },
                WaiverApplication { installment_number: 3, waived: dec!(20) },
            ]
        );
    }

    #[test]
    fn test_paid_penalty_not_waivable() {
        let mut s = vec![inst(1, dec!(30))];
        s[0].record_payment(dec!(30));
        assert_eq!(outstanding_penalty_total(&s, None).unwrap(), Decimal::ZERO);
        assert!(apply_waiver(&s, None, dec!(10)).is_err());
    }

    #[test]
    fn test_penalty_assessed_after_full_payment_is_waivable() {
        let mut s = vec![inst(1, Decimal::ZERO)];
        s[0].record_payment(dec!(1000));
        s[0].penalty_amount = dec!(30);
        s[0].status = InstallmentStatus::Overdue;
        s[0].refresh_totals();
        assert_eq!(s[0].outstanding_amount, dec!(30));
        assert_eq!(outstanding_penalty_total(&s, None).unwrap(), dec!(30));

        let (updated, apps) = apply_waiver(&s, None, dec!(30)).unwrap();
        assert_eq!(apps, vec![WaiverApplication { installment_number: 1, waived: dec!(30) }]);
        assert_eq!(updated[0].outstanding_amount, Decimal::ZERO);
        assert_eq!(updated[0].status, InstallmentStatus::Paid);
    }

    #[test]
    fn test_partially_paid_installment_waives_its_whole_penalty() {
        let mut s = vec![inst(1, Decimal::ZERO), inst(2, Decimal::ZERO)];
        s[0].record_payment(dec!(600));
        s[0].penalty_amount = dec!(12.50);
        s[0].refresh_totals();
        assert_eq!(outstanding_penalty_total(&s, Some(1)).unwrap(), dec!(12.50));

        let (updated, _) = apply_waiver(&s, Some(1), dec!(12.50)).unwrap();
        assert_eq!(updated[0].net_penalty(), Decimal::ZERO);
        assert_eq!(updated[0].outstanding_amount, dec!(400));
        assert_eq!(updated[0].status, InstallmentStatus::Pending);
    }

    #[test]
    fn test_process_waiver_escalates_over_limit() {
        let loan = Loan {
            loan_id: "LN-9".into(),
            principal: dec!(2000),
            disbursement_date: NaiveDate::from_ymd_opt(2023, 12, 1).unwrap(),
            terms: crate::terms::model::LoanTerms::new(
                dec!(2000),
                dec!(0),
                60,
                crate::terms::model::InterestType::Flat,
                crate::terms::model::PaymentFrequency::Monthly,
            ),
            status: crate::ledger::LoanStatus::Active,
            installments: vec![inst(1, dec!(300)), inst(2, dec!(400))],
        };
        let input = WaiverInput {
            loan: loan.clone(),
            request: request(dec!(600), dec!(500)),
        };
        let out = process_waiver(&input).unwrap();
        assert!(!out.result.decision.auto_approved);
        assert!(out.result.applications.is_empty());
        assert_eq!(out.result.outstanding_balance, dec!(2700));

        let input = WaiverInput {
            loan,
            request: request(dec!(450), dec!(500)),
        };
        let out = process_waiver(&input).unwrap();
        assert!(out.result.decision.auto_approved);
        assert_eq!(out.result.outstanding_balance, dec!(2250));
    }

    #[test]
    fn test_process_waiver_loan_mismatch() {
        let loan = Loan {
            loan_id: "OTHER".into(),
            principal: dec!(1000),
            disbursement_date: NaiveDate::from_ymd_opt(2023, 12, 1).unwrap(),
            terms: crate::terms::model::LoanTerms::new(
                dec!(1000),
                dec!(0),
                30,
                crate::terms::model::InterestType::Flat,
                crate::terms::model::PaymentFrequency::Monthly,
            ),
            status: crate::ledger::LoanStatus::Active,
            installments: vec![inst(1, dec!(10))],
        };
        let input = WaiverInput {
            loan,
            request: request(dec!(5), dec!(500)),
        };
        assert!(process_waiver(&input).is_err());
    }
}
