use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::types::{pct_to_rate, round_money, with_metadata, ComputationOutput, Money, Percent};
use crate::{LedgerError, LedgerResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffordabilityInput {
    pub monthly_income: Money,
    pub monthly_payment: Money,
    #[serde(default)]
    pub existing_monthly_debt: Money,
    pub max_dti_percent: Percent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffordabilityResult {
    /// Debt-to-income as a percentage, 2dp.
    pub dti_ratio: Percent,
    pub is_affordable: bool,
    pub max_affordable_payment: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffordabilityOutput {
    pub dti_ratio: Percent,
    pub is_affordable: bool,
    pub max_affordable_payment: Money,
    /// Room left under the cap after the proposed payment; negative when over.
    pub headroom: Money,
}

/// Debt-to-income check of a single payment against a DTI cap.
pub fn affordability(
    monthly_income: Money,
    monthly_payment: Money,
    max_dti_percent: Percent,
) -> LedgerResult<AffordabilityResult> {
    if monthly_income <= Decimal::ZERO {
        return Err(LedgerError::input(
            "monthly_income",
            "Monthly income must be positive",
        ));
    }
    if monthly_payment < Decimal::ZERO {
        return Err(LedgerError::input(
            "monthly_payment",
            "Monthly payment cannot be negative",
        ));
    }
    if max_dti_percent < Decimal::ZERO {
        return Err(LedgerError::input(
            "max_dti_percent",
            "DTI cap cannot be negative",
        ));
    }

    // Decided on the exact ratio; only the reported figure is rounded.
    let exact_dti = monthly_payment / monthly_income * Decimal::ONE_HUNDRED;
    Ok(AffordabilityResult {
        dti_ratio: round_money(exact_dti),
        is_affordable: exact_dti <= max_dti_percent,
        max_affordable_payment: round_money(monthly_income * pct_to_rate(max_dti_percent)),
    })
}

/// Affordability including existing monthly obligations.
pub fn assess_affordability(
    input: &AffordabilityInput,
) -> LedgerResult<ComputationOutput<AffordabilityOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.existing_monthly_debt < Decimal::ZERO {
        return Err(LedgerError::input(
            "existing_monthly_debt",
            "Existing debt cannot be negative",
        ));
    }

    let total_debt = input.monthly_payment + input.existing_monthly_debt;
    let base = affordability(input.monthly_income, total_debt, input.max_dti_percent)?;
    let max_affordable_payment =
        (base.max_affordable_payment - input.existing_monthly_debt).max(Decimal::ZERO);
    let headroom = base.max_affordable_payment - total_debt;

    if input.existing_monthly_debt >= base.max_affordable_payment {
        warnings.push("Existing debt already consumes the full DTI allowance".into());
    }

    let output = AffordabilityOutput {
        dti_ratio: base.dti_ratio,
        is_affordable: base.is_affordable,
        max_affordable_payment,
        headroom,
    };

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Affordability: (payment + existing debt) / income against DTI cap",
        &serde_json::json!({
            "max_dti_percent": input.max_dti_percent.to_string(),
            "existing_monthly_debt": input.existing_monthly_debt.to_string(),
        }),
        warnings,
        elapsed,
        output,
    ))
}
