//! Loan term records: the immutable inputs every calculator starts from.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LedgerError;
use crate::types::{Money, Percent};
use crate::LedgerResult;

/// Longest accepted term, 100 years of 365 days.
pub const MAX_TERM_DAYS: u32 = 36_500;

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// How interest accrues over the life of the loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InterestType {
    /// Charged once on the original principal for the whole term.
    Flat,
    /// Charged on the outstanding balance each period (amortized).
    Reducing,
    /// Annual compounding on the outstanding balance.
    Compound,
}

impl FromStr for InterestType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flat" => Ok(InterestType::Flat),
            "reducing" | "reducing_balance" | "amortized" => Ok(InterestType::Reducing),
            "compound" => Ok(InterestType::Compound),
            other => Err(LedgerError::terms(
                "interest_type",
                format!("unknown interest type '{other}'"),
            )),
        }
    }
}

impl fmt::Display for InterestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InterestType::Flat => "Flat",
            InterestType::Reducing => "Reducing",
            InterestType::Compound => "Compound",
        };
        f.write_str(label)
    }
}

/// Repayment cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentFrequency {
    Daily,
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
}

impl PaymentFrequency {
    /// Nominal number of periods in a year, used to convert an annual rate
    /// into a per-period rate when quoting level installments.
    pub fn periods_per_year(self) -> Decimal {
        match self {
            PaymentFrequency::Daily => Decimal::from(365),
            PaymentFrequency::Weekly => Decimal::from(52),
            PaymentFrequency::Biweekly => Decimal::from(26),
            PaymentFrequency::Monthly => Decimal::from(12),
            PaymentFrequency::Quarterly => Decimal::from(4),
        }
    }
}

impl FromStr for PaymentFrequency {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "daily" => Ok(PaymentFrequency::Daily),
            "weekly" => Ok(PaymentFrequency::Weekly),
            "biweekly" | "fortnightly" => Ok(PaymentFrequency::Biweekly),
            "monthly" => Ok(PaymentFrequency::Monthly),
            "quarterly" => Ok(PaymentFrequency::Quarterly),
            other => Err(LedgerError::terms(
                "payment_frequency",
                format!("unknown payment frequency '{other}'"),
            )),
        }
    }
}

impl fmt::Display for PaymentFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PaymentFrequency::Daily => "Daily",
            PaymentFrequency::Weekly => "Weekly",
            PaymentFrequency::Biweekly => "Biweekly",
            PaymentFrequency::Monthly => "Monthly",
            PaymentFrequency::Quarterly => "Quarterly",
        };
        f.write_str(label)
    }
}

/// Installment layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleType {
    /// Evenly spaced installments at the payment frequency.
    #[default]
    Fixed,
    /// Milestone-driven installments.
    Flexible,
}

/// Where the per-period platform fee is collected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeCollection {
    /// Whole platform fee deducted from proceeds at disbursement.
    #[default]
    Upfront,
    /// Platform fee billed on every installment.
    PerInstallment,
}

/// Principal share settled at a flexible-schedule milestone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MilestoneShare {
    /// Percentage of the principal still outstanding at the milestone.
    Percentage(Percent),
    /// Fixed amount, capped at the principal still outstanding.
    Amount(Money),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub days_from_disbursement: u32,
    pub share: MilestoneShare,
}

// ---------------------------------------------------------------------------
// Loan terms
// ---------------------------------------------------------------------------

/// Immutable contractual terms of a loan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub principal: Money,
    /// Annual interest rate as a percentage (18 = 18%).
    pub annual_rate: Percent,
    pub term_days: u32,
    pub interest_type: InterestType,
    pub payment_frequency: PaymentFrequency,
    /// One-off fee on principal, deducted from proceeds.
    #[serde(default)]
    pub processing_fee_percent: Percent,
    #[serde(default)]
    pub platform_fee_per_period: Money,
    /// Monthly late-penalty rate as a percentage, prorated daily.
    #[serde(default)]
    pub late_penalty_percent: Percent,
    #[serde(default)]
    pub grace_period_days: u32,
    #[serde(default)]
    pub schedule_type: ScheduleType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub milestones: Vec<Milestone>,
    #[serde(default)]
    pub fee_collection: FeeCollection,
}

impl LoanTerms {
    /// Plain fixed-schedule terms with no fees or penalties.
    pub fn new(
        principal: Money,
        annual_rate: Percent,
        term_days: u32,
        interest_type: InterestType,
        payment_frequency: PaymentFrequency,
    ) -> Self {
        LoanTerms {
            principal,
            annual_rate,
            term_days,
            interest_type,
            payment_frequency,
            processing_fee_percent: Decimal::ZERO,
            platform_fee_per_period: Decimal::ZERO,
            late_penalty_percent: Decimal::ZERO,
            grace_period_days: 0,
            schedule_type: ScheduleType::Fixed,
            milestones: Vec::new(),
            fee_collection: FeeCollection::Upfront,
        }
    }

    /// Structural validation shared by every calculator.
    pub fn validate(&self) -> LedgerResult<()> {
        validate_principal(self.principal)?;
        validate_term_days(self.term_days)?;
        validate_percent("annual_rate", self.annual_rate)?;
        validate_percent("processing_fee_percent", self.processing_fee_percent)?;
        validate_percent("late_penalty_percent", self.late_penalty_percent)?;
        if self.platform_fee_per_period < Decimal::ZERO {
            return Err(LedgerError::terms(
                "platform_fee_per_period",
                "Platform fee cannot be negative",
            ));
        }
        if self.schedule_type == ScheduleType::Flexible && !self.milestones.is_empty() {
            validate_milestones(&self.milestones, self.term_days)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

pub(crate) fn validate_principal(principal: Money) -> LedgerResult<()> {
    if principal <= Decimal::ZERO {
        return Err(LedgerError::terms("principal", "Principal must be positive"));
    }
    Ok(())
}

pub(crate) fn validate_term_days(term_days: u32) -> LedgerResult<()> {
    if term_days == 0 {
        return Err(LedgerError::terms("term_days", "Term must be at least 1 day"));
    }
    if term_days > MAX_TERM_DAYS {
        return Err(LedgerError::terms(
            "term_days",
            format!("Term must not exceed {MAX_TERM_DAYS} days"),
        ));
    }
    Ok(())
}

pub(crate) fn validate_percent(field: &str, value: Percent) -> LedgerResult<()> {
    if value < Decimal::ZERO || value > Decimal::ONE_HUNDRED {
        return Err(LedgerError::terms(field, "Must be between 0 and 100 percent"));
    }
    Ok(())
}

/// Milestones must be strictly increasing, start after disbursement and end
/// within the term.
pub(crate) fn validate_milestones(milestones: &[Milestone], term_days: u32) -> LedgerResult<()> {
    let mut previous = 0u32;
    for (idx, m) in milestones.iter().enumerate() {
        if m.days_from_disbursement <= previous {
            return Err(LedgerError::terms(
                "milestones",
                format!(
                    "Milestone {} at day {} must fall after day {}",
                    idx + 1,
                    m.days_from_disbursement,
                    previous
                ),
            ));
        }
        if m.days_from_disbursement > term_days {
            return Err(LedgerError::terms(
                "milestones",
                format!(
                    "Milestone {} at day {} exceeds the {}-day term",
                    idx + 1,
                    m.days_from_disbursement,
                    term_days
                ),
            ));
        }
        match &m.share {
            MilestoneShare::Percentage(p) => {
                if *p <= Decimal::ZERO || *p > Decimal::ONE_HUNDRED {
                    return Err(LedgerError::terms(
                        "milestones",
                        format!("Milestone {} percentage must be in (0, 100]", idx + 1),
                    ));
                }
            }
            MilestoneShare::Amount(a) => {
                if *a <= Decimal::ZERO {
                    return Err(LedgerError::terms(
                        "milestones",
                        format!("Milestone {} amount must be positive", idx + 1),
                    ));
                }
            }
        }
        previous = m.days_from_disbursement;
    }
    Ok(())
}
