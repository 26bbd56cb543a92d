//! Engine configuration threaded explicitly through calls.
//!
//! Nothing here is global: callers build a [`LedgerConfig`] (or take the
//! defaults) and pass the relevant piece into each operation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::terms::model::PaymentFrequency;
use crate::types::Money;
use crate::LedgerResult;

/// Days per installment period for each payment frequency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodTable {
    pub daily: u32,
    pub weekly: u32,
    pub biweekly: u32,
    pub monthly: u32,
    pub quarterly: u32,
}

impl Default for PeriodTable {
    fn default() -> Self {
        PeriodTable {
            daily: 1,
            weekly: 7,
            biweekly: 14,
            monthly: 30,
            quarterly: 90,
        }
    }
}

impl PeriodTable {
    pub fn days(&self, frequency: PaymentFrequency) -> u32 {
        match frequency {
            PaymentFrequency::Daily => self.daily,
            PaymentFrequency::Weekly => self.weekly,
            PaymentFrequency::Biweekly => self.biweekly,
            PaymentFrequency::Monthly => self.monthly,
            PaymentFrequency::Quarterly => self.quarterly,
        }
    }

    pub fn validate(&self) -> LedgerResult<()> {
        let entries = [
            ("period_days.daily", self.daily),
            ("period_days.weekly", self.weekly),
            ("period_days.biweekly", self.biweekly),
            ("period_days.monthly", self.monthly),
            ("period_days.quarterly", self.quarterly),
        ];
        for (field, days) in entries {
            if days == 0 {
                return Err(LedgerError::input(field, "Period length must be at least 1 day"));
            }
        }
        Ok(())
    }
}

/// Rules for accepting a payment against a loan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationPolicy {
    /// Amount a payment may exceed the outstanding balance by and still be
    /// accepted; the excess is reported back unallocated.
    pub overpayment_tolerance: Money,
    /// Accept any overpayment, reporting the excess as a credit for the
    /// caller to handle.
    pub allow_credit: bool,
}

impl AllocationPolicy {
    pub fn validate(&self) -> LedgerResult<()> {
        if self.overpayment_tolerance < Decimal::ZERO {
            return Err(LedgerError::input(
                "overpayment_tolerance",
                "Tolerance cannot be negative",
            ));
        }
        Ok(())
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub period_days: PeriodTable,
    pub allocation: AllocationPolicy,
}

impl LedgerConfig {
    pub fn validate(&self) -> LedgerResult<()> {
        self.period_days.validate()?;
        self.allocation.validate()
    }
}
