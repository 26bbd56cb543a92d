//! Loan amortization and repayment ledger engine.
//!
//! Every operation is a pure function over the records passed in. The engine
//! holds no state, performs no I/O and never reads a clock for business
//! dates. Callers must serialize payment allocation and schedule
//! recalculation per loan: each call reads the supplied state and returns the
//! next one, with no compare-and-swap of its own.

pub mod config;
pub mod error;
pub mod ledger;
pub mod schedule;
pub mod terms;
pub mod time_value;
pub mod types;

#[cfg(feature = "servicing")]
pub mod servicing;

#[cfg(feature = "restructuring")]
pub mod restructuring;

#[cfg(feature = "settlement")]
pub mod settlement;

pub use config::{AllocationPolicy, LedgerConfig, PeriodTable};
pub use error::LedgerError;
pub use ledger::{Installment, InstallmentStatus, Loan, LoanStatus, Payment};
pub use terms::model::{
    FeeCollection, InterestType, LoanTerms, Milestone, MilestoneShare, PaymentFrequency,
    ScheduleType,
};
pub use types::*;

/// Standard result type for all ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;
