use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

use crate::error::LedgerError;
use crate::types::{round_money, Money, Rate, DAYS_IN_YEAR};
use crate::LedgerResult;

const CONVERGENCE_THRESHOLD: Decimal = dec!(0.0000001);
const MAX_IRR_ITERATIONS: u32 = 100;

/// `base ^ exponent`, exact for whole exponents.
pub fn checked_power(base: Decimal, exponent: Decimal, context: &str) -> LedgerResult<Decimal> {
    let result = if exponent.fract().is_zero() {
        exponent
            .to_i64()
            .and_then(|e| base.checked_powi(e))
    } else {
        base.checked_powd(exponent)
    };
    result.ok_or_else(|| LedgerError::input(context, "Growth factor overflowed"))
}

/// Compound growth factor over `days` at an annual rate: `(1 + rate)^(days/365)`.
pub fn compound_factor(annual_rate: Rate, days: u32, context: &str) -> LedgerResult<Decimal> {
    let years = Decimal::from(days) / DAYS_IN_YEAR;
    checked_power(Decimal::ONE + annual_rate, years, context)
}

/// Level payment that amortizes `principal` over `periods` at `period_rate`,
/// rounded to cents. A zero rate degrades to straight-line repayment.
pub fn level_payment(principal: Money, period_rate: Rate, periods: u32) -> LedgerResult<Money> {
    if periods == 0 {
        return Err(LedgerError::terms("periods", "Number of periods must be > 0"));
    }

    let n = Decimal::from(periods);
    if period_rate.is_zero() {
        return Ok(round_money(principal / n));
    }

    let factor = checked_power(Decimal::ONE + period_rate, n, "period_rate")?;
    let annuity_factor = factor - Decimal::ONE;

    if annuity_factor.is_zero() {
        return Err(LedgerError::DivisionByZero {
            context: "level payment annuity factor".into(),
        });
    }

    Ok(round_money(principal * period_rate * factor / annuity_factor))
}

/// Extended IRR for irregular cash flow dates using Newton-Raphson.
/// Year fractions use a 365-day basis to match the loan day count.
pub fn xirr(dated_flows: &[(NaiveDate, Money)], guess: Rate) -> LedgerResult<Rate> {
    if dated_flows.len() < 2 {
        return Err(LedgerError::input(
            "cash_flows",
            "XIRR requires at least 2 cash flows",
        ));
    }

    let base_date = dated_flows[0].0;
    let mut rate = guess;

    for i in 0..MAX_IRR_ITERATIONS {
        let mut npv_val = Decimal::ZERO;
        let mut dnpv = Decimal::ZERO;
        let one_plus_r = Decimal::ONE + rate;

        if one_plus_r <= Decimal::ZERO {
            return Err(LedgerError::ConvergenceFailure {
                function: "XIRR".into(),
                iterations: i,
                last_delta: npv_val,
            });
        }

        for (date, amount) in dated_flows {
            let days = (*date - base_date).num_days();
            let years = Decimal::from(days) / DAYS_IN_YEAR;

            let discount = match one_plus_r.checked_powd(years) {
                Some(d) if !d.is_zero() => d,
                _ => continue,
            };

            npv_val += amount / discount;
            dnpv -= years * amount / (one_plus_r * discount);
        }

        if npv_val.abs() < CONVERGENCE_THRESHOLD {
            return Ok(rate);
        }

        if dnpv.is_zero() {
            return Err(LedgerError::ConvergenceFailure {
                function: "XIRR".into(),
                iterations: i,
                last_delta: npv_val,
            });
        }

        rate -= npv_val / dnpv;

        if rate < dec!(-0.99) {
            rate = dec!(-0.99);
        } else if rate > dec!(100.0) {
            rate = dec!(100.0);
        }
    }

    Err(LedgerError::ConvergenceFailure {
        function: "XIRR".into(),
        iterations: MAX_IRR_ITERATIONS,
        last_delta: Decimal::ZERO,
    })
}
