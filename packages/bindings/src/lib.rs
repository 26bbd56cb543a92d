use napi::Result as NapiResult;
use napi_derive::napi;
use serde::Deserialize;

use loan_ledger_core::LedgerConfig;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Engine configuration from an optional JSON document, defaults otherwise.
fn parse_config(config_json: Option<String>) -> NapiResult<LedgerConfig> {
    let config: LedgerConfig = match config_json {
        Some(json) => serde_json::from_str(&json).map_err(to_napi_error)?,
        None => LedgerConfig::default(),
    };
    config.validate().map_err(to_napi_error)?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Terms & schedule
// ---------------------------------------------------------------------------

#[napi]
pub fn quote_terms(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let config = parse_config(config_json)?;
    let input: loan_ledger_core::LoanTerms =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = loan_ledger_core::terms::calculator::quote_terms(&input, &config.period_days)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn generate_schedule(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let config = parse_config(config_json)?;
    let input: loan_ledger_core::schedule::generator::ScheduleInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        loan_ledger_core::schedule::generator::build_schedule(&input, &config.period_days)
            .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Servicing
// ---------------------------------------------------------------------------

#[napi]
pub fn apply_payment(input_json: String) -> NapiResult<String> {
    let input: loan_ledger_core::servicing::allocation::AllocationInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = loan_ledger_core::servicing::allocation::apply_payment(
        &input.loan,
        &input.payment,
        &input.policy,
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn reverse_allocation(input_json: String) -> NapiResult<String> {
    let input: loan_ledger_core::servicing::allocation::ReversalInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let installments = loan_ledger_core::servicing::allocation::reverse_allocation(
        &input.installments,
        &input.allocations,
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&installments).map_err(to_napi_error)
}

#[napi]
pub fn assess_overdue(input_json: String) -> NapiResult<String> {
    let input: loan_ledger_core::servicing::penalty::AssessmentInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = loan_ledger_core::servicing::penalty::assess_overdue(&input.loan, input.as_of)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn calculate_penalty(input_json: String) -> NapiResult<String> {
    let input: loan_ledger_core::servicing::penalty::PenaltyInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        loan_ledger_core::servicing::penalty::calculate_penalty(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[derive(Deserialize)]
struct EvaluateWaiverInput {
    request: loan_ledger_core::servicing::waiver::WaiverRequest,
    current_penalty_total: rust_decimal::Decimal,
}

#[napi]
pub fn evaluate_waiver(input_json: String) -> NapiResult<String> {
    let input: EvaluateWaiverInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let decision = loan_ledger_core::servicing::waiver::evaluate_waiver(
        &input.request,
        input.current_penalty_total,
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&decision).map_err(to_napi_error)
}

#[derive(Deserialize)]
struct ApplyWaiverInput {
    installments: Vec<loan_ledger_core::Installment>,
    #[serde(default)]
    installment_number: Option<u32>,
    approved_amount: rust_decimal::Decimal,
}

#[napi]
pub fn apply_waiver(input_json: String) -> NapiResult<String> {
    let input: ApplyWaiverInput = serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let (installments, applications) = loan_ledger_core::servicing::waiver::apply_waiver(
        &input.installments,
        input.installment_number,
        input.approved_amount,
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&serde_json::json!({
        "installments": installments,
        "applications": applications,
    }))
    .map_err(to_napi_error)
}

#[napi]
pub fn process_waiver(input_json: String) -> NapiResult<String> {
    let input: loan_ledger_core::servicing::waiver::WaiverInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        loan_ledger_core::servicing::waiver::process_waiver(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Restructuring
// ---------------------------------------------------------------------------

#[napi]
pub fn recalculate_loan(input_json: String, config_json: Option<String>) -> NapiResult<String> {
    let config = parse_config(config_json)?;
    let input: loan_ledger_core::restructuring::modification::ModificationInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = loan_ledger_core::restructuring::modification::recalculate(
        &input.loan,
        &input.modification,
        &config.period_days,
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Settlement
// ---------------------------------------------------------------------------

#[napi]
pub fn early_payoff(input_json: String) -> NapiResult<String> {
    let input: loan_ledger_core::settlement::payoff::PayoffInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        loan_ledger_core::settlement::payoff::quote_early_payoff(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn loan_payoff(input_json: String) -> NapiResult<String> {
    let input: loan_ledger_core::settlement::payoff::LoanPayoffInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = loan_ledger_core::settlement::payoff::quote_loan_payoff(
        &input.loan,
        input.discount_percent,
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn assess_affordability(input_json: String) -> NapiResult<String> {
    let input: loan_ledger_core::settlement::affordability::AffordabilityInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = loan_ledger_core::settlement::affordability::assess_affordability(&input)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}
