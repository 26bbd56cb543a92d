use chrono::NaiveDate;
use loan_ledger_core::schedule::generator::{build_schedule, generate_schedule, ScheduleInput};
use loan_ledger_core::schedule::integrity::verify_schedule;
use loan_ledger_core::terms::calculator::quote_terms;
use loan_ledger_core::{
    FeeCollection, InterestType, LoanTerms, Milestone, MilestoneShare, PaymentFrequency,
    PeriodTable, ScheduleType,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn disbursed() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

// ===========================================================================
// Terms quotes
// ===========================================================================

#[test]
fn test_flat_quote_with_upfront_fees() {
    let mut terms = LoanTerms::new(
        dec!(12000),
        dec!(18),
        365,
        InterestType::Flat,
        PaymentFrequency::Monthly,
    );
    terms.processing_fee_percent = dec!(2);
    terms.platform_fee_per_period = dec!(10);

    let out = quote_terms(&terms, &PeriodTable::default()).unwrap();
    let q = &out.result;

    assert_eq!(q.total_interest, dec!(2160));
    assert_eq!(q.processing_fee, dec!(240));
    assert_eq!(q.number_of_periods, 12);
    assert_eq!(q.platform_fee_total, dec!(120));
    assert_eq!(q.net_proceeds, dec!(11640));
    assert_eq!(out.metadata.precision, "rust_decimal_128bit_2dp_half_up");
}

#[test]
fn test_quote_rejects_invalid_terms() {
    let terms = LoanTerms::new(
        Decimal::ZERO,
        dec!(12),
        360,
        InterestType::Reducing,
        PaymentFrequency::Monthly,
    );
    assert!(quote_terms(&terms, &PeriodTable::default()).is_err());
}

// ===========================================================================
// Schedules
// ===========================================================================

#[test]
fn test_every_frequency_repays_principal_exactly() {
    let frequencies = [
        PaymentFrequency::Daily,
        PaymentFrequency::Weekly,
        PaymentFrequency::Biweekly,
        PaymentFrequency::Monthly,
        PaymentFrequency::Quarterly,
    ];
    for interest_type in [InterestType::Flat, InterestType::Reducing, InterestType::Compound] {
        for freq in frequencies {
            let terms = LoanTerms::new(dec!(9999.99), dec!(21), 200, interest_type, freq);
            let s = generate_schedule(&terms, disbursed(), &PeriodTable::default()).unwrap();
            verify_schedule(&s, terms.principal).unwrap();
            let last = s.last().unwrap();
            assert_eq!(
                last.due_date,
                NaiveDate::from_ymd_opt(2024, 7, 19).unwrap(),
                "{interest_type} {freq}"
            );
        }
    }
}

#[test]
fn test_custom_period_table_changes_installment_count() {
    let terms = LoanTerms::new(
        dec!(5000),
        dec!(10),
        364,
        InterestType::Reducing,
        PaymentFrequency::Monthly,
    );
    let table = PeriodTable {
        monthly: 28,
        ..PeriodTable::default()
    };
    let s = generate_schedule(&terms, disbursed(), &table).unwrap();
    assert_eq!(s.len(), 13);
    assert_eq!(s[0].due_date, NaiveDate::from_ymd_opt(2024, 1, 29).unwrap());
}

#[test]
fn test_per_installment_fees_appear_on_every_row() {
    let mut terms = LoanTerms::new(
        dec!(3000),
        dec!(12),
        90,
        InterestType::Flat,
        PaymentFrequency::Monthly,
    );
    terms.platform_fee_per_period = dec!(25);
    terms.fee_collection = FeeCollection::PerInstallment;

    let out = build_schedule(
        &ScheduleInput {
            terms,
            disbursement_date: disbursed(),
        },
        &PeriodTable::default(),
    )
    .unwrap()
    .result;

    assert!(out.installments.iter().all(|i| i.fees_due == dec!(25)));
    assert_eq!(out.summary.total_fees, dec!(75));
    assert_eq!(out.summary.total_principal, dec!(3000));
}

#[test]
fn test_flexible_milestones_follow_requested_dates() {
    let mut terms = LoanTerms::new(
        dec!(6000),
        dec!(12),
        90,
        InterestType::Reducing,
        PaymentFrequency::Monthly,
    );
    terms.schedule_type = ScheduleType::Flexible;
    terms.milestones = vec![
        Milestone {
            days_from_disbursement: 15,
            share: MilestoneShare::Amount(dec!(1000)),
        },
        Milestone {
            days_from_disbursement: 45,
            share: MilestoneShare::Percentage(dec!(50)),
        },
        Milestone {
            days_from_disbursement: 90,
            share: MilestoneShare::Percentage(dec!(100)),
        },
    ];

    let s = generate_schedule(&terms, disbursed(), &PeriodTable::default()).unwrap();
    assert_eq!(s.len(), 3);
    assert_eq!(s[0].principal_due, dec!(1000));
    assert_eq!(s[1].principal_due, dec!(2500));
    assert_eq!(s[2].principal_due, dec!(2500));
    assert_eq!(s[1].due_date, NaiveDate::from_ymd_opt(2024, 2, 15).unwrap());
}

#[test]
fn test_flexible_rejects_milestone_past_term() {
    let mut terms = LoanTerms::new(
        dec!(6000),
        dec!(12),
        90,
        InterestType::Reducing,
        PaymentFrequency::Monthly,
    );
    terms.schedule_type = ScheduleType::Flexible;
    terms.milestones = vec![Milestone {
        days_from_disbursement: 91,
        share: MilestoneShare::Percentage(dec!(100)),
    }];
    assert!(generate_schedule(&terms, disbursed(), &PeriodTable::default()).is_err());
}
