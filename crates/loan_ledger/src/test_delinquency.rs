use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal_macros::dec;

use crate::{FixedClock, InMemoryGateway, LoanGateway, LoanLedger, LoanTerms, PaymentOutcome};

fn setup() -> (Arc<FixedClock>, LoanLedger<InMemoryGateway>) {
    let clock = Arc::new(FixedClock::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
    ));
    let ledger = LoanLedger::with_clock(InMemoryGateway::new(), clock.clone());
    (clock, ledger)
}

async fn originate(ledger: &LoanLedger<InMemoryGateway>, weeks: u32) -> String {
    ledger
        .create_loan(LoanTerms {
            borrower_id: "borrower-1".to_string(),
            principal_amount: dec!(1000),
            interest_rate: dec!(0.1),
            term_weeks: weeks,
        })
        .await
        .unwrap()
        .loan_id
}

#[tokio::test]
async fn test_fresh_loan_is_not_delinquent() {
    let (_clock, ledger) = setup();
    let id = originate(&ledger, 10).await;

    assert!(!ledger.delinquency(&id).await.unwrap());
}

#[tokio::test]
async fn test_one_missed_week_is_not_delinquent() {
    let (clock, ledger) = setup();
    let id = originate(&ledger, 10).await;

    clock.advance_weeks(1);
    assert!(!ledger.delinquency(&id).await.unwrap());
}

#[tokio::test]
async fn test_two_missed_weeks_flag_and_persist() {
    let (clock, ledger) = setup();
    let id = originate(&ledger, 10).await;

    clock.advance_weeks(2);
    assert!(ledger.delinquency(&id).await.unwrap());

    let stored = ledger.gateway().find_loan(&id).await.unwrap().unwrap();
    assert!(stored.delinquent);
}

#[tokio::test]
async fn test_reference_scenario() {
    let (clock, ledger) = setup();
    let id = originate(&ledger, 10).await;

    // week 1 paid on time
    clock.advance_weeks(1);
    let outcome = ledger.submit_payment(&id, dec!(110.0), None).await.unwrap();
    let PaymentOutcome::Accepted(receipt) = outcome else {
        panic!("expected acceptance");
    };
    assert_eq!(receipt.outstanding_amount, dec!(990.0));
    assert!(!receipt.delinquent);
    assert!(!ledger.delinquency(&id).await.unwrap());

    // weeks 2 and 3 pass without payment
    clock.advance_weeks(2);
    assert!(ledger.delinquency(&id).await.unwrap());

    // paying the next due week (2) leaves week 3 as the only trailing gap
    let outcome = ledger.submit_payment(&id, dec!(110.0), None).await.unwrap();
    let PaymentOutcome::Accepted(receipt) = outcome else {
        panic!("expected acceptance");
    };
    assert_eq!(receipt.week, 2);
    assert!(!receipt.delinquent);
    assert!(!ledger.delinquency(&id).await.unwrap());
    assert!(!ledger.loan(&id).await.unwrap().delinquent);
}

#[tokio::test]
async fn test_catching_up_one_week_keeps_flag_when_two_still_missed() {
    let (clock, ledger) = setup();
    let id = originate(&ledger, 10).await;

    // weeks 1..=4 elapsed, none paid
    clock.advance_weeks(4);
    assert!(ledger.delinquency(&id).await.unwrap());

    // paying week 1 still leaves weeks 3 and 4 unpaid at the tail
    let outcome = ledger.submit_payment(&id, dec!(110), None).await.unwrap();
    let PaymentOutcome::Accepted(receipt) = outcome else {
        panic!("expected acceptance");
    };
    assert_eq!(receipt.week, 1);
    assert!(receipt.delinquent);
}

#[tokio::test]
async fn test_prepaying_keeps_loan_current() {
    let (clock, ledger) = setup();
    let id = originate(&ledger, 4).await;

    for _ in 0..4 {
        assert!(ledger
            .submit_payment(&id, dec!(275), None)
            .await
            .unwrap()
            .is_accepted());
    }
    clock.advance_weeks(10);
    assert!(!ledger.delinquency(&id).await.unwrap());
}
