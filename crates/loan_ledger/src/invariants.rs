#![allow(dead_code)]

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::Loan;

/// Week numbers run 1..=term_weeks with no gaps or duplicates.
pub fn assert_weeks_contiguous(loan: &Loan) {
    assert_eq!(
        loan.payments.len(),
        loan.term_weeks as usize,
        "loan {} has {} installments for a {}-week term",
        loan.loan_id,
        loan.payments.len(),
        loan.term_weeks
    );
    for (i, payment) in loan.payments.iter().enumerate() {
        assert_eq!(
            payment.week,
            i as u32 + 1,
            "loan {}: installment at position {} has week {}",
            loan.loan_id,
            i,
            payment.week
        );
        assert_eq!(payment.loan_id, loan.loan_id);
    }
}

/// Installments add up to the total payable within half a cent per week.
pub fn assert_schedule_sums_to_total(loan: &Loan) {
    let sum: Decimal = loan.payments.iter().map(|p| p.amount).sum();
    let tolerance = dec!(0.005) * Decimal::from(loan.term_weeks);
    assert!(
        (sum - loan.total_payable).abs() <= tolerance,
        "loan {}: installments sum to {} but total payable is {}",
        loan.loan_id,
        sum,
        loan.total_payable
    );
}

/// The outstanding amount is never negative.
pub fn assert_outstanding_non_negative(loan: &Loan) {
    assert!(
        loan.outstanding_amount >= Decimal::ZERO,
        "loan {} has negative outstanding amount {}",
        loan.loan_id,
        loan.outstanding_amount
    );
}

/// Paid installments form a prefix of the schedule.
pub fn assert_paid_in_week_order(loan: &Loan) {
    let paid = loan.paid_weeks();
    assert!(
        loan.payments[..paid].iter().all(|p| p.paid),
        "loan {}: paid installments are not a prefix of the schedule",
        loan.loan_id
    );
}

/// Outstanding equals total minus what was paid, or zero once settled.
pub fn assert_outstanding_matches_history(loan: &Loan) {
    if loan.is_settled() {
        assert_eq!(loan.outstanding_amount, Decimal::ZERO);
        return;
    }
    let paid: Decimal = loan.payments.iter().filter(|p| p.paid).map(|p| p.amount).sum();
    let expected = (loan.total_payable - paid).max(Decimal::ZERO);
    assert_eq!(
        loan.outstanding_amount, expected,
        "loan {}: outstanding drifted from payment history",
        loan.loan_id
    );
}

/// Run all stateless loan invariants.
pub fn assert_all_loan_invariants(loan: &Loan) {
    assert_weeks_contiguous(loan);
    assert_schedule_sums_to_total(loan);
    assert_outstanding_non_negative(loan);
    assert_paid_in_week_order(loan);
    assert_outstanding_matches_history(loan);
}
