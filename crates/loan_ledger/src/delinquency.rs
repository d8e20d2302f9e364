//! Delinquency evaluation.
//!
//! A loan is delinquent when the two most recent elapsed weeks are both
//! unpaid. Weeks whose due date lies in the future are ignored, so a freshly
//! originated loan is never delinquent.

use chrono::NaiveDate;
use tracing::debug;

use crate::types::{Loan, Payment};

/// Consecutive unpaid elapsed weeks at the tail that make a loan delinquent.
pub const MISSED_WEEKS_THRESHOLD: usize = 2;

/// Pure evaluation over a week-ordered payment history.
pub fn is_delinquent(payments: &[Payment], as_of: NaiveDate) -> bool {
    let mut unpaid_weeks = 0;
    for payment in payments.iter().rev().filter(|p| p.is_elapsed(as_of)) {
        if payment.paid {
            break;
        }
        unpaid_weeks += 1;
        if unpaid_weeks >= MISSED_WEEKS_THRESHOLD {
            return true;
        }
    }
    false
}

/// Recompute the cached flag on `loan`. Returns `true` when it changed.
pub fn refresh(loan: &mut Loan, as_of: NaiveDate) -> bool {
    let delinquent = is_delinquent(&loan.payments, as_of);
    let changed = loan.delinquent != delinquent;
    if changed {
        debug!(
            loan_id = %loan.loan_id,
            delinquent,
            "delinquency flag changed"
        );
    }
    loan.delinquent = delinquent;
    changed
}
