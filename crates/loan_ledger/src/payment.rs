//! Applying a borrower's payment to the loan schedule.
//!
//! Payments settle installments strictly in week order and must match the
//! scheduled amount exactly. There is no partial payment, no overpayment
//! credit and no underpayment.

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::types::{Loan, PaymentOutcome, PaymentReceipt, Rejection};

/// Apply `amount` to the earliest unpaid week of `loan`.
///
/// On acceptance exactly one installment flips to paid and the outstanding
/// amount drops by that installment. Rejections leave `loan` untouched.
///
/// A blank idempotency key counts as no key at all.
///
/// The receipt's `delinquent` field reflects the cached flag as it stands
/// after this call; the caller refreshes it before persisting.
pub fn apply_payment(
    loan: &mut Loan,
    amount: Decimal,
    idempotency_key: Option<&str>,
    paid_on: NaiveDate,
) -> PaymentOutcome {
    let idempotency_key = idempotency_key.filter(|key| !key.trim().is_empty());
    if let Some(key) = idempotency_key {
        if loan
            .payments
            .iter()
            .any(|p| p.idempotency_key.as_deref() == Some(key))
        {
            return PaymentOutcome::Rejected(Rejection::DuplicateRequest {
                key: key.to_string(),
            });
        }
    }

    let Some(index) = loan.payments.iter().position(|p| !p.paid) else {
        return PaymentOutcome::Rejected(Rejection::AlreadySettled);
    };

    let expected = loan.payments[index].amount;
    if amount != expected {
        return PaymentOutcome::Rejected(Rejection::WrongAmount {
            expected,
            submitted: amount,
        });
    }

    let installment = &mut loan.payments[index];
    installment.paid = true;
    installment.paid_on = Some(paid_on);
    installment.idempotency_key = idempotency_key.map(str::to_string);
    let week = installment.week;

    // Rounded installments may overshoot the total by a few cents.
    loan.outstanding_amount = (loan.outstanding_amount - expected).max(Decimal::ZERO);
    if index + 1 == loan.payments.len() {
        loan.outstanding_amount = Decimal::ZERO;
    }

    PaymentOutcome::Accepted(PaymentReceipt {
        loan_id: loan.loan_id.clone(),
        week,
        amount: expected,
        outstanding_amount: loan.outstanding_amount,
        delinquent: loan.delinquent,
    })
}
