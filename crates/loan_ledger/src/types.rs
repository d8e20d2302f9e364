//! # Types
//!
//! Shared data structures used across all modules of the loan ledger.
//!
//! ## Design decisions
//!
//! ### Terms / Loan split
//!
//! A loan starts life as [`LoanTerms`] supplied by the caller. The schedule
//! generator turns validated terms into a [`NewLoan`], which carries the full
//! installment plan but no identifier yet. Only the persistence gateway hands
//! out identifiers, so a [`Loan`] always has one.
//!
//! ### Installment lifecycle
//!
//! A [`Payment`] moves forward only:
//!
//! ```text
//! unpaid ──► paid
//! ```
//!
//! There is no reversal. The loan's `outstanding_amount` and `delinquent`
//! fields change only as a side effect of payment application or a
//! delinquency refresh.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Caller-supplied terms of a new loan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanTerms {
    pub borrower_id: String,
    pub principal_amount: Decimal,
    /// Flat interest as a fraction, e.g. `0.1` for 10%.
    pub interest_rate: Decimal,
    pub term_weeks: u32,
}

/// One scheduled weekly installment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// Back-reference to the owning loan (lookup only).
    pub loan_id: String,
    /// 1-based week number, unique per loan.
    pub week: u32,
    /// Fixed at schedule creation to the loan's weekly payment amount.
    pub amount: Decimal,
    pub due_on: NaiveDate,
    pub paid: bool,
    pub paid_on: Option<NaiveDate>,
    /// Request key that settled this installment, if the caller sent one.
    pub idempotency_key: Option<String>,
}

impl Payment {
    /// A week counts towards delinquency once its due date has arrived.
    pub fn is_elapsed(&self, as_of: NaiveDate) -> bool {
        self.due_on <= as_of
    }
}

/// A loan that has been validated and scheduled but not yet stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewLoan {
    pub borrower_id: String,
    pub principal_amount: Decimal,
    pub interest_rate: Decimal,
    pub term_weeks: u32,
    pub total_payable: Decimal,
    pub weekly_payment_amount: Decimal,
    pub originated_on: NaiveDate,
    /// Installments in week order, all unpaid, `loan_id` still empty.
    pub payments: Vec<Payment>,
}

impl NewLoan {
    /// Stamp the gateway-assigned identifier onto the loan and its schedule.
    pub fn into_loan(self, loan_id: String) -> Loan {
        let payments = self
            .payments
            .into_iter()
            .map(|p| Payment {
                loan_id: loan_id.clone(),
                ..p
            })
            .collect();

        Loan {
            loan_id,
            borrower_id: self.borrower_id,
            principal_amount: self.principal_amount,
            interest_rate: self.interest_rate,
            term_weeks: self.term_weeks,
            total_payable: self.total_payable,
            weekly_payment_amount: self.weekly_payment_amount,
            outstanding_amount: self.total_payable,
            delinquent: false,
            originated_on: self.originated_on,
            payments,
        }
    }
}

/// A stored loan together with its full repayment schedule.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    /// Sequential identifier ("1", "2", ...) assigned by the gateway.
    pub loan_id: String,
    pub borrower_id: String,
    pub principal_amount: Decimal,
    pub interest_rate: Decimal,
    pub term_weeks: u32,
    /// `principal × (1 + rate)`.
    pub total_payable: Decimal,
    pub weekly_payment_amount: Decimal,
    pub outstanding_amount: Decimal,
    /// Cached result of the last delinquency evaluation.
    pub delinquent: bool,
    pub originated_on: NaiveDate,
    /// Installments ordered by week.
    pub payments: Vec<Payment>,
}

impl Loan {
    /// Earliest unpaid installment, scanning from week 1.
    pub fn next_unpaid(&self) -> Option<&Payment> {
        self.payments.iter().find(|p| !p.paid)
    }

    pub fn is_settled(&self) -> bool {
        self.next_unpaid().is_none()
    }

    pub fn paid_weeks(&self) -> usize {
        self.payments.iter().filter(|p| p.paid).count()
    }
}

/// Result of an accepted payment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    pub loan_id: String,
    /// The week that was marked paid.
    pub week: u32,
    pub amount: Decimal,
    pub outstanding_amount: Decimal,
    pub delinquent: bool,
}

/// Why a payment was turned away. None of these mutate the loan.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    /// Amount differs from the next installment; no partial or over-payments.
    WrongAmount {
        expected: Decimal,
        submitted: Decimal,
    },
    /// Every installment is already paid.
    AlreadySettled,
    /// The idempotency key already settled an installment of this loan.
    DuplicateRequest { key: String },
}

/// Outcome of submitting a payment. Rejections are ordinary business results,
/// not errors.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentOutcome {
    Accepted(PaymentReceipt),
    Rejected(Rejection),
}

impl PaymentOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}
