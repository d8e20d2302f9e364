//! # Loan Ledger
//!
//! Core of the micro-loan service. A loan is originated with a fixed weekly
//! repayment schedule, payments are matched against that schedule in week
//! order, and delinquency is derived from the payment history.
//!
//! | Phase        | Entry Point(s)                                  |
//! |--------------|-------------------------------------------------|
//! | Origination  | [`LoanLedger::create_loan`]                     |
//! | Repayment    | [`LoanLedger::submit_payment`]                  |
//! | Queries      | `loan`, `outstanding`, `delinquency`, `loan_count` |
//!
//! ## Architecture
//!
//! Schedule generation lives in [`schedule`], payment matching in
//! [`payment`] and delinquency in [`delinquency`]; all three are pure.
//! Storage is reached only through the [`LoanGateway`] trait. This file
//! holds the entry points that tie them together under a per-loan lock.
//!
//! ## Concurrency
//!
//! Each read-modify-write on a loan runs inside that loan's [`LoanLocks`]
//! scope. Exclusion is per process: several processes writing to one store
//! need a transactional gateway to stay correct.
//!
//! ## Retries
//!
//! A payment submitted without an idempotency key is not deduplicated:
//! submitting the same amount twice settles two consecutive weeks. Callers
//! that may retry must send a key.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info};

pub mod clock;
pub mod delinquency;
pub mod errors;
pub mod locks;
pub mod payment;
pub mod schedule;
pub mod storage;
pub mod types;

#[cfg(test)]
mod invariants;
#[cfg(test)]
mod test_delinquency;

pub use clock::{Clock, FixedClock, SystemClock};
pub use errors::{LedgerError, Result};
pub use locks::LoanLocks;
pub use storage::{InMemoryGateway, LoanGateway};
pub use types::{Loan, LoanTerms, NewLoan, Payment, PaymentOutcome, PaymentReceipt, Rejection};

/// Loan lifecycle operations over a persistence gateway.
pub struct LoanLedger<G> {
    gateway: G,
    clock: Arc<dyn Clock>,
    locks: LoanLocks,
}

impl<G: LoanGateway> LoanLedger<G> {
    pub fn new(gateway: G) -> Self {
        Self::with_clock(gateway, Arc::new(SystemClock))
    }

    pub fn with_clock(gateway: G, clock: Arc<dyn Clock>) -> Self {
        Self {
            gateway,
            clock,
            locks: LoanLocks::new(),
        }
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    // ─────────────────────────────────────────────────────────
    // Origination
    // ─────────────────────────────────────────────────────────

    /// Validate the terms, build the schedule and store loan + schedule.
    ///
    /// Nothing is written when validation fails.
    pub async fn create_loan(&self, terms: LoanTerms) -> Result<Loan> {
        let new_loan = schedule::generate(&terms, self.clock.today())?;
        let loan = self.gateway.create(new_loan).await?;
        info!(
            loan_id = %loan.loan_id,
            borrower_id = %loan.borrower_id,
            total_payable = %loan.total_payable,
            weekly = %loan.weekly_payment_amount,
            term_weeks = loan.term_weeks,
            "loan originated"
        );
        Ok(loan)
    }

    // ─────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────

    /// Load a loan with its schedule.
    pub async fn loan(&self, loan_id: &str) -> Result<Loan> {
        self.gateway
            .find_loan(loan_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(loan_id))
    }

    /// The stored outstanding amount, as last written by payment application.
    pub async fn outstanding(&self, loan_id: &str) -> Result<Decimal> {
        Ok(self.loan(loan_id).await?.outstanding_amount)
    }

    /// Evaluate delinquency as of today.
    ///
    /// The value is computed from the payment history on every call; the
    /// stored flag is rewritten only when it is stale.
    pub async fn delinquency(&self, loan_id: &str) -> Result<bool> {
        let _guard = self.locks.acquire(loan_id).await;
        let mut loan = self.loan(loan_id).await?;
        if delinquency::refresh(&mut loan, self.clock.today()) {
            self.gateway.save_loan(&loan).await?;
        }
        Ok(loan.delinquent)
    }

    pub async fn loan_count(&self) -> Result<u64> {
        self.gateway.count_loans().await
    }

    // ─────────────────────────────────────────────────────────
    // Repayment
    // ─────────────────────────────────────────────────────────

    /// Apply `amount` to the next unpaid week of `loan_id`.
    ///
    /// An accepted payment writes one payment record and one loan record in a
    /// single atomic gateway call. A rejected payment writes nothing, and a
    /// failed write leaves the stored loan as it was.
    pub async fn submit_payment(
        &self,
        loan_id: &str,
        amount: Decimal,
        idempotency_key: Option<&str>,
    ) -> Result<PaymentOutcome> {
        let _guard = self.locks.acquire(loan_id).await;
        let mut loan = self.loan(loan_id).await?;
        let today = self.clock.today();

        let mut receipt = match payment::apply_payment(&mut loan, amount, idempotency_key, today) {
            PaymentOutcome::Accepted(receipt) => receipt,
            PaymentOutcome::Rejected(rejection) => {
                debug!(loan_id, %amount, ?rejection, "payment rejected");
                return Ok(PaymentOutcome::Rejected(rejection));
            }
        };

        delinquency::refresh(&mut loan, today);
        receipt.delinquent = loan.delinquent;

        let paid = loan
            .payments
            .iter()
            .find(|p| p.week == receipt.week)
            .ok_or_else(|| LedgerError::not_found(loan_id))?;
        self.gateway.record_payment(&loan, paid).await?;

        info!(
            loan_id,
            week = receipt.week,
            outstanding = %receipt.outstanding_amount,
            delinquent = receipt.delinquent,
            "payment applied"
        );
        Ok(PaymentOutcome::Accepted(receipt))
    }
}
