//! # Storage
//!
//! The ledger reaches durable storage only through the [`LoanGateway`] trait.
//! It never sees tables, rows or connections.
//!
//! | Operation      | Contract                                                       |
//! |----------------|----------------------------------------------------------------|
//! | `create`       | Assign the next sequential id and store loan + schedule all-or-nothing |
//! | `find_loan`    | Loan with payments in week order, or `None`                    |
//! | `save_loan`    | Persist the loan's mutable fields                              |
//! | `save_payment` | Persist one installment's mutable fields                       |
//! | `record_payment` | Persist a paid installment and its loan together, all-or-nothing |
//! | `count_loans`  | Number of stored loans                                         |
//!
//! ## Identifier assignment
//!
//! Identifiers are the decimal string of a sequence value produced inside
//! `create`, under the same lock or transaction that stores the loan. There
//! is no separate count-then-format step, so concurrent creation cannot hand
//! out the same id twice.
//!
//! ## Payment writes
//!
//! An accepted payment touches one installment and the loan's balance. Both
//! go through `record_payment`, so a failure can never leave a week marked
//! paid while the balance still counts it as owed.
//!
//! [`InMemoryGateway`] is a process-local implementation used by tests and
//! embedders that do not need durability.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Mutex;

use crate::errors::{LedgerError, Result};
use crate::types::{Loan, NewLoan, Payment};

/// Durable storage for loans and their schedules.
pub trait LoanGateway: Send + Sync {
    fn create(&self, new_loan: NewLoan) -> impl Future<Output = Result<Loan>> + Send;

    fn find_loan(&self, loan_id: &str) -> impl Future<Output = Result<Option<Loan>>> + Send;

    fn save_loan(&self, loan: &Loan) -> impl Future<Output = Result<()>> + Send;

    fn save_payment(&self, payment: &Payment) -> impl Future<Output = Result<()>> + Send;

    /// Persist `payment` and `loan` atomically: either both writes land or neither does.
    fn record_payment(
        &self,
        loan: &Loan,
        payment: &Payment,
    ) -> impl Future<Output = Result<()>> + Send;

    fn count_loans(&self) -> impl Future<Output = Result<u64>> + Send;
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: u64,
    loans: BTreeMap<String, Loan>,
}

impl MemoryState {
    fn loan_mut(&mut self, loan_id: &str) -> Result<&mut Loan> {
        self.loans
            .get_mut(loan_id)
            .ok_or_else(|| LedgerError::not_found(loan_id))
    }
}

fn installment_mut<'a>(loan: &'a mut Loan, payment: &Payment) -> Result<&'a mut Payment> {
    loan.payments
        .iter_mut()
        .find(|p| p.week == payment.week)
        .ok_or_else(|| LedgerError::not_found(&payment.loan_id))
}

fn copy_loan_fields(stored: &mut Loan, loan: &Loan) {
    stored.outstanding_amount = loan.outstanding_amount;
    stored.delinquent = loan.delinquent;
}

fn copy_payment_fields(stored: &mut Payment, payment: &Payment) {
    stored.paid = payment.paid;
    stored.paid_on = payment.paid_on;
    stored.idempotency_key = payment.idempotency_key.clone();
}

/// Loans held in process memory behind a single mutex.
#[derive(Debug, Default)]
pub struct InMemoryGateway {
    state: Mutex<MemoryState>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MemoryState) -> Result<T>) -> Result<T> {
        let mut guard = self
            .state
            .lock()
            .map_err(|e| LedgerError::Persistence(e.to_string().into()))?;
        f(&mut guard)
    }
}

impl LoanGateway for InMemoryGateway {
    async fn create(&self, new_loan: NewLoan) -> Result<Loan> {
        self.with_state(|state| {
            state.next_id += 1;
            let loan = new_loan.into_loan(state.next_id.to_string());
            state.loans.insert(loan.loan_id.clone(), loan.clone());
            Ok(loan)
        })
    }

    async fn find_loan(&self, loan_id: &str) -> Result<Option<Loan>> {
        self.with_state(|state| Ok(state.loans.get(loan_id).cloned()))
    }

    async fn save_loan(&self, loan: &Loan) -> Result<()> {
        self.with_state(|state| {
            copy_loan_fields(state.loan_mut(&loan.loan_id)?, loan);
            Ok(())
        })
    }

    async fn save_payment(&self, payment: &Payment) -> Result<()> {
        self.with_state(|state| {
            let stored = installment_mut(state.loan_mut(&payment.loan_id)?, payment)?;
            copy_payment_fields(stored, payment);
            Ok(())
        })
    }

    async fn record_payment(&self, loan: &Loan, payment: &Payment) -> Result<()> {
        self.with_state(|state| {
            if payment.loan_id != loan.loan_id {
                return Err(LedgerError::Validation(format!(
                    "payment for loan {} recorded against loan {}",
                    payment.loan_id, loan.loan_id
                )));
            }
            // Resolve both targets before touching either.
            let stored = state.loan_mut(&loan.loan_id)?;
            installment_mut(stored, payment)?;

            copy_payment_fields(installment_mut(stored, payment)?, payment);
            copy_loan_fields(stored, loan);
            Ok(())
        })
    }

    async fn count_loans(&self) -> Result<u64> {
        self.with_state(|state| Ok(state.loans.len() as u64))
    }
}
