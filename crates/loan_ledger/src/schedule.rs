//! Weekly repayment schedule generation.
//!
//! Interest is flat: the borrower owes `principal × (1 + rate)` split into
//! equal weekly installments. Installments are rounded to cents, so their sum
//! may differ from the total payable by at most half a cent per week.

use chrono::{Days, NaiveDate};
use rust_decimal::Decimal;

use crate::errors::{LedgerError, Result};
use crate::types::{LoanTerms, NewLoan, Payment};

/// Decimal places kept on installment amounts.
pub const MONEY_DP: u32 = 2;

/// Longest accepted term: ten years of weekly installments.
pub const MAX_TERM_WEEKS: u32 = 520;

const DAYS_PER_WEEK: u64 = 7;

/// Reject terms that cannot produce a meaningful schedule.
pub fn validate(terms: &LoanTerms) -> Result<()> {
    if terms.borrower_id.trim().is_empty() {
        return Err(LedgerError::Validation(
            "borrowerId must not be empty".to_string(),
        ));
    }
    if terms.principal_amount <= Decimal::ZERO {
        return Err(LedgerError::Validation(format!(
            "principalAmount must be positive, got {}",
            terms.principal_amount
        )));
    }
    if terms.interest_rate < Decimal::ZERO {
        return Err(LedgerError::Validation(format!(
            "interestRate must not be negative, got {}",
            terms.interest_rate
        )));
    }
    if terms.term_weeks == 0 {
        return Err(LedgerError::Validation(
            "termWeeks must be at least 1".to_string(),
        ));
    }
    if terms.term_weeks > MAX_TERM_WEEKS {
        return Err(LedgerError::Validation(format!(
            "termWeeks must be at most {MAX_TERM_WEEKS}, got {}",
            terms.term_weeks
        )));
    }
    Ok(())
}

/// Build the full installment plan for `terms`, originating on `originated_on`.
///
/// Week `n` falls due `7 × n` days after origination.
pub fn generate(terms: &LoanTerms, originated_on: NaiveDate) -> Result<NewLoan> {
    validate(terms)?;

    let total_payable = Decimal::ONE
        .checked_add(terms.interest_rate)
        .and_then(|factor| terms.principal_amount.checked_mul(factor))
        .ok_or_else(|| LedgerError::Validation("total payable overflows".to_string()))?;
    let weekly_payment_amount =
        (total_payable / Decimal::from(terms.term_weeks)).round_dp(MONEY_DP);

    let payments = (1..=terms.term_weeks)
        .map(|week| {
            let due_on = originated_on
                .checked_add_days(Days::new(DAYS_PER_WEEK * u64::from(week)))
                .ok_or_else(|| {
                    LedgerError::Validation(format!("due date for week {week} is out of range"))
                })?;
            Ok(Payment {
                loan_id: String::new(),
                week,
                amount: weekly_payment_amount,
                due_on,
                paid: false,
                paid_on: None,
                idempotency_key: None,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(NewLoan {
        borrower_id: terms.borrower_id.clone(),
        principal_amount: terms.principal_amount,
        interest_rate: terms.interest_rate,
        term_weeks: terms.term_weeks,
        total_payable,
        weekly_payment_amount,
        originated_on,
        payments,
    })
}
