//! Database layer: migrations, loan queries, and the SQLite gateway.

use std::str::FromStr;

use chrono::NaiveDate;
use loan_ledger::{Loan, LoanGateway, NewLoan, Payment};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use tracing::info;

use crate::errors::{Result, ServerError};

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    // Make sure the file is created if it doesn't exist yet.
    let options = SqliteConnectOptions::from_str(&url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

// ─────────────────────────────────────────────────────────
// Row shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, FromRow)]
struct LoanRow {
    loan_id: String,
    borrower_id: String,
    principal_amount: String,
    interest_rate: String,
    term_weeks: i64,
    total_payable: String,
    weekly_payment_amount: String,
    outstanding_amount: String,
    delinquent: bool,
    originated_on: String,
}

#[derive(Debug, FromRow)]
struct PaymentRow {
    loan_id: String,
    week: i64,
    amount: String,
    due_on: String,
    paid: bool,
    paid_on: Option<String>,
    idempotency_key: Option<String>,
}

fn parse_decimal(column: &str, raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw)
        .map_err(|e| ServerError::CorruptRecord(format!("{column} = {raw:?}: {e}")))
}

fn parse_date(column: &str, raw: &str) -> Result<NaiveDate> {
    NaiveDate::from_str(raw)
        .map_err(|e| ServerError::CorruptRecord(format!("{column} = {raw:?}: {e}")))
}

fn parse_week(column: &str, raw: i64) -> Result<u32> {
    u32::try_from(raw).map_err(|e| ServerError::CorruptRecord(format!("{column} = {raw}: {e}")))
}

impl TryFrom<PaymentRow> for Payment {
    type Error = ServerError;

    fn try_from(row: PaymentRow) -> Result<Self> {
        Ok(Payment {
            week: parse_week("week", row.week)?,
            amount: parse_decimal("amount", &row.amount)?,
            due_on: parse_date("due_on", &row.due_on)?,
            paid: row.paid,
            paid_on: row
                .paid_on
                .as_deref()
                .map(|d| parse_date("paid_on", d))
                .transpose()?,
            idempotency_key: row.idempotency_key,
            loan_id: row.loan_id,
        })
    }
}

impl LoanRow {
    fn into_loan(self, payments: Vec<Payment>) -> Result<Loan> {
        Ok(Loan {
            principal_amount: parse_decimal("principal_amount", &self.principal_amount)?,
            interest_rate: parse_decimal("interest_rate", &self.interest_rate)?,
            term_weeks: parse_week("term_weeks", self.term_weeks)?,
            total_payable: parse_decimal("total_payable", &self.total_payable)?,
            weekly_payment_amount: parse_decimal(
                "weekly_payment_amount",
                &self.weekly_payment_amount,
            )?,
            outstanding_amount: parse_decimal("outstanding_amount", &self.outstanding_amount)?,
            delinquent: self.delinquent,
            originated_on: parse_date("originated_on", &self.originated_on)?,
            loan_id: self.loan_id,
            borrower_id: self.borrower_id,
            payments,
        })
    }
}

// ─────────────────────────────────────────────────────────
// Loan writes
// ─────────────────────────────────────────────────────────

/// Store a new loan and its schedule in one transaction.
///
/// The identifier is the row's `AUTOINCREMENT` key, assigned inside the same
/// transaction, so concurrent inserts never share an id.
pub async fn insert_loan(pool: &SqlitePool, new_loan: NewLoan) -> Result<Loan> {
    let mut tx = pool.begin().await?;

    let row_id = sqlx::query(
        r#"
        INSERT INTO loans
            (borrower_id, principal_amount, interest_rate, term_weeks, total_payable,
             weekly_payment_amount, outstanding_amount, delinquent, originated_on)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8)
        "#,
    )
    .bind(&new_loan.borrower_id)
    .bind(new_loan.principal_amount.to_string())
    .bind(new_loan.interest_rate.to_string())
    .bind(i64::from(new_loan.term_weeks))
    .bind(new_loan.total_payable.to_string())
    .bind(new_loan.weekly_payment_amount.to_string())
    .bind(new_loan.total_payable.to_string())
    .bind(new_loan.originated_on.to_string())
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    let loan = new_loan.into_loan(row_id.to_string());

    sqlx::query("UPDATE loans SET loan_id = ?1 WHERE id = ?2")
        .bind(&loan.loan_id)
        .bind(row_id)
        .execute(&mut *tx)
        .await?;

    for payment in &loan.payments {
        sqlx::query(
            r#"
            INSERT INTO payments (loan_id, week, amount, due_on, paid)
            VALUES (?1, ?2, ?3, ?4, 0)
            "#,
        )
        .bind(&payment.loan_id)
        .bind(i64::from(payment.week))
        .bind(payment.amount.to_string())
        .bind(payment.due_on.to_string())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(loan)
}

/// Persist the mutable loan fields.
pub async fn update_loan<'e, E>(executor: E, loan: &Loan) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "UPDATE loans SET outstanding_amount = ?1, delinquent = ?2 WHERE loan_id = ?3",
    )
    .bind(loan.outstanding_amount.to_string())
    .bind(loan.delinquent)
    .bind(&loan.loan_id)
    .execute(executor)
    .await?
    .rows_affected();

    if rows == 0 {
        return Err(loan_ledger::LedgerError::not_found(&loan.loan_id).into());
    }
    Ok(())
}

/// Persist the mutable installment fields.
pub async fn update_payment<'e, E>(executor: E, payment: &Payment) -> Result<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
        UPDATE payments
        SET    paid = ?1, paid_on = ?2, idempotency_key = ?3
        WHERE  loan_id = ?4 AND week = ?5
        "#,
    )
    .bind(payment.paid)
    .bind(payment.paid_on.map(|d| d.to_string()))
    .bind(&payment.idempotency_key)
    .bind(&payment.loan_id)
    .bind(i64::from(payment.week))
    .execute(executor)
    .await?
    .rows_affected();

    if rows == 0 {
        return Err(loan_ledger::LedgerError::not_found(&payment.loan_id).into());
    }
    Ok(())
}

/// Persist an applied installment together with its loan's balance and flag.
///
/// Both updates share one transaction; if either misses its row the
/// transaction is dropped and nothing is written.
pub async fn record_payment(pool: &SqlitePool, loan: &Loan, payment: &Payment) -> Result<()> {
    if payment.loan_id != loan.loan_id {
        return Err(loan_ledger::LedgerError::Validation(format!(
            "payment for loan {} recorded against loan {}",
            payment.loan_id, loan.loan_id
        ))
        .into());
    }

    let mut tx = pool.begin().await?;
    update_loan(&mut *tx, loan).await?;
    update_payment(&mut *tx, payment).await?;
    tx.commit().await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Loan reads
// ─────────────────────────────────────────────────────────

/// Fetch a loan with its installments ordered by week.
pub async fn get_loan(pool: &SqlitePool, loan_id: &str) -> Result<Option<Loan>> {
    let row = sqlx::query_as::<_, LoanRow>(
        r#"
        SELECT loan_id, borrower_id, principal_amount, interest_rate, term_weeks,
               total_payable, weekly_payment_amount, outstanding_amount, delinquent,
               originated_on
        FROM   loans
        WHERE  loan_id = ?1
        "#,
    )
    .bind(loan_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let payments = sqlx::query_as::<_, PaymentRow>(
        r#"
        SELECT loan_id, week, amount, due_on, paid, paid_on, idempotency_key
        FROM   payments
        WHERE  loan_id = ?1
        ORDER  BY week ASC
        "#,
    )
    .bind(loan_id)
    .fetch_all(pool)
    .await?
    .into_iter()
    .map(Payment::try_from)
    .collect::<Result<Vec<_>>>()?;

    row.into_loan(payments).map(Some)
}

/// Total number of stored loans.
pub async fn count_loans(pool: &SqlitePool) -> Result<u64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM loans")
        .fetch_one(pool)
        .await?;
    Ok(count.max(0) as u64)
}

// ─────────────────────────────────────────────────────────
// Gateway
// ─────────────────────────────────────────────────────────

/// [`LoanGateway`] over a SQLite pool.
#[derive(Clone)]
pub struct SqliteGateway {
    pool: SqlitePool,
}

impl SqliteGateway {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl LoanGateway for SqliteGateway {
    async fn create(&self, new_loan: NewLoan) -> loan_ledger::Result<Loan> {
        Ok(insert_loan(&self.pool, new_loan).await?)
    }

    async fn find_loan(&self, loan_id: &str) -> loan_ledger::Result<Option<Loan>> {
        Ok(get_loan(&self.pool, loan_id).await?)
    }

    async fn save_loan(&self, loan: &Loan) -> loan_ledger::Result<()> {
        Ok(update_loan(&self.pool, loan).await?)
    }

    async fn save_payment(&self, payment: &Payment) -> loan_ledger::Result<()> {
        Ok(update_payment(&self.pool, payment).await?)
    }

    async fn record_payment(&self, loan: &Loan, payment: &Payment) -> loan_ledger::Result<()> {
        Ok(record_payment(&self.pool, loan, payment).await?)
    }

    async fn count_loans(&self) -> loan_ledger::Result<u64> {
        Ok(count_loans(&self.pool).await?)
    }
}
