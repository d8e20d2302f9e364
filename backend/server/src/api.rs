//! Axum REST API handlers.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use loan_ledger::{LedgerError, LoanLedger, LoanTerms, PaymentOutcome, Rejection};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::db::SqliteGateway;

pub struct ApiState {
    pub ledger: LoanLedger<SqliteGateway>,
}

/// Build the application router.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/loans", post(create_loan))
        .route("/loans/total", get(total_loans))
        .route("/loans/:loan_id", get(get_loan))
        .route("/loans/:loan_id/outstanding", get(get_outstanding))
        .route("/loans/:loan_id/delinquent", get(get_delinquent))
        .route("/loans/:loan_id/payment", post(submit_payment))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLoanRequest {
    pub borrower_id: String,
    pub principal_amount: Decimal,
    pub interest_rate: Decimal,
    pub term_weeks: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalLoansResponse {
    pub total_loans: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutstandingResponse {
    pub loan_id: String,
    pub outstanding_amount: Decimal,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DelinquencyResponse {
    pub loan_id: String,
    pub delinquent: bool,
}

/// Returned with `200 OK` when the amount does not match the next installment.
#[derive(Serialize)]
pub struct WrongAmountResponse {
    pub error: String,
    pub amount: Decimal,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

fn ledger_error_response(err: LedgerError) -> Response {
    match err {
        LedgerError::Validation(msg) => error_response(StatusCode::BAD_REQUEST, msg),
        LedgerError::NotFound { .. } => error_response(StatusCode::NOT_FOUND, "Loan not found"),
        LedgerError::Persistence(e) => {
            error!("Persistence failure: {e}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal storage error")
        }
    }
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /loans`
///
/// Originates a loan and its weekly schedule.
pub async fn create_loan(
    State(state): State<Arc<ApiState>>,
    body: Result<Json<CreateLoanRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };
    let Ok(term_weeks) = u32::try_from(req.term_weeks) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("termWeeks out of range: {}", req.term_weeks),
        );
    };

    let terms = LoanTerms {
        borrower_id: req.borrower_id,
        principal_amount: req.principal_amount,
        interest_rate: req.interest_rate,
        term_weeks,
    };

    match state.ledger.create_loan(terms).await {
        Ok(loan) => (StatusCode::CREATED, Json(loan)).into_response(),
        Err(e) => ledger_error_response(e),
    }
}

/// `GET /loans/total`
pub async fn total_loans(State(state): State<Arc<ApiState>>) -> Response {
    match state.ledger.loan_count().await {
        Ok(total_loans) => Json(TotalLoansResponse { total_loans }).into_response(),
        Err(e) => ledger_error_response(e),
    }
}

/// `GET /loans/:loan_id`
///
/// Returns the loan with its full schedule.
pub async fn get_loan(
    State(state): State<Arc<ApiState>>,
    Path(loan_id): Path<String>,
) -> Response {
    match state.ledger.loan(&loan_id).await {
        Ok(loan) => Json(loan).into_response(),
        Err(e) => ledger_error_response(e),
    }
}

/// `GET /loans/:loan_id/outstanding`
pub async fn get_outstanding(
    State(state): State<Arc<ApiState>>,
    Path(loan_id): Path<String>,
) -> Response {
    match state.ledger.outstanding(&loan_id).await {
        Ok(outstanding_amount) => Json(OutstandingResponse {
            loan_id,
            outstanding_amount,
        })
        .into_response(),
        Err(e) => ledger_error_response(e),
    }
}

/// `GET /loans/:loan_id/delinquent`
pub async fn get_delinquent(
    State(state): State<Arc<ApiState>>,
    Path(loan_id): Path<String>,
) -> Response {
    match state.ledger.delinquency(&loan_id).await {
        Ok(delinquent) => Json(DelinquencyResponse {
            loan_id,
            delinquent,
        })
        .into_response(),
        Err(e) => ledger_error_response(e),
    }
}

/// `POST /loans/:loan_id/payment`
///
/// Pays the next unpaid week. A wrong amount is a normal `200` response that
/// carries the expected installment.
pub async fn submit_payment(
    State(state): State<Arc<ApiState>>,
    Path(loan_id): Path<String>,
    body: Result<Json<PaymentRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return error_response(StatusCode::BAD_REQUEST, rejection.body_text()),
    };

    let outcome = state
        .ledger
        .submit_payment(&loan_id, req.amount, req.idempotency_key.as_deref())
        .await;

    match outcome {
        Ok(PaymentOutcome::Accepted(receipt)) => Json(receipt).into_response(),
        Ok(PaymentOutcome::Rejected(Rejection::WrongAmount { expected, .. })) => Json(
            WrongAmountResponse {
                error: "you have to pay exact amount".to_string(),
                amount: expected,
            },
        )
        .into_response(),
        Ok(PaymentOutcome::Rejected(Rejection::AlreadySettled)) => {
            error_response(StatusCode::CONFLICT, "loan already settled")
        }
        Ok(PaymentOutcome::Rejected(Rejection::DuplicateRequest { key })) => error_response(
            StatusCode::CONFLICT,
            format!("duplicate payment request: {key}"),
        ),
        Err(e) => ledger_error_response(e),
    }
}
