//! Loan management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use validator::Validate;

use crate::{
    error::AppResult,
    models::{
        loan::{CreateLoan, Loan, UpdateLoanEnd, UpdateLoanStatus, UserLoansQuery},
        SweepReport,
    },
    AppState,
};

use super::AuthenticatedUser;

/// Book a device for the caller
#[utoipa::path(
    post,
    path = "/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    request_body = CreateLoan,
    responses(
        (status = 201, description = "Loan created", body = Loan),
        (status = 404, description = "Device not found"),
        (status = 422, description = "Loan rejected (overlap, duration, ordering or start in the past)")
    )
)]
pub async fn create_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateLoan>,
) -> AppResult<(StatusCode, Json<Loan>)> {
    request.validate()?;

    let loan = state
        .services
        .loans
        .create_loan(claims.user_id, &request, Utc::now())
        .await?;

    Ok((StatusCode::CREATED, Json(loan)))
}

/// Get a loan
#[utoipa::path(
    get,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan details", body = Loan),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn get_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<Loan>> {
    let loan = state.services.loans.get_loan(loan_id, Utc::now()).await?;
    claims.require_owner_or_manager(loan.user_id)?;
    Ok(Json(loan))
}

/// Change the end date of an upcoming or active loan
#[utoipa::path(
    put,
    path = "/loans/{id}/end",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    request_body = UpdateLoanEnd,
    responses(
        (status = 200, description = "Loan updated", body = Loan),
        (status = 404, description = "Loan not found"),
        (status = 422, description = "New end date rejected or loan already finished")
    )
)]
pub async fn update_loan_end(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
    Json(request): Json<UpdateLoanEnd>,
) -> AppResult<Json<Loan>> {
    claims.require_manager()?;

    let loan = state
        .services
        .loans
        .update_loan_end(loan_id, request.loan_end, Utc::now())
        .await?;
    Ok(Json(loan))
}

/// Override the status of a loan
#[utoipa::path(
    put,
    path = "/loans/{id}/status",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    request_body = UpdateLoanStatus,
    responses(
        (status = 200, description = "Status changed", body = Loan),
        (status = 404, description = "Loan not found"),
        (status = 422, description = "Reinstated loan would overlap another booking")
    )
)]
pub async fn set_loan_status(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
    Json(request): Json<UpdateLoanStatus>,
) -> AppResult<Json<Loan>> {
    claims.require_manager()?;

    let loan = state
        .services
        .loans
        .set_status(loan_id, request.status, Utc::now())
        .await?;
    Ok(Json(loan))
}

/// Cancel a loan (its borrower or a manager)
#[utoipa::path(
    post,
    path = "/loans/{id}/cancel",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 200, description = "Loan cancelled", body = Loan),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn cancel_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<Json<Loan>> {
    let now = Utc::now();
    let loan = state.services.loans.get_loan(loan_id, now).await?;
    claims.require_owner_or_manager(loan.user_id)?;

    let loan = state.services.loans.cancel_loan(loan_id, now).await?;
    Ok(Json(loan))
}

/// Delete a loan
#[utoipa::path(
    delete,
    path = "/loans/{id}",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Loan ID")),
    responses(
        (status = 204, description = "Loan deleted"),
        (status = 404, description = "Loan not found")
    )
)]
pub async fn delete_loan(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(loan_id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_manager()?;
    state.services.loans.delete_loan(loan_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Current or past loans of the caller
#[utoipa::path(
    get,
    path = "/users/me/loans",
    tag = "loans",
    security(("bearer_auth" = [])),
    params(UserLoansQuery),
    responses(
        (status = 200, description = "Caller's loans", body = Vec<Loan>)
    )
)]
pub async fn get_my_loans(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(query): Query<UserLoansQuery>,
) -> AppResult<Json<Vec<Loan>>> {
    let loans = state
        .services
        .loans
        .list_user_loans(claims.user_id, query.scope, Utc::now())
        .await?;
    Ok(Json(loans))
}

/// Run the lifecycle sweep now
#[utoipa::path(
    post,
    path = "/loans/sweep",
    tag = "loans",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Loans advanced", body = SweepReport)
    )
)]
pub async fn sweep_loans(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<SweepReport>> {
    claims.require_manager()?;
    let report = state.services.loans.sweep(Utc::now()).await?;
    Ok(Json(report))
}
