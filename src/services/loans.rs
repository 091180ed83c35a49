//! Loan management service
//!
//! Every read or write first brings loan statuses up to date (when
//! `loans.sweep_on_request` is set), so a loan that already ended never
//! blocks a new booking.

use chrono::{DateTime, FixedOffset, Utc};

use crate::{
    error::AppResult,
    models::{
        loan::{CreateLoan, Loan, LoanScope, LoanStatus},
        SweepReport,
    },
    repository::Repository,
};

use super::lifecycle::LifecycleService;

#[derive(Clone)]
pub struct LoansService {
    repository: Repository,
    lifecycle: LifecycleService,
    tz: FixedOffset,
    sweep_on_request: bool,
}

impl LoansService {
    pub fn new(
        repository: Repository,
        lifecycle: LifecycleService,
        tz: FixedOffset,
        sweep_on_request: bool,
    ) -> Self {
        Self {
            repository,
            lifecycle,
            tz,
            sweep_on_request,
        }
    }

    async fn refresh(&self, now: DateTime<Utc>) -> AppResult<()> {
        if self.sweep_on_request {
            self.lifecycle.advance_loan_states(now).await?;
        }
        Ok(())
    }

    /// Run the lifecycle sweep unconditionally
    pub async fn sweep(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        self.lifecycle.advance_loan_states(now).await
    }

    /// Book a device for `user_id`
    pub async fn create_loan(
        &self,
        user_id: i32,
        data: &CreateLoan,
        now: DateTime<Utc>,
    ) -> AppResult<Loan> {
        self.refresh(now).await?;

        let loan = self.repository.loans.create(user_id, data, now, self.tz).await?;
        tracing::info!(
            loan_id = loan.id,
            device_id = loan.device_id,
            user_id,
            "Loan created"
        );
        Ok(loan)
    }

    pub async fn get_loan(&self, loan_id: i32, now: DateTime<Utc>) -> AppResult<Loan> {
        self.refresh(now).await?;
        self.repository.loans.get_by_id(loan_id).await
    }

    /// Bookings of a device, optionally filtered by status
    pub async fn list_device_loans(
        &self,
        device_id: i32,
        status: Option<LoanStatus>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Loan>> {
        self.refresh(now).await?;
        // Verify device exists
        self.repository.devices.get_by_id(device_id).await?;
        self.repository.loans.list_by_device(device_id, status).await
    }

    /// Current or past loans of a user
    pub async fn list_user_loans(
        &self,
        user_id: i32,
        scope: LoanScope,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Loan>> {
        self.refresh(now).await?;
        self.repository
            .loans
            .list_by_user(user_id, scope.statuses())
            .await
    }

    /// Move the end of an upcoming or active loan
    pub async fn update_loan_end(
        &self,
        loan_id: i32,
        loan_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> AppResult<Loan> {
        self.refresh(now).await?;

        let loan = self
            .repository
            .loans
            .update_end(loan_id, loan_end, self.tz)
            .await?;
        tracing::info!(loan_id, loan_end = %loan.loan_end, "Loan end date changed");
        Ok(loan)
    }

    /// Manual status override
    pub async fn set_status(
        &self,
        loan_id: i32,
        status: LoanStatus,
        now: DateTime<Utc>,
    ) -> AppResult<Loan> {
        self.refresh(now).await?;

        let loan = self.repository.loans.set_status(loan_id, status).await?;
        tracing::info!(loan_id, status = %status, "Loan status overridden");
        Ok(loan)
    }

    pub async fn cancel_loan(&self, loan_id: i32, now: DateTime<Utc>) -> AppResult<Loan> {
        self.set_status(loan_id, LoanStatus::Cancelled, now).await
    }

    pub async fn delete_loan(&self, loan_id: i32) -> AppResult<()> {
        self.repository.loans.delete(loan_id).await?;
        tracing::info!(loan_id, "Loan deleted");
        Ok(())
    }
}
