//! Loans repository for database operations

use chrono::{DateTime, FixedOffset, Utc};
use sqlx::{PgConnection, Pool, Postgres};

use super::devices::DevicesRepository;
use crate::{
    error::{AppError, AppResult},
    models::loan::{CreateLoan, Loan, LoanStatus},
    services::{
        availability::{self, LoanRejection},
        lifecycle::Transition,
    },
};

/// SQLSTATE raised by the `loans_no_overlap` exclusion constraint
const EXCLUSION_VIOLATION: &str = "23P01";

#[derive(Clone)]
pub struct LoansRepository {
    pool: Pool<Postgres>,
}

impl LoansRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get loan by ID
    pub async fn get_by_id(&self, id: i32) -> AppResult<Loan> {
        sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", id)))
    }

    /// List loans of a device, newest first
    pub async fn list_by_device(
        &self,
        device_id: i32,
        status: Option<LoanStatus>,
    ) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            r#"
            SELECT * FROM loans
            WHERE device_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY loan_start DESC
            "#,
        )
        .bind(device_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }

    /// List loans of a user in any of `statuses`
    pub async fn list_by_user(&self, user_id: i32, statuses: &[LoanStatus]) -> AppResult<Vec<Loan>> {
        let loans = sqlx::query_as::<_, Loan>(
            r#"
            SELECT * FROM loans
            WHERE user_id = $1 AND status = ANY($2)
            ORDER BY loan_start
            "#,
        )
        .bind(user_id)
        .bind(status_names(statuses))
        .fetch_all(&self.pool)
        .await?;

        Ok(loans)
    }

    /// Create a loan after checking it against the device's bookings.
    ///
    /// The device row stays locked from the availability check until the
    /// insert commits, so concurrent requests for one device queue up.
    pub async fn create(
        &self,
        user_id: i32,
        loan: &CreateLoan,
        now: DateTime<Utc>,
        tz: FixedOffset,
    ) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let device = DevicesRepository::lock_for_booking(&mut tx, loan.device_id).await?;
        if device.not_borrowable {
            return Err(LoanRejection::NotBorrowable.into());
        }

        let bookings = blocking_loans(&mut tx, device.id).await?;
        availability::validate_new_loan(
            &device,
            loan.loan_start,
            loan.loan_end,
            &bookings,
            now,
            tz,
        )?;

        let created = sqlx::query_as::<_, Loan>(
            r#"
            INSERT INTO loans (device_id, user_id, loan_start, loan_end, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(device.id)
        .bind(user_id)
        .bind(loan.loan_start)
        .bind(loan.loan_end)
        .bind(LoanStatus::Upcoming)
        .fetch_one(&mut *tx)
        .await
        .map_err(overlap_violation)?;

        tx.commit().await?;
        Ok(created)
    }

    /// Change the end of an upcoming or active loan
    pub async fn update_end(
        &self,
        loan_id: i32,
        loan_end: DateTime<Utc>,
        tz: FixedOffset,
    ) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let loan = lock_loan(&mut tx, loan_id).await?;
        if !loan.status.is_blocking() {
            return Err(AppError::BusinessRule(format!(
                "Cannot edit a {} loan",
                loan.status
            )));
        }

        let device = DevicesRepository::lock_any(&mut tx, loan.device_id).await?;
        let bookings = blocking_loans(&mut tx, device.id).await?;
        availability::validate_edited_loan(
            loan.id,
            &device,
            loan.loan_start,
            loan_end,
            &bookings,
            tz,
        )?;

        let updated = sqlx::query_as::<_, Loan>(
            "UPDATE loans SET loan_end = $1, modif_date = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(loan_end)
        .bind(loan.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(overlap_violation)?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Force a status, bypassing the lifecycle order.
    ///
    /// Putting a loan back into a blocking status re-checks it for overlap.
    pub async fn set_status(&self, loan_id: i32, status: LoanStatus) -> AppResult<Loan> {
        let mut tx = self.pool.begin().await?;

        let loan = lock_loan(&mut tx, loan_id).await?;
        if status.is_blocking() && !loan.status.is_blocking() {
            let device = DevicesRepository::lock_any(&mut tx, loan.device_id).await?;
            let bookings = blocking_loans(&mut tx, device.id).await?;
            availability::check_overlap(
                device.id,
                loan.loan_start,
                loan.loan_end,
                &bookings,
                Some(loan.id),
            )?;
        }

        let updated = sqlx::query_as::<_, Loan>(
            "UPDATE loans SET status = $1, modif_date = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(status)
        .bind(loan.id)
        .fetch_one(&mut *tx)
        .await
        .map_err(overlap_violation)?;

        tx.commit().await?;
        Ok(updated)
    }

    /// Delete a loan, releasing its device
    pub async fn delete(&self, loan_id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM loans WHERE id = $1")
            .bind(loan_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Loan with id {} not found", loan_id)));
        }
        Ok(())
    }

    /// Run one lifecycle transition as a single range update.
    /// Returns the number of loans moved.
    pub async fn apply_transition(
        &self,
        transition: &Transition,
        now: DateTime<Utc>,
    ) -> AppResult<u64> {
        let query = format!(
            "UPDATE loans SET status = $1, modif_date = NOW() WHERE status = $2 AND {} <= $3",
            transition.boundary.column()
        );

        let result = sqlx::query(&query)
            .bind(transition.to)
            .bind(transition.from)
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}

async fn lock_loan(conn: &mut PgConnection, loan_id: i32) -> AppResult<Loan> {
    sqlx::query_as::<_, Loan>("SELECT * FROM loans WHERE id = $1 FOR UPDATE")
        .bind(loan_id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Loan with id {} not found", loan_id)))
}

async fn blocking_loans(conn: &mut PgConnection, device_id: i32) -> AppResult<Vec<Loan>> {
    let loans = sqlx::query_as::<_, Loan>(
        "SELECT * FROM loans WHERE device_id = $1 AND status = ANY($2) ORDER BY loan_start",
    )
    .bind(device_id)
    .bind(status_names(&LoanStatus::BLOCKING))
    .fetch_all(conn)
    .await?;
    Ok(loans)
}

fn status_names(statuses: &[LoanStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

/// Map a hit on the overlap exclusion constraint to the same rejection the
/// availability check produces
fn overlap_violation(err: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(EXCLUSION_VIOLATION) {
            return LoanRejection::Overlap {
                conflicting_loan: None,
            }
            .into();
        }
    }
    err.into()
}
