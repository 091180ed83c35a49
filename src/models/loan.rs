//! Loan (booking) model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

/// Loan lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    /// Accepted, start time not reached yet
    Upcoming,
    /// Started, device is occupied
    Active,
    /// End time passed, device released
    Completed,
    /// Set manually, device released
    Cancelled,
}

impl LoanStatus {
    /// Statuses that hold the device and take part in overlap checks
    pub const BLOCKING: [LoanStatus; 2] = [LoanStatus::Upcoming, LoanStatus::Active];

    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Upcoming => "upcoming",
            LoanStatus::Active => "active",
            LoanStatus::Completed => "completed",
            LoanStatus::Cancelled => "cancelled",
        }
    }

    /// Whether a loan in this status occupies its device
    pub fn is_blocking(&self) -> bool {
        matches!(self, LoanStatus::Upcoming | LoanStatus::Active)
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LoanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "upcoming" => Ok(LoanStatus::Upcoming),
            "active" => Ok(LoanStatus::Active),
            "completed" => Ok(LoanStatus::Completed),
            "cancelled" => Ok(LoanStatus::Cancelled),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

// SQLx conversion for LoanStatus (stored as TEXT)
impl sqlx::Type<Postgres> for LoanStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for LoanStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for LoanStatus {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// Loan model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Loan {
    pub id: i32,
    pub device_id: i32,
    pub user_id: i32,
    pub loan_start: DateTime<Utc>,
    pub loan_end: DateTime<Utc>,
    pub status: LoanStatus,
    pub crea_date: Option<DateTime<Utc>>,
    pub modif_date: Option<DateTime<Utc>>,
}

/// Create loan request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateLoan {
    #[validate(range(min = 1))]
    pub device_id: i32,
    pub loan_start: DateTime<Utc>,
    pub loan_end: DateTime<Utc>,
}

/// Edit the end date of an upcoming or active loan
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateLoanEnd {
    pub loan_end: DateTime<Utc>,
}

/// Manual status override
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateLoanStatus {
    pub status: LoanStatus,
}

/// Filter for a device's bookings
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeviceLoansQuery {
    /// Restrict to one status
    pub status: Option<LoanStatus>,
}

/// Which of the caller's loans to list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoanScope {
    /// Upcoming and active loans
    #[default]
    Current,
    /// Completed and cancelled loans
    Past,
}

impl LoanScope {
    pub fn statuses(&self) -> &'static [LoanStatus] {
        match self {
            LoanScope::Current => &[LoanStatus::Upcoming, LoanStatus::Active],
            LoanScope::Past => &[LoanStatus::Completed, LoanStatus::Cancelled],
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserLoansQuery {
    #[serde(default)]
    pub scope: LoanScope,
}

/// Outcome of one lifecycle sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SweepReport {
    /// Loans moved from upcoming to active
    pub activated: u64,
    /// Loans moved from active to completed
    pub completed: u64,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.activated == 0 && self.completed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Active".parse::<LoanStatus>().unwrap(), LoanStatus::Active);
        assert!("returned".parse::<LoanStatus>().is_err());
    }

    #[test]
    fn only_upcoming_and_active_block() {
        assert!(LoanStatus::Upcoming.is_blocking());
        assert!(LoanStatus::Active.is_blocking());
        assert!(!LoanStatus::Completed.is_blocking());
        assert!(!LoanStatus::Cancelled.is_blocking());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&LoanStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
    }
}
