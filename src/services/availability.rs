//! Availability rules for new and edited loans
//!
//! Pure functions: callers load the device and its bookings, these decide.
//! Checks run in a fixed order and the first failing one is reported:
//! overlap, duration cap, ordering, then (new loans only) start in the past.

use chrono::{DateTime, FixedOffset, Utc};
use thiserror::Error;

use crate::models::{Device, Loan};

/// Why a requested loan interval was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoanRejection {
    #[error("Device is already loaned in this period")]
    Overlap { conflicting_loan: Option<i32> },

    #[error("The loan duration cannot exceed {max_days} days.")]
    DurationExceeded { max_days: i32 },

    #[error("The end date must be after the start date.")]
    EndNotAfterStart,

    #[error("The earliest possible reservation start date is {}.", .earliest.format("%d-%m-%Y %H:%M"))]
    StartInPast { earliest: DateTime<FixedOffset> },

    #[error("Device cannot be borrowed")]
    NotBorrowable,
}

/// Check a loan request for a device that has no loan yet
pub fn validate_new_loan(
    device: &Device,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    bookings: &[Loan],
    now: DateTime<Utc>,
    tz: FixedOffset,
) -> Result<(), LoanRejection> {
    check_interval(device, start, end, bookings, None, tz)?;

    if now > start {
        return Err(LoanRejection::StartInPast {
            earliest: now.with_timezone(&tz),
        });
    }

    Ok(())
}

/// Check new dates for an existing loan.
///
/// The loan itself is ignored in the overlap check and its start may
/// already lie in the past.
pub fn validate_edited_loan(
    loan_id: i32,
    device: &Device,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    bookings: &[Loan],
    tz: FixedOffset,
) -> Result<(), LoanRejection> {
    check_interval(device, start, end, bookings, Some(loan_id), tz)
}

fn check_interval(
    device: &Device,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    bookings: &[Loan],
    exclude: Option<i32>,
    tz: FixedOffset,
) -> Result<(), LoanRejection> {
    check_overlap(device.id, start, end, bookings, exclude)?;

    if loan_days(start, end, tz) > i64::from(device.max_loan_duration) {
        return Err(LoanRejection::DurationExceeded {
            max_days: device.max_loan_duration,
        });
    }

    if end <= start {
        return Err(LoanRejection::EndNotAfterStart);
    }

    Ok(())
}

/// Reject the interval if any upcoming or active booking of the device
/// other than `exclude` collides with it
pub fn check_overlap(
    device_id: i32,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    bookings: &[Loan],
    exclude: Option<i32>,
) -> Result<(), LoanRejection> {
    match bookings
        .iter()
        .filter(|loan| loan.device_id == device_id)
        .filter(|loan| loan.status.is_blocking())
        .filter(|loan| Some(loan.id) != exclude)
        .find(|loan| overlaps(loan.loan_start, loan.loan_end, start, end))
    {
        Some(conflict) => Err(LoanRejection::Overlap {
            conflicting_loan: Some(conflict.id),
        }),
        None => Ok(()),
    }
}

/// Whether a candidate interval collides with an existing booking.
///
/// The booking is clear when it lies entirely at or after both candidate
/// bounds, or entirely at or before both. Shared endpoints do not collide.
pub fn overlaps(
    existing_start: DateTime<Utc>,
    existing_end: DateTime<Utc>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> bool {
    let after = existing_start >= start && existing_start >= end;
    let before = existing_end <= start && existing_end <= end;
    !(after || before)
}

/// Whole days between two instants, counted on the civil clock of `tz`.
///
/// Unsigned: a reversed interval counts the same as the forward one.
pub fn loan_days(start: DateTime<Utc>, end: DateTime<Utc>, tz: FixedOffset) -> i64 {
    let start = start.with_timezone(&tz).naive_local();
    let end = end.with_timezone(&tz).naive_local();
    (end - start).num_days().abs()
}
