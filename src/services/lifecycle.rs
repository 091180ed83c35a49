//! Loan lifecycle: the ordered state table and the sweep that applies it
//!
//! Status only moves forward, `upcoming -> active -> completed`. `cancelled`
//! is set by hand and never touched by the sweep.

use chrono::{DateTime, Utc};

use crate::{
    error::AppResult,
    models::{Loan, LoanStatus, SweepReport},
    repository::Repository,
};

/// Which stored timestamp a transition compares with the current time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    Start,
    End,
}

impl Boundary {
    pub fn column(&self) -> &'static str {
        match self {
            Boundary::Start => "loan_start",
            Boundary::End => "loan_end",
        }
    }

    fn of(&self, loan: &Loan) -> DateTime<Utc> {
        match self {
            Boundary::Start => loan.loan_start,
            Boundary::End => loan.loan_end,
        }
    }
}

/// Move loans in `from` to `to` once `boundary <= now`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: LoanStatus,
    pub to: LoanStatus,
    pub boundary: Boundary,
}

impl Transition {
    pub fn applies(&self, loan: &Loan, now: DateTime<Utc>) -> bool {
        loan.status == self.from && self.boundary.of(loan) <= now
    }
}

/// Sweep order. Completion runs before activation, so a loan that is past
/// both bounds becomes `active` on one sweep and `completed` on the next.
pub const SWEEP: [Transition; 2] = [
    Transition {
        from: LoanStatus::Active,
        to: LoanStatus::Completed,
        boundary: Boundary::End,
    },
    Transition {
        from: LoanStatus::Upcoming,
        to: LoanStatus::Active,
        boundary: Boundary::Start,
    },
];

#[derive(Clone)]
pub struct LifecycleService {
    repository: Repository,
}

impl LifecycleService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Apply every transition of the sweep as of `now`.
    ///
    /// Each transition is its own range update; a failure between them
    /// leaves a valid state that the next sweep picks up.
    pub async fn advance_loan_states(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let mut report = SweepReport::default();

        for transition in SWEEP.iter() {
            let changed = self.repository.loans.apply_transition(transition, now).await?;
            match transition.to {
                LoanStatus::Active => report.activated += changed,
                LoanStatus::Completed => report.completed += changed,
                _ => {}
            }
        }

        if !report.is_empty() {
            tracing::info!(
                activated = report.activated,
                completed = report.completed,
                "Advanced loan states"
            );
        }

        Ok(report)
    }
}
