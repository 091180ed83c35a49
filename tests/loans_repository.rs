//! Database tests for booking and the lifecycle sweep.
//!
//! Each test gets a fresh database with the migrations applied.
//! Run with: DATABASE_URL=postgres://... cargo test -- --ignored

use chrono::{DateTime, TimeZone, Utc};
use sqlx::PgPool;

use atelier_loans::{
    config::LoansConfig,
    error::AppError,
    models::{
        device::{CreateDevice, DeviceGroupInput, UpdateDevice},
        loan::{CreateLoan, LoanScope, LoanStatus},
    },
    repository::Repository,
    services::{availability::LoanRejection, Services},
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

fn services(pool: PgPool) -> Services {
    Services::new(Repository::new(pool), &LoansConfig::default()).unwrap()
}

async fn new_device(services: &Services, max_loan_duration: i32) -> i32 {
    services
        .devices
        .create(&CreateDevice {
            name: "Sony A7 III".to_string(),
            description: Some("Photo atelier camera".to_string()),
            atelier_id: Some(1),
            group_id: None,
            max_loan_duration,
        })
        .await
        .unwrap()
        .id
}

fn request(device_id: i32, start: DateTime<Utc>, end: DateTime<Utc>) -> CreateLoan {
    CreateLoan {
        device_id,
        loan_start: start,
        loan_end: end,
    }
}

/// Insert a loan bypassing validation, for dates already in the past
async fn insert_loan(
    pool: &PgPool,
    device_id: i32,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    status: LoanStatus,
) -> i32 {
    sqlx::query_scalar(
        "INSERT INTO loans (device_id, user_id, loan_start, loan_end, status) \
         VALUES ($1, 1, $2, $3, $4) RETURNING id",
    )
    .bind(device_id)
    .bind(start)
    .bind(end)
    .bind(status)
    .fetch_one(pool)
    .await
    .unwrap()
}

fn assert_overlap(result: Result<impl std::fmt::Debug, AppError>) {
    match result {
        Err(AppError::LoanRejected(LoanRejection::Overlap { .. })) => {}
        other => panic!("expected overlap rejection, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Booking
// ---------------------------------------------------------------------------

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_overlapping_booking_is_rejected(pool: PgPool) {
    let services = services(pool);
    let device_id = new_device(&services, 5).await;
    let now = at(2025, 2, 20, 0);

    services
        .loans
        .create_loan(7, &request(device_id, at(2025, 3, 1, 9), at(2025, 3, 4, 9)), now)
        .await
        .unwrap();

    let result = services
        .loans
        .create_loan(8, &request(device_id, at(2025, 3, 3, 9), at(2025, 3, 5, 9)), now)
        .await;
    assert_overlap(result);

    // Touching the previous loan's end is allowed
    let touching = services
        .loans
        .create_loan(8, &request(device_id, at(2025, 3, 4, 9), at(2025, 3, 6, 9)), now)
        .await
        .unwrap();
    assert_eq!(touching.status, LoanStatus::Upcoming);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_booking_longer_than_cap_is_rejected(pool: PgPool) {
    let services = services(pool);
    let device_id = new_device(&services, 5).await;

    let err = services
        .loans
        .create_loan(
            7,
            &request(device_id, at(2025, 3, 1, 9), at(2025, 3, 10, 9)),
            at(2025, 2, 20, 0),
        )
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "Loan rejected: The loan duration cannot exceed 5 days.");
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_not_borrowable_device_is_rejected(pool: PgPool) {
    let services = services(pool);
    let device_id = new_device(&services, 5).await;
    services
        .devices
        .update(
            device_id,
            &UpdateDevice {
                not_borrowable: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let result = services
        .loans
        .create_loan(
            7,
            &request(device_id, at(2025, 3, 1, 9), at(2025, 3, 2, 9)),
            at(2025, 2, 20, 0),
        )
        .await;
    assert!(matches!(
        result,
        Err(AppError::LoanRejected(LoanRejection::NotBorrowable))
    ));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_deleted_device_keeps_history_and_refuses_loans(pool: PgPool) {
    let services = services(pool.clone());
    let device_id = new_device(&services, 5).await;
    insert_loan(&pool, device_id, at(2024, 1, 1, 9), at(2024, 1, 2, 9), LoanStatus::Completed).await;

    services.devices.delete(device_id).await.unwrap();

    let listed = services.devices.list(at(2025, 2, 20, 0)).await.unwrap();
    assert!(!listed.iter().any(|d| d.id == device_id));

    let history: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM loans WHERE device_id = $1")
        .bind(device_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(history, 1);

    let result = services
        .loans
        .create_loan(
            7,
            &request(device_id, at(2025, 3, 1, 9), at(2025, 3, 2, 9)),
            at(2025, 2, 20, 0),
        )
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_exclusion_constraint_blocks_double_booking(pool: PgPool) {
    let services = services(pool.clone());
    let device_id = new_device(&services, 5).await;
    insert_loan(&pool, device_id, at(2025, 3, 1, 9), at(2025, 3, 4, 9), LoanStatus::Upcoming).await;

    let result = sqlx::query(
        "INSERT INTO loans (device_id, user_id, loan_start, loan_end, status) \
         VALUES ($1, 2, $2, $3, 'active')",
    )
    .bind(device_id)
    .bind(at(2025, 3, 2, 9))
    .bind(at(2025, 3, 3, 9))
    .execute(&pool)
    .await;

    match result {
        Err(sqlx::Error::Database(db)) => assert_eq!(db.code().as_deref(), Some("23P01")),
        other => panic!("expected exclusion violation, got {:?}", other),
    }

    // A cancelled loan in the same period does not conflict
    insert_loan(&pool, device_id, at(2025, 3, 2, 9), at(2025, 3, 3, 9), LoanStatus::Cancelled).await;
}

// ---------------------------------------------------------------------------
// Edits and overrides
// ---------------------------------------------------------------------------

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_end_date_edit_is_revalidated(pool: PgPool) {
    let services = services(pool);
    let device_id = new_device(&services, 10).await;
    let now = at(2025, 2, 20, 0);

    let first = services
        .loans
        .create_loan(7, &request(device_id, at(2025, 3, 1, 9), at(2025, 3, 4, 9)), now)
        .await
        .unwrap();
    services
        .loans
        .create_loan(8, &request(device_id, at(2025, 3, 6, 9), at(2025, 3, 8, 9)), now)
        .await
        .unwrap();

    let extended = services
        .loans
        .update_loan_end(first.id, at(2025, 3, 6, 9), now)
        .await
        .unwrap();
    assert_eq!(extended.loan_end, at(2025, 3, 6, 9));

    let result = services
        .loans
        .update_loan_end(first.id, at(2025, 3, 7, 9), now)
        .await;
    assert_overlap(result);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_active_loan_end_can_be_edited_after_start(pool: PgPool) {
    let services = services(pool.clone());
    let device_id = new_device(&services, 10).await;
    let loan_id =
        insert_loan(&pool, device_id, at(2025, 3, 1, 9), at(2025, 3, 4, 9), LoanStatus::Active).await;

    let loan = services
        .loans
        .update_loan_end(loan_id, at(2025, 3, 5, 9), at(2025, 3, 2, 0))
        .await
        .unwrap();
    assert_eq!(loan.status, LoanStatus::Active);
    assert_eq!(loan.loan_end, at(2025, 3, 5, 9));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_finished_loan_cannot_be_edited(pool: PgPool) {
    let services = services(pool.clone());
    let device_id = new_device(&services, 10).await;
    let loan_id =
        insert_loan(&pool, device_id, at(2025, 3, 1, 9), at(2025, 3, 4, 9), LoanStatus::Cancelled).await;

    let result = services
        .loans
        .update_loan_end(loan_id, at(2025, 3, 5, 9), at(2025, 3, 2, 0))
        .await;
    assert!(matches!(result, Err(AppError::BusinessRule(_))));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_reinstating_cancelled_loan_checks_overlap(pool: PgPool) {
    let services = services(pool.clone());
    let device_id = new_device(&services, 10).await;
    let now = at(2025, 2, 20, 0);

    let first = services
        .loans
        .create_loan(7, &request(device_id, at(2025, 3, 1, 9), at(2025, 3, 4, 9)), now)
        .await
        .unwrap();
    services.loans.cancel_loan(first.id, now).await.unwrap();

    services
        .loans
        .create_loan(8, &request(device_id, at(2025, 3, 2, 9), at(2025, 3, 3, 9)), now)
        .await
        .unwrap();

    let result = services
        .loans
        .set_status(first.id, LoanStatus::Upcoming, now)
        .await;
    assert_overlap(result);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_occupancy_follows_loan_status(pool: PgPool) {
    let services = services(pool);
    let device_id = new_device(&services, 5).await;
    let now = at(2025, 2, 20, 0);

    assert!(!services.devices.get_by_id(device_id, now).await.unwrap().occupied);

    let loan = services
        .loans
        .create_loan(7, &request(device_id, at(2025, 3, 1, 9), at(2025, 3, 4, 9)), now)
        .await
        .unwrap();
    assert!(services.devices.get_by_id(device_id, now).await.unwrap().occupied);

    services.loans.cancel_loan(loan.id, now).await.unwrap();
    assert!(!services.devices.get_by_id(device_id, now).await.unwrap().occupied);
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_device_read_releases_loan_that_already_ended(pool: PgPool) {
    let services = services(pool.clone());
    let device_id = new_device(&services, 5).await;
    insert_loan(&pool, device_id, at(2025, 1, 1, 9), at(2025, 1, 2, 9), LoanStatus::Active).await;
    let now = at(2025, 1, 3, 0);

    let device = services.devices.get_by_id(device_id, now).await.unwrap();
    assert!(!device.occupied);

    let listed = services.devices.list(now).await.unwrap();
    let device = listed.iter().find(|d| d.id == device_id).unwrap();
    assert!(!device.occupied);
}

// ---------------------------------------------------------------------------
// Device groups
// ---------------------------------------------------------------------------

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_unknown_group_is_a_bad_request(pool: PgPool) {
    let services = services(pool);

    let result = services
        .devices
        .create(&CreateDevice {
            name: "Tripod".to_string(),
            description: None,
            atelier_id: None,
            group_id: Some(999),
            max_loan_duration: 3,
        })
        .await;
    match result {
        Err(AppError::BadRequest(message)) => {
            assert_eq!(message, "Device group 999 does not exist")
        }
        other => panic!("expected bad request, got {:?}", other),
    }

    let device_id = new_device(&services, 5).await;
    let result = services
        .devices
        .update(
            device_id,
            &UpdateDevice {
                group_id: Some(Some(999)),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(result, Err(AppError::BadRequest(_))));
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_update_can_clear_group_and_atelier(pool: PgPool) {
    let services = services(pool);
    let group = services
        .devices
        .create_group(&DeviceGroupInput {
            name: "Cameras".to_string(),
            description: None,
        })
        .await
        .unwrap();
    let device_id = new_device(&services, 5).await;

    let grouped = services
        .devices
        .update(
            device_id,
            &UpdateDevice {
                group_id: Some(Some(group.id)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(grouped.group_id, Some(group.id));
    assert_eq!(grouped.atelier_id, Some(1));

    let cleared = services
        .devices
        .update(
            device_id,
            &UpdateDevice {
                group_id: Some(None),
                atelier_id: Some(None),
                max_loan_duration: Some(7),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.group_id, None);
    assert_eq!(cleared.atelier_id, None);
    assert_eq!(cleared.max_loan_duration, 7);
    assert_eq!(cleared.name, "Sony A7 III");
}

// ---------------------------------------------------------------------------
// Lifecycle sweep
// ---------------------------------------------------------------------------

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_stale_loan_completes_on_second_sweep(pool: PgPool) {
    let services = services(pool.clone());
    let device_id = new_device(&services, 5).await;
    let loan_id =
        insert_loan(&pool, device_id, at(2025, 1, 1, 9), at(2025, 1, 2, 9), LoanStatus::Upcoming).await;
    let now = at(2025, 1, 3, 0);

    let first = services.loans.sweep(now).await.unwrap();
    assert_eq!((first.activated, first.completed), (1, 0));
    assert_eq!(
        services.loans.get_loan(loan_id, now).await.unwrap().status,
        LoanStatus::Completed,
        "reading the loan sweeps again"
    );

    let settled = services.loans.sweep(now).await.unwrap();
    assert!(settled.is_empty());
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_sweep_never_touches_cancelled_loans(pool: PgPool) {
    let services = services(pool.clone());
    let device_id = new_device(&services, 5).await;
    insert_loan(&pool, device_id, at(2025, 1, 1, 9), at(2025, 1, 2, 9), LoanStatus::Cancelled).await;

    let report = services.loans.sweep(at(2026, 1, 1, 0)).await.unwrap();
    assert!(report.is_empty());
}

#[sqlx::test]
#[ignore = "requires DATABASE_URL"]
async fn test_user_loans_are_split_by_scope(pool: PgPool) {
    let services = services(pool.clone());
    let device_id = new_device(&services, 5).await;
    insert_loan(&pool, device_id, at(2025, 1, 1, 9), at(2025, 1, 2, 9), LoanStatus::Completed).await;
    insert_loan(&pool, device_id, at(2025, 3, 1, 9), at(2025, 3, 2, 9), LoanStatus::Upcoming).await;
    let now = at(2025, 2, 1, 0);

    let current = services
        .loans
        .list_user_loans(1, LoanScope::Current, now)
        .await
        .unwrap();
    let past = services
        .loans
        .list_user_loans(1, LoanScope::Past, now)
        .await
        .unwrap();

    assert_eq!(current.len(), 1);
    assert_eq!(current[0].status, LoanStatus::Upcoming);
    assert_eq!(past.len(), 1);
    assert_eq!(past[0].status, LoanStatus::Completed);
}
