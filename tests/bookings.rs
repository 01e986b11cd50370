mod common;

use servicehub::bookings::{
    self,
    status::check_invariant,
    Actor, Booking, BookingError, BookingStatus, NewBooking, PaymentMethod,
};
use sqlx::SqlitePool;

async fn booking(db_pool: &SqlitePool, method: PaymentMethod) -> Booking {
    bookings::store::insert(db_pool, NewBooking {
        customer_id: "c1".to_owned(),
        provider_id: "p1".to_owned(),
        service_id: "s1".to_owned(),
        service_name: "Plumbing".to_owned(),
        category: "plumbing".to_owned(),
        amount: 800,
        address: "Kenyatta Road 4".to_owned(),
        city: "Mombasa".to_owned(),
        delivery_date: "2026-11-10".to_owned(),
        payment_method: method,
    })
    .await
    .unwrap()
}

fn booking_error(err: &servicehub::AppError) -> &BookingError {
    err.downcast_ref::<BookingError>().unwrap()
}

#[tokio::test]
async fn cash_booking_runs_to_completion_and_counts_as_earnings() {
    let db_pool = common::pool().await;
    let placed = booking(&db_pool, PaymentMethod::Cash).await;

    for next in [BookingStatus::WaitingForWork, BookingStatus::InProgress] {
        let moved = bookings::store::transition(&db_pool, &placed.id, Actor::Provider, next).await.unwrap();
        assert_eq!(moved.status, next);
        assert!(!moved.paid);
    }
    let done = bookings::store::transition(&db_pool, &placed.id, Actor::Provider, BookingStatus::Completed).await.unwrap();
    assert!(done.paid);
    assert_eq!(done.version, 3);

    let earnings = bookings::store::earnings(&db_pool, "p1").await.unwrap();
    assert_eq!(earnings.completed_jobs, 1);
    assert_eq!(earnings.completed_total, 800);
    assert_eq!(earnings.pending_payout, 0);
}

#[tokio::test]
async fn provider_cannot_start_unpaid_mobile_money_work() {
    let db_pool = common::pool().await;
    let placed = booking(&db_pool, PaymentMethod::MobileMoney).await;

    let err = bookings::store::transition(&db_pool, &placed.id, Actor::Provider, BookingStatus::WaitingForWork)
        .await
        .err()
        .unwrap();
    assert!(matches!(booking_error(&err), BookingError::NotAllowed { .. }));

    let unchanged = bookings::store::fetch(&db_pool, &placed.id).await.unwrap();
    assert_eq!(unchanged.status, BookingStatus::Pending);
    assert_eq!(unchanged.version, 0);
}

#[tokio::test]
async fn terminal_bookings_stay_put() {
    let db_pool = common::pool().await;
    let placed = booking(&db_pool, PaymentMethod::MobileMoney).await;
    bookings::store::transition(&db_pool, &placed.id, Actor::Payment, BookingStatus::PaymentFailed).await.unwrap();

    for next in BookingStatus::ALL {
        for actor in [Actor::Customer, Actor::Provider, Actor::Payment] {
            assert!(bookings::store::transition(&db_pool, &placed.id, actor, next).await.is_err());
        }
    }
    let failed = bookings::store::fetch(&db_pool, &placed.id).await.unwrap();
    assert_eq!(failed.status, BookingStatus::PaymentFailed);
    assert!(!failed.paid);
}

#[tokio::test]
async fn cancelling_paid_work_clears_paid() {
    let db_pool = common::pool().await;
    let placed = booking(&db_pool, PaymentMethod::MobileMoney).await;
    let paid = bookings::store::transition(&db_pool, &placed.id, Actor::Payment, BookingStatus::WaitingForWork).await.unwrap();
    assert!(paid.paid);

    let earnings = bookings::store::earnings(&db_pool, "p1").await.unwrap();
    assert_eq!(earnings.pending_payout, 800);

    let cancelled = bookings::store::transition(&db_pool, &placed.id, Actor::Provider, BookingStatus::Cancelled).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert!(!cancelled.paid);
    assert_eq!(bookings::store::earnings(&db_pool, "p1").await.unwrap().pending_payout, 0);
}

#[tokio::test]
async fn customer_may_only_cancel_pending() {
    let db_pool = common::pool().await;
    let placed = booking(&db_pool, PaymentMethod::Cash).await;

    let err = bookings::store::transition(&db_pool, &placed.id, Actor::Customer, BookingStatus::WaitingForWork)
        .await
        .err()
        .unwrap();
    assert!(matches!(booking_error(&err), BookingError::NotAllowed { .. }));

    let cancelled = bookings::store::transition(&db_pool, &placed.id, Actor::Customer, BookingStatus::Cancelled).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
}

/// A provider cancel racing the payment confirmation must never leave a
/// cancelled booking marked paid, whichever write lands first.
#[tokio::test]
async fn cancel_racing_confirmation_stays_consistent() {
    for _ in 0..10 {
        let db_pool = common::pool().await;
        let placed = booking(&db_pool, PaymentMethod::MobileMoney).await;

        let (confirmed, cancelled) = tokio::join!(
            bookings::store::transition(&db_pool, &placed.id, Actor::Payment, BookingStatus::WaitingForWork),
            bookings::store::transition(&db_pool, &placed.id, Actor::Provider, BookingStatus::Cancelled),
        );
        assert!(cancelled.is_ok());

        let settled = bookings::store::fetch(&db_pool, &placed.id).await.unwrap();
        assert_eq!(settled.status, BookingStatus::Cancelled);
        assert!(!settled.paid);
        assert!(check_invariant(settled.payment_method, settled.status, settled.paid).is_ok());

        if let Err(err) = confirmed {
            assert!(matches!(booking_error(&err), BookingError::InvalidTransition { .. }));
        }
    }
}

#[tokio::test]
async fn unknown_booking_is_not_found() {
    let db_pool = common::pool().await;
    let err = bookings::store::transition(&db_pool, "missing", Actor::Provider, BookingStatus::Cancelled)
        .await
        .err()
        .unwrap();
    assert_eq!(err.status(), axum::http::StatusCode::NOT_FOUND);
}
