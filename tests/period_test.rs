mod common;

use std::sync::Arc;

use anyhow::Result;
use chrono::NaiveDate;
use common::{
    create_user, item, parse_date, test_service_with_clock, test_service_with_pool, ManualClock,
};
use solvo::application::{AppError, StatementService};
use solvo::domain::{Grade, StatementId, UserId};

/// Create one statement per date for the user, returning their ids in order.
async fn statements_on(
    service: &StatementService,
    clock: &Arc<ManualClock>,
    user_id: UserId,
    dates: &[&str],
) -> Result<Vec<StatementId>> {
    let mut ids = Vec::new();
    for date in dates {
        clock.set(parse_date(date));
        let statement = service
            .create_statement(user_id, &[item("Salary", 1000.0)], &[item("Rent", 100.0)])
            .await?;
        ids.push(statement.id);
    }
    Ok(ids)
}

fn ids_of(statements: &[solvo::domain::Statement]) -> Vec<StatementId> {
    statements.iter().map(|s| s.id).collect()
}

#[tokio::test]
async fn test_period_bounds_are_inclusive() -> Result<()> {
    let (service, clock, _temp) = test_service_with_clock().await?;
    let user = create_user(&service, "alice").await?;

    let ids = statements_on(
        &service,
        &clock,
        user.id,
        &["2024-01-05", "2024-01-10", "2024-01-20", "2024-02-01"],
    )
    .await?;

    let statements = service
        .get_statements_in_period(
            user.id,
            Some(parse_date("2024-01-10")),
            Some(parse_date("2024-01-20")),
        )
        .await?;

    assert_eq!(ids_of(&statements), vec![ids[1], ids[2]]);

    Ok(())
}

#[tokio::test]
async fn test_start_only_is_open_ended() -> Result<()> {
    let (service, clock, _temp) = test_service_with_clock().await?;
    let user = create_user(&service, "alice").await?;

    let ids = statements_on(
        &service,
        &clock,
        user.id,
        &["2023-12-31", "2024-01-01", "2030-06-01"],
    )
    .await?;

    let statements = service
        .get_statements_in_period(user.id, Some(parse_date("2024-01-01")), None)
        .await?;

    assert_eq!(ids_of(&statements), vec![ids[1], ids[2]]);

    Ok(())
}

#[tokio::test]
async fn test_end_only_is_open_ended() -> Result<()> {
    let (service, clock, _temp) = test_service_with_clock().await?;
    let user = create_user(&service, "alice").await?;

    let ids = statements_on(
        &service,
        &clock,
        user.id,
        &["1999-01-01", "2024-01-01", "2024-01-02"],
    )
    .await?;

    let statements = service
        .get_statements_in_period(user.id, None, Some(parse_date("2024-01-01")))
        .await?;

    assert_eq!(ids_of(&statements), vec![ids[0], ids[1]]);

    Ok(())
}

#[tokio::test]
async fn test_no_bounds_returns_everything_in_id_order() -> Result<()> {
    let (service, clock, _temp) = test_service_with_clock().await?;
    let user = create_user(&service, "alice").await?;

    // Created out of chronological order
    let ids = statements_on(
        &service,
        &clock,
        user.id,
        &["2024-05-01", "2024-01-01", "2024-03-01"],
    )
    .await?;

    let statements = service.get_statements_in_period(user.id, None, None).await?;

    assert_eq!(ids_of(&statements), ids);
    assert!(statements.iter().all(|s| s.incomes.len() == 1));
    assert!(statements.iter().all(|s| s.expenditures.len() == 1));

    Ok(())
}

#[tokio::test]
async fn test_empty_period_is_statement_not_found() -> Result<()> {
    let (service, clock, _temp) = test_service_with_clock().await?;
    let user = create_user(&service, "alice").await?;

    statements_on(&service, &clock, user.id, &["2024-01-15"]).await?;

    let err = service
        .get_statements_in_period(
            user.id,
            Some(parse_date("2024-02-01")),
            Some(parse_date("2024-02-28")),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::StatementNotFound));

    // Start after end matches nothing either
    let err = service
        .get_statements_in_period(
            user.id,
            Some(parse_date("2024-01-20")),
            Some(parse_date("2024-01-10")),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::StatementNotFound));

    Ok(())
}

#[tokio::test]
async fn test_user_without_statements_is_statement_not_found() -> Result<()> {
    let (service, _clock, _temp) = test_service_with_clock().await?;
    let user = create_user(&service, "alice").await?;

    let err = service
        .get_statements_in_period(user.id, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::StatementNotFound));

    Ok(())
}

#[tokio::test]
async fn test_period_for_unknown_user() -> Result<()> {
    let (service, _clock, _temp) = test_service_with_clock().await?;

    let err = service
        .get_statements_in_period(5, None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::UserNotFound(5)));

    Ok(())
}

#[tokio::test]
async fn test_period_only_returns_own_statements() -> Result<()> {
    let (service, clock, _temp) = test_service_with_clock().await?;
    let alice = create_user(&service, "alice").await?;
    let bob = create_user(&service, "bob").await?;

    let alice_ids = statements_on(&service, &clock, alice.id, &["2024-01-10"]).await?;
    statements_on(&service, &clock, bob.id, &["2024-01-10", "2024-01-11"]).await?;

    let statements = service
        .get_statements_in_period(alice.id, Some(parse_date("2024-01-01")), None)
        .await?;

    assert_eq!(ids_of(&statements), alice_ids);
    assert!(statements.iter().all(|s| s.user_id == alice.id));

    Ok(())
}

#[tokio::test]
async fn test_period_query_with_many_statements() -> Result<()> {
    let (service, pool, _temp) = test_service_with_pool().await?;
    let user = create_user(&service, "alice").await?;

    // More statements than SQLite allows bound parameters in one query
    sqlx::query(
        r#"
        WITH RECURSIVE seq(n) AS (SELECT 1 UNION ALL SELECT n + 1 FROM seq WHERE n < 33000)
        INSERT INTO statements (user_id, report_date)
        SELECT ?, '2024-01-01T00:00:00.000000Z' FROM seq
        "#,
    )
    .bind(user.id)
    .execute(&pool)
    .await?;
    sqlx::query(
        "INSERT INTO income (category, amount, statement_id) SELECT 'Salary', 100.0, id FROM statements WHERE user_id = ?",
    )
    .bind(user.id)
    .execute(&pool)
    .await?;
    sqlx::query(
        "INSERT INTO expenditure (category, amount, statement_id) SELECT 'Rent', 25.0, id FROM statements WHERE user_id = ?",
    )
    .bind(user.id)
    .execute(&pool)
    .await?;

    let statements = service.get_statements_in_period(user.id, None, None).await?;
    assert_eq!(statements.len(), 33000);
    assert!(statements.iter().all(|s| s.incomes.len() == 1 && s.expenditures.len() == 1));

    let rating = service
        .calculate_period_rating(user.id, Some(parse_date("2024-01-01")), None)
        .await?;
    assert_eq!(rating.total_income, 3_300_000.0);
    assert_eq!(rating.total_expenditure, 825_000.0);
    assert_eq!(rating.grade, Grade::B);

    Ok(())
}

#[tokio::test]
async fn test_sub_microsecond_bounds_do_not_widen_the_period() -> Result<()> {
    let (service, clock, _temp) = test_service_with_clock().await?;
    let user = create_user(&service, "alice").await?;

    let at_nanos = |nanos: u32| {
        NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_nano_opt(12, 0, 0, nanos)
            .unwrap()
            .and_utc()
    };

    clock.set(at_nanos(123_456_100));
    let statement = service
        .create_statement(user.id, &[item("Salary", 1000.0)], &[])
        .await?;

    // Report dates are kept at microsecond precision
    assert_eq!(statement.report_date, at_nanos(123_456_000));

    let err = service
        .get_statements_in_period(user.id, Some(at_nanos(123_456_600)), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::StatementNotFound));

    let err = service
        .get_statements_in_period(user.id, None, Some(at_nanos(123_455_900)))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::StatementNotFound));

    let statements = service
        .get_statements_in_period(
            user.id,
            Some(at_nanos(123_456_000)),
            Some(at_nanos(123_456_999)),
        )
        .await?;
    assert_eq!(ids_of(&statements), vec![statement.id]);

    Ok(())
}
