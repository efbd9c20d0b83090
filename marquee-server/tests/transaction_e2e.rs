//! Commit and rollback behaviour of `TxScope` against a real database.
#![cfg(feature = "e2e")]

use anyhow::Result;
use axum::http::StatusCode;
use sqlx::PgPool;

use marquee_server::{
    db::TxScope,
    infra::errors::{AppError, AppResult},
};

async fn genre_count(pool: &PgPool) -> Result<i64> {
    Ok(sqlx::query_scalar("SELECT COUNT(*) FROM genres")
        .fetch_one(pool)
        .await?)
}

async fn insert_genre(scope: &mut TxScope, name: &str) -> AppResult<i64> {
    let id = sqlx::query_scalar("INSERT INTO genres (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(scope.conn())
        .await?;
    Ok(id)
}

#[sqlx::test(migrator = "marquee_server::MIGRATOR")]
async fn ok_result_commits(pool: PgPool) -> Result<()> {
    let mut scope = TxScope::begin(&pool, "test.commit").await?;
    let inserted = insert_genre(&mut scope, "Noir").await;
    let id = scope.finish(inserted).await?;

    assert!(id > 0);
    assert_eq!(genre_count(&pool).await?, 1);
    Ok(())
}

#[sqlx::test(migrator = "marquee_server::MIGRATOR")]
async fn err_result_rolls_back_and_keeps_the_error(pool: PgPool) -> Result<()> {
    let mut scope = TxScope::begin(&pool, "test.rollback").await?;
    let result = match insert_genre(&mut scope, "Noir").await {
        Ok(_) => Err::<i64, _>(AppError::not_found("director does not exist")),
        Err(err) => Err(err),
    };
    let err = scope.finish(result).await.unwrap_err();

    assert_eq!(err.status, StatusCode::NOT_FOUND);
    assert_eq!(err.message, "director does not exist");
    assert_eq!(genre_count(&pool).await?, 0);

    // The rolled back connection is usable again.
    let mut scope = TxScope::begin(&pool, "test.after_rollback").await?;
    let inserted = insert_genre(&mut scope, "Noir").await;
    scope.finish(inserted).await?;
    assert_eq!(genre_count(&pool).await?, 1);
    Ok(())
}

#[sqlx::test(migrator = "marquee_server::MIGRATOR")]
async fn commit_failure_is_returned(pool: PgPool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE deferred_refs (\
             id BIGINT PRIMARY KEY, \
             parent_id BIGINT REFERENCES deferred_refs (id) DEFERRABLE INITIALLY DEFERRED)",
    )
    .execute(&pool)
    .await?;

    let mut scope = TxScope::begin(&pool, "test.commit_failure").await?;
    // The dangling reference is only checked at COMMIT.
    let inserted: AppResult<()> =
        sqlx::query("INSERT INTO deferred_refs (id, parent_id) VALUES (1, 99)")
            .execute(scope.conn())
            .await
            .map(|_| ())
            .map_err(AppError::from);
    assert!(inserted.is_ok());

    let err = scope.finish(inserted).await.unwrap_err();
    assert_eq!(err.status, StatusCode::BAD_REQUEST);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM deferred_refs")
        .fetch_one(&pool)
        .await?;
    assert_eq!(rows, 0);
    Ok(())
}

#[sqlx::test(migrator = "marquee_server::MIGRATOR")]
async fn unavailable_error_discards_the_work(pool: PgPool) -> Result<()> {
    let mut scope = TxScope::begin(&pool, "test.unavailable").await?;
    let result = match insert_genre(&mut scope, "Noir").await {
        Ok(_) => Err::<i64, _>(AppError::unavailable("database went away")),
        Err(err) => Err(err),
    };
    let err = scope.finish(result).await.unwrap_err();

    assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(err.db_unavailable);
    assert_eq!(genre_count(&pool).await?, 0);
    Ok(())
}
