// src/ledger.rs

//! Credits ledger. Balances are the sum of an append-only list of entries;
//! debits are conditional inserts so a balance never goes below zero.

use chrono::Utc;
use sqlx::{Executor, Sqlite};

use crate::{error::AppError, models::credit::LedgerEntry};

pub async fn balance<'e, E>(executor: E, user_id: i64) -> Result<i64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_scalar::<_, i64>(
        "SELECT COALESCE(SUM(delta), 0) FROM credit_ledger WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_one(executor)
    .await
}

/// Adds `amount` credits. Zero or negative amounts are rejected.
pub async fn grant<'e, E>(executor: E, user_id: i64, amount: i64, reason: &str) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    if amount <= 0 {
        return Err(AppError::BadRequest("Grant amount must be positive".to_string()));
    }

    sqlx::query("INSERT INTO credit_ledger (user_id, delta, reason, created_at) VALUES (?, ?, ?, ?)")
        .bind(user_id)
        .bind(amount)
        .bind(reason)
        .bind(Utc::now())
        .execute(executor)
        .await?;

    Ok(())
}

/// Takes `amount` credits if the balance covers them.
/// Returns `false` (and writes nothing) when it does not.
pub async fn debit<'e, E>(executor: E, user_id: i64, amount: i64, reason: &str) -> Result<bool, AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    if amount < 0 {
        return Err(AppError::BadRequest("Debit amount must not be negative".to_string()));
    }
    if amount == 0 {
        return Ok(true);
    }

    let result = sqlx::query(
        r#"
        INSERT INTO credit_ledger (user_id, delta, reason, created_at)
        SELECT ?1, -?2, ?3, ?4
        WHERE (SELECT COALESCE(SUM(delta), 0) FROM credit_ledger WHERE user_id = ?1) >= ?2
        "#,
    )
    .bind(user_id)
    .bind(amount)
    .bind(reason)
    .bind(Utc::now())
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Gives back part of an earlier debit.
pub async fn refund<'e, E>(executor: E, user_id: i64, amount: i64, reason: &str) -> Result<(), AppError>
where
    E: Executor<'e, Database = Sqlite>,
{
    if amount <= 0 {
        return Ok(());
    }
    grant(executor, user_id, amount, &format!("refund: {}", reason)).await
}

/// Most recent entries first.
pub async fn recent_entries<'e, E>(executor: E, user_id: i64, limit: i64) -> Result<Vec<LedgerEntry>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, LedgerEntry>(
        r#"
        SELECT id, delta, reason, created_at
        FROM credit_ledger
        WHERE user_id = ?
        ORDER BY id DESC
        LIMIT ?
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(executor)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn pool_with_user() -> (sqlx::SqlitePool, i64) {
        let pool = db::connect("sqlite::memory:", 1).await.unwrap();
        db::migrate(&pool).await.unwrap();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO users (username, password, role, created_at) VALUES ('ledger', 'x', 'user', ?) RETURNING id",
        )
        .bind(Utc::now())
        .fetch_one(&pool)
        .await
        .unwrap();
        (pool, id)
    }

    #[tokio::test]
    async fn debit_never_overdraws() {
        let (pool, user) = pool_with_user().await;
        grant(&pool, user, 10, "signup").await.unwrap();

        assert!(debit(&pool, user, 7, "chat").await.unwrap());
        assert!(!debit(&pool, user, 7, "chat").await.unwrap());
        assert_eq!(balance(&pool, user).await.unwrap(), 3);

        refund(&pool, user, 2, "chat").await.unwrap();
        assert_eq!(balance(&pool, user).await.unwrap(), 5);

        let entries = recent_entries(&pool, user, 10).await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].reason, "refund: chat");
        assert_eq!(entries[1].delta, -7);
    }

    #[tokio::test]
    async fn concurrent_debits_never_overdraw() {
        let path = std::env::temp_dir().join(format!("nucleus-ledger-{}.db", uuid::Uuid::new_v4()));
        let pool = db::connect(&format!("sqlite://{}", path.display()), 8).await.unwrap();
        db::migrate(&pool).await.unwrap();
        let user: i64 = sqlx::query_scalar(
            "INSERT INTO users (username, password, role, created_at) VALUES ('race', 'x', 'user', ?) RETURNING id",
        )
        .bind(Utc::now())
        .fetch_one(&pool)
        .await
        .unwrap();
        grant(&pool, user, 50, "signup").await.unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..40 {
            let pool = pool.clone();
            tasks.spawn(async move { debit(&pool, user, 3, "race").await });
        }

        let mut applied = 0;
        while let Some(joined) = tasks.join_next().await {
            if joined.unwrap().unwrap() {
                applied += 1;
            }
        }

        assert_eq!(applied, 16);
        assert_eq!(balance(&pool, user).await.unwrap(), 2);

        pool.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }

    #[tokio::test]
    async fn non_positive_grants_are_rejected() {
        let (pool, user) = pool_with_user().await;
        assert!(matches!(
            grant(&pool, user, 0, "nothing").await,
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(balance(&pool, user).await.unwrap(), 0);
    }
}
