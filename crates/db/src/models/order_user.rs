use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

/// Join row granting a user visibility of an order.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct OrderUser {
    pub id: i64,
    pub order_id: i64,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl OrderUser {
    pub async fn insert<'e, E>(
        executor: E,
        order_id: i64,
        user_id: Uuid,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query("INSERT INTO order_users (order_id, user_id) VALUES ($1, $2)")
            .bind(order_id)
            .bind(user_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Assign every user in `users` to the order in one transaction. Any
    /// failing pair rolls back the whole batch. An empty slice is a no-op.
    pub async fn assign_many(
        pool: &SqlitePool,
        order_id: i64,
        users: &[Uuid],
    ) -> Result<(), sqlx::Error> {
        if users.is_empty() {
            return Ok(());
        }

        let mut tx = pool.begin().await?;
        for user_id in users {
            Self::insert(&mut *tx, order_id, *user_id).await?;
        }
        tx.commit().await
    }

    pub async fn user_ids_for_order(
        pool: &SqlitePool,
        order_id: i64,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        sqlx::query_scalar::<_, Uuid>(
            "SELECT user_id FROM order_users WHERE order_id = $1 ORDER BY id",
        )
        .bind(order_id)
        .fetch_all(pool)
        .await
    }
}
