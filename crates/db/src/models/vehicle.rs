use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use ts_rs::TS;

/// One line item of an order. Vehicles are created as part of writing the
/// order that owns them and linked through `order_vehicles`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Vehicle {
    pub id: i64,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<String>,
    pub vin: Option<String>,
    pub vehicle_type: Option<String>,
    pub is_inoperable: bool,
    pub created_at: DateTime<Utc>,
}

/// Insert shape for a vehicle row, as formatted from a vehicle draft.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct VehicleParams {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<String>,
    pub vin: Option<String>,
    pub vehicle_type: Option<String>,
    pub is_inoperable: bool,
}

impl Vehicle {
    pub async fn insert<'e, E>(executor: E, data: &VehicleParams) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO vehicles (make, model, year, vin, vehicle_type, is_inoperable)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING id"#,
        )
        .bind(&data.make)
        .bind(&data.model)
        .bind(&data.year)
        .bind(&data.vin)
        .bind(&data.vehicle_type)
        .bind(data.is_inoperable)
        .fetch_one(executor)
        .await
    }

    pub async fn link_to_order<'e, E>(
        executor: E,
        order_id: i64,
        vehicle_id: i64,
    ) -> Result<(), sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query("INSERT INTO order_vehicles (order_id, vehicle_id) VALUES ($1, $2)")
            .bind(order_id)
            .bind(vehicle_id)
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn find_by_order_id(
        pool: &SqlitePool,
        order_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"SELECT v.id, v.make, v.model, v.year, v.vin, v.vehicle_type, v.is_inoperable, v.created_at
               FROM vehicles v
               JOIN order_vehicles ov ON ov.vehicle_id = v.id
               WHERE ov.order_id = $1
               ORDER BY v.id"#,
        )
        .bind(order_id)
        .fetch_all(pool)
        .await
    }
}
