use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use ts_rs::TS;
use uuid::Uuid;

/// A persisted pickup/delivery endpoint. Rows are shared between orders:
/// terminals are long-lived locations flagged with `is_terminal`, one-off
/// addresses are inserted as part of writing the order that references
/// them.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct OrderLocation {
    pub id: i64,
    pub business_name: Option<String>,
    pub location_type: Option<String>,
    pub zip: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub contact_name: Option<String>,
    pub contact_type: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_second_phone: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub is_terminal: bool,
    pub is_default_terminal: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Insert shape for a location row; also the inline-attributes payload a
/// draft carries when it references an endpoint that is not persisted yet.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct NewOrderLocation {
    pub business_name: Option<String>,
    pub location_type: Option<String>,
    pub zip: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub contact_name: Option<String>,
    pub contact_type: Option<String>,
    pub contact_phone: Option<String>,
    pub contact_second_phone: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub is_terminal: bool,
    pub is_default_terminal: bool,
    pub created_by: Option<Uuid>,
}

impl NewOrderLocation {
    /// Copy of the payload with the geographic coordinates dropped.
    pub fn without_coordinates(&self) -> Self {
        Self {
            lat: None,
            lng: None,
            ..self.clone()
        }
    }
}

impl OrderLocation {
    pub async fn insert<'e, E>(executor: E, data: &NewOrderLocation) -> Result<i64, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar::<_, i64>(
            r#"INSERT INTO order_locations (business_name, location_type, zip, address, city, state, contact_name, contact_type, contact_phone, contact_second_phone, lat, lng, is_terminal, is_default_terminal, created_by)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
               RETURNING id"#,
        )
        .bind(&data.business_name)
        .bind(&data.location_type)
        .bind(&data.zip)
        .bind(&data.address)
        .bind(&data.city)
        .bind(&data.state)
        .bind(&data.contact_name)
        .bind(&data.contact_type)
        .bind(&data.contact_phone)
        .bind(&data.contact_second_phone)
        .bind(data.lat)
        .bind(data.lng)
        .bind(data.is_terminal)
        .bind(data.is_default_terminal)
        .bind(data.created_by)
        .fetch_one(executor)
        .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"SELECT id, business_name, location_type, zip, address, city, state, contact_name, contact_type, contact_phone, contact_second_phone, lat, lng, is_terminal, is_default_terminal, created_by, created_at
               FROM order_locations
               WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"SELECT id, business_name, location_type, zip, address, city, state, contact_name, contact_type, contact_phone, contact_second_phone, lat, lng, is_terminal, is_default_terminal, created_by, created_at
               FROM order_locations
               ORDER BY id"#,
        )
        .fetch_all(pool)
        .await
    }

    /// Saved terminals belonging to one user.
    pub async fn find_terminals(
        pool: &SqlitePool,
        created_by: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"SELECT id, business_name, location_type, zip, address, city, state, contact_name, contact_type, contact_phone, contact_second_phone, lat, lng, is_terminal, is_default_terminal, created_by, created_at
               FROM order_locations
               WHERE created_by = $1 AND is_terminal = 1
               ORDER BY id"#,
        )
        .bind(created_by)
        .fetch_all(pool)
        .await
    }
}
