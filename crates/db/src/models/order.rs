use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool, Type};
use strum_macros::{Display, EnumString};
use ts_rs::TS;
use uuid::Uuid;

use super::{
    order_location::{NewOrderLocation, OrderLocation},
    order_user::OrderUser,
    vehicle::{Vehicle, VehicleParams},
};

#[derive(
    Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display, Default,
)]
#[sqlx(type_name = "order_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Draft,
    UnderReview,
    AwaitingShipment,
    Scheduled,
    PickedUp,
    Delivered,
    OnHold,
    Cancelled,
    Claim,
}

/// Why an order was cancelled. Only ever written together with
/// `OrderStatus::Cancelled`.
#[derive(Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display)]
#[sqlx(type_name = "order_cancel_reason", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CancelReason {
    CustomerRequest,
    CarrierFellThrough,
    PriceDisagreement,
    Duplicate,
    Other,
}

/// Qualifier for a pickup/delivery date.
#[derive(Debug, Clone, Type, Serialize, Deserialize, PartialEq, TS, EnumString, Display)]
#[sqlx(type_name = "order_date_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DateType {
    Exact,
    Estimated,
    Flexible,
}

/// A shipment order. Identified toward clients by `readable_id`; the
/// numeric `id` stays internal. Rows are never deleted, archival is the
/// `is_archive` flag.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Order {
    pub id: i64,
    pub readable_id: String,
    pub status: OrderStatus,
    pub cancel_reason: Option<CancelReason>,

    pub company_id: Option<String>,
    pub client_phone: Option<String>,
    pub client_special_instructions: Option<String>,

    pub pickup_from_id: Option<i64>,
    pub deliver_to_id: Option<i64>,
    pub pickup_from_special_instructions: Option<String>,
    pub deliver_to_special_instructions: Option<String>,
    pub distance: Option<String>,

    pub ship_date: Option<NaiveDate>,
    pub pickup_date: Option<NaiveDate>,
    pub pickup_date_type: Option<DateType>,
    pub delivery_date: Option<NaiveDate>,
    pub delivery_date_type: Option<DateType>,
    pub delivery_speed: Option<String>,
    pub schedule_special_instructions: Option<String>,

    // Pricing fields are free text on the wire.
    pub carrier_price: Option<String>,
    pub broker_fee: Option<String>,
    pub valid_till: Option<NaiveDate>,

    pub dispatcher_name: Option<String>,
    pub dispatcher_phone: Option<String>,
    pub dispatcher_show_to_client: Option<bool>,
    pub driver_name: Option<String>,
    pub driver_phone: Option<String>,
    pub driver_show_to_client: Option<bool>,
    pub driver_special_instructions: Option<String>,
    pub carrier_name: Option<String>,
    pub carrier_phone: Option<String>,
    pub carrier_show_to_client: Option<bool>,
    pub carrier_special_instructions: Option<String>,

    pub is_archive: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full insert payload for the create path. Each route endpoint arrives as
/// either an existing location id or an inline payload, never both.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CreateOrderAndVehiclesInput {
    pub company_id: Option<String>,
    pub user_ids: Vec<Uuid>,
    pub client_phone: Option<String>,
    pub client_special_instructions: Option<String>,

    pub vehicles: Vec<VehicleParams>,

    pub pickup_from_id: Option<i64>,
    pub pickup_from_json: Option<NewOrderLocation>,
    pub deliver_to_id: Option<i64>,
    pub deliver_to_json: Option<NewOrderLocation>,
    pub pickup_from_special_instructions: Option<String>,
    pub deliver_to_special_instructions: Option<String>,
    pub distance: Option<String>,

    pub ship_date: Option<NaiveDate>,
    pub pickup_date: Option<NaiveDate>,
    pub pickup_date_type: Option<DateType>,
    pub delivery_date: Option<NaiveDate>,
    pub delivery_date_type: Option<DateType>,
    pub delivery_speed: Option<String>,
    pub schedule_special_instructions: Option<String>,
}

/// Column set written by the edit path. The user list and the vehicle list
/// are not mutable through this path and have no counterpart here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct UpdateOrder {
    pub company_id: Option<String>,
    pub client_phone: Option<String>,
    pub client_special_instructions: Option<String>,

    pub pickup_from_id: Option<i64>,
    pub deliver_to_id: Option<i64>,
    pub pickup_from_special_instructions: Option<String>,
    pub deliver_to_special_instructions: Option<String>,
    pub distance: Option<String>,

    pub ship_date: Option<NaiveDate>,
    pub pickup_date: Option<NaiveDate>,
    pub pickup_date_type: Option<DateType>,
    pub delivery_date: Option<NaiveDate>,
    pub delivery_date_type: Option<DateType>,
    pub delivery_speed: Option<String>,
    pub schedule_special_instructions: Option<String>,

    pub status: OrderStatus,
    /// Written only when present; an edit without one leaves the stored
    /// reason untouched.
    pub cancel_reason: Option<CancelReason>,

    pub carrier_price: Option<String>,
    pub broker_fee: Option<String>,
    pub valid_till: Option<NaiveDate>,

    pub dispatcher_name: Option<String>,
    pub dispatcher_phone: Option<String>,
    pub dispatcher_show_to_client: Option<bool>,
    pub driver_name: Option<String>,
    pub driver_phone: Option<String>,
    pub driver_show_to_client: Option<bool>,
    pub driver_special_instructions: Option<String>,
    pub carrier_name: Option<String>,
    pub carrier_phone: Option<String>,
    pub carrier_show_to_client: Option<bool>,
    pub carrier_special_instructions: Option<String>,
}

/// What a successful write hands back to the caller: the readable id for
/// cache keying, plus the internal id when the write created the row.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct OrderWriteReceipt {
    pub order_id: Option<i64>,
    pub order_readable_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct OrderListFilter {
    pub is_archive: bool,
    pub status: Option<OrderStatus>,
    pub company_id: Option<String>,
    /// Restrict to orders the given user is assigned to.
    pub user_id: Option<Uuid>,
}

impl Order {
    /// Create an order together with its vehicles, user assignments and
    /// any not-yet-persisted route endpoints, as one transaction. Inline
    /// endpoint payloads keep their coordinates on this path. The readable
    /// id is minted from the fresh row id before the transaction commits.
    pub async fn create_with_vehicles(
        pool: &SqlitePool,
        input: &CreateOrderAndVehiclesInput,
    ) -> Result<Option<OrderWriteReceipt>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let pickup_from_id = match (input.pickup_from_id, &input.pickup_from_json) {
            (Some(id), _) => Some(id),
            (None, Some(attrs)) => Some(OrderLocation::insert(&mut *tx, attrs).await?),
            (None, None) => None,
        };
        let deliver_to_id = match (input.deliver_to_id, &input.deliver_to_json) {
            (Some(id), _) => Some(id),
            (None, Some(attrs)) => Some(OrderLocation::insert(&mut *tx, attrs).await?),
            (None, None) => None,
        };

        let result = sqlx::query(
            r#"INSERT INTO orders (status, company_id, client_phone, client_special_instructions, pickup_from_id, deliver_to_id, pickup_from_special_instructions, deliver_to_special_instructions, distance, ship_date, pickup_date, pickup_date_type, delivery_date, delivery_date_type, delivery_speed, schedule_special_instructions)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)"#,
        )
        .bind(OrderStatus::default())
        .bind(&input.company_id)
        .bind(&input.client_phone)
        .bind(&input.client_special_instructions)
        .bind(pickup_from_id)
        .bind(deliver_to_id)
        .bind(&input.pickup_from_special_instructions)
        .bind(&input.deliver_to_special_instructions)
        .bind(&input.distance)
        .bind(input.ship_date)
        .bind(input.pickup_date)
        .bind(&input.pickup_date_type)
        .bind(input.delivery_date)
        .bind(&input.delivery_date_type)
        .bind(&input.delivery_speed)
        .bind(&input.schedule_special_instructions)
        .execute(&mut *tx)
        .await?;

        let order_id = result.last_insert_rowid();
        let readable_id = utils::ids::readable_order_id(order_id);
        sqlx::query("UPDATE orders SET readable_id = $2 WHERE id = $1")
            .bind(order_id)
            .bind(&readable_id)
            .execute(&mut *tx)
            .await?;

        for vehicle in &input.vehicles {
            let vehicle_id = Vehicle::insert(&mut *tx, vehicle).await?;
            Vehicle::link_to_order(&mut *tx, order_id, vehicle_id).await?;
        }

        for user_id in &input.user_ids {
            OrderUser::insert(&mut *tx, order_id, *user_id).await?;
        }

        let receipt = sqlx::query_as::<_, OrderWriteReceipt>(
            "SELECT id AS order_id, readable_id AS order_readable_id FROM orders WHERE id = $1",
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(receipt)
    }

    /// The single edit-path statement. Every edit-path column is written as
    /// given except `cancel_reason`, which is merged only when present.
    pub async fn update_by_readable_id(
        pool: &SqlitePool,
        readable_id: &str,
        data: &UpdateOrder,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"UPDATE orders
               SET company_id = $2,
                   client_phone = $3,
                   client_special_instructions = $4,
                   pickup_from_id = $5,
                   deliver_to_id = $6,
                   pickup_from_special_instructions = $7,
                   deliver_to_special_instructions = $8,
                   distance = $9,
                   ship_date = $10,
                   pickup_date = $11,
                   pickup_date_type = $12,
                   delivery_date = $13,
                   delivery_date_type = $14,
                   delivery_speed = $15,
                   schedule_special_instructions = $16,
                   status = $17,
                   cancel_reason = COALESCE($18, cancel_reason),
                   carrier_price = $19,
                   broker_fee = $20,
                   valid_till = $21,
                   dispatcher_name = $22,
                   dispatcher_phone = $23,
                   dispatcher_show_to_client = $24,
                   driver_name = $25,
                   driver_phone = $26,
                   driver_show_to_client = $27,
                   driver_special_instructions = $28,
                   carrier_name = $29,
                   carrier_phone = $30,
                   carrier_show_to_client = $31,
                   carrier_special_instructions = $32,
                   updated_at = CURRENT_TIMESTAMP
               WHERE readable_id = $1"#,
        )
        .bind(readable_id)
        .bind(&data.company_id)
        .bind(&data.client_phone)
        .bind(&data.client_special_instructions)
        .bind(data.pickup_from_id)
        .bind(data.deliver_to_id)
        .bind(&data.pickup_from_special_instructions)
        .bind(&data.deliver_to_special_instructions)
        .bind(&data.distance)
        .bind(data.ship_date)
        .bind(data.pickup_date)
        .bind(&data.pickup_date_type)
        .bind(data.delivery_date)
        .bind(&data.delivery_date_type)
        .bind(&data.delivery_speed)
        .bind(&data.schedule_special_instructions)
        .bind(&data.status)
        .bind(&data.cancel_reason)
        .bind(&data.carrier_price)
        .bind(&data.broker_fee)
        .bind(data.valid_till)
        .bind(&data.dispatcher_name)
        .bind(&data.dispatcher_phone)
        .bind(data.dispatcher_show_to_client)
        .bind(&data.driver_name)
        .bind(&data.driver_phone)
        .bind(data.driver_show_to_client)
        .bind(&data.driver_special_instructions)
        .bind(&data.carrier_name)
        .bind(&data.carrier_phone)
        .bind(data.carrier_show_to_client)
        .bind(&data.carrier_special_instructions)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn update_status(
        pool: &SqlitePool,
        readable_id: &str,
        status: OrderStatus,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE orders SET status = $2, updated_at = CURRENT_TIMESTAMP WHERE readable_id = $1",
        )
        .bind(readable_id)
        .bind(status)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Cancellation is allowed from any status; there is no transition
    /// check.
    pub async fn cancel(
        pool: &SqlitePool,
        readable_id: &str,
        reason: CancelReason,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE orders SET status = $2, cancel_reason = $3, updated_at = CURRENT_TIMESTAMP WHERE readable_id = $1",
        )
        .bind(readable_id)
        .bind(OrderStatus::Cancelled)
        .bind(reason)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn find_by_readable_id(
        pool: &SqlitePool,
        readable_id: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"SELECT id, readable_id, status, cancel_reason, company_id, client_phone, client_special_instructions, pickup_from_id, deliver_to_id, pickup_from_special_instructions, deliver_to_special_instructions, distance, ship_date, pickup_date, pickup_date_type, delivery_date, delivery_date_type, delivery_speed, schedule_special_instructions, carrier_price, broker_fee, valid_till, dispatcher_name, dispatcher_phone, dispatcher_show_to_client, driver_name, driver_phone, driver_show_to_client, driver_special_instructions, carrier_name, carrier_phone, carrier_show_to_client, carrier_special_instructions, is_archive, created_at, updated_at
               FROM orders
               WHERE readable_id = $1"#,
        )
        .bind(readable_id)
        .fetch_optional(pool)
        .await
    }

    /// Newest-first listing with the filter combinations the order list
    /// views use.
    pub async fn list(
        pool: &SqlitePool,
        filter: &OrderListFilter,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"SELECT o.id, o.readable_id, o.status, o.cancel_reason, o.company_id, o.client_phone, o.client_special_instructions, o.pickup_from_id, o.deliver_to_id, o.pickup_from_special_instructions, o.deliver_to_special_instructions, o.distance, o.ship_date, o.pickup_date, o.pickup_date_type, o.delivery_date, o.delivery_date_type, o.delivery_speed, o.schedule_special_instructions, o.carrier_price, o.broker_fee, o.valid_till, o.dispatcher_name, o.dispatcher_phone, o.dispatcher_show_to_client, o.driver_name, o.driver_phone, o.driver_show_to_client, o.driver_special_instructions, o.carrier_name, o.carrier_phone, o.carrier_show_to_client, o.carrier_special_instructions, o.is_archive, o.created_at, o.updated_at
               FROM orders o
               WHERE o.is_archive = $1
                 AND ($2 IS NULL OR o.status = $2)
                 AND ($3 IS NULL OR o.company_id = $3)
                 AND ($4 IS NULL OR EXISTS (
                     SELECT 1 FROM order_users ou
                     WHERE ou.order_id = o.id AND ou.user_id = $4
                 ))
               ORDER BY o.created_at DESC, o.id DESC"#,
        )
        .bind(filter.is_archive)
        .bind(&filter.status)
        .bind(&filter.company_id)
        .bind(filter.user_id)
        .fetch_all(pool)
        .await
    }
}
