//! Order write orchestration.
//!
//! Converts a validated order draft (create or edit) into exactly one
//! persistence call, resolving route endpoints that are not persisted
//! yet, and touches the cache keys the UI layer watches. Business
//! validation happens before a draft reaches this module.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use db::{
    DBService,
    models::{
        order::{
            CancelReason, CreateOrderAndVehiclesInput, DateType, Order, OrderStatus,
            OrderWriteReceipt, UpdateOrder,
        },
        order_location::{NewOrderLocation, OrderLocation},
        order_user::OrderUser,
        vehicle::VehicleParams,
    },
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;
use ts_rs::TS;
use utils::fmt::opt_date_to_naive;
use uuid::Uuid;

use super::cache::{CacheInvalidator, CacheKey};

#[derive(Debug, Error)]
pub enum OrderWriteError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("no receipt returned from order create")]
    MissingReceipt,
}

/// A route endpoint as the form hands it over: either an already
/// persisted location or the inline attributes to persist on demand.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
pub enum LocationRef {
    Existing(i64),
    Inline(NewOrderLocation),
}

impl LocationRef {
    /// Decompose into the (id, inline payload) pair the create payload
    /// carries; exactly one side is populated.
    fn split(self) -> (Option<i64>, Option<NewOrderLocation>) {
        match self {
            Self::Existing(id) => (Some(id), None),
            Self::Inline(attrs) => (None, Some(attrs)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct ClientSection {
    pub company_id: Option<String>,
    pub phone: Option<String>,
    /// Users who may view and act on the order. Written on the create
    /// path only.
    pub user_ids: Vec<Uuid>,
    pub instruction: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct RouteSection {
    pub pickup: LocationRef,
    pub delivery: LocationRef,
    pub distance: Option<String>,
    pub pickup_instruction: Option<String>,
    pub delivery_instruction: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct ScheduleSection {
    pub ship_date: Option<DateTime<Utc>>,
    pub pickup_date: Option<DateTime<Utc>>,
    pub pickup_date_type: Option<DateType>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub delivery_date_type: Option<DateType>,
    pub delivery_speed: Option<String>,
    pub instruction: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct VehicleDraft {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<String>,
    pub vin: Option<String>,
    pub vehicle_type: Option<String>,
    pub is_inoperable: bool,
}

impl VehicleDraft {
    fn to_params(&self) -> VehicleParams {
        VehicleParams {
            make: self.make.clone(),
            model: self.model.clone(),
            year: self.year.clone(),
            vin: self.vin.clone(),
            vehicle_type: self.vehicle_type.clone(),
            is_inoperable: self.is_inoperable,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct PaymentSection {
    pub carrier_price: Option<String>,
    pub broker_fee: Option<String>,
    pub valid_until: Option<DateTime<Utc>>,
}

/// Dispatcher/driver/carrier contact blocks, editable once an order is in
/// carrier hands.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
pub struct CarrierInfoSection {
    pub dispatcher_name: Option<String>,
    pub dispatcher_phone: Option<String>,
    pub dispatcher_show_to_client: Option<bool>,
    pub driver_name: Option<String>,
    pub driver_phone: Option<String>,
    pub driver_show_to_client: Option<bool>,
    pub driver_instruction: Option<String>,
    pub carrier_name: Option<String>,
    pub carrier_phone: Option<String>,
    pub carrier_show_to_client: Option<bool>,
    pub carrier_instruction: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CreateOrderDraft {
    pub client: ClientSection,
    pub vehicles: Vec<VehicleDraft>,
    pub route: RouteSection,
    pub schedule: ScheduleSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct EditOrderDraft {
    pub readable_id: String,
    pub status: OrderStatus,
    pub cancel_reason: Option<CancelReason>,
    pub client: ClientSection,
    /// Present on the edit form but not mutable through this path.
    pub vehicles: Vec<VehicleDraft>,
    pub route: RouteSection,
    pub schedule: ScheduleSection,
    pub payment: PaymentSection,
    pub carrier_info: CarrierInfoSection,
}

/// A client-side order form submission.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
pub enum OrderDraft {
    Create(CreateOrderDraft),
    Edit(EditOrderDraft),
}

impl CreateOrderDraft {
    fn into_input(self) -> CreateOrderAndVehiclesInput {
        let (pickup_from_id, pickup_from_json) = self.route.pickup.split();
        let (deliver_to_id, deliver_to_json) = self.route.delivery.split();

        CreateOrderAndVehiclesInput {
            company_id: self.client.company_id,
            user_ids: self.client.user_ids,
            client_phone: self.client.phone,
            client_special_instructions: self.client.instruction,
            vehicles: self.vehicles.iter().map(VehicleDraft::to_params).collect(),
            pickup_from_id,
            pickup_from_json,
            deliver_to_id,
            deliver_to_json,
            pickup_from_special_instructions: self.route.pickup_instruction,
            deliver_to_special_instructions: self.route.delivery_instruction,
            distance: self.route.distance,
            ship_date: opt_date_to_naive(self.schedule.ship_date.as_ref()),
            pickup_date: opt_date_to_naive(self.schedule.pickup_date.as_ref()),
            pickup_date_type: self.schedule.pickup_date_type,
            delivery_date: opt_date_to_naive(self.schedule.delivery_date.as_ref()),
            delivery_date_type: self.schedule.delivery_date_type,
            delivery_speed: self.schedule.delivery_speed,
            schedule_special_instructions: self.schedule.instruction,
        }
    }
}

impl EditOrderDraft {
    fn to_update(&self, pickup_from_id: Option<i64>, deliver_to_id: Option<i64>) -> UpdateOrder {
        UpdateOrder {
            company_id: self.client.company_id.clone(),
            client_phone: self.client.phone.clone(),
            client_special_instructions: self.client.instruction.clone(),
            pickup_from_id,
            deliver_to_id,
            pickup_from_special_instructions: self.route.pickup_instruction.clone(),
            deliver_to_special_instructions: self.route.delivery_instruction.clone(),
            distance: self.route.distance.clone(),
            ship_date: opt_date_to_naive(self.schedule.ship_date.as_ref()),
            pickup_date: opt_date_to_naive(self.schedule.pickup_date.as_ref()),
            pickup_date_type: self.schedule.pickup_date_type.clone(),
            delivery_date: opt_date_to_naive(self.schedule.delivery_date.as_ref()),
            delivery_date_type: self.schedule.delivery_date_type.clone(),
            delivery_speed: self.schedule.delivery_speed.clone(),
            schedule_special_instructions: self.schedule.instruction.clone(),
            status: self.status.clone(),
            cancel_reason: self.cancel_reason.clone(),
            carrier_price: self.payment.carrier_price.clone(),
            broker_fee: self.payment.broker_fee.clone(),
            valid_till: opt_date_to_naive(self.payment.valid_until.as_ref()),
            dispatcher_name: self.carrier_info.dispatcher_name.clone(),
            dispatcher_phone: self.carrier_info.dispatcher_phone.clone(),
            dispatcher_show_to_client: self.carrier_info.dispatcher_show_to_client,
            driver_name: self.carrier_info.driver_name.clone(),
            driver_phone: self.carrier_info.driver_phone.clone(),
            driver_show_to_client: self.carrier_info.driver_show_to_client,
            driver_special_instructions: self.carrier_info.driver_instruction.clone(),
            carrier_name: self.carrier_info.carrier_name.clone(),
            carrier_phone: self.carrier_info.carrier_phone.clone(),
            carrier_show_to_client: self.carrier_info.carrier_show_to_client,
            carrier_special_instructions: self.carrier_info.carrier_instruction.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct AssignUsersParams {
    pub users: Vec<Uuid>,
    pub order_id: i64,
    pub readable_id: String,
}

/// The write side of the order workflow. Holds an explicitly injected
/// store handle and cache seam; one instance is shared by every UI event
/// handler.
pub struct OrderWriteService {
    db: DBService,
    cache: Arc<dyn CacheInvalidator>,
}

impl OrderWriteService {
    pub fn new(db: DBService, cache: Arc<dyn CacheInvalidator>) -> Self {
        Self { db, cache }
    }

    /// Dispatch a draft to the create or edit path, then refresh the
    /// detail view and stale order lists.
    pub async fn create_or_update(
        &self,
        draft: OrderDraft,
    ) -> Result<OrderWriteReceipt, OrderWriteError> {
        let receipt = match draft {
            OrderDraft::Create(draft) => self.create(draft).await?,
            OrderDraft::Edit(draft) => self.edit(draft).await?,
        };

        self.cache
            .refetch(CacheKey::Order(receipt.order_readable_id.clone()))
            .await;
        self.cache.invalidate(CacheKey::Orders).await;

        Ok(receipt)
    }

    async fn create(&self, draft: CreateOrderDraft) -> Result<OrderWriteReceipt, OrderWriteError> {
        let input = draft.into_input();

        Order::create_with_vehicles(&self.db.pool, &input)
            .await
            .inspect_err(|err| error!(%err, "failed to create order"))?
            .ok_or(OrderWriteError::MissingReceipt)
    }

    async fn edit(&self, draft: EditOrderDraft) -> Result<OrderWriteReceipt, OrderWriteError> {
        // Endpoint resolution and the order update are separate
        // statements, not one transaction: an interruption in between
        // leaves a location row that no order references yet.
        let deliver_to_id = match &draft.route.delivery {
            LocationRef::Existing(id) => Some(*id),
            LocationRef::Inline(attrs) => self.resolve_location(attrs, "deliver_to").await,
        };
        let pickup_from_id = match &draft.route.pickup {
            LocationRef::Existing(id) => Some(*id),
            LocationRef::Inline(attrs) => self.resolve_location(attrs, "pickup_from").await,
        };

        let update = draft.to_update(pickup_from_id, deliver_to_id);
        Order::update_by_readable_id(&self.db.pool, &draft.readable_id, &update)
            .await
            .inspect_err(
                |err| error!(%err, readable_id = %draft.readable_id, "failed to update order"),
            )?;

        Ok(OrderWriteReceipt {
            order_id: None,
            order_readable_id: draft.readable_id,
        })
    }

    /// Persist an inline endpoint payload, coordinates stripped. A failed
    /// insert is logged and swallowed: the parent update proceeds with the
    /// location id unset.
    async fn resolve_location(&self, attrs: &NewOrderLocation, side: &'static str) -> Option<i64> {
        match OrderLocation::insert(&self.db.pool, &attrs.without_coordinates()).await {
            Ok(id) => Some(id),
            Err(err) => {
                error!(%err, side, "failed to insert order location");
                None
            }
        }
    }

    pub async fn update_status(
        &self,
        readable_id: &str,
        status: OrderStatus,
    ) -> Result<String, OrderWriteError> {
        Order::update_status(&self.db.pool, readable_id, status)
            .await
            .inspect_err(|err| error!(%err, readable_id, "failed to update order status"))?;

        self.cache.invalidate(CacheKey::Orders).await;
        self.cache
            .invalidate(CacheKey::Order(readable_id.to_string()))
            .await;

        Ok(readable_id.to_string())
    }

    /// Cancellation wins from any prior status; there is no transition
    /// check.
    pub async fn cancel(
        &self,
        readable_id: &str,
        reason: CancelReason,
    ) -> Result<String, OrderWriteError> {
        Order::cancel(&self.db.pool, readable_id, reason)
            .await
            .inspect_err(|err| error!(%err, readable_id, "failed to cancel order"))?;

        self.cache.invalidate(CacheKey::Orders).await;
        self.cache
            .refetch(CacheKey::Order(readable_id.to_string()))
            .await;

        Ok(readable_id.to_string())
    }

    /// Grant each user in `params.users` access to the order. The batch
    /// applies fully or not at all; an empty batch is a no-op.
    pub async fn assign_users(&self, params: AssignUsersParams) -> Result<String, OrderWriteError> {
        OrderUser::assign_many(&self.db.pool, params.order_id, &params.users)
            .await
            .inspect_err(
                |err| error!(%err, readable_id = %params.readable_id, "failed to assign users"),
            )?;

        self.cache.invalidate(CacheKey::Orders).await;
        self.cache
            .refetch(CacheKey::Order(params.readable_id.clone()))
            .await;

        Ok(params.readable_id)
    }

    /// Standalone location creation, used by the terminal picker.
    pub async fn create_location(
        &self,
        input: NewOrderLocation,
    ) -> Result<i64, OrderWriteError> {
        let id = OrderLocation::insert(&self.db.pool, &input)
            .await
            .inspect_err(|err| error!(%err, "failed to insert order location"))?;

        self.cache.invalidate(CacheKey::OrderLocations).await;

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::TimeZone;
    use sqlx::SqlitePool;

    use super::*;

    #[derive(Default)]
    struct RecordingCache {
        invalidated: Mutex<Vec<CacheKey>>,
        refetched: Mutex<Vec<CacheKey>>,
    }

    #[async_trait]
    impl CacheInvalidator for RecordingCache {
        async fn invalidate(&self, key: CacheKey) {
            self.invalidated.lock().unwrap().push(key);
        }

        async fn refetch(&self, key: CacheKey) {
            self.refetched.lock().unwrap().push(key);
        }
    }

    async fn setup() -> (OrderWriteService, Arc<RecordingCache>) {
        let db = DBService::new_in_memory().await.expect("in-memory db");
        let cache = Arc::new(RecordingCache::default());
        let service = OrderWriteService::new(db, cache.clone());
        (service, cache)
    }

    async fn count(pool: &SqlitePool, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await
            .unwrap()
    }

    fn client() -> ClientSection {
        ClientSection {
            company_id: Some("acme-logistics".to_string()),
            phone: Some("555-0123".to_string()),
            user_ids: vec![Uuid::new_v4(), Uuid::new_v4()],
            instruction: Some("call before pickup".to_string()),
        }
    }

    fn vehicles() -> Vec<VehicleDraft> {
        vec![
            VehicleDraft {
                make: Some("Honda".to_string()),
                model: Some("Civic".to_string()),
                year: Some("2019".to_string()),
                vin: Some("2HGFC2F59KH500001".to_string()),
                vehicle_type: Some("sedan".to_string()),
                is_inoperable: false,
            },
            VehicleDraft {
                make: Some("Ford".to_string()),
                model: Some("F-150".to_string()),
                year: Some("2022".to_string()),
                is_inoperable: true,
                ..Default::default()
            },
        ]
    }

    fn inline_location(city: &str) -> NewOrderLocation {
        NewOrderLocation {
            business_name: Some(format!("{city} Auto")),
            city: Some(city.to_string()),
            state: Some("CA".to_string()),
            contact_phone: Some("555-0199".to_string()),
            lat: Some(34.05),
            lng: Some(-118.24),
            ..Default::default()
        }
    }

    fn schedule() -> ScheduleSection {
        ScheduleSection {
            ship_date: Some(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()),
            pickup_date: Some(Utc.with_ymd_and_hms(2025, 6, 3, 8, 30, 0).unwrap()),
            pickup_date_type: Some(DateType::Estimated),
            delivery_date: Some(Utc.with_ymd_and_hms(2025, 6, 7, 17, 0, 0).unwrap()),
            delivery_date_type: Some(DateType::Exact),
            delivery_speed: Some("standard".to_string()),
            instruction: None,
        }
    }

    fn create_draft() -> CreateOrderDraft {
        CreateOrderDraft {
            client: client(),
            vehicles: vehicles(),
            route: RouteSection {
                pickup: LocationRef::Inline(inline_location("Reno")),
                delivery: LocationRef::Inline(inline_location("Boise")),
                distance: Some("430 mi".to_string()),
                pickup_instruction: None,
                delivery_instruction: None,
            },
            schedule: schedule(),
        }
    }

    fn edit_draft(
        readable_id: &str,
        status: OrderStatus,
        pickup: LocationRef,
        delivery: LocationRef,
    ) -> EditOrderDraft {
        EditOrderDraft {
            readable_id: readable_id.to_string(),
            status,
            cancel_reason: None,
            client: client(),
            vehicles: vehicles(),
            route: RouteSection {
                pickup,
                delivery,
                distance: Some("430 mi".to_string()),
                pickup_instruction: None,
                delivery_instruction: None,
            },
            schedule: schedule(),
            payment: PaymentSection {
                carrier_price: Some("1200".to_string()),
                broker_fee: Some("150".to_string()),
                valid_until: None,
            },
            carrier_info: CarrierInfoSection {
                dispatcher_name: Some("Maya".to_string()),
                dispatcher_phone: Some("555-0144".to_string()),
                ..Default::default()
            },
        }
    }

    async fn created_order(service: &OrderWriteService) -> Order {
        let receipt = service
            .create_or_update(OrderDraft::Create(create_draft()))
            .await
            .expect("create order");
        Order::find_by_readable_id(&service.db.pool, &receipt.order_readable_id)
            .await
            .unwrap()
            .expect("order row")
    }

    #[tokio::test]
    async fn test_create_draft_makes_one_atomic_write() {
        let (service, _cache) = setup().await;

        let receipt = service
            .create_or_update(OrderDraft::Create(create_draft()))
            .await
            .expect("create order");

        let order_id = receipt.order_id.expect("internal id on create");
        assert_eq!(receipt.order_readable_id, format!("ORD-{order_id}"));

        assert_eq!(count(&service.db.pool, "orders").await, 1);
        assert_eq!(count(&service.db.pool, "vehicles").await, 2);
        assert_eq!(count(&service.db.pool, "order_vehicles").await, 2);
        assert_eq!(count(&service.db.pool, "order_users").await, 2);
        assert_eq!(count(&service.db.pool, "order_locations").await, 2);

        // Coordinates survive on the create path.
        let with_coords: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM order_locations WHERE lat IS NOT NULL")
                .fetch_one(&service.db.pool)
                .await
                .unwrap();
        assert_eq!(with_coords, 2);

        let order = Order::find_by_readable_id(&service.db.pool, &receipt.order_readable_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.status, OrderStatus::Draft);
        assert!(order.pickup_from_id.is_some());
        assert!(order.deliver_to_id.is_some());
    }

    #[tokio::test]
    async fn test_create_invalidation_contract() {
        let (service, cache) = setup().await;

        let receipt = service
            .create_or_update(OrderDraft::Create(create_draft()))
            .await
            .unwrap();

        assert_eq!(
            *cache.refetched.lock().unwrap(),
            vec![CacheKey::Order(receipt.order_readable_id.clone())]
        );
        assert_eq!(*cache.invalidated.lock().unwrap(), vec![CacheKey::Orders]);
    }

    #[tokio::test]
    async fn test_edit_resolves_inline_delivery_location() {
        let (service, _cache) = setup().await;
        let order = created_order(&service).await;
        let old_deliver_to_id = order.deliver_to_id.unwrap();

        let draft = edit_draft(
            &order.readable_id,
            OrderStatus::UnderReview,
            LocationRef::Existing(order.pickup_from_id.unwrap()),
            LocationRef::Inline(inline_location("Spokane")),
        );
        let receipt = service
            .create_or_update(OrderDraft::Edit(draft))
            .await
            .expect("edit order");
        assert_eq!(receipt.order_id, None);
        assert_eq!(receipt.order_readable_id, order.readable_id);

        assert_eq!(count(&service.db.pool, "order_locations").await, 3);

        let updated = Order::find_by_readable_id(&service.db.pool, &order.readable_id)
            .await
            .unwrap()
            .unwrap();
        let new_deliver_to_id = updated.deliver_to_id.expect("resolved delivery id");
        assert_ne!(new_deliver_to_id, old_deliver_to_id);
        assert_eq!(updated.pickup_from_id, order.pickup_from_id);

        // The resolution insert drops the coordinates.
        let inserted = OrderLocation::find_by_id(&service.db.pool, new_deliver_to_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(inserted.city.as_deref(), Some("Spokane"));
        assert_eq!(inserted.lat, None);
        assert_eq!(inserted.lng, None);
    }

    #[tokio::test]
    async fn test_edit_survives_location_insert_failure() {
        let (service, _cache) = setup().await;
        let order = created_order(&service).await;

        sqlx::query("DROP TABLE order_locations")
            .execute(&service.db.pool)
            .await
            .unwrap();

        let draft = edit_draft(
            &order.readable_id,
            OrderStatus::OnHold,
            LocationRef::Inline(inline_location("Reno")),
            LocationRef::Inline(inline_location("Boise")),
        );
        service
            .create_or_update(OrderDraft::Edit(draft))
            .await
            .expect("edit succeeds despite failed location inserts");

        let updated = Order::find_by_readable_id(&service.db.pool, &order.readable_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, OrderStatus::OnHold);
        assert_eq!(updated.pickup_from_id, None);
        assert_eq!(updated.deliver_to_id, None);
    }

    #[tokio::test]
    async fn test_edit_status_only_triggers_no_location_insert() {
        let (service, _cache) = setup().await;
        let order = created_order(&service).await;

        let draft = edit_draft(
            &order.readable_id,
            OrderStatus::OnHold,
            LocationRef::Existing(order.pickup_from_id.unwrap()),
            LocationRef::Existing(order.deliver_to_id.unwrap()),
        );
        service
            .create_or_update(OrderDraft::Edit(draft))
            .await
            .unwrap();

        assert_eq!(count(&service.db.pool, "order_locations").await, 2);

        let updated = Order::find_by_readable_id(&service.db.pool, &order.readable_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, OrderStatus::OnHold);
        assert_eq!(updated.pickup_from_id, order.pickup_from_id);
        assert_eq!(updated.deliver_to_id, order.deliver_to_id);
    }

    #[tokio::test]
    async fn test_edit_merges_carrier_info_and_payment() {
        let (service, _cache) = setup().await;
        let order = created_order(&service).await;

        let draft = edit_draft(
            &order.readable_id,
            OrderStatus::Scheduled,
            LocationRef::Existing(order.pickup_from_id.unwrap()),
            LocationRef::Existing(order.deliver_to_id.unwrap()),
        );
        service
            .create_or_update(OrderDraft::Edit(draft))
            .await
            .unwrap();

        let updated = Order::find_by_readable_id(&service.db.pool, &order.readable_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.dispatcher_name.as_deref(), Some("Maya"));
        assert_eq!(updated.carrier_price.as_deref(), Some("1200"));
        assert_eq!(updated.broker_fee.as_deref(), Some("150"));
        assert_eq!(updated.cancel_reason, None);
    }

    #[tokio::test]
    async fn test_update_status_invalidates_list_and_detail() {
        let (service, cache) = setup().await;
        let order = created_order(&service).await;
        cache.invalidated.lock().unwrap().clear();
        cache.refetched.lock().unwrap().clear();

        let returned = service
            .update_status(&order.readable_id, OrderStatus::AwaitingShipment)
            .await
            .unwrap();
        assert_eq!(returned, order.readable_id);

        let updated = Order::find_by_readable_id(&service.db.pool, &order.readable_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, OrderStatus::AwaitingShipment);

        assert_eq!(
            *cache.invalidated.lock().unwrap(),
            vec![
                CacheKey::Orders,
                CacheKey::Order(order.readable_id.clone())
            ]
        );
        assert!(cache.refetched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_forces_cancelled_from_any_status() {
        let (service, cache) = setup().await;
        let order = created_order(&service).await;
        service
            .update_status(&order.readable_id, OrderStatus::Delivered)
            .await
            .unwrap();
        cache.invalidated.lock().unwrap().clear();
        cache.refetched.lock().unwrap().clear();

        service
            .cancel(&order.readable_id, CancelReason::CustomerRequest)
            .await
            .unwrap();

        let updated = Order::find_by_readable_id(&service.db.pool, &order.readable_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, OrderStatus::Cancelled);
        assert_eq!(updated.cancel_reason, Some(CancelReason::CustomerRequest));

        assert_eq!(*cache.invalidated.lock().unwrap(), vec![CacheKey::Orders]);
        assert_eq!(
            *cache.refetched.lock().unwrap(),
            vec![CacheKey::Order(order.readable_id.clone())]
        );
    }

    #[tokio::test]
    async fn test_assign_users_empty_is_noop() {
        let (service, _cache) = setup().await;
        let order = created_order(&service).await;

        let returned = service
            .assign_users(AssignUsersParams {
                users: vec![],
                order_id: order.id,
                readable_id: order.readable_id.clone(),
            })
            .await
            .unwrap();

        assert_eq!(returned, order.readable_id);
        assert_eq!(count(&service.db.pool, "order_users").await, 2);
    }

    #[tokio::test]
    async fn test_assign_users_aborts_whole_batch_on_failure() {
        let (service, _cache) = setup().await;
        let order = created_order(&service).await;
        let already_assigned = OrderUser::user_ids_for_order(&service.db.pool, order.id)
            .await
            .unwrap()[0];

        // The fresh user comes first, so its insert succeeds before the
        // duplicate fails; the rollback must still discard it.
        let result = service
            .assign_users(AssignUsersParams {
                users: vec![Uuid::new_v4(), already_assigned],
                order_id: order.id,
                readable_id: order.readable_id.clone(),
            })
            .await;

        assert!(result.is_err());
        assert_eq!(count(&service.db.pool, "order_users").await, 2);
    }

    #[tokio::test]
    async fn test_create_location_invalidates_locations_key() {
        let (service, cache) = setup().await;

        let id = service
            .create_location(inline_location("Fresno"))
            .await
            .unwrap();
        assert!(id > 0);

        // Standalone creation keeps the payload as given.
        let inserted = OrderLocation::find_by_id(&service.db.pool, id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(inserted.lat, Some(34.05));

        assert_eq!(
            *cache.invalidated.lock().unwrap(),
            vec![CacheKey::OrderLocations]
        );
    }
}
