//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every engine call is async, so handlers never block; keep it that
//! way.
//!
//! | Verb/Path                           | Allowed roles                                 |
//! |-------------------------------------|-----------------------------------------------|
//! | GET  /health                        | public                                        |
//! | POST /payments/webhook              | public, signed by the payment processor       |
//! | POST /api/orders                    | customer, admin                               |
//! | GET  /api/orders                    | any (own orders)                              |
//! | GET  /api/orders/search             | restaurant_admin, admin, service              |
//! | GET  /api/orders/{id}               | any (owner or staff)                          |
//! | PUT  /api/orders/{id}               | restaurant_admin, admin                       |
//! | DEL  /api/orders/{id}               | admin                                         |
//! | POST /api/delivery/assign           | admin, service                                |
//! | PUT  /api/delivery/status/{id}      | delivery_person (assigned courier), admin     |
//! | POST /api/delivery/courier/{id}     | admin, service                                |
//! | POST /api/delivery/rate/{id}        | customer (the delivery's customer)            |
//! | POST /api/delivery/earnings/{id}    | delivery_person                               |
//! | GET  /api/delivery/earnings         | delivery_person                               |
//! | GET  /api/delivery/{id}             | any                                           |
//! | POST /api/payments/create           | customer                                      |
//! | GET  /api/payments/order/{id}       | customer (own payments), admin                |
//! | POST /api/location                  | delivery_person                               |
//! | GET  /api/location/{agent_id}       | any                                           |
//! | POST /api/notifications             | service, admin                                |
//! | GET  /api/notifications             | any (own notifications)                       |
//! | PUT  /api/notifications/{id}/read   | any (owner)                                   |
//! | PUT  /api/profiles/{user_id}        | admin, service                                |
//! | GET  /api/events/{room}             | staff; order rooms for customer and courier   |
use std::{convert::Infallible, str::FromStr};

use actix_web::{get, http::header::CACHE_CONTROL, web, HttpRequest, HttpResponse, Responder};
use bytes::Bytes;
use dishdash_engine::{
    db_types::{DeliveryStatus, NewDelivery, NewNotification, NewOrder, Role, UserProfile},
    dd_api::{
        delivery_objects::{
            AssignCourierRequest,
            AssignDeliveryRequest,
            DeliveryStatusRequest,
            EarningsRequest,
            RateDeliveryRequest,
        },
        order_objects::{CreateOrderRequest, TransitionRequest},
        payment_objects::CreatePaymentRequest,
    },
    realtime::{Room, StatusBus},
    traits::{
        DeliveryManagement,
        LocationManagement,
        NotificationManagement,
        OrderManagement,
        OutboxManagement,
        PaymentManagement,
        ProfileManagement,
    },
    DeliveryApi,
    LocationApi,
    NotificationApi,
    OrderFlowApi,
    PaymentApi,
};
use log::*;
use serde_json::json;
use tokio_stream::{
    wrappers::{errors::BroadcastStreamRecvError, BroadcastStream},
    StreamExt,
};

use crate::{
    auth::JwtClaims,
    data_objects::{EarningsQuery, LocationReport, OrderSearchParams, ProfileUpdate, WebhookAck},
    errors::{AuthError, ServerError},
};

/// The header the payment processor signs its webhooks in.
pub const WEBHOOK_SIGNATURE_HEADER: &str = "Stripe-Signature";

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal requires [$($roles:expr),+]) => {
        paste::paste! { pub struct [<$name:camel Route>];}
        paste::paste! {
                impl [<$name:camel Route>] {
                #[allow(clippy::new_without_default)]
                pub fn new() -> Self { Self }
            }
        }
        paste::paste! {
            impl actix_web::dev::HttpServiceFactory for [<$name:camel Route>] {
                fn register(self, config: &mut actix_web::dev::AppService) {
                    let res = actix_web::Resource::new($path)
                        .name(stringify!($name))
                        .guard(actix_web::guard::$method())
                        .to($name)
                        .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                    actix_web::dev::HttpServiceFactory::register(res, config);
                }
            }
        }
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:path),+ where requires [$($roles:expr),+])  => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:path),+) => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(create_order => Post "/orders"
    impl OrderManagement, OutboxManagement, DeliveryManagement, NotificationManagement, ProfileManagement
    where requires [Role::Customer, Role::Admin]);
/// Route handler for placing an order.
///
/// The order is placed for the caller. Admins may place an order on a customer's behalf by setting `customer_id`.
/// The total is calculated from the line items; clients cannot set it.
pub async fn create_order<B>(
    claims: JwtClaims,
    body: web::Json<CreateOrderRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + OutboxManagement + DeliveryManagement + NotificationManagement + ProfileManagement,
{
    let CreateOrderRequest { restaurant_id, items, customer_id } = body.into_inner();
    let customer_id = match customer_id {
        Some(id) if claims.is_staff() => id,
        _ => claims.user_id.clone(),
    };
    debug!("💻️ POST order from {customer_id} at {restaurant_id}");
    let order = api.create_order(NewOrder::new(customer_id, restaurant_id, items)).await?;
    Ok(HttpResponse::Created().json(order))
}

route!(my_orders => Get "/orders"
    impl OrderManagement, OutboxManagement, DeliveryManagement, NotificationManagement, ProfileManagement);
pub async fn my_orders<B>(claims: JwtClaims, api: web::Data<OrderFlowApi<B>>) -> Result<HttpResponse, ServerError>
where B: OrderManagement + OutboxManagement + DeliveryManagement + NotificationManagement + ProfileManagement {
    debug!("💻️ GET my_orders for {}", claims.user_id);
    let orders = api.orders_for_customer(&claims.user_id).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(search_orders => Get "/orders/search"
    impl OrderManagement, OutboxManagement, DeliveryManagement, NotificationManagement, ProfileManagement
    where requires [Role::RestaurantAdmin, Role::Admin, Role::Service]);
/// Staff can search all orders by customer, restaurant, and status. An empty search returns every order.
pub async fn search_orders<B>(
    query: web::Query<OrderSearchParams>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + OutboxManagement + DeliveryManagement + NotificationManagement + ProfileManagement,
{
    let query = query.into_inner();
    debug!("💻️ GET search orders: {query:?}");
    let orders = api.search_orders(query.into()).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order_by_id => Get "/orders/{id}"
    impl OrderManagement, OutboxManagement, DeliveryManagement, NotificationManagement, ProfileManagement);
/// Customers can only see their own orders. Staff can see any order.
pub async fn order_by_id<B>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + OutboxManagement + DeliveryManagement + NotificationManagement + ProfileManagement,
{
    let order_id = path.into_inner();
    debug!("💻️ GET order #{order_id} for {}", claims.user_id);
    let order = api.fetch_order(order_id).await?;
    if !claims.may_act_for(&order.customer_id) {
        return Err(ServerError::InsufficientPermissions(format!("Order #{order_id} is not yours")));
    }
    Ok(HttpResponse::Ok().json(order))
}

route!(transition_order => Put "/orders/{id}"
    impl OrderManagement, OutboxManagement, DeliveryManagement, NotificationManagement, ProfileManagement
    where requires [Role::RestaurantAdmin, Role::Admin]);
/// Moves an order to a new status. The response does not wait for, or report on, the side effects of the change
/// (delivery assignment and customer notifications). Those are retried in the background if they fail.
pub async fn transition_order<B>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<TransitionRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + OutboxManagement + DeliveryManagement + NotificationManagement + ProfileManagement,
{
    let order_id = path.into_inner();
    let status = body.into_inner().status;
    info!("💻️ {} is moving order #{order_id} to {status}", claims.user_id);
    let order = api.transition(order_id, status).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(delete_order => Delete "/orders/{id}"
    impl OrderManagement, OutboxManagement, DeliveryManagement, NotificationManagement, ProfileManagement
    where requires [Role::Admin]);
pub async fn delete_order<B>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + OutboxManagement + DeliveryManagement + NotificationManagement + ProfileManagement,
{
    let order_id = path.into_inner();
    warn!("💻️ {} is deleting order #{order_id}", claims.user_id);
    api.delete_order(order_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "deleted": order_id })))
}

//----------------------------------------------   Deliveries  ----------------------------------------------------
route!(assign_delivery => Post "/delivery/assign"
    impl DeliveryManagement, ProfileManagement
    where requires [Role::Admin, Role::Service]);
/// Creates a delivery for an order. If no courier is named, the first available courier is assigned. If nobody is
/// available, the delivery is created unassigned.
pub async fn assign_delivery<B>(
    body: web::Json<AssignDeliveryRequest>,
    api: web::Data<DeliveryApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: DeliveryManagement + ProfileManagement,
{
    let AssignDeliveryRequest { order_id, user_id, delivery_address, delivery_fee, delivery_person_id } =
        body.into_inner();
    debug!("💻️ POST delivery for order #{order_id}");
    let fee = delivery_fee.unwrap_or_else(|| api.default_fee());
    let mut delivery = NewDelivery::new(order_id, user_id, delivery_address, fee);
    if let Some(courier) = delivery_person_id {
        delivery = delivery.with_courier(courier);
    }
    let delivery = api.assign(delivery).await?;
    Ok(HttpResponse::Created().json(delivery))
}

route!(update_delivery_status => Put "/delivery/status/{id}"
    impl DeliveryManagement, ProfileManagement
    where requires [Role::DeliveryPerson, Role::Admin]);
/// Couriers move their own deliveries along `assigned → picked_up → delivering → delivered`. Admins may move any
/// delivery.
pub async fn update_delivery_status<B>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<DeliveryStatusRequest>,
    api: web::Data<DeliveryApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: DeliveryManagement + ProfileManagement,
{
    let delivery_id = path.into_inner();
    let status = body.into_inner().status;
    debug!("💻️ PUT delivery #{delivery_id} status {status} by {}", claims.user_id);
    let delivery = match claims.role {
        Role::Admin => api.update_status(delivery_id, status).await?,
        _ => api.update_status_for_courier(delivery_id, &claims.user_id, status).await?,
    };
    Ok(HttpResponse::Ok().json(delivery))
}

route!(assign_courier => Post "/delivery/courier/{id}"
    impl DeliveryManagement, ProfileManagement
    where requires [Role::Admin, Role::Service]);
pub async fn assign_courier<B>(
    path: web::Path<i64>,
    body: web::Json<AssignCourierRequest>,
    api: web::Data<DeliveryApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: DeliveryManagement + ProfileManagement,
{
    let delivery_id = path.into_inner();
    let courier_id = body.into_inner().courier_id;
    debug!("💻️ POST courier {courier_id} for delivery #{delivery_id}");
    let delivery = api.assign_courier(delivery_id, &courier_id).await?;
    Ok(HttpResponse::Ok().json(delivery))
}

route!(rate_delivery => Post "/delivery/rate/{id}"
    impl DeliveryManagement, ProfileManagement
    where requires [Role::Customer]);
/// Customers can rate each of their delivered deliveries once, from 1 to 5.
pub async fn rate_delivery<B>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<RateDeliveryRequest>,
    api: web::Data<DeliveryApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: DeliveryManagement + ProfileManagement,
{
    let delivery_id = path.into_inner();
    let RateDeliveryRequest { rating, feedback } = body.into_inner();
    debug!("💻️ POST rating {rating} for delivery #{delivery_id} from {}", claims.user_id);
    let delivery = api.rate(delivery_id, Some(&claims.user_id), rating, feedback).await?;
    Ok(HttpResponse::Ok().json(delivery))
}

route!(record_earnings => Post "/delivery/earnings/{id}"
    impl DeliveryManagement, ProfileManagement
    where requires [Role::DeliveryPerson]);
pub async fn record_earnings<B>(
    claims: JwtClaims,
    path: web::Path<i64>,
    body: web::Json<EarningsRequest>,
    api: web::Data<DeliveryApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: DeliveryManagement + ProfileManagement,
{
    let delivery_id = path.into_inner();
    let EarningsRequest { earnings, tip } = body.into_inner();
    let delivery = api.record_earnings(delivery_id, &claims.user_id, earnings, tip).await?;
    Ok(HttpResponse::Ok().json(delivery))
}

route!(my_earnings => Get "/delivery/earnings"
    impl DeliveryManagement, ProfileManagement
    where requires [Role::DeliveryPerson]);
/// The courier's earnings for `?period=today|week|month`. Defaults to today.
pub async fn my_earnings<B>(
    claims: JwtClaims,
    query: web::Query<EarningsQuery>,
    api: web::Data<DeliveryApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: DeliveryManagement + ProfileManagement,
{
    let period = query.into_inner().period;
    debug!("💻️ GET earnings for {} ({period})", claims.user_id);
    let summary = api.earnings(&claims.user_id, period).await?;
    Ok(HttpResponse::Ok().json(summary))
}

route!(delivery_by_id => Get "/delivery/{id}" impl DeliveryManagement, ProfileManagement);
pub async fn delivery_by_id<B>(path: web::Path<i64>, api: web::Data<DeliveryApi<B>>) -> Result<HttpResponse, ServerError>
where B: DeliveryManagement + ProfileManagement {
    let delivery = api.fetch_delivery(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(delivery))
}

//----------------------------------------------   Payments  ----------------------------------------------------
route!(create_payment => Post "/payments/create"
    impl PaymentManagement, OrderManagement, OutboxManagement, DeliveryManagement, NotificationManagement, ProfileManagement
    where requires [Role::Customer]);
/// Asks the payment processor for a payment intent for one of the caller's orders. The response carries the client
/// secret the customer's client needs to complete the payment.
pub async fn create_payment<B>(
    claims: JwtClaims,
    body: web::Json<CreatePaymentRequest>,
    orders: web::Data<OrderFlowApi<B>>,
    api: web::Data<PaymentApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentManagement +
        OrderManagement +
        OutboxManagement +
        DeliveryManagement +
        NotificationManagement +
        ProfileManagement,
{
    let request = body.into_inner();
    let order = orders.fetch_order(request.order_id).await?;
    if order.customer_id != claims.user_id {
        return Err(ServerError::InsufficientPermissions(format!("Order #{} is not yours", order.id)));
    }
    debug!("💻️ POST payment of {} for order #{} from {}", request.amount, order.id, claims.user_id);
    let created = api.create_payment(&claims.user_id, request).await?;
    Ok(HttpResponse::Created().json(created))
}

route!(payments_for_order => Get "/payments/order/{order_id}"
    impl PaymentManagement
    where requires [Role::Customer, Role::Admin]);
/// Customers see their own payments for the order. Admins see them all.
pub async fn payments_for_order<B>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<PaymentApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentManagement,
{
    let order_id = path.into_inner();
    let mut payments = api.payments_for_order(order_id).await?;
    if !claims.is_staff() {
        payments.retain(|p| p.user_id == claims.user_id);
    }
    Ok(HttpResponse::Ok().json(payments))
}

route!(payment_webhook => Post "/payments/webhook" impl PaymentManagement);
/// Route handler for the payment processor's webhook.
///
/// The raw body is verified against the signature in the `Stripe-Signature` header before it is parsed. Verified
/// events are always acknowledged with a 200, including replays and events for unknown intents, so that the
/// processor stops retrying them. Unverified or unparseable events get a 400.
pub async fn payment_webhook<B>(
    req: HttpRequest,
    body: Bytes,
    api: web::Data<PaymentApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentManagement,
{
    trace!("💻️ Received payment webhook");
    let signature = req.headers().get(WEBHOOK_SIGNATURE_HEADER).and_then(|v| v.to_str().ok()).unwrap_or_default();
    let outcome = api.handle_webhook(&body, signature).await.map_err(|e| {
        warn!("💻️ Payment webhook rejected. {e}");
        ServerError::from(e)
    })?;
    Ok(HttpResponse::Ok().json(WebhookAck::from(&outcome)))
}

//----------------------------------------------   Location  ----------------------------------------------------
route!(report_location => Post "/location"
    impl LocationManagement, DeliveryManagement
    where requires [Role::DeliveryPerson]);
pub async fn report_location<B>(
    claims: JwtClaims,
    body: web::Json<LocationReport>,
    api: web::Data<LocationApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: LocationManagement + DeliveryManagement,
{
    let LocationReport { latitude, longitude } = body.into_inner();
    let record = api.report_location(&claims.user_id, latitude, longitude).await?;
    Ok(HttpResponse::Ok().json(record))
}

route!(location_for_agent => Get "/location/{agent_id}" impl LocationManagement, DeliveryManagement);
pub async fn location_for_agent<B>(
    path: web::Path<String>,
    api: web::Data<LocationApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: LocationManagement + DeliveryManagement,
{
    let record = api.get_location(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(record))
}

//----------------------------------------------   Notifications  ----------------------------------------------------
route!(send_notification => Post "/notifications"
    impl NotificationManagement, ProfileManagement
    where requires [Role::Service, Role::Admin]);
/// Sends a single notification. A send that fails is recorded with status `failed` and is still a 200; the caller
/// may retry it with the same idempotency key.
pub async fn send_notification<B>(
    body: web::Json<NewNotification>,
    api: web::Data<NotificationApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: NotificationManagement + ProfileManagement,
{
    let notification = body.into_inner();
    debug!("💻️ POST {} notification for {}", notification.channel, notification.user_id);
    let result = api.dispatch(notification).await?;
    Ok(HttpResponse::Ok().json(result))
}

route!(my_notifications => Get "/notifications" impl NotificationManagement, ProfileManagement);
pub async fn my_notifications<B>(
    claims: JwtClaims,
    api: web::Data<NotificationApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: NotificationManagement + ProfileManagement,
{
    let notifications = api.notifications_for_user(&claims.user_id).await?;
    Ok(HttpResponse::Ok().json(notifications))
}

route!(mark_notification_read => Put "/notifications/{id}/read" impl NotificationManagement, ProfileManagement);
pub async fn mark_notification_read<B>(
    claims: JwtClaims,
    path: web::Path<i64>,
    api: web::Data<NotificationApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: NotificationManagement + ProfileManagement,
{
    let notification = api.mark_read(path.into_inner(), &claims.user_id).await?;
    Ok(HttpResponse::Ok().json(notification))
}

//----------------------------------------------   Profiles  ----------------------------------------------------
route!(upsert_profile => Put "/profiles/{user_id}"
    impl ProfileManagement
    where requires [Role::Admin, Role::Service]);
/// The user service pushes the profile fields the engine needs: contact details for notifications, delivery
/// addresses, and courier availability.
pub async fn upsert_profile<B>(
    path: web::Path<String>,
    body: web::Json<ProfileUpdate>,
    db: web::Data<B>,
) -> Result<HttpResponse, ServerError>
where
    B: ProfileManagement,
{
    let user_id = path.into_inner();
    if user_id.trim().is_empty() {
        return Err(ServerError::ValidationError("The user id cannot be empty".into()));
    }
    if !Room::is_valid_user_id(&user_id) {
        return Err(ServerError::ValidationError(format!("'{user_id}' is reserved for a room name")));
    }
    let ProfileUpdate { role, email, phone, available, address } = body.into_inner();
    let profile = db.upsert_profile(UserProfile { user_id: user_id.clone(), role, email, phone, available }).await?;
    if let Some(address) = address.filter(|a| !a.trim().is_empty()) {
        db.add_address(&user_id, address.trim()).await?;
    }
    debug!("💻️ Profile for {user_id} updated");
    Ok(HttpResponse::Ok().json(profile))
}

//----------------------------------------------   Real-time  ----------------------------------------------------
route!(room_events => Get "/events/{room}"
    impl OrderManagement, OutboxManagement, DeliveryManagement, NotificationManagement, ProfileManagement);
/// Streams a status bus room as Server-Sent Events.
///
/// Rooms are `order_{id}`, `broadcast`, or a user id. Staff may listen to any room. Otherwise, a user room is only
/// open to its user, and an order room to the order's customer and the courier currently delivering it. Events
/// published before the stream opens are not replayed.
pub async fn room_events<B>(
    claims: JwtClaims,
    path: web::Path<String>,
    bus: web::Data<StatusBus>,
    orders: web::Data<OrderFlowApi<B>>,
    deliveries: web::Data<DeliveryApi<B>>,
) -> Result<HttpResponse, ServerError>
where
    B: OrderManagement + OutboxManagement + DeliveryManagement + NotificationManagement + ProfileManagement,
{
    let room = Room::from_str(&path.into_inner()).map_err(|e| ServerError::InvalidRequestPath(e.to_string()))?;
    match &room {
        Room::User(user_id) if !claims.may_act_for(user_id) => {
            return Err(AuthError::InsufficientPermissions(format!("You may not listen to {user_id}'s room")).into());
        },
        Room::Order(order_id) if !claims.is_staff() => {
            let order = orders.fetch_order(*order_id).await?;
            if order.customer_id != claims.user_id {
                let is_courier = deliveries.deliveries_for_order(*order_id).await?.iter().any(|d| {
                    !d.status.is_terminal() && d.delivery_person_id.as_deref() == Some(claims.user_id.as_str())
                });
                if !is_courier {
                    return Err(
                        AuthError::InsufficientPermissions(format!("You may not follow order #{order_id}")).into()
                    );
                }
            }
        },
        _ => {},
    }
    info!("💻️ {} joined room {room}", claims.user_id);
    let greeting = Bytes::from(format!(": joined {room}\n\n"));
    let receiver = bus.subscribe(&room);
    let events = BroadcastStream::new(receiver).filter_map(move |msg| match msg {
        Ok(event) => match event.to_sse() {
            Ok(frame) => Some(Ok::<Bytes, Infallible>(Bytes::from(frame))),
            Err(e) => {
                warn!("💻️ Could not serialize a {} event for room {room}. {e}", event.name());
                None
            },
        },
        Err(BroadcastStreamRecvError::Lagged(n)) => {
            warn!("💻️ A listener on room {room} fell behind and missed {n} events");
            None
        },
    });
    let stream = tokio_stream::once(Ok::<Bytes, Infallible>(greeting)).chain(events);
    Ok(HttpResponse::Ok()
        .content_type("text/event-stream")
        .insert_header((CACHE_CONTROL, "no-cache"))
        .streaming(stream))
}
