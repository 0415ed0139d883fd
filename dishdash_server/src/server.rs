use std::{sync::Arc, time::Duration};

use actix_web::{
    dev::Server,
    http::KeepAlive,
    middleware::Logger,
    web,
    web::ServiceConfig,
    App,
    HttpServer,
};
use dishdash_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    gateway::{HttpPaymentGateway, PaymentGateway},
    notify::{HttpRelayTransport, LogTransport, NotificationTransport},
    realtime::StatusBus,
    DeliveryApi,
    LocationApi,
    NotificationApi,
    OrderFlowApi,
    OutboxDispatcher,
    PaymentApi,
    SqliteDatabase,
};
use log::*;

use crate::{
    auth::TokenValidator,
    config::ServerConfig,
    errors::ServerError,
    middleware::JwtAuthMiddlewareFactory,
    outbox_worker::start_outbox_worker,
    routes::{
        health,
        AssignCourierRoute,
        AssignDeliveryRoute,
        CreateOrderRoute,
        CreatePaymentRoute,
        DeleteOrderRoute,
        DeliveryByIdRoute,
        LocationForAgentRoute,
        MarkNotificationReadRoute,
        MyEarningsRoute,
        MyNotificationsRoute,
        MyOrdersRoute,
        OrderByIdRoute,
        PaymentWebhookRoute,
        PaymentsForOrderRoute,
        RateDeliveryRoute,
        RecordEarningsRoute,
        ReportLocationRoute,
        RoomEventsRoute,
        SearchOrdersRoute,
        SendNotificationRoute,
        TransitionOrderRoute,
        UpdateDeliveryStatusRoute,
        UpsertProfileRoute,
    },
};

const HOOK_BUFFER_SIZE: usize = 25;

type BoxedFuture = std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>;

/// Everything the engine APIs are built from. Each worker thread builds its own set of APIs from a clone of this.
#[derive(Clone)]
pub struct ServerContext {
    pub db: SqliteDatabase,
    pub bus: StatusBus,
    pub producers: EventProducers,
    pub transport: Arc<dyn NotificationTransport>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub config: ServerConfig,
}

impl ServerContext {
    pub fn new(
        db: SqliteDatabase,
        transport: Arc<dyn NotificationTransport>,
        gateway: Arc<dyn PaymentGateway>,
        config: ServerConfig,
    ) -> Self {
        Self { db, bus: StatusBus::default(), producers: EventProducers::default(), transport, gateway, config }
    }

    pub fn with_producers(mut self, producers: EventProducers) -> Self {
        self.producers = producers;
        self
    }

    pub fn delivery_api(&self) -> DeliveryApi<SqliteDatabase> {
        DeliveryApi::new(self.db.clone(), self.producers.clone(), self.config.default_delivery_fee)
    }

    pub fn notification_api(&self) -> NotificationApi<SqliteDatabase> {
        NotificationApi::new(self.db.clone(), Arc::clone(&self.transport), self.bus.clone())
    }

    pub fn dispatcher(&self) -> OutboxDispatcher<SqliteDatabase> {
        OutboxDispatcher::new(
            self.db.clone(),
            self.delivery_api(),
            self.notification_api(),
            self.config.dispatch_config(),
        )
    }

    pub fn order_flow_api(&self) -> OrderFlowApi<SqliteDatabase> {
        OrderFlowApi::new(
            self.db.clone(),
            self.bus.clone(),
            self.producers.clone(),
            self.dispatcher(),
            self.config.order_flow_config(),
        )
    }

    pub fn payment_api(&self) -> PaymentApi<SqliteDatabase> {
        PaymentApi::new(
            self.db.clone(),
            Arc::clone(&self.gateway),
            self.bus.clone(),
            self.producers.clone(),
            self.config.payments.payment_config(),
        )
    }

    pub fn location_api(&self) -> LocationApi<SqliteDatabase> {
        LocationApi::new(self.db.clone(), self.bus.clone(), self.config.global_location_broadcast)
    }
}

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let transport = notification_transport(&config)?;
    let gateway = HttpPaymentGateway::new(
        config.payments.gateway_url.clone(),
        config.payments.gateway_api_key.clone(),
        config.side_effect_timeout,
    )
    .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let ctx = ServerContext::new(db, transport, Arc::new(gateway), config);
    let hooks = create_hooks(&ctx);
    let handlers = EventHandlers::new(HOOK_BUFFER_SIZE, hooks);
    let ctx = ctx.with_producers(handlers.producers());
    handlers.start_handlers().await;
    let _worker = start_outbox_worker(ctx.dispatcher(), ctx.config.outbox_interval);
    let srv = create_server_instance(ctx)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

fn notification_transport(config: &ServerConfig) -> Result<Arc<dyn NotificationTransport>, ServerError> {
    match &config.notify_relay_url {
        Some(url) => {
            info!("🖥️ Email and SMS notifications will be sent via {url}");
            let relay = HttpRelayTransport::new(url.as_str(), config.side_effect_timeout)
                .map_err(|e| ServerError::InitializeError(e.to_string()))?;
            Ok(Arc::new(relay))
        },
        None => Ok(Arc::new(LogTransport)),
    }
}

/// The hooks act through an order flow API with no event producers of their own, so that an order change made by a
/// hook cannot set off another hook.
pub fn create_hooks(ctx: &ServerContext) -> EventHooks {
    let mut hooks = EventHooks::default();
    let quiet = ctx.clone().with_producers(EventProducers::default());
    let payment_flow = Arc::new(quiet.order_flow_api());
    hooks.on_payment_updated(move |ev| {
        let api = Arc::clone(&payment_flow);
        Box::pin(async move {
            let payment = ev.payment;
            debug!("🪝️ Payment #{} for order #{} is now {}", payment.id, payment.order_id, payment.status);
            if let Err(e) = api.record_payment_status(payment.order_id, payment.status).await {
                error!("🪝️ Could not record the status of payment #{} on order #{}. {e}", payment.id, payment.order_id);
            }
        }) as BoxedFuture
    });
    if ctx.config.sync_order_with_delivery {
        let delivery_flow = Arc::new(quiet.order_flow_api());
        hooks.on_delivery_status_changed(move |ev| {
            let api = Arc::clone(&delivery_flow);
            Box::pin(async move {
                let delivery = ev.delivery;
                match api.sync_with_delivery(&delivery).await {
                    Ok(Some(order)) => {
                        info!("🪝️ Order #{} is now {} after delivery #{} moved", order.id, order.status, delivery.id)
                    },
                    Ok(None) => {},
                    Err(e) => error!("🪝️ Could not bring order #{} in line with its delivery. {e}", delivery.order_id),
                }
            }) as BoxedFuture
        });
    }
    hooks
}

pub fn create_server_instance(ctx: ServerContext) -> Result<Server, ServerError> {
    let host = ctx.config.host.clone();
    let port = ctx.config.port;
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("dd::access_log"))
            .configure(configure_app(ctx.clone()))
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    info!("🖥️ DishDash server listening on {host}:{port}");
    Ok(srv)
}

/// Registers the shared state and every route. The test suite builds its apps with this too.
pub fn configure_app(ctx: ServerContext) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg: &mut ServiceConfig| {
        let validator = TokenValidator::new(&ctx.config.auth);
        cfg.app_data(web::Data::new(ctx.order_flow_api()))
            .app_data(web::Data::new(ctx.delivery_api()))
            .app_data(web::Data::new(ctx.payment_api()))
            .app_data(web::Data::new(ctx.notification_api()))
            .app_data(web::Data::new(ctx.location_api()))
            .app_data(web::Data::new(ctx.db.clone()))
            .app_data(web::Data::new(ctx.bus.clone()))
            .app_data(
                web::JsonConfig::default()
                    .error_handler(|err, _req| ServerError::InvalidRequestBody(err.to_string()).into()),
            )
            .app_data(
                web::PathConfig::default()
                    .error_handler(|err, _req| ServerError::InvalidRequestPath(err.to_string()).into()),
            )
            .app_data(
                web::QueryConfig::default()
                    .error_handler(|err, _req| ServerError::InvalidRequestPath(err.to_string()).into()),
            );
        // Routes that require authentication. Literal paths go before the parameterised paths they would match.
        let auth_scope = web::scope("/api")
            .wrap(JwtAuthMiddlewareFactory::new(validator))
            .service(CreateOrderRoute::<SqliteDatabase>::new())
            .service(MyOrdersRoute::<SqliteDatabase>::new())
            .service(SearchOrdersRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(TransitionOrderRoute::<SqliteDatabase>::new())
            .service(DeleteOrderRoute::<SqliteDatabase>::new())
            .service(AssignDeliveryRoute::<SqliteDatabase>::new())
            .service(UpdateDeliveryStatusRoute::<SqliteDatabase>::new())
            .service(AssignCourierRoute::<SqliteDatabase>::new())
            .service(RateDeliveryRoute::<SqliteDatabase>::new())
            .service(RecordEarningsRoute::<SqliteDatabase>::new())
            .service(MyEarningsRoute::<SqliteDatabase>::new())
            .service(DeliveryByIdRoute::<SqliteDatabase>::new())
            .service(CreatePaymentRoute::<SqliteDatabase>::new())
            .service(PaymentsForOrderRoute::<SqliteDatabase>::new())
            .service(ReportLocationRoute::<SqliteDatabase>::new())
            .service(LocationForAgentRoute::<SqliteDatabase>::new())
            .service(SendNotificationRoute::<SqliteDatabase>::new())
            .service(MyNotificationsRoute::<SqliteDatabase>::new())
            .service(MarkNotificationReadRoute::<SqliteDatabase>::new())
            .service(UpsertProfileRoute::<SqliteDatabase>::new())
            .service(RoomEventsRoute::<SqliteDatabase>::new());
        cfg.service(health).service(PaymentWebhookRoute::<SqliteDatabase>::new()).service(auth_scope);
    }
}
