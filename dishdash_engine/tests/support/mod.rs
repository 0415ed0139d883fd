#![allow(dead_code)]
use std::{
    sync::{
        atomic::{AtomicBool, AtomicI32, Ordering},
        Arc,
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use dishdash_common::Cents;
use dishdash_engine::{
    db_types::{NewOrder, NotificationChannel, OrderItem, Role, UserProfile},
    dd_api::order_objects::OrderFlowConfig,
    events::EventProducers,
    notify::{NotificationTransport, TransportError},
    realtime::StatusBus,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    traits::ProfileManagement,
    DeliveryApi,
    DispatchConfig,
    LocationApi,
    NotificationApi,
    OrderFlowApi,
    OutboxDispatcher,
    SqliteDatabase,
};
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

pub const ALICE: &str = "alice";
pub const ALICE_EMAIL: &str = "alice@example.com";
pub const ALICE_PHONE: &str = "+27821234567";
pub const ALICE_ADDRESS: &str = "12 Long Street, Cape Town";
pub const COURIER: &str = "bob";
pub const RESTAURANT: &str = "mario-pizza";
pub const DELIVERY_FEE: i64 = 299;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub channel: NotificationChannel,
    pub recipient: String,
    pub content: String,
}

/// Collects everything "sent" through it. Can be switched into failing or slow modes.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<SentMessage>>,
    failing: AtomicBool,
    delay: Mutex<Option<Duration>>,
}

impl RecordingTransport {
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_on(&self, channel: NotificationChannel) -> Vec<SentMessage> {
        self.sent().into_iter().filter(|m| m.channel == channel).collect()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }
}

#[async_trait]
impl NotificationTransport for RecordingTransport {
    async fn send(&self, channel: NotificationChannel, recipient: &str, content: &str) -> Result<(), TransportError> {
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Unreachable("relay is down".into()));
        }
        let message = SentMessage { channel, recipient: recipient.to_string(), content: content.to_string() };
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct HookCalled {
    called: Arc<AtomicI32>,
}

impl HookCalled {
    pub fn called(&self) {
        let _ = self.called.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> i32 {
        self.called.load(Ordering::SeqCst)
    }
}

pub struct SystemOptions {
    pub flow: OrderFlowConfig,
    pub dispatch: DispatchConfig,
    pub producers: EventProducers,
    pub global_broadcast: bool,
}

impl Default for SystemOptions {
    fn default() -> Self {
        Self {
            flow: OrderFlowConfig::default(),
            dispatch: DispatchConfig { timeout: Duration::from_millis(500), ..Default::default() },
            producers: EventProducers::default(),
            global_broadcast: false,
        }
    }
}

/// Every engine API wired over a throwaway database, with a recording notification transport.
pub struct TestSystem {
    pub db: SqliteDatabase,
    pub bus: StatusBus,
    pub transport: Arc<RecordingTransport>,
    pub orders: OrderFlowApi<SqliteDatabase>,
    pub deliveries: DeliveryApi<SqliteDatabase>,
    pub notifications: NotificationApi<SqliteDatabase>,
    pub locations: LocationApi<SqliteDatabase>,
}

impl TestSystem {
    pub async fn new() -> Self {
        Self::with_options(SystemOptions::default()).await
    }

    pub async fn with_options(options: SystemOptions) -> Self {
        let url = random_db_path();
        let db = prepare_test_env(&url).await;
        let bus = StatusBus::default();
        let transport = Arc::new(RecordingTransport::default());
        let notifications = NotificationApi::new(db.clone(), transport.clone(), bus.clone());
        let deliveries = DeliveryApi::new(db.clone(), options.producers.clone(), Cents::from(DELIVERY_FEE));
        let dispatcher = OutboxDispatcher::new(db.clone(), deliveries.clone(), notifications.clone(), options.dispatch);
        let orders = OrderFlowApi::new(db.clone(), bus.clone(), options.producers, dispatcher, options.flow);
        let locations = LocationApi::new(db.clone(), bus.clone(), options.global_broadcast);
        Self { db, bus, transport, orders, deliveries, notifications, locations }
    }

    /// Alice, a customer with full contact details and an address, and Bob, an available courier.
    pub async fn seed_users(&self) {
        let alice = UserProfile {
            user_id: ALICE.into(),
            role: Role::Customer,
            email: Some(ALICE_EMAIL.into()),
            phone: Some(ALICE_PHONE.into()),
            available: false,
        };
        self.db.upsert_profile(alice).await.expect("Error creating alice");
        self.db.add_address(ALICE, ALICE_ADDRESS).await.expect("Error adding address");
        self.add_courier(COURIER).await;
    }

    pub async fn add_courier(&self, courier_id: &str) {
        let courier =
            UserProfile { user_id: courier_id.into(), role: Role::DeliveryPerson, email: None, phone: None, available: true };
        self.db.upsert_profile(courier).await.expect("Error creating courier");
    }

    pub async fn tear_down(self) {
        let url = self.db.url().to_string();
        self.db.close().await;
        if let Err(e) = Sqlite::drop_database(&url).await {
            warn!("🚀️ Could not drop test database {url}: {e}");
        }
    }
}

/// 2 × Pizza at $8.99 plus 1 × Soda at $2.99
pub fn pizza_order(customer_id: &str) -> NewOrder {
    NewOrder::new(customer_id, RESTAURANT, vec![
        OrderItem::new("Pizza", 2, Cents::from(899)),
        OrderItem::new("Soda", 1, Cents::from(299)),
    ])
}
