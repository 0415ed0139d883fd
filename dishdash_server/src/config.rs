use std::{env, str::FromStr, time::Duration};

use dishdash_common::{parse_boolean_flag, Cents, Secret};
use dishdash_engine::{
    dd_api::{order_objects::OrderFlowConfig, payment_objects::PaymentConfig},
    DispatchConfig,
};
use log::*;
use rand::{distributions::Alphanumeric, thread_rng, Rng};

const DEFAULT_DD_HOST: &str = "127.0.0.1";
const DEFAULT_DD_PORT: u16 = 8360;
const DEFAULT_GATEWAY_URL: &str = "https://api.stripe.com";
const DEFAULT_CURRENCY: &str = "usd";
const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;
const DEFAULT_SIDE_EFFECT_TIMEOUT_MS: u64 = 3000;
const DEFAULT_OUTBOX_INTERVAL_SECS: u64 = 15;
const DEFAULT_OUTBOX_MAX_ATTEMPTS: i64 = 8;
const DEFAULT_DELIVERY_FEE: i64 = 499;
const DEFAULT_TOKEN_LIFETIME_HOURS: i64 = 720;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    pub payments: PaymentSettings,
    /// The longest any single side effect of an order transition may take before it is left to the retry worker.
    pub side_effect_timeout: Duration,
    /// How often the outbox worker looks for side effects that are due a retry.
    pub outbox_interval: Duration,
    /// Side effects that have failed this many times are abandoned.
    pub outbox_max_attempts: i64,
    /// The delivery fee charged when a delivery is created without one.
    pub default_delivery_fee: Cents,
    /// Refuse `Pending → Confirmed` until the order has been paid.
    pub require_payment_before_confirm: bool,
    /// Confirm a `Pending` order as soon as its payment completes.
    pub auto_confirm_on_payment: bool,
    /// Move orders to `Delivering` and `Delivered` as their deliveries get there.
    pub sync_order_with_delivery: bool,
    /// Publish every courier position to the broadcast room, as well as to the room of the order being delivered.
    pub global_location_broadcast: bool,
    /// The email/SMS relay. When `None`, notifications are logged and not sent.
    pub notify_relay_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DD_HOST.to_string(),
            port: DEFAULT_DD_PORT,
            database_url: String::default(),
            auth: AuthConfig::default(),
            payments: PaymentSettings::default(),
            side_effect_timeout: Duration::from_millis(DEFAULT_SIDE_EFFECT_TIMEOUT_MS),
            outbox_interval: Duration::from_secs(DEFAULT_OUTBOX_INTERVAL_SECS),
            outbox_max_attempts: DEFAULT_OUTBOX_MAX_ATTEMPTS,
            default_delivery_fee: Cents::from(DEFAULT_DELIVERY_FEE),
            require_payment_before_confirm: false,
            auto_confirm_on_payment: false,
            sync_order_with_delivery: false,
            global_location_broadcast: true,
            notify_relay_url: None,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("DD_HOST").ok().unwrap_or_else(|| DEFAULT_DD_HOST.into());
        let port = parse_env("DD_PORT", DEFAULT_DD_PORT);
        let database_url = env::var("DD_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ DD_DATABASE_URL is not set. Please set it to the URL for the DishDash database.");
            String::default()
        });
        let auth = AuthConfig::from_env_or_default();
        let payments = PaymentSettings::from_env_or_default();
        let side_effect_timeout =
            Duration::from_millis(parse_env("DD_SIDE_EFFECT_TIMEOUT_MS", DEFAULT_SIDE_EFFECT_TIMEOUT_MS));
        let outbox_interval = Duration::from_secs(parse_env("DD_OUTBOX_INTERVAL_SECS", DEFAULT_OUTBOX_INTERVAL_SECS));
        let outbox_max_attempts = parse_env("DD_OUTBOX_MAX_ATTEMPTS", DEFAULT_OUTBOX_MAX_ATTEMPTS).max(1);
        let default_delivery_fee = Cents::from(parse_env("DD_DEFAULT_DELIVERY_FEE", DEFAULT_DELIVERY_FEE));
        let require_payment_before_confirm =
            parse_boolean_flag(env::var("DD_REQUIRE_PAYMENT_BEFORE_CONFIRM").ok(), false);
        let auto_confirm_on_payment = parse_boolean_flag(env::var("DD_AUTO_CONFIRM_ON_PAYMENT").ok(), false);
        let sync_order_with_delivery = parse_boolean_flag(env::var("DD_SYNC_ORDER_WITH_DELIVERY").ok(), false);
        let global_location_broadcast = parse_boolean_flag(env::var("DD_GLOBAL_LOCATION_BROADCAST").ok(), true);
        let notify_relay_url = env::var("DD_NOTIFY_RELAY_URL").ok().filter(|s| !s.trim().is_empty());
        if notify_relay_url.is_none() {
            info!("🪛️ DD_NOTIFY_RELAY_URL is not set. Email and SMS notifications will be logged, not sent.");
        }
        if require_payment_before_confirm && !auto_confirm_on_payment {
            info!(
                "🪛️ Orders can only be confirmed once paid, and will not be confirmed automatically. Restaurants must \
                 confirm paid orders themselves."
            );
        }
        Self {
            host,
            port,
            database_url,
            auth,
            payments,
            side_effect_timeout,
            outbox_interval,
            outbox_max_attempts,
            default_delivery_fee,
            require_payment_before_confirm,
            auto_confirm_on_payment,
            sync_order_with_delivery,
            global_location_broadcast,
            notify_relay_url,
        }
    }

    pub fn order_flow_config(&self) -> OrderFlowConfig {
        OrderFlowConfig {
            require_payment_before_confirm: self.require_payment_before_confirm,
            auto_confirm_on_payment: self.auto_confirm_on_payment,
        }
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            timeout: self.side_effect_timeout,
            max_attempts: self.outbox_max_attempts,
            ..DispatchConfig::default()
        }
    }
}

/// Reads and parses an environment variable, falling back to `default` (with a log message) if it is missing or
/// malformed.
fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
    }
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
#[derive(Clone, Debug)]
pub struct AuthConfig {
    /// The HS256 secret that bearer tokens are signed and verified with.
    pub jwt_secret: Secret<String>,
    /// The lifetime of tokens minted by this server.
    pub token_lifetime: chrono::Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT secret has not been set. I'm using a random value for this session. DO NOT operate on \
             production like this, since every token will be invalidated when the server restarts. Set \
             DD_JWT_SECRET instead. 🚨️🚨️🚨️"
        );
        let secret = thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect::<String>();
        Self { jwt_secret: Secret::new(secret), token_lifetime: chrono::Duration::hours(DEFAULT_TOKEN_LIFETIME_HOURS) }
    }
}

impl AuthConfig {
    pub fn new<S: Into<String>>(secret: S) -> Self {
        Self {
            jwt_secret: Secret::new(secret.into()),
            token_lifetime: chrono::Duration::hours(DEFAULT_TOKEN_LIFETIME_HOURS),
        }
    }

    pub fn from_env_or_default() -> Self {
        let lifetime = chrono::Duration::hours(parse_env("DD_TOKEN_LIFETIME_HOURS", DEFAULT_TOKEN_LIFETIME_HOURS));
        match env::var("DD_JWT_SECRET").ok().filter(|s| !s.is_empty()) {
            Some(secret) => {
                if secret.len() < 32 {
                    warn!("🪛️ DD_JWT_SECRET is shorter than 32 characters. Consider using a longer secret.");
                }
                Self { jwt_secret: Secret::new(secret), token_lifetime: lifetime }
            },
            None => Self { token_lifetime: lifetime, ..Self::default() },
        }
    }
}

//-------------------------------------------------  PaymentSettings  --------------------------------------------------
#[derive(Clone, Debug)]
pub struct PaymentSettings {
    pub gateway_url: String,
    pub gateway_api_key: Secret<String>,
    pub currency: String,
    pub webhook_secret: Secret<String>,
    pub webhook_tolerance_secs: i64,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            gateway_api_key: Secret::default(),
            currency: DEFAULT_CURRENCY.to_string(),
            webhook_secret: Secret::default(),
            webhook_tolerance_secs: DEFAULT_WEBHOOK_TOLERANCE_SECS,
        }
    }
}

impl PaymentSettings {
    pub fn from_env_or_default() -> Self {
        let gateway_url = env::var("DD_GATEWAY_URL").ok().unwrap_or_else(|| {
            info!("🪛️ DD_GATEWAY_URL is not set. Using {DEFAULT_GATEWAY_URL}.");
            DEFAULT_GATEWAY_URL.to_string()
        });
        let gateway_api_key = Secret::new(env::var("DD_GATEWAY_API_KEY").ok().unwrap_or_else(|| {
            error!("🪛️ DD_GATEWAY_API_KEY is not set. Payment intents cannot be created without it.");
            String::default()
        }));
        let webhook_secret = Secret::new(env::var("DD_WEBHOOK_SECRET").ok().unwrap_or_else(|| {
            error!("🪛️ DD_WEBHOOK_SECRET is not set. Every payment webhook will be rejected.");
            String::default()
        }));
        let currency = env::var("DD_CURRENCY")
            .ok()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
        let webhook_tolerance_secs = parse_env("DD_WEBHOOK_TOLERANCE_SECS", DEFAULT_WEBHOOK_TOLERANCE_SECS);
        Self { gateway_url, gateway_api_key, currency, webhook_secret, webhook_tolerance_secs }
    }

    pub fn payment_config(&self) -> PaymentConfig {
        PaymentConfig {
            currency: self.currency.clone(),
            webhook_secret: self.webhook_secret.clone(),
            webhook_tolerance_secs: self.webhook_tolerance_secs,
        }
    }
}
