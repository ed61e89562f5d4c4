use std::env;

/// Process configuration, read once at startup from the environment.
pub struct Config {
    pub host: String,
    pub device_port: u16,
    pub operator_port: u16,
    pub database_url: String,
    pub entry_code_ttl_seconds: i64,
    /// `None` means an infinite long-poll (the original protocol default).
    pub subscription_timeout_ms: Option<u64>,
    pub max_subscriptions_per_device: usize,
    pub availability_timeout_seconds: i64,
    pub availability_sweep_interval_seconds: u64,
    pub weather_cache_ttl_seconds: i64,
    pub mqtt: Option<MqttConfig>,
}

pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub topic_prefix: String,
}

impl Config {
    pub fn from_env() -> Self {
        let subscription_timeout_ms = env_u64("SUBSCRIPTION_TIMEOUT_MS", 0);
        Self {
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_owned()),
            device_port: env_u16("DEVICE_PORT", 8080),
            operator_port: env_u16("OPERATOR_PORT", 8081),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            entry_code_ttl_seconds: env_i64("ENTRY_CODE_TTL_SECONDS", 3600),
            subscription_timeout_ms: if subscription_timeout_ms == 0 {
                None
            } else {
                Some(subscription_timeout_ms)
            },
            max_subscriptions_per_device: env_u64("MAX_SUBSCRIPTIONS_PER_DEVICE", 100) as usize,
            availability_timeout_seconds: env_i64("AVAILABILITY_TIMEOUT_SECONDS", 120),
            availability_sweep_interval_seconds: env_u64(
                "AVAILABILITY_SWEEP_INTERVAL_SECONDS",
                30,
            ),
            weather_cache_ttl_seconds: env_i64("WEATHER_CACHE_TTL_SECONDS", 600),
            mqtt: env::var("MQTT_HOST").ok().map(|host| MqttConfig {
                host,
                port: env_u16("MQTT_PORT", 1883),
                user: env::var("MQTT_USER").ok(),
                password: env::var("MQTT_PASSWORD").ok(),
                topic_prefix: env::var("MQTT_TOPIC_PREFIX")
                    .unwrap_or_else(|_| "thermocontrol".to_owned()),
            }),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_i64(key: &str, default: i64) -> i64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u16(key: &str, default: u16) -> u16 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
