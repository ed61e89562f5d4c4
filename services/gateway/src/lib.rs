pub mod auth;
pub mod availability;
pub mod bucket_store;
pub mod clock;
pub mod command;
pub mod config;
pub mod db;
pub mod error;
pub mod fan_timer;
pub mod http;
pub mod integration_bridge;
pub mod pairing;
pub mod repo;
pub mod serial;
pub mod state;
pub mod structure;
pub mod subscriptions;
pub mod temperature_safety;
pub mod weather;

pub use state::AppState;

use axum::routing::{delete, get, post};
use axum::Router;

/// Routes devices actually call: entry discovery, pairing, the long-poll
/// transport, pings, uploads, and weather.
pub fn build_device_router(state: AppState) -> Router {
    Router::new()
        .route("/nest/entry", get(http::device::entry))
        .route("/nest/passphrase", get(http::device::passphrase))
        .route("/nest/passphrase/status", get(http::device::passphrase_status))
        .route("/nest/transport/v2/list", get(http::device::list))
        .route("/nest/transport/v2/subscribe", post(http::device::subscribe))
        .route("/nest/transport/v2/put", post(http::device::put))
        .route("/nest/ping", get(http::device::ping))
        .route("/nest/pro_info/:code", get(http::device::pro_info))
        .route("/nest/upload", post(http::device::upload))
        .route("/nest/weather", get(http::device::weather))
        .with_state(state)
}

/// Routes used by operators and integrations: inventory, commands, and
/// registration. Never exposed on the device-facing port.
pub fn build_operator_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(http::health::healthz))
        .route("/readyz", get(http::health::readyz))
        .route("/status", get(http::operator::status))
        .route("/api/devices", get(http::operator::list_devices))
        .route("/notify-device", post(http::operator::notify_device))
        .route("/api/stats", get(http::operator::stats))
        .route(
            "/api/dismiss-pairing/:serial",
            post(http::operator::dismiss_pairing),
        )
        .route("/api/device", delete(http::operator::delete_device))
        .route("/command", post(http::operator::command))
        .route("/api/register", post(http::operator::register))
        .route(
            "/api/devices/registered",
            get(http::operator::list_registered_devices),
        )
        .route(
            "/api/devices/registered/:serial",
            delete(http::operator::delete_registered_device),
        )
        .with_state(state)
}
