//! Operator-facing surface: device inventory, manual notification,
//! commands, and registration. Not reachable from the device-facing port.

use axum::extract::{Path, Query, State};
use axum::Json;
use nest_protocol::{Bucket, CommandRequest, CommandResponse, DeviceStatus};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock::now_unix;
use crate::command;
use crate::error::{AppError, AppResult};
use crate::pairing;
use crate::repo::{device_owners, users};
use crate::state::AppState;
use crate::subscriptions::SubscriptionStats;

fn device_key(serial: &str) -> String {
    format!("device.{serial}")
}

fn shared_key(serial: &str) -> String {
    format!("shared.{serial}")
}

async fn build_device_status(state: &AppState, serial: &str) -> DeviceStatus {
    let device = state
        .buckets
        .get(serial, &device_key(serial))
        .await
        .map_or(Value::Null, |bucket| bucket.value);
    let shared = state
        .buckets
        .get(serial, &shared_key(serial))
        .await
        .map_or(Value::Null, |bucket| bucket.value);

    let fan_timer_active = device
        .get("fan_timer_timeout")
        .and_then(Value::as_i64)
        .is_some_and(|timeout| timeout > now_unix());

    DeviceStatus {
        serial: serial.to_owned(),
        is_available: state.availability.is_available(serial).await,
        last_seen: state
            .availability
            .get_last_seen(serial)
            .await
            .map(|ts| ts.to_rfc3339()),
        name: device.get("name").and_then(Value::as_str).map(str::to_owned),
        current_temperature: device.get("current_temperature").and_then(Value::as_f64),
        target_temperature: device.get("target_temperature").and_then(Value::as_f64),
        target_temperature_high: device.get("target_temperature_high").and_then(Value::as_f64),
        target_temperature_low: device.get("target_temperature_low").and_then(Value::as_f64),
        humidity: device.get("current_humidity").and_then(Value::as_f64),
        mode: device
            .get("target_temperature_type")
            .and_then(Value::as_str)
            .map(str::to_owned),
        hvac_state: device.get("hvac_state").and_then(Value::as_str).map(str::to_owned),
        fan_timer_active,
        eco_temperature_high: device.get("eco_temperature_high").and_then(Value::as_f64),
        eco_temperature_low: device.get("eco_temperature_low").and_then(Value::as_f64),
        is_online: state.availability.is_available(serial).await,
        has_leaf: device.get("leaf").and_then(Value::as_bool).unwrap_or(false),
        software_version: device
            .get("current_version")
            .and_then(Value::as_str)
            .map(str::to_owned),
        temperature_scale: device
            .get("temperature_scale")
            .and_then(Value::as_str)
            .unwrap_or("C")
            .to_owned(),
        structure_id: shared.get("structure_id").and_then(Value::as_str).map(str::to_owned),
        away: shared.get("away").and_then(Value::as_bool),
    }
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub device_count: usize,
    pub available_count: usize,
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let statuses = state.availability.get_all_statuses().await;
    let available_count = statuses
        .values()
        .filter(|status| **status == crate::availability::AvailabilityStatus::Available)
        .count();
    Json(StatusResponse {
        device_count: statuses.len(),
        available_count,
    })
}

pub async fn list_devices(State(state): State<AppState>) -> Json<Vec<DeviceStatus>> {
    let serials = state.buckets.all_serials().await;
    let mut devices = Vec::with_capacity(serials.len());
    for serial in serials {
        devices.push(build_device_status(&state, &serial).await);
    }
    Json(devices)
}

#[derive(Deserialize)]
pub struct NotifyDeviceRequest {
    pub serial: String,
    pub objects: Vec<Bucket>,
}

#[derive(Serialize)]
pub struct NotifyDeviceResponse {
    pub notified: usize,
}

pub async fn notify_device(
    State(state): State<AppState>,
    Json(request): Json<NotifyDeviceRequest>,
) -> Json<NotifyDeviceResponse> {
    let notified = state
        .subscriptions
        .notify_all_subscribers(&request.serial, &request.objects)
        .await;
    Json(NotifyDeviceResponse { notified })
}

pub async fn stats(State(state): State<AppState>) -> Json<SubscriptionStats> {
    Json(state.subscriptions.get_stats().await)
}

pub async fn dismiss_pairing(
    State(state): State<AppState>,
    Path(serial): Path<String>,
) -> AppResult<()> {
    pairing::dismiss_pairing(&state.buckets, &state.subscriptions, &serial, now_unix()).await
}

#[derive(Deserialize)]
pub struct DeleteDeviceRequest {
    pub serial: String,
}

pub async fn delete_device(
    State(state): State<AppState>,
    Query(params): Query<DeleteDeviceRequest>,
) -> AppResult<()> {
    state.buckets.delete_device(&params.serial).await?;
    Ok(())
}

pub async fn command(
    State(state): State<AppState>,
    Json(request): Json<CommandRequest>,
) -> AppResult<Json<CommandResponse>> {
    let response = command::execute_command(
        &state.buckets,
        &state.subscriptions,
        &request,
        now_unix(),
    )
    .await?;
    Ok(Json(response))
}

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub code: String,
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
}

pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> AppResult<()> {
    let now = now_unix();
    if let Some(email) = &request.email {
        users::ensure(&state.pool, &request.user_id, email, now).await?;
    }
    let claimed = pairing::claim(&state.pool, &request.code, &request.user_id, now).await?;
    if !claimed {
        return Err(AppError::Conflict(
            "entry code is invalid, expired, or already claimed".to_owned(),
        ));
    }
    Ok(())
}

#[derive(Serialize)]
pub struct RegisteredDevice {
    pub serial: String,
    pub created_at: i64,
}

#[derive(Deserialize)]
pub struct UserIdQuery {
    pub user_id: String,
}

pub async fn list_registered_devices(
    State(state): State<AppState>,
    Query(params): Query<UserIdQuery>,
) -> AppResult<Json<Vec<RegisteredDevice>>> {
    let rows = device_owners::list_for_user(&state.pool, &params.user_id).await?;
    Ok(Json(
        rows.into_iter()
            .map(|row| RegisteredDevice {
                serial: row.serial,
                created_at: row.created_at,
            })
            .collect(),
    ))
}

pub async fn delete_registered_device(
    State(state): State<AppState>,
    Path(serial): Path<String>,
    Query(params): Query<UserIdQuery>,
) -> AppResult<()> {
    let deleted = device_owners::delete(&state.pool, &serial, &params.user_id).await?;
    if !deleted {
        return Err(AppError::NotFound("device is not registered to this user".to_owned()));
    }
    Ok(())
}
