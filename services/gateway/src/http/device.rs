//! Device-facing `/nest/*` surface: entry discovery, pairing, the
//! long-poll transport, pings, and the weather proxy.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use nest_protocol::{
    Bucket, BucketMeta, EntryKeyResponse, ListResponse, ObjectCursor, PairingStatus, PutRequest,
    PutResponse, SubscribeRequest, SubscribeResponse,
};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::auth::DeviceAuthTier;
use crate::clock::now_unix;
use crate::error::{AppError, AppResult};
use crate::fan_timer;
use crate::pairing;
use crate::serial;
use crate::state::AppState;
use crate::structure;
use crate::weather;

fn device_key(serial: &str) -> String {
    format!("device.{serial}")
}

fn shared_key(serial: &str) -> String {
    format!("shared.{serial}")
}

async fn require_serial(headers: &HeaderMap, fallback: Option<&str>) -> AppResult<String> {
    serial::extract(headers, fallback)
        .ok_or_else(|| AppError::BadRequest("unable to determine device serial".to_owned()))
}

async fn require_tier(state: &AppState, serial: &str) -> AppResult<DeviceAuthTier> {
    Ok(crate::auth::resolve_tier(&state.pool, serial, now_unix()).await?)
}

#[derive(Serialize)]
pub struct EntryUrls {
    pub transport_url: String,
    pub weather_url: String,
    pub log_upload_url: String,
}

#[derive(Serialize)]
pub struct EntryResponse {
    pub urls: EntryUrls,
    pub ping_url: String,
}

pub async fn entry(State(_state): State<AppState>) -> Json<EntryResponse> {
    Json(EntryResponse {
        urls: EntryUrls {
            transport_url: "/nest/transport/v2".to_owned(),
            weather_url: "/nest/weather".to_owned(),
            log_upload_url: "/nest/upload".to_owned(),
        },
        // Corrected to point at the device's own ping endpoint rather than
        // the transport URL.
        ping_url: "/nest/ping".to_owned(),
    })
}

pub async fn passphrase(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<EntryKeyResponse>> {
    let serial = require_serial(&headers, None).await?;
    let entry = crate::pairing::generate_entry_code(
        &state.pool,
        &state.buckets,
        &serial,
        state.entry_code_ttl_seconds,
        now_unix(),
    )
    .await?;
    Ok(Json(EntryKeyResponse {
        value: entry.code,
        expires: entry.expires_at,
    }))
}

pub async fn passphrase_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<PairingStatus>> {
    let serial = require_serial(&headers, None).await?;
    let status = crate::pairing::status(&state.pool, &serial, now_unix()).await?;
    Ok(Json(status))
}

pub async fn list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<Json<ListResponse>> {
    let serial = require_serial(&headers, None).await?;
    let tier = require_tier(&state, &serial).await?;
    if tier == DeviceAuthTier::Unknown {
        return Err(AppError::Unauthorized);
    }
    state.availability.mark_seen(&serial).await;

    if matches!(tier, DeviceAuthTier::Paired { .. }) {
        pairing::ensure_alert_dialog(&state.buckets, &serial, Value::Object(Map::new()), now_unix())
            .await?;
    }

    let mut objects = state.buckets.get_by_serial(&serial).await;
    if let Some(shared) = objects.iter().find(|bucket| bucket.object_key == shared_key(&serial)) {
        if let Some(structure_id) = shared.value.get("structure_id").and_then(Value::as_str) {
            if let Some(structure) = state
                .buckets
                .get(&serial, &format!("structure.{structure_id}"))
                .await
            {
                objects.push(structure);
            }
        }
    }

    Ok(Json(ListResponse {
        objects: objects.iter().map(BucketMeta::from).collect(),
    }))
}

/// Applies one device-object write: fan-timer preservation for `device.*`
/// keys, a shallow field merge, and structure-id auto-assignment for
/// `shared.*` keys once the owner is known. Shared by PUT and subscribe's
/// Update path (§4.E.2/§4.E.3), which apply the same merge semantics.
async fn apply_object_write(
    state: &AppState,
    serial: &str,
    user_id: Option<&str>,
    object_key: &str,
    mut incoming: Map<String, Value>,
    now: i64,
) -> AppResult<Bucket> {
    if object_key == device_key(serial) {
        if let Some(prior) = state.buckets.get(serial, object_key).await {
            fan_timer::preserve_fan_state(&mut incoming, &prior.value);
        }
    }

    let bucket = state.buckets.merge(serial, object_key, incoming, now).await?;

    if object_key == shared_key(serial) && bucket.value.get("structure_id").is_none() {
        if let Some(user_id) = user_id {
            let mut shared_values = bucket.value.as_object().cloned().unwrap_or_default();
            structure::assign_structure_id(&mut shared_values, user_id);
            let bucket = state
                .buckets
                .upsert(serial, object_key, Value::Object(shared_values), now)
                .await?;
            state.integration_bridge.on_bucket_write(&bucket).await;
            return Ok(bucket);
        }
    }

    state.integration_bridge.on_bucket_write(&bucket).await;
    Ok(bucket)
}

fn value_as_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("value".to_owned(), other);
            map
        }
    }
}

pub async fn subscribe(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<SubscribeRequest>,
) -> AppResult<Json<SubscribeResponse>> {
    let serial = require_serial(&headers, None).await?;
    let tier = require_tier(&state, &serial).await?;
    if tier == DeviceAuthTier::Unknown {
        return Err(AppError::Unauthorized);
    }
    state.availability.mark_seen(&serial).await;

    if let DeviceAuthTier::Paired { user_id } = &tier {
        let now = now_unix();
        for cursor in &request.objects {
            if cursor.is_update() {
                let incoming = value_as_map(cursor.value.clone().unwrap_or(Value::Null));
                apply_object_write(&state, &serial, Some(user_id), &cursor.object_key, incoming, now)
                    .await?;
            }
        }
    }

    let outdated = outdated_objects(&state, &serial, &request.objects).await;
    if !outdated.is_empty() {
        return Ok(Json(SubscribeResponse { objects: outdated }));
    }

    let object_keys: Vec<String> = request.objects.iter().map(|o| o.object_key.clone()).collect();
    let timeout_ms = request
        .timeout
        .or(state.subscription_timeout_ms)
        .map(std::time::Duration::from_millis);

    if request.chunked {
        let Some((_handle, mut receiver)) = state
            .subscriptions
            .register_streaming(&serial, object_keys)
            .await
        else {
            return Err(AppError::TooManySubscriptions);
        };
        let objects = match timeout_ms {
            Some(duration) => tokio::time::timeout(duration, receiver.recv())
                .await
                .map_err(|_| AppError::SubscribeTimeout)?
                .unwrap_or_default(),
            None => receiver.recv().await.unwrap_or_default(),
        };
        Ok(Json(SubscribeResponse { objects }))
    } else {
        let Some((_handle, receiver)) = state
            .subscriptions
            .register_oneshot(&serial, object_keys)
            .await
        else {
            return Err(AppError::TooManySubscriptions);
        };
        let objects = match timeout_ms {
            Some(duration) => tokio::time::timeout(duration, receiver)
                .await
                .map_err(|_| AppError::SubscribeTimeout)?
                .unwrap_or_default(),
            None => receiver.await.unwrap_or_default(),
        };
        Ok(Json(SubscribeResponse { objects }))
    }
}

async fn outdated_objects(
    state: &AppState,
    serial: &str,
    cursors: &[ObjectCursor],
) -> Vec<Bucket> {
    let mut outdated = Vec::new();
    for cursor in cursors {
        if let Some(bucket) = state.buckets.get(serial, &cursor.object_key).await {
            if nest_protocol::is_server_newer(bucket.timestamp, cursor.timestamp) {
                outdated.push(bucket);
            }
        }
    }
    outdated
}

pub async fn put(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<PutRequest>,
) -> AppResult<Json<PutResponse>> {
    let serial = require_serial(&headers, None).await?;
    let tier = require_tier(&state, &serial).await?;

    match tier {
        DeviceAuthTier::Unknown => Err(AppError::Unauthorized),
        DeviceAuthTier::Pending => {
            state.availability.mark_seen(&serial).await;
            Ok(Json(PutResponse { objects: Vec::new() }))
        }
        DeviceAuthTier::Paired { user_id } => {
            state.availability.mark_seen(&serial).await;
            let now = now_unix();
            let mut results = Vec::with_capacity(request.objects.len());

            for object in request.objects {
                let current = state.buckets.get(&serial, &object.object_key).await;

                if let Some(if_object_revision) = object.if_object_revision {
                    let current_revision = current.as_ref().map_or(0, |bucket| bucket.revision);
                    if if_object_revision != current_revision {
                        results.push(current.as_ref().map_or_else(
                            || BucketMeta {
                                object_key: object.object_key.clone(),
                                object_revision: 0,
                                object_timestamp: 0,
                            },
                            BucketMeta::from,
                        ));
                        continue;
                    }
                }

                let incoming = value_as_map(object.value);
                let bucket = apply_object_write(
                    &state,
                    &serial,
                    Some(&user_id),
                    &object.object_key,
                    incoming,
                    now,
                )
                .await?;
                results.push(BucketMeta::from(&bucket));
            }

            // PUT never notifies sync_protocol subscribers (§4.E.3): change
            // propagation to subscribers runs through the fan-out registry's
            // own notify path, not the PUT response.
            Ok(Json(PutResponse { objects: results }))
        }
    }
}

pub async fn ping(State(state): State<AppState>, headers: HeaderMap) -> AppResult<&'static str> {
    let serial = require_serial(&headers, None).await?;
    state.availability.mark_seen(&serial).await;
    Ok("ok")
}

#[derive(Serialize)]
pub struct ProInfoResponse {
    pub code: String,
    pub valid: bool,
}

pub async fn pro_info(Path(code): Path<String>) -> Json<ProInfoResponse> {
    Json(ProInfoResponse { code, valid: false })
}

#[derive(Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
}

pub async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> AppResult<Json<UploadResponse>> {
    let serial = require_serial(&headers, None).await?;
    let tier = require_tier(&state, &serial).await?;
    if !matches!(tier, DeviceAuthTier::Paired { .. }) {
        return Err(AppError::Unauthorized);
    }
    tracing::info!(serial = %serial, bytes = body.len(), "received device upload");
    Ok(Json(UploadResponse { status: "ok" }))
}

pub async fn weather(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> AppResult<Json<Value>> {
    let postal_code = params
        .get("postal_code")
        .ok_or_else(|| AppError::BadRequest("postal_code is required".to_owned()))?;
    let country = params.get("country").map_or("US", String::as_str);

    let value = weather::get_weather(
        &state.pool,
        state.weather_provider.as_ref(),
        postal_code,
        country,
        state.weather_cache_ttl_seconds,
        now_unix(),
    )
    .await?;
    Ok(Json(value))
}
