// nest-protocol: wire types shared between the device-facing transport,
// the operator API, and the persistence layer.
//
// Bucket values are free-form JSON (device firmware versions disagree on
// which fields are present), so `Bucket::value` stays a `serde_json::Value`
// rather than a typed struct.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Bucket state
// ---------------------------------------------------------------------------

/// A single persisted device-state object, keyed by `(serial, object_key)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub serial: String,
    pub object_key: String,
    pub revision: i64,
    pub timestamp: i64,
    pub value: serde_json::Value,
}

/// A single entry in a subscribe/list request: the object key plus the
/// revision/timestamp the client already has cached for it, or a pushed
/// `value` if the device is reporting new state instead of catching up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectCursor {
    pub object_key: String,
    #[serde(default)]
    pub revision: i64,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
}

impl ObjectCursor {
    /// A subscribe entry is a device pushing state (rather than asking what
    /// it's missed) iff it carries a value at the zero/zero cursor.
    #[must_use]
    pub fn is_update(&self) -> bool {
        self.value.is_some() && self.revision == 0 && self.timestamp == 0
    }
}

/// Returns true when the server's copy of an object is newer than what the
/// client has cached, using the pure-timestamp rule: revision is never
/// consulted here, only the bucket store's upsert invariant uses it.
#[must_use]
pub fn is_server_newer(server_timestamp: i64, client_timestamp: i64) -> bool {
    if client_timestamp == 0 {
        return true;
    }
    if server_timestamp == 0 {
        return false;
    }
    server_timestamp > client_timestamp
}

// ---------------------------------------------------------------------------
// Transport (device long-poll) request/response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeRequest {
    pub objects: Vec<ObjectCursor>,
    #[serde(default)]
    pub chunked: bool,
    /// Milliseconds; `None` defers to the server's configured default.
    #[serde(default)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscribeResponse {
    pub objects: Vec<Bucket>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PutRequest {
    pub objects: Vec<PutObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PutObject {
    pub object_key: String,
    pub value: serde_json::Value,
    /// Compare-and-swap guard: if present and it doesn't match the stored
    /// revision, the write is skipped and the server's current revision is
    /// reported back instead.
    #[serde(default)]
    pub if_object_revision: Option<i64>,
}

/// Value-stripped view of a bucket, used everywhere the wire format must
/// not leak `value` back to the caller (PUT acknowledgements, listings).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BucketMeta {
    pub object_key: String,
    pub object_revision: i64,
    pub object_timestamp: i64,
}

impl From<&Bucket> for BucketMeta {
    fn from(bucket: &Bucket) -> Self {
        Self {
            object_key: bucket.object_key.clone(),
            object_revision: bucket.revision,
            object_timestamp: bucket.timestamp,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PutResponse {
    pub objects: Vec<BucketMeta>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResponse {
    pub objects: Vec<BucketMeta>,
}

// ---------------------------------------------------------------------------
// Pairing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct EntryKeyResponse {
    pub value: String,
    pub expires: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PairingStatus {
    NoKey,
    Pending {
        #[serde(rename = "expiresAt")]
        expires_at: i64,
    },
    Claimed {
        #[serde(rename = "claimedBy")]
        claimed_by: String,
        #[serde(rename = "claimedAt")]
        claimed_at: i64,
    },
}

// ---------------------------------------------------------------------------
// Command surface
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CommandRequest {
    pub serial: String,
    pub command: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse {
    pub success: bool,
    pub object_key: String,
    pub values: serde_json::Value,
}

/// API-facing HVAC modes accepted from operator clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApiMode {
    Off,
    Heat,
    Cool,
    HeatCool,
    Range,
    Auto,
    Emergency,
}

impl ApiMode {
    /// Maps to the wire-level `target_temperature_type` value devices expect.
    #[must_use]
    pub fn to_nest_mode(self) -> &'static str {
        match self {
            ApiMode::Off => "off",
            ApiMode::Heat => "heat",
            ApiMode::Cool => "cool",
            ApiMode::HeatCool | ApiMode::Range | ApiMode::Auto => "range",
            ApiMode::Emergency => "emergency",
        }
    }
}

// ---------------------------------------------------------------------------
// Operator-facing device status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct DeviceStatus {
    pub serial: String,
    pub is_available: bool,
    pub last_seen: Option<String>,
    pub name: Option<String>,
    pub current_temperature: Option<f64>,
    pub target_temperature: Option<f64>,
    pub target_temperature_high: Option<f64>,
    pub target_temperature_low: Option<f64>,
    pub humidity: Option<f64>,
    pub mode: Option<String>,
    pub hvac_state: Option<String>,
    pub fan_timer_active: bool,
    pub eco_temperature_high: Option<f64>,
    pub eco_temperature_low: Option<f64>,
    pub is_online: bool,
    pub has_leaf: bool,
    pub software_version: Option<String>,
    pub temperature_scale: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structure_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub away: Option<bool>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Frozen error codes returned in `HttpErrorEnvelope::code`.
pub mod error_codes {
    pub const BAD_REQUEST: &str = "BAD_REQUEST";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const CONFLICT: &str = "CONFLICT";
    pub const TOO_MANY_SUBSCRIPTIONS: &str = "TOO_MANY_SUBSCRIPTIONS";
    pub const GATEWAY_TIMEOUT: &str = "GATEWAY_TIMEOUT";
    pub const BAD_GATEWAY: &str = "BAD_GATEWAY";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Frozen HTTP error envelope used by all non-2xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_newer_when_client_has_never_seen_the_key() {
        assert!(is_server_newer(100, 0));
    }

    #[test]
    fn server_not_newer_when_nothing_is_stored() {
        assert!(!is_server_newer(0, 100));
        assert!(!is_server_newer(0, 0));
    }

    #[test]
    fn server_newer_is_a_strict_timestamp_comparison() {
        assert!(is_server_newer(200, 100));
        assert!(!is_server_newer(100, 100));
        assert!(!is_server_newer(100, 200));
    }

    #[test]
    fn api_mode_maps_range_family_to_nest_range() {
        assert_eq!(ApiMode::HeatCool.to_nest_mode(), "range");
        assert_eq!(ApiMode::Auto.to_nest_mode(), "range");
        assert_eq!(ApiMode::Range.to_nest_mode(), "range");
        assert_eq!(ApiMode::Heat.to_nest_mode(), "heat");
    }

    #[test]
    fn cursor_with_value_at_zero_zero_is_an_update() {
        let cursor = ObjectCursor {
            object_key: "device.SERIAL0001".to_owned(),
            revision: 0,
            timestamp: 0,
            value: Some(serde_json::json!({"target_temperature": 21.0})),
        };
        assert!(cursor.is_update());
    }

    #[test]
    fn cursor_without_value_is_never_an_update() {
        let cursor = ObjectCursor {
            object_key: "device.SERIAL0001".to_owned(),
            revision: 0,
            timestamp: 0,
            value: None,
        };
        assert!(!cursor.is_update());
    }

    #[test]
    fn cursor_with_value_but_nonzero_cursor_is_a_catch_up() {
        let cursor = ObjectCursor {
            object_key: "device.SERIAL0001".to_owned(),
            revision: 3,
            timestamp: 1_700_000_000,
            value: Some(serde_json::json!({"target_temperature": 21.0})),
        };
        assert!(!cursor.is_update());
    }

    #[test]
    fn bucket_meta_drops_the_value() {
        let bucket = Bucket {
            serial: "SERIAL0001".to_owned(),
            object_key: "device.SERIAL0001".to_owned(),
            revision: 4,
            timestamp: 1_700_000_000,
            value: serde_json::json!({"target_temperature": 21.0}),
        };
        let meta = BucketMeta::from(&bucket);
        assert_eq!(meta.object_key, "device.SERIAL0001");
        assert_eq!(meta.object_revision, 4);
        assert_eq!(meta.object_timestamp, 1_700_000_000);
        let json = serde_json::to_value(&meta).unwrap();
        assert!(json.get("value").is_none());
    }
}
