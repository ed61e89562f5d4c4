//! Preserves fan-timer state across device PUTs that don't mention it.

use serde_json::{Map, Value};

const FAN_FIELDS: &[&str] = &[
    "fan_timer_timeout",
    "fan_control_state",
    "fan_timer_duration",
    "fan_current_speed",
    "fan_mode",
];

/// Copies any fan-timer field present in `prior` but absent from
/// `incoming` into `incoming`, unless the device is explicitly turning the
/// fan off (`fan_timer_timeout == 0` present in `incoming`).
pub fn preserve_fan_state(incoming: &mut Map<String, Value>, prior: &Value) {
    let turning_off = incoming
        .get("fan_timer_timeout")
        .and_then(Value::as_i64)
        == Some(0);
    if turning_off {
        return;
    }

    let Some(prior) = prior.as_object() else {
        return;
    };
    for field in FAN_FIELDS {
        if incoming.contains_key(*field) {
            continue;
        }
        if let Some(value) = prior.get(*field) {
            incoming.insert((*field).to_owned(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_forward_omitted_fan_fields() {
        let prior = serde_json::json!({"fan_timer_timeout": 1_700_000_000, "fan_mode": "auto"});
        let mut incoming = serde_json::json!({"target_temperature": 21.0})
            .as_object()
            .unwrap()
            .clone();
        preserve_fan_state(&mut incoming, &prior);
        assert_eq!(incoming["fan_timer_timeout"], serde_json::json!(1_700_000_000));
        assert_eq!(incoming["fan_mode"], serde_json::json!("auto"));
    }

    #[test]
    fn explicit_timeout_zero_skips_carry_forward() {
        let prior = serde_json::json!({"fan_timer_timeout": 1_700_000_000, "fan_mode": "auto"});
        let mut incoming = serde_json::json!({"fan_timer_timeout": 0})
            .as_object()
            .unwrap()
            .clone();
        preserve_fan_state(&mut incoming, &prior);
        assert_eq!(incoming.get("fan_mode"), None);
        assert_eq!(incoming["fan_timer_timeout"], serde_json::json!(0));
    }

    #[test]
    fn does_not_overwrite_fields_the_device_sent() {
        let prior = serde_json::json!({"fan_mode": "auto"});
        let mut incoming = serde_json::json!({"fan_mode": "on"})
            .as_object()
            .unwrap()
            .clone();
        preserve_fan_state(&mut incoming, &prior);
        assert_eq!(incoming["fan_mode"], serde_json::json!("on"));
    }
}
