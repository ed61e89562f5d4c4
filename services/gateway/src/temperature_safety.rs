//! Safety clamping for temperature setpoints. A shared-bucket override wins
//! over a device-bucket override, which wins over the hardcoded defaults.

use serde_json::{Map, Value};

pub const DEFAULT_MIN_CELSIUS: f64 = 7.222;
pub const DEFAULT_MAX_CELSIUS: f64 = 35.0;

const CLAMPED_FIELDS: &[&str] = &[
    "target_temperature",
    "target_temperature_high",
    "target_temperature_low",
    "eco_temperature_high",
    "eco_temperature_low",
];

pub fn get_safety_bounds(device_value: &Value, shared_value: &Value) -> (f64, f64) {
    let min = shared_value
        .get("temperature_min")
        .and_then(Value::as_f64)
        .or_else(|| device_value.get("temperature_min").and_then(Value::as_f64))
        .unwrap_or(DEFAULT_MIN_CELSIUS);
    let max = shared_value
        .get("temperature_max")
        .and_then(Value::as_f64)
        .or_else(|| device_value.get("temperature_max").and_then(Value::as_f64))
        .unwrap_or(DEFAULT_MAX_CELSIUS);
    (min, max)
}

pub fn clamp_temperature(value: f64, min: f64, max: f64, field_name: &str, serial: &str) -> f64 {
    if value < min {
        tracing::warn!(serial, field_name, value, min, "temperature below safety minimum, clamping");
        min
    } else if value > max {
        tracing::warn!(serial, field_name, value, max, "temperature above safety maximum, clamping");
        max
    } else {
        value
    }
}

/// Clamps every recognized temperature field present in `values` in place.
pub fn validate_and_clamp_temperatures(
    values: &mut Map<String, Value>,
    device_value: &Value,
    shared_value: &Value,
    serial: &str,
) {
    let (min, max) = get_safety_bounds(device_value, shared_value);
    for field in CLAMPED_FIELDS {
        if let Some(raw) = values.get(*field).and_then(Value::as_f64) {
            let clamped = clamp_temperature(raw, min, max, field, serial);
            values.insert((*field).to_owned(), Value::from(clamped));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_override_wins_over_device_override() {
        let device = serde_json::json!({"temperature_min": 10.0});
        let shared = serde_json::json!({"temperature_min": 15.0});
        let (min, _) = get_safety_bounds(&device, &shared);
        assert_eq!(min, 15.0);
    }

    #[test]
    fn defaults_apply_when_no_override_present() {
        let (min, max) = get_safety_bounds(&Value::Null, &Value::Null);
        assert_eq!(min, DEFAULT_MIN_CELSIUS);
        assert_eq!(max, DEFAULT_MAX_CELSIUS);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        assert_eq!(clamp_temperature(2.0, 7.222, 35.0, "target_temperature", "SERIAL0001"), 7.222);
        assert_eq!(clamp_temperature(50.0, 7.222, 35.0, "target_temperature", "SERIAL0001"), 35.0);
        assert_eq!(clamp_temperature(20.0, 7.222, 35.0, "target_temperature", "SERIAL0001"), 20.0);
    }

    #[test]
    fn validate_and_clamp_only_touches_present_fields() {
        let mut values = serde_json::json!({"target_temperature": 100.0, "away": true})
            .as_object()
            .unwrap()
            .clone();
        validate_and_clamp_temperatures(&mut values, &Value::Null, &Value::Null, "SERIAL0001");
        assert_eq!(values["target_temperature"], serde_json::json!(35.0));
        assert_eq!(values["away"], serde_json::json!(true));
    }
}
