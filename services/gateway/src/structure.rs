//! Structure-id auto-assignment for a device's shared bucket.

/// Derives a structure id from a user id by stripping a leading `user_`
/// prefix, matching the original implementation's naming convention.
pub fn structure_id_for_user(user_id: &str) -> String {
    user_id
        .strip_prefix("user_")
        .unwrap_or(user_id)
        .to_owned()
}

/// Assigns `structure_id` into a shared-bucket value if it is not already
/// present, given the id of the user that owns the device.
pub fn assign_structure_id(shared_value: &mut serde_json::Map<String, serde_json::Value>, user_id: &str) {
    if shared_value.contains_key("structure_id") {
        return;
    }
    shared_value.insert(
        "structure_id".to_owned(),
        serde_json::Value::String(structure_id_for_user(user_id)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_user_prefix() {
        assert_eq!(structure_id_for_user("user_abc123"), "abc123");
        assert_eq!(structure_id_for_user("abc123"), "abc123");
    }

    #[test]
    fn does_not_overwrite_existing_structure_id() {
        let mut shared = serde_json::json!({"structure_id": "existing"})
            .as_object()
            .unwrap()
            .clone();
        assign_structure_id(&mut shared, "user_new");
        assert_eq!(shared["structure_id"], serde_json::json!("existing"));
    }

    #[test]
    fn assigns_when_absent() {
        let mut shared = serde_json::Map::new();
        assign_structure_id(&mut shared, "user_new");
        assert_eq!(shared["structure_id"], serde_json::json!("new"));
    }
}
