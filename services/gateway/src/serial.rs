//! Device serial extraction, mirroring the priority order Nest thermostats
//! actually use when talking to the backend: Basic Auth username first,
//! falling back to headers then query/path parameters.

use axum::http::HeaderMap;

const MIN_SERIAL_LENGTH: usize = 10;

fn sanitize(serial: &str) -> Option<String> {
    let cleaned: String = serial
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if cleaned.len() < MIN_SERIAL_LENGTH {
        None
    } else {
        Some(cleaned)
    }
}

fn from_basic_auth(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, encoded)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())?;
    let username = decoded.split(':').next()?;
    // Devices send "nest.SERIAL"; bare serials are also accepted.
    let candidate = match username.split_once('.') {
        Some((_, rest)) if !rest.is_empty() => rest,
        _ => username,
    };
    sanitize(candidate)
}

fn from_custom_header(headers: &HeaderMap) -> Option<String> {
    let value = headers.get("x-nl-device-serial")?.to_str().ok()?;
    sanitize(value)
}

/// Extracts a device serial from headers, falling back to an explicit
/// `serial` value pulled from a query or path parameter by the caller.
pub fn extract(headers: &HeaderMap, fallback: Option<&str>) -> Option<String> {
    from_basic_auth(headers)
        .or_else(|| from_custom_header(headers))
        .or_else(|| fallback.and_then(sanitize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_basic_auth(username: &str) -> HeaderMap {
        let encoded = base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            format!("{username}:unused"),
        );
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {encoded}")).unwrap(),
        );
        headers
    }

    #[test]
    fn extracts_serial_from_basic_auth_username() {
        let headers = headers_with_basic_auth("02AA01AB501203EQ");
        assert_eq!(extract(&headers, None), Some("02AA01AB501203EQ".to_owned()));
    }

    #[test]
    fn strips_nest_dot_prefix_from_basic_auth_username() {
        let headers = headers_with_basic_auth("nest.02AA01AB501203EQ");
        assert_eq!(extract(&headers, None), Some("02AA01AB501203EQ".to_owned()));
    }

    #[test]
    fn falls_back_to_query_or_path_parameter() {
        let headers = HeaderMap::new();
        assert_eq!(
            extract(&headers, Some("02aa01ab501203eq")),
            Some("02AA01AB501203EQ".to_owned())
        );
    }

    #[test]
    fn rejects_serials_shorter_than_minimum_length() {
        let headers = HeaderMap::new();
        assert_eq!(extract(&headers, Some("short")), None);
    }
}
