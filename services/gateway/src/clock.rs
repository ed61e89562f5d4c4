//! Thin wrapper so call sites don't sprinkle `chrono::Utc::now()` directly.

pub fn now_unix() -> i64 {
    chrono::Utc::now().timestamp()
}
