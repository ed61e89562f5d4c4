//! Three-tier device authorization: Unknown, Pending (entry code issued but
//! unclaimed), Paired (claimed, owned by a user).

use nest_protocol::PairingStatus;
use rand::Rng;
use sqlx::PgPool;

use crate::bucket_store::BucketStore;
use crate::error::AppResult;
use crate::repo::{device_owners, entry_codes};
use crate::subscriptions::SubscriptionRegistry;

const DIALOG_OBJECT_PREFIX: &str = "device_alert_dialog";
const MAX_GENERATION_ATTEMPTS: usize = 10;

#[derive(Debug, Clone)]
pub struct EntryCode {
    pub code: String,
    pub expires_at: i64,
}

/// Three ASCII digits followed by four uppercase ASCII letters, 7 chars.
pub fn is_valid_code_format(code: &str) -> bool {
    let bytes = code.as_bytes();
    bytes.len() == 7
        && bytes[0..3].iter().all(u8::is_ascii_digit)
        && bytes[3..7].iter().all(|b| b.is_ascii_uppercase())
}

fn random_code() -> String {
    let mut rng = rand::thread_rng();
    let digits: String = (0..3).map(|_| char::from(b'0' + rng.gen_range(0..10))).collect();
    let letters: String = (0..4).map(|_| char::from(b'A' + rng.gen_range(0..26))).collect();
    format!("{digits}{letters}")
}

fn dialog_object_key(serial: &str) -> String {
    format!("{DIALOG_OBJECT_PREFIX}.{serial}")
}

/// Synthesises `device_alert_dialog.<serial>` at revision 1 with `value` if
/// it doesn't already exist. Called both on entry-code issuance (with a
/// `confirm-pairing` payload) and on listing (with an empty payload).
pub async fn ensure_alert_dialog(
    bucket_store: &BucketStore,
    serial: &str,
    value: serde_json::Value,
    now: i64,
) -> AppResult<()> {
    let dialog_key = dialog_object_key(serial);
    if bucket_store.get(serial, &dialog_key).await.is_none() {
        bucket_store.upsert(serial, &dialog_key, value, now).await?;
    }
    Ok(())
}

pub async fn generate_entry_code(
    pool: &PgPool,
    bucket_store: &BucketStore,
    serial: &str,
    ttl_seconds: i64,
    now: i64,
) -> AppResult<EntryCode> {
    let expires_at = now + ttl_seconds;

    let mut code = random_code();
    for _ in 0..MAX_GENERATION_ATTEMPTS {
        if !entry_codes::code_exists(pool, &code).await? {
            break;
        }
        code = random_code();
    }

    entry_codes::replace_for_serial(pool, &code, serial, now, expires_at).await?;

    ensure_alert_dialog(
        bucket_store,
        serial,
        serde_json::json!({"dialog_id": "confirm-pairing", "dialog_data": ""}),
        now,
    )
    .await?;

    Ok(EntryCode { code, expires_at })
}

/// Atomically claims an unexpired, unclaimed code for `user_id`, creating
/// the device-ownership record if one does not already exist.
pub async fn claim(pool: &PgPool, code: &str, user_id: &str, now: i64) -> AppResult<bool> {
    if !is_valid_code_format(code) {
        return Ok(false);
    }
    let Some(entry) = entry_codes::get_by_code(pool, code).await? else {
        return Ok(false);
    };

    let claimed = entry_codes::claim(pool, code, user_id, now).await?;
    if claimed {
        device_owners::set(pool, &entry.serial, user_id, now).await?;
    }
    Ok(claimed)
}

pub async fn status(pool: &PgPool, serial: &str, now: i64) -> AppResult<PairingStatus> {
    let Some(entry) = entry_codes::get_latest_for_serial(pool, serial).await? else {
        return Ok(PairingStatus::NoKey);
    };

    match (entry.claimed_by, entry.claimed_at) {
        (Some(claimed_by), Some(claimed_at)) => Ok(PairingStatus::Claimed {
            claimed_by,
            claimed_at,
        }),
        _ if entry.expires_at > now => Ok(PairingStatus::Pending {
            expires_at: entry.expires_at,
        }),
        _ => Ok(PairingStatus::NoKey),
    }
}

/// Bumps the pairing dialog bucket to an empty value and notifies every
/// subscriber, regardless of which object keys they're waiting on.
pub async fn dismiss_pairing(
    bucket_store: &BucketStore,
    subscriptions: &SubscriptionRegistry,
    serial: &str,
    now: i64,
) -> AppResult<()> {
    let dialog_key = dialog_object_key(serial);
    let bucket = bucket_store
        .upsert(serial, &dialog_key, serde_json::json!({}), now)
        .await?;
    subscriptions
        .notify_all_subscribers(serial, std::slice::from_ref(&bucket))
        .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_strict_ddd_llll_format() {
        assert!(is_valid_code_format("123ABCD"));
        assert!(!is_valid_code_format("123 ABC"));
        assert!(!is_valid_code_format("ABCDEFG"));
        assert!(!is_valid_code_format("1234ABC"));
        assert!(!is_valid_code_format("123abcd"));
    }

    #[test]
    fn random_code_is_well_formed() {
        for _ in 0..50 {
            let code = random_code();
            assert!(is_valid_code_format(&code), "{code} not well formed");
        }
    }
}
