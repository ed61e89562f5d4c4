use sqlx::{PgPool, Row};

pub struct EntryCodeRow {
    pub code: String,
    pub serial: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub claimed_by: Option<String>,
    pub claimed_at: Option<i64>,
}

fn row_to_entry_code(row: &sqlx::postgres::PgRow) -> EntryCodeRow {
    EntryCodeRow {
        code: row.get("code"),
        serial: row.get("serial"),
        created_at: row.get("created_at"),
        expires_at: row.get("expires_at"),
        claimed_by: row.get("claimed_by"),
        claimed_at: row.get("claimed_at"),
    }
}

/// Replaces any existing entry codes for `serial` with a fresh, unclaimed
/// one, matching the original implementation's "at most one active code
/// per serial" rule.
pub async fn replace_for_serial(
    pool: &PgPool,
    code: &str,
    serial: &str,
    created_at: i64,
    expires_at: i64,
) -> sqlx::Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM entry_codes WHERE serial = $1")
        .bind(serial)
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        "INSERT INTO entry_codes (code, serial, created_at, expires_at) VALUES ($1, $2, $3, $4)",
    )
    .bind(code)
    .bind(serial)
    .bind(created_at)
    .bind(expires_at)
    .execute(&mut *tx)
    .await?;
    tx.commit().await
}

pub async fn code_exists(pool: &PgPool, code: &str) -> sqlx::Result<bool> {
    let row = sqlx::query("SELECT 1 FROM entry_codes WHERE code = $1")
        .bind(code)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

pub async fn get_active_for_serial(
    pool: &PgPool,
    serial: &str,
    now: i64,
) -> sqlx::Result<Option<EntryCodeRow>> {
    let row = sqlx::query(
        r#"SELECT code, serial, created_at, expires_at, claimed_by, claimed_at
           FROM entry_codes
           WHERE serial = $1 AND expires_at > $2 AND claimed_by IS NULL
           ORDER BY created_at DESC LIMIT 1"#,
    )
    .bind(serial)
    .bind(now)
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(row_to_entry_code))
}

pub async fn get_latest_for_serial(
    pool: &PgPool,
    serial: &str,
) -> sqlx::Result<Option<EntryCodeRow>> {
    let row = sqlx::query(
        r#"SELECT code, serial, created_at, expires_at, claimed_by, claimed_at
           FROM entry_codes WHERE serial = $1 ORDER BY created_at DESC LIMIT 1"#,
    )
    .bind(serial)
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(row_to_entry_code))
}

/// Atomically claims an unexpired, unclaimed code for `user_id`.
pub async fn claim(pool: &PgPool, code: &str, user_id: &str, now: i64) -> sqlx::Result<bool> {
    let result = sqlx::query(
        r#"UPDATE entry_codes SET claimed_by = $1, claimed_at = $2
           WHERE code = $3 AND claimed_by IS NULL AND expires_at > $2"#,
    )
    .bind(user_id)
    .bind(now)
    .bind(code)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn get_by_code(pool: &PgPool, code: &str) -> sqlx::Result<Option<EntryCodeRow>> {
    let row = sqlx::query(
        r#"SELECT code, serial, created_at, expires_at, claimed_by, claimed_at
           FROM entry_codes WHERE code = $1"#,
    )
    .bind(code)
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(row_to_entry_code))
}
