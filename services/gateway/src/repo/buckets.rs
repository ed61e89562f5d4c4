use nest_protocol::Bucket;
use sqlx::{PgPool, Row};

fn row_to_bucket(row: &sqlx::postgres::PgRow) -> Bucket {
    Bucket {
        serial: row.get("serial"),
        object_key: row.get("object_key"),
        revision: row.get("revision"),
        timestamp: row.get("ts"),
        value: row.get("value"),
    }
}

pub async fn get(pool: &PgPool, serial: &str, object_key: &str) -> sqlx::Result<Option<Bucket>> {
    let row = sqlx::query(
        "SELECT serial, object_key, revision, ts, value FROM buckets WHERE serial = $1 AND object_key = $2",
    )
    .bind(serial)
    .bind(object_key)
    .fetch_optional(pool)
    .await?;
    Ok(row.as_ref().map(row_to_bucket))
}

pub async fn get_by_serial(pool: &PgPool, serial: &str) -> sqlx::Result<Vec<Bucket>> {
    let rows = sqlx::query(
        "SELECT serial, object_key, revision, ts, value FROM buckets WHERE serial = $1",
    )
    .bind(serial)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(row_to_bucket).collect())
}

pub async fn get_all(pool: &PgPool) -> sqlx::Result<Vec<Bucket>> {
    let rows = sqlx::query("SELECT serial, object_key, revision, ts, value FROM buckets")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(row_to_bucket).collect())
}

pub async fn all_serials(pool: &PgPool) -> sqlx::Result<Vec<String>> {
    let rows = sqlx::query("SELECT DISTINCT serial FROM buckets")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(|r| r.get("serial")).collect())
}

/// Inserts or overwrites the stored row exactly as given. Callers own the
/// revision-bump-on-change invariant; this is a plain upsert.
pub async fn put(pool: &PgPool, bucket: &Bucket) -> sqlx::Result<()> {
    sqlx::query(
        r#"INSERT INTO buckets (serial, object_key, revision, ts, value, updated_at)
           VALUES ($1, $2, $3, $4, $5, now())
           ON CONFLICT (serial, object_key)
           DO UPDATE SET revision = $3, ts = $4, value = $5, updated_at = now()"#,
    )
    .bind(&bucket.serial)
    .bind(&bucket.object_key)
    .bind(bucket.revision)
    .bind(bucket.timestamp)
    .bind(&bucket.value)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete(pool: &PgPool, serial: &str, object_key: &str) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM buckets WHERE serial = $1 AND object_key = $2")
        .bind(serial)
        .bind(object_key)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_device(pool: &PgPool, serial: &str) -> sqlx::Result<u64> {
    let result = sqlx::query("DELETE FROM buckets WHERE serial = $1")
        .bind(serial)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
