use sqlx::{PgPool, Row};

pub struct DeviceOwnerRow {
    pub serial: String,
    pub user_id: String,
    pub created_at: i64,
}

pub async fn get(pool: &PgPool, serial: &str) -> sqlx::Result<Option<DeviceOwnerRow>> {
    let row = sqlx::query("SELECT serial, user_id, created_at FROM device_owners WHERE serial = $1")
        .bind(serial)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|row| DeviceOwnerRow {
        serial: row.get("serial"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
    }))
}

pub async fn set(pool: &PgPool, serial: &str, user_id: &str, created_at: i64) -> sqlx::Result<()> {
    sqlx::query(
        r#"INSERT INTO device_owners (serial, user_id, created_at) VALUES ($1, $2, $3)
           ON CONFLICT (serial) DO UPDATE SET user_id = $2"#,
    )
    .bind(serial)
    .bind(user_id)
    .bind(created_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn list_for_user(pool: &PgPool, user_id: &str) -> sqlx::Result<Vec<DeviceOwnerRow>> {
    let rows = sqlx::query(
        "SELECT serial, user_id, created_at FROM device_owners WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .iter()
        .map(|row| DeviceOwnerRow {
            serial: row.get("serial"),
            user_id: row.get("user_id"),
            created_at: row.get("created_at"),
        })
        .collect())
}

pub async fn delete(pool: &PgPool, serial: &str, user_id: &str) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM device_owners WHERE serial = $1 AND user_id = $2")
        .bind(serial)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
