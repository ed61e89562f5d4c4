use sqlx::{PgPool, Row};

pub async fn get(
    pool: &PgPool,
    postal_code: &str,
    country: &str,
    fresh_after: i64,
) -> sqlx::Result<Option<serde_json::Value>> {
    let row = sqlx::query(
        r#"SELECT data FROM weather_cache
           WHERE postal_code = $1 AND country = $2 AND fetched_at > $3"#,
    )
    .bind(postal_code)
    .bind(country)
    .bind(fresh_after)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|row| row.get("data")))
}

pub async fn put(
    pool: &PgPool,
    postal_code: &str,
    country: &str,
    fetched_at: i64,
    data: &serde_json::Value,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"INSERT INTO weather_cache (postal_code, country, fetched_at, data)
           VALUES ($1, $2, $3, $4)
           ON CONFLICT (postal_code, country)
           DO UPDATE SET fetched_at = $3, data = $4"#,
    )
    .bind(postal_code)
    .bind(country)
    .bind(fetched_at)
    .bind(data)
    .execute(pool)
    .await?;
    Ok(())
}
