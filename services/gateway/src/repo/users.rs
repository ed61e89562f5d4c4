use sqlx::PgPool;

pub async fn ensure(pool: &PgPool, user_id: &str, email: &str, created_at: i64) -> sqlx::Result<()> {
    sqlx::query(
        r#"INSERT INTO users (user_id, email, created_at) VALUES ($1, $2, $3)
           ON CONFLICT (user_id) DO UPDATE SET email = $2"#,
    )
    .bind(user_id)
    .bind(email)
    .bind(created_at)
    .execute(pool)
    .await?;
    Ok(())
}
