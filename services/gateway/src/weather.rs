//! Weather proxy with an in-memory-backed, database-persisted TTL cache.
//! No concrete upstream is wired in by default; operators inject one via
//! `AppState`'s `WeatherProvider` when they have credentials for one.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::{AppError, AppResult};
use crate::repo::weather_cache;

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn fetch(&self, postal_code: &str, country: &str) -> AppResult<serde_json::Value>;
}

/// Used when no upstream weather provider is configured. Always reports
/// the service as unavailable rather than silently fabricating data.
pub struct UnavailableWeatherProvider;

#[async_trait]
impl WeatherProvider for UnavailableWeatherProvider {
    async fn fetch(&self, _postal_code: &str, _country: &str) -> AppResult<serde_json::Value> {
        Err(AppError::UpstreamUnavailable)
    }
}

/// Returns a cached forecast if one is fresh enough, otherwise calls
/// `provider` and caches the result. A failed fetch surfaces as
/// [`AppError::UpstreamUnavailable`] rather than falling back to stale data.
pub async fn get_weather(
    pool: &PgPool,
    provider: &dyn WeatherProvider,
    postal_code: &str,
    country: &str,
    ttl_seconds: i64,
    now: i64,
) -> AppResult<serde_json::Value> {
    if let Some(cached) = weather_cache::get(pool, postal_code, country, now - ttl_seconds).await? {
        return Ok(cached);
    }

    let fetched = provider.fetch(postal_code, country).await?;
    weather_cache::put(pool, postal_code, country, now, &fetched).await?;
    Ok(fetched)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unavailable_provider_surfaces_as_upstream_error() {
        let err = UnavailableWeatherProvider
            .fetch("90210", "US")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable));
    }
}
