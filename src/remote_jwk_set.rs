use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use jsonwebtoken::jwk::{Jwk, JwkSet};
use moka::{future::Cache, ops::compute::Op};
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::error::{AuthError, JwksError};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

/// Builder for configuring a `RemoteJwkSet` with an optional cache.
pub struct RemoteJwkSetBuilder {
    url: Url,
    cache_ttl: Option<Duration>,
    timeout: Duration,
    min_refresh_interval: Duration,
}

impl RemoteJwkSetBuilder {
    /// Creates a new builder with the given JWKS URL.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            cache_ttl: None,
            timeout: DEFAULT_TIMEOUT,
            min_refresh_interval: DEFAULT_MIN_REFRESH_INTERVAL,
        }
    }

    /// Enables caching to avoid re-fetching the remote JWK set on every authorization check.
    ///
    /// Concurrent cache misses share a single in-flight request.
    pub fn with_cache(mut self, time_to_live: Duration) -> Self {
        self.cache_ttl = Some(time_to_live);
        self
    }

    /// Upper bound for a single fetch, covering connect, request and response body.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Minimum age of a cached JWK set before a token with an unknown `kid` may trigger a refresh.
    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    /// Builds the `RemoteJwkSet` with the configured options.
    pub fn build(self) -> RemoteJwkSet {
        let cache = self.cache_ttl.map(|time_to_live| {
            Cache::builder()
                .max_capacity(1)
                .time_to_live(time_to_live)
                .build()
        });

        RemoteJwkSet {
            http_client: Client::new(),
            url: self.url,
            timeout: self.timeout,
            min_refresh_interval: self.min_refresh_interval,
            cache,
        }
    }
}

/// A JWK set published at a remote URL, typically `https://<domain>/.well-known/jwks.json`.
///
/// Clones share the same cache.
#[derive(Clone)]
pub struct RemoteJwkSet {
    http_client: Client,
    url: Url,
    timeout: Duration,
    min_refresh_interval: Duration,
    cache: Option<Cache<Url, FetchedJwkSet>>,
}

#[derive(Clone)]
struct FetchedJwkSet {
    jwk_set: Arc<JwkSet>,
    fetched_at: Instant,
}

impl RemoteJwkSet {
    /// Creates a builder for configuring a `RemoteJwkSet`.
    pub fn builder(url: Url) -> RemoteJwkSetBuilder {
        RemoteJwkSetBuilder::new(url)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub async fn jwk_set(&self) -> Result<Arc<JwkSet>, AuthError> {
        Ok(self.load().await?.jwk_set)
    }

    /// Looks up the JWK with the given `kid`.
    ///
    /// If the cached set does not contain it and is older than the minimum refresh interval, the set is re-fetched
    /// once, which picks up keys rotated in by the issuer.
    pub async fn find(&self, kid: &str) -> Result<Option<Jwk>, AuthError> {
        let fetched = self.load().await?;
        if let Some(jwk) = fetched.jwk_set.find(kid) {
            return Ok(Some(jwk.clone()));
        }

        // Without a cache the set was fetched just now.
        let Some(cache) = &self.cache else {
            return Ok(None);
        };
        if fetched.fetched_at.elapsed() < self.min_refresh_interval {
            debug!(kid, "unknown kid, JWK set too recent to refresh");
            return Ok(None);
        }

        debug!(kid, url = %self.url, "unknown kid, refreshing JWK set");
        // Only drop the entry we looked at; a concurrent refresh may already have replaced it.
        let seen_at = fetched.fetched_at;
        cache
            .entry(self.url.clone())
            .and_compute_with(|entry| async move {
                match entry {
                    Some(entry) if entry.value().fetched_at == seen_at => Op::Remove,
                    _ => Op::Nop,
                }
            })
            .await;

        let refreshed = self.load().await?;
        Ok(refreshed.jwk_set.find(kid).cloned())
    }

    async fn load(&self) -> Result<FetchedJwkSet, AuthError> {
        match &self.cache {
            Some(cache) => Ok(cache.try_get_with(self.url.clone(), self.fetch()).await?),
            None => Ok(self.fetch().await?),
        }
    }

    async fn fetch(&self) -> Result<FetchedJwkSet, JwksError> {
        debug!(url = %self.url, "fetching JWK set");
        let response = self
            .http_client
            .get(self.url.clone())
            .timeout(self.timeout)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(JwksError::ErrorResponse {
                status_code: response.status(),
            });
        }

        let jwk_set: JwkSet = response.json().await.map_err(JwksError::Decode)?;
        debug!(keys = jwk_set.keys.len(), "fetched JWK set");

        Ok(FetchedJwkSet {
            jwk_set: Arc::new(jwk_set),
            fetched_at: Instant::now(),
        })
    }
}
