//! Authorization settings read from the environment (and a `.env` file, if present).
use std::time::Duration;

use jsonwebtoken::Algorithm;
use url::Url;

const DEFAULT_CACHE_TTL_SECONDS: u64 = 600;
const DEFAULT_FETCH_TIMEOUT_MS: u64 = 5000;
const DEFAULT_MIN_REFRESH_SECONDS: u64 = 10;
/// Upper bound on the clock skew tolerated for `exp`: one day.
pub(crate) const MAX_LEEWAY_SECONDS: u64 = 86_400;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing configuration: {0}")]
    Missing(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Domain of the token issuer, e.g. `my-tenant.us.auth0.com`.
    pub domain: String,
    pub audience: String,
    /// Accepted signature algorithms, all from the RSA family.
    pub algorithms: Vec<Algorithm>,
    pub jwks_url: Url,
    /// `None` fetches the JWK set on every authorization check.
    pub cache_ttl: Option<Duration>,
    pub fetch_timeout: Duration,
    pub min_refresh_interval: Duration,
    pub leeway_seconds: u64,
}

impl AuthConfig {
    /// Settings for `domain` and `audience` with every other option at its default.
    pub fn new(domain: &str, audience: &str) -> Result<Self, ConfigError> {
        let domain = domain.trim().trim_end_matches('/');
        if domain.is_empty() || domain.contains("://") {
            return Err(ConfigError::Invalid("AUTH_DOMAIN"));
        }
        let jwks_url = Url::parse(&format!("https://{domain}/.well-known/jwks.json"))
            .map_err(|_| ConfigError::Invalid("AUTH_DOMAIN"))?;

        Ok(Self {
            domain: domain.to_string(),
            audience: audience.to_string(),
            algorithms: vec![Algorithm::RS256],
            jwks_url,
            cache_ttl: Some(Duration::from_secs(DEFAULT_CACHE_TTL_SECONDS)),
            fetch_timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            min_refresh_interval: Duration::from_secs(DEFAULT_MIN_REFRESH_SECONDS),
            leeway_seconds: 0,
        })
    }

    /// The issuer every accepted token must carry: `https://<domain>/`.
    pub fn issuer(&self) -> String {
        format!("https://{}/", self.domain)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let domain = lookup("AUTH_DOMAIN").ok_or(ConfigError::Missing("AUTH_DOMAIN"))?;
        let audience = lookup("API_AUDIENCE").ok_or(ConfigError::Missing("API_AUDIENCE"))?;
        let mut config = Self::new(&domain, &audience)?;

        if let Some(algorithms) = lookup("AUTH_ALGORITHMS") {
            config.algorithms = parse_algorithms(&algorithms)?;
        }

        if let Some(jwks_url) = lookup("JWKS_URL") {
            config.jwks_url = Url::parse(&jwks_url).map_err(|_| ConfigError::Invalid("JWKS_URL"))?;
        }

        let cache_ttl = parse_u64(&lookup, "JWKS_CACHE_TTL_SECONDS", DEFAULT_CACHE_TTL_SECONDS)?;
        config.cache_ttl = (cache_ttl > 0).then(|| Duration::from_secs(cache_ttl));

        config.fetch_timeout = Duration::from_millis(parse_u64(
            &lookup,
            "JWKS_FETCH_TIMEOUT_MS",
            DEFAULT_FETCH_TIMEOUT_MS,
        )?);
        config.min_refresh_interval = Duration::from_secs(parse_u64(
            &lookup,
            "JWKS_MIN_REFRESH_SECONDS",
            DEFAULT_MIN_REFRESH_SECONDS,
        )?);
        config.leeway_seconds = parse_u64(&lookup, "TOKEN_LEEWAY_SECONDS", 0)?;
        if config.leeway_seconds > MAX_LEEWAY_SECONDS {
            return Err(ConfigError::Invalid("TOKEN_LEEWAY_SECONDS"));
        }

        Ok(config)
    }
}

fn parse_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u64,
) -> Result<u64, ConfigError> {
    match lookup(key) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

fn parse_algorithms(value: &str) -> Result<Vec<Algorithm>, ConfigError> {
    let algorithms = value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<Algorithm>()
                .ok()
                .filter(is_rsa_family)
                .ok_or(ConfigError::Invalid("AUTH_ALGORITHMS"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if algorithms.is_empty() {
        return Err(ConfigError::Invalid("AUTH_ALGORITHMS"));
    }
    Ok(algorithms)
}

pub(crate) fn is_rsa_family(algorithm: &Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
    )
}
