use std::{
    future::Future,
    sync::Arc,
    task::{Context, Poll},
};

use axum::extract::{FromRequestParts, Request};
use axum::http::request::Parts;
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;
use http::{HeaderMap, StatusCode};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::jwk::AlgorithmParameters;
use jsonwebtoken::{decode, decode_header, get_current_timestamp, Algorithm, DecodingKey, Validation};
use tokio_util::sync::CancellationToken;
use tower_layer::Layer;
use tower_service::Service;
use tracing::warn;

use crate::bearer::bearer_token;
use crate::claims::{Claims, DecodedPayload};
use crate::config::{is_rsa_family, AuthConfig, MAX_LEEWAY_SECONDS};
use crate::error::{AuthError, JwksError, HEADER_MISSING_KID};
use crate::jwk_set::JwkSet;
use crate::permissions::check_permission;
use crate::remote_jwk_set::RemoteJwkSet;

/// Verifies bearer tokens against a JWK set and checks their permissions.
///
/// Cheap to clone; clones share the JWK set cache.
#[derive(Clone)]
pub struct Authorizer {
    jwk_set: JwkSet,
    validation: Arc<Validation>,
    leeway_seconds: u64,
}

impl Authorizer {
    /// Accepts RS256 tokens issued by `issuer` for `audience`, without clock leeway.
    pub fn new(jwk_set: impl Into<JwkSet>, issuer: &str, audience: &str) -> Self {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[issuer]);
        validation.set_audience(&[audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        // Expiry is checked after audience and issuer, see `verify`.
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            jwk_set: jwk_set.into(),
            validation: Arc::new(validation),
            leeway_seconds: 0,
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        let mut remote_jwk_set = RemoteJwkSet::builder(config.jwks_url.clone())
            .with_timeout(config.fetch_timeout)
            .with_min_refresh_interval(config.min_refresh_interval);
        if let Some(time_to_live) = config.cache_ttl {
            remote_jwk_set = remote_jwk_set.with_cache(time_to_live);
        }

        Self::new(remote_jwk_set.build(), &config.issuer(), &config.audience)
            .with_algorithms(&config.algorithms)
            .with_leeway(config.leeway_seconds)
    }

    /// Replaces the accepted signature algorithms. Algorithms outside the RSA family are ignored.
    pub fn with_algorithms(mut self, algorithms: &[Algorithm]) -> Self {
        Arc::make_mut(&mut self.validation).algorithms = algorithms
            .iter()
            .copied()
            .filter(is_rsa_family)
            .collect();
        self
    }

    /// Clock skew tolerated when checking `exp`, capped at one day.
    pub fn with_leeway(mut self, seconds: u64) -> Self {
        self.leeway_seconds = seconds.min(MAX_LEEWAY_SECONDS);
        self
    }

    /// Verifies signature, audience, issuer and expiry of `token`.
    ///
    /// The token's `alg` header is only checked against the configured algorithms, never trusted to choose one.
    /// [`AuthError::TokenExpired`] is only reported for tokens that pass every other check.
    pub async fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        // First, just decode the header part of the token, without validating the token, to get the kid.
        let header = decode_header(token).map_err(AuthError::TokenUnparseable)?;
        let kid = header
            .kid
            .ok_or(AuthError::MalformedHeader(HEADER_MISSING_KID))?;

        let jwk = self.jwk_set.find(&kid).await?;

        let decoding_key = match &jwk.algorithm {
            AlgorithmParameters::RSA(rsa) => DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
                .map_err(AuthError::TokenUnparseable)?,
            _ => return Err(AuthError::TokenUnparseable(ErrorKind::InvalidKeyFormat.into())),
        };

        let token = decode::<DecodedPayload>(token, &decoding_key, &self.validation)
            .map_err(AuthError::from_validation)?;
        let claims = Claims::try_from(token.claims).map_err(AuthError::InvalidClaims)?;

        if claims.expires_at().saturating_add(self.leeway_seconds) < get_current_timestamp() {
            return Err(AuthError::TokenExpired);
        }
        Ok(claims)
    }

    /// Extracts the bearer token from `headers`, verifies it and checks that it grants `permission`.
    pub async fn authorize(&self, headers: &HeaderMap, permission: &str) -> Result<Claims, AuthError> {
        let token = bearer_token(headers)?;
        let claims = self.verify(token).await?;
        check_permission(permission, &claims)?;
        Ok(claims)
    }

    /// Like [`Authorizer::authorize`], but gives up as soon as `cancellation` fires.
    pub async fn authorize_until_cancelled(
        &self,
        headers: &HeaderMap,
        permission: &str,
        cancellation: &CancellationToken,
    ) -> Result<Claims, AuthError> {
        tokio::select! {
            biased;
            _ = cancellation.cancelled() => Err(JwksError::Cancelled.into()),
            result = self.authorize(headers, permission) => result,
        }
    }

    /// Runs `operation` with the verified claims if the request grants `permission`.
    ///
    /// On any authorization failure the operation is dropped without being run.
    pub async fn guard<O>(
        &self,
        headers: &HeaderMap,
        permission: &str,
        operation: O,
    ) -> Result<O::Output, AuthError>
    where
        O: ProtectedOperation,
    {
        let claims = self.authorize(headers, permission).await?;
        Ok(operation.run(claims).await)
    }

    /// A middleware layer that requires `permission` on every request.
    pub fn require(&self, permission: impl Into<Arc<str>>) -> AuthorizationLayer {
        AuthorizationLayer::new(self.clone(), permission)
    }
}

/// An operation that may only run on behalf of an authorized caller.
pub trait ProtectedOperation {
    type Output;

    fn run(self, claims: Claims) -> impl Future<Output = Self::Output> + Send;
}

impl<F, Fut> ProtectedOperation for F
where
    F: FnOnce(Claims) -> Fut,
    Fut: Future + Send,
{
    type Output = Fut::Output;

    fn run(self, claims: Claims) -> impl Future<Output = Self::Output> + Send {
        self(claims)
    }
}

#[derive(Clone)]
pub struct AuthorizationLayer {
    authorizer: Authorizer,
    permission: Arc<str>,
}

impl AuthorizationLayer {
    pub fn new(authorizer: Authorizer, permission: impl Into<Arc<str>>) -> Self {
        Self {
            authorizer,
            permission: permission.into(),
        }
    }
}

impl<S> Layer<S> for AuthorizationLayer {
    type Service = AuthorizationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthorizationService {
            inner,
            authorizer: self.authorizer.clone(),
            permission: self.permission.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthorizationService<S> {
    inner: S,
    authorizer: Authorizer,
    permission: Arc<str>,
}

impl<S> Service<Request> for AuthorizationService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        // Move the original service into the closure instead of its clone. This makes sure that the original service is
        // `call`ed instead of the cloned one, which might not be ready yet (`poll_ready` hasn't been called on the
        // clone yet).
        // See [docs](https://docs.rs/tower/latest/tower/trait.Service.html#be-careful-when-cloning-inner-services).
        let inner_clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, inner_clone);

        let authorizer = self.authorizer.clone();
        let permission = self.permission.clone();
        Box::pin(async move {
            let (mut parts, body) = req.into_parts();
            match authorizer.authorize(&parts.headers, &permission).await {
                Ok(claims) => {
                    parts.extensions.insert(claims);
                    inner.call(Request::from_parts(parts, body)).await
                }
                Err(auth_error) => {
                    warn!(
                        error = %auth_error,
                        code = auth_error.code(),
                        status = auth_error.status().as_u16(),
                        permission = %permission,
                        path = %parts.uri.path(),
                        "request authorization failed"
                    );
                    Ok(auth_error.into_response())
                }
            }
        })
    }
}

/// Hands the claims verified by [`AuthorizationLayer`] to a handler.
///
/// Rejects with `401 Unauthorized` if the route is not behind the layer.
impl<S> FromRequestParts<S> for Claims
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Claims>()
            .cloned()
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}
