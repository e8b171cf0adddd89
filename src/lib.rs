//! Permission-based JWT authorization [middleware for `axum`](https://docs.rs/axum/latest/axum/middleware/index.html),
//! verifying bearer tokens against the issuer's published [JSON Web Key Set](https://datatracker.ietf.org/doc/html/rfc7517).
//!
//! ## Overview
//!
//! Every protected request goes through the same linear pipeline:
//!
//! 1. The bearer token is taken from the `Authorization` header, which must read `Bearer <token>`.
//! 2. The signing key named by the token's `kid` header is looked up in the issuer's JWK set, typically served at
//!    `https://<domain>/.well-known/jwks.json`.
//! 3. The token's RSA signature, audience, issuer (`https://<domain>/`) and expiry are verified.
//! 4. The token's `permissions` claim must contain the permission the route requires, e.g. `post:drinks`.
//!
//! Only then does the protected handler run, receiving the verified [`Claims`]. Any failure short-circuits with an
//! [`AuthError`] whose JSON body and HTTP status are stable for clients.
//!
//! ## Features
//!
//! - **Caching**: the remote JWK set can be cached with a time-to-live. Concurrent cache misses share one request.
//! - **Key rotation**: a token signed with an unknown `kid` triggers a refresh of the cached set, at most once per
//!   configurable interval.
//! - **Bounded fetches**: fetching the JWK set is subject to a timeout and can be cancelled.
//!
//! ## Quickstart
//!
//! ```rust,no_run
//! use axum::{routing::get, Router};
//! use jwks_guard::{AuthConfig, Authorizer, Claims};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AuthConfig::new("your-tenant.us.auth0.com", "coffeeshop")?;
//!     let authorizer = Authorizer::from_config(&config);
//!
//!     let router = Router::new().route(
//!         "/drinks-detail",
//!         get(|claims: Claims| async move { format!("Hello {:?}", claims.subject()) })
//!             .route_layer(authorizer.require("get:drinks-detail")),
//!     );
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, router).await?;
//!     Ok(())
//! }
//! ```

pub mod authorization;
pub mod bearer;
pub mod claims;
pub mod config;
pub mod permissions;

pub use authorization::{AuthorizationLayer, Authorizer, ProtectedOperation};
pub use claims::{Audience, Claims};
pub use config::{AuthConfig, ConfigError};
pub use error::{AuthError, JwksError};
pub use jwk_set::JwkSet;
pub use remote_jwk_set::{RemoteJwkSet, RemoteJwkSetBuilder};

mod error;
mod jwk_set;
mod remote_jwk_set;

#[cfg(test)]
mod test_support;
