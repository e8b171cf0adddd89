//! Fixtures shared by the unit tests: a mock issuer publishing an RSA JWK set, and token helpers.
use std::net::SocketAddr;
use std::time::SystemTime;

use http::{header, HeaderMap, HeaderValue};
use jsonwebtoken::jwk::{AlgorithmParameters, CommonParameters, KeyAlgorithm, PublicKeyUse};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use openssl::pkey::Private;
use openssl::rsa::Rsa;
use serde_json::json;
use tokio::task;
use tokio_util::sync::{CancellationToken, DropGuard};
use url::Url;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

use crate::authorization::Authorizer;
use crate::remote_jwk_set::RemoteJwkSet;

pub(crate) const JWKS_PATH: &str = "/.well-known/jwks.json";
pub(crate) const ISSUER: &str = "https://coffee.test/";
pub(crate) const AUDIENCE: &str = "coffeeshop";
pub(crate) const KID: &str = "42";

pub(crate) fn now() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

pub(crate) fn jwks_url(server: &MockServer) -> Url {
    Url::parse(&format!("{}{JWKS_PATH}", server.uri())).unwrap()
}

/// A syntactically valid JWK set whose keys cannot verify anything.
pub(crate) fn unsigned_jwk_set(kids: &[&str]) -> serde_json::Value {
    let keys: Vec<_> = kids
        .iter()
        .map(|kid| {
            json!({
                "kty": "RSA",
                "kid": kid,
                "use": "sig",
                "alg": "RS256",
                "n": "u1SU1LfVLPHCozMxH2Mo4lgOEePzNm0tRgeLezV6ffAt0gunVTLw7onLRnrq0_IzW7yWR7QkrmBL7jTKEn5u-qKhbwKfBstIs-bMY2Zkp18gnTxKLxoS2tFczGkPLPgizskuemMghRniWaoLcyehkd3qqGElvW_VDL5AaWTg0nLVkjRo9z-40RQzuVaE8AkAFmxZzow3x-VJYKdjykkJ0iT9wCS0DRTXu269V264Vf_3jvredZiKRkgwlL9xNAwxXFg0x_XFw005UWVRIkdgcKWTjpBP2dPwVZ4WWC-9aGVd-Gyn1o0CLelf4rEjGoXbAAEgAqeGUxrcIlbjXfbcmw",
                "e": "AQAB",
            })
        })
        .collect();
    json!({ "keys": keys })
}

pub(crate) fn rsa_jwk(rsa_key: &Rsa<Private>, kid: &str) -> jsonwebtoken::jwk::Jwk {
    jsonwebtoken::jwk::Jwk {
        common: CommonParameters {
            public_key_use: Some(PublicKeyUse::Signature),
            key_algorithm: Some(KeyAlgorithm::RS256),
            key_id: Some(kid.to_string()),
            ..CommonParameters::default()
        },
        algorithm: AlgorithmParameters::RSA(jsonwebtoken::jwk::RSAKeyParameters {
            n: base64_url::encode(&rsa_key.n().to_vec()),
            e: base64_url::encode(&rsa_key.e().to_vec()),
            key_type: jsonwebtoken::jwk::RSAKeyType::RSA,
        }),
    }
}

/// Claims an issuer would put into a valid token for a barista holding `permissions`.
pub(crate) fn claims_with(permissions: &[&str]) -> serde_json::Value {
    let issued_at = now();
    json!({
        "sub": "auth0|barista",
        "iss": ISSUER,
        "aud": AUDIENCE,
        "iat": issued_at,
        "exp": issued_at + 3600,
        "permissions": permissions,
    })
}

pub(crate) fn bearer_headers(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    );
    headers
}

fn sign_rs256(claims: &serde_json::Value, kid: Option<&str>, encoding_key: &EncodingKey) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    jsonwebtoken::encode(&header, claims, encoding_key).unwrap()
}

fn encoding_key(rsa_key: &Rsa<Private>) -> EncodingKey {
    EncodingKey::from_rsa_der(&rsa_key.private_key_to_der().unwrap())
}

/// Mock issuer publishing a single RSA key with kid [`KID`] at [`JWKS_PATH`].
pub(crate) struct MockAuthServer {
    inner_server: MockServer,
    encoding_key: EncodingKey,
}

impl MockAuthServer {
    pub async fn start() -> MockAuthServer {
        let rsa_private_key = Rsa::generate(2048).unwrap();
        let jwks = jsonwebtoken::jwk::JwkSet {
            keys: vec![rsa_jwk(&rsa_private_key, KID)],
        };

        let inner_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(JWKS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks))
            .mount(&inner_server)
            .await;

        MockAuthServer {
            inner_server,
            encoding_key: encoding_key(&rsa_private_key),
        }
    }

    pub fn remote_jwk_set(&self) -> RemoteJwkSet {
        RemoteJwkSet::builder(jwks_url(&self.inner_server)).build()
    }

    pub fn authorizer(&self) -> Authorizer {
        Authorizer::new(self.remote_jwk_set(), ISSUER, AUDIENCE)
    }

    pub fn sign(&self, claims: &serde_json::Value) -> String {
        self.sign_with_kid(claims, Some(KID))
    }

    pub fn sign_with_kid(&self, claims: &serde_json::Value, kid: Option<&str>) -> String {
        sign_rs256(claims, kid, &self.encoding_key)
    }

    /// Signs with a freshly generated key the server does not publish, under the published kid.
    pub fn sign_with_fresh_key(claims: &serde_json::Value) -> String {
        let rsa_key = Rsa::generate(2048).unwrap();
        sign_rs256(claims, Some(KID), &encoding_key(&rsa_key))
    }
}

/// Serves `router` on an ephemeral port until the returned guard is dropped.
pub(crate) async fn serve(router: axum::Router) -> (SocketAddr, DropGuard) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown_token = CancellationToken::new();
    let shutdown_signal = shutdown_token.clone().cancelled_owned();
    task::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .unwrap();
    });

    (addr, shutdown_token.drop_guard())
}
