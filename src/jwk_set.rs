use jsonwebtoken::jwk::Jwk;

use crate::{error::AuthError, remote_jwk_set::RemoteJwkSet};

/// Source of signing keys: either a [`RemoteJwkSet`] or a fixed, local [`jsonwebtoken::jwk::JwkSet`].
#[derive(Clone)]
pub enum JwkSet {
    Local(jsonwebtoken::jwk::JwkSet),
    Remote(RemoteJwkSet),
}

impl JwkSet {
    /// Resolves the key a token names in its `kid` header.
    ///
    /// A remote set gets one chance to refresh before the key counts as unknown. Either way a kid that resolves to
    /// nothing is [`AuthError::UnknownSigningKey`].
    pub async fn find(&self, kid: &str) -> Result<Jwk, AuthError> {
        let jwk = match self {
            JwkSet::Local(keys) => keys.find(kid).cloned(),
            JwkSet::Remote(remote_jwk_set) => remote_jwk_set.find(kid).await?,
        };
        jwk.ok_or(AuthError::UnknownSigningKey)
    }
}

impl From<jsonwebtoken::jwk::JwkSet> for JwkSet {
    fn from(jwk_set: jsonwebtoken::jwk::JwkSet) -> Self {
        JwkSet::Local(jwk_set)
    }
}

impl From<RemoteJwkSet> for JwkSet {
    fn from(remote_jwk_set: RemoteJwkSet) -> Self {
        JwkSet::Remote(remote_jwk_set)
    }
}

#[cfg(test)]
mod test {
    use super::JwkSet;
    use crate::error::AuthError;
    use crate::test_support::unsigned_jwk_set;

    #[tokio::test]
    async fn test_local_lookup() {
        let local: jsonwebtoken::jwk::JwkSet =
            serde_json::from_value(unsigned_jwk_set(&["a", "b"])).unwrap();
        let jwk_set = JwkSet::from(local);

        let jwk = jwk_set.find("b").await.unwrap();
        assert_eq!(jwk.common.key_id.as_deref(), Some("b"));
        assert!(matches!(
            jwk_set.find("c").await,
            Err(AuthError::UnknownSigningKey)
        ));
    }
}
