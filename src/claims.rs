use serde::{Deserialize, Serialize};

/// The `aud` claim, which JWTs may carry either as a single string or as a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    pub fn contains(&self, audience: &str) -> bool {
        match self {
            Audience::Single(single) => single == audience,
            Audience::Multiple(all) => all.iter().any(|a| a == audience),
        }
    }
}

/// Claims of a token whose signature, audience, issuer and expiry have all been validated.
///
/// Values of this type are only ever produced by [`Authorizer`](crate::authorization::Authorizer), so holding one is
/// proof of a fully verified token. Fields are read-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Claims {
    iss: String,
    aud: Audience,
    exp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    permissions: Option<Vec<String>>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

/// Token payload as decoded by `jsonwebtoken`, before it is handed out as [`Claims`].
///
/// `jsonwebtoken` deserializes the payload before it checks required claims, so the registered claims stay optional
/// here and a missing one surfaces as `MissingRequiredClaim` from validation.
#[derive(Deserialize)]
pub(crate) struct DecodedPayload {
    iss: Option<String>,
    aud: Option<Audience>,
    exp: Option<u64>,
    #[serde(default)]
    permissions: Option<Vec<String>>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

impl TryFrom<DecodedPayload> for Claims {
    type Error = jsonwebtoken::errors::Error;

    fn try_from(payload: DecodedPayload) -> Result<Self, Self::Error> {
        let missing = |claim: &str| jsonwebtoken::errors::ErrorKind::MissingRequiredClaim(claim.to_string());
        Ok(Self {
            iss: payload.iss.ok_or_else(|| missing("iss"))?,
            aud: payload.aud.ok_or_else(|| missing("aud"))?,
            exp: payload.exp.ok_or_else(|| missing("exp"))?,
            permissions: payload.permissions,
            extra: payload.extra,
        })
    }
}

impl Claims {
    pub fn issuer(&self) -> &str {
        &self.iss
    }

    pub fn audience(&self) -> &Audience {
        &self.aud
    }

    /// Expiry as seconds since the Unix epoch.
    pub fn expires_at(&self) -> u64 {
        self.exp
    }

    /// The `permissions` claim, or `None` if the token does not carry one at all.
    pub fn permissions(&self) -> Option<&[String]> {
        self.permissions.as_deref()
    }

    pub fn subject(&self) -> Option<&str> {
        self.extra.get("sub").and_then(serde_json::Value::as_str)
    }

    /// Any claim not covered by the typed accessors.
    pub fn get(&self, name: &str) -> Option<&serde_json::Value> {
        self.extra.get(name)
    }
}

#[cfg(test)]
impl Claims {
    pub(crate) fn from_value(payload: serde_json::Value) -> Claims {
        Claims::try_from(serde_json::from_value::<DecodedPayload>(payload).unwrap()).unwrap()
    }
}
