//! Bearer token claim extraction.
//!
//! Claims decoded here are **advisory**: no signature verification happens on
//! the client. They steer navigation (which dashboard, which tenant) but the
//! backend re-checks every request it serves.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use mandir_core::{EntityId, TenantId, UserId};

use crate::roles::RawRole;

/// URL-safe alphabet; tolerates tokens minted with or without padding.
const TOKEN_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenDecodeError {
    #[error("expected 3 token segments, found {0}")]
    SegmentCount(usize),

    #[error("payload is not valid base64url: {0}")]
    Base64(String),

    #[error("payload is not valid JSON: {0}")]
    Json(String),

    #[error("payload is not a JSON object")]
    NotAnObject,
}

/// Decodes bearer tokens into claim maps.
pub struct TokenCodec;

impl TokenCodec {
    /// Decode the payload segment of a JWT-shaped token.
    ///
    /// Never fails: expired, corrupt or absent tokens are an expected outcome
    /// and produce an empty map.
    pub fn decode(token: &str) -> Map<String, Value> {
        match Self::try_decode(token) {
            Ok(claims) => claims,
            Err(err) => {
                tracing::warn!(error = %err, "bearer token payload could not be decoded; using empty claims");
                Map::new()
            }
        }
    }

    pub fn try_decode(token: &str) -> Result<Map<String, Value>, TokenDecodeError> {
        let segments: Vec<&str> = token.trim().split('.').collect();
        if segments.len() != 3 {
            return Err(TokenDecodeError::SegmentCount(segments.len()));
        }

        let bytes = TOKEN_ENGINE
            .decode(segments[1])
            .map_err(|e| TokenDecodeError::Base64(e.to_string()))?;

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(TokenDecodeError::NotAnObject),
            Err(e) => Err(TokenDecodeError::Json(e.to_string())),
        }
    }
}

/// Typed view over the claims this client understands.
///
/// Every field is optional; a missing or ill-typed claim is simply `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: Option<UserId>,
    pub assigned_tenant_id: Option<TenantId>,
    pub entity_id: Option<EntityId>,
    pub role: Option<RawRole>,
    pub role_name: Option<RawRole>,
    pub role_id: Option<RawRole>,
    pub issued_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Claims {
    /// Decode and type the claims of `token`. Total, like [`TokenCodec::decode`].
    pub fn from_token(token: &str) -> Self {
        Self::from_map(&TokenCodec::decode(token))
    }

    pub fn from_map(map: &Map<String, Value>) -> Self {
        Self {
            user_id: map.get("user_id").and_then(id_claim),
            assigned_tenant_id: map.get("assigned_tenant_id").and_then(id_claim),
            entity_id: map.get("entity_id").and_then(id_claim),
            role: map.get("role").and_then(role_claim),
            role_name: map.get("role_name").and_then(role_claim),
            role_id: map.get("role_id").and_then(role_claim),
            issued_at: map.get("iat").and_then(time_claim),
            expires_at: map.get("exp").and_then(time_claim),
        }
    }

    /// First role-bearing claim present, in `role`, `role_name`, `role_id` order.
    pub fn raw_role(&self) -> Option<&RawRole> {
        self.role
            .as_ref()
            .or(self.role_name.as_ref())
            .or(self.role_id.as_ref())
    }

    /// Whether the token advertises an expiry at or before `now`.
    ///
    /// Tokens without an `exp` claim are never considered expired here.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn id_claim<T>(value: &Value) -> Option<T>
where
    T: core::str::FromStr,
{
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    }
}

fn role_claim(value: &Value) -> Option<RawRole> {
    match value {
        Value::String(s) => Some(RawRole::Text(s.clone())),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .map(RawRole::Numeric),
        _ => None,
    }
}

fn time_claim(value: &Value) -> Option<DateTime<Utc>> {
    let secs = value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))?;
    DateTime::from_timestamp(secs, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;
    use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
    use proptest::prelude::*;
    use serde_json::json;

    fn token_with(payload: &Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.signature")
    }

    #[test]
    fn decodes_payload_segment() {
        let token = token_with(&json!({"user_id": 9, "assigned_tenant_id": "42"}));
        let claims = TokenCodec::decode(&token);
        assert_eq!(claims.get("user_id"), Some(&json!(9)));
        assert_eq!(claims.get("assigned_tenant_id"), Some(&json!("42")));
    }

    #[test]
    fn padded_payload_is_accepted() {
        let body = URL_SAFE.encode(json!({"role": "devotee"}).to_string());
        let token = format!("h.{body}.s");
        let claims = Claims::from_token(&token);
        assert_eq!(Role::resolve(claims.raw_role()), Role::Devotee);
    }

    #[test]
    fn malformed_tokens_yield_empty_claims() {
        assert!(TokenCodec::decode("not-a-jwt").is_empty());
        assert!(TokenCodec::decode("").is_empty());
        assert!(TokenCodec::decode("a.!!!.c").is_empty());
        assert!(TokenCodec::decode("a.b.c.d").is_empty());

        let not_json = URL_SAFE_NO_PAD.encode("hello");
        assert!(TokenCodec::decode(&format!("a.{not_json}.c")).is_empty());

        let array = URL_SAFE_NO_PAD.encode("[1,2]");
        assert_eq!(
            TokenCodec::try_decode(&format!("a.{array}.c")),
            Err(TokenDecodeError::NotAnObject)
        );
    }

    #[test]
    fn numeric_role_id_resolves_to_temple_admin() {
        let token = token_with(&json!({"role_id": 2}));
        let claims = Claims::from_token(&token);
        assert_eq!(Role::resolve(claims.raw_role()), Role::TempleAdmin);
        assert!(claims.assigned_tenant_id.is_none());
    }

    #[test]
    fn role_claim_takes_precedence_over_role_id() {
        let token = token_with(&json!({"role": "volunteer", "role_name": "devotee", "role_id": 1}));
        let claims = Claims::from_token(&token);
        assert_eq!(Role::resolve(claims.raw_role()), Role::Volunteer);
    }

    #[test]
    fn ill_typed_claims_degrade_to_none() {
        let token = token_with(&json!({
            "assigned_tenant_id": {"nested": true},
            "entity_id": "",
            "role": [1],
            "exp": "tomorrow",
        }));
        let claims = Claims::from_token(&token);
        assert!(claims.is_empty());
    }

    #[test]
    fn expiry_is_read_from_exp_claim() {
        let now = Utc::now();
        let past = token_with(&json!({"exp": now.timestamp() - 60}));
        let future = token_with(&json!({"exp": now.timestamp() + 600}));
        assert!(Claims::from_token(&past).is_expired(now));
        assert!(!Claims::from_token(&future).is_expired(now));
        assert!(!Claims::default().is_expired(now));
    }

    proptest! {
        /// Property: decoding never panics, whatever the input.
        #[test]
        fn decode_is_total(input in ".*") {
            let _ = TokenCodec::decode(&input);
            let _ = Claims::from_token(&input);
        }

        #[test]
        fn decode_is_total_for_three_segments(a in "[A-Za-z0-9_-]*", b in "[A-Za-z0-9_=-]*", c in ".*") {
            let _ = Claims::from_token(&format!("{a}.{b}.{c}"));
        }
    }
}
