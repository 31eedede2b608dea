//! Signed, short-lived challenge tokens.
//!
//! The storefront popup asks for a token when it renders and sends it back
//! with the issuance request. A token has the shape `v1.<payload>.<sig>`:
//! `payload` is URL-safe base64 of `{"sid", "exp", "nonce"}` and `sig` the
//! HMAC-SHA256 of `v1.<payload>` under `challenge.secret`.
//!
//! A token verifies once. Its nonce is remembered until the token expires.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use popgate_core::{
    discounts::ChallengeValidator, settings::challenge::ChallengeSettings,
    utils::secret::MaskedSecret,
};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

type HmacSha256 = Hmac<Sha256>;

const TOKEN_VERSION: &str = "v1";
const MAX_TOKEN_LEN: usize = 1024;
const MAX_PAYLOAD_PART_LEN: usize = 768;
const MAX_SIG_PART_LEN: usize = 64;
pub const MAX_SESSION_ID_LEN: usize = 256;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("Challenge token is malformed: {0}")]
    Malformed(String),

    #[error("Unsupported challenge token version {0}")]
    UnsupportedVersion(String),

    #[error("Challenge token signature mismatch")]
    InvalidSignature,

    #[error("Challenge token expired at {0}")]
    Expired(DateTime<Utc>),

    #[error("Challenge token was issued for another session")]
    SessionMismatch,

    #[error("Challenge token was already used")]
    Replayed,

    #[error("Session id must be 1 to {MAX_SESSION_ID_LEN} characters long")]
    InvalidSessionId,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChallengePayload {
    sid: String,
    exp: i64,
    nonce: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedChallenge {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ChallengeTokenService {
    secret: MaskedSecret,
    ttl: Duration,
    /// Nonces of verified tokens, with the expiry of their token
    spent: Mutex<HashMap<String, i64>>,
}

impl ChallengeTokenService {
    pub fn new(settings: &ChallengeSettings) -> Self {
        let ttl_seconds = i64::try_from(settings.ttl_seconds).unwrap_or(i64::MAX / 1_000);
        Self {
            secret: settings.secret.clone(),
            ttl: Duration::seconds(ttl_seconds),
            spent: Mutex::new(HashMap::new()),
        }
    }

    pub fn issue(&self, session_id: &str) -> Result<IssuedChallenge, ChallengeError> {
        self.issue_at(session_id, Utc::now())
    }

    fn issue_at(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedChallenge, ChallengeError> {
        let session_id = session_id.trim();
        if session_id.is_empty() || session_id.chars().count() > MAX_SESSION_ID_LEN {
            return Err(ChallengeError::InvalidSessionId);
        }

        let expires_at = now + self.ttl;
        let payload = ChallengePayload {
            sid: session_id.to_string(),
            exp: expires_at.timestamp(),
            nonce: uuid::Uuid::new_v4().simple().to_string(),
        };
        let payload_bytes =
            serde_json::to_vec(&payload).map_err(|e| ChallengeError::Malformed(e.to_string()))?;
        let signed_part = format!("{TOKEN_VERSION}.{}", URL_SAFE_NO_PAD.encode(payload_bytes));
        let sig = URL_SAFE_NO_PAD.encode(self.mac(&signed_part)?.finalize().into_bytes());

        Ok(IssuedChallenge {
            token: format!("{signed_part}.{sig}"),
            expires_at,
        })
    }

    pub fn verify(&self, token: &str, session_id: &str) -> Result<(), ChallengeError> {
        self.verify_at(token, session_id, Utc::now())
    }

    fn verify_at(
        &self,
        token: &str,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ChallengeError> {
        if token.len() > MAX_TOKEN_LEN {
            return Err(ChallengeError::Malformed("token exceeds max length".into()));
        }
        let (version, payload_part, sig_part) = split_token(token)?;
        if version != TOKEN_VERSION {
            return Err(ChallengeError::UnsupportedVersion(version.to_string()));
        }
        if payload_part.len() > MAX_PAYLOAD_PART_LEN || sig_part.len() > MAX_SIG_PART_LEN {
            return Err(ChallengeError::Malformed("token part exceeds max length".into()));
        }

        let expected = URL_SAFE_NO_PAD
            .decode(sig_part)
            .map_err(|e| ChallengeError::Malformed(e.to_string()))?;
        let mac = self.mac(&format!("{version}.{payload_part}"))?;
        mac.verify_slice(&expected)
            .map_err(|_| ChallengeError::InvalidSignature)?;

        let payload_bytes = URL_SAFE_NO_PAD
            .decode(payload_part)
            .map_err(|e| ChallengeError::Malformed(e.to_string()))?;
        let payload: ChallengePayload = serde_json::from_slice(&payload_bytes)
            .map_err(|e| ChallengeError::Malformed(e.to_string()))?;

        if now.timestamp() >= payload.exp {
            let expired_at = DateTime::from_timestamp(payload.exp, 0).unwrap_or(now);
            return Err(ChallengeError::Expired(expired_at));
        }
        if payload.sid != session_id.trim() {
            return Err(ChallengeError::SessionMismatch);
        }
        self.spend(payload.nonce, payload.exp, now)
    }

    /// Mark a nonce as used, failing if it already was.
    fn spend(&self, nonce: String, exp: i64, now: DateTime<Utc>) -> Result<(), ChallengeError> {
        let mut spent = self.spent.lock().unwrap_or_else(PoisonError::into_inner);
        spent.retain(|_, expires| *expires > now.timestamp());
        if spent.contains_key(&nonce) {
            return Err(ChallengeError::Replayed);
        }
        spent.insert(nonce, exp);
        Ok(())
    }

    fn mac(&self, signed_part: &str) -> Result<HmacSha256, ChallengeError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| ChallengeError::Malformed(e.to_string()))?;
        mac.update(signed_part.as_bytes());
        Ok(mac)
    }
}

fn split_token(token: &str) -> Result<(&str, &str, &str), ChallengeError> {
    let mut parts = token.split('.');
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(version), Some(payload), Some(sig), None)
            if !version.is_empty() && !payload.is_empty() && !sig.is_empty() =>
        {
            Ok((version, payload, sig))
        }
        _ => Err(ChallengeError::Malformed(
            "expected <version>.<payload>.<signature>".into(),
        )),
    }
}

#[async_trait]
impl ChallengeValidator for ChallengeTokenService {
    async fn validate(&self, token: &str, session_id: &str) -> bool {
        match self.verify(token, session_id) {
            Ok(()) => true,
            Err(e) => {
                debug!("Rejected challenge token: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn service() -> ChallengeTokenService {
        ChallengeTokenService::new(&ChallengeSettings::new(
            "test-challenge-secret-0123456789abcdef",
            300,
        ))
    }

    #[test]
    fn test_issued_token_verifies_for_its_session() {
        let service = service();
        let issued = service.issue("session-1").unwrap();

        assert!(issued.token.starts_with("v1."));
        assert_eq!(issued.token.split('.').count(), 3);
        assert_ok!(service.verify(&issued.token, "session-1"));
    }

    #[test]
    fn test_tokens_are_unique() {
        let service = service();
        let a = service.issue("session-1").unwrap();
        let b = service.issue("session-1").unwrap();
        assert_ne!(a.token, b.token);
    }

    #[test]
    fn test_session_mismatch() {
        let service = service();
        let issued = service.issue("session-1").unwrap();
        assert_eq!(
            service.verify(&issued.token, "session-2"),
            Err(ChallengeError::SessionMismatch)
        );
    }

    #[test]
    fn test_expired_token() {
        let service = service();
        let issued_at = Utc::now() - Duration::seconds(600);
        let issued = service.issue_at("session-1", issued_at).unwrap();

        let err = service.verify(&issued.token, "session-1").unwrap_err();
        assert!(matches!(err, ChallengeError::Expired(_)));

        // Still valid just before expiry
        assert_ok!(service.verify_at(
            &issued.token,
            "session-1",
            issued_at + Duration::seconds(299)
        ));
    }

    #[test]
    fn test_token_verifies_only_once() {
        let service = service();
        let issued = service.issue("session-1").unwrap();

        // Failed checks leave the token usable
        assert_err!(service.verify(&issued.token, "session-2"));
        assert_ok!(service.verify(&issued.token, "session-1"));
        assert_eq!(
            service.verify(&issued.token, "session-1"),
            Err(ChallengeError::Replayed)
        );

        let fresh = service.issue("session-1").unwrap();
        assert_ok!(service.verify(&fresh.token, "session-1"));
    }

    #[test]
    fn test_spent_nonces_are_forgotten_after_expiry() {
        let service = service();
        let now = Utc::now();
        let issued = service.issue_at("session-1", now).unwrap();
        assert_ok!(service.verify_at(&issued.token, "session-1", now));
        assert_eq!(service.spent.lock().unwrap().len(), 1);

        let later = service.issue_at("session-1", now + Duration::seconds(400)).unwrap();
        assert_ok!(service.verify_at(&later.token, "session-1", now + Duration::seconds(400)));
        assert_eq!(service.spent.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let service = service();
        let issued = service.issue("session-1").unwrap();
        let (_, _, sig) = split_token(&issued.token).unwrap();

        let forged_payload = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&ChallengePayload {
                sid: "session-1".into(),
                exp: Utc::now().timestamp() + 86_400,
                nonce: "n".into(),
            })
            .unwrap(),
        );
        let forged = format!("v1.{forged_payload}.{sig}");
        assert_eq!(
            service.verify(&forged, "session-1"),
            Err(ChallengeError::InvalidSignature)
        );
    }

    #[test]
    fn test_token_from_other_secret_is_rejected() {
        let other = ChallengeTokenService::new(&ChallengeSettings::new(
            "another-secret-that-is-long-enough-000",
            300,
        ));
        let issued = other.issue("session-1").unwrap();
        assert_eq!(
            service().verify(&issued.token, "session-1"),
            Err(ChallengeError::InvalidSignature)
        );
    }

    #[test]
    fn test_malformed_tokens() {
        let service = service();
        for token in ["", "v1", "v1.abc", "v1..sig", "v1.a.b.c", "not a token"] {
            assert!(
                matches!(
                    service.verify(token, "session-1"),
                    Err(ChallengeError::Malformed(_))
                ),
                "token {token:?} should be malformed"
            );
        }
        assert_err!(service.verify(&"a".repeat(MAX_TOKEN_LEN + 1), "session-1"));
        assert!(matches!(
            service.verify("v2.abc.def", "session-1"),
            Err(ChallengeError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_invalid_session_ids_get_no_token() {
        let service = service();
        assert_eq!(
            service.issue("  "),
            Err(ChallengeError::InvalidSessionId)
        );
        assert_eq!(
            service.issue(&"s".repeat(MAX_SESSION_ID_LEN + 1)),
            Err(ChallengeError::InvalidSessionId)
        );
    }

    #[tokio::test]
    async fn test_validator_contract() {
        let service = service();
        let issued = service.issue("session-1").unwrap();
        assert!(!service.validate(&issued.token, "session-2").await);
        assert!(service.validate(&issued.token, "session-1").await);
        assert!(!service.validate(&issued.token, "session-1").await);
        assert!(!service.validate("", "session-1").await);
    }
}
