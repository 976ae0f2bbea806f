/*
    integration.rs - Trusted integration tokens

    A narrower credential for automation: a short-lived token signed by the
    server's own key, scoped to one (event, session). It is not a device
    identity, never appears in the user directory, and cannot outlive its
    expiry. Same verify-then-authorize shape as device signatures, distinct
    issuance path.
*/

use super::keypair::Keypair;
use super::verifier::AuthError;
use crate::core_model::{EventCode, SessionSecret};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What an integration token grants: one session, until expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationClaims {
    pub event: EventCode,
    pub session: SessionSecret,
    pub expires: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SignedToken {
    claims: IntegrationClaims,
    signature: String,
}

/// Issues and verifies integration tokens with a server-held keypair.
pub struct IntegrationIssuer {
    keypair: Keypair,
}

impl IntegrationIssuer {
    pub fn new(keypair: Keypair) -> Self {
        IntegrationIssuer { keypair }
    }

    /// Fresh issuer key; tokens do not survive a server restart, which is
    /// acceptable for short-lived automation credentials.
    pub fn generate() -> Self {
        IntegrationIssuer {
            keypair: Keypair::generate(),
        }
    }

    /// Issue a token for one session, valid for `ttl`.
    pub fn issue(
        &self,
        event: EventCode,
        session: SessionSecret,
        ttl: std::time::Duration,
    ) -> Result<String, AuthError> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|_| AuthError::InvalidToken)?;
        let claims = IntegrationClaims {
            event,
            session,
            expires: Utc::now() + ttl,
        };
        let payload = serde_json::to_vec(&claims).map_err(|_| AuthError::InvalidToken)?;
        let token = SignedToken {
            signature: self.keypair.sign(&payload),
            claims,
        };
        let encoded = serde_json::to_vec(&token).map_err(|_| AuthError::InvalidToken)?;
        Ok(URL_SAFE_NO_PAD.encode(encoded))
    }

    /// Verify a token and check it is scoped to `event`.
    pub fn verify(&self, token: &str, event: &EventCode) -> Result<IntegrationClaims, AuthError> {
        let decoded = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| AuthError::InvalidToken)?;
        let token: SignedToken =
            serde_json::from_slice(&decoded).map_err(|_| AuthError::InvalidToken)?;

        let payload = serde_json::to_vec(&token.claims).map_err(|_| AuthError::InvalidToken)?;
        if !Keypair::verify(&self.keypair.peer_id(), &payload, &token.signature) {
            return Err(AuthError::InvalidToken);
        }
        if token.claims.expires < Utc::now() {
            return Err(AuthError::ExpiredToken);
        }
        if &token.claims.event != event {
            return Err(AuthError::InvalidToken);
        }
        Ok(token.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn event() -> EventCode {
        EventCode::new("RE-VRC-24-1234".to_string())
    }

    #[test]
    fn test_issue_and_verify() {
        let issuer = IntegrationIssuer::generate();
        let secret = SessionSecret::generate();

        let token = issuer
            .issue(event(), secret.clone(), Duration::from_secs(300))
            .unwrap();
        let claims = issuer.verify(&token, &event()).unwrap();

        assert_eq!(claims.session, secret);
    }

    #[test]
    fn test_expired_token_rejected() {
        let issuer = IntegrationIssuer::generate();
        let token = issuer
            .issue(event(), SessionSecret::generate(), Duration::ZERO)
            .unwrap();

        let err = issuer.verify(&token, &event()).unwrap_err();
        assert!(matches!(err, AuthError::ExpiredToken));
    }

    #[test]
    fn test_wrong_event_scope_rejected() {
        let issuer = IntegrationIssuer::generate();
        let token = issuer
            .issue(event(), SessionSecret::generate(), Duration::from_secs(300))
            .unwrap();

        let other = EventCode::new("RE-VRC-24-9999".to_string());
        assert!(matches!(
            issuer.verify(&token, &other),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn test_foreign_issuer_rejected() {
        let issuer = IntegrationIssuer::generate();
        let other_issuer = IntegrationIssuer::generate();
        let token = issuer
            .issue(event(), SessionSecret::generate(), Duration::from_secs(300))
            .unwrap();

        assert!(other_issuer.verify(&token, &event()).is_err());
    }
}
