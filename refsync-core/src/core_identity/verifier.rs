/*
    verifier.rs - Per-request signature verification

    No bearer tokens, no cookies: every request proves possession of the
    device key. The 60 second freshness window on the signing date is the
    sole anti-replay mechanism; there is no nonce store.
*/

use super::canonical::{canonical_string, CanonicalRequest, SigningTriple};
use super::directory::UserDirectory;
use super::keypair::Keypair;
use crate::core_model::PeerId;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Authentication failures, each with a stable machine-readable code.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("request is missing signature, public key or signing date")]
    MissingSignature,

    #[error("signing date is not a valid RFC3339 timestamp")]
    MalformedDate,

    #[error("signing date outside the freshness window")]
    StaleSignature,

    #[error("signature does not match the canonical request")]
    InvalidSignature,

    #[error("public key is not registered")]
    UnknownKey,

    #[error("integration token is malformed or out of scope")]
    InvalidToken,

    #[error("integration token has expired")]
    ExpiredToken,
}

impl AuthError {
    /// Stable reason code surfaced to clients.
    pub fn reason_code(&self) -> &'static str {
        match self {
            AuthError::MissingSignature => "missing_signature",
            AuthError::MalformedDate => "malformed_signature_date",
            AuthError::StaleSignature => "stale_signature",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::UnknownKey => "unknown_key",
            AuthError::InvalidToken => "invalid_token",
            AuthError::ExpiredToken => "expired_token",
        }
    }
}

/// A verified, registered caller.
#[derive(Debug, Clone)]
pub struct Identity {
    pub peer: PeerId,
    pub display_name: String,
}

/// Verifies signing triples against the canonical request string and
/// resolves the verified key through the user directory.
#[derive(Clone)]
pub struct RequestVerifier {
    directory: Arc<UserDirectory>,
    freshness: chrono::Duration,
}

impl RequestVerifier {
    pub fn new(directory: Arc<UserDirectory>, freshness: std::time::Duration) -> Self {
        RequestVerifier {
            directory,
            freshness: chrono::Duration::from_std(freshness)
                .unwrap_or_else(|_| chrono::Duration::seconds(60)),
        }
    }

    /// Verify the triple against the request without requiring the key to
    /// be registered. This is the registration path: the caller proves key
    /// possession before a profile exists.
    pub fn verify_key(
        &self,
        triple: &SigningTriple,
        request: &CanonicalRequest<'_>,
    ) -> Result<PeerId, AuthError> {
        if triple.public_key.is_empty() || triple.signature.is_empty() || triple.date.is_empty() {
            return Err(AuthError::MissingSignature);
        }

        let claimed: DateTime<Utc> = DateTime::parse_from_rfc3339(&triple.date)
            .map_err(|_| AuthError::MalformedDate)?
            .with_timezone(&Utc);
        let skew = Utc::now().signed_duration_since(claimed);
        if skew.abs() > self.freshness {
            debug!(claimed = %triple.date, "rejected stale signature");
            return Err(AuthError::StaleSignature);
        }

        let canonical = canonical_string(&triple.date, request);
        let peer = PeerId::new(triple.public_key.clone());
        if !Keypair::verify(&peer, canonical.as_bytes(), &triple.signature) {
            return Err(AuthError::InvalidSignature);
        }
        Ok(peer)
    }

    /// Full verification: key possession plus directory membership. The
    /// verified key becomes the caller's identity.
    pub async fn verify(
        &self,
        triple: &SigningTriple,
        request: &CanonicalRequest<'_>,
    ) -> Result<Identity, AuthError> {
        let peer = self.verify_key(triple, request)?;
        match self.directory.lookup(&peer).await {
            Some(profile) => Ok(Identity {
                peer,
                display_name: profile.display_name,
            }),
            None => Err(AuthError::UnknownKey),
        }
    }
}
