//! Identity and request authentication
//!
//! Device keys replace login sessions: every request carries a signing
//! triple proving possession of an ECDSA P-384 key, and the verified key
//! is the caller's durable identity. The user directory only decorates
//! keys with display names.

mod canonical;
mod directory;
mod integration;
mod keypair;
mod verifier;

pub use canonical::{
    canonical_string, sign_request, CanonicalRequest, SigningTriple, PUBLIC_KEY_PARAM,
    SIGNATURE_DATE_PARAM, SIGNATURE_PARAM, SIGNATURE_PARAMS,
};
pub use directory::{DirectoryError, UserDirectory, UserProfile};
pub use integration::{IntegrationClaims, IntegrationIssuer};
pub use keypair::{KeyError, Keypair, KEY_ALGORITHM_TAG};
pub use verifier::{AuthError, Identity, RequestVerifier};
