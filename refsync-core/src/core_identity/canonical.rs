/*
    canonical.rs - Canonical request string and the signing triple

    Signer and verifier must assemble byte-identical canonical strings:
    the raw date string as sent, uppercase method, host, path, the query
    params sorted with the signature params filtered out, then the body,
    all newline-joined. Any deviation invalidates every request.
*/

use super::keypair::Keypair;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Query parameter carrying the hex signature.
pub const SIGNATURE_PARAM: &str = "signature";
/// Query parameter carrying the algorithm-tagged public key.
pub const PUBLIC_KEY_PARAM: &str = "publickey";
/// Query parameter carrying the RFC3339 signing date.
pub const SIGNATURE_DATE_PARAM: &str = "signature_date";

/// Params excluded from canonicalization (they carry the triple itself).
pub const SIGNATURE_PARAMS: [&str; 3] = [SIGNATURE_PARAM, PUBLIC_KEY_PARAM, SIGNATURE_DATE_PARAM];

/// The parts of a request covered by the signature.
#[derive(Debug, Clone)]
pub struct CanonicalRequest<'a> {
    pub method: &'a str,
    pub host: &'a str,
    pub path: &'a str,
    pub query: &'a [(String, String)],
    pub body: &'a str,
}

/// The three values a signed request carries alongside its payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SigningTriple {
    /// Algorithm-tagged public key string
    pub public_key: String,
    /// Hex-encoded signature over the canonical string
    pub signature: String,
    /// RFC3339 UTC date the signature was produced
    pub date: String,
}

/// Assemble the canonical string for a given date string and request.
pub fn canonical_string(date: &str, request: &CanonicalRequest<'_>) -> String {
    let mut params: Vec<&(String, String)> = request
        .query
        .iter()
        .filter(|(key, _)| !SIGNATURE_PARAMS.contains(&key.as_str()))
        .collect();
    params.sort();
    let params = params
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&");

    [
        date,
        request.method.to_uppercase().as_str(),
        request.host,
        request.path,
        params.as_str(),
        request.body,
    ]
    .join("\n")
}

/// Produce the signing triple for a request, dated now.
pub fn sign_request(keypair: &Keypair, request: &CanonicalRequest<'_>) -> SigningTriple {
    let date = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let canonical = canonical_string(&date, request);
    SigningTriple {
        public_key: keypair.peer_id().0,
        signature: keypair.sign(canonical.as_bytes()),
        date,
    }
}
