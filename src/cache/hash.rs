//! Fingerprints used as cache key segments.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::pipeline::MetadataRequest;
use crate::sampling::SamplingBudget;

/// Hex digits of the SHA-256 digest kept in a key segment.
pub const FINGERPRINT_LEN: usize = 16;

/// Everything besides the table itself that changes a generated document.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RequestFingerprint<'a> {
    pub request: &'a MetadataRequest,
    /// The effective budget, after request overrides.
    pub budget: &'a SamplingBudget,
    pub model: &'a str,
}

impl RequestFingerprint<'_> {
    pub fn digest(&self) -> Result<String, serde_json::Error> {
        fingerprint(self)
    }
}

/// Truncated SHA-256 of the value's JSON form.
pub fn fingerprint<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_vec(value)?;
    let digest = Sha256::digest(&json);
    let mut hex = format!("{:x}", digest);
    hex.truncate(FINGERPRINT_LEN);
    Ok(hex)
}
