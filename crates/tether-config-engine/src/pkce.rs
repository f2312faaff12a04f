//! PKCE helpers (RFC 7636).
//!
//! The OAuth step of a configuration workflow binds its authorization URL to
//! the eventual token exchange with a verifier/challenge pair. The verifier
//! is stored on the session when the URL is issued and handed back to the
//! collaborator when the out-of-band callback arrives.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use ring::digest;
use ring::rand::{SecureRandom, SystemRandom};

use crate::error::{ConfigEngineError, Result};

/// Length of the PKCE code verifier in bytes (before base64 encoding).
const VERIFIER_BYTES: usize = 32;

/// Generate a PKCE code verifier (random 32 bytes, base64url encoded).
///
/// # Errors
///
/// Returns an error if the system CSPRNG fails.
pub fn generate_verifier() -> Result<String> {
    let rng = SystemRandom::new();
    let mut bytes = [0u8; VERIFIER_BYTES];
    rng.fill(&mut bytes).map_err(|_| ConfigEngineError::Crypto {
        reason: "failed to generate PKCE verifier: CSPRNG error".to_string(),
    })?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Derive the PKCE code challenge from a code verifier using SHA-256.
///
/// `challenge = BASE64URL(SHA256(verifier))`, trailing padding stripped.
/// Deterministic, no side effects, no failure modes.
pub fn challenge(verifier: &str) -> String {
    let hash = digest::digest(&digest::SHA256, verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash.as_ref())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifier_is_correct_length() {
        let verifier = generate_verifier().unwrap();
        // 32 bytes base64url encoded = 43 characters (no padding).
        assert_eq!(verifier.len(), 43);
    }

    #[test]
    fn verifier_is_url_safe() {
        let verifier = generate_verifier().unwrap();
        // base64url characters: A-Z, a-z, 0-9, -, _
        for c in verifier.chars() {
            assert!(
                c.is_ascii_alphanumeric() || c == '-' || c == '_',
                "unexpected character in verifier: {c}"
            );
        }
    }

    #[test]
    fn challenge_is_deterministic() {
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(challenge(verifier), challenge(verifier));
    }

    #[test]
    fn challenge_matches_rfc_7636_vector() {
        // RFC 7636 Appendix B test vector.
        let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
        assert_eq!(
            challenge(verifier),
            "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
        );
    }

    #[test]
    fn different_verifiers_give_different_challenges() {
        let v1 = generate_verifier().unwrap();
        let v2 = generate_verifier().unwrap();
        assert_ne!(v1, v2);
        assert_ne!(challenge(&v1), challenge(&v2));
    }

    #[test]
    fn challenge_has_no_padding() {
        let c = challenge("some-verifier");
        assert!(!c.contains('='));
    }
}
