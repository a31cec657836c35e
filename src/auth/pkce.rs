// PKCE challenge and signed OAuth state

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

pub struct PkceChallenge {
    pub code_verifier: String,
    pub code_challenge: String,
}

pub fn generate_pkce() -> PkceChallenge {
    let mut buf = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut buf);
    let code_verifier = URL_SAFE_NO_PAD.encode(buf);

    let mut hasher = Sha256::new();
    hasher.update(code_verifier.as_bytes());
    let code_challenge = URL_SAFE_NO_PAD.encode(hasher.finalize());

    PkceChallenge {
        code_verifier,
        code_challenge,
    }
}

/// Sign a state nonce with the session secret: `<nonce>.<signature>`
pub fn sign_state(secret: &str, nonce: &str) -> String {
    format!("{}.{}", nonce, state_signature(secret, nonce))
}

/// Return the nonce of a signed state value if its signature checks out
pub fn verify_state<'a>(secret: &str, signed: &'a str) -> Option<&'a str> {
    let (nonce, signature) = signed.rsplit_once('.')?;
    if nonce.is_empty() {
        return None;
    }
    let expected = state_signature(secret, nonce);
    if constant_time_eq(expected.as_bytes(), signature.as_bytes()) {
        Some(nonce)
    } else {
        None
    }
}

fn state_signature(secret: &str, nonce: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(b":");
    hasher.update(nonce.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
