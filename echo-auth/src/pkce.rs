//! PKCE code verifier and challenge

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Random bytes behind the code verifier
const VERIFIER_BYTES: usize = 32;

/// Code verifier with its S256 challenge
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    /// Base64url of random bytes, sent at registration
    pub verifier: String,
    /// Base64url of SHA-256 over the verifier, sent with the authorization URL
    pub challenge: String,
}

impl PkceChallenge {
    pub fn generate() -> Self {
        let mut bytes = [0u8; VERIFIER_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_verifier(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn from_verifier(verifier: String) -> Self {
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }
}

/// Client identifier: hex of `<serial>#<device type>`
pub fn client_id(serial: &str, device_type: &str) -> String {
    hex::encode(format!("{}#{}", serial, device_type))
}
