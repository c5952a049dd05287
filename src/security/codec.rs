//! Token generation, keyed hashing and constant-time verification.
//!
//! Raw tokens are 32 random bytes rendered as 64 lowercase hex characters.
//! Only the HMAC-SHA256 digest of a token is ever stored, so the digest is a
//! fixed 32 bytes whatever the candidate looks like.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Random bytes per token.
pub const TOKEN_BYTES: usize = 32;

/// Length of the hex-encoded raw token.
pub const TOKEN_HEX_LEN: usize = TOKEN_BYTES * 2;

/// HMAC key shared by every token issued by this process.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Vec<u8>);

impl Secret {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// A fresh random secret. Tokens signed with it do not survive a restart.
    pub fn generate() -> Self {
        let mut bytes = vec![0u8; TOKEN_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret([redacted])")
    }
}

/// Keyed hash of a raw token.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TokenDigest([u8; 32]);

impl TokenDigest {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Rebuild a digest read back from a store; `None` on wrong length.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 32]>::try_from(bytes).ok().map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for TokenDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TokenDigest({}..)", hex::encode(&self.0[..4]))
    }
}

/// Generate a new raw token from the OS CSPRNG.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// HMAC-SHA256 of `token` under `secret`.
pub fn hash_token(token: &str, secret: &Secret) -> TokenDigest {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(token.as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    TokenDigest(out)
}

/// Check `candidate` against a stored digest without early exit.
pub fn verify_token(candidate: &str, stored: &TokenDigest, secret: &Secret) -> bool {
    let computed = hash_token(candidate, secret);
    computed.0.ct_eq(&stored.0).into()
}

/// Constant-time equality of two submitted values (double-submit path).
///
/// Slices of different length compare unequal without a byte comparison, so
/// only the length can leak, and raw tokens have a fixed length.
pub fn values_match(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
