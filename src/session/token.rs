//! Session and email token helpers.
//!
//! Raw tokens are 32 random bytes, base64url without padding (43 chars). The
//! cookie carries `<token>.<signature>` where the signature is
//! HMAC-SHA256(secret, token); stores only ever see `SHA-256(token)`.

use anyhow::{Context, Result};
use base64ct::{Base64UrlUnpadded, Encoding};
use hmac::{Hmac, Mac};
use rand::{RngCore, rngs::OsRng};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

const TOKEN_BYTES: usize = 32;
/// Encoded length of a raw token.
pub const TOKEN_LEN: usize = 43;

/// Generate a fresh random token for sessions or email links.
///
/// # Errors
/// Returns an error if the OS random source fails.
pub fn generate_token() -> Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate token")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Hash a token so raw values never touch the database.
#[must_use]
pub fn hash_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

fn mac_for(secret: &SecretString, token: &str) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.expose_secret().as_bytes()).ok()?;
    mac.update(token.as_bytes());
    Some(mac)
}

/// Produce the signed cookie value `<token>.<signature>`.
#[must_use]
pub fn sign_token(secret: &SecretString, token: &str) -> String {
    let signature = mac_for(secret, token)
        .map(|mac| Base64UrlUnpadded::encode_string(&mac.finalize().into_bytes()))
        .unwrap_or_default();
    format!("{token}.{signature}")
}

fn well_formed(token: &str) -> bool {
    token.len() == TOKEN_LEN
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// Verify a signed value and return the raw token when the format and
/// signature check out.
#[must_use]
pub fn verify_signed(secret: &SecretString, value: &str) -> Option<String> {
    let (token, signature) = value.rsplit_once('.')?;
    if !well_formed(token) {
        return None;
    }
    let signature = Base64UrlUnpadded::decode_vec(signature).ok()?;
    // verify_slice compares in constant time.
    mac_for(secret, token)?.verify_slice(&signature).ok()?;
    Some(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> SecretString {
        SecretString::from("0123456789abcdef0123456789abcdef")
    }

    #[test]
    fn generated_tokens_are_well_formed_and_unique() -> Result<()> {
        let first = generate_token()?;
        let second = generate_token()?;
        assert_eq!(first.len(), TOKEN_LEN);
        assert!(well_formed(&first));
        assert_ne!(first, second);
        Ok(())
    }

    #[test]
    fn hash_token_is_stable() {
        assert_eq!(hash_token("token"), hash_token("token"));
        assert_ne!(hash_token("token"), hash_token("other"));
        assert_eq!(hash_token("token").len(), 32);
    }

    #[test]
    fn signed_token_verifies() -> Result<()> {
        let token = generate_token()?;
        let signed = sign_token(&secret(), &token);
        assert_eq!(verify_signed(&secret(), &signed), Some(token));
        Ok(())
    }

    #[test]
    fn tampered_or_foreign_signatures_fail() -> Result<()> {
        let token = generate_token()?;
        let signed = sign_token(&secret(), &token);
        let other_secret = SecretString::from("another-secret-another-secret-xx");
        assert_eq!(verify_signed(&other_secret, &signed), None);

        let other_token = generate_token()?;
        let (_, signature) = signed.rsplit_once('.').unwrap_or_default();
        let swapped = format!("{other_token}.{signature}");
        assert_eq!(verify_signed(&secret(), &swapped), None);
        Ok(())
    }

    #[test]
    fn malformed_values_fail() {
        assert_eq!(verify_signed(&secret(), ""), None);
        assert_eq!(verify_signed(&secret(), "no-dot"), None);
        assert_eq!(verify_signed(&secret(), "short.sig"), None);
        assert_eq!(verify_signed(&secret(), &format!("{}.!!", "a".repeat(TOKEN_LEN))), None);
    }
}
