//! Small helpers for auth validation and password hashing.

use anyhow::{Context, Result, anyhow};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use regex::Regex;
use tokio::sync::OnceCell;

pub(super) const MIN_PASSWORD_LEN: usize = 8;
pub(super) const MAX_PASSWORD_LEN: usize = 128;
pub(super) const MAX_NAME_LEN: usize = 100;

/// Normalize an email for lookup/uniqueness checks.
pub(super) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Basic email format check on already-normalized input.
pub(super) fn valid_email(email_normalized: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email_normalized))
}

pub(super) fn valid_password(password: &str) -> bool {
    (MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&password.chars().count())
}

pub(super) fn valid_name(name: &str) -> bool {
    (1..=MAX_NAME_LEN).contains(&name.trim().chars().count())
}

/// Argon2id hash in PHC string format. Runs on the blocking pool.
pub(super) async fn hash_password(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| anyhow!("failed to hash password: {err}"))
    })
    .await
    .context("password hashing task failed")?
}

/// Check a password against a stored PHC hash. Malformed hashes never verify.
pub(super) async fn verify_password(password: String, stored_hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || {
        let Ok(parsed) = PasswordHash::new(&stored_hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok()
    })
    .await
    .context("password verification task failed")
}

/// Hash with the live parameters, verified against when the account does not
/// exist so both sign-in failures cost one argon2 run.
async fn dummy_hash() -> Result<&'static str> {
    static DUMMY_HASH: OnceCell<String> = OnceCell::const_new();
    DUMMY_HASH
        .get_or_try_init(|| hash_password("tollgate-dummy-password".to_string()))
        .await
        .map(String::as_str)
}

/// Spend one verification on an account that does not exist.
pub(super) async fn verify_unknown_account(password: String) -> Result<()> {
    let hash = dummy_hash().await?;
    verify_password(password, hash.to_string()).await?;
    Ok(())
}
