//! # Tollgate (session-gated web application server)
//!
//! `tollgate` serves a small web application behind cookie sessions. Every
//! request passes through three layers:
//!
//! - **Edge gate:** a cheap, cookie-presence-only check that redirects
//!   anonymous visitors away from protected pages and signed-in visitors away
//!   from guest-only pages. It never touches the store and fails open.
//! - **Session resolver:** the authoritative check. The signed cookie is
//!   verified, the session and its user are loaded (through a short-lived
//!   cache) and at most one resolution happens per request.
//! - **RPC dispatch:** typed procedures behind `POST /api/rpc`, each tagged
//!   public, protected or admin. Authorization runs before the handler, so an
//!   unauthorized call has no side effects.
//!
//! User-supplied `callbackUrl` values are reduced to same-origin paths before
//! any redirect uses them.

pub mod api;
pub mod cli;
pub mod gate;
pub mod rpc;
pub mod session;
pub mod storage;
pub mod users;

#[cfg(test)]
mod testing;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }
}
