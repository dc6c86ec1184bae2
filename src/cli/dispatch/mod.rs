//! Command-line argument dispatch.
//!
//! Maps validated CLI matches to the action that runs, currently only the
//! API server with its full auth configuration.

use crate::cli::actions::{
    Action,
    server::{Args, StoreTarget},
};
use crate::cli::commands::{ARG_DSN, ARG_PORT, auth};
use anyhow::{Context, Result};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080);
    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .context("missing required argument: --dsn")?;
    let store = StoreTarget::parse(&dsn)?;

    let auth_opts = auth::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        store,
        base_url: auth_opts.base_url,
        secret: auth_opts.secret,
        session_ttl_seconds: auth_opts.session_ttl_seconds,
        session_cache_seconds: auth_opts.session_cache_seconds,
        token_ttl_seconds: auth_opts.token_ttl_seconds,
        require_email_verification: auth_opts.require_email_verification,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn memory_dsn_builds_server_action() {
        temp_env::with_vars(
            [
                ("TOLLGATE_DSN", Some("memory://")),
                ("TOLLGATE_SECRET", Some(SECRET)),
                ("TOLLGATE_PORT", None),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["tollgate"]);
                let result = handler(&matches);
                assert!(matches!(
                    result,
                    Ok(Action::Server(Args {
                        port: 8080,
                        store: StoreTarget::Memory,
                        ..
                    }))
                ));
            },
        );
    }

    #[test]
    fn unknown_dsn_scheme_rejected() {
        temp_env::with_vars(
            [
                ("TOLLGATE_DSN", Some("mysql://localhost/tollgate")),
                ("TOLLGATE_SECRET", Some(SECRET)),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["tollgate"]);
                let result = handler(&matches);
                assert!(result.is_err_and(|err| err.to_string().contains("unsupported DSN")));
            },
        );
    }

    #[test]
    fn missing_secret_rejected() {
        temp_env::with_vars(
            [
                ("TOLLGATE_DSN", Some("memory://")),
                ("TOLLGATE_SECRET", Some("   ")),
            ],
            || {
                let matches = crate::cli::commands::new().get_matches_from(vec!["tollgate"]);
                let result = handler(&matches);
                assert!(
                    result.is_err_and(|err| err
                        .to_string()
                        .contains("missing required argument: --secret"))
                );
            },
        );
    }
}
