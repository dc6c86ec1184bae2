use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_BASE_URL: &str = "base-url";
pub const ARG_SECRET: &str = "secret";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_SESSION_CACHE_SECONDS: &str = "session-cache-seconds";
pub const ARG_TOKEN_TTL_SECONDS: &str = "token-ttl-seconds";
pub const ARG_REQUIRE_EMAIL_VERIFICATION: &str = "require-email-verification";

/// Shortest accepted signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug)]
pub struct Options {
    pub base_url: String,
    pub secret: SecretString,
    pub session_ttl_seconds: i64,
    pub session_cache_seconds: i64,
    pub token_ttl_seconds: i64,
    pub require_email_verification: bool,
}

impl Options {
    /// Parse auth arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the base URL or secret is missing or malformed, or a
    /// TTL is not positive.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let read_required = |id: &str| -> anyhow::Result<String> {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("missing required argument: --{id}"))
        };

        let base_url = read_required(ARG_BASE_URL)?;
        let parsed = url::Url::parse(&base_url)
            .map_err(|err| anyhow::anyhow!("invalid --{ARG_BASE_URL}: {err}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            anyhow::bail!("invalid --{ARG_BASE_URL}: scheme must be http or https");
        }

        let secret = read_required(ARG_SECRET)?;
        if secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("--{ARG_SECRET} must be at least {MIN_SECRET_LEN} bytes");
        }

        let read_positive = |id: &str| -> anyhow::Result<i64> {
            match matches.get_one::<i64>(id).copied() {
                Some(value) if value > 0 => Ok(value),
                Some(_) => anyhow::bail!("--{id} must be greater than zero"),
                None => anyhow::bail!("missing required argument: --{id}"),
            }
        };

        Ok(Self {
            base_url,
            secret: SecretString::from(secret),
            session_ttl_seconds: read_positive(ARG_SESSION_TTL_SECONDS)?,
            session_cache_seconds: read_positive(ARG_SESSION_CACHE_SECONDS)?,
            token_ttl_seconds: read_positive(ARG_TOKEN_TTL_SECONDS)?,
            require_email_verification: matches
                .get_one::<bool>(ARG_REQUIRE_EMAIL_VERIFICATION)
                .copied()
                .unwrap_or(true),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_session_args(command);
    with_email_args(command)
}

fn with_session_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_BASE_URL)
                .long(ARG_BASE_URL)
                .help("Public base URL, used for email links and the Secure cookie flag")
                .env("TOLLGATE_BASE_URL")
                .default_value("http://localhost:8080"),
        )
        .arg(
            Arg::new(ARG_SECRET)
                .long(ARG_SECRET)
                .help("Secret used to sign session cookies (at least 32 bytes)")
                .env("TOLLGATE_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session lifetime in seconds")
                .env("TOLLGATE_SESSION_TTL_SECONDS")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_SESSION_CACHE_SECONDS)
                .long(ARG_SESSION_CACHE_SECONDS)
                .help("How long a resolved session is served from memory")
                .env("TOLLGATE_SESSION_CACHE_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(i64)),
        )
}

fn with_email_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TOKEN_TTL_SECONDS)
                .long(ARG_TOKEN_TTL_SECONDS)
                .help("Email verification and password reset token TTL in seconds")
                .env("TOLLGATE_TOKEN_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_REQUIRE_EMAIL_VERIFICATION)
                .long(ARG_REQUIRE_EMAIL_VERIFICATION)
                .help("Refuse sign-in until the email address is verified")
                .env("TOLLGATE_REQUIRE_EMAIL_VERIFICATION")
                .default_value("true")
                .value_parser(clap::value_parser!(bool)),
        )
}
