use clap::{Arg, Command};

pub const ARG_VERBOSITY: &str = "verbosity";

/// Level names accepted in `TOLLGATE_LOG_LEVEL`, indexed by verbosity count.
const LEVEL_NAMES: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Accept either a count (`0..=5`) or a level name.
///
/// # Errors
/// Returns a message listing the accepted names.
pub fn parse_log_level(level: &str) -> Result<u8, String> {
    if let Ok(count) = level.trim().parse::<u8>() {
        return if count <= 5 {
            Ok(count)
        } else {
            Err(format!("verbosity count {count} is above 5"))
        };
    }
    let wanted = level.trim().to_ascii_lowercase();
    LEVEL_NAMES
        .iter()
        .position(|name| *name == wanted)
        .and_then(|index| u8::try_from(index).ok())
        .ok_or_else(|| format!("invalid log level, expected one of: {}", LEVEL_NAMES.join(", ")))
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
            .env("TOLLGATE_LOG_LEVEL")
            .global(true)
            .action(clap::ArgAction::Count)
            .value_parser(parse_log_level),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_flag_counts() {
        temp_env::with_var_unset("TOLLGATE_LOG_LEVEL", || {
            let command = with_args(Command::new("tollgate"));
            let matches = command.get_matches_from(vec!["tollgate", "-vvv"]);
            assert_eq!(matches.get_one::<u8>(ARG_VERBOSITY).copied(), Some(3));
        });
    }

    #[test]
    fn names_and_counts() {
        assert_eq!(parse_log_level("error"), Ok(0));
        assert_eq!(parse_log_level("INFO"), Ok(2));
        assert_eq!(parse_log_level(" trace "), Ok(4));
        assert_eq!(parse_log_level("3"), Ok(3));
        assert!(parse_log_level("6").is_err());
        assert!(parse_log_level("loud").is_err());
    }
}
