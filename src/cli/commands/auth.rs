use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::auth::{
    password::{DEFAULT_ITERATIONS, DEFAULT_MEMORY_KIB},
    token::{DEFAULT_ACCESS_TTL_SECONDS, DEFAULT_REFRESH_TTL_SECONDS},
};

pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_JWT_REFRESH_SECRET: &str = "jwt-refresh-secret";
pub const ARG_JWT_EXPIRES_IN: &str = "jwt-expires-in";
pub const ARG_JWT_REFRESH_EXPIRES_IN: &str = "jwt-refresh-expires-in";
pub const ARG_HASH_ITERATIONS: &str = "hash-iterations";
pub const ARG_HASH_MEMORY_KIB: &str = "hash-memory-kib";

#[derive(Debug, Clone)]
pub struct Options {
    pub jwt_secret: SecretString,
    pub jwt_refresh_secret: Option<SecretString>,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub hash_iterations: u32,
    pub hash_memory_kib: u32,
}

impl Options {
    /// Parse token and hashing arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the signing secret is missing or blank.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let Some(jwt_secret) = get_non_empty(ARG_JWT_SECRET) else {
            anyhow::bail!("missing required argument: --{ARG_JWT_SECRET}");
        };

        Ok(Self {
            jwt_secret: SecretString::from(jwt_secret),
            jwt_refresh_secret: get_non_empty(ARG_JWT_REFRESH_SECRET).map(SecretString::from),
            access_ttl_seconds: matches
                .get_one::<i64>(ARG_JWT_EXPIRES_IN)
                .copied()
                .unwrap_or(DEFAULT_ACCESS_TTL_SECONDS),
            refresh_ttl_seconds: matches
                .get_one::<i64>(ARG_JWT_REFRESH_EXPIRES_IN)
                .copied()
                .unwrap_or(DEFAULT_REFRESH_TTL_SECONDS),
            hash_iterations: matches
                .get_one::<u32>(ARG_HASH_ITERATIONS)
                .copied()
                .unwrap_or(DEFAULT_ITERATIONS),
            hash_memory_kib: matches
                .get_one::<u32>(ARG_HASH_MEMORY_KIB)
                .copied()
                .unwrap_or(DEFAULT_MEMORY_KIB),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("Secret used to sign access and password-reset tokens")
                .env("CREDO_JWT_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_JWT_REFRESH_SECRET)
                .long(ARG_JWT_REFRESH_SECRET)
                .help("Secret used to sign refresh tokens (defaults to --jwt-secret)")
                .env("CREDO_JWT_REFRESH_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_JWT_EXPIRES_IN)
                .long(ARG_JWT_EXPIRES_IN)
                .help("Access token lifetime in seconds")
                .env("CREDO_JWT_EXPIRES_IN")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_JWT_REFRESH_EXPIRES_IN)
                .long(ARG_JWT_REFRESH_EXPIRES_IN)
                .help("Refresh token lifetime in seconds")
                .env("CREDO_JWT_REFRESH_EXPIRES_IN")
                .default_value("604800")
                .value_parser(clap::value_parser!(i64).range(1..)),
        )
        .arg(
            Arg::new(ARG_HASH_ITERATIONS)
                .long(ARG_HASH_ITERATIONS)
                .help("Argon2id iterations (time cost)")
                .env("CREDO_HASH_ITERATIONS")
                .default_value("2")
                .value_parser(clap::value_parser!(u32).range(1..)),
        )
        .arg(
            Arg::new(ARG_HASH_MEMORY_KIB)
                .long(ARG_HASH_MEMORY_KIB)
                .help("Argon2id memory cost in KiB")
                .env("CREDO_HASH_MEMORY_KIB")
                .default_value("19456")
                .value_parser(clap::value_parser!(u32).range(8..)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn parse(args: &[&str]) -> anyhow::Result<Options> {
        let matches = with_args(Command::new("credo")).try_get_matches_from(args)?;
        Options::parse(&matches)
    }

    #[test]
    fn defaults_follow_the_token_and_hash_modules() -> anyhow::Result<()> {
        temp_env::with_vars(
            [
                ("CREDO_JWT_REFRESH_SECRET", None::<&str>),
                ("CREDO_JWT_EXPIRES_IN", None),
                ("CREDO_JWT_REFRESH_EXPIRES_IN", None),
                ("CREDO_HASH_ITERATIONS", None),
                ("CREDO_HASH_MEMORY_KIB", None),
                ("CREDO_JWT_SECRET", Some("env-secret")),
            ],
            || {
                let options = parse(&["credo"])?;
                assert_eq!(options.jwt_secret.expose_secret(), "env-secret");
                assert!(options.jwt_refresh_secret.is_none());
                assert_eq!(options.access_ttl_seconds, DEFAULT_ACCESS_TTL_SECONDS);
                assert_eq!(options.refresh_ttl_seconds, DEFAULT_REFRESH_TTL_SECONDS);
                assert_eq!(options.hash_iterations, DEFAULT_ITERATIONS);
                assert_eq!(options.hash_memory_kib, DEFAULT_MEMORY_KIB);
                Ok(())
            },
        )
    }

    #[test]
    fn blank_secret_is_rejected() {
        temp_env::with_vars([("CREDO_JWT_SECRET", Some("  "))], || {
            let result = parse(&["credo"]);
            assert!(result.is_err());
            if let Err(err) = result {
                assert!(err.to_string().contains("--jwt-secret"));
            }
        });
    }

    #[test]
    fn flags_override() -> anyhow::Result<()> {
        temp_env::with_vars([("CREDO_JWT_SECRET", None::<&str>)], || {
            let options = parse(&[
                "credo",
                "--jwt-secret",
                "a",
                "--jwt-refresh-secret",
                "b",
                "--jwt-expires-in",
                "60",
                "--hash-iterations",
                "3",
            ])?;
            assert_eq!(
                options
                    .jwt_refresh_secret
                    .as_ref()
                    .map(|s| s.expose_secret().to_string()),
                Some("b".to_string())
            );
            assert_eq!(options.access_ttl_seconds, 60);
            assert_eq!(options.hash_iterations, 3);
            Ok(())
        })
    }
}
