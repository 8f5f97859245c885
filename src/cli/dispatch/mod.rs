//! Map parsed CLI arguments to the action that runs.

use crate::cli::actions::{Action, server::Args};
use crate::cli::commands::{ARG_CORS_ORIGIN, ARG_DSN, ARG_PORT, auth, rate_limit};
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
    let cors_origin = matches
        .get_one::<String>(ARG_CORS_ORIGIN)
        .cloned()
        .filter(|origin| !origin.trim().is_empty());

    let auth_opts = auth::Options::parse(matches)?;
    let rate_limit_opts = rate_limit::Options::parse(matches)?;

    Ok(Action::Server(Args {
        port,
        dsn,
        cors_origin,
        jwt_secret: auth_opts.jwt_secret,
        jwt_refresh_secret: auth_opts.jwt_refresh_secret,
        access_ttl_seconds: auth_opts.access_ttl_seconds,
        refresh_ttl_seconds: auth_opts.refresh_ttl_seconds,
        hash_iterations: auth_opts.hash_iterations,
        hash_memory_kib: auth_opts.hash_memory_kib,
        environment: rate_limit_opts.environment,
        trusted_identities: rate_limit_opts.trusted_identities,
        trust_proxy_headers: rate_limit_opts.trust_proxy_headers,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Environment;

    #[test]
    fn jwt_secret_required() {
        temp_env::with_vars(
            [
                ("CREDO_JWT_SECRET", None::<&str>),
                ("CREDO_DSN", Some("postgres://user@localhost:5432/credo")),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["credo"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(
                        err.to_string()
                            .contains("missing required argument: --jwt-secret")
                    );
                }
            },
        );
    }

    #[test]
    fn server_action_carries_every_option() -> Result<()> {
        temp_env::with_vars(
            [
                ("CREDO_JWT_SECRET", Some("signing-secret")),
                ("CREDO_DSN", Some("postgres://user@localhost:5432/credo")),
                ("CREDO_ENV", Some("test")),
                ("CREDO_PORT", None),
                ("CREDO_CORS_ORIGIN", Some("")),
                ("CREDO_RATE_LIMIT_TRUSTED_IPS", Some("10.1.1.1")),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["credo"]);
                let Action::Server(args) = handler(&matches)?;
                assert_eq!(args.port, 8080);
                assert_eq!(args.dsn, "postgres://user@localhost:5432/credo");
                assert!(args.cors_origin.is_none());
                assert_eq!(args.environment, Environment::Test);
                assert_eq!(args.trusted_identities, vec!["10.1.1.1"]);
                Ok(())
            },
        )
    }
}
