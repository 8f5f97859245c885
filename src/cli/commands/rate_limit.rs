use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::auth::Environment;

pub const ARG_ENVIRONMENT: &str = "environment";
pub const ARG_TRUSTED_IPS: &str = "rate-limit-trusted-ips";
pub const ARG_TRUST_PROXY_HEADERS: &str = "trust-proxy-headers";

#[derive(Debug, Clone)]
pub struct Options {
    pub environment: Environment,
    pub trusted_identities: Vec<String>,
    pub trust_proxy_headers: bool,
}

impl Options {
    /// Parse environment and rate-limit arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the environment name is unknown.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let environment = match matches.get_one::<String>(ARG_ENVIRONMENT) {
            Some(value) if !value.trim().is_empty() => value
                .parse::<Environment>()
                .map_err(|err| anyhow::anyhow!("invalid --{ARG_ENVIRONMENT}: {err}"))?,
            _ => Environment::default(),
        };

        let trusted_identities = matches
            .get_one::<String>(ARG_TRUSTED_IPS)
            .map(|list| parse_list(list))
            .unwrap_or_default();

        Ok(Self {
            environment,
            trusted_identities,
            trust_proxy_headers: matches.get_flag(ARG_TRUST_PROXY_HEADERS),
        })
    }
}

fn parse_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ENVIRONMENT)
                .long(ARG_ENVIRONMENT)
                .help("Deployment environment: production, development or test")
                .long_help(
                    "Deployment environment. Production applies the strict rate-limit quotas, development the relaxed ones, and test disables rate limiting entirely.",
                )
                .env("CREDO_ENV")
                .default_value("development"),
        )
        .arg(
            Arg::new(ARG_TRUSTED_IPS)
                .long(ARG_TRUSTED_IPS)
                .help("Comma-separated client addresses that bypass rate limiting")
                .env("CREDO_RATE_LIMIT_TRUSTED_IPS"),
        )
        .arg(
            Arg::new(ARG_TRUST_PROXY_HEADERS)
                .long(ARG_TRUST_PROXY_HEADERS)
                .help("Identify clients by X-Forwarded-For / X-Real-IP")
                .env("CREDO_TRUST_PROXY_HEADERS")
                .action(ArgAction::SetTrue),
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<Options> {
        let matches = with_args(Command::new("credo")).try_get_matches_from(args)?;
        Options::parse(&matches)
    }

    #[test]
    fn defaults_to_development_without_bypass() -> anyhow::Result<()> {
        temp_env::with_vars(
            [
                ("CREDO_ENV", None::<&str>),
                ("CREDO_RATE_LIMIT_TRUSTED_IPS", None),
                ("CREDO_TRUST_PROXY_HEADERS", None),
            ],
            || {
                let options = parse(&["credo"])?;
                assert_eq!(options.environment, Environment::Development);
                assert!(options.trusted_identities.is_empty());
                assert!(!options.trust_proxy_headers);
                Ok(())
            },
        )
    }

    #[test]
    fn environment_and_trusted_list_from_env() -> anyhow::Result<()> {
        temp_env::with_vars(
            [
                ("CREDO_ENV", Some("production")),
                ("CREDO_RATE_LIMIT_TRUSTED_IPS", Some("10.0.0.1, ,127.0.0.1")),
            ],
            || {
                let options = parse(&["credo"])?;
                assert_eq!(options.environment, Environment::Production);
                assert_eq!(options.trusted_identities, vec!["10.0.0.1", "127.0.0.1"]);
                Ok(())
            },
        )
    }

    #[test]
    fn unknown_environment_is_an_error() {
        temp_env::with_vars([("CREDO_ENV", None::<&str>)], || {
            assert!(parse(&["credo", "--environment", "staging"]).is_err());
        });
    }
}
