use crate::{
    api::{self, handlers::auth::AuthConfig},
    auth::{Environment, TokenConfig},
};
use anyhow::Result;
use secrecy::SecretString;
use tracing::info;
use url::Url;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub cors_origin: Option<String>,
    pub jwt_secret: SecretString,
    pub jwt_refresh_secret: Option<SecretString>,
    pub access_ttl_seconds: i64,
    pub refresh_ttl_seconds: i64,
    pub hash_iterations: u32,
    pub hash_memory_kib: u32,
    pub environment: Environment,
    pub trusted_identities: Vec<String>,
    pub trust_proxy_headers: bool,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the database is unreachable, the configuration is invalid, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let tokens = TokenConfig::new(args.jwt_secret)
        .with_refresh_secret(args.jwt_refresh_secret)
        .with_access_ttl_seconds(args.access_ttl_seconds)
        .with_refresh_ttl_seconds(args.refresh_ttl_seconds);

    let auth_config = AuthConfig::from_tokens(tokens)
        .with_environment(args.environment)
        .with_hash_cost(args.hash_iterations, args.hash_memory_kib)
        .with_trusted_identities(args.trusted_identities)
        .with_trust_proxy_headers(args.trust_proxy_headers);

    api::new(args.port, args.dsn, auth_config, args.cors_origin).await
}

fn log_startup_args(args: &Args) {
    let entries = [
        ("listen", format!("tcp:{}", args.port)),
        ("dsn", redact_dsn(&args.dsn)),
        ("environment", args.environment.to_string()),
        (
            "cors_origin",
            args.cors_origin.clone().unwrap_or_else(|| "*".to_string()),
        ),
        ("access_ttl_seconds", args.access_ttl_seconds.to_string()),
        ("refresh_ttl_seconds", args.refresh_ttl_seconds.to_string()),
        (
            "refresh_secret_set",
            args.jwt_refresh_secret.is_some().to_string(),
        ),
        (
            "hash_cost",
            format!("t={} m={}KiB", args.hash_iterations, args.hash_memory_kib),
        ),
        (
            "trusted_identities",
            args.trusted_identities.len().to_string(),
        ),
        ("trust_proxy_headers", args.trust_proxy_headers.to_string()),
    ];
    log_entries("Startup configuration", &entries);
}

fn redact_dsn(dsn: &str) -> String {
    match Url::parse(dsn) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("REDACTED"));
            }
            parsed.to_string()
        }
        Err(_) => "invalid-dsn".to_string(),
    }
}

fn log_entries(title: &str, entries: &[(&str, String)]) {
    let max_key_len = entries.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    let mut message = format!(
        "credo {} - {}\n\n{title}:",
        env!("CARGO_PKG_VERSION"),
        short_commit(crate::GIT_COMMIT_HASH)
    );
    for (key, value) in entries {
        let padding = " ".repeat(max_key_len.saturating_sub(key.len()));
        let _ =
            std::fmt::Write::write_fmt(&mut message, format_args!("\n  {key}:{padding} {value}"));
    }
    info!("{message}");
}

fn short_commit(hash: &str) -> &str {
    let trimmed = hash.trim();
    trimmed.get(..7).unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsn_password_is_redacted() {
        assert_eq!(
            redact_dsn("postgres://credo:hunter2@db:5432/credo"),
            "postgres://credo:REDACTED@db:5432/credo"
        );
        assert_eq!(
            redact_dsn("postgres://credo@db/credo"),
            "postgres://credo@db/credo"
        );
        assert_eq!(redact_dsn("::not a url::"), "invalid-dsn");
    }

    #[test]
    fn commit_is_shortened() {
        assert_eq!(short_commit("0123456789abcdef"), "0123456");
        assert_eq!(short_commit("unknown"), "unknown");
        assert_eq!(short_commit("abc"), "abc");
    }
}
