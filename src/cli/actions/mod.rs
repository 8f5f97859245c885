//! Work the `credo` binary performs once its arguments are parsed.

pub mod server;

mod run;

/// A fully parsed command line, ready to run.
#[derive(Debug)]
pub enum Action {
    /// Serve the auth API until the process receives a shutdown signal.
    Server(server::Args),
}

impl Action {
    /// Short label used when logging which action runs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Server(_) => "server",
        }
    }

    /// Execute the action.
    /// # Errors
    /// Returns an error if the credential store, listener, or configuration fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Environment;
    use secrecy::SecretString;

    fn server_args() -> server::Args {
        server::Args {
            port: 8080,
            dsn: "postgres://credo@localhost/credo".to_string(),
            cors_origin: None,
            jwt_secret: SecretString::from("secret".to_string()),
            jwt_refresh_secret: None,
            access_ttl_seconds: 3600,
            refresh_ttl_seconds: 604_800,
            hash_iterations: 2,
            hash_memory_kib: 19_456,
            environment: Environment::Production,
            trusted_identities: Vec::new(),
            trust_proxy_headers: false,
        }
    }

    #[test]
    fn server_action_is_named() {
        assert_eq!(Action::Server(server_args()).name(), "server");
    }

    #[test]
    fn debug_output_hides_secrets() {
        let rendered = format!("{:?}", Action::Server(server_args()));
        assert!(rendered.contains("Server"));
        assert!(!rendered.contains("\"secret\""));
    }
}
