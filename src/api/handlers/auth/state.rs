//! Auth state and configuration shared by every handler.

use anyhow::{Context, Result};
use secrecy::SecretString;
use std::sync::Arc;

use crate::api::email::PasswordResetMailer;
use crate::auth::{
    AuthService, CredentialStore, Environment, FixedWindowRateLimiter, NoopRateLimiter,
    PasswordHasher, RateLimitConfig, RateLimiter, TokenConfig, TokenService,
    password::{DEFAULT_ITERATIONS, DEFAULT_MEMORY_KIB},
};

#[derive(Clone, Debug)]
pub struct AuthConfig {
    environment: Environment,
    tokens: TokenConfig,
    hash_iterations: u32,
    hash_memory_kib: u32,
    trusted_identities: Vec<String>,
    trust_proxy_headers: bool,
}

impl AuthConfig {
    #[must_use]
    pub fn new(jwt_secret: SecretString) -> Self {
        Self::from_tokens(TokenConfig::new(jwt_secret))
    }

    #[must_use]
    pub fn from_tokens(tokens: TokenConfig) -> Self {
        Self {
            environment: Environment::default(),
            tokens,
            hash_iterations: DEFAULT_ITERATIONS,
            hash_memory_kib: DEFAULT_MEMORY_KIB,
            trusted_identities: Vec::new(),
            trust_proxy_headers: false,
        }
    }

    #[must_use]
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    #[must_use]
    pub fn with_hash_cost(mut self, iterations: u32, memory_kib: u32) -> Self {
        self.hash_iterations = iterations;
        self.hash_memory_kib = memory_kib;
        self
    }

    #[must_use]
    pub fn with_trusted_identities(mut self, identities: Vec<String>) -> Self {
        self.trusted_identities = identities;
        self
    }

    #[must_use]
    pub fn with_trust_proxy_headers(mut self, trust: bool) -> Self {
        self.trust_proxy_headers = trust;
        self
    }

    #[must_use]
    pub fn environment(&self) -> Environment {
        self.environment
    }

    #[must_use]
    pub fn trust_proxy_headers(&self) -> bool {
        self.trust_proxy_headers
    }

    #[must_use]
    pub fn rate_limit_config(&self) -> RateLimitConfig {
        RateLimitConfig::new(self.environment)
            .with_trusted_identities(self.trusted_identities.iter().cloned())
    }
}

pub struct AuthState {
    config: AuthConfig,
    service: AuthService,
    rate_limiter: Arc<dyn RateLimiter>,
    mailer: Arc<dyn PasswordResetMailer>,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        service: AuthService,
        rate_limiter: Arc<dyn RateLimiter>,
        mailer: Arc<dyn PasswordResetMailer>,
    ) -> Self {
        Self {
            config,
            service,
            rate_limiter,
            mailer,
        }
    }

    /// Wire the hasher, token service and limiter described by `config`. The test
    /// environment gets [`NoopRateLimiter`].
    ///
    /// # Errors
    /// Returns an error if the hashing cost is rejected.
    pub fn from_config(
        config: AuthConfig,
        store: Arc<dyn CredentialStore>,
        mailer: Arc<dyn PasswordResetMailer>,
    ) -> Result<Self> {
        let hasher = PasswordHasher::new(config.hash_iterations, config.hash_memory_kib)
            .context("Invalid password hashing parameters")?;
        let tokens = TokenService::new(config.tokens.clone());
        let rate_limiter: Arc<dyn RateLimiter> = if config.environment == Environment::Test {
            Arc::new(NoopRateLimiter)
        } else {
            Arc::new(FixedWindowRateLimiter::new(config.rate_limit_config()))
        };
        let service = AuthService::new(store, hasher, tokens);
        Ok(Self::new(config, service, rate_limiter, mailer))
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn service(&self) -> &AuthService {
        &self.service
    }

    #[must_use]
    pub fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }

    /// Shared handle for background pruning.
    #[must_use]
    pub fn rate_limiter_handle(&self) -> Arc<dyn RateLimiter> {
        Arc::clone(&self.rate_limiter)
    }

    #[must_use]
    pub fn mailer(&self) -> &dyn PasswordResetMailer {
        self.mailer.as_ref()
    }
}
