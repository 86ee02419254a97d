//! Credentials, client configuration and builder pattern.

use crate::error::{ClientError, Result};
use std::fmt;
use std::time::Duration;

/// Default OAuth token endpoint.
pub const DEFAULT_AUTH_URL: &str = "https://api.domo.com/oauth/token";

/// Default dataset API root.
pub const DEFAULT_DATASETS_URL: &str = "https://api.domo.com/v1/datasets";

/// Environment variable holding the client id for [`Credentials::from_env`].
pub const CLIENT_ID_ENV: &str = "DOMO_CLIENT_ID";

/// Environment variable holding the client secret for [`Credentials::from_env`].
pub const SECRET_ENV: &str = "DOMO_SECRET";

/// Client id and secret created under "My Account > New Client" on the
/// developer portal. The client must be granted the `data` scope.
///
/// # Security
///
/// The `Debug` implementation masks the secret as `"***REDACTED***"`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    client_id: String,
    secret: String,
}

impl Credentials {
    /// Create credentials from a client id and secret.
    pub fn new(client_id: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            secret: secret.into(),
        }
    }

    /// Read credentials from `DOMO_CLIENT_ID` and `DOMO_SECRET`.
    pub fn from_env() -> Result<Self> {
        let client_id = read_env(CLIENT_ID_ENV)?;
        let secret = read_env(SECRET_ENV)?;
        Ok(Self::new(client_id, secret))
    }

    /// The OAuth client id.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub(crate) fn secret(&self) -> &str {
        &self.secret
    }
}

fn read_env(key: &str) -> Result<String> {
    match std::env::var(key) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ClientError::Config(format!(
            "environment variable {} is not set",
            key
        ))),
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("secret", &"***REDACTED***")
            .finish()
    }
}

/// Configuration for a [`Connection`](crate::Connection).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// OAuth token endpoint (default: `https://api.domo.com/oauth/token`)
    pub auth_url: String,
    /// Dataset API root (default: `https://api.domo.com/v1/datasets`)
    pub datasets_url: String,
    /// OAuth scope requested with the client-credentials grant (default: "data")
    pub scope: String,
    /// Number of datasets requested per listing page (default and maximum: 50)
    pub page_size: usize,
    /// Request timeout (default: 30 seconds)
    pub timeout: Duration,
    /// Whether to verify TLS certificates (default: true)
    pub tls_verify: bool,
    /// User-Agent header value
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            auth_url: DEFAULT_AUTH_URL.to_string(),
            datasets_url: DEFAULT_DATASETS_URL.to_string(),
            scope: "data".to_string(),
            page_size: 50,
            timeout: Duration::from_secs(30),
            tls_verify: true,
            user_agent: format!("domo-query/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Create a new configuration builder starting from the defaults.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Largest page the listing endpoint serves. Requesting more still
    /// returns at most this many, which would read as the final page.
    pub const MAX_PAGE_SIZE: usize = 50;

    /// Minimum allowed timeout value.
    pub const MIN_TIMEOUT: Duration = Duration::from_millis(100);

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validate_url("auth_url", &self.auth_url)?;
        validate_url("datasets_url", &self.datasets_url)?;

        if self.scope.is_empty() {
            return Err(ClientError::Config("scope cannot be empty".to_string()));
        }

        if self.page_size == 0 {
            return Err(ClientError::Config("page_size must be > 0".to_string()));
        }

        if self.page_size > Self::MAX_PAGE_SIZE {
            return Err(ClientError::Config(format!(
                "page_size ({}) must be <= {}",
                self.page_size,
                Self::MAX_PAGE_SIZE
            )));
        }

        if self.timeout < Self::MIN_TIMEOUT {
            return Err(ClientError::Config(format!(
                "timeout ({:?}) must be >= {:?}",
                self.timeout,
                Self::MIN_TIMEOUT
            )));
        }

        Ok(())
    }
}

fn validate_url(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(ClientError::Config(format!("{} cannot be empty", field)));
    }
    url::Url::parse(value)
        .map_err(|e| ClientError::Config(format!("Invalid {}: {}", field, e)))?;
    Ok(())
}

/// Builder for client configuration.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the OAuth token endpoint.
    pub fn auth_url(mut self, url: impl Into<String>) -> Self {
        self.config.auth_url = url.into();
        self
    }

    /// Set the dataset API root. Listing and query URLs are derived from it.
    pub fn datasets_url(mut self, url: impl Into<String>) -> Self {
        self.config.datasets_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the OAuth scope.
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.config.scope = scope.into();
        self
    }

    /// Set the listing page size.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.config.page_size = page_size;
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set whether to verify TLS certificates.
    pub fn tls_verify(mut self, verify: bool) -> Self {
        self.config.tls_verify = verify;
        self
    }

    /// Set a custom User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Build the configuration, validating all settings.
    pub fn build(self) -> Result<ClientConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
