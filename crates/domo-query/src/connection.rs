//! Lazily populated connection to the dataset API.

use crate::config::{ClientConfig, Credentials};
use crate::error::{ClientError, Result};
use crate::types::{
    ApiError, AuthResponse, DatasetMetadata, QueryRequest, QueryResponse, Record,
};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Instant;

/// The three endpoints this client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Token,
    Listing,
    Query,
}

impl Endpoint {
    fn as_str(self) -> &'static str {
        match self {
            Endpoint::Token => "token",
            Endpoint::Listing => "list_datasets",
            Endpoint::Query => "query_execute",
        }
    }
}

/// Connection to the dataset API for one set of client credentials.
///
/// Properties are populated on first use and then kept for the lifetime of
/// the value:
///
/// - the `Authorization` header, fetched by [`authenticate`](Self::authenticate)
/// - the dataset catalog, fetched by [`list_datasets`](Self::list_datasets)
/// - the last dataset found by [`resolve`](Self::resolve), which
///   [`query`](Self::query) falls back to when no dataset is given
///
/// None of these are refreshed. Create a new `Connection` to pick up an
/// expired token or datasets added since the catalog was fetched.
///
/// Operations take `&mut self` and issue their requests one at a time.
#[derive(Debug)]
pub struct Connection {
    http: reqwest::Client,
    config: ClientConfig,
    credentials: Credentials,
    auth_header: Option<HeaderMap>,
    catalog: Option<Vec<DatasetMetadata>>,
    last_resolved: Option<DatasetMetadata>,
}

impl Connection {
    /// Create a connection against the public API with default settings.
    pub fn new(client_id: impl Into<String>, secret: impl Into<String>) -> Result<Self> {
        Self::with_config(Credentials::new(client_id, secret), ClientConfig::default())
    }

    /// Create a connection from `DOMO_CLIENT_ID` / `DOMO_SECRET`.
    pub fn from_env() -> Result<Self> {
        Self::with_config(Credentials::from_env()?, ClientConfig::default())
    }

    /// Create a connection with the given credentials and configuration.
    pub fn with_config(credentials: Credentials, config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .unwrap_or_else(|_| HeaderValue::from_static("domo-query")),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .danger_accept_invalid_certs(!config.tls_verify)
            .build()?;

        Ok(Self {
            http,
            config,
            credentials,
            auth_header: None,
            catalog: None,
            last_resolved: None,
        })
    }

    /// The credentials this connection authenticates with.
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// The active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Whether an access token has already been obtained.
    pub fn is_authenticated(&self) -> bool {
        self.auth_header.is_some()
    }

    /// The catalog, if it has been fetched. Never touches the network.
    pub fn cached_catalog(&self) -> Option<&[DatasetMetadata]> {
        self.catalog.as_deref()
    }

    /// The dataset most recently found by [`resolve`](Self::resolve).
    pub fn last_resolved(&self) -> Option<&DatasetMetadata> {
        self.last_resolved.as_ref()
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    /// Return the `Authorization` header, requesting a token on first use.
    ///
    /// Uses the client-credentials grant with HTTP Basic auth. Once obtained
    /// the header is reused for every later call; it is never refreshed.
    pub async fn authenticate(&mut self) -> Result<&HeaderMap> {
        let header = match self.auth_header.take() {
            Some(header) => header,
            None => self.fetch_auth_header().await?,
        };
        Ok(&*self.auth_header.insert(header))
    }

    async fn fetch_auth_header(&self) -> Result<HeaderMap> {
        let request = self
            .http
            .get(&self.config.auth_url)
            .query(&[
                ("grant_type", "client_credentials"),
                ("scope", self.config.scope.as_str()),
            ])
            .basic_auth(
                self.credentials.client_id(),
                Some(self.credentials.secret()),
            );

        let response: AuthResponse = self.send(Endpoint::Token, request).await?;

        let mut value = HeaderValue::from_str(&format!("bearer {}", response.access_token))
            .map_err(|_| {
                ClientError::MalformedResponse(
                    "access_token contains characters not allowed in a header".to_string(),
                )
            })?;
        value.set_sensitive(true);

        let mut header = HeaderMap::new();
        header.insert(AUTHORIZATION, value);

        tracing::debug!(
            client_id = %self.credentials.client_id(),
            expires_in = ?response.expires_in,
            "Obtained access token"
        );

        Ok(header)
    }

    // =========================================================================
    // Dataset Catalog
    // =========================================================================

    /// List every dataset the credentials can see, fetching all pages on first use.
    ///
    /// The client must own or have share permission on a dataset for it to be
    /// listed. A failure part way through pagination leaves nothing cached, so
    /// the next call starts over from the first page.
    pub async fn list_datasets(&mut self) -> Result<&[DatasetMetadata]> {
        let catalog = match self.catalog.take() {
            Some(catalog) => catalog,
            None => self.fetch_catalog().await?,
        };
        Ok(self.catalog.insert(catalog).as_slice())
    }

    async fn fetch_catalog(&mut self) -> Result<Vec<DatasetMetadata>> {
        let header = self.authenticate().await?.clone();
        let limit = self.config.page_size;

        let mut datasets = Vec::new();
        let mut offset = 0usize;
        let mut pages = 0usize;

        // A page shorter than `limit` (including an empty one) is the last.
        loop {
            let request = self
                .http
                .get(&self.config.datasets_url)
                .query(&[("offset", offset), ("limit", limit)])
                .headers(header.clone());

            let page: Vec<DatasetMetadata> = self.send(Endpoint::Listing, request).await?;
            pages += 1;

            let fetched = page.len();
            datasets.extend(page);

            if fetched < limit {
                break;
            }
            offset += limit;
        }

        tracing::info!(
            datasets = datasets.len(),
            pages = pages,
            "Fetched dataset catalog"
        );

        Ok(datasets)
    }

    /// Find a dataset by name or id and remember it for later queries.
    ///
    /// The catalog is scanned in listing order and the first entry whose name
    /// or id equals `id_or_name` wins. Returns `None` without touching the
    /// remembered dataset when nothing matches.
    pub async fn resolve(&mut self, id_or_name: &str) -> Result<Option<&DatasetMetadata>> {
        let found = self
            .list_datasets()
            .await?
            .iter()
            .find(|dataset| dataset.matches(id_or_name))
            .cloned();

        match found {
            Some(dataset) => {
                tracing::debug!(id = %dataset.id, name = %dataset.name, "Resolved dataset");
                Ok(Some(&*self.last_resolved.insert(dataset)))
            }
            None => {
                tracing::debug!(id_or_name = %id_or_name, "No dataset matched");
                Ok(None)
            }
        }
    }

    // =========================================================================
    // Query Execution
    // =========================================================================

    /// Run `sql` against a dataset and return one record per row.
    ///
    /// `sql` always selects from the alias `table`; an empty string runs
    /// `select * from table`. Results can be limited or projected with normal
    /// select, where and limit clauses.
    ///
    /// Dataset selection:
    ///
    /// - `id_or_name` given and a dataset was resolved before: the previously
    ///   resolved dataset is queried and `id_or_name` is ignored.
    /// - neither given: fails with [`ClientError::Usage`] before any request.
    /// - otherwise `id_or_name` is resolved first, and the resolved (or
    ///   previously resolved) dataset is queried.
    pub async fn query(&mut self, sql: &str, id_or_name: &str) -> Result<Vec<Record>> {
        let dataset_id = self.select_dataset(id_or_name).await?;

        let mut header = self.authenticate().await?.clone();
        header.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let body = QueryRequest::new(sql);
        let url = format!(
            "{}/query/execute/{}",
            self.config.datasets_url,
            urlencoding::encode(&dataset_id)
        );

        tracing::debug!(dataset_id = %dataset_id, sql = %body.sql, "Executing query");

        let request = self
            .http
            .post(&url)
            .query(&[("includeHeaders", "true")])
            .headers(header)
            .json(&body);

        let response: QueryResponse = self.send(Endpoint::Query, request).await?;
        Ok(response.into_records())
    }

    async fn select_dataset(&mut self, id_or_name: &str) -> Result<String> {
        let selected = match (id_or_name.is_empty(), self.last_resolved.is_some()) {
            (false, true) => {
                tracing::debug!(
                    requested = %id_or_name,
                    "Querying the previously resolved dataset"
                );
                self.last_resolved.as_ref()
            }
            (true, false) => {
                return Err(ClientError::Usage(
                    "dataset id or name required".to_string(),
                ))
            }
            _ => {
                self.resolve(id_or_name).await?;
                self.last_resolved.as_ref()
            }
        };

        selected
            .map(|dataset| dataset.id.clone())
            .ok_or_else(|| ClientError::DatasetNotFound(id_or_name.to_string()))
    }

    // =========================================================================
    // Internal HTTP Methods
    // =========================================================================

    /// Send a request and deserialize a successful JSON response.
    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: Endpoint,
        request: RequestBuilder,
    ) -> Result<T> {
        let start = Instant::now();

        tracing::debug!(endpoint = endpoint.as_str(), "Sending request");

        let response = request.send().await?;
        let status = response.status();
        let duration = start.elapsed();

        tracing::debug!(
            endpoint = endpoint.as_str(),
            status = %status.as_u16(),
            duration_ms = %duration.as_millis(),
            "Received response"
        );

        let body = response.bytes().await?;

        if status.is_success() {
            serde_json::from_slice(&body).map_err(|e| {
                // Token responses are never echoed back.
                if endpoint == Endpoint::Token {
                    ClientError::MalformedResponse(format!(
                        "Failed to parse token response: {}",
                        e
                    ))
                } else {
                    ClientError::MalformedResponse(format!(
                        "Failed to parse {} response: {} (body: {})",
                        endpoint.as_str(),
                        e,
                        String::from_utf8_lossy(&body)
                    ))
                }
            })
        } else {
            let message = serde_json::from_slice::<ApiError>(&body)
                .ok()
                .and_then(|e| e.best_message())
                .unwrap_or_else(|| {
                    let text = String::from_utf8_lossy(&body).trim().to_string();
                    if text.is_empty() {
                        status.to_string()
                    } else {
                        text
                    }
                });

            tracing::warn!(
                endpoint = endpoint.as_str(),
                status = %status.as_u16(),
                duration_ms = %duration.as_millis(),
                error = %message,
                "Request failed"
            );

            Err(Self::status_to_error(endpoint, status, message))
        }
    }

    /// Convert HTTP status to appropriate error type.
    fn status_to_error(endpoint: Endpoint, status: StatusCode, message: String) -> ClientError {
        match status {
            s if endpoint == Endpoint::Token && s.is_client_error() => {
                ClientError::Authentication(message)
            }
            StatusCode::NOT_FOUND => ClientError::NotFound(message),
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized(message),
            StatusCode::FORBIDDEN => ClientError::Forbidden(message),
            _ => ClientError::ServerError {
                status: status.as_u16(),
                message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_connection_is_empty() {
        let conn = Connection::new("client", "secret").unwrap();
        assert!(!conn.is_authenticated());
        assert!(conn.cached_catalog().is_none());
        assert!(conn.last_resolved().is_none());
        assert_eq!(conn.credentials().client_id(), "client");
        assert_eq!(conn.config().page_size, 50);
    }

    #[test]
    fn test_connections_do_not_share_state() {
        let mut first = Connection::new("a", "x").unwrap();
        let second = Connection::new("b", "y").unwrap();

        first.catalog = Some(Vec::new());
        assert!(first.cached_catalog().is_some());
        assert!(second.cached_catalog().is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ClientConfig {
            page_size: 0,
            ..Default::default()
        };
        let result = Connection::with_config(Credentials::new("a", "b"), config);
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[test]
    fn test_status_to_error_token_endpoint() {
        let err = Connection::status_to_error(
            Endpoint::Token,
            StatusCode::UNAUTHORIZED,
            "Bad credentials".to_string(),
        );
        assert!(matches!(err, ClientError::Authentication(ref m) if m == "Bad credentials"));

        let err = Connection::status_to_error(
            Endpoint::Token,
            StatusCode::BAD_GATEWAY,
            "upstream".to_string(),
        );
        assert!(matches!(err, ClientError::ServerError { status: 502, .. }));
    }

    #[test]
    fn test_status_to_error_data_endpoints() {
        let err =
            Connection::status_to_error(Endpoint::Query, StatusCode::NOT_FOUND, "gone".to_string());
        assert!(matches!(err, ClientError::NotFound(_)));

        let err = Connection::status_to_error(
            Endpoint::Listing,
            StatusCode::UNAUTHORIZED,
            "expired".to_string(),
        );
        assert!(matches!(err, ClientError::Unauthorized(_)));

        let err = Connection::status_to_error(
            Endpoint::Listing,
            StatusCode::FORBIDDEN,
            "no access".to_string(),
        );
        assert!(matches!(err, ClientError::Forbidden(_)));

        let err = Connection::status_to_error(
            Endpoint::Query,
            StatusCode::BAD_REQUEST,
            "bad sql".to_string(),
        );
        assert!(matches!(err, ClientError::ServerError { status: 400, .. }));
    }
}
