//! Domo Query Client
//!
//! A small Rust client for the Domo dataset API: authenticate with a client
//! id and secret, list the datasets the client can see, and run SQL against
//! one of them, getting rows back as JSON records.
//!
//! # Setup
//!
//! Create a client on developer.domo.com (sign in to your domain, then
//! "My Account > New Client") with the `data` scope. Its client id and secret
//! are all a [`Connection`] needs.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use domo_query::Connection;
//!
//! # async fn run() -> domo_query::Result<()> {
//! let mut conn = Connection::new("YOUR_CLIENT_ID", "YOUR_SECRET")?;
//!
//! // Every dataset the client owns or has share permission on
//! for ds in conn.list_datasets().await? {
//!     println!("{} ({}): {} rows", ds.name, ds.id, ds.rows);
//! }
//!
//! // The first query needs a dataset id or name...
//! let rows = conn.query("select * from table limit 10", "Sales").await?;
//! println!("{} rows", rows.len());
//!
//! // ...later ones reuse it.
//! let again = conn.query("", "").await?;
//! println!("{} rows", again.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Lazy state
//!
//! The access token and the dataset catalog are fetched on first use and
//! kept for the lifetime of the [`Connection`]. Neither is refreshed; build a
//! new connection to start over.
//!
//! # Error Handling
//!
//! All operations return `Result<T, ClientError>`. Errors include:
//!
//! - `Usage`: no dataset given and none resolved earlier
//! - `Authentication`: the token endpoint rejected the credentials
//! - `MalformedResponse`: a response was missing `access_token`, `columns`, `rows`, etc.
//! - `Http`: transport failures
//!
//! Nothing is retried.

pub mod config;
pub mod connection;
pub mod error;
pub mod types;

pub use config::{ClientConfig, ClientConfigBuilder, Credentials};
pub use connection::Connection;
pub use error::{ClientError, Result};
pub use types::{
    AuthResponse, DatasetMetadata, Owner, QueryRequest, QueryResponse, Record, DEFAULT_SQL,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
