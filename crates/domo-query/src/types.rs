//! Request and response types for the dataset API.
//!
//! Required fields are plain (non-`Option`) so a response missing them fails
//! deserialization at the boundary and surfaces as
//! [`ClientError::MalformedResponse`](crate::ClientError::MalformedResponse).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// One query result row: column name to cell value, in column order.
pub type Record = Map<String, Value>;

/// SQL used when the caller does not supply one. Every query selects from
/// the fixed `table` alias.
pub const DEFAULT_SQL: &str = "select * from table";

/// Token endpoint response for the client-credentials grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Bearer token used for every subsequent request
    pub access_token: String,
    /// Token type reported by the server (normally "bearer")
    pub token_type: Option<String>,
    /// Lifetime in seconds; informational only, tokens are never refreshed
    pub expires_in: Option<u64>,
    /// Granted scope(s)
    pub scope: Option<String>,
}

/// Dataset owner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    /// User id
    pub id: Option<i64>,
    /// Display name
    pub name: Option<String>,
}

/// Metadata for one dataset visible to the credentials (from the listing endpoint).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetMetadata {
    /// Platform-assigned id, used for querying
    pub id: String,
    /// Display name
    pub name: String,
    /// Row count
    pub rows: i64,
    /// Column count
    pub columns: i64,
    /// Description
    pub description: Option<String>,
    /// Owner
    pub owner: Option<Owner>,
    /// When the dataset was created
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    /// When the dataset metadata was last updated
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
    /// When the data itself was last refreshed
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub data_current_at: Option<DateTime<Utc>>,
    /// Whether personalized data permissions are enabled
    pub pdp_enabled: Option<bool>,
    /// Remaining platform-defined fields, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Timestamps are informational; anything that is not RFC 3339 reads as `None`
/// instead of failing the whole listing page.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|ts| ts.with_timezone(&Utc)))
}

impl DatasetMetadata {
    /// True if `id_or_name` equals this dataset's name or id, name first.
    pub fn matches(&self, id_or_name: &str) -> bool {
        self.name == id_or_name || self.id == id_or_name
    }
}

/// Body of a query-execution request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// SQL selecting from `table`
    pub sql: String,
}

impl QueryRequest {
    /// Build a request, falling back to [`DEFAULT_SQL`] when `sql` is empty.
    pub fn new(sql: &str) -> Self {
        let sql = if sql.is_empty() { DEFAULT_SQL } else { sql };
        Self {
            sql: sql.to_string(),
        }
    }
}

/// Query-execution response (requested with `includeHeaders=true`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResponse {
    /// Column names, positionally matching each row
    pub columns: Vec<String>,
    /// Row values
    pub rows: Vec<Vec<Value>>,
    /// Dataset id the query ran against
    pub datasource: Option<String>,
    /// Number of rows returned
    pub num_rows: Option<u64>,
    /// Number of columns returned
    pub num_columns: Option<u64>,
}

impl QueryResponse {
    /// Zip every row against `columns`, one record per row, in server order.
    ///
    /// Lengths are not checked against each other; a row shorter or longer
    /// than `columns` yields a record with as many entries as the shorter side.
    pub fn into_records(self) -> Vec<Record> {
        let columns = self.columns;
        self.rows
            .into_iter()
            .map(|row| columns.iter().cloned().zip(row).collect())
            .collect()
    }
}

/// Error body returned by the API on non-success statuses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// HTTP status echoed by the server
    pub status: Option<u16>,
    /// Reason phrase or error code
    pub status_reason: Option<String>,
    /// Human-readable message
    pub message: Option<String>,
    /// OAuth-style error code
    pub error: Option<String>,
    /// OAuth-style error description
    #[serde(rename = "error_description")]
    pub error_description: Option<String>,
}

impl ApiError {
    /// The most descriptive message the body carries.
    pub fn best_message(&self) -> Option<String> {
        self.message
            .clone()
            .or_else(|| self.error_description.clone())
            .or_else(|| self.error.clone())
            .or_else(|| self.status_reason.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dataset_metadata_deserialize() {
        let json = r#"{
            "id": "08a061e2-12a2-4646-b4bc-20beddb403e3",
            "name": "Sales",
            "description": "Daily sales",
            "rows": 1200,
            "columns": 8,
            "owner": {"id": 27, "name": "DomoSupport"},
            "createdAt": "2016-04-19T14:40:57Z",
            "updatedAt": "2016-04-19T14:40:58Z",
            "dataCurrentAt": "2016-04-19T14:40:58Z",
            "pdpEnabled": false,
            "schema": {"columns": []}
        }"#;

        let dataset: DatasetMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(dataset.name, "Sales");
        assert_eq!(dataset.rows, 1200);
        assert_eq!(dataset.columns, 8);
        assert_eq!(dataset.owner.as_ref().unwrap().id, Some(27));
        assert!(dataset.created_at.is_some());
        assert_eq!(dataset.pdp_enabled, Some(false));
        assert!(dataset.extra.contains_key("schema"));
        assert!(!dataset.extra.contains_key("name"));
    }

    #[test]
    fn test_dataset_metadata_tolerates_bad_timestamps() {
        let dataset: DatasetMetadata = serde_json::from_value(json!({
            "id": "A1",
            "name": "Sales",
            "rows": 3,
            "columns": 2,
            "createdAt": "19/04/2016 14:40",
            "updatedAt": 1461076857,
            "dataCurrentAt": "2016-04-19T14:40:58Z"
        }))
        .unwrap();

        assert!(dataset.created_at.is_none());
        assert!(dataset.updated_at.is_none());
        assert_eq!(
            dataset.data_current_at.unwrap().to_rfc3339(),
            "2016-04-19T14:40:58+00:00"
        );
        assert!(!dataset.extra.contains_key("createdAt"));
    }

    #[test]
    fn test_dataset_metadata_requires_id() {
        let json = r#"{"name": "Sales", "rows": 1, "columns": 1}"#;
        let result: std::result::Result<DatasetMetadata, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_matches_name_or_id() {
        let dataset: DatasetMetadata =
            serde_json::from_value(json!({"id": "A1", "name": "Sales", "rows": 0, "columns": 0}))
                .unwrap();
        assert!(dataset.matches("Sales"));
        assert!(dataset.matches("A1"));
        assert!(!dataset.matches("sales"));
        assert!(!dataset.matches(""));
    }

    #[test]
    fn test_auth_response_requires_access_token() {
        let ok: AuthResponse =
            serde_json::from_str(r#"{"access_token": "tok", "token_type": "bearer"}"#).unwrap();
        assert_eq!(ok.access_token, "tok");

        let missing: std::result::Result<AuthResponse, _> =
            serde_json::from_str(r#"{"token_type": "bearer"}"#);
        assert!(missing.is_err());
    }

    #[test]
    fn test_query_request_default_sql() {
        assert_eq!(QueryRequest::new("").sql, "select * from table");
        assert_eq!(
            QueryRequest::new("select id from table limit 10").sql,
            "select id from table limit 10"
        );
        assert_eq!(
            serde_json::to_value(QueryRequest::new("")).unwrap(),
            json!({"sql": "select * from table"})
        );
    }

    #[test]
    fn test_into_records_zips_columns() {
        let response: QueryResponse = serde_json::from_value(json!({
            "columns": ["id", "val"],
            "rows": [[1, "x"], [2, "y"]],
            "numRows": 2
        }))
        .unwrap();
        assert_eq!(response.num_rows, Some(2));

        let records = response.into_records();
        assert_eq!(records.len(), 2);
        assert_eq!(Value::Object(records[0].clone()), json!({"id": 1, "val": "x"}));
        assert_eq!(Value::Object(records[1].clone()), json!({"id": 2, "val": "y"}));

        let keys: Vec<&String> = records[0].keys().collect();
        assert_eq!(keys, vec!["id", "val"]);
    }

    #[test]
    fn test_into_records_short_row() {
        let response = QueryResponse {
            columns: vec!["a".to_string(), "b".to_string()],
            rows: vec![vec![json!(1)]],
            datasource: None,
            num_rows: None,
            num_columns: None,
        };
        let records = response.into_records();
        assert_eq!(records[0].len(), 1);
        assert_eq!(records[0]["a"], json!(1));
    }

    #[test]
    fn test_query_response_requires_rows() {
        let result: std::result::Result<QueryResponse, _> =
            serde_json::from_str(r#"{"columns": ["a"]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_api_error_best_message() {
        let error: ApiError = serde_json::from_str(
            r#"{"status": 404, "statusReason": "Not Found", "message": "Dataset not found"}"#,
        )
        .unwrap();
        assert_eq!(error.best_message(), Some("Dataset not found".to_string()));

        let oauth: ApiError = serde_json::from_str(
            r#"{"error": "invalid_client", "error_description": "Bad credentials"}"#,
        )
        .unwrap();
        assert_eq!(oauth.best_message(), Some("Bad credentials".to_string()));
    }
}
