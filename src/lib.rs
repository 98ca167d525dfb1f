//! sheets_client - A thin client for the Google Drive v3 and Sheets v4 APIs.
//!
//! This library provides:
//! - Drive file CRUD, resumable uploads, exports and revisions
//! - Spreadsheet creation, sheet management and value read/write/append/clear
//! - A pluggable [`Transport`] with a `reqwest` implementation
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use serde_json::json;
//! use sheets_client::{Authenticator, Credentials, ReqwestTransport, SheetsClient};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let auth = Authenticator::from_file("service-account.json")?;
//!     let transport = ReqwestTransport::new(Credentials::ServiceAccount(auth));
//!     let client = SheetsClient::new(Arc::new(transport));
//!
//!     let values = client
//!         .get_spreadsheet_values("spreadsheet-id", "Sheet1", &[])
//!         .await?;
//!     for row in values.rows() {
//!         println!("{:?}", row);
//!     }
//!
//!     client
//!         .append_spreadsheet_values("spreadsheet-id", "Sheet1", vec![vec![json!("a"), json!(1)]])
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod query;
pub mod transport;
pub mod url_parser;

// Re-exports for convenience
pub use auth::Authenticator;
pub use client::{SheetsClient, UploadSession};
pub use config::ClientConfig;
pub use error::{Result, SheetsError};
pub use models::{DriveFile, Metadata, Sheet, Spreadsheet, ValueRange};
pub use transport::{ApiRequest, ApiResponse, Credentials, ReqwestTransport, Transport};
pub use url_parser::{extract_id, parse_resource, ResourceKind, ResourceRef};
