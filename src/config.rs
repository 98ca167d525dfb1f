//! Per-client configuration.

/// Base URL for Google Drive API v3.
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Upload URL for Google Drive API.
pub const UPLOAD_API_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// Base URL for Google Sheets API v4.
pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";

/// Fields requested for file resources unless the caller passes its own list.
pub const DEFAULT_FILE_FIELDS: [&str; 5] = ["kind", "id", "name", "mimeType", "parents"];

/// Fields requested for revision resources unless the caller passes its own list.
pub const DEFAULT_REVISION_FIELDS: [&str; 6] = [
    "kind",
    "id",
    "mimeType",
    "modifiedTime",
    "keepForever",
    "published",
];

/// Settings owned by a single [`SheetsClient`](crate::SheetsClient).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub default_fields: Vec<String>,
    pub revision_fields: Vec<String>,
    /// Append `supportsAllDrives=true` to Drive file requests.
    pub all_drives: bool,
    pub drive_base: String,
    pub upload_base: String,
    pub sheets_base: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_fields: DEFAULT_FILE_FIELDS.iter().map(|f| f.to_string()).collect(),
            revision_fields: DEFAULT_REVISION_FIELDS
                .iter()
                .map(|f| f.to_string())
                .collect(),
            all_drives: false,
            drive_base: DRIVE_API_BASE.to_string(),
            upload_base: UPLOAD_API_BASE.to_string(),
            sheets_base: SHEETS_API_BASE.to_string(),
        }
    }
}

impl ClientConfig {
    /// Fields requested for file resources when a call passes none.
    pub fn with_default_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Fields requested for revisions when a call passes none.
    pub fn with_revision_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.revision_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Include shared drives in Drive file requests.
    pub fn with_all_drives(mut self, enabled: bool) -> Self {
        self.all_drives = enabled;
        self
    }

    /// Point every API at one root, e.g. a local mock server.
    ///
    /// The paths under the root mirror the Google hosts:
    /// `/drive/v3`, `/upload/drive/v3` and `/v4`.
    pub fn with_endpoint(mut self, root: &str) -> Self {
        let root = root.trim_end_matches('/');
        self.drive_base = format!("{}/drive/v3", root);
        self.upload_base = format!("{}/upload/drive/v3", root);
        self.sheets_base = format!("{}/v4", root);
        self
    }
}
