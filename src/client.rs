//! Google Drive and Sheets API client.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{Result, SheetsError};
use crate::models::{
    AppendValuesResponse, BatchUpdateResponse, ClearValuesResponse, DriveFile, FileList,
    GeneratedIds, Metadata, Revision, RevisionList, Sheet, SheetProperties, Spreadsheet,
    SpreadsheetProperties, UpdateValuesResponse, ValueRange,
};
use crate::query::{append_fields, append_params, append_query, list_projection};
use crate::transport::{ApiRequest, ApiResponse, Method, Transport};

/// Mime type used by [`SheetsClient::export_file`] callers that want CSV.
pub const DEFAULT_EXPORT_MIME_TYPE: &str = "text/csv";

/// Number of ids reserved by a default `generate_ids` call.
pub const DEFAULT_ID_COUNT: u32 = 10;

/// A resumable upload that has been initiated but has no content yet.
///
/// Returned by [`SheetsClient::init_upload`] and consumed by
/// [`SheetsClient::upload_content`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    url: String,
    content_type: String,
}

impl UploadSession {
    /// Session URL from the initiation response's `Location` header.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Content type announced at initiation and sent with the bytes.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }
}

/// Client for Google Drive v3 and Google Sheets v4.
///
/// Each method performs a single request/response exchange through the
/// injected [`Transport`] (two for content uploads).
pub struct SheetsClient {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
}

impl SheetsClient {
    /// Create a client with the default configuration.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_config(transport, ClientConfig::default())
    }

    /// Create a client with an explicit configuration.
    pub fn with_config(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        Self { transport, config }
    }

    /// The transport requests are sent through.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Current projection, all-drives flag and API bases.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Replace the fields requested for file resources.
    pub fn set_default_fields<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.default_fields = fields.into_iter().map(Into::into).collect();
    }

    /// Include shared drives in the scope of Drive file requests.
    pub fn set_all_drives(&mut self, enabled: bool) {
        self.config.all_drives = enabled;
    }

    fn files_uri(&self) -> String {
        format!("{}/files", self.config.drive_base)
    }

    fn file_uri(&self, file_id: &str) -> String {
        format!("{}/files/{}", self.config.drive_base, file_id)
    }

    fn spreadsheet_uri(&self, spreadsheet_id: &str) -> String {
        format!("{}/spreadsheets/{}", self.config.sheets_base, spreadsheet_id)
    }

    /// The range is one path segment; sheet titles may contain `#`, `?` or `/`.
    fn values_uri(&self, spreadsheet_id: &str, range: &str) -> String {
        format!(
            "{}/values/{}",
            self.spreadsheet_uri(spreadsheet_id),
            urlencoding::encode(range)
        )
    }

    /// Append the explicit field list, or the configured one when `fields` is empty.
    fn add_fields(&self, uri: &str, fields: &[&str]) -> String {
        if fields.is_empty() {
            append_fields(uri, &self.config.default_fields)
        } else {
            append_fields(uri, fields)
        }
    }

    fn add_all_drives(&self, uri: String) -> String {
        if self.config.all_drives {
            append_query(&uri, "supportsAllDrives", "true")
        } else {
            uri
        }
    }

    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        debug!(method = %request.method, uri = %request.uri, "Calling API");
        self.transport.request(request).await
    }

    async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        self.send(request).await?.json()
    }

    /// Get file metadata by ID.
    ///
    /// An empty `fields` slice requests the configured default projection; a
    /// non-empty one replaces it.
    pub async fn get_file(&self, file_id: &str, fields: &[&str]) -> Result<DriveFile> {
        let uri = self.add_all_drives(self.add_fields(&self.file_uri(file_id), fields));
        self.send_json(ApiRequest::get(uri)).await
    }

    /// Like [`get_file`](Self::get_file), but a 404 becomes `Ok(None)`.
    pub async fn lookup_file(&self, file_id: &str, fields: &[&str]) -> Result<Option<DriveFile>> {
        match self.get_file(file_id, fields).await {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.is_not_found() => {
                info!(file_id, "File not found");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Whether a file with this ID is visible. Errors other than 404 are returned.
    pub async fn file_exists(&self, file_id: &str) -> Result<bool> {
        Ok(self.lookup_file(file_id, &[]).await?.is_some())
    }

    /// List files, optionally filtered with Drive query syntax.
    ///
    /// The query is appended verbatim.
    pub async fn list_files(&self, query: &str) -> Result<FileList> {
        let mut uri = self.files_uri();
        if !query.is_empty() {
            uri = append_query(&uri, "q", query);
        }
        let projection = list_projection(
            &["nextPageToken", "incompleteSearch"],
            "files",
            &self.config.default_fields,
        );
        uri = append_query(&uri, "fields", &projection);
        if self.config.all_drives {
            uri = append_query(&uri, "includeItemsFromAllDrives", "true");
        }
        let uri = self.add_all_drives(uri);
        self.send_json(ApiRequest::get(uri)).await
    }

    /// Upload a local file as a new Drive file named `title`.
    ///
    /// `metadata` is merged into the create body, so passing a `mimeType`
    /// (e.g. [`MIME_TYPE_SPREADSHEET`](crate::models::MIME_TYPE_SPREADSHEET))
    /// converts the upload.
    pub async fn create_file<P: AsRef<Path>>(
        &self,
        local_path: P,
        title: &str,
        metadata: Metadata,
    ) -> Result<DriveFile> {
        let local_path = local_path.as_ref();
        let content_type = guess_content_type(local_path);

        let mut body = Metadata::new();
        body.insert("name".to_string(), Value::String(title.to_string()));
        body.extend(metadata);

        let session = self.init_upload(body, &content_type, None).await?;
        self.upload_content(&session, local_path).await
    }

    /// Replace a file's content and patch its metadata.
    pub async fn update_file<P: AsRef<Path>>(
        &self,
        file_id: &str,
        local_path: P,
        metadata: Metadata,
    ) -> Result<DriveFile> {
        let local_path = local_path.as_ref();
        let content_type = guess_content_type(local_path);

        let session = self
            .init_upload(metadata, &content_type, Some(file_id))
            .await?;
        self.upload_content(&session, local_path).await
    }

    /// Start a resumable upload session.
    ///
    /// POSTs to create a file, or PATCHes `file_id` when given. The response
    /// must be a 200 carrying a `Location` header.
    pub async fn init_upload(
        &self,
        metadata: Metadata,
        content_type: &str,
        file_id: Option<&str>,
    ) -> Result<UploadSession> {
        let (method, uri) = match file_id {
            Some(id) => (
                Method::Patch,
                format!("{}/files/{}", self.config.upload_base, id),
            ),
            None => (Method::Post, format!("{}/files", self.config.upload_base)),
        };
        let uri = append_query(&uri, "uploadType", "resumable");
        let uri = self.add_all_drives(self.add_fields(&uri, &[]));

        let request = ApiRequest::new(method, uri)
            .header("X-Upload-Content-Type", content_type)
            .json(Value::Object(metadata));
        let response = self.send(request).await?;

        if response.status != 200 {
            return Err(SheetsError::UploadInitFailed {
                reason: format!("status {}", response.status),
                body: response.text(),
            });
        }

        let url = response
            .header("Location")
            .ok_or_else(|| SheetsError::UploadInitFailed {
                reason: "missing Location header".to_string(),
                body: response.text(),
            })?
            .to_string();

        info!(session = %url, "Upload session created");

        Ok(UploadSession {
            url,
            content_type: content_type.to_string(),
        })
    }

    /// Stream a local file's bytes into an upload session.
    pub async fn upload_content<P: AsRef<Path>>(
        &self,
        session: &UploadSession,
        local_path: P,
    ) -> Result<DriveFile> {
        let local_path: PathBuf = local_path.as_ref().to_path_buf();
        let len = tokio::fs::metadata(&local_path).await?.len();

        let uri = self.add_fields(&self.add_all_drives(session.url.clone()), &[]);
        let request = ApiRequest::new(Method::Put, uri)
            .header("Content-Type", session.content_type.as_str())
            .header("Content-Length", len.to_string())
            .file(local_path, len);

        self.send_json(request).await
    }

    /// Create a file without content, e.g. an empty native spreadsheet.
    pub async fn create_file_metadata(&self, title: &str, metadata: Metadata) -> Result<DriveFile> {
        let mut body = Metadata::new();
        body.insert("name".to_string(), Value::String(title.to_string()));
        body.extend(metadata);

        let uri = self.add_all_drives(self.add_fields(&self.files_uri(), &[]));
        self.send_json(ApiRequest::new(Method::Post, uri).json(Value::Object(body)))
            .await
    }

    /// PATCH file metadata. `params` are extra query parameters such as
    /// `addParents` / `removeParents`.
    pub async fn update_file_metadata(
        &self,
        file_id: &str,
        body: Metadata,
        params: &[(&str, &str)],
    ) -> Result<DriveFile> {
        let uri = self.add_fields(&self.file_uri(file_id), &[]);
        let uri = self.add_all_drives(append_params(&uri, params));
        self.send_json(ApiRequest::new(Method::Patch, uri).json(Value::Object(body)))
            .await
    }

    /// Delete a file. The raw response is returned for the caller to inspect.
    pub async fn delete_file(&self, file_id: &str) -> Result<ApiResponse> {
        let uri = self.add_all_drives(self.file_uri(file_id));
        self.send(ApiRequest::new(Method::Delete, uri)).await
    }

    /// Export a native Google document, e.g. as [`DEFAULT_EXPORT_MIME_TYPE`].
    pub async fn export_file(&self, file_id: &str, mime_type: &str) -> Result<ApiResponse> {
        let uri = format!("{}/export", self.file_uri(file_id));
        let uri = append_query(&uri, "mimeType", mime_type);
        self.send(ApiRequest::get(uri)).await
    }

    /// Reserve file IDs for later create calls.
    pub async fn generate_ids(&self, count: u32) -> Result<GeneratedIds> {
        let uri = format!("{}/generateIds", self.files_uri());
        let uri = append_query(&uri, "count", &count.to_string());
        self.send_json(ApiRequest::get(uri)).await
    }

    fn revisions_uri(&self, file_id: &str) -> String {
        format!("{}/revisions", self.file_uri(file_id))
    }

    fn add_revision_fields(&self, uri: &str, fields: &[&str]) -> String {
        if fields.is_empty() {
            append_fields(uri, &self.config.revision_fields)
        } else {
            append_fields(uri, fields)
        }
    }

    /// List a file's revisions. An empty `fields` uses the configured revision projection.
    pub async fn list_revisions(&self, file_id: &str, fields: &[&str]) -> Result<RevisionList> {
        let projection = if fields.is_empty() {
            list_projection(&["nextPageToken"], "revisions", &self.config.revision_fields)
        } else {
            list_projection(&["nextPageToken"], "revisions", fields)
        };
        let uri = append_query(&self.revisions_uri(file_id), "fields", &projection);
        self.send_json(ApiRequest::get(uri)).await
    }

    /// Get one revision of a file.
    pub async fn get_revision(
        &self,
        file_id: &str,
        revision_id: &str,
        fields: &[&str],
    ) -> Result<Revision> {
        let uri = format!("{}/{}", self.revisions_uri(file_id), revision_id);
        let uri = self.add_revision_fields(&uri, fields);
        self.send_json(ApiRequest::get(uri)).await
    }

    /// PATCH a revision, e.g. `{"keepForever": true}`.
    pub async fn update_revision(
        &self,
        file_id: &str,
        revision_id: &str,
        body: Metadata,
    ) -> Result<Revision> {
        let uri = format!("{}/{}", self.revisions_uri(file_id), revision_id);
        let uri = self.add_revision_fields(&uri, &[]);
        self.send_json(ApiRequest::new(Method::Patch, uri).json(Value::Object(body)))
            .await
    }

    /// Delete a revision. The raw response is returned.
    pub async fn delete_revision(&self, file_id: &str, revision_id: &str) -> Result<ApiResponse> {
        let uri = format!("{}/{}", self.revisions_uri(file_id), revision_id);
        self.send(ApiRequest::new(Method::Delete, uri)).await
    }

    /// Fetch spreadsheet properties and its list of sheets.
    pub async fn get_spreadsheet(&self, spreadsheet_id: &str) -> Result<Spreadsheet> {
        self.send_json(ApiRequest::get(self.spreadsheet_uri(spreadsheet_id)))
            .await
    }

    /// Read a range, addressed by sheet title or A1 notation.
    pub async fn get_spreadsheet_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        params: &[(&str, &str)],
    ) -> Result<ValueRange> {
        let uri = append_params(&self.values_uri(spreadsheet_id, range), params);
        self.send_json(ApiRequest::get(uri)).await
    }

    /// Create a spreadsheet. With `spreadsheet_id` set, the server is asked to
    /// use that id (typically one from [`generate_ids`](Self::generate_ids)).
    pub async fn create_spreadsheet(
        &self,
        properties: SpreadsheetProperties,
        sheets: Vec<Sheet>,
        spreadsheet_id: Option<&str>,
    ) -> Result<Spreadsheet> {
        let mut body = json!({
            "properties": properties,
            "sheets": sheets,
        });
        if let Some(id) = spreadsheet_id {
            body["spreadsheetId"] = Value::String(id.to_string());
        }

        let uri = format!("{}/spreadsheets", self.config.sheets_base);
        self.send_json(ApiRequest::new(Method::Post, uri).json(body))
            .await
    }

    /// Add a sheet (tab); the reply carries its assigned `sheetId`.
    pub async fn add_sheet(&self, spreadsheet_id: &str, sheet: Sheet) -> Result<BatchUpdateResponse> {
        let body = json!({
            "requests": [{ "addSheet": sheet }],
        });
        self.batch_update_spreadsheet(spreadsheet_id, body).await
    }

    /// Rename a sheet. Only the `title` field of `properties` is applied.
    pub async fn update_sheet(
        &self,
        spreadsheet_id: &str,
        properties: SheetProperties,
    ) -> Result<BatchUpdateResponse> {
        let body = json!({
            "requests": [{
                "updateSheetProperties": {
                    "properties": properties,
                    "fields": "title",
                },
            }],
        });
        self.batch_update_spreadsheet(spreadsheet_id, body).await
    }

    /// Remove a sheet by its numeric id.
    pub async fn delete_sheet(&self, spreadsheet_id: &str, sheet_id: i64) -> Result<BatchUpdateResponse> {
        let body = json!({
            "requests": [{ "deleteSheet": { "sheetId": sheet_id } }],
        });
        self.batch_update_spreadsheet(spreadsheet_id, body).await
    }

    /// Apply a raw `batchUpdate` body (`{"requests": [...]}`).
    pub async fn batch_update_spreadsheet(
        &self,
        spreadsheet_id: &str,
        body: Value,
    ) -> Result<BatchUpdateResponse> {
        let uri = format!("{}:batchUpdate", self.spreadsheet_uri(spreadsheet_id));
        self.send_json(ApiRequest::new(Method::Post, uri).json(body))
            .await
    }

    /// Overwrite a range with `values`, parsed as if typed by a user.
    pub async fn update_spreadsheet_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<Value>>,
    ) -> Result<UpdateValuesResponse> {
        let uri = append_query(
            &self.values_uri(spreadsheet_id, range),
            "valueInputOption",
            "USER_ENTERED",
        );
        let body = json!({ "values": values });
        self.send_json(ApiRequest::new(Method::Put, uri).json(body))
            .await
    }

    /// Append rows after the table found in `range`, parsed as if typed by a user.
    pub async fn append_spreadsheet_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
        values: Vec<Vec<Value>>,
    ) -> Result<AppendValuesResponse> {
        let uri = format!("{}:append", self.values_uri(spreadsheet_id, range));
        let uri = append_query(&uri, "valueInputOption", "USER_ENTERED");
        let body = json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": values,
        });
        self.send_json(ApiRequest::new(Method::Post, uri).json(body))
            .await
    }

    /// Empty a range. The sheet itself is kept.
    pub async fn clear_spreadsheet_values(
        &self,
        spreadsheet_id: &str,
        range: &str,
    ) -> Result<ClearValuesResponse> {
        let uri = format!("{}:clear", self.values_uri(spreadsheet_id, range));
        self.send_json(ApiRequest::new(Method::Post, uri).json(json!({})))
            .await
    }
}

/// Content type from the file extension, `application/octet-stream` if unknown.
pub fn guess_content_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string()
}
