//! In-memory stand-in for the Drive and Sheets APIs.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use sheets_client::config::{DRIVE_API_BASE, SHEETS_API_BASE, UPLOAD_API_BASE};
use sheets_client::transport::{ApiRequest, ApiResponse, Method, RequestBody, Transport};
use sheets_client::{Result, SheetsError};

pub const SESSION_BASE: &str = "https://upload.test/session";

struct UploadTarget {
    file_id: Option<String>,
    metadata: Value,
    content_type: String,
}

#[derive(Default)]
struct State {
    next_id: u32,
    files: HashMap<String, Value>,
    sessions: HashMap<String, UploadTarget>,
    spreadsheets: HashMap<String, Value>,
    values: HashMap<(String, String), Vec<Value>>,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }
}

/// Records every request and answers it from in-memory state, unless a
/// scripted response is queued.
#[derive(Default)]
pub struct FakeGoogle {
    requests: Mutex<Vec<ApiRequest>>,
    script: Mutex<VecDeque<Result<ApiResponse>>>,
    state: Mutex<State>,
}

impl FakeGoogle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer the next request with `response` instead of the emulation.
    pub fn push_response(&self, response: Result<ApiResponse>) {
        self.script.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn uris(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.uri).collect()
    }

    pub fn last_request(&self) -> ApiRequest {
        self.requests().pop().expect("no request recorded")
    }

    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }

    fn emulate(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let (path, _query) = split_uri(&request.uri);
        let mut state = self.state.lock().unwrap();

        if let Some(rest) = path.strip_prefix(UPLOAD_API_BASE) {
            return upload_init(&mut state, request, rest);
        }
        if path.starts_with(SESSION_BASE) {
            return upload_content(&mut state, request, &path);
        }
        if let Some(rest) = path.strip_prefix(DRIVE_API_BASE) {
            return drive(&mut state, request, rest);
        }
        if let Some(rest) = path.strip_prefix(SHEETS_API_BASE) {
            return sheets(&mut state, request, rest);
        }
        Err(not_found(&request.uri))
    }
}

#[async_trait]
impl Transport for FakeGoogle {
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let scripted = self.script.lock().unwrap().pop_front();
        match scripted {
            Some(response) => response,
            None => self.emulate(&request),
        }
    }
}

pub fn split_uri(uri: &str) -> (String, Vec<(String, String)>) {
    match uri.split_once('?') {
        Some((path, query)) => {
            let pairs = query
                .split('&')
                .filter_map(|pair| pair.split_once('='))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();
            (path.to_string(), pairs)
        }
        None => (uri.to_string(), Vec::new()),
    }
}

pub fn query_value(uri: &str, key: &str) -> Option<String> {
    split_uri(uri)
        .1
        .into_iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v)
}

pub fn not_found(what: &str) -> SheetsError {
    SheetsError::ApiError {
        status: 404,
        message: format!("File not found: {}", what),
    }
}

fn ok(body: Value) -> Result<ApiResponse> {
    Ok(ApiResponse::new(200, body.to_string()))
}

fn json_body(request: &ApiRequest) -> Value {
    match &request.body {
        RequestBody::Json(value) => value.clone(),
        _ => json!({}),
    }
}

fn upload_init(state: &mut State, request: &ApiRequest, rest: &str) -> Result<ApiResponse> {
    let file_id = match (request.method, rest.strip_prefix("/files")) {
        (Method::Post, Some("")) => None,
        (Method::Patch, Some(id)) => {
            let id = id.trim_start_matches('/').to_string();
            if !state.files.contains_key(&id) {
                return Err(not_found(&id));
            }
            Some(id)
        }
        _ => return Err(not_found(rest)),
    };

    let session = format!("{}/{}", SESSION_BASE, state.next_id("upload"));
    let content_type = request
        .header_value("X-Upload-Content-Type")
        .unwrap_or("application/octet-stream")
        .to_string();
    state.sessions.insert(
        session.clone(),
        UploadTarget {
            file_id,
            metadata: json_body(request),
            content_type,
        },
    );

    Ok(ApiResponse::new(200, "").with_header("Location", session))
}

fn upload_content(state: &mut State, request: &ApiRequest, session: &str) -> Result<ApiResponse> {
    if request.method != Method::Put {
        return Err(not_found(session));
    }
    let target = state
        .sessions
        .remove(session)
        .ok_or_else(|| not_found(session))?;

    let id = match target.file_id {
        Some(id) => id,
        None => state.next_id("file"),
    };
    let file = state.files.entry(id.clone()).or_insert_with(|| {
        json!({
            "kind": "drive#file",
            "id": id,
            "mimeType": target.content_type,
            "parents": ["root"],
        })
    });
    if let (Some(file), Some(metadata)) = (file.as_object_mut(), target.metadata.as_object()) {
        for (key, value) in metadata {
            file.insert(key.clone(), value.clone());
        }
    }
    ok(file.clone())
}

fn drive(state: &mut State, request: &ApiRequest, rest: &str) -> Result<ApiResponse> {
    match (request.method, rest) {
        (Method::Get, "/files") => {
            let files: Vec<Value> = state.files.values().cloned().collect();
            ok(json!({ "files": files }))
        }
        (Method::Post, "/files") => {
            let id = state.next_id("file");
            let mut file = json!({
                "kind": "drive#file",
                "id": id,
                "mimeType": "application/octet-stream",
                "parents": ["root"],
            });
            if let (Some(file), Some(body)) = (file.as_object_mut(), json_body(request).as_object()) {
                for (key, value) in body {
                    file.insert(key.clone(), value.clone());
                }
            }
            state.files.insert(id, file.clone());
            ok(file)
        }
        (Method::Get, "/files/generateIds") => {
            let count: usize = query_value(&request.uri, "count")
                .and_then(|c| c.parse().ok())
                .unwrap_or(10);
            let ids: Vec<String> = (0..count).map(|_| state.next_id("gen")).collect();
            ok(json!({ "kind": "drive#generatedIds", "space": "drive", "ids": ids }))
        }
        (method, rest) => {
            let id = rest
                .strip_prefix("/files/")
                .ok_or_else(|| not_found(rest))?
                .to_string();
            match method {
                Method::Get => state
                    .files
                    .get(&id)
                    .cloned()
                    .map_or_else(|| Err(not_found(&id)), ok),
                Method::Patch => {
                    let file = state.files.get_mut(&id).ok_or_else(|| not_found(&id))?;
                    if let (Some(file), Some(body)) = (file.as_object_mut(), json_body(request).as_object()) {
                        for (key, value) in body {
                            file.insert(key.clone(), value.clone());
                        }
                    }
                    ok(file.clone())
                }
                Method::Delete => {
                    state.files.remove(&id).ok_or_else(|| not_found(&id))?;
                    Ok(ApiResponse::new(204, ""))
                }
                _ => Err(not_found(&id)),
            }
        }
    }
}

fn sheets(state: &mut State, request: &ApiRequest, rest: &str) -> Result<ApiResponse> {
    let rest = rest
        .strip_prefix("/spreadsheets")
        .ok_or_else(|| not_found(rest))?;

    if rest.is_empty() && request.method == Method::Post {
        let mut body = json_body(request);
        let id = match body["spreadsheetId"].as_str() {
            Some(id) => id.to_string(),
            None => state.next_id("spreadsheet"),
        };
        body["spreadsheetId"] = json!(id);
        if let Some(sheets) = body["sheets"].as_array_mut() {
            for (index, sheet) in sheets.iter_mut().enumerate() {
                sheet["properties"]["sheetId"] = json!(index);
                sheet["properties"]["index"] = json!(index);
            }
        }
        state.spreadsheets.insert(id, body.clone());
        return ok(body);
    }

    let rest = rest.trim_start_matches('/');
    if let Some(id) = rest.strip_suffix(":batchUpdate") {
        let spreadsheet = state
            .spreadsheets
            .get_mut(id)
            .ok_or_else(|| not_found(id))?;
        let mut replies = Vec::new();
        let body = json_body(request);
        for item in body["requests"].as_array().cloned().unwrap_or_default() {
            let sheets = spreadsheet["sheets"].as_array_mut().ok_or_else(|| not_found(id))?;
            if let Some(add) = item.get("addSheet") {
                let mut sheet = add.clone();
                let sheet_id = 1000 + sheets.len();
                sheet["properties"]["sheetId"] = json!(sheet_id);
                sheets.push(sheet.clone());
                replies.push(json!({ "addSheet": sheet }));
            } else if let Some(delete) = item.get("deleteSheet") {
                sheets.retain(|s| s["properties"]["sheetId"] != delete["sheetId"]);
                replies.push(json!({}));
            } else if let Some(update) = item.get("updateSheetProperties") {
                let props = &update["properties"];
                for sheet in sheets.iter_mut() {
                    if sheet["properties"]["sheetId"] == props["sheetId"] {
                        sheet["properties"]["title"] = props["title"].clone();
                    }
                }
                replies.push(json!({}));
            }
        }
        return ok(json!({ "spreadsheetId": id, "replies": replies }));
    }

    match rest.split_once("/values/") {
        None => state
            .spreadsheets
            .get(rest)
            .cloned()
            .map_or_else(|| Err(not_found(rest)), ok),
        Some((id, range)) => {
            if !state.spreadsheets.contains_key(id) {
                return Err(not_found(id));
            }
            values(state, request, id, range)
        }
    }
}

/// Ranges arrive percent-encoded as a single path segment.
fn decode_range(range: &str) -> String {
    urlencoding::decode(range)
        .map(|r| r.into_owned())
        .unwrap_or_else(|_| range.to_string())
}

fn values(state: &mut State, request: &ApiRequest, id: &str, range: &str) -> Result<ApiResponse> {
    let body = json_body(request);
    let rows = || body["values"].as_array().cloned().unwrap_or_default();

    if let Some(range) = range.strip_suffix(":append") {
        let range = decode_range(range);
        let existing = state
            .values
            .entry((id.to_string(), range.clone()))
            .or_default();
        let start = existing.len();
        existing.extend(rows());
        return ok(json!({
            "spreadsheetId": id,
            "tableRange": format!("{}!A1:A{}", range, start),
            "updates": { "updatedRows": existing.len() - start },
        }));
    }
    if let Some(range) = range.strip_suffix(":clear") {
        let range = decode_range(range);
        state.values.remove(&(id.to_string(), range.clone()));
        return ok(json!({ "spreadsheetId": id, "clearedRange": range }));
    }

    let range = decode_range(range);
    let key = (id.to_string(), range.clone());
    match request.method {
        Method::Put => {
            let rows = rows();
            let count = rows.len();
            state.values.insert(key, rows);
            ok(json!({ "spreadsheetId": id, "updatedRange": range, "updatedRows": count }))
        }
        Method::Get => {
            let mut response = json!({ "range": range, "majorDimension": "ROWS" });
            if let Some(rows) = state.values.get(&key).filter(|r| !r.is_empty()) {
                response["values"] = json!(rows);
            }
            ok(response)
        }
        _ => Err(not_found(&range)),
    }
}
