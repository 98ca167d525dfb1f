//! Resolve browser URLs for Drive items and Docs editors to resource IDs.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, SheetsError};

/// What kind of resource a URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Folder,
    File,
    Spreadsheet,
    Document,
    Presentation,
    /// A bare ID, or a Drive URL that does not reveal the type.
    Unknown,
}

/// An ID resolved from a URL or passed through as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub id: String,
}

const ID: &str = "([A-Za-z0-9_-]+)";

static URL_PATTERNS: LazyLock<Vec<(Regex, Option<ResourceKind>)>> = LazyLock::new(|| {
    let pattern = |re: String| Regex::new(&re).expect("static URL pattern");
    vec![
        (
            pattern(format!(r"^https?://drive\.google\.com/drive/(?:u/\d+/)?folders/{ID}")),
            Some(ResourceKind::Folder),
        ),
        (
            pattern(format!(r"^https?://drive\.google\.com/file/d/{ID}")),
            Some(ResourceKind::File),
        ),
        (
            pattern(format!(r"^https?://drive\.google\.com/open\?id={ID}")),
            Some(ResourceKind::Unknown),
        ),
        // Kind comes from the editor segment.
        (
            pattern(format!(
                r"^https?://docs\.google\.com/(spreadsheets|document|presentation)/(?:u/\d+/)?d/{ID}"
            )),
            None,
        ),
    ]
});

static RAW_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!("^{ID}$")).expect("static ID pattern"));

fn editor_kind(segment: &str) -> ResourceKind {
    match segment {
        "spreadsheets" => ResourceKind::Spreadsheet,
        "document" => ResourceKind::Document,
        "presentation" => ResourceKind::Presentation,
        _ => ResourceKind::Unknown,
    }
}

/// Resolve `url_or_id` into an ID and, where the URL tells, its kind.
///
/// Recognized forms are Drive folder links (with or without `u/N/`), Drive
/// `file/d/<id>` and `open?id=<id>` links, Sheets/Docs/Slides editor links,
/// and bare IDs. Surrounding whitespace is ignored.
pub fn parse_resource(url_or_id: &str) -> Result<ResourceRef> {
    let input = url_or_id.trim();

    for (regex, kind) in URL_PATTERNS.iter() {
        let Some(caps) = regex.captures(input) else {
            continue;
        };
        let (kind, id) = match kind {
            Some(kind) => (*kind, &caps[1]),
            None => (editor_kind(&caps[1]), &caps[2]),
        };
        return Ok(ResourceRef {
            kind,
            id: id.to_string(),
        });
    }

    if RAW_ID.is_match(input) {
        return Ok(ResourceRef {
            kind: ResourceKind::Unknown,
            id: input.to_string(),
        });
    }

    Err(SheetsError::InvalidUrlOrId(url_or_id.to_string()))
}

/// Like [`parse_resource`], keeping only the ID.
///
/// ```
/// use sheets_client::url_parser::extract_id;
///
/// let id = extract_id("https://docs.google.com/spreadsheets/d/1abc123/edit#gid=0").unwrap();
/// assert_eq!(id, "1abc123");
/// assert_eq!(extract_id("1abc123").unwrap(), "1abc123");
/// ```
pub fn extract_id(url_or_id: &str) -> Result<String> {
    parse_resource(url_or_id).map(|r| r.id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_editor_segment_sets_kind() {
        let sheet = parse_resource("https://docs.google.com/spreadsheets/d/s1/edit#gid=0").unwrap();
        assert_eq!(sheet.kind, ResourceKind::Spreadsheet);
        assert_eq!(sheet.id, "s1");

        let slides = parse_resource("https://docs.google.com/presentation/u/2/d/p-1/edit").unwrap();
        assert_eq!(slides.kind, ResourceKind::Presentation);
        assert_eq!(slides.id, "p-1");
    }

    #[test]
    fn test_drive_links_set_kind() {
        let folder = parse_resource("https://drive.google.com/drive/folders/f_1").unwrap();
        assert_eq!(folder.kind, ResourceKind::Folder);

        let open = parse_resource("https://drive.google.com/open?id=x").unwrap();
        assert_eq!(open.kind, ResourceKind::Unknown);
    }

    #[test]
    fn test_error_keeps_original_input() {
        match parse_resource(" not/an id ") {
            Err(SheetsError::InvalidUrlOrId(input)) => assert_eq!(input, " not/an id "),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
