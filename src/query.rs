//! Query-string helpers shared by every API call.

/// Append `key=value` to `uri`, using `?` for the first parameter and `&` after.
///
/// The value is appended verbatim.
///
/// ```
/// use sheets_client::query::append_query;
///
/// assert_eq!(append_query("https://x/files", "q", "a"), "https://x/files?q=a");
/// assert_eq!(append_query("https://x/files?q=a", "b", "c"), "https://x/files?q=a&b=c");
/// ```
pub fn append_query(uri: &str, key: &str, value: &str) -> String {
    let delimiter = if uri.contains('?') { '&' } else { '?' };
    format!("{}{}{}={}", uri, delimiter, key, value)
}

/// Append a `fields` projection, joining the field names with commas.
pub fn append_fields<S: AsRef<str>>(uri: &str, fields: &[S]) -> String {
    let joined = fields
        .iter()
        .map(|f| f.as_ref())
        .collect::<Vec<_>>()
        .join(",");
    append_query(uri, "fields", &joined)
}

/// Append each parameter with its value percent-encoded.
pub fn append_params(uri: &str, params: &[(&str, &str)]) -> String {
    params.iter().fold(uri.to_string(), |acc, (key, value)| {
        append_query(&acc, key, &urlencoding::encode(value))
    })
}

/// Wrap a projection for a list response, e.g. `nextPageToken,files(id,name)`.
pub fn list_projection<S: AsRef<str>>(prefix: &[&str], collection: &str, fields: &[S]) -> String {
    let inner = fields
        .iter()
        .map(|f| f.as_ref())
        .collect::<Vec<_>>()
        .join(",");
    let mut parts: Vec<String> = prefix.iter().map(|p| p.to_string()).collect();
    parts.push(format!("{}({})", collection, inner));
    parts.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_parameter_uses_question_mark() {
        assert_eq!(
            append_query("https://www.googleapis.com/drive/v3/files/abc", "fields", "id"),
            "https://www.googleapis.com/drive/v3/files/abc?fields=id"
        );
    }

    #[test]
    fn test_later_parameters_use_ampersand() {
        let uri = append_query("https://host/files?uploadType=resumable", "supportsAllDrives", "true");
        assert_eq!(uri, "https://host/files?uploadType=resumable&supportsAllDrives=true");
    }

    #[test]
    fn test_append_fields_joins_with_commas() {
        let uri = append_fields("https://host/files/1", &["kind", "id", "name"]);
        assert_eq!(uri, "https://host/files/1?fields=kind,id,name");

        let uri = append_fields("https://host/files/1?a=b", &["id"]);
        assert_eq!(uri, "https://host/files/1?a=b&fields=id");
    }

    #[test]
    fn test_append_params_encodes_values() {
        let uri = append_params(
            "https://host/values/Sheet1",
            &[("valueRenderOption", "FORMULA"), ("note", "a b&c")],
        );
        assert_eq!(
            uri,
            "https://host/values/Sheet1?valueRenderOption=FORMULA&note=a%20b%26c"
        );
    }

    #[test]
    fn test_append_params_empty_is_noop() {
        assert_eq!(append_params("https://host/x", &[]), "https://host/x");
    }

    #[test]
    fn test_list_projection() {
        assert_eq!(
            list_projection(&["nextPageToken"], "files", &["id", "name"]),
            "nextPageToken,files(id,name)"
        );
    }
}
