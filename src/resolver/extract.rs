//! Photo URL extraction
//!
//! Pure mapping from a detail payload to a representative photo URL.

use serde_json::Value;

// == Extract Photo Url ==
/// Returns the first usable photo URL found at any of `pointers`.
///
/// A candidate must be a non-blank string that is either an absolute
/// http(s) URL or a root-relative path. Pointers are JSON pointers
/// (`/photos/0/url`); invalid or missing ones are skipped.
pub fn extract_photo_url<S: AsRef<str>>(payload: &Value, pointers: &[S]) -> Option<String> {
    pointers
        .iter()
        .filter_map(|pointer| payload.pointer(pointer.as_ref()))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|candidate| looks_like_url(candidate))
        .map(str::to_string)
}

fn looks_like_url(candidate: &str) -> bool {
    if candidate.starts_with('/') {
        return candidate.len() > 1 && candidate != "//";
    }
    match url::Url::parse(candidate) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.has_host(),
        Err(_) => false,
    }
}
