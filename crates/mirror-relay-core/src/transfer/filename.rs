//! Filename resolution for downloaded resources.
//!
//! Order of precedence: RFC 5987 `filename*=` parameter, plain `filename=`
//! parameter, last URL path segment, caller-supplied fallback.

// lazy_regex! statics rely on once_cell internally
#![allow(clippy::non_std_lazy_statics)]

use crate::utils::truncate_str;
use lazy_regex::lazy_regex;
use percent_encoding::percent_decode_str;
use reqwest::header::{HeaderMap, CONTENT_DISPOSITION};

/// Names longer than this (in characters) get truncated.
const MAX_NAME_CHARS: usize = 180;
/// Stem length kept when truncating.
const MAX_STEM_CHARS: usize = 160;
/// Extension length kept when truncating (dot included).
const MAX_EXT_CHARS: usize = 20;
/// Used when even the caller's fallback is blank.
const DEFAULT_NAME: &str = "file";

/// Extended parameter: `filename*=UTF-8''na%C3%AFve.txt`
static RE_FILENAME_EXT: lazy_regex::Lazy<regex::Regex> =
    lazy_regex!(r"(?i)filename\*=(?:utf-8'[^']*')?([^;]+)");

/// Basic parameter, quoted or not: `filename="report.pdf"`
static RE_FILENAME: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r#"(?i)filename="?([^";]+)"?"#);

/// Control characters that must never reach a file name.
static RE_CONTROL: lazy_regex::Lazy<regex::Regex> = lazy_regex!(r"[\r\n\t\x00]+");

/// Derives a safe file name for a response.
///
/// Never returns an empty string.
///
/// # Examples
///
/// ```
/// use mirror_relay_core::transfer::filename::resolve_filename;
/// use reqwest::header::HeaderMap;
///
/// let name = resolve_filename(&HeaderMap::new(), "https://host/a/b/report.pdf?x=1", "file");
/// assert_eq!(name, "report.pdf");
/// ```
#[must_use]
pub fn resolve_filename(headers: &HeaderMap, url: &str, fallback: &str) -> String {
    // Servers often send raw UTF-8 here, which `to_str` rejects.
    let disposition = headers
        .get(CONTENT_DISPOSITION)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
        .unwrap_or_default();

    if let Some(name) = filename_from_disposition(&disposition) {
        return sanitize_filename(&name, fallback);
    }

    let from_url = filename_from_url(url).unwrap_or_default();
    sanitize_filename(&from_url, fallback)
}

/// Extracts the raw (unsanitized) file name from a `Content-Disposition` value.
#[must_use]
pub fn filename_from_disposition(disposition: &str) -> Option<String> {
    if let Some(caps) = RE_FILENAME_EXT.captures(disposition) {
        let raw = caps[1].trim().trim_matches('"').trim();
        return Some(percent_decode_str(raw).decode_utf8_lossy().into_owned());
    }

    RE_FILENAME
        .captures(disposition)
        .map(|caps| caps[1].to_string())
}

fn filename_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path_segments()?.next_back()?;
    if segment.is_empty() {
        return None;
    }
    Some(percent_decode_str(segment).decode_utf8_lossy().into_owned())
}

/// Strips control characters and caps the length while keeping the extension.
///
/// Falls back to `fallback` (or `"file"`) when nothing usable remains.
#[must_use]
pub fn sanitize_filename(name: &str, fallback: &str) -> String {
    let cleaned = RE_CONTROL.replace_all(name.trim(), "").trim().to_string();
    if cleaned.is_empty() {
        let fallback = RE_CONTROL.replace_all(fallback.trim(), "").to_string();
        if fallback.is_empty() {
            return DEFAULT_NAME.to_string();
        }
        return cap_length(&fallback);
    }
    cap_length(&cleaned)
}

fn cap_length(name: &str) -> String {
    if name.chars().count() <= MAX_NAME_CHARS {
        return name.to_string();
    }
    let (stem, ext) = split_extension(name);
    format!(
        "{}{}",
        truncate_str(stem, MAX_STEM_CHARS),
        truncate_str(ext, MAX_EXT_CHARS)
    )
}

/// Splits at the last dot, ignoring leading dots (`.bashrc` has no extension).
fn split_extension(name: &str) -> (&str, &str) {
    let leading_dots = name.len() - name.trim_start_matches('.').len();
    match name.rfind('.') {
        Some(idx) if idx >= leading_dots => name.split_at(idx),
        _ => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers_with(disposition: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(disposition) {
            headers.insert(CONTENT_DISPOSITION, value);
        }
        headers
    }

    #[test]
    fn extended_parameter_is_percent_decoded() {
        let headers = headers_with("attachment; filename*=UTF-8''na%C3%AFve.txt");
        assert_eq!(
            resolve_filename(&headers, "https://host/x", "file"),
            "naïve.txt"
        );
    }

    #[test]
    fn raw_utf8_basic_parameter_is_kept() -> Result<(), reqwest::header::InvalidHeaderValue> {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_DISPOSITION,
            HeaderValue::from_bytes("attachment; filename=\"naïve.txt\"".as_bytes())?,
        );
        assert_eq!(
            resolve_filename(&headers, "https://host/dl?id=1", "file"),
            "naïve.txt"
        );
        Ok(())
    }

    #[test]
    fn extended_parameter_wins_over_basic() {
        let headers =
            headers_with("attachment; filename=\"plain.txt\"; filename*=utf-8''fancy%20name.txt");
        assert_eq!(
            resolve_filename(&headers, "https://host/x", "file"),
            "fancy name.txt"
        );
    }

    #[test]
    fn basic_parameter_quoted_and_unquoted() {
        let quoted = headers_with("attachment; filename=\"report.pdf\"");
        assert_eq!(resolve_filename(&quoted, "https://h/x", "f"), "report.pdf");

        let bare = headers_with("inline; filename=data.csv; size=10");
        assert_eq!(resolve_filename(&bare, "https://h/x", "f"), "data.csv");
    }

    #[test]
    fn url_path_segment_used_without_header() {
        let headers = HeaderMap::new();
        assert_eq!(
            resolve_filename(&headers, "https://example.com/a/b/report.pdf?x=1", "file"),
            "report.pdf"
        );
        assert_eq!(
            resolve_filename(&headers, "https://example.com/dl/my%20file.zip", "file"),
            "my file.zip"
        );
    }

    #[test]
    fn fallback_used_for_bare_host_or_trailing_slash() {
        let headers = HeaderMap::new();
        assert_eq!(resolve_filename(&headers, "https://example.com", "hint.bin"), "hint.bin");
        assert_eq!(resolve_filename(&headers, "https://example.com/dir/", "hint.bin"), "hint.bin");
        assert_eq!(resolve_filename(&headers, "not a url", "hint.bin"), "hint.bin");
    }

    #[test]
    fn control_characters_are_stripped() {
        assert_eq!(sanitize_filename("bad\r\nna\tme\0.txt", "file"), "badname.txt");
    }

    #[test]
    fn never_returns_empty() {
        assert_eq!(sanitize_filename("  \t ", "fallback.dat"), "fallback.dat");
        assert_eq!(sanitize_filename("", ""), "file");
    }

    #[test]
    fn long_names_keep_their_extension() {
        let name = format!("{}.tar.gz", "a".repeat(300));
        let sanitized = sanitize_filename(&name, "file");
        assert_eq!(sanitized.chars().count(), 163);
        assert!(sanitized.ends_with(".gz"));
        assert!(sanitized.starts_with(&"a".repeat(160)));
    }

    #[test]
    fn long_extension_is_capped() {
        let name = format!("{}.{}", "b".repeat(170), "x".repeat(40));
        let sanitized = sanitize_filename(&name, "file");
        assert_eq!(sanitized.chars().count(), 180);
        assert!(sanitized.ends_with(&format!(".{}", "x".repeat(19))));
    }

    #[test]
    fn names_at_the_limit_are_untouched() {
        let name = "c".repeat(180);
        assert_eq!(sanitize_filename(&name, "file"), name);
    }

    #[test]
    fn leading_dot_is_not_an_extension() {
        assert_eq!(split_extension(".bashrc"), (".bashrc", ""));
        assert_eq!(split_extension("archive.tar.gz"), ("archive.tar", ".gz"));
    }
}
