//! Document loaders: PDF uploads, website scraping, pasted text.
//!
//! Loaders yield [`LoadedResource`]s — plain text plus source metadata —
//! and know nothing about chunking or storage. A loader failure for one
//! resource must not take down a whole upload batch; the pipeline skips
//! the resource with a warning.

use std::time::Duration;

use crate::models::{LoadedResource, SourceKind};

/// Timeout for fetching a website to ingest.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Loader error. No panics: the pipeline skips the failed resource.
#[derive(Debug)]
pub enum LoaderError {
    UnsupportedFileType(String),
    Pdf(String),
    Fetch(String),
    EmptyBody(String),
}

impl std::fmt::Display for LoaderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoaderError::UnsupportedFileType(ext) => {
                write!(f, "unsupported file type: {}. Only PDF files are supported", ext)
            }
            LoaderError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            LoaderError::Fetch(e) => write!(f, "website fetch failed: {}", e),
            LoaderError::EmptyBody(src) => write!(f, "no text content in {}", src),
        }
    }
}

impl std::error::Error for LoaderError {}

/// Load pasted text as a single resource.
pub fn load_text(content: &str) -> LoadedResource {
    LoadedResource {
        name: "Text Input".to_string(),
        kind: SourceKind::Text,
        source: "text_input".to_string(),
        text: content.to_string(),
    }
}

/// Extract text from an uploaded file. Only `.pdf` is supported; any other
/// extension is rejected so the caller can skip it with a warning.
pub fn load_upload(file_name: &str, bytes: &[u8]) -> Result<LoadedResource, LoaderError> {
    let extension = file_name
        .rsplit('.')
        .next()
        .unwrap_or("")
        .to_ascii_lowercase();

    if extension != "pdf" {
        return Err(LoaderError::UnsupportedFileType(extension));
    }

    let text =
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| LoaderError::Pdf(e.to_string()))?;

    if text.trim().is_empty() {
        return Err(LoaderError::EmptyBody(file_name.to_string()));
    }

    Ok(LoadedResource {
        name: file_name.to_string(),
        kind: SourceKind::Pdf,
        source: file_name.to_string(),
        text,
    })
}

/// Fetch a web page and reduce it to plain text.
pub async fn load_website(url: &str) -> Result<LoadedResource, LoaderError> {
    let client = reqwest::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .map_err(|e| LoaderError::Fetch(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| LoaderError::Fetch(e.to_string()))?;

    if !response.status().is_success() {
        return Err(LoaderError::Fetch(format!(
            "{} returned HTTP {}",
            url,
            response.status()
        )));
    }

    let body = response
        .text()
        .await
        .map_err(|e| LoaderError::Fetch(e.to_string()))?;

    let text = strip_html(&body);
    if text.trim().is_empty() {
        return Err(LoaderError::EmptyBody(url.to_string()));
    }

    Ok(LoadedResource {
        name: url.to_string(),
        kind: SourceKind::Website,
        source: url.to_string(),
        text,
    })
}

/// Reduce an HTML page to its visible text.
///
/// Drops tags and the entire contents of `<script>` and `<style>` elements,
/// then collapses blank lines. Not a full HTML parser; good enough for the
/// article-like pages users index.
pub fn strip_html(html: &str) -> String {
    // Lowercased once for case-insensitive tag matching. ASCII lowercasing
    // preserves byte offsets, so one cursor walks both strings.
    let lower = html.to_ascii_lowercase();
    let mut out = String::with_capacity(html.len() / 4);
    let mut pos = 0;

    while let Some(open) = html[pos..].find('<') {
        out.push_str(&html[pos..pos + open]);
        pos += open;

        if lower[pos..].starts_with("<script") {
            pos = skip_past(&lower, pos, "</script>");
        } else if lower[pos..].starts_with("<style") {
            pos = skip_past(&lower, pos, "</style>");
        } else {
            match html[pos..].find('>') {
                Some(close) => pos += close + 1,
                // Dangling '<' with no close: nothing visible follows.
                None => return tidy(&out),
            }
        }
    }

    out.push_str(&html[pos..]);
    tidy(&out)
}

fn skip_past(lower: &str, from: usize, end_tag: &str) -> usize {
    match lower[from..].find(end_tag) {
        Some(at) => from + at + end_tag.len(),
        None => lower.len(),
    }
}

fn tidy(text: &str) -> String {
    let decoded = text
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");
    let lines: Vec<&str> = decoded
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_pdf_extension_rejected() {
        let err = load_upload("notes.docx", b"PK\x03\x04").unwrap_err();
        assert!(matches!(err, LoaderError::UnsupportedFileType(_)));
        assert!(err.to_string().contains("docx"));
    }

    #[test]
    fn invalid_pdf_returns_error() {
        let err = load_upload("broken.pdf", b"not a pdf").unwrap_err();
        assert!(matches!(err, LoaderError::Pdf(_)));
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        let err = load_upload("REPORT.PDF", b"not a pdf").unwrap_err();
        // Reaches the extractor rather than the extension check.
        assert!(matches!(err, LoaderError::Pdf(_)));
    }

    #[test]
    fn text_input_preserved() {
        let resource = load_text("plain content");
        assert_eq!(resource.text, "plain content");
        assert_eq!(resource.kind, SourceKind::Text);
        assert_eq!(resource.source, "text_input");
    }

    #[test]
    fn strip_html_keeps_visible_text() {
        let html = "<html><body><h1>Hello</h1><p>World &amp; friends</p></body></html>";
        let text = strip_html(html);
        assert!(text.contains("Hello"));
        assert!(text.contains("World & friends"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn strip_html_drops_script_and_style() {
        let html = r#"<head><script>var x = 1;</script><style>p { color: red }</style></head>
                      <body><p>Visible</p></body>"#;
        let text = strip_html(html);
        assert!(text.contains("Visible"));
        assert!(!text.contains("var x"));
        assert!(!text.contains("color"));
    }

    #[test]
    fn strip_html_handles_unclosed_script() {
        let html = "<p>before</p><script>trailing";
        let text = strip_html(html);
        assert_eq!(text, "before");
    }

    #[test]
    fn strip_html_tag_matching_ignores_case() {
        let html = "<SCRIPT>var hidden = 1;</SCRIPT><P>shown</P><Style>.a{}</STYLE>";
        let text = strip_html(html);
        assert_eq!(text, "shown");
    }

    #[test]
    fn strip_html_handles_multibyte_text_around_tags() {
        let html = "<p>héllo</p><script>var x;</script><p>wörld</p>";
        let text = strip_html(html);
        assert!(text.contains("héllo"));
        assert!(text.contains("wörld"));
        assert!(!text.contains("var x"));
    }
}
