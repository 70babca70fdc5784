//! Mapping of request paths onto object keys

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use s3static_core::{clean, ServeError};

/// Characters escaped when a key segment is put back into a URL path
const PATH_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// A request path resolved against the configured bucket path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
    /// Bucket path plus `segment`; the key or prefix to look up
    pub full_path: String,
    /// Normalized request path without its leading `/`
    pub segment: String,
    /// The decoded request path ended with `/`
    pub is_explicit_directory: bool,
}

impl ResolvedRequest {
    /// Absolute location of the directory form of this request
    pub fn directory_location(&self) -> String {
        let segment = self.segment.trim_end_matches('/');
        if segment.is_empty() {
            return "/".to_string();
        }
        format!("/{}/", utf8_percent_encode(segment, PATH_ESCAPE))
    }
}

/// Resolve a raw request path against `prefix`.
///
/// `prefix` must already be normalized to `""` or `"segment/.../"`. The path
/// is percent-decoded (a bad escape or invalid UTF-8 is the only failure),
/// lexically cleaned, and stripped of its leading `/`. A trailing `/` on the
/// decoded path marks an explicit directory request and is kept on the
/// segment; the root resolves to an empty segment.
pub fn resolve(raw_path: &str, prefix: &str) -> Result<ResolvedRequest, ServeError> {
    let decoded = decode_path(raw_path)?;
    let decoded = if decoded.is_empty() { "/".to_string() } else { decoded };

    let is_explicit_directory = decoded.ends_with('/');
    let cleaned = clean(&decoded);

    let segment = if cleaned == "/" || cleaned == "." {
        String::new()
    } else {
        let trimmed = cleaned.strip_prefix('/').unwrap_or(&cleaned);
        if is_explicit_directory {
            format!("{}/", trimmed)
        } else {
            trimmed.to_string()
        }
    };

    Ok(ResolvedRequest {
        full_path: format!("{}{}", prefix, segment),
        segment,
        is_explicit_directory,
    })
}

/// Strictly percent-decode a path.
///
/// Unlike a lenient decoder, a `%` not followed by two hex digits is an
/// error rather than a literal.
pub fn decode_path(raw: &str) -> Result<String, ServeError> {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let escape = bytes.get(i + 1..i + 3);
            if !escape.is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit)) {
                return Err(ServeError::malformed_request(format!(
                    "invalid percent escape at offset {}",
                    i
                ))
                .with_resource(raw));
            }
            i += 3;
        } else {
            i += 1;
        }
    }

    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|e| {
            ServeError::malformed_request(format!("path is not valid UTF-8: {}", e))
                .with_resource(raw)
        })
}
