//! Streaming object content with HTTP caching semantics
//!
//! Covers content-type negotiation, `Last-Modified`/`ETag` validators, the
//! conditional request headers and single byte ranges. Ranges are cut from
//! the object stream as it passes through.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use mime::Mime;

use crate::storage::{BodyStream, ObjectContent};

/// Serve a fetched object, honouring conditional and range headers.
pub fn serve_content(method: &Method, request_headers: &HeaderMap, object: ObjectContent) -> Response {
    let etag = object.etag.as_deref();
    let last_modified = object.last_modified.map(truncate_to_seconds);

    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    if let Some(value) = last_modified.and_then(|lm| HeaderValue::from_str(&http_date(lm)).ok()) {
        headers.insert(header::LAST_MODIFIED, value);
    }
    if let Some(value) = etag.and_then(|e| HeaderValue::from_str(e).ok()) {
        headers.insert(header::ETAG, value);
    }

    match check_preconditions(method, request_headers, etag, last_modified) {
        Precondition::Failed => return StatusCode::PRECONDITION_FAILED.into_response(),
        Precondition::NotModified => {
            headers.remove(header::ACCEPT_RANGES);
            if headers.contains_key(header::ETAG) {
                headers.remove(header::LAST_MODIFIED);
            }
            return (StatusCode::NOT_MODIFIED, headers).into_response();
        }
        Precondition::Proceed => {}
    }

    let content_type = content_type_for(&object.key, object.content_type.as_deref());
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type.as_ref())
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );

    let size = object.size;
    let range = request_headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .filter(|_| if_range_holds(request_headers, etag, last_modified))
        .map_or(RangeOutcome::Full, |range| parse_range(range, size));

    let (status, body, length) = match range {
        RangeOutcome::Full => (StatusCode::OK, object.body, size),
        RangeOutcome::Partial { start, end } => {
            let length = end - start + 1;
            headers.insert(
                header::CONTENT_RANGE,
                content_range(&format!("bytes {}-{}/{}", start, end, size)),
            );
            (StatusCode::PARTIAL_CONTENT, byte_window(object.body, start, length), length)
        }
        RangeOutcome::Unsatisfiable => {
            let mut headers = HeaderMap::new();
            headers.insert(header::CONTENT_RANGE, content_range(&format!("bytes */{}", size)));
            return (StatusCode::RANGE_NOT_SATISFIABLE, headers).into_response();
        }
    };

    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));

    if method == Method::HEAD {
        // Dropping the stream here releases the store connection
        drop(body);
        return (status, headers, Body::empty()).into_response();
    }

    (status, headers, Body::from_stream(body)).into_response()
}

fn content_range(value: &str) -> HeaderValue {
    HeaderValue::from_str(value).unwrap_or_else(|_| HeaderValue::from_static("bytes */0"))
}

// ---------------------------------------------------------------------------
// Content type
// ---------------------------------------------------------------------------

/// Pick the Content-Type for `key`.
///
/// The key's extension wins; otherwise the type recorded in the store is
/// used unless it is a generic binary type.
pub fn content_type_for(key: &str, stored: Option<&str>) -> Mime {
    if let Some(mime) = extension(key).and_then(mime_for_extension) {
        return mime;
    }

    stored
        .map(str::trim)
        .filter(|ct| !ct.is_empty())
        .and_then(|ct| ct.parse::<Mime>().ok())
        .filter(|m| m.essence_str() != "binary/octet-stream")
        .unwrap_or(mime::APPLICATION_OCTET_STREAM)
}

fn extension(key: &str) -> Option<&str> {
    let name = key.rsplit('/').next()?;
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext)
}

fn mime_for_extension(ext: &str) -> Option<Mime> {
    let mime = match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => mime::TEXT_HTML_UTF_8,
        "css" => mime::TEXT_CSS_UTF_8,
        "txt" => mime::TEXT_PLAIN_UTF_8,
        "csv" => mime::TEXT_CSV_UTF_8,
        "json" => mime::APPLICATION_JSON,
        "png" => mime::IMAGE_PNG,
        "jpg" | "jpeg" => mime::IMAGE_JPEG,
        "gif" => mime::IMAGE_GIF,
        "bmp" => mime::IMAGE_BMP,
        "svg" => mime::IMAGE_SVG,
        "pdf" => mime::APPLICATION_PDF,
        "woff" => mime::FONT_WOFF,
        "woff2" => mime::FONT_WOFF2,
        other => {
            let raw = match other {
                "js" | "mjs" => "text/javascript; charset=utf-8",
                "xml" => "text/xml; charset=utf-8",
                "md" => "text/markdown; charset=utf-8",
                "wasm" => "application/wasm",
                "webp" => "image/webp",
                "avif" => "image/avif",
                "ico" => "image/vnd.microsoft.icon",
                "mp4" => "video/mp4",
                "webm" => "video/webm",
                "mp3" => "audio/mpeg",
                "zip" => "application/zip",
                "gz" => "application/gzip",
                _ => return None,
            };
            return raw.parse().ok();
        }
    };
    Some(mime)
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Format a timestamp as an HTTP IMF-fixdate
pub fn http_date(dt: DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(dt.timestamp(), 0).unwrap_or(dt)
}

// ---------------------------------------------------------------------------
// Conditional requests
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum Precondition {
    Proceed,
    NotModified,
    Failed,
}

fn header_str<'a>(headers: &'a HeaderMap, name: header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn check_preconditions(
    method: &Method,
    headers: &HeaderMap,
    etag: Option<&str>,
    last_modified: Option<DateTime<Utc>>,
) -> Precondition {
    let is_read = method == Method::GET || method == Method::HEAD;

    let if_match = header_str(headers, header::IF_MATCH)
        .map(|list| etag_list_matches(list, etag, Comparison::Strong));
    let unmodified = if_match.or_else(|| {
        let since = header_str(headers, header::IF_UNMODIFIED_SINCE).and_then(parse_http_date)?;
        last_modified.map(|lm| lm <= since)
    });
    if unmodified == Some(false) {
        return Precondition::Failed;
    }

    match header_str(headers, header::IF_NONE_MATCH) {
        Some(list) => {
            if etag_list_matches(list, etag, Comparison::Weak) {
                return if is_read {
                    Precondition::NotModified
                } else {
                    Precondition::Failed
                };
            }
        }
        None if is_read => {
            let since = header_str(headers, header::IF_MODIFIED_SINCE).and_then(parse_http_date);
            if let (Some(since), Some(lm)) = (since, last_modified) {
                if lm <= since {
                    return Precondition::NotModified;
                }
            }
        }
        None => {}
    }

    Precondition::Proceed
}

#[derive(Clone, Copy)]
enum Comparison {
    Strong,
    Weak,
}

/// Whether any tag in a comma-separated `If-(None-)Match` list matches
fn etag_list_matches(list: &str, etag: Option<&str>, comparison: Comparison) -> bool {
    let list = list.trim();
    if list == "*" {
        return true;
    }
    let Some(etag) = etag else {
        return false;
    };

    list.split(',')
        .map(str::trim)
        .filter(|candidate| !candidate.is_empty())
        .any(|candidate| etag_eq(candidate, etag, comparison))
}

fn etag_eq(a: &str, b: &str, comparison: Comparison) -> bool {
    match comparison {
        Comparison::Strong => !is_weak(a) && !is_weak(b) && a == b,
        Comparison::Weak => strip_weak(a) == strip_weak(b),
    }
}

fn is_weak(tag: &str) -> bool {
    tag.starts_with("W/")
}

fn strip_weak(tag: &str) -> &str {
    tag.strip_prefix("W/").unwrap_or(tag)
}

/// A Range header is only honoured when `If-Range`, if sent, still holds
fn if_range_holds(headers: &HeaderMap, etag: Option<&str>, last_modified: Option<DateTime<Utc>>) -> bool {
    let Some(if_range) = header_str(headers, header::IF_RANGE).map(str::trim) else {
        return true;
    };

    if if_range.starts_with('"') || is_weak(if_range) {
        return etag.is_some_and(|etag| etag_eq(if_range, etag, Comparison::Strong));
    }

    match (parse_http_date(if_range), last_modified) {
        (Some(date), Some(lm)) => date == lm,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Byte ranges
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq)]
enum RangeOutcome {
    Full,
    /// Inclusive byte positions
    Partial { start: u64, end: u64 },
    Unsatisfiable,
}

/// Parse a `Range` header for an object of `size` bytes.
///
/// Only one range is served; a list of several is answered with the whole
/// object. Malformed or out-of-bounds ranges are unsatisfiable.
fn parse_range(range: &str, size: u64) -> RangeOutcome {
    let Some(spec) = range.trim().strip_prefix("bytes=") else {
        return RangeOutcome::Unsatisfiable;
    };
    if spec.contains(',') {
        return RangeOutcome::Full;
    }
    let Some((first, last)) = spec.trim().split_once('-') else {
        return RangeOutcome::Unsatisfiable;
    };
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        // bytes=-N  (last N bytes)
        let Ok(n) = last.parse::<u64>() else {
            return RangeOutcome::Unsatisfiable;
        };
        if n == 0 || size == 0 {
            return RangeOutcome::Unsatisfiable;
        }
        let n = n.min(size);
        return RangeOutcome::Partial {
            start: size - n,
            end: size - 1,
        };
    }

    let Ok(start) = first.parse::<u64>() else {
        return RangeOutcome::Unsatisfiable;
    };
    if start >= size {
        return RangeOutcome::Unsatisfiable;
    }

    let end = if last.is_empty() {
        size - 1
    } else {
        match last.parse::<u64>() {
            Ok(end) if end >= start => end.min(size - 1),
            _ => return RangeOutcome::Unsatisfiable,
        }
    };

    RangeOutcome::Partial { start, end }
}

/// Skip `start` bytes of `body`, then yield at most `length` bytes.
///
/// The inner stream is dropped as soon as the window is complete.
fn byte_window(body: BodyStream, start: u64, length: u64) -> BodyStream {
    futures::stream::unfold(
        (Some(body), start, length),
        |(body, mut skip, remaining)| async move {
            let mut body = body?;
            if remaining == 0 {
                return None;
            }
            loop {
                match body.next().await? {
                    Err(err) => return Some((Err(err), (None, 0, 0))),
                    Ok(chunk) => {
                        let chunk_len = chunk.len() as u64;
                        if skip >= chunk_len {
                            skip -= chunk_len;
                            continue;
                        }
                        let mut chunk: Bytes = chunk.slice(usize::try_from(skip).unwrap_or(0)..);
                        if chunk.len() as u64 > remaining {
                            chunk.truncate(usize::try_from(remaining).unwrap_or(usize::MAX));
                        }
                        let remaining = remaining - chunk.len() as u64;
                        let next = if remaining == 0 { None } else { Some(body) };
                        return Some((Ok(chunk), (next, 0, remaining)));
                    }
                }
            }
        },
    )
    .boxed()
}
