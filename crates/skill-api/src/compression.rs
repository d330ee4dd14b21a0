//! Transparent gzip for request and response bodies.
//!
//! Inbound bodies marked `Content-Encoding: gzip` are inflated before the
//! handler sees them. Successful responses are deflated when the client
//! lists gzip in `Accept-Encoding`. Everything else streams through untouched.
//!
//! Compressed and plain bodies share one size limit, checked both on the
//! wire and after inflating.

use std::io::{self, Read, Write};

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{
        HeaderMap, HeaderName, HeaderValue, StatusCode,
        header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_LENGTH, VARY},
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use flate2::{Compression, read::GzDecoder, write::GzEncoder};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use thiserror::Error;
use tracing::{debug, error};

/// Largest request body accepted, plain or after inflating. Matches axum's
/// default extractor limit; `router()` applies it to plain bodies.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Error)]
enum InflateError {
    #[error("request body exceeds {} bytes", MAX_BODY_BYTES)]
    TooLarge,

    #[error("cannot read request body: {0}")]
    Read(String),

    #[error("cannot inflate request body: {0}")]
    Decode(#[from] io::Error),
}

pub async fn negotiate_gzip(req: Request, next: Next) -> Response {
    let accepts_gzip = lists_gzip(req.headers(), ACCEPT_ENCODING);

    let req = if lists_gzip(req.headers(), CONTENT_ENCODING) {
        match inflate_request(req).await {
            Ok(req) => req,
            Err(InflateError::TooLarge) => {
                debug!("compressed request body exceeds {} bytes", MAX_BODY_BYTES);
                return StatusCode::PAYLOAD_TOO_LARGE.into_response();
            }
            Err(e) => {
                debug!("{}", e);
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    } else {
        req
    };

    let mut res = next.run(req).await;

    if res.status().as_u16() >= 300 {
        return res;
    }

    // The representation depends on Accept-Encoding whether or not we compress
    res.headers_mut()
        .append(VARY, HeaderValue::from_static("accept-encoding"));

    if accepts_gzip && !res.headers().contains_key(CONTENT_ENCODING) {
        deflate_response(res).await
    } else {
        res
    }
}

/// True when `name` lists gzip with a non-zero quality.
fn lists_gzip(headers: &HeaderMap, name: HeaderName) -> bool {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|item| {
            let mut parts = item.split(';').map(str::trim);
            let coding = parts.next().unwrap_or_default();
            if !coding.eq_ignore_ascii_case("gzip") && !coding.eq_ignore_ascii_case("x-gzip") {
                return false;
            }
            // "gzip;q=0" means explicitly not acceptable
            !parts.any(|p| {
                p.strip_prefix("q=")
                    .and_then(|q| q.parse::<f32>().ok())
                    .is_some_and(|q| q == 0.0)
            })
        })
}

async fn inflate_request(req: Request) -> Result<Request, InflateError> {
    let (mut parts, body) = req.into_parts();
    let compressed = Limited::new(body, MAX_BODY_BYTES)
        .collect()
        .await
        .map_err(|e| {
            if e.is::<LengthLimitError>() {
                InflateError::TooLarge
            } else {
                InflateError::Read(e.to_string())
            }
        })?
        .to_bytes();
    let inflated = gunzip(&compressed)?;

    parts.headers.remove(CONTENT_ENCODING);
    parts.headers.remove(CONTENT_LENGTH);
    Ok(Request::from_parts(parts, Body::from(inflated)))
}

async fn deflate_response(res: Response) -> Response {
    let (mut parts, body) = res.into_parts();

    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            error!("cannot read response body for compression: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let compressed = match gzip(&bytes) {
        Ok(compressed) => compressed,
        Err(e) => {
            error!("cannot compress response body: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    parts.headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    parts.headers.remove(CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(compressed))
}

fn gunzip(data: &[u8]) -> Result<Vec<u8>, InflateError> {
    let mut out = Vec::new();
    GzDecoder::new(data)
        .take(MAX_BODY_BYTES as u64 + 1)
        .read_to_end(&mut out)?;

    if out.len() > MAX_BODY_BYTES {
        return Err(InflateError::TooLarge);
    }
    Ok(out)
}

// finish() consumes the encoder; an early return drops it instead.
fn gzip(data: &Bytes) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2 + 32), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}
