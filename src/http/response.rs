//! HTTP response building module
//!
//! Provides builders for the status codes the server answers with, decoupled from the archive logic.

use hyper::header::{ALLOW, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Response, StatusCode};

use super::body::{empty, full, ResponseBody};

pub const ZIP_CONTENT_TYPE: &str = "application/zip";
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
const ALLOWED_METHODS: &str = "GET, HEAD, OPTIONS";

/// Build a plain-text error response carrying `message` as the body
pub fn build_error_response(status: StatusCode, message: &str) -> Response<ResponseBody> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, TEXT_CONTENT_TYPE)
        .header(CONTENT_LENGTH, message.len())
        .body(full(message.to_string()))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            fallback(status)
        })
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<ResponseBody> {
    build_error_response(StatusCode::NOT_FOUND, "404 Not Found")
}

/// Build 405 Method Not Allowed response
pub fn build_405_response() -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header(CONTENT_TYPE, TEXT_CONTENT_TYPE)
        .header(ALLOW, ALLOWED_METHODS)
        .body(full("405 Method Not Allowed"))
        .unwrap_or_else(|e| {
            log_build_error("405", &e);
            fallback(StatusCode::METHOD_NOT_ALLOWED)
        })
}

/// Build 413 Payload Too Large response
pub fn build_413_response() -> Response<ResponseBody> {
    build_error_response(StatusCode::PAYLOAD_TOO_LARGE, "413 Payload Too Large")
}

/// Build OPTIONS response (preflight request)
pub fn build_options_response(enable_cors: bool) -> Response<ResponseBody> {
    let mut builder = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(ALLOW, ALLOWED_METHODS);

    if enable_cors {
        builder = builder
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", ALLOWED_METHODS)
            .header("Access-Control-Allow-Headers", "Content-Type")
            .header("Access-Control-Expose-Headers", "Content-Disposition")
            .header("Access-Control-Max-Age", "86400");
    }

    builder.body(empty()).unwrap_or_else(|e| {
        log_build_error("OPTIONS", &e);
        fallback(StatusCode::NO_CONTENT)
    })
}

/// Build health check response (for liveness/readiness probes)
pub fn build_health_response(status: &str) -> Response<ResponseBody> {
    let body = serde_json::json!({ "status": status }).to_string();
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "application/json")
        .header(CONTENT_LENGTH, body.len())
        .header("Cache-Control", "no-cache, no-store")
        .body(full(body))
        .unwrap_or_else(|e| {
            log_build_error("health", &e);
            fallback(StatusCode::OK)
        })
}

/// Build a successful archive response.
///
/// `content_length` is known only when the archive was built up front;
/// streamed archives go out chunked.
pub fn build_zip_response(
    body: ResponseBody,
    download_name: &str,
    content_length: Option<u64>,
) -> Response<ResponseBody> {
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, ZIP_CONTENT_TYPE)
        .header(CONTENT_DISPOSITION, content_disposition(download_name))
        .header("Cache-Control", "no-store");
    if let Some(len) = content_length {
        builder = builder.header(CONTENT_LENGTH, len);
    }

    builder.body(body).unwrap_or_else(|e| {
        log_build_error("200", &e);
        fallback(StatusCode::INTERNAL_SERVER_ERROR)
    })
}

fn content_disposition(download_name: &str) -> String {
    let name: String = download_name
        .chars()
        .filter(|c| *c != '"' && *c != '\\' && !c.is_control())
        .collect();
    format!("attachment; filename=\"{name}\"")
}

fn fallback(status: StatusCode) -> Response<ResponseBody> {
    let mut response = Response::new(empty());
    *response.status_mut() = status;
    response
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
