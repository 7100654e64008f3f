// src/server/response.rs
use hyper::header::{HeaderValue, CONTENT_TYPE, LOCATION};
use hyper::{Body, Response, StatusCode};
use serde::Serialize;

/// Serialize `body` as a newline-terminated JSON document.
pub fn json<T: Serialize>(status: StatusCode, body: &T) -> Response<Body> {
    match serde_json::to_vec(body) {
        Ok(mut bytes) => {
            bytes.push(b'\n');
            with_content_type(status, Body::from(bytes), "application/json")
        }
        Err(e) => {
            tracing::error!("Failed to serialize response body: {}", e);
            text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
        }
    }
}

/// Pre-rendered JSON, sent as is.
pub fn raw_json(status: StatusCode, body: &'static str) -> Response<Body> {
    with_content_type(status, Body::from(body), "application/json")
}

pub fn text(status: StatusCode, message: &str) -> Response<Body> {
    with_content_type(status, Body::from(format!("{}\n", message)), "text/plain; charset=utf-8")
}

pub fn moved_permanently(location: &str) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::MOVED_PERMANENTLY;
    match HeaderValue::from_str(location) {
        Ok(value) => {
            response.headers_mut().insert(LOCATION, value);
            response
        }
        Err(_) => text(StatusCode::BAD_REQUEST, "Bad Request"),
    }
}

fn with_content_type(status: StatusCode, body: Body, content_type: &'static str) -> Response<Body> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}
