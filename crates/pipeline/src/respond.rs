//! Small helpers to build the responses filters and actions return.

use crate::body::ResponseBody;
use http::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use http::{Response, StatusCode};
use serde::Serialize;
use tracing::error;

const JSON_UTF_8: &str = "application/json; charset=utf-8";

/// Builds a response with `status` and `body`, declaring its length.
pub fn respond(status: StatusCode, body: impl Into<ResponseBody>) -> Response<ResponseBody> {
    let body = body.into();
    let mut response = Response::new(ResponseBody::empty());
    *response.status_mut() = status;
    if !body.is_empty() {
        response.headers_mut().insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    }
    *response.body_mut() = body;
    response
}

pub fn ok(body: impl Into<ResponseBody>) -> Response<ResponseBody> {
    respond(StatusCode::OK, body)
}

pub fn no_content() -> Response<ResponseBody> {
    respond(StatusCode::NO_CONTENT, ResponseBody::empty())
}

pub fn not_modified() -> Response<ResponseBody> {
    respond(StatusCode::NOT_MODIFIED, ResponseBody::empty())
}

/// Temporary redirect to `location`, falls back to 500 if it is not a valid header value.
pub fn forward(location: &str) -> Response<ResponseBody> {
    let mut response = respond(StatusCode::TEMPORARY_REDIRECT, ResponseBody::empty());
    match HeaderValue::from_str(location) {
        Ok(value) => {
            response.headers_mut().insert(LOCATION, value);
        }
        Err(e) => {
            error!(cause = %e, location, "invalid redirect location");
            *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        }
    }
    response
}

/// Serializes `value` as the json body.
pub fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Response<ResponseBody> {
    match serde_json::to_vec(value) {
        Ok(bytes) => {
            let mut response = respond(status, bytes);
            response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(JSON_UTF_8));
            response
        }
        Err(e) => {
            error!(cause = %e, "can't serialize json response");
            respond(StatusCode::INTERNAL_SERVER_ERROR, ResponseBody::empty())
        }
    }
}
