use crate::body::ResponseBody;
use crate::chain::{Filter, Next};
use crate::context::{Payload, RequestContext};
use crate::error::HttpError;
use async_trait::async_trait;
use http::header::CONTENT_TYPE;
use http::{Method, Response};
use mime::Mime;
use std::collections::HashMap;
use tracing::debug;

/// Parses `application/json` and `application/x-www-form-urlencoded` request bodies of
/// `POST`, `PUT` and `DELETE` requests into the context [`Payload`].
///
/// Malformed bodies are answered with 400, other content types leave the payload empty.
#[derive(Debug, Default)]
pub struct BodyFilter;

impl BodyFilter {
    fn parse(ctx: &RequestContext) -> Result<Payload, HttpError> {
        if !matches!(*ctx.method(), Method::POST | Method::PUT | Method::DELETE) || ctx.body().is_empty() {
            return Ok(Payload::None);
        }
        let Some(mime) = ctx.header(CONTENT_TYPE).and_then(|value| value.parse::<Mime>().ok()) else {
            return Ok(Payload::None);
        };

        match mime.essence_str() {
            "application/json" => serde_json::from_slice(ctx.body())
                .map(Payload::Json)
                .map_err(|e| HttpError::bad_request().with_cause(e)),
            "application/x-www-form-urlencoded" => serde_urlencoded::from_bytes::<HashMap<String, String>>(ctx.body())
                .map(Payload::Form)
                .map_err(|e| HttpError::bad_request().with_cause(e)),
            _ => {
                debug!(%mime, "body left unparsed");
                Ok(Payload::None)
            }
        }
    }
}

#[async_trait]
impl Filter for BodyFilter {
    async fn run(&self, ctx: &mut RequestContext, next: Next<'_>) -> Response<ResponseBody> {
        match Self::parse(ctx) {
            Ok(payload) => {
                ctx.set_payload(payload);
                next.proceed(ctx).await
            }
            Err(e) => {
                debug!(cause = %e, path = ctx.path(), "malformed request body");
                e.into_response()
            }
        }
    }
}
