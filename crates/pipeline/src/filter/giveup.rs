use crate::action::Action;
use crate::body::ResponseBody;
use crate::chain::{Filter, Next};
use crate::context::RequestContext;
use crate::error::HttpError;
use async_trait::async_trait;
use http::Response;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use tracing::debug;

/// Last filter of every chain: nothing answered the request so far.
///
/// Answers 404, or hands the request to the configured fallback action.
#[derive(Default)]
pub struct GiveUpFilter {
    fallback: Option<Arc<dyn Action>>,
}

impl GiveUpFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fallback(fallback: Arc<dyn Action>) -> Self {
        Self { fallback: Some(fallback) }
    }
}

#[async_trait]
impl Filter for GiveUpFilter {
    async fn run(&self, ctx: &mut RequestContext, _next: Next<'_>) -> Response<ResponseBody> {
        debug!(method = %ctx.method(), path = ctx.path(), "no filter answered the request");
        match &self.fallback {
            Some(fallback) => fallback.invoke(ctx).await.unwrap_or_else(HttpError::into_response),
            None => HttpError::not_found().into_response(),
        }
    }
}

impl Debug for GiveUpFilter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GiveUpFilter").field("fallback", &self.fallback.is_some()).finish()
    }
}
