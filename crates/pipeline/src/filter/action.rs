use crate::body::ResponseBody;
use crate::chain::{Filter, Next};
use crate::context::RequestContext;
use async_trait::async_trait;
use http::Response;
use tracing::{error, warn};

/// Invokes the action attached by the router, or by a feature filter, and renders its
/// failure as an error payload. Proceeds when no action is attached.
#[derive(Debug, Default)]
pub struct ActionFilter;

#[async_trait]
impl Filter for ActionFilter {
    async fn run(&self, ctx: &mut RequestContext, next: Next<'_>) -> Response<ResponseBody> {
        let Some(action) = ctx.take_action() else {
            return next.proceed(ctx).await;
        };

        match action.invoke(ctx).await {
            Ok(response) => response,
            Err(e) => {
                if e.status_code().is_server_error() {
                    error!(cause = %e, path = ctx.path(), "action failed");
                } else {
                    warn!(cause = %e, path = ctx.path(), "action rejected request");
                }
                e.into_response()
            }
        }
    }
}
