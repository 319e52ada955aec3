use crate::body::ResponseBody;
use crate::chain::{Filter, Next};
use crate::context::RequestContext;
use crate::router::Router;
use async_trait::async_trait;
use http::{Method, Response};
use std::sync::Arc;
use tracing::trace;

/// Resolves the request against the router and attaches the matching action and path
/// parameters to the context. Never answers by itself.
#[derive(Debug)]
pub struct RouteFilter {
    router: Arc<Router>,
}

impl RouteFilter {
    pub fn new(router: Arc<Router>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl Filter for RouteFilter {
    async fn run(&self, ctx: &mut RequestContext, next: Next<'_>) -> Response<ResponseBody> {
        if let Some((action, params)) = self.router.resolve(ctx.method(), ctx.path()) {
            trace!(path = ctx.path(), params = params.len(), "route resolved");
            ctx.set_action(action);
            ctx.set_path_params(params);
        }
        next.proceed(ctx).await
    }

    fn methods(&self) -> Vec<Method> {
        self.router.methods()
    }
}
