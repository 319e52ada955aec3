use crate::body::ResponseBody;
use crate::context::RequestContext;
use crate::error::HttpError;
use async_trait::async_trait;
use http::Response;
use std::marker::PhantomData;
use std::sync::Arc;

pub type ActionResult = Result<Response<ResponseBody>, HttpError>;

/// The terminal handler of a route.
///
/// The router attaches the resolved action to the request context, the action filter
/// invokes it. Failures are rendered through [`HttpError::into_response`].
#[async_trait]
pub trait Action: Send + Sync {
    async fn invoke(&self, ctx: &RequestContext) -> ActionResult;
}

#[async_trait]
impl<A: Action + ?Sized> Action for Arc<A> {
    async fn invoke(&self, ctx: &RequestContext) -> ActionResult {
        (**self).invoke(ctx).await
    }
}

#[async_trait]
impl<A: Action + ?Sized> Action for Box<A> {
    async fn invoke(&self, ctx: &RequestContext) -> ActionResult {
        (**self).invoke(ctx).await
    }
}

/// A synchronous closure used as action.
pub struct FnAction<F, R> {
    f: F,
    _phantom: PhantomData<fn() -> R>,
}

/// Turns `Fn(&RequestContext) -> Result<R, HttpError>` into an [`Action`], where `R` is any
/// body the response can be built from.
///
/// ```
/// use micro_pipeline::{action_fn, respond};
///
/// let hello = action_fn(|ctx| Ok(respond::ok(format!("hello {}", ctx.path()))));
/// ```
pub fn action_fn<F, R>(f: F) -> FnAction<F, R>
where
    F: Fn(&RequestContext) -> Result<Response<R>, HttpError> + Send + Sync,
    R: Into<ResponseBody>,
{
    FnAction { f, _phantom: PhantomData }
}

#[async_trait]
impl<F, R> Action for FnAction<F, R>
where
    F: Fn(&RequestContext) -> Result<Response<R>, HttpError> + Send + Sync,
    R: Into<ResponseBody>,
{
    async fn invoke(&self, ctx: &RequestContext) -> ActionResult {
        (self.f)(ctx).map(|response| response.map(Into::into))
    }
}

impl<F, R> std::fmt::Debug for FnAction<F, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnAction")
    }
}

#[cfg(test)]
mod tests {
    use super::{action_fn, Action};
    use crate::context::RequestContext;
    use crate::error::HttpError;
    use crate::respond;
    use bytes::Bytes;
    use http::{Request, StatusCode};
    use std::sync::Arc;

    fn assert_is_action<T: Action>(_action: &T) {
        // no op
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_fn_action() {
        let action = action_fn(|ctx| Ok(respond::ok(ctx.path().to_owned())));
        assert_is_action(&action);

        let (parts, ()) = Request::get("/greeting").body(()).unwrap().into_parts();
        let ctx = RequestContext::new(parts, Bytes::new(), None);

        let response = action.invoke(&ctx).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().len(), "/greeting".len());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_shared_action() {
        let action: Arc<dyn Action> = Arc::new(action_fn(|_ctx| Err::<http::Response<()>, _>(HttpError::not_found())));
        assert_is_action(&action);

        let (parts, ()) = Request::get("/").body(()).unwrap().into_parts();
        let ctx = RequestContext::new(parts, Bytes::new(), None);

        let error = action.invoke(&ctx).await.unwrap_err();
        assert_eq!(error.status_code(), StatusCode::NOT_FOUND);
    }
}
