//! The filter chain execution engine.
//!
//! A [`FilterChain`] is an ordered list of [`Filter`]s. Running it hands the request context
//! to the first filter together with a [`Next`] continuation; every filter either answers
//! the request itself or calls [`Next::proceed`] to let the following filter run. A filter
//! that does not proceed short-circuits the chain and its response is the only one
//! produced.
//!
//! ```
//! use async_trait::async_trait;
//! use http::Response;
//! use micro_pipeline::{Filter, Next, RequestContext, ResponseBody};
//!
//! struct PoweredBy;
//!
//! #[async_trait]
//! impl Filter for PoweredBy {
//!     async fn run(&self, ctx: &mut RequestContext, next: Next<'_>) -> Response<ResponseBody> {
//!         let mut response = next.proceed(ctx).await;
//!         response.headers_mut().insert("x-powered-by", http::HeaderValue::from_static("micro"));
//!         response
//!     }
//! }
//! ```

use crate::body::ResponseBody;
use crate::context::RequestContext;
use crate::error::HttpError;
use async_trait::async_trait;
use http::{Method, Response};
use std::fmt::{Debug, Formatter};
use tracing::error;

/// One step of the request pipeline.
///
/// Filters are configured once, before the chain is assembled, and are shared by every
/// request afterwards, hence `Send + Sync` and `&self`.
#[async_trait]
pub trait Filter: Send + Sync {
    async fn run(&self, ctx: &mut RequestContext, next: Next<'_>) -> Response<ResponseBody>;

    /// Methods this filter can answer on its own, advertised in `Allow`.
    fn methods(&self) -> Vec<Method> {
        Vec::new()
    }
}

/// Continuation handed to a filter: the rest of the chain.
pub struct Next<'chain> {
    filters: &'chain [Box<dyn Filter>],
    index: usize,
}

impl<'chain> Next<'chain> {
    fn new(filters: &'chain [Box<dyn Filter>]) -> Self {
        Self { filters, index: 0 }
    }

    /// Runs the next filter.
    ///
    /// Proceeding past the last filter means the chain has no filter answering every
    /// request, it is reported as an internal error instead of panicking.
    pub async fn proceed(self, ctx: &mut RequestContext) -> Response<ResponseBody> {
        match self.filters.get(self.index) {
            Some(filter) => {
                let next = Next { filters: self.filters, index: self.index + 1 };
                filter.run(ctx, next).await
            }
            None => {
                error!(path = ctx.path(), filters = self.filters.len(), "filter chain exhausted without a response");
                HttpError::internal("filter chain exhausted").into_response()
            }
        }
    }
}

impl Debug for Next<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next").field("index", &self.index).field("len", &self.filters.len()).finish()
    }
}

/// Owns the filters and runs them in order.
pub struct FilterChain {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterChain {
    pub fn new(filters: Vec<Box<dyn Filter>>) -> Self {
        Self { filters }
    }

    /// Every method declared by the filters, in chain order, without duplicates.
    pub fn methods(&self) -> Vec<Method> {
        let mut methods = Vec::new();
        for method in self.filters.iter().flat_map(|filter| filter.methods()) {
            if !methods.contains(&method) {
                methods.push(method);
            }
        }
        methods
    }

    pub async fn run(&self, ctx: &mut RequestContext) -> Response<ResponseBody> {
        Next::new(&self.filters).proceed(ctx).await
    }
}

impl Debug for FilterChain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterChain").field("len", &self.filters.len()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::{Filter, FilterChain, Next};
    use crate::body::ResponseBody;
    use crate::context::RequestContext;
    use crate::respond;
    use async_trait::async_trait;
    use bytes::Bytes;
    use http::{Method, Request, Response, StatusCode};
    use std::sync::{Arc, Mutex};

    struct Recording {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        answer: bool,
    }

    #[async_trait]
    impl Filter for Recording {
        async fn run(&self, ctx: &mut RequestContext, next: Next<'_>) -> Response<ResponseBody> {
            self.log.lock().unwrap().push(self.name);
            if self.answer { respond::ok(self.name) } else { next.proceed(ctx).await }
        }

        fn methods(&self) -> Vec<Method> {
            vec![Method::GET, Method::HEAD]
        }
    }

    fn recording(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>, answer: bool) -> Box<dyn Filter> {
        Box::new(Recording { name, log: Arc::clone(log), answer })
    }

    fn context() -> RequestContext {
        let (parts, ()) = Request::get("/").body(()).unwrap().into_parts();
        RequestContext::new(parts, Bytes::new(), None)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_filters_run_in_order_and_short_circuit() {
        let log = Arc::new(Mutex::new(vec![]));
        let chain = FilterChain::new(vec![
            recording("first", &log, false),
            recording("second", &log, true),
            recording("third", &log, false),
        ]);

        let response = chain.run(&mut context()).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_exhausted_chain_is_internal_error() {
        let log = Arc::new(Mutex::new(vec![]));
        let chain = FilterChain::new(vec![recording("only", &log, false)]);

        let response = chain.run(&mut context()).await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(*log.lock().unwrap(), vec!["only"]);
    }

    #[test]
    fn test_methods_are_deduplicated() {
        let log = Arc::new(Mutex::new(vec![]));
        let chain = FilterChain::new(vec![recording("a", &log, false), recording("b", &log, false)]);
        assert_eq!(chain.methods(), vec![Method::GET, Method::HEAD]);
    }
}
