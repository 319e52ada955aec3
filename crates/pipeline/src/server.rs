//! HTTP server built around the filter chain.
//!
//! The [`ServerBuilder`] assembles the chain: the entry and route filters first, the
//! feature filters in registration order, the action and give-up filters last. The
//! [`Server`] then feeds every HTTP/1.1 request accepted on its address through the chain,
//! or runs single requests in-process with [`Server::handle`].

use crate::action::Action;
use crate::body::ResponseBody;
use crate::chain::{Filter, FilterChain};
use crate::config::{CorsOptions, ServerConfig};
use crate::context::RequestContext;
use crate::error::{ConfigError, HttpError};
use crate::filter::{ActionFilter, CorsPolicy, EntryFilter, GiveUpFilter, RouteFilter};
use crate::router::Router;
use bytes::Bytes;
use http::{Method, Request, Response};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use micro_pool::PoolError;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

const DEFAULT_ADDRESS: ([u8; 4], u16) = ([127, 0, 0, 1], 8080);

pub struct ServerBuilder {
    router: Router,
    filters: Vec<Box<dyn Filter>>,
    cors: Option<CorsOptions>,
    fallback: Option<Arc<dyn Action>>,
    address: Option<SocketAddr>,
}

impl ServerBuilder {
    fn new() -> Self {
        Self { router: Router::new(), filters: Vec::new(), cors: None, fallback: None, address: None }
    }

    pub fn address(mut self, address: SocketAddr) -> Self {
        self.address = Some(address);
        self
    }

    pub fn router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    /// Appends a feature filter, run after routing and before the route action.
    pub fn filter(mut self, filter: impl Filter + 'static) -> Self {
        self.filters.push(Box::new(filter));
        self
    }

    pub fn cors(mut self, cors: CorsOptions) -> Self {
        self.cors = Some(cors);
        self
    }

    /// Action answering requests nothing else answered, instead of the plain 404.
    pub fn fallback(mut self, action: impl Action + 'static) -> Self {
        self.fallback = Some(Arc::new(action));
        self
    }

    /// Takes address and CORS settings from `config`.
    pub fn config(mut self, config: &ServerConfig) -> Result<Self, ConfigError> {
        self.address = Some(config.socket_address()?);
        self.cors.clone_from(&config.cors);
        Ok(self)
    }

    pub fn build(self) -> Server {
        let route_filter = RouteFilter::new(Arc::new(self.router));

        let mut methods: Vec<Method> = route_filter.methods();
        for method in self.filters.iter().flat_map(|filter| filter.methods()) {
            if !methods.contains(&method) {
                methods.push(method);
            }
        }

        let entry = EntryFilter::new(methods, self.cors.as_ref().map(CorsPolicy::new));
        let allowed = entry.allowed_methods().to_vec();

        let mut filters: Vec<Box<dyn Filter>> = Vec::with_capacity(self.filters.len() + 4);
        filters.push(Box::new(entry));
        filters.push(Box::new(route_filter));
        filters.extend(self.filters);
        filters.push(Box::new(ActionFilter));
        filters.push(Box::new(match self.fallback {
            Some(fallback) => GiveUpFilter::with_fallback(fallback),
            None => GiveUpFilter::new(),
        }));

        Server {
            chain: FilterChain::new(filters),
            address: self.address.unwrap_or_else(|| SocketAddr::from(DEFAULT_ADDRESS)),
            allowed,
        }
    }
}

impl std::fmt::Debug for ServerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerBuilder").field("router", &self.router).field("filters", &self.filters.len()).finish_non_exhaustive()
    }
}

#[derive(Debug)]
pub struct Server {
    chain: FilterChain,
    address: SocketAddr,
    allowed: Vec<Method>,
}

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("can't bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pool(#[from] PoolError),
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Installs a global `fmt` subscriber at `level`; keeps the existing one if any.
    pub fn init_logging(level: Level) {
        let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            debug!("global subscriber already installed");
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Methods answered by the chain, `OPTIONS` included.
    pub fn allowed_methods(&self) -> &[Method] {
        &self.allowed
    }

    /// Runs one request through the chain, without any connection.
    pub async fn handle<B: Into<Bytes>>(&self, request: Request<B>, remote: Option<SocketAddr>) -> Response<ResponseBody> {
        let (parts, body) = request.into_parts();
        let mut ctx = RequestContext::new(parts, body.into(), remote);
        self.chain.run(&mut ctx).await
    }

    async fn serve(&self, request: Request<Incoming>, remote: SocketAddr) -> Result<Response<ResponseBody>, Infallible> {
        let (parts, body) = request.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(cause = %e, "can't read request body");
                return Ok(HttpError::bad_request().with_cause(e).into_response());
            }
        };
        let mut ctx = RequestContext::new(parts, body, Some(remote));
        Ok(self.chain.run(&mut ctx).await)
    }

    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Serves until `shutdown` resolves; connections already accepted are served to the end.
    pub async fn run_until<F: Future<Output = ()>>(self, shutdown: F) -> Result<(), ServerError> {
        let address = self.address;
        let tcp_listener =
            TcpListener::bind(address).await.map_err(|source| ServerError::Bind { address, source })?;
        info!(%address, methods = ?self.allowed, "start listening");

        let server = Arc::new(self);
        tokio::pin!(shutdown);
        loop {
            let (tcp_stream, remote_addr) = tokio::select! {
                () = &mut shutdown => {
                    info!("shutdown requested, stop accepting");
                    break;
                }
                accepted = tcp_listener.accept() => match accepted {
                    Ok(stream_and_addr) => stream_and_addr,
                    Err(e) => {
                        warn!(cause = %e, "failed to accept");
                        continue;
                    }
                },
            };

            let server = Arc::clone(&server);
            tokio::spawn(async move {
                let service = service_fn(move |request| {
                    let server = Arc::clone(&server);
                    async move { server.serve(request, remote_addr).await }
                });
                match http1::Builder::new().serve_connection(TokioIo::new(tcp_stream), service).await {
                    Ok(()) => debug!(remote = %remote_addr, "connection closed"),
                    Err(e) => error!(cause = %e, remote = %remote_addr, "connection failed"),
                }
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Server;
    use crate::action::action_fn;
    use crate::respond;
    use crate::router::Router;
    use http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use std::net::SocketAddr;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::oneshot;

    #[test]
    fn test_default_address() {
        let server = Server::builder().build();
        assert_eq!(server.address(), "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(server.allowed_methods(), [Method::OPTIONS]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_serves_over_tcp() {
        let mut router = Router::new();
        router.get("/ping", action_fn(|_ctx| Ok(respond::ok("pong")))).unwrap();

        // grab a free port
        let address = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let server = Server::builder().router(router).address(address).build();

        let (stop, stopped) = oneshot::channel::<()>();
        let running = tokio::spawn(server.run_until(async move {
            let _ = stopped.await;
        }));

        let mut stream = loop {
            match TcpStream::connect(address).await {
                Ok(stream) => break stream,
                Err(_) => tokio::time::sleep(std::time::Duration::from_millis(10)).await,
            }
        };
        stream.write_all(b"GET /ping HTTP/1.1\r\nhost: localhost\r\nconnection: close\r\n\r\n").await.unwrap();
        let mut raw = String::new();
        stream.read_to_string(&mut raw).await.unwrap();

        assert!(raw.starts_with("HTTP/1.1 200 OK"));
        assert!(raw.ends_with("pong"));

        stop.send(()).unwrap();
        running.await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn test_handle_in_process() {
        let mut router = Router::new();
        router.post("/echo", action_fn(|ctx| Ok(respond::ok(ctx.body().clone())))).unwrap();
        let server = Server::builder().router(router).build();

        let request = http::Request::post("/echo").body("hello").unwrap();
        let response = server.handle(request, None).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, "hello");
    }
}
