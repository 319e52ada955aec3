//! An HTTP request pipeline built from an ordered chain of filters.
//!
//! Every request runs through the same chain:
//!
//! 1. [`filter::EntryFilter`]: protocol checks, tracking id, CORS, `OPTIONS` and 405 answers
//! 2. [`filter::RouteFilter`]: resolves the [`Router`] and attaches the route [`Action`]
//! 3. feature filters, e.g. [`filter::BodyFilter`] or the static asset [`assets::StaticFilter`]
//! 4. [`filter::ActionFilter`]: invokes the attached action
//! 5. [`filter::GiveUpFilter`]: 404, or the configured fallback
//!
//! Each filter decides whether the rest of the chain runs, see [`Filter`] and [`Next`].
//!
//! # Example
//!
//! ```no_run
//! use micro_pipeline::filter::BodyFilter;
//! use micro_pipeline::{action_fn, respond, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut router = Router::new();
//!     router.get("/hello/:name", action_fn(|ctx| {
//!         Ok(respond::ok(format!("hello {}", ctx.path_params().get("name").unwrap_or("world"))))
//!     }))?;
//!
//!     Server::init_logging(tracing::Level::INFO);
//!     Server::builder()
//!         .router(router)
//!         .filter(BodyFilter)
//!         .address("127.0.0.1:8080".parse()?)
//!         .build()
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```

mod action;
mod body;
mod chain;
mod config;
mod context;
mod error;
mod server;

pub mod assets;
pub mod filter;
pub mod respond;
pub mod router;

pub use action::action_fn;
pub use action::Action;
pub use action::ActionResult;
pub use action::FnAction;
pub use body::ResponseBody;
pub use chain::Filter;
pub use chain::FilterChain;
pub use chain::Next;
pub use config::CorsOptions;
pub use config::PoolConfig;
pub use config::ServerConfig;
pub use context::PathParams;
pub use context::Payload;
pub use context::RequestContext;
pub use error::AssetError;
pub use error::ConfigError;
pub use error::HttpError;
pub use router::Router;
pub use server::Server;
pub use server::ServerBuilder;
pub use server::ServerError;

pub use micro_pool as pool;
