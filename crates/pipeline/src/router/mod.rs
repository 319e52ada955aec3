//! Method and path based routing.
//!
//! Routes are kept in one trie per HTTP method. Every node holds its literal children
//! (`users`) in a map and its parametric children apart: `:id` binds one segment, `:path...`
//! binds the rest of the path, trailing `/` included, and must be the last segment of its
//! route.
//!
//! Resolution prefers literal children. When no literal matches, the single parametric
//! child of the node binds the segment. A node with several parametric children is
//! ambiguous, the route can't be decided and resolution fails with an error log.
//!
//! # Example
//!
//! ```
//! use micro_pipeline::{action_fn, respond, Router};
//!
//! # fn main() -> Result<(), micro_pipeline::ConfigError> {
//! let mut router = Router::new();
//! router.get("/users/:id", action_fn(|ctx| Ok(respond::ok(ctx.path_params().get("id").unwrap_or_default().to_owned()))))?;
//!
//! let (_action, params) = router.resolve(&http::Method::GET, "/users/42").unwrap();
//! assert_eq!(params.get("id"), Some("42"));
//! # Ok(())
//! # }
//! ```

mod segment;

use crate::action::Action;
use crate::context::PathParams;
use crate::error::ConfigError;
use http::Method;
use segment::{remainder, segments, SegmentKind};
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;
use tracing::{debug, error};

#[derive(Default)]
struct Node {
    children: HashMap<String, Node>,
    /// Parametric children, kept apart so a literal miss never scans the literal siblings.
    params: Vec<(String, Node)>,
    action: Option<Arc<dyn Action>>,
}

impl Node {
    fn child_mut(&mut self, key: &str) -> &mut Node {
        if !SegmentKind::is_parametric(key) {
            return self.children.entry(key.to_owned()).or_default();
        }
        let index = match self.params.iter().position(|(existing, _)| existing == key) {
            Some(index) => index,
            None => {
                self.params.push((key.to_owned(), Node::default()));
                self.params.len() - 1
            }
        };
        &mut self.params[index].1
    }
}

/// A resolved route: the action and the parameters bound on the way.
pub type RouteMatch = (Arc<dyn Action>, PathParams);

#[derive(Default)]
pub struct Router {
    roots: HashMap<Method, Node>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `action` for `method` and `path`; registering the same route twice replaces
    /// the former action.
    ///
    /// The method is case-insensitive. Fails when the method is blank or not a valid
    /// method token, when the path is empty or doesn't start with `/`, or when a rest
    /// segment is not the last one.
    pub fn register<A: Action + 'static>(&mut self, method: &str, path: &str, action: A) -> Result<&mut Self, ConfigError> {
        let method = method.trim();
        if method.is_empty() {
            return Err(ConfigError::MissingMethod);
        }
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|_invalid| ConfigError::invalid_method(method))?;
        self.route(method, path, action)
    }

    /// Same as [`Router::register`] with an already parsed method.
    pub fn route<A: Action + 'static>(&mut self, method: Method, path: &str, action: A) -> Result<&mut Self, ConfigError> {
        if path.is_empty() {
            return Err(ConfigError::MissingPath);
        }
        if !path.starts_with('/') {
            return Err(ConfigError::path_without_separator(path));
        }

        let keys = segments(path);
        if let Some((position, key)) =
            keys.iter().enumerate().find(|(_, key)| matches!(SegmentKind::of(key), SegmentKind::Rest(_)))
            && position + 1 != keys.len()
        {
            return Err(ConfigError::rest_not_last(*key, path));
        }

        let mut node = self.roots.entry(method.clone()).or_default();
        for key in keys {
            node = node.child_mut(key);
        }
        if node.action.replace(Arc::new(action)).is_some() {
            debug!(%method, path, "route registered again, former action replaced");
        }
        Ok(self)
    }

    pub fn get<A: Action + 'static>(&mut self, path: &str, action: A) -> Result<&mut Self, ConfigError> {
        self.route(Method::GET, path, action)
    }

    pub fn head<A: Action + 'static>(&mut self, path: &str, action: A) -> Result<&mut Self, ConfigError> {
        self.route(Method::HEAD, path, action)
    }

    pub fn post<A: Action + 'static>(&mut self, path: &str, action: A) -> Result<&mut Self, ConfigError> {
        self.route(Method::POST, path, action)
    }

    pub fn put<A: Action + 'static>(&mut self, path: &str, action: A) -> Result<&mut Self, ConfigError> {
        self.route(Method::PUT, path, action)
    }

    pub fn delete<A: Action + 'static>(&mut self, path: &str, action: A) -> Result<&mut Self, ConfigError> {
        self.route(Method::DELETE, path, action)
    }

    /// Every method at least one route was registered for.
    pub fn methods(&self) -> Vec<Method> {
        let mut methods = self.roots.keys().cloned().collect::<Vec<_>>();
        methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        methods
    }

    /// Finds the action registered for `method` and `path`, query ignored.
    ///
    /// Takes one step per path segment. Returns `None` when nothing matches, including
    /// ambiguous parametric siblings and segments that are not valid percent-encoded UTF-8.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        let mut node = self.roots.get(method)?;
        let mut params = PathParams::empty();

        let segments = segments(path);
        for (position, segment) in segments.iter().enumerate() {
            if let Some(child) = node.children.get(*segment) {
                node = child;
                continue;
            }

            let (key, child) = match node.params.as_slice() {
                [] => {
                    debug!(%method, path, "no route for path");
                    return None;
                }
                [(key, child)] => (key, child),
                [(first, _), (second, _), ..] => {
                    error!(%method, path, %first, %second, "ambiguous route, parametric siblings compete for the same segment");
                    return None;
                }
            };

            match SegmentKind::of(key) {
                SegmentKind::Rest(name) => {
                    params.insert(name.to_owned(), decode(remainder(path, position), path)?);
                    node = child;
                    break;
                }
                SegmentKind::Param(name) => {
                    params.insert(name.to_owned(), decode(segment, path)?);
                    node = child;
                }
                SegmentKind::Literal(_) => return None,
            }
        }

        match &node.action {
            Some(action) => Some((Arc::clone(action), params)),
            None => {
                debug!(%method, path, "path ends on a route prefix without action");
                None
            }
        }
    }
}

fn decode(raw: &str, path: &str) -> Option<String> {
    match urlencoding::decode(raw) {
        Ok(decoded) => Some(decoded.into_owned()),
        Err(e) => {
            debug!(cause = %e, path, "path segment is not valid percent-encoded utf-8");
            None
        }
    }
}

impl Debug for Router {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router").field("methods", &self.methods()).finish()
    }
}
