//! Per-request state shared by every filter of the chain.
//!
//! - [`RequestContext`]: request line, headers, raw body and everything filters attach to it
//!   (tracking id, remote address, path parameters, resolved action, parsed payload)
//! - [`PathParams`]: values bound by parametric route segments
//! - [`Payload`]: the request body as parsed by the body filter

use crate::action::Action;
use bytes::Bytes;
use http::request::Parts;
use http::{HeaderMap, Method, Uri, Version};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

/// Everything known about one in-flight request.
///
/// A context is created when the request arrives and dropped once its response is written,
/// it never outlives the request.
pub struct RequestContext {
    method: Method,
    uri: Uri,
    version: Version,
    headers: HeaderMap,
    body: Bytes,
    query: HashMap<String, String>,
    path_params: PathParams,
    arrived_at: Instant,
    tracking_id: Option<Uuid>,
    peer: Option<SocketAddr>,
    remote_address: Option<String>,
    action: Option<Arc<dyn Action>>,
    payload: Payload,
    response_headers: HeaderMap,
}

impl RequestContext {
    pub fn new(parts: Parts, body: Bytes, peer: Option<SocketAddr>) -> Self {
        let query = parts.uri.query().map(parse_query).unwrap_or_default();
        Self {
            method: parts.method,
            uri: parts.uri,
            version: parts.version,
            headers: parts.headers,
            body,
            query,
            path_params: PathParams::empty(),
            arrived_at: Instant::now(),
            tracking_id: None,
            peer,
            remote_address: peer.map(|addr| addr.ip().to_string()),
            action: None,
            payload: Payload::None,
            response_headers: HeaderMap::new(),
        }
    }

    /// Marks the arrival of the request and gives it a fresh tracking id.
    pub fn stamp(&mut self) -> Uuid {
        let id = Uuid::new_v4();
        self.arrived_at = Instant::now();
        self.tracking_id = Some(id);
        id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The request path, query excluded.
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Value of header `name` if present and visible ASCII.
    pub fn header(&self, name: impl http::header::AsHeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    pub fn path_params(&self) -> &PathParams {
        &self.path_params
    }

    pub fn set_path_params(&mut self, path_params: PathParams) {
        self.path_params = path_params;
    }

    pub fn elapsed(&self) -> Duration {
        self.arrived_at.elapsed()
    }

    pub fn tracking_id(&self) -> Option<Uuid> {
        self.tracking_id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Client address, the first `X-Forwarded-For` hop when behind a proxy.
    pub fn remote_address(&self) -> Option<&str> {
        self.remote_address.as_deref()
    }

    pub fn set_remote_address(&mut self, remote_address: String) {
        self.remote_address = Some(remote_address);
    }

    pub fn action(&self) -> Option<&Arc<dyn Action>> {
        self.action.as_ref()
    }

    pub fn set_action(&mut self, action: Arc<dyn Action>) {
        self.action = Some(action);
    }

    pub fn take_action(&mut self) -> Option<Arc<dyn Action>> {
        self.action.take()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn set_payload(&mut self, payload: Payload) {
        self.payload = payload;
    }

    /// Headers queued for the response, applied once the chain produced it.
    pub fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    pub fn response_headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.response_headers
    }
}

impl Debug for RequestContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("method", &self.method)
            .field("uri", &self.uri)
            .field("tracking_id", &self.tracking_id)
            .field("remote_address", &self.remote_address)
            .field("path_params", &self.path_params)
            .field("has_action", &self.action.is_some())
            .finish_non_exhaustive()
    }
}

fn parse_query(query: &str) -> HashMap<String, String> {
    serde_urlencoded::from_str::<Vec<(String, String)>>(query)
        .map(|pairs| pairs.into_iter().collect())
        .unwrap_or_else(|e| {
            debug!(cause = %e, query, "ignoring malformed query string");
            HashMap::new()
        })
}

/// Path parameters bound while resolving a route, e.g. `id` for `/users/:id`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    params: HashMap<String, String>,
}

impl PathParams {
    #[inline]
    pub fn empty() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[inline]
    pub fn get(&self, key: impl AsRef<str>) -> Option<&str> {
        self.params.get(key.as_ref()).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub(crate) fn insert(&mut self, key: String, value: String) {
        self.params.insert(key, value);
    }
}

/// The parsed request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Payload {
    #[default]
    None,
    Json(Value),
    Form(HashMap<String, String>),
}

impl Payload {
    pub fn is_none(&self) -> bool {
        matches!(self, Payload::None)
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_form(&self) -> Option<&HashMap<String, String>> {
        match self {
            Payload::Form(form) => Some(form),
            _ => None,
        }
    }
}
