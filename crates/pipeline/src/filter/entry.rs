use crate::body::ResponseBody;
use crate::chain::{Filter, Next};
use crate::config::CorsOptions;
use crate::context::RequestContext;
use crate::error::HttpError;
use crate::respond;
use async_trait::async_trait;
use http::header::{
    ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW, ORIGIN, REFERER, VARY,
};
use http::{HeaderMap, HeaderName, HeaderValue, Method, Response, StatusCode, Version};
use tracing::{debug, warn};
use url::Url;

const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const ANY_ORIGIN: [&str; 2] = ["*", "any"];

/// Decides which cross-origin callers may use the responses.
///
/// An origin is allowed when the policy allows any origin, or when its hostname equals one
/// of the allowed hosts or is a subdomain of one.
#[derive(Debug, Clone)]
pub struct CorsPolicy {
    any: bool,
    hosts: Vec<String>,
    headers: Option<HeaderValue>,
    allow_credentials: bool,
}

impl CorsPolicy {
    pub fn new(options: &CorsOptions) -> Self {
        let any = options.origins.iter().any(|origin| ANY_ORIGIN.contains(&origin.trim()));
        let hosts = options.origins.iter().map(|origin| origin.trim().to_ascii_lowercase()).collect();
        let headers = if options.headers.is_empty() {
            None
        } else {
            HeaderValue::from_str(&options.headers.join(", "))
                .inspect_err(|e| warn!(cause = %e, "ignoring invalid cors headers"))
                .ok()
        };
        Self { any, hosts, headers, allow_credentials: options.allow_credentials }
    }

    /// The serialized origin of the caller, when it is allowed.
    ///
    /// The origin is taken from `Origin`, falling back to `Referer`.
    pub fn allowed_origin(&self, headers: &HeaderMap) -> Option<String> {
        let raw = headers.get(ORIGIN).or_else(|| headers.get(REFERER))?.to_str().ok()?;
        let url = Url::parse(raw).ok()?;
        let host = url.host_str()?.to_ascii_lowercase();

        let allowed = self.any
            || self.hosts.iter().any(|allowed| {
                host == *allowed || host.strip_suffix(allowed.as_str()).is_some_and(|prefix| prefix.ends_with('.'))
            });
        if allowed { Some(url.origin().ascii_serialization()) } else { None }
    }

    fn apply(&self, origin: &str, allow: &HeaderValue, headers: &mut HeaderMap) {
        let Ok(origin) = HeaderValue::from_str(origin) else {
            return;
        };
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.insert(ACCESS_CONTROL_ALLOW_METHODS, allow.clone());
        if let Some(allowed_headers) = &self.headers {
            headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, allowed_headers.clone());
        }
        if self.allow_credentials {
            headers.insert(ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
        }
        headers.append(VARY, HeaderValue::from_static("Origin"));
    }
}

/// First filter of every chain.
///
/// - rejects everything but HTTP/1.1 with 400
/// - stamps arrival time and tracking id, records the client address
/// - applies the CORS policy
/// - answers `OPTIONS` with the allowed methods, and unknown methods with 405
/// - logs every response once the rest of the chain produced it
#[derive(Debug)]
pub struct EntryFilter {
    methods: Vec<Method>,
    allow: HeaderValue,
    cors: Option<CorsPolicy>,
}

impl EntryFilter {
    /// `methods` are the methods the chain answers; `OPTIONS` is always allowed.
    pub fn new(methods: Vec<Method>, cors: Option<CorsPolicy>) -> Self {
        let mut allowed = vec![Method::OPTIONS];
        for method in methods {
            if !allowed.contains(&method) {
                allowed.push(method);
            }
        }
        let allow = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
        let allow = HeaderValue::from_str(&allow).unwrap_or_else(|_invalid| HeaderValue::from_static("OPTIONS"));
        Self { methods: allowed, allow, cors }
    }

    pub fn allowed_methods(&self) -> &[Method] {
        &self.methods
    }

    async fn answer(&self, ctx: &mut RequestContext, next: Next<'_>) -> Response<ResponseBody> {
        if ctx.version() != Version::HTTP_11 {
            debug!(version = ?ctx.version(), "unsupported http version");
            return HttpError::new(StatusCode::BAD_REQUEST, "HTTP/1.1 only").into_response();
        }

        if *ctx.method() == Method::OPTIONS {
            let mut response = respond::ok(());
            response.headers_mut().insert(ALLOW, self.allow.clone());
            return response;
        }

        if !self.methods.contains(ctx.method()) {
            let mut response = HttpError::method_not_allowed().into_response();
            response.headers_mut().insert(ALLOW, self.allow.clone());
            return response;
        }

        next.proceed(ctx).await
    }
}

#[async_trait]
impl Filter for EntryFilter {
    async fn run(&self, ctx: &mut RequestContext, next: Next<'_>) -> Response<ResponseBody> {
        ctx.stamp();
        if let Some(forwarded) = ctx.header(X_FORWARDED_FOR).and_then(|value| value.split(',').next()) {
            let forwarded = forwarded.trim().to_owned();
            if !forwarded.is_empty() {
                ctx.set_remote_address(forwarded);
            }
        }

        if let Some(cors) = &self.cors
            && let Some(origin) = cors.allowed_origin(ctx.headers())
        {
            cors.apply(&origin, &self.allow, ctx.response_headers_mut());
        }

        let mut response = self.answer(ctx, next).await;
        for (name, value) in ctx.response_headers() {
            response.headers_mut().append(name, value.clone());
        }

        debug!(
            elapsed_ms = ctx.elapsed().as_millis(),
            method = %ctx.method(),
            status = response.status().as_u16(),
            path = ctx.path(),
            tracking_id = ?ctx.tracking_id(),
            remote = ctx.remote_address(),
            "request answered"
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::CorsPolicy;
    use crate::config::CorsOptions;
    use http::{HeaderMap, HeaderValue};

    fn headers(name: &'static str, value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_static(value));
        headers
    }

    fn policy(origins: &[&str]) -> CorsPolicy {
        CorsPolicy::new(&CorsOptions {
            origins: origins.iter().map(ToString::to_string).collect(),
            headers: vec!["content-type".into(), "authorization".into()],
            allow_credentials: true,
        })
    }

    #[test]
    fn test_any_origin() {
        let policy = policy(&["any"]);
        let origin = policy.allowed_origin(&headers("origin", "https://whatever.io:8443"));
        assert_eq!(origin.as_deref(), Some("https://whatever.io:8443"));
    }

    #[test]
    fn test_exact_and_subdomain_origins() {
        let policy = policy(&["example.com"]);

        assert_eq!(policy.allowed_origin(&headers("origin", "https://example.com")).as_deref(), Some("https://example.com"));
        assert_eq!(
            policy.allowed_origin(&headers("origin", "http://api.example.com")).as_deref(),
            Some("http://api.example.com")
        );
        assert!(policy.allowed_origin(&headers("origin", "https://badexample.com")).is_none());
        assert!(policy.allowed_origin(&headers("origin", "https://example.com.evil.io")).is_none());
    }

    #[test]
    fn test_referer_fallback() {
        let policy = policy(&["example.com"]);
        let origin = policy.allowed_origin(&headers("referer", "https://www.example.com/some/page?x=1"));
        assert_eq!(origin.as_deref(), Some("https://www.example.com"));

        assert!(policy.allowed_origin(&HeaderMap::new()).is_none());
        assert!(policy.allowed_origin(&headers("origin", "not a url")).is_none());
    }
}
