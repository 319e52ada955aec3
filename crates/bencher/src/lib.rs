/// A path to resolve against a route table.
#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    path: &'static str,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, path: &'static str) -> Self {
        Self { name, group, path }
    }

    pub fn literal(name: &'static str, path: &'static str) -> Self {
        Self::new(name, TestGroup::Literal, path)
    }

    pub fn param(name: &'static str, path: &'static str) -> Self {
        Self::new(name, TestGroup::Param, path)
    }

    pub fn rest(name: &'static str, path: &'static str) -> Self {
        Self::new(name, TestGroup::Rest, path)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn path(&self) -> &'static str {
        self.path
    }

    /// Number of segments walked while resolving.
    pub fn depth(&self) -> usize {
        self.path.trim_end_matches('/').split('/').count().saturating_sub(1).max(1)
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Literal,
    Param,
    Rest,
}

/// A route table shaped like a small REST api with a static file fallback.
pub const ROUTES: [&str; 16] = [
    "/",
    "/health",
    "/api/v1/users",
    "/api/v1/users/:id",
    "/api/v1/users/:id/posts",
    "/api/v1/users/:id/posts/:post",
    "/api/v1/users/:id/posts/:post/comments",
    "/api/v1/posts",
    "/api/v1/posts/:post",
    "/api/v1/posts/:post/likes",
    "/api/v1/search",
    "/api/v2/users/:id",
    "/api/v2/users/:id/settings",
    "/files/:path...",
    "/manifest",
    "/manifest/:path...",
];

pub fn test_cases() -> Vec<TestCase> {
    vec![
        TestCase::literal("root", "/"),
        TestCase::literal("literal", "/api/v1/search"),
        TestCase::param("one_param", "/api/v1/users/42"),
        TestCase::param("two_params", "/api/v1/users/42/posts/7/comments"),
        TestCase::param("encoded_param", "/api/v1/posts/hello%20world"),
        TestCase::rest("rest", "/files/static/css/site/main.css"),
        TestCase::literal("miss", "/api/v3/unknown/path"),
    ]
}
