/// Cuts a request path into its segments, query excluded.
///
/// Each segment is returned without its leading `/`. A trailing lone `/` is ignored, so
/// `/a/` and `/a` yield the same segments, and the root path `/` is the single empty
/// segment. Paths not starting with `/` have no segments at all.
pub(crate) fn segments(path: &str) -> Vec<&str> {
    let path = path.split_once('?').map_or(path, |(path, _query)| path);
    let Some(rest) = path.strip_prefix('/') else {
        return Vec::new();
    };
    if rest.is_empty() {
        return vec![""];
    }
    let rest = rest.strip_suffix('/').unwrap_or(rest);
    rest.split('/').collect()
}

/// The raw path from segment `position` on, query excluded and trailing `/` kept.
pub(crate) fn remainder(path: &str, position: usize) -> &str {
    let path = path.split_once('?').map_or(path, |(path, _query)| path);
    let path = path.strip_prefix('/').unwrap_or(path);
    path.splitn(position + 1, '/').nth(position).unwrap_or_default()
}

const PARAM_PREFIX: char = ':';
const REST_SUFFIX: &str = "...";

/// How a registered segment key matches request segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SegmentKind<'a> {
    Literal(&'a str),
    Param(&'a str),
    Rest(&'a str),
}

impl<'a> SegmentKind<'a> {
    pub(crate) fn of(key: &'a str) -> Self {
        match key.strip_prefix(PARAM_PREFIX) {
            Some(name) => match name.strip_suffix(REST_SUFFIX) {
                Some(name) => SegmentKind::Rest(name),
                None => SegmentKind::Param(name),
            },
            None => SegmentKind::Literal(key),
        }
    }

    pub(crate) fn is_parametric(key: &str) -> bool {
        key.starts_with(PARAM_PREFIX)
    }
}
