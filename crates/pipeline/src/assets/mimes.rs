use crate::assets::options::MimeRule;
use crate::error::ConfigError;
use http::HeaderValue;
use mime::Mime;
use once_cell::sync::Lazy;
use regex::Regex;

const DEFAULT_MIMES: [(&str, &str, bool); 18] = [
    (r"\.css$", "text/css", true),
    (r"\.htm$", "text/html", true),
    (r"\.html$", "text/html", true),
    (r"\.ico$", "image/x-icon", false),
    (r"\.jpg$", "image/jpeg", false),
    (r"\.jpeg$", "image/jpeg", false),
    (r"\.js$", "text/javascript", true),
    (r"\.json$", "application/json", true),
    (r"\.js\.map$", "application/json", true),
    (r"\.mp4$", "video/mp4", false),
    (r"\.png$", "image/png", false),
    (r"\.svg$", "image/svg+xml", true),
    (r"\.txt$", "text/plain", true),
    (r"\.wasm$", "application/wasm", false),
    (r"\.webmanifest$", "application/manifest+json", true),
    (r"\.woff$", "font/woff", false),
    (r"\.woff2$", "font/woff2", false),
    (r"\.xml$", "text/xml", true),
];

static DEFAULT_RULES: Lazy<Vec<(Regex, MimeKind)>> = Lazy::new(|| {
    DEFAULT_MIMES
        .iter()
        .filter_map(|(pattern, mime, compress)| compile(MimeRule::new(*pattern, *mime, *compress)).ok())
        .collect()
});

/// Content type of a file and whether it is worth compressing.
#[derive(Debug, Clone)]
pub(crate) struct MimeKind {
    pub(crate) mime: HeaderValue,
    pub(crate) compress: bool,
}

/// Ordered pattern → MIME table, the first matching rule wins.
#[derive(Debug)]
pub(crate) struct MimeTable {
    rules: Vec<(Regex, MimeKind)>,
}

impl MimeTable {
    /// `custom` rules take precedence over the built-in ones.
    pub(crate) fn new(custom: &[MimeRule]) -> Result<Self, ConfigError> {
        let mut rules = custom.iter().cloned().map(compile).collect::<Result<Vec<_>, _>>()?;
        rules.extend(DEFAULT_RULES.iter().cloned());
        Ok(Self { rules })
    }

    pub(crate) fn classify(&self, path: &str) -> Option<&MimeKind> {
        self.rules.iter().find(|(pattern, _)| pattern.is_match(path)).map(|(_, kind)| kind)
    }
}

fn compile(rule: MimeRule) -> Result<(Regex, MimeKind), ConfigError> {
    let pattern = Regex::new(&rule.pattern).map_err(|e| ConfigError::invalid_pattern(&rule.pattern, e))?;
    let mime = rule
        .mime
        .parse::<Mime>()
        .ok()
        .and_then(|mime| HeaderValue::from_str(mime.as_ref()).ok())
        .ok_or_else(|| ConfigError::InvalidMime { pattern: rule.pattern.clone(), mime: rule.mime.clone() })?;
    Ok((pattern, MimeKind { mime, compress: rule.compress }))
}

/// Compiles exclusion patterns.
pub(crate) fn compile_excludes(excludes: &[String]) -> Result<Vec<Regex>, ConfigError> {
    excludes.iter().map(|pattern| Regex::new(pattern).map_err(|e| ConfigError::invalid_pattern(pattern, e))).collect()
}
