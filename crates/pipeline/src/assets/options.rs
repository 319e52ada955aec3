use serde::Deserialize;
use std::path::PathBuf;

/// Static asset setup options.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StaticOptions {
    /// Directory walked recursively at setup.
    pub root: PathBuf,
    /// Files registered under their directory path, `/docs/index.html` is served at `/docs/`.
    pub index_file_names: Vec<String>,
    /// Extra MIME rules, checked before the built-in ones.
    pub mimes: Vec<MimeRule>,
    /// Regexes matched against web paths, matching files are not served.
    pub excludes: Vec<String>,
    pub compress: CompressOptions,
}

impl StaticOptions {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), ..Self::default() }
    }

    #[must_use]
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.excludes.push(pattern.into());
        self
    }

    #[must_use]
    pub fn mime(mut self, rule: MimeRule) -> Self {
        self.mimes.push(rule);
        self
    }

    #[must_use]
    pub fn compress(mut self, compress: CompressOptions) -> Self {
        self.compress = compress;
        self
    }
}

impl Default for StaticOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            index_file_names: vec!["index.html".to_owned(), "index.htm".to_owned()],
            mimes: Vec::new(),
            excludes: Vec::new(),
            compress: CompressOptions::default(),
        }
    }
}

/// Which precompressed variants are computed for compressible files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CompressOptions {
    pub deflate: bool,
    pub gzip: bool,
    pub br: bool,
}

impl CompressOptions {
    pub fn none() -> Self {
        Self { deflate: false, gzip: false, br: false }
    }
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self { deflate: true, gzip: true, br: true }
    }
}

/// Files whose web path matches `pattern` are served as `mime`.
#[derive(Debug, Clone, Deserialize)]
pub struct MimeRule {
    pub pattern: String,
    pub mime: String,
    #[serde(default)]
    pub compress: bool,
}

impl MimeRule {
    pub fn new(pattern: impl Into<String>, mime: impl Into<String>, compress: bool) -> Self {
        Self { pattern: pattern.into(), mime: mime.into(), compress }
    }
}
