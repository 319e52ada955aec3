use crate::assets::negotiate::Encoding;
use bytes::Bytes;
use http::HeaderValue;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One served file with every representation it is stored in.
///
/// Immutable once built, it is only ever replaced along with the whole [`Registry`].
#[derive(Debug)]
pub struct Asset {
    file_path: PathBuf,
    mime: HeaderValue,
    digest: String,
    etag: HeaderValue,
    variants: HashMap<Encoding, Bytes>,
}

impl Asset {
    /// `variants` must contain the identity representation.
    pub(crate) fn new(file_path: PathBuf, mime: HeaderValue, digest: String, variants: Vec<(Encoding, Bytes)>) -> Self {
        let etag = HeaderValue::from_str(&format!("\"{digest}\"")).unwrap_or_else(|_invalid| HeaderValue::from_static("\"\""));
        Self { file_path, mime, digest, etag, variants: variants.into_iter().collect() }
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    pub fn mime(&self) -> &HeaderValue {
        &self.mime
    }

    /// Hex SHA-256 of the file content.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// The quoted digest, used as validator.
    pub fn etag(&self) -> &HeaderValue {
        &self.etag
    }

    pub fn variant(&self, encoding: Encoding) -> Option<&Bytes> {
        self.variants.get(&encoding)
    }

    pub fn encodings(&self) -> Vec<Encoding> {
        let mut encodings = self.variants.keys().copied().collect::<Vec<_>>();
        encodings.sort();
        encodings
    }
}

/// Web path → asset.
#[derive(Debug, Default)]
pub struct Registry {
    assets: HashMap<String, Arc<Asset>>,
}

impl Registry {
    pub(crate) fn new(assets: HashMap<String, Arc<Asset>>) -> Self {
        Self { assets }
    }

    pub fn get(&self, path: &str) -> Option<&Arc<Asset>> {
        self.assets.get(path)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<Asset>)> {
        self.assets.iter().map(|(path, asset)| (path.as_str(), asset))
    }
}
