//! Static asset serving.
//!
//! At setup the [`StaticFilter`] walks a directory, classifies every file with the MIME
//! table and has the worker pool compute its SHA-256 digest and its precompressed
//! variants. The resulting [`Registry`] is published as a whole once every file is done.
//!
//! At request time `GET` and `HEAD` requests no route claimed are looked up in the
//! registry, and answered with the best representation the client accepts:
//!
//! - `If-None-Match` matching the digest answers 304 without body
//! - `Accept-Encoding` selects among `br`, `deflate`, `gzip`, falling back to identity
//! - responses carry `ETag`, `Cache-Control: no-cache` and `Vary: Accept-Encoding`

mod manifest;
mod mimes;
mod negotiate;
mod options;
mod process;
mod registry;

pub use manifest::{ManifestAction, ManifestEntryAction};
pub use negotiate::{negotiate, none_match, Encoding};
pub use options::{CompressOptions, MimeRule, StaticOptions};
pub use process::{AssetInput, AssetJob, ProcessedAsset};
pub use registry::{Asset, Registry};

use crate::body::ResponseBody;
use crate::chain::{Filter, Next};
use crate::context::RequestContext;
use crate::error::{AssetError, ConfigError, HttpError};
use crate::respond;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::join_all;
use http::header::{
    HeaderValue, ACCEPT_ENCODING, CACHE_CONTROL, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, ETAG, IF_NONE_MATCH, VARY,
};
use http::{Method, Response, StatusCode};
use micro_pool::{PoolError, PoolManager, PoolOptions, WorkerPool};
use mimes::MimeTable;
use regex::Regex;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// The pool processing static files.
pub type AssetPool = WorkerPool<AssetJob>;

/// Creates the pool static files are processed on.
pub fn asset_pool(manager: &PoolManager, name: &str, options: PoolOptions) -> Result<AssetPool, PoolError> {
    manager.create_pool(name, AssetJob, options)
}

/// A file found by the walk, waiting to be processed.
#[derive(Debug)]
struct Candidate {
    file_path: PathBuf,
    web_path: String,
    mime: HeaderValue,
    compress: bool,
    /// Position in the index file names when the file is an index.
    index_rank: Option<usize>,
}

#[derive(Debug, Default)]
pub struct StaticFilter {
    registry: Arc<ArcSwap<Registry>>,
}

impl StaticFilter {
    /// A filter serving nothing until [`StaticFilter::setup`] published a registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Walks `options.root`, processes every servable file on `pool` and publishes the new
    /// registry. Returns the number of served paths.
    ///
    /// Invalid options fail the setup; files that can't be read or processed are logged and
    /// left out.
    pub async fn setup(&self, options: &StaticOptions, pool: &AssetPool) -> Result<usize, ConfigError> {
        let table = MimeTable::new(&options.mimes)?;
        let excludes = mimes::compile_excludes(&options.excludes)?;

        let root = options.root.clone();
        let index_file_names = options.index_file_names.clone();
        let candidates = tokio::task::spawn_blocking(move || walk(&root, &table, &excludes, &index_file_names))
            .await
            .map_err(|e| ConfigError::Io { path: options.root.clone(), source: io::Error::other(e) })??;

        let compress = options.compress;
        let processed = join_all(candidates.into_iter().map(|candidate| process_file(candidate, compress, pool))).await;

        let mut assets: HashMap<String, (Option<usize>, Arc<Asset>)> = HashMap::new();
        for result in processed {
            let (candidate, asset) = match result {
                Ok(processed) => processed,
                Err(e) => {
                    error!(cause = %e, "static file left out");
                    continue;
                }
            };
            let rank = candidate.index_rank;
            match assets.get(&candidate.web_path) {
                Some((Some(existing), _)) if rank.is_none_or(|rank| rank > *existing) => {
                    debug!(path = %candidate.file_path.display(), "index file shadowed by a preferred one");
                }
                _ => {
                    assets.insert(candidate.web_path, (rank, Arc::new(asset)));
                }
            }
        }

        let registry = Registry::new(assets.into_iter().map(|(path, (_, asset))| (path, asset)).collect());
        let count = registry.len();
        self.registry.store(Arc::new(registry));
        info!(root = %options.root.display(), count, "static files published");
        Ok(count)
    }

    /// The registry currently served.
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.load_full()
    }

    /// Action listing every served path with digest and MIME type.
    pub fn manifest(&self) -> ManifestAction {
        ManifestAction::new(Arc::clone(&self.registry))
    }

    /// Action answering the manifest entry of the path bound to the route parameter `param`.
    pub fn manifest_entry(&self, param: impl Into<String>) -> ManifestEntryAction {
        ManifestEntryAction::new(Arc::clone(&self.registry), param.into())
    }

    fn lookup(&self, ctx: &RequestContext) -> Option<Arc<Asset>> {
        let path = urlencoding::decode(ctx.path()).ok()?;
        self.registry.load().get(path.as_ref()).cloned()
    }
}

fn walk(root: &Path, table: &MimeTable, excludes: &[Regex], index_file_names: &[String]) -> Result<Vec<Candidate>, ConfigError> {
    if !root.is_dir() {
        return Err(ConfigError::Io {
            path: root.to_path_buf(),
            source: io::Error::new(io::ErrorKind::NotFound, "static root is not a directory"),
        });
    }

    let mut candidates = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(cause = %e, "can't walk static entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let Some(web_path) = web_path(root, entry.path()) else {
            warn!(path = %entry.path().display(), "static file path is not valid utf-8");
            continue;
        };
        if excludes.iter().any(|exclude| exclude.is_match(&web_path)) {
            debug!(path = %web_path, "excluded");
            continue;
        }
        let Some(kind) = table.classify(&web_path) else {
            debug!(path = %web_path, "no mime type, skipped");
            continue;
        };

        let file_name = entry.file_name().to_string_lossy();
        let index_rank = index_file_names.iter().position(|name| *name == file_name);
        let web_path = match index_rank {
            Some(_) => web_path[..web_path.len() - file_name.len()].to_owned(),
            None => web_path,
        };

        candidates.push(Candidate {
            file_path: entry.path().to_path_buf(),
            web_path,
            mime: kind.mime.clone(),
            compress: kind.compress,
            index_rank,
        });
    }
    Ok(candidates)
}

/// `/`-separated path of `file` below `root`, with a leading `/`.
fn web_path(root: &Path, file: &Path) -> Option<String> {
    let relative = file.strip_prefix(root).ok()?;
    let mut web_path = String::new();
    for component in relative.components() {
        web_path.push('/');
        web_path.push_str(component.as_os_str().to_str()?);
    }
    Some(web_path)
}

async fn process_file(candidate: Candidate, compress: CompressOptions, pool: &AssetPool) -> Result<(Candidate, Asset), AssetError> {
    let content = tokio::fs::read(&candidate.file_path)
        .await
        .map_err(|source| AssetError::Read { path: candidate.file_path.clone(), source })?;

    let compress = if candidate.compress { compress } else { CompressOptions::none() };
    let processed = pool
        .run(AssetInput { content: Bytes::from(content), compress })
        .await
        .map_err(|source| AssetError::Process { path: candidate.file_path.clone(), source })?;

    debug!(path = %candidate.web_path, digest = %processed.digest, variants = processed.variants.len(), "static file processed");
    let asset = Asset::new(candidate.file_path.clone(), candidate.mime.clone(), processed.digest, processed.variants);
    Ok((candidate, asset))
}

fn serve(ctx: &RequestContext, asset: &Asset) -> Response<ResponseBody> {
    if let Some(if_none_match) = ctx.header(IF_NONE_MATCH)
        && let Ok(etag) = asset.etag().to_str()
        && none_match(if_none_match, etag)
    {
        let mut response = respond::not_modified();
        let headers = response.headers_mut();
        headers.insert(ETAG, asset.etag().clone());
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(VARY, HeaderValue::from_static("Accept-Encoding"));
        return response;
    }

    let encoding = negotiate(ctx.header(ACCEPT_ENCODING), &asset.encodings());
    let Some(content) = asset.variant(encoding).or_else(|| asset.variant(Encoding::Identity)) else {
        error!(path = %asset.file_path().display(), "asset without identity representation");
        return HttpError::internal("asset without content").into_response();
    };

    let body = if *ctx.method() == Method::HEAD { ResponseBody::empty() } else { ResponseBody::from(content.clone()) };
    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, asset.mime().clone());
    if encoding != Encoding::Identity {
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static(encoding.as_str()));
    }
    headers.insert(VARY, HeaderValue::from_static("Accept-Encoding"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(ETAG, asset.etag().clone());
    headers.insert(CONTENT_LENGTH, HeaderValue::from(content.len()));
    response
}

#[async_trait]
impl Filter for StaticFilter {
    async fn run(&self, ctx: &mut RequestContext, next: Next<'_>) -> Response<ResponseBody> {
        if ctx.action().is_some() || !matches!(*ctx.method(), Method::GET | Method::HEAD) {
            return next.proceed(ctx).await;
        }
        match self.lookup(ctx) {
            Some(asset) => serve(ctx, &asset),
            None => next.proceed(ctx).await,
        }
    }

    fn methods(&self) -> Vec<Method> {
        vec![Method::GET, Method::HEAD]
    }
}

#[cfg(test)]
mod tests {
    use super::{asset_pool, StaticFilter, StaticOptions};
    use crate::error::ConfigError;
    use micro_pool::{PoolManager, PoolOptions};
    use std::fs;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("docs/private")).unwrap();
        fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
        fs::write(dir.path().join("site.css"), "body { margin: 0 }").unwrap();
        fs::write(dir.path().join("logo.png"), [0x89, b'P', b'N', b'G']).unwrap();
        fs::write(dir.path().join("notes.unknown"), "??").unwrap();
        fs::write(dir.path().join("docs/index.htm"), "<p>htm</p>").unwrap();
        fs::write(dir.path().join("docs/index.html"), "<p>html</p>").unwrap();
        fs::write(dir.path().join("docs/private/secret.txt"), "hush").unwrap();
        dir
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_setup_registers_servable_files() {
        let dir = tree();
        let manager = PoolManager::new();
        let pool = asset_pool(&manager, "assets", PoolOptions::new(1, 2)).unwrap();

        let filter = StaticFilter::new();
        let options = StaticOptions::new(dir.path()).exclude("^/docs/private/");
        let count = filter.setup(&options, &pool).await.unwrap();

        let registry = filter.registry();
        assert_eq!(count, 4);
        assert!(registry.get("/").is_some());
        assert!(registry.get("/site.css").is_some());
        assert!(registry.get("/logo.png").is_some());
        assert!(registry.get("/notes.unknown").is_none());
        assert!(registry.get("/docs/private/secret.txt").is_none());
        assert!(registry.get("/index.html").is_none());

        let docs = registry.get("/docs/").unwrap();
        assert!(docs.file_path().ends_with("docs/index.html"));

        let css = registry.get("/site.css").unwrap();
        assert_eq!(css.encodings().len(), 4);
        assert_eq!(css.mime(), "text/css");
        assert_eq!(registry.get("/logo.png").unwrap().encodings().len(), 1);

        manager.terminate(pool).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_setup_errors() {
        let manager = PoolManager::new();
        let pool = asset_pool(&manager, "assets", PoolOptions::new(1, 1)).unwrap();
        let filter = StaticFilter::new();

        let missing = StaticOptions::new("/definitely/not/a/static/root");
        assert!(matches!(filter.setup(&missing, &pool).await, Err(ConfigError::Io { .. })));

        let dir = tree();
        let invalid = StaticOptions::new(dir.path()).exclude("(");
        assert!(matches!(filter.setup(&invalid, &pool).await, Err(ConfigError::InvalidPattern { .. })));
        assert!(filter.registry().is_empty());

        manager.terminate(pool).await;
    }
}
