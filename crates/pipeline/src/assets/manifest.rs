use crate::action::{Action, ActionResult};
use crate::assets::registry::{Asset, Registry};
use crate::context::RequestContext;
use crate::error::HttpError;
use crate::respond;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use http::StatusCode;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct ManifestEntry<'a> {
    digest: &'a str,
    mime: &'a str,
}

impl<'a> From<&'a Asset> for ManifestEntry<'a> {
    fn from(asset: &'a Asset) -> Self {
        Self { digest: asset.digest(), mime: asset.mime().to_str().unwrap_or_default() }
    }
}

/// Lists every served path with its digest and MIME type.
#[derive(Debug)]
pub struct ManifestAction {
    registry: Arc<ArcSwap<Registry>>,
}

impl ManifestAction {
    pub(crate) fn new(registry: Arc<ArcSwap<Registry>>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Action for ManifestAction {
    async fn invoke(&self, _ctx: &RequestContext) -> ActionResult {
        let registry = self.registry.load();
        let manifest = registry.iter().map(|(path, asset)| (path, ManifestEntry::from(asset.as_ref()))).collect::<BTreeMap<_, _>>();
        Ok(respond::json(StatusCode::OK, &manifest))
    }
}

/// Answers the manifest entry of the path held by a route parameter, 404 when that path
/// is not served.
#[derive(Debug)]
pub struct ManifestEntryAction {
    registry: Arc<ArcSwap<Registry>>,
    param: String,
}

impl ManifestEntryAction {
    pub(crate) fn new(registry: Arc<ArcSwap<Registry>>, param: String) -> Self {
        Self { registry, param }
    }
}

#[async_trait]
impl Action for ManifestEntryAction {
    async fn invoke(&self, ctx: &RequestContext) -> ActionResult {
        let requested = ctx.path_params().get(&self.param).ok_or_else(HttpError::not_found)?;
        let path = if requested.starts_with('/') { requested.to_owned() } else { format!("/{requested}") };

        let registry = self.registry.load();
        let asset = registry.get(&path).ok_or_else(|| HttpError::new(StatusCode::NOT_FOUND, format!("'{path}' is not served")))?;
        Ok(respond::json(StatusCode::OK, &ManifestEntry::from(asset.as_ref())))
    }
}
