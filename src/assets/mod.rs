//! Model loading with ordered fallbacks.
//!
//! Loading is plain sequential async code: fetch, parse, and on failure move
//! on to the next candidate. The network sits behind [`Fetch`] so the same
//! code runs against `window.fetch` in the browser and an in-memory map in
//! tests.

mod gltf_loader;
mod obj_loader;

use std::collections::HashMap;

use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use crate::error::{AssetError, js_error_text};
use crate::scene_graph::SceneNode;

pub use gltf_loader::{decode_data_uri, load_gltf, parse_gltf};
pub use obj_loader::{load_obj_with_materials, parse_mtl, parse_obj};

/// Source of raw asset bytes.
#[allow(async_fn_in_trait)]
pub trait Fetch {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AssetError>;
}

/// `window.fetch` backed fetcher.
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpFetcher;

impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AssetError> {
        let window = web_sys::window().ok_or(AssetError::NoWindow)?;
        let fetch_failed = |e: wasm_bindgen::JsValue| AssetError::Fetch {
            url: url.to_string(),
            reason: js_error_text(&e),
        };
        let value = JsFuture::from(window.fetch_with_str(url))
            .await
            .map_err(fetch_failed)?;
        let response: web_sys::Response = value.dyn_into().map_err(fetch_failed)?;
        if !response.ok() {
            return Err(AssetError::Status {
                url: url.to_string(),
                status: response.status(),
            });
        }
        let buffer = JsFuture::from(response.array_buffer().map_err(fetch_failed)?)
            .await
            .map_err(fetch_failed)?;
        Ok(js_sys::Uint8Array::new(&buffer).to_vec())
    }
}

/// In-memory fetcher keyed by URL.
#[derive(Clone, Debug, Default)]
pub struct MemoryFetcher {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.files.insert(url.into(), bytes.into());
        self
    }
}

impl Fetch for MemoryFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, AssetError> {
        self.files.get(url).cloned().ok_or_else(|| AssetError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelFormat {
    /// GLB or glTF JSON.
    Gltf,
    /// Wavefront OBJ without a material library.
    Obj,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelSource {
    pub url: String,
    pub format: ModelFormat,
}

impl ModelSource {
    pub fn gltf(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            format: ModelFormat::Gltf,
        }
    }

    pub fn obj(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            format: ModelFormat::Obj,
        }
    }
}

pub async fn load_model<F: Fetch + ?Sized>(
    fetcher: &F,
    source: &ModelSource,
) -> Result<SceneNode, AssetError> {
    match source.format {
        ModelFormat::Gltf => load_gltf(fetcher, &source.url).await,
        ModelFormat::Obj => load_obj_with_materials(fetcher, &source.url, None).await,
    }
}

/// Try each source in order and return the first model that loads. The
/// error of the last attempt is returned when all of them fail.
pub async fn load_first<F: Fetch + ?Sized>(
    fetcher: &F,
    sources: &[ModelSource],
) -> Result<SceneNode, AssetError> {
    let mut last = AssetError::NoCandidates;
    for source in sources {
        match load_model(fetcher, source).await {
            Ok(node) => {
                log::info!(
                    "loaded {} ({} meshes, {} triangles)",
                    source.url,
                    node.mesh_count(),
                    node.triangle_count()
                );
                return Ok(node);
            }
            Err(err) => {
                log::warn!("could not load {}: {err}", source.url);
                last = err;
            }
        }
    }
    Err(last)
}

/// Resolve `uri` against the directory of `base`.
pub fn resolve_relative(base: &str, uri: &str) -> String {
    match base.rfind('/') {
        Some(i) => format!("{}{}", &base[..=i], uri),
        None => uri.to_string(),
    }
}
