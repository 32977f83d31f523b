//! Error types shared by the asset loaders and the browser-facing scene code.

use thiserror::Error;
use wasm_bindgen::{JsCast, JsValue};

/// Failure while fetching or decoding a model asset.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("no browser window available")]
    NoWindow,
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("{path} is not valid UTF-8")]
    Utf8 {
        path: String,
        #[source]
        source: std::str::Utf8Error,
    },
    #[error("failed to parse glTF {path}")]
    Gltf {
        path: String,
        #[source]
        source: gltf::Error,
    },
    #[error("glTF buffer {index} of {path} has no data")]
    MissingBuffer { path: String, index: usize },
    #[error("malformed data URI in {path}")]
    DataUri { path: String },
    #[error("{path}:{line}: {message}")]
    Parse {
        path: String,
        line: usize,
        message: String,
    },
    #[error("{path} contains no triangles")]
    Empty { path: String },
    #[error("no model candidates to load")]
    NoCandidates,
}

/// Failure while wiring a scene or page into the host document.
#[derive(Debug, Error)]
pub enum SceneError {
    #[error("no browser window available")]
    NoWindow,
    #[error("window has no document")]
    NoDocument,
    #[error("missing required element #{0}")]
    MissingElement(String),
    #[error("canvas 2d context unavailable")]
    NoContext,
    #[error("javascript error: {0}")]
    Js(String),
}

impl From<JsValue> for SceneError {
    fn from(value: JsValue) -> Self {
        Self::Js(js_error_text(&value))
    }
}

/// Best-effort human readable text for a thrown JS value.
pub fn js_error_text(value: &JsValue) -> String {
    if let Some(text) = value.as_string() {
        return text;
    }
    if let Some(err) = value.dyn_ref::<js_sys::Error>() {
        return String::from(err.message());
    }
    format!("{value:?}")
}
