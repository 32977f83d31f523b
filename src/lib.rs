//! Boss vignettes crate.
//!
//! Two small canvas scenes (the mosquito boss fight and the swaying toilet)
//! and the page controller that drives them. The simulation modules
//! (`camera`, `particles`, `choreography`, `scene_graph`, `assets`, `render`
//! projection) are plain Rust and run natively; only the scene handles and
//! the page touch the DOM.

use wasm_bindgen::prelude::*;

pub mod assets;
pub mod camera;
pub mod choreography;
pub mod config;
pub mod console;
pub mod error;
pub mod frame_loop;
pub mod mosquito;
pub mod page;
pub mod particles;
pub mod render;
pub mod scene_graph;
pub mod toilet;

pub use mosquito::{MosquitoSceneHandle, MosquitoStage, init_mosquito_scene};
pub use page::init_page;
pub use toilet::{ToiletSceneHandle, ToiletStage, init_toilet_scene};

// Optional small allocator for size (feature gated)
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn wasm_start() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
    console::init(log::LevelFilter::Info);
}
