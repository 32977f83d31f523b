// Browser tests, run with `wasm-pack test --headless --firefox`.
#![cfg(target_arch = "wasm32")]

use boss_vignettes::{init_mosquito_scene, init_page, init_toilet_scene};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::*;
use web_sys::HtmlElement;

wasm_bindgen_test_configure!(run_in_browser);

fn container(width: u32, height: u32) -> HtmlElement {
    let doc = web_sys::window().unwrap().document().unwrap();
    let div: HtmlElement = doc.create_element("div").unwrap().dyn_into().unwrap();
    div.set_attribute("style", &format!("width:{width}px;height:{height}px"))
        .unwrap();
    doc.body().unwrap().append_child(&div).unwrap();
    div
}

#[wasm_bindgen_test]
fn mosquito_scene_mounts_and_cleans_up_twice() {
    let div = container(320, 240);
    let mut scene = init_mosquito_scene(div.clone()).expect("scene mounts");
    assert_eq!(div.child_element_count(), 1);
    scene.cleanup();
    scene.cleanup();
    assert_eq!(div.child_element_count(), 0);
}

#[wasm_bindgen_test]
async fn repeated_defeat_resolves_immediately() {
    let div = container(320, 240);
    let mut scene = init_mosquito_scene(div).expect("scene mounts");
    scene.cleanup();
    // a cleaned-up scene has nothing to wait for
    wasm_bindgen_futures::JsFuture::from(scene.trigger_defeat())
        .await
        .unwrap();
}

#[wasm_bindgen_test]
async fn cleanup_mid_fall_settles_the_defeat_promise() {
    let div = container(320, 240);
    let mut scene = init_mosquito_scene(div).expect("scene mounts");
    let pending = scene.trigger_defeat();
    scene.cleanup();
    wasm_bindgen_futures::JsFuture::from(pending).await.unwrap();
}

#[wasm_bindgen_test]
fn toilet_scene_uses_fallback_size() {
    let div = container(0, 0);
    let mut scene = init_toilet_scene(div.clone()).expect("scene mounts");
    let canvas: web_sys::HtmlCanvasElement =
        div.first_element_child().unwrap().dyn_into().unwrap();
    assert_eq!(canvas.style().get_property_value("width").unwrap(), "400px");
    assert_eq!(div.style().get_property_value("width").unwrap(), "400px");
    assert_eq!(div.style().get_property_value("height").unwrap(), "400px");
    scene.cleanup();
}

#[wasm_bindgen_test]
fn page_without_markup_stays_inert() {
    init_page();
}

const PAGE_MARKUP: &str = r#"
    <section id="landing" class="active"><button id="play-btn">play</button></section>
    <section id="main-content" class="MAIN">
        <div id="mosquito-scene" style="width:320px;height:240px"></div>
        <button id="boss-fight-btn">fight</button>
        <div id="message-display"></div>
        <div id="boss-result"></div>
    </section>
"#;

fn page_markup(main_class: &str) -> HtmlElement {
    let root = container(640, 480);
    root.set_inner_html(&PAGE_MARKUP.replace("MAIN", main_class));
    root
}

fn scene_children(root: &HtmlElement) -> u32 {
    root.query_selector("#mosquito-scene")
        .unwrap()
        .unwrap()
        .child_element_count()
}

#[wasm_bindgen_test]
fn mosquito_scene_waits_for_the_main_screen() {
    let root = page_markup("");
    init_page();
    assert_eq!(scene_children(&root), 0);
    root.remove();
}

#[wasm_bindgen_test]
fn mosquito_scene_mounts_at_its_laid_out_size() {
    let root = page_markup("active");
    init_page();
    assert_eq!(scene_children(&root), 1);
    let canvas: web_sys::HtmlCanvasElement = root
        .query_selector("#mosquito-scene canvas")
        .unwrap()
        .unwrap()
        .dyn_into()
        .unwrap();
    assert!(canvas.width() > 0 && canvas.height() > 0);
    assert_eq!(canvas.style().get_property_value("width").unwrap(), "320px");
    assert_eq!(canvas.style().get_property_value("height").unwrap(), "240px");
    root.remove();
}
