//! Slowly swaying toilet model shown after the landing screen.

use std::cell::RefCell;
use std::rc::Rc;

use gloo::events::EventListener;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::HtmlElement;

use crate::assets::{HttpFetcher, load_obj_with_materials};
use crate::camera::{Camera, CameraRig};
use crate::config::{ToiletConfig, asset_url};
use crate::error::SceneError;
use crate::frame_loop::FrameLoop;
use crate::mosquito::aspect_of;
use crate::render::{CLEAR_COLOR, CanvasRenderer, Frame};
use crate::scene_graph::{Geometry, Material, Model, SceneNode};

/// Container size, or a `fallback`-sized square when the container has not
/// been laid out yet.
pub fn viewport_size(width: u32, height: u32, fallback: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        (fallback, fallback)
    } else {
        (width, height)
    }
}

pub struct ToiletStage {
    rig: CameraRig,
    model: Option<Model>,
    clock: f32,
    config: ToiletConfig,
    /// Only a loaded model sways; the placeholder stands still.
    swaying: bool,
    disposed: bool,
}

impl ToiletStage {
    pub fn new(config: ToiletConfig, width: u32, height: u32) -> Self {
        Self {
            rig: CameraRig::new(&config.camera, aspect_of(width, height)),
            model: None,
            clock: 0.0,
            config,
            swaying: false,
            disposed: false,
        }
    }

    pub fn set_model(&mut self, node: SceneNode) {
        let mut model = Model::fitted(node);
        model.position.y = self.config.model_height;
        self.install(model, true);
    }

    /// Stand-in cube used when the OBJ cannot be loaded.
    pub fn set_placeholder(&mut self) {
        let cfg = &self.config;
        let node = SceneNode::mesh(
            "placeholder",
            Geometry::cube(cfg.placeholder_size),
            Material::from_rgb8("placeholder", cfg.placeholder_color),
        );
        let mut model = Model::unfitted(node);
        model.position.y = cfg.placeholder_height;
        self.install(model, false);
    }

    fn install(&mut self, mut model: Model, sway: bool) {
        if self.disposed {
            model.dispose();
            return;
        }
        self.swaying = sway;
        if sway {
            model.rotation.y = self.yaw();
        }
        if let Some(mut old) = self.model.replace(model) {
            old.dispose();
        }
    }

    pub fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    pub fn models(&self) -> &[Model] {
        self.model.as_slice()
    }

    pub fn camera(&self) -> &Camera {
        &self.rig.camera
    }

    fn yaw(&self) -> f32 {
        (self.clock * self.config.sway_rate).sin() * self.config.sway_amplitude
    }

    pub fn tick(&mut self, dt: f32) {
        if self.disposed {
            return;
        }
        self.clock += dt;
        if !self.swaying {
            return;
        }
        let yaw = self.yaw();
        if let Some(model) = self.model.as_mut() {
            model.rotation.y = yaw;
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.rig.camera.set_viewport(width, height);
    }

    pub fn dispose(&mut self) -> usize {
        if self.disposed {
            return 0;
        }
        self.disposed = true;
        self.model.take().map_or(0, |mut m| m.dispose())
    }
}

#[wasm_bindgen]
pub struct ToiletSceneHandle {
    stage: Rc<RefCell<ToiletStage>>,
    renderer: Rc<RefCell<CanvasRenderer>>,
    frame_loop: Option<FrameLoop>,
    resize: Option<EventListener>,
}

impl ToiletSceneHandle {
    pub fn mount(container: HtmlElement, config: ToiletConfig) -> Result<Self, SceneError> {
        let window = web_sys::window().ok_or(SceneError::NoWindow)?;
        let fallback = config.fallback_size;
        if container.client_width() <= 0 || container.client_height() <= 0 {
            let style = container.style();
            style.set_property("width", &format!("{fallback}px")).ok();
            style.set_property("height", &format!("{fallback}px")).ok();
        }
        let measure = move |c: &HtmlElement| {
            viewport_size(
                c.client_width().max(0) as u32,
                c.client_height().max(0) as u32,
                fallback,
            )
        };
        let (width, height) = measure(&container);
        let obj_url = asset_url(&config.asset_base, &config.geometry);
        let mtl_url = asset_url(&config.asset_base, &config.materials);
        let max_delta = config.max_frame_delta;

        let stage = Rc::new(RefCell::new(ToiletStage::new(config, width, height)));
        let renderer = Rc::new(RefCell::new(CanvasRenderer::attach(
            &container,
            width,
            height,
            CLEAR_COLOR,
            None,
        )?));

        let frame_loop = {
            let (stage, renderer) = (stage.clone(), renderer.clone());
            FrameLoop::start(max_delta, move |dt| {
                let mut stage = stage.borrow_mut();
                stage.tick(dt);
                renderer.borrow_mut().render(&Frame {
                    camera: stage.camera(),
                    models: stage.models(),
                    particles: None,
                });
                true
            })?
        };

        let resize = {
            let (stage, renderer) = (stage.clone(), renderer.clone());
            EventListener::new(&window, "resize", move |_| {
                let (w, h) = measure(&container);
                stage.borrow_mut().resize(w, h);
                renderer.borrow_mut().set_size(w, h);
            })
        };

        let loading = stage.clone();
        spawn_local(async move {
            match load_obj_with_materials(&HttpFetcher, &obj_url, Some(&mtl_url)).await {
                Ok(node) => loading.borrow_mut().set_model(node),
                Err(err) => {
                    log::warn!("toilet model unavailable, showing placeholder: {err}");
                    loading.borrow_mut().set_placeholder();
                }
            }
        });

        log::info!("toilet scene mounted at {width}x{height}");
        Ok(Self {
            stage,
            renderer,
            frame_loop: Some(frame_loop),
            resize: Some(resize),
        })
    }
}

#[wasm_bindgen]
impl ToiletSceneHandle {
    pub fn cleanup(&mut self) {
        let Some(frame_loop) = self.frame_loop.take() else {
            return;
        };
        frame_loop.stop();
        self.resize.take();
        self.renderer.borrow_mut().dispose();
        let released = self.stage.borrow_mut().dispose();
        log::info!("toilet scene cleaned up ({released} resources released)");
    }
}

#[wasm_bindgen]
pub fn init_toilet_scene(container: HtmlElement) -> Option<ToiletSceneHandle> {
    mount_or_log(container, ToiletConfig::default())
}

#[cfg(feature = "serde_json")]
#[wasm_bindgen]
pub fn init_toilet_scene_with_config(
    container: HtmlElement,
    config_json: &str,
) -> Option<ToiletSceneHandle> {
    match serde_json::from_str::<ToiletConfig>(config_json) {
        Ok(config) => mount_or_log(container, config),
        Err(err) => {
            log::error!("invalid toilet scene config: {err}");
            None
        }
    }
}

fn mount_or_log(container: HtmlElement, config: ToiletConfig) -> Option<ToiletSceneHandle> {
    ToiletSceneHandle::mount(container, config)
        .map_err(|err| log::error!("toilet scene unavailable: {err}"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn stage() -> ToiletStage {
        ToiletStage::new(ToiletConfig::default(), 400, 400)
    }

    fn bowl() -> SceneNode {
        SceneNode::mesh("bowl", Geometry::cube(1.0), Material::default())
    }

    #[test]
    fn unsized_container_falls_back_to_square() {
        assert_eq!(viewport_size(0, 300, 400), (400, 400));
        assert_eq!(viewport_size(640, 0, 400), (400, 400));
        assert_eq!(viewport_size(640, 480, 400), (640, 480));
    }

    #[test]
    fn model_is_fitted_below_center() {
        let mut s = stage();
        s.set_model(SceneNode::mesh("bowl", Geometry::cube(10.0), Material::default()));
        let b = s.model().unwrap().world_bounds().unwrap();
        assert!(b.center().abs_diff_eq(Vec3::new(0.0, -1.5, 0.0), 1e-5));
        assert!((b.size().y - 2.0).abs() < 1e-5);
    }

    #[test]
    fn placeholder_is_a_dark_cube() {
        let mut s = stage();
        s.set_placeholder();
        let model = s.model().unwrap();
        assert_eq!(model.position.y, -1.0);
        assert_eq!(model.node.triangle_count(), 12);
        let b = model.world_bounds().unwrap();
        assert!((b.size().x - 2.0).abs() < 1e-5);
        model.node.visit_meshes(glam::Mat4::IDENTITY, &mut |m, _| {
            assert_eq!(m.material, Material::from_rgb8("placeholder", [0x33, 0x33, 0x33]));
        });
    }

    #[test]
    fn sway_stays_within_amplitude() {
        let mut s = stage();
        s.set_model(bowl());
        let mut max = 0.0f32;
        for _ in 0..2000 {
            s.tick(1.0 / 30.0);
            let yaw = s.model().unwrap().rotation.y;
            max = max.max(yaw.abs());
        }
        assert!(max <= 0.1 + 1e-6);
        assert!(max > 0.09);
    }

    #[test]
    fn sway_matches_clock() {
        let mut s = stage();
        s.set_model(bowl());
        s.tick(1.0);
        let yaw = s.model().unwrap().rotation.y;
        assert!((yaw - 0.3f32.sin() * 0.1).abs() < 1e-6);
    }

    #[test]
    fn placeholder_does_not_sway() {
        let mut s = stage();
        s.set_placeholder();
        for _ in 0..90 {
            s.tick(1.0 / 30.0);
            assert_eq!(s.model().unwrap().rotation.y, 0.0);
        }
        // a model arriving later picks the sway up at the current clock
        s.set_model(bowl());
        let yaw = s.model().unwrap().rotation.y;
        assert!((yaw - 0.9f32.sin() * 0.1).abs() < 1e-5);
    }

    #[test]
    fn cleanup_twice_is_a_no_op() {
        let mut s = stage();
        s.set_placeholder();
        assert_eq!(s.dispose(), 2);
        assert_eq!(s.dispose(), 0);
        s.set_placeholder();
        assert!(s.model().is_none());
    }
}
