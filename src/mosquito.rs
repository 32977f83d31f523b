//! The mosquito boss-fight scene.
//!
//! [`MosquitoStage`] is the whole simulation: camera rig, particle burst,
//! defeat choreography and the (possibly still loading) model. The
//! wasm-facing [`MosquitoSceneHandle`] wires a stage to a canvas, the frame
//! loop and the window resize event.

use std::cell::RefCell;
use std::rc::Rc;

use gloo::events::EventListener;
use gloo::timers::callback::Timeout;
use rand::rngs::SmallRng;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local};
use web_sys::HtmlElement;

use crate::assets::{HttpFetcher, ModelSource, load_first};
use crate::camera::{Camera, CameraRig};
use crate::choreography::{ChoreographyState, DefeatChoreographer, DefeatSignal};
use crate::config::{MosquitoConfig, asset_url};
use crate::error::SceneError;
use crate::frame_loop::FrameLoop;
use crate::particles::ParticleEmitter;
use crate::render::{CLEAR_COLOR, CanvasRenderer, Fog, Frame};
use crate::scene_graph::{Model, SceneNode};

pub(crate) fn aspect_of(width: u32, height: u32) -> f32 {
    if height == 0 { 1.0 } else { width as f32 / height as f32 }
}

pub struct MosquitoStage {
    rig: CameraRig,
    particles: ParticleEmitter,
    choreographer: DefeatChoreographer,
    model: Option<Model>,
    disposed: bool,
}

impl MosquitoStage {
    pub fn new(config: &MosquitoConfig, width: u32, height: u32) -> Self {
        Self::from_parts(config, width, height, DefeatChoreographer::new(config.defeat.clone()))
    }

    pub fn with_rng(config: &MosquitoConfig, width: u32, height: u32, rng: SmallRng) -> Self {
        let choreographer = DefeatChoreographer::with_rng(config.defeat.clone(), rng);
        Self::from_parts(config, width, height, choreographer)
    }

    fn from_parts(
        config: &MosquitoConfig,
        width: u32,
        height: u32,
        choreographer: DefeatChoreographer,
    ) -> Self {
        Self {
            rig: CameraRig::new(&config.camera, aspect_of(width, height)),
            particles: ParticleEmitter::new(config.particles.clone()),
            choreographer,
            model: None,
            disposed: false,
        }
    }

    /// Install a freshly loaded model. A stage that is already torn down
    /// releases it straight away.
    pub fn set_model(&mut self, node: SceneNode) {
        let mut model = Model::fitted(node);
        if self.disposed {
            let released = model.dispose();
            log::debug!("model arrived after cleanup, released {released} resources");
            return;
        }
        self.apply_pose(&mut model);
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

    pub fn particles(&self) -> &ParticleEmitter {
        &self.particles
    }

    pub fn choreographer(&self) -> &DefeatChoreographer {
        &self.choreographer
    }

    pub fn state(&self) -> ChoreographyState {
        self.choreographer.state()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn trigger_defeat(&mut self) -> Option<DefeatSignal> {
        if self.disposed {
            return None;
        }
        self.choreographer.trigger_defeat()
    }

    /// Advance the simulation by `dt` seconds.
    pub fn tick(&mut self, dt: f32) -> ChoreographyState {
        if self.disposed {
            return self.state();
        }
        let state = self.choreographer.advance(dt, &mut self.rig, &mut self.particles);
        if let Some(mut model) = self.model.take() {
            self.apply_pose(&mut model);
            self.model = Some(model);
        }
        self.particles.tick(dt);
        state
    }

    fn apply_pose(&self, model: &mut Model) {
        let pose = self.choreographer.pose();
        model.position = pose.position;
        model.rotation = pose.rotation;
        model.visible = pose.visible;
        if self.choreographer.state() != ChoreographyState::Flying {
            model.set_opacity(pose.opacity);
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.rig.camera.set_viewport(width, height);
    }

    /// Release the model and stop reacting to ticks. Returns the number of
    /// resources freed; a second call frees nothing.
    pub fn dispose(&mut self) -> usize {
        if self.disposed {
            return 0;
        }
        self.disposed = true;
        self.choreographer.abandon();
        self.particles.hide();
        self.model.take().map_or(0, |mut m| m.dispose())
    }
}

fn container_size(container: &HtmlElement) -> (u32, u32) {
    (
        container.client_width().max(0) as u32,
        container.client_height().max(0) as u32,
    )
}

/// Red inner glow on the container that fades out after `ms`.
fn flash(container: &HtmlElement, ms: u32) {
    let style = container.style();
    style.set_property("box-shadow", "inset 0 0 100px rgba(255, 0, 51, 0.8)").ok();
    let container = container.clone();
    Timeout::new(ms, move || {
        let style = container.style();
        style.set_property("transition", "box-shadow 0.5s").ok();
        style.set_property("box-shadow", "inset 0 0 0px rgba(255, 0, 51, 0)").ok();
    })
    .forget();
}

#[wasm_bindgen]
pub struct MosquitoSceneHandle {
    stage: Rc<RefCell<MosquitoStage>>,
    renderer: Rc<RefCell<CanvasRenderer>>,
    frame_loop: Option<FrameLoop>,
    resize: Option<EventListener>,
    container: HtmlElement,
    flash_ms: u32,
}

impl MosquitoSceneHandle {
    pub fn mount(container: HtmlElement, config: MosquitoConfig) -> Result<Self, SceneError> {
        let window = web_sys::window().ok_or(SceneError::NoWindow)?;
        let (width, height) = container_size(&container);
        let stage = Rc::new(RefCell::new(MosquitoStage::new(&config, width, height)));
        let renderer = Rc::new(RefCell::new(CanvasRenderer::attach(
            &container,
            width,
            height,
            CLEAR_COLOR,
            config.fog.as_ref().map(Fog::from),
        )?));

        let frame_loop = {
            let (stage, renderer) = (stage.clone(), renderer.clone());
            FrameLoop::start(config.max_frame_delta, move |dt| {
                let mut stage = stage.borrow_mut();
                stage.tick(dt);
                renderer.borrow_mut().render(&Frame {
                    camera: stage.camera(),
                    models: stage.models(),
                    particles: Some(stage.particles()),
                });
                true
            })?
        };

        let resize = {
            let (stage, renderer, container) = (stage.clone(), renderer.clone(), container.clone());
            EventListener::new(&window, "resize", move |_| {
                let (w, h) = container_size(&container);
                stage.borrow_mut().resize(w, h);
                renderer.borrow_mut().set_size(w, h);
            })
        };

        let sources = [
            ModelSource::gltf(asset_url(&config.asset_base, &config.primary_model)),
            ModelSource::gltf(asset_url(&config.asset_base, &config.fallback_model)),
        ];
        let loading = stage.clone();
        spawn_local(async move {
            match load_first(&HttpFetcher, &sources).await {
                Ok(node) => loading.borrow_mut().set_model(node),
                Err(err) => log::error!("mosquito model unavailable, animating without it: {err}"),
            }
        });

        log::info!("mosquito scene mounted at {width}x{height}");
        Ok(Self {
            stage,
            renderer,
            frame_loop: Some(frame_loop),
            resize: Some(resize),
            container,
            flash_ms: config.flash_ms,
        })
    }
}

#[wasm_bindgen]
impl MosquitoSceneHandle {
    /// Start the defeat sequence. The promise resolves once it has finished,
    /// or right away when the boss was already defeated.
    pub fn trigger_defeat(&self) -> js_sys::Promise {
        let signal = self.stage.borrow_mut().trigger_defeat();
        if signal.is_some() {
            flash(&self.container, self.flash_ms);
        }
        future_to_promise(async move {
            if let Some(signal) = signal {
                if signal.await.is_err() {
                    log::debug!("scene cleaned up before the defeat finished");
                }
            }
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Stop the loop, detach listeners and free the canvas and model.
    pub fn cleanup(&mut self) {
        let Some(frame_loop) = self.frame_loop.take() else {
            return;
        };
        frame_loop.stop();
        self.resize.take();
        self.renderer.borrow_mut().dispose();
        let released = self.stage.borrow_mut().dispose();
        log::info!("mosquito scene cleaned up ({released} resources released)");
    }
}

/// Mount the mosquito scene in `container`, or log why it could not be.
#[wasm_bindgen]
pub fn init_mosquito_scene(container: HtmlElement) -> Option<MosquitoSceneHandle> {
    mount_or_log(container, MosquitoConfig::default())
}

/// Like [`init_mosquito_scene`], with settings overridden from JSON.
#[cfg(feature = "serde_json")]
#[wasm_bindgen]
pub fn init_mosquito_scene_with_config(
    container: HtmlElement,
    config_json: &str,
) -> Option<MosquitoSceneHandle> {
    match serde_json::from_str::<MosquitoConfig>(config_json) {
        Ok(config) => mount_or_log(container, config),
        Err(err) => {
            log::error!("invalid mosquito scene config: {err}");
            None
        }
    }
}

fn mount_or_log(container: HtmlElement, config: MosquitoConfig) -> Option<MosquitoSceneHandle> {
    MosquitoSceneHandle::mount(container, config)
        .map_err(|err| log::error!("mosquito scene unavailable: {err}"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene_graph::{Geometry, Material};
    use rand::SeedableRng;

    fn stage() -> MosquitoStage {
        MosquitoStage::with_rng(&MosquitoConfig::default(), 1600, 900, SmallRng::seed_from_u64(1))
    }

    fn cube() -> SceneNode {
        SceneNode::mesh("aedes", Geometry::cube(1.0), Material::default())
    }

    #[test]
    fn sequence_finishes_without_a_model() {
        let mut s = stage();
        let mut signal = s.trigger_defeat().unwrap();
        let mut states = Vec::new();
        for _ in 0..400 {
            states.push(s.tick(1.0 / 60.0));
        }
        assert_eq!(s.state(), ChoreographyState::Finished);
        assert_eq!(signal.try_recv(), Ok(Some(())));
        // never goes back
        assert!(states.windows(2).all(|w| w[0] as u8 <= w[1] as u8));
    }

    #[test]
    fn model_follows_the_pose() {
        let mut s = stage();
        s.set_model(cube());
        s.tick(0.3);
        let pose = *s.choreographer().pose();
        let model = s.model().unwrap();
        assert_eq!(model.position, pose.position);
        assert_eq!(model.rotation, pose.rotation);
        assert!((model.position.y - 2.0).abs() <= 0.1 + 1e-5);
    }

    #[test]
    fn model_fades_once_defeated() {
        let mut s = stage();
        s.set_model(cube());
        s.trigger_defeat();
        for _ in 0..140 {
            s.tick(1.0 / 60.0);
        }
        let opacity = s.choreographer().pose().opacity;
        assert!(opacity < 1.0);
        s.model().unwrap().node.visit_meshes(glam::Mat4::IDENTITY, &mut |m, _| {
            assert_eq!(m.material.opacity, opacity);
        });
    }

    #[test]
    fn resize_sets_exact_aspect() {
        let mut s = stage();
        s.resize(1024, 768);
        assert_eq!(s.camera().aspect, 1024.0 / 768.0);
    }

    #[test]
    fn dispose_is_idempotent() {
        let mut s = stage();
        s.set_model(cube());
        assert_eq!(s.dispose(), 2);
        assert_eq!(s.dispose(), 0);
        assert!(s.model().is_none());
        assert!(s.trigger_defeat().is_none());
    }

    #[test]
    fn dispose_mid_fall_settles_the_signal() {
        let mut s = stage();
        let mut signal = s.trigger_defeat().unwrap();
        s.tick(0.5);
        assert_eq!(signal.try_recv(), Ok(None));
        s.dispose();
        assert_eq!(signal.try_recv(), Err(futures::channel::oneshot::Canceled));
        assert_eq!(s.state(), ChoreographyState::Defeated);
    }

    #[test]
    fn late_model_is_released_immediately() {
        let mut s = stage();
        s.dispose();
        s.set_model(cube());
        assert!(s.model().is_none());
    }

    #[test]
    fn burst_spawns_near_the_falling_boss() {
        let mut s = stage();
        s.trigger_defeat();
        let mut seen = false;
        for _ in 0..200 {
            s.tick(1.0 / 60.0);
            if s.particles().is_active() {
                seen = true;
                let boss = s.choreographer().pose().position;
                assert!(boss.y < 0.5 + 1e-3);
                for p in s.particles().particles().iter().filter(|p| p.is_alive()) {
                    assert!(p.position.distance(boss) < 1.0, "{:?} vs {boss:?}", p.position);
                }
                break;
            }
        }
        assert!(seen);
    }
}
