//! Flat-shaded software projection onto a 2D canvas.
//!
//! Projection and shading are plain functions over the scene graph so they
//! can be checked natively; [`CanvasRenderer`] only owns the `<canvas>` and
//! turns projected triangles into path fills, far to near.

use glam::{Mat4, Vec3};
use wasm_bindgen::JsCast;
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, HtmlElement};

use crate::camera::Camera;
use crate::config::FogConfig;
use crate::error::SceneError;
use crate::particles::ParticleEmitter;
use crate::scene_graph::Model;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    /// Points from the scene toward the light.
    pub direction: Vec3,
    pub color: [f32; 3],
    pub intensity: f32,
}

impl DirectionalLight {
    /// Light placed at `position`, shining at the origin.
    pub fn from_position(position: Vec3, color: [f32; 3], intensity: f32) -> Self {
        Self {
            direction: position.normalize_or_zero(),
            color,
            intensity,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Lighting {
    pub ambient: [f32; 3],
    pub ambient_intensity: f32,
    pub lights: Vec<DirectionalLight>,
}

impl Default for Lighting {
    /// White key light, red rim light, soft white ambient.
    fn default() -> Self {
        Self {
            ambient: [1.0, 1.0, 1.0],
            ambient_intensity: 0.4,
            lights: vec![
                DirectionalLight::from_position(Vec3::new(5.0, 10.0, 5.0), [1.0, 1.0, 1.0], 0.8),
                DirectionalLight::from_position(Vec3::new(-5.0, 5.0, -5.0), [1.0, 0.0, 0.2], 0.5),
            ],
        }
    }
}

impl Lighting {
    /// Lambert shading of `color` for a surface facing `normal`.
    pub fn shade(&self, color: [f32; 3], normal: Vec3) -> [f32; 3] {
        let mut light = Vec3::from(self.ambient) * self.ambient_intensity;
        for l in &self.lights {
            let lambert = normal.dot(l.direction).max(0.0);
            light += Vec3::from(l.color) * (lambert * l.intensity);
        }
        let lit = Vec3::from(color) * light;
        [lit.x.min(1.0), lit.y.min(1.0), lit.z.min(1.0)]
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Fog {
    pub color: [f32; 3],
    pub density: f32,
}

impl Fog {
    /// Exponential squared fog blend factor at `depth`.
    pub fn factor(&self, depth: f32) -> f32 {
        let d = self.density * depth;
        (1.0 - (-d * d).exp()).clamp(0.0, 1.0)
    }

    pub fn apply(&self, rgb: [f32; 3], depth: f32) -> [f32; 3] {
        let f = self.factor(depth);
        let mixed = Vec3::from(rgb).lerp(Vec3::from(self.color), f);
        mixed.to_array()
    }
}

impl From<&FogConfig> for Fog {
    fn from(cfg: &FogConfig) -> Self {
        Self {
            color: rgb8_to_f32(cfg.color),
            density: cfg.density,
        }
    }
}

/// Background fill behind every scene.
pub const CLEAR_COLOR: [u8; 3] = [0x0a, 0x0a, 0x0a];

pub fn rgb8_to_f32(rgb: [u8; 3]) -> [f32; 3] {
    [
        f32::from(rgb[0]) / 255.0,
        f32::from(rgb[1]) / 255.0,
        f32::from(rgb[2]) / 255.0,
    ]
}

/// CSS color string for a `0..=1` RGB triple and alpha.
pub fn css_rgba(rgb: [f32; 3], alpha: f32) -> String {
    let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    format!(
        "rgba({},{},{},{:.3})",
        c(rgb[0]),
        c(rgb[1]),
        c(rgb[2]),
        alpha.clamp(0.0, 1.0)
    )
}

/// Drawing surface size in device pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenTriangle {
    pub points: [[f32; 2]; 3],
    /// Mean view-space distance, used for painter's ordering.
    pub depth: f32,
    pub rgb: [f32; 3],
    pub alpha: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenSprite {
    pub center: [f32; 2],
    pub size: f32,
    pub depth: f32,
}

/// Per-frame projection state shared by models and particles.
pub struct Projector {
    view: Mat4,
    projection: Mat4,
    near: f32,
    focal: f32,
    viewport: Viewport,
}

impl Projector {
    pub fn new(camera: &Camera, viewport: Viewport) -> Self {
        Self {
            view: camera.view(),
            projection: camera.projection(),
            near: camera.near,
            focal: viewport.height * 0.5 / (camera.fov_y_deg.to_radians() * 0.5).tan(),
            viewport,
        }
    }

    /// View-space point and its distance in front of the camera.
    fn to_view(&self, world: Vec3) -> (Vec3, f32) {
        let v = self.view.transform_point3(world);
        (v, -v.z)
    }

    fn to_screen(&self, view: Vec3) -> [f32; 2] {
        let clip = self.projection * view.extend(1.0);
        let ndc = clip.truncate() / clip.w;
        [
            (ndc.x + 1.0) * 0.5 * self.viewport.width,
            (1.0 - ndc.y) * 0.5 * self.viewport.height,
        ]
    }

    /// Append the visible, front-facing triangles of `model` to `out`.
    pub fn project_model(
        &self,
        model: &Model,
        lighting: &Lighting,
        fog: Option<&Fog>,
        out: &mut Vec<ScreenTriangle>,
    ) {
        if !model.visible {
            return;
        }
        model.node.visit_meshes(model.world_matrix(), &mut |mesh, world| {
            let material = &mesh.material;
            if material.is_disposed() {
                return;
            }
            let alpha = if material.transparent { material.opacity } else { 1.0 };
            if alpha <= 0.0 {
                return;
            }
            for tri in mesh.geometry.triangles() {
                let w = tri.map(|p| world.transform_point3(p));
                let v = w.map(|p| self.to_view(p));
                if v.iter().any(|(_, depth)| *depth <= self.near) {
                    continue;
                }
                let s = v.map(|(p, _)| self.to_screen(p));
                // screen y points down, so front faces wind clockwise here
                let area = (s[1][0] - s[0][0]) * (s[2][1] - s[0][1])
                    - (s[2][0] - s[0][0]) * (s[1][1] - s[0][1]);
                if area >= 0.0 {
                    continue;
                }
                let depth = (v[0].1 + v[1].1 + v[2].1) / 3.0;
                let normal = (w[1] - w[0]).cross(w[2] - w[0]).normalize_or_zero();
                let mut rgb = if material.lit {
                    lighting.shade(material.color, normal)
                } else {
                    material.color
                };
                if let Some(fog) = fog {
                    rgb = fog.apply(rgb, depth);
                }
                out.push(ScreenTriangle {
                    points: s,
                    depth,
                    rgb,
                    alpha,
                });
            }
        });
    }

    /// Screen squares for every live particle.
    pub fn project_particles(&self, emitter: &ParticleEmitter, out: &mut Vec<ScreenSprite>) {
        if !emitter.is_active() {
            return;
        }
        let world_size = emitter.config().size;
        for p in emitter.particles().iter().filter(|p| p.is_alive()) {
            let (view, depth) = self.to_view(p.position);
            if depth <= self.near {
                continue;
            }
            out.push(ScreenSprite {
                center: self.to_screen(view),
                size: (world_size * self.focal / depth).max(1.0),
                depth,
            });
        }
    }
}

/// Sort far to near for painter's algorithm.
pub fn sort_back_to_front(tris: &mut [ScreenTriangle]) {
    tris.sort_by(|a, b| b.depth.total_cmp(&a.depth));
}

/// Everything a scene hands to the renderer for one frame.
pub struct Frame<'a> {
    pub camera: &'a Camera,
    pub models: &'a [Model],
    pub particles: Option<&'a ParticleEmitter>,
}

pub struct CanvasRenderer {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    pixel_ratio: f64,
    clear: String,
    lighting: Lighting,
    fog: Option<Fog>,
    triangles: Vec<ScreenTriangle>,
    sprites: Vec<ScreenSprite>,
    disposed: bool,
}

impl CanvasRenderer {
    /// Create a canvas sized `width`×`height` CSS pixels inside `container`.
    pub fn attach(
        container: &HtmlElement,
        width: u32,
        height: u32,
        clear: [u8; 3],
        fog: Option<Fog>,
    ) -> Result<Self, SceneError> {
        let window = web_sys::window().ok_or(SceneError::NoWindow)?;
        let doc = window.document().ok_or(SceneError::NoDocument)?;
        let canvas: HtmlCanvasElement = doc
            .create_element("canvas")?
            .dyn_into()
            .map_err(|el| SceneError::Js(format!("<{}> is not a canvas", el.tag_name())))?;
        canvas.set_attribute("style", "display:block;")?;
        let ctx: CanvasRenderingContext2d = canvas
            .get_context("2d")?
            .ok_or(SceneError::NoContext)?
            .dyn_into()
            .map_err(|_| SceneError::NoContext)?;
        container.append_child(&canvas)?;

        let mut renderer = Self {
            canvas,
            ctx,
            pixel_ratio: window.device_pixel_ratio().min(2.0),
            clear: css_rgba(rgb8_to_f32(clear), 1.0),
            lighting: Lighting::default(),
            fog,
            triangles: Vec::new(),
            sprites: Vec::new(),
            disposed: false,
        };
        renderer.set_size(width, height);
        Ok(renderer)
    }

    /// Resize the drawing surface; CSS size follows, backing store is scaled
    /// by the pixel ratio.
    pub fn set_size(&mut self, width: u32, height: u32) {
        let w = (f64::from(width) * self.pixel_ratio).round() as u32;
        let h = (f64::from(height) * self.pixel_ratio).round() as u32;
        self.canvas.set_width(w);
        self.canvas.set_height(h);
        let style = self.canvas.style();
        style.set_property("width", &format!("{width}px")).ok();
        style.set_property("height", &format!("{height}px")).ok();
    }

    fn viewport(&self) -> Viewport {
        Viewport {
            width: self.canvas.width() as f32,
            height: self.canvas.height() as f32,
        }
    }

    pub fn render(&mut self, frame: &Frame<'_>) {
        if self.disposed {
            return;
        }
        let viewport = self.viewport();
        let ctx = &self.ctx;
        ctx.set_fill_style_str(&self.clear);
        ctx.fill_rect(0.0, 0.0, f64::from(viewport.width), f64::from(viewport.height));

        let projector = Projector::new(frame.camera, viewport);
        self.triangles.clear();
        for model in frame.models {
            projector.project_model(model, &self.lighting, self.fog.as_ref(), &mut self.triangles);
        }
        sort_back_to_front(&mut self.triangles);
        ctx.set_line_width(0.5);
        for tri in &self.triangles {
            let color = css_rgba(tri.rgb, tri.alpha);
            let [a, b, c] = tri.points;
            ctx.begin_path();
            ctx.move_to(f64::from(a[0]), f64::from(a[1]));
            ctx.line_to(f64::from(b[0]), f64::from(b[1]));
            ctx.line_to(f64::from(c[0]), f64::from(c[1]));
            ctx.close_path();
            ctx.set_fill_style_str(&color);
            ctx.fill();
            // hides hairline seams between neighbouring opaque triangles
            if tri.alpha >= 1.0 {
                ctx.set_stroke_style_str(&color);
                ctx.stroke();
            }
        }

        if let Some(emitter) = frame.particles {
            self.sprites.clear();
            projector.project_particles(emitter, &mut self.sprites);
            let rgb = rgb8_to_f32(emitter.config().color);
            ctx.set_fill_style_str(&css_rgba(rgb, emitter.opacity()));
            for s in &self.sprites {
                let half = s.size * 0.5;
                ctx.fill_rect(
                    f64::from(s.center[0] - half),
                    f64::from(s.center[1] - half),
                    f64::from(s.size),
                    f64::from(s.size),
                );
            }
        }
    }

    /// Remove the canvas from the page. Later calls do nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.canvas.remove();
        self.triangles = Vec::new();
        self.sprites = Vec::new();
    }
}
