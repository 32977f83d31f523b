//! Boss defeat choreography.
//!
//! A three-state machine (`Flying` → `Defeated` → `Finished`) that owns the
//! boss pose and drives the camera rig and the particle burst from a single
//! clock. Nothing here touches the DOM; the scene controller copies the pose
//! onto whatever model happens to be loaded.

use futures::channel::oneshot;
use glam::Vec3;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::camera::CameraRig;
use crate::config::DefeatConfig;
use crate::particles::ParticleEmitter;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChoreographyState {
    Flying,
    Defeated,
    Finished,
}

/// Resolves once the sequence reaches `Finished`.
pub type DefeatSignal = oneshot::Receiver<()>;

/// Where the boss is and how it looks this frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    /// Euler angles, XYZ order, radians.
    pub rotation: Vec3,
    pub opacity: f32,
    pub visible: bool,
}

impl Pose {
    fn hovering(height: f32) -> Self {
        Self {
            position: Vec3::new(0.0, height, 0.0),
            rotation: Vec3::ZERO,
            opacity: 1.0,
            visible: true,
        }
    }
}

/// Per-episode bookkeeping, reset when `Defeated` is entered.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DefeatTimeline {
    pub elapsed: f32,
    pub progress: f32,
    pub spin: Vec3,
    pub wobble_phase: f32,
    pub burst_fired: bool,
}

impl DefeatTimeline {
    /// Cubic ease-in of the progress fraction.
    pub fn ease(&self) -> f32 {
        self.progress * self.progress * self.progress
    }
}

/// Opacity for a given progress: 1 until `fade_start`, then a quadratic
/// falloff reaching 0 at progress 1.
pub fn fade_opacity(progress: f32, fade_start: f32) -> f32 {
    if progress <= fade_start {
        return 1.0;
    }
    let f = (progress - fade_start) / (1.0 - fade_start);
    (1.0 - f * f).max(0.0)
}

/// Camera z offset from rest for the pre-impact dolly.
pub fn dolly_offset(progress: f32, cfg: &DefeatConfig) -> f32 {
    if progress < cfg.dolly_start {
        0.0
    } else if progress < cfg.dolly_end {
        let d = (progress - cfg.dolly_start) / (cfg.dolly_end - cfg.dolly_start);
        d * d * cfg.dolly_distance
    } else {
        cfg.dolly_distance
    }
}

/// Uniform sample in `[-half, half)` per axis; zero-width axes stay at 0.
fn jitter3<R: Rng + ?Sized>(rng: &mut R, half: Vec3) -> Vec3 {
    let mut axis = |h: f32| if h > 0.0 { rng.gen_range(-h..h) } else { 0.0 };
    Vec3::new(axis(half.x), axis(half.y), axis(half.z))
}

pub struct DefeatChoreographer {
    state: ChoreographyState,
    clock: f32,
    timeline: DefeatTimeline,
    pose: Pose,
    config: DefeatConfig,
    rng: SmallRng,
    completion: Option<oneshot::Sender<()>>,
}

impl DefeatChoreographer {
    pub fn new(config: DefeatConfig) -> Self {
        Self::with_rng(config, SmallRng::from_entropy())
    }

    /// Deterministic construction for tests and replays.
    pub fn with_rng(config: DefeatConfig, rng: SmallRng) -> Self {
        Self {
            state: ChoreographyState::Flying,
            clock: 0.0,
            timeline: DefeatTimeline::default(),
            pose: Pose::hovering(config.hover_height),
            config,
            rng,
            completion: None,
        }
    }

    pub fn state(&self) -> ChoreographyState {
        self.state
    }

    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    pub fn timeline(&self) -> &DefeatTimeline {
        &self.timeline
    }

    pub fn config(&self) -> &DefeatConfig {
        &self.config
    }

    /// Start the defeat sequence. Only the first call while `Flying` does
    /// anything; it returns the signal that resolves on `Finished`.
    pub fn trigger_defeat(&mut self) -> Option<DefeatSignal> {
        if self.state != ChoreographyState::Flying {
            log::debug!("defeat already triggered (state {:?})", self.state);
            return None;
        }
        let spin = self.config.initial_spin * 0.5;
        self.timeline = DefeatTimeline {
            spin: jitter3(&mut self.rng, Vec3::splat(spin)),
            ..DefeatTimeline::default()
        };
        self.state = ChoreographyState::Defeated;
        let (tx, rx) = oneshot::channel();
        self.completion = Some(tx);
        log::info!("boss defeated, starting fall");
        Some(rx)
    }

    /// Give up on a running sequence. Any pending [`DefeatSignal`] resolves
    /// with `Canceled`; the state itself is left where it was.
    pub fn abandon(&mut self) -> bool {
        let pending = self.completion.take().is_some();
        if pending {
            log::debug!("defeat sequence abandoned at {:.2}", self.timeline.progress);
        }
        pending
    }

    /// Advance by `dt` seconds and return the resulting state.
    pub fn advance(
        &mut self,
        dt: f32,
        rig: &mut CameraRig,
        particles: &mut ParticleEmitter,
    ) -> ChoreographyState {
        self.clock += dt;
        match self.state {
            ChoreographyState::Flying => self.hover(rig),
            ChoreographyState::Defeated => self.fall(dt, rig, particles),
            ChoreographyState::Finished => {
                rig.ease_to_rest(self.config.rest_ease_rate * dt);
            }
        }
        self.state
    }

    fn hover(&mut self, rig: &mut CameraRig) {
        let cfg = &self.config;
        let t = self.clock;
        self.pose.position.y = cfg.hover_height + (t * cfg.bob_rate).sin() * cfg.bob_amplitude;
        self.pose.position.x = (t * cfg.drift_rate).sin() * cfg.drift_amplitude;
        self.pose.rotation.y = (t * cfg.drift_rate).sin() * cfg.sway_amplitude;

        let rest = rig.rest_position();
        rig.camera.position.z = rest.z + (t * cfg.idle_dolly_rate).sin() * cfg.idle_dolly_amplitude;
        rig.camera.look_at(self.pose.position);
    }

    fn fall(&mut self, dt: f32, rig: &mut CameraRig, particles: &mut ParticleEmitter) {
        let cfg = &self.config;
        let tl = &mut self.timeline;
        tl.elapsed += dt;
        tl.progress = (tl.elapsed / cfg.duration).min(1.0);
        let progress = tl.progress;
        let ease = progress * progress * progress;
        let pos = &mut self.pose.position;

        if progress < cfg.wobble_end {
            tl.wobble_phase += dt * cfg.wobble_rate;
            let amount = (cfg.wobble_end - progress) / cfg.wobble_end;
            let intensity = amount * cfg.wobble_strength;
            pos.x += (tl.wobble_phase * 3.0).sin() * intensity * dt;
            pos.z += (tl.wobble_phase * 2.5).cos() * intensity * dt;
        }

        tl.spin += jitter3(&mut self.rng, Vec3::splat(cfg.spin_noise * 0.5 * dt));
        tl.spin *= cfg.spin_damping;
        self.pose.rotation += tl.spin * (1.0 + ease * 2.0) * dt;

        pos.y = cfg.start_height - (cfg.start_height - cfg.end_height) * ease;

        let drift = 1.0 - ease * cfg.drift_decay;
        pos.x += (tl.elapsed * 3.0).sin() * cfg.fall_drift_x * drift * dt;
        pos.z += (tl.elapsed * 2.7).cos() * cfg.fall_drift_z * drift * dt;

        let boss = *pos;
        let rest = rig.rest_position();
        let shake = ease * cfg.shake * 0.5;
        let jolt = jitter3(&mut self.rng, Vec3::new(shake, shake, shake * 0.3));
        let lift = cfg.camera_lift - ease * cfg.camera_lift_drop;
        rig.camera.position = Vec3::new(
            boss.x + jolt.x,
            boss.y + lift + jolt.y,
            rest.z - dolly_offset(progress, cfg) + jolt.z,
        );
        rig.camera.look_at(boss + Vec3::Y * cfg.look_above);

        if boss.y < cfg.burst_upper
            && boss.y > cfg.burst_lower
            && !particles.is_active()
            && !tl.burst_fired
        {
            particles.emit(boss, &mut self.rng);
            tl.burst_fired = true;
        }

        let opacity = fade_opacity(progress, cfg.fade_start);
        self.pose.opacity = opacity;

        let faded_out = progress >= 1.0 && opacity < cfg.finish_opacity;
        let landed = boss.y < cfg.end_height && particles.all_inactive();
        if faded_out || landed {
            self.finish(dt, rig, particles);
        }
    }

    fn finish(&mut self, dt: f32, rig: &mut CameraRig, particles: &mut ParticleEmitter) {
        self.state = ChoreographyState::Finished;
        self.pose.visible = false;
        particles.hide();
        rig.ease_to_rest(self.config.rest_ease_rate * dt);
        if let Some(tx) = self.completion.take() {
            // the receiver may already be gone; nothing to notify then
            let _ = tx.send(());
        }
        log::info!("defeat sequence finished after {:.2}s", self.timeline.elapsed);
    }
}
