//! Fixed pool of burst particles.
//!
//! The pool never grows or shrinks: `emit` revives every slot at once and
//! `tick` integrates the live ones in place. A slot whose lifetime reaches zero
//! is parked off-screen until the next burst.

use std::f32::consts::{PI, TAU};

use glam::Vec3;
use rand::Rng;

use crate::config::ParticleConfig;

/// Number of particles in every emitter.
pub const POOL_SIZE: usize = 50;

/// Where recycled particles are parked.
pub const PARKED_POSITION: Vec3 = Vec3::new(0.0, -100.0, 0.0);

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    /// Seconds left; `<= 0` means the slot is free.
    pub lifetime: f32,
}

impl Particle {
    pub fn is_alive(&self) -> bool {
        self.lifetime > 0.0
    }
}

#[derive(Clone, Debug)]
pub struct ParticleEmitter {
    particles: [Particle; POOL_SIZE],
    visible: bool,
    opacity: f32,
    config: ParticleConfig,
}

impl ParticleEmitter {
    pub fn new(config: ParticleConfig) -> Self {
        Self {
            particles: [Particle::default(); POOL_SIZE],
            visible: false,
            opacity: config.opacity_scale,
            config,
        }
    }

    pub fn config(&self) -> &ParticleConfig {
        &self.config
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// True between `emit` and the tick that retires the last particle.
    pub fn is_active(&self) -> bool {
        self.visible
    }

    pub fn all_inactive(&self) -> bool {
        self.particles.iter().all(|p| !p.is_alive())
    }

    /// Fade hint derived from the mean remaining lifetime, always in `[0, 1]`.
    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Revive the whole pool around `origin`. Emitting while a burst is
    /// still running restarts it.
    pub fn emit<R: Rng + ?Sized>(&mut self, origin: Vec3, rng: &mut R) {
        let cfg = &self.config;
        let half = cfg.jitter * 0.5;
        for p in self.particles.iter_mut() {
            p.lifetime = cfg.lifetime;
            p.position = origin
                + Vec3::new(
                    rng.gen_range(-half..=half),
                    rng.gen_range(-half..=half),
                    rng.gen_range(-half..=half),
                );

            let speed = cfg.min_speed + rng.gen_range(0.0..1.0) * cfg.speed_spread;
            let azimuth = rng.gen_range(0.0..TAU);
            let polar = (rng.gen_range(0.0..1.0) - cfg.upward_bias) * PI;
            p.velocity = Vec3::new(
                azimuth.cos() * polar.sin() * speed,
                polar.cos() * speed * cfg.vertical_scale,
                azimuth.sin() * polar.sin() * speed,
            );
        }
        self.visible = true;
        // the fade only starts once the burst has ticked
        self.opacity = cfg.opacity_scale.clamp(0.0, 1.0);
        log::debug!("particle burst at ({:.2}, {:.2}, {:.2})", origin.x, origin.y, origin.z);
    }

    /// Advance the burst by `dt` seconds. Returns true once every particle
    /// is spent, at which point the set is hidden.
    pub fn tick(&mut self, dt: f32) -> bool {
        if !self.visible {
            return true;
        }
        let cfg = &self.config;
        let mut total_life = 0.0;
        for p in self.particles.iter_mut() {
            if !p.is_alive() {
                continue;
            }
            p.lifetime -= dt * cfg.decay_rate;
            p.position += p.velocity * dt;
            p.velocity.y -= cfg.gravity * dt;
            if p.lifetime <= 0.0 {
                p.lifetime = 0.0;
                p.position = PARKED_POSITION;
            }
            total_life += p.lifetime;
        }

        self.opacity = (total_life / POOL_SIZE as f32 * cfg.opacity_scale).clamp(0.0, 1.0);
        if self.all_inactive() {
            self.visible = false;
            log::debug!("particle burst spent");
        }
        !self.visible
    }

    /// Hide the set immediately; live particles keep their state.
    pub fn hide(&mut self) {
        self.visible = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    fn emitter() -> ParticleEmitter {
        ParticleEmitter::new(ParticleConfig::default())
    }

    #[test]
    fn new_pool_is_idle() {
        let e = emitter();
        assert_eq!(e.particles().len(), POOL_SIZE);
        assert!(!e.is_active());
        assert!(e.all_inactive());
    }

    #[test]
    fn emit_revives_every_slot_near_origin() {
        let mut e = emitter();
        let mut rng = SmallRng::seed_from_u64(7);
        e.emit(Vec3::ZERO, &mut rng);
        assert!(e.is_active());
        let max_offset = (3.0f32).sqrt() * 0.15 + 1e-6;
        for p in e.particles() {
            assert_eq!(p.lifetime, 1.5);
            assert!(p.position.length() <= max_offset, "{:?}", p.position);
        }
    }

    #[test]
    fn emitted_speed_stays_in_range() {
        let mut e = emitter();
        let mut rng = SmallRng::seed_from_u64(11);
        e.emit(Vec3::ONE, &mut rng);
        for p in e.particles() {
            // vertical component is scaled by 0.8, so the norm may shrink but never grow
            assert!(p.velocity.length() <= 3.5 + 1e-4);
        }
    }

    #[test]
    fn opacity_hint_stays_in_unit_range() {
        let mut e = emitter();
        let mut rng = SmallRng::seed_from_u64(5);
        e.emit(Vec3::ZERO, &mut rng);
        assert_eq!(e.opacity(), 0.8);
        let mut last = 1.0;
        while !e.tick(1.0 / 60.0) {
            let o = e.opacity();
            assert!((0.0..=1.0).contains(&o), "opacity {o}");
            assert!(o <= last);
            last = o;
        }
    }

    #[test]
    fn tick_on_idle_pool_reports_inactive() {
        let mut e = emitter();
        assert!(e.tick(0.016));
        assert!(e.particles().iter().all(|p| p.position == Vec3::ZERO));
    }

    #[test]
    fn gravity_pulls_velocity_down() {
        let mut e = emitter();
        let mut rng = SmallRng::seed_from_u64(3);
        e.emit(Vec3::ZERO, &mut rng);
        let before: Vec<f32> = e.particles().iter().map(|p| p.velocity.y).collect();
        e.tick(0.1);
        for (p, vy) in e.particles().iter().zip(before) {
            assert!((p.velocity.y - (vy - 0.5)).abs() < 1e-5);
        }
    }

    #[test]
    fn burst_retires_and_parks_particles() {
        let mut e = emitter();
        let mut rng = SmallRng::seed_from_u64(5);
        e.emit(Vec3::new(0.0, 0.4, 0.0), &mut rng);
        // 1.5s of life drained at 1.2x is gone after 1.25s
        let mut done = false;
        for _ in 0..20 {
            done = e.tick(0.1);
            if done {
                break;
            }
        }
        assert!(done);
        assert!(!e.is_active());
        assert_eq!(e.opacity(), 0.0);
        for p in e.particles() {
            assert_eq!(p.lifetime, 0.0);
            assert_eq!(p.position, PARKED_POSITION);
        }
    }

    #[test]
    fn opacity_tracks_mean_lifetime() {
        let mut e = emitter();
        let mut rng = SmallRng::seed_from_u64(9);
        e.emit(Vec3::ZERO, &mut rng);
        e.tick(0.25);
        // every particle lost 0.3s
        assert!((e.opacity() - 1.2 * 0.8).abs() < 1e-4);
    }
}
