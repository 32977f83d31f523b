//! Perspective camera and the rig that remembers its rest pose.

use glam::{Mat4, Vec3};

use crate::config::CameraConfig;

#[derive(Clone, Debug)]
pub struct Camera {
    pub fov_y_deg: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    pub position: Vec3,
    target: Vec3,
}

impl Camera {
    pub fn new(fov_y_deg: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            fov_y_deg,
            aspect,
            near,
            far,
            position: Vec3::ZERO,
            target: Vec3::NEG_Z,
        }
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    /// Aspect becomes exactly `width / height`. A zero height is ignored.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if height == 0 {
            log::debug!("ignoring zero-height viewport ({width}x{height})");
            return;
        }
        self.aspect = width as f32 / height as f32;
    }

    pub fn view(&self) -> Mat4 {
        // look_at_rh degenerates when target == position
        let target = if self.target.abs_diff_eq(self.position, 1e-6) {
            self.position + Vec3::NEG_Z
        } else {
            self.target
        };
        Mat4::look_at_rh(self.position, target, Vec3::Y)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_y_deg.to_radians(), self.aspect, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view()
    }
}

/// Camera plus the pose it returns to once a sequence is over.
#[derive(Clone, Debug)]
pub struct CameraRig {
    pub camera: Camera,
    rest_position: Vec3,
    rest_target: Vec3,
}

impl CameraRig {
    pub fn new(config: &CameraConfig, aspect: f32) -> Self {
        let mut camera = Camera::new(config.fov_deg, aspect, config.near, config.far);
        let rest_position = Vec3::from(config.position);
        let rest_target = Vec3::from(config.target);
        camera.position = rest_position;
        camera.look_at(rest_target);
        Self {
            camera,
            rest_position,
            rest_target,
        }
    }

    pub fn rest_position(&self) -> Vec3 {
        self.rest_position
    }

    pub fn rest_target(&self) -> Vec3 {
        self.rest_target
    }

    /// One asymptotic step toward the rest pose; `factor` is clamped to 1.
    pub fn ease_to_rest(&mut self, factor: f32) {
        let t = factor.clamp(0.0, 1.0);
        self.camera.position = self.camera.position.lerp(self.rest_position, t);
        self.camera.look_at(self.rest_target);
    }
}
