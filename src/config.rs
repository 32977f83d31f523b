//! Tunables for the scenes and the page.
//!
//! Every struct carries the shipped values in its `Default` impl. With the
//! `serde` feature the structs can be deserialized from partial JSON; missing
//! fields keep their defaults.

#[cfg(feature = "serde")]
use serde::Deserialize;

/// Perspective camera placement.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize), serde(default))]
pub struct CameraConfig {
    pub fov_deg: f32,
    pub near: f32,
    pub far: f32,
    pub position: [f32; 3],
    pub target: [f32; 3],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_deg: 50.0,
            near: 0.1,
            far: 1000.0,
            position: [0.0, 2.5, 8.0],
            target: [0.0, 2.0, 0.0],
        }
    }
}

/// Burst particle behaviour.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize), serde(default))]
pub struct ParticleConfig {
    /// Seconds of life given to every particle on emit.
    pub lifetime: f32,
    /// Lifetime drain multiplier applied to the frame delta.
    pub decay_rate: f32,
    /// Downward acceleration in units/s².
    pub gravity: f32,
    /// Full width of the cube around the origin particles spawn in.
    pub jitter: f32,
    pub min_speed: f32,
    pub speed_spread: f32,
    /// Shifts the polar angle range so most particles leave upward.
    pub upward_bias: f32,
    pub vertical_scale: f32,
    pub opacity_scale: f32,
    pub color: [u8; 3],
    /// On-screen point size in world units.
    pub size: f32,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            lifetime: 1.5,
            decay_rate: 1.2,
            gravity: 5.0,
            jitter: 0.3,
            min_speed: 1.5,
            speed_spread: 2.0,
            upward_bias: 0.3,
            vertical_scale: 0.8,
            opacity_scale: 0.8,
            color: [0xff, 0x33, 0x66],
            size: 0.1,
        }
    }
}

/// Idle hover and defeat sequence timings.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize), serde(default))]
pub struct DefeatConfig {
    pub hover_height: f32,
    pub bob_amplitude: f32,
    pub bob_rate: f32,
    pub drift_amplitude: f32,
    pub drift_rate: f32,
    pub sway_amplitude: f32,
    pub idle_dolly_amplitude: f32,
    pub idle_dolly_rate: f32,

    /// Seconds from trigger to full progress.
    pub duration: f32,
    pub start_height: f32,
    pub end_height: f32,
    pub wobble_end: f32,
    pub wobble_rate: f32,
    pub wobble_strength: f32,
    pub initial_spin: f32,
    pub spin_noise: f32,
    pub spin_damping: f32,
    pub fall_drift_x: f32,
    pub fall_drift_z: f32,
    pub drift_decay: f32,
    pub dolly_start: f32,
    pub dolly_end: f32,
    pub dolly_distance: f32,
    pub shake: f32,
    pub camera_lift: f32,
    pub camera_lift_drop: f32,
    pub look_above: f32,
    pub burst_upper: f32,
    pub burst_lower: f32,
    pub fade_start: f32,
    pub finish_opacity: f32,
    /// Per-second lerp factor used to bring the camera back to rest.
    pub rest_ease_rate: f32,
}

impl Default for DefeatConfig {
    fn default() -> Self {
        Self {
            hover_height: 2.0,
            bob_amplitude: 0.1,
            bob_rate: 2.0,
            drift_amplitude: 0.3,
            drift_rate: 0.5,
            sway_amplitude: 0.1,
            idle_dolly_amplitude: 0.5,
            idle_dolly_rate: 0.3,
            duration: 2.5,
            start_height: 2.0,
            end_height: -2.0,
            wobble_end: 0.2,
            wobble_rate: 8.0,
            wobble_strength: 0.4,
            initial_spin: 0.5,
            spin_noise: 0.2,
            spin_damping: 0.98,
            fall_drift_x: 0.5,
            fall_drift_z: 0.3,
            drift_decay: 0.7,
            dolly_start: 0.6,
            dolly_end: 0.9,
            dolly_distance: 2.0,
            shake: 0.15,
            camera_lift: 1.5,
            camera_lift_drop: 0.5,
            look_above: 0.3,
            burst_upper: 0.5,
            burst_lower: -1.0,
            fade_start: 0.75,
            finish_opacity: 0.05,
            rest_ease_rate: 1.5,
        }
    }
}

/// Exponential squared fog.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize), serde(default))]
pub struct FogConfig {
    pub color: [u8; 3],
    pub density: f32,
}

impl Default for FogConfig {
    fn default() -> Self {
        Self {
            color: [0x0a, 0x0a, 0x0a],
            density: 0.01,
        }
    }
}

/// Mosquito boss-fight scene.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize), serde(default))]
pub struct MosquitoConfig {
    pub asset_base: String,
    pub primary_model: String,
    pub fallback_model: String,
    pub camera: CameraConfig,
    pub defeat: DefeatConfig,
    pub particles: ParticleConfig,
    pub fog: Option<FogConfig>,
    /// Longest frame delta fed to the simulation, in seconds.
    pub max_frame_delta: f32,
    pub flash_ms: u32,
}

impl Default for MosquitoConfig {
    fn default() -> Self {
        Self {
            asset_base: "./".into(),
            primary_model: "aedes.glb".into(),
            fallback_model: "aedes.gltf".into(),
            camera: CameraConfig::default(),
            defeat: DefeatConfig::default(),
            particles: ParticleConfig::default(),
            fog: Some(FogConfig::default()),
            max_frame_delta: 0.1,
            flash_ms: 200,
        }
    }
}

/// Toilet viewer scene.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize), serde(default))]
pub struct ToiletConfig {
    pub asset_base: String,
    pub materials: String,
    pub geometry: String,
    pub camera: CameraConfig,
    pub model_height: f32,
    pub sway_amplitude: f32,
    pub sway_rate: f32,
    pub placeholder_size: f32,
    pub placeholder_height: f32,
    pub placeholder_color: [u8; 3],
    /// Applied when the container reports a zero size.
    pub fallback_size: u32,
    pub max_frame_delta: f32,
}

impl Default for ToiletConfig {
    fn default() -> Self {
        Self {
            asset_base: "./".into(),
            materials: "toilet1.mtl".into(),
            geometry: "toilet.obj".into(),
            camera: CameraConfig {
                fov_deg: 45.0,
                position: [0.0, 2.0, 8.0],
                target: [0.0, 0.0, 0.0],
                ..CameraConfig::default()
            },
            model_height: -1.5,
            sway_amplitude: 0.1,
            sway_rate: 0.3,
            placeholder_size: 2.0,
            placeholder_height: -1.0,
            placeholder_color: [0x33, 0x33, 0x33],
            fallback_size: 400,
            max_frame_delta: 0.1,
        }
    }
}

/// A message-card keyword set and the audio element it plays.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize))]
pub struct CardCue {
    pub keywords: Vec<String>,
    pub audio_id: String,
}

/// Element ids and copy used by the page controller.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Deserialize), serde(default))]
pub struct PageConfig {
    pub landing_id: String,
    pub main_id: String,
    pub play_button_id: String,
    pub boss_button_id: String,
    pub message_display_id: String,
    pub boss_result_id: String,
    pub intro_audio_id: String,
    pub theme_audio_id: String,
    pub boss_audio_id: String,
    pub mosquito_image_id: String,
    pub mosquito_container_id: String,
    pub mosquito_scene_id: String,
    pub toilet_container_id: String,
    pub swap_button_id: String,
    pub swap_image_id: String,
    pub swap_audio_id: String,
    pub flush_button_id: String,
    pub flush_audio_id: String,
    pub finale_section_id: String,
    pub finale_audio_id: String,
    pub card_selector: String,
    pub card_cues: Vec<CardCue>,
    pub swap_images: Vec<String>,
    pub boss_result_text: String,
    pub flicker_steps: u32,
    pub flicker_ms: u32,
    pub landing_fade_ms: u32,
    pub toilet_delay_ms: u32,
    pub flush_ms: u32,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            landing_id: "landing".into(),
            main_id: "main-content".into(),
            play_button_id: "play-btn".into(),
            boss_button_id: "boss-fight-btn".into(),
            message_display_id: "message-display".into(),
            boss_result_id: "boss-result".into(),
            intro_audio_id: "intro-stranger-audio".into(),
            theme_audio_id: "netflix-audio".into(),
            boss_audio_id: "covid-audio".into(),
            mosquito_image_id: "mosquito-image".into(),
            mosquito_container_id: "mosquito-container".into(),
            mosquito_scene_id: "mosquito-scene".into(),
            toilet_container_id: "toilet-container".into(),
            swap_button_id: "swap-btn".into(),
            swap_image_id: "swap-img".into(),
            swap_audio_id: "swap-audio".into(),
            flush_button_id: "flush-btn".into(),
            flush_audio_id: "descarga-audio".into(),
            finale_section_id: "finale-section".into(),
            finale_audio_id: "finale-audio".into(),
            card_selector: ".message-card".into(),
            card_cues: vec![
                CardCue {
                    keywords: vec!["roncado".into(), "ronco".into()],
                    audio_id: "ronco-audio".into(),
                },
                CardCue {
                    keywords: vec!["internacional".into(), "inter".into()],
                    audio_id: "inter-audio".into(),
                },
            ],
            swap_images: vec![
                "./swap1.jpg".into(),
                "./swap2.jpeg".into(),
                "./swap3.png".into(),
                "./swap4.png".into(),
                "./swap5.jpeg".into(),
            ],
            boss_result_text: "1 mosquito a menos. 100 carinhos a mais.".into(),
            flicker_steps: 8,
            flicker_ms: 150,
            landing_fade_ms: 600,
            toilet_delay_ms: 500,
            flush_ms: 2000,
        }
    }
}

/// Joins an asset base with a file name, tolerating a missing trailing slash.
pub fn asset_url(base: &str, file: &str) -> String {
    if base.is_empty() || base.ends_with('/') {
        format!("{base}{file}")
    } else {
        format!("{base}/{file}")
    }
}
