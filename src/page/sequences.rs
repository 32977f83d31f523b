//! Timing and geometry of the page animations, kept free of DOM access.

use crate::config::CardCue;

/// Length of the 2D image fall used when no 3D scene is mounted.
pub const IMAGE_FALL_SECONDS: f32 = 2.5;

/// Impact beep: square wave, gain ramping from 0.1 down to 0.01.
pub const BEEP_HZ: f32 = 200.0;
pub const BEEP_SECONDS: f64 = 0.2;
pub const BEEP_GAIN: f32 = 0.1;
pub const BEEP_GAIN_END: f32 = 0.01;

/// Audio element id for the first cue whose keyword occurs in `message`,
/// compared case-insensitively.
pub fn cue_for<'a>(message: &str, cues: &'a [CardCue]) -> Option<&'a str> {
    let lower = message.to_lowercase();
    cues.iter()
        .find(|cue| cue.keywords.iter().any(|k| lower.contains(&k.to_lowercase())))
        .map(|cue| cue.audio_id.as_str())
}

/// Main screen opacity on flicker step `step` (1-based).
pub fn flicker_opacity(step: u32) -> f32 {
    if step % 2 == 0 { 0.3 } else { 0.8 }
}

/// One frame of the 2D mosquito fall.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FallFrame {
    pub wobble_px: f32,
    pub fall_px: f32,
    pub rotation_deg: f32,
    pub scale: f32,
    pub opacity: f32,
}

impl FallFrame {
    /// Frame at `progress` in `0..=1`: a fading wobble over the first 20%,
    /// then three eased-in turns while shrinking and dropping 200px.
    pub fn at(progress: f32) -> Self {
        let p = progress.clamp(0.0, 1.0);
        let ease = p * p * p;
        let wobble_px = if p < 0.2 {
            (p * 40.0).sin() * (1.0 - p * 5.0) * 10.0
        } else {
            0.0
        };
        Self {
            wobble_px,
            fall_px: ease * 200.0,
            rotation_deg: ease * 1080.0,
            scale: 1.0 - ease * 0.7,
            opacity: 1.0 - ease,
        }
    }

    pub fn css_transform(&self) -> String {
        format!(
            "translateX({:.2}px) translateY({:.2}px) rotate({:.1}deg) scale({:.3})",
            self.wobble_px, self.fall_px, self.rotation_deg, self.scale
        )
    }
}

/// What one click on the image-swap button should do.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SwapStep {
    /// Index of the image to flip to, if there is one left.
    pub next_image: Option<usize>,
    /// The flip lands on the final image.
    pub reaches_last: bool,
    pub button_scale: f32,
    /// Button `top`, in percent of its container.
    pub button_top_pct: f32,
}

/// Click counter walking through a fixed image list.
#[derive(Clone, Debug, PartialEq)]
pub struct SwapSequence {
    images: usize,
    shown: usize,
    clicks: usize,
}

impl SwapSequence {
    pub fn new(images: usize) -> Self {
        Self {
            images,
            shown: 0,
            clicks: 0,
        }
    }

    pub fn shown(&self) -> usize {
        self.shown
    }

    pub fn click(&mut self) -> SwapStep {
        self.clicks += 1;
        let last = self.images.saturating_sub(1);
        // progress is taken before the flip lands
        let progress = if self.shown == last || self.images == 0 {
            1.0
        } else {
            (self.clicks as f32 / self.images as f32).min(1.0)
        };
        let next_image = (self.shown < last).then(|| {
            self.shown += 1;
            self.shown
        });
        SwapStep {
            next_image,
            reaches_last: next_image == Some(last),
            button_scale: (1.0 - progress * 0.7).max(0.3),
            button_top_pct: 80.0 * progress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageConfig;

    #[test]
    fn cues_match_case_insensitively_in_order() {
        let cues = PageConfig::default().card_cues;
        assert_eq!(cue_for("Aquele RONCO de sempre", &cues), Some("ronco-audio"));
        assert_eq!(cue_for("jogo do Internacional", &cues), Some("inter-audio"));
        assert_eq!(cue_for("ronco no inter", &cues), Some("ronco-audio"));
        assert_eq!(cue_for("nada aqui", &cues), None);
    }

    #[test]
    fn flicker_alternates() {
        let steps: Vec<f32> = (1..=4).map(flicker_opacity).collect();
        assert_eq!(steps, vec![0.8, 0.3, 0.8, 0.3]);
    }

    #[test]
    fn fall_starts_still_and_ends_gone() {
        let start = FallFrame::at(0.0);
        assert_eq!(start.wobble_px, 0.0);
        assert_eq!(start.scale, 1.0);
        assert_eq!(start.opacity, 1.0);

        let end = FallFrame::at(1.0);
        assert_eq!(end.rotation_deg, 1080.0);
        assert_eq!(end.fall_px, 200.0);
        assert!((end.scale - 0.3).abs() < 1e-6);
        assert_eq!(end.opacity, 0.0);
        assert_eq!(end, FallFrame::at(3.0));
    }

    #[test]
    fn wobble_only_in_first_fifth() {
        assert!(FallFrame::at(0.05).wobble_px.abs() > 0.0);
        assert_eq!(FallFrame::at(0.25).wobble_px, 0.0);
    }

    #[test]
    fn fall_transform_is_css() {
        assert_eq!(
            FallFrame::at(1.0).css_transform(),
            "translateX(0.00px) translateY(200.00px) rotate(1080.0deg) scale(0.300)"
        );
    }

    #[test]
    fn swap_walks_images_then_stops() {
        let mut seq = SwapSequence::new(5);
        let steps: Vec<SwapStep> = (0..6).map(|_| seq.click()).collect();
        let flips: Vec<Option<usize>> = steps.iter().map(|s| s.next_image).collect();
        assert_eq!(flips, vec![Some(1), Some(2), Some(3), Some(4), None, None]);
        assert!(steps[3].reaches_last);
        assert!(steps.iter().take(3).all(|s| !s.reaches_last));
        assert_eq!(seq.shown(), 4);
    }

    #[test]
    fn swap_button_shrinks_toward_the_bottom() {
        let mut seq = SwapSequence::new(5);
        let first = seq.click();
        assert!((first.button_scale - 0.86).abs() < 1e-5);
        assert!((first.button_top_pct - 16.0).abs() < 1e-4);
        for _ in 0..3 {
            seq.click();
        }
        let at_last = seq.click();
        assert_eq!(at_last.button_top_pct, 80.0);
        assert!((at_last.button_scale - 0.3).abs() < 1e-6);
    }
}
