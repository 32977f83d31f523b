//! Page controller: landing transition, message cards, the boss fight button
//! and the image-swap / flush finale.
//!
//! All handlers share one `Rc<Page>`; element lookups happen once at wiring
//! time. Optional elements that are absent simply disable their feature.

mod sequences;

pub use sequences::{
    BEEP_GAIN, BEEP_GAIN_END, BEEP_HZ, BEEP_SECONDS, FallFrame, IMAGE_FALL_SECONDS, SwapSequence,
    SwapStep, cue_for, flicker_opacity,
};

use std::cell::RefCell;
use std::rc::Rc;

use gloo::events::EventListener;
use gloo::timers::callback::Timeout;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{JsFuture, spawn_local};
use web_sys::{
    AudioContext, Document, Element, HtmlAudioElement, HtmlButtonElement, HtmlElement,
    HtmlImageElement, OscillatorType, ScrollBehavior, ScrollIntoViewOptions, ScrollLogicalPosition,
};

use crate::config::PageConfig;
use crate::error::{SceneError, js_error_text};
use crate::frame_loop::FrameLoop;
use crate::mosquito::{MosquitoSceneHandle, init_mosquito_scene};
use crate::toilet::{ToiletSceneHandle, init_toilet_scene};

const EASE_OUT: &str = "cubic-bezier(0.4, 0, 0.2, 1)";
const FLUSH_CURVE: &str = "cubic-bezier(0.5, 0, 0.8, 1)";

fn by_id<T: JsCast>(doc: &Document, id: &str) -> Option<T> {
    doc.get_element_by_id(id).and_then(|e| e.dyn_into::<T>().ok())
}

fn required(doc: &Document, id: &str) -> Result<HtmlElement, SceneError> {
    by_id(doc, id).ok_or_else(|| SceneError::MissingElement(id.to_string()))
}

fn set_style(el: &HtmlElement, property: &str, value: &str) {
    el.style().set_property(property, value).ok();
}

fn after(ms: u32, f: impl FnOnce() + 'static) {
    Timeout::new(ms, f).forget();
}

/// Play `audio` at `volume`, optionally from the start. Autoplay refusals are
/// logged and otherwise ignored.
fn play(audio: &HtmlAudioElement, volume: f64, restart: bool) {
    if restart {
        audio.set_current_time(0.0);
    }
    audio.set_volume(volume);
    let id = audio.id();
    match audio.play() {
        Ok(promise) => spawn_local(async move {
            if let Err(err) = JsFuture::from(promise).await {
                log::info!("playback of #{id} prevented: {}", js_error_text(&err));
            }
        }),
        Err(err) => log::info!("playback of #{id} failed: {}", js_error_text(&err)),
    }
}

fn rewind(audio: &HtmlAudioElement) {
    audio.pause().ok();
    audio.set_current_time(0.0);
}

/// Short square-wave thud through Web Audio.
fn play_impact_beep() -> Result<(), JsValue> {
    let ctx = AudioContext::new()?;
    let osc = ctx.create_oscillator()?;
    let gain = ctx.create_gain()?;
    osc.connect_with_audio_node(&gain)?;
    gain.connect_with_audio_node(&ctx.destination())?;
    osc.frequency().set_value(BEEP_HZ);
    osc.set_type(OscillatorType::Square);
    let now = ctx.current_time();
    gain.gain().set_value_at_time(BEEP_GAIN, now)?;
    gain.gain().exponential_ramp_to_value_at_time(BEEP_GAIN_END, now + BEEP_SECONDS)?;
    osc.start_with_when(now)?;
    osc.stop_with_when(now + BEEP_SECONDS)?;
    Ok(())
}

struct Page {
    config: PageConfig,
    doc: Document,
    landing: HtmlElement,
    main: HtmlElement,
    boss_button: HtmlElement,
    message_display: HtmlElement,
    boss_result: HtmlElement,
    intro_audio: Option<HtmlAudioElement>,
    mosquito: RefCell<Option<MosquitoSceneHandle>>,
    toilet: RefCell<Option<ToiletSceneHandle>>,
    image_fall: RefCell<Option<FrameLoop>>,
    swap: RefCell<SwapSequence>,
}

impl Page {
    fn wire(config: PageConfig) -> Result<Rc<Self>, SceneError> {
        let doc = web_sys::window()
            .ok_or(SceneError::NoWindow)?
            .document()
            .ok_or(SceneError::NoDocument)?;
        let play_button = required(&doc, &config.play_button_id)?;
        let landing = required(&doc, &config.landing_id)?;
        let main = required(&doc, &config.main_id)?;
        let boss_button = required(&doc, &config.boss_button_id)?;
        let message_display = required(&doc, &config.message_display_id)?;
        let boss_result = required(&doc, &config.boss_result_id)?;

        let page = Rc::new(Self {
            landing,
            main,
            boss_button,
            message_display,
            boss_result,
            intro_audio: by_id(&doc, &config.intro_audio_id),
            mosquito: RefCell::new(None),
            toilet: RefCell::new(None),
            image_fall: RefCell::new(None),
            swap: RefCell::new(SwapSequence::new(config.swap_images.len())),
            doc,
            config,
        });

        if let Some(intro) = &page.intro_audio {
            play(intro, 0.4, false);
        }
        // pages that skip the landing screen get their scene right away
        page.mount_mosquito_once();

        let p = page.clone();
        EventListener::new(&play_button, "click", move |_| {
            if let Some(intro) = &p.intro_audio {
                rewind(intro);
            }
            p.enter_main();
        })
        .forget();

        page.wire_cards()?;

        let p = page.clone();
        EventListener::new(&page.boss_button, "click", move |_| p.boss_fight()).forget();

        page.wire_swap();
        page.wire_flush();
        log::info!("page wired");
        Ok(page)
    }

    fn wire_cards(self: &Rc<Self>) -> Result<(), SceneError> {
        let cards = self.doc.query_selector_all(&self.config.card_selector)?;
        for i in 0..cards.length() {
            let Some(card) = cards.item(i).and_then(|n| n.dyn_into::<Element>().ok()) else {
                continue;
            };
            let p = self.clone();
            let target = card.clone();
            EventListener::new(&card, "click", move |_| {
                if let Some(message) = target.get_attribute("data-message") {
                    p.show_message(&message);
                }
            })
            .forget();
        }
        log::debug!("{} message cards wired", cards.length());
        Ok(())
    }

    fn show_message(&self, message: &str) {
        let display = &self.message_display;
        display.set_text_content(Some(message));
        display.class_list().add_1("active").ok();
        let opts = ScrollIntoViewOptions::new();
        opts.set_behavior(ScrollBehavior::Smooth);
        opts.set_block(ScrollLogicalPosition::Nearest);
        display.scroll_into_view_with_scroll_into_view_options(&opts);

        if let Some(id) = cue_for(message, &self.config.card_cues) {
            match by_id::<HtmlAudioElement>(&self.doc, id) {
                Some(audio) => play(&audio, 0.6, true),
                None => log::debug!("no audio element #{id} for message cue"),
            }
        }
    }

    /// Fade the landing screen out, then flicker the main screen in.
    fn enter_main(self: &Rc<Self>) {
        set_style(&self.landing, "transition", "opacity 0.6s ease");
        set_style(&self.landing, "opacity", "0");

        let p = self.clone();
        after(self.config.landing_fade_ms, move || {
            p.landing.class_list().remove_1("active").ok();
            p.main.class_list().add_1("active").ok();
            p.mount_mosquito_once();
            if let Some(theme) = by_id::<HtmlAudioElement>(&p.doc, &p.config.theme_audio_id) {
                play(&theme, 0.3, false);
            }
            p.main.class_list().add_1("entering-upside-down").ok();
            set_style(&p.main, "opacity", "0");
            set_style(&p.main, "transition", "opacity 0.3s ease");
            p.flicker(1);
        });
    }

    fn flicker(self: &Rc<Self>, step: u32) {
        let p = self.clone();
        after(self.config.flicker_ms, move || {
            set_style(&p.main, "opacity", &flicker_opacity(step).to_string());
            if step < p.config.flicker_steps {
                p.flicker(step + 1);
                return;
            }
            set_style(&p.main, "opacity", "1");
            let classes = p.main.class_list();
            classes.remove_1("entering-upside-down").ok();
            classes.add_1("in-upside-down").ok();
            if let Ok(Some(checklist)) = p.main.query_selector(".checklist-section") {
                checklist.class_list().add_1("flicker-active").ok();
            }
            let q = p.clone();
            after(p.config.toilet_delay_ms, move || q.init_toilet_once());
        });
    }

    /// The scene measures its container on mount, so it waits until the
    /// main screen is laid out.
    fn mount_mosquito_once(&self) {
        if self.mosquito.borrow().is_some() || !self.main.class_list().contains("active") {
            return;
        }
        let Some(container) = by_id::<HtmlElement>(&self.doc, &self.config.mosquito_scene_id)
        else {
            return;
        };
        *self.mosquito.borrow_mut() = init_mosquito_scene(container);
    }

    fn init_toilet_once(&self) {
        if self.toilet.borrow().is_some() || !self.main.class_list().contains("active") {
            return;
        }
        let Some(container) = by_id::<HtmlElement>(&self.doc, &self.config.toilet_container_id)
        else {
            log::debug!("no toilet container on this page");
            return;
        };
        *self.toilet.borrow_mut() = init_toilet_scene(container);
    }

    fn boss_fight(self: &Rc<Self>) {
        let has_scene = self.mosquito.borrow().is_some();
        let image = by_id::<HtmlElement>(&self.doc, &self.config.mosquito_image_id);
        let container = by_id::<HtmlElement>(&self.doc, &self.config.mosquito_container_id);
        if !has_scene && (image.is_none() || container.is_none()) {
            log::warn!("boss fight has neither a 3D scene nor a mosquito image");
            return;
        }

        match self.boss_button.dyn_ref::<HtmlButtonElement>() {
            Some(button) => button.set_disabled(true),
            None => {
                self.boss_button.set_attribute("disabled", "").ok();
            }
        }
        if let Some(audio) = by_id::<HtmlAudioElement>(&self.doc, &self.config.boss_audio_id) {
            play(&audio, 0.5, true);
        }
        if let Err(err) = play_impact_beep() {
            log::info!("impact sound unavailable: {}", js_error_text(&err));
        }

        let promise = self.mosquito.borrow().as_ref().map(|scene| scene.trigger_defeat());
        if let Some(promise) = promise {
            let p = self.clone();
            spawn_local(async move {
                if let Err(err) = JsFuture::from(promise).await {
                    log::warn!("defeat sequence failed: {}", js_error_text(&err));
                }
                p.show_boss_result();
            });
            return;
        }
        if let Some(image) = image {
            self.fall_image(image);
        }
    }

    fn fall_image(self: &Rc<Self>, image: HtmlElement) {
        set_style(&image, "transition", "none");
        let p = self.clone();
        let mut elapsed = 0.0f32;
        let started = FrameLoop::start(f32::MAX, move |dt| {
            elapsed += dt;
            let progress = (elapsed / IMAGE_FALL_SECONDS).min(1.0);
            let frame = FallFrame::at(progress);
            set_style(&image, "transform", &frame.css_transform());
            set_style(&image, "opacity", &frame.opacity.to_string());
            if progress < 1.0 {
                return true;
            }
            set_style(&image, "display", "none");
            p.show_boss_result();
            false
        });
        match started {
            Ok(fall) => *self.image_fall.borrow_mut() = Some(fall),
            Err(err) => log::error!("could not animate the mosquito image: {err}"),
        }
    }

    fn show_boss_result(&self) {
        self.boss_result.set_text_content(Some(&self.config.boss_result_text));
        self.boss_result.class_list().add_1("active").ok();
    }

    fn wire_swap(self: &Rc<Self>) {
        let cfg = &self.config;
        let button = by_id::<HtmlElement>(&self.doc, &cfg.swap_button_id);
        let image = by_id::<HtmlImageElement>(&self.doc, &cfg.swap_image_id);
        let audio = by_id::<HtmlAudioElement>(&self.doc, &cfg.swap_audio_id);
        let (Some(button), Some(image), Some(audio)) = (button, image, audio) else {
            log::debug!("image swap elements absent, skipping");
            return;
        };
        let p = self.clone();
        let target = button.clone();
        EventListener::new(&button, "click", move |_| {
            let step = p.swap.borrow_mut().click();
            play(&audio, 0.6, true);
            p.swap_step(&step, &target, &image);
        })
        .forget();
    }

    fn swap_step(self: &Rc<Self>, step: &SwapStep, button: &HtmlElement, image: &HtmlImageElement) {
        if let Some(next) = step.next_image {
            set_style(image, "transition", &format!("transform 0.5s {EASE_OUT}"));
            set_style(image, "transform", "rotateY(90deg) scale(0.7)");
            let src = self.config.swap_images.get(next).cloned().unwrap_or_default();
            let (p, img, last) = (self.clone(), image.clone(), step.reaches_last);
            // flip the source while the image is edge-on
            after(250, move || {
                img.set_src(&src);
                after(50, move || {
                    if last {
                        set_style(&img, "transform", "rotateY(0deg) rotate(180deg) scale(1)");
                        p.reveal_flush();
                    } else {
                        set_style(&img, "transform", "rotateY(0deg) scale(1)");
                    }
                });
            });
        }

        set_style(button, "top", &format!("{}%", step.button_top_pct));
        set_style(
            button,
            "transform",
            &format!("translateX(-50%) scale({})", step.button_scale),
        );
        set_style(
            button,
            "transition",
            &format!("top 0.8s {EASE_OUT}, transform 0.8s {EASE_OUT}"),
        );
        set_style(button, "animation", "none");
        let b = button.clone();
        after(10, move || set_style(&b, "animation", "shake 0.3s ease"));
    }

    fn reveal_flush(&self) {
        let Some(flush) = by_id::<HtmlElement>(&self.doc, &self.config.flush_button_id) else {
            return;
        };
        set_style(&flush, "display", "block");
        after(100, move || {
            set_style(&flush, "opacity", "1");
            set_style(&flush, "transform", "scale(1)");
        });
    }

    fn wire_flush(self: &Rc<Self>) {
        let Some(flush) = by_id::<HtmlElement>(&self.doc, &self.config.flush_button_id) else {
            log::warn!("flush button not found");
            return;
        };
        let p = self.clone();
        let target = flush.clone();
        EventListener::new(&flush, "click", move |_| {
            if let Err(err) = p.flush(&target) {
                log::error!("flush unavailable: {err}");
            }
        })
        .forget();
    }

    fn flush(self: &Rc<Self>, flush: &HtmlElement) -> Result<(), SceneError> {
        let cfg = &self.config;
        let image: HtmlElement = required(&self.doc, &cfg.swap_image_id)?;
        let button = required(&self.doc, &cfg.swap_button_id)?;
        let toilet_container = required(&self.doc, &cfg.toilet_container_id)?;
        let finale = required(&self.doc, &cfg.finale_section_id)?;
        let flush_audio: HtmlAudioElement = by_id(&self.doc, &cfg.flush_audio_id)
            .ok_or_else(|| SceneError::MissingElement(cfg.flush_audio_id.clone()))?;
        let finale_audio: HtmlAudioElement = by_id(&self.doc, &cfg.finale_audio_id)
            .ok_or_else(|| SceneError::MissingElement(cfg.finale_audio_id.clone()))?;

        set_style(flush, "pointer-events", "none");
        play(&flush_audio, 0.7, true);
        after(cfg.flush_ms, move || rewind(&flush_audio));

        let spin = format!("transform 2s {FLUSH_CURVE}, opacity 2s ease");
        set_style(&image, "transition", &spin);
        set_style(&button, "transition", &spin);
        set_style(&image, "transform", "rotate(1080deg) scale(0.1) translateY(200px)");
        set_style(
            &button,
            "transform",
            "translateX(-50%) rotate(1080deg) scale(0.1) translateY(200px)",
        );
        set_style(&image, "opacity", "0");
        set_style(&button, "opacity", "0");

        let (p, flush) = (self.clone(), flush.clone());
        after(cfg.flush_ms, move || {
            set_style(&button, "display", "none");
            set_style(&flush, "display", "none");
            set_style(&toilet_container, "display", "none");
            if let Some(mut toilet) = p.toilet.borrow_mut().take() {
                toilet.cleanup();
            }

            set_style(&finale, "display", "block");
            set_style(&finale, "opacity", "0");
            set_style(&finale, "transform", "scale(0.8)");
            set_style(&finale, "transition", "opacity 1s ease, transform 1s ease");
            play(&finale_audio, 0.6, true);
            after(100, move || {
                set_style(&finale, "opacity", "1");
                set_style(&finale, "transform", "scale(1)");
            });
        });
        Ok(())
    }
}

/// Wire the page's DOM. Missing required elements are logged and leave the
/// page inert.
#[wasm_bindgen]
pub fn init_page() {
    wire_or_log(PageConfig::default());
}

#[cfg(feature = "serde_json")]
#[wasm_bindgen]
pub fn init_page_with_config(config_json: &str) {
    match serde_json::from_str::<PageConfig>(config_json) {
        Ok(config) => wire_or_log(config),
        Err(err) => log::error!("invalid page config: {err}"),
    }
}

fn wire_or_log(config: PageConfig) {
    if let Err(err) = Page::wire(config) {
        log::error!("page not initialized: {err}");
    }
}
