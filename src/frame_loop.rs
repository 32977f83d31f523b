//! `requestAnimationFrame` driver shared by both scenes.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use crate::error::SceneError;

type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut(f64)>>>>;

/// Turns rAF timestamps into clamped frame deltas in seconds.
#[derive(Clone, Copy, Debug)]
pub struct FrameClock {
    last_ms: Option<f64>,
    max_delta: f32,
}

impl FrameClock {
    pub fn new(max_delta: f32) -> Self {
        Self {
            last_ms: None,
            max_delta,
        }
    }

    /// Delta since the previous frame. The first frame and clocks running
    /// backwards yield 0; long stalls are capped at `max_delta`.
    pub fn delta(&mut self, now_ms: f64) -> f32 {
        let dt = match self.last_ms {
            Some(last) => ((now_ms - last) / 1000.0).max(0.0) as f32,
            None => 0.0,
        };
        self.last_ms = Some(now_ms);
        dt.min(self.max_delta)
    }
}

/// A running animation loop. Dropping it stops the loop.
pub struct FrameLoop {
    running: Rc<Cell<bool>>,
    pending: Rc<Cell<Option<i32>>>,
    callback: FrameCallback,
}

impl FrameLoop {
    /// Call `tick(dt)` once per animation frame until it returns false or
    /// [`FrameLoop::stop`] is called.
    pub fn start<F>(max_delta: f32, mut tick: F) -> Result<Self, SceneError>
    where
        F: FnMut(f32) -> bool + 'static,
    {
        let window = web_sys::window().ok_or(SceneError::NoWindow)?;
        let running = Rc::new(Cell::new(true));
        let pending: Rc<Cell<Option<i32>>> = Rc::new(Cell::new(None));
        let f: FrameCallback = Rc::new(RefCell::new(None));
        let g = f.clone();

        let mut clock = FrameClock::new(max_delta);
        let (run, next) = (running.clone(), pending.clone());
        *g.borrow_mut() = Some(Closure::wrap(Box::new(move |ts: f64| {
            next.set(None);
            if !run.get() {
                return;
            }
            let keep_going = tick(clock.delta(ts));
            // tick may also have stopped the loop itself
            if !keep_going {
                run.set(false);
                f.borrow_mut().take();
                return;
            }
            if !run.get() {
                return;
            }
            if let (Some(w), Some(cb)) = (web_sys::window(), f.borrow().as_ref()) {
                match w.request_animation_frame(cb.as_ref().unchecked_ref()) {
                    Ok(id) => next.set(Some(id)),
                    Err(e) => log::error!("requestAnimationFrame failed: {e:?}"),
                }
            }
        }) as Box<dyn FnMut(f64)>));

        let first = match g.borrow().as_ref() {
            Some(cb) => window.request_animation_frame(cb.as_ref().unchecked_ref())?,
            None => return Err(SceneError::Js("frame callback missing".into())),
        };
        pending.set(Some(first));
        Ok(Self {
            running,
            pending,
            callback: g,
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Cancel the pending frame and release the callback. Safe to call
    /// repeatedly.
    pub fn stop(&self) {
        if !self.running.replace(false) {
            return;
        }
        if let (Some(id), Some(w)) = (self.pending.take(), web_sys::window()) {
            let _ = w.cancel_animation_frame(id);
        }
        // breaks the self-reference held by the closure
        self.callback.borrow_mut().take();
        log::debug!("frame loop stopped");
    }
}

impl Drop for FrameLoop {
    fn drop(&mut self) {
        self.stop();
    }
}
