use kurbo::{Point, Rect};
use tracing::debug;

use crate::{
    foundation::math::{clamp_percent, clamp_scale, wrap_degrees},
    studio::{
        debounce::Debouncer,
        engine::LayerEngine,
        layer::{LayerId, LayerPatch},
    },
};

/// Scale change per wheel notch.
pub const WHEEL_STEP: f64 = 0.1;
/// Quiet period before wheel scaling is committed to history.
pub const WHEEL_DEBOUNCE_MS: u64 = 500;

const MIN_PINCH_DISTANCE: f64 = 1e-3;

/// Interaction kind of the active gesture.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GestureKind {
    /// Single pointer moving the layer.
    Drag {
        /// Pointer position at the start.
        pointer: Point,
        /// Layer center (percent) at the start.
        origin: Point,
    },
    /// Two touches scaling and rotating the layer.
    Pinch {
        /// Distance between the touches at the start.
        distance: f64,
        /// Angle of the touch vector at the start, degrees.
        angle: f64,
        /// Layer scale at the start.
        scale: f64,
        /// Layer rotation at the start.
        rotation: f64,
    },
}

/// The one in-flight pointer interaction.
#[derive(Clone, Debug, PartialEq)]
pub struct GestureSession {
    /// Layer being manipulated.
    pub layer: LayerId,
    /// Kind plus the geometry captured at its start.
    pub kind: GestureKind,
    /// Canvas bounds in the same units as pointer positions.
    pub bounds: Rect,
    /// Whether any move actually changed the layer.
    pub dirty: bool,
}

/// Turns pointer, touch and wheel events into [`LayerEngine`] updates and history commits.
///
/// Every handler is a no-op returning `false` while processing is enabled or when there is
/// nothing to act on.
#[derive(Clone, Debug)]
pub struct GestureInterpreter {
    session: Option<GestureSession>,
    processing: bool,
    wheel: Debouncer,
}

impl Default for GestureInterpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl GestureInterpreter {
    pub fn new() -> Self {
        Self {
            session: None,
            processing: false,
            wheel: Debouncer::new(WHEEL_DEBOUNCE_MS),
        }
    }

    pub fn session(&self) -> Option<&GestureSession> {
        self.session.as_ref()
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    /// Whether a wheel commit is waiting for its quiet period.
    pub fn wheel_pending(&self) -> bool {
        self.wheel.is_pending()
    }

    /// Toggle the processing lock. Enabling it abandons the active gesture and any pending
    /// wheel commit without touching history.
    pub fn set_processing(&mut self, processing: bool) {
        self.processing = processing;
        if processing {
            self.cancel();
        }
    }

    /// Forget the active session and pending wheel commit.
    pub fn cancel(&mut self) {
        self.session = None;
        self.wheel.cancel();
    }

    /// Begin a drag on `layer` and select it.
    pub fn pointer_down(
        &mut self,
        engine: &mut LayerEngine,
        layer: &LayerId,
        at: Point,
        bounds: Rect,
    ) -> bool {
        let Some(dirty) = self.begin(engine, layer) else {
            return false;
        };
        let Some(current) = engine.layer(layer) else {
            return false;
        };
        let origin = Point::new(current.x, current.y);
        self.session = Some(GestureSession {
            layer: layer.clone(),
            kind: GestureKind::Drag { pointer: at, origin },
            bounds,
            dirty,
        });
        true
    }

    /// Begin a drag (one touch) or pinch (two touches) on `layer`.
    pub fn touch_start(
        &mut self,
        engine: &mut LayerEngine,
        layer: &LayerId,
        touches: &[Point],
        bounds: Rect,
    ) -> bool {
        match touches {
            [one] => self.pointer_down(engine, layer, *one, bounds),
            [a, b] => {
                let Some(dirty) = self.begin(engine, layer) else {
                    return false;
                };
                let Some(kind) = pinch_start(engine, layer, *a, *b) else {
                    return false;
                };
                self.session = Some(GestureSession {
                    layer: layer.clone(),
                    kind,
                    bounds,
                    dirty,
                });
                true
            }
            _ => false,
        }
    }

    /// Continue a drag.
    pub fn pointer_move(&mut self, engine: &mut LayerEngine, at: Point) -> bool {
        if self.processing {
            return false;
        }
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        let GestureKind::Drag { pointer, origin } = session.kind else {
            return false;
        };
        let (w, h) = (session.bounds.width(), session.bounds.height());
        if w <= 0.0 || h <= 0.0 {
            return false;
        }
        let dx = (at.x - pointer.x) / w * 100.0;
        let dy = (at.y - pointer.y) / h * 100.0;
        let patch = LayerPatch::position(clamp_percent(origin.x + dx), clamp_percent(origin.y + dy));
        let changed = engine.update(&session.layer, &patch);
        session.dirty |= changed;
        changed
    }

    /// Continue a touch gesture. A second finger joining a drag turns it into a pinch anchored
    /// at the layer's current geometry.
    pub fn touch_move(&mut self, engine: &mut LayerEngine, touches: &[Point]) -> bool {
        if self.processing {
            return false;
        }
        match touches {
            [one] => self.pointer_move(engine, *one),
            [a, b] => {
                let Some(session) = self.session.as_mut() else {
                    return false;
                };
                let GestureKind::Pinch {
                    distance,
                    angle,
                    scale,
                    rotation,
                } = session.kind
                else {
                    if let Some(kind) = pinch_start(engine, &session.layer, *a, *b) {
                        session.kind = kind;
                    }
                    return false;
                };
                let now_distance = a.distance(*b);
                if distance < MIN_PINCH_DISTANCE || now_distance < MIN_PINCH_DISTANCE {
                    return false;
                }
                let patch = LayerPatch {
                    scale: Some(clamp_scale(scale * now_distance / distance)),
                    rotation: Some(wrap_degrees(rotation + touch_angle(*a, *b) - angle)),
                    ..LayerPatch::default()
                };
                let changed = engine.update(&session.layer, &patch);
                session.dirty |= changed;
                changed
            }
            _ => false,
        }
    }

    /// End the active gesture; commits once when it changed anything.
    pub fn pointer_up(&mut self, engine: &mut LayerEngine) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };
        if self.processing || !session.dirty {
            return false;
        }
        debug!(layer = %session.layer, "gesture committed");
        engine.commit_current();
        true
    }

    /// Scale the selected layer by one notch in the direction of `delta_y` (negative grows).
    /// The history commit is deferred until [`GestureInterpreter::poll`] sees the quiet period
    /// elapse.
    pub fn wheel(&mut self, engine: &mut LayerEngine, delta_y: f64, now_ms: u64) -> bool {
        if self.processing || delta_y == 0.0 || delta_y.is_nan() {
            return false;
        }
        let Some(id) = engine.selected().cloned() else {
            return false;
        };
        let Some(layer) = engine.layer(&id) else {
            return false;
        };
        let step = if delta_y < 0.0 { WHEEL_STEP } else { -WHEEL_STEP };
        // keep repeated 0.1 steps on the decimal grid
        let next = ((layer.scale + step) * 1000.0).round() / 1000.0;
        let patch = LayerPatch {
            scale: Some(clamp_scale(next)),
            ..LayerPatch::default()
        };
        let changed = engine.update(&id, &patch);
        if changed {
            self.wheel.schedule(now_ms);
        }
        changed
    }

    /// Commit pending wheel scaling once its quiet period has passed.
    pub fn poll(&mut self, engine: &mut LayerEngine, now_ms: u64) -> bool {
        if self.processing || !self.wheel.ready(now_ms) {
            return false;
        }
        debug!("wheel scaling committed");
        engine.commit_current();
        true
    }

    /// Shared session start: flushes pending wheel work, settles any prior session and selects
    /// the target. Returns the dirty flag the new session inherits.
    fn begin(&mut self, engine: &mut LayerEngine, layer: &LayerId) -> Option<bool> {
        if self.processing || engine.layer(layer).is_none() {
            return None;
        }
        if self.wheel.flush() {
            engine.commit_current();
        }
        let inherited = match self.session.take() {
            Some(prev) if &prev.layer == layer => prev.dirty,
            Some(prev) => {
                if prev.dirty {
                    engine.commit_current();
                }
                false
            }
            None => false,
        };
        engine.select(Some(layer));
        Some(inherited)
    }
}

fn pinch_start(engine: &LayerEngine, layer: &LayerId, a: Point, b: Point) -> Option<GestureKind> {
    let current = engine.layer(layer)?;
    Some(GestureKind::Pinch {
        distance: a.distance(b),
        angle: touch_angle(a, b),
        scale: current.scale,
        rotation: current.rotation,
    })
}

fn touch_angle(a: Point, b: Point) -> f64 {
    (b - a).atan2().to_degrees()
}

#[cfg(test)]
#[path = "../../tests/unit/studio/gesture.rs"]
mod tests;
