//! Visibility Gate Module
//!
//! Watches element bounds against a viewport and fires a one-shot signal the
//! first time an element comes close enough to be worth loading.
//!
//! The host owns the layout: it reports the viewport with
//! [`VisibilityGate::set_viewport`] and element positions with
//! [`VisibilityGate::update_bounds`]. Each observation resolves its
//! [`Entered`] future at most once and is forgotten in the same step.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tracing::debug;

// == Public Constants ==
/// Visible fraction that counts as "in view"
pub const DEFAULT_THRESHOLD: f64 = 0.1;

/// Distance the monitored region extends past every viewport edge
pub const DEFAULT_ROOT_MARGIN: f64 = 50.0;

// == Rect ==
/// Axis-aligned rectangle in host surface units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Grows the rectangle by `margin` on every side.
    pub fn expand(&self, margin: f64) -> Rect {
        Rect::new(
            self.x - margin,
            self.y - margin,
            self.width + 2.0 * margin,
            self.height + 2.0 * margin,
        )
    }

    /// Overlap with `other`. Rectangles sharing only an edge intersect with
    /// zero area.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if right < left || bottom < top {
            return None;
        }
        Some(Rect::new(left, top, right - left, bottom - top))
    }

    /// Fraction of this rectangle inside `root`, or None when they do not
    /// intersect at all. A zero-area rectangle that touches `root` counts as
    /// fully visible.
    pub fn intersection_ratio(&self, root: &Rect) -> Option<f64> {
        let overlap = self.intersection(root)?;
        let area = self.area();
        if area <= 0.0 {
            return Some(1.0);
        }
        Some((overlap.area() / area).clamp(0.0, 1.0))
    }
}

// == Observe Options ==
/// Per-observation trigger settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserveOptions {
    /// Minimum visible fraction, within 0..=1
    pub threshold: f64,
    /// Extension of the viewport used for the check
    pub root_margin: f64,
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            root_margin: DEFAULT_ROOT_MARGIN,
        }
    }
}

impl ObserveOptions {
    /// Returns true when `bounds` qualifies as entered for `viewport`.
    pub fn is_entered(&self, bounds: &Rect, viewport: &Rect) -> bool {
        let root = viewport.expand(self.root_margin);
        match bounds.intersection_ratio(&root) {
            Some(ratio) => ratio >= self.threshold,
            None => false,
        }
    }
}

// == Observation Id ==
/// Identifies one observation registered with a gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObservationId(u64);

// == Entered Signal ==
/// One-shot signal for a single observation.
///
/// Resolves to `true` when the element entered the viewport, or `false` when
/// the observation was cancelled or the gate was dropped first.
#[derive(Debug)]
pub struct Entered {
    rx: oneshot::Receiver<()>,
}

impl Entered {
    /// Non-blocking check: `Some(true)` fired, `Some(false)` cancelled,
    /// `None` still waiting.
    pub fn try_entered(&mut self) -> Option<bool> {
        match self.rx.try_recv() {
            Ok(()) => Some(true),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(false),
        }
    }
}

impl Future for Entered {
    type Output = bool;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<bool> {
        Pin::new(&mut self.rx).poll(cx).map(|result| result.is_ok())
    }
}

#[derive(Debug)]
struct Observation {
    bounds: Rect,
    options: ObserveOptions,
    signal: oneshot::Sender<()>,
}

// == Visibility Gate ==
/// Tracks pending observations against the latest known viewport.
#[derive(Debug, Default)]
pub struct VisibilityGate {
    observations: HashMap<ObservationId, Observation>,
    viewport: Option<Rect>,
    next_id: u64,
}

impl VisibilityGate {
    pub fn new() -> Self {
        Self::default()
    }

    // == Observe ==
    /// Starts watching an element at `bounds`.
    ///
    /// If a viewport is already known and the element qualifies, the signal
    /// fires immediately and nothing is left registered.
    pub fn observe(&mut self, bounds: Rect, options: ObserveOptions) -> (ObservationId, Entered) {
        let id = ObservationId(self.next_id);
        self.next_id += 1;

        let (signal, rx) = oneshot::channel();
        self.observations.insert(
            id,
            Observation {
                bounds,
                options,
                signal,
            },
        );
        self.evaluate(id);

        (id, Entered { rx })
    }

    // == Viewport ==
    /// Records a new viewport and fires every observation that now qualifies.
    ///
    /// Returns the fired ids in ascending order.
    pub fn set_viewport(&mut self, viewport: Rect) -> Vec<ObservationId> {
        self.viewport = Some(viewport);

        let mut ids: Vec<ObservationId> = self.observations.keys().copied().collect();
        ids.sort();
        ids.into_iter().filter(|id| self.evaluate(*id)).collect()
    }

    // == Update Bounds ==
    /// Moves an observed element. Returns true if the move made it fire.
    ///
    /// Ids that already fired or were cancelled are ignored.
    pub fn update_bounds(&mut self, id: ObservationId, bounds: Rect) -> bool {
        match self.observations.get_mut(&id) {
            Some(observation) => observation.bounds = bounds,
            None => return false,
        }
        self.evaluate(id)
    }

    // == Unobserve ==
    /// Stops watching without firing. The signal resolves to `false`.
    pub fn unobserve(&mut self, id: ObservationId) -> bool {
        self.observations.remove(&id).is_some()
    }

    /// Number of observations still waiting to fire.
    pub fn pending(&self) -> usize {
        self.observations.len()
    }

    /// Fires and forgets `id` if it qualifies against the current viewport.
    fn evaluate(&mut self, id: ObservationId) -> bool {
        let Some(viewport) = self.viewport else {
            return false;
        };
        let entered = self
            .observations
            .get(&id)
            .is_some_and(|o| o.options.is_entered(&o.bounds, &viewport));
        if !entered {
            return false;
        }

        if let Some(observation) = self.observations.remove(&id) {
            debug!("Observation {:?} entered viewport", id);
            // The receiver may already be gone if its display unit was torn down
            let _ = observation.signal.send(());
        }
        true
    }
}
