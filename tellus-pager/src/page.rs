use tellus_jobs::JobHandle;
use tellus_scene::{BoundingSphere, Camera, Ellipsoid};

use crate::error::LoadError;
use crate::fetch::ContentHandle;
use crate::tile_key::TileKey;

/// Load state of one content stream on a page.
///
/// `NeedsUpdate` marks content made stale by an upstream configuration
/// change; it still renders until replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotLoaded,
    Loading,
    Complete,
    Failed,
    NeedsUpdate,
}

/// One content stream slot: state machine, decoded payload and the in-flight
/// request handle. At most one request is in flight per slot.
pub struct StreamSlot {
    pub state: LoadState,
    pub content: Option<ContentHandle>,
    pub attempts: u32,
    pub(crate) handle: Option<JobHandle>,
}

impl StreamSlot {
    fn new() -> Self {
        Self {
            state: LoadState::NotLoaded,
            content: None,
            attempts: 0,
            handle: None,
        }
    }

    /// Displayable now: completed, or stale-but-replaceable.
    pub fn displayable(&self) -> bool {
        matches!(self.state, LoadState::Complete | LoadState::NeedsUpdate)
    }

    /// Wants a (re)load issued, subject to the retry budget.
    pub fn wants_load(&self, retry_limit: u32) -> bool {
        match self.state {
            LoadState::NotLoaded | LoadState::NeedsUpdate => true,
            LoadState::Failed => self.attempts < retry_limit,
            LoadState::Loading | LoadState::Complete => false,
        }
    }

    pub(crate) fn begin_loading(&mut self, handle: JobHandle) {
        self.state = LoadState::Loading;
        self.attempts += 1;
        self.handle = Some(handle);
    }

    pub(crate) fn finish(&mut self, result: Result<ContentHandle, LoadError>) {
        self.handle = None;
        match result {
            Ok(content) => {
                self.content = Some(content);
                self.state = LoadState::Complete;
            }
            Err(_) => {
                // Stale content, if any, keeps displaying through a failed
                // refresh.
                if self.content.is_none() {
                    self.state = LoadState::Failed;
                } else {
                    self.state = LoadState::NeedsUpdate;
                }
            }
        }
    }

    /// Abort the in-flight request, if any. Returns true when a handle was
    /// actually cancelled; a cancelled task never delivers an outcome, so the
    /// caller must return its budget slot.
    pub(crate) fn cancel(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    pub(crate) fn invalidate(&mut self) {
        if self.state == LoadState::Complete {
            self.state = LoadState::NeedsUpdate;
        }
    }
}

/// Quadrant position of a page under its parent, or its root slot index.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Quadrant {
    Northwest,
    Northeast,
    Southwest,
    Southeast,
    Root(usize),
}

/// One node of the live page quadtree.
///
/// Identity is the tile key; the parent back-reference and child keys are
/// arena handles, never owning pointers. Children are created lazily, all
/// four at once, by the pager's subdivide.
pub struct Page {
    pub key: TileKey,
    pub location: Quadrant,
    pub parent: Option<TileKey>,
    pub northwest: Option<TileKey>,
    pub northeast: Option<TileKey>,
    pub southwest: Option<TileKey>,
    pub southeast: Option<TileKey>,
    pub bound: BoundingSphere,
    pub streams: Vec<StreamSlot>,
    /// Tick stamp of the most recent traversal visit; drives pruning.
    pub last_requested: u64,
    /// Creation generation; completion callbacks carrying another
    /// generation are stale and discarded.
    pub generation: u64,
}

impl Page {
    pub fn new(
        key: TileKey,
        location: Quadrant,
        parent: Option<TileKey>,
        bound: BoundingSphere,
        stream_count: usize,
        generation: u64,
    ) -> Self {
        Self {
            key,
            location,
            parent,
            northwest: None,
            northeast: None,
            southwest: None,
            southeast: None,
            bound,
            streams: (0..stream_count).map(|_| StreamSlot::new()).collect(),
            last_requested: 0,
            generation,
        }
    }

    pub fn has_children(&self) -> bool {
        self.northwest.is_some()
    }

    /// Child keys in fixed NW, NE, SW, SE traversal order.
    pub fn child_keys(&self) -> Option<[TileKey; 4]> {
        Some([
            self.northwest?,
            self.northeast?,
            self.southwest?,
            self.southeast?,
        ])
    }

    /// Ready iff every stream is displayable.
    pub fn is_ready(&self) -> bool {
        self.streams.iter().all(|s| s.displayable())
    }

    /// Any stream that would accept a (re)load right now.
    pub fn wants_load(&self, retry_limit: u32) -> bool {
        self.streams.iter().any(|s| s.wants_load(retry_limit))
    }

    /// Cancel every in-flight request on this page; returns how many were
    /// actually aborted.
    pub fn cancel_requests(&mut self) -> usize {
        self.streams.iter_mut().map(|s| s.cancel() as usize).sum()
    }

    /// Conservative frustum test against the page bounding sphere.
    pub fn is_onscreen_with_camera(&self, camera: &mut Camera) -> bool {
        camera.is_sphere_visible(&self.bound)
    }

    /// Projected size of the bounding sphere radius in screen pixels; the
    /// LOD metric driving refine/coarsen decisions.
    pub fn calculate_screen_space_error_with_camera(&self, camera: &Camera) -> f64 {
        let distance = (self.bound.center - camera.eye()).length();
        // Inside the sphere: error is effectively unbounded.
        if distance <= self.bound.radius {
            return f64::MAX;
        }
        let half_fov_tan = (camera.fovy() * 0.5).tan();
        self.bound.radius / (distance * half_fov_tan) * (camera.viewport().height * 0.5)
    }

    /// Grazing-angle estimate in [0, 1]: 0 when viewed face-on, 1 edge-on
    /// or from below. Tie-break only, never a gate.
    pub fn calculate_tilt_with_camera(&self, camera: &Camera) -> f64 {
        let up = Ellipsoid::geocentric_surface_normal(self.bound.center);
        let to_eye = (camera.eye() - self.bound.center).normalize();
        1.0 - up.dot(to_eye).clamp(0.0, 1.0)
    }
}
