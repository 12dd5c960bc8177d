use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tellus_jobs::{AsyncReturn, Job, JobExecutor};
use tellus_scene::Camera;

use crate::error::{ConfigError, FetchError, LoadError};
use crate::fetch::{ContentHandle, Decoder, FetchService, StreamKind};
use crate::page::{Page, Quadrant};
use crate::page_storage::PageStorage;
use crate::tile_database::TileDatabase;
use crate::tile_key::TileKey;

/// One content stream the pager keeps filled on every page.
///
/// All streams of a pager must share the same tiling scheme (bounds and zoom
/// range); page geometry is derived from the first stream's database.
#[derive(Clone)]
pub struct StreamConfig {
    pub kind: StreamKind,
    pub database: Arc<TileDatabase>,
}

/// Tuning knobs for traversal, loading and pruning.
#[derive(Clone, Debug)]
pub struct PagerOptions {
    /// Screen-space error (pixels) above which a ready page subdivides.
    pub refine_threshold: f64,
    /// Screen-space error below which a page's children are dropped.
    pub coarsen_threshold: f64,
    /// Ticks a page may go unvisited before its subtree is pruned.
    pub staleness_window: u64,
    /// Concurrent fetch+decode task budget.
    pub max_in_flight: usize,
    /// Attempts per stream slot before a failure sticks.
    pub retry_limit: u32,
    pub fetch_timeout: Duration,
    /// Soft cap on live pages; least-recently-visited leaves are trimmed
    /// past it.
    pub max_live_pages: usize,
    pub worker_threads: usize,
}

impl Default for PagerOptions {
    fn default() -> Self {
        Self {
            refine_threshold: 256.0,
            coarsen_threshold: 96.0,
            staleness_window: 60,
            max_in_flight: 16,
            retry_limit: 3,
            fetch_timeout: Duration::from_secs(10),
            max_live_pages: 512,
            worker_threads: 4,
        }
    }
}

/// Completion report of one fetch+decode task, marshalled back to the driver.
pub struct LoadOutcome {
    pub(crate) key: TileKey,
    pub(crate) stream: usize,
    pub(crate) generation: u64,
    pub(crate) result: Result<ContentHandle, LoadError>,
}

struct LoadJob {
    url: String,
    kind: StreamKind,
    key: TileKey,
    stream: usize,
    generation: u64,
    timeout: Duration,
    fetcher: Arc<dyn FetchService>,
    decoder: Arc<dyn Decoder>,
}

impl Job for LoadJob {
    type Outcome = LoadOutcome;

    fn name(&self) -> String {
        format!(
            "load {} {}/{}/{}",
            self.kind, self.key.level, self.key.x, self.key.y
        )
    }

    fn panic_outcome(&self) -> LoadOutcome {
        LoadOutcome {
            key: self.key,
            stream: self.stream,
            generation: self.generation,
            result: Err(LoadError::Panicked),
        }
    }

    fn perform(self) -> AsyncReturn<LoadOutcome> {
        let LoadJob {
            url,
            kind,
            key,
            stream,
            generation,
            timeout,
            fetcher,
            decoder,
        } = self;
        Box::pin(async move {
            let result = match tokio::time::timeout(timeout, fetcher.fetch(url)).await {
                Err(_) => Err(LoadError::Fetch(FetchError::TimedOut)),
                Ok(Err(e)) => Err(LoadError::Fetch(e)),
                // Decoding happens here on the worker, never on the driver.
                Ok(Ok(bytes)) => decoder.decode(bytes, kind).map_err(LoadError::Decode),
            };
            LoadOutcome {
                key,
                stream,
                generation,
                result,
            }
        })
    }
}

struct LoadCandidate {
    key: TileKey,
    screen_space_error: f64,
    tilt: f64,
    last_requested: u64,
}

/// Admission urgency: larger on-screen error first, face-on views before
/// grazing ones, most recently visited breaking remaining ties.
fn urgency_order(a: &LoadCandidate, b: &LoadCandidate) -> std::cmp::Ordering {
    b.screen_space_error
        .total_cmp(&a.screen_space_error)
        .then(a.tilt.total_cmp(&b.tilt))
        .then(b.last_requested.cmp(&a.last_requested))
}

/// Aggregate counters from the most recent `update`, for callers and tests.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PagerStats {
    pub live_pages: usize,
    pub rendered_pages: usize,
    pub in_flight: usize,
    pub issued_this_tick: usize,
    pub pruned_this_tick: usize,
}

/// The paging driver.
///
/// `update` runs one tick on the calling thread: drain completed load
/// outcomes, walk the quadtree against the camera to pick the render set,
/// admit new loads under the in-flight budget, then prune stale subtrees.
/// All tree mutation happens here; worker tasks only fetch and decode.
pub struct TilePager {
    options: PagerOptions,
    streams: Vec<StreamConfig>,
    pub storage: PageStorage,
    executor: JobExecutor<LoadOutcome>,
    fetcher: Arc<dyn FetchService>,
    decoder: Arc<dyn Decoder>,
    tiles_to_render: Vec<TileKey>,
    load_candidates: Vec<LoadCandidate>,
    in_flight: usize,
    issued_this_tick: usize,
    pruned_this_tick: usize,
    tick: u64,
    content_changed: bool,
}

impl TilePager {
    pub fn new(
        streams: Vec<StreamConfig>,
        fetcher: Arc<dyn FetchService>,
        decoder: Arc<dyn Decoder>,
        options: PagerOptions,
    ) -> Result<Self, ConfigError> {
        if streams.is_empty() {
            return Err(ConfigError::NoStreams);
        }
        let storage = PageStorage::new(streams[0].database.clone(), streams.len());
        let executor =
            JobExecutor::new(options.worker_threads).map_err(|e| ConfigError::Runtime(e.to_string()))?;
        Ok(Self {
            options,
            streams,
            storage,
            executor,
            fetcher,
            decoder,
            tiles_to_render: vec![],
            load_candidates: vec![],
            in_flight: 0,
            issued_this_tick: 0,
            pruned_this_tick: 0,
            tick: 0,
            content_changed: false,
        })
    }

    /// Run one paging tick against the current camera.
    pub fn update(&mut self, camera: &mut Camera) {
        self.tick += 1;
        self.issued_this_tick = 0;
        self.pruned_this_tick = 0;

        self.drain_outcomes();
        self.storage.create_root_pages();

        self.tiles_to_render.clear();
        self.load_candidates.clear();
        let roots = self.storage.roots.clone();
        for root in roots {
            self.visit(root, camera);
        }

        self.admit_loads();
        self.prune();
    }

    /// True once per change batch: set whenever displayable content or tree
    /// shape changed since the last poll, then cleared.
    pub fn poll_content_changed(&mut self) -> bool {
        std::mem::take(&mut self.content_changed)
    }

    /// Keys selected for rendering by the last `update`, coarse-to-fine,
    /// each region covered exactly once.
    pub fn render_set(&self) -> &[TileKey] {
        &self.tiles_to_render
    }

    pub fn rendered_pages(&self) -> impl Iterator<Item = &Page> {
        self.tiles_to_render
            .iter()
            .filter_map(|key| self.storage.get(key))
    }

    /// Mark every completed stream slot stale so it reloads, keeping current
    /// content displayable meanwhile. Used after a source change upstream.
    pub fn invalidate_all(&mut self) {
        for page in self.storage.iter_mut() {
            for slot in &mut page.streams {
                slot.invalidate();
            }
        }
        self.content_changed = true;
    }

    pub fn stats(&self) -> PagerStats {
        PagerStats {
            live_pages: self.storage.len(),
            rendered_pages: self.tiles_to_render.len(),
            in_flight: self.in_flight,
            issued_this_tick: self.issued_this_tick,
            pruned_this_tick: self.pruned_this_tick,
        }
    }

    fn drain_outcomes(&mut self) {
        while let Some(outcome) = self.executor.try_take() {
            self.apply_outcome(outcome);
        }
    }

    pub(crate) fn apply_outcome(&mut self, outcome: LoadOutcome) {
        self.in_flight = self.in_flight.saturating_sub(1);
        let Some(page) = self.storage.get_mut(&outcome.key) else {
            tracing::debug!(
                "discarding outcome for pruned page {}/{}/{}",
                outcome.key.level,
                outcome.key.x,
                outcome.key.y
            );
            return;
        };
        if page.generation != outcome.generation {
            tracing::debug!(
                "discarding stale-generation outcome for page {}/{}/{}",
                outcome.key.level,
                outcome.key.x,
                outcome.key.y
            );
            return;
        }
        let Some(slot) = page.streams.get_mut(outcome.stream) else {
            return;
        };
        if let Err(e) = &outcome.result {
            tracing::warn!(
                "load failed for page {}/{}/{} stream {}: {}",
                outcome.key.level,
                outcome.key.x,
                outcome.key.y,
                outcome.stream,
                e
            );
        }
        slot.finish(outcome.result);
        self.content_changed = true;
    }

    /// Depth-first refinement walk from one page.
    ///
    /// Handoff from a ready parent to its children happens only when every
    /// child covers its quadrant, meaning it is ready or offscreen; until
    /// then the parent keeps rendering and onscreen children queue for load.
    fn visit(&mut self, key: TileKey, camera: &mut Camera) {
        let (onscreen, ready, wants_load) = {
            let Some(page) = self.storage.get_mut(&key) else {
                return;
            };
            page.last_requested = self.tick;
            (
                page.is_onscreen_with_camera(camera),
                page.is_ready(),
                page.wants_load(self.options.retry_limit),
            )
        };
        // Offscreen pages keep their content for instant reappearance but
        // are neither rendered nor descended into.
        if !onscreen {
            return;
        }
        if !ready {
            self.push_candidate(key, camera);
            return;
        }
        if wants_load {
            // Ready but stale or retryable; refresh while still rendering.
            self.push_candidate(key, camera);
        }

        let screen_space_error = match self.storage.get(&key) {
            Some(page) => page.calculate_screen_space_error_with_camera(camera),
            None => return,
        };
        let maxzoom = self.streams[0].database.maxzoom();

        if screen_space_error > self.options.refine_threshold && key.level < maxzoom {
            self.storage.subdivide(&key);
            let Some(children) = self.storage.get(&key).and_then(Page::child_keys) else {
                return;
            };
            let mut all_cover = true;
            for child in children {
                let covers = match self.storage.get_mut(&child) {
                    Some(page) => !page.is_onscreen_with_camera(camera) || page.is_ready(),
                    None => false,
                };
                if !covers {
                    all_cover = false;
                }
            }
            if all_cover {
                for child in children {
                    self.visit(child, camera);
                }
            } else {
                // Parent fallback: render the parent, queue the children.
                self.tiles_to_render.push(key);
                for child in children {
                    self.touch_for_loading(child, camera);
                }
            }
        } else {
            self.tiles_to_render.push(key);
            let has_children = self
                .storage
                .get(&key)
                .map(Page::has_children)
                .unwrap_or(false);
            if has_children && screen_space_error < self.options.coarsen_threshold {
                let cancelled = self.storage.remove_children(&key);
                self.in_flight = self.in_flight.saturating_sub(cancelled);
                self.content_changed = true;
            }
        }
    }

    /// Stamp and enqueue a not-yet-covering child without descending.
    fn touch_for_loading(&mut self, key: TileKey, camera: &mut Camera) {
        let (onscreen, wants_load) = {
            let Some(page) = self.storage.get_mut(&key) else {
                return;
            };
            page.last_requested = self.tick;
            (
                page.is_onscreen_with_camera(camera),
                page.wants_load(self.options.retry_limit),
            )
        };
        if onscreen && wants_load {
            self.push_candidate(key, camera);
        }
    }

    fn push_candidate(&mut self, key: TileKey, camera: &Camera) {
        let Some(page) = self.storage.get(&key) else {
            return;
        };
        self.load_candidates.push(LoadCandidate {
            key,
            screen_space_error: page.calculate_screen_space_error_with_camera(camera),
            tilt: page.calculate_tilt_with_camera(camera),
            last_requested: page.last_requested,
        });
    }

    /// Sort candidates by urgency and issue loads up to the in-flight
    /// budget.
    fn admit_loads(&mut self) {
        self.load_candidates.sort_by(urgency_order);

        let candidates = std::mem::take(&mut self.load_candidates);
        'admission: for candidate in &candidates {
            if self.in_flight >= self.options.max_in_flight {
                break;
            }
            let Some(page) = self.storage.get(&candidate.key) else {
                continue;
            };
            let generation = page.generation;
            let wanted: Vec<usize> = page
                .streams
                .iter()
                .enumerate()
                .filter(|(_, slot)| slot.wants_load(self.options.retry_limit))
                .map(|(i, _)| i)
                .collect();
            for stream in wanted {
                if self.in_flight >= self.options.max_in_flight {
                    break 'admission;
                }
                let url = self.streams[stream].database.url_for_tile(&candidate.key);
                let job = LoadJob {
                    url,
                    kind: self.streams[stream].kind,
                    key: candidate.key,
                    stream,
                    generation,
                    timeout: self.options.fetch_timeout,
                    fetcher: self.fetcher.clone(),
                    decoder: self.decoder.clone(),
                };
                let handle = self.executor.spawn(job);
                if let Some(page) = self.storage.get_mut(&candidate.key) {
                    page.streams[stream].begin_loading(handle);
                }
                self.in_flight += 1;
                self.issued_this_tick += 1;
            }
        }
        self.load_candidates = candidates;
    }

    /// Drop subtrees that have gone unvisited for the staleness window, then
    /// trim least-recently-visited unrendered leaves past the live-page cap.
    ///
    /// A descendant is always stamped no later than its ancestor, so a stale
    /// page has no recently-visited subtree; pruning the topmost stale page
    /// removes the whole cold branch at once.
    fn prune(&mut self) {
        let window = self.options.staleness_window;
        let mut stale: Vec<TileKey> = vec![];
        for page in self.storage.iter() {
            if matches!(page.location, Quadrant::Root(_)) {
                continue;
            }
            if self.tick.saturating_sub(page.last_requested) <= window {
                continue;
            }
            let parent_also_stale = page
                .parent
                .and_then(|p| self.storage.get(&p))
                .map(|parent| {
                    !matches!(parent.location, Quadrant::Root(_))
                        && self.tick.saturating_sub(parent.last_requested) > window
                })
                .unwrap_or(false);
            if !parent_also_stale {
                stale.push(page.key);
            }
        }
        for key in &stale {
            let before = self.storage.len();
            let cancelled = self.storage.remove_subtree(key);
            self.in_flight = self.in_flight.saturating_sub(cancelled);
            self.pruned_this_tick += before - self.storage.len();
        }
        if !stale.is_empty() {
            self.content_changed = true;
        }

        if self.storage.len() <= self.options.max_live_pages {
            return;
        }
        // Over cap: trim cold leaves, oldest visit first. One pass per tick
        // keeps the cost bounded; deeper branches unwind over following
        // ticks.
        let rendered: HashSet<TileKey> = self.tiles_to_render.iter().copied().collect();
        let mut leaves: Vec<(u64, TileKey)> = self
            .storage
            .iter()
            .filter(|page| {
                !matches!(page.location, Quadrant::Root(_))
                    && !page.has_children()
                    && !rendered.contains(&page.key)
            })
            .map(|page| (page.last_requested, page.key))
            .collect();
        leaves.sort();
        let excess = self.storage.len() - self.options.max_live_pages;
        for (_, key) in leaves.into_iter().take(excess) {
            let cancelled = self.storage.remove_subtree(&key);
            self.in_flight = self.in_flight.saturating_sub(cancelled);
            self.pruned_this_tick += 1;
            self.content_changed = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::page::LoadState;
    use crate::tile_database::TileDatabaseOptions;
    use bytes::Bytes;
    use glam::{DMat4, DVec3};
    use tellus_scene::camera::Viewport;
    use tellus_scene::{Ellipsoid, Geodetic};

    struct InstantFetch;

    impl FetchService for InstantFetch {
        fn fetch(&self, _url: String) -> AsyncReturn<Result<Bytes, FetchError>> {
            Box::pin(async { Ok(Bytes::from_static(b"tile")) })
        }
    }

    struct NeverFetch;

    impl FetchService for NeverFetch {
        fn fetch(&self, _url: String) -> AsyncReturn<Result<Bytes, FetchError>> {
            Box::pin(std::future::pending())
        }
    }

    struct PassDecoder;

    impl Decoder for PassDecoder {
        fn decode(&self, bytes: Bytes, _kind: StreamKind) -> Result<ContentHandle, DecodeError> {
            Ok(ContentHandle::new(bytes))
        }
    }

    fn database() -> Arc<TileDatabase> {
        Arc::new(
            TileDatabase::new(TileDatabaseOptions {
                base_urls: vec!["https://tiles.test/{z}/{x}/{y}.png".to_string()],
                minzoom: 0,
                maxzoom: 10,
                ..Default::default()
            })
            .unwrap(),
        )
    }

    fn pager_with(fetcher: Arc<dyn FetchService>, options: PagerOptions) -> TilePager {
        let streams = vec![
            StreamConfig {
                kind: StreamKind::Imagery,
                database: database(),
            },
            StreamConfig {
                kind: StreamKind::Terrain,
                database: database(),
            },
        ];
        TilePager::new(streams, fetcher, Arc::new(PassDecoder), options).unwrap()
    }

    fn single_stream_pager(fetcher: Arc<dyn FetchService>, options: PagerOptions) -> TilePager {
        let database = Arc::new(
            TileDatabase::new(TileDatabaseOptions {
                base_urls: vec!["https://tiles.test/{z}/{x}/{y}.png".to_string()],
                minzoom: 1,
                maxzoom: 10,
                ..Default::default()
            })
            .unwrap(),
        );
        let streams = vec![StreamConfig {
            kind: StreamKind::Geometry,
            database,
        }];
        TilePager::new(streams, fetcher, Arc::new(PassDecoder), options).unwrap()
    }

    fn camera_looking_at_globe(distance: f64) -> Camera {
        let surface = Ellipsoid::WGS84.geodetic_to_ecef(&Geodetic::new(0.0, 0.0, 0.0));
        let eye = surface.normalize() * (surface.length() + distance);
        let mut camera = Camera::new(Viewport::new(1024.0, 768.0));
        camera.set_model_view(DMat4::look_at_rh(eye, DVec3::ZERO, DVec3::Z));
        camera
    }

    fn complete_page(pager: &mut TilePager, key: TileKey) {
        let generation = pager.storage.get(&key).unwrap().generation;
        for stream in 0..2 {
            pager.apply_outcome(LoadOutcome {
                key,
                stream,
                generation,
                result: Ok(ContentHandle::new(())),
            });
        }
    }

    #[test]
    fn rejects_empty_stream_list() {
        let result = TilePager::new(
            vec![],
            Arc::new(InstantFetch),
            Arc::new(PassDecoder),
            PagerOptions::default(),
        );
        assert!(matches!(result, Err(ConfigError::NoStreams)));
    }

    #[test]
    fn first_tick_requests_roots_and_creates_no_children() {
        let mut pager = pager_with(Arc::new(NeverFetch), PagerOptions::default());
        let mut camera = camera_looking_at_globe(1.0e7);
        pager.update(&mut camera);

        assert_eq!(pager.storage.len(), 1);
        let root = pager.storage.roots[0];
        let page = pager.storage.get(&root).unwrap();
        assert!(!page.has_children());
        for slot in &page.streams {
            assert_eq!(slot.state, LoadState::Loading);
        }
        assert_eq!(pager.stats().issued_this_tick, 2);
        // Nothing displayable yet.
        assert!(pager.render_set().is_empty());
    }

    #[test]
    fn loading_stream_is_not_reissued() {
        let mut pager = pager_with(Arc::new(NeverFetch), PagerOptions::default());
        let mut camera = camera_looking_at_globe(1.0e7);
        pager.update(&mut camera);
        pager.update(&mut camera);

        let root = pager.storage.roots[0];
        let page = pager.storage.get(&root).unwrap();
        for slot in &page.streams {
            assert_eq!(slot.attempts, 1);
        }
        assert_eq!(pager.stats().issued_this_tick, 0);
        assert_eq!(pager.stats().in_flight, 2);
    }

    #[test]
    fn stale_generation_outcome_is_discarded() {
        let mut pager = pager_with(Arc::new(NeverFetch), PagerOptions::default());
        let mut camera = camera_looking_at_globe(1.0e7);
        pager.update(&mut camera);
        let root = pager.storage.roots[0];
        let generation = pager.storage.get(&root).unwrap().generation;

        pager.poll_content_changed();
        pager.apply_outcome(LoadOutcome {
            key: root,
            stream: 0,
            generation: generation + 1,
            result: Ok(ContentHandle::new(())),
        });
        let page = pager.storage.get(&root).unwrap();
        assert_eq!(page.streams[0].state, LoadState::Loading);
        assert!(page.streams[0].content.is_none());
        assert!(!pager.poll_content_changed());
    }

    #[test]
    fn parent_renders_until_all_children_cover() {
        let mut pager = pager_with(Arc::new(NeverFetch), PagerOptions::default());
        let mut camera = camera_looking_at_globe(1.0e6);
        pager.update(&mut camera);
        let root = pager.storage.roots[0];
        complete_page(&mut pager, root);

        // Root is ready and hugely oversampled, so it subdivides; children
        // are NotLoaded, so the root still renders alone.
        pager.update(&mut camera);
        assert_eq!(pager.render_set(), &[root]);
        let children = pager.storage.get(&root).unwrap().child_keys().unwrap();

        for child in children {
            complete_page(&mut pager, child);
        }
        pager.update(&mut camera);
        let rendered: HashSet<TileKey> = pager.render_set().iter().copied().collect();
        assert!(!rendered.contains(&root));
        for child in children {
            let page = pager.storage.get(&child).unwrap();
            if page.bound.valid() {
                let onscreen = page.is_onscreen_with_camera(&mut camera);
                assert_eq!(rendered.contains(&child), onscreen);
            }
        }
        assert!(!rendered.is_empty());
    }

    #[test]
    fn admission_respects_in_flight_budget() {
        let options = PagerOptions {
            max_in_flight: 3,
            ..Default::default()
        };
        let mut pager = pager_with(Arc::new(NeverFetch), options);
        let mut camera = camera_looking_at_globe(1.0e6);
        pager.update(&mut camera);
        assert_eq!(pager.stats().issued_this_tick, 2);
        let root = pager.storage.roots[0];
        complete_page(&mut pager, root);

        // Subdivision exposes four children wanting two streams each, but
        // only three tasks fit under the budget.
        pager.update(&mut camera);
        assert_eq!(pager.stats().in_flight, 3);
        assert_eq!(pager.stats().issued_this_tick, 3);
    }

    #[test]
    fn pruning_cancelled_loads_returns_budget() {
        let options = PagerOptions {
            max_in_flight: 8,
            staleness_window: 1,
            ..Default::default()
        };
        let mut pager = pager_with(Arc::new(NeverFetch), options);
        let mut near = camera_looking_at_globe(1.0e6);
        pager.update(&mut near);
        let root = pager.storage.roots[0];
        complete_page(&mut pager, root);

        // Four children at two streams each fill the budget exactly.
        pager.update(&mut near);
        assert_eq!(pager.stats().in_flight, 8);

        // Pull back until the children age out; every cancelled request must
        // hand its budget slot back.
        let mut far = camera_looking_at_globe(1.0e9);
        for _ in 0..3 {
            pager.update(&mut far);
        }
        assert_eq!(pager.storage.len(), 1);
        assert_eq!(pager.stats().in_flight, 0);

        // Coming back close, the recreated children load again.
        pager.update(&mut near);
        assert_eq!(pager.stats().issued_this_tick, 8);
        assert_eq!(pager.stats().in_flight, 8);
    }

    #[test]
    fn urgency_sorts_by_error_then_tilt_then_recency() {
        let key = TileKey::new(0, 0, 0);
        let candidate = |sse: f64, tilt: f64, last: u64| LoadCandidate {
            key,
            screen_space_error: sse,
            tilt,
            last_requested: last,
        };
        let mut list = vec![
            candidate(10.0, 0.5, 1),
            candidate(40.0, 0.9, 1),
            candidate(40.0, 0.2, 1),
            candidate(40.0, 0.2, 7),
        ];
        list.sort_by(urgency_order);
        assert_eq!(list[0].screen_space_error, 40.0);
        assert_eq!(list[0].tilt, 0.2);
        assert_eq!(list[0].last_requested, 7);
        assert_eq!(list[1].tilt, 0.2);
        assert_eq!(list[1].last_requested, 1);
        assert_eq!(list[2].tilt, 0.9);
        assert_eq!(list[3].screen_space_error, 10.0);
    }

    #[test]
    fn highest_error_page_is_admitted_first() {
        let options = PagerOptions {
            max_in_flight: 1,
            ..Default::default()
        };
        let mut pager = single_stream_pager(Arc::new(NeverFetch), options);
        // Off-center view so the four roots project with distinct errors.
        let surface = Ellipsoid::WGS84.geodetic_to_ecef(&Geodetic::new(30.0, -90.0, 0.0));
        let eye = surface.normalize() * (surface.length() + 2.0e7);
        let mut camera = Camera::new(Viewport::new(1024.0, 768.0));
        camera.set_model_view(DMat4::look_at_rh(eye, DVec3::ZERO, DVec3::Z));

        pager.update(&mut camera);
        assert_eq!(pager.stats().issued_this_tick, 1);

        let mut ranked: Vec<(f64, TileKey)> = vec![];
        for page in pager.storage.iter() {
            let sse = page.calculate_screen_space_error_with_camera(&camera);
            ranked.push((sse, page.key));
        }
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));
        assert_eq!(ranked.len(), 4);

        let loading: Vec<TileKey> = pager
            .storage
            .iter()
            .filter(|p| p.streams[0].state == LoadState::Loading)
            .map(|p| p.key)
            .collect();
        assert_eq!(loading, vec![ranked[0].1]);

        // Completing the most urgent page frees the budget for the runner-up.
        let generation = pager.storage.get(&ranked[0].1).unwrap().generation;
        pager.apply_outcome(LoadOutcome {
            key: ranked[0].1,
            stream: 0,
            generation,
            result: Ok(ContentHandle::new(())),
        });
        pager.update(&mut camera);
        let page = pager.storage.get(&ranked[1].1).unwrap();
        assert_eq!(page.streams[0].state, LoadState::Loading);
    }

    #[test]
    fn stale_subtrees_are_pruned_and_outcomes_after_prune_discarded() {
        let options = PagerOptions {
            staleness_window: 2,
            ..Default::default()
        };
        let mut pager = pager_with(Arc::new(NeverFetch), options);
        let mut near = camera_looking_at_globe(1.0e6);
        pager.update(&mut near);
        let root = pager.storage.roots[0];
        complete_page(&mut pager, root);
        pager.update(&mut near);
        let children = pager.storage.get(&root).unwrap().child_keys().unwrap();
        assert_eq!(pager.storage.len(), 5);

        // Pull far enough back that the root stops refining; children go
        // unvisited and age out.
        let mut far = camera_looking_at_globe(1.0e9);
        for _ in 0..4 {
            pager.update(&mut far);
        }
        assert_eq!(pager.storage.len(), 1);
        assert!(pager.storage.get(&root).is_some());

        // A late outcome for a pruned child must not resurrect it.
        pager.apply_outcome(LoadOutcome {
            key: children[0],
            stream: 0,
            generation: 1,
            result: Ok(ContentHandle::new(())),
        });
        assert!(pager.storage.get(&children[0]).is_none());
    }

    #[test]
    fn invalidate_all_marks_complete_slots_stale_but_displayable() {
        let mut pager = pager_with(Arc::new(NeverFetch), PagerOptions::default());
        let mut camera = camera_looking_at_globe(1.0e7);
        pager.update(&mut camera);
        let root = pager.storage.roots[0];
        complete_page(&mut pager, root);

        pager.invalidate_all();
        let page = pager.storage.get(&root).unwrap();
        assert_eq!(page.streams[0].state, LoadState::NeedsUpdate);
        assert!(page.is_ready());
        assert!(pager.poll_content_changed());
    }

    #[test]
    fn content_changed_coalesces_per_poll() {
        let mut pager = pager_with(Arc::new(NeverFetch), PagerOptions::default());
        let mut camera = camera_looking_at_globe(1.0e7);
        pager.update(&mut camera);
        let root = pager.storage.roots[0];
        complete_page(&mut pager, root);

        assert!(pager.poll_content_changed());
        assert!(!pager.poll_content_changed());
    }

    #[test]
    fn end_to_end_loads_root_through_executor() {
        let mut pager = pager_with(Arc::new(InstantFetch), PagerOptions::default());
        let mut camera = camera_looking_at_globe(1.0e7);
        pager.update(&mut camera);

        // Worker tasks complete on their own; wait for both outcomes to
        // land, then let the next tick apply them.
        let mut waited = 0;
        while pager.stats().in_flight > 0 && waited < 500 {
            std::thread::sleep(Duration::from_millis(10));
            waited += 1;
            pager.update(&mut camera);
        }
        let root = pager.storage.roots[0];
        let page = pager.storage.get(&root).unwrap();
        assert!(page.is_ready());
        assert!(page.streams[0]
            .content
            .as_ref()
            .unwrap()
            .downcast_ref::<Bytes>()
            .is_some());
        assert!(pager.render_set().contains(&root) || page.has_children());
    }
}
