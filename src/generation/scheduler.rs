//! Background generation with a per-frame completion drain.
//!
//! Requests run on a bounded worker pool. Each finished job appends one
//! [`Completion`] to a single mutex-guarded queue; the owning thread calls
//! [`GenerationScheduler::drain_completed`] once per frame to take the whole
//! queue and run callbacks in arrival order. Callbacks never run on a worker.
//!
//! There is no cancellation: every request produces exactly one completion,
//! either its result or a [`GenerationFailure`]. Callers discard stale
//! results themselves.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use glam::Vec2;

use super::config::TerrainSettings;
use crate::core::{Error, Result};
use crate::mesh::{MeshBuilder, MeshData};
use crate::terrain::{FalloffCache, MapData, TerrainSampler};
use crate::vegetation::{VegetationPlacer, VegetationStore, chunk_rng};

pub type MapCallback = Box<dyn FnOnce(MapData) + Send>;
pub type MeshCallback = Box<dyn FnOnce(MeshData) + Send>;
pub type FailureHandler = Box<dyn FnMut(&GenerationFailure) + Send>;

/// Identifies one request for failure reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestKind {
    MapData,
    MeshData,
}

/// A request whose job failed. Its success callback is never invoked.
#[derive(Clone, Debug)]
pub struct GenerationFailure {
    pub id: RequestId,
    pub kind: RequestKind,
    pub message: String,
}

/// Tagged result carried by the completion queue.
enum Completion {
    Map {
        callback: MapCallback,
        data: MapData,
    },
    Mesh {
        callback: MeshCallback,
        mesh: MeshData,
    },
    Failed(GenerationFailure),
}

struct VegetationRequest {
    map: MapData,
}

/// What one drain cycle delivered.
#[derive(Debug, Default)]
pub struct DrainReport {
    pub map_data: usize,
    pub mesh_data: usize,
    pub vegetation_chunks: usize,
    pub failures: Vec<GenerationFailure>,
}

impl DrainReport {
    /// Completions delivered, including failures.
    pub fn delivered(&self) -> usize {
        self.map_data + self.mesh_data + self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delivered() == 0 && self.vegetation_chunks == 0
    }

    fn merge(&mut self, other: DrainReport) {
        self.map_data += other.map_data;
        self.mesh_data += other.mesh_data;
        self.vegetation_chunks += other.vegetation_chunks;
        self.failures.extend(other.failures);
    }
}

struct Shared {
    settings: TerrainSettings,
    sampler: TerrainSampler,
    placer: VegetationPlacer,
    completed: Mutex<Vec<Completion>>,
    vegetation_queue: Mutex<Vec<VegetationRequest>>,
    failure_handler: Mutex<Option<FailureHandler>>,
    pending: AtomicUsize,
    next_id: AtomicU64,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A poisoned queue still holds valid completions.
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl Shared {
    fn push(&self, completion: Completion, vegetation: Option<MapData>) {
        let mut completed = lock(&self.completed);
        completed.push(completion);
        // Queued while the completion lock is held; the drain takes both
        // queues under the same pair of locks.
        if let Some(map) = vegetation {
            lock(&self.vegetation_queue).push(VegetationRequest { map });
        }
    }
}

/// Runs map and mesh generation off the calling thread.
///
/// Cloning yields another handle to the same queues and pool, so callbacks
/// can capture a handle and issue follow-up requests.
#[derive(Clone)]
pub struct GenerationScheduler {
    shared: Arc<Shared>,
    pool: Arc<rayon::ThreadPool>,
    owner: ThreadId,
}

impl GenerationScheduler {
    /// Create a scheduler owned by the calling thread.
    pub fn new(settings: TerrainSettings) -> Result<Self> {
        Self::with_falloff_cache(settings, &FalloffCache::new())
    }

    /// Create a scheduler that takes its falloff mask from a shared cache.
    pub fn with_falloff_cache(settings: TerrainSettings, cache: &FalloffCache) -> Result<Self> {
        let settings = settings.sanitized();
        let threads = settings.worker_thread_count();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("terrain-gen-{}", i))
            .build()?;

        log::info!(
            "Generation scheduler started: {} workers, chunk size {}",
            threads,
            settings.terrain.chunk_size
        );

        let sampler = TerrainSampler::new(settings.terrain.clone(), cache);
        let placer = settings.placer();
        Ok(Self {
            shared: Arc::new(Shared {
                settings,
                sampler,
                placer,
                completed: Mutex::new(Vec::new()),
                vegetation_queue: Mutex::new(Vec::new()),
                failure_handler: Mutex::new(None),
                pending: AtomicUsize::new(0),
                next_id: AtomicU64::new(0),
            }),
            pool: Arc::new(pool),
            owner: thread::current().id(),
        })
    }

    /// Sanitized settings in use.
    pub fn settings(&self) -> &TerrainSettings {
        &self.shared.settings
    }

    pub fn sampler(&self) -> &TerrainSampler {
        &self.shared.sampler
    }

    /// Called on the drain thread for every failed request.
    pub fn on_failure(&self, handler: impl FnMut(&GenerationFailure) + Send + 'static) {
        *lock(&self.shared.failure_handler) = Some(Box::new(handler));
    }

    /// Requests submitted but not yet delivered by a drain.
    pub fn pending_count(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    fn next_id(&self) -> RequestId {
        self.shared.pending.fetch_add(1, Ordering::AcqRel);
        RequestId(self.shared.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Generate map data for the chunk centred at `center`.
    pub fn request_map_data(
        &self,
        center: Vec2,
        callback: impl FnOnce(MapData) + Send + 'static,
    ) -> RequestId {
        let id = self.next_id();
        let shared = Arc::clone(&self.shared);
        let callback: MapCallback = Box::new(callback);

        log::trace!("Map request {:?} for ({}, {})", id, center.x, center.y);
        self.pool.spawn(move || {
            match run_guarded(|| shared.sampler.sample(center)) {
                Ok(data) => {
                    let vegetation = shared.settings.auto_update_vegetation.then(|| data.clone());
                    shared.push(Completion::Map { callback, data }, vegetation);
                }
                Err(message) => shared.push(
                    Completion::Failed(GenerationFailure {
                        id,
                        kind: RequestKind::MapData,
                        message,
                    }),
                    None,
                ),
            }
        });
        id
    }

    /// Build a mesh for `map` at the given level of detail.
    pub fn request_mesh_data(
        &self,
        map: MapData,
        level_of_detail: u32,
        callback: impl FnOnce(MeshData) + Send + 'static,
    ) -> RequestId {
        let id = self.next_id();
        let shared = Arc::clone(&self.shared);
        let callback: MeshCallback = Box::new(callback);

        log::trace!("Mesh request {:?} at LOD {}", id, level_of_detail);
        self.pool.spawn(move || {
            let settings = &shared.settings;
            let built = run_guarded(|| {
                MeshBuilder::build(
                    map.heights(),
                    settings.mesh_height_multiplier,
                    &settings.mesh_height_curve,
                    level_of_detail,
                )
            })
            .and_then(|r| r.map_err(|e| e.to_string()));

            let completion = match built {
                Ok(mesh) => Completion::Mesh { callback, mesh },
                Err(message) => Completion::Failed(GenerationFailure {
                    id,
                    kind: RequestKind::MeshData,
                    message,
                }),
            };
            shared.push(completion, None);
        });
        id
    }

    /// Deliver everything completed so far.
    ///
    /// Runs callbacks in arrival order, then places vegetation for completed
    /// map data serially, replacing each chunk's set in `vegetation`. Both
    /// queues are taken together, so a map callback and its vegetation land
    /// in the same drain. Requests issued from callbacks are delivered by a
    /// later drain.
    ///
    /// A panicking callback aborts the rest of the batch: the remaining
    /// completions are dropped without their callbacks and no longer count
    /// as pending.
    pub fn drain_completed(&self, vegetation: &mut VegetationStore) -> DrainReport {
        debug_assert_eq!(
            thread::current().id(),
            self.owner,
            "drain_completed must run on the thread that created the scheduler"
        );

        // Same lock order as `Shared::push`.
        let (completed, requests) = {
            let mut completed = lock(&self.shared.completed);
            let mut requests = lock(&self.shared.vegetation_queue);
            (std::mem::take(&mut *completed), std::mem::take(&mut *requests))
        };
        self.shared.pending.fetch_sub(completed.len(), Ordering::AcqRel);

        let mut report = DrainReport::default();
        for completion in completed {
            match completion {
                Completion::Map { callback, data } => {
                    callback(data);
                    report.map_data += 1;
                }
                Completion::Mesh { callback, mesh } => {
                    callback(mesh);
                    report.mesh_data += 1;
                }
                Completion::Failed(failure) => {
                    log::error!(
                        "{:?} request {:?} failed: {}",
                        failure.kind,
                        failure.id,
                        failure.message
                    );
                    self.report_failure(&failure);
                    report.failures.push(failure);
                }
            }
        }

        for request in requests {
            self.place_vegetation(&request.map, vegetation);
            report.vegetation_chunks += 1;
        }

        report
    }

    /// Run the failure handler without holding its lock, so the handler may
    /// replace itself through `on_failure`.
    fn report_failure(&self, failure: &GenerationFailure) {
        let taken = lock(&self.shared.failure_handler).take();
        if let Some(mut handler) = taken {
            handler(failure);
            let mut slot = lock(&self.shared.failure_handler);
            if slot.is_none() {
                *slot = Some(handler);
            }
        }
    }

    /// Place vegetation for one chunk now, on the calling thread.
    pub fn place_vegetation(&self, map: &MapData, vegetation: &mut VegetationStore) {
        let seed = self.shared.settings.terrain.noise.seed;
        let mut rng = chunk_rng(seed, map.key());
        let placements = self
            .shared
            .placer
            .place(map, &self.shared.settings.vegetation_rules, &mut rng);
        vegetation.replace(map.center(), placements);
    }

    /// Drain repeatedly until nothing is pending or `timeout` passes.
    pub fn drain_until_idle(&self, vegetation: &mut VegetationStore, timeout: Duration) -> Result<DrainReport> {
        let deadline = Instant::now() + timeout;
        let mut report = DrainReport::default();
        loop {
            report.merge(self.drain_completed(vegetation));
            if self.pending_count() == 0 {
                return Ok(report);
            }
            if Instant::now() >= deadline {
                return Err(Error::Worker(format!(
                    "{} requests still pending after {:?}",
                    self.pending_count(),
                    timeout
                )));
            }
            thread::sleep(Duration::from_millis(1));
        }
    }
}

/// Run a job, turning a panic into an error message.
fn run_guarded<T>(job: impl FnOnce() -> T) -> std::result::Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(job)).map_err(|payload| {
        if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "worker panicked".to_string()
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::{ChunkKey, SamplerConfig};
    use std::sync::atomic::AtomicBool;

    const TIMEOUT: Duration = Duration::from_secs(30);

    fn test_settings(auto_vegetation: bool) -> TerrainSettings {
        TerrainSettings {
            terrain: SamplerConfig {
                chunk_size: 33,
                ..Default::default()
            },
            auto_update_vegetation: auto_vegetation,
            worker_threads: 4,
            ..Default::default()
        }
    }

    #[test]
    fn test_each_map_callback_fires_once_with_its_centre() {
        let scheduler = GenerationScheduler::new(test_settings(false)).unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));

        let centers: Vec<Vec2> = (0..16).map(|i| Vec2::new(i as f32 * 32.0, -(i as f32) * 32.0)).collect();
        for &center in &centers {
            let received = Arc::clone(&received);
            scheduler.request_map_data(center, move |data| {
                received.lock().unwrap().push((center, data.center()));
            });
        }

        let mut store = VegetationStore::new();
        let report = scheduler.drain_until_idle(&mut store, TIMEOUT).unwrap();
        assert_eq!(report.map_data, centers.len());
        assert!(report.failures.is_empty());

        let received = received.lock().unwrap();
        assert_eq!(received.len(), centers.len());
        for (requested, delivered) in received.iter() {
            assert_eq!(requested, delivered);
        }
        let mut seen: Vec<_> = received.iter().map(|(c, _)| ChunkKey::from_center(*c)).collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), centers.len());

        // Nothing is delivered twice.
        assert!(scheduler.drain_completed(&mut store).is_empty());
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn test_callbacks_run_on_draining_thread() {
        let scheduler = GenerationScheduler::new(test_settings(false)).unwrap();
        let drain_thread = thread::current().id();
        let ran_here = Arc::new(AtomicBool::new(false));

        let flag = Arc::clone(&ran_here);
        scheduler.request_map_data(Vec2::ZERO, move |_| {
            flag.store(thread::current().id() == drain_thread, Ordering::SeqCst);
        });

        scheduler.drain_until_idle(&mut VegetationStore::new(), TIMEOUT).unwrap();
        assert!(ran_here.load(Ordering::SeqCst));
    }

    #[test]
    fn test_mesh_request_chained_from_map_callback() {
        let scheduler = GenerationScheduler::new(test_settings(false)).unwrap();
        let vertex_count = Arc::new(AtomicUsize::new(0));

        let handle = scheduler.clone();
        let count = Arc::clone(&vertex_count);
        scheduler.request_map_data(Vec2::ZERO, move |data| {
            handle.request_mesh_data(data, 2, move |mesh| {
                count.store(mesh.vertex_count(), Ordering::SeqCst);
            });
        });

        let report = scheduler.drain_until_idle(&mut VegetationStore::new(), TIMEOUT).unwrap();
        assert_eq!(report.map_data, 1);
        assert_eq!(report.mesh_data, 1);
        // 33 samples at stride 4: 9 per line.
        assert_eq!(vertex_count.load(Ordering::SeqCst), 81);
    }

    #[test]
    fn test_invalid_lod_reports_failure_without_callback() {
        let scheduler = GenerationScheduler::new(test_settings(false)).unwrap();
        let map = scheduler.sampler().sample(Vec2::ZERO);
        let called = Arc::new(AtomicBool::new(false));
        let handled = Arc::new(AtomicUsize::new(0));

        let handled_count = Arc::clone(&handled);
        scheduler.on_failure(move |failure| {
            assert_eq!(failure.kind, RequestKind::MeshData);
            handled_count.fetch_add(1, Ordering::SeqCst);
        });

        let flag = Arc::clone(&called);
        // Stride 6 does not divide 32.
        let id = scheduler.request_mesh_data(map, 3, move |_| flag.store(true, Ordering::SeqCst));

        let report = scheduler.drain_until_idle(&mut VegetationStore::new(), TIMEOUT).unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].id, id);
        assert_eq!(report.mesh_data, 0);
        assert!(!called.load(Ordering::SeqCst));
        assert_eq!(handled.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[test]
    fn test_auto_vegetation_fills_store_per_chunk() {
        let scheduler = GenerationScheduler::new(test_settings(true)).unwrap();
        for i in 0..3 {
            scheduler.request_map_data(Vec2::new(i as f32 * 32.0, 0.0), |_| {});
        }

        let mut store = VegetationStore::new();
        let report = scheduler.drain_until_idle(&mut store, TIMEOUT).unwrap();
        assert_eq!(report.vegetation_chunks, 3);
        assert_eq!(store.len(), 3);
        for i in 0..3 {
            assert!(store.contains(ChunkKey::new(i * 32, 0)));
        }
    }

    #[test]
    fn test_regenerating_chunk_replaces_vegetation() {
        let scheduler = GenerationScheduler::new(test_settings(true)).unwrap();
        let mut store = VegetationStore::new();

        scheduler.request_map_data(Vec2::ZERO, |_| {});
        scheduler.drain_until_idle(&mut store, TIMEOUT).unwrap();
        let first = store.get(ChunkKey::new(0, 0)).unwrap().clone();

        scheduler.request_map_data(Vec2::ZERO, |_| {});
        scheduler.drain_until_idle(&mut store, TIMEOUT).unwrap();
        let second = store.get(ChunkKey::new(0, 0)).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(second.revision, first.revision + 1);
        // Same seed and chunk: identical placements.
        assert_eq!(second.placements, first.placements);
    }

    #[test]
    fn test_no_vegetation_when_disabled() {
        let scheduler = GenerationScheduler::new(test_settings(false)).unwrap();
        scheduler.request_map_data(Vec2::ZERO, |_| {});
        let mut store = VegetationStore::new();
        let report = scheduler.drain_until_idle(&mut store, TIMEOUT).unwrap();
        assert_eq!(report.vegetation_chunks, 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_drain_preserves_arrival_order() {
        let scheduler = GenerationScheduler::new(test_settings(false)).unwrap();
        let order = Arc::new(Mutex::new(Vec::new()));
        let map = scheduler.sampler().sample(Vec2::ZERO);

        for i in 0..5 {
            let order = Arc::clone(&order);
            scheduler.shared.pending.fetch_add(1, Ordering::AcqRel);
            scheduler.shared.push(
                Completion::Map {
                    callback: Box::new(move |_| order.lock().unwrap().push(i)),
                    data: map.clone(),
                },
                None,
            );
        }

        let report = scheduler.drain_completed(&mut VegetationStore::new());
        assert_eq!(report.map_data, 5);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_vegetation_lands_in_same_drain_as_map_callback() {
        let settings = TerrainSettings {
            terrain: SamplerConfig {
                chunk_size: 3,
                ..Default::default()
            },
            auto_update_vegetation: true,
            worker_threads: 8,
            ..Default::default()
        };
        let scheduler = GenerationScheduler::new(settings).unwrap();
        for i in 0..2000 {
            scheduler.request_map_data(Vec2::new((i % 50) as f32 * 2.0, (i / 50) as f32 * 2.0), |_| {});
        }

        let mut store = VegetationStore::new();
        let deadline = Instant::now() + TIMEOUT;
        let mut delivered = 0;
        while scheduler.pending_count() > 0 {
            let report = scheduler.drain_completed(&mut store);
            assert_eq!(report.vegetation_chunks, report.map_data);
            delivered += report.map_data;
            assert!(Instant::now() < deadline, "timed out with {} delivered", delivered);
        }
        let report = scheduler.drain_completed(&mut store);
        assert_eq!(report.vegetation_chunks, report.map_data);
        assert_eq!(delivered + report.map_data, 2000);
    }

    #[test]
    fn test_failure_handler_may_replace_itself() {
        let scheduler = GenerationScheduler::new(test_settings(false)).unwrap();
        let map = scheduler.sampler().sample(Vec2::ZERO);
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let handle = scheduler.clone();
        let (first_count, second_count) = (Arc::clone(&first), Arc::clone(&second));
        scheduler.on_failure(move |_| {
            first_count.fetch_add(1, Ordering::SeqCst);
            let second_count = Arc::clone(&second_count);
            handle.on_failure(move |_| {
                second_count.fetch_add(1, Ordering::SeqCst);
            });
        });

        scheduler.request_mesh_data(map.clone(), 3, |_| {});
        scheduler.request_mesh_data(map, 3, |_| {});
        let report = scheduler.drain_until_idle(&mut VegetationStore::new(), TIMEOUT).unwrap();

        assert_eq!(report.failures.len(), 2);
        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_callback_clears_pending_batch() {
        let scheduler = GenerationScheduler::new(test_settings(false)).unwrap();
        let map = scheduler.sampler().sample(Vec2::ZERO);
        let later_ran = Arc::new(AtomicBool::new(false));

        scheduler.shared.pending.fetch_add(2, Ordering::AcqRel);
        scheduler.shared.push(
            Completion::Map {
                callback: Box::new(|_| panic!("callback failed")),
                data: map.clone(),
            },
            None,
        );
        let flag = Arc::clone(&later_ran);
        scheduler.shared.push(
            Completion::Map {
                callback: Box::new(move |_| flag.store(true, Ordering::SeqCst)),
                data: map,
            },
            None,
        );

        let mut store = VegetationStore::new();
        let drained = panic::catch_unwind(AssertUnwindSafe(|| scheduler.drain_completed(&mut store)));
        assert!(drained.is_err());
        assert!(!later_ran.load(Ordering::SeqCst));
        assert_eq!(scheduler.pending_count(), 0);
        assert!(scheduler.drain_until_idle(&mut store, TIMEOUT).unwrap().is_empty());
    }

    #[test]
    fn test_run_guarded_catches_panics() {
        assert_eq!(run_guarded(|| 7), Ok(7));
        let err = run_guarded(|| -> u32 { panic!("noise exploded") }).unwrap_err();
        assert_eq!(err, "noise exploded");
    }
}
