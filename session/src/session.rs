//! Reconstruction sessions.
//!
//! Frames enter through a bounded queue. A dispatcher task numbers them in
//! arrival order and hands each one to the blocking pool for depth
//! estimation and back-projection, taking a frame off the queue only once
//! one of `max_in_flight` worker slots is free. Appending to the session
//! cloud is the only write to shared state and happens under one mutex.

use crate::config::ReconstructionConfig;
use crate::events::{SessionEvent, SessionState};
use crate::pipeline::{process_frame, run_pipeline};
use parking_lot::Mutex;
use scan_core::{
    CameraObservation, Error, PointCloud, QualityMetrics, ReconstructionMethod, Result,
    TriangleMesh,
};
use scan_io::{export_mesh, write_ply_ascii, MeshFormat};
use scan_point_cloud::PointCloudBuilder;
use scan_stereo::DepthEstimator;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, mpsc, watch, Notify, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 256;

/// Handle to one reconstruction run. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct ReconstructionSession {
    inner: Arc<Inner>,
}

struct Inner {
    name: String,
    config: ReconstructionConfig,
    estimator: DepthEstimator,
    builder: PointCloudBuilder,
    runtime: Handle,

    control: Mutex<Control>,
    accumulator: Mutex<Accumulator>,

    /// Bumped by `halt`; frames tagged with an older value are discarded.
    generation: AtomicU64,
    next_frame: AtomicU64,
    /// Frames submitted but not yet integrated, skipped or discarded.
    pending: AtomicUsize,
    settled: Notify,
    /// One permit per frame under depth estimation.
    slots: Arc<Semaphore>,

    progress: watch::Sender<f32>,
    events: broadcast::Sender<SessionEvent>,
}

struct Control {
    state: SessionState,
    frames: Option<mpsc::Sender<CameraObservation>>,
    mesh: Option<TriangleMesh>,
    metrics: Option<QualityMetrics>,
}

#[derive(Default)]
struct Accumulator {
    cloud: PointCloud,
    method: Option<ReconstructionMethod>,
    integrated: usize,
    skipped: usize,
    discarded: usize,
}

impl ReconstructionSession {
    /// Start a session in the `Recording` state.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(name: impl Into<String>, config: ReconstructionConfig) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current()
            .map_err(|e| Error::InvalidState(format!("no tokio runtime available: {e}")))?;

        let slots = Arc::new(Semaphore::new(config.session.max_in_flight));
        let (progress, _) = watch::channel(0.0f32);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let session = Self {
            inner: Arc::new(Inner {
                name: name.into(),
                estimator: config.depth_estimator(),
                builder: config.point_cloud_builder(),
                config,
                runtime,
                control: Mutex::new(Control {
                    state: SessionState::Stopped,
                    frames: None,
                    mesh: None,
                    metrics: None,
                }),
                accumulator: Mutex::new(Accumulator::default()),
                generation: AtomicU64::new(0),
                next_frame: AtomicU64::new(0),
                pending: AtomicUsize::new(0),
                settled: Notify::new(),
                slots,
                progress,
                events,
            }),
        };

        session.open_recording(&mut session.inner.control.lock());
        info!(session = %session.inner.name, "reconstruction session started");
        Ok(session)
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &ReconstructionConfig {
        &self.inner.config
    }

    pub fn state(&self) -> SessionState {
        self.inner.control.lock().state
    }

    /// Queue a frame, waiting while the queue is full.
    pub async fn submit(&self, observation: CameraObservation) -> Result<()> {
        let frames = self.sender()?;
        self.inner.pending.fetch_add(1, Ordering::AcqRel);
        if frames.send(observation).await.is_err() {
            self.inner.finish_frame();
            return Err(Error::InvalidState("recording has stopped".to_string()));
        }
        Ok(())
    }

    /// Queue a frame without waiting. Fails with [`Error::Backpressure`]
    /// when the queue is full.
    pub fn try_submit(&self, observation: CameraObservation) -> Result<()> {
        let frames = self.sender()?;
        self.inner.pending.fetch_add(1, Ordering::AcqRel);
        match frames.try_send(observation) {
            Ok(()) => Ok(()),
            Err(e) => {
                self.inner.finish_frame();
                match e {
                    mpsc::error::TrySendError::Full(_) => Err(Error::Backpressure),
                    mpsc::error::TrySendError::Closed(_) => {
                        Err(Error::InvalidState("recording has stopped".to_string()))
                    }
                }
            }
        }
    }

    fn sender(&self) -> Result<mpsc::Sender<CameraObservation>> {
        let control = self.inner.control.lock();
        match (&control.state, &control.frames) {
            (SessionState::Recording, Some(frames)) => Ok(frames.clone()),
            (state, _) => Err(Error::InvalidState(format!(
                "cannot submit frames while {state}"
            ))),
        }
    }

    /// Wait until every submitted frame has been integrated, skipped or
    /// discarded.
    pub async fn flush(&self) {
        loop {
            let notified = self.inner.settled.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.inner.pending.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Stop recording. Queued and in-flight frames are discarded; points
    /// already appended are kept.
    pub fn halt(&self) -> Result<()> {
        let mut control = self.inner.control.lock();
        match control.state {
            SessionState::Recording => {}
            SessionState::Stopped | SessionState::Finalized => return Ok(()),
            SessionState::Finalizing => {
                return Err(Error::InvalidState(
                    "cannot halt while finalizing".to_string(),
                ))
            }
        }

        {
            // Under the cloud lock so no stale frame can append afterwards.
            let _acc = self.inner.accumulator.lock();
            self.inner.generation.fetch_add(1, Ordering::AcqRel);
        }
        control.frames = None;
        control.state = SessionState::Stopped;
        info!(session = %self.inner.name, "recording halted");
        Ok(())
    }

    /// Reopen recording after a halt or a finalize. Accumulated points are
    /// kept.
    pub fn resume(&self) -> Result<()> {
        let mut control = self.inner.control.lock();
        match control.state {
            SessionState::Recording => Ok(()),
            SessionState::Finalizing => Err(Error::InvalidState(
                "cannot resume while finalizing".to_string(),
            )),
            SessionState::Stopped | SessionState::Finalized => {
                self.open_recording(&mut control);
                info!(session = %self.inner.name, "recording resumed");
                Ok(())
            }
        }
    }

    fn open_recording(&self, control: &mut Control) {
        let (tx, rx) = mpsc::channel(self.inner.config.session.queue_capacity);
        let generation = self.inner.generation.load(Ordering::Acquire);
        self.inner.runtime.spawn(dispatch(
            Arc::downgrade(&self.inner),
            self.inner.slots.clone(),
            rx,
            generation,
        ));
        control.frames = Some(tx);
        control.state = SessionState::Recording;
    }

    /// Halt recording and finalize.
    pub async fn stop(&self) -> Result<QualityMetrics> {
        self.halt()?;
        self.finalize().await
    }

    /// Filter, mesh and analyze the points gathered so far.
    ///
    /// On failure the session returns to the state it was finalized from,
    /// keeping its cloud and any earlier mesh, so more frames can be added
    /// after [`resume`](Self::resume).
    pub async fn finalize(&self) -> Result<QualityMetrics> {
        let previous = {
            let mut control = self.inner.control.lock();
            match control.state {
                previous @ (SessionState::Stopped | SessionState::Finalized) => {
                    control.state = SessionState::Finalizing;
                    previous
                }
                state => {
                    return Err(Error::InvalidState(format!("cannot finalize while {state}")))
                }
            }
        };

        let result = self.finalize_inner().await;

        let mut control = self.inner.control.lock();
        match result {
            Ok((mesh, metrics)) => {
                control.mesh = Some(mesh);
                control.metrics = Some(metrics.clone());
                control.state = SessionState::Finalized;
                drop(control);
                self.inner.emit(SessionEvent::Finalized {
                    vertices: metrics.vertex_count,
                    triangles: metrics.triangle_count,
                });
                Ok(metrics)
            }
            Err(e) => {
                control.state = previous;
                drop(control);
                warn!(session = %self.inner.name, error = %e, "finalize failed");
                self.inner.emit(SessionEvent::FinalizeFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn finalize_inner(&self) -> Result<(TriangleMesh, QualityMetrics)> {
        let (cloud, method, integrated, seen) = {
            let acc = self.inner.accumulator.lock();
            (
                acc.cloud.clone(),
                acc.method,
                acc.integrated,
                acc.integrated + acc.skipped,
            )
        };

        self.inner.progress.send_replace(0.0);
        self.inner.emit(SessionEvent::FinalizeStarted {
            points: cloud.len(),
            frames: integrated,
        });

        if seen == 0 {
            return Err(Error::InvalidInput("no frames were captured".to_string()));
        }
        let required = self.inner.config.session.min_frames;
        if integrated < required {
            return Err(Error::InsufficientData {
                captured: integrated,
                required,
            });
        }
        let method = method.unwrap_or(ReconstructionMethod::SensorDepth);

        let inner = self.inner.clone();
        let out = self
            .inner
            .runtime
            .spawn_blocking(move || {
                let reporter = inner.clone();
                run_pipeline(&cloud, method, &inner.config, move |p| {
                    reporter.report_progress(p)
                })
            })
            .await
            .map_err(|e| Error::RuntimeError(format!("finalize task failed: {e}")))??;

        Ok((out.mesh, out.metrics))
    }

    /// Latest finalize progress in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        *self.inner.progress.borrow()
    }

    pub fn watch_progress(&self) -> watch::Receiver<f32> {
        self.inner.progress.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Mesh of the last successful finalize.
    pub fn current_mesh(&self) -> Option<TriangleMesh> {
        self.inner.control.lock().mesh.clone()
    }

    pub fn quality_metrics(&self) -> Option<QualityMetrics> {
        self.inner.control.lock().metrics.clone()
    }

    pub fn point_count(&self) -> usize {
        self.inner.accumulator.lock().cloud.len()
    }

    /// Snapshot of the accumulated cloud.
    pub fn point_cloud(&self) -> PointCloud {
        self.inner.accumulator.lock().cloud.clone()
    }

    pub fn frames_integrated(&self) -> usize {
        self.inner.accumulator.lock().integrated
    }

    pub fn frames_skipped(&self) -> usize {
        self.inner.accumulator.lock().skipped
    }

    /// Frames dropped because recording was halted before they finished.
    pub fn frames_discarded(&self) -> usize {
        self.inner.accumulator.lock().discarded
    }

    /// Export the current mesh and remember where it went.
    pub async fn export_current(
        &self,
        format: MeshFormat,
        path: impl AsRef<Path>,
    ) -> Result<PathBuf> {
        let mesh = self
            .current_mesh()
            .ok_or_else(|| Error::InvalidState("no mesh has been finalized".to_string()))?;
        let location = export_mesh_async(mesh, format, path.as_ref().to_path_buf()).await?;
        if let Some(mesh) = self.inner.control.lock().mesh.as_mut() {
            mesh.record_export(&location);
        }
        Ok(location)
    }

    /// Export the accumulated point cloud as ASCII PLY.
    pub async fn export_point_cloud(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let cloud = self.point_cloud();
        let path = path.as_ref().to_path_buf();
        self.inner
            .runtime
            .spawn_blocking(move || write_ply_ascii(&cloud, path))
            .await
            .map_err(|e| Error::RuntimeError(format!("export task failed: {e}")))?
    }
}

/// Write `mesh` on the blocking pool and return the file location.
pub async fn export_mesh_async(
    mesh: TriangleMesh,
    format: MeshFormat,
    path: PathBuf,
) -> Result<PathBuf> {
    tokio::task::spawn_blocking(move || export_mesh(&mesh, format, path))
        .await
        .map_err(|e| Error::RuntimeError(format!("export task failed: {e}")))?
}

async fn dispatch(
    inner: Weak<Inner>,
    slots: Arc<Semaphore>,
    mut frames: mpsc::Receiver<CameraObservation>,
    generation: u64,
) {
    loop {
        // Frames stay queued (and submitters see back-pressure) until a
        // worker slot is free.
        let Ok(permit) = slots.clone().acquire_owned().await else {
            break;
        };
        let Some(observation) = frames.recv().await else {
            break;
        };
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if inner.generation.load(Ordering::Acquire) != generation {
            inner.discard_frame();
            continue;
        }
        let frame = inner.next_frame.fetch_add(1, Ordering::AcqRel);
        let worker = inner.clone();
        inner.runtime.spawn_blocking(move || {
            worker.integrate(frame, observation, generation, permit)
        });
    }
}

impl Inner {
    fn integrate(
        &self,
        frame: u64,
        observation: CameraObservation,
        generation: u64,
        slot: OwnedSemaphorePermit,
    ) {
        match process_frame(&observation, &self.estimator, &self.builder) {
            Ok(points) => {
                let added = points.len();
                let mut acc = self.accumulator.lock();
                if self.generation.load(Ordering::Acquire) != generation {
                    acc.discarded += 1;
                    drop(acc);
                    debug!(frame, "frame discarded after halt");
                } else {
                    acc.cloud.append(points);
                    let method = observation.reconstruction_method();
                    acc.method = Some(acc.method.map_or(method, |m| m.merge(method)));
                    acc.integrated += 1;
                    let total = acc.cloud.len();
                    drop(acc);
                    debug!(frame, added, total, "frame integrated");
                    self.emit(SessionEvent::FrameIntegrated {
                        frame,
                        points_added: added,
                        total_points: total,
                    });
                }
            }
            Err(e) => {
                let mut acc = self.accumulator.lock();
                let current = self.generation.load(Ordering::Acquire) == generation;
                if current {
                    acc.skipped += 1;
                } else {
                    acc.discarded += 1;
                }
                drop(acc);
                if current {
                    warn!(frame, error = %e, "frame skipped");
                    self.emit(SessionEvent::FrameSkipped {
                        frame,
                        reason: e.to_string(),
                    });
                }
            }
        }
        drop(slot);
        self.finish_frame();
    }

    fn discard_frame(&self) {
        self.accumulator.lock().discarded += 1;
        self.finish_frame();
    }

    fn finish_frame(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.settled.notify_waiters();
        }
    }

    fn report_progress(&self, value: f32) {
        let value = value.clamp(0.0, 1.0);
        let advanced = self.progress.send_if_modified(|current| {
            if value > *current {
                *current = value;
                true
            } else {
                false
            }
        });
        if advanced {
            self.emit(SessionEvent::Progress(value));
        }
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
