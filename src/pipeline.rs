//! Frame pipeline controller
//!
//! One frame at a time moves through luminance extraction, the synchronous
//! specialized path and, when that finds nothing, the asynchronous general
//! engine. [`FramePipeline::submit`] only claims the pipeline and hands the
//! frame to a dedicated decode worker, so the camera thread never waits on
//! a decode. A frame delivered while another is in flight is released at
//! once. The frame is owned by whichever stage runs last and is dropped
//! (releasing its buffers) right before the pipeline returns to idle.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use crate::config::ScannerConfig;
use crate::decoder::{
    Code128Reader, DecodeStrategy, EngineOptions, GeneralDecoder, QrEngine, ReaderHints,
    ScanInput, SpecializedDecoder, SymbolEngine,
};
use crate::dedup::{Clock, Debouncer, EmissionRecord, SystemClock};
use crate::listener::{RoiProvider, ScanListener};
use crate::models::{DecodeOutcome, Frame, Symbology};
use crate::utils::binarization::Binarizer;
use crate::utils::luminance::luminance_from_frame;

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// Ready for the next frame
    Idle,
    /// A frame is in flight
    Processing,
}

/// What happened to a submitted frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// The frame entered the pipeline
    Accepted,
    /// Another frame was in flight; this one was released unprocessed
    DroppedBusy,
    /// The pipeline is closed; the frame was released unprocessed
    Closed,
}

/// Counters since construction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Frames that entered the pipeline
    pub frames_accepted: u64,
    /// Frames released because another was in flight
    pub frames_dropped_busy: u64,
    /// Detections from the specialized path
    pub specialized_hits: u64,
    /// Detections from the general engine
    pub general_hits: u64,
    /// Frames reported as `on_none_detected`
    pub none_detected: u64,
    /// Detections withheld by the cooldown
    pub suppressed_duplicates: u64,
}

#[derive(Debug, Default)]
struct StatsCounters {
    frames_accepted: AtomicU64,
    frames_dropped_busy: AtomicU64,
    specialized_hits: AtomicU64,
    general_hits: AtomicU64,
    none_detected: AtomicU64,
    suppressed_duplicates: AtomicU64,
}

impl StatsCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            frames_accepted: self.frames_accepted.load(Ordering::Relaxed),
            frames_dropped_busy: self.frames_dropped_busy.load(Ordering::Relaxed),
            specialized_hits: self.specialized_hits.load(Ordering::Relaxed),
            general_hits: self.general_hits.load(Ordering::Relaxed),
            none_detected: self.none_detected.load(Ordering::Relaxed),
            suppressed_duplicates: self.suppressed_duplicates.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum DecodePath {
    Preprocess,
    Specialized,
    General,
}

/// Busy flag plus a condvar signalled on every return to idle
#[derive(Default)]
struct Flight {
    busy: AtomicBool,
    lock: Mutex<()>,
    idle: Condvar,
}

impl Flight {
    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    fn wait_idle(&self, timeout: Duration) -> bool {
        // `None` means a timeout too large to represent: wait indefinitely
        let deadline = Instant::now().checked_add(timeout);
        let mut lock = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        while self.is_busy() {
            let remaining = deadline.map_or(Duration::from_secs(3600), |deadline| {
                deadline.saturating_duration_since(Instant::now())
            });
            if remaining.is_zero() {
                return false;
            }
            lock = self
                .idle
                .wait_timeout(lock, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }
}

/// Holds the pipeline in `Processing`; dropping it returns to `Idle`
struct FlightGuard {
    flight: Arc<Flight>,
}

impl FlightGuard {
    fn try_acquire(flight: &Arc<Flight>) -> Option<Self> {
        flight
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                flight: Arc::clone(flight),
            })
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.flight.busy.store(false, Ordering::Release);
        // Taking the lock orders this store against a waiter's check
        let _lock = self.flight.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.flight.idle.notify_all();
    }
}

/// One accepted frame on its way to the decode worker
type Job = (Frame, FlightGuard);

/// State shared with completion callbacks
struct Reporter {
    listener: Arc<dyn ScanListener>,
    debouncer: Debouncer,
    clock: Arc<dyn Clock>,
    closed: AtomicBool,
    stats: StatsCounters,
}

impl Reporter {
    fn report(&self, outcome: DecodeOutcome, path: DecodePath) {
        if self.closed.load(Ordering::Acquire) {
            trace!(?path, "pipeline closed, result discarded");
            return;
        }
        match outcome {
            DecodeOutcome::Detected(detection) if !detection.text.is_empty() => {
                match path {
                    DecodePath::General => StatsCounters::bump(&self.stats.general_hits),
                    _ => StatsCounters::bump(&self.stats.specialized_hits),
                }
                let label = detection.label();
                if self.debouncer.admit(&detection.text, self.clock.now_ms()) {
                    info!(symbology = %label, ?path, "emitting detection");
                    self.listener.on_detected(&label, &detection.text);
                } else {
                    debug!(symbology = %label, "duplicate within cooldown suppressed");
                    StatsCounters::bump(&self.stats.suppressed_duplicates);
                }
            }
            _ => {
                StatsCounters::bump(&self.stats.none_detected);
                self.listener.on_none_detected();
            }
        }
    }
}

/// Everything the decode worker needs for one frame
struct DecodeWorker {
    reporter: Arc<Reporter>,
    specialized: Box<dyn DecodeStrategy>,
    general: Option<GeneralDecoder>,
    roi_provider: Option<Arc<dyn RoiProvider>>,
    config: ScannerConfig,
}

impl DecodeWorker {
    fn spawn(worker: &Arc<Self>) -> Option<SyncSender<Job>> {
        // The flight guard keeps at most one job outstanding
        let (jobs, queue) = mpsc::sync_channel::<Job>(1);
        let worker = Arc::clone(worker);
        match thread::Builder::new()
            .name("frame-scan-decode".into())
            .spawn(move || worker.run(queue))
        {
            Ok(_) => Some(jobs),
            Err(err) => {
                warn!(error = %err, "decode worker unavailable, frames decode on the caller");
                None
            }
        }
    }

    fn run(&self, queue: Receiver<Job>) {
        debug!("decode worker started");
        for (frame, guard) in queue {
            self.process(frame, guard);
        }
        debug!("decode worker stopped");
    }

    fn process(&self, frame: Frame, guard: FlightGuard) {
        if self.reporter.closed.load(Ordering::Acquire) {
            trace!("pipeline closed, frame released undecoded");
            drop(frame);
            drop(guard);
            return;
        }
        let rotation = frame.rotation();
        let grid = match luminance_from_frame(&frame) {
            Ok(grid) => Arc::new(grid),
            Err(err) => {
                warn!(error = %err, "frame preprocessing failed");
                self.reporter.report(DecodeOutcome::NotFound, DecodePath::Preprocess);
                drop(frame);
                drop(guard);
                return;
            }
        };

        let roi = self
            .roi_provider
            .as_ref()
            .and_then(|provider| provider.roi())
            .unwrap_or(self.config.default_roi);
        let input = ScanInput {
            grid: Arc::clone(&grid),
            rotation,
            roi,
            try_inverted: self.config.try_inverted,
        };
        debug!(%rotation, width = frame.width(), height = frame.height(), "frame accepted");

        let outcome = self.specialized.decode(&input);
        if outcome.is_detected() {
            self.reporter.report(outcome, DecodePath::Specialized);
            drop(frame);
            drop(guard);
            return;
        }

        let Some(general) = &self.general else {
            self.reporter.report(DecodeOutcome::NotFound, DecodePath::Specialized);
            drop(frame);
            drop(guard);
            return;
        };

        trace!("falling back to general engine");
        let reporter = Arc::clone(&self.reporter);
        general.decode_async(grid, move |outcome| {
            reporter.report(outcome, DecodePath::General);
            drop(frame);
            drop(guard);
        });
    }
}

/// Single-flight controller driving both decode paths for each frame
pub struct FramePipeline {
    flight: Arc<Flight>,
    worker: Arc<DecodeWorker>,
    /// `None` when no worker thread could be started
    jobs: Option<SyncSender<Job>>,
}

impl FramePipeline {
    /// Pipeline with the Code 128 reader, the QR engine and default settings
    pub fn new(listener: Arc<dyn ScanListener>) -> Self {
        Self::builder(listener).build()
    }

    /// Start configuring a pipeline
    pub fn builder(listener: Arc<dyn ScanListener>) -> PipelineBuilder {
        PipelineBuilder {
            listener,
            config: ScannerConfig::default(),
            clock: None,
            roi_provider: None,
            specialized: None,
            general: GeneralChoice::Default,
        }
    }

    /// Current state
    pub fn state(&self) -> PipelineState {
        if self.flight.is_busy() {
            PipelineState::Processing
        } else {
            PipelineState::Idle
        }
    }

    /// Block until the in-flight frame (if any) has been reported and
    /// released. Returns `false` if `timeout` passed first.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        self.flight.wait_idle(timeout)
    }

    /// Counter snapshot
    pub fn stats(&self) -> PipelineStats {
        self.worker.reporter.stats.snapshot()
    }

    /// Last value emitted to the listener
    pub fn last_emission(&self) -> Option<EmissionRecord> {
        self.worker.reporter.debouncer.last()
    }

    /// Settings in use
    pub fn config(&self) -> &ScannerConfig {
        &self.worker.config
    }

    /// True once [`FramePipeline::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.worker.reporter.closed.load(Ordering::Acquire)
    }

    /// Offer a frame.
    ///
    /// Returns as soon as the frame is handed to the decode worker or
    /// released; it never waits on a decode.
    pub fn submit(&self, frame: Frame) -> Submission {
        if self.is_closed() {
            return Submission::Closed;
        }
        let stats = &self.worker.reporter.stats;
        let Some(guard) = FlightGuard::try_acquire(&self.flight) else {
            StatsCounters::bump(&stats.frames_dropped_busy);
            debug!(width = frame.width(), height = frame.height(), "frame dropped, pipeline busy");
            return Submission::DroppedBusy;
        };
        StatsCounters::bump(&stats.frames_accepted);

        let Some(jobs) = &self.jobs else {
            self.worker.process(frame, guard);
            return Submission::Accepted;
        };
        if let Err(err) = jobs.try_send((frame, guard)) {
            let (frame, guard) = match err {
                TrySendError::Full(job) | TrySendError::Disconnected(job) => job,
            };
            warn!("decode worker gone, decoding on the caller");
            self.worker.process(frame, guard);
        }
        Submission::Accepted
    }

    /// Stop reporting: later completions become no-ops and the general
    /// engine is closed. Frames are still released.
    pub fn close(&self) {
        if self.worker.reporter.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(general) = &self.worker.general {
            general.close();
        }
        info!("frame pipeline closed");
    }
}

impl Drop for FramePipeline {
    fn drop(&mut self) {
        // Dropping `jobs` afterwards ends the worker loop
        self.close();
    }
}

enum GeneralChoice {
    Default,
    Engine(Arc<dyn SymbolEngine>),
    Disabled,
}

/// Builder for [`FramePipeline`]
pub struct PipelineBuilder {
    listener: Arc<dyn ScanListener>,
    config: ScannerConfig,
    clock: Option<Arc<dyn Clock>>,
    roi_provider: Option<Arc<dyn RoiProvider>>,
    specialized: Option<Box<dyn DecodeStrategy>>,
    general: GeneralChoice,
}

impl PipelineBuilder {
    /// Settings (cooldown, ROI, binarizer and reader tuning)
    pub fn config(mut self, config: ScannerConfig) -> Self {
        self.config = config;
        self
    }

    /// Time source for the cooldown
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// ROI provider consulted once per frame
    pub fn roi_provider(mut self, provider: Arc<dyn RoiProvider>) -> Self {
        self.roi_provider = Some(provider);
        self
    }

    /// Replace the synchronous specialized path
    pub fn specialized(mut self, strategy: impl DecodeStrategy + 'static) -> Self {
        self.specialized = Some(Box::new(strategy));
        self
    }

    /// Replace the general engine
    pub fn general_engine(mut self, engine: Arc<dyn SymbolEngine>) -> Self {
        self.general = GeneralChoice::Engine(engine);
        self
    }

    /// Run the specialized path only
    pub fn without_general_engine(mut self) -> Self {
        self.general = GeneralChoice::Disabled;
        self
    }

    /// Finish
    pub fn build(self) -> FramePipeline {
        let config = self.config;
        let specialized: Box<dyn DecodeStrategy> = match self.specialized {
            Some(strategy) => strategy,
            None => {
                let reader = Code128Reader::with_hints(ReaderHints {
                    target: Symbology::Code128,
                    try_harder: config.try_harder,
                });
                Box::new(SpecializedDecoder::with_binarizers(
                    reader,
                    config.adaptive_binarizer(),
                    Binarizer::GlobalHistogram,
                ))
            }
        };
        let general = match self.general {
            GeneralChoice::Default => Some(GeneralDecoder::new(Arc::new(QrEngine::new(
                EngineOptions::all_except(Symbology::Code128),
            )))),
            GeneralChoice::Engine(engine) => Some(GeneralDecoder::new(engine)),
            GeneralChoice::Disabled => None,
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock::new()));

        let worker = Arc::new(DecodeWorker {
            reporter: Arc::new(Reporter {
                listener: self.listener,
                debouncer: Debouncer::new(config.cooldown_ms),
                clock,
                closed: AtomicBool::new(false),
                stats: StatsCounters::default(),
            }),
            specialized,
            general,
            roi_provider: self.roi_provider,
            config,
        });
        let jobs = DecodeWorker::spawn(&worker);

        FramePipeline {
            flight: Arc::new(Flight::default()),
            worker,
            jobs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Completion;
    use crate::dedup::ManualClock;
    use crate::listener::{ChannelListener, ScanEvent};
    use crate::models::{Detection, LuminanceGrid, Plane, Rotation};

    const WAIT: Duration = Duration::from_secs(10);

    struct Always(Option<&'static str>);

    impl DecodeStrategy for Always {
        fn name(&self) -> &str {
            "always"
        }

        fn decode(&self, _input: &ScanInput) -> DecodeOutcome {
            self.0.map(|text| Detection::new(Symbology::Code128, text).with_source("ZXing")).into()
        }
    }

    /// Finds nothing until the test opens the gate
    struct Gated {
        open: Arc<(Mutex<bool>, Condvar)>,
    }

    impl DecodeStrategy for Gated {
        fn name(&self) -> &str {
            "gated"
        }

        fn decode(&self, _input: &ScanInput) -> DecodeOutcome {
            let (lock, cvar) = &*self.open;
            let mut open = lock.lock().unwrap();
            while !*open {
                open = cvar.wait(open).unwrap();
            }
            DecodeOutcome::NotFound
        }
    }

    #[derive(Default)]
    struct ClosableEngine {
        options: EngineOptions,
        closed: AtomicBool,
    }

    impl SymbolEngine for ClosableEngine {
        fn options(&self) -> &EngineOptions {
            &self.options
        }

        fn process(&self, _image: Arc<LuminanceGrid>, done: Completion) {
            done(Ok(Vec::new()))
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn pipeline(strategy: Always, clock: &ManualClock) -> (FramePipeline, Receiver<ScanEvent>) {
        let (listener, rx) = ChannelListener::new();
        let pipeline = FramePipeline::builder(Arc::new(listener))
            .clock(Arc::new(clock.clone()))
            .specialized(strategy)
            .without_general_engine()
            .build();
        (pipeline, rx)
    }

    fn frame() -> Frame {
        Frame::from_luma(8, 8, Rotation::Deg0, vec![128; 64])
    }

    #[test]
    fn test_flight_guard_is_exclusive() {
        let flight = Arc::new(Flight::default());
        let guard = FlightGuard::try_acquire(&flight).unwrap();
        assert!(FlightGuard::try_acquire(&flight).is_none());
        assert!(!flight.wait_idle(Duration::from_millis(10)));
        drop(guard);
        assert!(flight.wait_idle(Duration::ZERO));
        assert!(FlightGuard::try_acquire(&flight).is_some());
    }

    #[test]
    fn test_specialized_hit_is_reported_and_deduplicated() {
        let clock = ManualClock::new(1_000);
        let (pipeline, rx) = pipeline(Always(Some("X1")), &clock);

        assert_eq!(pipeline.submit(frame()), Submission::Accepted);
        assert_eq!(
            rx.recv_timeout(WAIT).unwrap(),
            ScanEvent::Detected {
                symbology: "Code 128 (ZXing)".into(),
                text: "X1".into()
            }
        );
        assert!(pipeline.wait_idle(WAIT));
        assert_eq!(pipeline.state(), PipelineState::Idle);

        clock.advance(200);
        pipeline.submit(frame());
        assert!(pipeline.wait_idle(WAIT));
        assert!(rx.try_recv().is_err());

        let stats = pipeline.stats();
        assert_eq!(stats.frames_accepted, 2);
        assert_eq!(stats.specialized_hits, 2);
        assert_eq!(stats.suppressed_duplicates, 1);
    }

    #[test]
    fn test_empty_text_reports_none() {
        let clock = ManualClock::new(0);
        let (pipeline, rx) = pipeline(Always(Some("")), &clock);
        pipeline.submit(frame());
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), ScanEvent::NoneDetected);
    }

    #[test]
    fn test_unavailable_frame_reports_none_and_returns_idle() {
        let clock = ManualClock::new(0);
        let (pipeline, rx) = pipeline(Always(Some("never")), &clock);
        let released = Frame::new(4, 4, Rotation::Deg0, vec![Plane::released(4, 1)]);
        assert_eq!(pipeline.submit(released), Submission::Accepted);
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), ScanEvent::NoneDetected);
        assert!(pipeline.wait_idle(WAIT));
        assert_eq!(pipeline.stats().none_detected, 1);
    }

    #[test]
    fn test_submit_returns_while_decode_is_running() {
        let open = Arc::new((Mutex::new(false), Condvar::new()));
        let (listener, rx) = ChannelListener::new();
        let pipeline = FramePipeline::builder(Arc::new(listener))
            .specialized(Gated {
                open: Arc::clone(&open),
            })
            .without_general_engine()
            .build();

        // Returns although the specialized pass is still blocked
        assert_eq!(pipeline.submit(frame()), Submission::Accepted);
        assert_eq!(pipeline.state(), PipelineState::Processing);
        assert_eq!(pipeline.submit(frame()), Submission::DroppedBusy);
        assert!(rx.try_recv().is_err());

        *open.0.lock().unwrap() = true;
        open.1.notify_all();
        assert_eq!(rx.recv_timeout(WAIT).unwrap(), ScanEvent::NoneDetected);
        assert!(pipeline.wait_idle(WAIT));
        assert_eq!(pipeline.stats().frames_dropped_busy, 1);
    }

    #[test]
    fn test_closed_pipeline_releases_without_reporting() {
        let clock = ManualClock::new(0);
        let (pipeline, rx) = pipeline(Always(Some("X")), &clock);
        pipeline.close();
        assert!(pipeline.is_closed());
        assert_eq!(pipeline.submit(frame()), Submission::Closed);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_drop_closes_general_engine() {
        let engine = Arc::new(ClosableEngine::default());
        let (listener, _rx) = ChannelListener::new();
        let pipeline = FramePipeline::builder(Arc::new(listener))
            .general_engine(engine.clone())
            .build();
        assert!(!engine.closed.load(Ordering::SeqCst));
        drop(pipeline);
        assert!(engine.closed.load(Ordering::SeqCst));
    }
}
