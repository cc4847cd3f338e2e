//! End-to-end tests for the frame pipeline
//!
//! Frames are synthesized in memory: Code 128 symbols drawn with the
//! crate's own encoder, QR symbols rendered from the `qrcode` crate.
//! A manual clock drives the cooldown and fake general engines make the
//! asynchronous path deterministic. Decoding happens on the pipeline's
//! worker thread, so tests wait for events or for the pipeline to go idle.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use frame_scan::decoder::{Completion, EngineOptions};
use frame_scan::tools::{paint_code128, render_code128};
use frame_scan::utils::geometry::{invert_polarity, rotate};
use frame_scan::utils::luminance::luminance_from_frame;
use frame_scan::{
    ChannelListener, DecodeOutcome, DecodeStrategy, Detection, FixedRoi, Frame, FramePipeline,
    LuminanceGrid, LuminanceSource, ManualClock, PipelineState, Plane, RoiFraction, Rotation,
    ScanEvent, ScanInput, Submission, SymbolEngine, Symbology,
};

const TEXT: &str = "ABC-1234";
const WAIT: Duration = Duration::from_secs(10);

/// 640x480 white frame with a centered symbol, bars on rows 180..300
fn barcode_grid() -> LuminanceGrid {
    render_code128(TEXT, 640, 480, 3, 120).expect("symbol fits")
}

fn frame_from(grid: LuminanceGrid, rotation: Rotation) -> Frame {
    let (width, height) = (grid.width(), grid.height());
    Frame::from_luma(width, height, rotation, grid.into_samples())
}

fn counted(frame: Frame, releases: &Arc<AtomicUsize>) -> Frame {
    let releases = Arc::clone(releases);
    frame.with_release_hook(move || {
        releases.fetch_add(1, Ordering::SeqCst);
    })
}

fn detected(symbology: &str, text: &str) -> ScanEvent {
    ScanEvent::Detected {
        symbology: symbology.to_string(),
        text: text.to_string(),
    }
}

/// General engine that answers immediately and counts calls
#[derive(Default)]
struct CountingEngine {
    calls: AtomicUsize,
    options: EngineOptions,
    answer: Option<Detection>,
}

impl SymbolEngine for CountingEngine {
    fn options(&self) -> &EngineOptions {
        &self.options
    }

    fn process(&self, _image: Arc<LuminanceGrid>, done: Completion) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        done(Ok(self.answer.iter().cloned().collect()))
    }

    fn close(&self) {}
}

/// General engine that parks its completion until the test releases it
#[derive(Default)]
struct ParkedEngine {
    options: EngineOptions,
    parked: Mutex<Vec<Completion>>,
    arrived: Condvar,
    closed: AtomicUsize,
}

impl ParkedEngine {
    /// Wait for the worker to hand over at least one completion
    fn parked(&self) -> MutexGuard<'_, Vec<Completion>> {
        let parked = self.parked.lock().unwrap();
        self.arrived
            .wait_timeout_while(parked, WAIT, |parked| parked.is_empty())
            .unwrap()
            .0
    }

    fn finish(&self, result: frame_scan::Result<Vec<Detection>>) {
        let done = self.parked().pop().expect("a parked completion");
        done(result);
    }
}

impl SymbolEngine for ParkedEngine {
    fn options(&self) -> &EngineOptions {
        &self.options
    }

    fn process(&self, _image: Arc<LuminanceGrid>, done: Completion) {
        self.parked.lock().unwrap().push(done);
        self.arrived.notify_all();
    }

    fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// General engine that keeps every image it is handed
#[derive(Default)]
struct RecordingEngine {
    options: EngineOptions,
    images: Mutex<Vec<Arc<LuminanceGrid>>>,
}

impl SymbolEngine for RecordingEngine {
    fn options(&self) -> &EngineOptions {
        &self.options
    }

    fn process(&self, image: Arc<LuminanceGrid>, done: Completion) {
        self.images.lock().unwrap().push(image);
        done(Ok(Vec::new()))
    }

    fn close(&self) {}
}

fn pipeline_with(
    engine: Arc<dyn SymbolEngine>,
    clock: &ManualClock,
) -> (FramePipeline, Receiver<ScanEvent>) {
    let (listener, rx) = ChannelListener::new();
    let pipeline = FramePipeline::builder(Arc::new(listener))
        .clock(Arc::new(clock.clone()))
        .general_engine(engine)
        .build();
    (pipeline, rx)
}

#[test]
fn test_code128_detected_then_suppressed_then_emitted_again() {
    let clock = ManualClock::new(50_000);
    let engine = Arc::new(CountingEngine::default());
    let (pipeline, rx) = pipeline_with(engine.clone(), &clock);
    let releases = Arc::new(AtomicUsize::new(0));

    let submitted = pipeline.submit(counted(frame_from(barcode_grid(), Rotation::Deg0), &releases));
    assert_eq!(submitted, Submission::Accepted);
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), detected("Code 128 (ZXing)", TEXT));
    assert!(pipeline.wait_idle(WAIT));
    assert_eq!(releases.load(Ordering::SeqCst), 1);

    clock.advance(200);
    pipeline.submit(counted(frame_from(barcode_grid(), Rotation::Deg0), &releases));
    assert!(pipeline.wait_idle(WAIT));
    assert!(rx.try_recv().is_err(), "duplicate inside cooldown must not reach the listener");
    assert_eq!(releases.load(Ordering::SeqCst), 2);

    clock.advance(1800);
    pipeline.submit(counted(frame_from(barcode_grid(), Rotation::Deg0), &releases));
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), detected("Code 128 (ZXing)", TEXT));
    assert!(pipeline.wait_idle(WAIT));
    assert_eq!(releases.load(Ordering::SeqCst), 3);

    // The specialized path found every symbol; the general engine never ran
    assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
    let stats = pipeline.stats();
    assert_eq!(stats.specialized_hits, 3);
    assert_eq!(stats.suppressed_duplicates, 1);
    assert_eq!(pipeline.state(), PipelineState::Idle);
}

#[test]
fn test_symbol_found_at_every_sensor_rotation() {
    for rotation in Rotation::ALL {
        // Content as the sensor delivers it: undoing `rotation` makes it upright
        let turns = (4 - rotation.quarter_turns()) % 4;
        let grid = rotate(&barcode_grid(), turns);
        let clock = ManualClock::new(0);
        let (pipeline, rx) = pipeline_with(Arc::new(CountingEngine::default()), &clock);

        pipeline.submit(frame_from(grid, rotation));
        assert_eq!(
            rx.recv_timeout(WAIT).unwrap(),
            detected("Code 128 (ZXing)", TEXT),
            "sensor rotation {rotation}"
        );
    }
}

#[test]
fn test_sideways_symbol_without_rotation_hint() {
    let grid = rotate(&barcode_grid(), 1);
    let clock = ManualClock::new(0);
    let (pipeline, rx) = pipeline_with(Arc::new(CountingEngine::default()), &clock);
    pipeline.submit(frame_from(grid, Rotation::Deg0));
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), detected("Code 128 (ZXing)", TEXT));
}

#[test]
fn test_light_on_dark_symbol_uses_inverted_candidate() {
    let grid = invert_polarity(&barcode_grid()).unwrap();
    let clock = ManualClock::new(0);
    let (pipeline, rx) = pipeline_with(Arc::new(CountingEngine::default()), &clock);
    pipeline.submit(frame_from(grid, Rotation::Deg0));
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), detected("Code 128 (ZXing)", TEXT));
}

/// Specialized strategy that records the ROI it was handed
#[derive(Clone, Default)]
struct RoiRecorder {
    seen: Arc<Mutex<Vec<RoiFraction>>>,
}

impl DecodeStrategy for RoiRecorder {
    fn name(&self) -> &str {
        "roi-recorder"
    }

    fn decode(&self, input: &ScanInput) -> DecodeOutcome {
        self.seen.lock().unwrap().push(input.roi);
        DecodeOutcome::NotFound
    }
}

#[test]
fn test_roi_provider_is_consulted() {
    let roi = RoiFraction::new(0.0, 0.0, 0.5, 0.4);
    let recorder = RoiRecorder::default();
    let (listener, rx) = ChannelListener::new();
    let pipeline = FramePipeline::builder(Arc::new(listener))
        .roi_provider(Arc::new(FixedRoi(roi)))
        .specialized(recorder.clone())
        .without_general_engine()
        .build();

    pipeline.submit(Frame::from_luma(16, 16, Rotation::Deg0, vec![255; 256]));
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), ScanEvent::NoneDetected);
    assert_eq!(recorder.seen.lock().unwrap().as_slice(), &[roi]);
}

#[test]
fn test_symbol_inside_custom_roi() {
    let (listener, rx) = ChannelListener::new();
    let clock = ManualClock::new(0);
    // Symbol drawn in the top-left quarter, outside the default band
    let mut grid = LuminanceGrid::filled(640, 480, 255);
    paint_code128(&mut grid, "TOP", 40, 40, 2, 60).unwrap();

    let pipeline = FramePipeline::builder(Arc::new(listener))
        .clock(Arc::new(clock))
        .roi_provider(Arc::new(FixedRoi(RoiFraction::new(0.0, 0.0, 0.5, 0.4))))
        .without_general_engine()
        .build();
    pipeline.submit(frame_from(grid, Rotation::Deg0));
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), detected("Code 128 (ZXing)", "TOP"));
}

#[test]
fn test_blank_frame_falls_through_to_general_engine() {
    let clock = ManualClock::new(0);
    let engine = Arc::new(CountingEngine {
        answer: Some(Detection::new(Symbology::DataMatrix, "DM-42")),
        ..Default::default()
    });
    let (pipeline, rx) = pipeline_with(engine.clone(), &clock);

    pipeline.submit(Frame::from_luma(64, 48, Rotation::Deg0, vec![200; 64 * 48]));
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), detected("Data Matrix", "DM-42"));
    assert_eq!(engine.calls.load(Ordering::SeqCst), 1);
    assert_eq!(pipeline.stats().general_hits, 1);
}

#[test]
fn test_general_engine_gets_full_unrotated_frame() {
    // Non-square, sensor rotated: any rotation or ROI crop changes the grid
    let grid = LuminanceGrid::from_fn(96, 40, |x, y| ((x * 7 + y * 13) % 251) as u8);
    let expected = luminance_from_frame(&frame_from(grid.clone(), Rotation::Deg90)).unwrap();
    let engine = Arc::new(RecordingEngine::default());
    let (listener, rx) = ChannelListener::new();
    let pipeline = FramePipeline::builder(Arc::new(listener))
        .specialized(RoiRecorder::default())
        .general_engine(engine.clone())
        .build();

    pipeline.submit(frame_from(grid, Rotation::Deg90));
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), ScanEvent::NoneDetected);

    let images = engine.images.lock().unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!((images[0].width(), images[0].height()), (96, 40));
    assert_eq!(*images[0], expected);
}

#[test]
fn test_nothing_anywhere_reports_none() {
    let clock = ManualClock::new(0);
    let (pipeline, rx) = pipeline_with(Arc::new(CountingEngine::default()), &clock);
    pipeline.submit(Frame::from_luma(64, 48, Rotation::Deg90, vec![200; 64 * 48]));
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), ScanEvent::NoneDetected);
    assert_eq!(pipeline.stats().none_detected, 1);
}

#[test]
fn test_general_engine_failure_reports_none() {
    let clock = ManualClock::new(0);
    let engine = Arc::new(ParkedEngine::default());
    let (pipeline, rx) = pipeline_with(engine.clone(), &clock);

    pipeline.submit(Frame::from_luma(32, 32, Rotation::Deg0, vec![255; 32 * 32]));
    engine.finish(Err(frame_scan::ScanError::Engine("decoder crashed".into())));
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), ScanEvent::NoneDetected);
    assert_eq!(pipeline.state(), PipelineState::Idle);
}

#[test]
fn test_single_flight_drops_frames_while_processing() {
    let clock = ManualClock::new(0);
    let engine = Arc::new(ParkedEngine::default());
    let (pipeline, rx) = pipeline_with(engine.clone(), &clock);
    let first_released = Arc::new(AtomicUsize::new(0));
    let second_released = Arc::new(AtomicUsize::new(0));

    let blank = || Frame::from_luma(32, 32, Rotation::Deg0, vec![255; 32 * 32]);
    assert_eq!(pipeline.submit(counted(blank(), &first_released)), Submission::Accepted);
    assert_eq!(pipeline.state(), PipelineState::Processing);
    assert_eq!(first_released.load(Ordering::SeqCst), 0);

    // Busy: released at once, no second engine call, state untouched
    assert_eq!(pipeline.submit(counted(blank(), &second_released)), Submission::DroppedBusy);
    assert_eq!(second_released.load(Ordering::SeqCst), 1);
    assert_eq!(engine.parked().len(), 1);
    assert_eq!(pipeline.state(), PipelineState::Processing);
    assert!(rx.try_recv().is_err());

    engine.finish(Ok(vec![Detection::new(Symbology::QrCode, "late")]));
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), detected("QR Code", "late"));
    assert_eq!(first_released.load(Ordering::SeqCst), 1);
    assert_eq!(pipeline.state(), PipelineState::Idle);

    let stats = pipeline.stats();
    assert_eq!(stats.frames_accepted, 1);
    assert_eq!(stats.frames_dropped_busy, 1);
}

#[test]
fn test_close_turns_late_completion_into_no_op() {
    let clock = ManualClock::new(0);
    let engine = Arc::new(ParkedEngine::default());
    let (pipeline, rx) = pipeline_with(engine.clone(), &clock);
    let released = Arc::new(AtomicUsize::new(0));

    pipeline.submit(counted(
        Frame::from_luma(32, 32, Rotation::Deg0, vec![255; 32 * 32]),
        &released,
    ));
    assert_eq!(engine.parked().len(), 1);
    pipeline.close();
    assert_eq!(engine.closed.load(Ordering::SeqCst), 1);

    engine.finish(Ok(vec![Detection::new(Symbology::QrCode, "after close")]));
    assert!(rx.try_recv().is_err());
    assert_eq!(released.load(Ordering::SeqCst), 1);
    assert_eq!(pipeline.state(), PipelineState::Idle);
}

#[test]
fn test_released_frame_reports_none_and_recovers() {
    let clock = ManualClock::new(0);
    let (pipeline, rx) = pipeline_with(Arc::new(CountingEngine::default()), &clock);
    let released = Arc::new(AtomicUsize::new(0));

    let frame = Frame::new(640, 480, Rotation::Deg0, vec![Plane::released(640, 1)]);
    pipeline.submit(counted(frame, &released));
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), ScanEvent::NoneDetected);
    assert!(pipeline.wait_idle(WAIT));
    assert_eq!(released.load(Ordering::SeqCst), 1);

    pipeline.submit(frame_from(barcode_grid(), Rotation::Deg0));
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), detected("Code 128 (ZXing)", TEXT));
}

#[test]
fn test_padded_interleaved_plane() {
    // Same symbol delivered with 2-byte pixels and padded rows
    let grid = barcode_grid();
    let (width, height) = (grid.width(), grid.height());
    let row_stride = width * 2 + 64;
    let mut buffer = vec![0u8; row_stride * height];
    for y in 0..height {
        for (x, &v) in grid.row(y).iter().enumerate() {
            buffer[y * row_stride + x * 2] = v;
        }
    }
    let frame = Frame::new(width, height, Rotation::Deg0, vec![Plane::new(buffer, row_stride, 2)]);

    let clock = ManualClock::new(0);
    let (pipeline, rx) = pipeline_with(Arc::new(CountingEngine::default()), &clock);
    pipeline.submit(frame);
    assert_eq!(rx.recv_timeout(WAIT).unwrap(), detected("Code 128 (ZXing)", TEXT));
}

#[test]
fn test_qr_symbol_through_default_general_engine() {
    use qrcode::{Color, QrCode};

    let code = QrCode::new(b"frame-scan").unwrap();
    let modules = code.width();
    let colors = code.to_colors();
    let scale = 6;
    let size = 240;
    let offset = (size - modules * scale) / 2;
    let grid = LuminanceGrid::from_fn(size, size, |x, y| {
        let (mx, my) = (x.wrapping_sub(offset) / scale, y.wrapping_sub(offset) / scale);
        if x >= offset && y >= offset && mx < modules && my < modules {
            if colors[my * modules + mx] == Color::Dark { 0 } else { 255 }
        } else {
            255
        }
    });

    let (listener, rx) = ChannelListener::new();
    let pipeline = FramePipeline::new(Arc::new(listener));
    pipeline.submit(frame_from(grid, Rotation::Deg0));
    let event = rx.recv_timeout(Duration::from_secs(10)).unwrap();
    assert_eq!(event, detected("QR Code", "frame-scan"));
}
