// Session coordinator
// Owns the capture -> estimation -> overlay pipeline and the analysis modes

use crate::core::capture_manager::{CaptureManager, SourceProvider};
use crate::core::config::Config;
use crate::core::live_feedback::{FeedbackBoard, LiveFeedbackLoop, SharedFrame, SharedPose};
use crate::core::overlay::{DrawSurface, OverlayRenderer};
use crate::core::pose_estimator::{PoseEngine, PoseEstimator};
use crate::core::scoring::PostureScoring;
use crate::core::upload::UploadPipeline;
use crate::models::capture::{CaptureError, CaptureResult, SourceKind};
use crate::models::feedback::{AnalysisMode, AnalysisSummary, FeedbackResult};
use crate::models::pose::PoseSnapshot;
use log::{info, warn};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

// ==============================================================================
// Session States
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No source is open.
    Idle,
    /// Camera streaming with the overlay pipeline, live scoring off.
    WebcamArmed,
    /// Camera streaming and the live scoring loop sampling.
    WebcamAnalyzing,
    /// A video file is open and its analysis is in flight.
    UploadPending,
    /// The uploaded video's analysis has completed.
    UploadAnalyzed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Webcam,
    Upload,
}

// ==============================================================================
// Session Coordinator
// ==============================================================================

/// Wires the capture manager, pose estimator, overlay and scoring loops
/// together, and enforces that only one video source and one analysis flow
/// exist at a time.
pub struct SessionCoordinator {
    session_id: String,
    capture: Arc<Mutex<CaptureManager>>,
    estimator: PoseEstimator,
    overlay: Arc<Mutex<OverlayRenderer>>,
    board: FeedbackBoard,
    live: LiveFeedbackLoop,
    upload: UploadPipeline,
    latest_frame: SharedFrame,
    latest_pose: SharedPose,
    state: Arc<RwLock<SessionState>>,
    mode: Arc<RwLock<AnalysisMode>>,
    tab: Arc<RwLock<Tab>>,
    pump_running: Arc<AtomicBool>,
    pump: Mutex<Option<JoinHandle<()>>>,
    analysis: Mutex<Option<JoinHandle<()>>>,
}

impl SessionCoordinator {
    pub fn new(
        config: &Config,
        provider: Arc<dyn SourceProvider>,
        engine: Arc<dyn PoseEngine>,
        scoring: Arc<dyn PostureScoring>,
        surface: Box<dyn DrawSurface>,
    ) -> Self {
        let board = FeedbackBoard::default();
        let latest_frame: SharedFrame = Arc::new(RwLock::new(None));
        let latest_pose: SharedPose = Arc::new(RwLock::new(PoseSnapshot::empty()));

        let mut overlay = OverlayRenderer::new(surface);
        overlay.set_visible(config.overlay_enabled);

        let live = LiveFeedbackLoop::new(
            scoring.clone(),
            board.clone(),
            latest_frame.clone(),
            latest_pose.clone(),
            Duration::from_millis(config.sample_interval_ms),
            config.jpeg_quality,
        );
        let upload = UploadPipeline::new(scoring, board.clone(), config.max_upload_bytes);

        Self {
            session_id: Uuid::new_v4().to_string(),
            capture: Arc::new(Mutex::new(CaptureManager::new(provider))),
            estimator: PoseEstimator::new(engine),
            overlay: Arc::new(Mutex::new(overlay)),
            board,
            live,
            upload,
            latest_frame,
            latest_pose,
            state: Arc::new(RwLock::new(SessionState::Idle)),
            mode: Arc::new(RwLock::new(AnalysisMode::Squat)),
            tab: Arc::new(RwLock::new(Tab::Webcam)),
            pump_running: Arc::new(AtomicBool::new(false)),
            pump: Mutex::new(None),
            analysis: Mutex::new(None),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    pub async fn mode(&self) -> AnalysisMode {
        *self.mode.read().await
    }

    pub async fn tab(&self) -> Tab {
        *self.tab.read().await
    }

    pub async fn current_feedback(&self) -> Option<FeedbackResult> {
        self.board.current().await
    }

    pub async fn upload_summary(&self) -> Option<AnalysisSummary> {
        self.upload.summary().await
    }

    pub fn is_upload_analyzing(&self) -> bool {
        self.upload.is_analyzing()
    }

    // ==========================================================================
    // Webcam Flow
    // ==========================================================================

    /// Open the camera and start the frame pump. A permission refusal or
    /// missing device leaves the session exactly as it was.
    pub async fn start_recording(&self) -> CaptureResult<()> {
        self.capture
            .lock()
            .await
            .start(SourceKind::Camera, None)
            .await?;

        self.spawn_pump().await;
        *self.state.write().await = SessionState::WebcamArmed;
        info!("recording started (session {})", self.session_id);
        Ok(())
    }

    /// Full webcam teardown: sampler, pump, camera handle, displayed
    /// feedback and overlay all go. Idempotent.
    pub async fn stop_recording(&self) {
        self.live.stop().await;
        self.stop_pump().await;
        self.capture.lock().await.stop().await;

        self.board.clear().await;
        *self.latest_pose.write().await = PoseSnapshot::empty();
        *self.latest_frame.write().await = None;
        self.overlay.lock().await.clear();

        let mut state = self.state.write().await;
        if matches!(
            *state,
            SessionState::WebcamArmed | SessionState::WebcamAnalyzing
        ) {
            *state = SessionState::Idle;
            info!("recording stopped (session {})", self.session_id);
        }
    }

    /// Turn the live scoring loop on or off. Only meaningful while the
    /// camera is streaming; enabling clears whatever feedback was left over.
    pub async fn set_live_analysis(&self, enabled: bool) {
        let mut state = self.state.write().await;
        match (*state, enabled) {
            (SessionState::WebcamArmed, true) => {
                self.board.clear().await;
                self.live.start(*self.mode.read().await).await;
                *state = SessionState::WebcamAnalyzing;
            }
            (SessionState::WebcamAnalyzing, false) => {
                self.live.stop().await;
                *state = SessionState::WebcamArmed;
            }
            _ => {}
        }
    }

    // ==========================================================================
    // Upload Flow
    // ==========================================================================

    /// Open a video file for preview and kick off its one-shot analysis.
    /// Replaces any previous video; an analysis still in flight for it is
    /// dropped.
    pub async fn upload_video(&self, path: &Path) -> CaptureResult<()> {
        if let Some(handle) = self.analysis.lock().await.take() {
            handle.abort();
        }

        self.capture
            .lock()
            .await
            .start(SourceKind::File, Some(path))
            .await?;

        self.spawn_pump().await;
        // The analyzing mark is up before this method returns.
        let epoch = self.upload.begin().await;
        *self.state.write().await = SessionState::UploadPending;

        let pipeline = self.upload.clone();
        let mode = *self.mode.read().await;
        let state = self.state.clone();
        let video = path.to_path_buf();
        let handle = tokio::spawn(async move {
            // Only an applied outcome completes the pending state; a
            // superseded run leaves the transition to its successor.
            if pipeline.run(epoch, &video, mode).await {
                let mut state = state.write().await;
                if *state == SessionState::UploadPending {
                    *state = SessionState::UploadAnalyzed;
                }
            }
        });
        *self.analysis.lock().await = Some(handle);
        Ok(())
    }

    /// Discard the uploaded video and everything derived from it.
    /// An analysis still in flight is dropped, not waited for.
    pub async fn remove_video(&self) {
        if let Some(handle) = self.analysis.lock().await.take() {
            handle.abort();
        }
        self.upload.invalidate().await;
        self.stop_pump().await;
        self.capture.lock().await.stop().await;

        self.board.clear().await;
        *self.latest_pose.write().await = PoseSnapshot::empty();
        *self.latest_frame.write().await = None;
        self.overlay.lock().await.clear();

        let mut state = self.state.write().await;
        if matches!(
            *state,
            SessionState::UploadPending | SessionState::UploadAnalyzed
        ) {
            *state = SessionState::Idle;
        }
    }

    // ==========================================================================
    // Shared Controls
    // ==========================================================================

    /// Switch between the webcam and upload flows, tearing down whichever
    /// session the previous tab had running.
    pub async fn switch_tab(&self, tab: Tab) {
        if *self.tab.read().await == tab {
            return;
        }
        match tab {
            Tab::Upload => self.stop_recording().await,
            Tab::Webcam => self.remove_video().await,
        }
        *self.tab.write().await = tab;
    }

    /// Change the posture being evaluated. A sampling live loop is restarted
    /// so subsequent requests carry the new mode; feedback about the old
    /// mode is cleared.
    pub async fn set_mode(&self, mode: AnalysisMode) {
        *self.mode.write().await = mode;
        if self.live.is_sampling() {
            self.live.stop().await;
            self.board.clear().await;
            self.live.start(mode).await;
        }
    }

    /// Toggle the skeletal overlay. Re-enabling redraws the latest snapshot
    /// immediately rather than waiting for the next frame.
    pub async fn set_overlay_visible(&self, visible: bool) {
        let mut overlay = self.overlay.lock().await;
        overlay.set_visible(visible);
        if visible {
            if let Some(frame) = self.latest_frame.read().await.as_ref() {
                let snapshot = self.latest_pose.read().await.clone();
                overlay.render(&snapshot, frame.dimensions());
            }
        }
    }

    /// Tear down whatever is running.
    pub async fn shutdown(&self) {
        self.stop_recording().await;
        self.remove_video().await;
    }

    // ==========================================================================
    // Frame Pump
    // ==========================================================================

    /// Drive frames from the active source through estimation and the
    /// overlay. One pump at a time; a file source running out ends the pump
    /// without tearing the session down.
    async fn spawn_pump(&self) {
        if self.pump_running.swap(true, Ordering::AcqRel) {
            return;
        }

        let capture = self.capture.clone();
        let estimator = self.estimator.clone();
        let overlay = self.overlay.clone();
        let latest_frame = self.latest_frame.clone();
        let latest_pose = self.latest_pose.clone();
        let running = self.pump_running.clone();

        let handle = tokio::spawn(async move {
            loop {
                if !running.load(Ordering::Acquire) {
                    break;
                }

                // The capture lock is held for the whole frame wait, so
                // teardown paths must stop this task (stop_pump) before
                // they lock the manager.
                let next = capture.lock().await.next_frame().await;
                match next {
                    Ok(frame) => {
                        let dims = frame.dimensions();
                        *latest_frame.write().await = Some(frame.clone());
                        if let Some(snapshot) = estimator.submit(&frame).await {
                            *latest_pose.write().await = snapshot.clone();
                            overlay.lock().await.render(&snapshot, dims);
                        }
                    }
                    Err(CaptureError::EndOfStream) | Err(CaptureError::SourceReleased) => {
                        running.store(false, Ordering::Release);
                        break;
                    }
                    Err(e) => {
                        warn!("frame capture failed: {}", e);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                }
            }
        });
        *self.pump.lock().await = Some(handle);
    }

    async fn stop_pump(&self) {
        self.pump_running.store(false, Ordering::Release);
        if let Some(handle) = self.pump.lock().await.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::capture_manager::FrameSource;
    use crate::core::overlay::Point;
    use crate::models::capture::{PixelFormat, RawFrame};
    use crate::models::feedback::ScoringResult;
    use crate::models::pose::{BodyLandmark, EngineResult, Landmark};
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    fn test_frame() -> RawFrame {
        RawFrame {
            timestamp: 0,
            width: 4,
            height: 4,
            data: vec![0; 64],
            format: PixelFormat::Rgba8,
        }
    }

    /// Camera-like source: streams forever at a small fixed rate.
    struct StreamingSource {
        releases: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl FrameSource for StreamingSource {
        async fn next_frame(&mut self) -> CaptureResult<RawFrame> {
            tokio::time::sleep(Duration::from_millis(5)).await;
            Ok(test_frame())
        }

        fn dimensions(&self) -> (u32, u32) {
            (4, 4)
        }

        async fn release(&mut self) -> CaptureResult<()> {
            self.releases.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// File-like source: a fixed number of frames, then end of stream.
    struct ClipSource {
        remaining: usize,
        releases: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl FrameSource for ClipSource {
        async fn next_frame(&mut self) -> CaptureResult<RawFrame> {
            if self.remaining == 0 {
                return Err(CaptureError::EndOfStream);
            }
            self.remaining -= 1;
            Ok(test_frame())
        }

        fn dimensions(&self) -> (u32, u32) {
            (4, 4)
        }

        async fn release(&mut self) -> CaptureResult<()> {
            self.releases.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeProvider {
        releases: Arc<AtomicUsize>,
        deny_camera: bool,
    }

    #[async_trait]
    impl SourceProvider for FakeProvider {
        async fn open_camera(&self) -> CaptureResult<Box<dyn FrameSource>> {
            if self.deny_camera {
                return Err(CaptureError::PermissionDenied("camera refused".to_string()));
            }
            Ok(Box::new(StreamingSource {
                releases: self.releases.clone(),
            }))
        }

        async fn open_file(&self, _path: &Path) -> CaptureResult<Box<dyn FrameSource>> {
            Ok(Box::new(ClipSource {
                remaining: 3,
                releases: self.releases.clone(),
            }))
        }
    }

    struct FixedEngine;

    #[async_trait]
    impl PoseEngine for FixedEngine {
        async fn estimate(&self, _frame: &RawFrame) -> EngineResult<PoseSnapshot> {
            Ok(PoseSnapshot::from_landmarks(vec![
                Landmark::new(0.5, 0.5);
                BodyLandmark::COUNT
            ]))
        }

        fn model_info(&self) -> String {
            "fixed".to_string()
        }
    }

    struct OkScoring;

    #[async_trait]
    impl PostureScoring for OkScoring {
        async fn score_frame(
            &self,
            _jpeg: Vec<u8>,
            _mode: AnalysisMode,
            _poses: Option<&PoseSnapshot>,
        ) -> ScoringResult<FeedbackResult> {
            Ok(FeedbackResult {
                status: "Good Posture".to_string(),
                details: vec![],
                score: Some(90.0),
            })
        }

        async fn analyze_video(
            &self,
            _video: &Path,
            _mode: AnalysisMode,
        ) -> ScoringResult<AnalysisSummary> {
            Err(crate::models::feedback::ScoringError::BadStatus(503))
        }
    }

    /// Scoring fake whose video analysis blocks until the test releases it.
    struct GatedScoring {
        gate: Arc<tokio::sync::Notify>,
    }

    #[async_trait]
    impl PostureScoring for GatedScoring {
        async fn score_frame(
            &self,
            _jpeg: Vec<u8>,
            _mode: AnalysisMode,
            _poses: Option<&PoseSnapshot>,
        ) -> ScoringResult<FeedbackResult> {
            Ok(FeedbackResult {
                status: "Good Posture".to_string(),
                details: vec![],
                score: Some(90.0),
            })
        }

        async fn analyze_video(
            &self,
            _video: &Path,
            _mode: AnalysisMode,
        ) -> ScoringResult<AnalysisSummary> {
            self.gate.notified().await;
            Err(crate::models::feedback::ScoringError::BadStatus(503))
        }
    }

    /// Surface that counts clears and draws.
    struct CountingSurface {
        clears: Arc<AtomicUsize>,
        draws: Arc<AtomicUsize>,
    }

    impl DrawSurface for CountingSurface {
        fn resize(&mut self, _width: u32, _height: u32) {}

        fn clear(&mut self) {
            self.clears.fetch_add(1, Ordering::SeqCst);
        }

        fn draw_segment(&mut self, _from: Point, _to: Point) {
            self.draws.fetch_add(1, Ordering::SeqCst);
        }

        fn draw_marker(&mut self, _at: Point, _label: &str) {
            self.draws.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Fixture {
        coordinator: SessionCoordinator,
        releases: Arc<AtomicUsize>,
        draws: Arc<AtomicUsize>,
    }

    fn fixture_with(deny_camera: bool, scoring: Arc<dyn PostureScoring>) -> Fixture {
        let releases = Arc::new(AtomicUsize::new(0));
        let draws = Arc::new(AtomicUsize::new(0));
        let surface = CountingSurface {
            clears: Arc::new(AtomicUsize::new(0)),
            draws: draws.clone(),
        };
        let coordinator = SessionCoordinator::new(
            &Config::default(),
            Arc::new(FakeProvider {
                releases: releases.clone(),
                deny_camera,
            }),
            Arc::new(FixedEngine),
            scoring,
            Box::new(surface),
        );
        Fixture {
            coordinator,
            releases,
            draws,
        }
    }

    fn fixture(deny_camera: bool) -> Fixture {
        fixture_with(deny_camera, Arc::new(OkScoring))
    }

    fn temp_video(name: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("{}-{}.mp4", name, Uuid::new_v4()));
        std::fs::write(&path, vec![0u8; 8]).unwrap();
        path
    }

    async fn wait_for_analysis(coordinator: &SessionCoordinator) {
        let mut waited = 0;
        while coordinator.is_upload_analyzing() && waited < 200 {
            tokio::time::sleep(Duration::from_millis(5)).await;
            waited += 1;
        }
        assert!(!coordinator.is_upload_analyzing());
    }

    #[tokio::test]
    async fn test_camera_denial_leaves_session_idle() {
        let f = fixture(true);
        let err = f.coordinator.start_recording().await.unwrap_err();
        assert!(matches!(err, CaptureError::PermissionDenied(_)));
        assert_eq!(f.coordinator.state().await, SessionState::Idle);
        assert!(f.coordinator.current_feedback().await.is_none());
    }

    #[tokio::test]
    async fn test_stop_recording_tears_everything_down() {
        let f = fixture(false);
        f.coordinator.start_recording().await.unwrap();
        assert_eq!(f.coordinator.state().await, SessionState::WebcamArmed);

        f.coordinator.set_live_analysis(true).await;
        assert_eq!(f.coordinator.state().await, SessionState::WebcamAnalyzing);

        // Let the pump process a few frames.
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(f.draws.load(Ordering::SeqCst) > 0);

        f.coordinator.stop_recording().await;
        assert_eq!(f.coordinator.state().await, SessionState::Idle);
        assert_eq!(f.releases.load(Ordering::SeqCst), 1);
        assert!(f.coordinator.current_feedback().await.is_none());
        assert!(f.coordinator.latest_frame.read().await.is_none());
        assert!(f.coordinator.latest_pose.read().await.is_empty());

        // Second stop is a no-op.
        f.coordinator.stop_recording().await;
        assert_eq!(f.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_live_toggle_round_trip() {
        let f = fixture(false);
        f.coordinator.start_recording().await.unwrap();

        // Toggling live analysis while idle on webcam is a no-op when off.
        f.coordinator.set_live_analysis(false).await;
        assert_eq!(f.coordinator.state().await, SessionState::WebcamArmed);

        f.coordinator.set_live_analysis(true).await;
        f.coordinator.set_live_analysis(false).await;
        assert_eq!(f.coordinator.state().await, SessionState::WebcamArmed);

        f.coordinator.stop_recording().await;
    }

    #[tokio::test]
    async fn test_tab_switch_stops_webcam_session() {
        let f = fixture(false);
        f.coordinator.start_recording().await.unwrap();
        f.coordinator.switch_tab(Tab::Upload).await;

        assert_eq!(f.coordinator.tab().await, Tab::Upload);
        assert_eq!(f.coordinator.state().await, SessionState::Idle);
        assert_eq!(f.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remove_video_resets_upload_flow() {
        let f = fixture(false);
        f.coordinator.switch_tab(Tab::Upload).await;

        let video = temp_video("clip");
        f.coordinator.upload_video(&video).await.unwrap();
        assert!(f.coordinator.is_upload_analyzing());

        // The scoring fake fails the analysis; the board shows the error.
        wait_for_analysis(&f.coordinator).await;
        let displayed = f.coordinator.current_feedback().await.unwrap();
        assert!(displayed.is_error());
        assert_eq!(displayed.score, Some(0.0));
        assert_eq!(f.coordinator.state().await, SessionState::UploadAnalyzed);

        f.coordinator.remove_video().await;
        std::fs::remove_file(&video).ok();
        assert_eq!(f.coordinator.state().await, SessionState::Idle);
        assert!(f.coordinator.current_feedback().await.is_none());
        assert!(f.coordinator.upload_summary().await.is_none());
    }

    #[tokio::test]
    async fn test_upload_is_marked_analyzing_on_return() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let f = fixture_with(false, Arc::new(GatedScoring { gate: gate.clone() }));
        f.coordinator.switch_tab(Tab::Upload).await;

        let video = temp_video("clip");
        f.coordinator.upload_video(&video).await.unwrap();

        // Pending and analyzing agree before the analysis task ever runs.
        assert!(f.coordinator.is_upload_analyzing());
        assert_eq!(f.coordinator.state().await, SessionState::UploadPending);

        gate.notify_one();
        wait_for_analysis(&f.coordinator).await;
        assert_eq!(f.coordinator.state().await, SessionState::UploadAnalyzed);

        f.coordinator.remove_video().await;
        std::fs::remove_file(&video).ok();
    }

    #[tokio::test]
    async fn test_second_upload_supersedes_first_analysis() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let f = fixture_with(false, Arc::new(GatedScoring { gate: gate.clone() }));
        f.coordinator.switch_tab(Tab::Upload).await;

        let first = temp_video("first");
        let second = temp_video("second");
        f.coordinator.upload_video(&first).await.unwrap();
        tokio::task::yield_now().await;
        f.coordinator.upload_video(&second).await.unwrap();

        // Whatever remains of the first analysis, only the second one may
        // complete the pending state.
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(f.coordinator.state().await, SessionState::UploadPending);
        assert!(f.coordinator.is_upload_analyzing());

        gate.notify_one();
        wait_for_analysis(&f.coordinator).await;
        assert_eq!(f.coordinator.state().await, SessionState::UploadAnalyzed);

        f.coordinator.remove_video().await;
        std::fs::remove_file(&first).ok();
        std::fs::remove_file(&second).ok();
    }

    #[tokio::test]
    async fn test_mode_change_clears_stale_feedback_while_sampling() {
        let f = fixture(false);
        f.coordinator.start_recording().await.unwrap();
        f.coordinator.set_live_analysis(true).await;

        f.coordinator.set_mode(AnalysisMode::Sitting).await;
        assert_eq!(f.coordinator.mode().await, AnalysisMode::Sitting);
        assert!(f.coordinator.current_feedback().await.is_none());
        assert_eq!(f.coordinator.state().await, SessionState::WebcamAnalyzing);

        f.coordinator.stop_recording().await;
    }
}
