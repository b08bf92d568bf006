// Upload analysis pipeline
// Validates a selected video file and runs one-shot full-video analysis

use crate::core::live_feedback::FeedbackBoard;
use crate::core::scoring::PostureScoring;
use crate::models::feedback::{
    AnalysisMode, AnalysisSummary, FeedbackResult, ScoringError, ScoringResult,
};
use log::{info, warn};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Container formats the scoring service accepts.
const SUPPORTED_EXTENSIONS: &[&str] = &["mp4", "webm", "mov"];

/// Runs at most one full-video analysis at a time and binds its outcome to
/// the feedback board.
///
/// Each analysis begins under a fresh epoch; removing the video or beginning
/// a new analysis bumps the epoch, so a slow run that finishes after its
/// video was replaced silently drops its result instead of resurrecting
/// stale state.
#[derive(Clone)]
pub struct UploadPipeline {
    scoring: Arc<dyn PostureScoring>,
    board: FeedbackBoard,
    max_upload_bytes: u64,
    analyzing: Arc<AtomicBool>,
    epoch: Arc<AtomicU64>,
    summary: Arc<RwLock<Option<AnalysisSummary>>>,
}

impl UploadPipeline {
    pub fn new(scoring: Arc<dyn PostureScoring>, board: FeedbackBoard, max_upload_bytes: u64) -> Self {
        Self {
            scoring,
            board,
            max_upload_bytes,
            analyzing: Arc::new(AtomicBool::new(false)),
            epoch: Arc::new(AtomicU64::new(0)),
            summary: Arc::new(RwLock::new(None)),
        }
    }

    pub fn is_analyzing(&self) -> bool {
        self.analyzing.load(Ordering::Acquire)
    }

    pub async fn summary(&self) -> Option<AnalysisSummary> {
        self.summary.read().await.clone()
    }

    /// Forget the current video: any in-flight analysis becomes stale and
    /// the stored summary is dropped.
    pub async fn invalidate(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.analyzing.store(false, Ordering::Release);
        *self.summary.write().await = None;
    }

    /// Mark a new analysis as pending: bumps the epoch, which stales any
    /// run still in flight, and raises the analyzing flag before any
    /// request leaves the pipeline. Returns the epoch `run` must present.
    pub async fn begin(&self) -> u64 {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.analyzing.store(true, Ordering::Release);
        *self.summary.write().await = None;
        epoch
    }

    /// Analyze one video file end to end. On success the summary is stored
    /// and its overall result is shown on the board; on failure the board
    /// shows an error result scored 0. Returns whether the outcome was
    /// applied: a run superseded by a newer `begin` or an `invalidate`
    /// drops its result and leaves the board and flag to its successor.
    pub async fn run(&self, epoch: u64, video: &Path, mode: AnalysisMode) -> bool {
        let outcome = self.execute(video, mode).await;

        // A newer run or an invalidate superseded this one: its result no
        // longer describes the current video.
        if self.epoch.load(Ordering::SeqCst) != epoch {
            info!("dropping superseded analysis of {}", video.display());
            return false;
        }

        match outcome {
            Ok(summary) => {
                info!(
                    "video analyzed: {} frames over {:.1}s",
                    summary.video_stats.total_frames, summary.video_stats.duration
                );
                self.board.replace(summary.overall.clone()).await;
                *self.summary.write().await = Some(summary);
            }
            Err(e) => {
                warn!("video analysis failed: {}", e);
                self.board
                    .replace(FeedbackResult::failure(e.to_string(), Some(0.0)))
                    .await;
            }
        }
        self.analyzing.store(false, Ordering::Release);
        true
    }

    async fn execute(&self, video: &Path, mode: AnalysisMode) -> ScoringResult<AnalysisSummary> {
        let extension = video
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some(ext) if SUPPORTED_EXTENSIONS.contains(&ext) => {}
            other => {
                return Err(ScoringError::UnsupportedVideo(
                    other.unwrap_or("no extension").to_string(),
                ))
            }
        }

        let size = tokio::fs::metadata(video).await?.len();
        if size > self.max_upload_bytes {
            return Err(ScoringError::VideoTooLarge {
                size,
                limit: self.max_upload_bytes,
            });
        }

        self.scoring.analyze_video(video, mode).await
    }
}
