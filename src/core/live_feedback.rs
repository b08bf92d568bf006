// Live feedback loop
// Fixed-cadence frame sampling with sequence-numbered response reconciliation

use crate::core::scoring::PostureScoring;
use crate::models::capture::RawFrame;
use crate::models::feedback::{AnalysisMode, FeedbackResult};
use crate::models::pose::PoseSnapshot;
use image::codecs::jpeg::JpegEncoder;
use image::error::{ImageError, ParameterError, ParameterErrorKind};
use log::{debug, warn};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

/// Latest frame delivered by the active capture source.
pub type SharedFrame = Arc<RwLock<Option<RawFrame>>>;
/// Latest pose snapshot produced by the estimation adapter.
pub type SharedPose = Arc<RwLock<PoseSnapshot>>;

// ==============================================================================
// Feedback Board
// ==============================================================================

/// Holds the displayed FeedbackResult and reconciles scoring responses
/// against request issue order.
///
/// Responses can arrive out of order under variable network latency; a
/// response is applied only if its sequence number is greater than the last
/// applied one, so a stale result can never overwrite a fresher one. A
/// retired board discards everything, which is how in-flight requests are
/// neutralized after teardown.
#[derive(Clone, Default)]
pub struct FeedbackBoard {
    inner: Arc<RwLock<BoardState>>,
}

#[derive(Default)]
struct BoardState {
    retired: bool,
    applied_seq: u64,
    current: Option<FeedbackResult>,
}

impl FeedbackBoard {
    /// Apply a successful result. Returns false if it was stale or the
    /// board is retired.
    pub async fn apply(&self, seq: u64, result: FeedbackResult) -> bool {
        let mut state = self.inner.write().await;
        if state.retired || seq <= state.applied_seq {
            return false;
        }
        state.applied_seq = seq;
        state.current = Some(result);
        true
    }

    /// Apply a failed request as an "Analysis Error" result, retaining the
    /// previously displayed score. Same sequencing rule as `apply`.
    pub async fn apply_failure(&self, seq: u64, detail: String) -> bool {
        let mut state = self.inner.write().await;
        if state.retired || seq <= state.applied_seq {
            return false;
        }
        let last_score = state.current.as_ref().and_then(|c| c.score);
        state.applied_seq = seq;
        state.current = Some(FeedbackResult::failure(detail, last_score));
        true
    }

    /// Bind a result outside the live sequencing (upload summaries).
    pub async fn replace(&self, result: FeedbackResult) {
        self.inner.write().await.current = Some(result);
    }

    pub async fn clear(&self) {
        self.inner.write().await.current = None;
    }

    /// Discard all responses from now on.
    pub async fn retire(&self) {
        self.inner.write().await.retired = true;
    }

    /// Accept responses again after a retire.
    pub async fn activate(&self) {
        self.inner.write().await.retired = false;
    }

    pub async fn current(&self) -> Option<FeedbackResult> {
        self.inner.read().await.current.clone()
    }
}

// ==============================================================================
// Frame Encoding
// ==============================================================================

/// Encode a raw frame as JPEG for the per-frame scoring request.
pub fn encode_frame_jpeg(frame: &RawFrame, quality: u8) -> Result<Vec<u8>, ImageError> {
    let rgba = image::RgbaImage::from_raw(frame.width, frame.height, frame.to_rgba())
        .ok_or_else(|| {
            ImageError::Parameter(ParameterError::from_kind(
                ParameterErrorKind::DimensionMismatch,
            ))
        })?;

    // JPEG carries no alpha channel.
    let rgb = image::DynamicImage::ImageRgba8(rgba).to_rgb8();
    let mut out = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))?;
    Ok(out)
}

// ==============================================================================
// Live Feedback Loop
// ==============================================================================

/// While sampling, once per period: grab the latest frame, encode it, attach
/// the latest snapshot and the analysis mode, and issue one scoring request
/// tagged with a fresh sequence number. Requests may overlap; the board
/// sorts out their responses.
pub struct LiveFeedbackLoop {
    scoring: Arc<dyn PostureScoring>,
    board: FeedbackBoard,
    latest_frame: SharedFrame,
    latest_pose: SharedPose,
    period: Duration,
    jpeg_quality: u8,
    sampling: Arc<AtomicBool>,
    next_seq: Arc<AtomicU64>,
    sampler: Mutex<Option<JoinHandle<()>>>,
}

impl LiveFeedbackLoop {
    pub fn new(
        scoring: Arc<dyn PostureScoring>,
        board: FeedbackBoard,
        latest_frame: SharedFrame,
        latest_pose: SharedPose,
        period: Duration,
        jpeg_quality: u8,
    ) -> Self {
        Self {
            scoring,
            board,
            latest_frame,
            latest_pose,
            period,
            jpeg_quality,
            sampling: Arc::new(AtomicBool::new(false)),
            next_seq: Arc::new(AtomicU64::new(0)),
            sampler: Mutex::new(None),
        }
    }

    pub fn is_sampling(&self) -> bool {
        self.sampling.load(Ordering::Acquire)
    }

    /// Enter the sampling state. No-op if already sampling.
    pub async fn start(&self, mode: AnalysisMode) {
        if self.sampling.swap(true, Ordering::AcqRel) {
            return;
        }
        self.board.activate().await;

        let scoring = self.scoring.clone();
        let board = self.board.clone();
        let latest_frame = self.latest_frame.clone();
        let latest_pose = self.latest_pose.clone();
        let sampling = self.sampling.clone();
        let next_seq = self.next_seq.clone();
        let period = self.period;
        let quality = self.jpeg_quality;

        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(period).await;
                if !sampling.load(Ordering::Acquire) {
                    break;
                }

                // No frame yet (source still warming up or already gone):
                // skip this tick rather than block on one.
                let frame = match latest_frame.read().await.clone() {
                    Some(frame) => frame,
                    None => continue,
                };

                let jpeg = match encode_frame_jpeg(&frame, quality) {
                    Ok(jpeg) => jpeg,
                    Err(e) => {
                        warn!("frame encoding failed, skipping tick: {}", e);
                        continue;
                    }
                };

                let pose = {
                    let snapshot = latest_pose.read().await;
                    if snapshot.is_empty() {
                        None
                    } else {
                        Some(snapshot.clone())
                    }
                };

                // Sequence numbers are assigned at issue time, not completion.
                let seq = next_seq.fetch_add(1, Ordering::SeqCst) + 1;
                let scoring = scoring.clone();
                let board = board.clone();
                tokio::spawn(async move {
                    match scoring.score_frame(jpeg, mode, pose.as_ref()).await {
                        Ok(result) => {
                            if !board.apply(seq, result).await {
                                debug!("discarded stale scoring response #{}", seq);
                            }
                        }
                        Err(e) => {
                            // One failed tick never halts sampling.
                            board.apply_failure(seq, e.to_string()).await;
                        }
                    }
                });
            }
        });

        *self.sampler.lock().await = Some(handle);
    }

    /// Leave the sampling state: no further requests are issued and
    /// responses still in flight are discarded. Idempotent.
    pub async fn stop(&self) {
        if !self.sampling.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(handle) = self.sampler.lock().await.take() {
            handle.abort();
        }
        self.board.retire().await;
    }
}
