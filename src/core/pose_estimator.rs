// Pose estimation adapter
// Drives the external estimation engine one frame at a time

use crate::models::capture::RawFrame;
use crate::models::pose::{EngineResult, PoseSnapshot};
use async_trait::async_trait;
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Opaque pose estimation engine. Any engine that maps a frame to a landmark
/// list (or an empty result when no body is visible) is substitutable here.
#[async_trait]
pub trait PoseEngine: Send + Sync {
    /// Run inference on one frame. "No body detected" is an Ok empty snapshot.
    async fn estimate(&self, frame: &RawFrame) -> EngineResult<PoseSnapshot>;

    /// Human-readable description of the backing model.
    fn model_info(&self) -> String;
}

/// Feeds frames to the engine with a single-estimation-in-flight guarantee.
///
/// If the engine is still working when a new frame arrives, that frame is
/// skipped rather than queued, so camera frame-rate pressure can never build
/// an estimation backlog.
#[derive(Clone)]
pub struct PoseEstimator {
    engine: Arc<dyn PoseEngine>,
    busy: Arc<AtomicBool>,
}

impl PoseEstimator {
    pub fn new(engine: Arc<dyn PoseEngine>) -> Self {
        Self {
            engine,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Submit a frame for estimation.
    ///
    /// Returns `None` when the frame was dropped because an estimation is
    /// already in flight. Engine failures degrade to an empty snapshot
    /// instead of failing the caller.
    pub async fn submit(&self, frame: &RawFrame) -> Option<PoseSnapshot> {
        if self.busy.swap(true, Ordering::AcqRel) {
            return None;
        }

        let result = self.engine.estimate(frame).await;
        self.busy.store(false, Ordering::Release);

        Some(match result {
            Ok(snapshot) => snapshot,
            Err(e) => {
                debug!("pose estimation failed, treating as no detection: {}", e);
                PoseSnapshot::empty()
            }
        })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn model_info(&self) -> String {
        self.engine.model_info()
    }
}
