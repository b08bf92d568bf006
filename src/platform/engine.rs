// Pose engine backends

use crate::core::pose_estimator::PoseEngine;
use crate::models::capture::RawFrame;
use crate::models::pose::{EngineConfig, EngineResult, PoseSnapshot};
use async_trait::async_trait;

/// Engine for hosts without a native estimation model: reports "no body
/// detected" for every frame. The rest of the pipeline behaves exactly as
/// with a real engine, minus landmarks.
pub struct NullPoseEngine {
    config: EngineConfig,
}

impl NullPoseEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl PoseEngine for NullPoseEngine {
    async fn estimate(&self, _frame: &RawFrame) -> EngineResult<PoseSnapshot> {
        Ok(PoseSnapshot::empty())
    }

    fn model_info(&self) -> String {
        format!(
            "null engine (complexity {:?}, detection >= {})",
            self.config.model_complexity, self.config.min_detection_confidence
        )
    }
}
