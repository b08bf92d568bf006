// Data models for pose estimation

use serde::{Deserialize, Serialize};

// ==============================================================================
// Landmark
// ==============================================================================

/// A single detected body point in normalized image coordinates.
///
/// `x` and `y` are relative to the frame ([0, 1]); `z` is depth relative to
/// the hip midpoint when the engine provides it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<f32>,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            z: None,
            visibility: None,
        }
    }

    pub fn is_visible(&self, threshold: f32) -> bool {
        self.visibility.map_or(true, |v| v >= threshold)
    }
}

// ==============================================================================
// Pose Snapshot (33 landmarks)
// ==============================================================================

/// The full set of landmarks detected in one frame, in the engine's native
/// 33-point order, or empty when no body was detected.
///
/// A snapshot is immutable once produced; each new frame supersedes it
/// wholesale. Landmarks are never merged or patched in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoseSnapshot {
    landmarks: Vec<Landmark>,
}

impl PoseSnapshot {
    /// No body detected in the frame.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_landmarks(landmarks: Vec<Landmark>) -> Self {
        Self { landmarks }
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    /// Look up a landmark by its canonical index.
    pub fn landmark(&self, index: BodyLandmark) -> Option<&Landmark> {
        self.landmarks.get(index as usize)
    }

    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }
}

/// Pose landmark indices in the estimation engine's native order (33 total).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BodyLandmark {
    Nose = 0,
    LeftEyeInner = 1,
    LeftEye = 2,
    LeftEyeOuter = 3,
    RightEyeInner = 4,
    RightEye = 5,
    RightEyeOuter = 6,
    LeftEar = 7,
    RightEar = 8,
    MouthLeft = 9,
    MouthRight = 10,
    LeftShoulder = 11,
    RightShoulder = 12,
    LeftElbow = 13,
    RightElbow = 14,
    LeftWrist = 15,
    RightWrist = 16,
    LeftPinky = 17,
    RightPinky = 18,
    LeftIndex = 19,
    RightIndex = 20,
    LeftThumb = 21,
    RightThumb = 22,
    LeftHip = 23,
    RightHip = 24,
    LeftKnee = 25,
    RightKnee = 26,
    LeftAnkle = 27,
    RightAnkle = 28,
    LeftHeel = 29,
    RightHeel = 30,
    LeftFootIndex = 31,
    RightFootIndex = 32,
}

impl BodyLandmark {
    pub const COUNT: usize = 33;
}

// ==============================================================================
// Engine Configuration
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    /// Minimum confidence for a fresh detection (default: 0.5)
    pub min_detection_confidence: f32,
    /// Minimum confidence to keep tracking between frames (default: 0.5)
    pub min_tracking_confidence: f32,
    /// Let the engine smooth landmarks across frames (default: true)
    pub smooth_landmarks: bool,
    /// Model complexity (0=lite, 1=full, 2=heavy)
    pub model_complexity: ModelComplexity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelComplexity {
    Lite = 0,
    Full = 1,
    Heavy = 2,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
            smooth_landmarks: true,
            model_complexity: ModelComplexity::Full,
        }
    }
}

// ==============================================================================
// Error Types
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Engine not initialized")]
    NotInitialized,

    #[error("Model loading failed: {0}")]
    ModelLoadFailed(String),

    #[error("Inference failed: {0}")]
    InferenceFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_landmark_visibility() {
        let mut landmark = Landmark::new(0.5, 0.5);
        assert!(landmark.is_visible(0.9));

        landmark.visibility = Some(0.8);
        assert!(landmark.is_visible(0.5));
        assert!(!landmark.is_visible(0.9));
    }

    #[test]
    fn test_snapshot_lookup() {
        let mut landmarks = vec![Landmark::new(0.0, 0.0); BodyLandmark::COUNT];
        landmarks[BodyLandmark::LeftShoulder as usize] = Landmark::new(0.4, 0.3);

        let snapshot = PoseSnapshot::from_landmarks(landmarks);
        assert!(!snapshot.is_empty());
        assert_eq!(snapshot.len(), 33);
        assert_eq!(
            snapshot.landmark(BodyLandmark::LeftShoulder),
            Some(&Landmark::new(0.4, 0.3))
        );

        let empty = PoseSnapshot::empty();
        assert!(empty.is_empty());
        assert!(empty.landmark(BodyLandmark::Nose).is_none());
    }

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.min_detection_confidence, 0.5);
        assert_eq!(config.min_tracking_confidence, 0.5);
        assert!(config.smooth_landmarks);
        assert_eq!(config.model_complexity, ModelComplexity::Full);
    }

    #[test]
    fn test_snapshot_serializes_as_landmark_array() {
        let snapshot = PoseSnapshot::from_landmarks(vec![Landmark::new(0.25, 0.75)]);
        let json = serde_json::to_string(&snapshot).unwrap();
        assert_eq!(json, r#"[{"x":0.25,"y":0.75}]"#);
    }
}
