// Data models for posture feedback and analysis results

use serde::{Deserialize, Serialize};

/// Displayed status for a failed scoring request, live or upload.
pub const ANALYSIS_ERROR_STATUS: &str = "Analysis Error";

// ==============================================================================
// Analysis Mode
// ==============================================================================

/// Which posture the scoring service should evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    Squat,
    Sitting,
}

impl AnalysisMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisMode::Squat => "squat",
            AnalysisMode::Sitting => "sitting",
        }
    }
}

// ==============================================================================
// Feedback Result
// ==============================================================================

/// One completed scoring result (live tick or upload summary). Each new
/// result replaces the previous one; details are never appended to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackResult {
    pub status: String,
    pub details: Vec<String>,
    pub score: Option<f64>,
}

impl FeedbackResult {
    pub fn failure(detail: impl Into<String>, score: Option<f64>) -> Self {
        Self {
            status: ANALYSIS_ERROR_STATUS.to_string(),
            details: vec![detail.into()],
            score,
        }
    }

    pub fn is_positive(&self) -> bool {
        self.status == "Good Form" || self.status == "Good Posture"
    }

    pub fn is_error(&self) -> bool {
        self.status == ANALYSIS_ERROR_STATUS
    }
}

// ==============================================================================
// Upload Analysis Summary
// ==============================================================================

/// End-of-video summary returned by the full-video analysis endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    #[serde(rename = "overall_analysis")]
    pub overall: FeedbackResult,
    pub video_stats: VideoStats,
    #[serde(rename = "most_common_issues", default)]
    pub top_issues: Vec<IssueCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStats {
    pub duration: f64,
    pub total_frames: u64,
    pub analyzed_frames: u64,
    pub fps: f64,
    pub average_issues_per_frame: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueCount {
    pub issue: String,
    pub count: u64,
}

// ==============================================================================
// Error Types
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Service responded with status {0}")]
    BadStatus(u16),

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Unsupported video format: {0}")]
    UnsupportedVideo(String),

    #[error("Video exceeds the {limit} byte upload limit ({size} bytes)")]
    VideoTooLarge { size: u64, limit: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ScoringResult<T> = Result<T, ScoringError>;
