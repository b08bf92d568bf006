// Posture scoring service client
// Two endpoints: per-frame live scoring and one-shot full-video analysis

use crate::models::feedback::{
    AnalysisMode, AnalysisSummary, FeedbackResult, ScoringError, ScoringResult,
};
use crate::models::pose::PoseSnapshot;
use async_trait::async_trait;
use log::debug;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;

/// Status shown while the service has not classified the frame yet.
const PENDING_STATUS: &str = "Analyzing...";

/// Remote posture scoring service.
#[async_trait]
pub trait PostureScoring: Send + Sync {
    /// Score a single encoded frame, optionally with the landmarks the
    /// estimation engine saw in it.
    async fn score_frame(
        &self,
        jpeg: Vec<u8>,
        mode: AnalysisMode,
        poses: Option<&PoseSnapshot>,
    ) -> ScoringResult<FeedbackResult>;

    /// Analyze a complete video file and return the end-of-video summary.
    async fn analyze_video(&self, video: &Path, mode: AnalysisMode)
        -> ScoringResult<AnalysisSummary>;
}

// ==============================================================================
// Wire Shapes
// ==============================================================================

/// Response body of POST /api/video/frame. The service answers with either
/// `feedback` or `details` depending on the outcome.
#[derive(Debug, Deserialize)]
struct FrameWire {
    status: Option<String>,
    feedback: Option<Vec<String>>,
    details: Option<Vec<String>>,
    score: Option<f64>,
}

fn feedback_from_wire(wire: FrameWire) -> FeedbackResult {
    FeedbackResult {
        status: wire.status.unwrap_or_else(|| PENDING_STATUS.to_string()),
        details: wire.feedback.or(wire.details).unwrap_or_default(),
        score: wire.score,
    }
}

fn video_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        _ => "video/mp4",
    }
}

// ==============================================================================
// HTTP Client
// ==============================================================================

pub struct HttpScoringClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpScoringClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl PostureScoring for HttpScoringClient {
    async fn score_frame(
        &self,
        jpeg: Vec<u8>,
        mode: AnalysisMode,
        poses: Option<&PoseSnapshot>,
    ) -> ScoringResult<FeedbackResult> {
        let frame = Part::bytes(jpeg)
            .file_name("frame.jpg")
            .mime_str("image/jpeg")?;
        let mut form = Form::new().part("frame", frame).text("mode", mode.as_str());
        if let Some(poses) = poses {
            let serialized =
                serde_json::to_string(poses).map_err(|e| ScoringError::Decode(e.to_string()))?;
            form = form.text("poses", serialized);
        }

        let response = self
            .client
            .post(self.endpoint("/api/video/frame"))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ScoringError::BadStatus(response.status().as_u16()));
        }

        let wire: FrameWire = response.json().await.map_err(|e| {
            if e.is_decode() {
                ScoringError::Decode(e.to_string())
            } else {
                ScoringError::Network(e)
            }
        })?;
        Ok(feedback_from_wire(wire))
    }

    async fn analyze_video(
        &self,
        video: &Path,
        mode: AnalysisMode,
    ) -> ScoringResult<AnalysisSummary> {
        let bytes = tokio::fs::read(video).await?;
        debug!("uploading {} bytes for analysis", bytes.len());

        let file_name = video
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.mp4")
            .to_string();
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(video_mime(video))?;
        let form = Form::new().part("video", part).text("mode", mode.as_str());

        let response = self
            .client
            .post(self.endpoint("/api/video/analyze"))
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ScoringError::BadStatus(response.status().as_u16()));
        }

        response.json::<AnalysisSummary>().await.map_err(|e| {
            if e.is_decode() {
                ScoringError::Decode(e.to_string())
            } else {
                ScoringError::Network(e)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_prefers_feedback_over_details() {
        let wire: FrameWire = serde_json::from_str(
            r#"{"status": "Needs Improvement", "feedback": ["Back too bent: 140°"], "details": ["ignored"], "score": 55}"#,
        )
        .unwrap();
        let result = feedback_from_wire(wire);
        assert_eq!(result.status, "Needs Improvement");
        assert_eq!(result.details, vec!["Back too bent: 140°"]);
        assert_eq!(result.score, Some(55.0));
    }

    #[test]
    fn test_wire_defaults() {
        let wire: FrameWire = serde_json::from_str(r#"{}"#).unwrap();
        let result = feedback_from_wire(wire);
        assert_eq!(result.status, PENDING_STATUS);
        assert!(result.details.is_empty());
        assert_eq!(result.score, None);
    }

    #[test]
    fn test_video_mime_by_extension() {
        assert_eq!(video_mime(Path::new("a.webm")), "video/webm");
        assert_eq!(video_mime(Path::new("a.MOV")), "video/quicktime");
        assert_eq!(video_mime(Path::new("a.mp4")), "video/mp4");
        assert_eq!(video_mime(Path::new("a")), "video/mp4");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = HttpScoringClient::new("http://localhost:5001/");
        assert_eq!(
            client.endpoint("/api/video/frame"),
            "http://localhost:5001/api/video/frame"
        );
    }
}
