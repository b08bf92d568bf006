// Synthetic video sources
// Test-pattern camera and bounded clip playback for hosts without hardware

use crate::core::capture_manager::{FrameSource, SourceProvider};
use crate::models::capture::{CaptureError, CaptureResult, PixelFormat, RawFrame};
use async_trait::async_trait;
use chrono::Utc;
use std::path::Path;
use std::time::Duration;

fn pattern_frame(width: u32, height: u32, index: u64) -> RawFrame {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    let shift = (index % 256) as u8;
    for y in 0..height {
        for x in 0..width {
            data.push((x as u8).wrapping_add(shift));
            data.push((y as u8).wrapping_add(shift));
            data.push(shift);
            data.push(255);
        }
    }
    RawFrame {
        timestamp: Utc::now().timestamp_millis(),
        width,
        height,
        data,
        format: PixelFormat::Rgba8,
    }
}

/// Endless test-pattern source paced at a fixed frame rate.
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    frame_interval: Duration,
    produced: u64,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32, fps: u32) -> Self {
        Self {
            width,
            height,
            frame_interval: Duration::from_millis(1000 / u64::from(fps.max(1))),
            produced: 0,
        }
    }
}

#[async_trait]
impl FrameSource for SyntheticCamera {
    async fn next_frame(&mut self) -> CaptureResult<RawFrame> {
        tokio::time::sleep(self.frame_interval).await;
        let frame = pattern_frame(self.width, self.height, self.produced);
        self.produced += 1;
        Ok(frame)
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    async fn release(&mut self) -> CaptureResult<()> {
        Ok(())
    }
}

/// Bounded source that plays a fixed number of frames and then reports
/// end of stream, the way a real file decoder would.
pub struct SyntheticClip {
    width: u32,
    height: u32,
    remaining: u64,
    produced: u64,
}

impl SyntheticClip {
    pub fn new(width: u32, height: u32, frames: u64) -> Self {
        Self {
            width,
            height,
            remaining: frames,
            produced: 0,
        }
    }
}

#[async_trait]
impl FrameSource for SyntheticClip {
    async fn next_frame(&mut self) -> CaptureResult<RawFrame> {
        if self.remaining == 0 {
            return Err(CaptureError::EndOfStream);
        }
        self.remaining -= 1;
        let frame = pattern_frame(self.width, self.height, self.produced);
        self.produced += 1;
        Ok(frame)
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    async fn release(&mut self) -> CaptureResult<()> {
        Ok(())
    }
}

/// Source factory backed by the synthetic sources above.
pub struct SyntheticProvider {
    pub width: u32,
    pub height: u32,
    pub camera_fps: u32,
    pub clip_frames: u64,
}

impl Default for SyntheticProvider {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            camera_fps: 30,
            clip_frames: 90,
        }
    }
}

#[async_trait]
impl SourceProvider for SyntheticProvider {
    async fn open_camera(&self) -> CaptureResult<Box<dyn FrameSource>> {
        Ok(Box::new(SyntheticCamera::new(
            self.width,
            self.height,
            self.camera_fps,
        )))
    }

    async fn open_file(&self, path: &Path) -> CaptureResult<Box<dyn FrameSource>> {
        if !path.exists() {
            return Err(CaptureError::FileNotFound(path.display().to_string()));
        }
        Ok(Box::new(SyntheticClip::new(
            self.width,
            self.height,
            self.clip_frames,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_camera_streams_frames_of_declared_size() {
        let mut camera = SyntheticCamera::new(8, 6, 120);
        let frame = camera.next_frame().await.unwrap();
        assert_eq!(frame.dimensions(), (8, 6));
        assert_eq!(frame.data.len(), 8 * 6 * 4);

        // Frames vary over time.
        let second = camera.next_frame().await.unwrap();
        assert_ne!(frame.data, second.data);
    }

    #[tokio::test]
    async fn test_clip_ends_after_its_frames() {
        let mut clip = SyntheticClip::new(4, 4, 2);
        assert!(clip.next_frame().await.is_ok());
        assert!(clip.next_frame().await.is_ok());
        assert!(matches!(
            clip.next_frame().await,
            Err(CaptureError::EndOfStream)
        ));
    }

    #[tokio::test]
    async fn test_provider_rejects_missing_file() {
        let provider = SyntheticProvider::default();
        let result = provider.open_file(Path::new("/nonexistent/clip.mp4")).await;
        assert!(matches!(result, Err(CaptureError::FileNotFound(_))));
    }
}
