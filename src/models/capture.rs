// Data structures for video capture

/// The two kinds of video source a session can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Camera,
    File,
}

/// A raw frame delivered by the active video source.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub timestamp: i64,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub format: PixelFormat,
}

impl RawFrame {
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Frame bytes in RGBA order, converting from BGRA when necessary.
    pub fn to_rgba(&self) -> Vec<u8> {
        match self.format {
            PixelFormat::Rgba8 => self.data.clone(),
            PixelFormat::Bgra8 => {
                let mut rgba = self.data.clone();
                for px in rgba.chunks_exact_mut(4) {
                    px.swap(0, 2);
                }
                rgba
            }
        }
    }
}

/// Pixel format of captured frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8,
    Bgra8,
}

/// Error types for capture operations
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Video file not found: {0}")]
    FileNotFound(String),

    #[error("Source already released")]
    SourceReleased,

    #[error("End of stream")]
    EndOfStream,
}

pub type CaptureResult<T> = Result<T, CaptureError>;
