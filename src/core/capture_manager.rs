// Capture source abstraction layer - unified interface for camera and file sources

use crate::models::capture::{CaptureError, CaptureResult, RawFrame, SourceKind};
use async_trait::async_trait;
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Source-agnostic frame supplier. Camera sources stream until released;
/// file sources report `CaptureError::EndOfStream` when the clip runs out.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Wait for and return the next frame.
    async fn next_frame(&mut self) -> CaptureResult<RawFrame>;

    /// Native dimensions of the video.
    fn dimensions(&self) -> (u32, u32);

    /// Release the underlying hardware or file handle.
    async fn release(&mut self) -> CaptureResult<()>;
}

/// Factory for opening video sources. Camera acquisition performs the
/// permission request; a refusal surfaces as `CaptureError::PermissionDenied`
/// and a missing device as `CaptureError::DeviceUnavailable`.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    async fn open_camera(&self) -> CaptureResult<Box<dyn FrameSource>>;
    async fn open_file(&self, path: &Path) -> CaptureResult<Box<dyn FrameSource>>;
}

/// The active video source. Owns the underlying handle for its lifetime.
pub struct CaptureSource {
    kind: SourceKind,
    locator: Option<PathBuf>,
    inner: Box<dyn FrameSource>,
    released: bool,
}

impl CaptureSource {
    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn locator(&self) -> Option<&Path> {
        self.locator.as_deref()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.inner.dimensions()
    }

    pub async fn next_frame(&mut self) -> CaptureResult<RawFrame> {
        if self.released {
            return Err(CaptureError::SourceReleased);
        }
        self.inner.next_frame().await
    }

    /// Release the handle. Safe to call on an already-released source.
    pub async fn release(&mut self) -> CaptureResult<()> {
        if self.released {
            return Ok(());
        }
        self.inner.release().await?;
        self.released = true;
        Ok(())
    }
}

/// Owns at most one live `CaptureSource` and its start/stop transitions.
pub struct CaptureManager {
    provider: Arc<dyn SourceProvider>,
    active: Option<CaptureSource>,
}

impl CaptureManager {
    pub fn new(provider: Arc<dyn SourceProvider>) -> Self {
        Self {
            provider,
            active: None,
        }
    }

    /// Acquire a new source, stopping any active one first so no two
    /// sources ever overlap.
    pub async fn start(&mut self, kind: SourceKind, locator: Option<&Path>) -> CaptureResult<()> {
        self.stop().await;

        let inner = match kind {
            SourceKind::Camera => self.provider.open_camera().await?,
            SourceKind::File => {
                let path = locator.ok_or_else(|| {
                    CaptureError::FileNotFound("no video file selected".to_string())
                })?;
                self.provider.open_file(path).await?
            }
        };

        let (width, height) = inner.dimensions();
        info!("capture source started: {:?} ({}x{})", kind, width, height);

        self.active = Some(CaptureSource {
            kind,
            locator: locator.map(Path::to_path_buf),
            inner,
            released: false,
        });
        Ok(())
    }

    /// Release the active source, if any. Idempotent.
    pub async fn stop(&mut self) {
        if let Some(mut source) = self.active.take() {
            if let Err(e) = source.release().await {
                log::warn!("capture source release failed: {}", e);
            }
            info!("capture source stopped: {:?}", source.kind());
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active(&self) -> Option<&CaptureSource> {
        self.active.as_ref()
    }

    /// Next frame from the active source.
    pub async fn next_frame(&mut self) -> CaptureResult<RawFrame> {
        match self.active.as_mut() {
            Some(source) => source.next_frame().await,
            None => Err(CaptureError::SourceReleased),
        }
    }
}
