//! Frame sources: decoded uploads and a polled "camera".

use std::path::PathBuf;
use std::time::SystemTime;

use anyhow::{Context, Result};
use assetlens_core::{Frame, FrameOrigin, LensError};
use async_trait::async_trait;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::mime_detect::{detect_mime_type, is_image};

/// Decode uploaded image bytes (any format `image` understands) into an upload frame.
pub fn decode_upload(bytes: &[u8]) -> Result<Frame, LensError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| LensError::InvalidFrame(format!("cannot decode image: {e}")))?;
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Frame::new(width, height, rgba.into_raw(), FrameOrigin::Upload)
}

/// Something that can be polled for the current camera frame.
#[async_trait]
pub trait FrameSource: Send {
    /// `Ok(None)` means nothing new to show this tick.
    async fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// Treats the newest image file in a directory as the live camera view.
///
/// Like a camera, it shows the current view on every tick, even when the
/// file has not changed; repeated views are left to the pipeline's dedupe.
/// Useful with tools that dump webcam snapshots to disk.
pub struct DirectorySource {
    dir: PathBuf,
    current: Option<((PathBuf, SystemTime), Frame)>,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), current: None }
    }

    async fn newest_image(&self) -> Result<Option<(PathBuf, SystemTime)>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("Failed to read frame directory: {}", self.dir.display()))?;
        let mut newest: Option<(PathBuf, SystemTime)> = None;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !is_image(detect_mime_type(&path)) {
                continue;
            }
            let modified = entry.metadata().await?.modified()?;
            if newest.as_ref().is_none_or(|(_, t)| modified > *t) {
                newest = Some((path, modified));
            }
        }
        Ok(newest)
    }
}

#[async_trait]
impl FrameSource for DirectorySource {
    async fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(newest) = self.newest_image().await? else {
            return Ok(None);
        };
        if let Some((seen, frame)) = &self.current {
            if *seen == newest {
                return Ok(Some(frame.clone()));
            }
        }
        let bytes = tokio::fs::read(&newest.0)
            .await
            .with_context(|| format!("Failed to read frame: {}", newest.0.display()))?;
        let mut frame = decode_upload(&bytes)?;
        // Directory frames stand in for a live camera.
        frame.origin = FrameOrigin::Camera;
        debug!(path = %newest.0.display(), "Captured frame from directory");
        self.current = Some((newest, frame.clone()));
        Ok(Some(frame))
    }
}

/// Poll `source` every `interval` and hand each frame to `on_frame` until cancelled.
pub async fn capture_loop<S, F>(
    source: &mut S,
    interval: Duration,
    cancel: CancellationToken,
    mut on_frame: F,
) where
    S: FrameSource + ?Sized,
    F: FnMut(Frame) + Send,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(interval_ms = interval.as_millis() as u64, "Capture loop started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match source.next_frame().await {
                    Ok(Some(frame)) => on_frame(frame),
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "Frame capture failed"),
                }
            }
            _ = cancel.cancelled() => {
                info!("Capture loop shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::Cursor;

    struct ScriptedSource {
        frames: VecDeque<Option<Frame>>,
    }

    #[async_trait]
    impl FrameSource for ScriptedSource {
        async fn next_frame(&mut self) -> Result<Option<Frame>> {
            Ok(self.frames.pop_front().flatten())
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn decodes_png_upload() {
        let frame = decode_upload(&png_bytes(3, 2)).unwrap();
        assert_eq!((frame.width(), frame.height()), (3, 2));
        assert_eq!(frame.origin, FrameOrigin::Upload);
    }

    #[test]
    fn rejects_garbage_upload() {
        assert!(matches!(decode_upload(b"not an image"), Err(LensError::InvalidFrame(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn capture_loop_forwards_frames_until_cancelled() {
        let frame = Frame::new(1, 1, vec![0, 0, 0, 255], FrameOrigin::Camera).unwrap();
        let mut source = ScriptedSource {
            frames: VecDeque::from(vec![Some(frame.clone()), None, Some(frame)]),
        };
        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            stopper.cancel();
        });

        let mut seen = 0;
        capture_loop(&mut source, Duration::from_millis(100), cancel, |_| seen += 1).await;
        assert_eq!(seen, 2);
    }

    #[tokio::test]
    async fn directory_source_keeps_showing_current_view() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("snap.png"), png_bytes(2, 2)).await.unwrap();
        tokio::fs::write(dir.path().join("notes.txt"), b"ignored").await.unwrap();

        let mut source = DirectorySource::new(dir.path());
        let first = source.next_frame().await.unwrap().expect("frame");
        assert_eq!(first.origin, FrameOrigin::Camera);
        let again = source.next_frame().await.unwrap().expect("same view on the next tick");
        assert_eq!(again.rgba(), first.rgba());
    }

    #[tokio::test]
    async fn empty_directory_has_no_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = DirectorySource::new(dir.path());
        assert!(source.next_frame().await.unwrap().is_none());
    }
}
