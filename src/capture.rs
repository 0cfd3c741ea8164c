//! Capture sources for detection sessions.
//!
//! A capture source hands the session controller one finite video chunk per
//! request: a live camera yields fixed-duration segments, an uploaded file
//! yields itself exactly once. The controller owns the source exclusively
//! while a session is active and releases it on mode change or teardown.

use log::debug;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

/// One finite unit of video media, submitted to the prediction service
/// exactly once.
#[derive(Debug, Clone)]
pub struct MediaChunk {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub file_name: String,
}

impl MediaChunk {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>, file_name: impl Into<String>) -> Self {
        Self {
            data,
            mime_type: mime_type.into(),
            file_name: file_name.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("no capture source is ready")]
    Unavailable,
    #[error("failed to read capture media: {0}")]
    Io(#[from] std::io::Error),
}

/// Supplier of media chunks for a detection session.
///
/// Implementations wrap whatever actually produces video (a camera pipeline,
/// a selected file, canned clips in tests) so the session controller never
/// touches hardware directly.
#[async_trait]
pub trait CaptureSource: Send + Sync {
    /// Whether a chunk can currently be recorded.
    fn is_ready(&self) -> bool;

    /// Produce the next chunk. For live sources this records for `duration`;
    /// file-backed sources return their media immediately.
    async fn record(&self, duration: Duration) -> Result<MediaChunk, CaptureError>;

    /// Give up any held handles. Called on mode change and teardown.
    fn release(&self);
}

fn mime_for_path(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("avi") => "video/x-msvideo",
        _ => "video/webm",
    }
}

const VIDEO_EXTENSIONS: &[&str] = &["webm", "mp4", "mov", "avi"];

/// A user-selected video file, consumed whole by upload-mode sessions.
///
/// Not ready until a file has been selected. The selection survives
/// `release()`, matching how an upload form keeps its chosen file when a
/// session stops.
#[derive(Debug, Default)]
pub struct VideoFileSource {
    path: Mutex<Option<PathBuf>>,
}

impl VideoFileSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(path: impl Into<PathBuf>) -> Self {
        let source = Self::new();
        source.select(path);
        source
    }

    pub fn select(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        debug!("Selected upload file: {}", path.display());
        *self.path.lock().unwrap() = Some(path);
    }

    pub fn selected(&self) -> Option<PathBuf> {
        self.path.lock().unwrap().clone()
    }
}

#[async_trait]
impl CaptureSource for VideoFileSource {
    fn is_ready(&self) -> bool {
        self.path
            .lock()
            .unwrap()
            .as_ref()
            .map(|p| p.is_file())
            .unwrap_or(false)
    }

    async fn record(&self, _duration: Duration) -> Result<MediaChunk, CaptureError> {
        let path = self
            .path
            .lock()
            .unwrap()
            .clone()
            .ok_or(CaptureError::Unavailable)?;
        let data = tokio::fs::read(&path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("video.webm")
            .to_string();
        Ok(MediaChunk::new(data, mime_for_path(&path), file_name))
    }

    fn release(&self) {
        // Nothing held open between records; the selection stays.
    }
}

/// Plays a directory of pre-recorded clips as if they were live camera
/// segments: each `record` call sleeps for the requested duration, then
/// yields the next clip in name order, wrapping around at the end.
#[derive(Debug)]
pub struct ClipSequenceSource {
    clips: Vec<PathBuf>,
    cursor: AtomicUsize,
}

impl ClipSequenceSource {
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let dir = dir.as_ref();
        let mut clips: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| VIDEO_EXTENSIONS.contains(&e))
                    .unwrap_or(false)
            })
            .collect();
        clips.sort();
        debug!("Loaded {} clips from {}", clips.len(), dir.display());
        Ok(Self {
            clips,
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn clip_count(&self) -> usize {
        self.clips.len()
    }
}

#[async_trait]
impl CaptureSource for ClipSequenceSource {
    fn is_ready(&self) -> bool {
        !self.clips.is_empty()
    }

    async fn record(&self, duration: Duration) -> Result<MediaChunk, CaptureError> {
        if self.clips.is_empty() {
            return Err(CaptureError::Unavailable);
        }
        tokio::time::sleep(duration).await;
        let index = self.cursor.fetch_add(1, Ordering::SeqCst) % self.clips.len();
        let path = &self.clips[index];
        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("video.webm")
            .to_string();
        Ok(MediaChunk::new(data, mime_for_path(path), file_name))
    }

    fn release(&self) {
        debug!("Released clip sequence source");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_file_source_not_ready_without_selection() {
        let source = VideoFileSource::new();
        assert!(!source.is_ready());
        assert!(source.selected().is_none());
    }

    #[tokio::test]
    async fn test_file_source_reads_selected_file() {
        let mut file = tempfile::NamedTempFile::with_suffix(".mp4").unwrap();
        file.write_all(b"fake video bytes").unwrap();

        let source = VideoFileSource::with_file(file.path());
        assert!(source.is_ready());

        let chunk = source.record(Duration::from_millis(1)).await.unwrap();
        assert_eq!(chunk.data, b"fake video bytes");
        assert_eq!(chunk.mime_type, "video/mp4");
        assert!(!chunk.is_empty());
    }

    #[tokio::test]
    async fn test_record_without_selection_is_unavailable() {
        let source = VideoFileSource::new();
        let result = source.record(Duration::from_millis(1)).await;
        assert!(matches!(result, Err(CaptureError::Unavailable)));
    }

    #[tokio::test]
    async fn test_clip_sequence_cycles_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.webm"), b"second").unwrap();
        std::fs::write(dir.path().join("a.webm"), b"first").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let source = ClipSequenceSource::from_dir(dir.path()).unwrap();
        assert_eq!(source.clip_count(), 2);
        assert!(source.is_ready());

        let first = source.record(Duration::from_millis(1)).await.unwrap();
        let second = source.record(Duration::from_millis(1)).await.unwrap();
        let third = source.record(Duration::from_millis(1)).await.unwrap();
        assert_eq!(first.data, b"first");
        assert_eq!(second.data, b"second");
        assert_eq!(third.data, b"first");
    }

    #[test]
    fn test_empty_clip_dir_is_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let source = ClipSequenceSource::from_dir(dir.path()).unwrap();
        assert!(!source.is_ready());
    }
}
