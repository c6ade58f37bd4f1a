//! The recorder controller: one recording at a time, chunks in, clip out.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::encoding::{negotiate, Encoding, EncoderBackend, EncoderOptions, EncoderSession};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error)]
pub enum RecorderError {
    #[error("no supported encoding available")]
    NoSupportedEncoding,

    #[error("encoder initialization failed: {0}")]
    EncoderInit(String),

    #[error("encoding failed: {0}")]
    Encode(String),

    #[error("a recording is already in progress")]
    AlreadyRecording,

    #[error("gstreamer error: {0}")]
    Gst(String),
}

// ---------------------------------------------------------------------------
// Clip
// ---------------------------------------------------------------------------

/// A finished recording.
///
/// The encoded bytes sit behind an `Arc`, so cloning a clip (to preview it,
/// hand it to the wizard, persist it) never copies the data.
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub data: Arc<[u8]>,
    pub mime_type: String,
    pub recorded_at: DateTime<Utc>,
}

impl Clip {
    pub fn new(data: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            mime_type: mime_type.into(),
            recorded_at: Utc::now(),
        }
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }
}

// ---------------------------------------------------------------------------
// RecordingBuffer
// ---------------------------------------------------------------------------

/// Ordered accumulator for encoded chunks.
#[derive(Debug, Default)]
pub struct RecordingBuffer {
    chunks: Vec<Vec<u8>>,
    total_len: usize,
}

impl RecordingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk. Empty chunks are discarded.
    pub fn push(&mut self, chunk: Vec<u8>) {
        if chunk.is_empty() {
            return;
        }
        self.total_len += chunk.len();
        self.chunks.push(chunk);
    }

    pub fn byte_len(&self) -> usize {
        self.total_len
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Concatenates all chunks in arrival order, leaving the buffer empty.
    pub fn take_bytes(&mut self) -> Vec<u8> {
        let mut data = Vec::with_capacity(self.total_len);
        for chunk in self.chunks.drain(..) {
            data.extend_from_slice(&chunk);
        }
        self.total_len = 0;
        data
    }
}

// ---------------------------------------------------------------------------
// RecorderController
// ---------------------------------------------------------------------------

struct ActiveRecording {
    encoding: Encoding,
    buffer: RecordingBuffer,
}

/// Owns encoding negotiation and chunk accumulation for the current
/// recording.
///
/// The encoder session itself is handed to the caller on `start` — it runs on
/// the capture pump thread, which feeds the chunks it produces back through
/// [`RecorderController::on_data`]. `stop` assembles the accumulated chunks
/// into a [`Clip`].
pub struct RecorderController {
    backend: Arc<dyn EncoderBackend>,
    options: EncoderOptions,
    active: Option<ActiveRecording>,
}

impl RecorderController {
    pub fn new(backend: Arc<dyn EncoderBackend>, options: EncoderOptions) -> Self {
        Self {
            backend,
            options,
            active: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.active.is_some()
    }

    /// Negotiates an encoding and opens an encoder session.
    ///
    /// If the backend rejects the tuning options it is asked once more with
    /// defaults, so over-specific settings degrade instead of failing the
    /// recording.
    pub fn start(
        &mut self,
        with_audio: bool,
    ) -> Result<(Encoding, Box<dyn EncoderSession>), RecorderError> {
        if self.active.is_some() {
            return Err(RecorderError::AlreadyRecording);
        }

        let encoding = negotiate(self.backend.as_ref())?;
        let session = match self.backend.open(encoding, Some(&self.options), with_audio) {
            Ok(session) => session,
            Err(e) => {
                log::warn!("Encoder rejected options ({e}), retrying with defaults");
                self.backend.open(encoding, None, with_audio)?
            }
        };

        log::info!("Recording started ({encoding})");
        self.active = Some(ActiveRecording {
            encoding,
            buffer: RecordingBuffer::new(),
        });
        Ok((encoding, session))
    }

    /// Accepts an encoded chunk from the pump. Chunks arriving while no
    /// recording is active (a stale pump draining after an abort) are
    /// dropped.
    pub fn on_data(&mut self, chunk: Vec<u8>) {
        if let Some(active) = &mut self.active {
            active.buffer.push(chunk);
        }
    }

    /// Finalizes the recording into a clip.
    ///
    /// Returns `Ok(None)` when no recording is active, so a second stop (the
    /// governor firing in the same tick as a manual stop) is a no-op rather
    /// than an error.
    pub fn stop(&mut self) -> Result<Option<Clip>, RecorderError> {
        let Some(mut active) = self.active.take() else {
            return Ok(None);
        };
        if active.buffer.is_empty() {
            return Err(RecorderError::Encode(
                "recording produced no data".into(),
            ));
        }
        let clip = Clip::new(active.buffer.take_bytes(), active.encoding.mime_type());
        log::info!(
            "Recording stopped ({}, {} bytes)",
            clip.mime_type,
            clip.byte_len()
        );
        Ok(Some(clip))
    }

    /// Drops the active recording without producing a clip.
    pub fn abort(&mut self) {
        if self.active.take().is_some() {
            log::info!("Recording aborted");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaPacket;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct ScriptedSession;

    impl EncoderSession for ScriptedSession {
        fn push(&mut self, _packet: &MediaPacket) -> Result<Vec<Vec<u8>>, RecorderError> {
            Ok(vec![])
        }

        fn finish(self: Box<Self>) -> Result<Vec<Vec<u8>>, RecorderError> {
            Ok(vec![])
        }

        fn abort(self: Box<Self>) {}
    }

    /// Supports one encoding; optionally rejects the first open that carries
    /// options, to exercise the retry path.
    struct ScriptedBackend {
        encoding: Encoding,
        reject_options: bool,
        opens: AtomicUsize,
        last_open_had_options: AtomicBool,
    }

    impl ScriptedBackend {
        fn new(encoding: Encoding) -> Self {
            Self {
                encoding,
                reject_options: false,
                opens: AtomicUsize::new(0),
                last_open_had_options: AtomicBool::new(false),
            }
        }

        fn rejecting_options(encoding: Encoding) -> Self {
            Self {
                reject_options: true,
                ..Self::new(encoding)
            }
        }
    }

    impl EncoderBackend for ScriptedBackend {
        fn supports(&self, encoding: Encoding) -> bool {
            encoding == self.encoding
        }

        fn open(
            &self,
            _encoding: Encoding,
            options: Option<&EncoderOptions>,
            _with_audio: bool,
        ) -> Result<Box<dyn EncoderSession>, RecorderError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            self.last_open_had_options
                .store(options.is_some(), Ordering::SeqCst);
            if self.reject_options && options.is_some() {
                return Err(RecorderError::EncoderInit("options rejected".into()));
            }
            Ok(Box::new(ScriptedSession))
        }
    }

    fn options() -> EncoderOptions {
        EncoderOptions {
            bitrate_kbps: 1_000,
            keyframe_interval: 60,
        }
    }

    #[test]
    fn start_uses_negotiated_encoding_for_mime() {
        let backend = Arc::new(ScriptedBackend::new(Encoding::Vp8Webm));
        let mut recorder = RecorderController::new(backend, options());

        let (encoding, _session) = recorder.start(true).expect("start");
        assert_eq!(encoding, Encoding::Vp8Webm);

        recorder.on_data(vec![1, 2, 3]);
        let clip = recorder.stop().expect("stop").expect("clip");
        assert_eq!(clip.mime_type, "video/webm;codecs=vp8,opus");
        assert_eq!(clip.byte_len(), 3);
    }

    #[test]
    fn start_retries_without_options_once() {
        let backend = Arc::new(ScriptedBackend::rejecting_options(Encoding::Vp9Webm));
        let mut recorder = RecorderController::new(Arc::clone(&backend) as _, options());

        let (_, _session) = recorder.start(true).expect("start should retry");
        assert_eq!(backend.opens.load(Ordering::SeqCst), 2);
        assert!(!backend.last_open_had_options.load(Ordering::SeqCst));
    }

    #[test]
    fn start_while_recording_is_rejected() {
        let backend = Arc::new(ScriptedBackend::new(Encoding::Vp9Webm));
        let mut recorder = RecorderController::new(backend, options());

        let _first = recorder.start(true).expect("start");
        assert!(matches!(
            recorder.start(true),
            Err(RecorderError::AlreadyRecording)
        ));
    }

    #[test]
    fn chunks_accumulate_in_order() {
        let backend = Arc::new(ScriptedBackend::new(Encoding::Vp9Webm));
        let mut recorder = RecorderController::new(backend, options());

        let _session = recorder.start(true).expect("start");
        recorder.on_data(vec![1, 2]);
        recorder.on_data(vec![]); // discarded
        recorder.on_data(vec![3]);

        let clip = recorder.stop().expect("stop").expect("clip");
        assert_eq!(&clip.data[..], &[1, 2, 3]);
    }

    #[test]
    fn data_while_inactive_is_dropped() {
        let backend = Arc::new(ScriptedBackend::new(Encoding::Vp9Webm));
        let mut recorder = RecorderController::new(backend, options());

        recorder.on_data(vec![9, 9, 9]);
        assert!(recorder.stop().expect("stop").is_none());
    }

    #[test]
    fn stop_is_idempotent() {
        let backend = Arc::new(ScriptedBackend::new(Encoding::Vp9Webm));
        let mut recorder = RecorderController::new(backend, options());

        let _session = recorder.start(true).expect("start");
        recorder.on_data(vec![1]);
        assert!(recorder.stop().expect("first stop").is_some());
        assert!(recorder.stop().expect("second stop").is_none());
    }

    #[test]
    fn stop_with_no_data_is_an_error() {
        let backend = Arc::new(ScriptedBackend::new(Encoding::Vp9Webm));
        let mut recorder = RecorderController::new(backend, options());

        let _session = recorder.start(true).expect("start");
        assert!(recorder.stop().is_err());
    }

    #[test]
    fn abort_discards_buffered_data() {
        let backend = Arc::new(ScriptedBackend::new(Encoding::Vp9Webm));
        let mut recorder = RecorderController::new(backend, options());

        let _session = recorder.start(true).expect("start");
        recorder.on_data(vec![1, 2, 3]);
        recorder.abort();

        assert!(!recorder.is_recording());
        assert!(recorder.stop().expect("stop").is_none());
    }

    #[test]
    fn buffer_tracks_total_length() {
        let mut buffer = RecordingBuffer::new();
        buffer.push(vec![1, 2, 3]);
        buffer.push(vec![4]);
        assert_eq!(buffer.byte_len(), 4);

        let bytes = buffer.take_bytes();
        assert_eq!(bytes, vec![1, 2, 3, 4]);
        assert!(buffer.is_empty());
        assert_eq!(buffer.byte_len(), 0);
    }
}
