//! Encodings, encoder options and the backend traits.

use crate::media::MediaPacket;

use super::recorder::RecorderError;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// A container + codec combination the recorder can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Vp9Webm,
    Vp8Webm,
    H264Mp4,
}

/// Negotiation order: best quality-per-bit first, broadest compatibility
/// last.
pub const ENCODING_PREFERENCE: [Encoding; 3] =
    [Encoding::Vp9Webm, Encoding::Vp8Webm, Encoding::H264Mp4];

impl Encoding {
    /// MIME type stored alongside the clip bytes.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Encoding::Vp9Webm => "video/webm;codecs=vp9,opus",
            Encoding::Vp8Webm => "video/webm;codecs=vp8,opus",
            Encoding::H264Mp4 => "video/mp4",
        }
    }

    /// File extension used when persisting clips to disk.
    pub fn file_extension(&self) -> &'static str {
        match self {
            Encoding::Vp9Webm | Encoding::Vp8Webm => "webm",
            Encoding::H264Mp4 => "mp4",
        }
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Encoding::Vp9Webm => write!(f, "VP9/WebM"),
            Encoding::Vp8Webm => write!(f, "VP8/WebM"),
            Encoding::H264Mp4 => write!(f, "H.264/MP4"),
        }
    }
}

/// Tuning knobs passed to the encoder. All fields treat `0` as "encoder
/// default".
#[derive(Debug, Clone, Copy)]
pub struct EncoderOptions {
    /// Target video bitrate in kbit/s.
    pub bitrate_kbps: u32,
    /// Keyframe interval in frames.
    pub keyframe_interval: u32,
}

// ---------------------------------------------------------------------------
// Backend traits
// ---------------------------------------------------------------------------

/// A running encode for one clip.
///
/// `push` accepts captured packets and returns whatever encoded chunks became
/// available; `finish` drains the tail (for containers that finalize on
/// end-of-stream). Chunk boundaries are an implementation detail — callers
/// concatenate them in order.
pub trait EncoderSession: Send {
    fn push(&mut self, packet: &MediaPacket) -> Result<Vec<Vec<u8>>, RecorderError>;

    fn finish(self: Box<Self>) -> Result<Vec<Vec<u8>>, RecorderError>;

    /// Tears the encode down without finalizing. Output so far is discarded.
    fn abort(self: Box<Self>);
}

/// Factory for encoder sessions.
pub trait EncoderBackend: Send + Sync {
    /// Whether this backend can produce the given encoding right now.
    fn supports(&self, encoding: Encoding) -> bool;

    /// Opens a session. `with_audio` declares whether audio packets will be
    /// pushed, so the backend can omit the audio track entirely for
    /// microphone-less captures.
    fn open(
        &self,
        encoding: Encoding,
        options: Option<&EncoderOptions>,
        with_audio: bool,
    ) -> Result<Box<dyn EncoderSession>, RecorderError>;
}

/// Picks the first encoding in preference order the backend supports.
pub fn negotiate(backend: &dyn EncoderBackend) -> Result<Encoding, RecorderError> {
    ENCODING_PREFERENCE
        .iter()
        .copied()
        .find(|&encoding| backend.supports(encoding))
        .ok_or(RecorderError::NoSupportedEncoding)
}

/// Backend that supports nothing. Used when GStreamer failed to initialize so
/// the wizard can still run its non-recording steps and report a clear error
/// in the capture ones.
pub struct NullEncoderBackend;

impl EncoderBackend for NullEncoderBackend {
    fn supports(&self, _encoding: Encoding) -> bool {
        false
    }

    fn open(
        &self,
        encoding: Encoding,
        _options: Option<&EncoderOptions>,
        _with_audio: bool,
    ) -> Result<Box<dyn EncoderSession>, RecorderError> {
        Err(RecorderError::EncoderInit(format!(
            "no encoder available for {encoding}"
        )))
    }
}
