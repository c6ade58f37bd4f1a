//! Media session types and the single-session manager.
//!
//! A [`MediaSession`] represents one open camera (and optionally microphone)
//! handle. Sessions are exclusively owned: the [`SessionManager`] guarantees
//! that at most one session is open at a time by releasing the previous
//! session *before* a new one is acquired, so re-entrant flows never hold two
//! camera handles.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures while opening or running capture devices.
#[derive(Debug, Clone, Error)]
pub enum DeviceError {
    #[error("camera unavailable: {0}")]
    CameraUnavailable(String),

    #[error("microphone unavailable: {0}")]
    MicrophoneUnavailable(String),

    #[error("device access denied: {0}")]
    AccessDenied(String),

    #[error("device disconnected: {0}")]
    Disconnected(String),
}

// ---------------------------------------------------------------------------
// Frames and packets
// ---------------------------------------------------------------------------

/// One decoded camera frame, RGBA8, tightly packed.
#[derive(Debug, Clone)]
pub struct RgbaFrame {
    pub width: u32,
    pub height: u32,
    /// `width * height * 4` bytes, row-major.
    pub data: Vec<u8>,
}

/// A run of interleaved microphone samples.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// One unit of captured media, as produced by a [`MediaSource`].
#[derive(Debug, Clone)]
pub enum MediaPacket {
    Video(RgbaFrame),
    Audio(AudioChunk),
}

/// Shared slot holding the most recent camera frame for the live preview.
///
/// The capture thread overwrites it on every frame; the UI thread takes a
/// clone when it repaints. Stale frames are simply replaced, never queued.
pub type PreviewHandle = Arc<Mutex<Option<RgbaFrame>>>;

/// What the opened session actually delivers.
///
/// `has_audio` is `false` when no microphone was found and the configuration
/// allows recording without one.
#[derive(Debug, Clone, Copy)]
pub struct SessionCapabilities {
    pub has_video: bool,
    pub has_audio: bool,
}

// ---------------------------------------------------------------------------
// Backend traits
// ---------------------------------------------------------------------------

/// Pull interface over the capture packet stream.
///
/// `next` blocks up to `timeout` and returns `None` when no packet arrived in
/// time (the caller decides whether to keep polling or shut down).
pub trait MediaSource: Send + Sync {
    fn next(&mut self, timeout: Duration) -> Option<MediaPacket>;
}

/// Handle to the running capture tracks of a session.
///
/// `stop` must be idempotent and must block until every capture thread has
/// shut down and the devices are closed.
pub trait MediaTracks: Send + Sync {
    fn stop(&mut self);
}

/// Platform capture surface: opens camera + microphone and hands back a
/// running [`MediaSession`].
///
/// Opening is blocking (device negotiation can take hundreds of
/// milliseconds); async callers wrap it in `spawn_blocking`.
pub trait MediaBackend: Send + Sync {
    fn open(&self) -> Result<MediaSession, DeviceError>;
}

// ---------------------------------------------------------------------------
// MediaSession
// ---------------------------------------------------------------------------

/// One open camera+microphone handle.
///
/// Dropping a session releases it, but callers on the happy path release
/// explicitly so device teardown happens at a known point.
pub struct MediaSession {
    tracks: Box<dyn MediaTracks>,
    source: Option<Box<dyn MediaSource>>,
    capabilities: SessionCapabilities,
    preview: PreviewHandle,
    released: bool,
}

impl MediaSession {
    pub fn new(
        tracks: Box<dyn MediaTracks>,
        source: Box<dyn MediaSource>,
        capabilities: SessionCapabilities,
        preview: PreviewHandle,
    ) -> Self {
        Self {
            tracks,
            source: Some(source),
            capabilities,
            preview,
            released: false,
        }
    }

    pub fn capabilities(&self) -> SessionCapabilities {
        self.capabilities
    }

    /// Shared preview slot, cloned for the UI.
    pub fn preview(&self) -> PreviewHandle {
        Arc::clone(&self.preview)
    }

    /// Takes the packet source out of the session.
    ///
    /// Returns `None` after the first call — exactly one consumer (the
    /// recording pump) may own the stream.
    pub fn take_source(&mut self) -> Option<Box<dyn MediaSource>> {
        self.source.take()
    }

    /// Stops all capture tracks and closes the devices. Idempotent.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.source = None;
        self.tracks.stop();
        if let Ok(mut slot) = self.preview.lock() {
            *slot = None;
        }
        log::info!("Media session released");
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for MediaSession {
    fn drop(&mut self) {
        self.release();
    }
}

// ---------------------------------------------------------------------------
// SessionManager
// ---------------------------------------------------------------------------

/// Owns the at-most-one-session invariant.
///
/// `acquire` always releases the currently open session before asking the
/// backend for a new one, so a re-entered capture step cannot end up holding
/// two camera handles.
pub struct SessionManager {
    backend: Arc<dyn MediaBackend>,
    current: Option<MediaSession>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn MediaBackend>) -> Self {
        Self {
            backend,
            current: None,
        }
    }

    /// Backend handle for opening a session off-thread; pair with
    /// [`SessionManager::install`].
    pub fn backend(&self) -> Arc<dyn MediaBackend> {
        Arc::clone(&self.backend)
    }

    /// Releases the current session, then opens a new one.
    pub fn acquire(&mut self) -> Result<(), DeviceError> {
        self.release();
        let session = self.backend.open()?;
        self.current = Some(session);
        Ok(())
    }

    /// Installs a session opened out-of-band (e.g. on a blocking task),
    /// releasing any session that slipped in since.
    pub fn install(&mut self, session: MediaSession) {
        self.release();
        self.current = Some(session);
    }

    /// Releases the current session, if any. Idempotent.
    pub fn release(&mut self) {
        if let Some(mut session) = self.current.take() {
            session.release();
        }
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&MediaSession> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut MediaSession> {
        self.current.as_mut()
    }
}

// ---------------------------------------------------------------------------
// Test fakes (shared with the capture driver tests)
// ---------------------------------------------------------------------------

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records the order of `open` / `stop` calls so tests can assert the
    /// release-before-acquire invariant.
    #[derive(Default)]
    pub struct CallLog {
        events: Mutex<Vec<String>>,
    }

    impl CallLog {
        pub fn push(&self, event: impl Into<String>) {
            if let Ok(mut events) = self.events.lock() {
                events.push(event.into());
            }
        }

        pub fn events(&self) -> Vec<String> {
            self.events.lock().map(|e| e.clone()).unwrap_or_default()
        }
    }

    pub struct FakeTracks {
        log: Arc<CallLog>,
        id: usize,
    }

    impl MediaTracks for FakeTracks {
        fn stop(&mut self) {
            self.log.push(format!("stop {}", self.id));
        }
    }

    /// Yields a fixed queue of packets, then `None` forever.
    pub struct FakeSource {
        packets: VecDeque<MediaPacket>,
    }

    impl FakeSource {
        pub fn new(packets: Vec<MediaPacket>) -> Self {
            Self {
                packets: packets.into(),
            }
        }
    }

    impl MediaSource for FakeSource {
        fn next(&mut self, _timeout: Duration) -> Option<MediaPacket> {
            self.packets.pop_front()
        }
    }

    pub struct FakeBackend {
        pub log: Arc<CallLog>,
        next_id: AtomicUsize,
        fail: bool,
        packets: Mutex<Vec<MediaPacket>>,
    }

    impl FakeBackend {
        pub fn new() -> Self {
            Self {
                log: Arc::new(CallLog::default()),
                next_id: AtomicUsize::new(1),
                fail: false,
                packets: Mutex::new(Vec::new()),
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new()
            }
        }

        /// Packets every subsequently opened session will yield.
        pub fn with_packets(packets: Vec<MediaPacket>) -> Self {
            Self {
                packets: Mutex::new(packets),
                ..Self::new()
            }
        }
    }

    impl MediaBackend for FakeBackend {
        fn open(&self) -> Result<MediaSession, DeviceError> {
            if self.fail {
                return Err(DeviceError::CameraUnavailable("fake failure".into()));
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            self.log.push(format!("open {id}"));
            let packets = self
                .packets
                .lock()
                .map(|p| p.clone())
                .unwrap_or_default();
            Ok(MediaSession::new(
                Box::new(FakeTracks {
                    log: Arc::clone(&self.log),
                    id,
                }),
                Box::new(FakeSource::new(packets)),
                SessionCapabilities {
                    has_video: true,
                    has_audio: true,
                },
                Arc::new(Mutex::new(None)),
            ))
        }
    }

    /// A small synthetic video packet for pump tests.
    pub fn test_frame() -> MediaPacket {
        MediaPacket::Video(RgbaFrame {
            width: 2,
            height: 2,
            data: vec![0u8; 16],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeBackend;
    use super::*;

    #[test]
    fn release_is_idempotent() {
        let backend = Arc::new(FakeBackend::new());
        let log = Arc::clone(&backend.log);

        let mut session = backend.open().expect("open");
        session.release();
        session.release();
        drop(session);

        assert_eq!(log.events(), vec!["open 1", "stop 1"]);
    }

    #[test]
    fn drop_releases_session() {
        let backend = Arc::new(FakeBackend::new());
        let log = Arc::clone(&backend.log);

        {
            let _session = backend.open().expect("open");
        }

        assert_eq!(log.events(), vec!["open 1", "stop 1"]);
    }

    #[test]
    fn acquire_releases_previous_session_first() {
        let backend = Arc::new(FakeBackend::new());
        let log = Arc::clone(&backend.log);

        let mut manager = SessionManager::new(backend);
        manager.acquire().expect("first acquire");
        manager.acquire().expect("second acquire");

        // The first session must be fully stopped before the second opens.
        assert_eq!(log.events(), vec!["open 1", "stop 1", "open 2"]);
        assert!(manager.is_open());
    }

    #[test]
    fn install_releases_previous_session() {
        let backend = Arc::new(FakeBackend::new());
        let log = Arc::clone(&backend.log);

        let mut manager = SessionManager::new(Arc::clone(&backend) as Arc<dyn MediaBackend>);
        manager.acquire().expect("acquire");

        let out_of_band = backend.open().expect("open");
        manager.install(out_of_band);

        assert_eq!(log.events(), vec!["open 1", "open 2", "stop 1"]);
    }

    #[test]
    fn failed_acquire_leaves_manager_closed() {
        let backend = Arc::new(FakeBackend::failing());
        let mut manager = SessionManager::new(backend);

        assert!(manager.acquire().is_err());
        assert!(!manager.is_open());
    }

    #[test]
    fn manager_release_is_idempotent() {
        let backend = Arc::new(FakeBackend::new());
        let log = Arc::clone(&backend.log);

        let mut manager = SessionManager::new(backend);
        manager.acquire().expect("acquire");
        manager.release();
        manager.release();

        assert_eq!(log.events(), vec!["open 1", "stop 1"]);
    }

    #[test]
    fn source_can_only_be_taken_once() {
        let backend = Arc::new(FakeBackend::new());
        let mut session = backend.open().expect("open");

        assert!(session.take_source().is_some());
        assert!(session.take_source().is_none());
    }
}
