//! Camera and microphone acquisition.
//!
//! # Architecture
//!
//! * [`MediaBackend`] — trait over the platform capture surface. The real
//!   implementation is [`SystemBackend`] (nokhwa webcam + cpal microphone);
//!   tests use an in-tree fake.
//! * [`MediaSession`] — one open camera+microphone handle. Exclusively owned,
//!   released by stopping every underlying track; release is idempotent.
//! * [`SessionManager`] — enforces the at-most-one-open-session invariant:
//!   acquiring always releases the previous session first.
//! * [`FaceDetector`] — optional face-presence capability with an
//!   always-true default.

pub mod face;
pub mod session;
pub mod system;

pub use face::{platform_detector, AlwaysPresent, FaceDetector};
pub use session::{
    AudioChunk, DeviceError, MediaBackend, MediaPacket, MediaSession, MediaSource, MediaTracks,
    PreviewHandle, RgbaFrame, SessionCapabilities, SessionManager,
};
pub use system::SystemBackend;
