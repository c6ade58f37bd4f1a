//! Clip recording: encoding negotiation, encoder backends and the recorder
//! controller.
//!
//! The [`RecorderController`] owns one recording at a time. It negotiates an
//! [`Encoding`] against the [`EncoderBackend`] in fixed preference order
//! (VP9/WebM, then VP8/WebM, then H.264/MP4), accumulates encoded chunks
//! while the recording runs, and assembles them into a [`Clip`] on stop.
//!
//! Encoding itself sits behind [`EncoderBackend`] / [`EncoderSession`]: the
//! real implementation is the GStreamer pipeline in [`gst`], tests use
//! scripted fakes, and [`NullEncoderBackend`] stands in when GStreamer is not
//! available at startup.

pub mod encoding;
pub mod gst;
pub mod recorder;

pub use encoding::{
    negotiate, Encoding, EncoderBackend, EncoderOptions, EncoderSession, NullEncoderBackend,
    ENCODING_PREFERENCE,
};
pub use gst::GstEncoderBackend;
pub use recorder::{Clip, RecorderController, RecorderError, RecordingBuffer};
