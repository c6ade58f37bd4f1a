//! GStreamer encoder backend.
//!
//! Builds one pipeline per clip:
//!
//! ```text
//! appsrc (RGBA)  ! videoconvert ! <video encoder> ! queue ─┐
//!                                                          ├─ <muxer> ! appsink
//! appsrc (F32LE) ! audioconvert ! audioresample ! <audio encoder> ! queue ─┘
//! ```
//!
//! Both appsrcs run live with `do-timestamp`, so buffers are stamped on
//! arrival and no PTS bookkeeping is needed for a live capture. Caps are set
//! lazily from the first packet of each kind, because frame geometry and
//! sample rate are only known once capture is running. The appsink collects
//! muxed chunks into a shared vector that the session drains on every push.

use std::sync::{Arc, Mutex, OnceLock};

use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;

use crate::media::{AudioChunk, MediaPacket, RgbaFrame};

use super::encoding::{Encoding, EncoderBackend, EncoderOptions, EncoderSession};
use super::recorder::RecorderError;

/// How long `finish` waits for the muxer to finalize after end-of-stream.
const EOS_TIMEOUT_SECS: u64 = 10;

static GST_INIT: OnceLock<Result<(), String>> = OnceLock::new();

fn ensure_gst() -> Result<(), RecorderError> {
    GST_INIT
        .get_or_init(|| gst::init().map_err(|e| e.to_string()))
        .clone()
        .map_err(RecorderError::Gst)
}

// ---------------------------------------------------------------------------
// Element selection
// ---------------------------------------------------------------------------

fn video_encoder_element(encoding: Encoding) -> &'static str {
    match encoding {
        Encoding::Vp9Webm => "vp9enc",
        Encoding::Vp8Webm => "vp8enc",
        Encoding::H264Mp4 => "x264enc",
    }
}

fn audio_encoder_element(encoding: Encoding) -> &'static str {
    match encoding {
        Encoding::Vp9Webm | Encoding::Vp8Webm => "opusenc",
        Encoding::H264Mp4 => "avenc_aac",
    }
}

fn muxer_element(encoding: Encoding) -> &'static str {
    match encoding {
        Encoding::Vp9Webm | Encoding::Vp8Webm => "webmmux",
        Encoding::H264Mp4 => "mp4mux",
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Encoder backend built on the system GStreamer installation.
pub struct GstEncoderBackend;

impl GstEncoderBackend {
    /// Initializes GStreamer. Fails when the runtime libraries are missing,
    /// in which case the caller falls back to [`super::NullEncoderBackend`].
    pub fn new() -> Result<Self, RecorderError> {
        ensure_gst()?;
        Ok(Self)
    }
}

impl EncoderBackend for GstEncoderBackend {
    fn supports(&self, encoding: Encoding) -> bool {
        if ensure_gst().is_err() {
            return false;
        }
        gst::ElementFactory::find(video_encoder_element(encoding)).is_some()
            && gst::ElementFactory::find(audio_encoder_element(encoding)).is_some()
            && gst::ElementFactory::find(muxer_element(encoding)).is_some()
    }

    fn open(
        &self,
        encoding: Encoding,
        options: Option<&EncoderOptions>,
        with_audio: bool,
    ) -> Result<Box<dyn EncoderSession>, RecorderError> {
        ensure_gst()?;
        let session = GstEncoderSession::build(encoding, options, with_audio)?;
        log::info!(
            "Encoder pipeline open: {encoding}{}",
            if with_audio { "" } else { " (video only)" }
        );
        Ok(Box::new(session))
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

struct GstEncoderSession {
    pipeline: gst::Pipeline,
    video_src: gst_app::AppSrc,
    audio_src: Option<gst_app::AppSrc>,
    chunks: Arc<Mutex<Vec<Vec<u8>>>>,
    video_caps_set: bool,
    audio_caps_set: bool,
}

impl GstEncoderSession {
    fn build(
        encoding: Encoding,
        options: Option<&EncoderOptions>,
        with_audio: bool,
    ) -> Result<Self, RecorderError> {
        let pipeline = gst::Pipeline::new();
        let chunks: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));

        let muxer = make_muxer(encoding)?;
        let appsink = make_appsink(Arc::clone(&chunks));

        // Video branch.
        let video_src = gst_app::AppSrc::builder()
            .name("videosrc")
            .format(gst::Format::Time)
            .is_live(true)
            .do_timestamp(true)
            .build();
        let videoconvert = make_element("videoconvert")?;
        let video_enc = make_video_encoder(encoding, options)?;
        let video_queue = make_element("queue")?;

        pipeline
            .add_many([
                video_src.upcast_ref(),
                &videoconvert,
                &video_enc,
                &video_queue,
                &muxer,
                appsink.upcast_ref(),
            ])
            .map_err(|e| RecorderError::Gst(e.to_string()))?;
        gst::Element::link_many([
            video_src.upcast_ref(),
            &videoconvert,
            &video_enc,
            &video_queue,
            &muxer,
        ])
        .map_err(|e| RecorderError::Gst(e.to_string()))?;
        muxer
            .link(appsink.upcast_ref::<gst::Element>())
            .map_err(|e| RecorderError::Gst(e.to_string()))?;

        // Audio branch, only when the capture session has a microphone.
        let audio_src = if with_audio {
            let audio_src = gst_app::AppSrc::builder()
                .name("audiosrc")
                .format(gst::Format::Time)
                .is_live(true)
                .do_timestamp(true)
                .build();
            let audioconvert = make_element("audioconvert")?;
            let audioresample = make_element("audioresample")?;
            let audio_enc = make_element(audio_encoder_element(encoding))?;
            let audio_queue = make_element("queue")?;

            pipeline
                .add_many([
                    audio_src.upcast_ref(),
                    &audioconvert,
                    &audioresample,
                    &audio_enc,
                    &audio_queue,
                ])
                .map_err(|e| RecorderError::Gst(e.to_string()))?;
            gst::Element::link_many([
                audio_src.upcast_ref(),
                &audioconvert,
                &audioresample,
                &audio_enc,
                &audio_queue,
            ])
            .map_err(|e| RecorderError::Gst(e.to_string()))?;
            audio_queue
                .link(&muxer)
                .map_err(|e| RecorderError::Gst(e.to_string()))?;

            Some(audio_src)
        } else {
            None
        };

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| RecorderError::EncoderInit(format!("pipeline start: {e:?}")))?;

        Ok(Self {
            pipeline,
            video_src,
            audio_src,
            chunks,
            video_caps_set: false,
            audio_caps_set: false,
        })
    }

    fn push_video(&mut self, frame: &RgbaFrame) -> Result<(), RecorderError> {
        if !self.video_caps_set {
            let caps = gst::Caps::builder("video/x-raw")
                .field("format", "RGBA")
                .field("width", frame.width as i32)
                .field("height", frame.height as i32)
                .field("framerate", gst::Fraction::new(0, 1))
                .build();
            self.video_src.set_caps(Some(&caps));
            self.video_caps_set = true;
        }
        let buffer = gst::Buffer::from_slice(frame.data.clone());
        self.video_src
            .push_buffer(buffer)
            .map(|_| ())
            .map_err(|e| RecorderError::Encode(format!("video push: {e:?}")))
    }

    fn push_audio(&mut self, chunk: &AudioChunk) -> Result<(), RecorderError> {
        let Some(audio_src) = &self.audio_src else {
            // Session was opened video-only; drop stray audio.
            return Ok(());
        };
        if !self.audio_caps_set {
            let caps = gst::Caps::builder("audio/x-raw")
                .field("format", "F32LE")
                .field("layout", "interleaved")
                .field("rate", chunk.sample_rate as i32)
                .field("channels", chunk.channels as i32)
                .build();
            audio_src.set_caps(Some(&caps));
            self.audio_caps_set = true;
        }
        let mut bytes = Vec::with_capacity(chunk.samples.len() * 4);
        for sample in &chunk.samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        let buffer = gst::Buffer::from_slice(bytes);
        audio_src
            .push_buffer(buffer)
            .map(|_| ())
            .map_err(|e| RecorderError::Encode(format!("audio push: {e:?}")))
    }

    fn drain(&self) -> Vec<Vec<u8>> {
        self.chunks
            .lock()
            .map(|mut chunks| std::mem::take(&mut *chunks))
            .unwrap_or_default()
    }
}

impl EncoderSession for GstEncoderSession {
    fn push(&mut self, packet: &MediaPacket) -> Result<Vec<Vec<u8>>, RecorderError> {
        match packet {
            MediaPacket::Video(frame) => self.push_video(frame)?,
            MediaPacket::Audio(chunk) => self.push_audio(chunk)?,
        }
        Ok(self.drain())
    }

    fn finish(self: Box<Self>) -> Result<Vec<Vec<u8>>, RecorderError> {
        if self.video_src.end_of_stream().is_err() {
            log::warn!("Video EOS send failed");
        }
        if let Some(audio_src) = &self.audio_src {
            if audio_src.end_of_stream().is_err() {
                log::warn!("Audio EOS send failed");
            }
        }

        // Wait for the muxer to flush its trailer before draining the tail.
        if let Some(bus) = self.pipeline.bus() {
            for msg in bus.iter_timed(gst::ClockTime::from_seconds(EOS_TIMEOUT_SECS)) {
                match msg.view() {
                    gst::MessageView::Eos(..) => break,
                    gst::MessageView::Error(err) => {
                        let _ = self.pipeline.set_state(gst::State::Null);
                        return Err(RecorderError::Encode(format!(
                            "pipeline error during finalize: {}",
                            err.error()
                        )));
                    }
                    _ => {}
                }
            }
        }

        let _ = self.pipeline.set_state(gst::State::Null);
        Ok(self.drain())
    }

    fn abort(self: Box<Self>) {
        let _ = self.pipeline.set_state(gst::State::Null);
        log::debug!("Encoder pipeline aborted");
    }
}

impl Drop for GstEncoderSession {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}

// ---------------------------------------------------------------------------
// Element construction
// ---------------------------------------------------------------------------

fn make_element(name: &'static str) -> Result<gst::Element, RecorderError> {
    gst::ElementFactory::make(name)
        .build()
        .map_err(|e| RecorderError::EncoderInit(format!("{name}: {e}")))
}

fn make_muxer(encoding: Encoding) -> Result<gst::Element, RecorderError> {
    let name = muxer_element(encoding);
    let builder = gst::ElementFactory::make(name);
    let builder = match encoding {
        // Streamable output, since the sink is a byte collector and cannot
        // seek back to rewrite headers.
        Encoding::Vp9Webm | Encoding::Vp8Webm => builder.property("streamable", true),
        Encoding::H264Mp4 => builder.property("fragment-duration", 1_000u32),
    };
    builder
        .build()
        .map_err(|e| RecorderError::EncoderInit(format!("{name}: {e}")))
}

fn make_video_encoder(
    encoding: Encoding,
    options: Option<&EncoderOptions>,
) -> Result<gst::Element, RecorderError> {
    let encoder = make_element(video_encoder_element(encoding))?;

    match encoding {
        Encoding::Vp9Webm | Encoding::Vp8Webm => {
            // Realtime deadline, or a live encode falls behind immediately.
            encoder.set_property("deadline", 1i64);
            if let Some(opts) = options {
                if opts.bitrate_kbps > 0 {
                    encoder.set_property("target-bitrate", (opts.bitrate_kbps * 1_000) as i32);
                }
                if opts.keyframe_interval > 0 {
                    encoder.set_property("keyframe-max-dist", opts.keyframe_interval as i32);
                }
            }
        }
        Encoding::H264Mp4 => {
            encoder.set_property_from_str("tune", "zerolatency");
            encoder.set_property_from_str("speed-preset", "ultrafast");
            if let Some(opts) = options {
                if opts.bitrate_kbps > 0 {
                    encoder.set_property("bitrate", opts.bitrate_kbps);
                }
                if opts.keyframe_interval > 0 {
                    encoder.set_property("key-int-max", opts.keyframe_interval);
                }
            }
        }
    }

    Ok(encoder)
}

fn make_appsink(chunks: Arc<Mutex<Vec<Vec<u8>>>>) -> gst_app::AppSink {
    let appsink = gst_app::AppSink::builder().name("sink").sync(false).build();
    appsink.set_callbacks(
        gst_app::AppSinkCallbacks::builder()
            .new_sample(move |sink| {
                let sample = sink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                if let Some(buffer) = sample.buffer() {
                    if let Ok(map) = buffer.map_readable() {
                        if let Ok(mut chunks) = chunks.lock() {
                            chunks.push(map.as_slice().to_vec());
                        }
                    }
                }
                Ok(gst::FlowSuccess::Ok)
            })
            .build(),
    );
    appsink
}
