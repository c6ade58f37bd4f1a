//! Platform capture backend: nokhwa webcam + cpal microphone.
//!
//! Each device runs on its own dedicated thread:
//!
//! * the camera thread pulls frames in a loop, decodes them to RGBA, updates
//!   the shared preview slot and offers a copy to the packet channel;
//! * the microphone thread owns the cpal stream (cpal streams are not `Send`,
//!   so the stream must live and die on one thread) and forwards sample
//!   chunks from the audio callback.
//!
//! Both threads watch a shared stop flag; `SystemTracks::stop` raises it and
//! joins them, which closes the devices.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{CameraIndex, RequestedFormat, RequestedFormatType};
use nokhwa::Camera;

use crate::config::CameraConfig;

use super::session::{
    AudioChunk, DeviceError, MediaBackend, MediaPacket, MediaSession, MediaSource, MediaTracks,
    PreviewHandle, RgbaFrame, SessionCapabilities,
};

/// Packets buffered between the capture threads and the recording pump.
/// When nothing drains the channel (preview-only phases) new packets are
/// dropped, never blocked on.
const PACKET_QUEUE_LEN: usize = 64;

/// How long `open` waits for a capture thread to report readiness.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Real camera + microphone backend.
pub struct SystemBackend {
    config: CameraConfig,
}

impl SystemBackend {
    pub fn new(config: CameraConfig) -> Self {
        Self { config }
    }
}

impl MediaBackend for SystemBackend {
    fn open(&self) -> Result<MediaSession, DeviceError> {
        let stop = Arc::new(AtomicBool::new(false));
        let preview: PreviewHandle = Arc::new(Mutex::new(None));
        let (packet_tx, packet_rx) = mpsc::sync_channel::<MediaPacket>(PACKET_QUEUE_LEN);

        let mut threads = Vec::new();

        let camera_thread = spawn_camera_thread(
            self.config.device_index,
            Arc::clone(&stop),
            Arc::clone(&preview),
            packet_tx.clone(),
        )?;
        threads.push(camera_thread);

        let has_audio = match spawn_audio_thread(
            self.config.audio_device.clone(),
            Arc::clone(&stop),
            packet_tx,
        ) {
            Ok(handle) => {
                threads.push(handle);
                true
            }
            Err(e) if self.config.allow_missing_microphone => {
                log::warn!("Recording without audio: {e}");
                false
            }
            Err(e) => {
                // Roll back the camera thread before reporting failure.
                stop.store(true, Ordering::Relaxed);
                for handle in threads {
                    let _ = handle.join();
                }
                return Err(e);
            }
        };

        log::info!(
            "Media session open (video: yes, audio: {})",
            if has_audio { "yes" } else { "no" }
        );

        Ok(MediaSession::new(
            Box::new(SystemTracks { stop, threads }),
            Box::new(SystemSource {
                rx: Mutex::new(packet_rx),
            }),
            SessionCapabilities {
                has_video: true,
                has_audio,
            },
            preview,
        ))
    }
}

// ---------------------------------------------------------------------------
// Tracks / source
// ---------------------------------------------------------------------------

struct SystemTracks {
    stop: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl MediaTracks for SystemTracks {
    fn stop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                log::warn!("Capture thread panicked during shutdown");
            }
        }
    }
}

struct SystemSource {
    // Receiver is !Sync; the Mutex restores Sync and is uncontended because
    // `next` takes &mut self.
    rx: Mutex<Receiver<MediaPacket>>,
}

impl MediaSource for SystemSource {
    fn next(&mut self, timeout: Duration) -> Option<MediaPacket> {
        match self.rx.lock() {
            Ok(rx) => rx.recv_timeout(timeout).ok(),
            Err(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Camera thread
// ---------------------------------------------------------------------------

fn spawn_camera_thread(
    device_index: u32,
    stop: Arc<AtomicBool>,
    preview: PreviewHandle,
    packets: SyncSender<MediaPacket>,
) -> Result<JoinHandle<()>, DeviceError> {
    let (ready_tx, ready_rx) = mpsc::channel::<Result<(), DeviceError>>();

    let thread_stop = Arc::clone(&stop);
    let handle = thread::Builder::new()
        .name("camera-capture".into())
        .spawn(move || {
            // The camera handle is created on this thread and never leaves it.
            let requested =
                RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestFrameRate);
            let mut camera = match Camera::new(CameraIndex::Index(device_index), requested) {
                Ok(camera) => camera,
                Err(e) => {
                    let _ = ready_tx.send(Err(DeviceError::CameraUnavailable(e.to_string())));
                    return;
                }
            };
            if let Err(e) = camera.open_stream() {
                let _ = ready_tx.send(Err(DeviceError::AccessDenied(e.to_string())));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            while !thread_stop.load(Ordering::Relaxed) {
                let frame = match camera.frame() {
                    Ok(frame) => frame,
                    Err(e) => {
                        log::warn!("Camera frame error: {e}");
                        thread::sleep(Duration::from_millis(100));
                        continue;
                    }
                };
                let rgb = match frame.decode_image::<RgbFormat>() {
                    Ok(rgb) => rgb,
                    Err(e) => {
                        log::warn!("Frame decode error: {e}");
                        continue;
                    }
                };

                let (width, height) = (rgb.width(), rgb.height());
                let raw = rgb.into_raw();
                let mut data = Vec::with_capacity(raw.len() / 3 * 4);
                for px in raw.chunks_exact(3) {
                    data.extend_from_slice(px);
                    data.push(0xff);
                }
                let rgba = RgbaFrame {
                    width,
                    height,
                    data,
                };

                if let Ok(mut slot) = preview.lock() {
                    *slot = Some(rgba.clone());
                }
                // Dropped when the recording pump is not draining.
                let _ = packets.try_send(MediaPacket::Video(rgba));
            }

            if let Err(e) = camera.stop_stream() {
                log::warn!("Failed to stop camera stream: {e}");
            }
            log::debug!("Camera thread exited");
        })
        .map_err(|e| DeviceError::CameraUnavailable(e.to_string()))?;

    match ready_rx.recv_timeout(STARTUP_TIMEOUT) {
        Ok(Ok(())) => Ok(handle),
        Ok(Err(e)) => {
            let _ = handle.join();
            Err(e)
        }
        Err(_) => {
            stop.store(true, Ordering::Relaxed);
            Err(DeviceError::CameraUnavailable(
                "timed out waiting for camera to start".into(),
            ))
        }
    }
}

// ---------------------------------------------------------------------------
// Microphone thread
// ---------------------------------------------------------------------------

fn spawn_audio_thread(
    device_name: Option<String>,
    stop: Arc<AtomicBool>,
    packets: SyncSender<MediaPacket>,
) -> Result<JoinHandle<()>, DeviceError> {
    let (ready_tx, ready_rx) = mpsc::channel::<Result<(), DeviceError>>();

    let thread_stop = Arc::clone(&stop);
    let handle = thread::Builder::new()
        .name("mic-capture".into())
        .spawn(move || {
            // cpal streams are not Send, so the stream is built, played and
            // dropped entirely on this thread.
            let stream = match build_input_stream(device_name.as_deref(), packets) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(DeviceError::MicrophoneUnavailable(e.to_string())));
                return;
            }
            let _ = ready_tx.send(Ok(()));

            while !thread_stop.load(Ordering::Relaxed) {
                thread::sleep(Duration::from_millis(50));
            }
            drop(stream);
            log::debug!("Microphone thread exited");
        })
        .map_err(|e| DeviceError::MicrophoneUnavailable(e.to_string()))?;

    match ready_rx.recv_timeout(STARTUP_TIMEOUT) {
        Ok(Ok(())) => Ok(handle),
        Ok(Err(e)) => {
            let _ = handle.join();
            Err(e)
        }
        Err(_) => {
            stop.store(true, Ordering::Relaxed);
            Err(DeviceError::MicrophoneUnavailable(
                "timed out waiting for microphone to start".into(),
            ))
        }
    }
}

fn build_input_stream(
    device_name: Option<&str>,
    packets: SyncSender<MediaPacket>,
) -> Result<cpal::Stream, DeviceError> {
    let host = cpal::default_host();

    let device = match device_name {
        Some(name) => host
            .input_devices()
            .map_err(|e| DeviceError::MicrophoneUnavailable(e.to_string()))?
            .find(|d| d.name().map(|n| n == name).unwrap_or(false))
            .ok_or_else(|| {
                DeviceError::MicrophoneUnavailable(format!("input device '{name}' not found"))
            })?,
        None => host
            .default_input_device()
            .ok_or_else(|| DeviceError::MicrophoneUnavailable("no default input device".into()))?,
    };

    let supported = device
        .default_input_config()
        .map_err(|e| DeviceError::MicrophoneUnavailable(e.to_string()))?;
    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels();
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();

    log::info!(
        "Microphone: {} ({sample_rate} Hz, {channels} ch, {sample_format:?})",
        device.name().unwrap_or_else(|_| "<unknown>".into())
    );

    let err_fn = |e| log::error!("Audio stream error: {e}");

    let send = move |samples: Vec<f32>| {
        let _ = packets.try_send(MediaPacket::Audio(AudioChunk {
            samples,
            sample_rate,
            channels,
        }));
    };

    let stream = match sample_format {
        cpal::SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| send(data.to_vec()),
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                send(data.iter().map(|&s| f32::from(s) / 32_768.0).collect())
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::U16 => device.build_input_stream(
            &config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                send(
                    data.iter()
                        .map(|&s| (f32::from(s) - 32_768.0) / 32_768.0)
                        .collect(),
                )
            },
            err_fn,
            None,
        ),
        other => {
            return Err(DeviceError::MicrophoneUnavailable(format!(
                "unsupported sample format: {other:?}"
            )))
        }
    };

    stream.map_err(|e| DeviceError::MicrophoneUnavailable(e.to_string()))
}
