//! Impure shell around the capture flow.
//!
//! [`CaptureFlow`] owns the session manager, the recorder controller, both
//! timers and the pump thread. It feeds events through the pure
//! [`transition`](super::flow::transition) function and executes the returned
//! effects; everything asynchronous (device acquisition, pump completion,
//! timer ticks) comes back to the owner as further [`FlowEvent`]s on the
//! shared event channel.
//!
//! The pump is a dedicated OS thread: it pulls packets from the capture
//! source, pushes them through the encoder session and forwards encoded
//! chunks as [`FlowEvent::Data`]. A shared control word tells it to finish
//! (drain the encoder, emit [`FlowEvent::EncoderFinished`]) or abort
//! (discard everything).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::media::{MediaSource, PreviewHandle, SessionManager};
use crate::record::{Clip, EncoderSession, RecorderController};

use super::flow::{transition, CaptureSpec, CaptureState, Effect, FlowEvent};

// ---------------------------------------------------------------------------
// Public surface
// ---------------------------------------------------------------------------

/// How a capture step ended, for the wizard to act on.
#[derive(Debug)]
pub enum CaptureOutcome {
    /// The user accepted this clip.
    ClipReady(Clip),
    /// The user skipped the step after an error; no clip exists.
    Skipped,
}

/// Snapshot of the flow for rendering. Carries no handles or clip bytes.
#[derive(Debug, Clone)]
pub enum CaptureView {
    Idle {
        session_ready: bool,
    },
    CountingDown {
        remaining: u32,
    },
    Recording {
        elapsed_secs: u32,
        max_duration_secs: u32,
    },
    Previewing {
        byte_len: usize,
        mime_type: String,
    },
    Submitted,
    Error {
        message: String,
    },
}

// ---------------------------------------------------------------------------
// CaptureFlow
// ---------------------------------------------------------------------------

pub struct CaptureFlow {
    state: CaptureState,
    spec: CaptureSpec,
    sessions: SessionManager,
    recorder: RecorderController,
    countdown: super::CountdownGate,
    governor: super::ElapsedGovernor,
    events_tx: mpsc::Sender<FlowEvent>,
    pump: Option<PumpHandle>,
    preview: Option<PreviewHandle>,
}

impl CaptureFlow {
    pub fn new(
        spec: CaptureSpec,
        sessions: SessionManager,
        recorder: RecorderController,
        events_tx: mpsc::Sender<FlowEvent>,
    ) -> Self {
        Self {
            state: CaptureState::Idle,
            spec,
            sessions,
            recorder,
            countdown: super::CountdownGate::new(events_tx.clone()),
            governor: super::ElapsedGovernor::new(events_tx.clone()),
            events_tx,
            pump: None,
            preview: None,
        }
    }

    /// Current render snapshot.
    pub fn view(&self) -> CaptureView {
        match &self.state {
            CaptureState::Idle => CaptureView::Idle {
                session_ready: self.sessions.is_open(),
            },
            CaptureState::CountingDown { remaining } => CaptureView::CountingDown {
                remaining: *remaining,
            },
            CaptureState::Recording { elapsed_secs } => CaptureView::Recording {
                elapsed_secs: *elapsed_secs,
                max_duration_secs: self.spec.max_duration_secs,
            },
            CaptureState::Previewing { clip } => CaptureView::Previewing {
                byte_len: clip.byte_len(),
                mime_type: clip.mime_type.clone(),
            },
            CaptureState::Submitted => CaptureView::Submitted,
            CaptureState::Error { message } => CaptureView::Error {
                message: message.clone(),
            },
        }
    }

    /// Live preview slot of the open session, once acquired.
    pub fn preview(&self) -> Option<PreviewHandle> {
        self.preview.clone()
    }

    /// Begins a capture step with the given parameters.
    pub async fn enter(&mut self, spec: CaptureSpec) -> Option<CaptureOutcome> {
        self.spec = spec;
        self.state = CaptureState::Idle;
        self.handle_event(FlowEvent::Entered).await
    }

    /// Leaves the step, cancelling timers and freeing devices.
    pub async fn teardown(&mut self) -> Option<CaptureOutcome> {
        self.handle_event(FlowEvent::Teardown).await
    }

    /// Applies one event and executes the resulting effects.
    ///
    /// Effects that fail (device acquisition, encoder start) queue follow-up
    /// events which are processed in the same call, so the caller always sees
    /// a settled state on return.
    pub async fn handle_event(&mut self, event: FlowEvent) -> Option<CaptureOutcome> {
        let mut queue = VecDeque::from([event]);
        let mut outcome = None;

        while let Some(event) = queue.pop_front() {
            match event {
                // Pump traffic never reaches the transition function.
                FlowEvent::Data(chunk) => self.recorder.on_data(chunk),
                FlowEvent::EncoderFinished => {
                    self.pump = None;
                    match self.recorder.stop() {
                        Ok(Some(clip)) => queue.push_back(FlowEvent::RecorderStopped(clip)),
                        Ok(None) => {}
                        Err(e) => queue.push_back(FlowEvent::RecorderFailed(e.to_string())),
                    }
                }
                event => {
                    let state = std::mem::replace(&mut self.state, CaptureState::Idle);
                    log::debug!("Capture: {} + {event:?}", state.name());
                    let (next, effects) = transition(state, event, &self.spec);
                    self.state = next;
                    for effect in effects {
                        if let Some(settled) = self.run_effect(effect, &mut queue).await {
                            outcome = Some(settled);
                        }
                    }
                }
            }
        }

        outcome
    }

    async fn run_effect(
        &mut self,
        effect: Effect,
        queue: &mut VecDeque<FlowEvent>,
    ) -> Option<CaptureOutcome> {
        match effect {
            Effect::AcquireSession => {
                self.sessions.release();
                self.preview = None;
                let backend = self.sessions.backend();
                match tokio::task::spawn_blocking(move || backend.open()).await {
                    Ok(Ok(session)) => {
                        self.preview = Some(session.preview());
                        self.sessions.install(session);
                    }
                    Ok(Err(e)) => queue.push_back(FlowEvent::SessionFailed(e.to_string())),
                    Err(e) => {
                        queue.push_back(FlowEvent::SessionFailed(format!(
                            "session task failed: {e}"
                        )));
                    }
                }
            }
            Effect::ReleaseSession => {
                self.sessions.release();
                self.preview = None;
            }
            Effect::ScheduleCountdownTick => self.countdown.schedule(),
            Effect::CancelCountdown => self.countdown.cancel(),
            Effect::ScheduleGovernorTick => self.governor.schedule(),
            Effect::CancelGovernor => self.governor.cancel(),
            Effect::StartRecorder => {
                let with_audio = self
                    .sessions
                    .current()
                    .map(|s| s.capabilities().has_audio)
                    .unwrap_or(false);
                let source = self.sessions.current_mut().and_then(|s| s.take_source());
                match source {
                    Some(source) => match self.recorder.start(with_audio) {
                        Ok((_, session)) => {
                            match PumpHandle::spawn(source, session, self.events_tx.clone()) {
                                Ok(pump) => self.pump = Some(pump),
                                Err(e) => {
                                    self.recorder.abort();
                                    queue.push_back(FlowEvent::RecorderFailed(e.to_string()));
                                }
                            }
                        }
                        Err(e) => queue.push_back(FlowEvent::RecorderFailed(e.to_string())),
                    },
                    None => queue.push_back(FlowEvent::RecorderFailed(
                        "capture source unavailable".into(),
                    )),
                }
            }
            Effect::StopRecorder => {
                match &self.pump {
                    Some(pump) => pump.finish(),
                    // Recorder active with no pump means the start failed
                    // under us.
                    None => queue.push_back(FlowEvent::EncoderFinished),
                }
            }
            Effect::AbortRecorder => {
                if let Some(mut pump) = self.pump.take() {
                    pump.abort();
                }
                self.recorder.abort();
            }
            Effect::DiscardClip => log::info!("Clip discarded for re-record"),
            Effect::DeliverClip(clip) => return Some(CaptureOutcome::ClipReady(clip)),
            Effect::AdvanceWithoutClip => return Some(CaptureOutcome::Skipped),
        }
        None
    }
}

// ---------------------------------------------------------------------------
// Pump
// ---------------------------------------------------------------------------

const PUMP_RUN: u8 = 0;
const PUMP_FINISH: u8 = 1;
const PUMP_ABORT: u8 = 2;

/// How long the pump blocks waiting for a packet before re-checking the
/// control word.
const PUMP_POLL: Duration = Duration::from_millis(100);

struct PumpHandle {
    control: Arc<AtomicU8>,
    thread: Option<thread::JoinHandle<()>>,
}

impl PumpHandle {
    fn spawn(
        mut source: Box<dyn MediaSource>,
        mut session: Box<dyn EncoderSession>,
        events: mpsc::Sender<FlowEvent>,
    ) -> std::io::Result<Self> {
        let control = Arc::new(AtomicU8::new(PUMP_RUN));
        let thread_control = Arc::clone(&control);

        let thread = thread::Builder::new()
            .name("record-pump".into())
            .spawn(move || {
                loop {
                    match thread_control.load(Ordering::Relaxed) {
                        PUMP_ABORT => {
                            session.abort();
                            return;
                        }
                        PUMP_FINISH => break,
                        _ => {}
                    }
                    let Some(packet) = source.next(PUMP_POLL) else {
                        continue;
                    };
                    match session.push(&packet) {
                        Ok(chunks) => {
                            for chunk in chunks {
                                if events.blocking_send(FlowEvent::Data(chunk)).is_err() {
                                    return;
                                }
                            }
                        }
                        Err(e) => {
                            let _ = events.blocking_send(FlowEvent::RecorderFailed(e.to_string()));
                            return;
                        }
                    }
                }

                // Finish: drain the encoder tail, then signal completion.
                match session.finish() {
                    Ok(chunks) => {
                        for chunk in chunks {
                            if events.blocking_send(FlowEvent::Data(chunk)).is_err() {
                                return;
                            }
                        }
                        let _ = events.blocking_send(FlowEvent::EncoderFinished);
                    }
                    Err(e) => {
                        let _ = events.blocking_send(FlowEvent::RecorderFailed(e.to_string()));
                    }
                }
            })?;

        Ok(Self {
            control,
            thread: Some(thread),
        })
    }

    /// Asks the pump to drain the encoder and exit. Completion arrives as
    /// [`FlowEvent::EncoderFinished`] on the event channel.
    fn finish(&self) {
        self.control.store(PUMP_FINISH, Ordering::Relaxed);
    }

    /// Tears the pump down, discarding the encode.
    fn abort(&mut self) {
        self.control.store(PUMP_ABORT, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("Record pump panicked during abort");
            }
        }
    }
}

impl Drop for PumpHandle {
    fn drop(&mut self) {
        // Finished pumps exit on their own; anything else is torn down.
        if let Some(thread) = self.thread.take() {
            if self.control.load(Ordering::Relaxed) == PUMP_RUN {
                self.control.store(PUMP_ABORT, Ordering::Relaxed);
            }
            let _ = thread.join();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
