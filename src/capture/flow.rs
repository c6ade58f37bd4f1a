//! Pure transition function for the capture flow.
//!
//! States move `Idle → CountingDown → Recording → Previewing → Submitted`,
//! with `Error` reachable from any phase that touches hardware. Every
//! transition returns the list of [`Effect`]s the driver must execute; the
//! function itself performs no I/O and owns no timers, which keeps the
//! orderings that matter (re-entrant start, governor racing a manual stop,
//! teardown mid-countdown) unit-testable.

use crate::record::Clip;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Per-step capture parameters.
#[derive(Debug, Clone, Copy)]
pub struct CaptureSpec {
    /// Seconds counted down before recording starts.
    pub countdown_secs: u32,
    /// Hard recording cap in seconds. `0` disables the governor entirely
    /// (used by informational steps that never record).
    pub max_duration_secs: u32,
}

impl Default for CaptureSpec {
    fn default() -> Self {
        Self {
            countdown_secs: 3,
            max_duration_secs: 60,
        }
    }
}

/// Where the capture flow currently is.
#[derive(Debug, Clone)]
pub enum CaptureState {
    /// Camera live (or being acquired), nothing recording.
    Idle,
    /// Counting down; `remaining` is shown full-screen and decremented once
    /// per second.
    CountingDown { remaining: u32 },
    /// Recording; `elapsed_secs` counts up under the governor.
    Recording { elapsed_secs: u32 },
    /// A finished clip awaiting the user's verdict.
    Previewing { clip: Clip },
    /// Clip handed off (or step skipped); the flow is done.
    Submitted,
    /// Device or encoder failure; the user may retry or skip.
    Error { message: String },
}

impl CaptureState {
    pub fn name(&self) -> &'static str {
        match self {
            CaptureState::Idle => "idle",
            CaptureState::CountingDown { .. } => "counting-down",
            CaptureState::Recording { .. } => "recording",
            CaptureState::Previewing { .. } => "previewing",
            CaptureState::Submitted => "submitted",
            CaptureState::Error { .. } => "error",
        }
    }
}

/// Everything that can happen to the flow: user intents, timer ticks and
/// completions reported by the driver.
#[derive(Debug)]
pub enum FlowEvent {
    /// The wizard entered a capture step.
    Entered,
    /// User pressed record.
    StartRequested,
    /// One second of countdown elapsed.
    CountdownTick,
    /// One second of recording elapsed.
    GovernorTick,
    /// User pressed stop.
    StopRequested,
    /// The recorder finalized a clip.
    RecorderStopped(Clip),
    /// The recorder failed mid-flight.
    RecorderFailed(String),
    /// Device acquisition or capture failed.
    SessionFailed(String),
    /// User rejected the previewed clip.
    ReRecordRequested,
    /// User accepted the previewed clip.
    SubmitRequested,
    /// User chose to retry after an error.
    RetryRequested,
    /// User chose to skip the step after an error.
    SkipRequested,
    /// The wizard is leaving this step.
    Teardown,
    /// Encoded chunk from the pump. Consumed by the driver, inert here.
    Data(Vec<u8>),
    /// The pump finished draining the encoder. Consumed by the driver.
    EncoderFinished,
}

/// Work the driver must perform after a transition.
#[derive(Debug, PartialEq)]
pub enum Effect {
    AcquireSession,
    ReleaseSession,
    ScheduleCountdownTick,
    CancelCountdown,
    StartRecorder,
    ScheduleGovernorTick,
    CancelGovernor,
    StopRecorder,
    AbortRecorder,
    /// Drop a rejected clip.
    DiscardClip,
    /// Hand the accepted clip to the wizard.
    DeliverClip(Clip),
    /// Step skipped after an error; the wizard advances clip-less.
    AdvanceWithoutClip,
}

// ---------------------------------------------------------------------------
// Transition function
// ---------------------------------------------------------------------------

/// Applies one event to the flow.
pub fn transition(
    state: CaptureState,
    event: FlowEvent,
    spec: &CaptureSpec,
) -> (CaptureState, Vec<Effect>) {
    use CaptureState::*;
    use Effect::*;
    use FlowEvent::*;

    match (state, event) {
        // Teardown wins from any state: cancel everything, free the devices.
        (_, Teardown) => (
            Idle,
            vec![CancelCountdown, CancelGovernor, AbortRecorder, ReleaseSession],
        ),

        (Idle, Entered) => (Idle, vec![AcquireSession]),

        // Hardware failure surfaces as a retryable error from any phase that
        // holds devices.
        (Idle | CountingDown { .. } | Recording { .. }, SessionFailed(message)) => (
            Error { message },
            vec![CancelCountdown, CancelGovernor, AbortRecorder, ReleaseSession],
        ),

        (Idle, StartRequested) => (
            CountingDown {
                remaining: spec.countdown_secs,
            },
            vec![ScheduleCountdownTick],
        ),

        // Pressing record during the countdown restarts it from the top.
        (CountingDown { .. }, StartRequested) => (
            CountingDown {
                remaining: spec.countdown_secs,
            },
            vec![CancelCountdown, ScheduleCountdownTick],
        ),

        (CountingDown { remaining }, CountdownTick) => {
            if remaining > 1 {
                (
                    CountingDown {
                        remaining: remaining - 1,
                    },
                    vec![ScheduleCountdownTick],
                )
            } else {
                let mut effects = vec![StartRecorder];
                if spec.max_duration_secs > 0 {
                    effects.push(ScheduleGovernorTick);
                }
                (Recording { elapsed_secs: 0 }, effects)
            }
        }

        (Recording { elapsed_secs }, GovernorTick) => {
            let elapsed = elapsed_secs + 1;
            if spec.max_duration_secs > 0 && elapsed >= spec.max_duration_secs {
                // Cap reached: stop exactly as if the user had pressed stop.
                (
                    Recording {
                        elapsed_secs: spec.max_duration_secs,
                    },
                    vec![CancelGovernor, StopRecorder],
                )
            } else {
                (
                    Recording {
                        elapsed_secs: elapsed,
                    },
                    vec![ScheduleGovernorTick],
                )
            }
        }

        (Recording { elapsed_secs }, StopRequested) => (
            Recording { elapsed_secs },
            vec![CancelGovernor, StopRecorder],
        ),

        (Recording { .. }, RecorderStopped(clip)) => {
            (Previewing { clip }, vec![ReleaseSession])
        }

        (Recording { .. }, RecorderFailed(message)) => (
            Error { message },
            vec![CancelGovernor, ReleaseSession],
        ),

        (Previewing { .. }, ReRecordRequested) => (
            CountingDown {
                remaining: spec.countdown_secs,
            },
            vec![DiscardClip, AcquireSession, ScheduleCountdownTick],
        ),

        (Previewing { clip }, SubmitRequested) => (Submitted, vec![DeliverClip(clip)]),

        (Error { .. }, RetryRequested) => (Idle, vec![AcquireSession]),

        (Error { .. }, SkipRequested) => (Submitted, vec![AdvanceWithoutClip]),

        // Everything else is a stale or out-of-order event: stop with nothing
        // recording, a countdown tick after cancellation, data chunks
        // reaching the core. Ignore it.
        (state, _) => (state, vec![]),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
