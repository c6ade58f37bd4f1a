//! The countdown → record → preview capture flow.
//!
//! Split into a pure core and an impure shell:
//!
//! * [`flow`] — the transition function. `(state, event) -> (state, effects)`
//!   with no I/O, so every ordering quirk (re-entrant starts, a governor tick
//!   racing a manual stop, teardown mid-countdown) is a plain unit test.
//! * [`countdown`] / [`governor`] — the two timers, each a single pending
//!   one-second task that feeds ticks back as events.
//! * [`driver`] — executes effects against the session manager, the recorder
//!   and the pump thread that moves packets into the encoder.

pub mod countdown;
pub mod driver;
pub mod flow;
pub mod governor;

pub use countdown::CountdownGate;
pub use driver::{CaptureFlow, CaptureOutcome, CaptureView};
pub use flow::{transition, CaptureSpec, CaptureState, Effect, FlowEvent};
pub use governor::ElapsedGovernor;
