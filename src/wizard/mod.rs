//! The application wizard: step sequencing, interview questions and the
//! controller task that ties capture, documents and eligibility together.
//!
//! The UI talks to [`WizardController`] exclusively over channels — commands
//! in, updates out — so every step transition happens in one place and the
//! UI never owns hardware or application state.

pub mod controller;
pub mod questions;
pub mod state;

pub use controller::{WizardCommand, WizardController, WizardUpdate};
pub use questions::{QuestionSpec, QUESTIONS};
pub use state::{ApplicationState, ApplicationStep, VideoResponse};
