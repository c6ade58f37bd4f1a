//! loanbooth — a video-interview loan application wizard.
//!
//! The user records an introduction and interview answers via webcam and
//! microphone, uploads identity/income documents, and receives a (mocked)
//! eligibility decision.
//!
//! # Architecture
//!
//! ```text
//! egui UI (app.rs)
//!   │  WizardCommand ▼        ▲ WizardUpdate
//! WizardController (wizard/controller.rs, tokio task)
//!   ├─ CaptureFlow (capture/) — countdown → record → preview state machine
//!   │    ├─ SessionManager (media/) — camera + microphone lifecycle
//!   │    └─ RecorderController (record/) — encoding negotiation + clip buffer
//!   ├─ DocumentService (documents/) — mock OCR collaborator
//!   └─ EligibilityService (eligibility/) — mock decision collaborator
//! ```
//!
//! Hardware and encoding sit behind the [`media::MediaBackend`] and
//! [`record::EncoderBackend`] traits; tests run against in-tree fakes.

pub mod app;
pub mod assistant;
pub mod capture;
pub mod config;
pub mod documents;
pub mod eligibility;
pub mod media;
pub mod record;
pub mod wizard;
