//! Loan application wizard — egui/eframe application.
//!
//! # Architecture
//!
//! [`LoanBoothApp`] is the top-level [`eframe::App`]. It owns no hardware and
//! no application state of its own — it renders the latest snapshots received
//! from the wizard controller and sends [`WizardCommand`]s back:
//!
//! * `command_tx` — sends [`WizardCommand`] to the controller task.
//! * `update_rx`  — receives [`WizardUpdate`] snapshots (step changes,
//!   capture views, document results, the final decision).
//!
//! The live camera preview arrives as a shared frame slot
//! ([`PreviewHandle`]); every repaint uploads the newest frame as an egui
//! texture.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use eframe::egui;
use tokio::sync::mpsc;

use crate::assistant;
use crate::capture::CaptureView;
use crate::documents::DocumentType;
use crate::eligibility::{Decision, DecisionStatus};
use crate::media::{self, FaceDetector, PreviewHandle};
use crate::wizard::{ApplicationStep, QuestionSpec, WizardCommand, WizardUpdate};

const ACCENT: egui::Color32 = egui::Color32::from_rgb(58, 110, 235);
const RECORD_RED: egui::Color32 = egui::Color32::from_rgb(220, 60, 60);
const OK_GREEN: egui::Color32 = egui::Color32::from_rgb(80, 180, 120);
const WARN_ORANGE: egui::Color32 = egui::Color32::from_rgb(235, 150, 60);

/// Upload state of one document slot, as shown in the document step.
#[derive(Debug, Clone)]
enum DocSlot {
    Empty,
    Processing,
    Verified { file_name: String },
    Rejected { message: String },
}

// ---------------------------------------------------------------------------
// LoanBoothApp
// ---------------------------------------------------------------------------

/// eframe application — the loan application wizard window.
pub struct LoanBoothApp {
    // ── Wizard snapshots ─────────────────────────────────────────────────
    step: ApplicationStep,
    question: Option<&'static QuestionSpec>,
    capture: Option<CaptureView>,
    decision: Option<Decision>,
    documents: HashMap<DocumentType, DocSlot>,

    // ── Camera preview ───────────────────────────────────────────────────
    preview: Option<PreviewHandle>,
    preview_texture: Option<egui::TextureHandle>,
    face_detector: std::sync::Arc<dyn FaceDetector>,
    face_visible: bool,

    // ── Input fields ─────────────────────────────────────────────────────
    name_input: String,
    upload_path_input: String,
    assistant_input: String,

    // ── Assistant panel ──────────────────────────────────────────────────
    conversation: assistant::Conversation,
    assistant_waiting: bool,

    // ── Channels ─────────────────────────────────────────────────────────
    command_tx: mpsc::Sender<WizardCommand>,
    update_rx: mpsc::Receiver<WizardUpdate>,
}

impl LoanBoothApp {
    pub fn new(
        command_tx: mpsc::Sender<WizardCommand>,
        update_rx: mpsc::Receiver<WizardUpdate>,
    ) -> Self {
        let mut documents = HashMap::new();
        for doc_type in DocumentType::ALL {
            documents.insert(doc_type, DocSlot::Empty);
        }
        Self {
            step: ApplicationStep::Initial,
            question: None,
            capture: None,
            decision: None,
            documents,
            preview: None,
            preview_texture: None,
            face_detector: media::platform_detector(),
            face_visible: true,
            name_input: String::new(),
            upload_path_input: String::new(),
            assistant_input: String::new(),
            conversation: assistant::Conversation::new(),
            assistant_waiting: false,
            command_tx,
            update_rx,
        }
    }

    fn send(&self, command: WizardCommand) {
        if self.command_tx.try_send(command).is_err() {
            log::warn!("Wizard command channel full or closed");
        }
    }

    // ── Channel polling ──────────────────────────────────────────────────

    /// Drain all pending wizard updates (non-blocking).
    fn poll_updates(&mut self) {
        while let Ok(update) = self.update_rx.try_recv() {
            match update {
                WizardUpdate::StepChanged { step, question } => {
                    self.step = step;
                    self.question = question;
                    if step == ApplicationStep::Initial {
                        self.reset_view();
                    }
                }
                WizardUpdate::Capture { view, preview } => {
                    self.capture = Some(view);
                    self.preview = preview;
                    if self.preview.is_none() {
                        self.preview_texture = None;
                    }
                }
                WizardUpdate::DocumentProcessing { doc_type } => {
                    self.documents.insert(doc_type, DocSlot::Processing);
                }
                WizardUpdate::DocumentVerified { record, .. } => {
                    self.documents.insert(
                        record.doc_type,
                        DocSlot::Verified {
                            file_name: record.file_name,
                        },
                    );
                    self.upload_path_input.clear();
                }
                WizardUpdate::DocumentRejected { doc_type, message } => {
                    self.documents.insert(doc_type, DocSlot::Rejected { message });
                }
                WizardUpdate::AssistantReplied { query, response } => {
                    self.conversation.record(&query, response);
                    self.assistant_waiting = false;
                }
                WizardUpdate::DecisionReady(decision) => {
                    self.decision = Some(decision);
                }
            }
        }
    }

    fn reset_view(&mut self) {
        self.capture = None;
        self.decision = None;
        self.preview = None;
        self.preview_texture = None;
        self.name_input.clear();
        self.upload_path_input.clear();
        for slot in self.documents.values_mut() {
            *slot = DocSlot::Empty;
        }
    }

    /// Upload the newest camera frame as the preview texture.
    fn refresh_preview(&mut self, ctx: &egui::Context) {
        let Some(preview) = &self.preview else {
            return;
        };
        let Ok(slot) = preview.lock() else {
            return;
        };
        let Some(frame) = slot.as_ref() else {
            return;
        };
        self.face_visible = self.face_detector.detect(frame);
        let image = egui::ColorImage::from_rgba_unmultiplied(
            [frame.width as usize, frame.height as usize],
            &frame.data,
        );
        match &mut self.preview_texture {
            Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.preview_texture =
                    Some(ctx.load_texture("camera-preview", image, egui::TextureOptions::LINEAR));
            }
        }
    }

    // ── Step panels ──────────────────────────────────────────────────────

    fn draw_initial(&mut self, ui: &mut egui::Ui) {
        ui.add_space(24.0);
        ui.heading("Finesse Bank Video Loan Application");
        ui.add_space(8.0);
        ui.label("A virtual branch manager will guide you through a short video interview and document upload. You'll receive a decision at the end.");
        ui.add_space(16.0);

        ui.horizontal(|ui| {
            ui.label("Your name:");
            ui.text_edit_singleline(&mut self.name_input);
        });
        ui.add_space(8.0);

        let ready = !self.name_input.trim().is_empty();
        if ui
            .add_enabled(ready, egui::Button::new("Start Application"))
            .clicked()
        {
            self.send(WizardCommand::Begin {
                customer_name: self.name_input.trim().to_owned(),
            });
        }
    }

    fn draw_video_step(&mut self, ui: &mut egui::Ui) {
        if let Some(question) = self.question {
            ui.add_space(8.0);
            ui.label(
                egui::RichText::new(question.script)
                    .size(15.0)
                    .color(egui::Color32::from_rgb(210, 210, 210)),
            );
            ui.add_space(8.0);

            if !question.records() {
                // Confirmation script: nothing to record.
                if ui.button("Submit Application").clicked() {
                    self.send(WizardCommand::ContinueToProcessing);
                }
                return;
            }
        }

        self.draw_preview(ui);
        ui.add_space(8.0);

        let Some(view) = self.capture.clone() else {
            ui.spinner();
            return;
        };
        match view {
            CaptureView::Idle { session_ready } => {
                if session_ready {
                    let prompt = self
                        .question
                        .and_then(|q| q.response_prompt)
                        .unwrap_or("Record");
                    if ui
                        .add(egui::Button::new(
                            egui::RichText::new(format!("\u{25cf} {prompt}")).color(RECORD_RED),
                        ))
                        .clicked()
                    {
                        self.send(WizardCommand::StartCapture);
                    }
                } else {
                    ui.horizontal(|ui| {
                        ui.spinner();
                        ui.label("Connecting to camera...");
                    });
                }
            }
            CaptureView::CountingDown { remaining } => {
                ui.vertical_centered(|ui| {
                    ui.label(
                        egui::RichText::new(remaining.to_string())
                            .size(64.0)
                            .color(ACCENT)
                            .strong(),
                    );
                    ui.label("Recording starts when the countdown ends");
                });
            }
            CaptureView::Recording {
                elapsed_secs,
                max_duration_secs,
            } => {
                ui.horizontal(|ui| {
                    ui.label(egui::RichText::new("\u{25cf} REC").color(RECORD_RED).strong());
                    ui.label(format!("{elapsed_secs}s / {max_duration_secs}s"));
                    if !self.face_visible {
                        ui.label(
                            egui::RichText::new("Please stay in front of the camera")
                                .color(WARN_ORANGE),
                        );
                    }
                });
                if max_duration_secs > 0 {
                    let progress = elapsed_secs as f32 / max_duration_secs as f32;
                    ui.add(egui::ProgressBar::new(progress).fill(RECORD_RED));
                }
                ui.add_space(4.0);
                if ui.button("Stop Recording").clicked() {
                    self.send(WizardCommand::StopCapture);
                }
            }
            CaptureView::Previewing { byte_len, mime_type } => {
                ui.label(
                    egui::RichText::new("Recording complete").color(OK_GREEN),
                );
                ui.label(format!(
                    "{} — {:.1} KiB",
                    mime_type,
                    byte_len as f32 / 1024.0
                ));
                ui.add_space(4.0);
                ui.horizontal(|ui| {
                    if ui.button("Re-record").clicked() {
                        self.send(WizardCommand::ReRecord);
                    }
                    if ui
                        .add(egui::Button::new(
                            egui::RichText::new("Use This Recording").color(OK_GREEN),
                        ))
                        .clicked()
                    {
                        self.send(WizardCommand::SubmitRecording);
                    }
                });
            }
            CaptureView::Submitted => {
                ui.spinner();
            }
            CaptureView::Error { message } => {
                ui.label(egui::RichText::new(message).color(WARN_ORANGE));
                ui.add_space(4.0);
                ui.horizontal(|ui| {
                    if ui.button("Try Again").clicked() {
                        self.send(WizardCommand::RetryCapture);
                    }
                    if ui.button("Skip This Step").clicked() {
                        self.send(WizardCommand::SkipCapture);
                    }
                });
            }
        }
    }

    fn draw_preview(&mut self, ui: &mut egui::Ui) {
        match &self.preview_texture {
            Some(texture) => {
                ui.add(
                    egui::Image::new(texture)
                        .max_height(320.0)
                        .corner_radius(egui::CornerRadius::same(6)),
                );
            }
            None => {
                let (rect, _) = ui.allocate_exact_size(
                    egui::vec2(ui.available_width().min(480.0), 240.0),
                    egui::Sense::hover(),
                );
                ui.painter()
                    .rect_filled(rect, 6.0, egui::Color32::from_rgb(24, 24, 28));
            }
        }
    }

    fn draw_documents(&mut self, ui: &mut egui::Ui) {
        ui.add_space(8.0);
        ui.heading("Upload Your Documents");
        ui.label("We need three documents to process your application.");
        ui.add_space(12.0);

        for doc_type in DocumentType::ALL {
            let slot = self
                .documents
                .get(&doc_type)
                .cloned()
                .unwrap_or(DocSlot::Empty);
            ui.horizontal(|ui| {
                let (icon, color) = match &slot {
                    DocSlot::Empty => ("\u{25cb}", egui::Color32::GRAY),
                    DocSlot::Processing => ("\u{25d4}", ACCENT),
                    DocSlot::Verified { .. } => ("\u{2713}", OK_GREEN),
                    DocSlot::Rejected { .. } => ("\u{2717}", WARN_ORANGE),
                };
                ui.label(egui::RichText::new(icon).color(color).size(16.0));
                ui.label(doc_type.display_name());
                match &slot {
                    DocSlot::Verified { file_name } => {
                        ui.label(
                            egui::RichText::new(file_name)
                                .color(egui::Color32::GRAY)
                                .size(11.0),
                        );
                    }
                    DocSlot::Rejected { message } => {
                        ui.label(
                            egui::RichText::new(message).color(WARN_ORANGE).size(11.0),
                        );
                    }
                    DocSlot::Processing => {
                        ui.spinner();
                    }
                    DocSlot::Empty => {}
                }
            });
        }

        ui.add_space(12.0);
        if let Some(next) = self.next_pending_document() {
            ui.label(format!("Upload your {} (JPEG, PNG, WEBP or PDF, max 5MB):", next.display_name()));
            ui.horizontal(|ui| {
                ui.text_edit_singleline(&mut self.upload_path_input);
                let has_path = !self.upload_path_input.trim().is_empty();
                if ui.add_enabled(has_path, egui::Button::new("Upload")).clicked() {
                    self.send(WizardCommand::UploadDocument {
                        path: PathBuf::from(self.upload_path_input.trim()),
                        doc_type: next,
                    });
                }
            });
        } else {
            ui.label(egui::RichText::new("All documents verified.").color(OK_GREEN));
            ui.add_space(4.0);
            if ui.button("Continue to Interview").clicked() {
                self.send(WizardCommand::ContinueToQuestions);
            }
        }
    }

    /// The first document slot that is not verified yet, in upload order.
    fn next_pending_document(&self) -> Option<DocumentType> {
        DocumentType::ALL.into_iter().find(|doc_type| {
            !matches!(
                self.documents.get(doc_type),
                Some(DocSlot::Verified { .. })
            )
        })
    }

    fn draw_processing(&mut self, ui: &mut egui::Ui) {
        ui.add_space(48.0);
        ui.vertical_centered(|ui| {
            ui.spinner();
            ui.add_space(8.0);
            ui.label("Processing your application...");
            ui.label(
                egui::RichText::new("We're reviewing your interview and documents.")
                    .color(egui::Color32::GRAY),
            );
        });
    }

    fn draw_decision(&mut self, ui: &mut egui::Ui) {
        let Some(decision) = self.decision.clone() else {
            ui.spinner();
            return;
        };

        ui.add_space(32.0);
        ui.vertical_centered(|ui| {
            let (title, color) = match decision.status {
                DecisionStatus::Approved => ("Application Approved", OK_GREEN),
                DecisionStatus::Rejected => ("Application Declined", RECORD_RED),
                DecisionStatus::MoreInfo => ("More Information Needed", WARN_ORANGE),
            };
            ui.label(egui::RichText::new(title).size(24.0).color(color).strong());
            ui.add_space(8.0);
            ui.label(&decision.message);

            if let Some(amount) = decision.approved_amount {
                ui.add_space(8.0);
                ui.label("Approved amount");
                ui.label(
                    egui::RichText::new(format!("\u{20b9}{amount}"))
                        .size(28.0)
                        .strong(),
                );
                ui.label(
                    egui::RichText::new(
                        "A bank representative will contact you shortly.",
                    )
                    .color(egui::Color32::GRAY),
                );
            }
            if let Some(reason) = &decision.reason {
                ui.add_space(4.0);
                ui.label(egui::RichText::new(reason).color(egui::Color32::GRAY));
            }

            ui.add_space(16.0);
            if ui.button("Start Over").clicked() {
                self.send(WizardCommand::Reset);
            }
        });
    }

    // ── Assistant panel ──────────────────────────────────────────────────

    fn draw_assistant(&mut self, ui: &mut egui::Ui) {
        ui.heading("Loan Assistant");
        ui.label(
            egui::RichText::new("Ask about loan interest rates, terms, eligibility...")
                .color(egui::Color32::GRAY)
                .size(11.0),
        );
        ui.separator();

        egui::ScrollArea::vertical()
            .stick_to_bottom(true)
            .max_height(ui.available_height() - 60.0)
            .show(ui, |ui| {
                for line in self.conversation.lines() {
                    let color = if line.from_user {
                        ACCENT
                    } else {
                        egui::Color32::from_rgb(200, 200, 200)
                    };
                    ui.label(egui::RichText::new(&line.message).color(color).size(12.0));
                    ui.add_space(6.0);
                }
                if self.assistant_waiting {
                    ui.spinner();
                }
            });

        ui.separator();
        ui.horizontal(|ui| {
            let response = ui.text_edit_singleline(&mut self.assistant_input);
            let submitted =
                response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if (ui.button("Ask").clicked() || submitted)
                && !self.assistant_input.trim().is_empty()
            {
                self.send(WizardCommand::AskAssistant {
                    query: self.assistant_input.trim().to_owned(),
                });
                self.assistant_input.clear();
                self.assistant_waiting = true;
            }
        });
    }

    // ── Helpers ──────────────────────────────────────────────────────────

    fn step_title(&self) -> &'static str {
        match self.step {
            ApplicationStep::Initial => "Welcome",
            ApplicationStep::VideoIntro => "Introduction",
            ApplicationStep::DocumentUpload => "Documents",
            ApplicationStep::VideoQuestions => "Interview",
            ApplicationStep::Processing => "Processing",
            ApplicationStep::Approved | ApplicationStep::Rejected | ApplicationStep::MoreInfo => {
                "Decision"
            }
        }
    }
}

// ---------------------------------------------------------------------------
// eframe::App impl
// ---------------------------------------------------------------------------

impl eframe::App for LoanBoothApp {
    /// Called every frame by eframe. Polls channels, refreshes the camera
    /// texture, then renders the current step.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_updates();
        self.refresh_preview(ctx);

        // Keep repainting while anything is moving: a live camera, a
        // countdown, or a pending backend response.
        let animated = self.preview.is_some()
            || self.assistant_waiting
            || matches!(self.step, ApplicationStep::Processing)
            || matches!(
                self.capture,
                Some(CaptureView::CountingDown { .. }) | Some(CaptureView::Recording { .. })
            );
        if animated {
            ctx.request_repaint_after(Duration::from_millis(33));
        } else {
            ctx.request_repaint_after(Duration::from_millis(250));
        }

        egui::SidePanel::right("assistant")
            .default_width(280.0)
            .show(ctx, |ui| {
                self.draw_assistant(ui);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(
                    egui::RichText::new("Finesse Bank")
                        .color(ACCENT)
                        .strong()
                        .size(16.0),
                );
                ui.separator();
                ui.label(self.step_title());
                if self.step != ApplicationStep::Initial {
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.small_button("Start Over").clicked() {
                            self.send(WizardCommand::Reset);
                        }
                    });
                }
            });
            ui.separator();

            match self.step {
                ApplicationStep::Initial => self.draw_initial(ui),
                ApplicationStep::VideoIntro | ApplicationStep::VideoQuestions => {
                    self.draw_video_step(ui)
                }
                ApplicationStep::DocumentUpload => self.draw_documents(ui),
                ApplicationStep::Processing => self.draw_processing(ui),
                ApplicationStep::Approved
                | ApplicationStep::Rejected
                | ApplicationStep::MoreInfo => self.draw_decision(ui),
            }
        });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        let _ = self.command_tx.try_send(WizardCommand::Shutdown);
        log::info!("Loan application window closing");
    }
}
