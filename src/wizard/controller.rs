//! The wizard controller task.
//!
//! Owns the application state and the capture flow, and runs on the tokio
//! runtime next to the UI thread. The select loop interleaves two sources:
//! commands from the UI and flow events from the capture side (timer ticks,
//! pump chunks, completions). Every state change the UI needs to know about
//! goes out as a [`WizardUpdate`].

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::capture::{CaptureFlow, CaptureOutcome, CaptureSpec, CaptureView, FlowEvent};
use crate::documents::{
    display_file_name, validate_upload, DocumentRecord, DocumentService, DocumentStatus,
    DocumentType,
};
use crate::eligibility::{Decision, DecisionStatus, EligibilityService};
use crate::media::PreviewHandle;

use super::questions::{QuestionSpec, QUESTIONS};
use super::state::{ApplicationState, ApplicationStep};

// ---------------------------------------------------------------------------
// Channel types
// ---------------------------------------------------------------------------

/// Everything the UI can ask for.
#[derive(Debug)]
pub enum WizardCommand {
    /// Start a fresh application.
    Begin { customer_name: String },
    StartCapture,
    StopCapture,
    ReRecord,
    SubmitRecording,
    RetryCapture,
    SkipCapture,
    UploadDocument {
        path: PathBuf,
        doc_type: DocumentType,
    },
    /// Leave document upload for the interview. Ignored until all three
    /// documents are verified.
    ContinueToQuestions,
    /// Acknowledge the confirmation script and run the eligibility check.
    ContinueToProcessing,
    /// Ask the assistant a question.
    AskAssistant { query: String },
    /// Abandon the application and return to the start screen.
    Reset,
    Shutdown,
}

/// Everything the UI learns from the controller.
#[derive(Debug)]
pub enum WizardUpdate {
    StepChanged {
        step: ApplicationStep,
        question: Option<&'static QuestionSpec>,
    },
    Capture {
        view: CaptureView,
        preview: Option<PreviewHandle>,
    },
    DocumentProcessing {
        doc_type: DocumentType,
    },
    DocumentVerified {
        record: DocumentRecord,
        next: Option<DocumentType>,
    },
    DocumentRejected {
        doc_type: DocumentType,
        message: String,
    },
    AssistantReplied {
        query: String,
        response: &'static str,
    },
    DecisionReady(Decision),
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct WizardController {
    state: ApplicationState,
    flow: CaptureFlow,
    flow_events: mpsc::Receiver<FlowEvent>,
    commands: mpsc::Receiver<WizardCommand>,
    updates: mpsc::Sender<WizardUpdate>,
    documents: Arc<dyn DocumentService>,
    eligibility: Arc<dyn EligibilityService>,
    /// Seconds counted down before each recording.
    countdown_secs: u32,
    /// Where submitted clips and the application summary are written.
    /// `None` disables persistence.
    artifacts_dir: Option<PathBuf>,
}

impl WizardController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        flow: CaptureFlow,
        flow_events: mpsc::Receiver<FlowEvent>,
        commands: mpsc::Receiver<WizardCommand>,
        updates: mpsc::Sender<WizardUpdate>,
        documents: Arc<dyn DocumentService>,
        eligibility: Arc<dyn EligibilityService>,
        countdown_secs: u32,
        artifacts_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            state: ApplicationState::new(),
            flow,
            flow_events,
            commands,
            updates,
            documents,
            eligibility,
            countdown_secs,
            artifacts_dir,
        }
    }

    pub async fn run(mut self) {
        log::info!("Wizard controller started");
        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        None | Some(WizardCommand::Shutdown) => break,
                        Some(command) => self.handle_command(command).await,
                    }
                }
                Some(event) = self.flow_events.recv() => {
                    let outcome = self.flow.handle_event(event).await;
                    self.push_capture_view().await;
                    if let Some(outcome) = outcome {
                        self.finish_capture(outcome).await;
                    }
                }
            }
        }
        self.flow.teardown().await;
        log::info!("Wizard controller stopped");
    }

    // -- command handling --------------------------------------------------

    async fn handle_command(&mut self, command: WizardCommand) {
        log::debug!("Wizard command: {command:?} (step {:?})", self.state.step);
        match command {
            WizardCommand::Begin { customer_name } => {
                self.state.reset();
                self.state.customer_name = customer_name;
                self.state.step = ApplicationStep::VideoIntro;
                self.state.current_question = 0;
                self.send_step().await;
                self.enter_current_question().await;
            }
            WizardCommand::StartCapture => self.forward_flow(FlowEvent::StartRequested).await,
            WizardCommand::StopCapture => self.forward_flow(FlowEvent::StopRequested).await,
            WizardCommand::ReRecord => self.forward_flow(FlowEvent::ReRecordRequested).await,
            WizardCommand::SubmitRecording => {
                self.forward_flow(FlowEvent::SubmitRequested).await
            }
            WizardCommand::RetryCapture => self.forward_flow(FlowEvent::RetryRequested).await,
            WizardCommand::SkipCapture => self.forward_flow(FlowEvent::SkipRequested).await,
            WizardCommand::UploadDocument { path, doc_type } => {
                self.upload_document(path, doc_type).await;
            }
            WizardCommand::ContinueToQuestions => {
                if self.state.step != ApplicationStep::DocumentUpload {
                    return;
                }
                if !self.state.documents_complete() {
                    log::warn!("Continue requested with incomplete documents");
                    return;
                }
                self.state.step = ApplicationStep::VideoQuestions;
                self.state.current_question = 1;
                self.send_step().await;
                self.enter_current_question().await;
            }
            WizardCommand::ContinueToProcessing => {
                let informational = QUESTIONS
                    .get(self.state.current_question)
                    .map(|q| !q.records())
                    .unwrap_or(false);
                if self.state.step == ApplicationStep::VideoQuestions && informational {
                    self.begin_processing().await;
                }
            }
            WizardCommand::AskAssistant { query } => {
                let response = crate::assistant::answer(&query);
                self.send(WizardUpdate::AssistantReplied { query, response })
                    .await;
            }
            WizardCommand::Reset => {
                self.flow.teardown().await;
                self.state.reset();
                self.send_step().await;
            }
            WizardCommand::Shutdown => unreachable!("handled in run"),
        }
    }

    async fn forward_flow(&mut self, event: FlowEvent) {
        let outcome = self.flow.handle_event(event).await;
        self.push_capture_view().await;
        if let Some(outcome) = outcome {
            self.finish_capture(outcome).await;
        }
    }

    // -- capture step sequencing -------------------------------------------

    fn current_question(&self) -> Option<&'static QuestionSpec> {
        QUESTIONS.get(self.state.current_question)
    }

    async fn enter_current_question(&mut self) {
        let Some(question) = self.current_question() else {
            return;
        };
        if !question.records() {
            // Informational entry: script only, nothing to capture.
            return;
        }
        let spec = CaptureSpec {
            countdown_secs: self.countdown_secs,
            max_duration_secs: question.max_duration_secs,
        };
        self.flow.enter(spec).await;
        self.push_capture_view().await;
    }

    /// Handles a settled capture step: store the clip (if any) and advance
    /// the wizard.
    async fn finish_capture(&mut self, outcome: CaptureOutcome) {
        if let CaptureOutcome::ClipReady(clip) = outcome {
            if let Some(question) = self.current_question() {
                log::info!(
                    "Stored response for '{}' ({} bytes)",
                    question.id,
                    clip.byte_len()
                );
                self.state.record_response(question.id, clip);
            }
        }

        match self.state.step {
            ApplicationStep::VideoIntro => {
                self.state.step = ApplicationStep::DocumentUpload;
                self.send_step().await;
            }
            ApplicationStep::VideoQuestions => {
                self.state.current_question += 1;
                match self.current_question() {
                    Some(question) if question.records() => {
                        self.send_step().await;
                        self.enter_current_question().await;
                    }
                    Some(_) => {
                        // The confirmation script; recording is over.
                        self.flow.teardown().await;
                        self.send_step().await;
                    }
                    None => self.begin_processing().await,
                }
            }
            step => log::warn!("Capture settled outside a video step ({step:?})"),
        }
    }

    // -- documents ---------------------------------------------------------

    async fn upload_document(&mut self, path: PathBuf, doc_type: DocumentType) {
        if self.state.step != ApplicationStep::DocumentUpload {
            log::warn!("Upload ignored outside the document step");
            return;
        }

        if let Err(e) = validate_upload(&path) {
            self.send(WizardUpdate::DocumentRejected {
                doc_type,
                message: e.to_string(),
            })
            .await;
            return;
        }

        self.send(WizardUpdate::DocumentProcessing { doc_type }).await;

        match self.documents.process(&path, doc_type).await {
            Ok(details) => {
                let record = DocumentRecord {
                    doc_type,
                    file_name: display_file_name(&path),
                    status: DocumentStatus::Verified,
                    details: Some(details),
                };
                self.state.upsert_document(record.clone());
                self.send(WizardUpdate::DocumentVerified {
                    record,
                    next: doc_type.next(),
                })
                .await;
            }
            Err(e) => {
                self.send(WizardUpdate::DocumentRejected {
                    doc_type,
                    message: e.to_string(),
                })
                .await;
            }
        }
    }

    // -- decision ----------------------------------------------------------

    async fn begin_processing(&mut self) {
        self.flow.teardown().await;
        self.state.step = ApplicationStep::Processing;
        self.send_step().await;

        let decision = match self.eligibility.check(&self.state.documents).await {
            Ok(decision) => decision,
            Err(e) => {
                // Only reachable with an unwrapped service; treat like the
                // fallback would.
                log::error!("Eligibility check failed: {e}");
                Decision {
                    status: DecisionStatus::MoreInfo,
                    message:
                        "There was an error processing your application. Please try again later."
                            .into(),
                    approved_amount: None,
                    reason: None,
                }
            }
        };

        if let Err(e) = self.persist_artifacts(&decision) {
            log::warn!("Failed to persist application artifacts: {e}");
        }

        self.state.step = match decision.status {
            DecisionStatus::Approved => ApplicationStep::Approved,
            DecisionStatus::Rejected => ApplicationStep::Rejected,
            DecisionStatus::MoreInfo => ApplicationStep::MoreInfo,
        };
        self.send(WizardUpdate::DecisionReady(decision)).await;
        self.send_step().await;
    }

    fn persist_artifacts(&self, decision: &Decision) -> anyhow::Result<()> {
        let Some(base) = &self.artifacts_dir else {
            return Ok(());
        };
        let submitted_at = Utc::now();
        let dir = base.join(submitted_at.format("%Y%m%d-%H%M%S").to_string());
        std::fs::create_dir_all(&dir)?;

        for response in &self.state.responses {
            let extension = if response.clip.mime_type.starts_with("video/webm") {
                "webm"
            } else {
                "mp4"
            };
            let path = dir.join(format!("{}.{extension}", response.question_id));
            std::fs::write(path, &response.clip.data)?;
        }

        #[derive(Serialize)]
        struct ResponseSummary<'a> {
            question_id: &'a str,
            mime_type: &'a str,
            byte_len: usize,
        }

        #[derive(Serialize)]
        struct Summary<'a> {
            customer_name: &'a str,
            submitted_at: chrono::DateTime<Utc>,
            documents: &'a [DocumentRecord],
            responses: Vec<ResponseSummary<'a>>,
            decision: &'a Decision,
        }

        let summary = Summary {
            customer_name: &self.state.customer_name,
            submitted_at,
            documents: &self.state.documents,
            responses: self
                .state
                .responses
                .iter()
                .map(|r| ResponseSummary {
                    question_id: &r.question_id,
                    mime_type: &r.clip.mime_type,
                    byte_len: r.clip.byte_len(),
                })
                .collect(),
            decision,
        };
        let json = serde_json::to_string_pretty(&summary)?;
        std::fs::write(dir.join("summary.json"), json)?;
        log::info!("Application artifacts written to {}", dir.display());
        Ok(())
    }

    // -- updates -----------------------------------------------------------

    async fn send(&self, update: WizardUpdate) {
        if self.updates.send(update).await.is_err() {
            log::warn!("UI update channel closed");
        }
    }

    async fn send_step(&self) {
        let question = match self.state.step {
            ApplicationStep::VideoIntro | ApplicationStep::VideoQuestions => {
                self.current_question()
            }
            _ => None,
        };
        self.send(WizardUpdate::StepChanged {
            step: self.state.step,
            question,
        })
        .await;
    }

    async fn push_capture_view(&self) {
        self.send(WizardUpdate::Capture {
            view: self.flow.view(),
            preview: self.flow.preview(),
        })
        .await;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureFlow;
    use crate::documents::MockDocumentService;
    use crate::eligibility::{MockEligibilityService, MoreInfoFallback};
    use crate::media::session::fake::{test_frame, FakeBackend};
    use crate::media::{MediaPacket, SessionManager};
    use crate::record::{
        Encoding, EncoderBackend, EncoderOptions, EncoderSession, RecorderController,
        RecorderError,
    };
    use std::io::Write;
    use std::time::Duration;
    use tempfile::tempdir;

    struct OneChunkSession;

    impl EncoderSession for OneChunkSession {
        fn push(&mut self, _packet: &MediaPacket) -> Result<Vec<Vec<u8>>, RecorderError> {
            Ok(vec![vec![7]])
        }

        fn finish(self: Box<Self>) -> Result<Vec<Vec<u8>>, RecorderError> {
            Ok(vec![])
        }

        fn abort(self: Box<Self>) {}
    }

    struct OneChunkBackend;

    impl EncoderBackend for OneChunkBackend {
        fn supports(&self, encoding: Encoding) -> bool {
            encoding == Encoding::Vp9Webm
        }

        fn open(
            &self,
            _encoding: Encoding,
            _options: Option<&EncoderOptions>,
            _with_audio: bool,
        ) -> Result<Box<dyn EncoderSession>, RecorderError> {
            Ok(Box::new(OneChunkSession))
        }
    }

    struct Harness {
        commands: mpsc::Sender<WizardCommand>,
        updates: mpsc::Receiver<WizardUpdate>,
    }

    fn spawn_controller() -> Harness {
        let (command_tx, command_rx) = mpsc::channel(64);
        let (update_tx, update_rx) = mpsc::channel(256);
        let (event_tx, event_rx) = mpsc::channel(256);

        let media = Arc::new(FakeBackend::with_packets(vec![test_frame()]));
        let flow = CaptureFlow::new(
            CaptureSpec::default(),
            SessionManager::new(media),
            RecorderController::new(
                Arc::new(OneChunkBackend),
                EncoderOptions {
                    bitrate_kbps: 0,
                    keyframe_interval: 0,
                },
            ),
            event_tx,
        );

        let controller = WizardController::new(
            flow,
            event_rx,
            command_rx,
            update_tx,
            Arc::new(MockDocumentService::new(Duration::ZERO)),
            Arc::new(MoreInfoFallback::new(Arc::new(
                MockEligibilityService::new(Duration::ZERO),
            ))),
            1, // one-second countdown keeps the tests quick
            None,
        );
        tokio::spawn(controller.run());

        Harness {
            commands: command_tx,
            updates: update_rx,
        }
    }

    async fn next_update(harness: &mut Harness) -> WizardUpdate {
        tokio::time::timeout(Duration::from_secs(10), harness.updates.recv())
            .await
            .expect("timed out waiting for update")
            .expect("update channel closed")
    }

    async fn wait_for_step(harness: &mut Harness, step: ApplicationStep) {
        loop {
            if let WizardUpdate::StepChanged { step: got, .. } = next_update(harness).await {
                if got == step {
                    return;
                }
            }
        }
    }

    async fn wait_for_view(
        harness: &mut Harness,
        pred: impl Fn(&CaptureView) -> bool,
    ) {
        loop {
            if let WizardUpdate::Capture { view, .. } = next_update(harness).await {
                if pred(&view) {
                    return;
                }
            }
        }
    }

    /// Records one clip through the live capture flow (real one-second
    /// countdown, fake devices and encoder) and submits it.
    async fn record_and_submit(harness: &mut Harness) {
        harness
            .commands
            .send(WizardCommand::StartCapture)
            .await
            .expect("send");
        wait_for_view(harness, |v| matches!(v, CaptureView::Recording { .. })).await;

        // Give the pump a moment to move the fake frame through the encoder
        // before stopping, so the clip is never empty.
        tokio::time::sleep(Duration::from_millis(200)).await;

        harness
            .commands
            .send(WizardCommand::StopCapture)
            .await
            .expect("send");
        wait_for_view(harness, |v| matches!(v, CaptureView::Previewing { .. })).await;

        harness
            .commands
            .send(WizardCommand::SubmitRecording)
            .await
            .expect("send");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn begin_enters_the_intro_step_with_a_live_camera() {
        let mut harness = spawn_controller();
        harness
            .commands
            .send(WizardCommand::Begin {
                customer_name: "Asha".into(),
            })
            .await
            .expect("send");

        loop {
            if let WizardUpdate::StepChanged { step, question } = next_update(&mut harness).await
            {
                assert_eq!(step, ApplicationStep::VideoIntro);
                assert_eq!(question.expect("question").id, "introduction");
                break;
            }
        }
        wait_for_view(&mut harness, |v| {
            matches!(v, CaptureView::Idle { session_ready: true })
        })
        .await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn full_application_reaches_an_approved_decision() {
        let mut harness = spawn_controller();
        let dir = tempdir().expect("tempdir");
        let doc = dir.path().join("scan.png");
        std::fs::File::create(&doc)
            .and_then(|mut f| f.write_all(&[0u8; 64]))
            .expect("write doc");

        harness
            .commands
            .send(WizardCommand::Begin {
                customer_name: "Asha".into(),
            })
            .await
            .expect("send");

        // Intro recording.
        record_and_submit(&mut harness).await;
        wait_for_step(&mut harness, ApplicationStep::DocumentUpload).await;

        // All three documents.
        for doc_type in DocumentType::ALL {
            harness
                .commands
                .send(WizardCommand::UploadDocument {
                    path: doc.clone(),
                    doc_type,
                })
                .await
                .expect("send");
            loop {
                match next_update(&mut harness).await {
                    WizardUpdate::DocumentVerified { record, .. } => {
                        assert_eq!(record.doc_type, doc_type);
                        break;
                    }
                    WizardUpdate::DocumentRejected { message, .. } => {
                        panic!("document rejected: {message}");
                    }
                    _ => {}
                }
            }
        }

        harness
            .commands
            .send(WizardCommand::ContinueToQuestions)
            .await
            .expect("send");
        wait_for_step(&mut harness, ApplicationStep::VideoQuestions).await;

        // Four recorded interview questions.
        for _ in 0..4 {
            record_and_submit(&mut harness).await;
        }

        // Confirmation script, then processing.
        harness
            .commands
            .send(WizardCommand::ContinueToProcessing)
            .await
            .expect("send");
        wait_for_step(&mut harness, ApplicationStep::Processing).await;

        // Mock income proof reads 75,000: high band, fifteen-fold amount.
        loop {
            if let WizardUpdate::DecisionReady(decision) = next_update(&mut harness).await {
                assert_eq!(decision.status, DecisionStatus::Approved);
                assert_eq!(decision.approved_amount, Some(1_125_000));
                break;
            }
        }
        wait_for_step(&mut harness, ApplicationStep::Approved).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn continue_is_ignored_until_documents_are_complete() {
        let mut harness = spawn_controller();
        harness
            .commands
            .send(WizardCommand::Begin {
                customer_name: "Asha".into(),
            })
            .await
            .expect("send");
        record_and_submit(&mut harness).await;
        wait_for_step(&mut harness, ApplicationStep::DocumentUpload).await;

        harness
            .commands
            .send(WizardCommand::ContinueToQuestions)
            .await
            .expect("send");
        // Reset still answers from DocumentUpload: the continue was ignored.
        harness
            .commands
            .send(WizardCommand::Reset)
            .await
            .expect("send");
        wait_for_step(&mut harness, ApplicationStep::Initial).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn invalid_upload_is_rejected_with_the_validation_message() {
        let mut harness = spawn_controller();
        let dir = tempdir().expect("tempdir");
        let doc = dir.path().join("notes.txt");
        std::fs::write(&doc, b"not an image").expect("write");

        harness
            .commands
            .send(WizardCommand::Begin {
                customer_name: "Asha".into(),
            })
            .await
            .expect("send");
        record_and_submit(&mut harness).await;
        wait_for_step(&mut harness, ApplicationStep::DocumentUpload).await;

        harness
            .commands
            .send(WizardCommand::UploadDocument {
                path: doc,
                doc_type: DocumentType::Aadhaar,
            })
            .await
            .expect("send");

        loop {
            if let WizardUpdate::DocumentRejected { message, .. } =
                next_update(&mut harness).await
            {
                assert!(message.contains("Invalid file type"));
                break;
            }
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn assistant_replies_inline() {
        let mut harness = spawn_controller();
        harness
            .commands
            .send(WizardCommand::AskAssistant {
                query: "what about prepayment?".into(),
            })
            .await
            .expect("send");

        loop {
            if let WizardUpdate::AssistantReplied { response, .. } =
                next_update(&mut harness).await
            {
                assert!(response.contains("prepayment charge"));
                break;
            }
        }
    }
}
