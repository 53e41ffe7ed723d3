//! Upload orchestrator.
//!
//! One instance serves one signing flow. A fixed-interval poll loop drives
//! [`UploadOrchestrator::tick`]; each tick evaluates the placement gate, takes
//! the earliest queued document and runs its whole network chain. A tick that
//! finds an upload in progress does nothing, so at most one document is ever
//! submitted at a time.
//!
//! State is only locked around mutations, never across a network call.
//! Cancelling while a request is pending puts the document back into the queue
//! right away; the response is discarded when it eventually arrives.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, MappedMutexGuard, Mutex, MutexGuard};
use tokio::time::sleep;

use pdfsign_core::models::{
    ErrorFile, FailureStage, PlacementMode, QueueKey, SignedDocument, SignedFile,
    SigningChallenge, SigningRequest, SourceFile, UploadResult, UserText,
};
use pdfsign_core::{
    AuthReceiver, ErrorMetadata, FlowKind, LogLevel, PdfSignError, SigningBackend,
    SigningConfig,
};
use pdfsign_processing::{
    inject, needs_placement, pdf, to_wire_placement, AnnotationActor, PageRect, PdfValidator,
    ProcessingError,
};

use crate::bridge::{BridgeMessage, BridgeOutcome, ExternalAuthBridge};
use crate::notifier::{Notification, Notifier};
use crate::store::{QueueStore, QueuedDocument};
use crate::strategy::{SigningStrategy, SubmissionOutcome};

/// Target of the per-document audit event.
pub const AUDIT_TARGET: &str = "pdfsign::audit";

/// Result of one orchestrator step, returned by [`UploadOrchestrator::tick`]
/// and by bridge message handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Processing is not enabled.
    Disabled,
    /// Another upload chain is still running.
    Busy,
    /// The placement gate stopped processing for the listed files.
    Blocked(Vec<String>),
    /// Nothing left to process.
    Empty,
    Signed(String),
    Failed(String),
    /// The qualified flow is waiting for the second factor at this URL.
    ChallengeOpened(String),
    /// The chain was cancelled while a request was pending; its response was dropped.
    Discarded,
    /// A bridge message was not acted upon.
    Ignored(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InFlightStage {
    Submitting,
    AwaitingChallenge,
    FetchingArtifact,
}

impl InFlightStage {
    fn failure_stage(self) -> FailureStage {
        match self {
            InFlightStage::Submitting => FailureStage::Submission,
            InFlightStage::AwaitingChallenge => FailureStage::Challenge,
            InFlightStage::FetchingArtifact => FailureStage::ArtifactFetch,
        }
    }
}

/// The document currently owned by the upload chain, as it was dequeued.
#[derive(Debug)]
struct InFlight {
    generation: u64,
    document: QueuedDocument,
    stage: InFlightStage,
}

#[derive(Debug)]
struct OrchestratorState {
    store: QueueStore,
    processing_enabled: bool,
    processing_active: bool,
    upload_in_progress: bool,
    in_flight: Option<InFlight>,
    generation: u64,
    bridge: ExternalAuthBridge,
    signed: Vec<SignedFile>,
    errors: Vec<ErrorFile>,
    next_result_id: u64,
}

impl OrchestratorState {
    fn next_id(&mut self) -> u64 {
        self.next_result_id += 1;
        self.next_result_id
    }

    fn record_failure(
        &mut self,
        file: SourceFile,
        stage: FailureStage,
        status: u16,
        description: String,
    ) {
        let id = self.next_id();
        self.errors.push(ErrorFile {
            id,
            file,
            stage,
            status,
            description,
            failed_at: Utc::now(),
        });
    }

    fn enqueue_detected(&mut self, file: SourceFile) -> QueueKey {
        let needs = needs_placement(&file.bytes);
        let key = self.store.enqueue(file);
        self.store.set_needs_placement(key, needs);
        key
    }

    fn finish_chain(&mut self) {
        self.in_flight = None;
        self.upload_in_progress = false;
    }
}

/// Point-in-time view of the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorStatus {
    pub flow: FlowKind,
    pub queued: usize,
    pub needs_placement: usize,
    pub signed: usize,
    pub failed: usize,
    pub processing_enabled: bool,
    pub processing_active: bool,
    pub upload_in_progress: bool,
    pub block_visible: bool,
    pub in_flight: Option<String>,
    pub challenge_url: Option<String>,
}

pub struct UploadOrchestrator {
    config: SigningConfig,
    backend: Arc<dyn SigningBackend>,
    strategy: Arc<dyn SigningStrategy>,
    notifier: Arc<dyn Notifier>,
    auth: AuthReceiver,
    validator: PdfValidator,
    state: Mutex<OrchestratorState>,
}

impl UploadOrchestrator {
    pub fn new(
        config: SigningConfig,
        backend: Arc<dyn SigningBackend>,
        strategy: Arc<dyn SigningStrategy>,
        notifier: Arc<dyn Notifier>,
        auth: AuthReceiver,
    ) -> Self {
        let validator = PdfValidator::new(config.max_file_size_bytes);
        let state = OrchestratorState {
            store: QueueStore::new(),
            processing_enabled: false,
            processing_active: false,
            upload_in_progress: false,
            in_flight: None,
            generation: 0,
            bridge: ExternalAuthBridge::new(config.lang),
            signed: Vec::new(),
            errors: Vec::new(),
            next_result_id: 0,
        };

        Self {
            config,
            backend,
            strategy,
            notifier,
            auth,
            validator,
            state: Mutex::new(state),
        }
    }

    pub fn config(&self) -> &SigningConfig {
        &self.config
    }

    pub fn flow(&self) -> FlowKind {
        self.strategy.flow()
    }

    /// Validate a picked file, queue it and run the signature detector on it.
    pub async fn add_file(&self, file: SourceFile) -> Result<QueueKey, PdfSignError> {
        self.validator
            .validate(&file)
            .map_err(ProcessingError::from)?;

        let name = file.name.clone();
        let mut state = self.state.lock().await;
        let key = state.enqueue_detected(file);
        tracing::info!(
            key = %key,
            file_name = %name,
            needs_placement = state.store.needs_placement(key),
            "Document queued"
        );
        Ok(key)
    }

    /// Direct access to the queue for placement and annotation edits.
    pub async fn queue(&self) -> MappedMutexGuard<'_, QueueStore> {
        MutexGuard::map(self.state.lock().await, |state| &mut state.store)
    }

    /// Names of the files the placement gate currently rejects.
    pub async fn placement_blockers(&self) -> Vec<String> {
        let state = self.state.lock().await;
        state
            .store
            .placement_blockers()
            .into_iter()
            .map(|(_, file)| file.name.clone())
            .collect()
    }

    /// Enable processing. The next tick evaluates the placement gate.
    pub async fn start(&self) -> Result<(), PdfSignError> {
        if !self.auth.borrow().is_authenticated() {
            return Err(PdfSignError::InvalidInput(
                "Signing requires an authenticated session".to_string(),
            ));
        }

        let mut state = self.state.lock().await;
        state.processing_enabled = true;
        tracing::info!(flow = %self.flow(), queued = state.store.len(), "Processing started");
        Ok(())
    }

    /// Stop processing and put any in-flight document back at its original position.
    ///
    /// Returns the key the document was restored under.
    pub async fn cancel(&self) -> Option<QueueKey> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        state.processing_enabled = false;
        state.processing_active = false;

        let restored = match state.in_flight.take() {
            Some(in_flight) => {
                if in_flight.stage == InFlightStage::AwaitingChallenge {
                    // No request is pending, so the chain ends here.
                    state.bridge.reset();
                    state.upload_in_progress = false;
                }
                let name = in_flight.document.file.name.clone();
                let key = state.store.restore(in_flight.document);
                Some((key, name))
            }
            None => None,
        };
        drop(guard);

        tracing::info!(
            requeued = ?restored.as_ref().map(|(_, name)| name),
            "Processing cancelled"
        );
        self.notifier.notify(Notification::Cancelled {
            requeued: restored.as_ref().map(|(_, name)| name.clone()),
        });
        restored.map(|(key, _)| key)
    }

    /// Run one poll step.
    #[tracing::instrument(skip(self), fields(flow = %self.flow()))]
    pub async fn tick(&self) -> StepOutcome {
        let (generation, document) = {
            let mut state = self.state.lock().await;
            if !state.processing_enabled {
                return StepOutcome::Disabled;
            }
            if state.upload_in_progress {
                return StepOutcome::Busy;
            }

            let blockers: Vec<String> = state
                .store
                .placement_blockers()
                .into_iter()
                .map(|(_, file)| file.name.clone())
                .collect();
            if !blockers.is_empty() {
                state.processing_enabled = false;
                state.processing_active = false;
                drop(state);
                log_error(
                    &PdfSignError::PlacementRequired(blockers.clone()),
                    "Placement gate closed",
                );
                self.notifier.notify(Notification::PlacementRequired {
                    files: blockers.clone(),
                });
                return StepOutcome::Blocked(blockers);
            }

            let Some(document) = state.store.first_key().and_then(|k| state.store.dequeue(k))
            else {
                state.processing_active = false;
                return StepOutcome::Empty;
            };

            state.processing_active = true;
            state.upload_in_progress = true;
            state.generation += 1;
            let generation = state.generation;
            state.in_flight = Some(InFlight {
                generation,
                document: document.clone(),
                stage: InFlightStage::Submitting,
            });
            (generation, document)
        };

        tracing::debug!(
            key = %document.key,
            file_name = %document.file.name,
            mode = %document.placement_mode,
            "Processing document"
        );

        let request = match self.prepare(&document) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(
                    file_name = %document.file.name,
                    error = %e.detailed_message(),
                    "Document preparation failed"
                );
                return self.complete(generation, Err(e)).await;
            }
        };

        let token = self.token();
        let result = match self.backend.submit(request, &token).await {
            Ok(result) => result,
            Err(e) => self.transport_failure(&document.file, e),
        };

        let outcome = self.strategy.classify_submission(&result);
        self.complete(generation, Ok(outcome)).await
    }

    /// Build the request for a dequeued document: wire placement for manual
    /// mode, embedded annotations and their `user_text` copy.
    fn prepare(&self, document: &QueuedDocument) -> Result<SigningRequest, PdfSignError> {
        if !document.placement_ready() {
            return Err(PdfSignError::InvalidPlacement(
                "Document needs a manual placement".to_string(),
            ));
        }

        let placement = match (document.placement_mode, &document.placement) {
            (PlacementMode::Manual, Some(data)) => {
                let (_, page_height) = pdf::page_size(&document.file.bytes, data.page)?;
                let rect = PageRect::from_placement(data, page_height)?;
                Some(to_wire_placement(&rect, self.config.stroke_width))
            }
            _ => None,
        };

        let (file, user_text) = if document.annotations_enabled {
            let actor = AnnotationActor::new(
                self.auth.borrow().full_name.clone(),
                self.config.hostname.clone(),
            );
            let file = inject(&document.file, &document.annotation_rows, &actor)?;
            let user_text = document
                .annotation_rows
                .iter()
                .filter(|row| row.is_complete())
                .filter_map(|row| {
                    row.kind().map(|kind| UserText {
                        description: kind.name.get(self.config.lang).to_string(),
                        value: row.effective_value(),
                    })
                })
                .collect();
            (file, user_text)
        } else {
            (document.file.clone(), Vec::new())
        };

        Ok(SigningRequest {
            file,
            placement,
            profile: self.strategy.profile().to_string(),
            user_text,
        })
    }

    fn token(&self) -> String {
        self.auth.borrow().token.clone()
    }

    fn transport_failure(&self, file: &SourceFile, err: PdfSignError) -> UploadResult {
        tracing::warn!(
            file_name = %file.name,
            error = %err,
            error_code = err.error_code(),
            "Request failed without a response"
        );
        UploadResult::transport_failure(file.clone(), err.client_message())
    }

    /// Apply a classified outcome to the chain identified by `generation`.
    /// `Err` is a document that could not be prepared for submission.
    async fn complete(
        &self,
        generation: u64,
        outcome: Result<SubmissionOutcome, PdfSignError>,
    ) -> StepOutcome {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let in_flight = match state.in_flight.take() {
            Some(in_flight) if in_flight.generation == generation => in_flight,
            other => {
                if other.is_none() {
                    state.upload_in_progress = false;
                }
                state.in_flight = other;
                tracing::warn!(generation, "Discarding response of a cancelled upload");
                return StepOutcome::Discarded;
            }
        };
        let file_name = in_flight.document.file.name.clone();

        let (stage, status, error) = match outcome {
            Err(e) => (FailureStage::Preparation, 0, e),
            Ok(SubmissionOutcome::Signed { document, status }) => match signed_file(&document) {
                Ok(file) => {
                    let id = state.next_id();
                    state.signed.push(SignedFile {
                        id,
                        file,
                        source_name: file_name.clone(),
                        identifier: document.identifier,
                        status,
                        signed_at: Utc::now(),
                    });
                    state.finish_chain();
                    drop(guard);

                    tracing::info!(file_name = %file_name, status, "Document signed");
                    self.audit(&file_name, "signed", status, "");
                    self.notifier.notify(Notification::Signed {
                        file_name: file_name.clone(),
                    });
                    return StepOutcome::Signed(file_name);
                }
                Err(e) => (in_flight.stage.failure_stage(), status, e),
            },
            Ok(SubmissionOutcome::Challenge(challenge)) => {
                let url = challenge.url.clone();
                match state.bridge.open(challenge) {
                    Ok(()) => {
                        state.in_flight = Some(InFlight {
                            stage: InFlightStage::AwaitingChallenge,
                            ..in_flight
                        });
                        drop(guard);

                        self.notifier.notify(Notification::ChallengeOpened {
                            file_name,
                            url: url.clone(),
                        });
                        return StepOutcome::ChallengeOpened(url);
                    }
                    Err(e) => (FailureStage::Challenge, 0, e),
                }
            }
            Ok(SubmissionOutcome::Failed {
                stage,
                status,
                description,
            }) => (stage, status, PdfSignError::from_failure(stage, status, description)),
        };

        let description = error.client_message();
        state.record_failure(in_flight.document.file, stage, status, description.clone());
        state.finish_chain();
        drop(guard);
        self.failed(&file_name, stage, status, &error, description)
    }

    fn failed(
        &self,
        file_name: &str,
        stage: FailureStage,
        status: u16,
        error: &PdfSignError,
        description: String,
    ) -> StepOutcome {
        let span = tracing::info_span!(
            "document_failed",
            file_name = %file_name,
            stage = %stage,
            status,
            error_code = error.error_code()
        );
        span.in_scope(|| log_error(error, "Document signing failed"));
        self.audit(file_name, "failed", status, &description);
        self.notifier.notify(Notification::Failed {
            file_name: file_name.to_string(),
            description,
        });
        StepOutcome::Failed(file_name.to_string())
    }

    fn audit(&self, file_name: &str, outcome: &str, status: u16, description: &str) {
        tracing::info!(
            target: AUDIT_TARGET,
            flow = %self.flow(),
            file_name = %file_name,
            outcome = %outcome,
            status,
            description = %description,
            "Signing result"
        );
    }

    /// Feed a message posted by the embedded challenge page.
    #[tracing::instrument(skip(self, message), fields(flow = %self.flow()))]
    pub async fn handle_bridge_message(&self, message: BridgeMessage) -> StepOutcome {
        let (generation, file, session_id) = {
            let mut guard = self.state.lock().await;
            let state = &mut *guard;

            match state.bridge.accept(message) {
                BridgeOutcome::Ignored(reason) => {
                    tracing::debug!(reason, "Bridge message ignored");
                    return StepOutcome::Ignored(reason);
                }
                BridgeOutcome::Failed(description) => {
                    let Some(in_flight) = state.in_flight.take() else {
                        return StepOutcome::Ignored("no document is awaiting a challenge");
                    };
                    let file_name = in_flight.document.file.name.clone();
                    let error = PdfSignError::Challenge(description);
                    let description = error.client_message();
                    state.record_failure(
                        in_flight.document.file,
                        FailureStage::Challenge,
                        0,
                        description.clone(),
                    );
                    state.finish_chain();
                    drop(guard);
                    return self.failed(&file_name, FailureStage::Challenge, 0, &error, description);
                }
                BridgeOutcome::Completed(session_id) => {
                    let Some(in_flight) = state.in_flight.as_mut() else {
                        return StepOutcome::Ignored("no document is awaiting a challenge");
                    };
                    in_flight.stage = InFlightStage::FetchingArtifact;
                    (
                        in_flight.generation,
                        in_flight.document.file.clone(),
                        session_id,
                    )
                }
            }
        };

        tracing::debug!(file_name = %file.name, "Second factor confirmed, fetching signed document");

        let token = self.token();
        let result = match self.backend.fetch_artifact(&session_id, &file, &token).await {
            Ok(result) => result,
            Err(e) => self.transport_failure(&file, e),
        };

        let outcome = self.strategy.classify_artifact(&result);
        self.complete(generation, Ok(outcome)).await
    }

    /// Parse and feed a raw bridge message.
    pub async fn handle_bridge_json(&self, raw: &str) -> Result<StepOutcome, PdfSignError> {
        let message = BridgeMessage::parse(raw)?;
        Ok(self.handle_bridge_message(message).await)
    }

    pub async fn challenge(&self) -> Option<SigningChallenge> {
        self.state.lock().await.bridge.challenge().cloned()
    }

    pub async fn signed_files(&self) -> Vec<SignedFile> {
        self.state.lock().await.signed.clone()
    }

    pub async fn error_files(&self) -> Vec<ErrorFile> {
        self.state.lock().await.errors.clone()
    }

    pub async fn clear_signed(&self) -> usize {
        let mut state = self.state.lock().await;
        std::mem::take(&mut state.signed).len()
    }

    pub async fn clear_errors(&self) -> usize {
        let mut state = self.state.lock().await;
        std::mem::take(&mut state.errors).len()
    }

    /// Put a failed document back into the queue under a new key.
    pub async fn requeue_error(&self, id: u64) -> Option<QueueKey> {
        let mut state = self.state.lock().await;
        let index = state.errors.iter().position(|e| e.id == id)?;
        let error = state.errors.remove(index);
        let key = state.enqueue_detected(error.file);
        tracing::info!(error_id = id, key = %key, "Failed document re-queued");
        Some(key)
    }

    pub async fn requeue_all_errors(&self) -> Vec<QueueKey> {
        let mut state = self.state.lock().await;
        let errors = std::mem::take(&mut state.errors);
        let keys: Vec<QueueKey> = errors
            .into_iter()
            .map(|error| state.enqueue_detected(error.file))
            .collect();
        tracing::info!(count = keys.len(), "Failed documents re-queued");
        keys
    }

    pub async fn remove(&self, key: QueueKey) -> bool {
        self.state.lock().await.store.remove(key)
    }

    /// Empty the queue. The in-flight document is not affected.
    pub async fn clear(&self) -> usize {
        self.state.lock().await.store.clear(None).len()
    }

    pub async fn status(&self) -> OrchestratorStatus {
        let state = self.state.lock().await;
        OrchestratorStatus {
            flow: self.flow(),
            queued: state.store.len(),
            needs_placement: state.store.needs_placement_count(),
            signed: state.signed.len(),
            failed: state.errors.len(),
            processing_enabled: state.processing_enabled,
            processing_active: state.processing_active,
            upload_in_progress: state.upload_in_progress,
            block_visible: state.store.block_visible(),
            in_flight: state
                .in_flight
                .as_ref()
                .map(|f| f.document.file.name.clone()),
            challenge_url: state.bridge.challenge().map(|c| c.url.clone()),
        }
    }

    /// No chain is running and nothing more will be dequeued.
    pub async fn is_idle(&self) -> bool {
        let state = self.state.lock().await;
        !state.upload_in_progress && (state.store.is_empty() || !state.processing_enabled)
    }

    /// Poll loop. Each interval spawns a tick; ticks that find an upload in
    /// progress return immediately.
    pub async fn run(self: Arc<Self>, mut shutdown_rx: mpsc::Receiver<()>) {
        let poll_interval = self.config.poll_interval();
        tracing::info!(
            flow = %self.flow(),
            poll_interval_ms = self.config.poll_interval_ms,
            "Upload orchestrator started"
        );

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Upload orchestrator shutting down");
                    break;
                }
                _ = sleep(poll_interval) => {
                    let orchestrator = Arc::clone(&self);
                    tokio::spawn(async move {
                        let outcome = orchestrator.tick().await;
                        tracing::trace!(outcome = ?outcome, "Tick finished");
                    });
                }
            }
        }

        tracing::info!("Upload orchestrator stopped");
    }

    /// Spawn [`run`](Self::run) and return a handle that stops it.
    pub fn spawn(self: &Arc<Self>) -> OrchestratorHandle {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        tokio::spawn(Arc::clone(self).run(shutdown_rx));
        OrchestratorHandle { shutdown_tx }
    }
}

/// Log an error at the level its metadata asks for.
fn log_error(error: &PdfSignError, message: &str) {
    let error_code = error.error_code();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_code, "{}", message);
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_code, "{}", message);
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_code, "{}", message);
        }
    }
}

fn signed_file(document: &SignedDocument) -> Result<SourceFile, PdfSignError> {
    let bytes = document.decode_content()?;
    Ok(SourceFile::new(
        document.name.clone(),
        document.content_mime(),
        bytes,
    ))
}

/// Stops a spawned poll loop. In-flight requests run to completion.
#[derive(Debug, Clone)]
pub struct OrchestratorHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl OrchestratorHandle {
    pub async fn shutdown(&self) {
        tracing::info!("Initiating orchestrator shutdown");
        let _ = self.shutdown_tx.send(()).await;
    }
}
