//! Wizard controller: the eight-stage state machine.
//!
//! The controller owns the in-progress [`StagePayloads`], writes every edit
//! through to the draft store, gates forward moves on validation and drives
//! stage submissions. A submission is split in two halves so the network
//! call can run off the UI thread: [`Wizard::begin_next`] validates and hands
//! out a ticketed snapshot, [`Wizard::finish_next`] applies the outcome.

use super::notify::{Notice, Notifier};
use super::submitter::{CommittedMedia, StageSubmitter, SubmissionReceipt, SubmissionRequest};
use crate::domain::{
    merge_record, validate_stage, ApplicationId, Attachment, AttachmentSlot, Draft, DraftKey, DraftStoreError, FieldPath,
    FileHandle, Stage, StagePayloads, SubmitError, SubmitResult, Violation,
};
use crate::infrastructure::{DraftRepository, Preview, PreviewRegistry, StageBackend};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Sub-state of the current step.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StepState {
    #[default]
    Idle,
    /// A submission for the current step is in flight.
    Busy,
    Error(String),
}

#[derive(Debug, Error)]
pub enum WizardError {
    #[error("a stage submission is already in progress")]
    Busy,
    #[error("{stage} has {} problem(s) to fix", .violations.len())]
    Validation { stage: Stage, violations: Vec<Violation> },
    #[error(transparent)]
    Submit(#[from] SubmitError),
    #[error("stage {requested} is not available yet; complete the stages up to {limit} first")]
    StepLocked { requested: u8, limit: u8 },
    #[error("the wizard has been closed")]
    Inactive,
    #[error("submission result does not match the request in flight")]
    StaleCompletion,
    #[error("{stage} has no row {row}")]
    NoSuchRow { stage: Stage, row: usize },
    #[error("unknown field {0}")]
    NoSuchField(String),
    #[error(transparent)]
    Draft(#[from] DraftStoreError),
}

/// How the wizard was entered: optionally a deep-linked application and a
/// requested step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryRoute {
    pub application_id: Option<ApplicationId>,
    pub target_step: Option<u8>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WizardOptions {
    /// Honor a deep-linked step even past the first incomplete stage.
    pub deep_link_override: bool,
}

/// Shared flag that goes down when the wizard tears down. Completion
/// handlers check it before touching the wizard.
#[derive(Debug, Clone)]
pub struct Liveness(Arc<AtomicBool>);

impl Liveness {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    pub fn is_live(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn shut_down(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

/// Result of a successful `next`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Advanced { from: Stage, to: Stage },
    Finalized { application_id: ApplicationId },
}

#[derive(Debug, Clone, Copy)]
struct InFlight {
    ticket: u64,
    stage: Stage,
}

/// The admission wizard.
pub struct Wizard {
    /// Step currently shown
    step: Stage,
    /// Idle, busy or error sub-state of `step`
    state: StepState,
    /// Server identity, absent until stage 1 commits
    application_id: Option<ApplicationId>,
    /// Highest stage the server has accepted, 0 when none
    completion_step: u8,
    /// Local mirror of every editable stage
    payloads: StagePayloads,
    /// Violations from the last gated `next`
    violations: Vec<Violation>,
    drafts: Box<dyn DraftRepository>,
    notifier: Box<dyn Notifier>,
    previews: PreviewRegistry,
    liveness: Liveness,
    in_flight: Option<InFlight>,
    last_ticket: u64,
}

impl Wizard {
    /// Opens the wizard for `entry`.
    ///
    /// Without an explicit id the last active draft is resumed. An
    /// identified draft is refreshed from the server with the fill-only-empty
    /// merge; an unknown id falls back to the anonymous draft.
    pub fn open(
        entry: EntryRoute,
        drafts: Box<dyn DraftRepository>,
        backend: &dyn StageBackend,
        notifier: Box<dyn Notifier>,
        options: WizardOptions,
    ) -> Result<Self, WizardError> {
        let key = match entry.application_id.clone() {
            Some(id) => DraftKey::Existing(id),
            None => drafts.last_active()?.unwrap_or(DraftKey::New),
        };
        let mut draft = drafts.load(&key)?;
        let mut application_id = match &key {
            DraftKey::Existing(id) => Some(id.clone()),
            DraftKey::New => None,
        };
        let mut completion_step = draft.as_ref().map_or(0, |d| d.completion_step);
        let mut payloads = draft.as_ref().map(|d| d.payloads.clone()).unwrap_or_default();

        if let Some(id) = application_id.clone() {
            match backend.fetch_application(&id) {
                Ok(record) => {
                    let media = |path: &str| backend.media_url(path);
                    let report = merge_record(&mut payloads, &record, &media);
                    completion_step = completion_step.max(record.completion_step.min(8));
                    tracing::info!(
                        application_id = %id,
                        fields_filled = report.fields_filled.len(),
                        lists_replaced = ?report.lists_replaced,
                        attachments_linked = report.attachments_linked,
                        "prefilled from server record"
                    );
                }
                Err(SubmitError::NotFound(_)) => {
                    tracing::warn!(application_id = %id, "application not found, starting a new draft");
                    notifier.notify(Notice::warning(format!(
                        "Application {id} was not found; starting a new application"
                    )));
                    draft = drafts.load(&DraftKey::New)?;
                    application_id = None;
                    completion_step = draft.as_ref().map_or(0, |d| d.completion_step);
                    payloads = draft.as_ref().map(|d| d.payloads.clone()).unwrap_or_default();
                }
                Err(err) => {
                    tracing::warn!(application_id = %id, error = %err, "could not refresh application");
                    notifier.notify(Notice::warning(format!(
                        "Could not refresh application {id} from the server: {err}"
                    )));
                }
            }
        }

        let requested = entry
            .target_step
            .map(Stage::clamped)
            .or(draft.as_ref().map(|d| d.step))
            .unwrap_or(Stage::Personal);
        let limit = reachable_limit(completion_step);
        let step = if options.deep_link_override || requested <= limit {
            requested
        } else {
            tracing::info!(requested = requested.number(), limit = limit.number(), "clamped entry step");
            limit
        };

        let wizard = Self {
            step,
            state: StepState::Idle,
            application_id,
            completion_step,
            payloads,
            violations: Vec::new(),
            drafts,
            notifier,
            previews: PreviewRegistry::new(),
            liveness: Liveness::new(),
            in_flight: None,
            last_ticket: 0,
        };
        tracing::info!(
            key = %wizard.draft_key(),
            step = step.number(),
            completion_step,
            "wizard opened"
        );
        wizard.persist();
        Ok(wizard)
    }

    pub fn step(&self) -> Stage {
        self.step
    }

    pub fn state(&self) -> &StepState {
        &self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state == StepState::Busy
    }

    pub fn application_id(&self) -> Option<&ApplicationId> {
        self.application_id.as_ref()
    }

    pub fn completion_step(&self) -> u8 {
        self.completion_step
    }

    pub fn payloads(&self) -> &StagePayloads {
        &self.payloads
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn is_live(&self) -> bool {
        self.liveness.is_live()
    }

    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    /// Furthest step the user may navigate to.
    pub fn max_reachable(&self) -> Stage {
        reachable_limit(self.completion_step)
    }

    pub fn draft_key(&self) -> DraftKey {
        DraftKey::for_application(self.application_id.as_ref())
    }

    pub fn review_summary(&self) -> Vec<(Stage, Vec<String>)> {
        self.payloads.summary()
    }

    pub fn preview(&self, slot: AttachmentSlot) -> Option<&Preview> {
        let preview = self.payloads.attachment(slot)?.preview()?;
        self.previews.get(preview)
    }

    pub fn outstanding_previews(&self) -> usize {
        self.previews.outstanding()
    }

    /// Forwards a host-originated notice, e.g. a bad attachment path.
    pub fn notify(&self, notice: Notice) {
        self.notifier.notify(notice);
    }

    fn ensure_live(&self) -> Result<(), WizardError> {
        if self.is_live() { Ok(()) } else { Err(WizardError::Inactive) }
    }

    fn ensure_idle(&self) -> Result<(), WizardError> {
        self.ensure_live()?;
        if self.is_busy() { Err(WizardError::Busy) } else { Ok(()) }
    }

    /// Write-through save of the whole wizard state. A failing store is
    /// reported and never interrupts the caller.
    fn persist(&self) {
        if !self.is_live() {
            return;
        }
        let key = self.draft_key();
        let draft = Draft::new(
            self.step,
            self.application_id.clone(),
            self.completion_step,
            self.payloads.clone(),
        );
        let saved = self
            .drafts
            .save(&key, &draft)
            .and_then(|()| self.drafts.set_last_active(&key));
        if let Err(err) = saved {
            tracing::warn!(key = %key, error = %err, "draft write failed");
            self.notifier
                .notify(Notice::warning(format!("Your progress could not be saved locally: {err}")));
        }
    }

    /// Applies an arbitrary edit to the payloads and saves the draft. Edits
    /// are allowed while a submission is in flight.
    pub fn edit<T>(&mut self, f: impl FnOnce(&mut StagePayloads) -> T) -> Result<T, WizardError> {
        self.ensure_live()?;
        let result = f(&mut self.payloads);
        self.persist();
        Ok(result)
    }

    pub fn set_field(&mut self, path: &FieldPath, value: impl Into<String>) -> Result<(), WizardError> {
        self.ensure_live()?;
        let slot = self
            .payloads
            .field_mut(path)
            .ok_or_else(|| WizardError::NoSuchField(path.to_string()))?;
        *slot = value.into();
        self.persist();
        Ok(())
    }

    pub fn add_row(&mut self, stage: Stage) -> Result<usize, WizardError> {
        self.ensure_live()?;
        let row = self.payloads.add_row(stage).ok_or(WizardError::NoSuchRow { stage, row: 0 })?;
        self.persist();
        Ok(row)
    }

    /// Removes a row and releases the previews of the attachments it owned.
    pub fn remove_row(&mut self, stage: Stage, row: usize) -> Result<(), WizardError> {
        self.ensure_live()?;
        let removed = self
            .payloads
            .remove_row(stage, row)
            .ok_or(WizardError::NoSuchRow { stage, row })?;
        for preview in removed.iter().filter_map(|a| a.preview()) {
            self.previews.release(preview);
        }
        self.persist();
        Ok(())
    }

    /// Puts a local file into `slot`, replacing and releasing whatever the
    /// slot held.
    pub fn attach(&mut self, slot: AttachmentSlot, handle: FileHandle) -> Result<(), WizardError> {
        self.ensure_live()?;
        let cell = self.payloads.attachment_slot_mut(slot).ok_or(WizardError::NoSuchRow {
            stage: slot.stage(),
            row: match slot {
                AttachmentSlot::Certificate(row) => row,
                _ => 0,
            },
        })?;
        let preview = self.previews.acquire(&handle, &handle.file_name());
        let previous = cell.replace(Attachment::pending(handle, Some(preview)));
        if let Some(old) = previous.and_then(|a| a.preview()) {
            self.previews.release(old);
        }
        tracing::debug!(slot = %slot, "attachment selected");
        self.persist();
        Ok(())
    }

    pub fn detach(&mut self, slot: AttachmentSlot) -> Result<(), WizardError> {
        self.ensure_live()?;
        let Some(cell) = self.payloads.attachment_slot_mut(slot) else {
            return Ok(());
        };
        if let Some(old) = cell.take().and_then(|a| a.preview()) {
            self.previews.release(old);
        }
        self.persist();
        Ok(())
    }

    /// First half of `next`: validates the current step and, on success,
    /// marks it busy and returns the snapshot to submit.
    pub fn begin_next(&mut self) -> Result<SubmissionRequest, WizardError> {
        self.ensure_idle()?;
        let stage = self.step;
        if stage.is_gated() {
            let violations = validate_stage(stage, &self.payloads);
            if !violations.is_empty() {
                tracing::debug!(stage = stage.number(), count = violations.len(), "stage failed validation");
                self.state = StepState::Error(format!("{} field(s) need attention", violations.len()));
                self.violations = violations.clone();
                return Err(WizardError::Validation { stage, violations });
            }
        }
        self.violations.clear();
        self.state = StepState::Busy;
        self.last_ticket += 1;
        self.in_flight = Some(InFlight {
            ticket: self.last_ticket,
            stage,
        });
        tracing::info!(stage = stage.number(), ticket = self.last_ticket, "stage submission started");
        Ok(SubmissionRequest {
            ticket: self.last_ticket,
            stage,
            application_id: self.application_id.clone(),
            payloads: self.payloads.clone(),
        })
    }

    /// Second half of `next`: applies the outcome of the submission issued
    /// under `ticket`. Completions arriving after teardown or for another
    /// ticket change nothing.
    pub fn finish_next(
        &mut self,
        ticket: u64,
        result: SubmitResult<SubmissionReceipt>,
    ) -> Result<Transition, WizardError> {
        self.ensure_live()?;
        let in_flight = match self.in_flight {
            Some(in_flight) if in_flight.ticket == ticket => in_flight,
            _ => {
                tracing::debug!(ticket, "ignoring stale submission result");
                return Err(WizardError::StaleCompletion);
            }
        };
        self.in_flight = None;
        let stage = in_flight.stage;

        let receipt = match result {
            Ok(receipt) => receipt,
            Err(err) => {
                tracing::warn!(stage = stage.number(), error = %err, retryable = err.is_retryable(), "stage submission failed");
                self.state = StepState::Error(err.to_string());
                self.notifier.notify(Notice::error(err.to_string()));
                return Err(WizardError::Submit(err));
            }
        };

        if self.application_id.is_none() {
            let id = receipt.application_id.clone();
            self.application_id = Some(id.clone());
            if let Err(err) = self.drafts.migrate_new(&id) {
                tracing::warn!(application_id = %id, error = %err, "draft migration failed");
                self.notifier
                    .notify(Notice::warning(format!("Your progress could not be saved locally: {err}")));
            }
        }
        self.completion_step = self.completion_step.max(stage.number());
        self.state = StepState::Idle;
        self.link_committed_media(&receipt.committed_media);
        let message = if receipt.message.is_empty() {
            format!("{} saved", stage.title())
        } else {
            receipt.message
        };

        match stage.next() {
            Some(to) => {
                self.step = to;
                self.persist();
                tracing::info!(from = stage.number(), to = to.number(), "stage committed");
                self.notifier.notify(Notice::success(message));
                Ok(Transition::Advanced { from: stage, to })
            }
            None => {
                let application_id = receipt.application_id;
                let key = DraftKey::Existing(application_id.clone());
                let purged = self
                    .drafts
                    .delete(&key)
                    .and_then(|()| self.drafts.clear_last_active());
                if let Err(err) = purged {
                    tracing::warn!(application_id = %application_id, error = %err, "could not purge finished draft");
                }
                tracing::info!(application_id = %application_id, "application finalized");
                self.notifier.notify(Notice::success(message));
                self.teardown();
                Ok(Transition::Finalized { application_id })
            }
        }
    }

    /// Swaps uploaded files for the server's copies. A slot the user has
    /// since re-picked or cleared keeps its current content.
    fn link_committed_media(&mut self, committed: &[CommittedMedia]) {
        for media in committed {
            let Some(cell) = self.payloads.attachment_slot_mut(media.slot) else {
                continue;
            };
            let Some(display_name) = cell
                .as_ref()
                .filter(|a| a.handle().is_some_and(|h| h.path == media.path))
                .map(|a| a.display_name().to_string())
            else {
                continue;
            };
            let uploaded = cell.replace(Attachment::Committed {
                url: media.url.clone(),
                display_name,
            });
            if let Some(preview) = uploaded.and_then(|a| a.preview()) {
                self.previews.release(preview);
            }
            tracing::debug!(slot = %media.slot, url = %media.url, "attachment committed");
        }
    }

    /// Validates, submits synchronously and applies the result.
    pub fn next(&mut self, submitter: &StageSubmitter) -> Result<Transition, WizardError> {
        let request = self.begin_next()?;
        let result = submitter.submit(&request);
        self.finish_next(request.ticket, result)
    }

    /// Steps back one stage. Purely local.
    pub fn back(&mut self) -> Result<Stage, WizardError> {
        self.ensure_idle()?;
        if let Some(previous) = self.step.previous() {
            self.move_to(previous);
        }
        Ok(self.step)
    }

    /// Navigates to any stage up to the first incomplete one.
    pub fn jump_to(&mut self, stage: Stage) -> Result<(), WizardError> {
        self.ensure_idle()?;
        let limit = self.max_reachable();
        if stage > limit {
            return Err(WizardError::StepLocked {
                requested: stage.number(),
                limit: limit.number(),
            });
        }
        self.move_to(stage);
        Ok(())
    }

    fn move_to(&mut self, stage: Stage) {
        self.step = stage;
        self.state = StepState::Idle;
        self.violations.clear();
        self.persist();
    }

    /// Stops the wizard: pending completions become no-ops and every
    /// preview is released. Idempotent.
    pub fn teardown(&mut self) {
        if !self.liveness.shut_down() {
            return;
        }
        self.in_flight = None;
        let released = self.previews.release_all();
        tracing::debug!(released, "wizard torn down");
    }
}

impl Drop for Wizard {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn reachable_limit(completion_step: u8) -> Stage {
    Stage::clamped(completion_step.saturating_add(1))
}
