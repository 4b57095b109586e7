//! Dispatch of one stage submission to the backend.

use crate::domain::{ApplicationId, AttachmentSlot, Stage, StagePayloads, SubmitError, SubmitResult};
use crate::infrastructure::StageBackend;
use std::path::PathBuf;
use std::sync::Arc;

/// Snapshot of everything a stage submission needs, taken when `next` is
/// requested so later edits cannot leak into an in-flight call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    /// Matches the completion back to the request that issued it.
    pub ticket: u64,
    pub stage: Stage,
    pub application_id: Option<ApplicationId>,
    pub payloads: StagePayloads,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub application_id: ApplicationId,
    pub message: String,
    /// Server copies of the local files uploaded with this stage.
    pub committed_media: Vec<CommittedMedia>,
}

/// A local file the server now holds at `url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedMedia {
    pub slot: AttachmentSlot,
    /// Path of the uploaded file, to tell it apart from a later pick.
    pub path: PathBuf,
    pub url: String,
}

/// Sends stage payloads to a [`StageBackend`]. Cheap to clone and safe to
/// move onto a worker thread.
#[derive(Clone)]
pub struct StageSubmitter {
    backend: Arc<dyn StageBackend>,
}

impl StageSubmitter {
    pub fn new(backend: Arc<dyn StageBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &dyn StageBackend {
        self.backend.as_ref()
    }

    /// Stage 1 without an id creates the application and mints its id.
    /// Every other call needs the id and overwrites that stage server-side.
    pub fn submit(&self, request: &SubmissionRequest) -> SubmitResult<SubmissionReceipt> {
        let stage = request.stage;
        tracing::debug!(stage = stage.number(), ticket = request.ticket, "submitting stage");
        let (application_id, message) = match (stage, request.application_id.as_ref()) {
            (Stage::Personal, None) => {
                let receipt = self.backend.create_stage1(&request.payloads.personal)?;
                (receipt.id, receipt.message)
            }
            (Stage::Personal, Some(id)) => {
                let message = self.backend.update_stage1(id, &request.payloads.personal)?;
                (id.clone(), message)
            }
            (_, None) => return Err(SubmitError::MissingApplication(stage.number())),
            (Stage::Review, Some(id)) => (id.clone(), self.backend.finalize_stage8(id)?),
            (_, Some(id)) => (id.clone(), self.backend.submit_stage(stage, id, &request.payloads)?),
        };
        let committed_media = self.committed_media(request, &application_id);
        Ok(SubmissionReceipt {
            application_id,
            message,
            committed_media,
        })
    }

    /// Looks up where the server stored the files uploaded with `request`.
    /// A failed lookup leaves the slots pending until the next resume links
    /// them.
    fn committed_media(&self, request: &SubmissionRequest, id: &ApplicationId) -> Vec<CommittedMedia> {
        let pending = request.payloads.pending_attachments(request.stage);
        if pending.is_empty() {
            return Vec::new();
        }
        let record = match self.backend.fetch_application(id) {
            Ok(record) => record,
            Err(err) => {
                tracing::warn!(application_id = %id, error = %err, "could not look up uploaded files");
                return Vec::new();
            }
        };
        let media = |path: &str| self.backend.media_url(path);
        pending
            .into_iter()
            .filter_map(|(slot, handle)| {
                Some(CommittedMedia {
                    slot,
                    path: handle.path.clone(),
                    url: record.media_for(slot, &media)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Attachment, FileHandle};
    use crate::infrastructure::InMemoryBackend;

    fn request(stage: Stage, id: Option<&str>) -> SubmissionRequest {
        let mut payloads = StagePayloads::default();
        payloads.personal.surname = "Doe".to_string();
        payloads.personal.other_names = "Jane".to_string();
        payloads.personal.email = "jane@x.com".to_string();
        payloads.seminars[0].title = "Ethics".to_string();
        SubmissionRequest {
            ticket: 1,
            stage,
            application_id: id.map(ApplicationId::new),
            payloads,
        }
    }

    #[test]
    fn test_stage1_mints_id() {
        let backend = InMemoryBackend::new();
        backend.queue_id("A1");
        let submitter = StageSubmitter::new(Arc::new(backend.clone()));
        let receipt = submitter.submit(&request(Stage::Personal, None)).unwrap();
        assert_eq!(receipt.application_id, ApplicationId::new("A1"));
        assert_eq!(backend.calls(), vec!["create_stage1"]);
    }

    #[test]
    fn test_stage1_resubmission_updates() {
        let backend = InMemoryBackend::new();
        backend.queue_id("A1");
        let submitter = StageSubmitter::new(Arc::new(backend.clone()));
        submitter.submit(&request(Stage::Personal, None)).unwrap();
        let receipt = submitter.submit(&request(Stage::Personal, Some("A1"))).unwrap();
        assert_eq!(receipt.application_id, ApplicationId::new("A1"));
        assert_eq!(backend.record_count(), 1);
        assert_eq!(backend.calls(), vec!["create_stage1", "update_stage1 A1"]);
    }

    #[test]
    fn test_uploaded_files_are_reported_with_their_server_url() {
        let backend = InMemoryBackend::new();
        backend.queue_id("A1");
        let submitter = StageSubmitter::new(Arc::new(backend.clone()));
        let mut stage1 = request(Stage::Personal, None);
        stage1.payloads.personal.photo = Some(Attachment::pending(FileHandle::new("/tmp/me.png", "image/png", 3), None));

        let receipt = submitter.submit(&stage1).unwrap();
        assert_eq!(
            receipt.committed_media,
            vec![CommittedMedia {
                slot: AttachmentSlot::Photo,
                path: PathBuf::from("/tmp/me.png"),
                url: "https://portal.example/media/A1/photo/me.png".to_string(),
            }]
        );
        assert_eq!(backend.calls(), vec!["create_stage1", "fetch_application A1"]);

        let receipt = submitter.submit(&request(Stage::Personal, Some("A1"))).unwrap();
        assert!(receipt.committed_media.is_empty());
    }

    #[test]
    fn test_later_stages_need_an_id() {
        let backend = InMemoryBackend::new();
        let submitter = StageSubmitter::new(Arc::new(backend.clone()));
        assert_eq!(
            submitter.submit(&request(Stage::Seminars, None)),
            Err(SubmitError::MissingApplication(6))
        );
        assert!(backend.calls().is_empty());
    }

    #[test]
    fn test_resubmitting_a_stage_is_idempotent() {
        let backend = InMemoryBackend::new();
        backend.queue_id("A1");
        let submitter = StageSubmitter::new(Arc::new(backend.clone()));
        submitter.submit(&request(Stage::Personal, None)).unwrap();
        let seminars = request(Stage::Seminars, Some("A1"));
        submitter.submit(&seminars).unwrap();
        let first = backend.record(&ApplicationId::new("A1")).unwrap();
        submitter.submit(&seminars).unwrap();
        let second = backend.record(&ApplicationId::new("A1")).unwrap();
        assert_eq!(first, second);
        assert_eq!(second.seminars.len(), 1);
    }

    #[test]
    fn test_review_stage_finalizes() {
        let backend = InMemoryBackend::new();
        backend.queue_id("A1");
        let submitter = StageSubmitter::new(Arc::new(backend.clone()));
        submitter.submit(&request(Stage::Personal, None)).unwrap();
        submitter.submit(&request(Stage::Review, Some("A1"))).unwrap();
        assert_eq!(backend.calls().last().map(String::as_str), Some("finalize_stage8 A1"));
    }
}
