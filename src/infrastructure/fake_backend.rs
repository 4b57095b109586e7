use super::backend::{Stage1Receipt, StageBackend};
use crate::domain::{
    ApplicationId, ApplicationRecord, ApplicationStatus, Attachment, PersonalDetails, Stage, StagePayloads,
    SubmitError, SubmitResult,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

const MEDIA_BASE: &str = "https://portal.example/";

#[derive(Debug, Default)]
struct FakeServer {
    records: HashMap<ApplicationId, ApplicationRecord>,
    queued_ids: VecDeque<ApplicationId>,
    issued: u64,
    failures: VecDeque<SubmitError>,
    calls: Vec<String>,
}

impl FakeServer {
    fn take_failure(&mut self) -> SubmitResult<()> {
        match self.failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn record_mut(&mut self, id: &ApplicationId) -> SubmitResult<&mut ApplicationRecord> {
        self.records
            .get_mut(id)
            .ok_or_else(|| SubmitError::NotFound(id.to_string()))
    }
}

/// In-process backend with the same overwrite semantics as the real one.
///
/// Clones share state. Used by tests and by the binary's offline mode.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    server: Arc<Mutex<FakeServer>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_server<T>(&self, f: impl FnOnce(&mut FakeServer) -> T) -> T {
        let mut server = self.server.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut server)
    }

    pub fn insert_record(&self, record: ApplicationRecord) {
        self.with_server(|s| s.records.insert(record.id.clone(), record));
    }

    pub fn record(&self, id: &ApplicationId) -> Option<ApplicationRecord> {
        self.with_server(|s| s.records.get(id).cloned())
    }

    pub fn record_count(&self) -> usize {
        self.with_server(|s| s.records.len())
    }

    /// The id handed out by the next stage-1 creation.
    pub fn queue_id(&self, id: impl Into<String>) {
        self.with_server(|s| s.queued_ids.push_back(ApplicationId::new(id)));
    }

    /// Makes the next backend call fail with `err`.
    pub fn fail_next(&self, err: SubmitError) {
        self.with_server(|s| s.failures.push_back(err));
    }

    /// Log of calls made, e.g. `submit_stage 3 A1`.
    pub fn calls(&self) -> Vec<String> {
        self.with_server(|s| s.calls.clone())
    }

    fn stored_personal(id: &ApplicationId, personal: &PersonalDetails) -> PersonalDetails {
        let upload = |attachment: &Option<Attachment>, field: &str| {
            attachment.as_ref().map(|a| match a {
                Attachment::Pending { display_name, .. } => {
                    Attachment::committed(format!("{MEDIA_BASE}media/{id}/{field}/{display_name}"))
                }
                other => other.clone(),
            })
        };
        PersonalDetails {
            photo: upload(&personal.photo, "photo"),
            signature: upload(&personal.signature, "signature"),
            ..personal.clone()
        }
    }

    fn store_stage(record: &mut ApplicationRecord, stage: Stage, payloads: &StagePayloads) {
        let mut stored = payloads.clone();
        for (index, row) in stored.qualifications.iter_mut().enumerate() {
            if let Some(Attachment::Pending { display_name, .. }) = &row.certificate {
                row.certificate = Some(Attachment::committed(format!(
                    "{MEDIA_BASE}media/{}/certificates/{index}/{display_name}",
                    record.id
                )));
            }
        }
        record.apply_stage(stage, &stored);
    }
}

impl StageBackend for InMemoryBackend {
    fn create_stage1(&self, personal: &PersonalDetails) -> SubmitResult<Stage1Receipt> {
        self.with_server(|s| {
            s.calls.push("create_stage1".to_string());
            s.take_failure()?;
            s.issued += 1;
            let issued = s.issued;
            let id = s
                .queued_ids
                .pop_front()
                .unwrap_or_else(|| ApplicationId::new(format!("APP-{issued:04}")));
            let mut record = ApplicationRecord {
                id: id.clone(),
                status: ApplicationStatus::Pending,
                ..Default::default()
            };
            let payloads = StagePayloads {
                personal: Self::stored_personal(&id, personal),
                ..Default::default()
            };
            record.apply_stage(Stage::Personal, &payloads);
            s.records.insert(id.clone(), record);
            Ok(Stage1Receipt {
                id,
                message: "Application started".to_string(),
            })
        })
    }

    fn update_stage1(&self, id: &ApplicationId, personal: &PersonalDetails) -> SubmitResult<String> {
        self.with_server(|s| {
            s.calls.push(format!("update_stage1 {id}"));
            s.take_failure()?;
            let record = s.record_mut(id)?;
            let previous = record.personal.clone();
            let payloads = StagePayloads {
                personal: Self::stored_personal(id, personal),
                ..Default::default()
            };
            record.apply_stage(Stage::Personal, &payloads);
            // Files not re-sent keep their stored copies.
            record.personal.photo_url = record.personal.photo_url.take().or(previous.photo_url);
            record.personal.signature_url = record.personal.signature_url.take().or(previous.signature_url);
            Ok("Personal details updated".to_string())
        })
    }

    fn submit_stage(&self, stage: Stage, id: &ApplicationId, payloads: &StagePayloads) -> SubmitResult<String> {
        self.with_server(|s| {
            s.calls.push(format!("submit_stage {} {id}", stage.number()));
            s.take_failure()?;
            let record = s.record_mut(id)?;
            Self::store_stage(record, stage, payloads);
            Ok(format!("{} saved", stage.title()))
        })
    }

    fn finalize_stage8(&self, id: &ApplicationId) -> SubmitResult<String> {
        self.with_server(|s| {
            s.calls.push(format!("finalize_stage8 {id}"));
            s.take_failure()?;
            let record = s.record_mut(id)?;
            record.apply_stage(Stage::Review, &StagePayloads::default());
            Ok("Application submitted for review".to_string())
        })
    }

    fn fetch_application(&self, id: &ApplicationId) -> SubmitResult<ApplicationRecord> {
        self.with_server(|s| {
            s.calls.push(format!("fetch_application {id}"));
            s.take_failure()?;
            s.records
                .get(id)
                .cloned()
                .ok_or_else(|| SubmitError::NotFound(id.to_string()))
        })
    }

    fn media_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{MEDIA_BASE}{}", path.trim_start_matches('/'))
        }
    }
}
