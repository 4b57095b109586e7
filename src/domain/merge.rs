//! Prefill: reconciling a fetched server record into local draft state.
//!
//! Scalars follow a fill-only-empty policy and row lists an all-or-nothing
//! replace of pristine lists. Both are driven by the declared field lists of
//! [`FieldRecord`], so every stage merges the same way.

use super::models::{is_pristine, Attachment, FieldRecord, Stage, StagePayloads};
use super::record::{ApplicationRecord, MediaResolver};

/// What a prefill changed, for logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub fields_filled: Vec<String>,
    pub lists_replaced: Vec<Stage>,
    pub attachments_linked: usize,
}

impl MergeReport {
    pub fn is_empty(&self) -> bool {
        self.fields_filled.is_empty() && self.lists_replaced.is_empty() && self.attachments_linked == 0
    }
}

/// Copies server values into local fields that are still empty. Returns
/// the names of the fields filled.
pub fn fill_empty<R: FieldRecord>(local: &mut R, server: &R) -> Vec<&'static str> {
    let mut filled = Vec::new();
    for name in R::FIELDS {
        let Some(incoming) = server.field(name).filter(|v| !v.trim().is_empty()) else {
            continue;
        };
        if let Some(slot) = local.field_mut(name).filter(|v| v.trim().is_empty()) {
            *slot = incoming.to_string();
            filled.push(*name);
        }
    }
    filled
}

/// Replaces a pristine local list with the server's rows. A list the user
/// has touched, or an empty server list, leaves local state alone.
pub fn replace_if_pristine<R: Default + PartialEq>(local: &mut Vec<R>, server: Vec<R>) -> bool {
    if server.is_empty() || !is_pristine(local) {
        return false;
    }
    *local = server;
    true
}

/// Fills an empty slot, or one whose local file did not survive a reload,
/// with the server's copy.
fn link_attachment(local: &mut Option<Attachment>, server: Option<Attachment>) -> bool {
    match (local.as_ref(), server) {
        (None | Some(Attachment::Detached { .. }), Some(remote)) => {
            *local = Some(remote);
            true
        }
        _ => false,
    }
}

/// Merges `record` into `payloads` and reports what changed.
pub fn merge_record(payloads: &mut StagePayloads, record: &ApplicationRecord, media: MediaResolver<'_>) -> MergeReport {
    let mut report = MergeReport::default();

    let server_personal = record.personal.to_local(media);
    report.fields_filled.extend(
        fill_empty(&mut payloads.personal, &server_personal)
            .into_iter()
            .map(|name| format!("{}.{name}", Stage::Personal.key())),
    );
    for (local, remote) in [
        (&mut payloads.personal.photo, server_personal.photo),
        (&mut payloads.personal.signature, server_personal.signature),
    ] {
        if link_attachment(local, remote) {
            report.attachments_linked += 1;
        }
    }

    let qualifications = record.qualifications.iter().map(|q| q.to_local(media)).collect::<Vec<_>>();
    let linked = qualifications.iter().filter(|q| q.certificate.is_some()).count();
    if replace_if_pristine(&mut payloads.qualifications, qualifications.clone()) {
        report.lists_replaced.push(Stage::Qualifications);
        report.attachments_linked += linked;
    } else {
        for (local, remote) in payloads.qualifications.iter_mut().zip(qualifications) {
            if matches!(local.certificate, Some(Attachment::Detached { .. }))
                && link_attachment(&mut local.certificate, remote.certificate)
            {
                report.attachments_linked += 1;
            }
        }
    }

    let mut replace = |stage: Stage, replaced: bool| {
        if replaced {
            report.lists_replaced.push(stage);
        }
    };
    replace(
        Stage::ExamResults,
        replace_if_pristine(&mut payloads.exam_results, record.exam_results.iter().map(Into::into).collect()),
    );
    replace(
        Stage::Memberships,
        replace_if_pristine(&mut payloads.memberships, record.memberships.iter().map(Into::into).collect()),
    );
    replace(
        Stage::Experience,
        replace_if_pristine(&mut payloads.experience, record.experience.iter().map(Into::into).collect()),
    );
    replace(
        Stage::Seminars,
        replace_if_pristine(&mut payloads.seminars, record.seminars.iter().map(Into::into).collect()),
    );
    replace(
        Stage::Referees,
        replace_if_pristine(&mut payloads.referees, record.referees.iter().map(Into::into).collect()),
    );

    report
}
