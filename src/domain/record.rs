//! Server-side shapes of an application and conversions to and from the
//! local stage payloads.
//!
//! The server stores typed values (numeric years, subject arrays, numeric
//! referee ids, media paths) where the local form keeps editable text.

use super::models::{
    ApplicationId, ApplicationStatus, Attachment, AttachmentSlot, ExamResultRow, ExperienceRow, FieldRecord, MembershipRow,
    PersonalDetails, QualificationRow, RefereeRow, SeminarRow, Stage, StagePayloads,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Resolves a server media path into an absolute URL.
pub type MediaResolver<'a> = &'a dyn Fn(&str) -> String;

/// Canonical application record as returned by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub status: ApplicationStatus,
    pub completion_step: u8,
    pub personal: PersonalRecord,
    pub qualifications: Vec<QualificationRecord>,
    pub exam_results: Vec<ExamResultRecord>,
    pub memberships: Vec<MembershipRecord>,
    pub experience: Vec<ExperienceRecord>,
    pub seminars: Vec<SeminarRecord>,
    pub referees: Vec<RefereeRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalRecord {
    pub surname: String,
    pub other_names: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: String,
    pub gender: String,
    pub nationality: String,
    pub state_of_origin: String,
    pub address: String,
    pub occupation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualificationRecord {
    pub institution: String,
    pub qualification: String,
    pub year: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExamResultRecord {
    pub exam_type: String,
    pub exam_year: Option<u16>,
    pub exam_number: String,
    pub subjects: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MembershipRecord {
    pub organization: String,
    pub membership_number: String,
    pub grade: String,
    pub year_admitted: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperienceRecord {
    pub organization: String,
    pub position: String,
    pub start_date: String,
    pub end_date: Option<String>,
    pub responsibilities: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeminarRecord {
    pub title: String,
    pub date: String,
    pub location: String,
    pub organizer: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefereeRecord {
    pub referee_id: Option<u64>,
    pub relationship: String,
    pub years_known: Option<u32>,
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn committed(path: Option<&String>, media: MediaResolver<'_>) -> Option<Attachment> {
    path.filter(|p| !p.trim().is_empty()).map(|p| Attachment::committed(media(p)))
}

impl ApplicationRecord {
    /// Absolute URL of the file the server holds for `slot`.
    pub fn media_for(&self, slot: AttachmentSlot, media: MediaResolver<'_>) -> Option<String> {
        let path = match slot {
            AttachmentSlot::Photo => self.personal.photo_url.as_ref(),
            AttachmentSlot::Signature => self.personal.signature_url.as_ref(),
            AttachmentSlot::Certificate(row) => self.qualifications.get(row)?.certificate_url.as_ref(),
        };
        path.filter(|p| !p.trim().is_empty()).map(|p| media(p))
    }
}

impl PersonalRecord {
    pub fn to_local(&self, media: MediaResolver<'_>) -> PersonalDetails {
        PersonalDetails {
            surname: self.surname.clone(),
            other_names: self.other_names.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            date_of_birth: self.date_of_birth.clone(),
            gender: self.gender.clone(),
            nationality: self.nationality.clone(),
            state_of_origin: self.state_of_origin.clone(),
            address: self.address.clone(),
            occupation: self.occupation.clone(),
            photo: committed(self.photo_url.as_ref(), media),
            signature: committed(self.signature_url.as_ref(), media),
        }
    }
}

impl From<&PersonalDetails> for PersonalRecord {
    fn from(local: &PersonalDetails) -> Self {
        let mut record = PersonalRecord {
            photo_url: local.photo.as_ref().and_then(|a| a.remote_url()).map(str::to_string),
            signature_url: local.signature.as_ref().and_then(|a| a.remote_url()).map(str::to_string),
            ..Default::default()
        };
        for name in PersonalDetails::FIELDS {
            if let (Some(target), Some(value)) = (record.field_mut(name), local.field(name)) {
                *target = value.trim().to_string();
            }
        }
        record
    }
}

impl PersonalRecord {
    fn field_mut(&mut self, name: &str) -> Option<&mut String> {
        match name {
            "surname" => Some(&mut self.surname),
            "other_names" => Some(&mut self.other_names),
            "email" => Some(&mut self.email),
            "phone" => Some(&mut self.phone),
            "date_of_birth" => Some(&mut self.date_of_birth),
            "gender" => Some(&mut self.gender),
            "nationality" => Some(&mut self.nationality),
            "state_of_origin" => Some(&mut self.state_of_origin),
            "address" => Some(&mut self.address),
            "occupation" => Some(&mut self.occupation),
            _ => None,
        }
    }
}

impl QualificationRecord {
    pub fn to_local(&self, media: MediaResolver<'_>) -> QualificationRow {
        QualificationRow {
            institution: self.institution.clone(),
            qualification: self.qualification.clone(),
            year: self.year.clone(),
            certificate: committed(self.certificate_url.as_ref(), media),
        }
    }
}

impl From<&QualificationRow> for QualificationRecord {
    fn from(row: &QualificationRow) -> Self {
        Self {
            institution: row.institution.trim().to_string(),
            qualification: row.qualification.trim().to_string(),
            year: row.year.trim().to_string(),
            certificate_url: row.certificate.as_ref().and_then(|a| a.remote_url()).map(str::to_string),
        }
    }
}

impl From<&ExamResultRecord> for ExamResultRow {
    fn from(record: &ExamResultRecord) -> Self {
        Self {
            exam_type: record.exam_type.clone(),
            exam_year: record.exam_year.map(|y| y.to_string()).unwrap_or_default(),
            exam_number: record.exam_number.clone(),
            subjects: record.subjects.join(", "),
        }
    }
}

impl From<&ExamResultRow> for ExamResultRecord {
    fn from(row: &ExamResultRow) -> Self {
        Self {
            exam_type: row.exam_type.trim().to_string(),
            exam_year: row.exam_year.trim().parse().ok(),
            exam_number: row.exam_number.trim().to_string(),
            subjects: split_subjects(&row.subjects),
        }
    }
}

/// Splits a comma separated subject list, dropping blank entries.
pub fn split_subjects(subjects: &str) -> Vec<String> {
    subjects
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl From<&MembershipRecord> for MembershipRow {
    fn from(record: &MembershipRecord) -> Self {
        Self {
            organization: record.organization.clone(),
            membership_number: record.membership_number.clone(),
            grade: record.grade.clone(),
            year_admitted: record.year_admitted.clone(),
        }
    }
}

impl From<&MembershipRow> for MembershipRecord {
    fn from(row: &MembershipRow) -> Self {
        Self {
            organization: row.organization.trim().to_string(),
            membership_number: row.membership_number.trim().to_string(),
            grade: row.grade.trim().to_string(),
            year_admitted: row.year_admitted.trim().to_string(),
        }
    }
}

impl From<&ExperienceRecord> for ExperienceRow {
    fn from(record: &ExperienceRecord) -> Self {
        Self {
            organization: record.organization.clone(),
            position: record.position.clone(),
            start_date: record.start_date.clone(),
            end_date: record.end_date.clone().unwrap_or_default(),
            responsibilities: record.responsibilities.clone(),
        }
    }
}

impl From<&ExperienceRow> for ExperienceRecord {
    fn from(row: &ExperienceRow) -> Self {
        Self {
            organization: row.organization.trim().to_string(),
            position: row.position.trim().to_string(),
            start_date: row.start_date.trim().to_string(),
            end_date: non_empty(&row.end_date),
            responsibilities: row.responsibilities.trim().to_string(),
        }
    }
}

impl From<&SeminarRecord> for SeminarRow {
    fn from(record: &SeminarRecord) -> Self {
        Self {
            title: record.title.clone(),
            date: record.date.clone(),
            location: record.location.clone(),
            organizer: record.organizer.clone(),
        }
    }
}

impl From<&SeminarRow> for SeminarRecord {
    fn from(row: &SeminarRow) -> Self {
        Self {
            title: row.title.trim().to_string(),
            date: row.date.trim().to_string(),
            location: row.location.trim().to_string(),
            organizer: row.organizer.trim().to_string(),
        }
    }
}

impl From<&RefereeRecord> for RefereeRow {
    fn from(record: &RefereeRecord) -> Self {
        Self {
            referee_id: record.referee_id.map(|id| id.to_string()).unwrap_or_default(),
            relationship: record.relationship.clone(),
            years_known: record.years_known.map(|y| y.to_string()).unwrap_or_default(),
        }
    }
}

impl From<&RefereeRow> for RefereeRecord {
    fn from(row: &RefereeRow) -> Self {
        Self {
            referee_id: row.referee_id.trim().parse().ok(),
            relationship: row.relationship.trim().to_string(),
            years_known: row.years_known.trim().parse().ok(),
        }
    }
}

/// Rows that go over the wire for a stage. Optional stages drop rows the
/// user left completely blank.
fn wire_rows<'a, R, W>(rows: &'a [R], keep_blank: bool) -> Vec<W>
where
    R: FieldRecord,
    W: From<&'a R>,
{
    rows.iter()
        .filter(|row| keep_blank || row.has_any_value())
        .map(W::from)
        .collect()
}

pub fn qualification_records(payloads: &StagePayloads) -> Vec<QualificationRecord> {
    wire_rows(&payloads.qualifications, true)
}

/// JSON body for a stage submission. Stage 1 and stage 8 are not JSON
/// submissions and yield `Value::Null`.
pub fn stage_body(stage: Stage, payloads: &StagePayloads) -> Value {
    match stage {
        Stage::Qualifications => json!({ "qualifications": qualification_records(payloads) }),
        Stage::ExamResults => {
            json!({ "exam_results": wire_rows::<_, ExamResultRecord>(&payloads.exam_results, true) })
        }
        Stage::Memberships => {
            json!({ "memberships": wire_rows::<_, MembershipRecord>(&payloads.memberships, false) })
        }
        Stage::Experience => {
            json!({ "experience": wire_rows::<_, ExperienceRecord>(&payloads.experience, false) })
        }
        Stage::Seminars => json!({ "seminars": wire_rows::<_, SeminarRecord>(&payloads.seminars, false) }),
        Stage::Referees => json!({ "referees": wire_rows::<_, RefereeRecord>(&payloads.referees, false) }),
        Stage::Personal | Stage::Review => Value::Null,
    }
}

impl ApplicationRecord {
    /// Overwrites the section of this record owned by `stage` with the
    /// submitted payloads. Applying the same stage twice leaves one copy.
    pub fn apply_stage(&mut self, stage: Stage, payloads: &StagePayloads) {
        match stage {
            Stage::Personal => self.personal = PersonalRecord::from(&payloads.personal),
            Stage::Qualifications => self.qualifications = qualification_records(payloads),
            Stage::ExamResults => self.exam_results = wire_rows(&payloads.exam_results, true),
            Stage::Memberships => self.memberships = wire_rows(&payloads.memberships, false),
            Stage::Experience => self.experience = wire_rows(&payloads.experience, false),
            Stage::Seminars => self.seminars = wire_rows(&payloads.seminars, false),
            Stage::Referees => self.referees = wire_rows(&payloads.referees, false),
            Stage::Review => self.status = ApplicationStatus::Acknowledged,
        }
        self.completion_step = self.completion_step.max(stage.number());
    }
}
