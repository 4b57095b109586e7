//! Client-side validation of stage payloads.
//!
//! Each stage maps its payload to an ordered list of violations. A non-empty
//! list blocks leaving the stage; it never changes the payload.

use super::models::{
    Attachment, AttachmentSlot, ExamResultRow, ExperienceRow, FieldPath, FieldRecord, PersonalDetails,
    QualificationRow, RefereeRow, SeminarRow, Stage, StagePayloads,
};
use super::record::split_subjects;
use chrono::NaiveDate;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

pub const MIB: u64 = 1024 * 1024;
pub const IMAGE_MAX_BYTES: u64 = 5 * MIB;
pub const DOCUMENT_MAX_BYTES: u64 = 10 * MIB;

const IMAGE_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];
const DOCUMENT_TYPES: &[&str] = &["application/pdf", "image/jpeg", "image/png", "image/webp"];

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

/// One broken rule, tied to the field it concerns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl Violation {
    fn new(field: impl fmt::Display, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validates the payload owned by `stage`.
///
/// Stages 4 and 8 have no client-side rules and always pass.
pub fn validate_stage(stage: Stage, payloads: &StagePayloads) -> Vec<Violation> {
    match stage {
        Stage::Personal => validate_personal(&payloads.personal),
        Stage::Qualifications => validate_qualifications(&payloads.qualifications),
        Stage::ExamResults => validate_exam_results(&payloads.exam_results),
        Stage::Experience => validate_experience(&payloads.experience),
        Stage::Seminars => validate_seminars(&payloads.seminars),
        Stage::Referees => validate_referees(&payloads.referees),
        Stage::Memberships | Stage::Review => Vec::new(),
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

fn require<R: FieldRecord>(
    violations: &mut Vec<Violation>,
    record: &R,
    path: FieldPath,
    message: &str,
) -> bool {
    let present = record.field(path.name).is_some_and(|v| !is_blank(v));
    if !present {
        violations.push(Violation::new(path, message));
    }
    present
}

fn check_attachment(
    violations: &mut Vec<Violation>,
    slot: AttachmentSlot,
    attachment: Option<&Attachment>,
    allowed: &[&str],
    allowed_label: &str,
    limit_for: impl Fn(&str) -> u64,
) {
    // Committed and detached attachments have no local bytes to inspect.
    let Some(handle) = attachment.and_then(Attachment::handle) else {
        return;
    };
    if !allowed.contains(&handle.mime.as_str()) {
        violations.push(Violation::new(
            slot,
            format!("{} must be {allowed_label} (got {})", slot.label(), handle.mime),
        ));
    }
    let max_bytes = limit_for(&handle.mime);
    if handle.size > max_bytes {
        violations.push(Violation::new(
            slot,
            format!(
                "{} exceeds the {} MiB size limit ({:.1} MiB)",
                slot.label(),
                max_bytes / MIB,
                handle.size as f64 / MIB as f64
            ),
        ));
    }
}

pub fn validate_personal(personal: &PersonalDetails) -> Vec<Violation> {
    let mut violations = Vec::new();
    require(&mut violations, personal, FieldPath::personal("surname"), "Surname is required");
    require(&mut violations, personal, FieldPath::personal("other_names"), "Other names are required");
    if require(&mut violations, personal, FieldPath::personal("email"), "Email is required")
        && !EMAIL_PATTERN.is_match(personal.email.trim())
    {
        violations.push(Violation::new(FieldPath::personal("email"), "Email address is not valid"));
    }
    for (slot, attachment) in [
        (AttachmentSlot::Photo, personal.photo.as_ref()),
        (AttachmentSlot::Signature, personal.signature.as_ref()),
    ] {
        check_attachment(
            &mut violations,
            slot,
            attachment,
            IMAGE_TYPES,
            "a JPEG, PNG or WebP image",
            |_| IMAGE_MAX_BYTES,
        );
    }
    violations
}

/// Scanned certificate images share the image cap; PDFs get the document cap.
fn certificate_limit(mime: &str) -> u64 {
    if mime.starts_with("image/") {
        IMAGE_MAX_BYTES
    } else {
        DOCUMENT_MAX_BYTES
    }
}

pub fn validate_qualifications(rows: &[QualificationRow]) -> Vec<Violation> {
    let mut violations = Vec::new();
    if rows.is_empty() {
        violations.push(Violation::new("qualifications", "At least one qualification is required"));
    }
    for (index, row) in rows.iter().enumerate() {
        let path = |name| FieldPath::row(Stage::Qualifications, index, name);
        require(&mut violations, row, path("institution"), "Institution is required");
        require(&mut violations, row, path("qualification"), "Qualification is required");
        require(&mut violations, row, path("year"), "Year is required");
        check_attachment(
            &mut violations,
            AttachmentSlot::Certificate(index),
            row.certificate.as_ref(),
            DOCUMENT_TYPES,
            "a PDF, JPEG, PNG or WebP file",
            certificate_limit,
        );
    }
    violations
}

pub fn validate_exam_results(rows: &[ExamResultRow]) -> Vec<Violation> {
    let mut violations = Vec::new();
    if rows.is_empty() {
        violations.push(Violation::new("exam_results", "At least one exam result is required"));
    }
    for (index, row) in rows.iter().enumerate() {
        let path = |name| FieldPath::row(Stage::ExamResults, index, name);
        require(&mut violations, row, path("exam_type"), "Exam type is required");
        if require(&mut violations, row, path("exam_year"), "Exam year is required") {
            let year = row.exam_year.trim();
            if year.len() != 4 || !year.chars().all(|c| c.is_ascii_digit()) {
                violations.push(Violation::new(path("exam_year"), "Exam year must be 4 digits"));
            }
        }
        require(&mut violations, row, path("exam_number"), "Exam number is required");
        if split_subjects(&row.subjects).is_empty() {
            violations.push(Violation::new(path("subjects"), "At least one subject is required"));
        }
    }
    violations
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

pub fn validate_experience(rows: &[ExperienceRow]) -> Vec<Violation> {
    let mut violations = Vec::new();
    for (index, row) in rows.iter().enumerate().filter(|(_, row)| row.has_any_value()) {
        let path = |name| FieldPath::row(Stage::Experience, index, name);
        require(&mut violations, row, path("organization"), "Organization is required");
        require(&mut violations, row, path("position"), "Position is required");
        let start = if require(&mut violations, row, path("start_date"), "Start date is required") {
            let parsed = parse_date(&row.start_date);
            if parsed.is_none() {
                violations.push(Violation::new(path("start_date"), "Start date must be a date (YYYY-MM-DD)"));
            }
            parsed
        } else {
            None
        };
        if !is_blank(&row.end_date) {
            match (start, parse_date(&row.end_date)) {
                (_, None) => {
                    violations.push(Violation::new(path("end_date"), "End date must be a date (YYYY-MM-DD)"));
                }
                (Some(start), Some(end)) if end < start => {
                    violations.push(Violation::new(path("end_date"), "End date cannot be before start date"));
                }
                _ => {}
            }
        }
    }
    violations
}

pub fn validate_seminars(rows: &[SeminarRow]) -> Vec<Violation> {
    let mut violations = Vec::new();
    for (index, row) in rows.iter().enumerate().filter(|(_, row)| row.has_any_value()) {
        let path = |name| FieldPath::row(Stage::Seminars, index, name);
        require(&mut violations, row, path("title"), "Title is required");
        require(&mut violations, row, path("date"), "Date is required");
        require(&mut violations, row, path("location"), "Location is required");
    }
    violations
}

pub fn validate_referees(rows: &[RefereeRow]) -> Vec<Violation> {
    let mut violations = Vec::new();
    for (index, row) in rows.iter().enumerate().filter(|(_, row)| row.has_any_value()) {
        let path = |name| FieldPath::row(Stage::Referees, index, name);
        if require(&mut violations, row, path("referee_id"), "Referee ID is required")
            && !row.referee_id.trim().chars().all(|c| c.is_ascii_digit())
        {
            violations.push(Violation::new(path("referee_id"), "Referee ID must be numeric"));
        }
        require(&mut violations, row, path("relationship"), "Relationship is required");
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::FileHandle;

    fn messages(violations: &[Violation]) -> Vec<&str> {
        violations.iter().map(|v| v.message.as_str()).collect()
    }

    fn valid_personal() -> PersonalDetails {
        PersonalDetails {
            surname: "Doe".to_string(),
            other_names: "Jane".to_string(),
            email: "jane@x.com".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_personal_requires_names_and_email() {
        let violations = validate_personal(&PersonalDetails::default());
        assert_eq!(
            messages(&violations),
            vec!["Surname is required", "Other names are required", "Email is required"]
        );
        assert_eq!(violations[0].field, "personal.surname");
        assert!(validate_personal(&valid_personal()).is_empty());
    }

    #[test]
    fn test_personal_rejects_malformed_email() {
        for email in ["jane", "jane@x", "jane @x.com", "@x.com"] {
            let personal = PersonalDetails {
                email: email.to_string(),
                ..valid_personal()
            };
            assert_eq!(messages(&validate_personal(&personal)), vec!["Email address is not valid"], "{email}");
        }
    }

    #[test]
    fn test_photo_type_and_size() {
        let personal = PersonalDetails {
            photo: Some(Attachment::pending(FileHandle::new("me.gif", "image/gif", 100), None)),
            signature: Some(Attachment::pending(
                FileHandle::new("sig.png", "image/png", 5 * MIB + 1),
                None,
            )),
            ..valid_personal()
        };
        let violations = validate_personal(&personal);
        assert_eq!(violations.len(), 2);
        assert_eq!(violations[0].field, "personal.photo");
        assert!(violations[0].message.contains("JPEG, PNG or WebP"));
        assert_eq!(violations[1].field, "personal.signature");
        assert!(violations[1].message.contains("5 MiB"));
    }

    #[test]
    fn test_photo_at_limit_is_accepted() {
        let personal = PersonalDetails {
            photo: Some(Attachment::pending(FileHandle::new("me.webp", "image/webp", 5 * MIB), None)),
            ..valid_personal()
        };
        assert!(validate_personal(&personal).is_empty());
    }

    #[test]
    fn test_committed_and_detached_attachments_are_not_inspected() {
        let personal = PersonalDetails {
            photo: Some(Attachment::committed("https://portal.example/media/photo.bmp")),
            signature: Some(Attachment::Detached {
                display_name: "sig.tiff".to_string(),
            }),
            ..valid_personal()
        };
        assert!(validate_personal(&personal).is_empty());
    }

    #[test]
    fn test_qualifications_require_fields_on_every_row() {
        let rows = vec![
            QualificationRow {
                institution: "UNILAG".to_string(),
                qualification: "BSc".to_string(),
                year: "2010".to_string(),
                certificate: None,
            },
            QualificationRow::default(),
        ];
        let violations = validate_qualifications(&rows);
        assert_eq!(
            violations.iter().map(|v| v.field.as_str()).collect::<Vec<_>>(),
            vec![
                "qualifications[1].institution",
                "qualifications[1].qualification",
                "qualifications[1].year"
            ]
        );
        assert_eq!(messages(&validate_qualifications(&[])), vec!["At least one qualification is required"]);
    }

    #[test]
    fn test_oversized_certificate() {
        let rows = vec![QualificationRow {
            institution: "UNILAG".to_string(),
            qualification: "BSc".to_string(),
            year: "2010".to_string(),
            certificate: Some(Attachment::pending(FileHandle::new("cert.pdf", "application/pdf", 11 * MIB), None)),
        }];
        let violations = validate_qualifications(&rows);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "qualifications[0].certificate");
        assert!(violations[0].message.contains("exceeds the 10 MiB size limit"));
    }

    #[test]
    fn test_certificate_image_uses_image_limit() {
        let mut row = QualificationRow {
            institution: "UNILAG".to_string(),
            qualification: "BSc".to_string(),
            year: "2010".to_string(),
            certificate: Some(Attachment::pending(FileHandle::new("cert.jpg", "image/jpeg", 6 * MIB), None)),
        };
        let violations = validate_qualifications(std::slice::from_ref(&row));
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("exceeds the 5 MiB size limit"));

        row.certificate = Some(Attachment::pending(FileHandle::new("cert.pdf", "application/pdf", 6 * MIB), None));
        assert!(validate_qualifications(&[row]).is_empty());
    }

    #[test]
    fn test_exam_year_must_be_four_digits() {
        let row = ExamResultRow {
            exam_type: "WAEC".to_string(),
            exam_year: "99".to_string(),
            exam_number: "12345".to_string(),
            subjects: "Maths".to_string(),
        };
        let violations = validate_exam_results(&[row.clone()]);
        assert_eq!(messages(&violations), vec!["Exam year must be 4 digits"]);

        let row = ExamResultRow {
            exam_year: "20O4".to_string(),
            ..row
        };
        assert_eq!(messages(&validate_exam_results(&[row])), vec!["Exam year must be 4 digits"]);
    }

    #[test]
    fn test_exam_subjects_must_not_be_blank() {
        let row = ExamResultRow {
            exam_type: "NECO".to_string(),
            exam_year: "2004".to_string(),
            exam_number: "12345".to_string(),
            subjects: " , ,".to_string(),
        };
        let violations = validate_exam_results(&[row]);
        assert_eq!(messages(&violations), vec!["At least one subject is required"]);
        assert_eq!(violations[0].field, "exam_results[0].subjects");
    }

    #[test]
    fn test_experience_blank_rows_are_ignored() {
        assert!(validate_experience(&[ExperienceRow::default()]).is_empty());
    }

    #[test]
    fn test_experience_partial_row() {
        let row = ExperienceRow {
            position: "Auditor".to_string(),
            ..Default::default()
        };
        assert_eq!(
            messages(&validate_experience(&[row])),
            vec!["Organization is required", "Start date is required"]
        );
    }

    #[test]
    fn test_experience_end_before_start() {
        let row = ExperienceRow {
            organization: "KPMG".to_string(),
            position: "Auditor".to_string(),
            start_date: "2015-06-01".to_string(),
            end_date: "2014-01-01".to_string(),
            responsibilities: String::new(),
        };
        assert_eq!(messages(&validate_experience(&[row.clone()])), vec!["End date cannot be before start date"]);

        let same_day = ExperienceRow {
            end_date: "2015-06-01".to_string(),
            ..row.clone()
        };
        assert!(validate_experience(&[same_day]).is_empty());

        let garbled = ExperienceRow {
            end_date: "last year".to_string(),
            ..row
        };
        assert_eq!(messages(&validate_experience(&[garbled])), vec!["End date must be a date (YYYY-MM-DD)"]);
    }

    #[test]
    fn test_seminar_partial_row() {
        let row = SeminarRow {
            organizer: "ICAN".to_string(),
            ..Default::default()
        };
        assert_eq!(
            messages(&validate_seminars(&[row])),
            vec!["Title is required", "Date is required", "Location is required"]
        );
    }

    #[test]
    fn test_referee_id_must_be_numeric() {
        let row = RefereeRow {
            referee_id: "AB12".to_string(),
            relationship: "Mentor".to_string(),
            years_known: String::new(),
        };
        assert_eq!(messages(&validate_referees(&[row])), vec!["Referee ID must be numeric"]);

        let row = RefereeRow {
            years_known: "4".to_string(),
            ..Default::default()
        };
        assert_eq!(
            messages(&validate_referees(&[row])),
            vec!["Referee ID is required", "Relationship is required"]
        );
    }

    #[test]
    fn test_ungated_stages_always_pass() {
        let mut payloads = StagePayloads::default();
        payloads.memberships[0].grade = "Associate".to_string();
        assert!(validate_stage(Stage::Memberships, &payloads).is_empty());
        assert!(validate_stage(Stage::Review, &payloads).is_empty());
        assert!(!validate_stage(Stage::Personal, &payloads).is_empty());
    }
}
