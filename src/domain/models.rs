use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One of the eight sequential pages of the admission wizard.
///
/// Stages are numbered from 1 (personal details) to 8 (review and
/// acknowledgement). Serialized as the bare stage number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Stage {
    Personal = 1,
    Qualifications = 2,
    ExamResults = 3,
    Memberships = 4,
    Experience = 5,
    Seminars = 6,
    Referees = 7,
    Review = 8,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Personal,
        Stage::Qualifications,
        Stage::ExamResults,
        Stage::Memberships,
        Stage::Experience,
        Stage::Seminars,
        Stage::Referees,
        Stage::Review,
    ];

    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn from_number(number: u8) -> Option<Self> {
        Self::ALL.get(usize::from(number).checked_sub(1)?).copied()
    }

    /// Maps any number onto the 1..=8 range.
    pub fn clamped(number: u8) -> Self {
        Self::from_number(number.clamp(1, 8)).unwrap_or(Stage::Personal)
    }

    pub fn next(self) -> Option<Self> {
        Self::from_number(self.number() + 1)
    }

    pub fn previous(self) -> Option<Self> {
        Self::from_number(self.number() - 1)
    }

    pub fn title(self) -> &'static str {
        match self {
            Stage::Personal => "Personal Details",
            Stage::Qualifications => "Qualifications",
            Stage::ExamResults => "Examination Results",
            Stage::Memberships => "Professional Memberships",
            Stage::Experience => "Work Experience",
            Stage::Seminars => "Seminars & Workshops",
            Stage::Referees => "Referees",
            Stage::Review => "Review & Acknowledge",
        }
    }

    /// Name used in field paths and request bodies.
    pub fn key(self) -> &'static str {
        match self {
            Stage::Personal => "personal",
            Stage::Qualifications => "qualifications",
            Stage::ExamResults => "exam_results",
            Stage::Memberships => "memberships",
            Stage::Experience => "experience",
            Stage::Seminars => "seminars",
            Stage::Referees => "referees",
            Stage::Review => "review",
        }
    }

    /// Whether client-side validation blocks leaving this stage.
    pub fn is_gated(self) -> bool {
        !matches!(self, Stage::Memberships | Stage::Review)
    }

    pub fn has_rows(self) -> bool {
        !matches!(self, Stage::Personal | Stage::Review)
    }
}

impl TryFrom<u8> for Stage {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Stage::from_number(value).ok_or_else(|| format!("stage must be between 1 and 8, got {value}"))
    }
}

impl From<Stage> for u8 {
    fn from(stage: Stage) -> Self {
        stage.number()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {}", self.number(), self.title())
    }
}

/// Opaque application identity minted by the server on the first stage-1 commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicationId(String);

impl ApplicationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    #[default]
    None,
    Pending,
    Acknowledged,
    Approved,
    Rejected,
}

impl ApplicationStatus {
    pub fn label(self) -> &'static str {
        match self {
            ApplicationStatus::None => "not started",
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Acknowledged => "acknowledged",
            ApplicationStatus::Approved => "approved",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

/// A live reference to a local file chosen for upload.
///
/// Handles only live for the current process; drafts persist the file name
/// and drop the handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    pub path: PathBuf,
    pub mime: String,
    pub size: u64,
}

impl FileHandle {
    pub fn new(path: impl Into<PathBuf>, mime: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            mime: mime.into(),
            size,
        }
    }

    /// Opens a file on disk, reading its size and inferring its MIME type
    /// from the extension.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let metadata = fs::metadata(&path)?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }
        let mime = mime_for_path(&path);
        Ok(Self::new(path, mime, metadata.len()))
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

pub fn mime_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Process-local preview resource owned by an attachment slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PreviewRef(pub u64);

/// A file attached to a stage payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "StoredAttachment", from = "StoredAttachment")]
pub enum Attachment {
    /// Chosen locally and not yet uploaded.
    Pending {
        handle: FileHandle,
        display_name: String,
        preview: Option<PreviewRef>,
    },
    /// Already held by the server; `url` is absolute and read-only.
    Committed { url: String, display_name: String },
    /// A pending file whose handle did not survive a reload.
    Detached { display_name: String },
}

impl Attachment {
    pub fn pending(handle: FileHandle, preview: Option<PreviewRef>) -> Self {
        let display_name = handle.file_name();
        Attachment::Pending {
            handle,
            display_name,
            preview,
        }
    }

    pub fn committed(url: impl Into<String>) -> Self {
        let url = url.into();
        let display_name = url
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or(url.as_str())
            .to_string();
        Attachment::Committed { url, display_name }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Attachment::Pending { display_name, .. }
            | Attachment::Committed { display_name, .. }
            | Attachment::Detached { display_name } => display_name,
        }
    }

    pub fn handle(&self) -> Option<&FileHandle> {
        match self {
            Attachment::Pending { handle, .. } => Some(handle),
            _ => None,
        }
    }

    pub fn preview(&self) -> Option<PreviewRef> {
        match self {
            Attachment::Pending { preview, .. } => *preview,
            _ => None,
        }
    }

    pub fn remote_url(&self) -> Option<&str> {
        match self {
            Attachment::Committed { url, .. } => Some(url),
            _ => None,
        }
    }
}

/// On-disk form of an [`Attachment`]. Live handles are never written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoredAttachment {
    Committed { url: String, display_name: String },
    Detached { display_name: String },
}

impl From<Attachment> for StoredAttachment {
    fn from(attachment: Attachment) -> Self {
        match attachment {
            Attachment::Committed { url, display_name } => StoredAttachment::Committed { url, display_name },
            Attachment::Pending { display_name, .. } | Attachment::Detached { display_name } => {
                StoredAttachment::Detached { display_name }
            }
        }
    }
}

impl From<StoredAttachment> for Attachment {
    fn from(stored: StoredAttachment) -> Self {
        match stored {
            StoredAttachment::Committed { url, display_name } => Attachment::Committed { url, display_name },
            StoredAttachment::Detached { display_name } => Attachment::Detached { display_name },
        }
    }
}

/// Addresses one attachment slot within the stage payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentSlot {
    Photo,
    Signature,
    Certificate(usize),
}

impl AttachmentSlot {
    pub fn stage(self) -> Stage {
        match self {
            AttachmentSlot::Photo | AttachmentSlot::Signature => Stage::Personal,
            AttachmentSlot::Certificate(_) => Stage::Qualifications,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AttachmentSlot::Photo => "Photo",
            AttachmentSlot::Signature => "Signature",
            AttachmentSlot::Certificate(_) => "Certificate",
        }
    }
}

impl fmt::Display for AttachmentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachmentSlot::Photo => f.write_str("personal.photo"),
            AttachmentSlot::Signature => f.write_str("personal.signature"),
            AttachmentSlot::Certificate(row) => write!(f, "qualifications[{row}].certificate"),
        }
    }
}

/// A record whose text fields can be addressed by name.
///
/// The declared field list drives prefill merging, row emptiness checks and
/// form layout, so every stage shares one code path.
pub trait FieldRecord {
    const FIELDS: &'static [&'static str];

    fn field(&self, name: &str) -> Option<&str>;

    fn field_mut(&mut self, name: &str) -> Option<&mut String>;

    fn has_any_value(&self) -> bool {
        Self::FIELDS
            .iter()
            .any(|name| self.field(name).is_some_and(|value| !value.trim().is_empty()))
    }
}

macro_rules! field_record {
    ($ty:ident { $($field:ident),+ $(,)? }) => {
        impl FieldRecord for $ty {
            const FIELDS: &'static [&'static str] = &[$(stringify!($field)),+];

            fn field(&self, name: &str) -> Option<&str> {
                match name {
                    $(stringify!($field) => Some(self.$field.as_str()),)+
                    _ => None,
                }
            }

            fn field_mut(&mut self, name: &str) -> Option<&mut String> {
                match name {
                    $(stringify!($field) => Some(&mut self.$field),)+
                    _ => None,
                }
            }
        }
    };
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonalDetails {
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
    pub photo: Option<Attachment>,
    pub signature: Option<Attachment>,
}

field_record!(PersonalDetails {
    surname,
    other_names,
    email,
    phone,
    date_of_birth,
    gender,
    nationality,
    state_of_origin,
    address,
    occupation,
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualificationRow {
    pub institution: String,
    pub qualification: String,
    pub year: String,
    pub certificate: Option<Attachment>,
}

field_record!(QualificationRow {
    institution,
    qualification,
    year,
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExamResultRow {
    pub exam_type: String,
    pub exam_year: String,
    pub exam_number: String,
    /// Comma separated subject names.
    pub subjects: String,
}

field_record!(ExamResultRow {
    exam_type,
    exam_year,
    exam_number,
    subjects,
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MembershipRow {
    pub organization: String,
    pub membership_number: String,
    pub grade: String,
    pub year_admitted: String,
}

field_record!(MembershipRow {
    organization,
    membership_number,
    grade,
    year_admitted,
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperienceRow {
    pub organization: String,
    pub position: String,
    pub start_date: String,
    pub end_date: String,
    pub responsibilities: String,
}

field_record!(ExperienceRow {
    organization,
    position,
    start_date,
    end_date,
    responsibilities,
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeminarRow {
    pub title: String,
    pub date: String,
    pub location: String,
    pub organizer: String,
}

field_record!(SeminarRow {
    title,
    date,
    location,
    organizer,
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefereeRow {
    pub referee_id: String,
    pub relationship: String,
    pub years_known: String,
}

field_record!(RefereeRow {
    referee_id,
    relationship,
    years_known,
});

/// A row list still in its initial single-empty-row state.
pub fn is_pristine<R: Default + PartialEq>(rows: &[R]) -> bool {
    match rows {
        [only] => *only == R::default(),
        _ => false,
    }
}

/// Addresses one text field of the stage payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldPath {
    pub stage: Stage,
    pub row: Option<usize>,
    pub name: &'static str,
}

impl FieldPath {
    pub fn personal(name: &'static str) -> Self {
        Self {
            stage: Stage::Personal,
            row: None,
            name,
        }
    }

    pub fn row(stage: Stage, row: usize, name: &'static str) -> Self {
        Self {
            stage,
            row: Some(row),
            name,
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row {
            Some(row) => write!(f, "{}[{row}].{}", self.stage.key(), self.name),
            None => write!(f, "{}.{}", self.stage.key(), self.name),
        }
    }
}

macro_rules! with_rows {
    ($payloads:expr, $stage:expr, |$rows:ident| $body:expr, $otherwise:expr) => {
        match $stage {
            Stage::Qualifications => {
                let $rows = &$payloads.qualifications;
                $body
            }
            Stage::ExamResults => {
                let $rows = &$payloads.exam_results;
                $body
            }
            Stage::Memberships => {
                let $rows = &$payloads.memberships;
                $body
            }
            Stage::Experience => {
                let $rows = &$payloads.experience;
                $body
            }
            Stage::Seminars => {
                let $rows = &$payloads.seminars;
                $body
            }
            Stage::Referees => {
                let $rows = &$payloads.referees;
                $body
            }
            Stage::Personal | Stage::Review => $otherwise,
        }
    };
}

macro_rules! with_rows_mut {
    ($payloads:expr, $stage:expr, |$rows:ident| $body:expr, $otherwise:expr) => {
        match $stage {
            Stage::Qualifications => {
                let $rows = &mut $payloads.qualifications;
                $body
            }
            Stage::ExamResults => {
                let $rows = &mut $payloads.exam_results;
                $body
            }
            Stage::Memberships => {
                let $rows = &mut $payloads.memberships;
                $body
            }
            Stage::Experience => {
                let $rows = &mut $payloads.experience;
                $body
            }
            Stage::Seminars => {
                let $rows = &mut $payloads.seminars;
                $body
            }
            Stage::Referees => {
                let $rows = &mut $payloads.referees;
                $body
            }
            Stage::Personal | Stage::Review => $otherwise,
        }
    };
}

/// Mirrors of the seven editable stage payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagePayloads {
    pub personal: PersonalDetails,
    pub qualifications: Vec<QualificationRow>,
    pub exam_results: Vec<ExamResultRow>,
    pub memberships: Vec<MembershipRow>,
    pub experience: Vec<ExperienceRow>,
    pub seminars: Vec<SeminarRow>,
    pub referees: Vec<RefereeRow>,
}

impl Default for StagePayloads {
    fn default() -> Self {
        Self {
            personal: PersonalDetails::default(),
            qualifications: vec![QualificationRow::default()],
            exam_results: vec![ExamResultRow::default()],
            memberships: vec![MembershipRow::default()],
            experience: vec![ExperienceRow::default()],
            seminars: vec![SeminarRow::default()],
            referees: vec![RefereeRow::default()],
        }
    }
}

impl StagePayloads {
    /// Declared text fields for a stage; empty for the review stage.
    pub fn fields_of(stage: Stage) -> &'static [&'static str] {
        match stage {
            Stage::Personal => PersonalDetails::FIELDS,
            Stage::Qualifications => QualificationRow::FIELDS,
            Stage::ExamResults => ExamResultRow::FIELDS,
            Stage::Memberships => MembershipRow::FIELDS,
            Stage::Experience => ExperienceRow::FIELDS,
            Stage::Seminars => SeminarRow::FIELDS,
            Stage::Referees => RefereeRow::FIELDS,
            Stage::Review => &[],
        }
    }

    pub fn row_count(&self, stage: Stage) -> usize {
        with_rows!(self, stage, |rows| rows.len(), 0)
    }

    pub fn field(&self, path: &FieldPath) -> Option<&str> {
        match (path.stage, path.row) {
            (Stage::Personal, _) => self.personal.field(path.name),
            (stage, Some(row)) => with_rows!(
                self,
                stage,
                |rows| rows.get(row).and_then(|r| r.field(path.name)),
                None
            ),
            (_, None) => None,
        }
    }

    pub fn field_mut(&mut self, path: &FieldPath) -> Option<&mut String> {
        match (path.stage, path.row) {
            (Stage::Personal, _) => self.personal.field_mut(path.name),
            (stage, Some(row)) => with_rows_mut!(
                self,
                stage,
                |rows| rows.get_mut(row).and_then(|r| r.field_mut(path.name)),
                None
            ),
            (_, None) => None,
        }
    }

    /// Appends an empty row and returns its index.
    pub fn add_row(&mut self, stage: Stage) -> Option<usize> {
        with_rows_mut!(
            self,
            stage,
            |rows| {
                rows.push(Default::default());
                Some(rows.len() - 1)
            },
            None
        )
    }

    /// Removes a row, returning the attachments it owned.
    ///
    /// Removing the last remaining row leaves a fresh empty row behind so the
    /// list never drops below one entry.
    pub fn remove_row(&mut self, stage: Stage, index: usize) -> Option<Vec<Attachment>> {
        if stage == Stage::Qualifications {
            if index >= self.qualifications.len() {
                return None;
            }
            let removed = self.qualifications.remove(index);
            if self.qualifications.is_empty() {
                self.qualifications.push(QualificationRow::default());
            }
            return Some(removed.certificate.into_iter().collect());
        }
        with_rows_mut!(
            self,
            stage,
            |rows| {
                if index >= rows.len() {
                    return None;
                }
                rows.remove(index);
                if rows.is_empty() {
                    rows.push(Default::default());
                }
                Some(Vec::new())
            },
            None
        )
    }

    pub fn attachment(&self, slot: AttachmentSlot) -> Option<&Attachment> {
        match slot {
            AttachmentSlot::Photo => self.personal.photo.as_ref(),
            AttachmentSlot::Signature => self.personal.signature.as_ref(),
            AttachmentSlot::Certificate(row) => self.qualifications.get(row)?.certificate.as_ref(),
        }
    }

    /// The storage cell behind a slot, or `None` if the row does not exist.
    pub fn attachment_slot_mut(&mut self, slot: AttachmentSlot) -> Option<&mut Option<Attachment>> {
        match slot {
            AttachmentSlot::Photo => Some(&mut self.personal.photo),
            AttachmentSlot::Signature => Some(&mut self.personal.signature),
            AttachmentSlot::Certificate(row) => self.qualifications.get_mut(row).map(|r| &mut r.certificate),
        }
    }

    /// Slots of `stage` that hold a live local file, with that file.
    pub fn pending_attachments(&self, stage: Stage) -> Vec<(AttachmentSlot, &FileHandle)> {
        let slots: Vec<AttachmentSlot> = match stage {
            Stage::Personal => vec![AttachmentSlot::Photo, AttachmentSlot::Signature],
            Stage::Qualifications => (0..self.qualifications.len()).map(AttachmentSlot::Certificate).collect(),
            _ => Vec::new(),
        };
        slots
            .into_iter()
            .filter_map(|slot| Some((slot, self.attachment(slot)?.handle()?)))
            .collect()
    }

    /// Read-only summary shown on the review stage, one section per stage.
    pub fn summary(&self) -> Vec<(Stage, Vec<String>)> {
        let personal = &self.personal;
        let mut personal_lines: Vec<String> = PersonalDetails::FIELDS
            .iter()
            .filter_map(|name| {
                let value = personal.field(name)?.trim();
                (!value.is_empty()).then(|| format!("{}: {value}", humanize(name)))
            })
            .collect();
        for (label, attachment) in [("Photo", &personal.photo), ("Signature", &personal.signature)] {
            if let Some(attachment) = attachment {
                personal_lines.push(format!("{label}: {}", attachment.display_name()));
            }
        }

        let mut sections = vec![(Stage::Personal, personal_lines)];
        for stage in Stage::ALL.into_iter().filter(|s| s.has_rows()) {
            let lines = with_rows!(self, stage, |rows| summarize_rows(rows), Vec::new());
            sections.push((stage, lines));
        }
        sections
    }
}

fn summarize_rows<R: FieldRecord>(rows: &[R]) -> Vec<String> {
    rows.iter()
        .filter(|row| row.has_any_value())
        .map(|row| {
            R::FIELDS
                .iter()
                .filter_map(|name| row.field(name))
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .collect::<Vec<_>>()
                .join(" | ")
        })
        .collect()
}

/// Turns `other_names` into `Other names`.
pub fn humanize(name: &str) -> String {
    let spaced = name.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Storage key of a draft.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum DraftKey {
    New,
    Existing(ApplicationId),
}

impl DraftKey {
    pub fn for_application(id: Option<&ApplicationId>) -> Self {
        id.map_or(DraftKey::New, |id| DraftKey::Existing(id.clone()))
    }

    /// File-system safe name. Identified keys carry a prefix so that an id
    /// spelled `new` cannot collide with the anonymous draft.
    pub fn storage_name(&self) -> String {
        match self {
            DraftKey::New => "new".to_string(),
            DraftKey::Existing(id) => {
                let mut name = String::from("app-");
                for byte in id.as_str().bytes() {
                    if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
                        name.push(char::from(byte));
                    } else {
                        name.push_str(&format!("%{byte:02X}"));
                    }
                }
                name
            }
        }
    }
}

impl fmt::Display for DraftKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DraftKey::New => f.write_str("new"),
            DraftKey::Existing(id) => write!(f, "{id}"),
        }
    }
}

/// The locally persisted, possibly partial wizard state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub step: Stage,
    pub application_id: Option<ApplicationId>,
    #[serde(default)]
    pub completion_step: u8,
    pub payloads: StagePayloads,
    pub timestamp: DateTime<Utc>,
}

impl Draft {
    pub fn new(
        step: Stage,
        application_id: Option<ApplicationId>,
        completion_step: u8,
        payloads: StagePayloads,
    ) -> Self {
        Self {
            step,
            application_id,
            completion_step,
            payloads,
            timestamp: Utc::now(),
        }
    }

    pub fn key(&self) -> DraftKey {
        DraftKey::for_application(self.application_id.as_ref())
    }
}
