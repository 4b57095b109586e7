//! Flat list of editable fields for the current stage.

use crate::domain::{humanize, Attachment, AttachmentSlot, FieldPath, Stage, StagePayloads};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTarget {
    Text(FieldPath),
    Attachment(AttachmentSlot),
}

impl FieldTarget {
    /// Row index the field belongs to, if any.
    pub fn row(&self) -> Option<usize> {
        match self {
            FieldTarget::Text(path) => path.row,
            FieldTarget::Attachment(AttachmentSlot::Certificate(row)) => Some(*row),
            FieldTarget::Attachment(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub label: String,
    pub target: FieldTarget,
    pub value: String,
}

fn attachment_value(attachment: Option<&Attachment>) -> String {
    match attachment {
        None => String::new(),
        Some(Attachment::Pending { display_name, .. }) => format!("{display_name} (new)"),
        Some(Attachment::Committed { display_name, .. }) => format!("{display_name} (on file)"),
        Some(Attachment::Detached { display_name }) => format!("{display_name} (select the file again)"),
    }
}

pub fn display_value(target: &FieldTarget, payloads: &StagePayloads) -> String {
    match target {
        FieldTarget::Text(path) => payloads.field(path).unwrap_or_default().to_string(),
        FieldTarget::Attachment(slot) => attachment_value(payloads.attachment(*slot)),
    }
}

/// Fields of `stage` in display order. Row stages list every row; the
/// review stage has none.
pub fn form_fields(stage: Stage, payloads: &StagePayloads) -> Vec<FormField> {
    let mut targets = Vec::new();
    match stage {
        Stage::Personal => {
            targets.extend(
                StagePayloads::fields_of(stage)
                    .iter()
                    .map(|name| FieldTarget::Text(FieldPath::personal(name))),
            );
            targets.push(FieldTarget::Attachment(AttachmentSlot::Photo));
            targets.push(FieldTarget::Attachment(AttachmentSlot::Signature));
        }
        Stage::Review => {}
        _ => {
            for row in 0..payloads.row_count(stage) {
                targets.extend(
                    StagePayloads::fields_of(stage)
                        .iter()
                        .map(|name| FieldTarget::Text(FieldPath::row(stage, row, name))),
                );
                if stage == Stage::Qualifications {
                    targets.push(FieldTarget::Attachment(AttachmentSlot::Certificate(row)));
                }
            }
        }
    }

    targets
        .into_iter()
        .map(|target| {
            let name = match &target {
                FieldTarget::Text(path) => humanize(path.name),
                FieldTarget::Attachment(slot) => slot.label().to_string(),
            };
            let label = match target.row() {
                Some(row) => format!("#{} {name}", row + 1),
                None => name,
            };
            FormField {
                label,
                value: display_value(&target, payloads),
                target,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FileHandle;

    #[test]
    fn test_personal_form_has_attachments_last() {
        let fields = form_fields(Stage::Personal, &StagePayloads::default());
        assert_eq!(fields.len(), 12);
        assert_eq!(fields[0].label, "Surname");
        assert_eq!(fields[11].target, FieldTarget::Attachment(AttachmentSlot::Signature));
    }

    #[test]
    fn test_row_stage_lists_every_row() {
        let mut payloads = StagePayloads::default();
        payloads.add_row(Stage::Qualifications);
        payloads.qualifications[1].certificate =
            Some(Attachment::pending(FileHandle::new("/tmp/bsc.pdf", "application/pdf", 1), None));

        let fields = form_fields(Stage::Qualifications, &payloads);

        assert_eq!(fields.len(), 8);
        assert_eq!(fields[4].label, "#2 Institution");
        assert_eq!(fields[7].value, "bsc.pdf (new)");
        assert_eq!(fields[7].target.row(), Some(1));
    }

    #[test]
    fn test_review_has_no_fields() {
        assert!(form_fields(Stage::Review, &StagePayloads::default()).is_empty());
    }
}
