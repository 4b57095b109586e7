use super::form::{form_fields, display_value, FieldTarget};
use crate::application::{Notice, SubmissionRequest, Wizard, WizardError};
use crate::domain::{AttachmentSlot, FieldPath, FileHandle, Stage};
use crossterm::event::{KeyCode, KeyModifiers};

/// How keystrokes are interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InputMode {
    /// Arrow keys move between fields, shortcuts available
    #[default]
    Navigate,
    /// Typing into the text field at `path`
    Editing { path: FieldPath, buffer: String },
    /// Typing the path of a file to attach
    AttachPath { slot: AttachmentSlot, buffer: String },
}

/// Host-side view state that does not belong in the draft.
#[derive(Debug, Default)]
pub struct FormView {
    /// Index into the current stage's field list
    pub focus: usize,
    pub mode: InputMode,
    pub show_help: bool,
    pub help_scroll: usize,
    pub quit: bool,
}

impl FormView {
    fn reset_focus(&mut self) {
        self.focus = 0;
        self.mode = InputMode::Navigate;
    }
}

pub struct InputHandler;

impl InputHandler {
    /// Applies one key press. Returns a submission to run when the user
    /// asked to move to the next stage and the stage passed validation.
    pub fn handle_key_event(
        wizard: &mut Wizard,
        view: &mut FormView,
        key: KeyCode,
        modifiers: KeyModifiers,
    ) -> Option<SubmissionRequest> {
        if view.show_help {
            Self::handle_help_mode(view, key);
            return None;
        }
        match view.mode.clone() {
            InputMode::Navigate => Self::handle_navigate_mode(wizard, view, key, modifiers),
            InputMode::Editing { path, buffer } => {
                Self::handle_editing_mode(wizard, view, key, path, buffer);
                None
            }
            InputMode::AttachPath { slot, buffer } => {
                Self::handle_attach_mode(wizard, view, key, slot, buffer);
                None
            }
        }
    }

    fn handle_navigate_mode(
        wizard: &mut Wizard,
        view: &mut FormView,
        key: KeyCode,
        modifiers: KeyModifiers,
    ) -> Option<SubmissionRequest> {
        let fields = form_fields(wizard.step(), wizard.payloads());
        view.focus = view.focus.min(fields.len().saturating_sub(1));
        let focused = fields.get(view.focus).map(|f| f.target);

        if modifiers.contains(KeyModifiers::CONTROL) {
            match key {
                KeyCode::Char('q') => view.quit = true,
                KeyCode::Char('n') => match wizard.begin_next() {
                    Ok(request) => return Some(request),
                    Err(WizardError::Validation { violations, .. }) => {
                        if let Some(index) = fields.iter().position(|f| field_key(&f.target) == violations[0].field) {
                            view.focus = index;
                        }
                    }
                    Err(err) => report(wizard, err),
                },
                KeyCode::Char('b') => {
                    let before = wizard.step();
                    match wizard.back() {
                        Ok(step) if step != before => view.reset_focus(),
                        Ok(_) => {}
                        Err(err) => report(wizard, err),
                    }
                }
                KeyCode::Char('r') => {
                    let stage = wizard.step();
                    if stage.has_rows() {
                        match wizard.add_row(stage) {
                            Ok(row) => {
                                let fields = form_fields(stage, wizard.payloads());
                                view.focus = fields.iter().position(|f| f.target.row() == Some(row)).unwrap_or(0);
                            }
                            Err(err) => report(wizard, err),
                        }
                    }
                }
                KeyCode::Char('d') => {
                    if let Some(row) = focused.and_then(|t| t.row()) {
                        if let Err(err) = wizard.remove_row(wizard.step(), row) {
                            report(wizard, err);
                        }
                    }
                }
                KeyCode::Char('x') => {
                    if let Some(FieldTarget::Attachment(slot)) = focused {
                        if let Err(err) = wizard.detach(slot) {
                            report(wizard, err);
                        }
                    }
                }
                _ => {}
            }
            return None;
        }

        match key {
            KeyCode::Up | KeyCode::BackTab => view.focus = view.focus.saturating_sub(1),
            KeyCode::Down | KeyCode::Tab => {
                if view.focus + 1 < fields.len() {
                    view.focus += 1;
                }
            }
            KeyCode::Home => view.focus = 0,
            KeyCode::End => view.focus = fields.len().saturating_sub(1),
            KeyCode::Enter => match focused {
                Some(target @ FieldTarget::Text(path)) => {
                    view.mode = InputMode::Editing {
                        path,
                        buffer: display_value(&target, wizard.payloads()),
                    };
                }
                Some(FieldTarget::Attachment(slot)) => {
                    view.mode = InputMode::AttachPath {
                        slot,
                        buffer: String::new(),
                    };
                }
                None => {}
            },
            KeyCode::Char(c @ '1'..='8') => {
                let stage = c.to_digit(10).and_then(|d| u8::try_from(d).ok()).and_then(Stage::from_number);
                if let Some(stage) = stage.filter(|s| *s != wizard.step()) {
                    match wizard.jump_to(stage) {
                        Ok(()) => view.reset_focus(),
                        Err(err) => report(wizard, err),
                    }
                }
            }
            KeyCode::F(1) | KeyCode::Char('?') => {
                view.show_help = true;
                view.help_scroll = 0;
            }
            _ => {}
        }
        None
    }

    /// Re-anchors the view after the wizard changed stage outside a key
    /// press, i.e. when a submission completed. A text edit still open is
    /// written to the field it was started on; a half-typed attachment path
    /// is dropped.
    pub fn stage_changed(wizard: &mut Wizard, view: &mut FormView) {
        if let InputMode::Editing { path, buffer } = std::mem::take(&mut view.mode) {
            if let Err(err) = wizard.set_field(&path, buffer) {
                report(wizard, err);
            }
        }
        view.reset_focus();
    }

    fn handle_editing_mode(wizard: &mut Wizard, view: &mut FormView, key: KeyCode, path: FieldPath, mut buffer: String) {
        match key {
            KeyCode::Enter => {
                if let Err(err) = wizard.set_field(&path, buffer) {
                    report(wizard, err);
                }
                view.mode = InputMode::Navigate;
            }
            KeyCode::Esc => view.mode = InputMode::Navigate,
            KeyCode::Backspace => {
                buffer.pop();
                view.mode = InputMode::Editing { path, buffer };
            }
            KeyCode::Char(c) => {
                buffer.push(c);
                view.mode = InputMode::Editing { path, buffer };
            }
            _ => {}
        }
    }

    fn handle_attach_mode(
        wizard: &mut Wizard,
        view: &mut FormView,
        key: KeyCode,
        slot: AttachmentSlot,
        mut buffer: String,
    ) {
        match key {
            KeyCode::Enter => {
                let path = buffer.trim();
                if !path.is_empty() {
                    match FileHandle::open(path) {
                        Ok(handle) => {
                            if let Err(err) = wizard.attach(slot, handle) {
                                report(wizard, err);
                            }
                        }
                        Err(e) => wizard.notify(Notice::error(format!("Cannot attach {path}: {e}"))),
                    }
                }
                view.mode = InputMode::Navigate;
            }
            KeyCode::Esc => view.mode = InputMode::Navigate,
            KeyCode::Backspace => {
                buffer.pop();
                view.mode = InputMode::AttachPath { slot, buffer };
            }
            KeyCode::Char(c) => {
                buffer.push(c);
                view.mode = InputMode::AttachPath { slot, buffer };
            }
            _ => {}
        }
    }

    fn handle_help_mode(view: &mut FormView, key: KeyCode) {
        match key {
            KeyCode::Esc | KeyCode::F(1) | KeyCode::Char('?') | KeyCode::Char('q') => view.show_help = false,
            KeyCode::Up | KeyCode::Char('k') => view.help_scroll = view.help_scroll.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => view.help_scroll += 1,
            KeyCode::Home => view.help_scroll = 0,
            _ => {}
        }
    }
}

/// Field path as it appears in violations.
fn field_key(target: &FieldTarget) -> String {
    match target {
        FieldTarget::Text(path) => path.to_string(),
        FieldTarget::Attachment(slot) => slot.to_string(),
    }
}

fn report(wizard: &Wizard, err: WizardError) {
    let notice = match &err {
        WizardError::Busy | WizardError::StepLocked { .. } => Notice::info(err.to_string()),
        _ => Notice::error(err.to_string()),
    };
    wizard.notify(notice);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{EntryRoute, RecordingNotifier, StageSubmitter, WizardOptions};
    use crate::infrastructure::{InMemoryBackend, InMemoryDraftStore};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn wizard(notifier: &RecordingNotifier, backend: &InMemoryBackend) -> Wizard {
        Wizard::open(
            EntryRoute::default(),
            Box::new(InMemoryDraftStore::new()),
            backend,
            Box::new(notifier.clone()),
            WizardOptions::default(),
        )
        .unwrap()
    }

    fn press(wizard: &mut Wizard, view: &mut FormView, key: KeyCode) -> Option<SubmissionRequest> {
        InputHandler::handle_key_event(wizard, view, key, KeyModifiers::NONE)
    }

    fn ctrl(wizard: &mut Wizard, view: &mut FormView, c: char) -> Option<SubmissionRequest> {
        InputHandler::handle_key_event(wizard, view, KeyCode::Char(c), KeyModifiers::CONTROL)
    }

    fn type_text(wizard: &mut Wizard, view: &mut FormView, text: &str) {
        press(wizard, view, KeyCode::Enter);
        for c in text.chars() {
            press(wizard, view, KeyCode::Char(c));
        }
        press(wizard, view, KeyCode::Enter);
    }

    #[test]
    fn test_editing_a_field() {
        let notifier = RecordingNotifier::new();
        let mut wizard = wizard(&notifier, &InMemoryBackend::new());
        let mut view = FormView::default();

        type_text(&mut wizard, &mut view, "Doex");
        press(&mut wizard, &mut view, KeyCode::Enter);
        press(&mut wizard, &mut view, KeyCode::Backspace);
        press(&mut wizard, &mut view, KeyCode::Enter);

        assert_eq!(wizard.payloads().personal.surname, "Doe");
        assert_eq!(view.mode, InputMode::Navigate);

        press(&mut wizard, &mut view, KeyCode::Enter);
        press(&mut wizard, &mut view, KeyCode::Char('!'));
        press(&mut wizard, &mut view, KeyCode::Esc);
        assert_eq!(wizard.payloads().personal.surname, "Doe");
    }

    #[test]
    fn test_next_focuses_first_violation() {
        let notifier = RecordingNotifier::new();
        let mut wizard = wizard(&notifier, &InMemoryBackend::new());
        let mut view = FormView::default();
        type_text(&mut wizard, &mut view, "Doe");
        press(&mut wizard, &mut view, KeyCode::Down);
        type_text(&mut wizard, &mut view, "Jane");
        press(&mut wizard, &mut view, KeyCode::Home);

        assert!(ctrl(&mut wizard, &mut view, 'n').is_none());
        assert_eq!(view.focus, 2);
        assert_eq!(wizard.violations()[0].field, "personal.email");
    }

    #[test]
    fn test_next_hands_out_submission() {
        let notifier = RecordingNotifier::new();
        let backend = InMemoryBackend::new();
        let mut wizard = wizard(&notifier, &backend);
        let mut view = FormView::default();
        for text in ["Doe", "Jane", "jane@x.com"] {
            type_text(&mut wizard, &mut view, text);
            press(&mut wizard, &mut view, KeyCode::Down);
        }

        let request = ctrl(&mut wizard, &mut view, 'n').unwrap();
        assert_eq!(request.stage, Stage::Personal);
        assert!(wizard.is_busy());
        assert!(ctrl(&mut wizard, &mut view, 'n').is_none());

        let result = StageSubmitter::new(Arc::new(backend)).submit(&request);
        wizard.finish_next(request.ticket, result).unwrap();
        assert_eq!(wizard.step(), Stage::Qualifications);
    }

    #[test]
    fn test_open_edit_survives_stage_advance() {
        let notifier = RecordingNotifier::new();
        let backend = InMemoryBackend::new();
        let mut wizard = wizard(&notifier, &backend);
        let mut view = FormView::default();
        for text in ["Doe", "Jane", "jane@x.com"] {
            type_text(&mut wizard, &mut view, text);
            press(&mut wizard, &mut view, KeyCode::Down);
        }
        let request = ctrl(&mut wizard, &mut view, 'n').unwrap();

        press(&mut wizard, &mut view, KeyCode::Enter);
        for c in "0800".chars() {
            press(&mut wizard, &mut view, KeyCode::Char(c));
        }
        let result = StageSubmitter::new(Arc::new(backend)).submit(&request);
        wizard.finish_next(request.ticket, result).unwrap();
        InputHandler::stage_changed(&mut wizard, &mut view);

        assert_eq!(wizard.step(), Stage::Qualifications);
        assert_eq!(view.mode, InputMode::Navigate);
        assert_eq!(view.focus, 0);
        press(&mut wizard, &mut view, KeyCode::Enter);
        press(&mut wizard, &mut view, KeyCode::Enter);
        assert_eq!(wizard.payloads().personal.phone, "0800");
        assert_eq!(wizard.payloads().qualifications[0].institution, "");
    }

    #[test]
    fn test_edit_commits_to_the_field_it_started_on() {
        let notifier = RecordingNotifier::new();
        let mut wizard = wizard(&notifier, &InMemoryBackend::new());
        let mut view = FormView::default();
        press(&mut wizard, &mut view, KeyCode::Down);
        press(&mut wizard, &mut view, KeyCode::Enter);
        press(&mut wizard, &mut view, KeyCode::Char('J'));
        view.focus = 0;
        press(&mut wizard, &mut view, KeyCode::Enter);

        assert_eq!(wizard.payloads().personal.other_names, "J");
        assert_eq!(wizard.payloads().personal.surname, "");
    }

    #[test]
    fn test_locked_jump_is_reported() {
        let notifier = RecordingNotifier::new();
        let mut wizard = wizard(&notifier, &InMemoryBackend::new());
        let mut view = FormView::default();

        press(&mut wizard, &mut view, KeyCode::Char('5'));

        assert_eq!(wizard.step(), Stage::Personal);
        assert!(notifier.last().unwrap().message.contains("stage 5"));
    }

    #[test]
    fn test_attach_from_path() {
        let dir = TempDir::new().unwrap();
        let photo = dir.path().join("me.png");
        std::fs::write(&photo, b"png").unwrap();
        let notifier = RecordingNotifier::new();
        let mut wizard = wizard(&notifier, &InMemoryBackend::new());
        let mut view = FormView::default();
        view.focus = 10;

        type_text(&mut wizard, &mut view, photo.to_str().unwrap());
        assert_eq!(wizard.payloads().personal.photo.as_ref().unwrap().display_name(), "me.png");

        ctrl(&mut wizard, &mut view, 'x');
        assert!(wizard.payloads().personal.photo.is_none());

        type_text(&mut wizard, &mut view, "/no/such/file.png");
        assert!(wizard.payloads().personal.photo.is_none());
        assert!(notifier.last().unwrap().message.starts_with("Cannot attach"));
    }

    #[test]
    fn test_row_keys() {
        let notifier = RecordingNotifier::new();
        let backend = InMemoryBackend::new();
        backend.insert_record(crate::domain::ApplicationRecord {
            id: crate::domain::ApplicationId::new("A1"),
            completion_step: 5,
            ..Default::default()
        });
        let mut wizard = Wizard::open(
            EntryRoute {
                application_id: Some(crate::domain::ApplicationId::new("A1")),
                target_step: Some(6),
            },
            Box::new(InMemoryDraftStore::new()),
            &backend,
            Box::new(notifier.clone()),
            WizardOptions::default(),
        )
        .unwrap();
        let mut view = FormView::default();
        assert_eq!(wizard.step(), Stage::Seminars);

        ctrl(&mut wizard, &mut view, 'r');
        assert_eq!(wizard.payloads().seminars.len(), 2);
        assert_eq!(view.focus, 4);

        ctrl(&mut wizard, &mut view, 'd');
        assert_eq!(wizard.payloads().seminars.len(), 1);

        ctrl(&mut wizard, &mut view, 'b');
        assert_eq!(wizard.step(), Stage::Experience);
        assert_eq!(view.focus, 0);
    }

    #[test]
    fn test_help_and_quit() {
        let notifier = RecordingNotifier::new();
        let mut wizard = wizard(&notifier, &InMemoryBackend::new());
        let mut view = FormView::default();

        press(&mut wizard, &mut view, KeyCode::F(1));
        assert!(view.show_help);
        press(&mut wizard, &mut view, KeyCode::Char('q'));
        assert!(!view.show_help);
        assert!(!view.quit);

        ctrl(&mut wizard, &mut view, 'q');
        assert!(view.quit);
    }
}
