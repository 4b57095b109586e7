//! User-facing notifications raised by the wizard.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }

    fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Port through which the wizard reports outcomes to the host.
pub trait Notifier {
    fn notify(&self, notice: Notice);
}

fn trace_notice(notice: &Notice) {
    match notice.level {
        NoticeLevel::Info | NoticeLevel::Success => tracing::info!(message = %notice.message, "notice"),
        NoticeLevel::Warning => tracing::warn!(message = %notice.message, "notice"),
        NoticeLevel::Error => tracing::error!(message = %notice.message, "notice"),
    }
}

/// Sends notices to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        trace_notice(&notice);
    }
}

/// Keeps every notice so the host can show the latest one in its status
/// bar. Clones share the same list.
#[derive(Debug, Default, Clone)]
pub struct RecordingNotifier {
    notices: Rc<RefCell<Vec<Notice>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.borrow().clone()
    }

    pub fn last(&self) -> Option<Notice> {
        self.notices.borrow().last().cloned()
    }

    pub fn clear(&self) {
        self.notices.borrow_mut().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        trace_notice(&notice);
        self.notices.borrow_mut().push(notice);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_notifier_shares_notices() {
        let notifier = RecordingNotifier::new();
        let handle = notifier.clone();
        notifier.notify(Notice::warning("Draft could not be saved"));
        notifier.notify(Notice::success("Saved"));

        assert_eq!(handle.notices().len(), 2);
        assert_eq!(handle.last(), Some(Notice::success("Saved")));
        handle.clear();
        assert!(notifier.notices().is_empty());
    }
}
