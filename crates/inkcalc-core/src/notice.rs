//! Transient user-facing notices.

use std::time::{Duration, Instant};

/// How long a notice stays visible.
pub const NOTICE_DURATION: Duration = Duration::from_secs(2);

/// A message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub shown_at: Instant,
}

/// Holds at most one notice; a newer one replaces the older.
#[derive(Debug, Clone)]
pub struct NoticeBoard {
    current: Option<Notice>,
    duration: Duration,
}

impl Default for NoticeBoard {
    fn default() -> Self {
        Self {
            current: None,
            duration: NOTICE_DURATION,
        }
    }
}

impl NoticeBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show `text` starting at `now`.
    pub fn show(&mut self, text: impl Into<String>, now: Instant) {
        let text = text.into();
        log::info!("Notice: {}", text);
        self.current = Some(Notice { text, shown_at: now });
    }

    /// The visible notice text at `now`, if any.
    pub fn current(&self, now: Instant) -> Option<&str> {
        self.current
            .as_ref()
            .filter(|notice| now.saturating_duration_since(notice.shown_at) < self.duration)
            .map(|notice| notice.text.as_str())
    }

    /// Forget an expired notice.
    pub fn expire(&mut self, now: Instant) {
        if self.current(now).is_none() {
            self.current = None;
        }
    }
}
