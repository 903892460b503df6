//! The user-visible notification channel.
//!
//! Pipeline failures, lint findings and informational messages all end up
//! here, distinguished by their title.

use std::fmt::{Display, Formatter};

use console::style;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: Level::Info,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: Level::Warning,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            title: title.into(),
            message: message.into(),
        }
    }
}

impl Display for Notification {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}\n{}", self.title, self.message)
    }
}

/// Receives notifications from tasks. Implementations must be callable from
/// any worker thread.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Prints notifications through `tracing`, with the title highlighted.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, n: Notification) {
        match n.level {
            Level::Info => tracing::info!("{}\n{}", style(&n.title).cyan().bold(), n.message),
            Level::Warning => {
                tracing::warn!("{}\n{}", style(&n.title).yellow().bold(), n.message)
            }
            Level::Error => tracing::error!("{}\n{}", style(&n.title).red().bold(), n.message),
        }
    }
}

#[cfg(test)]
pub(crate) use recorder::Recorder;

#[cfg(test)]
mod recorder {
    use std::sync::Mutex;

    use super::{Notification, Notifier};

    /// Keeps every notification in memory.
    #[derive(Default)]
    pub(crate) struct Recorder(Mutex<Vec<Notification>>);

    impl Recorder {
        pub(crate) fn take(&self) -> Vec<Notification> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    impl Notifier for Recorder {
        fn notify(&self, notification: Notification) {
            self.0.lock().unwrap().push(notification);
        }
    }
}
