//! User-visible notices.
//!
//! Every connectivity loss, rejected action and out-of-band server error is
//! published here so the UI can surface it. Nothing is swallowed silently.

use tokio::sync::broadcast;

use crate::domain::queue::ActionKind;

/// Something the user should be told about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The live channel dropped. Displayed state is stale until reconnect.
    ConnectionLost { reason: Option<String> },

    /// A membership action did not succeed.
    ActionRejected { action: ActionKind, message: String },

    /// The server pushed an error not tied to any action.
    ServerError { message: String },
}

impl Notice {
    /// One-line text for display.
    pub fn text(&self) -> String {
        match self {
            Notice::ConnectionLost { reason: Some(reason) } => {
                format!("Connection lost ({}). Reconnecting...", reason)
            }
            Notice::ConnectionLost { reason: None } => "Connection lost. Reconnecting...".to_string(),
            Notice::ActionRejected { action, message } => format!("{} failed: {}", action, message),
            Notice::ServerError { message } => format!("Server error: {}", message),
        }
    }
}

/// Fan-out publisher for [`Notice`]s.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    pub fn publish(&self, notice: Notice) {
        tracing::debug!(notice = %notice.text(), "notice");
        if self.tx.send(notice).is_err() {
            tracing::trace!("no notice subscribers");
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(64)
    }
}
