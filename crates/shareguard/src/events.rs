//! Outbound notifications.
//!
//! The engines report upward through a one-way channel. Whoever controls the
//! surface consumes these; the core never waits on them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::detector::Platform;

/// A notification emitted by the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoreEvent {
    /// The detector confirmed a capture-state transition.
    CaptureStateChanged {
        /// The new state.
        capturing: bool,
        /// The conferencing platform of the surface.
        platform: Platform,
        /// When the transition was confirmed.
        timestamp: DateTime<Utc>,
    },

    /// The number of masked elements changed.
    MaskCountChanged {
        /// Elements currently masked.
        count: usize,
    },
}

/// Sending side of the notification channel.
///
/// A sink without a receiver drops events silently; a sink whose receiver
/// has gone away logs once per event at debug level.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::UnboundedSender<CoreEvent>>,
}

impl EventSink {
    /// Create a sink that delivers to `tx`.
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<CoreEvent>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Create a sink and the receiver it delivers to.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<CoreEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    /// Create a sink that discards everything.
    #[must_use]
    pub fn disconnected() -> Self {
        Self { tx: None }
    }

    /// Emit an event.
    pub fn emit(&self, event: CoreEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                debug!("Event receiver closed");
            }
        }
    }
}
