//! Capture-acquisition providers.
//!
//! A [`CaptureProvider`] is the platform primitive that hands out screen or
//! tab capture streams. The detector never replaces that primitive; instead
//! [`HookedProvider`] wraps one and reports every stream it hands out, plus
//! the moment each stream terminates, as [`HookSignal`]s.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

/// Errors returned by a capture acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcquireError {
    /// The user or the platform denied permission.
    #[error("capture permission denied: {0}")]
    Denied(String),

    /// The user dismissed the picker.
    #[error("capture cancelled by the user")]
    Cancelled,

    /// The platform failed to start the capture.
    #[error("capture failed: {0}")]
    Platform(String),
}

/// Errors returned when installing the acquisition hook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    /// The platform does not allow observing acquisitions.
    #[error("capture hook refused: {0}")]
    Refused(String),
}

/// What the caller asked to capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    /// Capture video.
    pub video: bool,
    /// Capture audio.
    pub audio: bool,
}

impl Default for CaptureRequest {
    fn default() -> Self {
        Self {
            video: true,
            audio: false,
        }
    }
}

/// Identity of a capture stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(u64);

impl StreamId {
    /// Wrap a raw id.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stream-{}", self.0)
    }
}

/// A live capture stream.
///
/// Clones observe the same stream. The stream counts as ended once its
/// [`StreamTerminator`] fires or is dropped.
#[derive(Debug, Clone)]
pub struct CaptureStream {
    id: StreamId,
    ended: watch::Receiver<bool>,
}

/// Ends a capture stream, as the platform does when the user stops sharing.
#[derive(Debug)]
pub struct StreamTerminator {
    id: StreamId,
    tx: watch::Sender<bool>,
}

impl CaptureStream {
    /// Create a stream and the terminator that ends it.
    #[must_use]
    pub fn pair(id: StreamId) -> (Self, StreamTerminator) {
        let (tx, ended) = watch::channel(false);
        (Self { id, ended }, StreamTerminator { id, tx })
    }

    /// The stream's id.
    #[must_use]
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Check whether the stream has ended.
    #[must_use]
    pub fn is_ended(&self) -> bool {
        *self.ended.borrow() || self.ended.has_changed().is_err()
    }

    /// Wait until the stream ends.
    pub async fn ended(&mut self) {
        loop {
            if *self.ended.borrow_and_update() {
                return;
            }
            // A dropped terminator also ends the stream.
            if self.ended.changed().await.is_err() {
                return;
            }
        }
    }
}

impl StreamTerminator {
    /// The id of the stream this terminator ends.
    #[must_use]
    pub fn id(&self) -> StreamId {
        self.id
    }

    /// End the stream.
    pub fn terminate(&self) {
        self.tx.send_replace(true);
    }
}

/// The platform's capture-acquisition primitive.
#[async_trait::async_trait]
pub trait CaptureProvider: Send + Sync + std::fmt::Debug {
    /// Prepare the provider for observation.
    ///
    /// # Errors
    ///
    /// Returns an error if acquisitions on this platform cannot be observed.
    fn install_hook(&self) -> Result<(), HookError> {
        Ok(())
    }

    /// Acquire a capture stream.
    ///
    /// # Errors
    ///
    /// Returns an error if the user declines or the platform fails.
    async fn acquire(&self, request: CaptureRequest) -> Result<CaptureStream, AcquireError>;
}

/// A hook notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookSignal {
    /// An acquisition resolved with a live stream.
    Started(StreamId),
    /// A previously reported stream terminated.
    Ended(StreamId),
}

/// Wraps a provider and reports its streams' lifetimes.
///
/// Clones share the wrapped provider and the signal channel.
#[derive(Debug, Clone)]
pub struct HookedProvider {
    inner: Arc<dyn CaptureProvider>,
    signals: mpsc::UnboundedSender<HookSignal>,
}

impl HookedProvider {
    /// Wrap `inner`, reporting on `signals`.
    #[must_use]
    pub fn new(
        inner: Arc<dyn CaptureProvider>,
        signals: mpsc::UnboundedSender<HookSignal>,
    ) -> Self {
        Self { inner, signals }
    }

    /// Install the hook on the wrapped provider.
    ///
    /// # Errors
    ///
    /// Returns the provider's refusal unchanged.
    pub fn install(&self) -> Result<(), HookError> {
        self.inner.install_hook()
    }

    /// Acquire a stream through the wrapped provider.
    ///
    /// A successful acquisition is reported as [`HookSignal::Started`] and a
    /// watcher reports [`HookSignal::Ended`] when the stream terminates.
    /// Must be called within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Failures of the wrapped provider are returned unchanged and reported
    /// as nothing.
    pub async fn acquire(&self, request: CaptureRequest) -> Result<CaptureStream, AcquireError> {
        let stream = match self.inner.acquire(request).await {
            Ok(stream) => stream,
            Err(e) => {
                debug!(error = %e, "Capture acquisition did not start");
                return Err(e);
            }
        };

        let id = stream.id();
        info!(stream = %id, "Capture stream acquired");
        let _ = self.signals.send(HookSignal::Started(id));

        let mut watcher = stream.clone();
        let signals = self.signals.clone();
        tokio::spawn(async move {
            watcher.ended().await;
            debug!(stream = %id, "Capture stream ended");
            let _ = signals.send(HookSignal::Ended(id));
        });

        Ok(stream)
    }
}

/// A provider driven by a script of outcomes.
///
/// Each acquisition consumes the next queued outcome; an empty queue grants
/// a fresh stream. Granted streams stay controllable through
/// [`end`](Self::end). Useful for tests and for hosts that learn about
/// capture through their own channel.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    next_id: AtomicU64,
    refuse_hook: Option<String>,
    outcomes: Mutex<VecDeque<Result<(), AcquireError>>>,
    terminators: Mutex<HashMap<StreamId, StreamTerminator>>,
}

impl ScriptedProvider {
    /// Create a provider that grants every acquisition.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider whose hook installation is refused.
    #[must_use]
    pub fn refusing_hook(reason: impl Into<String>) -> Self {
        Self {
            refuse_hook: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Queue a failure for the next acquisition.
    pub fn fail_next(&self, error: AcquireError) {
        if let Ok(mut outcomes) = self.outcomes.lock() {
            outcomes.push_back(Err(error));
        }
    }

    /// End a granted stream. Returns `false` if the stream is unknown.
    pub fn end(&self, id: StreamId) -> bool {
        let terminator = self.terminators.lock().ok().and_then(|mut t| t.remove(&id));
        match terminator {
            Some(terminator) => {
                terminator.terminate();
                true
            }
            None => false,
        }
    }

    /// Streams granted and not yet ended.
    #[must_use]
    pub fn live(&self) -> Vec<StreamId> {
        let mut ids: Vec<StreamId> = self
            .terminators
            .lock()
            .map(|t| t.keys().copied().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }
}

#[async_trait::async_trait]
impl CaptureProvider for ScriptedProvider {
    fn install_hook(&self) -> Result<(), HookError> {
        match &self.refuse_hook {
            Some(reason) => Err(HookError::Refused(reason.clone())),
            None => Ok(()),
        }
    }

    async fn acquire(&self, _request: CaptureRequest) -> Result<CaptureStream, AcquireError> {
        let outcome = self
            .outcomes
            .lock()
            .ok()
            .and_then(|mut o| o.pop_front())
            .unwrap_or(Ok(()));
        outcome?;

        let id = StreamId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (stream, terminator) = CaptureStream::pair(id);
        if let Ok(mut terminators) = self.terminators.lock() {
            terminators.insert(id, terminator);
        }
        Ok(stream)
    }
}
