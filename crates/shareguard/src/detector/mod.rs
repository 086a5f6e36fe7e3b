//! Capture detection.
//!
//! [`CaptureDetector`] owns the capture-state truth for one surface. Two
//! kinds of signal feed it:
//!
//! - hook signals from a [`provider::HookedProvider`], which are
//!   authoritative and applied immediately;
//! - raw observations from the [`probe::IndicatorProbe`], which must persist
//!   for the debounce period before they are confirmed, and which are ignored
//!   during the cooldown after a confirmed transition.
//!
//! Once the hook has confirmed a transition, observations are ignored for
//! the rest of the session.
//!
//! The detector is synchronous: callers pass the current instant and fire
//! timers by calling [`CaptureDetector::poll`] once
//! [`CaptureDetector::next_deadline`] has passed.

pub mod platform;
pub mod probe;
pub mod provider;

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, trace};

use crate::events::{CoreEvent, EventSink};

pub use platform::Platform;
pub use probe::IndicatorProbe;
pub use provider::{
    AcquireError, CaptureProvider, CaptureRequest, CaptureStream, HookError, HookSignal,
    HookedProvider, ScriptedProvider, StreamId, StreamTerminator,
};

/// Default interval between indicator probes.
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_millis(1000);

/// Default time an observation must persist before it is confirmed.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(3000);

/// Default quiet period after a confirmed transition.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(5000);

/// Where the last confirmed transition came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Confirmation {
    /// Nothing has been confirmed yet.
    #[default]
    None,

    /// The acquisition hook.
    ApiHook,

    /// A debounced indicator observation.
    Heuristic,
}

impl std::fmt::Display for Confirmation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::ApiHook => write!(f, "api_hook"),
            Self::Heuristic => write!(f, "heuristic"),
        }
    }
}

/// Configuration for a capture detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorConfig {
    /// Interval between indicator probes.
    pub probe_interval: Duration,

    /// Time an observation must persist before it is confirmed.
    pub debounce: Duration,

    /// Time after a confirmed transition during which probing is suppressed.
    pub cooldown: Duration,

    /// Whether to install the acquisition hook.
    pub hook_enabled: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            probe_interval: DEFAULT_PROBE_INTERVAL,
            debounce: DEFAULT_DEBOUNCE,
            cooldown: DEFAULT_COOLDOWN,
            hook_enabled: true,
        }
    }
}

/// Capture state of one surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureSession {
    /// The decided state.
    pub is_capturing: bool,

    /// Provenance of the last confirmed transition.
    pub confirmed_by: Confirmation,

    /// An observed change waiting out the debounce.
    pub pending_state: Option<bool>,

    /// When the pending change is due for confirmation.
    pub pending_deadline: Option<Instant>,

    /// When the last transition was confirmed.
    pub last_confirmed_at: Option<Instant>,

    /// The most recent probe observation.
    pub last_observation: Option<bool>,

    /// Streams reported by the hook that have not ended.
    pub live_streams: BTreeSet<StreamId>,
}

impl CaptureSession {
    /// Check whether the hook has taken over this session.
    #[must_use]
    pub fn hook_confirmed(&self) -> bool {
        self.confirmed_by == Confirmation::ApiHook
    }
}

/// A confirmed capture-state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// The new state.
    pub capturing: bool,

    /// Which signal confirmed it.
    pub source: Confirmation,

    /// When it was confirmed.
    pub at: Instant,
}

/// The capture-detection state machine for one surface.
#[derive(Debug)]
pub struct CaptureDetector {
    config: DetectorConfig,
    platform: Platform,
    session: CaptureSession,
    events: EventSink,
}

impl CaptureDetector {
    /// Create a detector in the idle state.
    #[must_use]
    pub fn new(platform: Platform, config: DetectorConfig, events: EventSink) -> Self {
        Self {
            config,
            platform,
            session: CaptureSession::default(),
            events,
        }
    }

    /// The platform tag reported with transitions.
    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// The detector's configuration.
    #[must_use]
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// The current session state.
    #[must_use]
    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    /// The decided capture state.
    #[must_use]
    pub fn is_capturing(&self) -> bool {
        self.session.is_capturing
    }

    /// When [`poll`](Self::poll) next has work to do.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.session.pending_deadline
    }

    /// Check whether probing is pointless right now.
    ///
    /// True once the hook has confirmed a transition, and during the cooldown
    /// after any confirmed transition.
    #[must_use]
    pub fn probe_suppressed(&self, now: Instant) -> bool {
        self.session.hook_confirmed() || self.in_cooldown(now)
    }

    /// Handle a stream reported by the acquisition hook.
    pub fn hook_started(&mut self, stream: StreamId, now: Instant) -> Option<Transition> {
        self.session.live_streams.insert(stream);
        self.session.confirmed_by = Confirmation::ApiHook;
        self.cancel_pending();
        if self.session.is_capturing {
            trace!(%stream, streams = self.session.live_streams.len(), "Additional capture stream");
            return None;
        }
        Some(self.confirm(true, Confirmation::ApiHook, now))
    }

    /// Handle the termination of a stream reported by the hook.
    ///
    /// The session goes idle once no reported stream is live.
    pub fn hook_ended(&mut self, stream: StreamId, now: Instant) -> Option<Transition> {
        if !self.session.live_streams.remove(&stream) {
            debug!(%stream, "Ignoring end of unknown stream");
            return None;
        }
        if !self.session.live_streams.is_empty() || !self.session.is_capturing {
            trace!(%stream, streams = self.session.live_streams.len(), "Capture stream ended");
            return None;
        }
        Some(self.confirm(false, Confirmation::ApiHook, now))
    }

    /// Feed one probe observation through the debounce gate.
    ///
    /// Observations never confirm a transition directly; see
    /// [`poll`](Self::poll).
    pub fn observe(&mut self, observed: bool, now: Instant) {
        if self.session.hook_confirmed() {
            trace!(observed, "Hook confirmed; ignoring observation");
            return;
        }
        if self.in_cooldown(now) {
            trace!(observed, "In cooldown; ignoring observation");
            return;
        }

        self.session.last_observation = Some(observed);

        if self.session.pending_state == Some(observed) {
            return;
        }

        if observed == self.session.is_capturing {
            if self.session.pending_state.take().is_some() {
                self.session.pending_deadline = None;
                debug!(observed, "Observation flipped back; pending change cancelled");
            }
            return;
        }

        let deadline = now + self.config.debounce;
        self.session.pending_state = Some(observed);
        self.session.pending_deadline = Some(deadline);
        debug!(
            observed,
            debounce_ms = self.config.debounce.as_millis(),
            "Observed change pending confirmation"
        );
    }

    /// Fire the debounce timer if it has expired.
    pub fn poll(&mut self, now: Instant) -> Option<Transition> {
        let deadline = self.session.pending_deadline?;
        if now < deadline {
            return None;
        }
        self.cancel_pending();

        if self.session.hook_confirmed() {
            return None;
        }
        match self.session.last_observation {
            Some(observed) if observed != self.session.is_capturing => {
                Some(self.confirm(observed, Confirmation::Heuristic, now))
            }
            _ => {
                debug!("Observation no longer differs; nothing to confirm");
                None
            }
        }
    }

    fn in_cooldown(&self, now: Instant) -> bool {
        self.session
            .last_confirmed_at
            .is_some_and(|at| now < at + self.config.cooldown)
    }

    fn cancel_pending(&mut self) {
        self.session.pending_state = None;
        self.session.pending_deadline = None;
    }

    fn confirm(&mut self, capturing: bool, source: Confirmation, now: Instant) -> Transition {
        self.session.is_capturing = capturing;
        self.session.confirmed_by = source;
        self.session.last_confirmed_at = Some(now);
        info!(
            capturing,
            source = %source,
            platform = %self.platform,
            "Capture state changed"
        );
        self.events.emit(CoreEvent::CaptureStateChanged {
            capturing,
            platform: self.platform,
            timestamp: Utc::now(),
        });
        Transition {
            capturing,
            source,
            at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    const MS: Duration = Duration::from_millis(1);

    /// Debounce/cooldown pairs exercised by the timing tests.
    fn configs() -> Vec<DetectorConfig> {
        [(300, 500), (3000, 5000), (8000, 10_000)]
            .into_iter()
            .map(|(debounce, cooldown)| DetectorConfig {
                debounce: MS * debounce,
                cooldown: MS * cooldown,
                ..DetectorConfig::default()
            })
            .collect()
    }

    fn detector(config: DetectorConfig) -> (CaptureDetector, mpsc::UnboundedReceiver<CoreEvent>) {
        let (sink, rx) = EventSink::channel();
        (CaptureDetector::new(Platform::GoogleMeet, config, sink), rx)
    }

    fn capture_events(rx: &mut mpsc::UnboundedReceiver<CoreEvent>) -> Vec<bool> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let CoreEvent::CaptureStateChanged { capturing, .. } = event {
                out.push(capturing);
            }
        }
        out
    }

    #[test]
    fn test_starts_idle() {
        let (d, _rx) = detector(DetectorConfig::default());
        assert!(!d.is_capturing());
        assert_eq!(d.session().confirmed_by, Confirmation::None);
        assert!(d.next_deadline().is_none());
    }

    #[test]
    fn test_hook_start_and_end_fire_once_each() {
        let (mut d, mut rx) = detector(DetectorConfig::default());
        let t0 = Instant::now();
        let stream = StreamId::new(1);

        let start = d.hook_started(stream, t0).unwrap();
        assert!(start.capturing);
        assert_eq!(start.source, Confirmation::ApiHook);
        assert!(d.hook_started(stream, t0).is_none());

        let stop = d.hook_ended(stream, t0 + MS * 10).unwrap();
        assert!(!stop.capturing);
        assert!(d.hook_ended(stream, t0 + MS * 20).is_none());

        assert_eq!(capture_events(&mut rx), vec![true, false]);
    }

    #[test]
    fn test_reacquisition_starts_fresh_capture() {
        let (mut d, mut rx) = detector(DetectorConfig::default());
        let t0 = Instant::now();
        d.hook_started(StreamId::new(1), t0);
        d.hook_ended(StreamId::new(1), t0 + MS);
        assert!(d.hook_started(StreamId::new(2), t0 + MS * 2).is_some());
        assert!(d.is_capturing());
        assert_eq!(capture_events(&mut rx), vec![true, false, true]);
    }

    #[test]
    fn test_idle_only_after_last_stream_ends() {
        let (mut d, _rx) = detector(DetectorConfig::default());
        let t0 = Instant::now();
        d.hook_started(StreamId::new(1), t0);
        d.hook_started(StreamId::new(2), t0);

        assert!(d.hook_ended(StreamId::new(1), t0).is_none());
        assert!(d.is_capturing());
        assert!(d.hook_ended(StreamId::new(2), t0).is_some());
        assert!(!d.is_capturing());
    }

    #[test]
    fn test_unknown_stream_end_is_ignored() {
        let (mut d, _rx) = detector(DetectorConfig::default());
        assert!(d.hook_ended(StreamId::new(9), Instant::now()).is_none());
    }

    #[test]
    fn test_heuristic_confirms_after_debounce() {
        for config in configs() {
            let debounce = config.debounce;
            let (mut d, mut rx) = detector(config);
            let t0 = Instant::now();

            d.observe(true, t0);
            assert_eq!(d.session().pending_state, Some(true));
            assert_eq!(d.next_deadline(), Some(t0 + debounce));
            assert!(d.poll(t0 + debounce - MS).is_none());
            assert!(!d.is_capturing());

            let transition = d.poll(t0 + debounce).unwrap();
            assert!(transition.capturing);
            assert_eq!(transition.source, Confirmation::Heuristic);
            assert_eq!(d.session().pending_state, None);
            assert_eq!(d.session().last_confirmed_at, Some(t0 + debounce));
            assert_eq!(capture_events(&mut rx), vec![true]);
        }
    }

    #[test]
    fn test_repeated_observation_keeps_original_timer() {
        for config in configs() {
            let debounce = config.debounce;
            let (mut d, _rx) = detector(config);
            let t0 = Instant::now();

            d.observe(true, t0);
            d.observe(true, t0 + debounce / 2);
            assert_eq!(d.next_deadline(), Some(t0 + debounce));
        }
    }

    #[test]
    fn test_flicker_within_debounce_never_confirms() {
        for config in configs() {
            let debounce = config.debounce;
            let (mut d, mut rx) = detector(config);
            let t0 = Instant::now();

            d.observe(true, t0);
            d.observe(false, t0 + debounce / 4);
            assert!(d.next_deadline().is_none());

            let mut now = t0;
            while now < t0 + debounce * 3 {
                now += debounce / 4;
                d.observe(false, now);
                assert!(d.poll(now).is_none());
            }
            assert!(!d.is_capturing());
            assert!(capture_events(&mut rx).is_empty());
        }
    }

    #[test]
    fn test_presenting_indicator_gone_within_two_seconds() {
        let config = DetectorConfig {
            debounce: MS * 8000,
            cooldown: MS * 10_000,
            ..DetectorConfig::default()
        };
        let (mut d, mut rx) = detector(config);
        let t0 = Instant::now();

        d.observe(true, t0);
        d.observe(true, t0 + MS * 1000);
        d.observe(false, t0 + MS * 2000);
        for second in 3..=20 {
            let now = t0 + MS * (second * 1000);
            d.observe(false, now);
            assert!(d.poll(now).is_none());
        }
        assert!(capture_events(&mut rx).is_empty());
    }

    #[test]
    fn test_cooldown_suppresses_probing() {
        for config in configs() {
            let (debounce, cooldown) = (config.debounce, config.cooldown);
            let (mut d, _rx) = detector(config);
            let t0 = Instant::now();

            d.observe(true, t0);
            let confirmed_at = t0 + debounce;
            d.poll(confirmed_at).unwrap();
            assert!(d.probe_suppressed(confirmed_at));

            // Ignored during cooldown.
            d.observe(false, confirmed_at + MS);
            assert!(d.next_deadline().is_none());
            assert!(d.is_capturing());

            let after = confirmed_at + cooldown;
            assert!(!d.probe_suppressed(after));
            d.observe(false, after);
            assert_eq!(d.next_deadline(), Some(after + debounce));
            assert!(!d.poll(after + debounce).unwrap().capturing);
        }
    }

    #[test]
    fn test_hook_precedence_over_heuristics() {
        for config in configs() {
            let debounce = config.debounce;
            let (mut d, mut rx) = detector(config);
            let t0 = Instant::now();

            d.hook_started(StreamId::new(1), t0);
            assert!(d.probe_suppressed(t0 + Duration::from_secs(3600)));

            let mut now = t0;
            for _ in 0..10 {
                now += debounce;
                d.observe(false, now);
                assert!(d.poll(now + debounce).is_none());
            }
            assert!(d.is_capturing());
            assert_eq!(d.session().confirmed_by, Confirmation::ApiHook);
            assert_eq!(capture_events(&mut rx), vec![true]);
        }
    }

    #[test]
    fn test_hook_cancels_pending_heuristic() {
        let (mut d, mut rx) = detector(DetectorConfig::default());
        let t0 = Instant::now();
        d.observe(true, t0);
        assert!(d.next_deadline().is_some());

        d.hook_started(StreamId::new(1), t0 + MS);
        assert!(d.next_deadline().is_none());
        assert!(d.poll(t0 + DEFAULT_DEBOUNCE).is_none());
        assert_eq!(capture_events(&mut rx), vec![true]);
    }

    #[test]
    fn test_hook_stays_authoritative_after_stream_ends() {
        let (mut d, _rx) = detector(DetectorConfig::default());
        let t0 = Instant::now();
        d.hook_started(StreamId::new(1), t0);
        d.hook_ended(StreamId::new(1), t0 + MS);

        let later = t0 + Duration::from_secs(60);
        d.observe(true, later);
        assert!(d.poll(later + DEFAULT_DEBOUNCE).is_none());
        assert!(!d.is_capturing());
    }

    #[test]
    fn test_transition_event_carries_platform() {
        let (mut d, mut rx) = detector(DetectorConfig::default());
        d.hook_started(StreamId::new(1), Instant::now());
        match rx.try_recv().unwrap() {
            CoreEvent::CaptureStateChanged {
                capturing,
                platform,
                ..
            } => {
                assert!(capturing);
                assert_eq!(platform, Platform::GoogleMeet);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
