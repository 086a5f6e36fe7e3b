//! In-process wiring of one observed surface.
//!
//! A [`Surface`] owns a document together with its [`CaptureDetector`] and
//! [`RedactionEngine`] and plays the controller between them: confirmed
//! capture transitions are relayed down to the engine, settings and
//! externally confirmed capture state come in through a [`SurfaceHandle`],
//! and notifications go out through the [`EventSink`].
//!
//! [`Surface::run`] is the only place that waits. It multiplexes handle
//! commands, hook signals, document mutations, the probe interval and the
//! two engines' deadlines on a single task, so engine logic never runs
//! concurrently with itself. Documents are usually not `Send`; spawn the
//! loop with [`tokio::task::spawn_local`] inside a
//! [`LocalSet`](tokio::task::LocalSet).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use shareguard::detector::ScriptedProvider;
//! use shareguard::dom::HtmlDocument;
//! use shareguard::events::EventSink;
//! use shareguard::surface::{Surface, SurfaceConfig};
//! use shareguard::Settings;
//!
//! # async fn example() -> shareguard::Result<()> {
//! let doc = HtmlDocument::parse("mail.google.com", "<p>jane@example.com</p>");
//! let provider = Arc::new(ScriptedProvider::new());
//! let (surface, handle) = Surface::new(
//!     doc,
//!     provider,
//!     Settings::default(),
//!     SurfaceConfig::default(),
//!     EventSink::disconnected(),
//! );
//!
//! let local = tokio::task::LocalSet::new();
//! local
//!     .run_until(async move {
//!         let task = tokio::task::spawn_local(surface.run());
//!         handle.force_capture_state(true)?;
//!         let status = handle.status().await?;
//!         println!("{} elements masked", status.masked);
//!         handle.shutdown()?;
//!         if let Ok(doc) = task.await {
//!             assert_eq!(doc.masked_count(), 0);
//!         }
//!         Ok::<(), shareguard::Error>(())
//!     })
//!     .await
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::detector::{
    AcquireError, CaptureDetector, CaptureProvider, CaptureRequest, CaptureStream, Confirmation,
    DetectorConfig, HookSignal, HookedProvider, IndicatorProbe, Platform, Transition,
};
use crate::dom::{Document, Mutation};
use crate::engine::{EngineConfig, RedactionEngine};
use crate::error::{Error, Result};
use crate::events::EventSink;
use crate::settings::Settings;

/// Configuration for a surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceConfig {
    /// Capture detector settings.
    pub detector: DetectorConfig,

    /// Redaction engine settings.
    pub engine: EngineConfig,

    /// Whether masking starts switched on.
    pub protection_enabled: bool,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            engine: EngineConfig::default(),
            protection_enabled: true,
        }
    }
}

/// A snapshot of a surface's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurfaceStatus {
    /// The capture state relayed to the engine.
    pub capturing: bool,

    /// The capture state decided by the detector.
    pub detected: bool,

    /// Whether masking is switched on.
    pub protection_enabled: bool,

    /// Whether the engine is masking right now.
    pub masking: bool,

    /// Elements currently masked.
    pub masked: usize,

    /// The surface's platform.
    pub platform: Platform,

    /// Provenance of the detector's last transition.
    pub confirmed_by: Confirmation,

    /// Whether the acquisition hook is installed.
    pub hook_installed: bool,
}

type Mutator<D> = Box<dyn FnOnce(&mut D) + Send>;

enum Command<D> {
    UpdateSettings(Settings),
    ForceCaptureState(bool),
    SetProtection(bool),
    Mutate(Mutator<D>),
    Status(oneshot::Sender<SurfaceStatus>),
    Shutdown,
}

/// One observed document with its detector and redaction engine.
pub struct Surface<D> {
    doc: D,
    detector: CaptureDetector,
    probe: IndicatorProbe,
    engine: RedactionEngine,
    hook_installed: bool,
    capturing: bool,
    protection: bool,
    commands: mpsc::UnboundedReceiver<Command<D>>,
    hooks: mpsc::UnboundedReceiver<HookSignal>,
    mutations: mpsc::UnboundedReceiver<Mutation>,
}

impl<D> fmt::Debug for Surface<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surface")
            .field("platform", &self.detector.platform())
            .field("capturing", &self.capturing)
            .field("protection", &self.protection)
            .field("masked", &self.engine.registry().len())
            .finish_non_exhaustive()
    }
}

impl<D: Document + 'static> Surface<D> {
    /// Attach to a document.
    ///
    /// Installs the acquisition hook on `provider` unless disabled. A refused
    /// hook leaves the surface on indicator probing alone.
    pub fn new(
        doc: D,
        provider: Arc<dyn CaptureProvider>,
        settings: Settings,
        config: SurfaceConfig,
        events: EventSink,
    ) -> (Self, SurfaceHandle<D>) {
        let platform = Platform::from_host(doc.hostname());
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (hook_tx, hooks) = mpsc::unbounded_channel();
        let (mutation_tx, mutations) = mpsc::unbounded_channel();

        let provider = HookedProvider::new(provider, hook_tx);
        let hook_installed = if config.detector.hook_enabled {
            match provider.install() {
                Ok(()) => true,
                Err(e) => {
                    warn!(error = %e, %platform, "Capture hook unavailable; probing only");
                    false
                }
            }
        } else {
            debug!("Capture hook disabled");
            false
        };

        let engine = RedactionEngine::new(
            doc.hostname(),
            settings,
            config.engine,
            mutation_tx,
            events.clone(),
        );
        let detector = CaptureDetector::new(platform, config.detector, events);

        let surface = Self {
            doc,
            detector,
            probe: IndicatorProbe::new(platform),
            engine,
            hook_installed,
            capturing: false,
            protection: config.protection_enabled,
            commands,
            hooks,
            mutations,
        };
        let handle = SurfaceHandle {
            commands: command_tx,
            provider,
        };
        (surface, handle)
    }

    /// Snapshot the surface's state.
    #[must_use]
    pub fn status(&self) -> SurfaceStatus {
        let session = self.detector.session();
        SurfaceStatus {
            capturing: self.capturing,
            detected: session.is_capturing,
            protection_enabled: self.protection,
            masking: self.engine.is_active(),
            masked: self.engine.registry().len(),
            platform: self.detector.platform(),
            confirmed_by: session.confirmed_by,
            hook_installed: self.hook_installed,
        }
    }

    /// Run until shut down or every handle is dropped.
    ///
    /// On exit all masks are reverted and the document is handed back.
    pub async fn run(mut self) -> D {
        let mut probe_tick = time::interval(self.detector.config().probe_interval);
        probe_tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            platform = %self.detector.platform(),
            hook = self.hook_installed,
            "Surface attached"
        );

        loop {
            let detector_deadline = self.detector.next_deadline();
            let engine_deadline = self.engine.next_deadline();

            tokio::select! {
                biased;

                Some(signal) = self.hooks.recv() => self.on_hook(signal, Instant::now()),
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.on_command(command),
                },
                Some(mutation) = self.mutations.recv() => {
                    trace!(?mutation, "Mutation observed");
                    self.engine.on_mutation(Instant::now());
                }
                () = wait_until(detector_deadline) => {
                    if let Some(transition) = self.detector.poll(Instant::now()) {
                        self.relay(transition);
                    }
                }
                () = wait_until(engine_deadline) => {
                    self.engine.poll(&mut self.doc, Instant::now());
                }
                _ = probe_tick.tick() => self.on_probe(Instant::now()),
            }
        }

        self.engine.on_capture_state_changed(&mut self.doc, false);
        info!(platform = %self.detector.platform(), "Surface detached");
        self.doc
    }

    fn on_command(&mut self, command: Command<D>) {
        match command {
            Command::UpdateSettings(settings) => {
                let auto_enable = settings.auto_enable;
                self.engine.on_settings_changed(&mut self.doc, settings);
                debug!(auto_enable, "Settings replaced");
            }
            Command::ForceCaptureState(capturing) => {
                info!(capturing, "Capture state set externally");
                self.set_capturing(capturing);
            }
            Command::SetProtection(enabled) => {
                info!(enabled, "Protection toggled");
                self.protection = enabled;
                self.sync_engine();
            }
            Command::Mutate(mutate) => mutate(&mut self.doc),
            Command::Status(reply) => {
                let _ = reply.send(self.status());
            }
            // Handled by the run loop.
            Command::Shutdown => {}
        }
    }

    fn on_hook(&mut self, signal: HookSignal, now: Instant) {
        if !self.hook_installed {
            trace!(?signal, "Hook not installed; ignoring signal");
            return;
        }
        let transition = match signal {
            HookSignal::Started(stream) => self.detector.hook_started(stream, now),
            HookSignal::Ended(stream) => self.detector.hook_ended(stream, now),
        };
        if let Some(transition) = transition {
            self.relay(transition);
        }
    }

    fn on_probe(&mut self, now: Instant) {
        if self.detector.probe_suppressed(now) {
            return;
        }
        let observed = self.probe.observe(&self.doc);
        self.detector.observe(observed, now);
    }

    fn relay(&mut self, transition: Transition) {
        self.set_capturing(transition.capturing);
    }

    fn set_capturing(&mut self, capturing: bool) {
        if capturing && !self.protection && self.engine.settings().auto_enable {
            info!("Capture started; protection re-enabled automatically");
            self.protection = true;
        }
        self.capturing = capturing;
        self.sync_engine();
    }

    fn sync_engine(&mut self) {
        let active = self.capturing && self.protection;
        self.engine.on_capture_state_changed(&mut self.doc, active);
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Cloneable control handle for a running [`Surface`].
pub struct SurfaceHandle<D> {
    commands: mpsc::UnboundedSender<Command<D>>,
    provider: HookedProvider,
}

impl<D> Clone for SurfaceHandle<D> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            provider: self.provider.clone(),
        }
    }
}

impl<D> fmt::Debug for SurfaceHandle<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SurfaceHandle")
            .field("closed", &self.commands.is_closed())
            .finish_non_exhaustive()
    }
}

impl<D> SurfaceHandle<D> {
    /// Replace the redaction settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SurfaceClosed`] if the surface has shut down.
    pub fn update_settings(&self, settings: Settings) -> Result<()> {
        self.send(Command::UpdateSettings(settings))
    }

    /// Set the capture state from an external source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SurfaceClosed`] if the surface has shut down.
    pub fn force_capture_state(&self, capturing: bool) -> Result<()> {
        self.send(Command::ForceCaptureState(capturing))
    }

    /// Switch masking on or off.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SurfaceClosed`] if the surface has shut down.
    pub fn set_protection(&self, enabled: bool) -> Result<()> {
        self.send(Command::SetProtection(enabled))
    }

    /// Run `mutate` against the document on the surface's task.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SurfaceClosed`] if the surface has shut down.
    pub fn mutate(&self, mutate: impl FnOnce(&mut D) + Send + 'static) -> Result<()> {
        self.send(Command::Mutate(Box::new(mutate)))
    }

    /// Query the surface's state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SurfaceClosed`] if the surface has shut down.
    pub async fn status(&self) -> Result<SurfaceStatus> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Status(tx))?;
        rx.await.map_err(|_| Error::SurfaceClosed)
    }

    /// Acquire a capture stream through the surface's hooked provider.
    ///
    /// # Errors
    ///
    /// Returns the provider's error unchanged.
    pub async fn acquire(
        &self,
        request: CaptureRequest,
    ) -> std::result::Result<CaptureStream, AcquireError> {
        self.provider.acquire(request).await
    }

    /// Stop the surface. Masks are reverted before the loop exits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SurfaceClosed`] if the surface has already shut down.
    pub fn shutdown(&self) -> Result<()> {
        self.send(Command::Shutdown)
    }

    fn send(&self, command: Command<D>) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::SurfaceClosed)
    }
}
