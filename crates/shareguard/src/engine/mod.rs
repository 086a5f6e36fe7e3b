//! Redaction engine.
//!
//! The engine owns the set of masked elements for one document. While
//! capture is active it scans the document, masks every visible element that
//! holds sensitive content, and watches for mutations so newly inserted
//! content is caught too. When capture ends every mask is reverted.
//!
//! Scans are full reconciliations: each scan computes the set of elements
//! that should be masked right now, masks the new ones and releases the ones
//! that no longer qualify (a disabled category, edited text). Running a scan
//! twice without a document change leaves the registry untouched.
//!
//! The engine is synchronous. Timers are deadlines the owner polls with
//! [`RedactionEngine::poll`]; see [`crate::surface`] for the async driver.

mod registry;

use std::collections::HashSet;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::category::{Category, CategoryMatcher, MIN_TEXT_LEN};
use crate::dom::{Document, ElementId, MutationSender, ObserverHandle};
use crate::events::{CoreEvent, EventSink};
use crate::selectors::{self, SurfaceSelectors};
use crate::settings::Settings;

pub use registry::{MaskRecord, RedactionRegistry};

/// Default quiet period before a mutation-triggered rescan.
pub const DEFAULT_SCAN_DEBOUNCE: Duration = Duration::from_millis(300);

/// Configuration for a redaction engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Quiet period after the last mutation before rescanning.
    pub scan_debounce: Duration,

    /// Minimum text length (in characters) considered for matching.
    pub min_text_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scan_debounce: DEFAULT_SCAN_DEBOUNCE,
            min_text_len: MIN_TEXT_LEN,
        }
    }
}

/// Outcome of one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Candidate elements found by selectors and text matching.
    pub candidates: usize,
    /// Candidates skipped because they are not rendered.
    pub hidden: usize,
    /// Elements newly masked by this scan.
    pub masked: usize,
    /// Elements released because they no longer qualify.
    pub released: usize,
    /// Per-element or per-selector failures that were skipped.
    pub errors: usize,
    /// Elements masked after the scan.
    pub total: usize,
}

/// Masks sensitive content in one document while capture is active.
#[derive(Debug)]
pub struct RedactionEngine {
    config: EngineConfig,
    settings: Settings,
    matcher: CategoryMatcher,
    selectors: SurfaceSelectors,
    registry: RedactionRegistry,
    active: bool,
    observer: Option<ObserverHandle>,
    scan_deadline: Option<Instant>,
    mutations: MutationSender,
    events: EventSink,
    reported_count: usize,
}

impl RedactionEngine {
    /// Create an engine for a document served from `hostname`.
    ///
    /// Mutations observed while active are delivered on `mutations`; the
    /// owner feeds them back through [`on_mutation`](Self::on_mutation).
    #[must_use]
    pub fn new(
        hostname: &str,
        settings: Settings,
        config: EngineConfig,
        mutations: MutationSender,
        events: EventSink,
    ) -> Self {
        let matcher = CategoryMatcher::with_min_len(&settings, config.min_text_len);
        Self {
            selectors: selectors::for_host(hostname),
            matcher,
            settings,
            config,
            registry: RedactionRegistry::new(),
            active: false,
            observer: None,
            scan_deadline: None,
            mutations,
            events,
            reported_count: 0,
        }
    }

    /// Whether the engine is currently scanning and observing.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The masked elements.
    #[must_use]
    pub fn registry(&self) -> &RedactionRegistry {
        &self.registry
    }

    /// The settings currently in force.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// When the pending mutation rescan is due, if one is armed.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.scan_deadline
    }

    /// React to a capture-state change.
    ///
    /// `true` starts observing and runs an initial scan; `false` stops
    /// observing, cancels any pending rescan and reverts every mask. Redundant
    /// calls are no-ops and return `None`.
    pub fn on_capture_state_changed(
        &mut self,
        doc: &mut dyn Document,
        capturing: bool,
    ) -> Option<ScanReport> {
        match (capturing, self.active) {
            (true, false) => {
                info!(host = doc.hostname(), "Starting redaction");
                self.active = true;
                self.observer = Some(doc.subscribe(self.mutations.clone()));
                Some(self.scan_and_mask(doc))
            }
            (false, true) => {
                info!(host = doc.hostname(), "Stopping redaction");
                if let Some(handle) = self.observer.take() {
                    doc.unsubscribe(handle);
                }
                self.scan_deadline = None;
                self.active = false;
                self.remove_all_masks(doc);
                None
            }
            _ => {
                trace!(capturing, "Redundant capture-state change ignored");
                None
            }
        }
    }

    /// Replace the settings and, if active, rescan immediately.
    pub fn on_settings_changed(
        &mut self,
        doc: &mut dyn Document,
        settings: Settings,
    ) -> Option<ScanReport> {
        self.matcher = CategoryMatcher::with_min_len(&settings, self.config.min_text_len);
        self.settings = settings;
        debug!(
            categories = self.settings.enabled_categories.len(),
            custom = self.settings.custom_patterns.len(),
            "Redaction settings updated"
        );
        if self.active {
            self.scan_deadline = None;
            Some(self.scan_and_mask(doc))
        } else {
            None
        }
    }

    /// Note that the document changed. Arms (or re-arms) the rescan timer.
    pub fn on_mutation(&mut self, now: Instant) {
        if !self.active {
            return;
        }
        self.scan_deadline = Some(now + self.config.scan_debounce);
    }

    /// Run the pending rescan if its deadline has passed.
    pub fn poll(&mut self, doc: &mut dyn Document, now: Instant) -> Option<ScanReport> {
        match self.scan_deadline {
            Some(deadline) if deadline <= now && self.active => {
                self.scan_deadline = None;
                Some(self.scan_and_mask(doc))
            }
            _ => None,
        }
    }

    /// Scan the document and reconcile masks with what is sensitive now.
    ///
    /// Does nothing while inactive.
    pub fn scan_and_mask(&mut self, doc: &mut dyn Document) -> ScanReport {
        let mut report = ScanReport::default();
        if !self.active {
            debug!("Scan requested while inactive; skipping");
            report.total = self.registry.len();
            return report;
        }

        let candidates = self.collect_candidates(&*doc, &mut report);
        report.candidates = candidates.len();

        let mut wanted: Vec<(ElementId, Category)> = Vec::with_capacity(candidates.len());
        for (element, category) in candidates {
            match doc.is_visible(element) {
                Ok(true) => wanted.push((element, category)),
                Ok(false) => report.hidden += 1,
                Err(e) => {
                    warn!(%element, error = %e, "Visibility check failed; masking anyway");
                    report.errors += 1;
                    wanted.push((element, category));
                }
            }
        }

        self.release_stale(doc, &wanted, &mut report);
        self.apply_wanted(doc, wanted, &mut report);

        report.total = self.registry.len();
        debug!(
            candidates = report.candidates,
            masked = report.masked,
            released = report.released,
            total = report.total,
            "Scan complete"
        );
        self.report_count();
        report
    }

    /// Revert every mask and clear the registry.
    ///
    /// Returns the number of elements that were masked.
    pub fn remove_all_masks(&mut self, doc: &mut dyn Document) -> usize {
        let drained = self.registry.drain();
        for (element, _) in &drained {
            if let Err(e) = doc.revert_mask(*element) {
                warn!(%element, error = %e, "Failed to revert mask");
            }
        }
        self.report_count();
        drained.len()
    }

    fn collect_candidates(
        &self,
        doc: &dyn Document,
        report: &mut ScanReport,
    ) -> Vec<(ElementId, Category)> {
        let mut seen: HashSet<ElementId> = HashSet::new();
        let mut ordered = Vec::new();
        let mut add = |element: ElementId, category: Category| {
            if seen.insert(element) {
                ordered.push((element, category));
            }
        };

        for (category, list) in self.selectors.lists() {
            if !self.settings.is_enabled(&category) {
                continue;
            }
            for selector in list {
                match doc.select(selector) {
                    Ok(elements) => {
                        for element in elements {
                            add(element, category.clone());
                        }
                    }
                    Err(e) => {
                        warn!(selector, error = %e, "Skipping selector");
                        report.errors += 1;
                    }
                }
            }
        }

        if !self.matcher.is_empty() {
            for node in doc.text_nodes() {
                if let Some(category) = self.matcher.classify(&node.text) {
                    trace!(element = %node.parent, %category, "Sensitive text found");
                    add(node.parent, category);
                }
            }
        }

        ordered
    }

    fn release_stale(
        &mut self,
        doc: &mut dyn Document,
        wanted: &[(ElementId, Category)],
        report: &mut ScanReport,
    ) {
        let keep: HashSet<ElementId> = wanted.iter().map(|(id, _)| *id).collect();
        let stale: Vec<ElementId> = self
            .registry
            .elements()
            .into_iter()
            .filter(|id| !keep.contains(id))
            .collect();
        for element in stale {
            if self.registry.remove(element).is_some() {
                if let Err(e) = doc.revert_mask(element) {
                    warn!(%element, error = %e, "Failed to revert mask");
                    report.errors += 1;
                }
                trace!(%element, "Mask released");
                report.released += 1;
            }
        }
    }

    fn apply_wanted(
        &mut self,
        doc: &mut dyn Document,
        wanted: Vec<(ElementId, Category)>,
        report: &mut ScanReport,
    ) {
        let intensity = self.settings.intensity;
        for (element, category) in wanted {
            if let Some(record) = self.registry.get_mut(element) {
                record.category = category;
                if record.applied_intensity != intensity {
                    match doc.apply_mask(element, intensity) {
                        Ok(()) => record.applied_intensity = intensity,
                        Err(e) => {
                            warn!(%element, error = %e, "Failed to update mask intensity");
                            report.errors += 1;
                        }
                    }
                }
                continue;
            }

            match doc.apply_mask(element, intensity) {
                Ok(()) => {
                    trace!(%element, %category, intensity, "Mask applied");
                    self.registry.insert(
                        element,
                        MaskRecord {
                            applied_intensity: intensity,
                            category,
                        },
                    );
                    report.masked += 1;
                }
                Err(e) => {
                    warn!(%element, error = %e, "Failed to apply mask");
                    report.errors += 1;
                }
            }
        }
    }

    fn report_count(&mut self) {
        let count = self.registry.len();
        if count != self.reported_count {
            self.reported_count = count;
            self.events.emit(CoreEvent::MaskCountChanged { count });
        }
    }
}
