//! `shareguard` - Keeps sensitive page content off shared screens
//!
//! This library decides whether a document is being screen-shared and, while
//! it is, masks the elements that hold sensitive content (emails, card
//! numbers, API keys, account numbers, amounts, personal identifiers and
//! user-defined patterns).
//!
//! - [`detector`] owns the capture-state truth, combining an acquisition hook
//!   with debounced indicator probing.
//! - [`engine`] scans the document and keeps the set of masked elements.
//! - [`category`] and [`selectors`] decide what counts as sensitive.
//! - [`surface`] wires both engines to one document on a single task.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod category;
pub mod cli;
pub mod config;
pub mod detector;
pub mod dom;
pub mod engine;
pub mod error;
pub mod events;
pub mod logging;
pub mod selectors;
pub mod settings;
pub mod surface;

pub use category::{Category, CategoryMatcher, CustomPattern};
pub use config::Config;
pub use detector::{CaptureDetector, CaptureSession, Confirmation, Platform};
pub use dom::{Document, HtmlDocument};
pub use engine::{RedactionEngine, RedactionRegistry, ScanReport};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventSink};
pub use logging::init_logging;
pub use settings::Settings;
pub use surface::{Surface, SurfaceConfig, SurfaceHandle, SurfaceStatus};
