//! Caret-state mirroring and formatting persistence for an inline rich-text
//! widget.
//!
//! A [`Session`] sits between a black-box [`EditingEngine`] and a host UI
//! reached through [`HostBridge`]. It keeps explicit color and font choices
//! alive across caret moves ([`format`]), keeps subscript and superscript
//! exclusive ([`script`]), sends the host a caret mirror on every change
//! ([`mirror`]) and persists sanitized content with debounced, deduplicated
//! writes ([`save`], [`sanitize`]).

pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod guard;
pub mod host;
pub mod intent;
pub mod mirror;
pub mod registry;
pub mod sanitize;
pub mod save;
pub mod schedule;
pub mod script;
pub mod session;

#[cfg(feature = "telemetry")]
pub mod telemetry;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use inline_text_dom;

pub use config::{Environment, Mode, WidgetConfig};
pub use engine::{
    ComputedStyle, DomPoint, DomSelection, EditingEngine, EditorHandle, NodeChangeEvent, transact,
};
pub use error::{BoxError, ConfigError, EngineError, SaveError, SessionError};
pub use format::{DefaultStyle, FormatTracker, StickyFormat};
pub use guard::{ReentrancyFlag, ReentrancyGuard};
pub use host::{HostBridge, HostCommand, HostEnvelope, HostEvent};
pub use intent::{CaretIntent, CaretIntentSlot};
pub use mirror::{MirrorSnapshot, build_mirror};
pub use registry::EditorRegistry;
pub use sanitize::{replace_widget_instances, sanitize};
pub use save::{
    ContentHook, HookOutput, NoopHook, SaveCoordinator, SaveOutcome, SaveTask, Transport,
    WidgetData, WidgetUpdate,
};
pub use script::{ScriptFormat, ScriptNormalizer};
pub use session::Session;
