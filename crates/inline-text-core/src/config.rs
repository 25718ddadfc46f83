//! Widget configuration and environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Timing and diagnostics knobs. Every field has a default, so `{}` is a
/// valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WidgetConfig {
    /// Quiet window of the save debouncer.
    pub save_debounce_ms: u64,
    /// Delay before a blur turns the WYSIWYG toolbar off.
    pub blur_disable_delay_ms: u64,
    /// How long a recorded caret intent stays valid.
    pub caret_intent_ttl_ms: u64,
    /// Delay of the second caret sync after focus.
    pub focus_resync_delay_ms: u64,
    /// Log node-change diagnostics at debug level instead of trace.
    pub debug: bool,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            save_debounce_ms: 500,
            blur_disable_delay_ms: 150,
            caret_intent_ttl_ms: 250,
            focus_resync_delay_ms: 50,
            debug: false,
        }
    }
}

impl WidgetConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    pub fn blur_disable_delay(&self) -> Duration {
        Duration::from_millis(self.blur_disable_delay_ms)
    }

    pub fn caret_intent_ttl(&self) -> Duration {
        Duration::from_millis(self.caret_intent_ttl_ms)
    }

    pub fn focus_resync_delay(&self) -> Duration {
        Duration::from_millis(self.focus_resync_delay_ms)
    }
}

/// Host rendering mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Interact,
    Preview,
    View,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Interact => "interact",
            Mode::Preview => "preview",
            Mode::View => "view",
        }
    }
}

/// Where the widget is running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Environment {
    pub mode: Mode,
    /// Local development build: persistence is skipped, editing is always on.
    pub development: bool,
    /// The widget sits in a read-only repeater row.
    pub readonly_row: bool,
}

impl Environment {
    pub fn interact() -> Self {
        Self::default()
    }

    pub fn preview() -> Self {
        Self {
            mode: Mode::Preview,
            ..Self::default()
        }
    }

    pub fn development() -> Self {
        Self {
            development: true,
            ..Self::default()
        }
    }

    /// Read-only repeater rows render as preview even in interact mode.
    pub fn effective_mode(&self) -> Mode {
        match self.mode {
            Mode::Interact if self.readonly_row => Mode::Preview,
            mode => mode,
        }
    }

    pub fn is_preview(&self) -> bool {
        self.effective_mode() == Mode::Preview
    }

    pub fn is_editable(&self) -> bool {
        self.development || self.effective_mode() == Mode::Interact
    }
}
