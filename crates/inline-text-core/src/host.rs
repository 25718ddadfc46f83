//! Messages exchanged with the host UI.
//!
//! Both directions use the `{type, payload}` envelope shape on the wire.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::engine::EditorHandle;

/// Events sent to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum HostEvent {
    /// Caret-state mirror for the host toolbar and overlay.
    MirrorUpdate {
        editor: EditorHandle,
        html: String,
        #[serde(rename = "styleBlock")]
        style_block: String,
    },
    ShowToolbar(bool),
    /// Whether the host toolbar should act on this widget.
    WysiwygStatus(bool),
    /// A save went through.
    PageChanged,
    /// The widget's data changed; listeners may re-render.
    ComponentRendered {
        #[serde(rename = "widgetId")]
        widget_id: SmolStr,
    },
    /// Recompute highlight dimensions, for one widget or all of them.
    HighlightRefresh {
        #[serde(rename = "widgetId")]
        widget_id: Option<SmolStr>,
    },
    /// Toggle the empty-widget placeholder.
    EmptyState(bool),
    /// Whether the surrounding component may be dragged.
    Draggable(bool),
}

/// Commands sent by the host toolbar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "camelCase")]
pub enum HostCommand {
    ExecCommand {
        cmd: String,
        #[serde(default)]
        ui: bool,
        #[serde(default)]
        value: Option<String>,
    },
    ApplyFormat {
        format: String,
        #[serde(default)]
        value: Option<String>,
    },
    RemoveFormat {
        format: String,
    },
    /// The host dismissed the widget.
    Cancel,
}

/// A command plus the editor it is meant for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostEnvelope {
    /// `None` means "whichever editor has focus".
    #[serde(default)]
    pub target: Option<EditorHandle>,
    pub command: HostCommand,
}

impl HostEnvelope {
    pub fn to(target: EditorHandle, command: HostCommand) -> Self {
        Self {
            target: Some(target),
            command,
        }
    }

    pub fn untargeted(command: HostCommand) -> Self {
        Self {
            target: None,
            command,
        }
    }
}

/// Outbound event sink.
pub trait HostBridge {
    fn emit(&self, event: HostEvent);
}
