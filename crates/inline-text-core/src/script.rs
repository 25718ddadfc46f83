//! Subscript and superscript are mutually exclusive at the caret.

use crate::engine::{EditingEngine, transact};
use crate::guard::ReentrancyFlag;
use crate::host::HostCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScriptFormat {
    Subscript,
    Superscript,
}

impl ScriptFormat {
    /// Case-insensitive `subscript` / `superscript`.
    pub fn parse(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("subscript") {
            Some(Self::Subscript)
        } else if name.eq_ignore_ascii_case("superscript") {
            Some(Self::Superscript)
        } else {
            None
        }
    }

    pub fn format_name(self) -> &'static str {
        match self {
            Self::Subscript => "subscript",
            Self::Superscript => "superscript",
        }
    }

    pub fn command_name(self) -> &'static str {
        match self {
            Self::Subscript => "Subscript",
            Self::Superscript => "Superscript",
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            Self::Subscript => "sub",
            Self::Superscript => "sup",
        }
    }

    pub fn other(self) -> Self {
        match self {
            Self::Subscript => Self::Superscript,
            Self::Superscript => Self::Subscript,
        }
    }
}

/// The script format a host command asks to toggle, whichever wire shape it
/// arrived in.
pub fn script_intent_of(command: &HostCommand) -> Option<ScriptFormat> {
    match command {
        HostCommand::ApplyFormat { format, .. } => ScriptFormat::parse(format),
        HostCommand::ExecCommand { cmd, value, .. } => {
            ScriptFormat::parse(cmd).or_else(|| value.as_deref().and_then(ScriptFormat::parse))
        }
        _ => None,
    }
}

fn is_active<E: EditingEngine + ?Sized>(engine: &E, format: ScriptFormat) -> bool {
    engine
        .query_command_state(format.command_name())
        .or_else(|_| engine.format_matches(format.format_name()))
        .unwrap_or(false)
}

fn remove_both<E: EditingEngine + ?Sized>(engine: &mut E) {
    for format in [ScriptFormat::Subscript, ScriptFormat::Superscript] {
        if let Err(err) = engine.remove_format(format.format_name()) {
            tracing::trace!(%err, format = format.format_name(), "remove failed");
        }
    }
}

#[derive(Debug, Default)]
pub struct ScriptNormalizer {
    intent: Option<ScriptFormat>,
    fixing: ReentrancyFlag,
}

impl ScriptNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last explicitly chosen script format.
    pub fn intent(&self) -> Option<ScriptFormat> {
        self.intent
    }

    /// If both formats are active at the caret, keep one: the recorded intent,
    /// else whichever tag is nearer the caret. Returns the kept format when a
    /// correction was made.
    pub fn normalize<E: EditingEngine + ?Sized>(&mut self, engine: &mut E) -> Option<ScriptFormat> {
        let matches = |format: ScriptFormat| engine.format_matches(format.format_name()).unwrap_or(false);
        if !(matches(ScriptFormat::Subscript) && matches(ScriptFormat::Superscript)) {
            return None;
        }
        let _guard = self.fixing.try_enter()?;

        let keep = self.intent.or_else(|| {
            let doc = engine.surface();
            let body = engine.body();
            let start = engine.caret_element()?;
            doc.ancestors(start)
                .take_while(|n| *n != body)
                .find_map(|n| match doc.tag_name(n) {
                    Some("sub") => Some(ScriptFormat::Subscript),
                    Some("sup") => Some(ScriptFormat::Superscript),
                    _ => None,
                })
        });
        tracing::debug!(?keep, intent = ?self.intent, "both script formats active, normalizing");

        transact(engine, |engine| {
            remove_both(engine);
            if let Some(keep) = keep {
                if let Err(err) = engine.apply_format(keep.format_name(), None) {
                    tracing::debug!(%err, "could not re-apply script format");
                }
            }
        });
        keep
    }

    /// Toggle a script format requested by the host.
    ///
    /// Both formats are removed first. If the requested one was the only one
    /// active it stays removed, otherwise it is applied and recorded as the
    /// intent.
    pub fn toggle<E: EditingEngine + ?Sized>(&mut self, engine: &mut E, requested: ScriptFormat) {
        let was_requested = is_active(engine, requested);
        let was_other = is_active(engine, requested.other());

        transact(engine, |engine| {
            remove_both(engine);

            if was_requested && !was_other {
                self.intent = None;
                tracing::debug!(format = requested.format_name(), "script format toggled off");
                return;
            }

            self.intent = Some(requested);
            let applied = engine
                .exec_command(requested.command_name(), false, None)
                .or_else(|_| engine.apply_format(requested.format_name(), None));
            if let Err(err) = applied {
                tracing::debug!(%err, "could not apply script format");
            }
        });
    }
}
